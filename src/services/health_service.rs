//! src/services/health_service.rs
//!
//! HealthReporter: probes the metadata store without ever failing. Every
//! problem is folded into the returned report.

use crate::services::metadata_store::MetadataStore;
use tracing::error;

const FILES_TABLE: &str = "files";

/// Cheap probe: can the store answer, and is the schema in place.
#[derive(Debug)]
pub struct HealthReport {
    pub store_reachable: bool,
    pub table_present: bool,
    pub detail: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.store_reachable && self.table_present
    }
}

/// Deeper probe with version, table list and row count.
#[derive(Debug)]
pub struct DatabaseReport {
    pub store_reachable: bool,
    pub version: Option<String>,
    pub tables: Vec<String>,
    pub record_count: Option<i64>,
    pub detail: String,
}

#[derive(Clone)]
pub struct HealthReporter {
    store: MetadataStore,
}

impl HealthReporter {
    pub fn new(store: MetadataStore) -> Self {
        Self { store }
    }

    pub async fn liveness(&self) -> HealthReport {
        if let Err(err) = self.store.ping().await {
            error!("health check database error: {}", err);
            return HealthReport {
                store_reachable: false,
                table_present: false,
                detail: err.to_string(),
            };
        }

        match self.store.table_exists(FILES_TABLE).await {
            Ok(true) => HealthReport {
                store_reachable: true,
                table_present: true,
                detail: "Database connection successful".into(),
            },
            Ok(false) => HealthReport {
                store_reachable: true,
                table_present: false,
                detail: format!("table `{}` is missing", FILES_TABLE),
            },
            Err(err) => {
                error!("health check schema error: {}", err);
                HealthReport {
                    store_reachable: true,
                    table_present: false,
                    detail: err.to_string(),
                }
            }
        }
    }

    pub async fn database(&self) -> DatabaseReport {
        let version = match self.store.sqlite_version().await {
            Ok(version) => version,
            Err(err) => {
                error!("database health check error: {}", err);
                return DatabaseReport {
                    store_reachable: false,
                    version: None,
                    tables: Vec::new(),
                    record_count: None,
                    detail: err.to_string(),
                };
            }
        };

        let tables = match self.store.table_names().await {
            Ok(tables) => tables,
            Err(err) => {
                error!("database health check error: {}", err);
                return DatabaseReport {
                    store_reachable: true,
                    version: Some(version),
                    tables: Vec::new(),
                    record_count: None,
                    detail: err.to_string(),
                };
            }
        };

        match self.store.count().await {
            Ok(count) => DatabaseReport {
                store_reachable: true,
                version: Some(version),
                tables,
                record_count: Some(count),
                detail: "Database health check successful".into(),
            },
            Err(err) => {
                error!("database health check error: {}", err);
                DatabaseReport {
                    store_reachable: true,
                    version: Some(version),
                    tables,
                    record_count: None,
                    detail: err.to_string(),
                }
            }
        }
    }
}

impl DatabaseReport {
    pub fn is_healthy(&self) -> bool {
        self.store_reachable && self.record_count.is_some()
    }
}
