use crate::services::{file_service::FileService, health_service::HealthReporter};
use std::{sync::Arc, time::Instant};

/// Facts about the running process reported by the health endpoints.
#[derive(Debug)]
pub struct ServiceInfo {
    pub environment: String,
    pub database_url: String,
    pub started_at: Instant,
}

impl ServiceInfo {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    pub health: HealthReporter,
    pub info: Arc<ServiceInfo>,
}
