pub mod blob_store;
pub mod file_service;
pub mod health_service;
pub mod metadata_store;
