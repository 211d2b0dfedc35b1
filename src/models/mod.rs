//! Data models for the file storage service.
//!
//! `FileRecord` maps to the `files` table via `sqlx::FromRow`; the view types
//! are the JSON shapes handed back to clients via `serde`.

pub mod file_record;
