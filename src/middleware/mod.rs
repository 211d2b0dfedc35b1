pub mod cors;
pub mod error_detail;
pub mod request_log;
