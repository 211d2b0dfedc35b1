use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{Any, CorsLayer};

/// CORS for the configured frontend origin. `*` allows any origin without
/// credentials.
pub fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    if origin.trim() == "*" {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any));
    }

    let origin = HeaderValue::from_str(origin.trim())
        .with_context(|| format!("invalid CORS origin `{}`", origin))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true))
}
