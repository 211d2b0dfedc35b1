use crate::errors::ErrorDetail;
use axum::{
    Json,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

/// Whether internal error details may be shown to clients.
#[derive(Clone, Copy, Debug)]
pub struct ExposeErrors(pub bool);

/// Attach the internal detail of a failed request to its envelope as `error`.
///
/// A no-op in production, where clients only ever see the generic message.
pub async fn attach_error_detail(
    State(ExposeErrors(expose)): State<ExposeErrors>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !expose {
        return response;
    }

    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (parts, body) = response.into_parts();
    let mut envelope = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| json!({ "success": false })),
        Err(_) => json!({ "success": false }),
    };
    if let Some(map) = envelope.as_object_mut() {
        map.insert("error".into(), Value::String(detail));
    }

    let mut rebuilt = (parts.status, Json(envelope)).into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_LENGTH && !rebuilt.headers().contains_key(name) {
            rebuilt.headers_mut().append(name.clone(), value.clone());
        }
    }
    *rebuilt.extensions_mut() = parts.extensions;
    rebuilt
}
