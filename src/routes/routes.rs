//! Defines routes for the file storage API.
//!
//! ## Structure
//! - **File endpoints**
//!   - `POST   /files`               multipart upload (field `file`)
//!   - `GET    /files`               list, newest first
//!   - `GET    /files/{id}`          metadata
//!   - `GET    /files/{id}/view`     inline stream
//!   - `GET    /files/{id}/download` attachment stream
//!   - `DELETE /files/{id}`          delete record and blob
//!
//! - **Health endpoints**
//!   - `GET    /health`
//!   - `GET    /health/database`
//!
//! Every route is served both at the root and under `/api`.

use crate::{
    handlers::{
        file_handlers::{
            delete_file, download_file, get_file, list_files, route_not_found, upload_file,
            view_file,
        },
        health_handlers::{health, health_database},
    },
    middleware::{
        error_detail::{ExposeErrors, attach_error_detail},
        request_log::log_requests,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::cors::CorsLayer;

/// Room for multipart framing on top of the file bytes themselves.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Build the router for all file and health routes.
///
/// `max_file_size` bounds the upload request body; the per-file limit is
/// enforced again while streaming to disk.
pub fn routes(max_file_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_file_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health))
        .route("/health/database", get(health_database))
        .route(
            "/files",
            get(list_files)
                .post(upload_file)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/files/{id}", get(get_file).delete(delete_file))
        .route("/files/{id}/view", get(view_file))
        .route("/files/{id}/download", get(download_file))
}

/// The complete application: routes mounted at `/` and `/api`, envelope
/// fallback, error-detail exposure, CORS and request logging.
pub fn app(state: AppState, cors: CorsLayer, expose_errors: bool) -> Router {
    let max_file_size = state.files.blobs.policy.max_file_size;
    let api = routes(max_file_size);

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(from_fn_with_state(
            ExposeErrors(expose_errors),
            attach_error_detail,
        ))
        .layer(cors)
        .layer(from_fn(log_requests))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::{
            blob_store::{BlobStore, UploadPolicy},
            file_service::FileService,
            health_service::HealthReporter,
            metadata_store::tests::memory_store,
        },
        state::ServiceInfo,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::{sync::Arc, time::Instant};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "file-store-test-boundary";

    struct TestApp {
        router: Router,
        state: AppState,
        _dir: TempDir,
    }

    async fn test_app_with(max_file_size: u64, expose_errors: bool) -> TestApp {
        let dir = TempDir::new().unwrap();
        let store = memory_store().await;
        let blobs = BlobStore::new(
            dir.path().join("uploads"),
            UploadPolicy::new(max_file_size, ["txt", "jpg", "jpeg", "png", "json", "pdf"]),
        );
        let state = AppState {
            files: FileService::new(store.clone(), blobs),
            health: HealthReporter::new(store),
            info: Arc::new(ServiceInfo {
                environment: "test".into(),
                database_url: "sqlite::memory:".into(),
                started_at: Instant::now(),
            }),
        };
        TestApp {
            router: app(state.clone(), CorsLayer::permissive(), expose_errors),
            state,
            _dir: dir,
        }
    }

    async fn test_app() -> TestApp {
        test_app_with(1024, true).await
    }

    fn upload_request(uri: &str, field: &str, filename: &str, mime: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &TestApp, req: Request<Body>) -> Response {
        app.router.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn raw_body(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    async fn upload(app: &TestApp, filename: &str, mime: &str, bytes: &[u8]) -> i64 {
        let response = send(app, upload_request("/files", "file", filename, mime, bytes)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["data"]["id"].as_i64().unwrap()
    }

    fn blob_count(app: &TestApp) -> usize {
        std::fs::read_dir(&app.state.files.blobs.base_path)
            .map(|rd| rd.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn upload_list_delete_scenario() {
        let app = test_app().await;

        let response = send(
            &app,
            upload_request("/files", "file", "a.txt", "text/plain", b"hello"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["success"], true);
        assert_eq!(created["data"]["size"], 5);
        assert_eq!(created["data"]["mimeType"], "text/plain");
        assert_eq!(created["data"]["originalName"], "a.txt");
        let id = created["data"]["id"].as_i64().unwrap();

        let listed = json_body(send(&app, request("GET", "/files")).await).await;
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);

        let response = send(&app, request("DELETE", &format!("/files/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let deleted = json_body(response).await;
        assert_eq!(deleted["data"]["id"], id);
        assert_eq!(deleted["data"]["originalName"], "a.txt");

        let response = send(&app, request("GET", &format!("/files/{id}"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn metadata_matches_upload() {
        let app = test_app().await;
        let id = upload(&app, "photo.PNG", "image/png", b"\x89PNG\r\n").await;

        let response = send(&app, request("GET", &format!("/files/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["size"], 6);
        assert_eq!(body["data"]["originalName"], "photo.PNG");
        assert!(body["data"]["filename"].as_str().unwrap().ends_with(".png"));
        assert_eq!(
            body["data"]["downloadUrl"],
            format!("/api/files/{id}/download")
        );
    }

    #[tokio::test]
    async fn view_and_download_differ_only_in_disposition() {
        let app = test_app().await;
        let id = upload(&app, "data.json", "application/json", b"{\"k\":1}").await;

        let view = send(&app, request("GET", &format!("/files/{id}/view"))).await;
        assert_eq!(view.status(), StatusCode::OK);
        assert_eq!(
            view.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"data.json\""
        );
        assert_eq!(view.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(view.headers()[header::CONTENT_LENGTH], "7");

        let download = send(&app, request("GET", &format!("/files/{id}/download"))).await;
        assert_eq!(download.status(), StatusCode::OK);
        assert_eq!(
            download.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"data.json\""
        );

        let viewed = raw_body(view).await;
        let downloaded = raw_body(download).await;
        assert_eq!(viewed, b"{\"k\":1}");
        assert_eq!(viewed, downloaded);
    }

    #[tokio::test]
    async fn oversize_upload_is_rejected_without_orphans() {
        let app = test_app_with(8, true).await;

        let response = send(
            &app,
            upload_request("/files", "file", "big.txt", "text/plain", b"0123456789"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["success"], false);

        let listed = json_body(send(&app, request("GET", "/files")).await).await;
        assert_eq!(listed["count"], 0);
        assert_eq!(blob_count(&app), 0);
    }

    #[tokio::test]
    async fn disallowed_extension_is_rejected() {
        let app = test_app().await;

        let response = send(
            &app,
            upload_request("/files", "file", "tool.exe", "application/octet-stream", b"MZ"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().contains(".exe"));
        assert_eq!(app.state.files.store.count().await.unwrap(), 0);
        assert_eq!(blob_count(&app), 0);
    }

    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let app = test_app().await;

        let response = send(
            &app,
            upload_request("/files", "attachment", "a.txt", "text/plain", b"hello"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "No file uploaded");

        let response = send(&app, request("POST", "/files")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_twice_then_not_found() {
        let app = test_app().await;
        let id = upload(&app, "a.txt", "text/plain", b"hello").await;

        let first = send(&app, request("DELETE", &format!("/files/{id}"))).await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = send(&app, request("DELETE", &format!("/files/{id}"))).await;
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        let never = send(&app, request("DELETE", "/files/9999")).await;
        assert_eq!(never.status(), StatusCode::NOT_FOUND);
        assert_eq!(blob_count(&app), 0);
    }

    #[tokio::test]
    async fn drifted_blob_is_not_found_but_metadata_remains() {
        let app = test_app().await;
        let id = upload(&app, "a.txt", "text/plain", b"hello").await;
        let record = app.state.files.get(id).await.unwrap();
        std::fs::remove_file(record.path()).unwrap();

        for suffix in ["view", "download"] {
            let response = send(&app, request("GET", &format!("/files/{id}/{suffix}"))).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(json_body(response).await["success"], false);
        }

        let response = send(&app, request("GET", &format!("/files/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let app = test_app().await;
        let mut ids = Vec::new();
        for name in ["one.txt", "two.txt", "three.txt", "four.txt"] {
            ids.push(upload(&app, name, "text/plain", b"x").await);
        }
        ids.reverse();

        let listed = json_body(send(&app, request("GET", "/files")).await).await;
        let got: Vec<i64> = listed["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["id"].as_i64().unwrap())
            .collect();
        assert_eq!(listed["count"], 4);
        assert_eq!(got, ids);
    }

    #[tokio::test]
    async fn routes_are_also_served_under_api_prefix() {
        let app = test_app().await;
        let response = send(
            &app,
            upload_request("/api/files", "file", "a.txt", "text/plain", b"hi"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let listed = json_body(send(&app, request("GET", "/api/files")).await).await;
        assert_eq!(listed["count"], 1);
    }

    #[tokio::test]
    async fn non_numeric_id_and_unknown_route_use_envelope() {
        let app = test_app().await;

        let response = send(&app, request("GET", "/files/abc")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["success"], false);

        let response = send(&app, request("GET", "/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["message"], "Route /nope not found");
    }

    #[tokio::test]
    async fn health_endpoints_report_store_state() {
        let app = test_app().await;

        let response = send(&app, request("GET", "/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["database"]["status"], "connected");

        upload(&app, "a.txt", "text/plain", b"hello").await;
        let response = send(&app, request("GET", "/health/database")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["database"]["fileCount"], 1);
    }

    #[tokio::test]
    async fn closed_store_degrades_health() {
        let app = test_app().await;
        app.state.files.store.db.close().await;

        let response = send(&app, request("GET", "/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], false);

        let response = send(&app, request("GET", "/health/database")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["database"]["fileCount"].is_null());
    }

    #[tokio::test]
    async fn internal_error_detail_only_outside_production() {
        let verbose = test_app_with(1024, true).await;
        verbose.state.files.store.db.close().await;
        let body = json_body(send(&verbose, request("GET", "/files")).await).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body["error"].is_string());

        let quiet = test_app_with(1024, false).await;
        quiet.state.files.store.db.close().await;
        let response = send(&quiet, request("GET", "/files")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("error").is_none());
    }
}
