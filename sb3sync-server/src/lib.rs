//! sb3sync Server
//!
//! HTTP endpoint that accepts an uploaded packed project and disassembles it
//! into the server's configured output root.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sb3sync_core::{disassemble, is_project_archive, unpack, DisassembleOptions, DisassemblyReport};
use serde::Deserialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Structured root every upload is disassembled into
    pub output_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "127.0.0.1".to_string(),
            output_root: PathBuf::from("."),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub output_root: PathBuf,

    /// Serializes conversions into `output_root`
    pub convert_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(output_root: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            output_root,
            convert_lock: Arc::new(Mutex::new(())),
        })
    }
}

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_home))
        .route("/health", get(handle_health))
        .route("/api/upload", post(handle_upload))
        .with_state(state)
        // Projects with embedded media get large
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
}

async fn handle_home() -> impl IntoResponse {
    Json(serde_json::json!({
        "msg": "sb3sync upload server, POST a project to /api/upload"
    }))
}

/// Health check endpoint
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Query parameters for an upload
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    /// Reset the structured subtrees before writing
    #[serde(default)]
    pub clear: bool,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// Accept a multipart `file` field holding a `.sb3` / `.pmp` archive
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((file_name, bytes)),
                    Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
                }
            }
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
        }
    }

    let Some((file_name, bytes)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No file found");
    };
    if !is_project_archive(std::path::Path::new(&file_name)) {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a .sb3 or .pmp project", file_name),
        );
    }

    tracing::info!("Received upload {} ({} bytes)", file_name, bytes.len());

    let guard = state.convert_lock.clone().lock_owned().await;
    let output_root = state.output_root.clone();
    let clear = params.clear;

    let result = spawn_conversion(guard, move || convert_upload(&bytes, &output_root, clear)).await;

    match result {
        Ok(Ok(report)) => {
            tracing::info!("Upload {} disassembled into {}", file_name, state.output_root.display());
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "msg": format!("Extracted {} to {}", file_name, state.output_root.display()),
                    "report": report,
                })),
            )
        }
        Ok(Err(e)) => {
            tracing::error!("Upload {} failed: {:#}", file_name, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
        Err(e) => {
            tracing::error!("Conversion task panicked: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Conversion task failed")
        }
    }
}

/// Run `work` on a blocking thread that holds the conversion lock until done
///
/// The guard lives in the task, so dropping the request does not release it
/// while the conversion is still writing.
pub fn spawn_conversion<T, F>(guard: OwnedMutexGuard<()>, work: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        work()
    })
}

/// Unpack uploaded archive bytes into a scratch directory and disassemble them
fn convert_upload(bytes: &[u8], output_root: &std::path::Path, clear: bool) -> anyhow::Result<DisassemblyReport> {
    use anyhow::Context;

    let scratch = tempfile::Builder::new()
        .prefix("sb3sync-upload-")
        .tempdir()
        .context("Failed to create scratch directory")?;
    let archive_path = scratch.path().join("upload.sb3");
    std::fs::write(&archive_path, bytes).context("Failed to store upload")?;

    let build_dir = scratch.path().join("builddir");
    unpack(&archive_path, &build_dir).context("Failed to unpack upload")?;

    let report = disassemble(output_root, &build_dir, &DisassembleOptions { clear })
        .context("Failed to disassemble upload")?;
    Ok(report)
}

/// Start the server
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(config.output_root.clone());
    let router = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(
        "sb3sync server listening on {}, writing to {}",
        addr,
        config.output_root.display()
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::io::{Cursor, Write};
    use tower::ServiceExt;

    const BOUNDARY: &str = "sb3syncboundary";

    fn project_zip() -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("project.json", options).unwrap();
            let manifest = serde_json::json!({
                "targets": [
                    {"isStage": true, "name": "Stage", "id": "s"},
                    {"isStage": false, "name": "Cat", "id": "c",
                     "costumes": [{"assetId": "a", "md5ext": "abc123.png"}]}
                ],
                "monitors": []
            });
            zip.write_all(manifest.to_string().as_bytes()).unwrap();
            zip.start_file("abc123.png", options).unwrap();
            zip.write_all(b"png").unwrap();
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        write!(
            body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .unwrap();
        body.extend_from_slice(content);
        write!(body, "\r\n--{BOUNDARY}--\r\n").unwrap();
        body
    }

    fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::TempDir::new().unwrap();
        let router = create_router(AppState::new(dir.path().to_path_buf()));
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_disassembles_into_output_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let router = create_router(AppState::new(dir.path().to_path_buf()));

        let body = multipart_body("file", "game.sb3", &project_zip());
        let response = router.oneshot(upload_request("/api/upload", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["report"]["sprites"], 1);
        assert!(dir.path().join("stage/stage_meta.json").is_file());
        assert!(dir.path().join("sprites/Cat/costumes/abc123.png").is_file());
    }

    #[tokio::test]
    async fn test_upload_with_clear() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sprites/Stale")).unwrap();
        let router = create_router(AppState::new(dir.path().to_path_buf()));

        let body = multipart_body("file", "game.pmp", &project_zip());
        let response = router
            .oneshot(upload_request("/api/upload?clear=true", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!dir.path().join("sprites/Stale").exists());
        assert!(dir.path().join("sprites/Cat").is_dir());
    }

    #[tokio::test]
    async fn test_lock_held_until_conversion_finishes() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(dir.path().to_path_buf());
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let guard = state.convert_lock.clone().lock_owned().await;
        let handle = spawn_conversion(guard, move || {
            release_rx.recv().unwrap();
        });
        // Dropping the handle detaches the task, as when a request is cancelled
        drop(handle);

        assert!(state.convert_lock.try_lock().is_err());

        release_tx.send(()).unwrap();
        let released = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            state.convert_lock.lock(),
        )
        .await;
        assert!(released.is_ok());
    }

    #[tokio::test]
    async fn test_upload_cancelled_while_waiting_does_not_convert() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(dir.path().to_path_buf());
        let router = create_router(state.clone());

        // Held lock makes the handler wait, then the request is abandoned
        let held = state.convert_lock.clone().lock_owned().await;
        let body = multipart_body("file", "game.sb3", &project_zip());
        let request = router.oneshot(upload_request("/api/upload", body));
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(50), request).await;
        assert!(timed_out.is_err());
        drop(held);

        assert!(state.convert_lock.try_lock().is_ok());
        assert!(!dir.path().join("sprites").exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_wrong_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let router = create_router(AppState::new(dir.path().to_path_buf()));

        let body = multipart_body("file", "notes.txt", b"hello");
        let response = router.oneshot(upload_request("/api/upload", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_requires_file_field() {
        let dir = tempfile::TempDir::new().unwrap();
        let router = create_router(AppState::new(dir.path().to_path_buf()));

        let body = multipart_body("other", "game.sb3", &project_zip());
        let response = router.oneshot(upload_request("/api/upload", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No file found");
    }

    #[tokio::test]
    async fn test_upload_corrupt_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let router = create_router(AppState::new(dir.path().to_path_buf()));

        let body = multipart_body("file", "game.sb3", b"not a zip");
        let response = router.oneshot(upload_request("/api/upload", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
