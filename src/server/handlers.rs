use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::caption::OllamaCaptioner;
use crate::pipeline::{DeckProcessor, PipelineOptions};
use crate::settings::Settings;
use crate::worker::JobPool;
use crate::{convert, session};

use super::models::{ErrorResponse, ProcessRequest, ProcessResponse, ResetRequest};
use super::state::ServerState;

const INDEX_HTML: &str = include_str!("../../assets/index.html");
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

type HandlerError = (StatusCode, Json<ErrorResponse>);

pub async fn run_server(settings: Settings, addr: String) -> Result<()> {
    let session_base = settings
        .session_dir
        .clone()
        .unwrap_or_else(|| "session_data".to_string());
    let state = Arc::new(ServerState {
        pool: JobPool::new(settings.workers),
        session_base: session_base.into(),
        settings,
    });
    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/process", post(process))
        .route("/reset", post(reset))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(axum::middleware::from_fn(cors_middleware));
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| "failed to bind server address")?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn process(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, HandlerError> {
    let file_name = sanitize_file_name(&payload.file_name)?;
    if !has_deck_extension(&file_name) {
        return Err(bad_request("expected a .ppt or .pptx upload"));
    }
    let bytes = BASE64
        .decode(payload.data_base64.as_bytes())
        .map_err(|err| bad_request(&format!("invalid base64 payload: {}", err)))?;

    // opportunistic leak avoidance, independent of job completion
    session::sweep(&state.session_base, state.settings.session_max_age());

    let session_dir =
        session::create(&state.session_base).map_err(internal_error)?;
    let session_id = session_dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();

    let timestamp = upload_timestamp().map_err(internal_error)?;
    let mut input = session_dir.join(format!("input_{}_{}", timestamp, file_name));
    std::fs::write(&input, &bytes)
        .with_context(|| format!("failed to store upload: {}", input.display()))
        .map_err(internal_error)?;

    let settings = state.settings.clone();
    let job_session_dir = session_dir.clone();
    let handle = state.pool.submit(async move {
        if convert::is_legacy_ppt(&input) {
            input = convert::convert_ppt_to_pptx(&input, &settings.soffice)?;
        }
        let captioner = OllamaCaptioner::new(&settings)?;
        let options = PipelineOptions {
            context_window: settings.context_window,
        };
        DeckProcessor::new(input, job_session_dir, &captioner, options)
            .process_file()
            .await
    });

    let output = handle
        .await
        .map_err(|err| internal_error(anyhow::anyhow!("server task failed: {}", err)))?
        .map_err(internal_error)?;

    let deck_bytes = std::fs::read(&output.deck_path)
        .with_context(|| "failed to read captioned deck")
        .map_err(internal_error)?;
    let captions_csv = std::fs::read_to_string(&output.csv_path)
        .with_context(|| "failed to read caption log")
        .map_err(internal_error)?;
    let output_name = output
        .deck_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("captioned.pptx")
        .to_string();

    Ok(Json(ProcessResponse {
        session: session_id,
        output_name,
        data_base64: BASE64.encode(&deck_bytes),
        captions_csv,
        invalid_images: output.invalid_images,
    }))
}

async fn reset(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let session_id = sanitize_file_name(&payload.session)?;
    session::remove(&state.session_base.join(session_id)).map_err(internal_error)?;
    Ok(Json(serde_json::json!({ "status": "reset" })))
}

/// Rejects path components in user-supplied names; uploads and sessions live
/// directly under their parent directory.
fn sanitize_file_name(name: &str) -> Result<String, HandlerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(bad_request("file name is required"));
    }
    let base = Path::new(name)
        .file_name()
        .and_then(|value| value.to_str())
        .ok_or_else(|| bad_request("invalid file name"))?;
    if base.starts_with('.') || base.contains("..") {
        return Err(bad_request("invalid file name"));
    }
    Ok(base.to_string())
}

fn has_deck_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".ppt") || lower.ends_with(".pptx")
}

fn upload_timestamp() -> Result<String> {
    let format = time::format_description::parse(
        "[year][month][day]_[hour][minute][second]",
    )
    .with_context(|| "invalid timestamp format")?;
    time::OffsetDateTime::now_utc()
        .format(&format)
        .with_context(|| "failed to format timestamp")
}

fn bad_request(message: &str) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn internal_error(err: anyhow::Error) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_reduced_to_their_base() {
        assert_eq!(sanitize_file_name("deck.pptx").unwrap(), "deck.pptx");
        assert_eq!(sanitize_file_name("a/b/deck.pptx").unwrap(), "deck.pptx");
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name(".hidden").is_err());
    }

    #[test]
    fn only_deck_extensions_are_accepted() {
        assert!(has_deck_extension("deck.pptx"));
        assert!(has_deck_extension("DECK.PPT"));
        assert!(!has_deck_extension("deck.pdf"));
    }
}
