use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use eyre::{Result, WrapErr};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_LANG;
use crate::service::{EXAMPLE_VIDEOS, Service, ServiceError};
use crate::study::{DEFAULT_FLASHCARDS, DEFAULT_QUIZ_QUESTIONS, Flashcard, QuizQuestion};

type AppState = Arc<Service>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub video_url: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub summary: String,
    pub language: String,
    pub video_id: String,
    pub video_title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    pub summary: Option<String>,
    pub num_questions: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct QuizResponse {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardsRequest {
    pub summary: Option<String>,
    pub num_cards: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FlashcardsResponse {
    pub flashcards: Vec<Flashcard>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_videos: Option<&'static [&'static str]>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: message.into(),
                details: None,
                suggestion: None,
                example_videos: None,
            },
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {err}");
        } else {
            info!("Request rejected ({}): {err}", err.error_type());
        }

        Self {
            status,
            body: ErrorBody {
                error: err.message(),
                details: err.details(),
                suggestion: err.suggestion(),
                example_videos: err.is_no_transcript().then_some(EXAMPLE_VIDEOS),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub fn router(service: Arc<Service>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ping", get(ping))
        .route("/summarize", post(summarize))
        .route("/generate-quiz", post(generate_quiz))
        .route("/generate-flashcards", post(generate_flashcards))
        .with_state(service)
}

/// Listen on all interfaces until Ctrl+C
pub async fn serve(service: Service, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding to {addr}"))?;
    info!("Listening on http://{addr}");
    eprintln!("Listening on http://{addr}");

    axum::serve(listener, router(Arc::new(service)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("running HTTP server")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {e}");
    }
    info!("Shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "message": "API is running"}))
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "pong"}))
}

async fn summarize(
    State(service): State<AppState>,
    payload: std::result::Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<SummarizeResponse> {
    let Json(req) = payload?;
    let video_url = req
        .video_url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("videoUrl is required"))?;
    let language = req.language.unwrap_or_else(|| DEFAULT_LANG.to_string());
    info!("POST /summarize url={video_url} language={language}");

    let summary = service.summarize(&video_url, &language).await?;
    Ok(Json(SummarizeResponse {
        summary: summary.summary,
        language: summary.language,
        video_id: summary.video_id,
        video_title: summary.video_title,
    }))
}

async fn generate_quiz(
    State(service): State<AppState>,
    payload: std::result::Result<Json<QuizRequest>, JsonRejection>,
) -> ApiResult<QuizResponse> {
    let Json(req) = payload?;
    let summary = req.summary.unwrap_or_default();
    let n = req.num_questions.unwrap_or(DEFAULT_QUIZ_QUESTIONS);

    let questions = service.quiz(&summary, n).await?;
    Ok(Json(QuizResponse { questions }))
}

async fn generate_flashcards(
    State(service): State<AppState>,
    payload: std::result::Result<Json<FlashcardsRequest>, JsonRejection>,
) -> ApiResult<FlashcardsResponse> {
    let Json(req) = payload?;
    let summary = req.summary.unwrap_or_default();
    let n = req.num_cards.unwrap_or(DEFAULT_FLASHCARDS);

    let flashcards = service.flashcards(&summary, n).await?;
    Ok(Json(FlashcardsResponse { flashcards }))
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;
    use crate::TranscriptError;
    use crate::service::testing::service;
    use crate::youtube::Endpoints;

    async fn body_json(resp: Response) -> (StatusCode, Value) {
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn state(source: std::result::Result<&str, TranscriptError>, reply: Option<&'static str>) -> AppState {
        Arc::new(service(source, reply, Endpoints::new("http://127.0.0.1:9")))
    }

    fn summarize_request(url: Option<&str>) -> std::result::Result<Json<SummarizeRequest>, JsonRejection> {
        Ok(Json(SummarizeRequest {
            video_url: url.map(str::to_string),
            language: None,
        }))
    }

    #[tokio::test]
    async fn test_health_and_ping() {
        let Json(health) = health().await;
        assert_eq!(health, serde_json::json!({"status": "ok", "message": "API is running"}));
        let Json(pong) = ping().await;
        assert_eq!(pong["message"], "pong");
    }

    #[tokio::test]
    async fn test_summarize_success() {
        let state = state(Ok("We're no strangers to love"), Some("-Heading"));
        let resp = summarize(State(state), summarize_request(Some("https://youtu.be/dQw4w9WgXcQ")))
            .await
            .into_response();

        let (status, body) = body_json(resp).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "-Heading");
        assert_eq!(body["language"], "en");
        assert_eq!(body["videoId"], "dQw4w9WgXcQ");
        assert_eq!(body["videoTitle"], "YouTube Video (dQw4w9WgXcQ)");
    }

    #[tokio::test]
    async fn test_summarize_missing_url() {
        let state = state(Ok("unused transcript"), Some("unused"));
        let resp = summarize(State(state), summarize_request(None)).await.into_response();

        let (status, body) = body_json(resp).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "videoUrl is required");
    }

    #[tokio::test]
    async fn test_summarize_no_captions() {
        let state = state(Err(TranscriptError::NoCaptionTracks), Some("unused"));
        let resp = summarize(State(state), summarize_request(Some("dQw4w9WgXcQ")))
            .await
            .into_response();

        let (status, body) = body_json(resp).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("does not have subtitles"));
        assert!(body["suggestion"].is_string());
        assert_eq!(body["example_videos"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_summarize_upstream_failure() {
        let state = state(Err(TranscriptError::Transport("connection reset".to_string())), Some("unused"));
        let resp = summarize(State(state), summarize_request(Some("dQw4w9WgXcQ")))
            .await
            .into_response();

        let (status, body) = body_json(resp).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "transport error: connection reset");
        assert!(body.get("example_videos").is_none());
    }

    #[tokio::test]
    async fn test_generate_quiz() {
        let reply = r#"[{"question": "q", "options": ["a", "b", "c", "d"], "correctAnswer": 1}]"#;
        let state = state(Ok("unused transcript"), Some(reply));
        let req = Ok(Json(QuizRequest {
            summary: Some("A summary.".to_string()),
            num_questions: None,
        }));
        let resp = generate_quiz(State(state), req).await.into_response();

        let (status, body) = body_json(resp).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["questions"][0]["correctAnswer"], 1);
    }

    #[tokio::test]
    async fn test_generate_flashcards_requires_summary() {
        let state = state(Ok("unused transcript"), Some("[]"));
        let req = Ok(Json(FlashcardsRequest {
            summary: None,
            num_cards: Some(3),
        }));
        let resp = generate_flashcards(State(state), req).await.into_response();

        let (status, body) = body_json(resp).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Summary is required");
    }

    #[test]
    fn test_request_field_names() {
        let req: SummarizeRequest =
            serde_json::from_str(r#"{"videoUrl": "https://youtu.be/x", "language": "vi"}"#).unwrap();
        assert_eq!(req.video_url.as_deref(), Some("https://youtu.be/x"));
        assert_eq!(req.language.as_deref(), Some("vi"));

        let req: QuizRequest = serde_json::from_str(r#"{"summary": "s", "numQuestions": 3}"#).unwrap();
        assert_eq!(req.num_questions, Some(3));
    }
}
