//! One-shot file jobs: read a JSON request, write a JSON result.
//!
//! Failures are written to the output file as `{error, error_type, ...}`.
//! The exit code is 0 on success and when the video simply has no usable
//! transcript (a handled outcome), 1 otherwise.

use std::path::Path;

use eyre::{Result, WrapErr};
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DEFAULT_LANG;
use crate::resolve;
use crate::service::{Service, ServiceError};
use crate::study::{DEFAULT_FLASHCARDS, DEFAULT_QUIZ_QUESTIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum JobKind {
    Summarize,
    Quiz,
    Flashcards,
}

#[derive(Debug, Deserialize)]
struct SummarizeInput {
    url: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuizInput {
    summary: Option<String>,
    num_questions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FlashcardsInput {
    summary: Option<String>,
    num_cards: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: String,
    error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_id: Option<String>,
}

/// What a job writes and how the process should exit
#[derive(Debug)]
pub struct JobResult {
    pub payload: Value,
    pub exit_code: i32,
}

impl JobResult {
    fn success<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(payload) => Self { payload, exit_code: 0 },
            Err(e) => Self::failure(format!("could not serialize result: {e}"), "SerializationError"),
        }
    }

    fn failure(message: impl Into<String>, error_type: &str) -> Self {
        Self::error(
            ErrorPayload {
                error: message.into(),
                error_type: error_type.to_string(),
                suggestion: None,
                video_id: None,
            },
            1,
        )
    }

    fn error(payload: ErrorPayload, exit_code: i32) -> Self {
        Self {
            payload: serde_json::to_value(&payload).unwrap_or_else(|_| serde_json::json!({"error": payload.error})),
            exit_code,
        }
    }

    fn from_service_error(err: ServiceError, video_id: Option<String>) -> Self {
        let handled = err.is_user_actionable();
        if handled {
            warn!("Job finished without a transcript: {err}");
        } else {
            error!("Job failed: {err}");
        }
        Self::error(
            ErrorPayload {
                error: err.message(),
                error_type: err.error_type().to_string(),
                suggestion: err.suggestion().map(str::to_string),
                video_id,
            },
            if handled { 0 } else { 1 },
        )
    }
}

/// Run one job end to end and return the process exit code.
///
/// `service` is the already-built service, or the configuration error that
/// prevented building it.
pub async fn run(kind: JobKind, input: &Path, output: &Path, service: Result<Service>) -> i32 {
    info!("Running {kind:?} job: {} -> {}", input.display(), output.display());

    let result = match service {
        Ok(service) => execute(kind, input, &service).await,
        Err(e) => JobResult::failure(format!("API configuration error: {e:#}"), "ConfigurationError"),
    };

    match write_output(output, &result.payload) {
        Ok(()) => result.exit_code,
        Err(e) => {
            error!("{e:#}");
            1
        }
    }
}

/// Run a job against a service, without touching the output file
pub async fn execute(kind: JobKind, input: &Path, service: &Service) -> JobResult {
    match kind {
        JobKind::Summarize => summarize(input, service).await,
        JobKind::Quiz => quiz(input, service).await,
        JobKind::Flashcards => flashcards(input, service).await,
    }
}

async fn summarize(input: &Path, service: &Service) -> JobResult {
    let req: SummarizeInput = match read_input(input) {
        Ok(req) => req,
        Err(e) => return JobResult::failure(format!("{e:#}"), "InvalidInput"),
    };
    let Some(url) = req.url.filter(|u| !u.trim().is_empty()) else {
        return JobResult::failure("URL is required", "BadRequest");
    };
    let language = req.language.unwrap_or_else(|| DEFAULT_LANG.to_string());

    match service.summarize(&url, &language).await {
        Ok(summary) => JobResult::success(&summary),
        Err(e) => {
            let video_id = resolve(&url).ok().map(|id| id.to_string());
            JobResult::from_service_error(e, video_id)
        }
    }
}

async fn quiz(input: &Path, service: &Service) -> JobResult {
    let req: QuizInput = match read_input(input) {
        Ok(req) => req,
        Err(e) => return JobResult::failure(format!("{e:#}"), "InvalidInput"),
    };
    let summary = req.summary.unwrap_or_default();
    let n = req.num_questions.unwrap_or(DEFAULT_QUIZ_QUESTIONS);

    match service.quiz(&summary, n).await {
        Ok(questions) => JobResult::success(&serde_json::json!({ "questions": questions })),
        Err(e) => JobResult::from_service_error(e, None),
    }
}

async fn flashcards(input: &Path, service: &Service) -> JobResult {
    let req: FlashcardsInput = match read_input(input) {
        Ok(req) => req,
        Err(e) => return JobResult::failure(format!("{e:#}"), "InvalidInput"),
    };
    let summary = req.summary.unwrap_or_default();
    let n = req.num_cards.unwrap_or(DEFAULT_FLASHCARDS);

    match service.flashcards(&summary, n).await {
        Ok(flashcards) => JobResult::success(&serde_json::json!({ "flashcards": flashcards })),
        Err(e) => JobResult::from_service_error(e, None),
    }
}

fn read_input<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read input file: {}", path.display()))?;
    serde_json::from_str(&content).wrap_err_with(|| format!("failed to parse input file: {}", path.display()))
}

fn write_output(path: &Path, payload: &Value) -> Result<()> {
    let content = serde_json::to_string(payload)?;
    std::fs::write(path, content).wrap_err_with(|| format!("failed to write output file: {}", path.display()))
}
