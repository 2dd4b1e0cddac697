//! The summarization pipeline shared by the HTTP server and file jobs:
//! resolve, acquire, validate, summarize.

use std::future::Future;
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::chain::{Acquired, TranscriptChain};
use crate::config::Config;
use crate::generate::{self, TextGenerator};
use crate::study::{self, Flashcard, QuizQuestion};
use crate::youtube::{Endpoints, oembed};
use crate::{TranscriptError, is_usable, resolve, summarize};

const NO_TRANSCRIPT_MESSAGE: &str =
    "This video does not have subtitles/captions available. Please try a different video that has captions enabled.";
const NO_TRANSCRIPT_DETAILS: &str = "To summarize a video, it must have subtitles or closed captions enabled.";
const NO_TRANSCRIPT_SUGGESTION: &str = "YouTube requires videos to have captions/subtitles for summarization to work.";
const EMPTY_TRANSCRIPT_MESSAGE: &str = "Retrieved transcript is too short to generate a meaningful summary.";
const EMPTY_TRANSCRIPT_SUGGESTION: &str = "Please try a video with more substantial captions.";

/// Videos known to carry good captions, offered when one doesn't
pub const EXAMPLE_VIDEOS: &[&str] = &[
    "https://www.youtube.com/watch?v=LXb3EKWsInQ",
    "https://www.youtube.com/watch?v=W0LHTWG-UmQ",
    "https://www.youtube.com/watch?v=fKopy74weus",
];

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error("generation failed: {0}")]
    Generation(eyre::Report),

    #[error("request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
}

impl ServiceError {
    /// The video simply has no usable captions
    pub fn is_no_transcript(&self) -> bool {
        matches!(self, ServiceError::Transcript(TranscriptError::NoTranscriptAvailable(_)))
    }

    /// A transcript was found but is too short or empty
    pub fn is_empty_transcript(&self) -> bool {
        self.is_user_actionable() && !self.is_no_transcript()
    }

    /// The video can't be summarized and the caller should try another; a
    /// handled outcome rather than a failure of this service.
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, ServiceError::Transcript(e) if e.is_user_actionable())
    }

    /// HTTP status for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) | ServiceError::Transcript(TranscriptError::InvalidReference(_)) => 400,
            _ if self.is_user_actionable() => 400,
            _ => 500,
        }
    }

    /// Stable name reported as `error_type`
    pub fn error_type(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "BadRequest",
            ServiceError::Transcript(e) => e.kind(),
            ServiceError::Generation(_) => "GenerationError",
            ServiceError::Timeout(_) => "Timeout",
        }
    }

    /// User-facing message
    pub fn message(&self) -> String {
        if self.is_no_transcript() {
            NO_TRANSCRIPT_MESSAGE.to_string()
        } else if self.is_empty_transcript() {
            EMPTY_TRANSCRIPT_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            ServiceError::Transcript(TranscriptError::NoTranscriptAvailable(_)) => {
                Some(NO_TRANSCRIPT_DETAILS.to_string())
            }
            ServiceError::Generation(report) => Some(format!("{report:#}")),
            _ => None,
        }
    }

    pub fn suggestion(&self) -> Option<&'static str> {
        if self.is_no_transcript() {
            Some(NO_TRANSCRIPT_SUGGESTION)
        } else if self.is_empty_transcript() {
            Some(EMPTY_TRANSCRIPT_SUGGESTION)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub language: String,
    pub summary: String,
    pub video_title: String,
}

pub struct Service {
    client: reqwest::Client,
    chain: TranscriptChain,
    generator: Box<dyn TextGenerator>,
    endpoints: Endpoints,
    request_timeout: Duration,
    summary_max_tokens: u32,
}

impl Service {
    /// Build the production service; fails when the configured model has no
    /// API key.
    pub fn new(config: &Config) -> eyre::Result<Self> {
        let client = config.http_client()?;
        let chain = TranscriptChain::youtube(client.clone(), config);
        let generator = generate::from_config(client.clone(), config, config.model())?;
        Ok(Self::from_parts(config, client, chain, generator, Endpoints::default()))
    }

    pub fn from_parts(
        config: &Config,
        client: reqwest::Client,
        chain: TranscriptChain,
        generator: Box<dyn TextGenerator>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            client,
            chain,
            generator,
            endpoints,
            request_timeout: config.request_timeout(),
            summary_max_tokens: config.summary_max_tokens(),
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Request exceeded {:?}", self.request_timeout);
                Err(ServiceError::Timeout(self.request_timeout))
            }
        }
    }

    /// Resolve a reference and acquire a usable transcript for it
    async fn acquire(&self, reference: &str, lang: &str) -> Result<Acquired, ServiceError> {
        let video_id = resolve(reference)?;
        let acquired = self.chain.acquire(&video_id, lang).await?;
        if !is_usable(&acquired.text) {
            return Err(TranscriptError::TranscriptTooShort {
                chars: acquired.text.trim().chars().count(),
            }
            .into());
        }
        Ok(acquired)
    }

    /// Full pipeline: transcript, summary and best-effort title
    pub async fn summarize(&self, reference: &str, lang: &str) -> Result<VideoSummary, ServiceError> {
        self.bounded(async {
            let acquired = self.acquire(reference, lang).await?;
            info!(
                "Summarizing {} ({} chars via {}, lang={})",
                acquired.video_id,
                acquired.text.chars().count(),
                acquired.strategy,
                acquired.language
            );

            let summary = summarize::summarize(self.generator.as_ref(), &acquired.text, self.summary_max_tokens)
                .await
                .map_err(ServiceError::Generation)?;
            let video_title = oembed::title_or_placeholder(&self.client, &self.endpoints, &acquired.video_id).await;

            Ok(VideoSummary {
                video_id: acquired.video_id.to_string(),
                language: acquired.language,
                summary,
                video_title,
            })
        })
        .await
    }

    pub async fn quiz(&self, summary: &str, n: usize) -> Result<Vec<QuizQuestion>, ServiceError> {
        if summary.trim().is_empty() {
            return Err(ServiceError::BadRequest("Summary is required".to_string()));
        }
        self.bounded(async {
            study::generate_quiz(self.generator.as_ref(), summary, n)
                .await
                .map_err(ServiceError::Generation)
        })
        .await
    }

    pub async fn flashcards(&self, summary: &str, n: usize) -> Result<Vec<Flashcard>, ServiceError> {
        if summary.trim().is_empty() {
            return Err(ServiceError::BadRequest("Summary is required".to_string()));
        }
        self.bounded(async {
            study::generate_flashcards(self.generator.as_ref(), summary, n)
                .await
                .map_err(ServiceError::Generation)
        })
        .await
    }
}
