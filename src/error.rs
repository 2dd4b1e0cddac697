use std::fmt;

use thiserror::Error;

/// Phrases the platform (and caption libraries built on it) use when a video
/// genuinely has no captions. Matched case-insensitively.
const NO_CAPTION_PHRASES: &[&str] = &[
    "subtitles are disabled",
    "transcripts are disabled",
    "no transcripts available",
    "no transcript available",
    "does not have available subtitles",
    "could not retrieve a transcript",
];

/// Classified failures of transcript acquisition.
///
/// Strategy-level variants feed the chain's next-step decision; only
/// `InvalidReference`, `NoTranscriptAvailable`, `Transport` and `Unknown`
/// are ever returned by the chain itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("invalid video reference: {0}")]
    InvalidReference(String),

    #[error("no captions available in language '{lang}'")]
    CaptionsUnavailable { lang: String },

    #[error("no caption tracks found in watch page")]
    NoCaptionTracks,

    #[error("no caption track for language '{lang}'")]
    LanguageNotFound { lang: String },

    #[error("could not extract InnerTube API key from watch page")]
    ApiKeyNotFound,

    #[error("transcript endpoint returned no segments")]
    EmptyTranscriptResponse,

    #[error("transcript too short ({chars} characters)")]
    TranscriptTooShort { chars: usize },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("all attempts failed: {}", join_failures(.0))]
    AllAttemptsFailed(Vec<ProfileFailure>),

    #[error("no transcript available for this video: {0}")]
    NoTranscriptAvailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Unknown(String),
}

impl TranscriptError {
    /// Stable name used in job payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TranscriptError::InvalidReference(_) => "InvalidReference",
            TranscriptError::CaptionsUnavailable { .. } => "CaptionsUnavailable",
            TranscriptError::NoCaptionTracks => "NoCaptionTracks",
            TranscriptError::LanguageNotFound { .. } => "LanguageNotFound",
            TranscriptError::ApiKeyNotFound => "ApiKeyNotFound",
            TranscriptError::EmptyTranscriptResponse => "EmptyTranscriptResponse",
            TranscriptError::TranscriptTooShort { .. } => "EmptyTranscript",
            TranscriptError::MalformedPayload(_) => "MalformedPayload",
            TranscriptError::AllAttemptsFailed(_) => "AllAttemptsFailed",
            TranscriptError::NoTranscriptAvailable(_) => "NoTranscriptAvailable",
            TranscriptError::Transport(_) => "TransportError",
            TranscriptError::Unknown(_) => "Unknown",
        }
    }

    /// Whether this failure is evidence that the video has no usable captions
    /// (as opposed to the platform blocking or erroring).
    pub fn indicates_no_captions(&self) -> bool {
        match self {
            TranscriptError::NoCaptionTracks
            | TranscriptError::EmptyTranscriptResponse
            | TranscriptError::TranscriptTooShort { .. }
            | TranscriptError::NoTranscriptAvailable(_) => true,
            TranscriptError::AllAttemptsFailed(failures) => failures.iter().any(|f| f.error.indicates_no_captions()),
            other => mentions_missing_captions(&other.to_string()),
        }
    }

    /// Network or HTTP failure; an aggregate counts only when every one of
    /// its attempts was.
    pub fn is_transport(&self) -> bool {
        match self {
            TranscriptError::Transport(_) => true,
            TranscriptError::AllAttemptsFailed(failures) => {
                !failures.is_empty() && failures.iter().all(|f| f.error.is_transport())
            }
            _ => false,
        }
    }

    /// Outcomes callers treat as "this video can't be summarized, try another".
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            TranscriptError::NoTranscriptAvailable(_)
                | TranscriptError::EmptyTranscriptResponse
                | TranscriptError::TranscriptTooShort { .. }
        )
    }
}

/// One failed identity profile inside an `AllAttemptsFailed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFailure {
    pub profile: String,
    pub error: TranscriptError,
}

impl ProfileFailure {
    pub fn new(profile: impl Into<String>, error: TranscriptError) -> Self {
        Self {
            profile: profile.into(),
            error,
        }
    }
}

impl fmt::Display for ProfileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.profile, self.error)
    }
}

fn join_failures(failures: &[ProfileFailure]) -> String {
    failures.iter().map(ProfileFailure::to_string).collect::<Vec<_>>().join("; ")
}

impl From<reqwest::Error> for TranscriptError {
    fn from(e: reqwest::Error) -> Self {
        TranscriptError::Transport(e.to_string())
    }
}

/// Known "this video has no captions" phrasing
pub fn mentions_missing_captions(message: &str) -> bool {
    let lower = message.to_lowercase();
    NO_CAPTION_PHRASES.iter().any(|p| lower.contains(p))
}
