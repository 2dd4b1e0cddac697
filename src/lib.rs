pub mod chain;
pub mod config;
pub mod error;
pub mod generate;
pub mod identity;
pub mod job;
pub mod output;
pub mod server;
pub mod service;
pub mod study;
pub mod summarize;
pub mod video_id;
pub mod youtube;

use serde::Serialize;

pub use error::TranscriptError;
pub use video_id::{VideoId, resolve};

/// Shortest transcript (in characters) worth handing to a summarizer
pub const MIN_TRANSCRIPT_CHARS: usize = 10;

/// A single captioned segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// One available caption track for a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionTrack {
    pub language_code: String,
    pub display_language: String,
    pub is_auto_generated: bool,
    pub source_url: String,
}

/// What a caption source returned: the flattened text and the language it is
/// actually in, which may differ from the one requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub text: String,
    pub language: String,
}

/// Join segment texts in source order with single spaces.
///
/// Each text is trimmed and empty ones are skipped, so the result never has
/// leading, trailing or doubled separators.
pub fn join_segments<I, S>(texts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for text in texts {
        let text = text.as_ref().trim();
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(text);
    }
    out
}

/// Whether a transcript is long enough to be summarized
pub fn is_usable(text: &str) -> bool {
    text.trim().chars().count() >= MIN_TRANSCRIPT_CHARS
}
