//! Extraction of data the platform inlines into its watch page markup.
//!
//! None of this is documented; every function here is pinned by a captured
//! page fixture so format drift shows up as a failing test.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::{CaptionTrack, TranscriptError};

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).expect("valid regex"));

static API_KEY_FALLBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"innertubeApiKey"?\s*[=:]\s*"([^"]+)""#).expect("valid regex"));

static CLIENT_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""INNERTUBE_CONTEXT_CLIENT_VERSION"\s*:\s*"([^"]+)""#).expect("valid regex")
});

static TRANSCRIPT_PARAMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""getTranscriptEndpoint"\s*:\s*\{\s*"params"\s*:\s*"([^"]+)""#).expect("valid regex")
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    name: Option<RawName>,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawName {
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<RawRun>,
}

#[derive(Debug, Deserialize)]
struct RawRun {
    text: String,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

impl From<RawCaptionTrack> for CaptionTrack {
    fn from(raw: RawCaptionTrack) -> Self {
        let display_language = raw
            .name
            .map(|n| n.simple_text.unwrap_or_else(|| n.runs.into_iter().map(|r| r.text).collect()))
            .unwrap_or_else(|| raw.language_code.clone());
        CaptionTrack {
            is_auto_generated: raw.kind.as_deref() == Some("asr"),
            language_code: raw.language_code,
            display_language,
            source_url: raw.base_url,
        }
    }
}

/// Locate the JSON array or object stored under `"key":` and return it
/// verbatim, matching brackets while skipping over string literals.
pub fn find_json_value<'a>(html: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{key}\":");
    let start = html.find(&needle)? + needle.len();
    let rest = html[start..].trim_start();

    let open = rest.chars().next()?;
    let close = match open {
        '[' => ']',
        '{' => '}',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(&rest[..=i]);
            }
        }
    }
    None
}

/// Caption tracks embedded in the player response.
///
/// Fails with `NoCaptionTracks` when the page has no (or an empty) track
/// list, and `MalformedPayload` when the list is present but unreadable.
pub fn caption_tracks(html: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
    let raw = find_json_value(html, "captionTracks").ok_or(TranscriptError::NoCaptionTracks)?;
    let tracks: Vec<RawCaptionTrack> = serde_json::from_str(raw)
        .map_err(|e| TranscriptError::MalformedPayload(format!("captionTracks: {e}")))?;
    if tracks.is_empty() {
        return Err(TranscriptError::NoCaptionTracks);
    }
    Ok(tracks.into_iter().map(CaptionTrack::from).collect())
}

/// Whether the page carries player data at all; bot-check and consent pages
/// don't.
pub fn has_player_response(html: &str) -> bool {
    html.contains("ytInitialPlayerResponse") || html.contains("\"playabilityStatus\"")
}

/// The reason the player refuses to play the video, if it does.
pub fn playability_error(html: &str) -> Option<String> {
    let raw = find_json_value(html, "playabilityStatus")?;
    let status: PlayabilityStatus = serde_json::from_str(raw).ok()?;
    if status.status == "OK" {
        return None;
    }
    Some(status.reason.unwrap_or(status.status))
}

pub fn api_key(html: &str) -> Option<String> {
    API_KEY_RE
        .captures(html)
        .or_else(|| API_KEY_FALLBACK_RE.captures(html))
        .map(|caps| caps[1].to_string())
}

pub fn client_version(html: &str) -> Option<String> {
    CLIENT_VERSION_RE.captures(html).map(|caps| caps[1].to_string())
}

/// Opaque `params` token the page uses to open its transcript panel
pub fn transcript_params(html: &str) -> Option<String> {
    TRANSCRIPT_PARAMS_RE.captures(html).map(|caps| caps[1].to_string())
}
