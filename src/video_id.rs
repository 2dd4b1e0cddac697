use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::TranscriptError;

/// Length of a bare (URL-less) video identifier
const BARE_ID_LEN: usize = 11;

const SHORT_LINK_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];

const WATCH_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

/// First path segments after which the second segment is the video id
const ID_PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live"];

/// Canonical video identifier. Only [`resolve`] produces one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for VideoId {
    type Err = TranscriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(s)
    }
}

/// Resolve a video URL or bare identifier into a [`VideoId`].
///
/// Accepts short links (`youtu.be/<id>`), watch URLs (`?v=<id>`), the
/// `/embed/<id>`, `/v/<id>`, `/shorts/<id>` and `/live/<id>` path forms, and
/// bare 11-character identifiers. Anything else is rejected rather than
/// guessed at.
pub fn resolve(input: &str) -> Result<VideoId, TranscriptError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TranscriptError::InvalidReference("input is empty".to_string()));
    }

    if input.len() == BARE_ID_LEN && is_id_token(input) {
        return Ok(VideoId(input.to_string()));
    }

    let url = parse_url(input)
        .ok_or_else(|| TranscriptError::InvalidReference(format!("not a video URL or id: {input}")))?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

    let id = if SHORT_LINK_HOSTS.contains(&host.as_str()) {
        url.path_segments()
            .and_then(|segs| segs.filter(|s| !s.is_empty()).last())
            .map(str::to_string)
    } else if WATCH_HOSTS.contains(&host.as_str()) {
        url.query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .or_else(|| id_from_path(&url))
    } else {
        return Err(TranscriptError::InvalidReference(format!("unsupported host: {host}")));
    };

    match id {
        Some(id) if is_id_token(&id) => Ok(VideoId(id)),
        Some(id) => Err(TranscriptError::InvalidReference(format!("malformed video id: {id}"))),
        None => Err(TranscriptError::InvalidReference(format!(
            "could not extract video id from: {input}"
        ))),
    }
}

fn parse_url(input: &str) -> Option<Url> {
    match Url::parse(input) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        Ok(_) => None,
        Err(_) => Url::parse(&format!("https://{input}")).ok(),
    }
}

fn id_from_path(url: &Url) -> Option<String> {
    let mut segs = url.path_segments()?;
    let prefix = segs.next()?;
    if !ID_PATH_PREFIXES.contains(&prefix) {
        return None;
    }
    segs.next().filter(|s| !s.is_empty()).map(str::to_string)
}

fn is_id_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(input: &str) -> String {
        resolve(input).unwrap().to_string()
    }

    #[test]
    fn test_short_link_strips_query() {
        assert_eq!(id("https://youtu.be/abc123?si=xyz"), "abc123");
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        assert_eq!(id("https://www.youtube.com/watch?v=abc123&t=5s"), "abc123");
        assert_eq!(id("https://www.youtube.com/watch?feature=share&v=abc123"), "abc123");
    }

    #[test]
    fn test_embed_and_v_paths() {
        assert_eq!(id("https://www.youtube.com/embed/abc123"), "abc123");
        assert_eq!(id("https://www.youtube.com/v/abc123?version=3"), "abc123");
        assert_eq!(id("https://www.youtube-nocookie.com/embed/abc123"), "abc123");
    }

    #[test]
    fn test_shorts_and_live_paths() {
        assert_eq!(id("https://www.youtube.com/shorts/dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(id("https://youtube.com/live/dQw4w9WgXcQ?feature=share"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_bare_video_id() {
        assert_eq!(id("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(id("  dQw4w9WgXcQ  "), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_scheme_less_urls() {
        assert_eq!(id("youtu.be/abc123"), "abc123");
        assert_eq!(id("m.youtube.com/watch?v=abc123"), "abc123");
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(resolve(""), Err(TranscriptError::InvalidReference(_))));
        assert!(matches!(resolve("   "), Err(TranscriptError::InvalidReference(_))));
    }

    #[test]
    fn test_unrelated_domain() {
        assert!(matches!(
            resolve("https://vimeo.com/watch?v=abc123"),
            Err(TranscriptError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_unrecognized_youtube_paths() {
        assert!(resolve("https://www.youtube.com/").is_err());
        assert!(resolve("https://www.youtube.com/channel/UC123").is_err());
        assert!(resolve("https://youtu.be/").is_err());
    }

    #[test]
    fn test_not_an_id() {
        assert!(resolve("not-a-valid-id").is_err());
        assert!(resolve("ftp://youtube.com/watch?v=abc123").is_err());
        assert!(resolve("https://www.youtube.com/watch?v=abc%20123").is_err());
    }

    #[test]
    fn test_from_str() {
        let parsed: VideoId = "https://youtu.be/abc123".parse().unwrap();
        assert_eq!(parsed.as_str(), "abc123");
    }
}
