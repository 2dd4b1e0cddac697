use async_trait::async_trait;
use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use url::Url;

use super::{CaptionSource, Endpoints, TrackLister, read_body};
use crate::identity::IdentityProvider;
use crate::{CaptionTrack, Fetched, Segment, TranscriptError, VideoId, join_segments};

/// The platform's timed-text captions surface: one request per language,
/// plus a track listing used for language negotiation.
pub struct TimedTextFetcher {
    client: reqwest::Client,
    endpoints: Endpoints,
    identity: IdentityProvider,
}

impl TimedTextFetcher {
    pub fn new(client: reqwest::Client, endpoints: Endpoints, identity: IdentityProvider) -> Self {
        Self {
            client,
            endpoints,
            identity,
        }
    }

    async fn get(&self, query: &[(&str, &str)]) -> Result<String, TranscriptError> {
        let resp = self
            .client
            .get(self.endpoints.timedtext())
            .query(query)
            .header("User-Agent", self.identity.user_agent())
            .send()
            .await?;
        read_body(resp).await
    }
}

#[async_trait]
impl CaptionSource for TimedTextFetcher {
    fn name(&self) -> &'static str {
        "timedtext"
    }

    async fn fetch(&self, video_id: &VideoId, lang: &str) -> Result<Fetched, TranscriptError> {
        debug!("Requesting timed-text captions: v={video_id} lang={lang}");
        let xml = self.get(&[("v", video_id.as_str()), ("lang", lang)]).await?;
        captions(&xml, lang)
    }

    /// Request the listed track by its own URL, so `kind=asr` and named
    /// tracks are addressed exactly as the listing described them.
    async fn fetch_track(&self, video_id: &VideoId, track: &CaptionTrack) -> Result<Fetched, TranscriptError> {
        debug!(
            "Requesting listed track for {video_id}: lang={} auto={}",
            track.language_code, track.is_auto_generated
        );
        let resp = self
            .client
            .get(&track.source_url)
            .header("User-Agent", self.identity.user_agent())
            .send()
            .await?;
        let xml = read_body(resp).await?;
        captions(&xml, &track.language_code)
    }
}

fn captions(xml: &str, lang: &str) -> Result<Fetched, TranscriptError> {
    let unavailable = || TranscriptError::CaptionsUnavailable { lang: lang.to_string() };
    if xml.trim().is_empty() {
        return Err(unavailable());
    }

    let segments = parse_caption_xml(xml)?;
    let text = join_segments(segments.iter().map(|s| s.text.as_str()));
    if text.is_empty() {
        return Err(unavailable());
    }

    Ok(Fetched {
        text,
        language: lang.to_string(),
    })
}

#[async_trait]
impl TrackLister for TimedTextFetcher {
    async fn list_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>, TranscriptError> {
        debug!("Listing caption tracks for {video_id}");
        let xml = self.get(&[("type", "list"), ("v", video_id.as_str())]).await?;
        parse_track_list(&xml, &self.endpoints.timedtext(), video_id)
    }
}

/// Parse a `<transcript><text start=".." dur="..">..</text></transcript>`
/// payload, in document order. Cues without a `start` are ignored.
pub fn parse_caption_xml(xml: &str) -> Result<Vec<Segment>, TranscriptError> {
    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut timing: Option<(f64, f64)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => timing = cue_timing(e),
            Ok(Event::Text(ref e)) => {
                let Some((start, duration)) = timing.take() else {
                    continue;
                };
                let raw = e
                    .unescape()
                    .map_err(|err| TranscriptError::MalformedPayload(format!("caption text: {err}")))?;
                let text = html_escape::decode_html_entities(&raw).trim().to_string();
                if !text.is_empty() {
                    segments.push(Segment { text, start, duration });
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => timing = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TranscriptError::MalformedPayload(format!("caption XML: {e}"))),
            _ => {}
        }
    }

    Ok(segments)
}

fn cue_timing(e: &BytesStart<'_>) -> Option<(f64, f64)> {
    let number = |name: &[u8]| {
        e.attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == name)
            .and_then(|attr| String::from_utf8_lossy(&attr.value).parse::<f64>().ok())
    };
    number(b"start").map(|start| (start, number(b"dur").unwrap_or(0.0)))
}

/// Parse a `type=list` response into caption tracks, in document order.
pub fn parse_track_list(xml: &str, timedtext_url: &str, video_id: &VideoId) -> Result<Vec<CaptionTrack>, TranscriptError> {
    let mut reader = Reader::from_str(xml);
    let mut tracks = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"track" => {
                if let Some(track) = track_from_element(e, timedtext_url, video_id)? {
                    tracks.push(track);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TranscriptError::MalformedPayload(format!("track list XML: {e}"))),
            _ => {}
        }
    }

    Ok(tracks)
}

fn track_from_element(
    e: &BytesStart<'_>,
    timedtext_url: &str,
    video_id: &VideoId,
) -> Result<Option<CaptionTrack>, TranscriptError> {
    let mut lang_code = None;
    let mut name = String::new();
    let mut lang_translated = None;
    let mut lang_original = None;
    let mut kind = None;

    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        let value = html_escape::decode_html_entities(&value).to_string();
        match attr.key.as_ref() {
            b"lang_code" => lang_code = Some(value),
            b"name" => name = value,
            b"lang_translated" => lang_translated = Some(value),
            b"lang_original" => lang_original = Some(value),
            b"kind" => kind = Some(value),
            _ => {}
        }
    }

    let Some(language_code) = lang_code.filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    let mut params = vec![
        ("v", video_id.as_str()),
        ("lang", language_code.as_str()),
    ];
    if !name.is_empty() {
        params.push(("name", name.as_str()));
    }
    if let Some(kind) = kind.as_deref() {
        params.push(("kind", kind));
    }
    let source_url = Url::parse_with_params(timedtext_url, &params)
        .map_err(|e| TranscriptError::MalformedPayload(format!("track URL: {e}")))?;

    Ok(Some(CaptionTrack {
        display_language: lang_translated
            .or(lang_original)
            .unwrap_or_else(|| language_code.clone()),
        is_auto_generated: kind.as_deref() == Some("asr"),
        language_code,
        source_url: source_url.to_string(),
    }))
}
