use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use url::Url;

use super::{CaptionSource, Endpoints, fetch_watch_page, markup, read_body};
use crate::identity::IdentityProvider;
use crate::{CaptionTrack, Fetched, Segment, TranscriptError, VideoId, join_segments};

#[derive(Debug, Deserialize)]
struct Json3Payload {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Reads caption tracks straight out of the public watch page and downloads
/// the selected one as JSON.
pub struct PageScrapeFetcher {
    client: reqwest::Client,
    endpoints: Endpoints,
    identity: IdentityProvider,
}

impl PageScrapeFetcher {
    pub fn new(client: reqwest::Client, endpoints: Endpoints, identity: IdentityProvider) -> Self {
        Self {
            client,
            endpoints,
            identity,
        }
    }
}

#[async_trait]
impl CaptionSource for PageScrapeFetcher {
    fn name(&self) -> &'static str {
        "page-scrape"
    }

    async fn fetch(&self, video_id: &VideoId, lang: &str) -> Result<Fetched, TranscriptError> {
        let profile = self.identity.browser_profile(lang);
        let html = fetch_watch_page(&self.client, &self.endpoints, video_id, &profile).await?;

        if !markup::has_player_response(&html) {
            return Err(TranscriptError::MalformedPayload(
                "watch page has no player data (consent or bot-check page?)".to_string(),
            ));
        }
        if let Some(reason) = markup::playability_error(&html) {
            return Err(TranscriptError::Unknown(format!("video is not playable: {reason}")));
        }

        let tracks = markup::caption_tracks(&html)?;
        let track = select_track(&tracks, lang).ok_or_else(|| TranscriptError::LanguageNotFound {
            lang: lang.to_string(),
        })?;
        if track.language_code != lang {
            info!(
                "No '{lang}' caption track for {video_id}; using '{}' ({})",
                track.language_code, track.display_language
            );
        }

        let payload_url = json3_url(&self.endpoints.resolve(&track.source_url)?);
        debug!("Fetching caption payload: {}", payload_url.path());
        let resp = profile.apply(self.client.get(payload_url)).send().await?;
        let body = read_body(resp).await?;
        if body.trim().is_empty() {
            return Err(TranscriptError::MalformedPayload("caption payload was empty".to_string()));
        }

        let segments = parse_json3(&body)?;
        let text = join_segments(segments.iter().map(|s| s.text.as_str()));
        if text.is_empty() {
            return Err(TranscriptError::MalformedPayload("caption payload had no text".to_string()));
        }

        Ok(Fetched {
            text,
            language: track.language_code.clone(),
        })
    }
}

/// The track in the requested language, else the first one offered
pub fn select_track<'a>(tracks: &'a [CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    tracks.iter().find(|t| t.language_code == lang).or_else(|| tracks.first())
}

/// The caption URL with its format forced to `json3`
pub fn json3_url(url: &Url) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = url.clone();
    url.query_pairs_mut().clear().extend_pairs(pairs).append_pair("fmt", "json3");
    url
}

/// Parse a json3 caption payload: one segment per event, the event's pieces
/// concatenated.
pub fn parse_json3(body: &str) -> Result<Vec<Segment>, TranscriptError> {
    let payload: Json3Payload =
        serde_json::from_str(body).map_err(|e| TranscriptError::MalformedPayload(format!("json3 captions: {e}")))?;

    Ok(payload
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.replace('\n', " ").trim().to_string();
            (!text.is_empty()).then(|| Segment {
                text,
                start: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    const JSON3: &str = r#"{
  "wireMagic": "pb3",
  "pens": [{}],
  "events": [
    {"tStartMs": 0, "dDurationMs": 213000, "id": 1, "wpWinPosId": 1, "wsWinStyleId": 1},
    {"tStartMs": 1360, "dDurationMs": 3040, "wWinId": 1, "segs": [{"utf8": "Hello"}]},
    {"tStartMs": 4400, "dDurationMs": 2000, "aAppend": 1, "segs": [{"utf8": "\n"}]},
    {"tStartMs": 4400, "dDurationMs": 2000, "wWinId": 1, "segs": [{"utf8": "wor"}, {"utf8": "ld", "tOffsetMs": 300}]},
    {"tStartMs": 6400, "dDurationMs": 1500, "wWinId": 1, "segs": [{"utf8": " today\n"}]}
  ]
}"#;

    fn track(code: &str) -> CaptionTrack {
        CaptionTrack {
            language_code: code.to_string(),
            display_language: code.to_string(),
            is_auto_generated: false,
            source_url: format!("https://www.youtube.com/api/timedtext?lang={code}"),
        }
    }

    #[test]
    fn test_parse_json3() {
        let segments = parse_json3(JSON3).unwrap();
        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["Hello", "world", "today"]);
        assert!((segments[1].start - 4.4).abs() < 1e-9);
        assert_eq!(join_segments(texts), "Hello world today");
    }

    #[test]
    fn test_parse_json3_malformed() {
        assert!(matches!(parse_json3("<html>"), Err(TranscriptError::MalformedPayload(_))));
        assert!(parse_json3("{}").unwrap().is_empty());
    }

    #[test]
    fn test_select_track_prefers_requested_language() {
        let tracks = vec![track("en"), track("vi")];
        assert_eq!(select_track(&tracks, "vi").unwrap().language_code, "vi");
    }

    #[test]
    fn test_select_track_falls_back_to_first() {
        let tracks = vec![track("fr"), track("vi")];
        assert_eq!(select_track(&tracks, "en").unwrap().language_code, "fr");
        assert!(select_track(&[], "en").is_none());
    }

    #[test]
    fn test_json3_url_replaces_format() {
        let url = Url::parse("https://www.youtube.com/api/timedtext?v=x&lang=vi&fmt=srv3").unwrap();
        assert_eq!(
            json3_url(&url).as_str(),
            "https://www.youtube.com/api/timedtext?v=x&lang=vi&fmt=json3"
        );
    }

    fn watch_page(base: &str) -> String {
        format!(
            r#"<html><script>var ytInitialPlayerResponse = {{"playabilityStatus":{{"status":"OK"}},"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{{"baseUrl":"{base}/api/timedtext?v=dQw4w9WgXcQ&lang=vi&kind=asr","name":{{"simpleText":"Vietnamese"}},"languageCode":"vi","kind":"asr"}}]}}}}}};</script></html>"#
        )
    }

    #[tokio::test]
    async fn test_fetch_substitutes_first_track() {
        let mut server = mockito::Server::new_async().await;
        let page = watch_page(&server.url());
        let _page = server
            .mock("GET", "/watch")
            .match_query(Matcher::UrlEncoded("v".into(), "dQw4w9WgXcQ".into()))
            .match_header("referer", "https://www.youtube.com/")
            .with_body(page)
            .create_async()
            .await;
        let _captions = server
            .mock("GET", "/api/timedtext")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("lang".into(), "vi".into()),
                Matcher::UrlEncoded("fmt".into(), "json3".into()),
            ]))
            .with_body(JSON3)
            .create_async()
            .await;

        let fetcher =
            PageScrapeFetcher::new(reqwest::Client::new(), Endpoints::new(&server.url()), IdentityProvider::default());
        let id = crate::resolve("dQw4w9WgXcQ").unwrap();
        let fetched = fetcher.fetch(&id, "en").await.unwrap();
        assert_eq!(fetched.text, "Hello world today");
        assert_eq!(fetched.language, "vi");
    }

    #[tokio::test]
    async fn test_fetch_without_tracks() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/watch")
            .match_query(Matcher::Any)
            .with_body(include_str!("fixtures/watch_page_no_captions.html"))
            .create_async()
            .await;

        let fetcher =
            PageScrapeFetcher::new(reqwest::Client::new(), Endpoints::new(&server.url()), IdentityProvider::default());
        let id = crate::resolve("aaaaaaaaaaa").unwrap();
        assert_eq!(fetcher.fetch(&id, "en").await, Err(TranscriptError::NoCaptionTracks));
    }

    #[tokio::test]
    async fn test_fetch_consent_page() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/watch")
            .match_query(Matcher::Any)
            .with_body("<html><form action=\"https://consent.youtube.com/save\"></form></html>")
            .create_async()
            .await;

        let fetcher =
            PageScrapeFetcher::new(reqwest::Client::new(), Endpoints::new(&server.url()), IdentityProvider::default());
        let id = crate::resolve("aaaaaaaaaaa").unwrap();
        let err = fetcher.fetch(&id, "en").await.unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedPayload(_)));
        assert!(!err.indicates_no_captions());
    }
}
