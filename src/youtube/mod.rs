//! Caption sources backed by the video platform.
//!
//! Three independent strategies, cheapest first: the timed-text captions
//! surface ([`timedtext`]), watch-page scraping ([`scrape`]) and the internal
//! transcript API ([`innertube`]). Sequencing lives in [`crate::chain`].

pub mod innertube;
pub mod markup;
pub mod oembed;
pub mod scrape;
pub mod timedtext;

use async_trait::async_trait;
use log::debug;
use url::Url;

use crate::identity::RequestProfile;
use crate::{CaptionTrack, Fetched, TranscriptError, VideoId};

pub const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";

/// A method of turning a video id into transcript text
#[async_trait]
pub trait CaptionSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, video_id: &VideoId, lang: &str) -> Result<Fetched, TranscriptError>;

    /// Fetch a specific track found by a [`TrackLister`]. Sources that can't
    /// address tracks directly fall back to its language.
    async fn fetch_track(&self, video_id: &VideoId, track: &CaptionTrack) -> Result<Fetched, TranscriptError> {
        self.fetch(video_id, &track.language_code).await
    }
}

/// Enumerates the caption tracks a video offers
#[async_trait]
pub trait TrackLister: Send + Sync {
    async fn list_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>, TranscriptError>;
}

/// Platform base URL; overridable so strategies can run against a local server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(YOUTUBE_BASE_URL)
    }
}

impl Endpoints {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn watch(&self, video_id: &VideoId) -> String {
        format!("{}/watch?v={video_id}", self.base)
    }

    pub fn timedtext(&self) -> String {
        format!("{}/api/timedtext", self.base)
    }

    pub fn innertube(&self, endpoint: &str, api_key: &str) -> String {
        format!("{}/youtubei/v1/{endpoint}?key={api_key}&prettyPrint=false", self.base)
    }

    pub fn oembed(&self) -> String {
        format!("{}/oembed", self.base)
    }

    /// Resolve a possibly relative URL found in page markup
    pub fn resolve(&self, url: &str) -> Result<Url, TranscriptError> {
        let base = Url::parse(&self.base).map_err(|e| TranscriptError::Unknown(format!("bad base URL: {e}")))?;
        base.join(url)
            .map_err(|e| TranscriptError::MalformedPayload(format!("bad URL '{url}': {e}")))
    }
}

/// Fetch the public watch page with the given identity
pub(crate) async fn fetch_watch_page(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    video_id: &VideoId,
    profile: &RequestProfile,
) -> Result<String, TranscriptError> {
    let watch_url = endpoints.watch(video_id);
    debug!("Fetching watch page: {watch_url} (profile={})", profile.name);
    let resp = profile.apply(client.get(&watch_url)).send().await?;
    read_body(resp).await
}

/// Read a response body, turning non-success statuses into transport errors
pub(crate) async fn read_body(resp: reqwest::Response) -> Result<String, TranscriptError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(TranscriptError::Transport(format!("HTTP {status} from {}", resp.url().path())));
    }
    Ok(resp.text().await?)
}
