use log::debug;
use serde::Deserialize;

use super::Endpoints;
use crate::VideoId;

#[derive(Debug, Deserialize)]
struct OEmbed {
    title: Option<String>,
}

/// Video title from the public oEmbed endpoint; `None` on any failure
pub async fn fetch_title(client: &reqwest::Client, endpoints: &Endpoints, video_id: &VideoId) -> Option<String> {
    let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
    let resp = client
        .get(endpoints.oembed())
        .query(&[("url", watch_url.as_str()), ("format", "json")])
        .send()
        .await
        .ok()?;

    if !resp.status().is_success() {
        debug!("oEmbed lookup for {video_id} returned {}", resp.status());
        return None;
    }

    let title = resp.json::<OEmbed>().await.ok()?.title?;
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Title to show for a video, falling back to a placeholder built from its id
pub async fn title_or_placeholder(client: &reqwest::Client, endpoints: &Endpoints, video_id: &VideoId) -> String {
    fetch_title(client, endpoints, video_id)
        .await
        .unwrap_or_else(|| format!("YouTube Video ({video_id})"))
}
