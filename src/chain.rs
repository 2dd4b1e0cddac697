//! Transcript acquisition: the ordered fallback chain over caption sources.
//!
//! Order is fixed: timed-text in the requested language, then one listed
//! track (the requested language when it is only offered auto-generated,
//! otherwise the first enumerated language when the requested one isn't
//! offered), watch-page scrape, internal transcript API, and (hosted
//! deployments only) the internal API again across identity profiles. Each
//! source is tried at most once.

use std::fmt;

use log::{debug, info, warn};

use crate::config::Config;
use crate::identity::IdentityProvider;
use crate::youtube::innertube::{HostedFallback, InternalApiFetcher};
use crate::youtube::scrape::PageScrapeFetcher;
use crate::youtube::timedtext::TimedTextFetcher;
use crate::youtube::{CaptionSource, Endpoints, TrackLister};
use crate::{CaptionTrack, Fetched, TranscriptError, VideoId, is_usable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Primary,
    ListLanguages,
    AlternateLanguage,
    Scrape,
    InternalApi,
    HostedFallback,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Primary => "primary",
            Strategy::ListLanguages => "list-languages",
            Strategy::AlternateLanguage => "alternate-language",
            Strategy::Scrape => "page-scrape",
            Strategy::InternalApi => "internal-api",
            Strategy::HostedFallback => "hosted-fallback",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of the chain. `Ok` carries the transcript length in characters,
/// or the number of tracks found for a language listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionAttempt {
    pub strategy: Strategy,
    pub language: String,
    pub outcome: Result<usize, TranscriptError>,
}

/// A usable transcript and how it was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    pub video_id: VideoId,
    pub text: String,
    pub requested_language: String,
    pub language: String,
    pub strategy: Strategy,
    pub attempts: Vec<AcquisitionAttempt>,
}

impl Acquired {
    pub fn language_substituted(&self) -> bool {
        self.language != self.requested_language
    }
}

pub struct TranscriptChain {
    primary: Box<dyn CaptionSource>,
    lister: Box<dyn TrackLister>,
    scrape: Box<dyn CaptionSource>,
    internal: Box<dyn CaptionSource>,
    hosted: Option<Box<dyn CaptionSource>>,
}

impl TranscriptChain {
    pub fn new(
        primary: Box<dyn CaptionSource>,
        lister: Box<dyn TrackLister>,
        scrape: Box<dyn CaptionSource>,
        internal: Box<dyn CaptionSource>,
    ) -> Self {
        Self {
            primary,
            lister,
            scrape,
            internal,
            hosted: None,
        }
    }

    /// Enable the last-resort source tried after the internal API fails
    pub fn with_hosted(mut self, hosted: Box<dyn CaptionSource>) -> Self {
        self.hosted = Some(hosted);
        self
    }

    /// The production chain against the public platform
    pub fn youtube(client: reqwest::Client, config: &Config) -> Self {
        Self::with_endpoints(client, config, Endpoints::default())
    }

    pub fn with_endpoints(client: reqwest::Client, config: &Config, endpoints: Endpoints) -> Self {
        let identity = IdentityProvider::new(config.user_agents.clone());
        let timedtext = || TimedTextFetcher::new(client.clone(), endpoints.clone(), identity.clone());
        let internal = || InternalApiFetcher::new(client.clone(), endpoints.clone(), identity.clone());

        let chain = Self::new(
            Box::new(timedtext()),
            Box::new(timedtext()),
            Box::new(PageScrapeFetcher::new(client.clone(), endpoints.clone(), identity.clone())),
            Box::new(internal()),
        );

        if config.hosted {
            debug!("Hosted fallback enabled");
            chain.with_hosted(Box::new(HostedFallback::new(internal(), config.hosted_retry_delay())))
        } else {
            chain
        }
    }

    /// Run the chain for one video.
    ///
    /// Returns the first usable transcript, or a classified error once every
    /// source has failed: `NoTranscriptAvailable` when any source reported
    /// that the video has no captions, else the last failure as `Transport`
    /// or `Unknown`.
    pub async fn acquire(&self, video_id: &VideoId, lang: &str) -> Result<Acquired, TranscriptError> {
        info!("Acquiring transcript for {video_id} (lang={lang})");
        let mut attempts = Vec::new();

        let done = |strategy: Strategy,
                    fetched: Fetched,
                    attempts: Vec<AcquisitionAttempt>|
         -> Result<Acquired, TranscriptError> {
            Ok(Acquired {
                video_id: video_id.clone(),
                text: fetched.text,
                requested_language: lang.to_string(),
                language: fetched.language,
                strategy,
                attempts,
            })
        };

        if let Some(fetched) = attempt(self.primary.as_ref(), Strategy::Primary, video_id, lang, &mut attempts).await {
            return done(Strategy::Primary, fetched, attempts);
        }

        if let Some(track) = self.listed_track(video_id, lang, &mut attempts).await {
            let strategy = if track.language_code == lang {
                info!("'{lang}' is only offered auto-generated for {video_id}; requesting that track");
                Strategy::Primary
            } else {
                info!("Requested language '{lang}' not offered for {video_id}; trying '{}'", track.language_code);
                Strategy::AlternateLanguage
            };
            let result = self.primary.fetch_track(video_id, &track).await;
            if let Some(fetched) = record(strategy, video_id, &track.language_code, result, &mut attempts) {
                return done(strategy, fetched, attempts);
            }
        }

        if let Some(fetched) = attempt(self.scrape.as_ref(), Strategy::Scrape, video_id, lang, &mut attempts).await {
            return done(Strategy::Scrape, fetched, attempts);
        }

        let strategy = Strategy::InternalApi;
        if let Some(fetched) = attempt(self.internal.as_ref(), strategy, video_id, lang, &mut attempts).await {
            return done(strategy, fetched, attempts);
        }

        if let Some(hosted) = &self.hosted {
            let strategy = Strategy::HostedFallback;
            if let Some(fetched) = attempt(hosted.as_ref(), strategy, video_id, lang, &mut attempts).await {
                return done(strategy, fetched, attempts);
            }
        }

        let err = classify(&attempts);
        warn!("All transcript sources failed for {video_id}: {err}");
        Err(err)
    }

    /// The listed track worth one more primary request, if any.
    ///
    /// A plain request already covers the requested language's manual track,
    /// so the requested language only qualifies when it is listed solely as
    /// auto-generated. Otherwise the first enumerated track stands in when the
    /// requested language isn't listed at all.
    async fn listed_track(
        &self,
        video_id: &VideoId,
        lang: &str,
        attempts: &mut Vec<AcquisitionAttempt>,
    ) -> Option<CaptionTrack> {
        let tracks = match self.lister.list_tracks(video_id).await {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("Could not list caption languages for {video_id}: {e}");
                attempts.push(AcquisitionAttempt {
                    strategy: Strategy::ListLanguages,
                    language: lang.to_string(),
                    outcome: Err(e),
                });
                return None;
            }
        };

        let codes: Vec<&str> = tracks.iter().map(|t| t.language_code.as_str()).collect();
        debug!("Caption languages for {video_id}: {codes:?}");
        attempts.push(AcquisitionAttempt {
            strategy: Strategy::ListLanguages,
            language: lang.to_string(),
            outcome: Ok(tracks.len()),
        });

        let requested: Vec<&CaptionTrack> = tracks.iter().filter(|t| t.language_code == lang).collect();
        if !requested.is_empty() {
            if requested.iter().all(|t| t.is_auto_generated) {
                return requested.first().map(|t| (*t).clone());
            }
            return None;
        }
        tracks.into_iter().next()
    }
}

/// Run one source in one language and record the attempt
async fn attempt(
    source: &dyn CaptionSource,
    strategy: Strategy,
    video_id: &VideoId,
    lang: &str,
    attempts: &mut Vec<AcquisitionAttempt>,
) -> Option<Fetched> {
    debug!("Trying {strategy} ({}) for {video_id} lang={lang}", source.name());
    let result = source.fetch(video_id, lang).await;
    record(strategy, video_id, lang, result, attempts)
}

/// Record a source's result, passing it on only if usable
fn record(
    strategy: Strategy,
    video_id: &VideoId,
    lang: &str,
    result: Result<Fetched, TranscriptError>,
    attempts: &mut Vec<AcquisitionAttempt>,
) -> Option<Fetched> {
    let result = result.and_then(|fetched| {
        if is_usable(&fetched.text) {
            Ok(fetched)
        } else {
            Err(TranscriptError::TranscriptTooShort {
                chars: fetched.text.trim().chars().count(),
            })
        }
    });

    match result {
        Ok(fetched) => {
            let chars = fetched.text.chars().count();
            info!("{strategy} succeeded for {video_id}: {chars} chars in '{}'", fetched.language);
            attempts.push(AcquisitionAttempt {
                strategy,
                language: lang.to_string(),
                outcome: Ok(chars),
            });
            Some(fetched)
        }
        Err(e) => {
            warn!("{strategy} failed for {video_id}: {e}");
            attempts.push(AcquisitionAttempt {
                strategy,
                language: lang.to_string(),
                outcome: Err(e),
            });
            None
        }
    }
}

/// Reduce a run of failed attempts to the error callers see
pub fn classify(attempts: &[AcquisitionAttempt]) -> TranscriptError {
    let mut errors = attempts.iter().filter_map(|a| a.outcome.as_ref().err());

    if let Some(evidence) = errors.clone().find(|e| e.indicates_no_captions()) {
        return TranscriptError::NoTranscriptAvailable(evidence.to_string());
    }

    match errors.next_back() {
        Some(TranscriptError::Transport(msg)) => TranscriptError::Transport(msg.clone()),
        Some(aggregate) if aggregate.is_transport() => TranscriptError::Transport(aggregate.to_string()),
        Some(other) => TranscriptError::Unknown(other.to_string()),
        None => TranscriptError::Unknown("no transcript sources were tried".to_string()),
    }
}
