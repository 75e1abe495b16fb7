//! Transcript retrieval.
//!
//! A [`LadderFetcher`] asks each [`TrackResolver`] in turn for the video's
//! caption tracks until one of them yields an English track, downloads that
//! track through a [`PayloadSource`] and decodes it into one line of text.
//! Metadata and payload requests go through separate clients.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;

use crate::{
    captions::{self, CaptionTrack},
    innertube::{ResolveError, VideoMetadata},
    policy::RequestPolicy,
    util,
};

/// Why one video produced no transcript. None of these stop the run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("no English captions available")]
    NoCaptionsAvailable,
    #[error("rate limited while downloading captions (HTTP 429)")]
    RateLimited,
    #[error("caption download returned HTTP {0}")]
    UpstreamHttpError(u16),
    #[error("transcript is empty")]
    TranscriptEmpty,
    #[error("could not resolve video metadata: {0}")]
    ClientResolutionError(String),
    #[error("caption download failed: {0}")]
    Network(String),
    #[error("malformed caption payload: {0}")]
    MalformedCaptions(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub language_code: String,
    pub publish_date: Option<NaiveDate>,
}

/// Anything that turns a video id into a transcript.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<Transcript, FetchError>;
}

/// One rung of the ladder: metadata lookup under one client identity.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    fn name(&self) -> &str;
    async fn resolve(&self, video_id: &str) -> Result<VideoMetadata, ResolveError>;
}

#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn download(&self, video_id: &str, track: &CaptionTrack) -> Result<String, FetchError>;
}

pub struct LadderFetcher {
    resolvers: Vec<Box<dyn TrackResolver>>,
    payload: Box<dyn PayloadSource>,
}

impl LadderFetcher {
    /// `resolvers` are tried in the given order.
    pub fn new(resolvers: Vec<Box<dyn TrackResolver>>, payload: Box<dyn PayloadSource>) -> Self {
        Self { resolvers, payload }
    }

    async fn resolve_track(
        &self,
        video_id: &str,
    ) -> Result<(CaptionTrack, Option<NaiveDate>), FetchError> {
        let mut resolved_any = false;
        let mut last_error = None;
        let mut publish_date = None;

        for resolver in &self.resolvers {
            match resolver.resolve(video_id).await {
                Ok(meta) => {
                    resolved_any = true;
                    publish_date = publish_date.or(meta.publish_date);
                    if let Some(track) = captions::select_track(&meta.tracks) {
                        debug!(
                            "{} client found caption track {} for {}",
                            resolver.name(),
                            track.code(),
                            video_id
                        );
                        return Ok((track.clone(), publish_date));
                    }
                    debug!(
                        "{} client found no English captions for {}",
                        resolver.name(),
                        video_id
                    );
                }
                Err(e) => {
                    warn!("{} client failed for {}: {}", resolver.name(), video_id, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !resolved_any => Err(FetchError::ClientResolutionError(e.to_string())),
            _ => Err(FetchError::NoCaptionsAvailable),
        }
    }
}

#[async_trait]
impl TranscriptFetcher for LadderFetcher {
    async fn fetch(&self, video_id: &str) -> Result<Transcript, FetchError> {
        let (track, publish_date) = self.resolve_track(video_id).await?;
        let payload = self.payload.download(video_id, &track).await?;

        let text = captions::decode_payload(&payload)
            .map_err(|e| FetchError::MalformedCaptions(e.to_string()))?;
        if text.is_empty() {
            return Err(FetchError::TranscriptEmpty);
        }

        Ok(Transcript {
            text,
            language_code: track.code(),
            publish_date,
        })
    }
}

/// Downloads caption payloads with a bare client: no cookies, no retries,
/// and a user agent drawn from the policy on every request.
pub struct DirectPayloadClient {
    client: reqwest::Client,
    policy: RequestPolicy,
}

impl DirectPayloadClient {
    pub fn new(policy: RequestPolicy) -> reqwest::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            policy,
        })
    }
}

/// Maps a non-success status from the payload host to a failure kind.
pub fn status_error(status: StatusCode) -> FetchError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        FetchError::RateLimited
    } else {
        FetchError::UpstreamHttpError(status.as_u16())
    }
}

#[async_trait]
impl PayloadSource for DirectPayloadClient {
    async fn download(&self, video_id: &str, track: &CaptionTrack) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(&track.url)
            .header("User-Agent", self.policy.user_agent())
            .header("Referer", util::watch_url(video_id))
            .header("Accept", "*/*")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            return Err(status_error(resp.status()));
        }

        resp.text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}
