use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::{captions::CaptionTrack, fetcher::TrackResolver, util};

const IPR_STR: &str = "var ytInitialPlayerResponse =";
const PLAYER_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/player?prettyPrint=false";

const WEB_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const ANDROID_CLIENT_VERSION: &str = "19.09.37";
const ANDROID_USER_AGENT: &str = "com.google.android.youtube/19.09.37 (Linux; U; Android 11) gzip";

/// Which client the metadata request pretends to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIdentity {
    /// Desktop browser loading the watch page.
    Web,
    /// Mobile app calling the player endpoint directly.
    Android,
}

impl ClientIdentity {
    pub fn name(&self) -> &'static str {
        match self {
            ClientIdentity::Web => "web",
            ClientIdentity::Android => "android",
        }
    }

    pub fn user_agent(&self) -> &'static str {
        match self {
            ClientIdentity::Web => WEB_USER_AGENT,
            ClientIdentity::Android => ANDROID_USER_AGENT,
        }
    }
}

// Generated with https://transform.tools/json-to-rust-serde, trimmed to what
// caption lookup needs

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    pub playability_status: Option<PlayabilityStatus>,
    pub video_details: Option<VideoDetails>,
    pub captions: Option<Captions>,
    pub microformat: Option<Microformat>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayabilityStatus {
    pub status: Status,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    LiveStreamOffline,
    Unplayable,
    LoginRequired,
    Error,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Captions {
    pub player_captions_tracklist_renderer: PlayerCaptionsTracklistRenderer,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCaptionsTracklistRenderer {
    #[serde(default)]
    pub caption_tracks: Vec<RawCaptionTrack>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCaptionTrack {
    pub base_url: String,
    pub language_code: String,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Microformat {
    pub player_microformat_renderer: PlayerMicroformatRenderer,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMicroformatRenderer {
    pub publish_date: Option<String>,
    pub upload_date: Option<String>,
}

/// What the fetcher needs from a resolved player response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    pub tracks: Vec<CaptionTrack>,
    pub publish_date: Option<NaiveDate>,
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("could not download player response: {0}")]
    DownloadError(#[from] util::HttpError),
    #[error("could not find initial player response")]
    NoPlayerResponse,
    #[error("could not parse player response: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d").ok()
}

impl PlayerResponse {
    pub fn from_html(html: &str) -> Result<Self, ResolveError> {
        let ipr_str =
            util::extract_json_assignment(html, IPR_STR).ok_or(ResolveError::NoPlayerResponse)?;

        serde_json::from_str(ipr_str).map_err(ResolveError::ParseError)
    }

    pub fn status(&self) -> Option<&Status> {
        self.playability_status.as_ref().map(|ps| &ps.status)
    }

    pub fn caption_tracks(&self) -> Vec<CaptionTrack> {
        self.captions
            .as_ref()
            .map(|c| {
                c.player_captions_tracklist_renderer
                    .caption_tracks
                    .iter()
                    .map(|t| CaptionTrack {
                        url: t.base_url.clone(),
                        language_code: t.language_code.clone(),
                        auto_generated: t.kind.as_deref() == Some("asr"),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn publish_date(&self) -> Option<NaiveDate> {
        let mf = &self.microformat.as_ref()?.player_microformat_renderer;
        mf.publish_date
            .as_deref()
            .or(mf.upload_date.as_deref())
            .and_then(parse_date)
    }

    pub fn into_metadata(self) -> VideoMetadata {
        VideoMetadata {
            tracks: self.caption_tracks(),
            publish_date: self.publish_date(),
        }
    }
}

/// Resolves player responses while presenting one client identity.
pub struct InnertubeResolver {
    identity: ClientIdentity,
    http: util::HttpClient,
}

impl InnertubeResolver {
    /// Metadata requests are never retried here; falling back to the next
    /// identity is the only retry.
    pub fn new(identity: ClientIdentity) -> reqwest::Result<Self> {
        Ok(Self {
            identity,
            http: util::HttpClient::new(identity.user_agent(), 0)?,
        })
    }

    pub async fn player_response(&self, video_id: &str) -> Result<PlayerResponse, ResolveError> {
        match self.identity {
            ClientIdentity::Web => {
                let url = format!("{}&hl=en", util::watch_url(video_id));
                let html = self.http.fetch_text(&url).await?;
                PlayerResponse::from_html(&html)
            }
            ClientIdentity::Android => {
                let body = json!({
                    "context": {
                        "client": {
                            "clientName": "ANDROID",
                            "clientVersion": ANDROID_CLIENT_VERSION,
                            "androidSdkVersion": 30,
                            "hl": "en",
                            "gl": "US",
                        }
                    },
                    "videoId": video_id,
                    "contentCheckOk": true,
                    "racyCheckOk": true,
                });
                let text = self
                    .http
                    .post_json(
                        PLAYER_ENDPOINT,
                        &body,
                        &[
                            ("X-YouTube-Client-Name", "3"),
                            ("X-YouTube-Client-Version", ANDROID_CLIENT_VERSION),
                        ],
                    )
                    .await?;
                serde_json::from_str(&text).map_err(ResolveError::ParseError)
            }
        }
    }
}

#[async_trait]
impl TrackResolver for InnertubeResolver {
    fn name(&self) -> &str {
        self.identity.name()
    }

    async fn resolve(&self, video_id: &str) -> Result<VideoMetadata, ResolveError> {
        let pr = self.player_response(video_id).await?;

        if let Some(ps) = &pr.playability_status {
            if ps.status != Status::Ok {
                debug!(
                    "{} client: {} is {:?} ({})",
                    self.identity.name(),
                    video_id,
                    ps.status,
                    ps.reason.as_deref().unwrap_or("no reason given")
                );
            }
        }

        Ok(pr.into_metadata())
    }
}
