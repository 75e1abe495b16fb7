use std::{collections::HashMap, fmt, sync::OnceLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::util;

pub const UNKNOWN_TITLE: &str = "Unknown Title";

const DATA_MARKERS: &[&str] = &["var ytInitialData =", "window[\"ytInitialData\"] ="];
const BROWSE_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/browse";
const FALLBACK_CLIENT_VERSION: &str = "2.20240215.01.00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingTab {
    Streams,
    Videos,
}

impl ListingTab {
    pub fn path(&self) -> &'static str {
        match self {
            ListingTab::Streams => "streams",
            ListingTab::Videos => "videos",
        }
    }
}

impl fmt::Display for ListingTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A video seen on a channel tab. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDescriptor {
    pub id: String,
    pub title: String,
    pub tab: ListingTab,
}

#[derive(thiserror::Error, Debug)]
pub enum ListingError {
    #[error("could not download channel page: {0}")]
    DownloadError(#[from] util::HttpError),
    #[error("could not find initial data on channel page")]
    NoInitialData,
    #[error("could not parse channel data: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Lists the most recent videos of one channel tab.
#[async_trait]
pub trait ChannelLister: Send + Sync {
    async fn list(
        &self,
        base_url: &str,
        tab: ListingTab,
        limit: usize,
    ) -> Result<Vec<VideoDescriptor>, ListingError>;
}

/// Cuts a channel URL back to the channel root by dropping a tab suffix.
pub fn normalize_channel_url(url: &str) -> &str {
    let url = ["/streams", "/videos", "/featured"]
        .iter()
        .fold(url, |acc, suffix| match acc.find(suffix) {
            Some(idx) => &acc[..idx],
            None => acc,
        });
    url.trim_end_matches('/')
}

/// Concatenates the listings and drops repeated ids. A repeated id keeps its
/// first position but takes the later descriptor.
pub fn merge_candidates<I>(listings: I) -> Vec<VideoDescriptor>
where
    I: IntoIterator<Item = Vec<VideoDescriptor>>,
{
    let mut merged: Vec<VideoDescriptor> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for video in listings.into_iter().flatten() {
        match positions.get(&video.id) {
            Some(&idx) => merged[idx] = video,
            None => {
                positions.insert(video.id.clone(), merged.len());
                merged.push(video);
            }
        }
    }

    merged
}

/// Lists the live-stream tab and then the uploads tab. A failing tab is logged
/// and contributes nothing.
pub async fn list_channel(
    lister: &dyn ChannelLister,
    base_url: &str,
    limit: usize,
) -> Vec<VideoDescriptor> {
    let mut listings = Vec::new();

    for tab in [ListingTab::Streams, ListingTab::Videos] {
        info!("Scanning '{}'...", tab);
        match lister.list(base_url, tab, limit).await {
            Ok(videos) => {
                info!("Found {} {}.", videos.len(), tab);
                listings.push(videos);
            }
            Err(e) => warn!("Could not list '{}' for {}: {}", tab, base_url, e),
        }
    }

    merge_candidates(listings)
}

#[derive(Debug, Default)]
struct Page {
    videos: Vec<VideoDescriptor>,
    continuation: Option<String>,
}

fn parse_video_renderer(renderer: &Value, tab: ListingTab) -> Option<VideoDescriptor> {
    let id = renderer.get("videoId")?.as_str()?;
    let title = renderer
        .pointer("/title/runs/0/text")
        .or_else(|| renderer.pointer("/title/simpleText"))
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_TITLE);

    Some(VideoDescriptor {
        id: id.to_string(),
        title: title.to_string(),
        tab,
    })
}

// The grid's own continuation comes last in document order, so the last token
// seen wins.
fn collect_page(value: &Value, tab: ListingTab, page: &mut Page) {
    match value {
        Value::Object(map) => {
            if let Some(renderer) = map.get("videoRenderer") {
                if let Some(video) = parse_video_renderer(renderer, tab) {
                    page.videos.push(video);
                }
                return;
            }
            if let Some(token) = map
                .get("continuationCommand")
                .and_then(|c| c.get("token"))
                .and_then(Value::as_str)
            {
                page.continuation = Some(token.to_string());
            }
            for v in map.values() {
                collect_page(v, tab, page);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_page(v, tab, page);
            }
        }
        _ => (),
    }
}

fn ytcfg_value(html: &str, key: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#""(INNERTUBE_API_KEY|INNERTUBE_CLIENT_VERSION)"\s*:\s*"([^"]+)""#)
            .expect("valid ytcfg regex")
    });

    re.captures_iter(html)
        .find(|c| &c[1] == key)
        .map(|c| c[2].to_string())
}

/// Scrapes channel tab pages and follows the grid's continuation through the
/// browse endpoint until enough videos are seen.
pub struct BrowseLister {
    http: util::HttpClient,
    page_delay: Duration,
}

impl BrowseLister {
    pub fn new(user_agent: &str, max_retries: u32, page_delay: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            http: util::HttpClient::new(user_agent, max_retries)?,
            page_delay,
        })
    }

    async fn next_page(
        &self,
        api_key: Option<&str>,
        client_version: &str,
        token: &str,
        tab: ListingTab,
    ) -> Result<Page, ListingError> {
        let url = match api_key {
            Some(key) => format!("{}?key={}&prettyPrint=false", BROWSE_ENDPOINT, key),
            None => format!("{}?prettyPrint=false", BROWSE_ENDPOINT),
        };
        let body = json!({
            "context": {
                "client": {
                    "clientName": "WEB",
                    "clientVersion": client_version,
                    "hl": "en",
                    "gl": "US",
                }
            },
            "continuation": token,
        });

        let text = self
            .http
            .post_json(
                &url,
                &body,
                &[
                    ("X-YouTube-Client-Name", "1"),
                    ("X-YouTube-Client-Version", client_version),
                ],
            )
            .await?;
        let value: Value = serde_json::from_str(&text)?;

        let mut page = Page::default();
        collect_page(&value, tab, &mut page);
        Ok(page)
    }
}

fn first_page(html: &str, tab: ListingTab) -> Result<Page, ListingError> {
    let data = DATA_MARKERS
        .iter()
        .find_map(|marker| util::extract_json_assignment(html, marker))
        .ok_or(ListingError::NoInitialData)?;
    let value: Value = serde_json::from_str(data)?;

    let mut page = Page::default();
    collect_page(&value, tab, &mut page);
    Ok(page)
}

#[async_trait]
impl ChannelLister for BrowseLister {
    async fn list(
        &self,
        base_url: &str,
        tab: ListingTab,
        limit: usize,
    ) -> Result<Vec<VideoDescriptor>, ListingError> {
        let url = format!("{}/{}", base_url, tab.path());
        let html = self.http.fetch_text(&url).await?;

        let api_key = ytcfg_value(&html, "INNERTUBE_API_KEY");
        let client_version = ytcfg_value(&html, "INNERTUBE_CLIENT_VERSION")
            .unwrap_or_else(|| FALLBACK_CLIENT_VERSION.to_string());

        let mut videos = Vec::new();
        let mut page = first_page(&html, tab)?;

        loop {
            let added = page.videos.len();
            videos.append(&mut page.videos);
            if videos.len() >= limit || added == 0 {
                break;
            }

            let token = match page.continuation.take() {
                Some(token) => token,
                None => break,
            };

            tokio::time::sleep(self.page_delay).await;
            page = self
                .next_page(api_key.as_deref(), &client_version, &token, tab)
                .await?;
        }

        videos.truncate(limit);
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_file(fname: &str) -> String {
        let mut d = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push("resources/test/");
        d.push(fname);
        std::fs::read_to_string(d).expect(format!("Could not read {}", fname).as_str())
    }

    fn video(id: &str, title: &str, tab: ListingTab) -> VideoDescriptor {
        VideoDescriptor {
            id: id.to_string(),
            title: title.to_string(),
            tab,
        }
    }

    #[test]
    fn normalize() {
        assert_eq!(
            normalize_channel_url("https://www.youtube.com/@grace/streams"),
            "https://www.youtube.com/@grace"
        );
        assert_eq!(
            normalize_channel_url("https://www.youtube.com/@grace/videos?view=0"),
            "https://www.youtube.com/@grace"
        );
        assert_eq!(
            normalize_channel_url("https://www.youtube.com/channel/UC123/featured"),
            "https://www.youtube.com/channel/UC123"
        );
        assert_eq!(
            normalize_channel_url("https://www.youtube.com/@grace/"),
            "https://www.youtube.com/@grace"
        );
        assert_eq!(
            normalize_channel_url("https://www.youtube.com/@grace"),
            "https://www.youtube.com/@grace"
        );
    }

    #[test]
    fn merge_keeps_first_position() {
        let streams = vec![
            video("AAAAAAAAAAA", "Live A", ListingTab::Streams),
            video("BBBBBBBBBBB", "Live B", ListingTab::Streams),
        ];
        let uploads = vec![
            video("CCCCCCCCCCC", "Upload C", ListingTab::Videos),
            video("AAAAAAAAAAA", "Upload A", ListingTab::Videos),
        ];

        let merged = merge_candidates(vec![streams, uploads]);
        let ids: Vec<&str> = merged.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["AAAAAAAAAAA", "BBBBBBBBBBB", "CCCCCCCCCCC"]);
        assert_eq!(merged[0].title, "Upload A");
        assert_eq!(merged[0].tab, ListingTab::Videos);
    }

    #[test]
    fn channel_page() {
        let html = get_test_file("channel_streams.html");
        let page = first_page(&html, ListingTab::Streams).expect("Could not parse channel page");

        let ids: Vec<&str> = page.videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["Xy3_-kLmN0p", "Qw8-Er7Ty6u", "Zx1cVb2nM3a"]);
        assert_eq!(page.videos[0].title, "Sunday Morning Service - Bro. Evans");
        assert_eq!(page.videos[1].title, "Wednesday Bible Study");
        assert_eq!(page.videos[2].title, UNKNOWN_TITLE);
        assert!(page.videos.iter().all(|v| v.tab == ListingTab::Streams));
        assert_eq!(page.continuation.as_deref(), Some("GRID_NEXT_TOKEN"));

        assert_eq!(
            ytcfg_value(&html, "INNERTUBE_API_KEY").as_deref(),
            Some("AIzaTestKey")
        );
        assert_eq!(
            ytcfg_value(&html, "INNERTUBE_CLIENT_VERSION").as_deref(),
            Some("2.20240215.01.00")
        );
    }

    #[test]
    fn page_without_data() {
        assert!(matches!(
            first_page("<html></html>", ListingTab::Videos),
            Err(ListingError::NoInitialData)
        ));
    }

    struct HalfBrokenLister;

    #[async_trait]
    impl ChannelLister for HalfBrokenLister {
        async fn list(
            &self,
            base_url: &str,
            tab: ListingTab,
            _limit: usize,
        ) -> Result<Vec<VideoDescriptor>, ListingError> {
            assert_eq!(base_url, "https://www.youtube.com/@grace");
            match tab {
                ListingTab::Streams => Err(ListingError::NoInitialData),
                ListingTab::Videos => Ok(vec![video("CCCCCCCCCCC", "Upload C", tab)]),
            }
        }
    }

    #[tokio::test]
    async fn failing_tab_is_isolated() {
        let videos = list_channel(&HalfBrokenLister, "https://www.youtube.com/@grace", 10).await;
        assert_eq!(videos, vec![video("CCCCCCCCCCC", "Upload C", ListingTab::Videos)]);
    }
}
