use std::path::PathBuf;

use chrono::{Local, NaiveDate};

use crate::{
    config::{self, ConfigError, DEFAULT_CONFIG_FILES},
    fetcher::TranscriptFetcher,
    listing::ChannelLister,
    policy::RequestPolicy,
    processor::{ChannelProcessor, ChannelReport},
};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LIMIT: usize = 10;

/// Everything a run needs that used to be a process-wide constant.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub config_files: Vec<PathBuf>,
    pub data_dir: PathBuf,
    /// Videos requested per listing tab per channel.
    pub limit: usize,
    pub use_publish_date: bool,
    pub run_date: NaiveDate,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            config_files: DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).collect(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            limit: DEFAULT_LIMIT,
            use_publish_date: false,
            run_date: Local::now().date_naive(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("fetch limit must be at least 1")]
    InvalidLimit,
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub config_path: Option<PathBuf>,
    pub reports: Vec<ChannelReport>,
    /// Channels that could not be processed at all, with the reason.
    pub failed_channels: Vec<(String, String)>,
}

impl RunSummary {
    pub fn appended(&self) -> usize {
        self.reports.iter().map(|r| r.appended).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }
}

/// Loads the channel list and processes each channel in turn.
///
/// A missing configuration is logged and yields an empty summary. A present
/// but broken configuration is an error. Channel failures never stop the run.
pub async fn run(
    settings: &RunSettings,
    lister: &dyn ChannelLister,
    fetcher: &dyn TranscriptFetcher,
    policy: &RequestPolicy,
) -> Result<RunSummary, RunError> {
    if settings.limit == 0 {
        return Err(RunError::InvalidLimit);
    }

    let loaded = match config::load_channels(&settings.config_files)? {
        Some(loaded) => loaded,
        None => {
            let checked: Vec<String> = settings
                .config_files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            error!(
                "No configuration file found. Checked: {}",
                checked.join(", ")
            );
            return Ok(RunSummary::default());
        }
    };

    let mut summary = RunSummary {
        config_path: Some(loaded.path),
        ..Default::default()
    };

    let processor = ChannelProcessor {
        lister,
        fetcher,
        policy,
        data_dir: &settings.data_dir,
        limit: settings.limit,
        run_date: settings.run_date,
        use_publish_date: settings.use_publish_date,
    };

    for channel in &loaded.channels {
        match processor.process(channel).await {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                error!("Channel {} failed: {}", channel.name, e);
                summary
                    .failed_channels
                    .push((channel.name.clone(), e.to_string()));
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        fetcher::{FetchError, Transcript},
        listing::{ListingError, ListingTab, VideoDescriptor},
    };

    #[derive(Default)]
    struct RecordingLister {
        limits: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl ChannelLister for RecordingLister {
        async fn list(
            &self,
            base_url: &str,
            tab: ListingTab,
            limit: usize,
        ) -> Result<Vec<VideoDescriptor>, ListingError> {
            self.limits
                .lock()
                .unwrap()
                .push((base_url.to_string(), limit));
            if tab == ListingTab::Streams {
                return Ok(vec![]);
            }
            // one id per channel, derived from the handle
            let handle = base_url.rsplit('@').next().unwrap_or_default();
            Ok(vec![VideoDescriptor {
                id: format!("{:_<11}", handle),
                title: format!("{} upload", handle),
                tab,
            }])
        }
    }

    struct EchoFetcher;

    #[async_trait]
    impl TranscriptFetcher for EchoFetcher {
        async fn fetch(&self, video_id: &str) -> Result<Transcript, FetchError> {
            Ok(Transcript {
                text: format!("words from {}", video_id),
                language_code: "en".to_string(),
                publish_date: None,
            })
        }
    }

    fn settings(dir: &std::path::Path) -> RunSettings {
        RunSettings {
            config_files: vec![dir.join("channels.json"), dir.join("config.json")],
            data_dir: dir.join("data"),
            limit: 3,
            use_publish_date: false,
            run_date: NaiveDate::from_ymd_opt(2024, 5, 12).unwrap(),
        }
    }

    #[tokio::test]
    async fn missing_config_is_a_clean_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let lister = RecordingLister::default();

        let summary = run(
            &settings(dir.path()),
            &lister,
            &EchoFetcher,
            &RequestPolicy::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(lister.limits.lock().unwrap().is_empty());
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn broken_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        let lister = RecordingLister::default();

        let res = run(
            &settings(dir.path()),
            &lister,
            &EchoFetcher,
            &RequestPolicy::disabled(),
        )
        .await;
        assert!(matches!(res, Err(RunError::ConfigError(_))));
        assert!(lister.limits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.limit = 0;

        let res = run(&s, &RecordingLister::default(), &EchoFetcher, &RequestPolicy::disabled()).await;
        assert!(matches!(res, Err(RunError::InvalidLimit)));
    }

    #[tokio::test]
    async fn every_channel_is_processed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("channels.json"),
            r#"{
                "Zion": {"url": "https://www.youtube.com/@zion/videos", "filename": "zion.txt"},
                "Bethel": {"url": "https://www.youtube.com/@bethel", "filename": "bethel.txt"}
            }"#,
        )
        .unwrap();
        let lister = RecordingLister::default();

        let summary = run(
            &settings(dir.path()),
            &lister,
            &EchoFetcher,
            &RequestPolicy::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(summary.config_path, Some(dir.path().join("channels.json")));
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[0].channel, "Zion");
        assert_eq!(summary.appended(), 2);
        assert_eq!(summary.skipped(), 0);
        assert!(summary.failed_channels.is_empty());

        let limits = lister.limits.lock().unwrap();
        assert_eq!(limits.len(), 4);
        assert!(limits.iter().all(|(_, limit)| *limit == 3));
        assert_eq!(limits[0].0, "https://www.youtube.com/@zion");

        let zion = std::fs::read_to_string(dir.path().join("data/zion.txt")).unwrap();
        assert!(zion.contains("watch?v=zion_______"));
        assert!(zion.contains("Church:  Zion"));
        let bethel = std::fs::read_to_string(dir.path().join("data/bethel.txt")).unwrap();
        assert!(bethel.contains("watch?v=bethel_____"));
    }

    #[tokio::test]
    async fn channel_failure_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("channels.json"),
            r#"{
                "Broken": {"url": "https://www.youtube.com/@broken", "filename": "broken.txt"},
                "Zion": {"url": "https://www.youtube.com/@zion", "filename": "zion.txt"}
            }"#,
        )
        .unwrap();
        // a directory where the archive file should be cannot be read
        std::fs::create_dir_all(dir.path().join("data/broken.txt")).unwrap();

        let summary = run(
            &settings(dir.path()),
            &RecordingLister::default(),
            &EchoFetcher,
            &RequestPolicy::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(summary.failed_channels.len(), 1);
        assert_eq!(summary.failed_channels[0].0, "Broken");
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].appended, 1);
    }
}
