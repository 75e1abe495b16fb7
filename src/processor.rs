use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::{
    archive::{self, ArchiveIndex},
    config::ChannelConfig,
    entry::SermonEntry,
    fetcher::{FetchError, TranscriptFetcher},
    listing::{self, ChannelLister},
    policy::RequestPolicy,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("could not create data directory {path}: {source}")]
    DataDirError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not read archive {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not append to archive {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What happened to one channel during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelReport {
    pub channel: String,
    pub destination: PathBuf,
    pub existing: usize,
    pub candidates: usize,
    pub new: usize,
    pub appended: usize,
    pub failures: Vec<(String, FetchError)>,
}

pub struct ChannelProcessor<'a> {
    pub lister: &'a dyn ChannelLister,
    pub fetcher: &'a dyn TranscriptFetcher,
    pub policy: &'a RequestPolicy,
    pub data_dir: &'a Path,
    pub limit: usize,
    pub run_date: NaiveDate,
    pub use_publish_date: bool,
}

impl<'a> ChannelProcessor<'a> {
    /// Lists the channel, fetches every video the destination file does not
    /// mention yet and appends the results in one write.
    ///
    /// All "is it new" decisions use a single index snapshot taken before any
    /// write. Entries are written in reverse discovery order so that, with
    /// newest-first listings, older videos land first.
    pub async fn process(&self, channel: &ChannelConfig) -> Result<ChannelReport, ProcessError> {
        info!("--------------------------------------------------");
        info!("Processing Channel: {}", channel.name);

        tokio::fs::create_dir_all(self.data_dir)
            .await
            .map_err(|source| ProcessError::DataDirError {
                path: self.data_dir.to_path_buf(),
                source,
            })?;
        let path = self.data_dir.join(&channel.filename);

        let index = ArchiveIndex::load(&path)
            .await
            .map_err(|source| ProcessError::ReadError {
                path: path.clone(),
                source,
            })?;
        info!("Found {} existing videos.", index.len());

        let mut report = ChannelReport {
            channel: channel.name.clone(),
            destination: path.clone(),
            existing: index.len(),
            ..Default::default()
        };

        let base_url = listing::normalize_channel_url(&channel.url);
        let candidates = listing::list_channel(self.lister, base_url, self.limit).await;
        report.candidates = candidates.len();
        if candidates.is_empty() {
            warn!("No videos found for {}.", channel.name);
            return Ok(report);
        }
        info!("Total unique videos to check: {}", candidates.len());

        let fallback_date = self.run_date.format(DATE_FORMAT).to_string();
        let mut entries = Vec::new();

        for video in candidates.iter().filter(|v| !index.contains(&v.id)) {
            report.new += 1;
            info!("NEW CONTENT FOUND: {} ({})", video.title, video.id);

            tokio::time::sleep(self.policy.pacing_delay()).await;

            match self.fetcher.fetch(&video.id).await {
                Ok(transcript) => {
                    let date = match transcript.publish_date {
                        Some(d) if self.use_publish_date => d.format(DATE_FORMAT).to_string(),
                        _ => fallback_date.clone(),
                    };
                    entries.push(SermonEntry::new(
                        &video.id,
                        &video.title,
                        &date,
                        &transcript.text,
                        &channel.name,
                    ));
                    info!(
                        "Transcript downloaded for {} ({} captions).",
                        video.id, transcript.language_code
                    );
                }
                Err(e) => {
                    warn!("Skipping {}: {}", video.id, e);
                    report.failures.push((video.id.clone(), e));
                }
            }
        }

        if entries.is_empty() {
            info!("No new transcripts for {}.", channel.name);
            return Ok(report);
        }

        info!(
            "Writing {} new sermons to {}...",
            entries.len(),
            path.display()
        );
        report.appended = archive::append_blocks(&path, entries.iter().rev().map(|e| e.to_string()))
            .await
            .map_err(|source| ProcessError::WriteError {
                path: path.clone(),
                source,
            })?;
        info!("SUCCESS: {} updated.", channel.filename);

        Ok(report)
    }
}
