//! Destination files: reading back which videos are already archived, and
//! appending new entries.
//!
//! A destination file is never parsed structurally. The only thing read back
//! is the embedded watch URL of every entry, so the file may contain any other
//! text without affecting incremental updates.

use std::{collections::HashSet, io::ErrorKind, path::Path, sync::OnceLock};

use regex::Regex;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

fn watch_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})").expect("valid watch URL regex")
    })
}

/// Snapshot of the video ids present in one destination file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveIndex {
    ids: HashSet<String>,
}

impl ArchiveIndex {
    pub fn from_text(text: &str) -> Self {
        let ids = watch_id_regex()
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect();

        Self { ids }
    }

    /// Reads `path` and collects its ids. A missing file is an empty index.
    /// Bytes that are not valid UTF-8 are replaced before scanning.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Self::from_text(&String::from_utf8_lossy(&bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.ids.contains(video_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }
}

/// Appends every block to `path` in one write, creating the file if needed.
/// Nothing is opened when `blocks` is empty.
pub async fn append_blocks<I, S>(path: &Path, blocks: I) -> std::io::Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut count = 0;
    let mut buf = String::new();
    for block in blocks {
        buf.push_str(block.as_ref());
        count += 1;
    }

    if count == 0 {
        return Ok(0);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(buf.as_bytes()).await?;
    file.flush().await?;

    Ok(count)
}
