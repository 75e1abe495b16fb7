use std::fmt;

use crate::util;

const HASH_RULE: &str =
    "################################################################################";
const EQUALS_RULE: &str = "========================================";

pub const UNKNOWN_SPEAKER: &str = "Unknown Speaker";

/// Title substring → speaker. Checked in order, first hit wins. This is a
/// guess from the title, not a roster.
const KNOWN_SPEAKERS: &[(&str, &str)] = &[
    ("Evans", "Brother Daniel Evans"),
    ("Brisson", "Brother Steeve Brisson"),
    ("Guerra", "Brother Aaron Guerra"),
    ("Branham", "Brother William Branham"),
];

pub fn infer_speaker(title: &str) -> &'static str {
    KNOWN_SPEAKERS
        .iter()
        .find(|(needle, _)| title.contains(needle))
        .map(|(_, speaker)| *speaker)
        .unwrap_or(UNKNOWN_SPEAKER)
}

/// One archived video, rendered through `Display`.
///
/// The `URL:` line is what [`crate::archive::ArchiveIndex`] looks for on later
/// runs, so the layout must not change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SermonEntry {
    pub video_id: String,
    pub title: String,
    pub date: String,
    pub speaker: &'static str,
    pub channel: String,
    pub transcript: String,
}

impl SermonEntry {
    pub fn new(video_id: &str, title: &str, date: &str, transcript: &str, channel: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            title: title.to_string(),
            date: date.to_string(),
            speaker: infer_speaker(title),
            channel: channel.to_string(),
            transcript: transcript.to_string(),
        }
    }
}

impl fmt::Display for SermonEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", HASH_RULE)?;
        writeln!(
            f,
            "START OF FILE: {} - {} - {} - Clean.txt",
            self.date, self.title, self.speaker
        )?;
        writeln!(f, "{}", HASH_RULE)?;
        writeln!(f)?;
        writeln!(f, "SERMON DETAILS")?;
        writeln!(f, "{}", EQUALS_RULE)?;
        writeln!(f, "Date:    {}", self.date)?;
        writeln!(f, "Title:   {}", self.title)?;
        writeln!(f, "Speaker: {}", self.speaker)?;
        writeln!(f, "Church:  {}", self.channel)?;
        writeln!(f, "URL:     {}", util::watch_url(&self.video_id))?;
        writeln!(f, "{}", EQUALS_RULE)?;
        writeln!(f)?;
        writeln!(f, "{}", self.transcript)
    }
}
