use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::{Map, Value};

/// Looked for in this order when no config path is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["channels.json", "config.json"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ChannelSource {
    url: String,
    filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub name: String,
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub channels: Vec<ChannelConfig>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("channel '{0}' has no destination file name")]
    MissingFilename(String),
    #[error("channels '{0}' and '{1}' share destination file '{2}'")]
    SharedDestination(String, String, String),
}

/// Parses a `{ "<name>": { "url": ..., "filename": ... } }` document, keeping
/// the order channels appear in.
pub fn parse_channels(text: &str, path: &Path) -> Result<Vec<ChannelConfig>, ConfigError> {
    let parse_err = |source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    };

    let map: Map<String, Value> = serde_json::from_str(text).map_err(parse_err)?;
    let mut channels = Vec::with_capacity(map.len());
    // destination file -> channel
    let mut owners: HashMap<String, String> = HashMap::new();

    for (name, value) in map {
        let source: ChannelSource = serde_json::from_value(value).map_err(parse_err)?;
        let filename = source.filename.trim().to_string();
        if filename.is_empty() {
            return Err(ConfigError::MissingFilename(name));
        }
        if let Some(owner) = owners.get(&filename) {
            return Err(ConfigError::SharedDestination(owner.clone(), name, filename));
        }
        owners.insert(filename.clone(), name.clone());

        channels.push(ChannelConfig {
            name,
            url: source.url.trim().to_string(),
            filename,
        });
    }

    Ok(channels)
}

/// Loads the first candidate that exists. `Ok(None)` when none do.
pub fn load_channels(candidates: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    let path = match candidates.iter().find(|p| p.is_file()) {
        Some(path) => path,
        None => return Ok(None),
    };

    info!("Loading configuration from: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.clone(),
        source,
    })?;
    let channels = parse_channels(&text, path)?;

    Ok(Some(LoadedConfig {
        path: path.clone(),
        channels,
    }))
}
