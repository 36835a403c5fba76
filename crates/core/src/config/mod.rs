use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for a story host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub library: LibraryConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Configuration for a single playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Consecutive readings that must arrive before the geofence is queried.
    pub warm_up_readings: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warm_up_readings: 5,
        }
    }
}

/// Where stories live on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Sub-folder of the library root holding one folder per story.
    pub stories_dir: PathBuf,
    /// Extension of the story markup file inside each story folder.
    pub markup_extension: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            stories_dir: PathBuf::from("stories"),
            markup_extension: "xml".to_string(),
        }
    }
}
