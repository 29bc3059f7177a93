use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Listing cap when `max_videos` is not set.
const DEFAULT_MAX_VIDEOS: usize = 100;

/// Application configuration, read once at startup from `config.toml`.
///
/// `theme` and `count_timer_ongoing` are required; a file without them is a
/// startup failure. Everything else has a sensible default.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Name of the embedded theme directory (e.g. "dark").
    pub theme: String,
    /// Pause in seconds between processed videos, to soften rate limits.
    pub count_timer_ongoing: u64,

    /// Cap on how many channel entries the link collector requests.
    #[serde(default = "default_max_videos")]
    pub max_videos: usize,
    /// Diagnostic mode: collection, recording and processing all stop after
    /// the first item.
    #[serde(default)]
    pub debug: bool,

    /// Tool overrides; when unset the tools are resolved from PATH.
    #[serde(default)]
    pub ytdlp_bin: Option<PathBuf>,
    #[serde(default)]
    pub ffmpeg_bin: Option<PathBuf>,
    #[serde(default)]
    pub ffprobe_bin: Option<PathBuf>,
}

fn default_max_videos() -> usize {
    DEFAULT_MAX_VIDEOS
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Listing cap honoring diagnostic mode.
    pub fn listing_cap(&self) -> usize {
        if self.debug { 1 } else { self.max_videos }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_minimal_config() {
        let file = write_config("theme = \"dark\"\ncount_timer_ongoing = 5\n");
        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.theme, "dark");
        assert_eq!(cfg.count_timer_ongoing, 5);
        assert_eq!(cfg.max_videos, DEFAULT_MAX_VIDEOS);
        assert!(!cfg.debug);
        assert!(cfg.ytdlp_bin.is_none());
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let file = write_config("theme = \"dark\"\n");
        assert!(AppConfig::load(file.path()).is_err());
    }

    #[test]
    fn debug_mode_caps_the_listing_to_one() {
        let file = write_config(
            "theme = \"light\"\ncount_timer_ongoing = 2\nmax_videos = 40\ndebug = true\n",
        );
        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.listing_cap(), 1);
    }
}
