use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Directories to scan for scores (used when `batch` has no CLI args).
    pub score_dirs: Vec<PathBuf>,
    /// Where `.light` files go. Unset writes next to each score.
    pub output_dir: Option<PathBuf>,
    /// Output files are named `<stem>_<suffix>.light`.
    pub output_suffix: String,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            score_dirs: Vec::new(),
            output_dir: None,
            output_suffix: "lights".to_string(),
            workers: 0,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/lightgen/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(AppConfig::parse("").unwrap(), AppConfig::default());
        assert_eq!(AppConfig::default().output_suffix, "lights");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::parse(
            r#"
score_dirs = ["/music/tabs"]
workers = 3
"#,
        )
        .unwrap();
        assert_eq!(config.score_dirs, vec![PathBuf::from("/music/tabs")]);
        assert_eq!(config.resolve_workers(), 3);
        assert_eq!(config.output_suffix, "lights");
        assert!(config.output_dir.is_none());
    }

    #[test]
    fn auto_workers_is_at_least_one() {
        assert!(AppConfig::default().resolve_workers() >= 1);
    }

    #[test]
    fn bad_types_are_rejected() {
        assert!(AppConfig::parse("workers = \"many\"").is_err());
    }
}
