//! ASH-013: Runner settings from `ash.yaml`.

use super::executor::EngineOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = "ash.yaml";

/// Runner settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Where run journals are written
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Append run events to `<state_dir>/<recipe>/events.jsonl`
    #[serde(default = "default_true")]
    pub journal: bool,

    /// Rewrite legacy recipes in the current format when loaded
    #[serde(default = "default_true")]
    pub auto_upgrade: bool,

    /// Keep `<file>.backup` when upgrading
    #[serde(default = "default_true")]
    pub backup: bool,

    /// Wait for Enter between steps
    #[serde(default = "default_true")]
    pub pause: bool,

    /// Wait for Enter before retrying a step
    #[serde(default = "default_true")]
    pub confirm_retry: bool,

    /// Retries allowed per step; absent means unbounded
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Answer that skips the current step at any prompt
    #[serde(default = "default_skip_token")]
    pub skip_token: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            journal: true,
            auto_upgrade: true,
            backup: true,
            pause: true,
            confirm_retry: true,
            max_retries: None,
            skip_token: default_skip_token(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_skip_token() -> String {
    "!skip".to_string()
}

impl Settings {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            pause: self.pause,
            confirm_retry: self.confirm_retry,
            max_retries: self.max_retries,
        }
    }
}

/// Parse settings from YAML. An empty document yields the defaults.
pub fn parse_settings(yaml: &str) -> Result<Settings, String> {
    if yaml.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("settings parse error: {}", e))
}

/// Load settings from `path`; a missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings, String> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    parse_settings(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ash013_defaults() {
        let s = Settings::default();
        assert_eq!(s.state_dir, PathBuf::from("state"));
        assert!(s.journal && s.auto_upgrade && s.backup && s.pause && s.confirm_retry);
        assert_eq!(s.max_retries, None);
        assert_eq!(s.skip_token, "!skip");
    }

    #[test]
    fn test_ash013_partial_file() {
        let s = parse_settings("pause: false\nmax_retries: 5\n").unwrap();
        assert!(!s.pause);
        assert_eq!(s.max_retries, Some(5));
        assert!(s.journal);
        assert_eq!(s.engine_options().max_retries, Some(5));
    }

    #[test]
    fn test_ash013_empty_document() {
        assert_eq!(parse_settings("  \n").unwrap(), Settings::default());
    }

    #[test]
    fn test_ash013_unknown_key_rejected() {
        let err = parse_settings("paws: true\n").unwrap_err();
        assert!(err.contains("settings parse error"));
    }

    #[test]
    fn test_ash013_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings(&dir.path().join("ash.yaml")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_ash013_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ash.yaml");
        std::fs::write(&path, "state_dir: /var/lib/ash\nskip_token: \"-\"\n").unwrap();
        let s = load_settings(&path).unwrap();
        assert_eq!(s.state_dir, PathBuf::from("/var/lib/ash"));
        assert_eq!(s.skip_token, "-");
    }
}
