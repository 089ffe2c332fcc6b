use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::export::{ViewerConfig, DEFAULT_VIEWER};

pub const DEFAULT_CONFIG_FILE: &str = "storyteller.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("could not create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Settings for the storyteller binary. Every field has a default, so an
/// empty file (or no file) is a valid configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StorytellerConfig {
    #[serde(default = "default_stories_dir")]
    pub stories_dir: PathBuf,

    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Content directory overriding the built-in tables and fragments.
    #[serde(default)]
    pub content_dir: Option<PathBuf>,

    #[serde(default = "default_viewer_program")]
    pub viewer_program: String,

    #[serde(default)]
    pub viewer_interpreter: Option<String>,

    /// Delay between characters of the typewriter display; 0 prints at once.
    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,

    #[serde(default = "default_include_timeline")]
    pub include_timeline: bool,

    /// Fixed seed for reproducible stories; drawn from the clock when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_stories_dir() -> PathBuf {
    PathBuf::from("stories")
}
fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}
fn default_viewer_program() -> String {
    DEFAULT_VIEWER.to_string()
}
fn default_typing_delay_ms() -> u64 {
    12
}
fn default_include_timeline() -> bool {
    true
}

impl Default for StorytellerConfig {
    fn default() -> Self {
        Self {
            stories_dir: default_stories_dir(),
            temp_dir: default_temp_dir(),
            content_dir: None,
            viewer_program: default_viewer_program(),
            viewer_interpreter: None,
            typing_delay_ms: default_typing_delay_ms(),
            include_timeline: default_include_timeline(),
            seed: None,
        }
    }
}

impl StorytellerConfig {
    /// Load from a RON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(content)
    }

    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.stories_dir, &self.temp_dir] {
            fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Viewer settings, with the program looked up in the current directory.
    pub fn viewer(&self) -> ViewerConfig {
        ViewerConfig {
            temp_dir: self.temp_dir.clone(),
            program: self.viewer_program.clone(),
            interpreter: self.viewer_interpreter.clone(),
            working_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_struct_gives_defaults() {
        let config = StorytellerConfig::parse("()").unwrap();
        assert_eq!(config, StorytellerConfig::default());
        assert_eq!(config.stories_dir, PathBuf::from("stories"));
        assert_eq!(config.viewer_program, "custom_storyboard_viewer");
        assert!(config.seed.is_none());
    }

    #[test]
    fn fields_override_defaults() {
        let config = StorytellerConfig::parse(
            r#"(
                stories_dir: "out/stories",
                typing_delay_ms: 0,
                include_timeline: false,
                viewer_interpreter: Some("python3"),
                seed: Some(42),
            )"#,
        )
        .unwrap();
        assert_eq!(config.stories_dir, PathBuf::from("out/stories"));
        assert_eq!(config.temp_dir, PathBuf::from("temp"));
        assert_eq!(config.typing_delay_ms, 0);
        assert!(!config.include_timeline);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.viewer().interpreter.as_deref(), Some("python3"));
    }

    #[test]
    fn missing_file_is_default_and_bad_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = StorytellerConfig::load(&dir.path().join("nope.ron")).unwrap();
        assert_eq!(missing, StorytellerConfig::default());

        let bad = dir.path().join("bad.ron");
        fs::write(&bad, "(stories_dir: 12").unwrap();
        let err = StorytellerConfig::load(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn ensure_directories_creates_both() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorytellerConfig {
            stories_dir: dir.path().join("s"),
            temp_dir: dir.path().join("t"),
            ..StorytellerConfig::default()
        };
        config.ensure_directories().unwrap();
        assert!(dir.path().join("s").is_dir());
        assert!(dir.path().join("t").is_dir());
    }
}
