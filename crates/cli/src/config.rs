//! CLI configuration
//!
//! Reads `~/.config/anyfs/config.toml`:
//!
//! ```toml
//! dir = "/srv/data"
//!
//! [fs]
//! cwd = "/"
//! missing = "ignore"
//! ```

use std::path::{Path, PathBuf};

use anyfs::FsOptions;
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Disk directory backing the facade (defaults to the working directory)
    pub dir: Option<PathBuf>,
    pub fs: FsOptions,
}

impl CliConfig {
    /// Load from `explicit` if given, else from the default path when it exists
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        let path = Self::default_config_path();
        if path.is_file() {
            Self::load_from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("anyfs")
            .join("config.toml")
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.fs.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyfs::MissingPolicy;

    #[test]
    fn test_parse_full() {
        let config = CliConfig::parse(
            r#"
dir = "/srv/data"

[fs]
cwd = "/projects"
missing = "ignore"
"#,
        )
        .unwrap();
        assert_eq!(config.dir, Some(PathBuf::from("/srv/data")));
        assert_eq!(config.fs.cwd, "/projects");
        assert_eq!(config.fs.root, "/");
        assert_eq!(config.fs.missing, MissingPolicy::Ignore);
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = CliConfig::parse("").unwrap();
        assert!(config.dir.is_none());
        assert_eq!(config.fs, FsOptions::default());
    }

    #[test]
    fn test_rejects_relative_cwd() {
        assert!(CliConfig::parse("[fs]\ncwd = \"rel\"").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = CliConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
