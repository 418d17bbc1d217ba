//! Facade configuration
//!
//! Options can be built in code or read from TOML:
//!
//! ```toml
//! cwd = "/work"
//! root = "/"
//! missing = "strict"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::path::PathResolver;

/// Usage errors, raised synchronously while building a facade
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cwd must be absolute (start with \"/\"): {0}")]
    RelativeCwd(String),

    #[error("root must be absolute (start with \"/\"): {0}")]
    RelativeRoot(String),

    #[error("plugin registered twice: {0}")]
    DuplicatePlugin(String),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How deleting an already-missing path is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Always `ENOENT`
    Strict,
    /// Missing paths count as deleted
    Ignore,
    /// Strict unless the adapter declares `DeleteIgnoreMissing`
    #[default]
    Backend,
}

/// Path and policy options for one facade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsOptions {
    pub cwd: String,
    pub root: String,
    pub missing: MissingPolicy,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            cwd: "/".to_string(),
            root: "/".to_string(),
            missing: MissingPolicy::default(),
        }
    }
}

impl FsOptions {
    /// Parse options from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check that `cwd` and `root` are absolute
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolver().map(drop)
    }

    /// Path resolver for these options
    pub fn resolver(&self) -> Result<PathResolver, ConfigError> {
        PathResolver::new(&self.cwd, &self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = FsOptions::from_toml_str("").unwrap();
        assert_eq!(options, FsOptions::default());
        assert_eq!(options.missing, MissingPolicy::Backend);
    }

    #[test]
    fn test_parse_toml() {
        let options = FsOptions::from_toml_str(
            r#"
cwd = "/work"
missing = "ignore"
"#,
        )
        .unwrap();
        assert_eq!(options.cwd, "/work");
        assert_eq!(options.root, "/");
        assert_eq!(options.missing, MissingPolicy::Ignore);
    }

    #[test]
    fn test_relative_paths_rejected() {
        let err = FsOptions::from_toml_str(r#"cwd = "work""#).unwrap_err();
        assert!(matches!(err, ConfigError::RelativeCwd(_)));

        let err = FsOptions::from_toml_str(r#"missing = "sometimes""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("anyfs.toml");
        std::fs::write(&file, "root = \"/jail\"\nmissing = \"strict\"\n").unwrap();

        let options = FsOptions::load_from_path(&file).unwrap();
        assert_eq!(options.root, "/jail");
        assert_eq!(options.missing, MissingPolicy::Strict);

        let err = FsOptions::load_from_path(&dir.path().join("none.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
