//! Optional TOML configuration for the driver.
//!
//! A project can keep its include paths and predefinitions in a `cpre.toml`
//! next to the sources instead of repeating them on every invocation.
//! Command-line flags are applied after the file, so they win on conflict.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "cpre.toml";

/// On-disk driver configuration.
///
/// Every field defaults to empty so a partial file is fine:
///
/// ```toml
/// include_paths = ["/usr/include", "include"]
/// defines = ["DEBUG", "VERSION=3"]
/// features = ["attribute_deprecated"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// System include search directories, in order.
    #[serde(default)]
    pub include_paths: Vec<String>,

    /// Library search directories.
    #[serde(default)]
    pub library_paths: Vec<String>,

    /// Predefined macros, `NAME` or `NAME=VALUE`.
    #[serde(default)]
    pub defines: Vec<String>,

    /// Names undefined before lexing starts.
    #[serde(default)]
    pub undefs: Vec<String>,

    /// Names answered by `__has_builtin`.
    #[serde(default)]
    pub builtins: Vec<String>,

    /// Names answered by `__has_feature`.
    #[serde(default)]
    pub features: Vec<String>,

    /// Names answered by `__has_extension`.
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl FileConfig {
    /// Loads and parses a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<FileConfig> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file '{}'", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("cannot parse config file '{}'", path.display()))
    }
}

/// Splits a `NAME[=VALUE]` definition into its parts.
pub fn split_define(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (spec, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_define() {
        assert_eq!(split_define("DEBUG"), ("DEBUG", None));
        assert_eq!(split_define("VERSION=3"), ("VERSION", Some("3")));
        assert_eq!(split_define("S=\"a=b\""), ("S", Some("\"a=b\"")));
    }

    #[test]
    fn test_partial_config_parses() {
        let config: FileConfig = toml::from_str("defines = [\"A=1\"]").unwrap();
        assert_eq!(config.defines, vec!["A=1"]);
        assert!(config.include_paths.is_empty());
    }

    #[test]
    fn test_empty_config_parses() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
    }
}
