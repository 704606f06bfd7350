//! metastage configuration system
//!
//! Supports a project-level configuration file with environment overrides.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Environment variables (METASTAGE_MAX_DEPTH, METASTAGE_MAX_UNROLL)
//! 3. Explicit --config file, or ./metastage.toml
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```rust
//! use metastage::util::config::load_config;
//!
//! let config = load_config(None).unwrap();
//! assert_eq!(config.translation.max_recursion_depth, 1000);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project-level config file
pub const CONFIG_FILE_NAME: &str = "metastage.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StageConfig {
    /// Translation (meta stage) limits
    #[serde(default)]
    pub translation: TranslationConfig,
    /// Diagnostic rendering
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

/// Translation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationConfig {
    /// Maximum nesting of meta-stage calls and mauto expansions
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: usize,
    /// Maximum number of iterations a meta loop may unroll
    #[serde(default = "default_max_unroll")]
    pub max_unroll: usize,
    /// Print compile-time output (meta-stage `print`) while translating
    #[serde(default = "default_true")]
    pub echo_meta_output: bool,
}

fn default_max_recursion_depth() -> usize {
    1000
}

fn default_max_unroll() -> usize {
    100_000
}

fn default_true() -> bool {
    true
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 1000,
            max_unroll: 100_000,
            echo_meta_output: true,
        }
    }
}

/// Diagnostics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticsConfig {
    /// Enable coloured output
    #[serde(default = "default_true")]
    pub colors: bool,
    /// Show the offending source line
    #[serde(default = "default_true")]
    pub show_source: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            colors: true,
            show_source: true,
        }
    }
}

/// Log configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Level name: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },
}

/// Parse configuration from TOML text
pub fn parse_config(content: &str) -> Result<StageConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load configuration
///
/// Uses `path` when given, otherwise `./metastage.toml` if it exists,
/// otherwise the defaults. Environment overrides are applied last.
pub fn load_config(path: Option<&Path>) -> Result<StageConfig, ConfigError> {
    let candidate = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            local.exists().then_some(local)
        }
    };

    let mut config = match candidate {
        Some(p) => {
            let content = fs::read_to_string(&p).map_err(|source| ConfigError::IoError {
                path: p.clone(),
                source,
            })?;
            tracing::debug!("Loaded config from {}", p.display());
            parse_config(&content)?
        }
        None => StageConfig::default(),
    };

    apply_env_overrides(&mut config, std::env::vars())?;
    Ok(config)
}

/// Apply `METASTAGE_*` overrides from an environment iterator
pub fn apply_env_overrides(
    config: &mut StageConfig,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<(), ConfigError> {
    for (var, value) in vars {
        let target = match var.as_str() {
            "METASTAGE_MAX_DEPTH" => &mut config.translation.max_recursion_depth,
            "METASTAGE_MAX_UNROLL" => &mut config.translation.max_unroll,
            _ => continue,
        };
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StageConfig::default();
        assert_eq!(config.translation.max_recursion_depth, 1000);
        assert_eq!(config.translation.max_unroll, 100_000);
        assert!(config.translation.echo_meta_output);
        assert!(config.diagnostics.colors);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
[translation]
max_unroll = 64

[diagnostics]
colors = false
"#,
        )
        .unwrap();
        assert_eq!(config.translation.max_unroll, 64);
        assert_eq!(config.translation.max_recursion_depth, 1000);
        assert!(!config.diagnostics.colors);
        assert!(config.diagnostics.show_source);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = StageConfig::default();
        apply_env_overrides(
            &mut config,
            vec![
                ("METASTAGE_MAX_DEPTH".to_string(), "12".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(config.translation.max_recursion_depth, 12);

        let err = apply_env_overrides(
            &mut config,
            vec![("METASTAGE_MAX_UNROLL".to_string(), "lots".to_string())],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[log]\nlevel = \"debug\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.log.level, "debug");

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::IoError { .. })
        ));
    }
}
