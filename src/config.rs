//! Runtime configuration loaded from TOML
//!
//! Every field has a default, so an empty document is a valid configuration.

use crate::error::{ObjectError, Result};
use crate::logging::{LogConfig, LogFormat, LogOutput};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub tree: TreeConfig,

    #[serde(default)]
    pub root: RootConfig,

    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Deepest level the `tree` command descends into
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    /// Refuse a second parent-less object while one is alive
    #[serde(default)]
    pub single_root: bool,

    #[serde(default)]
    pub no_interact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormatName,

    #[serde(default)]
    pub output: LogOutputName,

    #[serde(default = "default_log_dir")]
    pub directory: String,

    #[serde(default = "default_log_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatName {
    Pretty,
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutputName {
    Stdout,
    #[default]
    Stderr,
    File,
}

fn default_max_depth() -> usize {
    100
}

fn default_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "objtree".to_string()
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { max_depth: default_max_depth() }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormatName::default(),
            output: LogOutputName::default(),
            directory: default_log_dir(),
            prefix: default_log_prefix(),
            filter: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| ObjectError::config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ObjectError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Apply `OBJTREE_*` environment overrides on top of the loaded values
    pub fn apply_env(mut self) -> Self {
        if let Ok(depth) = std::env::var("OBJTREE_MAX_DEPTH") {
            if let Ok(depth) = depth.parse() {
                self.tree.max_depth = depth;
            }
        }
        if let Ok(val) = std::env::var("OBJTREE_SINGLE_ROOT") {
            self.root.single_root = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(level) = std::env::var("OBJTREE_LOG_LEVEL") {
            self.log.level = level;
        }
        self
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ObjectError::config(e.to_string()))
    }

    /// Build the logging configuration described by the `[log]` section
    pub fn log_config(&self) -> LogConfig {
        let format = match self.log.format {
            LogFormatName::Pretty => LogFormat::Pretty,
            LogFormatName::Compact => LogFormat::Compact,
            LogFormatName::Json => LogFormat::Json,
        };
        let output = match self.log.output {
            LogOutputName::Stdout => LogOutput::Stdout,
            LogOutputName::Stderr => LogOutput::Stderr,
            LogOutputName::File => LogOutput::File {
                directory: self.log.directory.clone(),
                prefix: self.log.prefix.clone(),
            },
        };

        let mut config = LogConfig::new()
            .with_level(crate::logging::parse_level(&self.log.level))
            .with_format(format)
            .with_output(output);
        if let Some(filter) = &self.log.filter {
            config = config.with_filter(filter.clone());
        }
        config
    }
}
