//! Configuration loading for the command line tool.
//!
//! `defaults/parser.default.toml` is embedded into the binary so the documented
//! defaults and the runtime defaults never drift apart. User files and
//! command line overrides are layered on top with [`Loader`] before the
//! result is deserialized into [`ParserConfig`].

use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat, ValueKind};
use serde::Deserialize;

use crate::oci::api::{PolicyOptions, RuleOptions};
use crate::oci::error::ParseError;

const DEFAULT_TOML: &str = include_str!("../../defaults/parser.default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    pub policy: PolicyOptions,
    pub rules: RuleOptions,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One document holding the whole payload.
    Json,
    /// One JSON object per statement or rule, one per line.
    Jsonl,
    Yaml,
}

/// Layers user configuration over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a TOML file. A missing file is an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Set one dotted key, e.g. `policy.define_subs`.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ParseError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Set `key` only when `value` is present.
    pub fn set_override_option<I>(self, key: &str, value: Option<I>) -> Result<Self, ParseError>
    where
        I: Into<ValueKind>,
    {
        match value {
            Some(value) => self.set_override(key, value),
            None => Ok(self),
        }
    }

    pub fn build(self) -> Result<ParserConfig, ParseError> {
        Ok(self.builder.build()?.try_deserialize()?)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in defaults alone.
pub fn load_defaults() -> Result<ParserConfig, ParseError> {
    Loader::new().build()
}
