//! Parser and generator configuration
//!
//! Both configs are plain serde structs so an application can embed them in
//! its own configuration file; [`TextConfig`] bundles them and can be loaded
//! from TOML or JSON directly.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default limit on header fields per message
pub const DEFAULT_MAX_HEADER_FIELDS: usize = 256;

/// Default limit on a declared body length (16 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Limits and tolerances of [`MessageParser`](crate::message::MessageParser)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Header lines accepted per message before it is rejected as invalid
    pub max_header_fields: usize,
    /// Largest declared body length accepted
    pub max_body_size: usize,
    /// Whether whitespace-prefixed continuation lines extend the previous
    /// field; when disabled they are skipped as malformed
    pub allow_folding: bool,
    /// Whether bare CR/LF keep-alives before a start-line are ignored
    pub skip_leading_empty_lines: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_header_fields: DEFAULT_MAX_HEADER_FIELDS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            allow_folding: true,
            skip_leading_empty_lines: true,
        }
    }
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_header_fields(mut self, max: usize) -> Self {
        self.max_header_fields = max;
        self
    }

    pub fn with_max_body_size(mut self, max: usize) -> Self {
        self.max_body_size = max;
        self
    }

    pub fn with_folding(mut self, allow: bool) -> Self {
        self.allow_folding = allow;
        self
    }

    pub fn with_leading_empty_lines_skipped(mut self, skip: bool) -> Self {
        self.skip_leading_empty_lines = skip;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_header_fields == 0 {
            return Err(Error::Config("max_header_fields must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Output pacing of [`MessageGenerator`](crate::message::MessageGenerator)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Most body bytes emitted per generator step, `0` for no limit
    pub max_body_chunk: usize,
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_body_chunk(mut self, max: usize) -> Self {
        self.max_body_chunk = max;
        self
    }

    /// Body bytes one step may emit given `available` output room
    pub(crate) fn chunk_limit(&self, available: usize) -> usize {
        match self.max_body_chunk {
            0 => available,
            max => available.min(max),
        }
    }

    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Combined toolkit configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub parser: ParserConfig,
    pub generator: GeneratorConfig,
}

impl TextConfig {
    /// Parses and validates a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a file, choosing the format by extension (`.json`, anything
    /// else is read as TOML)
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.parser.validate()?;
        self.generator.validate()
    }
}
