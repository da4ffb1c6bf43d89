//! Serializer settings read from a TOML file.
//!
//! # Example
//!
//! ```toml
//! preserve_callable_names = true
//! sequence_gap_limit = 4
//! worklist_compact_threshold = 256
//! include_host_runtime_internals = false
//! ```
//!
//! Every key is optional. Command-line flags win over the file.

use std::path::Path;

use exval_core::Options;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    pub preserve_callable_names: Option<bool>,
    pub sequence_gap_limit: Option<usize>,
    pub worklist_compact_threshold: Option<usize>,
    pub include_host_runtime_internals: Option<bool>,
}

impl CliConfig {
    /// Fold the file's settings into `options`.
    pub fn apply(&self, mut options: Options) -> Options {
        if let Some(on) = self.preserve_callable_names {
            options = options.preserve_callable_names(on);
        }
        if let Some(limit) = self.sequence_gap_limit {
            options = options.sequence_gap_limit(limit);
        }
        if let Some(threshold) = self.worklist_compact_threshold {
            options = options.worklist_compact_threshold(threshold);
        }
        if let Some(on) = self.include_host_runtime_internals {
            options = options.include_host_runtime_internals(on);
        }
        options
    }
}

/// Read `path` if given; no file means every setting stays at its default.
pub fn read_config(path: Option<&Path>) -> Result<CliConfig, String> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}
