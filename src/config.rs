//! Engine configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! { "max_loop_iterations": 100000, "call_stack": false }
//! ```

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Ceiling applied to every `while`, `do … while` and `for` loop.
pub const DEFAULT_LOOP_LIMIT: usize = 8192;
/// `JSON.stringify` / dumps stop rendering array elements past this index.
pub const DEFAULT_JSON_ARRAY_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_loop_iterations: usize,
    /// Record `name (line, col)` frames for error reports.
    pub call_stack: bool,
    /// Install the built-in function library on construction.
    pub builtins: bool,
    pub max_json_array_len: usize,
    /// Seed for `Math.rand` / `Math.randInt`; taken from the clock when unset.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_loop_iterations: DEFAULT_LOOP_LIMIT,
            call_stack: true,
            builtins: true,
            max_json_array_len: DEFAULT_JSON_ARRAY_LIMIT,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).with_context(|| "Parsing engine config")
    }
}

/// Read an [`EngineConfig`] from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<EngineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Reading {}", path.display()))?;
    EngineConfig::from_json(&json).with_context(|| format!("Loading {}", path.display()))
}
