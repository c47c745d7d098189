//! Evaluation limits, loadable from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Ceilings that make pathological expressions fail fast instead of hanging.
///
/// Missing fields in a RON file fall back to the defaults:
///
/// ```ron
/// (
///     max_depth: 64,
///     max_repeat: 100,
///     max_sides: 100000,
///     max_keep_combinations: 2000000,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Maximum parenthesis nesting.
    pub max_depth: usize,
    /// Maximum number of dice in one repetition. Weights grow as `faces^count`,
    /// so this also keeps them finite.
    pub max_repeat: u32,
    /// Largest die accepted by `d<N>` / `hd<N>`.
    pub max_sides: u32,
    /// Maximum `faces^count` explored by a keep-highest/lowest selection.
    pub max_keep_combinations: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_repeat: 100,
            max_sides: 100_000,
            max_keep_combinations: 2_000_000,
        }
    }
}

impl EvalConfig {
    /// Load limits from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<EvalConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse limits from a RON string.
    pub fn parse_ron(input: &str) -> Result<EvalConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}
