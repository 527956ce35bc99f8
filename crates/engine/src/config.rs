#![forbid(unsafe_code)]

//! Session settings.
//!
//! - `SPROUT_ROOT_LABEL`: text of the root seeded into an empty project
//! - `SPROUT_ROOT_X` / `SPROUT_ROOT_Y`: where that root is placed
//! - `SPROUT_TAG_PROPAGATE`: `1`/`true` makes tag edits cover descendants by default

use crate::error::{EngineError, EngineResult};
use sp_core::Position;

pub const DEFAULT_ROOT_LABEL: &str = "Type your topic";
pub const DEFAULT_ROOT_POSITION: Position = Position::new(300.0, 300.0);

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub root_label: String,
    pub root_position: Position,
    pub propagate_tags: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_label: DEFAULT_ROOT_LABEL.to_string(),
            root_position: DEFAULT_ROOT_POSITION,
            propagate_tags: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let coord = |name: &str, fallback: f64| {
            env_var(name)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(fallback)
        };
        Self {
            root_label: env_var("SPROUT_ROOT_LABEL").unwrap_or(defaults.root_label),
            root_position: Position::new(
                coord("SPROUT_ROOT_X", defaults.root_position.x),
                coord("SPROUT_ROOT_Y", defaults.root_position.y),
            ),
            propagate_tags: env_var("SPROUT_TAG_PROPAGATE")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.propagate_tags),
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.root_label.trim().is_empty() {
            return Err(EngineError::Config("root label cannot be empty".to_string()));
        }
        if !self.root_position.x.is_finite() || !self.root_position.y.is_finite() {
            return Err(EngineError::Config("root position must be finite".to_string()));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
