//! Scene Settings
//!
//! Tuning knobs for the update pipeline. Every field has a default, so a
//! partial JSON document only overrides what it names.
//!
//! ```rust,ignore
//! use myth_scene::{Scene, SceneSettings};
//!
//! let settings = SceneSettings::from_json_str(r#"{ "parallel_threshold": 64 }"#)?;
//! let scene = Scene::with_settings(settings);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Longest parent chain the hierarchy sort follows. Deeper (or cyclic)
    /// chains are resolved as roots.
    pub max_hierarchy_depth: usize,

    /// Minimum table length before the transform and armature systems split
    /// work across the rayon pool.
    pub parallel_threshold: usize,

    /// Re-sort the hierarchy table immediately on `attach`/`detach` instead of
    /// deferring to the next `update`.
    pub sort_hierarchy_on_attach: bool,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            max_hierarchy_depth: 256,
            parallel_threshold: 256,
            sort_hierarchy_on_attach: false,
        }
    }
}

impl SceneSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = SceneSettings::from_json_str(r#"{ "parallel_threshold": 8 }"#).unwrap();
        assert_eq!(settings.parallel_threshold, 8);
        assert_eq!(settings.max_hierarchy_depth, 256);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(SceneSettings::from_json_str("{ nope").is_err());
    }
}
