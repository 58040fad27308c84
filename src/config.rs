use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

use crate::error::ConfigError;

pub const DEPTH_RANGE: RangeInclusive<u32> = 0..=10;
pub const DEFAULT_DEPTH: u32 = 8;

pub const SPACING_RANGE: RangeInclusive<f32> = 0.0..=50.0;
pub const DEFAULT_SPACING: f32 = 20.0;
pub const SPACING_STEP: f32 = 0.1;

/// The two user-adjustable view settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    /// Deepest level drawn (root = 0)
    pub depth_limit: u32,
    /// Distance between neighbouring siblings
    pub node_spacing: f32,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            depth_limit: DEFAULT_DEPTH,
            node_spacing: DEFAULT_SPACING,
        }
    }
}

impl ViewParams {
    pub fn new(depth_limit: u32, node_spacing: f32) -> Self {
        Self {
            depth_limit,
            node_spacing,
        }
        .clamped()
    }

    /// Force both values into their allowed ranges
    pub fn clamped(self) -> Self {
        let node_spacing = if self.node_spacing.is_finite() {
            self.node_spacing
                .clamp(*SPACING_RANGE.start(), *SPACING_RANGE.end())
        } else {
            DEFAULT_SPACING
        };
        Self {
            depth_limit: self
                .depth_limit
                .clamp(*DEPTH_RANGE.start(), *DEPTH_RANGE.end()),
            node_spacing,
        }
    }

    /// Overlay command-line values on top of these
    pub fn with_overrides(self, depth_limit: Option<u32>, node_spacing: Option<f32>) -> Self {
        Self {
            depth_limit: depth_limit.unwrap_or(self.depth_limit),
            node_spacing: node_spacing.unwrap_or(self.node_spacing),
        }
        .clamped()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let params: ViewParams =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("Loaded parameters from {}: {:?}", path.display(), params);
        Ok(params.clamped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let params = ViewParams::default();
        assert_eq!(params.depth_limit, 8);
        assert!((params.node_spacing - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clamping() {
        let params = ViewParams::new(42, -3.0);
        assert_eq!(params.depth_limit, 10);
        assert_eq!(params.node_spacing, 0.0);

        let params = ViewParams::new(3, f32::NAN);
        assert_eq!(params.node_spacing, DEFAULT_SPACING);
    }

    #[test]
    fn test_overrides() {
        let params = ViewParams::default().with_overrides(Some(2), None);
        assert_eq!(params.depth_limit, 2);
        assert_eq!(params.node_spacing, DEFAULT_SPACING);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "node_spacing": 75.0 }}"#).unwrap();

        let params = ViewParams::load(file.path()).unwrap();
        assert_eq!(params.depth_limit, DEFAULT_DEPTH);
        assert_eq!(params.node_spacing, 50.0);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "depth = 3").unwrap();

        assert!(matches!(
            ViewParams::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
