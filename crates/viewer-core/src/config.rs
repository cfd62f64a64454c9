use pdf_engine::{RgbColor, SaveMode};
use serde::{Deserialize, Serialize};

/// What to do with a highlight rectangle that extends past the page edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Clip the rectangle to the page.
    #[default]
    Clamp,
    /// Fail with an out-of-bounds error.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleLimits {
    pub min: f32,
    pub max: f32,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self { min: 1.0, max: 5.0 }
    }
}

impl ScaleLimits {
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Half-extents of the rectangle placed around a highlight click, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightExtents {
    pub half_width: f32,
    pub half_height: f32,
}

impl Default for HighlightExtents {
    fn default() -> Self {
        Self { half_width: 20.0, half_height: 5.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub scale_limits: ScaleLimits,
    pub initial_scale: f32,
    pub highlight: HighlightExtents,
    pub note_icon_size: f32,
    pub default_highlight_color: RgbColor,
    pub bounds_policy: BoundsPolicy,
    pub save_mode: SaveMode,
    pub render_cache_capacity: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scale_limits: ScaleLimits::default(),
            initial_scale: 1.0,
            highlight: HighlightExtents::default(),
            note_icon_size: 20.0,
            default_highlight_color: RgbColor::YELLOW,
            bounds_policy: BoundsPolicy::Clamp,
            save_mode: SaveMode::Incremental,
            render_cache_capacity: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("scale limits must satisfy 0 < min <= max, got [{min}, {max}]")]
    ScaleLimits { min: f32, max: f32 },
    #[error("{field} must be a positive number, got {value}")]
    NotPositive { field: &'static str, value: f32 },
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ScaleLimits { min, max } = self.scale_limits;
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            return Err(ConfigError::ScaleLimits { min, max });
        }

        let positive = [
            ("initial_scale", self.initial_scale),
            ("highlight.half_width", self.highlight.half_width),
            ("highlight.half_height", self.highlight.half_height),
            ("note_icon_size", self.note_icon_size),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        Ok(())
    }
}
