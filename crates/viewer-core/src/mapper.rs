//! Rendered pixel space to document space.

use crate::config::ScaleLimits;
use pdf_engine::PagePoint;
use serde::{Deserialize, Serialize};

/// A click position on a rendered page, in pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("scale factor must be a positive finite number, got {value}")]
pub struct ScaleError {
    pub value: f32,
}

/// Zoom factor between document points and rendered pixels. Always positive
/// and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct ScaleFactor(f32);

impl ScaleFactor {
    pub const ONE: ScaleFactor = ScaleFactor(1.0);

    pub fn new(value: f32) -> Result<Self, ScaleError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(ScaleError { value })
        }
    }

    /// Validates `value`, then clamps it into `limits`.
    pub fn clamped(value: f32, limits: &ScaleLimits) -> Result<Self, ScaleError> {
        Self::new(value).map(|scale| Self(limits.clamp(scale.0)))
    }

    pub fn get(self) -> f32 {
        self.0
    }

    pub fn to_document_space(self, click: PixelPoint) -> PagePoint {
        to_document_space(click, self.0)
    }
}

/// Componentwise division of a pixel position by the render scale.
///
/// # Panics
///
/// Panics when `scale` is not a positive finite number; callers holding a
/// [`ScaleFactor`] never hit this.
pub fn to_document_space(click: PixelPoint, scale: f32) -> PagePoint {
    assert!(scale.is_finite() && scale > 0.0, "scale factor must be positive, got {scale}");
    PagePoint::new(click.x / scale, click.y / scale)
}
