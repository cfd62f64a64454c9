use pdf_engine::{AnnotationKind, ColorParseError, RgbColor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which annotation a click places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationMode {
    #[default]
    None,
    Highlight,
    Comment,
    TextNote,
}

impl AnnotationMode {
    pub fn kind(self) -> Option<AnnotationKind> {
        match self {
            AnnotationMode::None => None,
            AnnotationMode::Highlight => Some(AnnotationKind::Highlight),
            AnnotationMode::Comment => Some(AnnotationKind::Comment),
            AnnotationMode::TextNote => Some(AnnotationKind::TextNote),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationMode::None => "none",
            AnnotationMode::Highlight => "highlight",
            AnnotationMode::Comment => "comment",
            AnnotationMode::TextNote => "text_note",
        }
    }
}

impl fmt::Display for AnnotationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown annotation mode {0:?} (expected none, highlight, comment or text_note)")]
pub struct UnknownMode(pub String);

impl FromStr for AnnotationMode {
    type Err = UnknownMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(AnnotationMode::None),
            "highlight" => Ok(AnnotationMode::Highlight),
            "comment" => Ok(AnnotationMode::Comment),
            "text_note" | "text-note" | "note" => Ok(AnnotationMode::TextNote),
            _ => Err(UnknownMode(value.to_owned())),
        }
    }
}

/// Colour as a caller hands it over: a hex string or channel values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorInput {
    Hex(String),
    Rgb(u8, u8, u8),
}

impl ColorInput {
    pub fn resolve(&self) -> Result<RgbColor, ColorParseError> {
        match self {
            ColorInput::Hex(hex) => RgbColor::from_hex(hex),
            ColorInput::Rgb(r, g, b) => Ok(RgbColor::new(*r, *g, *b)),
        }
    }
}

impl From<&str> for ColorInput {
    fn from(value: &str) -> Self {
        ColorInput::Hex(value.to_owned())
    }
}

impl From<(u8, u8, u8)> for ColorInput {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        ColorInput::Rgb(r, g, b)
    }
}

/// Current annotation mode plus the colour used for highlights.
///
/// Changing the mode without a colour keeps the colour picked earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnotationTool {
    mode: AnnotationMode,
    color: Option<RgbColor>,
}

impl AnnotationTool {
    pub fn mode(&self) -> AnnotationMode {
        self.mode
    }

    pub fn color(&self) -> Option<RgbColor> {
        self.color
    }

    /// Colour for the next highlight, `fallback` when none was ever chosen.
    pub fn highlight_color(&self, fallback: RgbColor) -> RgbColor {
        self.color.unwrap_or(fallback)
    }

    /// Switches mode. A malformed colour leaves the tool untouched.
    pub fn set(&mut self, mode: AnnotationMode, color: Option<&ColorInput>) -> Result<(), ColorParseError> {
        let color = color.map(ColorInput::resolve).transpose()?;

        self.mode = mode;
        if color.is_some() {
            self.color = color;
        }
        Ok(())
    }
}
