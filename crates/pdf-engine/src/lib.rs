//! PDF document model: pages, metadata, annotations, rendering and saving.

mod annotation;
mod document;
mod geometry;
mod metadata;
pub mod render;

#[cfg(any(test, feature = "fixtures"))]
pub mod testing;

use std::path::PathBuf;

pub use annotation::{Annotation, AnnotationKind};
pub use document::{AnnotationHandle, PdfDocument, SaveMode, SaveReport};
pub use geometry::{ColorParseError, PagePoint, PageRect, PageSize, RgbColor};
pub use metadata::DocumentMetadata;
pub use render::{AutoRenderer, PageRenderer, Rasterizer, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("page {page} out of range (page_count={page_count})")]
pub struct PageOutOfRange {
    pub page: u32,
    pub page_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentOpenError {
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF parse error: {0}")]
    Malformed(#[from] lopdf::Error),
    #[error("encrypted PDFs are not supported: {0}")]
    UnsupportedEncryption(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Page(#[from] PageOutOfRange),
    #[error("render scale must be positive and finite, got {0}")]
    InvalidScale(f32),
    #[error("raster of {width}x{height} pixels exceeds the supported size")]
    TooLarge { width: u64, height: u64 },
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error(transparent)]
    Page(#[from] PageOutOfRange),
    #[error(transparent)]
    MalformedColor(#[from] ColorParseError),
    #[error("{what} lies outside page {page} ({width}x{height} pt)")]
    OutOfBounds { page: u32, what: String, width: f32, height: f32 },
    #[error("annotation mode {mode} cannot take {input}")]
    KindMismatch { mode: String, input: String },
    #[error("annotation was already saved or removed")]
    NotRevertible,
    #[error("PDF structure error: {0}")]
    Structure(#[from] lopdf::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("document is encrypted ({filter}); saving would corrupt it")]
    EncryptionConflict { filter: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serialize(String),
}
