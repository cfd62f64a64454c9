//! Click-to-annotate viewer logic on top of `pdf-engine`.
//!
//! A [`Viewer`] owns a [`DocumentSession`] (the open document, its zoom scale
//! and per-page rasters). Clicks are mapped from rendered pixels to document
//! space and handed to the [`AnnotationApplier`].

pub mod applier;
pub mod cache;
pub mod config;
pub mod mapper;
pub mod session;
pub mod tool;
pub mod viewer;

use pdf_engine::{AnnotationError, DocumentOpenError, PersistError, RenderError};

pub use applier::{list_annotation_texts, AnnotationApplier, AnnotationPayload, ApplyOutcome};
pub use cache::RenderCache;
pub use config::{BoundsPolicy, ConfigError, HighlightExtents, ScaleLimits, ViewerConfig};
pub use mapper::{to_document_space, PixelPoint, ScaleError, ScaleFactor};
pub use session::DocumentSession;
pub use tool::{AnnotationMode, AnnotationTool, ColorInput, UnknownMode};
pub use viewer::{FixedText, TextPrompt, Viewer, ViewerCommand, ViewerEvent};

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Open(#[from] DocumentOpenError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Scale(#[from] ScaleError),
}
