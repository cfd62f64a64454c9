//! Command surface a UI shell drives.

use crate::applier::{list_annotation_texts, AnnotationApplier, AnnotationPayload, ApplyOutcome};
use crate::config::ViewerConfig;
use crate::mapper::PixelPoint;
use crate::session::DocumentSession;
use crate::tool::{AnnotationMode, AnnotationTool, ColorInput};
use crate::ViewerError;
use pdf_engine::{
    AnnotationError, AnnotationKind, DocumentOpenError, PageRenderer, Rasterizer, RenderError,
    RgbColor, RgbaImage, SaveReport,
};
use std::path::{Path, PathBuf};

/// Asks the user for the body of a comment or note. `None` means cancelled.
pub trait TextPrompt {
    fn prompt(&mut self, kind: AnnotationKind, page: u32) -> Option<String>;
}

impl<F> TextPrompt for F
where
    F: FnMut(AnnotationKind, u32) -> Option<String>,
{
    fn prompt(&mut self, kind: AnnotationKind, page: u32) -> Option<String> {
        self(kind, page)
    }
}

/// Hands out one fixed answer, for headless use.
#[derive(Debug, Clone, Default)]
pub struct FixedText(pub Option<String>);

impl TextPrompt for FixedText {
    fn prompt(&mut self, _kind: AnnotationKind, _page: u32) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    SetAnnotationMode { mode: AnnotationMode, color: Option<ColorInput> },
    Click { page: u32, position: PixelPoint },
    Zoom { scale: f32 },
    Save,
    SaveAs { path: PathBuf },
}

impl ViewerCommand {
    fn failure_prefix(&self) -> &'static str {
        match self {
            ViewerCommand::SetAnnotationMode { .. } => "Failed to set annotation mode",
            ViewerCommand::Click { .. } => "Failed to annotate PDF",
            ViewerCommand::Zoom { .. } => "Failed to zoom PDF",
            ViewerCommand::Save | ViewerCommand::SaveAs { .. } => "Failed to save annotations",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    ModeChanged { mode: AnnotationMode, color: Option<RgbColor> },
    /// A click while no annotation mode is active.
    Ignored,
    /// The prompt was cancelled or returned empty text.
    Skipped { page: u32 },
    /// An annotation was added and `page` re-rendered. `texts` lists the
    /// page's comment and note bodies after a comment or note was added.
    Annotated { page: u32, kind: AnnotationKind, texts: Vec<String> },
    Zoomed { scale: f32 },
    Saved { report: SaveReport },
    Failed { message: String },
}

/// Owns a [`DocumentSession`] and turns UI commands into session operations.
pub struct Viewer<P, R = Rasterizer> {
    session: DocumentSession<R>,
    tool: AnnotationTool,
    applier: AnnotationApplier,
    default_color: RgbColor,
    prompt: P,
}

impl<P: TextPrompt> Viewer<P, Rasterizer> {
    pub fn open(path: impl AsRef<Path>, config: &ViewerConfig, prompt: P) -> Result<Self, DocumentOpenError> {
        let session = DocumentSession::open(path, config)?;
        Ok(Self::with_session(session, config, prompt))
    }
}

impl<P: TextPrompt, R: PageRenderer> Viewer<P, R> {
    pub fn with_session(session: DocumentSession<R>, config: &ViewerConfig, prompt: P) -> Self {
        Self {
            session,
            tool: AnnotationTool::default(),
            applier: AnnotationApplier::new(config),
            default_color: config.default_highlight_color,
            prompt,
        }
    }

    pub fn session(&self) -> &DocumentSession<R> {
        &self.session
    }

    pub fn tool(&self) -> &AnnotationTool {
        &self.tool
    }

    pub fn prompt_mut(&mut self) -> &mut P {
        &mut self.prompt
    }

    pub fn page_image(&mut self, page: u32) -> Result<&RgbaImage, RenderError> {
        self.session.page_image(page)
    }

    pub fn set_annotation_mode(
        &mut self,
        mode: AnnotationMode,
        color: Option<ColorInput>,
    ) -> Result<ViewerEvent, ViewerError> {
        self.tool.set(mode, color.as_ref()).map_err(AnnotationError::from)?;
        log::debug!("annotation mode set to {mode}");
        Ok(ViewerEvent::ModeChanged { mode, color: self.tool.color() })
    }

    pub fn on_click(&mut self, page: u32, position: PixelPoint) -> Result<ViewerEvent, ViewerError> {
        let Some(kind) = self.tool.mode().kind() else {
            return Ok(ViewerEvent::Ignored);
        };

        let point = self.session.scale().to_document_space(position);
        let payload = match kind {
            AnnotationKind::Highlight => {
                AnnotationPayload::Color(self.tool.highlight_color(self.default_color))
            }
            _ => {
                self.session.page_size(page).map_err(AnnotationError::from)?;
                match self.prompt.prompt(kind, page) {
                    Some(text) => AnnotationPayload::Text(text),
                    None => return Ok(ViewerEvent::Skipped { page }),
                }
            }
        };

        let skipped = matches!(
            self.applier.apply(&mut self.session, page, point, kind, payload)?,
            ApplyOutcome::Skipped
        );
        if skipped {
            return Ok(ViewerEvent::Skipped { page });
        }

        let texts = if kind == AnnotationKind::Highlight {
            Vec::new()
        } else {
            list_annotation_texts(&self.session, page).map_err(AnnotationError::from)?
        };
        Ok(ViewerEvent::Annotated { page, kind, texts })
    }

    /// Re-renders as many pages as the cache holds at the new scale, then
    /// switches to it. A failed render keeps the previous scale and rasters.
    pub fn zoom(&mut self, scale: f32) -> Result<ViewerEvent, ViewerError> {
        let applied = self.session.rescale(scale, self.session.page_count())?;
        log::debug!("zoomed to {}x", applied.get());
        Ok(ViewerEvent::Zoomed { scale: applied.get() })
    }

    pub fn save(&mut self) -> Result<ViewerEvent, ViewerError> {
        let report = self.session.save()?;
        Ok(ViewerEvent::Saved { report })
    }

    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<ViewerEvent, ViewerError> {
        let report = self.session.save_as(path)?;
        Ok(ViewerEvent::Saved { report })
    }

    pub fn dispatch(&mut self, command: ViewerCommand) -> Result<ViewerEvent, ViewerError> {
        match command {
            ViewerCommand::SetAnnotationMode { mode, color } => self.set_annotation_mode(mode, color),
            ViewerCommand::Click { page, position } => self.on_click(page, position),
            ViewerCommand::Zoom { scale } => self.zoom(scale),
            ViewerCommand::Save => self.save(),
            ViewerCommand::SaveAs { path } => self.save_as(path),
        }
    }

    /// Runs `command`, turning any failure into a logged
    /// [`ViewerEvent::Failed`]. The session is left as it was before the
    /// failed command.
    pub fn handle(&mut self, command: ViewerCommand) -> ViewerEvent {
        let prefix = command.failure_prefix();

        match self.dispatch(command) {
            Ok(event) => event,
            Err(err) => {
                log::error!("{prefix}: {err}");
                ViewerEvent::Failed { message: format!("{prefix}: {err}") }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::testing::{encrypted_pdf, sample_pdf};
    use pdf_engine::{Annotation, PageRect, PdfDocument, PersistError};
    use std::fs;

    fn viewer_on(
        bytes: Vec<u8>,
        prompt: FixedText,
    ) -> (tempfile::TempDir, PathBuf, Viewer<FixedText>) {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("doc.pdf");
        fs::write(&path, bytes).expect("fixture should be written");

        let viewer = Viewer::open(&path, &ViewerConfig::default(), prompt).expect("open should succeed");
        (temp, path, viewer)
    }

    #[test]
    fn highlight_click_scenario_through_commands() {
        let (_temp, path, mut viewer) = viewer_on(sample_pdf(3), FixedText(None));

        viewer.handle(ViewerCommand::Zoom { scale: 2.0 });
        let mode = viewer.handle(ViewerCommand::SetAnnotationMode {
            mode: AnnotationMode::Highlight,
            color: Some(ColorInput::from("#00FF00")),
        });
        assert!(matches!(mode, ViewerEvent::ModeChanged { mode: AnnotationMode::Highlight, .. }));

        let event = viewer.handle(ViewerCommand::Click { page: 0, position: PixelPoint::new(100.0, 40.0) });
        assert_eq!(event, ViewerEvent::Annotated { page: 0, kind: AnnotationKind::Highlight, texts: vec![] });
        assert!(matches!(viewer.handle(ViewerCommand::Save), ViewerEvent::Saved { .. }));

        let reopened = PdfDocument::open(&path).expect("reopen should succeed");
        assert_eq!(
            reopened.annotations(0).expect("page exists"),
            vec![Annotation::Highlight {
                rect: PageRect::new(30.0, 15.0, 70.0, 25.0),
                color: RgbColor::new(0, 255, 0),
            }]
        );
    }

    #[test]
    fn comment_event_lists_page_texts() {
        let (_temp, _path, mut viewer) = viewer_on(sample_pdf(1), FixedText(Some("looks good".into())));

        viewer.set_annotation_mode(AnnotationMode::Comment, None).expect("mode should be set");
        let event = viewer.on_click(0, PixelPoint::new(50.0, 50.0)).expect("click should succeed");

        assert_eq!(
            event,
            ViewerEvent::Annotated { page: 0, kind: AnnotationKind::Comment, texts: vec!["looks good".into()] }
        );
    }

    #[test]
    fn cancelled_and_empty_prompts_add_nothing() {
        let (_temp, _path, mut viewer) = viewer_on(sample_pdf(1), FixedText(None));
        viewer.set_annotation_mode(AnnotationMode::TextNote, None).expect("mode should be set");

        assert_eq!(
            viewer.on_click(0, PixelPoint::new(5.0, 5.0)).expect("click should succeed"),
            ViewerEvent::Skipped { page: 0 }
        );

        viewer.prompt_mut().0 = Some(String::new());
        assert_eq!(
            viewer.on_click(0, PixelPoint::new(5.0, 5.0)).expect("click should succeed"),
            ViewerEvent::Skipped { page: 0 }
        );
        assert!(!viewer.session().is_modified());
    }

    #[test]
    fn clicks_without_mode_are_ignored() {
        let (_temp, _path, mut viewer) = viewer_on(sample_pdf(1), FixedText(None));

        assert_eq!(
            viewer.on_click(0, PixelPoint::new(5.0, 5.0)).expect("click should succeed"),
            ViewerEvent::Ignored
        );
    }

    #[test]
    fn closure_prompts_receive_kind_and_page() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("doc.pdf");
        fs::write(&path, sample_pdf(2)).expect("fixture should be written");

        let mut seen = Vec::new();
        {
            let prompt = |kind: AnnotationKind, page: u32| {
                seen.push((kind, page));
                Some("noted".to_owned())
            };
            let mut viewer = Viewer::open(&path, &ViewerConfig::default(), prompt).expect("open should succeed");
            viewer.set_annotation_mode(AnnotationMode::TextNote, None).expect("mode should be set");
            viewer.on_click(1, PixelPoint::new(20.0, 20.0)).expect("click should succeed");
        }

        assert_eq!(seen, vec![(AnnotationKind::TextNote, 1)]);
    }

    #[test]
    fn failures_become_messages() {
        let (_temp, _path, mut viewer) = viewer_on(sample_pdf(1), FixedText(None));
        viewer.set_annotation_mode(AnnotationMode::Highlight, None).expect("mode should be set");

        let event = viewer.handle(ViewerCommand::Click { page: 9, position: PixelPoint::new(1.0, 1.0) });
        let ViewerEvent::Failed { message } = event else {
            panic!("expected a failure event, got {event:?}");
        };
        assert!(message.starts_with("Failed to annotate PDF: "), "{message}");

        let zoom = viewer.handle(ViewerCommand::Zoom { scale: -1.0 });
        assert!(matches!(zoom, ViewerEvent::Failed { message } if message.starts_with("Failed to zoom PDF")));

        let color = viewer.handle(ViewerCommand::SetAnnotationMode {
            mode: AnnotationMode::Highlight,
            color: Some(ColorInput::from("nope")),
        });
        assert!(matches!(color, ViewerEvent::Failed { .. }));
    }

    #[test]
    fn zoom_clamps_and_rerenders() {
        let (_temp, _path, mut viewer) = viewer_on(sample_pdf(2), FixedText(None));

        assert_eq!(viewer.zoom(8.0).expect("zoom should succeed"), ViewerEvent::Zoomed { scale: 5.0 });
        assert!(viewer.session().cached_image(1).is_some());
        assert_eq!(viewer.page_image(0).expect("render should succeed").width(), 3060);
    }

    /// Built-in rendering up to a scale, a backend error above it.
    struct LimitedRenderer {
        max_scale: f32,
    }

    impl PageRenderer for LimitedRenderer {
        fn render_page(&self, document: &PdfDocument, page_index: u32, scale: f32) -> Result<RgbaImage, RenderError> {
            if scale > self.max_scale {
                return Err(RenderError::Backend("out of memory".into()));
            }
            Rasterizer::default().render_page(document, page_index, scale)
        }
    }

    #[test]
    fn failed_zoom_keeps_previous_scale_and_rasters() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("doc.pdf");
        fs::write(&path, sample_pdf(2)).expect("fixture should be written");

        let config = ViewerConfig::default();
        let session = DocumentSession::open_with_renderer(&path, &config, LimitedRenderer { max_scale: 2.0 })
            .expect("open should succeed");
        let mut viewer = Viewer::with_session(session, &config, FixedText(None));
        assert_eq!(viewer.page_image(0).expect("render should succeed").width(), 612);

        let event = viewer.handle(ViewerCommand::Zoom { scale: 3.0 });
        assert!(matches!(event, ViewerEvent::Failed { ref message } if message.starts_with("Failed to zoom PDF")));
        assert_eq!(viewer.session().scale().get(), 1.0);
        assert_eq!(viewer.session().cached_image(0).map(RgbaImage::width), Some(612));

        assert_eq!(viewer.handle(ViewerCommand::Zoom { scale: 2.0 }), ViewerEvent::Zoomed { scale: 2.0 });
        assert_eq!(viewer.session().cached_image(1).map(RgbaImage::width), Some(1224));
    }

    #[test]
    fn encrypted_document_save_fails_and_leaves_file_untouched() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("locked.pdf");
        let original = encrypted_pdf();
        fs::write(&path, &original).expect("fixture should be written");

        let mut viewer = Viewer::open(&path, &ViewerConfig::default(), FixedText(None))
            .expect("encrypted file should open for viewing");
        assert_eq!(viewer.session().metadata().encryption, "Standard");

        viewer.set_annotation_mode(AnnotationMode::Highlight, None).expect("mode should be set");
        viewer.on_click(0, PixelPoint::new(100.0, 100.0)).expect("click should succeed");

        let err = viewer.save().expect_err("save should fail");
        assert!(matches!(err, ViewerError::Persist(PersistError::EncryptionConflict { .. })));
        let event = viewer.handle(ViewerCommand::Save);
        assert!(matches!(event, ViewerEvent::Failed { ref message } if message.starts_with("Failed to save annotations")));

        assert_eq!(fs::read(&path).expect("file should still exist"), original);
    }
}
