//! Places annotations on a session's pages.
//!
//! Every successful mutation invalidates the page's cached raster and renders
//! it again before returning. When that render fails the annotation is taken
//! back out, so callers only ever observe fully applied changes.

use crate::config::{BoundsPolicy, HighlightExtents, ViewerConfig};
use crate::session::DocumentSession;
use crate::ViewerError;
use pdf_engine::{
    Annotation, AnnotationError, AnnotationKind, PageOutOfRange, PagePoint, PageRect, PageRenderer,
    PageSize, RgbColor, RgbaImage,
};

/// Data that goes with an annotation kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationPayload {
    Color(RgbColor),
    Text(String),
}

impl AnnotationPayload {
    fn describe(&self) -> &'static str {
        match self {
            AnnotationPayload::Color(_) => "a colour",
            AnnotationPayload::Text(_) => "text",
        }
    }
}

#[derive(Debug)]
pub enum ApplyOutcome<'a> {
    /// The annotation was added; `image` is the page re-rendered with it.
    Applied { annotation: Annotation, image: &'a RgbaImage },
    /// Nothing to add, e.g. an empty comment.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationApplier {
    extents: HighlightExtents,
    note_icon_size: f32,
    bounds_policy: BoundsPolicy,
}

impl Default for AnnotationApplier {
    fn default() -> Self {
        Self::new(&ViewerConfig::default())
    }
}

impl AnnotationApplier {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            extents: config.highlight,
            note_icon_size: config.note_icon_size,
            bounds_policy: config.bounds_policy,
        }
    }

    pub fn bounds_policy(&self) -> BoundsPolicy {
        self.bounds_policy
    }

    /// Rectangle a highlight at `point` covers on a page of `size`.
    pub fn highlight_rect(
        &self,
        page: u32,
        size: PageSize,
        point: PagePoint,
    ) -> Result<PageRect, AnnotationError> {
        let rect = PageRect::centered(point, self.extents.half_width, self.extents.half_height);
        let bounds = size.bounds();

        if bounds.contains_rect(&rect) {
            return Ok(rect);
        }

        let out_of_bounds = || AnnotationError::OutOfBounds {
            page,
            what: format!("highlight ({}, {})-({}, {})", rect.x0, rect.y0, rect.x1, rect.y1),
            width: size.width_pt,
            height: size.height_pt,
        };

        match self.bounds_policy {
            BoundsPolicy::Reject => Err(out_of_bounds()),
            BoundsPolicy::Clamp => {
                let clipped = bounds.intersection(&rect).ok_or_else(out_of_bounds)?;
                log::debug!("clamped highlight on page {page} to {clipped:?}");
                Ok(clipped)
            }
        }
    }

    /// Adds an annotation of `kind` at `point` (document space) on `page`.
    pub fn apply<'s, R: PageRenderer>(
        &self,
        session: &'s mut DocumentSession<R>,
        page: u32,
        point: PagePoint,
        kind: AnnotationKind,
        payload: AnnotationPayload,
    ) -> Result<ApplyOutcome<'s>, ViewerError> {
        let size = session.page_size(page).map_err(AnnotationError::from)?;

        let annotation = match (kind, payload) {
            (AnnotationKind::Highlight, AnnotationPayload::Color(color)) => {
                Annotation::Highlight { rect: self.highlight_rect(page, size, point)?, color }
            }
            (AnnotationKind::Comment | AnnotationKind::TextNote, AnnotationPayload::Text(text)) => {
                if text.is_empty() {
                    log::debug!("empty {kind:?} text on page {page}; nothing added");
                    return Ok(ApplyOutcome::Skipped);
                }

                if !size.bounds().contains_point(point) {
                    return Err(AnnotationError::OutOfBounds {
                        page,
                        what: format!("anchor ({}, {})", point.x, point.y),
                        width: size.width_pt,
                        height: size.height_pt,
                    }
                    .into());
                }

                if kind == AnnotationKind::Comment {
                    Annotation::Comment { point, text }
                } else {
                    Annotation::TextNote { point, text }
                }
            }
            (kind, payload) => {
                return Err(AnnotationError::KindMismatch {
                    mode: format!("{kind:?}"),
                    input: payload.describe().to_owned(),
                }
                .into())
            }
        };

        self.commit(session, page, annotation)
    }

    pub fn highlight<'s, R: PageRenderer>(
        &self,
        session: &'s mut DocumentSession<R>,
        page: u32,
        point: PagePoint,
        color: RgbColor,
    ) -> Result<ApplyOutcome<'s>, ViewerError> {
        self.apply(session, page, point, AnnotationKind::Highlight, AnnotationPayload::Color(color))
    }

    pub fn comment<'s, R: PageRenderer>(
        &self,
        session: &'s mut DocumentSession<R>,
        page: u32,
        point: PagePoint,
        text: impl Into<String>,
    ) -> Result<ApplyOutcome<'s>, ViewerError> {
        self.apply(session, page, point, AnnotationKind::Comment, AnnotationPayload::Text(text.into()))
    }

    pub fn text_note<'s, R: PageRenderer>(
        &self,
        session: &'s mut DocumentSession<R>,
        page: u32,
        point: PagePoint,
        text: impl Into<String>,
    ) -> Result<ApplyOutcome<'s>, ViewerError> {
        self.apply(session, page, point, AnnotationKind::TextNote, AnnotationPayload::Text(text.into()))
    }

    fn commit<'s, R: PageRenderer>(
        &self,
        session: &'s mut DocumentSession<R>,
        page: u32,
        annotation: Annotation,
    ) -> Result<ApplyOutcome<'s>, ViewerError> {
        let handle = session.document_mut().add_annotation(page, &annotation, self.note_icon_size)?;
        session.invalidate(page);

        if let Err(err) = session.page_image(page).map(|_| ()) {
            log::warn!("re-render of page {page} failed; rolling back {:?}", annotation.kind());
            if let Err(revert) = session.document_mut().revert_annotation(handle) {
                log::error!("rollback on page {page} failed: {revert}");
            }
            session.invalidate(page);
            return Err(err.into());
        }

        log::info!("added {:?} on page {page}", annotation.kind());
        let image = session.page_image(page)?;
        Ok(ApplyOutcome::Applied { annotation, image })
    }
}

/// Texts of the comments and notes on `page`, in storage order.
pub fn list_annotation_texts<R: PageRenderer>(
    session: &DocumentSession<R>,
    page: u32,
) -> Result<Vec<String>, PageOutOfRange> {
    session.document().annotation_texts(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::PixelPoint;
    use pdf_engine::testing::sample_pdf;
    use pdf_engine::{PdfDocument, RenderError, SaveMode};
    use std::fs;
    use std::path::PathBuf;

    fn fixture(pages: u32) -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("doc.pdf");
        fs::write(&path, sample_pdf(pages)).expect("fixture should be written");
        (temp, path)
    }

    struct BrokenRenderer;

    impl PageRenderer for BrokenRenderer {
        fn render_page(&self, _: &PdfDocument, _: u32, _: f32) -> Result<RgbaImage, RenderError> {
            Err(RenderError::Backend("rasterizer unavailable".into()))
        }
    }

    #[test]
    fn scale_two_click_places_expected_highlight() {
        let (_temp, path) = fixture(3);
        let config = ViewerConfig { initial_scale: 2.0, ..ViewerConfig::default() };
        let mut session = DocumentSession::open(&path, &config).expect("open should succeed");
        let applier = AnnotationApplier::new(&config);

        let point = session.scale().to_document_space(PixelPoint::new(100.0, 40.0));
        assert_eq!(point, PagePoint::new(50.0, 20.0));

        let color = RgbColor::from_hex("#00FF00").expect("valid colour");
        let outcome = applier.highlight(&mut session, 1, point, color).expect("highlight should apply");
        let ApplyOutcome::Applied { annotation, image } = outcome else {
            panic!("highlight should not be skipped");
        };
        assert_eq!(image.width(), 1224);
        assert_eq!(
            annotation,
            Annotation::Highlight { rect: PageRect::new(30.0, 15.0, 70.0, 25.0), color: RgbColor::new(0, 255, 0) }
        );
        assert_eq!(color.normalized(), [0.0, 1.0, 0.0]);

        session.save().expect("save should succeed");
        let reopened = PdfDocument::open(&path).expect("reopen should succeed");
        assert_eq!(reopened.annotations(1).expect("page exists"), vec![annotation]);
    }

    #[test]
    fn empty_comment_is_a_no_op() {
        let (_temp, path) = fixture(1);
        let mut session = DocumentSession::open(&path, &ViewerConfig::default()).expect("open should succeed");
        let applier = AnnotationApplier::default();

        let outcome =
            applier.comment(&mut session, 0, PagePoint::new(10.0, 10.0), "").expect("should not fail");

        assert!(matches!(outcome, ApplyOutcome::Skipped));
        assert!(session.document().annotations(0).expect("page exists").is_empty());
        assert!(!session.is_modified());
    }

    #[test]
    fn comments_and_notes_are_listed_in_order() {
        let (_temp, path) = fixture(1);
        let mut session = DocumentSession::open(&path, &ViewerConfig::default()).expect("open should succeed");
        let applier = AnnotationApplier::default();

        applier.comment(&mut session, 0, PagePoint::new(10.0, 10.0), "first").expect("comment should apply");
        applier
            .highlight(&mut session, 0, PagePoint::new(100.0, 100.0), RgbColor::YELLOW)
            .expect("highlight should apply");
        applier.text_note(&mut session, 0, PagePoint::new(30.0, 30.0), "second").expect("note should apply");

        assert_eq!(list_annotation_texts(&session, 0).expect("page exists"), vec!["first", "second"]);
    }

    #[test]
    fn edge_highlight_is_clamped_by_default() {
        let applier = AnnotationApplier::default();

        let rect = applier
            .highlight_rect(0, PageSize::LETTER, PagePoint::new(5.0, 2.0))
            .expect("clamp should succeed");

        assert_eq!(rect, PageRect::new(0.0, 0.0, 25.0, 7.0));
    }

    #[test]
    fn edge_highlight_is_rejected_under_reject_policy() {
        let config = ViewerConfig { bounds_policy: BoundsPolicy::Reject, ..ViewerConfig::default() };
        let applier = AnnotationApplier::new(&config);

        let result = applier.highlight_rect(0, PageSize::LETTER, PagePoint::new(5.0, 2.0));
        assert!(matches!(result, Err(AnnotationError::OutOfBounds { page: 0, .. })));
    }

    #[test]
    fn highlight_off_the_page_is_always_rejected() {
        let applier = AnnotationApplier::default();

        let result = applier.highlight_rect(0, PageSize::LETTER, PagePoint::new(900.0, 900.0));
        assert!(matches!(result, Err(AnnotationError::OutOfBounds { .. })));
    }

    #[test]
    fn note_anchor_must_be_on_the_page() {
        let (_temp, path) = fixture(1);
        let mut session = DocumentSession::open(&path, &ViewerConfig::default()).expect("open should succeed");

        let result =
            AnnotationApplier::default().text_note(&mut session, 0, PagePoint::new(-1.0, 10.0), "x");

        assert!(matches!(result, Err(ViewerError::Annotation(AnnotationError::OutOfBounds { .. }))));
        assert!(!session.is_modified());
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let (_temp, path) = fixture(1);
        let mut session = DocumentSession::open(&path, &ViewerConfig::default()).expect("open should succeed");

        let result = AnnotationApplier::default().apply(
            &mut session,
            0,
            PagePoint::new(50.0, 50.0),
            AnnotationKind::Highlight,
            AnnotationPayload::Text("oops".into()),
        );

        assert!(matches!(result, Err(ViewerError::Annotation(AnnotationError::KindMismatch { .. }))));
    }

    #[test]
    fn failed_render_rolls_the_annotation_back() {
        let (_temp, path) = fixture(1);
        let config = ViewerConfig::default();
        let mut session =
            DocumentSession::open_with_renderer(&path, &config, BrokenRenderer).expect("open should succeed");

        let result = AnnotationApplier::new(&config).highlight(
            &mut session,
            0,
            PagePoint::new(50.0, 50.0),
            RgbColor::YELLOW,
        );

        assert!(matches!(result, Err(ViewerError::Render(_))));
        assert!(session.document().annotations(0).expect("page exists").is_empty());
        assert!(!session.is_modified());
        assert!(session.cached_image(0).is_none());

        let report = session.save().expect("save should succeed");
        assert_eq!(report.mode, SaveMode::Incremental);
        assert_eq!(report.objects_written, 0);
    }

    #[test]
    fn bad_page_index_is_an_annotation_error() {
        let (_temp, path) = fixture(1);
        let mut session = DocumentSession::open(&path, &ViewerConfig::default()).expect("open should succeed");

        let result = AnnotationApplier::default().highlight(
            &mut session,
            7,
            PagePoint::new(1.0, 1.0),
            RgbColor::YELLOW,
        );
        assert!(matches!(result, Err(ViewerError::Annotation(AnnotationError::Page(_)))));
    }
}
