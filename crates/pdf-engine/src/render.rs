//! Page rasterization backends.

use crate::annotation::Annotation;
use crate::document::PdfDocument;
use crate::geometry::{PageRect, RgbColor};
use crate::RenderError;
use image::{ImageBuffer, Rgba};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Largest raster side accepted, in pixels.
pub const MAX_RASTER_SIDE: u32 = 16_384;

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_EDGE: Rgba<u8> = Rgba([220, 220, 220, 255]);
const ICON_EDGE: Rgba<u8> = Rgba([96, 80, 0, 255]);
const OTHER_EDGE: Rgba<u8> = Rgba([140, 140, 140, 255]);
const COMMENT_FILL: RgbColor = RgbColor { r: 255, g: 214, b: 10 };
const NOTE_FILL: RgbColor = RgbColor { r: 255, g: 240, b: 140 };

/// Turns a page of a document into pixels.
///
/// Implementations must be deterministic: rendering the same page at the same
/// scale with no intervening change yields identical pixels.
pub trait PageRenderer {
    fn render_page(
        &self,
        document: &PdfDocument,
        page_index: u32,
        scale: f32,
    ) -> Result<RgbaImage, RenderError>;
}

/// Pixel dimensions of a page rendered at `scale`.
pub fn raster_size(document: &PdfDocument, page_index: u32, scale: f32) -> Result<(u32, u32), RenderError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(RenderError::InvalidScale(scale));
    }

    let size = document.page_size(page_index)?;
    let width = (size.width_pt * scale).round().max(1.0);
    let height = (size.height_pt * scale).round().max(1.0);

    if width > MAX_RASTER_SIDE as f32 || height > MAX_RASTER_SIDE as f32 {
        return Err(RenderError::TooLarge { width: width as u64, height: height as u64 });
    }

    Ok((width as u32, height as u32))
}

/// Deterministic renderer: paints the page sheet and the appearance of every
/// annotation the document model knows about. Page content streams are left
/// to the pdfium backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Rasterizer {
    /// Side of the comment/note icon in points.
    pub note_icon_size: f32,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self { note_icon_size: 20.0 }
    }
}

impl Rasterizer {
    pub fn new(note_icon_size: f32) -> Self {
        Self { note_icon_size }
    }
}

impl PageRenderer for Rasterizer {
    fn render_page(
        &self,
        document: &PdfDocument,
        page_index: u32,
        scale: f32,
    ) -> Result<RgbaImage, RenderError> {
        let (width, height) = raster_size(document, page_index, scale)?;
        let mut image = RgbaImage::from_pixel(width, height, PAPER);

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, PAGE_EDGE);
                image.put_pixel(x, height - 1, PAGE_EDGE);
            }
            for y in 0..height {
                image.put_pixel(0, y, PAGE_EDGE);
                image.put_pixel(width - 1, y, PAGE_EDGE);
            }
        }

        for annotation in document.annotations(page_index)? {
            match annotation {
                Annotation::Highlight { rect, color } => multiply(&mut image, &rect.scaled(scale), color),
                Annotation::Comment { point, .. } | Annotation::TextNote { point, .. } => {
                    let fill = if matches!(annotation, Annotation::Comment { .. }) {
                        COMMENT_FILL
                    } else {
                        NOTE_FILL
                    };
                    let icon = PageRect::new(
                        point.x,
                        point.y,
                        point.x + self.note_icon_size,
                        point.y + self.note_icon_size,
                    )
                    .scaled(scale);
                    fill_rect(&mut image, &icon, Rgba([fill.r, fill.g, fill.b, 255]));
                    outline(&mut image, &icon, ICON_EDGE);
                }
                Annotation::Other { rect, .. } => outline(&mut image, &rect.scaled(scale), OTHER_EDGE),
            }
        }

        log::debug!("rasterized page {page_index} at {scale}x ({width}x{height})");
        Ok(image)
    }
}

/// Renderer chosen at runtime: Pdfium when its library can be bound, the
/// built-in [`Rasterizer`] otherwise.
pub enum AutoRenderer {
    #[cfg(feature = "pdfium")]
    Pdfium(pdfium_backend::PdfiumRenderer),
    Builtin(Rasterizer),
}

impl AutoRenderer {
    pub fn detect(note_icon_size: f32) -> Self {
        Self::bind_pdfium().unwrap_or_else(|| Self::Builtin(Rasterizer::new(note_icon_size)))
    }

    #[cfg(feature = "pdfium")]
    fn bind_pdfium() -> Option<Self> {
        pdfium_backend::PdfiumRenderer::from_system_library()
            .inspect_err(|err| log::warn!("{err}; page content will not be drawn"))
            .ok()
            .map(Self::Pdfium)
    }

    #[cfg(not(feature = "pdfium"))]
    fn bind_pdfium() -> Option<Self> {
        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "pdfium")]
            Self::Pdfium(_) => "pdfium",
            Self::Builtin(_) => "builtin",
        }
    }
}

impl PageRenderer for AutoRenderer {
    fn render_page(
        &self,
        document: &PdfDocument,
        page_index: u32,
        scale: f32,
    ) -> Result<RgbaImage, RenderError> {
        match self {
            #[cfg(feature = "pdfium")]
            Self::Pdfium(renderer) => renderer.render_page(document, page_index, scale),
            Self::Builtin(renderer) => renderer.render_page(document, page_index, scale),
        }
    }
}

/// Pixel span covered by `rect`, clipped to the image.
fn pixel_span(image: &RgbaImage, rect: &PageRect) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x0.round().max(0.0) as u32;
    let y0 = rect.y0.round().max(0.0) as u32;
    let x1 = (rect.x1.round().max(0.0) as u32).min(image.width());
    let y1 = (rect.y1.round().max(0.0) as u32).min(image.height());

    (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
}

/// Multiply blend, the way a highlighter darkens paper.
fn multiply(image: &mut RgbaImage, rect: &PageRect, color: RgbColor) {
    let Some((x0, y0, x1, y1)) = pixel_span(image, rect) else {
        return;
    };
    let tint = [color.r as u16, color.g as u16, color.b as u16];

    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = image.get_pixel_mut(x, y);
            for channel in 0..3 {
                pixel[channel] = ((pixel[channel] as u16 * tint[channel]) / 255) as u8;
            }
        }
    }
}

fn fill_rect(image: &mut RgbaImage, rect: &PageRect, color: Rgba<u8>) {
    if let Some((x0, y0, x1, y1)) = pixel_span(image, rect) {
        for y in y0..y1 {
            for x in x0..x1 {
                image.put_pixel(x, y, color);
            }
        }
    }
}

fn outline(image: &mut RgbaImage, rect: &PageRect, color: Rgba<u8>) {
    let Some((x0, y0, x1, y1)) = pixel_span(image, rect) else {
        return;
    };

    for x in x0..x1 {
        image.put_pixel(x, y0, color);
        image.put_pixel(x, y1 - 1, color);
    }
    for y in y0..y1 {
        image.put_pixel(x0, y, color);
        image.put_pixel(x1 - 1, y, color);
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;
    use crate::document::PdfDocument;

    /// Renders real page content through Pdfium. Pending annotations are
    /// serialized with the document so they show up in the output.
    pub struct PdfiumRenderer {
        pdfium: Pdfium,
    }

    impl PdfiumRenderer {
        pub fn from_system_library() -> Result<Self, RenderError> {
            let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|err| {
                    RenderError::Backend(format!("failed to bind pdfium library: {err}"))
                })?;

            Ok(Self { pdfium: Pdfium::new(bindings) })
        }
    }

    impl PageRenderer for PdfiumRenderer {
        fn render_page(
            &self,
            document: &PdfDocument,
            page_index: u32,
            scale: f32,
        ) -> Result<RgbaImage, RenderError> {
            let (width, height) = raster_size(document, page_index, scale)?;
            let bytes = document.to_bytes().map_err(|err| RenderError::Backend(err.to_string()))?;

            let pdf = self
                .pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(|err| RenderError::Backend(err.to_string()))?;
            let page = pdf
                .pages()
                .get(page_index as u16)
                .map_err(|err| RenderError::Backend(err.to_string()))?;

            let config = PdfRenderConfig::new()
                .set_target_size(width as i32, height as i32)
                .render_form_data(true)
                .render_annotations(true)
                .set_format(PdfBitmapFormat::BGRA);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|err| RenderError::Backend(err.to_string()))?;

            let bitmap_width = bitmap.width().max(0) as u32;
            let bitmap_height = bitmap.height().max(0) as u32;
            let raw = bitmap.as_raw_bytes();
            let stride = if bitmap_height == 0 { 0 } else { raw.len() / bitmap_height as usize };

            let mut image = RgbaImage::new(bitmap_width, bitmap_height);
            for (x, y, pixel) in image.enumerate_pixels_mut() {
                let offset = y as usize * stride + x as usize * 4;
                if let Some(bgra) = raw.get(offset..offset + 4) {
                    *pixel = Rgba([bgra[2], bgra[1], bgra[0], bgra[3]]);
                }
            }

            Ok(image)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PagePoint;
    use crate::testing::sample_pdf;

    #[test]
    fn raster_matches_page_size_times_scale() {
        let document = PdfDocument::from_bytes(sample_pdf(1)).expect("open should succeed");
        let image = Rasterizer::default().render_page(&document, 0, 2.0).expect("render should succeed");

        assert_eq!((image.width(), image.height()), (1224, 1584));
        assert_eq!(*image.get_pixel(600, 600), PAPER);
    }

    #[test]
    fn rendering_twice_is_bit_identical() {
        let mut document = PdfDocument::from_bytes(sample_pdf(1)).expect("open should succeed");
        document
            .add_annotation(
                0,
                &Annotation::Highlight { rect: PageRect::new(30.0, 15.0, 70.0, 25.0), color: RgbColor::new(0, 255, 0) },
                20.0,
            )
            .expect("add should succeed");

        let renderer = Rasterizer::default();
        let first = renderer.render_page(&document, 0, 3.0).expect("render should succeed");
        let second = renderer.render_page(&document, 0, 3.0).expect("render should succeed");

        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn highlight_and_note_change_pixels() {
        let mut document = PdfDocument::from_bytes(sample_pdf(1)).expect("open should succeed");
        let renderer = Rasterizer::default();
        let before = renderer.render_page(&document, 0, 1.0).expect("render should succeed");

        document
            .add_annotation(
                0,
                &Annotation::Highlight { rect: PageRect::new(30.0, 15.0, 70.0, 25.0), color: RgbColor::new(0, 255, 0) },
                20.0,
            )
            .expect("add should succeed");
        document
            .add_annotation(0, &Annotation::TextNote { point: PagePoint::new(200.0, 200.0), text: "n".into() }, 20.0)
            .expect("add should succeed");
        let after = renderer.render_page(&document, 0, 1.0).expect("render should succeed");

        assert_eq!(*before.get_pixel(50, 20), PAPER);
        assert_eq!(*after.get_pixel(50, 20), Rgba([0, 255, 0, 255]));
        assert_eq!(*after.get_pixel(210, 210), Rgba([NOTE_FILL.r, NOTE_FILL.g, NOTE_FILL.b, 255]));
    }

    #[test]
    fn auto_renderer_honours_raster_size() {
        let document = PdfDocument::from_bytes(sample_pdf(1)).expect("open should succeed");
        let renderer = AutoRenderer::detect(20.0);

        let image = renderer.render_page(&document, 0, 1.5).expect("render should succeed");
        assert_eq!((image.width(), image.height()), (918, 1188));
        assert!(matches!(renderer.name(), "pdfium" | "builtin"));
    }

    #[test]
    fn builtin_fallback_matches_rasterizer() {
        let document = PdfDocument::from_bytes(sample_pdf(1)).expect("open should succeed");
        let fallback = AutoRenderer::Builtin(Rasterizer::default());

        let expected = Rasterizer::default().render_page(&document, 0, 1.0).expect("render should succeed");
        let actual = fallback.render_page(&document, 0, 1.0).expect("render should succeed");
        assert_eq!(actual.as_raw(), expected.as_raw());
        assert_eq!(fallback.name(), "builtin");
    }

    #[test]
    fn invalid_page_and_scale_are_errors() {
        let document = PdfDocument::from_bytes(sample_pdf(1)).expect("open should succeed");
        let renderer = Rasterizer::default();

        assert!(matches!(renderer.render_page(&document, 5, 1.0), Err(RenderError::Page(_))));
        assert!(matches!(renderer.render_page(&document, 0, 0.0), Err(RenderError::InvalidScale(_))));
        assert!(matches!(renderer.render_page(&document, 0, 100.0), Err(RenderError::TooLarge { .. })));
    }
}
