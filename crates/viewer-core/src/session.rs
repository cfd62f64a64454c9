//! Document session: the open document, its zoom scale and cached rasters.

use crate::cache::RenderCache;
use crate::config::{ScaleLimits, ViewerConfig};
use crate::mapper::{ScaleError, ScaleFactor};
use crate::ViewerError;
use pdf_engine::{
    DocumentMetadata, DocumentOpenError, PageOutOfRange, PageRenderer, PageSize, PdfDocument,
    PersistError, Rasterizer, RenderError, RgbaImage, SaveMode, SaveReport,
};
use std::path::{Path, PathBuf};

pub struct DocumentSession<R = Rasterizer> {
    path: PathBuf,
    document: PdfDocument,
    renderer: R,
    scale: ScaleFactor,
    limits: ScaleLimits,
    save_mode: SaveMode,
    cache: RenderCache,
}

impl DocumentSession<Rasterizer> {
    pub fn open(path: impl AsRef<Path>, config: &ViewerConfig) -> Result<Self, DocumentOpenError> {
        Self::open_with_renderer(path, config, Rasterizer::new(config.note_icon_size))
    }
}

impl<R: PageRenderer> DocumentSession<R> {
    pub fn open_with_renderer(
        path: impl AsRef<Path>,
        config: &ViewerConfig,
        renderer: R,
    ) -> Result<Self, DocumentOpenError> {
        let path = path.as_ref();
        let document = PdfDocument::open(path)?;
        log::info!("opened {} ({} pages)", path.display(), document.page_count());

        let scale =
            ScaleFactor::clamped(config.initial_scale, &config.scale_limits).unwrap_or(ScaleFactor::ONE);

        Ok(Self {
            path: path.to_path_buf(),
            document,
            renderer,
            scale,
            limits: config.scale_limits,
            save_mode: config.save_mode,
            cache: RenderCache::new(config.render_cache_capacity),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &PdfDocument {
        &self.document
    }

    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    pub fn page_size(&self, page: u32) -> Result<PageSize, PageOutOfRange> {
        self.document.page_size(page)
    }

    pub fn metadata(&self) -> DocumentMetadata {
        self.document.metadata()
    }

    pub fn scale(&self) -> ScaleFactor {
        self.scale
    }

    pub fn is_modified(&self) -> bool {
        self.document.is_modified()
    }

    /// Renders `page` at `scale` without touching the cache.
    pub fn render(&self, page: u32, scale: f32) -> Result<RgbaImage, RenderError> {
        self.renderer.render_page(&self.document, page, scale)
    }

    /// Raster of `page` at the current scale, rendered on a cache miss.
    pub fn page_image(&mut self, page: u32) -> Result<&RgbaImage, RenderError> {
        let scale = self.scale.get();

        if !self.cache.is_fresh(page, scale) {
            let image = self.render(page, scale)?;
            self.cache.insert(page, scale, image);
        }

        self.cache
            .get(page)
            .ok_or_else(|| RenderError::Backend(format!("page {page} was evicted while rendering")))
    }

    /// Cached raster of `page`, if any, without rendering.
    pub fn cached_image(&self, page: u32) -> Option<&RgbaImage> {
        self.cache.peek(page)
    }

    /// Sets the zoom scale, clamped to the configured limits, and drops every
    /// cached raster. Returns the scale actually applied.
    pub fn set_scale(&mut self, factor: f32) -> Result<ScaleFactor, ScaleError> {
        let scale = ScaleFactor::clamped(factor, &self.limits)?;
        if scale.get() != factor {
            log::debug!("scale {factor} clamped to {}", scale.get());
        }

        self.scale = scale;
        self.cache.clear();
        Ok(scale)
    }

    /// Renders the first `pages` pages at `factor`, clamped to the limits, and
    /// only when every render succeeds switches to that scale with those
    /// rasters cached. On error the scale and cache are unchanged.
    pub fn rescale(&mut self, factor: f32, pages: u32) -> Result<ScaleFactor, ViewerError> {
        let scale = ScaleFactor::clamped(factor, &self.limits)?;
        let pages = pages.min(self.page_count()).min(self.cache.capacity() as u32);

        let rasters = (0..pages)
            .map(|page| self.render(page, scale.get()).map(|image| (page, image)))
            .collect::<Result<Vec<_>, _>>()?;

        self.scale = scale;
        self.cache.clear();
        for (page, image) in rasters {
            self.cache.insert(page, scale.get(), image);
        }
        Ok(scale)
    }

    /// Writes pending annotations back to the file the session was opened from.
    pub fn save(&mut self) -> Result<SaveReport, PersistError> {
        let path = self.path.clone();
        self.document.save(&path, self.save_mode)
    }

    /// Writes the document to `path`, which becomes the session's file.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<SaveReport, PersistError> {
        let path = path.as_ref();
        let report = self.document.save(path, self.save_mode)?;
        self.path = path.to_path_buf();
        Ok(report)
    }

    pub(crate) fn document_mut(&mut self) -> &mut PdfDocument {
        &mut self.document
    }

    pub(crate) fn invalidate(&mut self, page: u32) {
        self.cache.invalidate(page);
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &RenderCache {
        &self.cache
    }
}
