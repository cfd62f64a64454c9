//! LRU cache of rendered pages.

use lru::LruCache;
use pdf_engine::RgbaImage;
use std::num::NonZeroUsize;

#[derive(Debug, Clone)]
struct CachedRaster {
    scale: f32,
    image: RgbaImage,
}

/// Most recent raster of each page, tagged with the scale it was rendered at.
#[derive(Debug)]
pub struct RenderCache {
    entries: LruCache<u32, CachedRaster>,
}

impl RenderCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self { entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)) }
    }

    /// True when `page` has a raster rendered at exactly `scale`.
    pub fn is_fresh(&self, page: u32, scale: f32) -> bool {
        self.entries.peek(&page).is_some_and(|entry| entry.scale == scale)
    }

    /// Raster of `page`, promoting it in the eviction order.
    pub fn get(&mut self, page: u32) -> Option<&RgbaImage> {
        self.entries.get(&page).map(|entry| &entry.image)
    }

    pub fn peek(&self, page: u32) -> Option<&RgbaImage> {
        self.entries.peek(&page).map(|entry| &entry.image)
    }

    pub fn insert(&mut self, page: u32, scale: f32, image: RgbaImage) {
        log::debug!("caching page {page} at {scale}x");
        if let Some((evicted, _)) = self.entries.push(page, CachedRaster { scale, image }) {
            if evicted != page {
                log::debug!("evicted cached raster of page {evicted}");
            }
        }
    }

    pub fn invalidate(&mut self, page: u32) {
        if self.entries.pop(&page).is_some() {
            log::debug!("invalidated cached raster of page {page}");
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster() -> RgbaImage {
        RgbaImage::new(2, 2)
    }

    #[test]
    fn tracks_the_scale_of_each_raster() {
        let mut cache = RenderCache::new(4);
        cache.insert(0, 2.0, raster());

        assert!(cache.is_fresh(0, 2.0));
        assert!(!cache.is_fresh(0, 3.0));
        assert!(!cache.is_fresh(1, 2.0));

        cache.invalidate(0);
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_the_page_viewed_longest_ago() {
        let mut cache = RenderCache::new(2);
        cache.insert(0, 1.0, raster());
        cache.insert(1, 1.0, raster());

        assert!(cache.get(0).is_some());
        cache.insert(2, 1.0, raster());

        assert!(cache.peek(0).is_some());
        assert!(cache.peek(1).is_none());
        assert!(cache.peek(2).is_some());
    }

    #[test]
    fn rerendering_a_page_replaces_its_raster() {
        let mut cache = RenderCache::new(2);
        cache.insert(0, 1.0, raster());
        cache.insert(0, 2.0, RgbaImage::new(4, 4));

        assert_eq!(cache.len(), 1);
        assert!(cache.is_fresh(0, 2.0));
        assert_eq!(cache.peek(0).map(RgbaImage::width), Some(4));
    }

    #[test]
    fn zero_capacity_still_holds_one_page() {
        let mut cache = RenderCache::new(0);
        cache.insert(3, 1.0, raster());

        assert_eq!(cache.capacity(), 1);
        assert!(cache.is_fresh(3, 1.0));
    }
}
