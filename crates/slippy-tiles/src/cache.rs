//! Bounded tile cache and in-flight fetch markers
//!
//! Both live in one struct so that a single mutex guards them together: the
//! "is it cached or already being fetched?" check and the marker insertion happen
//! atomically with respect to concurrent planners.

use crate::coord::TileCoord;
use crate::{Result, TileError};
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Lock the shared cache, recovering the data if a previous holder panicked.
///
/// Every critical section is a handful of map operations that leave the cache
/// consistent, so a poisoned lock still guards valid data.
pub(crate) fn lock_cache(cache: &Mutex<TileCache>) -> MutexGuard<'_, TileCache> {
    cache.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Tile cache mutex poisoned; recovering");
        poisoned.into_inner()
    })
}

/// A decoded tile in straight (non-premultiplied) RGBA8
#[derive(Clone, PartialEq, Eq)]
pub struct TileImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for TileImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl TileImage {
    /// Wrap raw RGBA8 pixels, checking that the buffer matches the dimensions
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(TileError::Decode(format!(
                "pixel buffer has {} bytes, expected {expected} for {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decode a PNG or JPEG payload
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let image = Self {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        };
        if image.is_empty() {
            return Err(TileError::Decode(format!(
                "zero-dimension image ({}x{})",
                image.width, image.height
            )));
        }
        Ok(image)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Zero-dimension images are treated as corrupt
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Lifecycle of one coordinate as seen by the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// Not cached and no fetch running; eligible for a fetch
    Absent,
    /// A fetch task owns this coordinate
    Fetching,
    /// Image available
    Cached,
}

/// Least-recently-used tile store plus the set of coordinates being fetched
pub struct TileCache {
    tiles: LruCache<TileCoord, Arc<TileImage>>,
    in_flight: HashSet<TileCoord>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TileCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            tiles: LruCache::new(capacity),
            in_flight: HashSet::new(),
        }
    }

    /// Look up a tile and mark it as recently used
    pub fn get(&mut self, coord: &TileCoord) -> Option<Arc<TileImage>> {
        self.tiles.get(coord).cloned()
    }

    /// Look up a tile without touching its recency
    pub fn peek(&self, coord: &TileCoord) -> Option<&Arc<TileImage>> {
        self.tiles.peek(coord)
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.tiles.contains(coord)
    }

    /// Store a tile, returning the coordinate evicted to make room (if any)
    pub fn insert(&mut self, coord: TileCoord, image: Arc<TileImage>) -> Option<TileCoord> {
        match self.tiles.push(coord, image) {
            Some((evicted, _)) if evicted != coord => Some(evicted),
            _ => None,
        }
    }

    pub fn remove(&mut self, coord: &TileCoord) -> Option<Arc<TileImage>> {
        self.tiles.pop(coord)
    }

    /// Claim a coordinate for fetching.
    ///
    /// Returns `false` (and changes nothing) when the tile is already cached or
    /// another fetch owns it.
    pub fn begin_fetch(&mut self, coord: TileCoord) -> bool {
        if self.tiles.contains(&coord) {
            return false;
        }
        self.in_flight.insert(coord)
    }

    /// Release the in-flight marker; returns whether it was set
    pub fn finish_fetch(&mut self, coord: &TileCoord) -> bool {
        self.in_flight.remove(coord)
    }

    pub fn is_in_flight(&self, coord: &TileCoord) -> bool {
        self.in_flight.contains(coord)
    }

    pub fn state(&self, coord: &TileCoord) -> TileState {
        if self.in_flight.contains(coord) {
            TileState::Fetching
        } else if self.tiles.contains(coord) {
            TileState::Cached
        } else {
            TileState::Absent
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn capacity(&self) -> usize {
        self.tiles.cap().get()
    }

    /// Drop every cached tile. In-flight markers are left alone: their tasks still
    /// own them and will clear them.
    pub fn clear(&mut self) {
        self.tiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Arc<TileImage> {
        Arc::new(TileImage::from_rgba(2, 2, vec![255; 16]).unwrap())
    }

    fn cache(capacity: usize) -> TileCache {
        TileCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_begin_fetch_is_check_and_set() {
        let mut cache = cache(4);
        let coord = TileCoord::new(5, 3, 3);

        assert!(cache.begin_fetch(coord));
        assert!(!cache.begin_fetch(coord));
        assert_eq!(cache.state(&coord), TileState::Fetching);

        assert!(cache.finish_fetch(&coord));
        assert!(!cache.finish_fetch(&coord));
        assert_eq!(cache.state(&coord), TileState::Absent);
    }

    #[test]
    fn test_cached_tiles_are_not_refetched() {
        let mut cache = cache(4);
        let coord = TileCoord::new(1, 0, 1);
        cache.insert(coord, image());
        assert_eq!(cache.state(&coord), TileState::Cached);
        assert!(!cache.begin_fetch(coord));
        assert_eq!(cache.in_flight_len(), 0);
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut cache = cache(2);
        let a = TileCoord::new(3, 0, 0);
        let b = TileCoord::new(3, 1, 0);
        let c = TileCoord::new(3, 2, 0);

        assert_eq!(cache.insert(a, image()), None);
        assert_eq!(cache.insert(b, image()), None);
        // Touch `a` so `b` becomes the least recently used
        assert!(cache.get(&a).is_some());
        assert_eq!(cache.insert(c, image()), Some(b));

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_same_coord_is_not_an_eviction() {
        let mut cache = cache(1);
        let a = TileCoord::new(3, 0, 0);
        assert_eq!(cache.insert(a, image()), None);
        assert_eq!(cache.insert(a, image()), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let mut cache = cache(2);
        let a = TileCoord::new(3, 0, 0);
        let b = TileCoord::new(3, 1, 0);
        cache.insert(a, image());
        cache.insert(b, image());
        assert!(cache.peek(&a).is_some());
        assert_eq!(cache.insert(TileCoord::new(3, 2, 0), image()), Some(a));
    }

    #[test]
    fn test_from_rgba_checks_length() {
        assert!(TileImage::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(TileImage::from_rgba(0, 0, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = TileImage::decode(b"definitely not a png").unwrap_err();
        assert!(matches!(err, TileError::Decode(_)));
    }

    #[test]
    fn test_decode_png() {
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        let tile = TileImage::decode(bytes.get_ref()).unwrap();
        assert_eq!((tile.width(), tile.height()), (4, 3));
        assert_eq!(&tile.pixels()[..4], &[10, 20, 30, 255]);
    }
}
