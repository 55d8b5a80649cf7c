//! Crop resources and the per-session resolved-crop map.
//!
//! ## Ownership model
//!
//! Every [`CropResource`] is exclusively owned by the [`ResolvedCropMap`]
//! once stored. Replacing the entry at an index drops the superseded
//! resource; clearing the map (new document, teardown) drops everything.
//! Release is observable through an optional hook that fires exactly once
//! when the resource is dropped, which is how hosts tied to external
//! handles (GPU textures, object URLs) free them, and how tests assert
//! there are no leaks.
//!
//! The map is deliberately a plain owned collection handed around by
//! reference — never ambient shared state — so the lifetime of each crop
//! is visible at the type level.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::fmt;

/// A rasterised sub-image cut from a source page, PNG-encoded.
pub struct CropResource {
    png: Vec<u8>,
    width: u32,
    height: u32,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl CropResource {
    /// Wrap encoded PNG bytes with their pixel dimensions.
    pub fn new(png: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            png,
            width,
            height,
            on_release: None,
        }
    }

    /// Attach a hook that fires exactly once when this resource is dropped.
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// The encoded PNG bytes.
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    /// Pixel dimensions of the crop.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The crop as an embeddable `data:image/png;base64,…` URI.
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

impl fmt::Debug for CropResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CropResource")
            .field("png_len", &self.png.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("has_release_hook", &self.on_release.is_some())
            .finish()
    }
}

impl Drop for CropResource {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

/// Mapping from marker ordinal index to its resolved [`CropResource`].
///
/// Lookup is by index only; insertion order is irrelevant. Completeness is
/// defined against a marker count: every index in `[0, marker_count)`
/// present as a key.
#[derive(Debug, Default)]
pub struct ResolvedCropMap {
    entries: HashMap<usize, CropResource>,
}

impl ResolvedCropMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a crop at a marker index, dropping (and thereby releasing)
    /// any resource previously stored there.
    pub fn insert(&mut self, index: usize, resource: CropResource) {
        self.entries.insert(index, resource);
    }

    pub fn get(&self, index: usize) -> Option<&CropResource> {
        self.entries.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    /// Number of resolved markers.
    pub fn resolved_count(&self) -> usize {
        self.entries.len()
    }

    /// Lowest marker index in `[0, marker_count)` with no entry.
    ///
    /// `None` means the map is complete for that marker count.
    pub fn first_missing(&self, marker_count: usize) -> Option<usize> {
        (0..marker_count).find(|i| !self.entries.contains_key(i))
    }

    /// Whether every index in `[0, marker_count)` is resolved.
    pub fn is_complete(&self, marker_count: usize) -> bool {
        self.first_missing(marker_count).is_none()
    }

    /// Drop every resource, firing each release hook.
    ///
    /// Invoked deterministically when the document is replaced or the
    /// session is torn down, not merely on process exit.
    pub fn release_all(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn resource() -> CropResource {
        CropResource::new(vec![1, 2, 3], 10, 10)
    }

    fn counting_resource(counter: &Arc<AtomicUsize>) -> CropResource {
        let c = Arc::clone(counter);
        resource().with_release_hook(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn replace_releases_old_resource_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut map = ResolvedCropMap::new();
        map.insert(0, counting_resource(&released));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        map.insert(0, resource());
        assert_eq!(released.load(Ordering::SeqCst), 1);

        // Replacing again must not re-fire the first hook.
        map.insert(0, resource());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_all_fires_every_hook() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut map = ResolvedCropMap::new();
        map.insert(0, counting_resource(&released));
        map.insert(3, counting_resource(&released));
        map.release_all();
        assert_eq!(released.load(Ordering::SeqCst), 2);
        assert_eq!(map.resolved_count(), 0);
    }

    #[test]
    fn first_missing_skips_resolved_prefix() {
        let mut map = ResolvedCropMap::new();
        map.insert(0, resource());
        map.insert(1, resource());
        map.insert(3, resource());
        assert_eq!(map.first_missing(5), Some(2));
        assert!(!map.is_complete(5));
    }

    #[test]
    fn complete_map_has_no_missing_index() {
        let mut map = ResolvedCropMap::new();
        map.insert(0, resource());
        map.insert(1, resource());
        assert_eq!(map.first_missing(2), None);
        assert!(map.is_complete(2));
        // Zero markers are trivially complete.
        assert!(ResolvedCropMap::new().is_complete(0));
    }

    #[test]
    fn data_uri_prefix() {
        let r = CropResource::new(b"\x89PNG-ish".to_vec(), 4, 4);
        assert!(r.data_uri().starts_with("data:image/png;base64,"));
    }
}
