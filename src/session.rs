//! The crop session controller: an ordered walk across every unresolved
//! figure marker.
//!
//! The session drives the [`RegionSelector`](crate::pipeline::selector)
//! against pages produced by the
//! [`PageProvider`](crate::pipeline::source::PageProvider), and stores each
//! confirmed crop in a [`ResolvedCropMap`] it *borrows* from the caller.
//! Borrowing rather than owning is deliberate: closing the session at any
//! point — including by just dropping it — leaves the map exactly as it
//! was, and a new session over the same map resumes at the first missing
//! marker instead of restarting at zero.
//!
//! ## Overlap discipline
//!
//! All mutating operations take `&mut self`, so a second `confirm_current`
//! cannot start while one is still encoding, and no page render overlaps
//! another. The single-threaded, event-driven contract of the host UI maps
//! directly onto the borrow checker here; no locks are needed.

use crate::config::ScanConfig;
use crate::document::ExamDocument;
use crate::error::{CropError, MathScanError};
use crate::pipeline::selector::{
    crop_selection, encode_crop, RegionSelector, SelectRect,
};
use crate::pipeline::source::{Page, PageProvider};
use crate::resource::{CropResource, ResolvedCropMap};
use tracing::{debug, info};

/// Where the session is in its walk across the markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not started; no page loaded yet.
    NotStarted,
    /// Positioned on the marker with this ordinal index.
    Active(usize),
    /// Every marker has been visited (confirmed or skipped), or there was
    /// nothing left to do when the session started.
    Complete,
}

/// Orchestrates cropping one region per figure marker.
pub struct CropSession<'a> {
    document: ExamDocument,
    crops: &'a mut ResolvedCropMap,
    marker_count: usize,
    state: SessionState,
    provider: Option<PageProvider>,
    page: Option<Page>,
    display_size: Option<(f32, f32)>,
    selector: RegionSelector,
    min_selection_px: f32,
    render_scale: f32,
}

impl<'a> CropSession<'a> {
    /// Create a session over a document and the caller-owned crop map.
    ///
    /// Nothing is loaded until [`start`](Self::start) runs.
    pub fn new(
        document: &ExamDocument,
        marker_count: usize,
        crops: &'a mut ResolvedCropMap,
        config: &ScanConfig,
    ) -> Self {
        Self {
            document: document.clone(),
            crops,
            marker_count,
            state: SessionState::NotStarted,
            provider: None,
            page: None,
            display_size: None,
            selector: RegionSelector::new(),
            min_selection_px: config.min_selection_px,
            render_scale: config.render_scale,
        }
    }

    /// Start (or resume) the walk.
    ///
    /// Opens the page source (rendering page 1 for PDFs) and positions the
    /// session on the lowest marker index with no resolved crop. A map
    /// that already covers every marker — or a marker count of zero —
    /// starts the session directly in [`SessionState::Complete`].
    pub async fn start(&mut self) -> Result<(), MathScanError> {
        if self.provider.is_none() {
            let (provider, page) = PageProvider::open(&self.document, self.render_scale).await?;
            self.provider = Some(provider);
            self.page = Some(page);
        }
        self.selector.clear();
        self.state = match self.crops.first_missing(self.marker_count) {
            Some(index) => {
                info!(
                    "Crop session started at marker {}/{} ({} already resolved)",
                    index + 1,
                    self.marker_count,
                    self.crops.resolved_count()
                );
                SessionState::Active(index)
            }
            None => {
                info!("Crop session has nothing to do ({} markers)", self.marker_count);
                SessionState::Complete
            }
        };
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Ordinal index of the marker the session is positioned on.
    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SessionState::Active(i) => Some(i),
            _ => None,
        }
    }

    pub fn marker_count(&self) -> usize {
        self.marker_count
    }

    /// How many markers already have a resolved crop.
    pub fn resolved_count(&self) -> usize {
        self.crops.resolved_count()
    }

    /// The currently displayed page, once the session has started.
    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    /// Whether page navigation applies to this source.
    pub fn is_paged(&self) -> bool {
        self.provider.as_ref().is_some_and(|p| p.is_paged())
    }

    /// Tell the session how large the page is drawn on screen.
    ///
    /// Pointer coordinates and the selection rectangle are interpreted in
    /// this display space. Defaults to the page's natural size.
    pub fn set_display_size(&mut self, width: f32, height: f32) {
        self.display_size = Some((width, height));
    }

    // ── Pointer events (forwarded to the selector) ───────────────────────

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.selector.pointer_down(x, y);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.selector.pointer_move(x, y);
    }

    pub fn pointer_up(&mut self) {
        self.selector.pointer_up();
    }

    /// The in-progress or confirmed selection rectangle, if any.
    pub fn selection(&self) -> Option<SelectRect> {
        self.selector.selection()
    }

    /// Discard the current selection without advancing.
    pub fn cancel_selection(&mut self) {
        self.selector.clear();
    }

    // ── Batch walk ───────────────────────────────────────────────────────

    /// Crop the confirmed selection for the current marker and advance.
    ///
    /// On success the encoded crop replaces any prior resource at this
    /// index (the superseded resource's release hook fires). A selection
    /// below the minimum size is rejected without touching the map or the
    /// index, and the rectangle stays on screen for the user to redraw.
    pub async fn confirm_current(&mut self) -> Result<(), CropError> {
        let index = self.current_index().ok_or(CropError::NoActiveMarker)?;
        let rect = self.selector.selection().ok_or(CropError::NoSelection)?;
        let page = self.page.as_ref().ok_or(CropError::NoActiveMarker)?;

        let display = self
            .display_size
            .unwrap_or((page.image.width() as f32, page.image.height() as f32));

        let crop = crop_selection(&page.image, rect, display, self.min_selection_px)?;
        let (width, height) = (crop.width(), crop.height());

        // Encoding is the suspend point; the &mut borrow on self keeps any
        // second confirm out until this one resolves or fails.
        let png = tokio::task::spawn_blocking(move || encode_crop(&crop))
            .await
            .map_err(|e| CropError::EncodeFailed {
                detail: format!("encode task panicked: {}", e),
            })??;

        debug!(
            "Marker {}: stored {}x{} crop ({} bytes)",
            index,
            width,
            height,
            png.len()
        );
        self.crops.insert(index, CropResource::new(png, width, height));
        self.advance();
        Ok(())
    }

    /// Advance past the current marker without creating a crop.
    ///
    /// Any resource already stored at this index is left untouched.
    pub fn skip_current(&mut self) {
        if let SessionState::Active(index) = self.state {
            debug!("Marker {}: skipped", index);
            self.advance();
        }
    }

    /// Navigate the page source by `delta` pages.
    ///
    /// No-op for raster sources and for clamped out-of-range moves (no
    /// render is issued and the selection survives). When the page really
    /// changes, the in-progress selection is cleared because its
    /// coordinates were relative to the old page. A render failure leaves
    /// the session on the current page.
    pub async fn change_page(&mut self, delta: i64) -> Result<(), CropError> {
        let provider = self.provider.as_mut().ok_or(CropError::NoActiveMarker)?;
        if !provider.is_paged() {
            return Ok(());
        }
        if let Some(page) = provider.navigate(delta).await? {
            debug!("Now on page {}/{}", page.number, page.total);
            self.page = Some(page);
            self.selector.clear();
        }
        Ok(())
    }

    /// Close the session.
    ///
    /// Equivalent to dropping it: the resolved-crop map (borrowed, not
    /// owned) keeps all partial progress, and a new session over the same
    /// map resumes at the first missing marker.
    pub fn close(self) {}

    fn advance(&mut self) {
        self.selector.clear();
        if let SessionState::Active(index) = self.state {
            self.state = if index + 1 < self.marker_count {
                SessionState::Active(index + 1)
            } else {
                info!("Crop session complete ({} markers)", self.marker_count);
                SessionState::Complete
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn png_document(width: u32, height: u32) -> ExamDocument {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 200, 200, 255]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        ExamDocument::from_bytes(buf).unwrap()
    }

    fn draw_selection(session: &mut CropSession<'_>, x: f32, y: f32, w: f32, h: f32) {
        session.pointer_down(x, y);
        session.pointer_move(x + w, y + h);
        session.pointer_up();
    }

    #[tokio::test]
    async fn starts_at_first_missing_index() {
        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        crops.insert(0, CropResource::new(vec![0], 1, 1));

        let mut session = CropSession::new(&doc, 3, &mut crops, &config);
        assert_eq!(session.state(), SessionState::NotStarted);
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Active(1));
    }

    #[tokio::test]
    async fn full_map_opens_complete() {
        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        crops.insert(0, CropResource::new(vec![0], 1, 1));

        let mut session = CropSession::new(&doc, 1, &mut crops, &config);
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.current_index(), None);
    }

    #[tokio::test]
    async fn zero_markers_opens_complete() {
        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        let mut session = CropSession::new(&doc, 0, &mut crops, &config);
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[tokio::test]
    async fn confirm_stores_crop_and_advances() {
        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        let mut session = CropSession::new(&doc, 2, &mut crops, &config);
        session.start().await.unwrap();

        draw_selection(&mut session, 10.0, 10.0, 30.0, 20.0);
        session.confirm_current().await.unwrap();
        assert_eq!(session.state(), SessionState::Active(1));
        assert!(session.selection().is_none());

        draw_selection(&mut session, 40.0, 40.0, 20.0, 20.0);
        session.confirm_current().await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);

        assert!(crops.is_complete(2));
        let (w, h) = crops.get(0).unwrap().dimensions();
        assert_eq!((w, h), (30, 20));
    }

    #[tokio::test]
    async fn too_small_selection_keeps_state() {
        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        let mut session = CropSession::new(&doc, 1, &mut crops, &config);
        session.start().await.unwrap();

        draw_selection(&mut session, 10.0, 10.0, 2.0, 2.0);
        assert!(matches!(
            session.confirm_current().await,
            Err(CropError::TooSmallSelection { .. })
        ));
        // No advance, no map entry, selection still visible for redraw.
        assert_eq!(session.state(), SessionState::Active(0));
        assert!(session.selection().is_some());
        assert_eq!(session.resolved_count(), 0);
    }

    #[tokio::test]
    async fn confirm_without_selection_fails() {
        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        let mut session = CropSession::new(&doc, 1, &mut crops, &config);
        session.start().await.unwrap();
        assert!(matches!(
            session.confirm_current().await,
            Err(CropError::NoSelection)
        ));
    }

    #[tokio::test]
    async fn skip_advances_without_touching_map() {
        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        let mut session = CropSession::new(&doc, 2, &mut crops, &config);
        session.start().await.unwrap();

        session.skip_current();
        assert_eq!(session.state(), SessionState::Active(1));
        session.skip_current();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(crops.resolved_count(), 0);
    }

    #[tokio::test]
    async fn confirm_replaces_prior_crop_and_releases_it() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let released = Arc::new(AtomicUsize::new(0));
        let mut crops = ResolvedCropMap::new();
        {
            let released = Arc::clone(&released);
            crops.insert(
                0,
                CropResource::new(vec![0], 1, 1).with_release_hook(move || {
                    released.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        // Resume at index 1, then re-crop index 0 via a fresh session over
        // a map where only index 1 is present.
        crops.release_all();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let released2 = Arc::new(AtomicUsize::new(0));
        {
            let released2 = Arc::clone(&released2);
            crops.insert(
                0,
                CropResource::new(vec![0], 1, 1).with_release_hook(move || {
                    released2.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        let mut session = CropSession::new(&doc, 1, &mut crops, &config);
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        session.close();

        // Overwrite directly: the stale resource is released exactly once.
        crops.insert(0, CropResource::new(vec![9], 2, 2));
        assert_eq!(released2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_session_preserves_partial_progress() {
        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        {
            let mut session = CropSession::new(&doc, 3, &mut crops, &config);
            session.start().await.unwrap();
            draw_selection(&mut session, 0.0, 0.0, 20.0, 20.0);
            session.confirm_current().await.unwrap();
            // Dropped mid-walk at index 1.
        }
        assert_eq!(crops.resolved_count(), 1);

        let mut session = CropSession::new(&doc, 3, &mut crops, &config);
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Active(1));
    }

    #[tokio::test]
    async fn change_page_on_raster_is_noop() {
        let doc = png_document(100, 100);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        let mut session = CropSession::new(&doc, 1, &mut crops, &config);
        session.start().await.unwrap();

        draw_selection(&mut session, 0.0, 0.0, 20.0, 20.0);
        session.change_page(1).await.unwrap();
        session.change_page(-1).await.unwrap();
        // Selection survives a no-op navigation.
        assert!(session.selection().is_some());
        assert_eq!(session.page().unwrap().number, 1);
    }

    #[tokio::test]
    async fn display_scaling_is_applied_to_crops() {
        let doc = png_document(200, 200);
        let config = ScanConfig::default();
        let mut crops = ResolvedCropMap::new();
        let mut session = CropSession::new(&doc, 1, &mut crops, &config);
        session.start().await.unwrap();
        // Page shown at half size: 50 display px cover 100 source px.
        session.set_display_size(100.0, 100.0);

        draw_selection(&mut session, 0.0, 0.0, 50.0, 25.0);
        session.confirm_current().await.unwrap();
        assert_eq!(crops.get(0).unwrap().dimensions(), (100, 50));
    }
}
