//! Region selection: the drag-rectangle state machine and the
//! display-space → source-space coordinate transform.
//!
//! The selector knows nothing about pages, markers, or sessions. It turns
//! a stream of pointer events into an axis-aligned rectangle in display
//! coordinates, and offers pure functions to map that rectangle onto the
//! page's natural resolution and cut the pixels out. The crop session owns
//! everything above that.

use crate::error::CropError;
use image::{imageops, DynamicImage};
use std::io::Cursor;
use tracing::debug;

/// An axis-aligned rectangle in display pixel coordinates.
///
/// Width and height are always non-negative; the rectangle is stored as
/// the bounding box of the drag anchor and the current pointer position,
/// so dragging in any of the four directions yields the same rectangle
/// for the same two corner points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SelectRect {
    /// Bounding box of two corner points.
    pub fn from_corners(ax: f32, ay: f32, bx: f32, by: f32) -> Self {
        Self {
            x: ax.min(bx),
            y: ay.min(by),
            width: (bx - ax).abs(),
            height: (by - ay).abs(),
        }
    }
}

/// A rectangle in source (natural-resolution) pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Drag state of the selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionState {
    /// No selection in progress.
    Idle,
    /// Pointer is down; the anchor is fixed, the rectangle follows the cursor.
    Dragging { anchor: (f32, f32), rect: SelectRect },
    /// Pointer released; the rectangle persists until commit or cancel.
    Confirmed(SelectRect),
}

/// Rectangle-selection state machine over a displayed page surface.
#[derive(Debug, Clone, Copy)]
pub struct RegionSelector {
    state: SelectionState,
}

impl Default for RegionSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionSelector {
    pub fn new() -> Self {
        Self {
            state: SelectionState::Idle,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// The current rectangle, whether mid-drag or confirmed.
    pub fn selection(&self) -> Option<SelectRect> {
        match self.state {
            SelectionState::Idle => None,
            SelectionState::Dragging { rect, .. } => Some(rect),
            SelectionState::Confirmed(rect) => Some(rect),
        }
    }

    /// Pointer pressed at display coordinates: start a new drag.
    ///
    /// Any prior confirmed rectangle is discarded — drawing always starts
    /// over rather than adjusting.
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.state = SelectionState::Dragging {
            anchor: (x, y),
            rect: SelectRect::from_corners(x, y, x, y),
        };
    }

    /// Pointer moved: recompute the rectangle as the bounding box of the
    /// anchor and the cursor. Ignored unless a drag is in progress.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if let SelectionState::Dragging { anchor, .. } = self.state {
            self.state = SelectionState::Dragging {
                anchor,
                rect: SelectRect::from_corners(anchor.0, anchor.1, x, y),
            };
        }
    }

    /// Pointer released: the rectangle persists for inspection and commit.
    pub fn pointer_up(&mut self) {
        if let SelectionState::Dragging { rect, .. } = self.state {
            self.state = SelectionState::Confirmed(rect);
        }
    }

    /// Drop any selection (page change, marker advance, explicit cancel).
    pub fn clear(&mut self) {
        self.state = SelectionState::Idle;
    }
}

/// Map a display-space rectangle onto the page's natural resolution.
///
/// The scale factor is computed independently per axis from the ratio of
/// the natural size to the displayed size, then the result is clamped to
/// the natural bounds so rounding never reads outside the image.
pub fn to_source_space(
    rect: SelectRect,
    natural: (u32, u32),
    display: (f32, f32),
) -> SourceRect {
    let (nat_w, nat_h) = natural;
    let scale_x = if display.0 > 0.0 {
        nat_w as f32 / display.0
    } else {
        1.0
    };
    let scale_y = if display.1 > 0.0 {
        nat_h as f32 / display.1
    } else {
        1.0
    };

    let x = ((rect.x * scale_x).max(0.0) as u32).min(nat_w.saturating_sub(1));
    let y = ((rect.y * scale_y).max(0.0) as u32).min(nat_h.saturating_sub(1));
    let width = ((rect.width * scale_x).round() as u32)
        .max(1)
        .min(nat_w - x);
    let height = ((rect.height * scale_y).round() as u32)
        .max(1)
        .min(nat_h - y);

    SourceRect {
        x,
        y,
        width,
        height,
    }
}

/// Cut the selected region out of a page raster.
///
/// Rejects rectangles below `min_px` on either display axis with
/// [`CropError::TooSmallSelection`] so an accidental click never produces
/// a degenerate crop. The returned image is a standalone copy of the
/// source pixels.
pub fn crop_selection(
    page_image: &DynamicImage,
    rect: SelectRect,
    display: (f32, f32),
    min_px: f32,
) -> Result<DynamicImage, CropError> {
    if rect.width < min_px || rect.height < min_px {
        return Err(CropError::TooSmallSelection {
            width: rect.width,
            height: rect.height,
            min: min_px,
        });
    }

    let natural = (page_image.width(), page_image.height());
    let src = to_source_space(rect, natural, display);
    debug!(
        "Cropping {}x{} at ({}, {}) from {}x{} page",
        src.width, src.height, src.x, src.y, natural.0, natural.1
    );

    Ok(DynamicImage::ImageRgba8(
        imageops::crop_imm(page_image, src.x, src.y, src.width, src.height).to_image(),
    ))
}

/// Encode a cropped region as PNG bytes.
///
/// PNG over JPEG: crops are graphs and variation tables full of thin
/// lines, where lossy artefacts are most visible when re-embedded at
/// display size.
pub fn encode_crop(img: &DynamicImage) -> Result<Vec<u8>, CropError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| CropError::EncodeFailed {
            detail: e.to_string(),
        })?;
    debug!("Encoded crop → {} bytes PNG", buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn drag_any_direction_same_rect() {
        let down_right = SelectRect::from_corners(10.0, 20.0, 50.0, 60.0);
        let up_left = SelectRect::from_corners(50.0, 60.0, 10.0, 20.0);
        let down_left = SelectRect::from_corners(50.0, 20.0, 10.0, 60.0);
        assert_eq!(down_right, up_left);
        assert_eq!(down_right, down_left);
        assert!(down_right.width >= 0.0 && down_right.height >= 0.0);
    }

    #[test]
    fn state_machine_transitions() {
        let mut sel = RegionSelector::new();
        assert_eq!(sel.state(), SelectionState::Idle);
        assert!(sel.selection().is_none());

        sel.pointer_down(10.0, 10.0);
        assert!(matches!(sel.state(), SelectionState::Dragging { .. }));

        sel.pointer_move(30.0, 50.0);
        let rect = sel.selection().unwrap();
        assert_eq!(rect.width, 20.0);
        assert_eq!(rect.height, 40.0);

        sel.pointer_up();
        assert!(matches!(sel.state(), SelectionState::Confirmed(_)));
        assert_eq!(sel.selection().unwrap(), rect);

        sel.clear();
        assert_eq!(sel.state(), SelectionState::Idle);
    }

    #[test]
    fn pointer_up_without_drag_is_ignored() {
        let mut sel = RegionSelector::new();
        sel.pointer_up();
        assert_eq!(sel.state(), SelectionState::Idle);
        sel.pointer_move(5.0, 5.0);
        assert_eq!(sel.state(), SelectionState::Idle);
    }

    #[test]
    fn new_drag_discards_confirmed_rect() {
        let mut sel = RegionSelector::new();
        sel.pointer_down(0.0, 0.0);
        sel.pointer_move(10.0, 10.0);
        sel.pointer_up();
        sel.pointer_down(100.0, 100.0);
        let rect = sel.selection().unwrap();
        assert_eq!(rect.x, 100.0);
        assert_eq!(rect.width, 0.0);
    }

    #[test]
    fn source_transform_scales_per_axis() {
        // Page shown at half width, quarter height.
        let rect = SelectRect {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 10.0,
        };
        let src = to_source_space(rect, (400, 400), (200.0, 100.0));
        assert_eq!(src, SourceRect { x: 20, y: 40, width: 40, height: 40 });
    }

    #[test]
    fn source_transform_identity_at_natural_size() {
        let rect = SelectRect {
            x: 5.0,
            y: 6.0,
            width: 7.0,
            height: 8.0,
        };
        let src = to_source_space(rect, (100, 100), (100.0, 100.0));
        assert_eq!(src, SourceRect { x: 5, y: 6, width: 7, height: 8 });
    }

    #[test]
    fn source_transform_clamps_to_bounds() {
        let rect = SelectRect {
            x: 90.0,
            y: 90.0,
            width: 50.0,
            height: 50.0,
        };
        let src = to_source_space(rect, (100, 100), (100.0, 100.0));
        assert!(src.x + src.width <= 100);
        assert!(src.y + src.height <= 100);
    }

    #[test]
    fn crop_rejects_too_small() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            50,
            50,
            Rgba([1, 2, 3, 255]),
        ));
        let rect = SelectRect {
            x: 0.0,
            y: 0.0,
            width: 3.0,
            height: 40.0,
        };
        assert!(matches!(
            crop_selection(&img, rect, (50.0, 50.0), 5.0),
            Err(CropError::TooSmallSelection { .. })
        ));
    }

    #[test]
    fn crop_copies_selected_pixels() {
        let mut raw = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        for y in 10..20 {
            for x in 10..30 {
                raw.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        let img = DynamicImage::ImageRgba8(raw);
        let rect = SelectRect {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 10.0,
        };
        let crop = crop_selection(&img, rect, (40.0, 40.0), 5.0).unwrap();
        assert_eq!(crop.width(), 20);
        assert_eq!(crop.height(), 10);
        assert_eq!(crop.to_rgba8().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn crop_accounts_for_display_scaling() {
        // 100px page shown at 50px: a 25px display selection covers 50 source px.
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            100,
            100,
            Rgba([9, 9, 9, 255]),
        ));
        let rect = SelectRect {
            x: 0.0,
            y: 0.0,
            width: 25.0,
            height: 25.0,
        };
        let crop = crop_selection(&img, rect, (50.0, 50.0), 5.0).unwrap();
        assert_eq!(crop.width(), 50);
        assert_eq!(crop.height(), 50);
    }

    #[test]
    fn encode_produces_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            10,
            10,
            Rgba([255, 0, 0, 255]),
        ));
        let png = encode_crop(&img).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }
}
