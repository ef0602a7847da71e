//! Coordinate mapping between source-image pixel space and deck canvas space.
//!
//! Analysis of a scanned page reports geometry in the pixels of the source
//! image; the deck works in canvas coordinates (1920×1080 for 16:9 and so
//! on). Both axes scale independently, so a 4:3 scan placed on a 16:9 canvas
//! stretches rather than letterboxes.
//!
//! Degenerate inputs never panic: a zero-sized source image maps positions to
//! the origin and sizes to a visible 100×50 placeholder.

use tracing::warn;

use crate::deck::{Position, Size};
use crate::render::PixelRegion;

/// Scale a source-image position onto the deck canvas.
///
/// The result is clamped to `[0, target]` on each axis so rounding on
/// right-edge or bottom-edge geometry cannot escape the canvas.
pub fn normalize_position(
    x: u32,
    y: u32,
    image_width: u32,
    image_height: u32,
    target_width: u32,
    target_height: u32,
) -> Position {
    if image_width == 0 || image_height == 0 {
        warn!(image_width, image_height, "zero-sized source image, position mapped to origin");
        return Position { x: 0, y: 0 };
    }
    let scale_x = target_width as f64 / image_width as f64;
    let scale_y = target_height as f64 / image_height as f64;
    Position {
        x: ((x as f64 * scale_x) as u32).min(target_width),
        y: ((y as f64 * scale_y) as u32).min(target_height),
    }
}

/// Scale a source-image extent onto the deck canvas.
///
/// Clamped to `[1, target]` on each axis: a region can shrink below one
/// pixel under heavy downscaling, and an invisible element helps nobody.
pub fn normalize_size(
    width: u32,
    height: u32,
    image_width: u32,
    image_height: u32,
    target_width: u32,
    target_height: u32,
) -> Size {
    if image_width == 0 || image_height == 0 {
        warn!(image_width, image_height, "zero-sized source image, using placeholder size");
        return Size {
            width: 100,
            height: 50,
        };
    }
    let scale_x = target_width as f64 / image_width as f64;
    let scale_y = target_height as f64 / image_height as f64;
    Size {
        width: ((width as f64 * scale_x) as u32).clamp(1, target_width.max(1)),
        height: ((height as f64 * scale_y) as u32).clamp(1, target_height.max(1)),
    }
}

/// Map a deck-space element box back to the pixel region of the source image
/// it came from, for crop extraction.
///
/// The region is clamped inside the image and kept at least one pixel on
/// each axis.
pub fn source_region(
    position: Position,
    size: Size,
    image_width: u32,
    image_height: u32,
    canvas_width: u32,
    canvas_height: u32,
) -> PixelRegion {
    if canvas_width == 0 || canvas_height == 0 || image_width == 0 || image_height == 0 {
        warn!(image_width, image_height, canvas_width, canvas_height,
              "degenerate dimensions, extracting full image");
        return PixelRegion {
            x: 0,
            y: 0,
            width: image_width.max(1),
            height: image_height.max(1),
        };
    }
    let scale_x = image_width as f64 / canvas_width as f64;
    let scale_y = image_height as f64 / canvas_height as f64;

    let x = ((position.x as f64 * scale_x) as u32).min(image_width.saturating_sub(1));
    let y = ((position.y as f64 * scale_y) as u32).min(image_height.saturating_sub(1));
    let width = ((size.width as f64 * scale_x) as u32).clamp(1, image_width - x);
    let height = ((size.height as f64 * scale_y) as u32).clamp(1, image_height - y);

    PixelRegion {
        x,
        y,
        width,
        height,
    }
}
