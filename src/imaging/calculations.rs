//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{Breakpoint, ResizeSpec};

/// Height of an image scaled to `target_width`, preserving aspect ratio.
///
/// Never returns zero, so extremely wide sources still produce a valid image.
///
/// # Examples
/// ```
/// # use upload_imaging::imaging::calculations::scaled_height;
/// assert_eq!(scaled_height((1200, 800), 500), 333);
/// assert_eq!(scaled_height((4000, 1), 245), 1);
/// ```
pub fn scaled_height(source: (u32, u32), target_width: u32) -> u32 {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return src_h.max(1);
    }
    let h = (src_h as f64 * target_width as f64 / src_w as f64).round() as u32;
    h.max(1)
}

/// A breakpoint that fits under the source and will be generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedVariant {
    /// Breakpoint name (`thumbnail`, `small`, ...).
    pub name: String,
    pub resize: ResizeSpec,
}

impl PlannedVariant {
    pub fn width(&self) -> u32 {
        self.resize.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.resize.dimensions().1
    }
}

/// Decide whether a breakpoint produces a variant for a source of the given size.
///
/// Returns `None` when the breakpoint is at least as wide as the source (no
/// upscaling). A breakpoint with a height is a cover crop to exactly that box;
/// otherwise the height follows the source aspect ratio.
pub fn plan_breakpoint(source: (u32, u32), breakpoint: &Breakpoint) -> Option<PlannedVariant> {
    if breakpoint.width == 0 || breakpoint.width >= source.0 {
        return None;
    }
    let resize = match breakpoint.height {
        Some(height) => ResizeSpec::Cover {
            width: breakpoint.width,
            height,
        },
        None => ResizeSpec::Scale {
            width: breakpoint.width,
            height: scaled_height(source, breakpoint.width),
        },
    };
    Some(PlannedVariant {
        name: breakpoint.name.clone(),
        resize,
    })
}

/// Plan every breakpoint in configured order, dropping the ones that don't fit.
pub fn plan_breakpoints(source: (u32, u32), breakpoints: &[Breakpoint]) -> Vec<PlannedVariant> {
    breakpoints
        .iter()
        .filter_map(|bp| plan_breakpoint(source, bp))
        .collect()
}
