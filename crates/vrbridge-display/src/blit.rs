//! Where the preview window samples from and draws to.

use vrbridge_vr::{HEADSET_VIEW_MAX_HEIGHT, HEADSET_VIEW_MAX_WIDTH};

use crate::frame::Rect;
use crate::host::RenderTextureId;

/// Part of an eye texture shown in the preview by default.
pub const DEFAULT_MIRROR_SUBRECT: Rect = Rect::new(0.15, 0.15, 0.65, 0.65);

/// Sub-rect that crops an eye texture down to the headset view's shape.
///
/// Only applies when the headset view is strictly smaller than the eye
/// texture in both dimensions.
pub fn headset_view_subrect(eye_size: (u32, u32), view_size: (u32, u32)) -> Option<Rect> {
    let (view_w, view_h) = view_size;
    let (eye_w, eye_h) = eye_size;
    if view_w == 0 || view_h == 0 || view_w >= eye_w || view_h >= eye_h {
        return None;
    }
    let (view_w, view_h) = (view_w as f32, view_h as f32);
    let (eye_w, eye_h) = (eye_w as f32, eye_h as f32);

    let x = (eye_w - view_w) / eye_w;
    let y = 1.0 - (eye_h - view_h) / eye_h;
    let width = 1.0 - x;
    Some(Rect::new(x, y, width, width / (view_w / view_h)))
}

/// Preview sub-rect of the eye texture, tracking the host render viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorLayout {
    eye_size: (u32, u32),
    subrect: Rect,
    viewport_scaled: bool,
}

impl MirrorLayout {
    pub fn new(eye_size: (u32, u32)) -> Self {
        let mut layout = Self {
            eye_size,
            subrect: DEFAULT_MIRROR_SUBRECT,
            viewport_scaled: false,
        };
        layout.configure(eye_size, false);
        layout
    }

    pub fn subrect(&self) -> Rect {
        self.subrect
    }

    pub fn is_viewport_scaled(&self) -> bool {
        self.viewport_scaled
    }

    /// Recompute the sub-rect for a (possibly new) eye size. `full_view` is
    /// set while the runtime's shared headset view is the mirror source,
    /// which is always shown whole.
    pub fn configure(&mut self, eye_size: (u32, u32), full_view: bool) {
        self.eye_size = eye_size;
        if !self.viewport_scaled {
            self.subrect = DEFAULT_MIRROR_SUBRECT;
        }
        if full_view {
            self.subrect = Rect::FULL;
        } else if let Some(subrect) =
            headset_view_subrect(eye_size, (HEADSET_VIEW_MAX_WIDTH, HEADSET_VIEW_MAX_HEIGHT))
        {
            self.subrect = subrect;
        }
    }

    /// The host rendered into `viewport` of the eye texture; shrink the
    /// sub-rect to match.
    pub fn apply_viewport(&mut self, viewport: Rect, eye_size: (u32, u32), full_view: bool) {
        self.viewport_scaled = false;
        self.configure(eye_size, full_view);
        if viewport.is_partial() {
            self.subrect = self.subrect.scaled(viewport.width, viewport.height);
            self.viewport_scaled = true;
        }
    }

    /// Width over height of the sampled region of the eye texture.
    pub fn source_aspect(&self) -> f32 {
        let (w, h) = self.eye_size;
        (w as f32 * self.subrect.width) / (h as f32 * self.subrect.height)
    }
}

/// One preview blit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlitParams {
    pub texture: RenderTextureId,
    pub array_slice: u32,
    pub source: Rect,
    pub dest: Rect,
}

/// Crop `source` so that, drawn into `dest` of a `dest_size` target, it keeps
/// `source_aspect`. Both rects stay centred where they were.
///
/// An empty destination is passed through untouched.
pub fn fit_blit(source: Rect, source_aspect: f32, dest_size: (u32, u32), dest: Rect) -> (Rect, Rect) {
    let dest_w = dest_size.0 as f32 * dest.width;
    let dest_h = dest_size.1 as f32 * dest.height;
    if dest_w <= 0.0 || dest_h <= 0.0 {
        return (source, dest);
    }
    let ratio = source_aspect / (dest_w / dest_h);

    let center_x = source.x + source.width * 0.5;
    let center_y = source.y + source.height * 0.5;
    let (mut width, mut height) = (source.width, source.height);
    if ratio > 1.0 {
        width /= ratio;
    } else {
        height *= ratio;
    }
    let fitted = Rect::new(center_x - width * 0.5, center_y - height * 0.5, width, height);
    (fitted, dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_default_layout() {
        let layout = MirrorLayout::new((1852, 2056));
        assert_eq!(layout.subrect(), DEFAULT_MIRROR_SUBRECT);
        assert!(close(layout.source_aspect(), 1852.0 / 2056.0));
    }

    #[test]
    fn test_headset_view_crop() {
        assert!(headset_view_subrect((1852, 2056), (3840, 2160)).is_none());
        let r = headset_view_subrect((4000, 2500), (3840, 2160)).unwrap();
        assert!(close(r.x, 0.04));
        assert!(close(r.y, 0.864));
        assert!(close(r.width, 0.96));
        assert!(close(r.height, 0.54));
    }

    #[test]
    fn test_full_view_when_shared_texture_active() {
        let mut layout = MirrorLayout::new((1852, 2056));
        layout.configure((1852, 2056), true);
        assert_eq!(layout.subrect(), Rect::FULL);
    }

    #[test]
    fn test_viewport_scales_subrect_once() {
        let mut layout = MirrorLayout::new((1000, 1000));
        let viewport = Rect::new(0.0, 0.0, 0.5, 0.5);
        layout.apply_viewport(viewport, (1000, 1000), false);
        assert!(layout.is_viewport_scaled());
        assert!(close(layout.subrect().width, 0.325));

        // Re-applying starts from the default again rather than compounding.
        layout.apply_viewport(viewport, (1000, 1000), false);
        assert!(close(layout.subrect().width, 0.325));

        layout.apply_viewport(Rect::FULL, (1000, 1000), false);
        assert!(!layout.is_viewport_scaled());
        assert_eq!(layout.subrect(), DEFAULT_MIRROR_SUBRECT);
    }

    #[test]
    fn test_fit_into_wide_target_crops_height() {
        let (src, dest) = fit_blit(DEFAULT_MIRROR_SUBRECT, 1.0, (1920, 1080), Rect::FULL);
        assert_eq!(dest, Rect::FULL);
        assert!(close(src.width, 0.65));
        assert!(close(src.height, 0.65 * 0.5625));
        assert!(close(src.y + src.height * 0.5, 0.475));
    }

    #[test]
    fn test_fit_into_tall_target_crops_width() {
        let (src, _) = fit_blit(Rect::FULL, 16.0 / 9.0, (1000, 1000), Rect::FULL);
        assert!(close(src.width, 9.0 / 16.0));
        assert!(close(src.height, 1.0));
        assert!(close(src.x + src.width * 0.5, 0.5));
    }

    #[test]
    fn test_empty_destination_passes_through() {
        let (src, dest) = fit_blit(DEFAULT_MIRROR_SUBRECT, 1.0, (1920, 1080), Rect::ZERO);
        assert_eq!(src, DEFAULT_MIRROR_SUBRECT);
        assert_eq!(dest, Rect::ZERO);
    }
}
