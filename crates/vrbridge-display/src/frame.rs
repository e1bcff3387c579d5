//! Per-frame descriptors exchanged with the host.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use vrbridge_math::Matrix4x4;

use crate::coords::Pose;
use crate::eye::EyeView;
use crate::host::{OcclusionMeshId, RenderTextureId};

/// Normalised rectangle, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const FULL: Self = Self::new(0.0, 0.0, 1.0, 1.0);
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Anything other than the full unit rectangle.
    pub fn is_partial(&self) -> bool {
        self.x > 0.0 || self.y > 0.0 || self.width < 1.0 || self.height < 1.0
    }

    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self::new(self.x * sx, self.y * sy, self.width * sx, self.height * sy)
    }

    /// `(u_min, v_min, u_max, v_max)`.
    pub fn to_bounds(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }
}

bitflags! {
    /// What the host changed since the previous frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameHintChanges: u32 {
        const RENDER_VIEWPORT = 1 << 0;
        const TEXTURE_RESOLUTION_SCALE = 1 << 1;
        const SINGLE_PASS = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHints {
    pub changed: FrameHintChanges,
    pub srgb: bool,
    pub single_pass: bool,
    pub render_viewport: Rect,
    pub texture_resolution_scale: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for FrameHints {
    fn default() -> Self {
        Self {
            changed: FrameHintChanges::empty(),
            srgb: true,
            single_pass: false,
            render_viewport: Rect::FULL,
            texture_resolution_scale: 1.0,
            near: 0.01,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullingPassDesc {
    pub view: EyeView,
    pub pose: Pose,
    pub projection: Matrix4x4,
    pub separation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    pub pose: Pose,
    pub projection: Matrix4x4,
    pub viewport: Rect,
    pub texture_array_slice: u32,
    pub occlusion_mesh: Option<OcclusionMeshId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub texture: RenderTextureId,
    pub culling_pass_index: usize,
    pub params: Vec<RenderParams>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NextFrameDesc {
    pub culling_passes: Vec<CullingPassDesc>,
    pub render_passes: Vec<RenderPass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderingCaps {
    pub no_single_pass_rendering_support: bool,
    pub invalidate_render_state_after_each_callback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReprojectionMode {
    None,
    PositionAndOrientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayState {
    pub reprojection: ReprojectionMode,
    pub display_is_transparent: bool,
    pub focus_lost: bool,
}

/// Compositor counters published once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameStats {
    pub dropped_frames: u32,
    pub frame_presents: u32,
    pub frame_time_reference_secs: f64,
    pub gpu_render_ms: f32,
    pub cpu_render_ms: f32,
    pub cpu_idle_ms: f32,
    pub compositor_render_ms: f32,
    pub refresh_rate: f32,
}
