//! Data exchanged with the VR runtime, in the runtime's own convention:
//! right-handed, +Y up, -Z forward, metres.

use serde::{Deserialize, Serialize};
use vrbridge_math::{quaternion_to_matrix, Quaternion, Vector2, Vector3};

pub type TrackedDeviceIndex = u32;

pub const HMD_DEVICE_INDEX: TrackedDeviceIndex = 0;
pub const MAX_TRACKED_DEVICES: usize = 64;

/// Largest mirror view the runtime will render.
pub const HEADSET_VIEW_MAX_WIDTH: u32 = 3840;
pub const HEADSET_VIEW_MAX_HEIGHT: u32 = 2160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

/// 3x4 row-major rigid transform; column 3 is the translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HmdMatrix34 {
    pub m: [[f32; 4]; 3],
}

impl HmdMatrix34 {
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
    };

    pub fn from_translation(t: Vector3) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][3] = t.x;
        out.m[1][3] = t.y;
        out.m[2][3] = t.z;
        out
    }

    pub fn translation(&self) -> Vector3 {
        Vector3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    /// Replace the rotation block, keeping the translation.
    pub fn set_rotation(&mut self, rotation: Quaternion) {
        // Column-vector layout: the transpose of the row-vector basis.
        let basis = quaternion_to_matrix(rotation);
        for (r, row) in self.m.iter_mut().enumerate() {
            for (c, cell) in row[..3].iter_mut().enumerate() {
                *cell = basis.m[c][r];
            }
        }
    }
}

impl Default for HmdMatrix34 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackedDevicePose {
    pub device_to_absolute: HmdMatrix34,
    pub velocity: Vector3,
    pub angular_velocity: Vector3,
    pub pose_is_valid: bool,
    pub device_is_connected: bool,
}

/// Frustum half-extents as tangents at unit distance. Left and top are
/// usually negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawProjection {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl RawProjection {
    pub const fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self { left, right, top, bottom }
    }
}

/// Unindexed triangle list in normalized viewport coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HiddenAreaMesh {
    pub vertices: Vec<Vector2>,
    pub triangle_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTiming {
    pub frame_index: u32,
    pub num_frame_presents: u32,
    pub num_dropped_frames: u32,
    pub system_time_seconds: f64,
    pub total_render_gpu_ms: f32,
    pub compositor_render_gpu_ms: f32,
    pub compositor_render_cpu_ms: f32,
    pub compositor_idle_cpu_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackedDeviceClass {
    Invalid,
    Hmd,
    Controller,
    GenericTracker,
    TrackingReference,
    DisplayRedirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerRole {
    Invalid,
    LeftHand,
    RightHand,
    OptOut,
    Treadmill,
    Stylus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingUniverse {
    Seated,
    Standing,
    RawAndUncalibrated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityLevel {
    Unknown,
    Idle,
    UserInteraction,
    UserInteractionTimeout,
    Standby,
    IdleTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatProperty {
    UserIpdMeters,
    UserHeadToEyeDepthMeters,
    DisplayFrequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringProperty {
    ModelNumber,
    SerialNumber,
    ManufacturerName,
    ControllerType,
}

/// Graphics API of a texture handed to the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureApi {
    DirectX,
    Vulkan,
    OpenGl,
}

/// The host's rendering device, as the overlay view API wants it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeDevice {
    pub api: TextureApi,
    pub handle: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayHandle(pub u64);

/// A borrowed view of an overlay's backing texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayView {
    pub overlay: OverlayHandle,
    /// Shareable texture handle, zero when the overlay has no texture yet.
    pub shared_handle: u64,
    pub device: NativeDevice,
}

/// Eye texture submitted to the compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmitTexture {
    pub native: u64,
    pub depth: Option<u64>,
    pub api: TextureApi,
    /// Array slice for single-pass textures.
    pub slice: Option<u32>,
    /// UV bounds of the eye inside the texture: `(u_min, v_min, u_max, v_max)`.
    pub bounds: [f32; 4],
}
