//! Per-eye poses, projections and the combined culling frustum.

use serde::{Deserialize, Serialize};
use tracing::debug;
use vrbridge_math::{Matrix4x4, Vector3, Vector4};
use vrbridge_vr::{Eye, FloatProperty, HmdMatrix34, RawProjection, VrSystem, HMD_DEVICE_INDEX};

use crate::coords::{host_pose, to_host_space, Pose};

/// Nearest clip distance accepted from the host.
pub const MIN_CLIP_DISTANCE: f32 = 1e-7;
/// Far plane used when the host asks for a degenerate one.
pub const FALLBACK_FAR_CLIP: f32 = 1000.0;
/// Interpupillary distance assumed when the runtime does not report one.
pub const DEFAULT_EYE_SEPARATION: f32 = 0.0625;

/// Eye as the host indexes it. `Center` is synthetic: the union of both eyes,
/// used for single-pass culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EyeView {
    Left,
    Right,
    Center,
}

impl EyeView {
    pub fn index(self) -> usize {
        match self {
            EyeView::Left => 0,
            EyeView::Right => 1,
            EyeView::Center => 2,
        }
    }

    pub fn runtime_eye(self) -> Option<Eye> {
        match self {
            EyeView::Left => Some(Eye::Left),
            EyeView::Right => Some(Eye::Right),
            EyeView::Center => None,
        }
    }
}

impl From<Eye> for EyeView {
    fn from(eye: Eye) -> Self {
        match eye {
            Eye::Left => EyeView::Left,
            Eye::Right => EyeView::Right,
        }
    }
}

/// Eye pose relative to the head, in host space.
///
/// The center eye sits on the head axis, pushed forward by the runtime's
/// head-to-eye depth (zero when unknown).
pub fn eye_pose<S: VrSystem + ?Sized>(runtime: &S, view: EyeView) -> Pose {
    let eye_to_head = match view.runtime_eye() {
        Some(eye) => runtime.eye_to_head_transform(eye),
        None => {
            let depth = runtime
                .float_property(HMD_DEVICE_INDEX, FloatProperty::UserHeadToEyeDepthMeters)
                .unwrap_or(0.0);
            let mut m = HmdMatrix34::IDENTITY;
            m.m[2][3] = depth;
            m
        }
    };
    host_pose(&to_host_space(&eye_to_head))
}

/// Frustum tangents for a view. The center eye gets the outer envelope of the
/// two real eyes.
pub fn eye_tangents<S: VrSystem + ?Sized>(runtime: &S, view: EyeView) -> RawProjection {
    match view.runtime_eye() {
        Some(eye) => runtime.projection_raw(eye),
        None => {
            let l = runtime.projection_raw(Eye::Left);
            let r = runtime.projection_raw(Eye::Right);
            RawProjection {
                left: l.left.min(r.left),
                right: l.right.max(r.right),
                top: l.top.min(r.top),
                bottom: l.bottom.max(r.bottom),
            }
        }
    }
}

/// Off-center perspective projection in host layout.
///
/// The runtime measures `top`/`bottom` with +Y down, so its `bottom` becomes
/// the host's top edge.
pub fn projection_from_tangents(tangents: &RawProjection, near: f32, far: f32) -> Matrix4x4 {
    let near = near.max(MIN_CLIP_DISTANCE);
    let far = if far < MIN_CLIP_DISTANCE {
        FALLBACK_FAR_CLIP
    } else {
        far
    };

    let left = tangents.left * near;
    let right = tangents.right * near;
    let top = tangents.bottom * near;
    let bottom = tangents.top * near;

    let x = 2.0 * near / (right - left);
    let y = 2.0 * near / (top - bottom);
    let a = (right + left) / (right - left);
    let b = (top + bottom) / (top - bottom);
    let c = -(far + near) / (far - near);
    let d = -(2.0 * far * near) / (far - near);
    let e = -1.0;

    let mut m = Matrix4x4::ZERO;
    m.set_row(0, Vector4::new(x, 0.0, 0.0, 0.0));
    m.set_row(1, Vector4::new(0.0, y, 0.0, 0.0));
    m.set_row(2, Vector4::new(a, b, c, e));
    m.set_row(3, Vector4::new(0.0, 0.0, d, 0.0));
    m
}

pub fn projection<S: VrSystem + ?Sized>(
    runtime: &S,
    view: EyeView,
    near: f32,
    far: f32,
) -> Matrix4x4 {
    projection_from_tangents(&eye_tangents(runtime, view), near, far)
}

/// Interpupillary distance, or [`DEFAULT_EYE_SEPARATION`] when unavailable.
pub fn eye_separation<S: VrSystem + ?Sized>(runtime: &S) -> f32 {
    match runtime.float_property(HMD_DEVICE_INDEX, FloatProperty::UserIpdMeters) {
        Ok(ipd) if ipd != 0.0 => ipd,
        Ok(_) => DEFAULT_EYE_SEPARATION,
        Err(e) => {
            debug!("IPD unavailable, using default: {}", e);
            DEFAULT_EYE_SEPARATION
        }
    }
}

/// Distance to move the culling origin back so one frustum covers both eyes.
///
/// `vertical_fov` is in radians; `aspect` is width over height.
pub fn culling_pullback(separation: f32, vertical_fov: f32, aspect: f32) -> f32 {
    0.5 * separation / (0.5 * vertical_fov * aspect).tan()
}

/// Vertical field of view (radians) and aspect ratio of a host projection.
pub fn fov_and_aspect(projection: &Matrix4x4) -> (f32, f32) {
    let x_scale = projection.get(0, 0);
    let y_scale = projection.get(1, 1);
    let vertical_fov = 2.0 * (1.0 / y_scale).atan();
    (vertical_fov, y_scale / x_scale)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CullingPass {
    pub pose: Pose,
    pub projection: Matrix4x4,
    pub separation: f32,
}

/// Culling frustum for `view`: its own projection, pose pulled back along Z.
pub fn culling_pass<S: VrSystem + ?Sized>(
    runtime: &S,
    view: EyeView,
    near: f32,
    far: f32,
) -> CullingPass {
    let separation = eye_separation(runtime);
    let projection = projection(runtime, view, near, far);
    let (vertical_fov, aspect) = fov_and_aspect(&projection);
    let mut pose = eye_pose(runtime, view);
    pose.position -= Vector3::new(0.0, 0.0, culling_pullback(separation, vertical_fov, aspect));
    CullingPass {
        pose,
        projection,
        separation,
    }
}
