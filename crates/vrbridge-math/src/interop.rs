//! Conversions to and from `glam`.
//!
//! glam is column-vector (`p' = M * p`), so a row-vector [`Matrix4x4`] maps
//! onto a glam matrix whose columns are our rows. Points transform identically
//! on both sides of the conversion.
//!
//! Euler angles go through glam as well; see
//! [`Quaternion::from_yaw_pitch_roll`].

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4};

use crate::{Matrix4x4, Quaternion, Vector2, Vector3, Vector4};

impl From<Vector2> for Vec2 {
    fn from(v: Vector2) -> Self {
        Vec2::new(v.x, v.y)
    }
}

impl From<Vec2> for Vector2 {
    fn from(v: Vec2) -> Self {
        Vector2::new(v.x, v.y)
    }
}

impl From<Vector3> for Vec3 {
    fn from(v: Vector3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

impl From<Vec3> for Vector3 {
    fn from(v: Vec3) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

impl From<Vector4> for Vec4 {
    fn from(v: Vector4) -> Self {
        Vec4::new(v.x, v.y, v.z, v.w)
    }
}

impl From<Vec4> for Vector4 {
    fn from(v: Vec4) -> Self {
        Vector4::new(v.x, v.y, v.z, v.w)
    }
}

impl From<Quaternion> for Quat {
    fn from(q: Quaternion) -> Self {
        Quat::from_xyzw(q.x, q.y, q.z, q.w)
    }
}

impl From<Quat> for Quaternion {
    fn from(q: Quat) -> Self {
        Quaternion::new(q.x, q.y, q.z, q.w)
    }
}

impl From<Matrix4x4> for Mat4 {
    fn from(m: Matrix4x4) -> Self {
        Mat4::from_cols_array_2d(&m.m)
    }
}

impl From<Mat4> for Matrix4x4 {
    fn from(m: Mat4) -> Self {
        Matrix4x4::from_rows(m.to_cols_array_2d())
    }
}

impl Quaternion {
    /// Yaw about +Y, then pitch about the yawed +X, then roll about the
    /// resulting +Z. Angles in radians.
    pub fn from_yaw_pitch_roll(yaw: f32, pitch: f32, roll: f32) -> Self {
        Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll).into()
    }

    /// `(yaw, pitch, roll)` in radians, inverse of
    /// [`Quaternion::from_yaw_pitch_roll`] for pitch within ±90°.
    pub fn to_yaw_pitch_roll(self) -> (f32, f32, f32) {
        Quat::from(self).to_euler(EulerRot::YXZ)
    }
}
