use std::ops::{Add, Mul, MulAssign, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::Vector3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about a unit `axis`.
    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Self {
        let (s, c) = (0.5 * angle).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z + self.w * rhs.w
    }

    pub fn sqr_magnitude(self) -> f32 {
        self.dot(self)
    }

    pub fn magnitude(self) -> f32 {
        self.sqr_magnitude().sqrt()
    }

    /// Scale to unit length.
    ///
    /// The zero quaternion has no direction and comes back as NaN; callers
    /// only normalize rotations.
    pub fn normalize(self) -> Self {
        self * (1.0 / self.magnitude())
    }

    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Normalized linear blend between `a` and `b`.
    ///
    /// Not a slerp: the angular speed is uneven, which is fine for the small
    /// angle between the two eyes of one headset.
    pub fn lerp(a: Self, b: Self, t: f32) -> Self {
        (a * (1.0 - t) + b * t).normalize()
    }

    pub fn approx_eq(self, rhs: Self, epsilon: f32) -> bool {
        (self.x - rhs.x).abs() <= epsilon
            && (self.y - rhs.y).abs() <= epsilon
            && (self.z - rhs.z).abs() <= epsilon
            && (self.w - rhs.w).abs() <= epsilon
    }

    /// Same rotation, allowing for the `q` / `-q` double cover.
    pub fn same_rotation(self, rhs: Self, epsilon: f32) -> bool {
        self.dot(rhs).abs() >= 1.0 - epsilon
    }
}

/// Hamilton product.
impl Mul for Quaternion {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y + self.y * rhs.w + self.z * rhs.x - self.x * rhs.z,
            z: self.w * rhs.z + self.z * rhs.w + self.x * rhs.y - self.y * rhs.x,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }
}

impl MulAssign for Quaternion {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Mul<f32> for Quaternion {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs, self.w * rhs)
    }
}

impl Add for Quaternion {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z, self.w + rhs.w)
    }
}

impl Sub for Quaternion {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z, self.w - rhs.w)
    }
}

impl Neg for Quaternion {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}
