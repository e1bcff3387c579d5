use std::ops::{Mul, MulAssign};

use serde::{Deserialize, Serialize};

use crate::{Quaternion, Vector3, Vector4};

/// Rotation block, `m[row][col]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix3x3 {
    pub m: [[f32; 3]; 3],
}

/// Rigid or projective transform, `m[row][col]`, translation in row 3.
///
/// The host ABI stores the same 16 floats as four column vectors, so
/// `m[i]` is what the host calls `columns[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix4x4 {
    pub m: [[f32; 4]; 4],
}

impl Default for Matrix3x3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Default for Matrix4x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix3x3 {
    pub const IDENTITY: Self = Self::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    pub const fn from_rows(m: [[f32; 3]; 3]) -> Self {
        Self { m }
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.m[row][col]
    }

    pub fn row(&self, row: usize) -> Vector3 {
        Vector3::from(self.m[row])
    }

    pub fn col(&self, col: usize) -> Vector3 {
        Vector3::new(self.m[0][col], self.m[1][col], self.m[2][col])
    }

    pub fn transpose(&self) -> Self {
        let mut out = *self;
        for r in 0..3 {
            for c in 0..3 {
                out.m[r][c] = self.m[c][r];
            }
        }
        out
    }

    pub fn determinant(&self) -> f32 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    pub fn to_quaternion(&self) -> Quaternion {
        matrix_to_quaternion(self)
    }

    pub fn from_quaternion(q: Quaternion) -> Self {
        quaternion_to_matrix(q)
    }
}

impl Mul for Matrix3x3 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut out = [[0.0; 3]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = self.row(r).dot(rhs.col(c));
            }
        }
        Self::from_rows(out)
    }
}

/// Shoemake's branch-on-trace extraction.
///
/// `m` must be orthonormal. The result is normalized.
pub fn matrix_to_quaternion(m: &Matrix3x3) -> Quaternion {
    let m = &m.m;
    let trace = m[0][0] + m[1][1] + m[2][2];
    if trace > 0.0 {
        let root = (trace + 1.0).sqrt();
        let f = 0.5 / root;
        return Quaternion::new(
            (m[1][2] - m[2][1]) * f,
            (m[2][0] - m[0][2]) * f,
            (m[0][1] - m[1][0]) * f,
            0.5 * root,
        )
        .normalize();
    }

    const NEXT: [usize; 3] = [1, 2, 0];
    let mut i = 0;
    if m[1][1] > m[0][0] {
        i = 1;
    }
    if m[2][2] > m[i][i] {
        i = 2;
    }
    let j = NEXT[i];
    let k = NEXT[j];

    let root = (m[i][i] - m[j][j] - m[k][k] + 1.0).sqrt();
    let f = 0.5 / root;
    let mut xyz = [0.0f32; 3];
    xyz[i] = 0.5 * root;
    xyz[j] = (m[i][j] + m[j][i]) * f;
    xyz[k] = (m[i][k] + m[k][i]) * f;
    let w = (m[j][k] - m[k][j]) * f;
    Quaternion::new(xyz[0], xyz[1], xyz[2], w).normalize()
}

/// Inverse of [`matrix_to_quaternion`] for unit quaternions.
pub fn quaternion_to_matrix(q: Quaternion) -> Matrix3x3 {
    let (x, y, z, w) = (q.x, q.y, q.z, q.w);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);
    Matrix3x3::from_rows([
        [1.0 - 2.0 * (yy + zz), 2.0 * (xy + wz), 2.0 * (xz - wy)],
        [2.0 * (xy - wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz + wx)],
        [2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (xx + yy)],
    ])
}

/// Split a rigid host transform into its translation row and rotation.
pub fn matrix_to_translation_rotation(m: &Matrix4x4) -> (Vector3, Quaternion) {
    (m.translation(), matrix_to_quaternion(&m.rotation()))
}

impl Matrix4x4 {
    pub const IDENTITY: Self = Self::from_rows([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);
    pub const ZERO: Self = Self::from_rows([[0.0; 4]; 4]);

    pub const fn from_rows(m: [[f32; 4]; 4]) -> Self {
        Self { m }
    }

    /// Rigid transform applying `rotation` then `translation`.
    pub fn from_translation_rotation(translation: Vector3, rotation: Quaternion) -> Self {
        let mut out = Self::IDENTITY;
        out.set_rotation(&quaternion_to_matrix(rotation));
        out.set_translation(translation);
        out
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.m[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.m[row][col] = value;
    }

    pub fn row(&self, row: usize) -> Vector4 {
        Vector4::from(self.m[row])
    }

    pub fn col(&self, col: usize) -> Vector4 {
        Vector4::new(self.m[0][col], self.m[1][col], self.m[2][col], self.m[3][col])
    }

    pub fn set_row(&mut self, row: usize, v: Vector4) {
        self.m[row] = v.to_array();
    }

    pub fn set_col(&mut self, col: usize, v: Vector4) {
        for (r, value) in v.to_array().into_iter().enumerate() {
            self.m[r][col] = value;
        }
    }

    pub fn transpose(&self) -> Self {
        let mut out = *self;
        for r in 0..4 {
            for c in 0..4 {
                out.m[r][c] = self.m[c][r];
            }
        }
        out
    }

    pub fn translation(&self) -> Vector3 {
        self.row(3).truncate()
    }

    pub fn set_translation(&mut self, t: Vector3) {
        self.m[3][0] = t.x;
        self.m[3][1] = t.y;
        self.m[3][2] = t.z;
    }

    /// Upper-left 3x3 block.
    pub fn rotation(&self) -> Matrix3x3 {
        let mut out = [[0.0; 3]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            row.copy_from_slice(&self.m[r][..3]);
        }
        Matrix3x3::from_rows(out)
    }

    pub fn set_rotation(&mut self, rotation: &Matrix3x3) {
        for r in 0..3 {
            self.m[r][..3].copy_from_slice(&rotation.m[r]);
        }
    }

    /// `(p, 1) · M`, ignoring the projective column.
    pub fn transform_point(&self, p: Vector3) -> Vector3 {
        let h = p.extend(1.0);
        Vector3::new(h.dot(self.col(0)), h.dot(self.col(1)), h.dot(self.col(2)))
    }

    /// `(v, 0) · M`: rotation and scale only.
    pub fn transform_vector(&self, v: Vector3) -> Vector3 {
        let h = v.extend(0.0);
        Vector3::new(h.dot(self.col(0)), h.dot(self.col(1)), h.dot(self.col(2)))
    }

    /// Inverse of a rigid transform: transposed rotation, translation pulled
    /// back through it. Meaningless unless the 3x3 block is orthonormal.
    pub fn fast_orthonormal_inverse(&self) -> Self {
        let mut out = Self::IDENTITY;
        out.set_rotation(&self.rotation().transpose());
        let t = out.transform_vector(-self.translation());
        out.set_translation(t);
        out
    }

    pub fn to_translation_rotation(&self) -> (Vector3, Quaternion) {
        matrix_to_translation_rotation(self)
    }

    pub fn approx_eq(&self, rhs: &Self, epsilon: f32) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(rhs.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Mul for Matrix4x4 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = self.row(r).dot(rhs.col(c));
            }
        }
        Self::from_rows(out)
    }
}

impl MulAssign for Matrix4x4 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
