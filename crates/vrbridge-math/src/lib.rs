//! Small linear-algebra kit used by the pose and projection translators.
//!
//! All matrices follow the host engine's layout: `m[row][col]`, points are row
//! vectors multiplied on the left (`p' = p · M`) and the translation lives in
//! row 3. Quaternions are `(x, y, z, w)`.
//!
//! Only what the translators need is here. There is no general matrix inverse;
//! poses are rigid and use [`Matrix4x4::fast_orthonormal_inverse`].

#![forbid(unsafe_code)]

mod interop;
pub mod matrix;
pub mod quaternion;
pub mod vector;

pub use matrix::{
    matrix_to_quaternion, matrix_to_translation_rotation, quaternion_to_matrix, Matrix3x3,
    Matrix4x4,
};
pub use quaternion::Quaternion;
pub use vector::{Vector2, Vector3, Vector4};

/// Tolerance used by the `approx_eq` helpers.
pub const EPSILON: f32 = 1e-5;

/// Scalar comparison with an absolute tolerance.
pub fn compare_approximately(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() <= epsilon
}

/// Approximate `1 / sqrt(x)`: bit-level initial guess plus one Newton step.
///
/// Relative error stays below 0.2% for positive normal inputs. Use it where
/// that is acceptable; everything else should call `f32::sqrt`.
pub fn fast_inv_sqrt(x: f32) -> f32 {
    let half = 0.5 * x;
    let guess = f32::from_bits(0x5f37_59df_u32.wrapping_sub(x.to_bits() >> 1));
    guess * (1.5 - half * guess * guess)
}
