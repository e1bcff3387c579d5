//! Runtime-to-host coordinate conversion.
//!
//! Both sides are right-handed and +Y up, but the host mirrors Z. A runtime
//! 3x4 transform therefore becomes a host 4x4 by transposing it into the
//! host's row-vector layout and flipping the sign of every entry that mixes
//! Z with X, Y or W. [`HOST_SIGN_TABLE`] lists those signs once; nothing else
//! in the workspace negates matrix entries by hand.

use serde::{Deserialize, Serialize};
use vrbridge_math::{matrix_to_quaternion, Matrix4x4, Quaternion, Vector3};
use vrbridge_vr::{HmdMatrix34, TrackedDevicePose};

/// Signs applied to the transposed runtime matrix, indexed like
/// [`Matrix4x4::m`] (`[host column][component]`).
///
/// Column 2 loses the sign of its x, y and w. Component z of columns 0, 1 and
/// 3 is negated. Entry (2, 2) is negated twice and stays positive.
pub const HOST_SIGN_TABLE: [[f32; 4]; 4] = [
    [1.0, 1.0, -1.0, 1.0],
    [1.0, 1.0, -1.0, 1.0],
    [-1.0, -1.0, 1.0, -1.0],
    [1.0, 1.0, -1.0, 1.0],
];

/// Convert a runtime rigid transform into the host convention.
pub fn to_host_space(runtime: &HmdMatrix34) -> Matrix4x4 {
    let mut out = Matrix4x4::ZERO;
    for (c, signs) in HOST_SIGN_TABLE.iter().enumerate() {
        for (r, sign) in signs.iter().enumerate() {
            let value = match r {
                0..=2 => runtime.m[r][c],
                _ if c == 3 => 1.0,
                _ => 0.0,
            };
            out.m[c][r] = sign * value;
        }
    }
    out
}

/// Flip a runtime direction (velocity, angular velocity) into host space.
pub fn to_host_vector(v: Vector3) -> Vector3 {
    Vector3::new(v.x, v.y, -v.z)
}

/// Position and orientation in host space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    pub rotation: Quaternion,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vector3::ZERO,
        rotation: Quaternion::IDENTITY,
    };
}

/// Split a host-space transform into a pose.
///
/// The rotation is read from the transposed 3x3 block and its `w` negated.
/// That is the same rotation as reading the untransposed block, but not
/// always the same quaternion: when the block's trace is positive the result
/// is `-q`, otherwise `q`. Only [`to_host_space`] is exact entry for entry;
/// compare pose rotations with [`Quaternion::same_rotation`].
pub fn host_pose(m: &Matrix4x4) -> Pose {
    let mut rotation = matrix_to_quaternion(&m.rotation().transpose());
    rotation.w = -rotation.w;
    Pose {
        position: m.translation(),
        rotation,
    }
}

/// Full tracking sample in host space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HostTracking {
    pub pose: Pose,
    pub velocity: Vector3,
    pub angular_velocity: Vector3,
}

/// Convert a runtime device pose, optionally pre-multiplied by a host-space
/// `local` transform (an eye offset applied before the device transform).
pub fn to_host_tracking(pose: &TrackedDevicePose, local: Option<&Matrix4x4>) -> HostTracking {
    let mut tracking_to_reference = to_host_space(&pose.device_to_absolute);
    if let Some(local) = local {
        tracking_to_reference = *local * tracking_to_reference;
    }
    HostTracking {
        pose: host_pose(&tracking_to_reference),
        velocity: to_host_vector(pose.velocity),
        angular_velocity: to_host_vector(pose.angular_velocity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime_matrix(rows: [[f32; 4]; 3]) -> HmdMatrix34 {
        HmdMatrix34 { m: rows }
    }

    #[test]
    fn test_identity_stays_identity() {
        let out = to_host_space(&HmdMatrix34::IDENTITY);
        assert!(out.approx_eq(&Matrix4x4::IDENTITY, 0.0));
    }

    #[test]
    fn test_translation_flips_z() {
        let m = HmdMatrix34::from_translation(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(to_host_space(&m).translation(), Vector3::new(1.0, 2.0, -3.0));
    }

    #[test]
    fn test_matches_entrywise_negations() {
        let rt = runtime_matrix([
            [0.1, 0.2, 0.3, 0.4],
            [0.5, 0.6, 0.7, 0.8],
            [0.9, 1.0, 1.1, 1.2],
        ]);
        let out = to_host_space(&rt).m;
        let expected = [
            [0.1, 0.5, -0.9, 0.0],
            [0.2, 0.6, -1.0, 0.0],
            [-0.3, -0.7, 1.1, -0.0],
            [0.4, 0.8, -1.2, 1.0],
        ];
        assert_eq!(out, expected);
        // The negated zero is kept bit-exact.
        assert!(out[2][3].is_sign_negative());
    }

    #[test]
    fn test_yaw_is_mirrored() {
        // +90 degrees about Y in the runtime: -Z forward turns to -X.
        let rt = runtime_matrix([
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0, 0.0],
        ]);
        let host = to_host_space(&rt);
        // Host forward is +Z and must turn to -X as well.
        let forward = host.transform_vector(Vector3::new(0.0, 0.0, 1.0));
        assert!(forward.approx_eq(Vector3::new(-1.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_host_pose_rotation_matches_matrix() {
        let rt = runtime_matrix([
            [0.0, 0.0, 1.0, 0.5],
            [0.0, 1.0, 0.0, 1.5],
            [-1.0, 0.0, 0.0, -2.0],
        ]);
        let host = to_host_space(&rt);
        let pose = host_pose(&host);
        assert_eq!(pose.position, Vector3::new(0.5, 1.5, 2.0));
        let rebuilt = Matrix4x4::from_translation_rotation(pose.position, pose.rotation);
        assert!(rebuilt.approx_eq(&host, 1e-5));
    }

    #[test]
    fn test_host_pose_quaternion_sign_follows_trace() {
        let untransposed = |m: &Matrix4x4| matrix_to_quaternion(&m.rotation());

        // Small yaw: positive trace, the sign flips.
        let yawed = to_host_space(&runtime_matrix([
            [0.8, 0.0, 0.6, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [-0.6, 0.0, 0.8, 0.0],
        ]));
        let q = untransposed(&yawed);
        let pose = host_pose(&yawed);
        assert!(pose.rotation.approx_eq(-q, 1e-6));
        assert!(pose.rotation.same_rotation(q, 1e-6));

        // Half turn about Y: negative trace, the sign is kept.
        let turned = to_host_space(&runtime_matrix([
            [-1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0, 0.0],
        ]));
        let q = untransposed(&turned);
        assert!(host_pose(&turned).rotation.approx_eq(q, 1e-6));
    }

    #[test]
    fn test_tracking_flips_velocity_z() {
        let pose = TrackedDevicePose {
            velocity: Vector3::new(1.0, 2.0, 3.0),
            angular_velocity: Vector3::new(-1.0, 0.5, -0.25),
            pose_is_valid: true,
            device_is_connected: true,
            ..Default::default()
        };
        let t = to_host_tracking(&pose, None);
        assert_eq!(t.velocity, Vector3::new(1.0, 2.0, -3.0));
        assert_eq!(t.angular_velocity, Vector3::new(-1.0, 0.5, 0.25));
    }

    #[test]
    fn test_local_offset_applies_before_device() {
        let pose = TrackedDevicePose {
            device_to_absolute: HmdMatrix34::from_translation(Vector3::new(0.0, 1.6, 0.0)),
            ..Default::default()
        };
        let eye = to_host_space(&HmdMatrix34::from_translation(Vector3::new(-0.032, 0.0, 0.015)));
        let t = to_host_tracking(&pose, Some(&eye));
        assert!(t
            .pose
            .position
            .approx_eq(Vector3::new(-0.032, 1.6, -0.015), 1e-6));
    }
}
