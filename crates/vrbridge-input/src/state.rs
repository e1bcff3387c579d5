//! Per-frame device state.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use vrbridge_common::CenterEyeVelocity;
use vrbridge_display::{to_host_space, to_host_tracking, HostTracking, Pose};
use vrbridge_math::{Matrix4x4, Quaternion, Vector3};
use vrbridge_vr::{ActivityLevel, Eye, TrackedDevicePose, VrSystem, HMD_DEVICE_INDEX};

use crate::definition::{features_for, Feature};
use crate::registry::TrackedDevice;

bitflags! {
    /// Which parts of a tracking sample the host may trust.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct TrackingState: u32 {
        const POSITION = 1 << 0;
        const ROTATION = 1 << 1;
        const VELOCITY = 1 << 2;
        const ANGULAR_VELOCITY = 1 << 3;
        const ACCELERATION = 1 << 4;
        const ANGULAR_ACCELERATION = 1 << 5;
    }
}

impl TrackingState {
    /// The runtime reports all four or nothing.
    pub fn from_pose(pose: &TrackedDevicePose) -> Self {
        if pose.pose_is_valid {
            Self::POSITION | Self::ROTATION | Self::VELOCITY | Self::ANGULAR_VELOCITY
        } else {
            Self::empty()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    DiscreteState(u32),
    Binary(bool),
    Axis3D(Vector3),
    Rotation(Quaternion),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceState {
    /// Host timestamp, milliseconds.
    pub time_ms: u64,
    values: Vec<(Feature, FeatureValue)>,
}

impl DeviceState {
    fn set(&mut self, feature: Feature, value: FeatureValue) {
        match self.values.iter_mut().find(|(f, _)| *f == feature) {
            Some(slot) => slot.1 = value,
            None => self.values.push((feature, value)),
        }
    }

    fn set_tracking(&mut self, features: [Feature; 4], tracking: &HostTracking) {
        let [position, rotation, velocity, angular_velocity] = features;
        self.set(position, FeatureValue::Axis3D(tracking.pose.position));
        self.set(rotation, FeatureValue::Rotation(tracking.pose.rotation));
        self.set(velocity, FeatureValue::Axis3D(tracking.velocity));
        self.set(angular_velocity, FeatureValue::Axis3D(tracking.angular_velocity));
    }

    pub fn values(&self) -> &[(Feature, FeatureValue)] {
        &self.values
    }

    pub fn get(&self, feature: Feature) -> Option<FeatureValue> {
        self.values
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, v)| *v)
    }

    pub fn axis3d(&self, feature: Feature) -> Option<Vector3> {
        match self.get(feature)? {
            FeatureValue::Axis3D(v) => Some(v),
            _ => None,
        }
    }

    pub fn rotation(&self, feature: Feature) -> Option<Quaternion> {
        match self.get(feature)? {
            FeatureValue::Rotation(q) => Some(q),
            _ => None,
        }
    }

    pub fn binary(&self, feature: Feature) -> Option<bool> {
        match self.get(feature)? {
            FeatureValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn tracking_state(&self) -> Option<TrackingState> {
        match self.get(Feature::TrackingState)? {
            FeatureValue::DiscreteState(bits) => Some(TrackingState::from_bits_truncate(bits)),
            _ => None,
        }
    }
}

/// Host-space tracking for both eyes and the point between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeTracking {
    pub left: HostTracking,
    pub right: HostTracking,
    pub center: HostTracking,
}

/// Derive eye tracking from the head pose and the host-space eye offsets.
///
/// The center eye sits halfway between the eyes and looks along the
/// normalised blend of their rotations.
pub fn eye_tracking(
    head: &TrackedDevicePose,
    left_eye: &Matrix4x4,
    right_eye: &Matrix4x4,
    center_velocity: CenterEyeVelocity,
) -> EyeTracking {
    let left = to_host_tracking(head, Some(left_eye));
    let right = to_host_tracking(head, Some(right_eye));

    let velocity = match center_velocity {
        CenterEyeVelocity::Averaged => (left.velocity + right.velocity) * 0.5,
        CenterEyeVelocity::LegacyRightEye => (right.velocity + right.velocity) * 0.5,
    };
    let center = HostTracking {
        pose: Pose {
            position: (left.pose.position + right.pose.position) * 0.5,
            rotation: Quaternion::lerp(left.pose.rotation, right.pose.rotation, 0.5),
        },
        velocity,
        angular_velocity: (left.angular_velocity + right.angular_velocity) * 0.5,
    };
    EyeTracking {
        left,
        right,
        center,
    }
}

/// Fill in every feature `device` declared from `pose`. The caller stamps the
/// time.
pub fn device_state<S: VrSystem + ?Sized>(
    system: &S,
    device: &TrackedDevice,
    pose: &TrackedDevicePose,
    center_velocity: CenterEyeVelocity,
) -> DeviceState {
    let mut state = DeviceState::default();
    if features_for(device.characteristics).is_empty() {
        return state;
    }

    state.set(
        Feature::TrackingState,
        FeatureValue::DiscreteState(TrackingState::from_pose(pose).bits()),
    );
    state.set(Feature::IsTracked, FeatureValue::Binary(pose.pose_is_valid));
    state.set_tracking(
        [
            Feature::DevicePosition,
            Feature::DeviceRotation,
            Feature::DeviceVelocity,
            Feature::DeviceAngularVelocity,
        ],
        &to_host_tracking(pose, None),
    );

    if device.characteristics.is_head_mounted() {
        let present = system.activity_level(HMD_DEVICE_INDEX) == ActivityLevel::UserInteraction;
        state.set(Feature::UserPresence, FeatureValue::Binary(present));

        let left_eye = to_host_space(&system.eye_to_head_transform(Eye::Left));
        let right_eye = to_host_space(&system.eye_to_head_transform(Eye::Right));
        let eyes = eye_tracking(pose, &left_eye, &right_eye, center_velocity);
        state.set_tracking(
            [
                Feature::LeftEyePosition,
                Feature::LeftEyeRotation,
                Feature::LeftEyeVelocity,
                Feature::LeftEyeAngularVelocity,
            ],
            &eyes.left,
        );
        state.set_tracking(
            [
                Feature::RightEyePosition,
                Feature::RightEyeRotation,
                Feature::RightEyeVelocity,
                Feature::RightEyeAngularVelocity,
            ],
            &eyes.right,
        );
        state.set_tracking(
            [
                Feature::CenterEyePosition,
                Feature::CenterEyeRotation,
                Feature::CenterEyeVelocity,
                Feature::CenterEyeAngularVelocity,
            ],
            &eyes.center,
        );
    }
    state
}
