//! What kind of device a runtime slot holds, in the host's vocabulary.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use vrbridge_vr::{ControllerRole, TrackedDeviceClass};

bitflags! {
    /// Host device characteristics. An empty set means the device is not
    /// exposed to the host at all.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DeviceCharacteristics: u32 {
        const HEAD_MOUNTED = 1 << 0;
        const CAMERA = 1 << 1;
        const HELD_IN_HAND = 1 << 2;
        const HAND_TRACKING = 1 << 3;
        const EYE_TRACKING = 1 << 4;
        const TRACKED_DEVICE = 1 << 5;
        const CONTROLLER = 1 << 6;
        const TRACKING_REFERENCE = 1 << 7;
        const LEFT = 1 << 8;
        const RIGHT = 1 << 9;
        const SIMULATED_6DOF = 1 << 10;
    }
}

impl DeviceCharacteristics {
    const HAND_CONTROLLER: Self = Self::HELD_IN_HAND
        .union(Self::CONTROLLER)
        .union(Self::TRACKED_DEVICE);

    pub fn is_head_mounted(self) -> bool {
        self.contains(Self::HEAD_MOUNTED)
    }

    pub fn is_held_in_hand(self) -> bool {
        self.contains(Self::HELD_IN_HAND)
    }
}

fn for_role(role: ControllerRole) -> Option<DeviceCharacteristics> {
    use DeviceCharacteristics as C;
    match role {
        ControllerRole::LeftHand => Some(C::HAND_CONTROLLER | C::LEFT),
        ControllerRole::RightHand => Some(C::HAND_CONTROLLER | C::RIGHT),
        ControllerRole::Stylus => Some(C::HAND_CONTROLLER),
        ControllerRole::Treadmill => Some(C::CONTROLLER | C::TRACKED_DEVICE),
        ControllerRole::Invalid | ControllerRole::OptOut => None,
    }
}

/// Characteristics for a device of `class` currently assigned `role`.
///
/// Controllers without a role are still assumed to be in someone's hand;
/// controllers that opted out are hidden. Generic trackers without a usable
/// role are plain tracked devices.
pub fn characteristics_for(class: TrackedDeviceClass, role: ControllerRole) -> DeviceCharacteristics {
    use DeviceCharacteristics as C;
    match class {
        TrackedDeviceClass::Hmd => C::HEAD_MOUNTED | C::TRACKED_DEVICE,
        TrackedDeviceClass::Controller => match role {
            ControllerRole::Invalid => C::HAND_CONTROLLER,
            ControllerRole::OptOut => C::empty(),
            _ => for_role(role).unwrap_or_default(),
        },
        TrackedDeviceClass::GenericTracker => for_role(role).unwrap_or(C::TRACKED_DEVICE),
        TrackedDeviceClass::TrackingReference => C::TRACKING_REFERENCE | C::TRACKED_DEVICE,
        TrackedDeviceClass::Invalid | TrackedDeviceClass::DisplayRedirect => C::empty(),
    }
}
