//! Input side of the XR provider: exposes runtime tracked devices to the host
//! as input devices with stable ids, tracking features, haptics and a
//! tracking origin.

#![forbid(unsafe_code)]

pub mod characteristics;
pub mod definition;
pub mod haptics;
pub mod origin;
pub mod provider;
pub mod registry;
pub mod state;

pub use characteristics::{characteristics_for, DeviceCharacteristics};
pub use definition::{
    device_name, features_for, fill_device_definition, DeviceDefinition, Feature, FeatureType,
    HMD_FEATURES, LOGITECH_VIRTUAL_STYLUS_SERIAL, TRACKED_FEATURES,
};
pub use haptics::{pulse_duration_us, HapticCapabilities, MAX_HAPTIC_PULSE_US};
pub use origin::TrackingOriginMode;
pub use provider::{InputHost, InputProvider, OVERLAY_PREDICTION_SECS};
pub use registry::{DeviceEvent, DeviceId, DeviceRegistry, TrackedDevice, UpdateType};
pub use state::{device_state, eye_tracking, DeviceState, EyeTracking, FeatureValue, TrackingState};
