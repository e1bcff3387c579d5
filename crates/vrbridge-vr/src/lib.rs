#![forbid(unsafe_code)]

pub mod runtime;
pub mod sim;
pub mod types;

pub use runtime::{VrCompositor, VrMirrorSource, VrRuntime, VrSystem};
pub use sim::{SimulatedDevice, SimulatedRuntime};
pub use types::{
    ActivityLevel, ControllerRole, Eye, FloatProperty, FrameTiming, HiddenAreaMesh, HmdMatrix34,
    NativeDevice, OverlayHandle, OverlayView, RawProjection, StringProperty, SubmitTexture,
    TextureApi, TrackedDeviceClass, TrackedDeviceIndex, TrackedDevicePose, TrackingUniverse,
    HEADSET_VIEW_MAX_HEIGHT, HEADSET_VIEW_MAX_WIDTH, HMD_DEVICE_INDEX, MAX_TRACKED_DEVICES,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VrError {
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
    #[error("property {prop} of device {device}: {reason}")]
    Property {
        device: TrackedDeviceIndex,
        prop: String,
        reason: String,
    },
    #[error("compositor error: {0}")]
    Compositor(String),
    #[error("overlay error: {0}")]
    Overlay(String),
}

pub type VrResult<T> = Result<T, VrError>;
