use crate::{
    types::{
        ActivityLevel, ControllerRole, Eye, FloatProperty, FrameTiming, HiddenAreaMesh,
        HmdMatrix34, NativeDevice, OverlayHandle, OverlayView, RawProjection, StringProperty,
        SubmitTexture, TrackedDeviceClass, TrackedDeviceIndex, TrackedDevicePose,
        TrackingUniverse,
    },
    VrResult,
};

/// Device and display queries.
pub trait VrSystem {
    fn recommended_render_target_size(&self) -> (u32, u32);
    fn eye_to_head_transform(&self, eye: Eye) -> HmdMatrix34;
    fn projection_raw(&self, eye: Eye) -> RawProjection;
    /// `None` when the headset has no hidden area for that eye.
    fn hidden_area_mesh(&self, eye: Eye) -> Option<HiddenAreaMesh>;

    fn float_property(&self, device: TrackedDeviceIndex, prop: FloatProperty) -> VrResult<f32>;
    fn string_property(&self, device: TrackedDeviceIndex, prop: StringProperty)
        -> VrResult<String>;

    fn device_class(&self, device: TrackedDeviceIndex) -> TrackedDeviceClass;
    fn controller_role(&self, device: TrackedDeviceIndex) -> ControllerRole;
    fn is_device_connected(&self, device: TrackedDeviceIndex) -> bool;
    fn activity_level(&self, device: TrackedDeviceIndex) -> ActivityLevel;

    /// Poses for every device slot, predicted `seconds_from_now` ahead.
    fn device_poses(
        &self,
        universe: TrackingUniverse,
        seconds_from_now: f32,
    ) -> Vec<TrackedDevicePose>;

    fn should_application_pause(&self) -> bool;
    fn trigger_haptic_pulse(&mut self, device: TrackedDeviceIndex, axis: u32, duration_us: u16);
}

/// Frame pacing and submission.
pub trait VrCompositor {
    /// Block until the compositor is ready, returning `(render, game)` poses:
    /// the poses for this frame and the ones predicted for the next.
    fn wait_get_poses(&mut self) -> VrResult<(Vec<TrackedDevicePose>, Vec<TrackedDevicePose>)>;
    fn submit(&mut self, eye: Eye, texture: &SubmitTexture) -> VrResult<()>;
    fn post_present_handoff(&mut self);
    fn frame_timing(&self) -> Option<FrameTiming>;
    fn can_render_scene(&self) -> bool;

    fn tracking_space(&self) -> TrackingUniverse;
    fn set_tracking_space(&mut self, universe: TrackingUniverse);
    fn reset_zero_pose(&mut self, universe: TrackingUniverse);
}

/// Headset-view overlay that backs the lens-distorted mirror.
pub trait VrMirrorSource {
    fn headset_view_size(&self) -> (u32, u32);
    fn set_headset_view_size(&mut self, width: u32, height: u32);
    fn set_headset_view_cropped(&mut self, cropped: bool);

    fn find_mirror_overlay(&mut self) -> VrResult<OverlayHandle>;
    fn acquire_overlay_view(
        &mut self,
        overlay: OverlayHandle,
        device: NativeDevice,
    ) -> VrResult<OverlayView>;
    fn release_overlay_view(&mut self, view: &OverlayView);
}

/// Everything a provider session needs from the runtime.
pub trait VrRuntime: VrSystem + VrCompositor + VrMirrorSource {}

impl<T: VrSystem + VrCompositor + VrMirrorSource> VrRuntime for T {}
