//! Deterministic in-memory runtime.
//!
//! Stands in for a real headset in tests and in the `vrbridge` CLI. All knobs
//! are public fields; everything the providers push into the runtime is
//! recorded so callers can inspect it afterwards.

use tracing::debug;
use vrbridge_math::{Quaternion, Vector2, Vector3};

use crate::{
    runtime::{VrCompositor, VrMirrorSource, VrSystem},
    types::{
        ActivityLevel, ControllerRole, Eye, FloatProperty, FrameTiming, HiddenAreaMesh,
        HmdMatrix34, NativeDevice, OverlayHandle, OverlayView, RawProjection, StringProperty,
        SubmitTexture, TrackedDeviceClass, TrackedDeviceIndex, TrackedDevicePose,
        TrackingUniverse, HEADSET_VIEW_MAX_HEIGHT, HEADSET_VIEW_MAX_WIDTH, MAX_TRACKED_DEVICES,
    },
    VrError, VrResult,
};

#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub class: TrackedDeviceClass,
    pub role: ControllerRole,
    pub model: String,
    pub serial: String,
    pub manufacturer: String,
    pub controller_type: String,
    pub connected: bool,
    pub activity: ActivityLevel,
    pub pose: TrackedDevicePose,
}

impl SimulatedDevice {
    pub fn new(class: TrackedDeviceClass, role: ControllerRole, model: &str, serial: &str) -> Self {
        Self {
            class,
            role,
            model: model.to_string(),
            serial: serial.to_string(),
            manufacturer: "HTC".to_string(),
            controller_type: String::new(),
            connected: true,
            activity: ActivityLevel::UserInteraction,
            pose: TrackedDevicePose {
                device_to_absolute: HmdMatrix34::IDENTITY,
                velocity: Vector3::ZERO,
                angular_velocity: Vector3::ZERO,
                pose_is_valid: true,
                device_is_connected: true,
            },
        }
    }

    pub fn at(mut self, position: Vector3) -> Self {
        self.pose.device_to_absolute = HmdMatrix34::from_translation(position);
        self
    }

    pub fn oriented(mut self, rotation: Quaternion) -> Self {
        self.pose.device_to_absolute.set_rotation(rotation);
        self
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedRuntime {
    pub render_target_size: (u32, u32),
    /// `None` makes the IPD property read fail.
    pub ipd: Option<f32>,
    pub head_to_eye_depth: Option<f32>,
    pub display_frequency: f32,
    pub eye_to_head: [HmdMatrix34; 2],
    pub projection: [RawProjection; 2],
    pub hidden_area: [Option<HiddenAreaMesh>; 2],
    /// Indexed by tracked device index.
    pub devices: Vec<SimulatedDevice>,
    pub tracking_space: TrackingUniverse,
    pub timing: Option<FrameTiming>,
    pub should_pause: bool,
    pub can_render: bool,
    pub compositor_available: bool,

    pub mirror_overlay_available: bool,
    /// Number of upcoming `acquire_overlay_view` calls that fail.
    pub overlay_acquire_failures: u32,
    pub overlay_texture: u64,
    /// Report a different device than the one passed to `acquire_overlay_view`.
    pub overlay_device_override: Option<NativeDevice>,
    pub headset_view: (u32, u32),
    pub headset_view_cropped: bool,

    pub submissions: Vec<(Eye, SubmitTexture)>,
    pub presents: u32,
    pub haptic_pulses: Vec<(TrackedDeviceIndex, u32, u16)>,
    pub zero_pose_resets: Vec<TrackingUniverse>,
    pub overlay_views_acquired: u32,
    pub overlay_views_released: u32,
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRuntime {
    /// A headset with two controllers and one base station.
    pub fn new() -> Self {
        let mut hmd = SimulatedDevice::new(
            TrackedDeviceClass::Hmd,
            ControllerRole::Invalid,
            "Vive MV",
            "LHR-0000HMD0",
        )
        .at(Vector3::new(0.0, 1.6, 0.0));
        hmd.controller_type = "vive".to_string();
        let mut left = SimulatedDevice::new(
            TrackedDeviceClass::Controller,
            ControllerRole::LeftHand,
            "Vive Controller MV",
            "LHR-0000CTL1",
        )
        .at(Vector3::new(-0.2, 1.1, -0.3));
        left.controller_type = "vive_controller".to_string();
        let mut right = SimulatedDevice::new(
            TrackedDeviceClass::Controller,
            ControllerRole::RightHand,
            "Vive Controller MV",
            "LHR-0000CTL2",
        )
        .at(Vector3::new(0.2, 1.1, -0.3));
        right.controller_type = "vive_controller".to_string();
        let mut base = SimulatedDevice::new(
            TrackedDeviceClass::TrackingReference,
            ControllerRole::Invalid,
            "HTC V2-XD/XE",
            "LHB-0000BASE",
        )
        .at(Vector3::new(2.0, 2.4, 2.0))
        // Mounted in a corner, looking down at the middle of the room.
        .oriented(Quaternion::from_yaw_pitch_roll(
            std::f32::consts::FRAC_PI_4,
            -0.7,
            0.0,
        ));
        base.controller_type = "lighthouse".to_string();

        Self {
            render_target_size: (1852, 2056),
            ipd: Some(0.064),
            head_to_eye_depth: Some(0.015),
            display_frequency: 90.0,
            eye_to_head: [
                HmdMatrix34::from_translation(Vector3::new(-0.032, 0.0, 0.015)),
                HmdMatrix34::from_translation(Vector3::new(0.032, 0.0, 0.015)),
            ],
            projection: [
                RawProjection::new(-1.39, 1.24, -1.47, 1.46),
                RawProjection::new(-1.24, 1.39, -1.47, 1.46),
            ],
            hidden_area: [Some(corner_mesh(false)), Some(corner_mesh(true))],
            devices: vec![hmd, left, right, base],
            tracking_space: TrackingUniverse::Standing,
            timing: Some(FrameTiming {
                num_frame_presents: 1,
                ..Default::default()
            }),
            should_pause: false,
            can_render: true,
            compositor_available: true,
            mirror_overlay_available: true,
            overlay_acquire_failures: 0,
            overlay_texture: 0x5eed,
            overlay_device_override: None,
            headset_view: (1280, 720),
            headset_view_cropped: false,
            submissions: Vec::new(),
            presents: 0,
            haptic_pulses: Vec::new(),
            zero_pose_resets: Vec::new(),
            overlay_views_acquired: 0,
            overlay_views_released: 0,
        }
    }

    fn device(&self, index: TrackedDeviceIndex) -> Option<&SimulatedDevice> {
        self.devices.get(index as usize)
    }

    fn property_error(device: TrackedDeviceIndex, prop: impl std::fmt::Debug) -> VrError {
        VrError::Property {
            device,
            prop: format!("{prop:?}"),
            reason: "unknown property".to_string(),
        }
    }
}

/// Two triangles per outer corner, written as an unindexed soup so shared
/// corners repeat.
fn corner_mesh(mirrored: bool) -> HiddenAreaMesh {
    let flip = |x: f32| if mirrored { 1.0 - x } else { x };
    let mut vertices = Vec::new();
    for (cx, cy, dx, dy) in [(0.0, 0.0, 0.2, 0.2), (0.0, 1.0, 0.2, -0.2)] {
        let corner = Vector2::new(flip(cx), cy);
        let along_x = Vector2::new(flip(cx + dx), cy);
        let along_y = Vector2::new(flip(cx), cy + dy);
        let inner = Vector2::new(flip(cx + dx * 0.5), cy + dy * 0.5);
        vertices.extend([corner, along_x, inner, corner, inner, along_y]);
    }
    let triangle_count = (vertices.len() / 3) as u32;
    HiddenAreaMesh {
        vertices,
        triangle_count,
    }
}

impl VrSystem for SimulatedRuntime {
    fn recommended_render_target_size(&self) -> (u32, u32) {
        self.render_target_size
    }

    fn eye_to_head_transform(&self, eye: Eye) -> HmdMatrix34 {
        self.eye_to_head[eye.index()]
    }

    fn projection_raw(&self, eye: Eye) -> RawProjection {
        self.projection[eye.index()]
    }

    fn hidden_area_mesh(&self, eye: Eye) -> Option<HiddenAreaMesh> {
        self.hidden_area[eye.index()].clone()
    }

    fn float_property(&self, device: TrackedDeviceIndex, prop: FloatProperty) -> VrResult<f32> {
        let missing = || Self::property_error(device, prop);
        if self.device(device).is_none() {
            return Err(missing());
        }
        match prop {
            FloatProperty::UserIpdMeters => self.ipd.ok_or_else(missing),
            FloatProperty::UserHeadToEyeDepthMeters => self.head_to_eye_depth.ok_or_else(missing),
            FloatProperty::DisplayFrequency => Ok(self.display_frequency),
        }
    }

    fn string_property(
        &self,
        device: TrackedDeviceIndex,
        prop: StringProperty,
    ) -> VrResult<String> {
        let dev = self
            .device(device)
            .ok_or_else(|| Self::property_error(device, prop))?;
        let value = match prop {
            StringProperty::ModelNumber => &dev.model,
            StringProperty::SerialNumber => &dev.serial,
            StringProperty::ManufacturerName => &dev.manufacturer,
            StringProperty::ControllerType => &dev.controller_type,
        };
        if value.is_empty() {
            return Err(Self::property_error(device, prop));
        }
        Ok(value.clone())
    }

    fn device_class(&self, device: TrackedDeviceIndex) -> TrackedDeviceClass {
        self.device(device)
            .map_or(TrackedDeviceClass::Invalid, |d| d.class)
    }

    fn controller_role(&self, device: TrackedDeviceIndex) -> ControllerRole {
        self.device(device)
            .map_or(ControllerRole::Invalid, |d| d.role)
    }

    fn is_device_connected(&self, device: TrackedDeviceIndex) -> bool {
        self.device(device).is_some_and(|d| d.connected)
    }

    fn activity_level(&self, device: TrackedDeviceIndex) -> ActivityLevel {
        self.device(device)
            .map_or(ActivityLevel::Unknown, |d| d.activity)
    }

    fn device_poses(
        &self,
        _universe: TrackingUniverse,
        seconds_from_now: f32,
    ) -> Vec<TrackedDevicePose> {
        let mut poses = vec![TrackedDevicePose::default(); MAX_TRACKED_DEVICES];
        for (slot, device) in poses.iter_mut().zip(&self.devices) {
            if !device.connected {
                continue;
            }
            let mut pose = device.pose;
            let predicted = pose.device_to_absolute.translation() + pose.velocity * seconds_from_now;
            pose.device_to_absolute.m[0][3] = predicted.x;
            pose.device_to_absolute.m[1][3] = predicted.y;
            pose.device_to_absolute.m[2][3] = predicted.z;
            *slot = pose;
        }
        poses
    }

    fn should_application_pause(&self) -> bool {
        self.should_pause
    }

    fn trigger_haptic_pulse(&mut self, device: TrackedDeviceIndex, axis: u32, duration_us: u16) {
        self.haptic_pulses.push((device, axis, duration_us));
    }
}

impl VrCompositor for SimulatedRuntime {
    fn wait_get_poses(&mut self) -> VrResult<(Vec<TrackedDevicePose>, Vec<TrackedDevicePose>)> {
        if !self.compositor_available {
            return Err(VrError::Compositor("compositor not running".to_string()));
        }
        let frame = 1.0 / self.display_frequency;
        Ok((
            self.device_poses(self.tracking_space, 0.0),
            self.device_poses(self.tracking_space, frame),
        ))
    }

    fn submit(&mut self, eye: Eye, texture: &SubmitTexture) -> VrResult<()> {
        if !self.compositor_available {
            return Err(VrError::Compositor("compositor not running".to_string()));
        }
        self.submissions.push((eye, *texture));
        Ok(())
    }

    fn post_present_handoff(&mut self) {
        self.presents += 1;
        if let Some(timing) = &mut self.timing {
            timing.frame_index = timing.frame_index.wrapping_add(1);
        }
    }

    fn frame_timing(&self) -> Option<FrameTiming> {
        self.timing
    }

    fn can_render_scene(&self) -> bool {
        self.can_render
    }

    fn tracking_space(&self) -> TrackingUniverse {
        self.tracking_space
    }

    fn set_tracking_space(&mut self, universe: TrackingUniverse) {
        self.tracking_space = universe;
    }

    fn reset_zero_pose(&mut self, universe: TrackingUniverse) {
        self.zero_pose_resets.push(universe);
    }
}

impl VrMirrorSource for SimulatedRuntime {
    fn headset_view_size(&self) -> (u32, u32) {
        self.headset_view
    }

    fn set_headset_view_size(&mut self, width: u32, height: u32) {
        self.headset_view = (
            width.min(HEADSET_VIEW_MAX_WIDTH),
            height.min(HEADSET_VIEW_MAX_HEIGHT),
        );
    }

    fn set_headset_view_cropped(&mut self, cropped: bool) {
        self.headset_view_cropped = cropped;
    }

    fn find_mirror_overlay(&mut self) -> VrResult<OverlayHandle> {
        if self.mirror_overlay_available {
            Ok(OverlayHandle(1))
        } else {
            Err(VrError::Overlay("headset view overlay not found".to_string()))
        }
    }

    fn acquire_overlay_view(
        &mut self,
        overlay: OverlayHandle,
        device: NativeDevice,
    ) -> VrResult<OverlayView> {
        if self.overlay_acquire_failures > 0 {
            self.overlay_acquire_failures -= 1;
            debug!(remaining = self.overlay_acquire_failures, "simulated overlay view failure");
            return Err(VrError::Overlay("overlay view busy".to_string()));
        }
        self.overlay_views_acquired += 1;
        Ok(OverlayView {
            overlay,
            shared_handle: self.overlay_texture,
            device: self.overlay_device_override.unwrap_or(device),
        })
    }

    fn release_overlay_view(&mut self, _view: &OverlayView) {
        self.overlay_views_released += 1;
    }
}
