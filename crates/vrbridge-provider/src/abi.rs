//! C callback tables handed to the host engine.
//!
//! The host stores one opaque `user_data` pointer per table and passes it back
//! on every call. Each trampoline null-checks it, casts it back to the
//! provider type the table was built for and converts the result into a
//! [`SubsystemErrorCode`]. Panics are caught here and reported as failures.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, warn};
use vrbridge_common::{Error, Result};
use vrbridge_display::{
    BlitParams, DisplayState, FrameHintChanges, FrameHints, NextFrameDesc, Pose, Rect,
    RenderingCaps, ReprojectionMode,
};
use vrbridge_input::{
    DeviceDefinition, DeviceState, FeatureType, FeatureValue, HapticCapabilities,
    TrackingOriginMode, UpdateType,
};
use vrbridge_math::Matrix4x4;

use crate::context::XrProvider;

pub type SubsystemHandle = u32;
pub type XrDeviceId = u32;

pub const XR_MAX_CULLING_PASSES: usize = 2;
pub const XR_MAX_RENDER_PASSES: usize = 4;
pub const XR_MAX_RENDER_PARAMS: usize = 2;
pub const XR_MAX_FEATURES: usize = 32;
pub const XR_STRING_SIZE: usize = 128;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsystemErrorCode {
    Success = 0,
    Failure = 1,
    InvalidArguments = 2,
}

impl From<&Error> for SubsystemErrorCode {
    fn from(err: &Error) -> Self {
        if err.is_invalid_argument() {
            Self::InvalidArguments
        } else {
            Self::Failure
        }
    }
}

// ---------------------------------------------------------------------------
// Plain-data mirrors of the provider types
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<Rect> for XrRect {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
        }
    }
}

impl From<XrRect> for Rect {
    fn from(r: XrRect) -> Self {
        Rect::new(r.x, r.y, r.width, r.height)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrPose {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl From<Pose> for XrPose {
    fn from(p: Pose) -> Self {
        Self {
            position: [p.position.x, p.position.y, p.position.z],
            rotation: [p.rotation.x, p.rotation.y, p.rotation.z, p.rotation.w],
        }
    }
}

fn columns(m: &Matrix4x4) -> [[f32; 4]; 4] {
    m.m
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrRenderingCaps {
    pub no_single_pass_rendering_support: bool,
    pub invalidate_render_state_after_each_callback: bool,
}

impl From<RenderingCaps> for XrRenderingCaps {
    fn from(caps: RenderingCaps) -> Self {
        Self {
            no_single_pass_rendering_support: caps.no_single_pass_rendering_support,
            invalidate_render_state_after_each_callback: caps
                .invalidate_render_state_after_each_callback,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrFrameHints {
    pub changed_flags: u32,
    pub srgb: bool,
    pub single_pass: bool,
    pub render_viewport: XrRect,
    pub texture_resolution_scale: f32,
    pub near: f32,
    pub far: f32,
}

impl From<&XrFrameHints> for FrameHints {
    fn from(h: &XrFrameHints) -> Self {
        FrameHints {
            changed: FrameHintChanges::from_bits_truncate(h.changed_flags),
            srgb: h.srgb,
            single_pass: h.single_pass,
            render_viewport: h.render_viewport.into(),
            texture_resolution_scale: h.texture_resolution_scale,
            near: h.near,
            far: h.far,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrCullingPass {
    pub pose: XrPose,
    pub projection: [[f32; 4]; 4],
    pub separation: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrRenderParams {
    pub pose: XrPose,
    pub projection: [[f32; 4]; 4],
    pub viewport: XrRect,
    pub texture_array_slice: u32,
    /// Zero when the eye has no occlusion mesh.
    pub occlusion_mesh: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrRenderPass {
    pub texture: u32,
    pub culling_pass_index: u32,
    pub param_count: u32,
    pub params: [XrRenderParams; XR_MAX_RENDER_PARAMS],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrNextFrame {
    pub culling_pass_count: u32,
    pub culling_passes: [XrCullingPass; XR_MAX_CULLING_PASSES],
    pub render_pass_count: u32,
    pub render_passes: [XrRenderPass; XR_MAX_RENDER_PASSES],
}

impl TryFrom<&NextFrameDesc> for XrNextFrame {
    type Error = Error;

    fn try_from(desc: &NextFrameDesc) -> Result<Self> {
        if desc.culling_passes.len() > XR_MAX_CULLING_PASSES
            || desc.render_passes.len() > XR_MAX_RENDER_PASSES
        {
            return Err(Error::internal(format!(
                "frame has {} culling and {} render passes",
                desc.culling_passes.len(),
                desc.render_passes.len()
            )));
        }

        let mut out = XrNextFrame {
            culling_pass_count: desc.culling_passes.len() as u32,
            render_pass_count: desc.render_passes.len() as u32,
            ..Default::default()
        };
        for (slot, pass) in out.culling_passes.iter_mut().zip(&desc.culling_passes) {
            *slot = XrCullingPass {
                pose: pass.pose.into(),
                projection: columns(&pass.projection),
                separation: pass.separation,
            };
        }
        for (slot, pass) in out.render_passes.iter_mut().zip(&desc.render_passes) {
            if pass.params.len() > XR_MAX_RENDER_PARAMS {
                return Err(Error::internal(format!(
                    "render pass has {} parameter sets",
                    pass.params.len()
                )));
            }
            slot.texture = pass.texture;
            slot.culling_pass_index = pass.culling_pass_index as u32;
            slot.param_count = pass.params.len() as u32;
            for (param_slot, params) in slot.params.iter_mut().zip(&pass.params) {
                *param_slot = XrRenderParams {
                    pose: params.pose.into(),
                    projection: columns(&params.projection),
                    viewport: params.viewport.into(),
                    texture_array_slice: params.texture_array_slice,
                    occlusion_mesh: params.occlusion_mesh.unwrap_or(0),
                };
            }
        }
        Ok(out)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrMirrorBlit {
    pub texture: u32,
    pub array_slice: u32,
    pub source: XrRect,
    pub dest: XrRect,
}

impl From<BlitParams> for XrMirrorBlit {
    fn from(b: BlitParams) -> Self {
        Self {
            texture: b.texture,
            array_slice: b.array_slice,
            source: b.source.into(),
            dest: b.dest.into(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XrDisplayState {
    /// 0: none, 1: position and orientation.
    pub reprojection: u32,
    pub display_is_transparent: bool,
    pub focus_lost: bool,
}

impl From<DisplayState> for XrDisplayState {
    fn from(s: DisplayState) -> Self {
        Self {
            reprojection: match s.reprojection {
                ReprojectionMode::None => 0,
                ReprojectionMode::PositionAndOrientation => 1,
            },
            display_is_transparent: s.display_is_transparent,
            focus_lost: s.focus_lost,
        }
    }
}

/// Copy `src` into a NUL-terminated fixed buffer, truncating if needed.
fn copy_c_string(dst: &mut [u8; XR_STRING_SIZE], src: &str) {
    let len = src.len().min(XR_STRING_SIZE - 1);
    dst[..len].copy_from_slice(&src.as_bytes()[..len]);
    dst[len..].fill(0);
}

fn feature_kind(kind: FeatureType) -> u32 {
    match kind {
        FeatureType::DiscreteStates => 0,
        FeatureType::Binary => 1,
        FeatureType::Axis3D => 2,
        FeatureType::Rotation => 3,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrFeature {
    pub usage: u32,
    pub kind: u32,
    pub name: [u8; XR_STRING_SIZE],
}

impl XrFeature {
    const EMPTY: Self = Self {
        usage: 0,
        kind: 0,
        name: [0; XR_STRING_SIZE],
    };
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrDeviceDefinition {
    pub name: [u8; XR_STRING_SIZE],
    pub serial: [u8; XR_STRING_SIZE],
    pub manufacturer: [u8; XR_STRING_SIZE],
    pub controller_type: [u8; XR_STRING_SIZE],
    pub characteristics: u32,
    pub can_query_state_at_time: bool,
    pub feature_count: u32,
    pub features: [XrFeature; XR_MAX_FEATURES],
}

impl XrDeviceDefinition {
    pub const EMPTY: Self = Self {
        name: [0; XR_STRING_SIZE],
        serial: [0; XR_STRING_SIZE],
        manufacturer: [0; XR_STRING_SIZE],
        controller_type: [0; XR_STRING_SIZE],
        characteristics: 0,
        can_query_state_at_time: false,
        feature_count: 0,
        features: [XrFeature::EMPTY; XR_MAX_FEATURES],
    };
}

impl From<&DeviceDefinition> for XrDeviceDefinition {
    fn from(def: &DeviceDefinition) -> Self {
        let mut out = Self::EMPTY;
        copy_c_string(&mut out.name, &def.name);
        copy_c_string(&mut out.serial, &def.serial);
        copy_c_string(&mut out.manufacturer, &def.manufacturer);
        copy_c_string(&mut out.controller_type, &def.controller_type);
        out.characteristics = def.characteristics.bits();
        out.can_query_state_at_time = def.can_query_state_at_time;
        out.feature_count = def.features.len().min(XR_MAX_FEATURES) as u32;
        for (slot, feature) in out.features.iter_mut().zip(&def.features) {
            slot.usage = *feature as u32;
            slot.kind = feature_kind(feature.kind());
            copy_c_string(&mut slot.name, feature.name());
        }
        out
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrFeatureValue {
    pub usage: u32,
    pub kind: u32,
    pub discrete: u32,
    pub binary: bool,
    pub axis: [f32; 3],
    pub rotation: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrDeviceState {
    pub device_time: u64,
    pub value_count: u32,
    pub values: [XrFeatureValue; XR_MAX_FEATURES],
}

impl Default for XrDeviceState {
    fn default() -> Self {
        Self {
            device_time: 0,
            value_count: 0,
            values: [XrFeatureValue::default(); XR_MAX_FEATURES],
        }
    }
}

impl From<&DeviceState> for XrDeviceState {
    fn from(state: &DeviceState) -> Self {
        let mut out = Self {
            device_time: state.time_ms,
            value_count: state.values().len().min(XR_MAX_FEATURES) as u32,
            ..Default::default()
        };
        for (slot, (feature, value)) in out.values.iter_mut().zip(state.values()) {
            slot.usage = *feature as u32;
            slot.kind = feature_kind(feature.kind());
            match *value {
                FeatureValue::DiscreteState(v) => slot.discrete = v,
                FeatureValue::Binary(b) => slot.binary = b,
                FeatureValue::Axis3D(v) => slot.axis = [v.x, v.y, v.z],
                FeatureValue::Rotation(q) => slot.rotation = [q.x, q.y, q.z, q.w],
            }
        }
        out
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XrHapticCapabilities {
    pub num_channels: u32,
    pub supports_impulse: bool,
    pub supports_buffer: bool,
    pub buffer_frequency_hz: u32,
    pub buffer_max_size: u32,
}

impl From<HapticCapabilities> for XrHapticCapabilities {
    fn from(c: HapticCapabilities) -> Self {
        Self {
            num_channels: c.num_channels,
            supports_impulse: c.supports_impulse,
            supports_buffer: c.supports_buffer,
            buffer_frequency_hz: c.buffer_frequency_hz,
            buffer_max_size: c.buffer_max_size,
        }
    }
}

fn update_type(raw: u32) -> Result<UpdateType> {
    match raw {
        0 => Ok(UpdateType::Dynamic),
        1 => Ok(UpdateType::BeforeRender),
        other => Err(Error::invalid_argument(format!("input update type {other}"))),
    }
}

// ---------------------------------------------------------------------------
// user_data ownership
// ---------------------------------------------------------------------------

/// Move `provider` to the heap and hand out the pointer the host stores.
pub fn into_user_data<P: XrProvider>(provider: P) -> *mut c_void {
    Box::into_raw(Box::new(provider)).cast()
}

/// Reclaim a pointer from [`into_user_data`]. Null is ignored.
///
/// # Safety
///
/// `user_data` must come from `into_user_data::<P>` and must not be used
/// afterwards.
pub unsafe fn drop_user_data<P: XrProvider>(user_data: *mut c_void) {
    if !user_data.is_null() {
        drop(Box::from_raw(user_data.cast::<P>()));
    }
}

fn dispatch<P, F>(user_data: *mut c_void, call: F) -> SubsystemErrorCode
where
    P: XrProvider,
    F: FnOnce(&mut P) -> Result<()>,
{
    if user_data.is_null() {
        return SubsystemErrorCode::InvalidArguments;
    }
    // SAFETY: tables are only built with pointers from `into_user_data::<P>`,
    // and the host never runs two callbacks of one provider concurrently.
    let provider = unsafe { &mut *user_data.cast::<P>() };
    match catch_unwind(AssertUnwindSafe(|| call(provider))) {
        Ok(Ok(())) => SubsystemErrorCode::Success,
        Ok(Err(err)) => {
            warn!("provider call failed: {}", err);
            SubsystemErrorCode::from(&err)
        }
        Err(_) => {
            error!("provider call panicked");
            SubsystemErrorCode::Failure
        }
    }
}

/// Like [`dispatch`] but writes the produced value through `out`.
fn dispatch_out<P, T, F>(user_data: *mut c_void, out: *mut T, call: F) -> SubsystemErrorCode
where
    P: XrProvider,
    F: FnOnce(&mut P) -> Result<T>,
{
    if out.is_null() {
        return SubsystemErrorCode::InvalidArguments;
    }
    dispatch::<P, _>(user_data, |provider| {
        let value = call(provider)?;
        // SAFETY: non-null, and the host owns a properly aligned `T` there for
        // the duration of the call.
        unsafe { out.write(value) };
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

pub type LifecycleFn = extern "C" fn(SubsystemHandle, *mut c_void) -> SubsystemErrorCode;
pub type LifecycleVoidFn = extern "C" fn(SubsystemHandle, *mut c_void);

#[repr(C)]
#[derive(Clone, Copy)]
pub struct LifecycleCallbacks {
    pub user_data: *mut c_void,
    pub initialize: LifecycleFn,
    pub start: LifecycleFn,
    pub stop: LifecycleVoidFn,
    pub shutdown: LifecycleVoidFn,
}

extern "C" fn lifecycle_initialize<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| p.initialize())
}

extern "C" fn lifecycle_start<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| p.start())
}

extern "C" fn lifecycle_stop<P: XrProvider>(_handle: SubsystemHandle, user_data: *mut c_void) {
    dispatch::<P, _>(user_data, |p| {
        p.stop();
        Ok(())
    });
}

extern "C" fn lifecycle_shutdown<P: XrProvider>(_handle: SubsystemHandle, user_data: *mut c_void) {
    dispatch::<P, _>(user_data, |p| {
        p.shutdown();
        Ok(())
    });
}

impl LifecycleCallbacks {
    pub fn new<P: XrProvider>(user_data: *mut c_void) -> Self {
        Self {
            user_data,
            initialize: lifecycle_initialize::<P>,
            start: lifecycle_start::<P>,
            stop: lifecycle_stop::<P>,
            shutdown: lifecycle_shutdown::<P>,
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DisplayGraphicsCallbacks {
    pub user_data: *mut c_void,
    pub start: extern "C" fn(SubsystemHandle, *mut c_void, *mut XrRenderingCaps) -> SubsystemErrorCode,
    pub submit_current_frame: LifecycleFn,
    pub populate_next_frame: extern "C" fn(
        SubsystemHandle,
        *mut c_void,
        *const XrFrameHints,
        *mut XrNextFrame,
    ) -> SubsystemErrorCode,
    pub stop: LifecycleFn,
    pub query_mirror_blit:
        extern "C" fn(SubsystemHandle, *mut c_void, u32, u32, *mut XrMirrorBlit) -> SubsystemErrorCode,
}

extern "C" fn gfx_start<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    caps: *mut XrRenderingCaps,
) -> SubsystemErrorCode {
    dispatch_out::<P, _, _>(user_data, caps, |p| p.gfx_start().map(Into::into))
}

extern "C" fn gfx_submit_current_frame<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| p.submit_current_frame())
}

extern "C" fn gfx_populate_next_frame<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    hints: *const XrFrameHints,
    next_frame: *mut XrNextFrame,
) -> SubsystemErrorCode {
    if hints.is_null() {
        return SubsystemErrorCode::InvalidArguments;
    }
    // SAFETY: non-null and valid for the duration of the call.
    let hints = FrameHints::from(unsafe { &*hints });
    dispatch_out::<P, _, _>(user_data, next_frame, |p| {
        let frame = p.populate_next_frame(&hints)?;
        XrNextFrame::try_from(&frame)
    })
}

extern "C" fn gfx_stop<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| p.gfx_stop())
}

extern "C" fn gfx_query_mirror_blit<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    dest_width: u32,
    dest_height: u32,
    blit: *mut XrMirrorBlit,
) -> SubsystemErrorCode {
    dispatch_out::<P, _, _>(user_data, blit, |p| {
        p.query_mirror_blit((dest_width, dest_height)).map(Into::into)
    })
}

impl DisplayGraphicsCallbacks {
    pub fn new<P: XrProvider>(user_data: *mut c_void) -> Self {
        Self {
            user_data,
            start: gfx_start::<P>,
            submit_current_frame: gfx_submit_current_frame::<P>,
            populate_next_frame: gfx_populate_next_frame::<P>,
            stop: gfx_stop::<P>,
            query_mirror_blit: gfx_query_mirror_blit::<P>,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DisplayMainCallbacks {
    pub user_data: *mut c_void,
    pub update_display_state:
        extern "C" fn(SubsystemHandle, *mut c_void, *mut XrDisplayState) -> SubsystemErrorCode,
}

extern "C" fn main_update_display_state<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    state: *mut XrDisplayState,
) -> SubsystemErrorCode {
    dispatch_out::<P, _, _>(user_data, state, |p| p.update_display_state().map(Into::into))
}

impl DisplayMainCallbacks {
    pub fn new<P: XrProvider>(user_data: *mut c_void) -> Self {
        Self {
            user_data,
            update_display_state: main_update_display_state::<P>,
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy)]
pub struct InputCallbacks {
    pub user_data: *mut c_void,
    pub tick: extern "C" fn(SubsystemHandle, *mut c_void, u32) -> SubsystemErrorCode,
    pub fill_device_definition: extern "C" fn(
        SubsystemHandle,
        *mut c_void,
        XrDeviceId,
        *mut XrDeviceDefinition,
    ) -> SubsystemErrorCode,
    pub update_device_state: extern "C" fn(
        SubsystemHandle,
        *mut c_void,
        XrDeviceId,
        u32,
        *mut XrDeviceState,
    ) -> SubsystemErrorCode,
    pub handle_event:
        extern "C" fn(SubsystemHandle, *mut c_void, u32, *mut c_void, u32) -> SubsystemErrorCode,
    pub handle_recenter: LifecycleFn,
    pub handle_haptic_impulse:
        extern "C" fn(SubsystemHandle, *mut c_void, XrDeviceId, i32, f32, f32) -> SubsystemErrorCode,
    pub handle_haptic_buffer: extern "C" fn(
        SubsystemHandle,
        *mut c_void,
        XrDeviceId,
        i32,
        u32,
        *const u8,
    ) -> SubsystemErrorCode,
    pub query_haptic_capabilities: extern "C" fn(
        SubsystemHandle,
        *mut c_void,
        XrDeviceId,
        *mut XrHapticCapabilities,
    ) -> SubsystemErrorCode,
    pub handle_haptic_stop:
        extern "C" fn(SubsystemHandle, *mut c_void, XrDeviceId) -> SubsystemErrorCode,
    pub query_tracking_origin_mode:
        extern "C" fn(SubsystemHandle, *mut c_void, *mut u32) -> SubsystemErrorCode,
    pub query_supported_tracking_origin_modes:
        extern "C" fn(SubsystemHandle, *mut c_void, *mut u32) -> SubsystemErrorCode,
    pub handle_set_tracking_origin_mode:
        extern "C" fn(SubsystemHandle, *mut c_void, u32) -> SubsystemErrorCode,
    pub try_get_device_state_at_time: extern "C" fn(
        SubsystemHandle,
        *mut c_void,
        u64,
        XrDeviceId,
        *mut XrDeviceState,
    ) -> SubsystemErrorCode,
}

extern "C" fn input_tick<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    update: u32,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| p.input_tick(update_type(update)?))
}

extern "C" fn input_fill_device_definition<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    device: XrDeviceId,
    definition: *mut XrDeviceDefinition,
) -> SubsystemErrorCode {
    dispatch_out::<P, _, _>(user_data, definition, |p| {
        p.device_definition(device).map(|d| XrDeviceDefinition::from(&d))
    })
}

extern "C" fn input_update_device_state<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    device: XrDeviceId,
    update: u32,
    state: *mut XrDeviceState,
) -> SubsystemErrorCode {
    dispatch_out::<P, _, _>(user_data, state, |p| {
        p.device_state(device, update_type(update)?)
            .map(|s| XrDeviceState::from(&s))
    })
}

extern "C" fn input_handle_event<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    event_type: u32,
    _buffer: *mut c_void,
    _size: u32,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| p.handle_event(event_type))
}

extern "C" fn input_handle_recenter<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| p.recenter())
}

extern "C" fn input_handle_haptic_impulse<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    device: XrDeviceId,
    channel: i32,
    amplitude: f32,
    _duration: f32,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| {
        let channel = u32::try_from(channel)
            .map_err(|_| Error::invalid_argument(format!("haptic channel {channel}")))?;
        p.haptic_impulse(device, channel, amplitude)
    })
}

extern "C" fn input_handle_haptic_buffer<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    device: XrDeviceId,
    channel: i32,
    size: u32,
    buffer: *const u8,
) -> SubsystemErrorCode {
    if buffer.is_null() && size > 0 {
        return SubsystemErrorCode::InvalidArguments;
    }
    let bytes: &[u8] = if size == 0 {
        &[]
    } else {
        // SAFETY: non-null and the host guarantees `size` readable bytes.
        unsafe { std::slice::from_raw_parts(buffer, size as usize) }
    };
    dispatch::<P, _>(user_data, |p| {
        let channel = u32::try_from(channel)
            .map_err(|_| Error::invalid_argument(format!("haptic channel {channel}")))?;
        p.haptic_buffer(device, channel, bytes)
    })
}

extern "C" fn input_query_haptic_capabilities<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    device: XrDeviceId,
    capabilities: *mut XrHapticCapabilities,
) -> SubsystemErrorCode {
    dispatch_out::<P, _, _>(user_data, capabilities, |p| {
        p.haptic_capabilities(device).map(Into::into)
    })
}

extern "C" fn input_handle_haptic_stop<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    device: XrDeviceId,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| p.haptic_stop(device))
}

extern "C" fn input_query_tracking_origin_mode<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    mode: *mut u32,
) -> SubsystemErrorCode {
    dispatch_out::<P, _, _>(user_data, mode, |p| p.tracking_origin().map(|m| m.bits()))
}

extern "C" fn input_query_supported_tracking_origin_modes<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    modes: *mut u32,
) -> SubsystemErrorCode {
    dispatch_out::<P, _, _>(user_data, modes, |p| {
        p.supported_tracking_origins().map(|m| m.bits())
    })
}

extern "C" fn input_handle_set_tracking_origin_mode<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    mode: u32,
) -> SubsystemErrorCode {
    dispatch::<P, _>(user_data, |p| {
        p.set_tracking_origin(TrackingOriginMode::from_bits_truncate(mode))
    })
}

extern "C" fn input_try_get_device_state_at_time<P: XrProvider>(
    _handle: SubsystemHandle,
    user_data: *mut c_void,
    time_ms: u64,
    device: XrDeviceId,
    state: *mut XrDeviceState,
) -> SubsystemErrorCode {
    dispatch_out::<P, _, _>(user_data, state, |p| {
        p.device_state_at_time(device, time_ms)
            .map(|s| XrDeviceState::from(&s))
    })
}

impl InputCallbacks {
    pub fn new<P: XrProvider>(user_data: *mut c_void) -> Self {
        Self {
            user_data,
            tick: input_tick::<P>,
            fill_device_definition: input_fill_device_definition::<P>,
            update_device_state: input_update_device_state::<P>,
            handle_event: input_handle_event::<P>,
            handle_recenter: input_handle_recenter::<P>,
            handle_haptic_impulse: input_handle_haptic_impulse::<P>,
            handle_haptic_buffer: input_handle_haptic_buffer::<P>,
            query_haptic_capabilities: input_query_haptic_capabilities::<P>,
            handle_haptic_stop: input_handle_haptic_stop::<P>,
            query_tracking_origin_mode: input_query_tracking_origin_mode::<P>,
            query_supported_tracking_origin_modes: input_query_supported_tracking_origin_modes::<P>,
            handle_set_tracking_origin_mode: input_handle_set_tracking_origin_mode::<P>,
            try_get_device_state_at_time: input_try_get_device_state_at_time::<P>,
        }
    }
}

/// Every table for one provider, sharing a single `user_data`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CallbackTables {
    pub lifecycle: LifecycleCallbacks,
    pub display_graphics: DisplayGraphicsCallbacks,
    pub display_main: DisplayMainCallbacks,
    pub input: InputCallbacks,
}

impl CallbackTables {
    pub fn new<P: XrProvider>(user_data: *mut c_void) -> Self {
        Self {
            lifecycle: LifecycleCallbacks::new::<P>(user_data),
            display_graphics: DisplayGraphicsCallbacks::new::<P>(user_data),
            display_main: DisplayMainCallbacks::new::<P>(user_data),
            input: InputCallbacks::new::<P>(user_data),
        }
    }
}
