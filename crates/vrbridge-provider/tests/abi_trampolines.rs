//! Drives providers through the C callback tables.

use std::ffi::c_void;
use std::ptr;

use vrbridge_common::{Error, ProviderSettings, Result};
use vrbridge_display::{
    BlitParams, DisplayState, FrameHints, NextFrameDesc, RenderingCaps,
};
use vrbridge_input::{
    DeviceDefinition, DeviceId, DeviceState, HapticCapabilities, TrackingOriginMode, UpdateType,
};
use vrbridge_provider::abi::{
    drop_user_data, into_user_data, XrDeviceDefinition, XrDeviceState, XrDisplayState,
    XrFrameHints, XrMirrorBlit, XrNextFrame, XrRect, XrRenderingCaps,
};
use vrbridge_provider::{
    CallbackTables, HeadlessHost, ProviderContext, SubsystemErrorCode, XrProvider,
};
use vrbridge_vr::SimulatedRuntime;

type Session = ProviderContext<SimulatedRuntime, HeadlessHost>;

const OK: SubsystemErrorCode = SubsystemErrorCode::Success;

fn hints() -> XrFrameHints {
    let defaults = FrameHints::default();
    XrFrameHints {
        changed_flags: 0,
        srgb: defaults.srgb,
        single_pass: defaults.single_pass,
        render_viewport: XrRect::from(defaults.render_viewport),
        texture_resolution_scale: defaults.texture_resolution_scale,
        near: defaults.near,
        far: defaults.far,
    }
}

fn session_tables() -> (CallbackTables, *mut c_void) {
    let ctx: Session = ProviderContext::new(
        SimulatedRuntime::new(),
        HeadlessHost::default(),
        ProviderSettings::default(),
    );
    let user_data = into_user_data(ctx);
    (CallbackTables::new::<Session>(user_data), user_data)
}

fn c_str(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|&b| b == 0).unwrap();
    std::str::from_utf8(&bytes[..end]).unwrap()
}

#[test]
fn test_full_session_through_tables() {
    let (t, ud) = session_tables();

    assert_eq!((t.lifecycle.initialize)(1, ud), OK);
    assert_eq!((t.lifecycle.start)(1, ud), OK);

    let mut caps = XrRenderingCaps::default();
    assert_eq!((t.display_graphics.start)(1, ud, &mut caps), OK);

    let mut frame = XrNextFrame::default();
    assert_eq!(
        (t.display_graphics.populate_next_frame)(1, ud, &hints(), &mut frame),
        OK
    );
    assert_eq!(frame.culling_pass_count, 2);
    assert_eq!(frame.render_pass_count, 2);
    for pass in &frame.render_passes[..2] {
        assert_ne!(pass.texture, 0);
        assert_eq!(pass.param_count, 1);
        assert_ne!(pass.params[0].occlusion_mesh, 0);
    }
    assert_eq!(t.input.user_data, ud);
    assert_eq!((t.input.tick)(1, ud, 0), OK);
    assert_eq!((t.display_graphics.submit_current_frame)(1, ud), OK);

    let mut def = XrDeviceDefinition::EMPTY;
    assert_eq!((t.input.fill_device_definition)(1, ud, 0, &mut def), OK);
    assert_eq!(c_str(&def.manufacturer), "HTC");
    assert_eq!(c_str(&def.controller_type), "vive");
    assert_eq!(def.feature_count, 19);
    assert!(def.can_query_state_at_time);

    let mut state = XrDeviceState::default();
    assert_eq!((t.input.update_device_state)(1, ud, 1, 1, &mut state), OK);
    assert_eq!(state.value_count, 6);
    assert_eq!((t.input.try_get_device_state_at_time)(1, ud, 5, 1, &mut state), OK);
    assert_eq!(state.device_time, 5);

    let mut mode = 0u32;
    assert_eq!((t.input.query_tracking_origin_mode)(1, ud, &mut mode), OK);
    assert_eq!(mode, TrackingOriginMode::FLOOR.bits());
    assert_eq!((t.input.query_supported_tracking_origin_modes)(1, ud, &mut mode), OK);
    assert_eq!(mode, TrackingOriginMode::SUPPORTED.bits());
    assert_eq!(
        (t.input.handle_set_tracking_origin_mode)(1, ud, TrackingOriginMode::DEVICE.bits()),
        OK
    );

    let mut blit = XrMirrorBlit::default();
    assert_eq!((t.display_graphics.query_mirror_blit)(1, ud, 1920, 1080, &mut blit), OK);
    assert_ne!(blit.texture, 0);

    let mut display = XrDisplayState::default();
    assert_eq!((t.display_main.update_display_state)(1, ud, &mut display), OK);
    assert!(!display.focus_lost);

    assert_eq!((t.display_graphics.stop)(1, ud), OK);
    (t.lifecycle.stop)(1, ud);
    (t.lifecycle.shutdown)(1, ud);
    unsafe { drop_user_data::<Session>(ud) };
}

#[test]
fn test_null_pointers_are_rejected() {
    let (t, ud) = session_tables();
    let null = ptr::null_mut();

    assert_eq!(
        (t.lifecycle.initialize)(1, null),
        SubsystemErrorCode::InvalidArguments
    );
    assert_eq!(
        (t.display_graphics.start)(1, ud, ptr::null_mut()),
        SubsystemErrorCode::InvalidArguments
    );
    assert_eq!(
        (t.display_graphics.populate_next_frame)(1, ud, ptr::null(), &mut XrNextFrame::default()),
        SubsystemErrorCode::InvalidArguments
    );
    assert_eq!(
        (t.input.handle_haptic_buffer)(1, ud, 1, 0, 4, ptr::null()),
        SubsystemErrorCode::InvalidArguments
    );
    (t.lifecycle.shutdown)(1, null);

    unsafe {
        drop_user_data::<Session>(ud);
        drop_user_data::<Session>(ptr::null_mut());
    }
}

#[test]
fn test_errors_map_to_codes() {
    let (t, ud) = session_tables();
    assert_eq!((t.lifecycle.start)(1, ud), OK);
    let mut frame = XrNextFrame::default();
    (t.display_graphics.start)(1, ud, &mut XrRenderingCaps::default());
    (t.display_graphics.populate_next_frame)(1, ud, &hints(), &mut frame);
    assert_eq!((t.input.tick)(1, ud, 0), OK);

    // HMD has no haptics.
    assert_eq!(
        (t.input.handle_haptic_impulse)(1, ud, 0, 0, 0.5, 1.0),
        SubsystemErrorCode::InvalidArguments
    );
    assert_eq!(
        (t.input.handle_haptic_impulse)(1, ud, 1, -1, 0.5, 1.0),
        SubsystemErrorCode::InvalidArguments
    );
    assert_eq!((t.input.handle_haptic_impulse)(1, ud, 1, 0, 0.5, 1.0), OK);

    assert_eq!(
        (t.input.handle_haptic_buffer)(1, ud, 1, 0, 0, ptr::null()),
        SubsystemErrorCode::Failure
    );
    assert_eq!((t.input.handle_haptic_stop)(1, ud, 1), SubsystemErrorCode::Failure);
    assert_eq!(
        (t.input.handle_event)(1, ud, 3, ptr::null_mut(), 0),
        SubsystemErrorCode::Failure
    );
    assert_eq!(
        (t.input.tick)(1, ud, 9),
        SubsystemErrorCode::InvalidArguments
    );

    let mut def = XrDeviceDefinition::EMPTY;
    assert_eq!(
        (t.input.fill_device_definition)(1, ud, 99, &mut def),
        SubsystemErrorCode::Failure
    );
    assert_eq!(
        (t.input.handle_set_tracking_origin_mode)(1, ud, TrackingOriginMode::UNBOUNDED.bits()),
        SubsystemErrorCode::Failure
    );

    (t.lifecycle.shutdown)(1, ud);
    unsafe { drop_user_data::<Session>(ud) };
}

/// Panics on every graphics call, fails everything else.
struct Exploding;

impl XrProvider for Exploding {
    fn initialize(&mut self) -> Result<()> {
        panic!("initialize")
    }
    fn start(&mut self) -> Result<()> {
        Err(Error::invalid_argument("start"))
    }
    fn stop(&mut self) {}
    fn shutdown(&mut self) {}
    fn gfx_start(&mut self) -> Result<RenderingCaps> {
        panic!("gfx_start")
    }
    fn populate_next_frame(&mut self, _hints: &FrameHints) -> Result<NextFrameDesc> {
        panic!("populate_next_frame")
    }
    fn submit_current_frame(&mut self) -> Result<()> {
        panic!("submit_current_frame")
    }
    fn query_mirror_blit(&mut self, _dest_size: (u32, u32)) -> Result<BlitParams> {
        panic!("query_mirror_blit")
    }
    fn gfx_stop(&mut self) -> Result<()> {
        panic!("gfx_stop")
    }
    fn update_display_state(&mut self) -> Result<DisplayState> {
        Err(Error::runtime("display"))
    }
    fn input_tick(&mut self, _update: UpdateType) -> Result<()> {
        Err(Error::runtime("tick"))
    }
    fn device_definition(&mut self, id: DeviceId) -> Result<DeviceDefinition> {
        Err(Error::not_found(format!("device {id}")))
    }
    fn device_state(&mut self, id: DeviceId, _update: UpdateType) -> Result<DeviceState> {
        Err(Error::not_found(format!("device {id}")))
    }
    fn device_state_at_time(&mut self, id: DeviceId, _time_ms: u64) -> Result<DeviceState> {
        Err(Error::not_found(format!("device {id}")))
    }
    fn handle_event(&mut self, _event_type: u32) -> Result<()> {
        Err(Error::unsupported("events"))
    }
    fn recenter(&mut self) -> Result<()> {
        Err(Error::unsupported("recenter"))
    }
    fn haptic_impulse(&mut self, _id: DeviceId, _channel: u32, _amplitude: f32) -> Result<()> {
        Err(Error::unsupported("haptics"))
    }
    fn haptic_capabilities(&mut self, _id: DeviceId) -> Result<HapticCapabilities> {
        Err(Error::unsupported("haptics"))
    }
    fn haptic_buffer(&mut self, _id: DeviceId, _channel: u32, _buffer: &[u8]) -> Result<()> {
        Err(Error::unsupported("haptics"))
    }
    fn haptic_stop(&mut self, _id: DeviceId) -> Result<()> {
        Err(Error::unsupported("haptics"))
    }
    fn tracking_origin(&mut self) -> Result<TrackingOriginMode> {
        Err(Error::unsupported("origin"))
    }
    fn supported_tracking_origins(&mut self) -> Result<TrackingOriginMode> {
        Err(Error::unsupported("origin"))
    }
    fn set_tracking_origin(&mut self, _mode: TrackingOriginMode) -> Result<()> {
        Err(Error::unsupported("origin"))
    }
}

#[test]
fn test_panics_do_not_cross_the_boundary() {
    let ud = into_user_data(Exploding);
    let t = CallbackTables::new::<Exploding>(ud);

    assert_eq!((t.lifecycle.initialize)(1, ud), SubsystemErrorCode::Failure);
    assert_eq!(
        (t.lifecycle.start)(1, ud),
        SubsystemErrorCode::InvalidArguments
    );
    let mut caps = XrRenderingCaps::default();
    assert_eq!(
        (t.display_graphics.start)(1, ud, &mut caps),
        SubsystemErrorCode::Failure
    );
    assert_eq!(
        (t.display_graphics.submit_current_frame)(1, ud),
        SubsystemErrorCode::Failure
    );
    let mut display = XrDisplayState::default();
    assert_eq!(
        (t.display_main.update_display_state)(1, ud, &mut display),
        SubsystemErrorCode::Failure
    );

    unsafe { drop_user_data::<Exploding>(ud) };
}
