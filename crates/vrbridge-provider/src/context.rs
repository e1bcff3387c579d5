//! One provider session: runtime, host, settings and both providers.

use tracing::{debug, info};
use vrbridge_common::{ProviderSettings, Result};
use vrbridge_display::{
    BlitParams, DisplayHost, DisplayProvider, DisplayState, FrameHints, NextFrameDesc,
    RenderingCaps,
};
use vrbridge_input::{
    DeviceDefinition, DeviceId, DeviceState, HapticCapabilities, InputHost, InputProvider,
    TrackingOriginMode, UpdateType,
};
use vrbridge_vr::VrRuntime;

/// Everything the providers call back into on the host side.
pub trait ProviderHost: DisplayHost + InputHost {}

impl<T: DisplayHost + InputHost> ProviderHost for T {}

/// Operations the host engine drives, grouped the way it calls them.
///
/// Graphics-thread and main-thread calls never overlap; the host fences them.
pub trait XrProvider {
    fn initialize(&mut self) -> Result<()>;
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn shutdown(&mut self);

    fn gfx_start(&mut self) -> Result<RenderingCaps>;
    fn populate_next_frame(&mut self, hints: &FrameHints) -> Result<NextFrameDesc>;
    fn submit_current_frame(&mut self) -> Result<()>;
    fn query_mirror_blit(&mut self, dest_size: (u32, u32)) -> Result<BlitParams>;
    fn gfx_stop(&mut self) -> Result<()>;

    fn update_display_state(&mut self) -> Result<DisplayState>;

    fn input_tick(&mut self, update: UpdateType) -> Result<()>;
    fn device_definition(&mut self, id: DeviceId) -> Result<DeviceDefinition>;
    fn device_state(&mut self, id: DeviceId, update: UpdateType) -> Result<DeviceState>;
    fn device_state_at_time(&mut self, id: DeviceId, time_ms: u64) -> Result<DeviceState>;
    fn handle_event(&mut self, event_type: u32) -> Result<()>;
    fn recenter(&mut self) -> Result<()>;
    fn haptic_impulse(&mut self, id: DeviceId, channel: u32, amplitude: f32) -> Result<()>;
    fn haptic_capabilities(&mut self, id: DeviceId) -> Result<HapticCapabilities>;
    fn haptic_buffer(&mut self, id: DeviceId, channel: u32, buffer: &[u8]) -> Result<()>;
    fn haptic_stop(&mut self, id: DeviceId) -> Result<()>;
    fn tracking_origin(&mut self) -> Result<TrackingOriginMode>;
    fn supported_tracking_origins(&mut self) -> Result<TrackingOriginMode>;
    fn set_tracking_origin(&mut self, mode: TrackingOriginMode) -> Result<()>;
}

pub struct ProviderContext<R, H> {
    runtime: R,
    host: H,
    settings: ProviderSettings,
    display: DisplayProvider,
    input: InputProvider,
    initialized: bool,
    running: bool,
}

impl<R: VrRuntime, H: ProviderHost> ProviderContext<R, H> {
    pub fn new(runtime: R, host: H, settings: ProviderSettings) -> Self {
        Self {
            display: DisplayProvider::new(&settings),
            input: InputProvider::new(&settings),
            runtime,
            host,
            settings,
            initialized: false,
            running: false,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn display(&self) -> &DisplayProvider {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut DisplayProvider {
        &mut self.display
    }

    pub fn input(&self) -> &InputProvider {
        &self.input
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// One host frame: hand the previous frame to the compositor, describe
    /// the next, then let the main thread pick up device changes.
    pub fn run_frame(&mut self, hints: &FrameHints) -> Result<NextFrameDesc> {
        self.submit_current_frame()?;
        let frame = self.populate_next_frame(hints)?;
        self.input_tick(UpdateType::Dynamic)?;
        Ok(frame)
    }
}

impl<R: VrRuntime, H: ProviderHost> XrProvider for ProviderContext<R, H> {
    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let startup = self.settings.startup_info()?;
        if !startup.is_empty() {
            debug!(%startup, "runtime startup info");
        }
        info!(
            app = %self.settings.application_name,
            overlay = self.settings.is_overlay(),
            single_pass = self.settings.is_single_pass(),
            "provider initialized"
        );
        self.initialized = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.display.start(&self.runtime)?;
        self.input.start()?;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.display.stop();
        self.input.stop(&mut self.host);
        self.running = false;
    }

    fn shutdown(&mut self) {
        if self.running {
            self.stop();
        }
        self.display.shutdown(&mut self.runtime, &mut self.host);
        if self.initialized {
            info!("provider shut down");
        }
        self.initialized = false;
    }

    fn gfx_start(&mut self) -> Result<RenderingCaps> {
        self.display
            .gfx_start(&self.runtime, &mut self.host, &self.settings)
    }

    fn populate_next_frame(&mut self, hints: &FrameHints) -> Result<NextFrameDesc> {
        self.input.gfx_update_devices(&mut self.runtime)?;
        self.display
            .populate_next_frame(&mut self.runtime, &mut self.host, hints)
    }

    fn submit_current_frame(&mut self) -> Result<()> {
        self.display
            .submit_current_frame(&mut self.runtime, &mut self.host)
    }

    fn query_mirror_blit(&mut self, dest_size: (u32, u32)) -> Result<BlitParams> {
        self.display
            .query_mirror_blit(&mut self.runtime, &mut self.host, dest_size)
    }

    fn gfx_stop(&mut self) -> Result<()> {
        self.display.gfx_stop(&mut self.host);
        Ok(())
    }

    fn update_display_state(&mut self) -> Result<DisplayState> {
        Ok(self.display.update_display_state(&self.runtime))
    }

    fn input_tick(&mut self, update: UpdateType) -> Result<()> {
        self.input.tick(&mut self.host, update)
    }

    fn device_definition(&mut self, id: DeviceId) -> Result<DeviceDefinition> {
        self.input.device_definition(&self.runtime, id)
    }

    fn device_state(&mut self, id: DeviceId, update: UpdateType) -> Result<DeviceState> {
        self.input.device_state(&self.runtime, id, update)
    }

    fn device_state_at_time(&mut self, id: DeviceId, time_ms: u64) -> Result<DeviceState> {
        let now = self.input.timestamp_ms();
        self.input
            .device_state_at_time(&self.runtime, id, time_ms, now)
    }

    fn handle_event(&mut self, event_type: u32) -> Result<()> {
        self.input.handle_event(event_type)
    }

    fn recenter(&mut self) -> Result<()> {
        self.input.recenter(&mut self.runtime)
    }

    fn haptic_impulse(&mut self, id: DeviceId, channel: u32, amplitude: f32) -> Result<()> {
        self.input
            .haptic_impulse(&mut self.runtime, id, channel, amplitude)
    }

    fn haptic_capabilities(&mut self, id: DeviceId) -> Result<HapticCapabilities> {
        self.input.haptic_capabilities(id)
    }

    fn haptic_buffer(&mut self, id: DeviceId, channel: u32, buffer: &[u8]) -> Result<()> {
        self.input.haptic_buffer(id, channel, buffer)
    }

    fn haptic_stop(&mut self, id: DeviceId) -> Result<()> {
        self.input.haptic_stop(id)
    }

    fn tracking_origin(&mut self) -> Result<TrackingOriginMode> {
        Ok(self.input.tracking_origin(&self.runtime))
    }

    fn supported_tracking_origins(&mut self) -> Result<TrackingOriginMode> {
        Ok(self.input.supported_tracking_origins())
    }

    fn set_tracking_origin(&mut self, mode: TrackingOriginMode) -> Result<()> {
        self.input
            .set_tracking_origin(&mut self.runtime, &mut self.host, mode)
    }
}
