use std::time::Instant;

use tracing::{debug, info};
use vrbridge_common::{CenterEyeVelocity, Error, ProviderSettings, Result};
use vrbridge_vr::{TrackingUniverse, VrCompositor, VrRuntime, VrSystem};

use crate::definition::{fill_device_definition, DeviceDefinition};
use crate::haptics::{pulse_duration_us, HapticCapabilities};
use crate::origin::TrackingOriginMode;
use crate::registry::{DeviceEvent, DeviceId, DeviceRegistry, TrackedDevice, UpdateType};
use crate::state::{device_state, DeviceState};

/// How far ahead overlay applications predict, which never get compositor
/// pacing.
pub const OVERLAY_PREDICTION_SECS: f32 = 0.011;

/// Notifications the input provider sends back to the host engine.
pub trait InputHost {
    fn device_connected(&mut self, id: DeviceId);
    fn device_disconnected(&mut self, id: DeviceId);
    fn tracking_origin_updated(&mut self);
}

fn notify<H: InputHost + ?Sized>(host: &mut H, events: Vec<DeviceEvent>) {
    for event in events {
        match event {
            DeviceEvent::Connected(id) => {
                info!(id, "input device connected");
                host.device_connected(id);
            }
            DeviceEvent::Disconnected(id) => {
                info!(id, "input device disconnected");
                host.device_disconnected(id);
            }
        }
    }
}

pub struct InputProvider {
    registry: DeviceRegistry,
    started: bool,
    overlay_app: bool,
    center_eye_velocity: CenterEyeVelocity,
    clock: Instant,
}

impl InputProvider {
    pub fn new(settings: &ProviderSettings) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            started: false,
            overlay_app: settings.is_overlay(),
            center_eye_velocity: settings.center_eye_velocity,
            clock: Instant::now(),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Milliseconds on the provider's clock, the time base of device states.
    pub fn timestamp_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }

    fn device(&self, id: DeviceId) -> Result<&TrackedDevice> {
        self.registry
            .by_id(id)
            .ok_or_else(|| Error::not_found(format!("input device {id}")))
    }

    pub fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    /// Report connection changes staged by the last graphics-thread update.
    pub fn tick<H: InputHost + ?Sized>(&mut self, host: &mut H, update: UpdateType) -> Result<()> {
        let events = self.registry.tick(update);
        notify(host, events);
        Ok(())
    }

    /// Pull this frame's poses and reconcile connected devices. Regular
    /// applications block on the compositor here; overlays sample directly.
    pub fn gfx_update_devices<R: VrRuntime + ?Sized>(&mut self, runtime: &mut R) -> Result<()> {
        if !self.started {
            return Ok(());
        }

        let (current, future) = if self.overlay_app {
            (
                runtime.device_poses(TrackingUniverse::Standing, 0.0),
                runtime.device_poses(TrackingUniverse::Standing, OVERLAY_PREDICTION_SECS),
            )
        } else {
            runtime.wait_get_poses().map_err(Error::runtime)?
        };

        self.registry.update_connected(&*runtime);
        self.registry.store_poses(&future, &current);
        Ok(())
    }

    pub fn device_definition<S: VrSystem + ?Sized>(
        &self,
        system: &S,
        id: DeviceId,
    ) -> Result<DeviceDefinition> {
        fill_device_definition(system, self.device(id)?)
    }

    pub fn device_state<S: VrSystem + ?Sized>(
        &self,
        system: &S,
        id: DeviceId,
        update: UpdateType,
    ) -> Result<DeviceState> {
        let device = self.device(id)?;
        let mut state = device_state(system, device, device.pose(update), self.center_eye_velocity);
        state.time_ms = self.timestamp_ms();
        Ok(state)
    }

    /// State predicted for host time `time_ms`, given the host's `now_ms`.
    pub fn device_state_at_time<R: VrRuntime + ?Sized>(
        &self,
        runtime: &R,
        id: DeviceId,
        time_ms: u64,
        now_ms: u64,
    ) -> Result<DeviceState> {
        let delta_secs = (time_ms as i64 - now_ms as i64) as f32 / 1000.0;
        let poses = runtime.device_poses(runtime.tracking_space(), delta_secs);

        let device = self.device(id)?;
        let pose = poses
            .get(device.index as usize)
            .ok_or_else(|| Error::internal(format!("no pose slot for device index {}", device.index)))?;
        let mut state = device_state(runtime, device, pose, self.center_eye_velocity);
        state.time_ms = time_ms;
        Ok(state)
    }

    /// Custom host events are not understood.
    pub fn handle_event(&mut self, event_type: u32) -> Result<()> {
        debug!(event_type, "ignoring input event");
        Err(Error::unsupported(format!("input event {event_type}")))
    }

    pub fn recenter<R: VrCompositor + ?Sized>(&mut self, runtime: &mut R) -> Result<()> {
        match runtime.tracking_space() {
            universe @ (TrackingUniverse::Seated | TrackingUniverse::Standing) => {
                info!(?universe, "recentering");
                runtime.reset_zero_pose(universe);
                Ok(())
            }
            TrackingUniverse::RawAndUncalibrated => {
                Err(Error::unsupported("recenter in raw tracking space"))
            }
        }
    }

    pub fn haptic_impulse<S: VrSystem + ?Sized>(
        &self,
        system: &mut S,
        id: DeviceId,
        channel: u32,
        amplitude: f32,
    ) -> Result<()> {
        let device = self.device(id)?;
        if !device.characteristics.is_held_in_hand() {
            return Err(Error::invalid_argument(format!(
                "device {id} does not support haptics"
            )));
        }
        let duration = pulse_duration_us(amplitude);
        debug!(id, channel, amplitude, duration, "haptic pulse");
        system.trigger_haptic_pulse(device.index, channel, duration);
        Ok(())
    }

    pub fn haptic_capabilities(&self, id: DeviceId) -> Result<HapticCapabilities> {
        let device = self.device(id)?;
        Ok(HapticCapabilities::for_device(
            device.characteristics.is_held_in_hand(),
        ))
    }

    pub fn haptic_buffer(&mut self, id: DeviceId, _channel: u32, _buffer: &[u8]) -> Result<()> {
        Err(Error::unsupported(format!("haptic buffers on device {id}")))
    }

    pub fn haptic_stop(&mut self, id: DeviceId) -> Result<()> {
        Err(Error::unsupported(format!("stopping haptics on device {id}")))
    }

    pub fn tracking_origin<R: VrCompositor + ?Sized>(&self, runtime: &R) -> TrackingOriginMode {
        TrackingOriginMode::from_universe(runtime.tracking_space())
    }

    pub fn supported_tracking_origins(&self) -> TrackingOriginMode {
        TrackingOriginMode::SUPPORTED
    }

    pub fn set_tracking_origin<R, H>(
        &mut self,
        runtime: &mut R,
        host: &mut H,
        mode: TrackingOriginMode,
    ) -> Result<()>
    where
        R: VrCompositor + ?Sized,
        H: InputHost + ?Sized,
    {
        let universe = mode
            .to_universe()
            .ok_or_else(|| Error::unsupported(format!("tracking origin {mode:?}")))?;
        let previous = runtime.tracking_space();
        runtime.set_tracking_space(universe);
        if previous != universe {
            info!(?previous, ?universe, "tracking origin changed");
            host.tracking_origin_updated();
        }
        Ok(())
    }

    pub fn stop<H: InputHost + ?Sized>(&mut self, host: &mut H) {
        self.started = false;
        let events = self.registry.clear();
        if !events.is_empty() {
            debug!(count = events.len(), "disconnecting input devices on stop");
        }
        notify(host, events);
    }
}
