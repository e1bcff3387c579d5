//! Controller vibration.

use serde::{Deserialize, Serialize};

/// Longest pulse the runtime accepts in one call.
pub const MAX_HAPTIC_PULSE_US: u16 = 3999;
pub const HAPTIC_CHANNELS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HapticCapabilities {
    pub num_channels: u32,
    pub supports_impulse: bool,
    pub supports_buffer: bool,
    pub buffer_frequency_hz: u32,
    pub buffer_max_size: u32,
}

impl HapticCapabilities {
    /// Impulses on a single channel for hand-held devices, nothing otherwise.
    pub fn for_device(held_in_hand: bool) -> Self {
        Self {
            num_channels: if held_in_hand { HAPTIC_CHANNELS } else { 0 },
            supports_impulse: held_in_hand,
            ..Self::default()
        }
    }
}

/// The runtime has no amplitude control, only pulse length. Amplitude is
/// clamped to `[0, 1]` and scaled onto the longest pulse; the requested
/// duration is not used.
pub fn pulse_duration_us(amplitude: f32) -> u16 {
    let amplitude = if amplitude.is_nan() { 0.0 } else { amplitude.clamp(0.0, 1.0) };
    ((amplitude * f32::from(MAX_HAPTIC_PULSE_US)) as u16).min(MAX_HAPTIC_PULSE_US)
}
