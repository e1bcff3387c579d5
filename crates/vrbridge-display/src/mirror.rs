//! Mirror (desktop preview) mode negotiation.
//!
//! The preview window can show one eye texture, or the runtime's own
//! lens-distorted headset view ([`MirrorMode::Distort`]). The latter is a
//! shared texture owned by the runtime that has to be opened on the host's
//! device, and that can fail for a number of transient reasons.
//!
//! # State machine
//!
//! ```text
//!   Trying { attempts } --acquired--------------> Active
//!         |   ^
//!         |   '--failure, attempts + 1 < max
//!         |
//!         '--failure at max, no sRGB, not DirectX---> FallenBack (mode = LeftEye)
//! ```
//!
//! `FallenBack` is terminal for the session: later requests for `Distort` are
//! ignored until [`MirrorNegotiator::reset`]. The sRGB and backend checks run
//! first, on any frame. Acquisition is never attempted before the first frame
//! has reached the compositor, because the runtime only sizes the headset
//! view after that.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use vrbridge_common::MirrorViewMode;
use vrbridge_vr::TextureApi;

use crate::host::RenderTextureId;

/// Failed acquisitions tolerated before giving up on the shared texture.
pub const MAX_SHARED_MIRROR_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MirrorMode {
    None,
    LeftEye,
    RightEye,
    /// The runtime's distorted headset view.
    Distort,
}

impl From<MirrorViewMode> for MirrorMode {
    fn from(mode: MirrorViewMode) -> Self {
        match mode {
            MirrorViewMode::None => MirrorMode::None,
            MirrorViewMode::LeftEye => MirrorMode::LeftEye,
            MirrorViewMode::RightEye => MirrorMode::RightEye,
            MirrorViewMode::RuntimeView => MirrorMode::Distort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedMirror {
    Trying { attempts: u32 },
    Active { texture: RenderTextureId },
    FallenBack,
}

/// Why one acquisition attempt failed. All of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorFailure {
    #[error("headset view overlay unavailable: {0}")]
    Overlay(String),
    #[error("overlay texture belongs to another device")]
    DeviceMismatch,
    #[error("shared texture could not be opened: {0}")]
    Open(String),
    #[error("unexpected shared texture size {actual_width}x{actual_height}, expected width {expected_width}")]
    Resolution {
        expected_width: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackReason {
    #[error("project is not rendering in sRGB")]
    NotSrgb,
    #[error("graphics backend {0:?} cannot open the shared texture")]
    UnsupportedBackend(Option<TextureApi>),
    #[error("gave up on the shared texture, last failure: {0}")]
    RetriesExhausted(MirrorFailure),
}

/// Rendering facts that decide whether the shared texture is usable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorEnvironment {
    pub srgb: bool,
    pub api: Option<TextureApi>,
}

/// Opens the runtime's shared mirror texture on the host device.
pub trait SharedTextureSource {
    fn acquire_shared_texture(&mut self) -> Result<RenderTextureId, MirrorFailure>;
}

/// What one negotiation step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    Unchanged,
    ModeChanged { from: MirrorMode, to: MirrorMode },
    Retrying { attempts: u32, failure: MirrorFailure },
    Activated { texture: RenderTextureId },
    FellBack(FallbackReason),
}

#[derive(Debug, Clone)]
pub struct MirrorNegotiator {
    mode: MirrorMode,
    previous_mode: MirrorMode,
    shared: SharedMirror,
    headset_resolution_set: bool,
}

impl MirrorNegotiator {
    pub fn new(mode: MirrorMode) -> Self {
        Self {
            mode,
            previous_mode: mode,
            shared: SharedMirror::Trying { attempts: 0 },
            headset_resolution_set: false,
        }
    }

    /// Forget everything, including a fallback.
    pub fn reset(&mut self, mode: MirrorMode) {
        *self = Self::new(mode);
    }

    pub fn mode(&self) -> MirrorMode {
        self.mode
    }

    pub fn previous_mode(&self) -> MirrorMode {
        self.previous_mode
    }

    pub fn shared(&self) -> SharedMirror {
        self.shared
    }

    pub fn attempts(&self) -> u32 {
        match self.shared {
            SharedMirror::Trying { attempts } => attempts,
            _ => 0,
        }
    }

    pub fn is_fallen_back(&self) -> bool {
        self.shared == SharedMirror::FallenBack
    }

    /// Shared texture currently shown, if `Distort` is live.
    pub fn shared_texture(&self) -> Option<RenderTextureId> {
        match (self.mode, self.shared) {
            (MirrorMode::Distort, SharedMirror::Active { texture }) => Some(texture),
            _ => None,
        }
    }

    pub fn is_headset_resolution_set(&self) -> bool {
        self.headset_resolution_set
    }

    pub fn mark_headset_resolution_set(&mut self) {
        self.headset_resolution_set = true;
    }

    /// Whether the headset view should be sized after this frame's submit.
    pub fn wants_headset_resolution(&self) -> bool {
        !self.headset_resolution_set && !self.is_fallen_back() && self.mode == MirrorMode::Distort
    }

    /// Switch to `requested`. A request for `Distort` after a fallback is
    /// dropped. Returns whether the mode changed.
    pub fn request_mode(&mut self, requested: MirrorMode) -> bool {
        if requested == MirrorMode::Distort && self.is_fallen_back() {
            return false;
        }
        if requested == self.mode {
            return false;
        }
        info!(from = ?self.mode, to = ?requested, "mirror mode changed");
        self.mode = requested;
        if let SharedMirror::Trying { .. } = self.shared {
            self.shared = SharedMirror::Trying { attempts: 0 };
        }
        true
    }

    /// Per-frame step: apply the requested mode and, while `Distort` is still
    /// being negotiated, make one acquisition attempt.
    pub fn update<S: SharedTextureSource + ?Sized>(
        &mut self,
        requested: MirrorMode,
        env: MirrorEnvironment,
        source: &mut S,
    ) -> MirrorEvent {
        let from = self.mode;
        let event = if self.request_mode(requested) {
            match self.setup(env, source) {
                MirrorEvent::Unchanged => MirrorEvent::ModeChanged {
                    from,
                    to: self.mode,
                },
                other => other,
            }
        } else {
            self.setup(env, source)
        };
        self.previous_mode = self.mode;
        event
    }

    /// One acquisition attempt for the current mode. No-op unless the mode is
    /// `Distort` and the shared texture is still being negotiated.
    pub fn setup<S: SharedTextureSource + ?Sized>(
        &mut self,
        env: MirrorEnvironment,
        source: &mut S,
    ) -> MirrorEvent {
        let attempts = match (self.mode, self.shared) {
            (MirrorMode::Distort, SharedMirror::Trying { attempts }) => attempts,
            _ => return MirrorEvent::Unchanged,
        };
        // Settle the environment first so an unusable backend never gets its
        // headset view resized.
        if !env.srgb {
            return self.fall_back(FallbackReason::NotSrgb);
        }
        if env.api != Some(TextureApi::DirectX) {
            return self.fall_back(FallbackReason::UnsupportedBackend(env.api));
        }
        if !self.headset_resolution_set {
            return MirrorEvent::Unchanged;
        }

        match source.acquire_shared_texture() {
            Ok(texture) => {
                info!(texture, attempts = attempts + 1, "mirror using shared headset view");
                self.shared = SharedMirror::Active { texture };
                MirrorEvent::Activated { texture }
            }
            Err(failure) => {
                let attempts = attempts + 1;
                if attempts >= MAX_SHARED_MIRROR_ATTEMPTS {
                    return self.fall_back(FallbackReason::RetriesExhausted(failure));
                }
                debug!(attempts, "shared mirror unavailable, will retry: {}", failure);
                self.shared = SharedMirror::Trying { attempts };
                MirrorEvent::Retrying { attempts, failure }
            }
        }
    }

    fn fall_back(&mut self, reason: FallbackReason) -> MirrorEvent {
        warn!("mirror falling back to left eye: {}", reason);
        self.shared = SharedMirror::FallenBack;
        self.mode = MirrorMode::LeftEye;
        self.previous_mode = MirrorMode::LeftEye;
        MirrorEvent::FellBack(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const DX_SRGB: MirrorEnvironment = MirrorEnvironment {
        srgb: true,
        api: Some(TextureApi::DirectX),
    };

    /// Replays scripted outcomes, then fails forever.
    struct Script {
        outcomes: VecDeque<Result<RenderTextureId, MirrorFailure>>,
        calls: u32,
    }

    impl Script {
        fn new(outcomes: impl IntoIterator<Item = Result<RenderTextureId, MirrorFailure>>) -> Self {
            Self {
                outcomes: outcomes.into_iter().collect(),
                calls: 0,
            }
        }

        fn failing() -> Self {
            Self::new([])
        }
    }

    impl SharedTextureSource for Script {
        fn acquire_shared_texture(&mut self) -> Result<RenderTextureId, MirrorFailure> {
            self.calls += 1;
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| Err(MirrorFailure::Overlay("busy".into())))
        }
    }

    fn ready(mode: MirrorMode) -> MirrorNegotiator {
        let mut n = MirrorNegotiator::new(mode);
        n.mark_headset_resolution_set();
        n
    }

    #[test]
    fn test_nothing_attempted_before_first_frame() {
        let mut n = MirrorNegotiator::new(MirrorMode::Distort);
        let mut source = Script::failing();
        for _ in 0..10 {
            assert_eq!(n.update(MirrorMode::Distort, DX_SRGB, &mut source), MirrorEvent::Unchanged);
        }
        assert_eq!(source.calls, 0);
        assert_eq!(n.attempts(), 0);
        assert!(n.wants_headset_resolution());
    }

    #[test]
    fn test_five_failures_fall_back_for_good() {
        let mut n = ready(MirrorMode::Distort);
        let mut source = Script::failing();
        for expected in 1..MAX_SHARED_MIRROR_ATTEMPTS {
            let event = n.update(MirrorMode::Distort, DX_SRGB, &mut source);
            assert!(matches!(event, MirrorEvent::Retrying { attempts, .. } if attempts == expected));
        }
        let event = n.update(MirrorMode::Distort, DX_SRGB, &mut source);
        assert!(matches!(event, MirrorEvent::FellBack(FallbackReason::RetriesExhausted(_))));
        assert!(n.is_fallen_back());
        assert_eq!(n.mode(), MirrorMode::LeftEye);

        // Further requests for the distorted view change nothing.
        for _ in 0..3 {
            assert_eq!(n.update(MirrorMode::Distort, DX_SRGB, &mut source), MirrorEvent::Unchanged);
        }
        assert_eq!(n.mode(), MirrorMode::LeftEye);
        assert_eq!(source.calls, MAX_SHARED_MIRROR_ATTEMPTS);
        assert!(!n.wants_headset_resolution());
    }

    #[test]
    fn test_success_on_third_attempt_resets_counter() {
        let mut n = ready(MirrorMode::Distort);
        let mut source = Script::new([
            Err(MirrorFailure::DeviceMismatch),
            Err(MirrorFailure::Resolution {
                expected_width: 3840,
                actual_width: 1920,
                actual_height: 1080,
            }),
            Ok(42),
        ]);
        n.update(MirrorMode::Distort, DX_SRGB, &mut source);
        n.update(MirrorMode::Distort, DX_SRGB, &mut source);
        assert_eq!(n.attempts(), 2);
        let event = n.update(MirrorMode::Distort, DX_SRGB, &mut source);
        assert_eq!(event, MirrorEvent::Activated { texture: 42 });
        assert_eq!(n.attempts(), 0);
        assert!(!n.is_fallen_back());
        assert_eq!(n.shared_texture(), Some(42));

        // Active is stable; no further acquisitions.
        n.update(MirrorMode::Distort, DX_SRGB, &mut source);
        assert_eq!(source.calls, 3);
    }

    #[test]
    fn test_missing_srgb_falls_back_immediately() {
        let mut n = ready(MirrorMode::Distort);
        let mut source = Script::new([Ok(1)]);
        let env = MirrorEnvironment {
            srgb: false,
            ..DX_SRGB
        };
        let event = n.update(MirrorMode::Distort, env, &mut source);
        assert_eq!(event, MirrorEvent::FellBack(FallbackReason::NotSrgb));
        assert_eq!(source.calls, 0);
        assert_eq!(n.mode(), MirrorMode::LeftEye);
    }

    #[test]
    fn test_non_directx_falls_back_immediately() {
        let mut n = ready(MirrorMode::Distort);
        let mut source = Script::new([Ok(1)]);
        let env = MirrorEnvironment {
            srgb: true,
            api: Some(TextureApi::Vulkan),
        };
        let event = n.update(MirrorMode::Distort, env, &mut source);
        assert_eq!(
            event,
            MirrorEvent::FellBack(FallbackReason::UnsupportedBackend(Some(TextureApi::Vulkan)))
        );
    }

    #[test]
    fn test_unusable_environment_falls_back_before_first_frame() {
        let mut n = MirrorNegotiator::new(MirrorMode::Distort);
        let mut source = Script::new([Ok(1)]);
        let env = MirrorEnvironment {
            srgb: true,
            api: Some(TextureApi::OpenGl),
        };
        let event = n.update(MirrorMode::Distort, env, &mut source);
        assert_eq!(
            event,
            MirrorEvent::FellBack(FallbackReason::UnsupportedBackend(Some(TextureApi::OpenGl)))
        );
        assert_eq!(source.calls, 0);
        assert!(!n.wants_headset_resolution());
    }

    #[test]
    fn test_mode_change_resets_attempts() {
        let mut n = ready(MirrorMode::Distort);
        let mut source = Script::failing();
        n.update(MirrorMode::Distort, DX_SRGB, &mut source);
        n.update(MirrorMode::Distort, DX_SRGB, &mut source);
        assert_eq!(n.attempts(), 2);

        let event = n.update(MirrorMode::RightEye, DX_SRGB, &mut source);
        assert_eq!(
            event,
            MirrorEvent::ModeChanged {
                from: MirrorMode::Distort,
                to: MirrorMode::RightEye
            }
        );
        assert_eq!(n.attempts(), 0);

        // Coming back starts a fresh budget.
        let event = n.update(MirrorMode::Distort, DX_SRGB, &mut source);
        assert!(matches!(event, MirrorEvent::Retrying { attempts: 1, .. }));
    }

    #[test]
    fn test_eye_modes_never_touch_source() {
        let mut n = ready(MirrorMode::RightEye);
        let mut source = Script::failing();
        for mode in [MirrorMode::LeftEye, MirrorMode::None, MirrorMode::RightEye] {
            n.update(mode, DX_SRGB, &mut source);
        }
        assert_eq!(source.calls, 0);
        assert_eq!(n.previous_mode(), MirrorMode::RightEye);
    }

    #[test]
    fn test_reset_clears_fallback() {
        let mut n = ready(MirrorMode::Distort);
        let env = MirrorEnvironment {
            srgb: false,
            api: None,
        };
        n.update(MirrorMode::Distort, env, &mut Script::failing());
        assert!(n.is_fallen_back());
        n.reset(MirrorMode::Distort);
        assert!(!n.is_fallen_back());
        assert!(!n.is_headset_resolution_set());
        assert_eq!(n.mode(), MirrorMode::Distort);
    }

    #[test]
    fn test_settings_mapping() {
        assert_eq!(MirrorMode::from(MirrorViewMode::RuntimeView), MirrorMode::Distort);
        assert_eq!(MirrorMode::from(MirrorViewMode::None), MirrorMode::None);
    }
}
