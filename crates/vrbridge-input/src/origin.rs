//! Tracking origin modes and their runtime tracking universes.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use vrbridge_vr::TrackingUniverse;

bitflags! {
    /// Host tracking origin. A query answers with a single flag (or none for
    /// unknown); the supported set combines several.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct TrackingOriginMode: u32 {
        const DEVICE = 1 << 0;
        const FLOOR = 1 << 1;
        const TRACKING_REFERENCE = 1 << 2;
        const UNBOUNDED = 1 << 3;
    }
}

impl TrackingOriginMode {
    pub const SUPPORTED: Self = Self::DEVICE.union(Self::FLOOR);

    pub fn from_universe(universe: TrackingUniverse) -> Self {
        match universe {
            TrackingUniverse::Seated => Self::DEVICE,
            TrackingUniverse::Standing => Self::FLOOR,
            TrackingUniverse::RawAndUncalibrated => Self::empty(),
        }
    }

    /// The universe to switch to, `None` for anything but exactly one
    /// supported mode.
    pub fn to_universe(self) -> Option<TrackingUniverse> {
        if self == Self::DEVICE {
            Some(TrackingUniverse::Seated)
        } else if self == Self::FLOOR {
            Some(TrackingUniverse::Standing)
        } else {
            None
        }
    }
}
