//! Device descriptions handed to the host when a device connects.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vrbridge_common::{Error, Result};
use vrbridge_vr::{StringProperty, TrackedDeviceIndex, VrSystem, HMD_DEVICE_INDEX};

use crate::characteristics::DeviceCharacteristics;
use crate::registry::TrackedDevice;

/// Serial of the virtual device the Logitech stylus driver exposes next to
/// the physical one. Only the virtual one is usable.
pub const LOGITECH_VIRTUAL_STYLUS_SERIAL: &str = "LOGITECH_STYLUS_VIRTUAL";
const LOGITECH: &str = "Logitech";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureType {
    DiscreteStates,
    Binary,
    Axis3D,
    Rotation,
}

/// Every value a device state can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    TrackingState,
    IsTracked,
    UserPresence,
    DevicePosition,
    DeviceRotation,
    DeviceVelocity,
    DeviceAngularVelocity,
    LeftEyePosition,
    LeftEyeRotation,
    LeftEyeVelocity,
    LeftEyeAngularVelocity,
    RightEyePosition,
    RightEyeRotation,
    RightEyeVelocity,
    RightEyeAngularVelocity,
    CenterEyePosition,
    CenterEyeRotation,
    CenterEyeVelocity,
    CenterEyeAngularVelocity,
}

impl Feature {
    pub fn name(self) -> &'static str {
        match self {
            Feature::TrackingState => "TrackingState",
            Feature::IsTracked => "IsTracked",
            Feature::UserPresence => "UserPresence",
            Feature::DevicePosition => "Device - Position",
            Feature::DeviceRotation => "Device - Rotation",
            Feature::DeviceVelocity => "Device - Velocity",
            Feature::DeviceAngularVelocity => "Device - AngularVelocity",
            Feature::LeftEyePosition => "LeftEye - Position",
            Feature::LeftEyeRotation => "LeftEye - Rotation",
            Feature::LeftEyeVelocity => "LeftEye - Velocity",
            Feature::LeftEyeAngularVelocity => "LeftEye - AngularVelocity",
            Feature::RightEyePosition => "RightEye - Position",
            Feature::RightEyeRotation => "RightEye - Rotation",
            Feature::RightEyeVelocity => "RightEye - Velocity",
            Feature::RightEyeAngularVelocity => "RightEye - AngularVelocity",
            Feature::CenterEyePosition => "CenterEye - Position",
            Feature::CenterEyeRotation => "CenterEye - Rotation",
            Feature::CenterEyeVelocity => "CenterEye - Velocity",
            Feature::CenterEyeAngularVelocity => "CenterEye - AngularVelocity",
        }
    }

    pub fn kind(self) -> FeatureType {
        match self {
            Feature::TrackingState => FeatureType::DiscreteStates,
            Feature::IsTracked | Feature::UserPresence => FeatureType::Binary,
            Feature::DeviceRotation
            | Feature::LeftEyeRotation
            | Feature::RightEyeRotation
            | Feature::CenterEyeRotation => FeatureType::Rotation,
            _ => FeatureType::Axis3D,
        }
    }
}

pub const HMD_FEATURES: &[Feature] = &[
    Feature::TrackingState,
    Feature::IsTracked,
    Feature::UserPresence,
    Feature::DevicePosition,
    Feature::DeviceRotation,
    Feature::DeviceVelocity,
    Feature::DeviceAngularVelocity,
    Feature::LeftEyePosition,
    Feature::LeftEyeRotation,
    Feature::LeftEyeVelocity,
    Feature::LeftEyeAngularVelocity,
    Feature::RightEyePosition,
    Feature::RightEyeRotation,
    Feature::RightEyeVelocity,
    Feature::RightEyeAngularVelocity,
    Feature::CenterEyePosition,
    Feature::CenterEyeRotation,
    Feature::CenterEyeVelocity,
    Feature::CenterEyeAngularVelocity,
];

/// Controllers, trackers and base stations.
pub const TRACKED_FEATURES: &[Feature] = &[
    Feature::DevicePosition,
    Feature::DeviceRotation,
    Feature::DeviceVelocity,
    Feature::DeviceAngularVelocity,
    Feature::TrackingState,
    Feature::IsTracked,
];

/// Feature layout for a device. Anything without a tracked-device bit gets no
/// features.
pub fn features_for(characteristics: DeviceCharacteristics) -> &'static [Feature] {
    use DeviceCharacteristics as C;
    if characteristics.contains(C::HEAD_MOUNTED) {
        HMD_FEATURES
    } else if characteristics.contains(C::HELD_IN_HAND)
        || characteristics.contains(C::TRACKING_REFERENCE)
        || characteristics.contains(C::TRACKED_DEVICE)
    {
        TRACKED_FEATURES
    } else {
        &[]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDefinition {
    pub name: String,
    pub serial: String,
    pub manufacturer: String,
    /// Runtime input profile, e.g. `vive_controller`.
    pub controller_type: String,
    pub characteristics: DeviceCharacteristics,
    pub can_query_state_at_time: bool,
    pub features: Vec<Feature>,
}

fn string_property<S: VrSystem + ?Sized>(
    system: &S,
    index: TrackedDeviceIndex,
    prop: StringProperty,
) -> Option<String> {
    match system.string_property(index, prop) {
        Ok(value) if !value.is_empty() => Some(value),
        Ok(_) => None,
        Err(err) => {
            debug!(index, ?prop, %err, "device property unavailable");
            None
        }
    }
}

/// Display name for a device, `None` when a property it needs is missing.
pub fn device_name<S: VrSystem + ?Sized>(
    system: &S,
    index: TrackedDeviceIndex,
    characteristics: DeviceCharacteristics,
) -> Option<String> {
    use DeviceCharacteristics as C;

    if characteristics.contains(C::HEAD_MOUNTED) {
        let model = string_property(system, HMD_DEVICE_INDEX, StringProperty::ModelNumber)?;
        return Some(format!("OpenVR Headset({model})"));
    }

    let model = string_property(system, index, StringProperty::ModelNumber)?;
    if characteristics.contains(C::HELD_IN_HAND) || characteristics.contains(C::CONTROLLER) {
        let name = if characteristics.contains(C::LEFT) {
            format!("OpenVR Controller({model}) - Left")
        } else if characteristics.contains(C::RIGHT) {
            format!("OpenVR Controller({model}) - Right")
        } else {
            format!("OpenVR Controller({model})")
        };
        Some(name)
    } else if characteristics.contains(C::TRACKING_REFERENCE) {
        Some(format!("OpenVR Tracking Reference({model})"))
    } else if characteristics.contains(C::TRACKED_DEVICE) {
        Some(format!("OpenVR Tracked Device({model})"))
    } else {
        let serial = string_property(system, index, StringProperty::SerialNumber)?;
        Some(format!("{model} S/N {serial}"))
    }
}

/// Describe `device` for the host.
///
/// Serial, manufacturer and controller type are required. The physical half
/// of a Logitech stylus is rejected so only its virtual twin shows up.
pub fn fill_device_definition<S: VrSystem + ?Sized>(
    system: &S,
    device: &TrackedDevice,
) -> Result<DeviceDefinition> {
    let index = device.index;
    let serial = string_property(system, index, StringProperty::SerialNumber)
        .ok_or_else(|| Error::runtime(format!("device {index} has no serial number")))?;

    let manufacturer = if serial == LOGITECH_VIRTUAL_STYLUS_SERIAL {
        LOGITECH.to_string()
    } else {
        let manufacturer = string_property(system, index, StringProperty::ManufacturerName)
            .ok_or_else(|| Error::runtime(format!("device {index} has no manufacturer")))?;
        if manufacturer == LOGITECH {
            return Err(Error::unsupported(format!(
                "device {index} is the physical half of a Logitech stylus"
            )));
        }
        manufacturer
    };

    let name = device_name(system, index, device.characteristics).unwrap_or_else(|| {
        warn!(index, "no model number, naming device by serial");
        serial.clone()
    });

    let controller_type = string_property(system, index, StringProperty::ControllerType)
        .ok_or_else(|| Error::runtime(format!("device {index} has no controller type")))?;

    debug!(index, id = device.id, %name, %controller_type, "found device");

    Ok(DeviceDefinition {
        name,
        serial,
        manufacturer,
        controller_type,
        characteristics: device.characteristics,
        can_query_state_at_time: true,
        features: features_for(device.characteristics).to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrbridge_vr::{ControllerRole, SimulatedDevice, SimulatedRuntime, TrackedDeviceClass};

    use crate::registry::{DeviceRegistry, UpdateType};

    fn registry(rt: &SimulatedRuntime) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.update_connected(rt);
        registry.tick(UpdateType::Dynamic);
        registry
    }

    #[test]
    fn test_names_per_kind() {
        let mut rt = SimulatedRuntime::new();
        rt.devices.push(SimulatedDevice::new(
            TrackedDeviceClass::GenericTracker,
            ControllerRole::Invalid,
            "Vive Tracker",
            "LHR-TRACKER",
        ));
        let reg = registry(&rt);
        let names: Vec<_> = (0..5)
            .map(|i| {
                let c = reg.by_index(i).unwrap().characteristics;
                device_name(&rt, i, c).unwrap()
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "OpenVR Headset(Vive MV)",
                "OpenVR Controller(Vive Controller MV) - Left",
                "OpenVR Controller(Vive Controller MV) - Right",
                "OpenVR Tracking Reference(HTC V2-XD/XE)",
                "OpenVR Tracked Device(Vive Tracker)",
            ]
        );
    }

    #[test]
    fn test_uncategorised_name_uses_serial() {
        let rt = SimulatedRuntime::new();
        let name = device_name(&rt, 3, DeviceCharacteristics::CAMERA).unwrap();
        assert_eq!(name, "HTC V2-XD/XE S/N LHB-0000BASE");
    }

    #[test]
    fn test_controller_definition() {
        let rt = SimulatedRuntime::new();
        let registry = registry(&rt);
        let def = fill_device_definition(&rt, registry.by_index(1).unwrap()).unwrap();
        assert_eq!(def.serial, "LHR-0000CTL1");
        assert_eq!(def.manufacturer, "HTC");
        assert_eq!(def.controller_type, "vive_controller");
        assert!(def.can_query_state_at_time);
        assert_eq!(def.features, TRACKED_FEATURES);
    }

    #[test]
    fn test_hmd_definition_has_eye_features() {
        let rt = SimulatedRuntime::new();
        let registry = registry(&rt);
        let def = fill_device_definition(&rt, registry.by_index(0).unwrap()).unwrap();
        assert_eq!(def.name, "OpenVR Headset(Vive MV)");
        assert_eq!(def.controller_type, "vive");
        assert_eq!(def.features.len(), 19);
        assert_eq!(def.features[0].kind(), FeatureType::DiscreteStates);
        assert_eq!(Feature::CenterEyeRotation.name(), "CenterEye - Rotation");
        assert_eq!(Feature::CenterEyeRotation.kind(), FeatureType::Rotation);
    }

    #[test]
    fn test_every_default_device_has_a_definition() {
        let rt = SimulatedRuntime::new();
        let registry = registry(&rt);
        for device in registry.devices() {
            let def = fill_device_definition(&rt, device).unwrap();
            assert!(!def.controller_type.is_empty(), "device {}", device.id);
        }
    }

    #[test]
    fn test_missing_controller_type_fails() {
        let mut rt = SimulatedRuntime::new();
        rt.devices[0].controller_type = String::new();
        let registry = registry(&rt);
        let err = fill_device_definition(&rt, registry.by_index(0).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
    }

    #[test]
    fn test_logitech_stylus_quirk() {
        let mut rt = SimulatedRuntime::new();
        rt.devices[1].manufacturer = LOGITECH.to_string();
        let reg = registry(&rt);
        let err = fill_device_definition(&rt, reg.by_index(1).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        rt.devices[1].serial = LOGITECH_VIRTUAL_STYLUS_SERIAL.to_string();
        rt.devices[1].manufacturer = String::new();
        let def = fill_device_definition(&rt, reg.by_index(1).unwrap()).unwrap();
        assert_eq!(def.manufacturer, LOGITECH);
    }

    #[test]
    fn test_missing_model_falls_back_to_serial() {
        let mut rt = SimulatedRuntime::new();
        rt.devices[2].model = String::new();
        let reg = registry(&rt);
        let def = fill_device_definition(&rt, reg.by_index(2).unwrap()).unwrap();
        assert_eq!(def.name, "LHR-0000CTL2");
    }
}
