//! Tracked device bookkeeping.
//!
//! The runtime addresses devices by slot index; the host wants stable ids that
//! are unique among the devices it currently knows. The registry maps between
//! the two and turns runtime connection changes into host connect/disconnect
//! events, one frame at a time.

use serde::{Deserialize, Serialize};
use tracing::debug;
use vrbridge_vr::{TrackedDeviceIndex, TrackedDevicePose, VrSystem, MAX_TRACKED_DEVICES};

use crate::characteristics::{characteristics_for, DeviceCharacteristics};

/// Host-facing device id.
pub type DeviceId = u32;

/// Which pose slot a state query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateType {
    /// Poses predicted for the next frame.
    Dynamic,
    /// Poses for the frame about to render.
    BeforeRender,
}

impl UpdateType {
    fn slot(self) -> usize {
        match self {
            UpdateType::Dynamic => 0,
            UpdateType::BeforeRender => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Connect,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    Connected(DeviceId),
    Disconnected(DeviceId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedDevice {
    pub id: DeviceId,
    pub index: TrackedDeviceIndex,
    pub characteristics: DeviceCharacteristics,
    connected: bool,
    pending: Option<Transition>,
    poses: [TrackedDevicePose; 2],
}

impl TrackedDevice {
    /// Whether the host has been told about this device.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn pose(&self, update: UpdateType) -> &TrackedDevicePose {
        &self.poses[update.slot()]
    }
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<TrackedDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[TrackedDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn by_id(&self, id: DeviceId) -> Option<&TrackedDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn by_index(&self, index: TrackedDeviceIndex) -> Option<&TrackedDevice> {
        self.devices.iter().find(|d| d.index == index)
    }

    /// Lowest id not held by any known device.
    fn next_free_id(&self) -> DeviceId {
        let mut ids: Vec<DeviceId> = self.devices.iter().map(|d| d.id).collect();
        ids.sort_unstable();
        let mut candidate = 0;
        for id in ids {
            if id == candidate {
                candidate += 1;
            } else if id > candidate {
                break;
            }
        }
        candidate
    }

    /// Reconcile with the runtime's view of which slots are occupied.
    ///
    /// Changes are only staged here; [`DeviceRegistry::tick`] reports them.
    /// A device whose characteristics changed (a controller swapping hands)
    /// is disconnected now and picked up again on the next pass.
    pub fn update_connected<S: VrSystem + ?Sized>(&mut self, system: &S) {
        for index in 0..MAX_TRACKED_DEVICES as TrackedDeviceIndex {
            let connected = system.is_device_connected(index);
            let position = self.devices.iter().position(|d| d.index == index);

            match (connected, position) {
                (false, Some(pos)) => {
                    self.devices[pos].pending = Some(Transition::Disconnect);
                }
                (true, None) => {
                    let characteristics =
                        characteristics_for(system.device_class(index), system.controller_role(index));
                    if characteristics.is_empty() {
                        continue;
                    }
                    let id = self.next_free_id();
                    debug!(index, id, ?characteristics, "tracked device appeared");
                    self.devices.push(TrackedDevice {
                        id,
                        index,
                        characteristics,
                        connected: false,
                        pending: Some(Transition::Connect),
                        poses: [TrackedDevicePose::default(); 2],
                    });
                }
                (true, Some(pos)) => {
                    let characteristics =
                        characteristics_for(system.device_class(index), system.controller_role(index));
                    let device = &mut self.devices[pos];
                    if device.characteristics != characteristics {
                        debug!(index, id = device.id, "characteristics changed, reconnecting");
                        device.pending = Some(Transition::Disconnect);
                    }
                }
                (false, None) => {}
            }
        }
    }

    /// Copy per-slot poses into the devices. Slices are indexed by tracked
    /// device index; short slices leave the remaining devices untouched.
    pub fn store_poses(&mut self, dynamic: &[TrackedDevicePose], before_render: &[TrackedDevicePose]) {
        for device in &mut self.devices {
            let index = device.index as usize;
            if let Some(pose) = dynamic.get(index) {
                device.poses[UpdateType::Dynamic.slot()] = *pose;
            }
            if let Some(pose) = before_render.get(index) {
                device.poses[UpdateType::BeforeRender.slot()] = *pose;
            }
        }
    }

    /// Apply staged changes and report them. Nothing changes right before
    /// rendering; connection changes land on the dynamic update.
    pub fn tick(&mut self, update: UpdateType) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        if update == UpdateType::BeforeRender {
            return events;
        }

        self.devices.retain_mut(|device| match device.pending.take() {
            Some(Transition::Connect) if !device.connected => {
                device.connected = true;
                events.push(DeviceEvent::Connected(device.id));
                true
            }
            Some(Transition::Disconnect) => {
                if device.connected {
                    events.push(DeviceEvent::Disconnected(device.id));
                }
                false
            }
            _ => true,
        });
        events
    }

    /// Forget every device, reporting the ones the host knew about.
    pub fn clear(&mut self) -> Vec<DeviceEvent> {
        let events = self
            .devices
            .iter()
            .filter(|d| d.connected)
            .map(|d| DeviceEvent::Disconnected(d.id))
            .collect();
        self.devices.clear();
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrbridge_vr::{ControllerRole, SimulatedRuntime};

    fn registry_after_tick(rt: &SimulatedRuntime) -> (DeviceRegistry, Vec<DeviceEvent>) {
        let mut registry = DeviceRegistry::new();
        registry.update_connected(rt);
        let events = registry.tick(UpdateType::Dynamic);
        (registry, events)
    }

    #[test]
    fn test_initial_devices_connect_with_sequential_ids() {
        let rt = SimulatedRuntime::new();
        let (registry, events) = registry_after_tick(&rt);
        assert_eq!(
            events,
            vec![
                DeviceEvent::Connected(0),
                DeviceEvent::Connected(1),
                DeviceEvent::Connected(2),
                DeviceEvent::Connected(3),
            ]
        );
        assert!(registry.devices().iter().all(|d| d.is_connected()));
        assert_eq!(registry.by_index(2).map(|d| d.id), Some(2));
    }

    #[test]
    fn test_before_render_tick_changes_nothing() {
        let rt = SimulatedRuntime::new();
        let mut registry = DeviceRegistry::new();
        registry.update_connected(&rt);
        assert!(registry.tick(UpdateType::BeforeRender).is_empty());
        assert!(registry.devices().iter().all(|d| !d.is_connected()));
        assert_eq!(registry.tick(UpdateType::Dynamic).len(), 4);
    }

    #[test]
    fn test_disconnect_frees_lowest_id() {
        let mut rt = SimulatedRuntime::new();
        let (mut registry, _) = registry_after_tick(&rt);

        rt.devices[1].connected = false;
        registry.update_connected(&rt);
        assert_eq!(registry.tick(UpdateType::Dynamic), vec![DeviceEvent::Disconnected(1)]);
        assert!(registry.by_index(1).is_none());

        rt.devices[1].connected = true;
        registry.update_connected(&rt);
        assert_eq!(registry.tick(UpdateType::Dynamic), vec![DeviceEvent::Connected(1)]);
    }

    #[test]
    fn test_role_change_reconnects_over_two_passes() {
        let mut rt = SimulatedRuntime::new();
        let (mut registry, _) = registry_after_tick(&rt);

        rt.devices[1].role = ControllerRole::RightHand;
        registry.update_connected(&rt);
        assert_eq!(registry.tick(UpdateType::Dynamic), vec![DeviceEvent::Disconnected(1)]);

        registry.update_connected(&rt);
        assert_eq!(registry.tick(UpdateType::Dynamic), vec![DeviceEvent::Connected(1)]);
        let device = registry.by_index(1).unwrap();
        assert!(device.characteristics.contains(DeviceCharacteristics::RIGHT));
    }

    #[test]
    fn test_opted_out_controller_is_hidden() {
        let mut rt = SimulatedRuntime::new();
        rt.devices[2].role = ControllerRole::OptOut;
        let (registry, events) = registry_after_tick(&rt);
        assert_eq!(events.len(), 3);
        assert!(registry.by_index(2).is_none());
    }

    #[test]
    fn test_clear_reports_only_connected() {
        let rt = SimulatedRuntime::new();
        let (mut registry, _) = registry_after_tick(&rt);
        let mut rt2 = rt.clone();
        rt2.devices.push(rt.devices[3].clone());
        registry.update_connected(&rt2);

        let events = registry.clear();
        assert_eq!(events.len(), 4);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_poses_land_in_their_slots() {
        let rt = SimulatedRuntime::new();
        let (mut registry, _) = registry_after_tick(&rt);
        let now = rt.device_poses(vrbridge_vr::TrackingUniverse::Standing, 0.0);
        let mut later = now.clone();
        later[0].pose_is_valid = false;
        registry.store_poses(&later, &now);

        let hmd = registry.by_index(0).unwrap();
        assert!(!hmd.pose(UpdateType::Dynamic).pose_is_valid);
        assert!(hmd.pose(UpdateType::BeforeRender).pose_is_valid);
    }
}
