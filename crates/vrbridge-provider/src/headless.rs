//! A host that keeps everything in memory.
//!
//! Drives provider sessions without a graphics device: textures are plain
//! ids with fabricated native handles, and input notifications are recorded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vrbridge_common::{Error, Result};
use vrbridge_display::{
    DisplayHost, GraphicsRenderer, NativeTexture, OcclusionMesh, OcclusionMeshId,
    RenderTextureDesc, RenderTextureId, SharedTextureDesc, TextureSource,
};
use vrbridge_input::{DeviceId, InputHost};
use vrbridge_vr::{NativeDevice, HEADSET_VIEW_MAX_HEIGHT, HEADSET_VIEW_MAX_WIDTH};

const NATIVE_DEVICE_HANDLE: u64 = 0xde71ce;
const NATIVE_COLOR_BASE: u64 = 0x1_0000;
const NATIVE_DEPTH_BASE: u64 = 0x2_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostEvent {
    DeviceConnected(DeviceId),
    DeviceDisconnected(DeviceId),
    TrackingOriginUpdated,
}

#[derive(Debug)]
pub struct HeadlessHost {
    renderer: GraphicsRenderer,
    next_id: u32,
    textures: BTreeMap<RenderTextureId, RenderTextureDesc>,
    meshes: BTreeMap<OcclusionMeshId, OcclusionMesh>,
    /// Size reported for any shared texture the runtime hands over.
    pub shared_texture_size: (u32, u32),
    events: Vec<HostEvent>,
}

impl HeadlessHost {
    pub fn new(renderer: GraphicsRenderer) -> Self {
        Self {
            renderer,
            next_id: 1,
            textures: BTreeMap::new(),
            meshes: BTreeMap::new(),
            shared_texture_size: (HEADSET_VIEW_MAX_WIDTH, HEADSET_VIEW_MAX_HEIGHT),
            events: Vec::new(),
        }
    }

    pub fn textures(&self) -> &BTreeMap<RenderTextureId, RenderTextureDesc> {
        &self.textures
    }

    pub fn occlusion_meshes(&self) -> &BTreeMap<OcclusionMeshId, OcclusionMesh> {
        &self.meshes
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(GraphicsRenderer::Direct3D11)
    }
}

impl DisplayHost for HeadlessHost {
    fn renderer(&self) -> GraphicsRenderer {
        self.renderer
    }

    fn native_device(&self) -> Option<NativeDevice> {
        self.renderer.texture_api().map(|api| NativeDevice {
            api,
            handle: NATIVE_DEVICE_HANDLE,
        })
    }

    fn create_texture(&mut self, desc: &RenderTextureDesc) -> Result<RenderTextureId> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::host(format!(
                "cannot create a {}x{} texture",
                desc.width, desc.height
            )));
        }
        let id = self.allocate();
        self.textures.insert(id, *desc);
        Ok(id)
    }

    fn destroy_texture(&mut self, id: RenderTextureId) {
        self.textures.remove(&id);
    }

    fn query_native_texture(&mut self, id: RenderTextureId) -> Result<NativeTexture> {
        let desc = self
            .textures
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("render texture {id}")))?;
        let color = match desc.color {
            TextureSource::Native(handle) => handle,
            TextureSource::HostAllocated | TextureSource::None => NATIVE_COLOR_BASE + u64::from(id),
        };
        let depth = match desc.depth {
            TextureSource::Native(handle) => Some(handle),
            TextureSource::HostAllocated => Some(NATIVE_DEPTH_BASE + u64::from(id)),
            TextureSource::None => None,
        };
        Ok(NativeTexture { color, depth })
    }

    fn create_occlusion_mesh(&mut self, mesh: &OcclusionMesh) -> Result<OcclusionMeshId> {
        let id = self.allocate();
        self.meshes.insert(id, mesh.clone());
        Ok(id)
    }

    fn destroy_occlusion_mesh(&mut self, id: OcclusionMeshId) {
        self.meshes.remove(&id);
    }

    fn open_shared_texture(&mut self, handle: u64) -> Result<SharedTextureDesc> {
        let (width, height) = self.shared_texture_size;
        Ok(SharedTextureDesc {
            native: handle,
            width,
            height,
        })
    }
}

impl InputHost for HeadlessHost {
    fn device_connected(&mut self, id: DeviceId) {
        self.events.push(HostEvent::DeviceConnected(id));
    }

    fn device_disconnected(&mut self, id: DeviceId) {
        self.events.push(HostEvent::DeviceDisconnected(id));
    }

    fn tracking_origin_updated(&mut self) {
        self.events.push(HostEvent::TrackingOriginUpdated);
    }
}
