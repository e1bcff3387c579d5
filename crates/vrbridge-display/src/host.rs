//! What the display provider needs from the host engine.

use serde::{Deserialize, Serialize};
use vrbridge_common::Result;
use vrbridge_vr::{NativeDevice, TextureApi};

use crate::occlusion::OcclusionMesh;

/// Host handle for a render texture. Zero is never a valid id.
pub type RenderTextureId = u32;
/// Host handle for an occlusion mesh. Zero is never a valid id.
pub type OcclusionMeshId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphicsRenderer {
    Direct3D11,
    Direct3D12,
    Vulkan,
    OpenGlCore,
    OpenGlEs30,
    Metal,
    Null,
}

impl GraphicsRenderer {
    /// Compositor texture type for this renderer, `None` if unsupported.
    pub fn texture_api(self) -> Option<TextureApi> {
        match self {
            GraphicsRenderer::Direct3D11 => Some(TextureApi::DirectX),
            GraphicsRenderer::Vulkan => Some(TextureApi::Vulkan),
            GraphicsRenderer::OpenGlCore | GraphicsRenderer::OpenGlEs30 => Some(TextureApi::OpenGl),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSource {
    /// Let the host allocate it.
    HostAllocated,
    /// Wrap an existing native texture.
    Native(u64),
    /// No attachment.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTextureDesc {
    pub width: u32,
    pub height: u32,
    /// 2 for single-pass instanced targets, 1 otherwise.
    pub array_length: u32,
    pub srgb: bool,
    pub color: TextureSource,
    pub depth: TextureSource,
}

/// Native handles behind a host render texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeTexture {
    pub color: u64,
    pub depth: Option<u64>,
}

/// A shared texture opened on the host device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedTextureDesc {
    pub native: u64,
    pub width: u32,
    pub height: u32,
}

pub trait DisplayHost {
    fn renderer(&self) -> GraphicsRenderer;
    /// The device eye textures live on, if the renderer exposes one.
    fn native_device(&self) -> Option<NativeDevice>;

    fn create_texture(&mut self, desc: &RenderTextureDesc) -> Result<RenderTextureId>;
    fn destroy_texture(&mut self, id: RenderTextureId);
    fn query_native_texture(&mut self, id: RenderTextureId) -> Result<NativeTexture>;

    fn create_occlusion_mesh(&mut self, mesh: &OcclusionMesh) -> Result<OcclusionMeshId>;
    fn destroy_occlusion_mesh(&mut self, id: OcclusionMeshId);

    fn open_shared_texture(&mut self, handle: u64) -> Result<SharedTextureDesc>;
}
