//! Display side of the XR provider: turns runtime poses, tangents and hidden
//! area meshes into host-space render descriptors, and negotiates what the
//! desktop preview window shows.

#![forbid(unsafe_code)]

pub mod blit;
pub mod coords;
pub mod eye;
pub mod frame;
pub mod host;
pub mod mirror;
pub mod occlusion;
pub mod provider;

pub use blit::{BlitParams, MirrorLayout, DEFAULT_MIRROR_SUBRECT};
pub use coords::{host_pose, to_host_space, to_host_tracking, HostTracking, Pose};
pub use eye::{culling_pass, eye_pose, projection, CullingPass, EyeView};
pub use frame::{
    DisplayState, FrameHintChanges, FrameHints, FrameStats, NextFrameDesc, Rect, RenderPass,
    RenderingCaps, ReprojectionMode,
};
pub use host::{
    DisplayHost, GraphicsRenderer, NativeTexture, OcclusionMeshId, RenderTextureDesc,
    RenderTextureId, SharedTextureDesc, TextureSource,
};
pub use mirror::{
    FallbackReason, MirrorEvent, MirrorFailure, MirrorMode, MirrorNegotiator, SharedMirror,
    MAX_SHARED_MIRROR_ATTEMPTS,
};
pub use occlusion::{build_occlusion_mesh, OcclusionMesh};
pub use provider::{DisplayProvider, FRAME_STAGES};
