//! Display provider sessions against the simulated runtime.

use std::collections::BTreeMap;

use vrbridge_common::{
    Error, InitializationType, MirrorViewMode, ProviderSettings, Result, StereoRenderingMode,
};
use vrbridge_display::{
    DisplayHost, DisplayProvider, EyeView, FallbackReason, FrameHintChanges, FrameHints,
    GraphicsRenderer, MirrorMode, NativeTexture, OcclusionMesh, OcclusionMeshId, Rect,
    RenderTextureDesc, RenderTextureId, ReprojectionMode, SharedMirror, SharedTextureDesc,
    TextureSource, DEFAULT_MIRROR_SUBRECT, MAX_SHARED_MIRROR_ATTEMPTS,
};
use vrbridge_vr::{Eye, FrameTiming, NativeDevice, SimulatedRuntime, TextureApi};

struct FakeHost {
    renderer: GraphicsRenderer,
    next_id: u32,
    textures: BTreeMap<RenderTextureId, RenderTextureDesc>,
    meshes: BTreeMap<OcclusionMeshId, OcclusionMesh>,
    shared_size: (u32, u32),
    destroyed_textures: u32,
}

impl FakeHost {
    fn new(renderer: GraphicsRenderer) -> Self {
        Self {
            renderer,
            next_id: 1,
            textures: BTreeMap::new(),
            meshes: BTreeMap::new(),
            shared_size: (3840, 2160),
            destroyed_textures: 0,
        }
    }

    fn d3d11() -> Self {
        Self::new(GraphicsRenderer::Direct3D11)
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl DisplayHost for FakeHost {
    fn renderer(&self) -> GraphicsRenderer {
        self.renderer
    }

    fn native_device(&self) -> Option<NativeDevice> {
        Some(NativeDevice {
            api: TextureApi::DirectX,
            handle: 0xd3d,
        })
    }

    fn create_texture(&mut self, desc: &RenderTextureDesc) -> Result<RenderTextureId> {
        let id = self.allocate();
        self.textures.insert(id, *desc);
        Ok(id)
    }

    fn destroy_texture(&mut self, id: RenderTextureId) {
        if self.textures.remove(&id).is_some() {
            self.destroyed_textures += 1;
        }
    }

    fn query_native_texture(&mut self, id: RenderTextureId) -> Result<NativeTexture> {
        if !self.textures.contains_key(&id) {
            return Err(Error::not_found(format!("texture {}", id)));
        }
        Ok(NativeTexture {
            color: 0x1000 + id as u64,
            depth: Some(0x2000 + id as u64),
        })
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
        Ok(SharedTextureDesc {
            native: handle,
            width: self.shared_size.0,
            height: self.shared_size.1,
        })
    }
}

fn settings(mirror: MirrorViewMode) -> ProviderSettings {
    ProviderSettings {
        mirror_view_mode: mirror,
        ..Default::default()
    }
}

fn started(
    settings: &ProviderSettings,
    rt: &mut SimulatedRuntime,
    host: &mut FakeHost,
) -> DisplayProvider {
    let mut display = DisplayProvider::new(settings);
    display.start(&*rt).unwrap();
    display.gfx_start(&*rt, host, settings).unwrap();
    display
}

/// One populate + submit cycle.
fn frame(display: &mut DisplayProvider, rt: &mut SimulatedRuntime, host: &mut FakeHost) {
    display
        .populate_next_frame(rt, host, &FrameHints::default())
        .unwrap();
    display.submit_current_frame(rt, host).unwrap();
}

#[test]
fn test_multi_pass_frame() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::d3d11();
    let s = settings(MirrorViewMode::RightEye);
    let mut display = started(&s, &mut rt, &mut host);
    assert_eq!(display.texture_api(), Some(TextureApi::DirectX));
    assert!(display.occlusion_mesh(Eye::Left).is_some());
    assert_eq!(host.meshes.len(), 2);

    let desc = display
        .populate_next_frame(&mut rt, &mut host, &FrameHints::default())
        .unwrap();
    assert_eq!(host.textures.len(), 4);
    assert!(host
        .textures
        .values()
        .all(|t| t.width == 1852 && t.height == 2056 && t.array_length == 1 && t.srgb));

    let views: Vec<_> = desc.culling_passes.iter().map(|c| c.view).collect();
    assert_eq!(views, vec![EyeView::Left, EyeView::Right]);
    assert_eq!(desc.render_passes.len(), 2);
    for (i, pass) in desc.render_passes.iter().enumerate() {
        assert_eq!(pass.culling_pass_index, i);
        assert_eq!(pass.params.len(), 1);
        assert_eq!(pass.params[0].texture_array_slice, 0);
        assert_eq!(pass.params[0].viewport, Rect::FULL);
    }
    assert_ne!(desc.render_passes[0].texture, desc.render_passes[1].texture);
    assert_eq!(
        desc.render_passes[1].params[0].occlusion_mesh,
        display.occlusion_mesh(Eye::Right)
    );

    display.submit_current_frame(&mut rt, &mut host).unwrap();
    assert_eq!(rt.submissions.len(), 2);
    assert_eq!(rt.presents, 1);
    assert_eq!(display.current_frame(), 1);
    let (eye, tex) = rt.submissions[1];
    assert_eq!(eye, Eye::Right);
    assert_eq!(tex.native, 0x1000 + desc.render_passes[1].texture as u64);
    assert_eq!(tex.slice, None);
    assert_eq!(tex.bounds, [0.0, 0.0, 1.0, 1.0]);

    // The next frame renders into the other stage.
    let next = display
        .populate_next_frame(&mut rt, &mut host, &FrameHints::default())
        .unwrap();
    assert_ne!(next.render_passes[0].texture, desc.render_passes[0].texture);
}

#[test]
fn test_single_pass_frame() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::d3d11();
    let s = ProviderSettings {
        stereo_rendering_mode: StereoRenderingMode::SinglePassInstanced,
        ..settings(MirrorViewMode::LeftEye)
    };
    let mut display = started(&s, &mut rt, &mut host);

    let desc = display
        .populate_next_frame(&mut rt, &mut host, &FrameHints::default())
        .unwrap();
    assert!(host.textures.values().all(|t| t.array_length == 2));
    assert_eq!(desc.culling_passes.len(), 1);
    assert_eq!(desc.culling_passes[0].view, EyeView::Center);
    assert_eq!(desc.render_passes.len(), 1);
    let slices: Vec<_> = desc.render_passes[0]
        .params
        .iter()
        .map(|p| p.texture_array_slice)
        .collect();
    assert_eq!(slices, vec![0, 1]);

    display.submit_current_frame(&mut rt, &mut host).unwrap();
    let natives: Vec<_> = rt.submissions.iter().map(|(_, t)| t.native).collect();
    assert_eq!(natives[0], natives[1]);
    assert_eq!(rt.submissions[0].1.slice, Some(0));
    assert_eq!(rt.submissions[1].1.slice, Some(1));
}

#[test]
fn test_overlay_app_skips_submission() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::d3d11();
    let s = ProviderSettings {
        initialization_type: InitializationType::Overlay,
        ..settings(MirrorViewMode::LeftEye)
    };
    let mut display = started(&s, &mut rt, &mut host);
    frame(&mut display, &mut rt, &mut host);
    assert!(rt.submissions.is_empty());
    assert_eq!(rt.presents, 1);
}

#[test]
fn test_submit_without_frame_is_noop() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::d3d11();
    let s = settings(MirrorViewMode::LeftEye);
    let mut display = started(&s, &mut rt, &mut host);
    display.submit_current_frame(&mut rt, &mut host).unwrap();
    assert_eq!(rt.presents, 0);
    assert_eq!(display.current_frame(), 0);
}

#[test]
fn test_unsupported_renderer() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::new(GraphicsRenderer::Metal);
    let s = settings(MirrorViewMode::LeftEye);
    let mut display = DisplayProvider::new(&s);
    display.start(&rt).unwrap();
    let err = display.gfx_start(&rt, &mut host, &s).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}

#[test]
fn test_runtime_view_negotiated_after_first_frame() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::d3d11();
    let s = settings(MirrorViewMode::RuntimeView);
    let mut display = started(&s, &mut rt, &mut host);

    frame(&mut display, &mut rt, &mut host);
    assert_eq!(rt.overlay_views_acquired, 0);
    assert_eq!(rt.headset_view, (3840, 2160));
    assert!(rt.headset_view_cropped);
    assert!(display.mirror().is_headset_resolution_set());

    frame(&mut display, &mut rt, &mut host);
    let shared = match display.mirror().shared() {
        SharedMirror::Active { texture } => texture,
        other => panic!("expected an active shared mirror, got {:?}", other),
    };
    assert_eq!(
        host.textures[&shared].color,
        TextureSource::Native(rt.overlay_texture)
    );
    assert_eq!(display.mirror_layout().subrect(), Rect::FULL);

    let blit = display
        .query_mirror_blit(&mut rt, &mut host, (1920, 1080))
        .unwrap();
    assert_eq!(blit.texture, shared);
    assert_eq!(blit.dest, Rect::FULL);
    assert!((blit.source.height - 1.0).abs() < 1e-5);
    assert_eq!(rt.overlay_views_acquired, 2);
    assert_eq!(rt.overlay_views_released, 1);
}

#[test]
fn test_runtime_view_falls_back_on_vulkan() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::new(GraphicsRenderer::Vulkan);
    let s = settings(MirrorViewMode::RuntimeView);
    let mut display = started(&s, &mut rt, &mut host);

    frame(&mut display, &mut rt, &mut host);
    assert!(display.mirror().is_fallen_back());
    assert_eq!(display.mirror().mode(), MirrorMode::LeftEye);
    // The runtime's own window keeps its size and framing.
    assert_eq!(rt.headset_view, (1280, 720));
    assert!(!rt.headset_view_cropped);
    assert!(!display.mirror().is_headset_resolution_set());

    frame(&mut display, &mut rt, &mut host);
    assert_eq!(rt.headset_view, (1280, 720));
    assert_eq!(rt.overlay_views_acquired, 0);

    let blit = display
        .query_mirror_blit(&mut rt, &mut host, (1920, 1080))
        .unwrap();
    assert_eq!(blit.array_slice, 0);
    assert_eq!(display.mirror_layout().subrect(), DEFAULT_MIRROR_SUBRECT);
}

#[test]
fn test_wrong_shared_size_exhausts_retries() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::d3d11();
    host.shared_size = (1920, 1080);
    let s = settings(MirrorViewMode::RuntimeView);
    let mut display = started(&s, &mut rt, &mut host);

    frame(&mut display, &mut rt, &mut host);
    for _ in 0..MAX_SHARED_MIRROR_ATTEMPTS {
        assert!(!display.mirror().is_fallen_back());
        frame(&mut display, &mut rt, &mut host);
    }
    assert!(display.mirror().is_fallen_back());
    assert_eq!(display.mirror().mode(), MirrorMode::LeftEye);
    assert_eq!(rt.overlay_views_acquired, MAX_SHARED_MIRROR_ATTEMPTS);
    assert_eq!(rt.overlay_views_released, MAX_SHARED_MIRROR_ATTEMPTS);

    // Asking again does nothing for the rest of the session.
    display.request_mirror_mode(MirrorMode::Distort);
    frame(&mut display, &mut rt, &mut host);
    assert_eq!(display.mirror().mode(), MirrorMode::LeftEye);
    assert_eq!(rt.overlay_views_acquired, MAX_SHARED_MIRROR_ATTEMPTS);
}

#[test]
fn test_transient_overlay_failures_recover() {
    let mut rt = SimulatedRuntime::new();
    rt.overlay_acquire_failures = 2;
    let mut host = FakeHost::d3d11();
    let s = settings(MirrorViewMode::RuntimeView);
    let mut display = started(&s, &mut rt, &mut host);

    for _ in 0..3 {
        frame(&mut display, &mut rt, &mut host);
    }
    assert_eq!(display.mirror().attempts(), 2);
    frame(&mut display, &mut rt, &mut host);
    assert!(display.mirror().shared_texture().is_some());
    assert_eq!(display.mirror().attempts(), 0);
}

#[test]
fn test_right_eye_blit_source() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::d3d11();
    let s = settings(MirrorViewMode::RightEye);
    let mut display = started(&s, &mut rt, &mut host);
    let desc = display
        .populate_next_frame(&mut rt, &mut host, &FrameHints::default())
        .unwrap();

    let blit = display
        .query_mirror_blit(&mut rt, &mut host, (1000, 1000))
        .unwrap();
    assert_eq!(blit.texture, desc.render_passes[1].texture);
    assert_eq!(blit.array_slice, 0);

    display.request_mirror_mode(MirrorMode::None);
    let blit = display
        .query_mirror_blit(&mut rt, &mut host, (1000, 1000))
        .unwrap();
    assert_eq!(blit.dest, Rect::ZERO);
}

#[test]
fn test_viewport_and_scale_changes() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::d3d11();
    let s = settings(MirrorViewMode::LeftEye);
    let mut display = started(&s, &mut rt, &mut host);
    frame(&mut display, &mut rt, &mut host);

    let hints = FrameHints {
        changed: FrameHintChanges::RENDER_VIEWPORT | FrameHintChanges::TEXTURE_RESOLUTION_SCALE,
        render_viewport: Rect::new(0.0, 0.0, 0.5, 0.5),
        texture_resolution_scale: 0.5,
        ..Default::default()
    };
    display.populate_next_frame(&mut rt, &mut host, &hints).unwrap();
    assert_eq!(host.destroyed_textures, 4);
    assert!(host
        .textures
        .values()
        .all(|t| t.width == 926 && t.height == 1028));
    assert!(display.mirror_layout().is_viewport_scaled());

    display.submit_current_frame(&mut rt, &mut host).unwrap();
    let bounds = rt.submissions.last().unwrap().1.bounds;
    assert_eq!(bounds, [0.0, 0.0, 0.5, 0.5]);
}

#[test]
fn test_display_state() {
    let mut rt = SimulatedRuntime::new();
    let display = DisplayProvider::new(&settings(MirrorViewMode::LeftEye));

    let state = display.update_display_state(&rt);
    assert_eq!(state.reprojection, ReprojectionMode::None);
    assert!(!state.focus_lost);

    rt.timing = Some(FrameTiming {
        num_frame_presents: 2,
        ..Default::default()
    });
    rt.should_pause = true;
    rt.can_render = false;
    let state = display.update_display_state(&rt);
    assert_eq!(state.reprojection, ReprojectionMode::PositionAndOrientation);
    assert!(state.focus_lost);
}

#[test]
fn test_shutdown_is_idempotent() {
    let mut rt = SimulatedRuntime::new();
    let mut host = FakeHost::d3d11();
    let s = settings(MirrorViewMode::RuntimeView);
    let mut display = started(&s, &mut rt, &mut host);
    frame(&mut display, &mut rt, &mut host);
    frame(&mut display, &mut rt, &mut host);
    assert!(display.mirror().shared_texture().is_some());

    display.stop();
    display.shutdown(&mut rt, &mut host);
    assert!(host.textures.is_empty());
    assert!(host.meshes.is_empty());
    assert_eq!(rt.overlay_views_acquired, rt.overlay_views_released);
    assert!(!display.textures_created());
    assert!(!display.mirror().is_headset_resolution_set());

    let destroyed = host.destroyed_textures;
    display.shutdown(&mut rt, &mut host);
    assert_eq!(host.destroyed_textures, destroyed);
    assert_eq!(rt.overlay_views_acquired, rt.overlay_views_released);
}

#[test]
fn test_fallback_reason_reports_backend() {
    let reason = FallbackReason::UnsupportedBackend(Some(TextureApi::OpenGl));
    assert!(reason.to_string().contains("OpenGl"));
}
