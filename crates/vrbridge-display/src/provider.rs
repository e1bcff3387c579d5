//! Display provider lifecycle.
//!
//! The host calls in from two threads but fences them, so the provider is a
//! plain struct borrowed mutably by whichever callback is running. The runtime
//! and host are passed into each call rather than stored.

use tracing::{debug, info, warn};
use vrbridge_common::{Error, ProviderSettings, Result};
use vrbridge_vr::{
    Eye, FloatProperty, NativeDevice, OverlayHandle, OverlayView, SubmitTexture, TextureApi,
    VrMirrorSource, VrRuntime, HEADSET_VIEW_MAX_HEIGHT, HEADSET_VIEW_MAX_WIDTH, HMD_DEVICE_INDEX,
};

use crate::blit::{fit_blit, BlitParams, MirrorLayout};
use crate::eye::{culling_pass, eye_pose, projection, EyeView};
use crate::frame::{
    CullingPassDesc, DisplayState, FrameHintChanges, FrameHints, FrameStats, NextFrameDesc, Rect,
    RenderParams, RenderPass, RenderingCaps, ReprojectionMode,
};
use crate::host::{
    DisplayHost, NativeTexture, OcclusionMeshId, RenderTextureDesc, RenderTextureId, TextureSource,
};
use crate::mirror::{
    MirrorEnvironment, MirrorEvent, MirrorFailure, MirrorMode, MirrorNegotiator, SharedMirror,
    SharedTextureSource,
};
use crate::occlusion::from_hidden_area;

/// Eye textures are double buffered.
pub const FRAME_STAGES: usize = 2;

type EyeTextures<T> = [[Option<T>; 2]; FRAME_STAGES];

pub struct DisplayProvider {
    configured_mirror: MirrorMode,
    requested_mirror: MirrorMode,
    mirror: MirrorNegotiator,
    layout: MirrorLayout,

    api: Option<TextureApi>,
    single_pass: bool,
    overlay_app: bool,
    srgb: bool,

    texture_bounds: Rect,
    textures: EyeTextures<RenderTextureId>,
    native: EyeTextures<NativeTexture>,
    textures_created: bool,
    occlusion: [Option<OcclusionMeshId>; 2],

    cur_frame: u32,
    frame_in_flight: bool,
    stats: FrameStats,

    overlay: Option<OverlayHandle>,
    overlay_view: Option<OverlayView>,
}

impl DisplayProvider {
    pub fn new(settings: &ProviderSettings) -> Self {
        let mirror = MirrorMode::from(settings.mirror_view_mode);
        Self {
            configured_mirror: mirror,
            requested_mirror: mirror,
            mirror: MirrorNegotiator::new(mirror),
            layout: MirrorLayout::new((0, 0)),
            api: None,
            single_pass: settings.is_single_pass(),
            overlay_app: settings.is_overlay(),
            srgb: true,
            texture_bounds: Rect::FULL,
            textures: [[None; 2]; FRAME_STAGES],
            native: [[None; 2]; FRAME_STAGES],
            textures_created: false,
            occlusion: [None; 2],
            cur_frame: 0,
            frame_in_flight: false,
            stats: FrameStats::default(),
            overlay: None,
            overlay_view: None,
        }
    }

    pub fn mirror(&self) -> &MirrorNegotiator {
        &self.mirror
    }

    pub fn mirror_layout(&self) -> &MirrorLayout {
        &self.layout
    }

    /// Ask for a different preview mode; applied on the next frame.
    pub fn request_mirror_mode(&mut self, mode: MirrorMode) {
        self.requested_mirror = mode;
    }

    pub fn texture_api(&self) -> Option<TextureApi> {
        self.api
    }

    pub fn is_single_pass(&self) -> bool {
        self.single_pass
    }

    pub fn current_frame(&self) -> u32 {
        self.cur_frame
    }

    pub fn is_frame_in_flight(&self) -> bool {
        self.frame_in_flight
    }

    pub fn textures_created(&self) -> bool {
        self.textures_created
    }

    pub fn occlusion_mesh(&self, eye: Eye) -> Option<OcclusionMeshId> {
        self.occlusion[eye.index()]
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    pub fn start<R: VrRuntime + ?Sized>(&mut self, runtime: &R) -> Result<()> {
        self.requested_mirror = self.configured_mirror;
        self.mirror.reset(self.configured_mirror);
        self.layout = MirrorLayout::new(runtime.recommended_render_target_size());
        info!(mirror = ?self.configured_mirror, "display provider started");
        Ok(())
    }

    pub fn gfx_start<R, H>(
        &mut self,
        runtime: &R,
        host: &mut H,
        settings: &ProviderSettings,
    ) -> Result<RenderingCaps>
    where
        R: VrRuntime + ?Sized,
        H: DisplayHost + ?Sized,
    {
        let renderer = host.renderer();
        let api = renderer.texture_api().ok_or_else(|| {
            Error::unsupported(format!(
                "graphics renderer {:?}; only Direct3D 11, Vulkan and OpenGL are supported",
                renderer
            ))
        })?;
        self.api = Some(api);
        self.single_pass = settings.is_single_pass();
        self.overlay_app = settings.is_overlay();

        for eye in Eye::BOTH {
            self.occlusion[eye.index()] = create_occlusion_mesh(runtime, host, eye);
        }

        info!(?renderer, ?api, single_pass = self.single_pass, "display graphics thread started");
        Ok(RenderingCaps {
            no_single_pass_rendering_support: false,
            invalidate_render_state_after_each_callback: true,
        })
    }

    pub fn populate_next_frame<R, H>(
        &mut self,
        runtime: &mut R,
        host: &mut H,
        hints: &FrameHints,
    ) -> Result<NextFrameDesc>
    where
        R: VrRuntime + ?Sized,
        H: DisplayHost + ?Sized,
    {
        self.srgb = hints.srgb;
        self.update_mirror(runtime, host);

        if hints.changed.contains(FrameHintChanges::RENDER_VIEWPORT) {
            self.texture_bounds = hints.render_viewport;
            let full_view = self.mirror.shared_texture().is_some();
            self.layout.apply_viewport(
                hints.render_viewport,
                runtime.recommended_render_target_size(),
                full_view,
            );
            debug!(viewport = ?hints.render_viewport, "render viewport changed");
        }

        let mut recreate = hints.changed.contains(FrameHintChanges::TEXTURE_RESOLUTION_SCALE);
        if hints.changed.contains(FrameHintChanges::SINGLE_PASS)
            && hints.single_pass != self.single_pass
        {
            self.single_pass = hints.single_pass;
            recreate = true;
        }
        if recreate {
            self.destroy_eye_textures(host);
        }
        if !self.textures_created {
            self.create_eye_textures(&*runtime, host, hints)?;
        }

        let mut frame = NextFrameDesc::default();
        let culling_views: &[EyeView] = if self.single_pass {
            &[EyeView::Center]
        } else {
            &[EyeView::Left, EyeView::Right]
        };
        for &view in culling_views {
            let pass = culling_pass(&*runtime, view, hints.near, hints.far);
            frame.culling_passes.push(CullingPassDesc {
                view,
                pose: pass.pose,
                projection: pass.projection,
                separation: pass.separation,
            });
        }

        let stage = self.stage();
        if self.single_pass {
            let params = Eye::BOTH
                .iter()
                .map(|&eye| self.render_params(&*runtime, eye, hints, eye.index() as u32))
                .collect();
            frame.render_passes.push(RenderPass {
                texture: self.texture(stage, 0)?,
                culling_pass_index: 0,
                params,
            });
        } else {
            for eye in Eye::BOTH {
                frame.render_passes.push(RenderPass {
                    texture: self.texture(stage, eye.index())?,
                    culling_pass_index: eye.index(),
                    params: vec![self.render_params(&*runtime, eye, hints, 0)],
                });
            }
        }

        self.frame_in_flight = true;
        self.update_stats(&*runtime);
        Ok(frame)
    }

    pub fn submit_current_frame<R, H>(&mut self, runtime: &mut R, host: &mut H) -> Result<()>
    where
        R: VrRuntime + ?Sized,
        H: DisplayHost + ?Sized,
    {
        if !self.frame_in_flight {
            return Ok(());
        }

        let stage = self.stage();
        self.cur_frame = self.cur_frame.wrapping_add(1);

        for eye in Eye::BOTH {
            if let Err(e) = self.submit_eye(runtime, host, eye, stage) {
                warn!(?eye, stage, "eye texture not submitted: {}", e);
            }
        }
        runtime.post_present_handoff();

        // The runtime only sizes the headset view once a frame has arrived.
        if self.mirror.wants_headset_resolution() {
            let wanted = (HEADSET_VIEW_MAX_WIDTH, HEADSET_VIEW_MAX_HEIGHT);
            if runtime.headset_view_size() != wanted {
                runtime.set_headset_view_size(wanted.0, wanted.1);
                runtime.set_headset_view_cropped(true);
                info!(width = wanted.0, height = wanted.1, "headset view resized for mirror");
            }
            self.mirror.mark_headset_resolution_set();
        }
        Ok(())
    }

    pub fn update_display_state<R: VrRuntime + ?Sized>(&self, runtime: &R) -> DisplayState {
        let reprojecting = runtime
            .frame_timing()
            .map_or(false, |timing| timing.num_frame_presents > 1);
        DisplayState {
            reprojection: if reprojecting {
                ReprojectionMode::PositionAndOrientation
            } else {
                ReprojectionMode::None
            },
            display_is_transparent: false,
            focus_lost: runtime.should_application_pause() && !runtime.can_render_scene(),
        }
    }

    /// Describe how to draw the preview into a `dest_size` target.
    pub fn query_mirror_blit<R, H>(
        &mut self,
        runtime: &mut R,
        host: &mut H,
        dest_size: (u32, u32),
    ) -> Result<BlitParams>
    where
        R: VrRuntime + ?Sized,
        H: DisplayHost + ?Sized,
    {
        self.update_mirror(runtime, host);

        let stage = self.stage();
        let mode = self.mirror.mode();
        let (texture, array_slice, subrect, aspect) = match self.mirror.shared_texture() {
            Some(shared) => {
                self.refresh_overlay_view(runtime, host)?;
                let aspect = HEADSET_VIEW_MAX_WIDTH as f32 / HEADSET_VIEW_MAX_HEIGHT as f32;
                (shared, 0, Rect::FULL, aspect)
            }
            None => {
                let (index, slice) = match (mode, self.single_pass) {
                    (MirrorMode::RightEye, true) => (0, 1),
                    (MirrorMode::RightEye, false) => (1, 0),
                    _ => (0, 0),
                };
                (
                    self.texture(stage, index)?,
                    slice,
                    self.layout.subrect(),
                    self.layout.source_aspect(),
                )
            }
        };

        let dest = if mode == MirrorMode::None {
            Rect::ZERO
        } else {
            Rect::FULL
        };
        let (source, dest) = fit_blit(subrect, aspect, dest_size, dest);
        Ok(BlitParams {
            texture,
            array_slice,
            source,
            dest,
        })
    }

    pub fn gfx_stop<H: DisplayHost + ?Sized>(&mut self, host: &mut H) {
        self.cur_frame = 0;
        for slot in self.occlusion.iter_mut() {
            if let Some(id) = slot.take() {
                host.destroy_occlusion_mesh(id);
            }
        }
    }

    pub fn stop(&mut self) {
        self.frame_in_flight = false;
    }

    /// Release everything. Safe to call any number of times.
    pub fn shutdown<R, H>(&mut self, runtime: &mut R, host: &mut H)
    where
        R: VrRuntime + ?Sized,
        H: DisplayHost + ?Sized,
    {
        if let Some(view) = self.overlay_view.take() {
            runtime.release_overlay_view(&view);
        }
        if let SharedMirror::Active { texture } = self.mirror.shared() {
            host.destroy_texture(texture);
        }
        self.destroy_eye_textures(host);
        self.gfx_stop(host);
        self.overlay = None;
        self.frame_in_flight = false;
        self.requested_mirror = self.configured_mirror;
        self.mirror.reset(self.configured_mirror);
    }

    fn stage(&self) -> usize {
        self.cur_frame as usize % FRAME_STAGES
    }

    fn texture(&self, stage: usize, index: usize) -> Result<RenderTextureId> {
        self.textures[stage][index].ok_or_else(|| {
            Error::internal(format!("no eye texture for stage {} index {}", stage, index))
        })
    }

    fn render_params<R: VrRuntime + ?Sized>(
        &self,
        runtime: &R,
        eye: Eye,
        hints: &FrameHints,
        texture_array_slice: u32,
    ) -> RenderParams {
        let view = EyeView::from(eye);
        RenderParams {
            pose: eye_pose(runtime, view),
            projection: projection(runtime, view, hints.near, hints.far),
            viewport: Rect::FULL,
            texture_array_slice,
            occlusion_mesh: self.occlusion[eye.index()],
        }
    }

    fn update_mirror<R, H>(&mut self, runtime: &mut R, host: &mut H) -> MirrorEvent
    where
        R: VrRuntime + ?Sized,
        H: DisplayHost + ?Sized,
    {
        let env = MirrorEnvironment {
            srgb: self.srgb,
            api: self.api,
        };
        let mut source = SharedMirrorAcquirer {
            runtime: &mut *runtime,
            host,
            overlay: &mut self.overlay,
            view: &mut self.overlay_view,
            srgb: self.srgb,
        };
        let event = self.mirror.update(self.requested_mirror, env, &mut source);
        if event != MirrorEvent::Unchanged {
            let full_view = self.mirror.shared_texture().is_some();
            self.layout
                .configure(runtime.recommended_render_target_size(), full_view);
        }
        event
    }

    fn refresh_overlay_view<R, H>(&mut self, runtime: &mut R, host: &mut H) -> Result<()>
    where
        R: VrRuntime + ?Sized,
        H: DisplayHost + ?Sized,
    {
        let overlay = self
            .overlay
            .ok_or_else(|| Error::internal("shared mirror active without an overlay"))?;
        let device = host
            .native_device()
            .ok_or_else(|| Error::host("renderer exposes no native device"))?;
        let view = runtime
            .acquire_overlay_view(overlay, device)
            .map_err(|e| Error::runtime(format!("headset view overlay unavailable this frame: {}", e)))?;
        if let Some(previous) = self.overlay_view.replace(view) {
            runtime.release_overlay_view(&previous);
        }
        Ok(())
    }

    fn create_eye_textures<R, H>(
        &mut self,
        runtime: &R,
        host: &mut H,
        hints: &FrameHints,
    ) -> Result<()>
    where
        R: VrRuntime + ?Sized,
        H: DisplayHost + ?Sized,
    {
        let scale = hints.texture_resolution_scale;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::invalid_argument(format!("texture resolution scale {}", scale)));
        }
        let (width, height) = runtime.recommended_render_target_size();
        let desc = RenderTextureDesc {
            width: (width as f32 * scale) as u32,
            height: (height as f32 * scale) as u32,
            array_length: if self.single_pass { 2 } else { 1 },
            srgb: self.srgb,
            color: TextureSource::HostAllocated,
            depth: TextureSource::HostAllocated,
        };

        for stage in 0..FRAME_STAGES {
            for eye in 0..2 {
                self.textures[stage][eye] = Some(host.create_texture(&desc)?);
                self.native[stage][eye] = None;
            }
        }
        self.textures_created = true;
        info!(
            width = desc.width,
            height = desc.height,
            layers = desc.array_length,
            "eye textures created"
        );
        Ok(())
    }

    fn destroy_eye_textures<H: DisplayHost + ?Sized>(&mut self, host: &mut H) {
        for stage in 0..FRAME_STAGES {
            for eye in 0..2 {
                if let Some(id) = self.textures[stage][eye].take() {
                    host.destroy_texture(id);
                }
                self.native[stage][eye] = None;
            }
        }
        self.textures_created = false;
    }

    fn native_texture<H: DisplayHost + ?Sized>(
        &mut self,
        host: &mut H,
        stage: usize,
        index: usize,
    ) -> Result<NativeTexture> {
        if let Some(native) = self.native[stage][index] {
            return Ok(native);
        }
        let native = host.query_native_texture(self.texture(stage, index)?)?;
        debug!(stage, index, color = native.color, "native eye texture resolved");
        self.native[stage][index] = Some(native);
        Ok(native)
    }

    fn submit_eye<R, H>(
        &mut self,
        runtime: &mut R,
        host: &mut H,
        eye: Eye,
        stage: usize,
    ) -> Result<()>
    where
        R: VrRuntime + ?Sized,
        H: DisplayHost + ?Sized,
    {
        let api = self
            .api
            .ok_or_else(|| Error::internal("graphics thread not started"))?;
        let index = if self.single_pass { 0 } else { eye.index() };
        let native = self.native_texture(host, stage, index)?;
        if self.overlay_app {
            return Ok(());
        }
        let texture = SubmitTexture {
            native: native.color,
            depth: native.depth,
            api,
            slice: self.single_pass.then_some(eye.index() as u32),
            bounds: self.texture_bounds.to_bounds(),
        };
        runtime.submit(eye, &texture).map_err(Error::runtime)
    }

    fn update_stats<R: VrRuntime + ?Sized>(&mut self, runtime: &R) {
        let Some(timing) = runtime.frame_timing() else {
            return;
        };
        self.stats = FrameStats {
            dropped_frames: timing.num_dropped_frames,
            frame_presents: timing.num_frame_presents,
            frame_time_reference_secs: timing.system_time_seconds,
            gpu_render_ms: timing.total_render_gpu_ms,
            cpu_render_ms: timing.compositor_render_cpu_ms,
            cpu_idle_ms: timing.compositor_idle_cpu_ms,
            compositor_render_ms: timing.compositor_render_gpu_ms,
            refresh_rate: runtime
                .float_property(HMD_DEVICE_INDEX, FloatProperty::DisplayFrequency)
                .unwrap_or(0.0),
        };
    }
}

fn create_occlusion_mesh<R, H>(runtime: &R, host: &mut H, eye: Eye) -> Option<OcclusionMeshId>
where
    R: VrRuntime + ?Sized,
    H: DisplayHost + ?Sized,
{
    let Some(mesh) = runtime.hidden_area_mesh(eye).and_then(|m| from_hidden_area(&m)) else {
        debug!(?eye, "no hidden area mesh for this headset");
        return None;
    };
    match host.create_occlusion_mesh(&mesh) {
        Ok(id) => {
            debug!(
                ?eye,
                vertices = mesh.vertices.len(),
                triangles = mesh.triangle_count(),
                "occlusion mesh created"
            );
            Some(id)
        }
        Err(e) => {
            warn!(?eye, "occlusion mesh rejected by host: {}", e);
            None
        }
    }
}

/// Opens the runtime's headset view on the host device for one attempt.
struct SharedMirrorAcquirer<'a, R: ?Sized, H: ?Sized> {
    runtime: &'a mut R,
    host: &'a mut H,
    overlay: &'a mut Option<OverlayHandle>,
    view: &'a mut Option<OverlayView>,
    srgb: bool,
}

impl<R, H> SharedMirrorAcquirer<'_, R, H>
where
    R: VrMirrorSource + ?Sized,
    H: DisplayHost + ?Sized,
{
    fn open(
        &mut self,
        view: &OverlayView,
        device: NativeDevice,
    ) -> std::result::Result<RenderTextureId, MirrorFailure> {
        if view.device != device {
            return Err(MirrorFailure::DeviceMismatch);
        }
        if view.shared_handle == 0 {
            return Err(MirrorFailure::Open("runtime returned a null shared handle".to_string()));
        }
        let shared = self
            .host
            .open_shared_texture(view.shared_handle)
            .map_err(|e| MirrorFailure::Open(e.to_string()))?;
        if shared.width != HEADSET_VIEW_MAX_WIDTH {
            return Err(MirrorFailure::Resolution {
                expected_width: HEADSET_VIEW_MAX_WIDTH,
                actual_width: shared.width,
                actual_height: shared.height,
            });
        }
        self.host
            .create_texture(&RenderTextureDesc {
                width: shared.width,
                height: shared.height,
                array_length: 1,
                srgb: self.srgb,
                color: TextureSource::Native(shared.native),
                depth: TextureSource::None,
            })
            .map_err(|e| MirrorFailure::Open(e.to_string()))
    }
}

impl<R, H> SharedTextureSource for SharedMirrorAcquirer<'_, R, H>
where
    R: VrMirrorSource + ?Sized,
    H: DisplayHost + ?Sized,
{
    fn acquire_shared_texture(&mut self) -> std::result::Result<RenderTextureId, MirrorFailure> {
        let overlay = match *self.overlay {
            Some(overlay) => overlay,
            None => {
                let overlay = self
                    .runtime
                    .find_mirror_overlay()
                    .map_err(|e| MirrorFailure::Overlay(e.to_string()))?;
                *self.overlay = Some(overlay);
                overlay
            }
        };
        let device = self
            .host
            .native_device()
            .ok_or_else(|| MirrorFailure::Overlay("renderer exposes no native device".to_string()))?;
        let view = self
            .runtime
            .acquire_overlay_view(overlay, device)
            .map_err(|e| MirrorFailure::Overlay(e.to_string()))?;

        match self.open(&view, device) {
            Ok(texture) => {
                if let Some(previous) = self.view.replace(view) {
                    self.runtime.release_overlay_view(&previous);
                }
                Ok(texture)
            }
            Err(failure) => {
                self.runtime.release_overlay_view(&view);
                Err(failure)
            }
        }
    }
}
