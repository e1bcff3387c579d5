//! vrbridge CLI tools: inspect what the provider would hand the host engine.

#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use vrbridge_common::{InitializationType, MirrorViewMode, ProviderSettings, StereoRenderingMode};
use vrbridge_display::{culling_pass, eye, occlusion, EyeView, FrameHints};
use vrbridge_input::{Feature, UpdateType};
use vrbridge_math::Quaternion;
use vrbridge_provider::{HeadlessHost, ProviderContext, XrProvider};
use vrbridge_vr::{Eye, SimulatedRuntime, VrSystem};

#[derive(Parser, Debug)]
#[command(name = "vrbridge")]
#[command(about = "vrbridge CLI tools")]
struct Args {
    /// Provider settings file (JSON, or a serialized settings asset)
    #[arg(short, long, global = true, env = "VRBRIDGE_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print host-space eye poses, projections and culling frusta
    Projection {
        #[arg(long, default_value_t = 0.01)]
        near: f32,
        #[arg(long, default_value_t = 1000.0)]
        far: f32,
    },

    /// Print the occlusion mesh built from each eye's hidden area
    Occlusion {
        /// Include every vertex and index
        #[arg(long)]
        full: bool,
    },

    /// Run a provider session against the simulated headset
    Session {
        #[arg(short, long, default_value_t = 90)]
        frames: u32,

        /// Mirror view index: 0 none, 1 left eye, 2 right eye, 3 runtime view
        #[arg(short, long)]
        mirror: Option<u16>,

        /// Render both eyes in one instanced pass
        #[arg(long)]
        single_pass: bool,

        /// Register as an overlay application
        #[arg(long)]
        overlay: bool,

        /// Make the runtime refuse this many mirror overlay acquisitions
        #[arg(long, default_value_t = 0)]
        overlay_failures: u32,

        /// Turn the simulated headset about the vertical axis, in degrees
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        head_yaw: f32,
    },

    /// Show effective settings and the runtime startup info
    Settings,

    /// Show version information
    Version,
}

fn load_settings(path: Option<&PathBuf>) -> Result<ProviderSettings> {
    match path {
        Some(path) => ProviderSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(ProviderSettings::default()),
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn projection(near: f32, far: f32) -> Result<()> {
    let rt = SimulatedRuntime::new();
    let views = [EyeView::Left, EyeView::Right, EyeView::Center]
        .into_iter()
        .map(|view| {
            json!({
                "view": view,
                "pose": eye::eye_pose(&rt, view),
                "projection": eye::projection(&rt, view, near, far),
                "culling": culling_pass(&rt, view, near, far),
            })
        })
        .collect::<Vec<_>>();
    print_json(&json!({
        "separation": eye::eye_separation(&rt),
        "views": views,
    }))
}

fn occlusion_dump(full: bool) -> Result<()> {
    let rt = SimulatedRuntime::new();
    let mut eyes = Vec::new();
    for side in Eye::BOTH {
        let Some(hidden) = rt.hidden_area_mesh(side) else {
            eyes.push(json!({ "eye": format!("{side:?}"), "mesh": null }));
            continue;
        };
        let mesh = occlusion::from_hidden_area(&hidden);
        let mut entry = json!({
            "eye": format!("{side:?}"),
            "input_vertices": hidden.vertices.len(),
            "triangles": hidden.triangle_count,
            "unique_vertices": mesh.as_ref().map(|m| m.vertices.len()),
        });
        if let (true, Some(mesh)) = (full, &mesh) {
            entry["vertices"] = json!(mesh
                .vertices
                .iter()
                .map(|v| [v.x, v.y])
                .collect::<Vec<_>>());
            entry["indices"] = json!(mesh.indices);
        }
        eyes.push(entry);
    }
    print_json(&json!({ "eyes": eyes }))
}

struct SessionOptions {
    frames: u32,
    mirror: Option<u16>,
    single_pass: bool,
    overlay: bool,
    overlay_failures: u32,
    head_yaw: f32,
}

fn session(mut settings: ProviderSettings, opts: SessionOptions) -> Result<()> {
    if let Some(index) = opts.mirror {
        settings.mirror_view_mode = MirrorViewMode::from_index(index);
    }
    if opts.single_pass {
        settings.stereo_rendering_mode = StereoRenderingMode::SinglePassInstanced;
    }
    if opts.overlay {
        settings.initialization_type = InitializationType::Overlay;
    }

    let mut rt = SimulatedRuntime::new();
    rt.overlay_acquire_failures = opts.overlay_failures;
    if let Some(hmd) = rt.devices.first_mut() {
        let yaw = Quaternion::from_yaw_pitch_roll(opts.head_yaw.to_radians(), 0.0, 0.0);
        hmd.pose.device_to_absolute.set_rotation(yaw);
    }
    let mut ctx = ProviderContext::new(rt, HeadlessHost::default(), settings);
    ctx.initialize()?;
    ctx.start()?;
    let caps = ctx.gfx_start()?;
    info!(?caps, frames = opts.frames, "session started");

    let hints = FrameHints::default();
    let mut last_blit = None;
    for _ in 0..opts.frames {
        ctx.run_frame(&hints)?;
        ctx.input_tick(UpdateType::BeforeRender)?;
        last_blit = match ctx.query_mirror_blit((1920, 1080)) {
            Ok(blit) => Some(blit),
            Err(e) => {
                warn!("no mirror blit: {}", e);
                None
            }
        };
    }

    let devices = ctx
        .input()
        .registry()
        .devices()
        .iter()
        .map(|d| d.id)
        .collect::<Vec<_>>();
    let definitions = devices
        .iter()
        .map(|&id| match ctx.device_definition(id) {
            Ok(d) => json!({ "id": id, "name": d.name, "controller_type": d.controller_type }),
            Err(e) => {
                warn!(device = id, error = %e, "device definition unavailable");
                json!({ "id": id, "error": e.to_string() })
            }
        })
        .collect::<Vec<_>>();
    let head = ctx
        .device_state(0, UpdateType::Dynamic)?
        .rotation(Feature::DeviceRotation)
        .map(|q| {
            let (yaw, pitch, roll) = q.to_yaw_pitch_roll();
            json!({
                "yaw": yaw.to_degrees(),
                "pitch": pitch.to_degrees(),
                "roll": roll.to_degrees(),
            })
        });
    let display_state = ctx.update_display_state()?;

    let mirror = ctx.display().mirror();
    let summary = json!({
        "frames": ctx.display().current_frame(),
        "presents": ctx.runtime().presents,
        "submissions": ctx.runtime().submissions.len(),
        "single_pass": ctx.display().is_single_pass(),
        "mirror": {
            "mode": mirror.mode(),
            "fallen_back": mirror.is_fallen_back(),
            "attempts": mirror.attempts(),
            "shared_texture": mirror.shared_texture(),
            "blit": last_blit.map(|b| json!({
                "texture": b.texture,
                "array_slice": b.array_slice,
                "source": [b.source.x, b.source.y, b.source.width, b.source.height],
                "dest": [b.dest.x, b.dest.y, b.dest.width, b.dest.height],
            })),
        },
        "devices": definitions,
        "head_orientation": head,
        "host_events": ctx.host().events(),
        "focus_lost": display_state.focus_lost,
    });

    ctx.shutdown();
    print_json(&summary)
}

fn main() -> Result<()> {
    vrbridge_common::init_tracing();

    let args = Args::parse();
    let settings = load_settings(args.settings.as_ref())?;

    match args.command {
        Command::Projection { near, far } => projection(near, far)?,
        Command::Occlusion { full } => occlusion_dump(full)?,
        Command::Session {
            frames,
            mirror,
            single_pass,
            overlay,
            overlay_failures,
            head_yaw,
        } => session(
            settings,
            SessionOptions {
                frames,
                mirror,
                single_pass,
                overlay,
                overlay_failures,
                head_yaw,
            },
        )?,
        Command::Settings => {
            print_json(&json!({
                "settings": settings,
                "startup_info": settings.startup_info()?,
            }))?;
        }
        Command::Version => {
            println!("vrbridge {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
