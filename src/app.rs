//! Application state holding the wgpu context and the per-tick pipeline
//!
//! Bootstraps the video source and tracking session, wires resize
//! handling, and registers the fixed callback pipeline on the frame
//! scheduler: tracking update, visibility sync, animation, render.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::config::StageConfig;
use crate::render::SceneRenderer;
use crate::scheduler::FrameScheduler;
use crate::source::{capture_resolution, CameraSource, VideoSource};
use crate::stage::Stage;
use crate::tracking::TrackingSession;

/// Delay before the one-shot forced resize after the source becomes ready.
/// Workaround for sources that settle on their final dimensions late; the
/// root cause is undocumented upstream. Do not remove without retesting
/// against a slow-starting webcam.
const FORCED_RESIZE_DELAY: Duration = Duration::from_secs(2);

/// Everything the frame callbacks touch, passed to the scheduler as one
/// explicit context.
struct FrameContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    renderer: SceneRenderer,
    stage: Stage,
    /// Target view for the current tick, set before the tick and consumed
    /// by the render callback.
    frame_target: Option<wgpu::TextureView>,
}

/// Main application state
pub struct App {
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,

    config: StageConfig,
    scheduler: FrameScheduler<FrameContext>,
    ctx: FrameContext,

    /// Set once the tracking session init has been attempted.
    tracking_attempted: bool,
    /// Pending one-shot forced resize (see `FORCED_RESIZE_DELAY`).
    forced_resize_at: Option<Instant>,
}

impl App {
    /// Create a new App with an initialized wgpu context and a camera
    /// source requested at the orientation-appropriate resolution.
    pub async fn new(window: Arc<Window>, config: StageConfig) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to find suitable GPU adapter");

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Marker Stage Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .expect("Failed to create device");

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &surface_config);

        let mut renderer = SceneRenderer::new(&device, surface_format);
        renderer.ensure_depth(&device, surface_config.width, surface_config.height);

        // Capture resolution follows the current viewport orientation.
        let (capture_width, capture_height) = capture_resolution(size.width, size.height);
        let source: Option<Box<dyn VideoSource>> =
            match CameraSource::new(config.camera_index, capture_width, capture_height) {
                Ok(source) => Some(Box::new(source)),
                Err(e) => {
                    log::error!("{e}");
                    None
                }
            };

        let mut scheduler = FrameScheduler::new();
        Self::register_callbacks(&mut scheduler);

        Self {
            surface,
            surface_config,
            size,
            config,
            scheduler,
            ctx: FrameContext {
                device,
                queue,
                renderer,
                stage: Stage::new(source),
                frame_target: None,
            },
            tracking_attempted: false,
            forced_resize_at: None,
        }
    }

    /// Register the fixed per-tick pipeline. Render must stay last;
    /// tracking update must precede anything reading pose or visibility.
    fn register_callbacks(scheduler: &mut FrameScheduler<FrameContext>) {
        scheduler.register("tracking-update", |ctx, _tick| {
            ctx.stage.update_tracking()?;
            Ok(())
        });
        scheduler.register("visibility-sync", |ctx, _tick| {
            ctx.stage.sync_visibility();
            Ok(())
        });
        scheduler.register("animation", |ctx, tick| {
            ctx.stage.advance_animation(tick.delta_seconds);
            Ok(())
        });
        scheduler.register("render", |ctx, _tick| {
            let Some(target) = ctx.frame_target.take() else {
                return Ok(());
            };
            if let Some(source) = &ctx.stage.source {
                if let Some(frame) = source.latest_frame() {
                    ctx.renderer
                        .upload_camera_frame(&ctx.device, &ctx.queue, &frame);
                }
            }
            ctx.renderer
                .render(&ctx.device, &ctx.queue, &target, &ctx.stage.scene);
            Ok(())
        });
    }

    /// Initialize the tracking session once the source has produced its
    /// first decodable frame. The render loop never waits on this.
    fn bootstrap(&mut self, now: Instant) {
        if self.tracking_attempted {
            return;
        }
        let Some(source) = &self.ctx.stage.source else {
            return;
        };
        let Some((width, height)) = source.dimensions() else {
            return;
        };

        self.tracking_attempted = true;
        self.forced_resize_at = Some(now + FORCED_RESIZE_DELAY);

        match TrackingSession::init(&self.config, width, height) {
            Ok(session) => {
                self.ctx.stage.scene.projection = session.projection_matrix();
                self.ctx.stage.session = Some(session);
                log::info!("Tracking session initialized");
            }
            Err(e) => {
                // The loop keeps running with tracking disabled.
                log::error!("{e}");
            }
        }
    }

    /// Window resize handler. Updates the render surface always; the
    /// tracker's processing size only once a session exists.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.surface_config.width = new_size.width;
        self.surface_config.height = new_size.height;
        self.surface.configure(&self.ctx.device, &self.surface_config);
        self.ctx
            .renderer
            .ensure_depth(&self.ctx.device, new_size.width, new_size.height);

        self.ctx.stage.sync_processing_size();
    }

    /// Run one tick: bootstrap polling, the delayed forced resize, then
    /// the full callback pipeline against the acquired surface frame.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        self.bootstrap(now);

        if let Some(at) = self.forced_resize_at {
            if now >= at {
                self.forced_resize_at = None;
                log::debug!("Running delayed forced resize");
                self.resize(self.size);
            }
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                self.surface.configure(&self.ctx.device, &self.surface_config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface frame timeout");
                return Ok(());
            }
            Err(e) => return Err(anyhow::anyhow!("surface error: {e:?}")),
        };

        self.ctx.frame_target = Some(
            frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        );
        let result = self.scheduler.tick(now, &mut self.ctx);
        self.ctx.frame_target = None;
        result?;

        frame.present();
        Ok(())
    }
}
