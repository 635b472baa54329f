//! Slice viewer: load OBJ + intensity + colormap on a worker thread, generate the distance-field
//! slice once, then composite it on a fullscreen quad every redraw.
//! Run from the asset directory: cargo run -p viewer --bin sdf_viewer
//! Reads sdfview.json from the working directory when present.

use std::path::PathBuf;
use std::time::Instant;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use sdfview_api::{FrameView, RenderBackendWindow, RenderParams, SceneAssets, SceneConfig};
use sdfview_bridge::{backbuffer_size, SdfViewWindowBackend};
use sdfview_renderer::RendererConfig;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

/// Delivered once by the loader thread.
enum AppEvent {
    AssetsLoaded(Result<SceneAssets, String>),
}

struct App {
    config: SceneConfig,
    proxy: EventLoopProxy<AppEvent>,
    window: Option<Window>,
    backend: Option<Box<dyn RenderBackendWindow>>,
    params: RenderParams,
    /// Back-buffer size in pixels, DPR capped.
    size: (u32, u32),
    load_started: Option<Instant>,
}

impl App {
    fn new(config: SceneConfig, proxy: EventLoopProxy<AppEvent>) -> Self {
        let params = config.render_params();
        Self {
            config,
            proxy,
            window: None,
            backend: None,
            params,
            size: (800, 600),
            load_started: None,
        }
    }

    fn update_size(&mut self) {
        let Some(window) = &self.window else { return };
        let phys = window.inner_size();
        self.size = backbuffer_size((phys.width, phys.height), window.scale_factor(), self.config.max_pixel_ratio);
        self.params.set_viewport(phys.width, phys.height);
        log::debug!(
            "resize: physical {}x{}, back buffer {}x{}, aspect {:.4}",
            phys.width,
            phys.height,
            self.size.0,
            self.size.1,
            self.params.screen_aspect
        );
    }

    fn spawn_loader(&mut self) {
        let config = self.config.clone();
        let proxy = self.proxy.clone();
        self.load_started = Some(Instant::now());
        std::thread::spawn(move || {
            let result = sdfview_tools::load_scene_assets(&config).map_err(|e| e.to_string());
            if proxy.send_event(AppEvent::AssetsLoaded(result)).is_err() {
                log::warn!("event loop closed before assets finished loading");
            }
        });
    }

    fn on_assets_loaded(&mut self, event_loop: &ActiveEventLoop, assets: SceneAssets) {
        let Some(window) = &self.window else { return };
        if let Some(started) = self.load_started {
            log::info!(
                "assets loaded in {:?}: {} vertices, {} triangles, intensity {}x{}",
                started.elapsed(),
                assets.mesh.vertex_count(),
                assets.mesh.triangle_count(),
                assets.intensity.width,
                assets.intensity.height
            );
        }
        let mut backend = match SdfViewWindowBackend::from_window(window, RendererConfig::from_scene(&self.config)) {
            Ok(backend) => backend,
            Err(e) => {
                log::error!("SdfViewWindowBackend::from_window failed: {}", e);
                event_loop.exit();
                return;
            }
        };
        if let Err(e) = backend.prepare(&assets) {
            log::error!("scene preparation failed: {}", e);
            event_loop.exit();
            return;
        }
        self.backend = Some(backend);
        window.request_redraw();
    }

    fn redraw(&mut self) {
        let (Some(window), Some(backend)) = (&self.window, &mut self.backend) else { return };
        let (raw_window, raw_display) = match (window.window_handle(), window.display_handle()) {
            (Ok(wh), Ok(dh)) => (wh.as_raw(), dh.as_raw()),
            _ => return,
        };
        let view = FrameView {
            viewport_size: self.size,
            params: self.params,
        };
        window.pre_present_notify();
        if let Err(e) = backend.render_frame_to_window(&view, raw_window, raw_display) {
            log::warn!("frame failed: {}", e);
        }
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("sdfview")
            .with_inner_size(winit::dpi::LogicalSize::new(self.config.volume.w, self.config.volume.h));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => w,
            Err(e) => {
                log::error!("create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window);
        self.update_size();
        self.spawn_loader();
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::AssetsLoaded(Ok(assets)) => self.on_assets_loaded(event_loop, assets),
            AppEvent::AssetsLoaded(Err(e)) => {
                log::error!("asset load failed: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.update_size();
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let base: PathBuf = std::env::current_dir().map_err(|e| e.to_string())?;
    let config = SceneConfig::load_or_default(&base).map_err(|e| e.to_string())?;
    log::info!(
        "mesh {}, intensity {}, colormap {}, view mode {:?}",
        config.mesh_file().display(),
        config.intensity_file().display(),
        config.colormap_file().display(),
        config.view_mode
    );

    let event_loop = EventLoop::<AppEvent>::with_user_event().build().map_err(|e| e.to_string())?;
    let mut app = App::new(config, event_loop.create_proxy());
    event_loop.run_app(&mut app).map_err(|e| e.to_string())?;
    Ok(())
}
