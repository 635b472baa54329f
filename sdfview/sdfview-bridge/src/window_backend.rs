//! Window-capable backend: created from a window, implements RenderBackendWindow.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use sdfview_api::{FrameView, RenderBackend, RenderBackendWindow, SceneAssets};
use sdfview_renderer::RendererConfig;
use wgpu::SurfaceTargetUnsafe;

use crate::plugin::SdfViewPlugin;

/// Back-buffer size for a window of `physical` pixels at `scale_factor`,
/// with the pixel ratio capped at `max_pixel_ratio`. Never returns a zero dimension.
pub fn backbuffer_size(physical: (u32, u32), scale_factor: f64, max_pixel_ratio: f64) -> (u32, u32) {
    if !(scale_factor > 0.0) {
        return (physical.0.max(1), physical.1.max(1));
    }
    let ratio = scale_factor.min(max_pixel_ratio);
    let scale = |px: u32| ((px as f64 / scale_factor * ratio).round() as u32).max(1);
    (scale(physical.0), scale(physical.1))
}

/// Owns the wgpu Instance and an SdfViewPlugin; presents to a window.
/// The surface is recreated each frame from the raw handles the host passes in,
/// so its lifetime never outlives the window.
pub struct SdfViewWindowBackend {
    instance: wgpu::Instance,
    plugin: SdfViewPlugin,
    surface_format: wgpu::TextureFormat,
}

impl SdfViewWindowBackend {
    /// Create from a window (e.g. winit). The window is used for raw handles and an initial
    /// surface for adapter selection; the host must keep it alive.
    pub fn from_window(
        window: &(impl HasWindowHandle + HasDisplayHandle),
        config: RendererConfig,
    ) -> Result<Box<dyn RenderBackendWindow>, String> {
        let (raw_window, raw_display) = {
            let wh = window.window_handle().map_err(|e| e.to_string())?;
            let dh = window.display_handle().map_err(|e| e.to_string())?;
            (wh.as_raw(), dh.as_raw())
        };
        let backend = pollster::block_on(Self::from_raw_handles_async(raw_window, raw_display, config))?;
        Ok(Box::new(backend))
    }

    async fn from_raw_handles_async(
        raw_window_handle: RawWindowHandle,
        raw_display_handle: RawDisplayHandle,
        config: RendererConfig,
    ) -> Result<Self, String> {
        let instance = wgpu::Instance::default();
        let target = SurfaceTargetUnsafe::RawHandle {
            raw_window_handle,
            raw_display_handle,
        };
        let surface = unsafe { instance.create_surface_unsafe(target).map_err(|e| e.to_string())? };
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or("No adapter")?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await
            .map_err(|e| e.to_string())?;
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .first()
            .copied()
            .unwrap_or(wgpu::TextureFormat::Rgba8Unorm);
        log::info!("surface format {:?}, adapter {:?}", surface_format, adapter.get_info().name);
        // Composite into the sRGB view of the swapchain
        let config = RendererConfig {
            output_format: surface_format.add_srgb_suffix(),
            ..config
        }
        .for_adapter(&adapter);
        let plugin = SdfViewPlugin::new_with_config(device, queue, config)?;
        drop(surface);
        Ok(Self { instance, plugin, surface_format })
    }

    fn surface_config(&self, width: u32, height: u32) -> wgpu::SurfaceConfiguration {
        let view_format = self.plugin.renderer().config().output_format;
        let view_formats = if view_format != self.surface_format { vec![view_format] } else { vec![] };
        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: self.surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats,
            desired_maximum_frame_latency: 2,
        }
    }
}

impl RenderBackend for SdfViewWindowBackend {
    fn prepare(&mut self, assets: &SceneAssets) -> Result<(), String> {
        self.plugin.prepare(assets)
    }

    fn render_frame(&mut self, view: &FrameView) -> Result<(), String> {
        self.plugin.render_frame(view)
    }
}

impl RenderBackendWindow for SdfViewWindowBackend {
    fn render_frame_to_window(
        &mut self,
        view: &FrameView,
        raw_window_handle: RawWindowHandle,
        raw_display_handle: RawDisplayHandle,
    ) -> Result<(), String> {
        let target = SurfaceTargetUnsafe::RawHandle {
            raw_window_handle,
            raw_display_handle,
        };
        let surface = unsafe {
            self.instance
                .create_surface_unsafe(target)
                .map_err(|e| e.to_string())?
        };
        let (width, height) = view.viewport_size;
        let config = self.surface_config(width.max(1), height.max(1));
        surface.configure(self.plugin.device(), &config);

        let frame = match surface.get_current_texture() {
            Ok(f) => f,
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                surface.configure(self.plugin.device(), &config);
                surface.get_current_texture().map_err(|e| e.to_string())?
            }
            Err(wgpu::SurfaceError::Timeout) => return Err("Surface get_current_texture timeout".to_string()),
            Err(e) => return Err(e.to_string()),
        };
        let output_view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.plugin.renderer().config().output_format),
            ..Default::default()
        });
        self.plugin.render_frame_to_view(view, &output_view)?;
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_ratio_is_capped() {
        // 3x display: 3000x1500 physical is 1000x500 logical, rendered at 2x
        assert_eq!(backbuffer_size((3000, 1500), 3.0, 2.0), (2000, 1000));
    }

    #[test]
    fn ratio_below_cap_keeps_physical_size() {
        assert_eq!(backbuffer_size((1600, 900), 1.0, 2.0), (1600, 900));
        assert_eq!(backbuffer_size((1620, 1578), 2.0, 2.0), (1620, 1578));
    }

    #[test]
    fn degenerate_sizes_stay_nonzero() {
        assert_eq!(backbuffer_size((0, 0), 2.0, 2.0), (1, 1));
        assert_eq!(backbuffer_size((800, 600), 0.0, 2.0), (800, 600));
    }
}
