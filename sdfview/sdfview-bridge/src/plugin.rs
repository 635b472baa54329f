//! sdfview plugin: implements RenderBackend for the host.

use sdfview_api::{FrameView, ImageData, RenderBackend, SceneAssets};
use sdfview_renderer::{Renderer, RendererConfig};

/// Owns the wgpu device/queue and renderer; implements RenderBackend.
/// `render_frame` draws into an offscreen target that `read_frame` copies back.
pub struct SdfViewPlugin {
    renderer: Renderer,
}

impl SdfViewPlugin {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, String> {
        Self::new_with_config(device, queue, RendererConfig::default())
    }

    pub fn new_with_config(device: wgpu::Device, queue: wgpu::Queue, config: RendererConfig) -> Result<Self, String> {
        let renderer = Renderer::new_with_config(device, queue, config)?;
        Ok(Self { renderer })
    }

    /// Create without a window: default instance, no compatible surface.
    pub fn headless(config: RendererConfig) -> Result<Self, String> {
        pollster::block_on(Self::headless_async(config))
    }

    async fn headless_async(config: RendererConfig) -> Result<Self, String> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or("No adapter")?;
        log::info!("headless adapter: {:?}", adapter.get_info().name);
        let config = config.for_adapter(&adapter);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await
            .map_err(|e| e.to_string())?;
        Self::new_with_config(device, queue, config)
    }

    pub fn device(&self) -> &wgpu::Device {
        self.renderer.device()
    }
    pub fn queue(&self) -> &wgpu::Queue {
        self.renderer.queue()
    }
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Composite one frame into `output_view` (e.g. a swapchain view) and submit.
    pub fn render_frame_to_view(&mut self, view: &FrameView, output_view: &wgpu::TextureView) -> Result<(), String> {
        let cmd = self.renderer.render_frame(output_view, &view.params)?;
        self.renderer.submit([cmd]);
        Ok(())
    }

    /// Copy the last offscreen frame to host memory.
    pub fn read_frame(&self) -> Result<ImageData, String> {
        self.renderer.read_offscreen()
    }
}

impl RenderBackend for SdfViewPlugin {
    fn prepare(&mut self, assets: &SceneAssets) -> Result<(), String> {
        self.renderer.prepare_scene(assets)
    }

    fn render_frame(&mut self, view: &FrameView) -> Result<(), String> {
        let (width, height) = view.viewport_size;
        self.renderer.render_offscreen(width, height, &view.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdfview_api::{MeshData, RenderParams, SdfBackend, ViewMode, VolumeDims};
    use sdfview_renderer::{render_cpu, CompositeInputs};
    use sdfview_tools::{generate_sdf_slice, MeshBvh};

    const SIZE: u32 = 16;

    fn cube() -> MeshData {
        let mut positions = Vec::new();
        for i in 0..8u32 {
            for axis in 0..3 {
                positions.push(if i & (1 << axis) != 0 { 0.3 } else { -0.3 });
            }
        }
        let indices = vec![
            0, 2, 1, 1, 2, 3, 4, 5, 6, 5, 7, 6, 0, 1, 4, 1, 5, 4, 2, 6, 3, 3, 6, 7, 0, 4, 2, 2, 4, 6, 1, 3, 5, 3, 7, 5,
        ];
        MeshData { positions, indices }
    }

    fn solid(w: u32, h: u32, px: [u8; 4]) -> ImageData {
        ImageData {
            data: px.iter().copied().cycle().take(ImageData::rgba_len(w, h)).collect(),
            width: w,
            height: h,
        }
    }

    fn assets() -> SceneAssets {
        SceneAssets {
            mesh: cube(),
            intensity: solid(SIZE, SIZE, [180, 180, 180, 255]),
            colormap: solid(8, 1, [40, 200, 90, 255]),
            volume: VolumeDims { w: SIZE, h: SIZE, d: SIZE },
            z_slice: 0.5,
        }
    }

    /// Skips on machines without an adapter.
    fn headless(sdf_backend: SdfBackend) -> Option<SdfViewPlugin> {
        let config = RendererConfig { sdf_backend, ..RendererConfig::default() };
        match SdfViewPlugin::headless(config) {
            Ok(plugin) => Some(plugin),
            Err(e) => {
                eprintln!("skipping: {}", e);
                None
            }
        }
    }

    #[test]
    fn cpu_backend_builds_no_gpu_sdf_pipeline() {
        let Some(mut plugin) = headless(SdfBackend::Cpu) else { return };
        assert!(!plugin.renderer().has_gpu_sdf_pass());
        plugin.prepare(&assets()).unwrap();
        assert_eq!(plugin.renderer().scene().unwrap().sdf_backend, SdfBackend::Cpu);
    }

    #[test]
    fn gpu_request_resolves_to_a_working_backend() {
        let Some(mut plugin) = headless(SdfBackend::Gpu) else { return };
        let scene = assets();
        plugin.prepare(&scene).unwrap();
        let backend = plugin.renderer().scene().unwrap().sdf_backend;
        assert_eq!(plugin.renderer().has_gpu_sdf_pass(), backend == SdfBackend::Gpu);

        let gpu = plugin.renderer().read_sdf_slice().unwrap();
        let bvh = MeshBvh::build(&scene.mesh, plugin.renderer().config().max_leaf_tris);
        let cpu = generate_sdf_slice(&bvh, scene.volume, scene.z_slice);
        assert_eq!((gpu.width, gpu.height), (cpu.width, cpu.height));
        for (i, (g, c)) in gpu.data.iter().zip(&cpu.data).enumerate() {
            assert!((g - c).abs() < 1e-3, "texel {}: gpu {} cpu {}", i, g, c);
        }
    }

    #[test]
    fn gpu_composite_matches_cpu_reference() {
        let Some(mut plugin) = headless(SdfBackend::Cpu) else { return };
        let scene = assets();
        plugin.prepare(&scene).unwrap();
        let bvh = MeshBvh::build(&scene.mesh, plugin.renderer().config().max_leaf_tris);
        let sdf = generate_sdf_slice(&bvh, scene.volume, scene.z_slice);
        let inputs = CompositeInputs {
            intensity: &scene.intensity,
            colormap: &scene.colormap,
            sdf: &sdf,
        };

        for view_mode in [ViewMode::Colormap, ViewMode::DistanceField] {
            // Wider than the slice so the letterbox discard is exercised too
            let (width, height) = (48, 32);
            let mut params = RenderParams::new(scene.volume, view_mode, [0.5, 0.9]);
            params.set_viewport(width, height);
            plugin.render_frame(&FrameView { viewport_size: (width, height), params }).unwrap();
            let gpu = plugin.read_frame().unwrap();
            let cpu = render_cpu(&inputs, &params, width, height);
            assert_eq!(gpu.data.len(), cpu.data.len());

            // Texel and coverage boundaries may round differently on the GPU
            let close = gpu
                .data
                .chunks_exact(4)
                .zip(cpu.data.chunks_exact(4))
                .filter(|(g, c)| g.iter().zip(c.iter()).all(|(a, b)| a.abs_diff(*b) <= 2))
                .count();
            let total = (width * height) as usize;
            assert!(close * 100 >= total * 95, "{:?}: {} of {} pixels match", view_mode, close, total);
        }
    }
}
