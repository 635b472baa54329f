//! sdfview Renderer: wgpu distance-field slice generation + compositing pass.

pub mod composite;
pub mod config;
pub mod readback;
pub mod resources;
pub mod sdf_pass;

pub use composite::cpu::{composite_pixel, render_cpu, CompositeInputs};
pub use composite::mapping::{colormap_coord, remap_uv, remap_uv_unchecked};
pub use composite::CompositePass;
pub use config::RendererConfig;
pub use resources::{FrameTarget, SceneResources};
pub use sdf_pass::{sdf_target_supported, SdfGeneratePass, MAX_BVH_DEPTH};

use std::time::Instant;

use sdfview_api::{ImageData, RenderParams, SceneAssets, SdfBackend};
use sdfview_tools::{generate_sdf_slice, MeshBvh, SdfSlice};

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RendererConfig,
    /// Built only for the GPU backend; its pipeline needs a renderable R32Float target.
    sdf_pass: Option<SdfGeneratePass>,
    composite_pass: CompositePass,
    scene: Option<SceneResources>,
    frame_target: Option<FrameTarget>,
}

impl Renderer {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, String> {
        Self::new_with_config(device, queue, RendererConfig::default())
    }

    /// With `SdfBackend::Gpu` the device must render to R32Float; resolve the backend with
    /// `RendererConfig::for_adapter` first.
    pub fn new_with_config(device: wgpu::Device, queue: wgpu::Queue, config: RendererConfig) -> Result<Self, String> {
        let sdf_pass = match config.sdf_backend {
            SdfBackend::Gpu => Some(SdfGeneratePass::new(&device)?),
            SdfBackend::Cpu => None,
        };
        let composite_pass = CompositePass::new(&device, config.output_format)?;
        Ok(Self {
            device,
            queue,
            config,
            sdf_pass,
            composite_pass,
            scene: None,
            frame_target: None,
        })
    }

    pub fn device(&self) -> &wgpu::Device { &self.device }
    pub fn queue(&self) -> &wgpu::Queue { &self.queue }
    pub fn config(&self) -> &RendererConfig { &self.config }
    pub fn scene(&self) -> Option<&SceneResources> { self.scene.as_ref() }
    pub fn has_gpu_sdf_pass(&self) -> bool { self.sdf_pass.is_some() }

    /// Upload the scene textures, build the BVH and generate the distance-field slice once.
    pub fn prepare_scene(&mut self, assets: &SceneAssets) -> Result<(), String> {
        let started = Instant::now();
        let bvh = MeshBvh::build(&assets.mesh, self.config.max_leaf_tris);
        log::info!(
            "BVH: {} triangles, {} nodes in {:?}",
            bvh.triangle_count(),
            bvh.node_count(),
            started.elapsed()
        );

        let started = Instant::now();
        let (sdf, sdf_backend) = match &self.sdf_pass {
            Some(pass) if bvh.max_depth() <= MAX_BVH_DEPTH => (
                pass.generate(&self.device, &self.queue, &bvh, assets.volume, assets.z_slice)?,
                SdfBackend::Gpu,
            ),
            pass => {
                if pass.is_some() {
                    log::warn!(
                        "BVH depth {} exceeds the GPU traversal limit {}, generating the distance field on the CPU",
                        bvh.max_depth(),
                        MAX_BVH_DEPTH
                    );
                }
                let slice = generate_sdf_slice(&bvh, assets.volume, assets.z_slice);
                (resources::upload_sdf_slice(&self.device, &self.queue, &slice)?, SdfBackend::Cpu)
            }
        };
        log::info!("SDF slice ({:?} backend) in {:?}", sdf_backend, started.elapsed());

        let intensity = resources::upload_rgba(
            &self.device,
            &self.queue,
            "intensity",
            &assets.intensity,
            wgpu::TextureFormat::Rgba8Unorm,
        )?;
        let colormap = resources::upload_rgba(
            &self.device,
            &self.queue,
            "colormap",
            &assets.colormap,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        )?;
        let bind_group = self.composite_pass.create_bind_group(
            &self.device,
            &intensity.create_view(&Default::default()),
            &colormap.create_view(&Default::default()),
            &sdf.create_view(&Default::default()),
        );
        self.scene = Some(SceneResources {
            intensity,
            colormap,
            sdf,
            bvh,
            sdf_backend,
            bind_group,
        });
        Ok(())
    }

    /// Encode the composite pass into `output_view`. Requires prepare_scene to have been called.
    pub fn encode_frame(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output_view: &wgpu::TextureView,
        params: &RenderParams,
    ) -> Result<(), String> {
        let scene = self.scene.as_ref().ok_or("encode_frame: no scene (call prepare_scene first)")?;
        self.composite_pass.encode(encoder, &self.queue, &scene.bind_group, output_view, params)
    }

    pub fn render_frame(
        &self,
        output_view: &wgpu::TextureView,
        params: &RenderParams,
    ) -> Result<wgpu::CommandBuffer, String> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("sdfview_frame") });
        self.encode_frame(&mut encoder, output_view, params)?;
        Ok(encoder.finish())
    }

    /// Render into the offscreen target (resized to `width` x `height`) and submit.
    pub fn render_offscreen(&mut self, width: u32, height: u32, params: &RenderParams) -> Result<(), String> {
        let existing = self.frame_target.take();
        let target = FrameTarget::ensure_size(&self.device, existing, width, height, self.config.output_format)?;
        let cmd = self.render_frame(&target.color_view(), params);
        self.frame_target = Some(target);
        self.submit([cmd?]);
        Ok(())
    }

    /// Read back the last offscreen frame. Output format must be 4 bytes per texel.
    pub fn read_offscreen(&self) -> Result<ImageData, String> {
        let target = self.frame_target.as_ref().ok_or("read_offscreen: no offscreen frame rendered")?;
        readback::read_texture_rgba8(&self.device, &self.queue, &target.color, target.width(), target.height())
    }

    /// Read back the distance-field slice of the prepared scene.
    pub fn read_sdf_slice(&self) -> Result<SdfSlice, String> {
        let scene = self.scene.as_ref().ok_or("read_sdf_slice: no scene (call prepare_scene first)")?;
        let size = scene.sdf.size();
        readback::read_texture_r32f(&self.device, &self.queue, &scene.sdf, size.width, size.height)
    }

    pub fn submit(&self, command_buffers: impl IntoIterator<Item = wgpu::CommandBuffer>) {
        self.queue.submit(command_buffers);
    }
}

#[cfg(test)]
mod tests {
    fn validate_wgsl(name: &str, source: &str) {
        let module = naga::front::wgsl::parse_str(source).unwrap_or_else(|e| panic!("{}: {}", name, e.emit_to_string(source)));
        naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::default())
            .validate(&module)
            .unwrap_or_else(|e| panic!("{}: {:?}", name, e));
        for entry in ["vs", "fs"] {
            assert!(module.entry_points.iter().any(|ep| ep.name == entry), "{} lacks entry point {}", name, entry);
        }
    }

    #[test]
    fn composite_shader_validates() {
        validate_wgsl("composite.wgsl", crate::composite::COMPOSITE_SHADER);
    }

    #[test]
    fn sdf_generate_shader_validates() {
        validate_wgsl("sdf_generate.wgsl", crate::sdf_pass::SDF_SHADER);
    }
}
