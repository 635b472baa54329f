//! Distance-field generation pass: rasterize one slice of the mesh SDF into an R32Float target.
//! The flattened BVH and its triangles are read from storage buffers.

use sdfview_api::VolumeDims;
use sdfview_tools::{volume_transform, MeshBvh};

use crate::resources::{create_sdf_texture, SDF_FORMAT};

pub(crate) const SDF_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/sdf_generate.wgsl"));

/// Deepest BVH the shader's 64-entry traversal stack can walk without dropping nodes.
pub const MAX_BVH_DEPTH: usize = 62;

/// Whether `adapter` can render into the distance-field format. Downlevel and GL
/// adapters often expose R32Float for sampling and storage only.
pub fn sdf_target_supported(adapter: &wgpu::Adapter) -> bool {
    adapter
        .get_texture_format_features(SDF_FORMAT)
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SdfUniform {
    matrix: [f32; 16],
    z_value: f32,
    node_count: u32,
    width: f32,
    height: f32,
}

pub struct SdfGeneratePass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buf: wgpu::Buffer,
}

impl SdfGeneratePass {
    pub fn new(device: &wgpu::Device) -> Result<Self, String> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sdf_generate_shader"),
            source: wgpu::ShaderSource::Wgsl(SDF_SHADER.into()),
        });
        let storage = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sdf_generate_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: std::num::NonZeroU64::new(std::mem::size_of::<SdfUniform>() as u64),
                    },
                    count: None,
                },
                storage(1),
                storage(2),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sdf_generate_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sdf_generate_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SDF_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        let uniform_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sdf_generate_uniform"),
            size: std::mem::size_of::<SdfUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buf,
        })
    }

    /// Render the slice at normalized depth `z` into a new `dims.w` x `dims.h` texture.
    /// Submits and returns once the work is queued.
    pub fn generate(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bvh: &MeshBvh,
        dims: VolumeDims,
        z: f32,
    ) -> Result<wgpu::Texture, String> {
        if bvh.max_depth() > MAX_BVH_DEPTH {
            return Err(format!(
                "sdf_generate: BVH depth {} exceeds the traversal limit {}",
                bvh.max_depth(),
                MAX_BVH_DEPTH
            ));
        }
        let (nodes, triangles) = bvh.flatten();
        if nodes.is_empty() || triangles.is_empty() {
            return Err("sdf_generate: mesh has no triangles".to_string());
        }
        let uniform = SdfUniform {
            matrix: volume_transform(dims),
            z_value: z,
            node_count: nodes.len() as u32,
            width: dims.w as f32,
            height: dims.h as f32,
        };
        queue.write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&uniform));

        let node_bytes: &[u8] = bytemuck::cast_slice(&nodes);
        let node_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sdf_bvh_nodes"),
            size: node_bytes.len() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&node_buf, 0, node_bytes);
        let tri_bytes: &[u8] = bytemuck::cast_slice(&triangles);
        let tri_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sdf_bvh_triangles"),
            size: tri_bytes.len() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&tri_buf, 0, tri_bytes);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sdf_generate_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.uniform_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: node_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: tri_buf.as_entire_binding() },
            ],
        });

        let target = create_sdf_texture(device, dims.w, dims.h, wgpu::TextureUsages::RENDER_ATTACHMENT)?;
        let target_view = target.create_view(&Default::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sdf_generate"),
        });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sdf_generate_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &bind_group, &[]);
            rp.draw(0..3, 0..1);
        }
        queue.submit([encoder.finish()]);
        log::info!(
            "queued GPU SDF slice {}x{} at z={} ({} nodes, {} triangles)",
            dims.w,
            dims.h,
            z,
            nodes.len(),
            triangles.len()
        );
        Ok(target)
    }
}
