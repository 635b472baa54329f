//! GPU resources: scene textures (intensity, colormap, distance-field slice) and the offscreen frame target.

use sdfview_api::{ImageData, SdfBackend};
use sdfview_tools::{MeshBvh, SdfSlice};
use wgpu::TextureView;

/// Format of the distance-field slice.
pub const SDF_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

fn texture_2d(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

fn write_texture(queue: &wgpu::Queue, texture: &wgpu::Texture, bytes: &[u8], bytes_per_texel: u32, width: u32, height: u32) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_texel),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
}

/// Upload an RGBA8 image as a sampled texture. `format` selects linear vs sRGB decoding.
pub fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: &ImageData,
    format: wgpu::TextureFormat,
) -> Result<wgpu::Texture, String> {
    if image.width == 0 || image.height == 0 {
        return Err(format!("{}: image is empty", label));
    }
    let expected = ImageData::rgba_len(image.width, image.height);
    if image.data.len() != expected {
        return Err(format!(
            "{}: expected {} bytes for {}x{} RGBA8, got {}",
            label,
            expected,
            image.width,
            image.height,
            image.data.len()
        ));
    }
    let texture = texture_2d(
        device,
        label,
        image.width,
        image.height,
        format,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
    );
    write_texture(queue, &texture, &image.data, 4, image.width, image.height);
    Ok(texture)
}

/// Distance-field texture, sampled by the composite pass and copyable for readback, plus `extra_usage`.
pub fn create_sdf_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    extra_usage: wgpu::TextureUsages,
) -> Result<wgpu::Texture, String> {
    if width == 0 || height == 0 {
        return Err("sdf texture: width and height must be > 0".to_string());
    }
    Ok(texture_2d(
        device,
        "sdf_slice",
        width,
        height,
        SDF_FORMAT,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC | extra_usage,
    ))
}

/// Upload a CPU-generated slice.
pub fn upload_sdf_slice(device: &wgpu::Device, queue: &wgpu::Queue, slice: &SdfSlice) -> Result<wgpu::Texture, String> {
    let texture = create_sdf_texture(device, slice.width, slice.height, wgpu::TextureUsages::COPY_DST)?;
    write_texture(queue, &texture, bytemuck::cast_slice(&slice.data), 4, slice.width, slice.height);
    Ok(texture)
}

/// Textures and acceleration structure of the loaded scene. Immutable after creation.
pub struct SceneResources {
    pub intensity: wgpu::Texture,
    pub colormap: wgpu::Texture,
    pub sdf: wgpu::Texture,
    /// Kept for reuse (e.g. regenerating another slice).
    pub bvh: MeshBvh,
    /// Backend that actually produced `sdf`.
    pub sdf_backend: SdfBackend,
    pub bind_group: wgpu::BindGroup,
}

/// Offscreen colour target for headless frames. Reallocated only when the size changes.
pub struct FrameTarget {
    pub color: wgpu::Texture,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl FrameTarget {
    pub fn ensure_size(
        device: &wgpu::Device,
        existing: Option<Self>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err("FrameTarget: width and height must be > 0".to_string());
        }
        if let Some(t) = existing {
            if t.width == width && t.height == height && t.format == format {
                return Ok(t);
            }
        }
        let color = texture_2d(
            device,
            "frame_color",
            width,
            height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        Ok(Self { color, format, width, height })
    }
    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn color_view(&self) -> TextureView { self.color.create_view(&Default::default()) }
}
