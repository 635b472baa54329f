//! Renderer configuration: output format, distance-field backend, BVH leaf size.

use sdfview_api::{SceneConfig, SdfBackend};
use sdfview_tools::DEFAULT_MAX_LEAF_TRIS;

use crate::resources::SDF_FORMAT;
use crate::sdf_pass::sdf_target_supported;

/// sdfview renderer and bridge configuration.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Format of the view the compositing pass renders into (swapchain view or offscreen target).
    pub output_format: wgpu::TextureFormat,
    /// Where the distance-field slice is computed.
    pub sdf_backend: SdfBackend,
    /// Max triangles per BVH leaf.
    pub max_leaf_tris: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            output_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            sdf_backend: SdfBackend::default(),
            max_leaf_tris: DEFAULT_MAX_LEAF_TRIS,
        }
    }
}

impl RendererConfig {
    pub fn from_scene(scene: &SceneConfig) -> Self {
        Self {
            sdf_backend: scene.sdf_backend,
            ..Self::default()
        }
    }

    /// Fall back to the CPU generator when the device cannot render the distance-field target.
    pub fn with_gpu_sdf_support(mut self, supported: bool) -> Self {
        if self.sdf_backend == SdfBackend::Gpu && !supported {
            log::warn!("adapter cannot render to {:?}, generating the distance field on the CPU", SDF_FORMAT);
            self.sdf_backend = SdfBackend::Cpu;
        }
        self
    }

    /// `with_gpu_sdf_support` with the capability queried from `adapter`.
    pub fn for_adapter(self, adapter: &wgpu::Adapter) -> Self {
        self.with_gpu_sdf_support(sdf_target_supported(adapter))
    }
}
