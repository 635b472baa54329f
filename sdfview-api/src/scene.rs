//! Data types handed from the asset loader to the render world.
//! Used by both the headless and windowed backends; host fills these once at load
//! time (assets) and every frame (view).

use serde::{Deserialize, Serialize};

/// Triangle mesh in object space.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    /// Vertex positions, xyz interleaved.
    pub positions: Vec<f32>,
    /// Triangle list indices into `positions` (3 per triangle).
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex(&self, index: u32) -> [f32; 3] {
        let i = index as usize * 3;
        [self.positions[i], self.positions[i + 1], self.positions[i + 2]]
    }

    /// Corner positions of triangle `tri`.
    pub fn triangle(&self, tri: usize) -> [[f32; 3]; 3] {
        [
            self.vertex(self.indices[tri * 3]),
            self.vertex(self.indices[tri * 3 + 1]),
            self.vertex(self.indices[tri * 3 + 2]),
        ]
    }
}

/// Decoded RGBA8 raster, row-major from the top row.
#[derive(Clone, Debug)]
pub struct ImageData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImageData {
    /// Byte length of a `width` x `height` RGBA8 raster, computed in `usize`.
    pub fn rgba_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    /// RGBA texel at (x, y). Caller guarantees bounds.
    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}

/// Voxel-grid dimensions of the source volume the slice belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDims {
    pub w: u32,
    pub h: u32,
    pub d: u32,
}

impl VolumeDims {
    pub fn max_dim(&self) -> u32 {
        self.w.max(self.h).max(self.d)
    }

    /// Width over height of one slice.
    pub fn aspect(&self) -> f32 {
        self.w as f32 / self.h as f32
    }
}

impl Default for VolumeDims {
    fn default() -> Self {
        Self { w: 810, h: 789, d: 1 }
    }
}

/// Everything the backend needs to build the scene, produced once by the loader.
#[derive(Clone, Debug)]
pub struct SceneAssets {
    pub mesh: MeshData,
    pub intensity: ImageData,
    pub colormap: ImageData,
    pub volume: VolumeDims,
    /// Normalized depth of the distance-field slice within the volume.
    pub z_slice: f32,
}

/// What the compositing pass writes for in-bounds fragments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Intensity texture through the colour lookup gradient.
    Colormap,
    /// Raw distance value in the red channel.
    #[default]
    DistanceField,
}

impl ViewMode {
    pub fn as_u32(self) -> u32 {
        match self {
            ViewMode::Colormap => 0,
            ViewMode::DistanceField => 1,
        }
    }
}

/// Per-frame parameters of the compositing pass. Passed into every draw call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    /// Viewport width over height; updated on resize.
    pub screen_aspect: f32,
    /// Slice width over height; fixed by the data.
    pub volume_aspect: f32,
    pub view_mode: ViewMode,
    /// Raw intensity range stretched over the colour gradient.
    pub colormap_window: [f32; 2],
}

impl RenderParams {
    pub fn new(volume: VolumeDims, view_mode: ViewMode, colormap_window: [f32; 2]) -> Self {
        Self {
            screen_aspect: volume.aspect(),
            volume_aspect: volume.aspect(),
            view_mode,
            colormap_window,
        }
    }

    /// Update the screen aspect from a viewport size. Zero-height viewports are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.screen_aspect = width as f32 / height as f32;
        }
    }

    /// Horizontal scale applied to sampling coordinates.
    pub fn aspect_ratio(&self) -> f32 {
        self.screen_aspect / self.volume_aspect
    }
}

impl Default for RenderParams {
    fn default() -> Self {
        Self::new(VolumeDims::default(), ViewMode::default(), [0.5, 0.9])
    }
}

/// View data for the current frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameView {
    /// Back-buffer size in physical pixels.
    pub viewport_size: (u32, u32),
    pub params: RenderParams,
}

impl Default for FrameView {
    fn default() -> Self {
        Self {
            viewport_size: (800, 600),
            params: RenderParams::default(),
        }
    }
}
