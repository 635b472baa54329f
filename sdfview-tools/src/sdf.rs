//! Distance-field slice generation on the CPU, and the volume transform shared with the GPU pass.

use rayon::prelude::*;
use sdfview_api::VolumeDims;

use crate::bvh::MeshBvh;

/// One depth slice of the mesh signed distance field.
#[derive(Clone, Debug)]
pub struct SdfSlice {
    pub width: u32,
    pub height: u32,
    /// Signed distances, row-major, row 0 is the top of the slice. Length = width * height.
    pub data: Vec<f32>,
}

impl SdfSlice {
    /// Texel count of a `width` x `height` slice, computed in `usize`.
    pub fn texel_count(width: u32, height: u32) -> usize {
        width as usize * height as usize
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

/// Uniform scale placing the unit cube into mesh space: each axis scales by `dim / max(dims)`.
/// No rotation, no translation. Column-major 4x4.
pub fn volume_transform(dims: VolumeDims) -> [f32; 16] {
    let s = 1.0 / dims.max_dim() as f32;
    let sx = dims.w as f32 * s;
    let sy = dims.h as f32 * s;
    let sz = dims.d as f32 * s;
    [
        sx, 0.0, 0.0, 0.0, //
        0.0, sy, 0.0, 0.0, //
        0.0, 0.0, sz, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// Apply a column-major 4x4 affine matrix to a point.
pub fn transform_point(m: &[f32; 16], p: [f32; 3]) -> [f32; 3] {
    [
        m[0] * p[0] + m[4] * p[1] + m[8] * p[2] + m[12],
        m[1] * p[0] + m[5] * p[1] + m[9] * p[2] + m[13],
        m[2] * p[0] + m[6] * p[1] + m[10] * p[2] + m[14],
    ]
}

/// Mesh-space sample point for texel (x, y) of a `width` x `height` slice at normalized depth `z`.
/// Row 0 is the top of the slice, i.e. the largest mesh-space y.
pub fn slice_sample_point(matrix: &[f32; 16], x: u32, y: u32, width: u32, height: u32, z: f32) -> [f32; 3] {
    let u = (x as f32 + 0.5) / width as f32;
    let v = 1.0 - (y as f32 + 0.5) / height as f32;
    transform_point(matrix, [u - 0.5, v - 0.5, z - 0.5])
}

/// Rasterize the signed distance of the slice at depth `z` into a `dims.w` x `dims.h` grid.
/// Rows are computed in parallel.
pub fn generate_sdf_slice(bvh: &MeshBvh, dims: VolumeDims, z: f32) -> SdfSlice {
    let (width, height) = (dims.w, dims.h);
    let matrix = volume_transform(dims);
    let mut data = vec![f32::MAX; SdfSlice::texel_count(width, height)];
    if width == 0 || height == 0 {
        return SdfSlice { width, height, data };
    }
    data.par_chunks_mut(width as usize).enumerate().for_each(|(y, row)| {
        for (x, value) in row.iter_mut().enumerate() {
            let p = slice_sample_point(&matrix, x as u32, y as u32, width, height, z);
            if let Some(hit) = bvh.closest_point(p) {
                *value = hit.signed_distance(p);
            }
        }
    });
    log::debug!("generated {}x{} SDF slice at z={}", width, height, z);
    SdfSlice { width, height, data }
}
