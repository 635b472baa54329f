//! Offline tools for sdfview: asset loading, mesh bounds, triangle BVH, distance-field slices,
//! and dataset preprocessing (layer tiling, segment clip boxes).

pub mod bvh;
pub mod error;
pub mod mesh;
pub mod meta;
pub mod preprocess;
pub mod sdf;
pub mod segment;
pub mod tiles;

pub use bvh::{ClosestHit, GpuBvhNode, GpuTriangle, MeshBvh, DEFAULT_MAX_LEAF_TRIS};
pub use error::ToolsError;
pub use mesh::{center_on_mean, load_image, load_obj_mesh, load_scene_assets, mesh_bounds, Aabb};
pub use meta::{layer_id, Clip, LayerTileMeta, SegmentMeta, VolumeMeta};
pub use preprocess::{run_preprocess, PreprocessConfig};
pub use sdf::{generate_sdf_slice, slice_sample_point, transform_point, volume_transform, SdfSlice};
pub use segment::{clip_points, layer_overlaps, segment_bounds, segment_clip};
pub use tiles::{split_layer_image, tile_rects, volume_layers, TileRect};
