//! Asset loading (OBJ via tobj, rasters via image) and mesh bounds.

use std::path::Path;

use sdfview_api::{ImageData, MeshData, SceneAssets, SceneConfig};

use crate::error::ToolsError;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    /// Inverted box that any included point replaces.
    pub fn empty() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|a| self.min[a] > self.max[a])
    }

    pub fn include_point(&mut self, p: [f32; 3]) {
        for a in 0..3 {
            self.min[a] = self.min[a].min(p[a]);
            self.max[a] = self.max[a].max(p[a]);
        }
    }

    pub fn include_aabb(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.include_point(other.min);
        self.include_point(other.max);
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn extent(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.extent();
        2.0 * (d[0] * d[1] + d[1] * d[2] + d[2] * d[0])
    }

    /// Squared distance from `p` to the box (0 inside).
    pub fn distance_sq_to_point(&self, p: [f32; 3]) -> f32 {
        let mut d2 = 0.0;
        for a in 0..3 {
            let d = (self.min[a] - p[a]).max(0.0).max(p[a] - self.max[a]);
            d2 += d * d;
        }
        d2
    }
}

pub fn mesh_bounds(mesh: &MeshData) -> Aabb {
    let mut bounds = Aabb::empty();
    for v in mesh.positions.chunks_exact(3) {
        bounds.include_point([v[0], v[1], v[2]]);
    }
    bounds
}

/// Translate the mesh so its vertex mean sits at the origin. Returns the removed offset.
pub fn center_on_mean(mesh: &mut MeshData) -> [f32; 3] {
    let n = mesh.vertex_count();
    if n == 0 {
        return [0.0; 3];
    }
    let mut sum = [0.0f64; 3];
    for v in mesh.positions.chunks_exact(3) {
        for a in 0..3 {
            sum[a] += v[a] as f64;
        }
    }
    let mean = [
        (sum[0] / n as f64) as f32,
        (sum[1] / n as f64) as f32,
        (sum[2] / n as f64) as f32,
    ];
    for v in mesh.positions.chunks_exact_mut(3) {
        for a in 0..3 {
            v[a] -= mean[a];
        }
    }
    mean
}

/// Load the first model of an OBJ file as a triangle list.
pub fn load_obj_mesh(path: &Path) -> Result<MeshData, ToolsError> {
    let (models, _) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| ToolsError::Obj {
        path: path.to_path_buf(),
        source,
    })?;
    let mesh = models
        .into_iter()
        .next()
        .ok_or_else(|| ToolsError::NoMesh(path.to_path_buf()))?
        .mesh;
    if mesh.indices.len() < 3 {
        return Err(ToolsError::EmptyMesh(path.to_path_buf()));
    }
    let positions: Vec<f32> = mesh.positions.iter().map(|&x| x as f32).collect();
    let data = MeshData {
        positions,
        indices: mesh.indices,
    };
    log::info!(
        "loaded {}: {} vertices, {} triangles",
        path.display(),
        data.vertex_count(),
        data.triangle_count()
    );
    Ok(data)
}

pub fn load_image(path: &Path) -> Result<ImageData, ToolsError> {
    let img = image::open(path).map_err(|source| ToolsError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::info!("loaded {}: {}x{}", path.display(), width, height);
    Ok(ImageData {
        data: rgba.into_raw(),
        width,
        height,
    })
}

/// Load the mesh, intensity and colormap named by the config.
pub fn load_scene_assets(config: &SceneConfig) -> Result<SceneAssets, ToolsError> {
    let volume = config.volume;
    if volume.w == 0 || volume.h == 0 || volume.d == 0 {
        return Err(ToolsError::InvalidDims(volume.w, volume.h, volume.d));
    }
    let mut mesh = load_obj_mesh(&config.mesh_file())?;
    if config.center_mesh {
        let offset = center_on_mean(&mut mesh);
        log::debug!("mesh recentred by {:?}", offset);
    }
    let colormap = load_image(&config.colormap_file())?;
    let intensity = load_image(&config.intensity_file())?;
    if (intensity.width, intensity.height) != (volume.w, volume.h) {
        log::warn!(
            "intensity image is {}x{} but volume slice is {}x{}",
            intensity.width,
            intensity.height,
            volume.w,
            volume.h
        );
    }
    Ok(SceneAssets {
        mesh,
        intensity,
        colormap,
        volume,
        z_slice: config.z_slice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const QUAD_OBJ: &str = "v -1 -1 0\nv 1 -1 0\nv 1 1 0\nv -1 1 0\nf 1 2 3 4\n";

    fn write_png(path: &Path, w: u32, h: u32, px: [u8; 4]) {
        image::RgbaImage::from_pixel(w, h, image::Rgba(px)).save(path).unwrap();
    }

    #[test]
    fn obj_quad_is_triangulated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.obj");
        std::fs::write(&path, QUAD_OBJ).unwrap();
        let mesh = load_obj_mesh(&path).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn obj_without_faces_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\n").unwrap();
        assert!(load_obj_mesh(&path).is_err());
    }

    #[test]
    fn missing_obj_is_error() {
        let err = load_obj_mesh(Path::new("/nonexistent/mesh.obj")).unwrap_err();
        assert!(matches!(err, ToolsError::Obj { .. }));
    }

    #[test]
    fn image_is_rgba8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        write_png(&path, 3, 2, [10, 20, 30, 255]);
        let img = load_image(&path).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.data.len(), 3 * 2 * 4);
        assert_eq!(img.texel(2, 1), [10, 20, 30, 255]);
    }

    #[test]
    fn bounds_and_centering() {
        let mut mesh = MeshData {
            positions: vec![1.0, 2.0, 3.0, 3.0, 4.0, 5.0],
            indices: vec![],
        };
        let b = mesh_bounds(&mesh);
        assert_eq!(b.min, [1.0, 2.0, 3.0]);
        assert_eq!(b.max, [3.0, 4.0, 5.0]);
        let offset = center_on_mean(&mut mesh);
        assert_eq!(offset, [2.0, 3.0, 4.0]);
        assert_eq!(mesh.positions, vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn aabb_point_distance() {
        let b = Aabb { min: [0.0; 3], max: [1.0; 3] };
        assert_eq!(b.distance_sq_to_point([0.5, 0.5, 0.5]), 0.0);
        assert!((b.distance_sq_to_point([2.0, 0.5, 0.5]) - 1.0).abs() < 1e-6);
        assert!((b.distance_sq_to_point([2.0, 2.0, 0.5]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn scene_assets_from_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mesh.obj"), QUAD_OBJ).unwrap();
        write_png(&dir.path().join("slice.png"), 4, 2, [128, 0, 0, 255]);
        write_png(&dir.path().join("cm.png"), 8, 1, [0, 255, 0, 255]);
        let config = SceneConfig {
            asset_root: dir.path().to_path_buf(),
            mesh_path: PathBuf::from("mesh.obj"),
            intensity_path: PathBuf::from("slice.png"),
            colormap_path: PathBuf::from("cm.png"),
            volume: sdfview_api::VolumeDims { w: 4, h: 2, d: 1 },
            center_mesh: true,
            ..SceneConfig::default()
        };
        let assets = load_scene_assets(&config).unwrap();
        assert_eq!(assets.mesh.triangle_count(), 2);
        assert_eq!(assets.intensity.width, 4);
        assert_eq!(assets.colormap.width, 8);
        assert_eq!(assets.z_slice, 0.5);
    }
}
