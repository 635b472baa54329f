//! Segment preprocessing: voxel clip boxes of segment meshes and per-layer point cuts.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::ToolsError;
use crate::mesh::Aabb;
use crate::meta::{layer_id, reset_dir, write_json, Clip, SegmentEntry, SegmentMeta};

pub const DEFAULT_LAYER_GAP: u32 = 5;

/// Box centred on the vertex mean, reaching the farthest vertex on each axis,
/// clamped to the non-negative octant. Empty for no vertices.
pub fn segment_bounds(positions: &[[f32; 3]]) -> Aabb {
    if positions.is_empty() {
        return Aabb::empty();
    }
    let mut sum = [0.0f64; 3];
    for p in positions {
        for a in 0..3 {
            sum[a] += p[a] as f64;
        }
    }
    let n = positions.len() as f64;
    let mean = sum.map(|s| s / n);
    let mut reach = [0.0f64; 3];
    for p in positions {
        for a in 0..3 {
            reach[a] = reach[a].max((p[a] as f64 - mean[a]).abs());
        }
    }
    let mut bounds = Aabb::empty();
    for a in 0..3 {
        bounds.min[a] = (mean[a] - reach[a]).max(0.0) as f32;
        bounds.max[a] = (mean[a] + reach[a]).max(0.0) as f32;
    }
    bounds
}

/// Truncated integer origin and extent of `bounds`.
pub fn segment_clip(bounds: &Aabb) -> Clip {
    Clip {
        x: bounds.min[0] as u32,
        y: bounds.min[1] as u32,
        z: bounds.min[2] as u32,
        w: (bounds.max[0] - bounds.min[0]) as u32,
        h: (bounds.max[1] - bounds.min[1]) as u32,
        d: (bounds.max[2] - bounds.min[2]) as u32,
    }
}

/// Whether the segment's depth range, widened by `gap`, strictly contains `layer`.
pub fn layer_overlaps(bounds: &Aabb, layer: u32, gap: u32) -> bool {
    let (lo, hi) = (bounds.min[2] as i64, bounds.max[2] as i64);
    let (layer, gap) = (layer as i64, gap as i64);
    lo - gap < layer && hi + gap > layer
}

/// Points whose depth lies within `gap` of `layer`, bounds inclusive.
pub fn clip_points(points: &[[f32; 3]], layer: u32, gap: u32) -> Vec<[f32; 3]> {
    let lo = layer as f32 - gap as f32;
    let hi = layer as f32 + gap as f32;
    points.iter().copied().filter(|p| p[2] >= lo && p[2] <= hi).collect()
}

/// Every `v` record of an OBJ file, including vertices no face references.
pub fn read_obj_vertices(path: &Path) -> Result<Vec<[f32; 3]>, ToolsError> {
    let file = std::fs::File::open(path).map_err(ToolsError::io(path))?;
    let mut vertices = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(ToolsError::io(path))?;
        let Some(rest) = line.strip_prefix("v ") else { continue };
        let bad = || ToolsError::BadVertex { path: path.to_path_buf(), line: i + 1 };
        let mut coords = rest.split_whitespace().map(|t| t.parse::<f32>().map_err(|_| bad()));
        let mut next = || coords.next().unwrap_or_else(|| Err(bad()));
        vertices.push([next()?, next()?, next()?]);
    }
    Ok(vertices)
}

/// Write `points` as bare `v x y z` records.
pub fn write_points_obj(path: &Path, points: &[[f32; 3]]) -> Result<(), ToolsError> {
    let file = std::fs::File::create(path).map_err(ToolsError::io(path))?;
    let mut out = BufWriter::new(file);
    for p in points {
        writeln!(out, "v {} {} {}", p[0], p[1], p[2]).map_err(ToolsError::io(path))?;
    }
    out.flush().map_err(ToolsError::io(path))
}

/// Face-referenced vertex positions of every model in a segment OBJ.
pub fn load_segment_vertices(path: &Path) -> Result<Vec<[f32; 3]>, ToolsError> {
    let options = tobj::LoadOptions {
        single_index: false,
        triangulate: false,
        ..Default::default()
    };
    let (models, _) = tobj::load_obj(path, &options).map_err(|source| ToolsError::Obj {
        path: path.to_path_buf(),
        source,
    })?;
    if models.is_empty() {
        return Err(ToolsError::NoMesh(path.to_path_buf()));
    }
    Ok(models
        .iter()
        .flat_map(|m| m.mesh.positions.chunks_exact(3).map(|v| [v[0], v[1], v[2]]))
        .collect())
}

/// Inputs and output of `build_segment_clips`.
pub struct SegmentClipJob<'a> {
    /// Holds `<id>/<id>.obj` and `<id>/<id>_points.obj` per segment.
    pub obj_dir: &'a Path,
    pub out_dir: &'a Path,
    pub segments: &'a [String],
    pub layer: u32,
    pub gap: u32,
}

/// Rebuild `out_dir`: `meta.json` with every segment's clip, plus the point cut of each
/// segment near `layer` under `<layer>/<id>_<layer>_points.obj`.
pub fn build_segment_clips(job: &SegmentClipJob) -> Result<SegmentMeta, ToolsError> {
    let layer_dir = job.out_dir.join(layer_id(job.layer));
    reset_dir(job.out_dir)?;
    std::fs::create_dir_all(&layer_dir).map_err(ToolsError::io(&layer_dir))?;

    let mut meta = SegmentMeta::default();
    for id in job.segments {
        let seg_dir = job.obj_dir.join(id);
        let bounds = segment_bounds(&load_segment_vertices(&seg_dir.join(format!("{}.obj", id)))?);
        let clip = segment_clip(&bounds);
        log::info!("segment {}: {:?}", id, clip);
        meta.segment.push(SegmentEntry { id: id.clone(), clip });

        if !layer_overlaps(&bounds, job.layer, job.gap) {
            log::debug!("segment {} does not reach layer {}", id, job.layer);
            continue;
        }
        let points = read_obj_vertices(&seg_dir.join(format!("{}_points.obj", id)))?;
        let kept = clip_points(&points, job.layer, job.gap);
        log::info!("segment {}: {} of {} points near layer {}", id, kept.len(), points.len(), job.layer);
        let name = format!("{}_{}_points.obj", id, layer_id(job.layer));
        write_points_obj(&layer_dir.join(name), &kept)?;
    }
    write_json(&job.out_dir.join("meta.json"), &meta)?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::read_json;

    fn bounds_z(min: f32, max: f32) -> Aabb {
        Aabb { min: [0.0, 0.0, min], max: [1.0, 1.0, max] }
    }

    #[test]
    fn bounds_are_symmetric_about_the_mean() {
        // mean x = 4, farthest vertex 6 away
        let b = segment_bounds(&[[10.0, 5.0, 20.0], [2.0, 5.0, 22.0], [0.0, 5.0, 24.0]]);
        assert_eq!(b.min, [0.0, 5.0, 20.0]);
        assert_eq!(b.max, [10.0, 5.0, 24.0]);
        let b = segment_bounds(&[[12.0, 0.0, 0.0], [8.0, 0.0, 0.0], [7.0, 0.0, 0.0]]);
        assert_eq!((b.min[0], b.max[0]), (6.0, 12.0));
    }

    #[test]
    fn negative_bounds_clamp_to_zero() {
        let b = segment_bounds(&[[-4.0, 1.0, -10.0], [2.0, 3.0, -6.0]]);
        assert_eq!(b.min, [0.0, 1.0, 0.0]);
        assert_eq!(b.max, [2.0, 3.0, 0.0]);
        assert_eq!(segment_clip(&b), Clip { x: 0, y: 1, z: 0, w: 2, h: 2, d: 0 });
    }

    #[test]
    fn clip_truncates() {
        let b = Aabb { min: [1.9, 2.5, 3.1], max: [4.8, 9.0, 3.9] };
        assert_eq!(segment_clip(&b), Clip { x: 1, y: 2, z: 3, w: 2, h: 6, d: 0 });
    }

    #[test]
    fn layer_overlap_excludes_the_gap_boundary() {
        assert!(layer_overlaps(&bounds_z(0.0, 40.0), 0, 5));
        assert!(layer_overlaps(&bounds_z(4.0, 40.0), 0, 5));
        assert!(!layer_overlaps(&bounds_z(5.0, 40.0), 0, 5));
        assert!(layer_overlaps(&bounds_z(90.0, 96.0), 100, 5));
        assert!(!layer_overlaps(&bounds_z(90.0, 95.0), 100, 5));
    }

    #[test]
    fn points_within_gap_of_layer_are_kept() {
        let points = [[0.0, 0.0, 44.9], [1.0, 0.0, 45.0], [2.0, 0.0, 50.0], [3.0, 0.0, 55.0], [4.0, 0.0, 55.1]];
        let kept = clip_points(&points, 50, 5);
        assert_eq!(kept, vec![[1.0, 0.0, 45.0], [2.0, 0.0, 50.0], [3.0, 0.0, 55.0]]);
        assert_eq!(clip_points(&points, 0, 5), Vec::<[f32; 3]>::new());
    }

    #[test]
    fn obj_vertex_reader_keeps_unreferenced_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.obj");
        std::fs::write(&path, "# cloud\nv 1 2 3\nvn 0 0 1\nv 4.5 5 -6\n").unwrap();
        assert_eq!(read_obj_vertices(&path).unwrap(), vec![[1.0, 2.0, 3.0], [4.5, 5.0, -6.0]]);

        std::fs::write(&path, "v 1 2\n").unwrap();
        assert!(matches!(read_obj_vertices(&path), Err(ToolsError::BadVertex { line: 1, .. })));
    }

    #[test]
    fn points_obj_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.obj");
        let points = vec![[1.5, -2.0, 3.25], [0.0, 0.0, 7.0]];
        write_points_obj(&path, &points).unwrap();
        assert_eq!(read_obj_vertices(&path).unwrap(), points);
    }

    #[test]
    fn segment_build_writes_meta_and_layer_cuts() {
        let dir = tempfile::tempdir().unwrap();
        let objs = dir.path().join("obj");
        let out = dir.path().join("segment");
        // "near" spans z 0..8 and reaches layer 0; "far" sits at z 100..108
        for (id, z0) in [("near", 0.0), ("far", 100.0)] {
            let seg = objs.join(id);
            std::fs::create_dir_all(&seg).unwrap();
            let mesh = format!(
                "v 10 10 {z0}\nv 20 10 {z0}\nv 10 20 {z1}\nv 20 20 {z1}\nf 1 2 3\nf 2 4 3\n",
                z0 = z0,
                z1 = z0 + 8.0
            );
            std::fs::write(seg.join(format!("{}.obj", id)), mesh).unwrap();
            let points = format!("v 1 1 {}\nv 2 2 {}\nv 3 3 {}\n", z0, z0 + 5.0, z0 + 6.0);
            std::fs::write(seg.join(format!("{}_points.obj", id)), points).unwrap();
        }
        let segments = vec!["near".to_string(), "far".to_string()];
        let meta = build_segment_clips(&SegmentClipJob { obj_dir: &objs, out_dir: &out, segments: &segments, layer: 0, gap: 5 })
            .unwrap();

        assert_eq!(meta.segment[0].clip, Clip { x: 10, y: 10, z: 0, w: 10, h: 10, d: 8 });
        assert_eq!(meta.segment[1].clip.z, 100);
        assert_eq!(read_json::<SegmentMeta>(&out.join("meta.json")).unwrap(), meta);

        let near = read_obj_vertices(&out.join("00000").join("near_00000_points.obj")).unwrap();
        assert_eq!(near, vec![[1.0, 1.0, 0.0], [2.0, 2.0, 5.0]]);
        assert!(!out.join("00000").join("far_00000_points.obj").exists());
    }
}
