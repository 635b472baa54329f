//! Dataset preprocessing configuration and driver.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ToolsError;
use crate::meta::read_json;
use crate::segment::{build_segment_clips, SegmentClipJob, DEFAULT_LAYER_GAP};
use crate::tiles::{build_volume_tiles, volume_layers, VolumeTileJob, DEFAULT_LAYER_INTERVAL, DEFAULT_SPLIT};

pub const PREPROCESS_CONFIG_FILE_NAME: &str = "preprocess.json";

/// Where the raw dataset lives and how to cut it. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Full-resolution layers, `<layer>.tif`.
    pub tif_input: PathBuf,
    /// Downscaled layers, `<layer>.tif`.
    pub tif_small_input: PathBuf,
    /// Segment folders, `<id>/<id>.obj` and `<id>/<id>_points.obj`.
    pub obj_input: PathBuf,
    /// Receives `volume/` and `segment/`.
    pub output_dir: PathBuf,
    pub max_layer: u32,
    pub width: u32,
    pub height: u32,
    /// Tiles per side of each layer grid.
    pub split: u32,
    pub layer_interval: u32,
    pub segments: Vec<String>,
    /// Layer the segment point clouds are cut at.
    pub segment_layer: u32,
    pub segment_gap: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            tif_input: PathBuf::from("volume"),
            tif_small_input: PathBuf::from("volume_small"),
            obj_input: PathBuf::from("segments"),
            output_dir: PathBuf::from("output"),
            max_layer: 0,
            width: 810,
            height: 789,
            split: DEFAULT_SPLIT,
            layer_interval: DEFAULT_LAYER_INTERVAL,
            segments: vec!["20230505164332".to_string(), "20230627122904".to_string()],
            segment_layer: 0,
            segment_gap: DEFAULT_LAYER_GAP,
        }
    }
}

impl PreprocessConfig {
    pub fn from_file(path: &Path) -> Result<Self, ToolsError> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `preprocess.json` from `dir` if it exists, defaults otherwise.
    pub fn load_or_default(dir: &Path) -> Result<Self, ToolsError> {
        let path = dir.join(PREPROCESS_CONFIG_FILE_NAME);
        if path.exists() {
            log::info!("loading preprocess config from {}", path.display());
            Self::from_file(&path)
        } else {
            log::info!("{} not found in {}, using defaults", PREPROCESS_CONFIG_FILE_NAME, dir.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ToolsError> {
        if self.split == 0 {
            return Err(ToolsError::InvalidConfig("split must be > 0".to_string()));
        }
        if self.layer_interval == 0 {
            return Err(ToolsError::InvalidConfig("layer_interval must be > 0".to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ToolsError::InvalidConfig(format!("volume size must be > 0, got {}x{}", self.width, self.height)));
        }
        Ok(())
    }

    /// Resolve the relative paths against `base`.
    pub fn resolved(mut self, base: &Path) -> Self {
        for p in [&mut self.tif_input, &mut self.tif_small_input, &mut self.obj_input, &mut self.output_dir] {
            *p = base.join(&*p);
        }
        self
    }

    pub fn layers(&self) -> Vec<u32> {
        volume_layers(self.max_layer, self.layer_interval)
    }

    pub fn volume_dir(&self) -> PathBuf {
        self.output_dir.join("volume")
    }

    pub fn segment_dir(&self) -> PathBuf {
        self.output_dir.join("segment")
    }
}

/// Tile every layer, then clip every segment.
pub fn run_preprocess(config: &PreprocessConfig) -> Result<(), ToolsError> {
    let layers = config.layers();
    let volume = build_volume_tiles(&VolumeTileJob {
        layer_dir: &config.tif_input,
        small_layer_dir: &config.tif_small_input,
        out_dir: &config.volume_dir(),
        layers: &layers,
        split: config.split,
        width: config.width,
        height: config.height,
    })?;
    log::info!("tiled {} layers into {}", volume.volume.len(), config.volume_dir().display());

    let segments = build_segment_clips(&SegmentClipJob {
        obj_dir: &config.obj_input,
        out_dir: &config.segment_dir(),
        segments: &config.segments,
        layer: config.segment_layer,
        gap: config.segment_gap,
    })?;
    log::info!("clipped {} segments into {}", segments.segment.len(), config.segment_dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: PreprocessConfig = serde_json::from_str(r#"{ "max_layer": 120, "split": 4 }"#).unwrap();
        assert_eq!(config.split, 4);
        assert_eq!(config.layer_interval, 50);
        assert_eq!(config.segment_gap, 5);
        assert_eq!(config.layers(), vec![0, 50, 100]);
    }

    #[test]
    fn zero_split_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREPROCESS_CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "split": 0 }"#).unwrap();
        assert!(matches!(PreprocessConfig::load_or_default(dir.path()), Err(ToolsError::InvalidConfig(_))));
    }

    #[test]
    fn absent_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(PreprocessConfig::load_or_default(dir.path()).unwrap(), PreprocessConfig::default());
    }

    #[test]
    fn paths_resolve_against_base() {
        let config = PreprocessConfig::default().resolved(Path::new("/data"));
        assert_eq!(config.obj_input, PathBuf::from("/data/segments"));
        assert_eq!(config.segment_dir(), PathBuf::from("/data/output/segment"));
    }

    #[test]
    fn full_run_writes_both_trees() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        for sub in ["volume", "volume_small", "segments/s1"] {
            std::fs::create_dir_all(base.join(sub)).unwrap();
        }
        let layer = image::DynamicImage::ImageLuma8(image::GrayImage::new(4, 4));
        layer.save(base.join("volume/00000.tif")).unwrap();
        layer.save(base.join("volume_small/00000.tif")).unwrap();
        std::fs::write(base.join("segments/s1/s1.obj"), "v 0 0 0\nv 2 0 0\nv 0 2 2\nf 1 2 3\n").unwrap();
        std::fs::write(base.join("segments/s1/s1_points.obj"), "v 0 0 1\nv 0 0 9\n").unwrap();

        let config = PreprocessConfig {
            width: 4,
            height: 4,
            split: 2,
            segments: vec!["s1".to_string()],
            ..PreprocessConfig::default()
        }
        .resolved(base);
        run_preprocess(&config).unwrap();

        assert!(base.join("output/volume/meta.json").is_file());
        assert!(base.join("output/volume/00000/cell_yxz_001_001_00000.tif").is_file());
        assert!(base.join("output/segment/meta.json").is_file());
        let cut = crate::segment::read_obj_vertices(&base.join("output/segment/00000/s1_00000_points.obj")).unwrap();
        assert_eq!(cut, vec![[0.0, 0.0, 1.0]]);
    }
}
