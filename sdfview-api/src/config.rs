//! Scene configuration: asset paths, volume dimensions, view mode, snapshot output.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scene::{RenderParams, ViewMode, VolumeDims};

/// File looked up in the working directory by the binaries.
pub const CONFIG_FILE_NAME: &str = "sdfview.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where the distance-field slice is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdfBackend {
    /// Fullscreen fragment pass over the flattened BVH.
    #[default]
    Gpu,
    /// BVH queries on the CPU, uploaded as a float texture.
    Cpu,
}

/// Scene configuration. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Directory the asset paths are resolved against.
    pub asset_root: PathBuf,
    pub mesh_path: PathBuf,
    pub intensity_path: PathBuf,
    pub colormap_path: PathBuf,
    pub volume: VolumeDims,
    /// Normalized depth of the rasterized slice.
    pub z_slice: f32,
    pub view_mode: ViewMode,
    pub colormap_window: [f32; 2],
    /// Cap on the device pixel ratio used for the back buffer.
    pub max_pixel_ratio: f64,
    pub sdf_backend: SdfBackend,
    /// Recentre the mesh on its vertex mean before building the BVH.
    pub center_mesh: bool,
    pub snapshot_path: PathBuf,
    pub snapshot_size: [u32; 2],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            mesh_path: PathBuf::from("20230506133355-layer-0.obj"),
            intensity_path: PathBuf::from("00000.png"),
            colormap_path: PathBuf::from("textures/cm_viridis.png"),
            volume: VolumeDims::default(),
            z_slice: 0.5,
            view_mode: ViewMode::default(),
            colormap_window: [0.5, 0.9],
            max_pixel_ratio: 2.0,
            sdf_backend: SdfBackend::default(),
            center_mesh: false,
            snapshot_path: PathBuf::from("snapshot.png"),
            snapshot_size: [810, 789],
        }
    }
}

impl SceneConfig {
    /// Parse and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `sdfview.json` from `dir` if it exists, defaults otherwise.
    pub fn load_or_default(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            log::info!("loading config from {}", path.display());
            Self::from_file(&path)
        } else {
            log::info!("{} not found in {}, using defaults", CONFIG_FILE_NAME, dir.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let VolumeDims { w, h, d } = self.volume;
        if w == 0 || h == 0 || d == 0 {
            return Err(ConfigError::Invalid(format!("volume dimensions must be > 0, got {}x{}x{}", w, h, d)));
        }
        let [lo, hi] = self.colormap_window;
        if !(hi > lo) {
            return Err(ConfigError::Invalid(format!("colormap_window must be increasing, got [{}, {}]", lo, hi)));
        }
        if !(self.max_pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid("max_pixel_ratio must be > 0".to_string()));
        }
        if self.snapshot_size[0] == 0 || self.snapshot_size[1] == 0 {
            return Err(ConfigError::Invalid("snapshot_size must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn mesh_file(&self) -> PathBuf {
        self.asset_root.join(&self.mesh_path)
    }

    pub fn intensity_file(&self) -> PathBuf {
        self.asset_root.join(&self.intensity_path)
    }

    pub fn colormap_file(&self) -> PathBuf {
        self.asset_root.join(&self.colormap_path)
    }

    /// Initial render parameters; screen aspect starts equal to the volume aspect.
    pub fn render_params(&self) -> RenderParams {
        RenderParams::new(self.volume, self.view_mode, self.colormap_window)
    }
}
