//! `meta.json` records written next to preprocessed tiles and segment clips.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ToolsError;

/// Integer box in volume voxels: origin plus extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub w: u32,
    pub h: u32,
    pub d: u32,
}

/// One full-size layer in the volume overview.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEntry {
    pub id: String,
    pub clip: Clip,
}

/// `volume/meta.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMeta {
    pub volume: Vec<VolumeEntry>,
}

/// One tile of a split layer. `idx` is the column, `idy` the row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEntry {
    pub idx: u32,
    pub idy: u32,
    pub name: String,
    pub clip: Clip,
}

/// `volume/<layer>/meta.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerTileMeta {
    pub split: u32,
    pub layer: String,
    pub volume: Vec<TileEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub id: String,
    pub clip: Clip,
}

/// `segment/meta.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub segment: Vec<SegmentEntry>,
}

/// Zero-padded layer name used for folders, ids and file names.
pub fn layer_id(layer: u32) -> String {
    format!("{:05}", layer)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ToolsError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| ToolsError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(ToolsError::io(path))
}

pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ToolsError> {
    let text = std::fs::read_to_string(path).map_err(ToolsError::io(path))?;
    serde_json::from_str(&text).map_err(|source| ToolsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove `dir` if present and create it empty.
pub(crate) fn reset_dir(dir: &Path) -> Result<(), ToolsError> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(ToolsError::io(dir))?;
    }
    std::fs::create_dir_all(dir).map_err(ToolsError::io(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_ids_are_zero_padded() {
        assert_eq!(layer_id(0), "00000");
        assert_eq!(layer_id(650), "00650");
    }

    #[test]
    fn clip_serializes_flat() {
        let entry = SegmentEntry {
            id: "20230505164332".to_string(),
            clip: Clip { x: 1, y: 2, z: 3, w: 4, h: 5, d: 6 },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["clip"]["d"], 6);
        assert_eq!(value["id"], "20230505164332");
    }

    #[test]
    fn meta_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        let meta = VolumeMeta {
            volume: vec![VolumeEntry { id: layer_id(50), clip: Clip { z: 50, w: 8, h: 4, d: 1, ..Clip::default() } }],
        };
        write_json(&path, &meta).unwrap();
        assert_eq!(read_json::<VolumeMeta>(&path).unwrap(), meta);
    }

    #[test]
    fn reset_dir_clears_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("stale.tif"), b"x").unwrap();
        reset_dir(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }
}
