//! Volume preprocessing: per-layer tile grids and the layer overview.

use std::path::Path;

use crate::error::ToolsError;
use crate::meta::{layer_id, reset_dir, write_json, Clip, LayerTileMeta, TileEntry, VolumeEntry, VolumeMeta};

pub const DEFAULT_SPLIT: u32 = 10;
pub const DEFAULT_LAYER_INTERVAL: u32 = 50;

/// Pixel rectangle of one tile; `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
    pub idx: u32,
    pub idy: u32,
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl TileRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn clip(&self, layer: u32) -> Clip {
        Clip {
            x: self.left,
            y: self.top,
            z: layer,
            w: self.width(),
            h: self.height(),
            d: 1,
        }
    }
}

/// Column-major `split` x `split` grid over a `width` x `height` image.
/// The last column and row absorb the remainder.
pub fn tile_rects(width: u32, height: u32, split: u32) -> Result<Vec<TileRect>, ToolsError> {
    if split == 0 || width < split || height < split {
        return Err(ToolsError::InvalidSplit { width, height, split });
    }
    let (w, h) = (width / split, height / split);
    let mut rects = Vec::with_capacity((split * split) as usize);
    for idx in 0..split {
        for idy in 0..split {
            let right = if idx == split - 1 { width } else { w * (idx + 1) };
            let bottom = if idy == split - 1 { height } else { h * (idy + 1) };
            rects.push(TileRect {
                idx,
                idy,
                left: w * idx,
                top: h * idy,
                right,
                bottom,
            });
        }
    }
    Ok(rects)
}

/// `cell_yxz_<row>_<col>_<layer>.tif`
pub fn tile_name(rect: &TileRect, layer: u32) -> String {
    format!("cell_yxz_{:03}_{:03}_{}.tif", rect.idy, rect.idx, layer_id(layer))
}

/// Every `interval`-th layer from 0 through `max_layer`.
pub fn volume_layers(max_layer: u32, interval: u32) -> Vec<u32> {
    if interval == 0 {
        return vec![0];
    }
    (0..=max_layer / interval).map(|i| i * interval).collect()
}

/// Overview record for full-size layers of a `width` x `height` volume.
pub fn volume_meta(layers: &[u32], width: u32, height: u32) -> VolumeMeta {
    let volume = layers
        .iter()
        .map(|&layer| VolumeEntry {
            id: layer_id(layer),
            clip: Clip { x: 0, y: 0, z: layer, w: width, h: height, d: 1 },
        })
        .collect();
    VolumeMeta { volume }
}

/// Crop `image` into its tile grid under `out_dir` and write the layer's `meta.json` there.
pub fn split_layer_image(
    image: &image::DynamicImage,
    layer: u32,
    split: u32,
    out_dir: &Path,
) -> Result<LayerTileMeta, ToolsError> {
    std::fs::create_dir_all(out_dir).map_err(ToolsError::io(out_dir))?;
    let rects = tile_rects(image.width(), image.height(), split)?;
    let mut volume = Vec::with_capacity(rects.len());
    for rect in &rects {
        let name = tile_name(rect, layer);
        let path = out_dir.join(&name);
        image
            .crop_imm(rect.left, rect.top, rect.width(), rect.height())
            .save(&path)
            .map_err(|source| ToolsError::Image { path: path.clone(), source })?;
        volume.push(TileEntry {
            idx: rect.idx,
            idy: rect.idy,
            name,
            clip: rect.clip(layer),
        });
    }
    let meta = LayerTileMeta {
        split,
        layer: layer_id(layer),
        volume,
    };
    write_json(&out_dir.join("meta.json"), &meta)?;
    Ok(meta)
}

/// Inputs and output of `build_volume_tiles`.
pub struct VolumeTileJob<'a> {
    /// Full-resolution layers, `<layer>.tif`.
    pub layer_dir: &'a Path,
    /// Downscaled layers copied as-is into the overview.
    pub small_layer_dir: &'a Path,
    pub out_dir: &'a Path,
    pub layers: &'a [u32],
    pub split: u32,
    /// Full volume size recorded in the overview.
    pub width: u32,
    pub height: u32,
}

/// Rebuild `out_dir`: overview layers plus `meta.json`, then one tile folder per layer.
pub fn build_volume_tiles(job: &VolumeTileJob) -> Result<VolumeMeta, ToolsError> {
    reset_dir(job.out_dir)?;
    for &layer in job.layers {
        let name = format!("{}.tif", layer_id(layer));
        let from = job.small_layer_dir.join(&name);
        std::fs::copy(&from, job.out_dir.join(&name)).map_err(ToolsError::io(&from))?;
    }
    let meta = volume_meta(job.layers, job.width, job.height);
    write_json(&job.out_dir.join("meta.json"), &meta)?;

    for (i, &layer) in job.layers.iter().enumerate() {
        log::info!("tiling layer {} ({}/{})", layer_id(layer), i + 1, job.layers.len());
        let path = job.layer_dir.join(format!("{}.tif", layer_id(layer)));
        let image = image::open(&path).map_err(|source| ToolsError::Image { path, source })?;
        split_layer_image(&image, layer, job.split, &job.out_dir.join(layer_id(layer)))?;
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::read_json;

    fn gradient(w: u32, h: u32) -> image::DynamicImage {
        image::DynamicImage::ImageLuma8(image::GrayImage::from_fn(w, h, |x, y| image::Luma([(x + y * w) as u8])))
    }

    #[test]
    fn last_row_and_column_take_the_remainder() {
        let rects = tile_rects(23, 12, 5).unwrap();
        assert_eq!(rects.len(), 25);
        let corner = rects.iter().find(|r| r.idx == 4 && r.idy == 4).unwrap();
        assert_eq!((corner.left, corner.top, corner.width(), corner.height()), (16, 8, 7, 4));
        let inner = rects.iter().find(|r| r.idx == 1 && r.idy == 2).unwrap();
        assert_eq!((inner.left, inner.top, inner.width(), inner.height()), (4, 4, 4, 2));
        let covered: u32 = rects.iter().map(|r| r.width() * r.height()).sum();
        assert_eq!(covered, 23 * 12);
    }

    #[test]
    fn grid_is_column_major() {
        let rects = tile_rects(4, 4, 2).unwrap();
        let order: Vec<_> = rects.iter().map(|r| (r.idx, r.idy)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn split_larger_than_image_is_rejected() {
        assert!(matches!(tile_rects(3, 10, 4), Err(ToolsError::InvalidSplit { .. })));
        assert!(tile_rects(10, 10, 0).is_err());
    }

    #[test]
    fn tile_names_are_row_then_column() {
        let rect = TileRect { idx: 7, idy: 2, left: 0, top: 0, right: 1, bottom: 1 };
        assert_eq!(tile_name(&rect, 50), "cell_yxz_002_007_00050.tif");
    }

    #[test]
    fn layers_step_by_interval_through_max() {
        assert_eq!(volume_layers(120, 50), vec![0, 50, 100]);
        assert_eq!(volume_layers(150, 50), vec![0, 50, 100, 150]);
        assert_eq!(volume_layers(0, 50), vec![0]);
    }

    #[test]
    fn layer_split_writes_tiles_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("00050");
        let meta = split_layer_image(&gradient(7, 5), 50, 2, &out).unwrap();
        assert_eq!(meta.layer, "00050");
        assert_eq!(meta.volume.len(), 4);

        let last = &meta.volume[3];
        assert_eq!((last.idx, last.idy), (1, 1));
        assert_eq!(last.clip, Clip { x: 3, y: 2, z: 50, w: 4, h: 3, d: 1 });
        let tile = image::open(out.join(&last.name)).unwrap().to_luma8();
        assert_eq!(tile.dimensions(), (4, 3));
        assert_eq!(tile.get_pixel(0, 0).0[0], (3 + 2 * 7) as u8);

        let on_disk: LayerTileMeta = read_json(&out.join("meta.json")).unwrap();
        assert_eq!(on_disk, meta);
    }

    #[test]
    fn volume_build_copies_overview_and_tiles_each_layer() {
        let dir = tempfile::tempdir().unwrap();
        let (full, small, out) = (dir.path().join("full"), dir.path().join("small"), dir.path().join("volume"));
        std::fs::create_dir_all(&full).unwrap();
        std::fs::create_dir_all(&small).unwrap();
        for layer in [0, 50] {
            gradient(6, 6).save(full.join(format!("{}.tif", layer_id(layer)))).unwrap();
            gradient(3, 3).save(small.join(format!("{}.tif", layer_id(layer)))).unwrap();
        }
        let meta = build_volume_tiles(&VolumeTileJob {
            layer_dir: &full,
            small_layer_dir: &small,
            out_dir: &out,
            layers: &[0, 50],
            split: 3,
            width: 6,
            height: 6,
        })
        .unwrap();
        assert_eq!(meta.volume[1].clip, Clip { x: 0, y: 0, z: 50, w: 6, h: 6, d: 1 });
        assert!(out.join("00050.tif").is_file());
        assert!(out.join("00000").join("cell_yxz_002_002_00000.tif").is_file());
        assert_eq!(read_json::<VolumeMeta>(&out.join("meta.json")).unwrap(), meta);
    }
}
