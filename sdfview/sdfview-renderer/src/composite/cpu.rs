//! CPU reference compositor. Same per-fragment rules as `composite.wgsl`:
//! bilinear clamp-to-edge sampling for intensity and colormap, nearest texel for the
//! distance field, discarded fragments left at transparent black.

use sdfview_api::{ImageData, RenderParams, ViewMode};
use sdfview_tools::SdfSlice;

use super::mapping::{colormap_coord, remap_for};

/// Source rasters of one composite.
pub struct CompositeInputs<'a> {
    pub intensity: &'a ImageData,
    pub colormap: &'a ImageData,
    pub sdf: &'a SdfSlice,
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Bilinear sample with clamp-to-edge addressing. `srgb` decodes texels to linear first.
pub fn sample_bilinear(img: &ImageData, uv: [f32; 2], srgb: bool) -> [f32; 4] {
    let fetch = |x: i64, y: i64| -> [f32; 4] {
        let x = x.clamp(0, img.width as i64 - 1) as u32;
        let y = y.clamp(0, img.height as i64 - 1) as u32;
        let t = img.texel(x, y);
        let mut out = [0.0; 4];
        for c in 0..4 {
            let v = t[c] as f32 / 255.0;
            out[c] = if srgb && c < 3 { srgb_to_linear(v) } else { v };
        }
        out
    };
    let fx = uv[0] * img.width as f32 - 0.5;
    let fy = uv[1] * img.height as f32 - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let a = fetch(x0, y0);
    let b = fetch(x0 + 1, y0);
    let c = fetch(x0, y0 + 1);
    let d = fetch(x0 + 1, y0 + 1);
    let mut out = [0.0; 4];
    for i in 0..4 {
        let top = a[i] + (b[i] - a[i]) * tx;
        let bottom = c[i] + (d[i] - c[i]) * tx;
        out[i] = top + (bottom - top) * ty;
    }
    out
}

/// Nearest-texel distance sample with clamped coordinates.
pub fn sample_sdf(slice: &SdfSlice, uv: [f32; 2]) -> f32 {
    let x = ((uv[0] * slice.width as f32) as i64).clamp(0, slice.width as i64 - 1) as u32;
    let y = ((uv[1] * slice.height as f32) as i64).clamp(0, slice.height as i64 - 1) as u32;
    slice.get(x, y)
}

/// Linear RGBA for the fragment at screen `uv`, or None when it is discarded.
pub fn composite_pixel(uv: [f32; 2], params: &RenderParams, inputs: &CompositeInputs) -> Option<[f32; 4]> {
    let uv = remap_for(uv, params)?;
    let color = match params.view_mode {
        ViewMode::Colormap => {
            let intensity = sample_bilinear(inputs.intensity, uv, false)[0];
            let t = colormap_coord(intensity, params.colormap_window);
            let c = sample_bilinear(inputs.colormap, [t, 0.5], true);
            [c[0], c[1], c[2], 1.0]
        }
        ViewMode::DistanceField => [sample_sdf(inputs.sdf, uv), 0.0, 0.0, 1.0],
    };
    Some(color)
}

/// Composite a full `width` x `height` frame into sRGB-encoded RGBA8.
pub fn render_cpu(inputs: &CompositeInputs, params: &RenderParams, width: u32, height: u32) -> ImageData {
    let mut data = vec![0u8; ImageData::rgba_len(width, height)];
    for y in 0..height {
        for x in 0..width {
            let uv = [(x as f32 + 0.5) / width as f32, (y as f32 + 0.5) / height as f32];
            if let Some(c) = composite_pixel(uv, params, inputs) {
                let i = (y as usize * width as usize + x as usize) * 4;
                for ch in 0..3 {
                    data[i + ch] = (linear_to_srgb(c[ch]) * 255.0).round() as u8;
                }
                data[i + 3] = (c[3].clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
    }
    ImageData { data, width, height }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdfview_api::VolumeDims;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> ImageData {
        ImageData {
            data: px.iter().copied().cycle().take((w * h * 4) as usize).collect(),
            width: w,
            height: h,
        }
    }

    /// Black-to-white horizontal gradient strip.
    fn gray_ramp(w: u32) -> ImageData {
        let mut data = Vec::new();
        for x in 0..w {
            let v = (x * 255 / (w - 1)) as u8;
            data.extend_from_slice(&[v, v, v, 255]);
        }
        ImageData { data, width: w, height: 1 }
    }

    fn params(view_mode: ViewMode, screen_aspect: f32) -> RenderParams {
        let mut p = RenderParams::new(VolumeDims { w: 4, h: 4, d: 1 }, view_mode, [0.5, 0.9]);
        p.screen_aspect = screen_aspect;
        p
    }

    #[test]
    fn distance_field_mode_writes_red_channel() {
        let sdf = SdfSlice { width: 2, height: 2, data: vec![0.25, 0.5, 0.75, 1.0] };
        let intensity = solid(2, 2, [0, 0, 0, 255]);
        let colormap = gray_ramp(4);
        let inputs = CompositeInputs { intensity: &intensity, colormap: &colormap, sdf: &sdf };
        let p = params(ViewMode::DistanceField, 1.0);
        assert_eq!(composite_pixel([0.25, 0.25], &p, &inputs), Some([0.25, 0.0, 0.0, 1.0]));
        assert_eq!(composite_pixel([0.75, 0.75], &p, &inputs), Some([1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn colormap_mode_uses_window() {
        let sdf = SdfSlice { width: 1, height: 1, data: vec![9.0] };
        let colormap = gray_ramp(2);
        let inputs_low = CompositeInputs { intensity: &solid(2, 2, [128, 0, 0, 255]), colormap: &colormap, sdf: &sdf };
        let p = params(ViewMode::Colormap, 1.0);
        // 0.5 raw intensity sits at the bottom of the window: the gradient's first texel
        let low = composite_pixel([0.5, 0.5], &p, &inputs_low).unwrap();
        assert!(low[0] < 0.01, "got {:?}", low);
        assert_eq!(low[3], 1.0);
        // Saturated intensity lands past the window and clamps to the last texel
        let inputs_high = CompositeInputs { intensity: &solid(2, 2, [255, 0, 0, 255]), colormap: &colormap, sdf: &sdf };
        let high = composite_pixel([0.5, 0.5], &p, &inputs_high).unwrap();
        assert!((high[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_bounds_fragments_are_discarded() {
        let sdf = SdfSlice { width: 1, height: 1, data: vec![1.0] };
        let intensity = solid(1, 1, [255, 255, 255, 255]);
        let colormap = gray_ramp(2);
        let inputs = CompositeInputs { intensity: &intensity, colormap: &colormap, sdf: &sdf };
        let p = params(ViewMode::DistanceField, 2.0);
        assert_eq!(composite_pixel([0.0, 0.5], &p, &inputs), None);
        assert!(composite_pixel([0.5, 0.5], &p, &inputs).is_some());
    }

    #[test]
    fn wide_frame_is_pillarboxed() {
        let sdf = SdfSlice { width: 1, height: 1, data: vec![1.0] };
        let intensity = solid(1, 1, [255, 255, 255, 255]);
        let colormap = gray_ramp(2);
        let inputs = CompositeInputs { intensity: &intensity, colormap: &colormap, sdf: &sdf };
        let p = params(ViewMode::DistanceField, 2.0);
        let frame = render_cpu(&inputs, &p, 8, 4);
        // Columns 0 and 7 fall outside: untouched. Middle columns are red.
        assert_eq!(frame.texel(0, 1), [0, 0, 0, 0]);
        assert_eq!(frame.texel(7, 2), [0, 0, 0, 0]);
        assert_eq!(frame.texel(3, 1), [255, 0, 0, 255]);
        assert_eq!(frame.texel(4, 3), [255, 0, 0, 255]);
    }

    #[test]
    fn srgb_round_trip_endpoints() {
        assert_eq!(linear_to_srgb(0.0), 0.0);
        assert!((linear_to_srgb(1.0) - 1.0).abs() < 1e-6);
        assert!((srgb_to_linear(linear_to_srgb(0.3)) - 0.3).abs() < 1e-5);
    }
}
