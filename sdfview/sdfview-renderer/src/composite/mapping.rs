//! Per-fragment math of the compositing shader, mirrored on the CPU.

use sdfview_api::RenderParams;

/// Horizontal remap from screen UV to slice UV without the bounds check.
/// `u' = (u - 0.5) * (screen_aspect / volume_aspect) + 0.5`, `v' = v`.
pub fn remap_uv_unchecked(uv: [f32; 2], screen_aspect: f32, volume_aspect: f32) -> [f32; 2] {
    let ratio = screen_aspect / volume_aspect;
    [(uv[0] - 0.5) * ratio + 0.5, uv[1]]
}

/// Slice UV for a screen UV, or None when it falls outside [0,1]² and the fragment is discarded.
pub fn remap_uv(uv: [f32; 2], screen_aspect: f32, volume_aspect: f32) -> Option<[f32; 2]> {
    let mapped = remap_uv_unchecked(uv, screen_aspect, volume_aspect);
    let inside = |c: f32| (0.0..=1.0).contains(&c);
    if inside(mapped[0]) && inside(mapped[1]) {
        Some(mapped)
    } else {
        None
    }
}

pub fn remap_for(uv: [f32; 2], params: &RenderParams) -> Option<[f32; 2]> {
    remap_uv(uv, params.screen_aspect, params.volume_aspect)
}

/// Gradient coordinate for a raw intensity: `(val - lo) / (hi - lo)`. Not clamped.
pub fn colormap_coord(val: f32, window: [f32; 2]) -> f32 {
    (val - window[0]) / (window[1] - window[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUME_ASPECT: f32 = 810.0 / 789.0;
    const WIDE_SCREEN: f32 = 1.778;

    #[test]
    fn vertical_axis_is_identity() {
        for &v in &[-0.3f32, 0.0, 0.25, 0.5, 0.999, 1.0, 1.7] {
            for &u in &[0.0f32, 0.4, 1.0] {
                assert_eq!(remap_uv_unchecked([u, v], WIDE_SCREEN, VOLUME_ASPECT)[1], v);
            }
        }
    }

    #[test]
    fn matching_aspect_is_identity() {
        for &u in &[0.0f32, 0.1, 0.5, 0.77, 1.0] {
            let mapped = remap_uv([u, 0.3], VOLUME_ASPECT, VOLUME_ASPECT).unwrap();
            assert!((mapped[0] - u).abs() < 1e-6);
        }
    }

    #[test]
    fn center_maps_to_center() {
        for &screen in &[0.5f32, 1.0, WIDE_SCREEN, 3.0] {
            assert_eq!(remap_uv([0.5, 0.5], screen, VOLUME_ASPECT), Some([0.5, 0.5]));
        }
    }

    #[test]
    fn wide_screen_left_edge_is_discarded() {
        let ratio = WIDE_SCREEN / VOLUME_ASPECT;
        assert!((ratio - 1.731).abs() < 1e-3);
        let raw = remap_uv_unchecked([0.0, 0.5], WIDE_SCREEN, VOLUME_ASPECT);
        assert!((raw[0] + 0.366).abs() < 1e-3);
        assert_eq!(remap_uv([0.0, 0.5], WIDE_SCREEN, VOLUME_ASPECT), None);
        assert_eq!(remap_uv([1.0, 0.5], WIDE_SCREEN, VOLUME_ASPECT), None);
    }

    #[test]
    fn narrow_screen_keeps_full_width() {
        // Screen narrower than the data: every column samples inside, compressed horizontally
        let screen = 0.5;
        for &u in &[0.0f32, 0.25, 1.0] {
            assert!(remap_uv([u, 0.5], screen, VOLUME_ASPECT).is_some());
        }
        assert_eq!(remap_uv([0.5, 1.01], screen, VOLUME_ASPECT), None);
        assert_eq!(remap_uv([0.5, -0.01], screen, VOLUME_ASPECT), None);
    }

    #[test]
    fn colormap_window_endpoints_and_monotonic() {
        let window = [0.5, 0.9];
        assert_eq!(colormap_coord(0.5, window), 0.0);
        assert!((colormap_coord(0.9, window) - 1.0).abs() < 1e-6);
        let mut prev = f32::NEG_INFINITY;
        for i in 0..=20 {
            let t = colormap_coord(i as f32 / 20.0, window);
            assert!(t > prev);
            prev = t;
        }
        // Outside the window the coordinate leaves [0,1] unclamped
        assert!(colormap_coord(0.2, window) < 0.0);
        assert!(colormap_coord(1.0, window) > 1.0);
    }
}
