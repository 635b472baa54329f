//! Trait for render backends (headless or windowed). Host uses this to call prepare/render_frame uniformly.

use crate::{FrameView, SceneAssets};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Render backend that the host can use regardless of whether it draws offscreen or to a window.
pub trait RenderBackend: Send {
    /// Prepare phase: upload scene textures, build the BVH and generate the distance-field slice.
    /// Called once per loaded asset set.
    fn prepare(&mut self, assets: &SceneAssets) -> Result<(), String>;

    /// Render one frame. Submits work internally; caller does not need to submit command buffers.
    fn render_frame(&mut self, view: &FrameView) -> Result<(), String>;
}

/// Extension for backends that can present to a window. Host passes raw handles (e.g. from winit);
/// the backend owns the surface and performs get_current_texture + present internally.
pub trait RenderBackendWindow: RenderBackend + Send {
    /// Render one frame and present to the window identified by the given raw handles.
    /// The backend configures the surface from `view.viewport_size` and submits work.
    fn render_frame_to_window(
        &mut self,
        view: &FrameView,
        raw_window_handle: RawWindowHandle,
        raw_display_handle: RawDisplayHandle,
    ) -> Result<(), String>;
}
