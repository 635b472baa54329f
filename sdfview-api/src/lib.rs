//! Shared render backend API for sdfview.
//! Defines the scene types handed from the loader to the renderer, the per-frame
//! render parameters, and the RenderBackend traits so hosts drive the headless and
//! windowed backends through the same code path (prepare + render_frame).

mod backend;
mod config;
mod scene;

pub use backend::{RenderBackend, RenderBackendWindow};
pub use config::{ConfigError, SceneConfig, SdfBackend, CONFIG_FILE_NAME};
pub use scene::{FrameView, ImageData, MeshData, RenderParams, SceneAssets, ViewMode, VolumeDims};
pub use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
