//! sdfview bridge: implements sdfview_api::RenderBackend using sdfview-renderer.

mod plugin;
mod window_backend;

pub use plugin::SdfViewPlugin;
pub use window_backend::{backbuffer_size, SdfViewWindowBackend};
