//! Headless snapshot: render one composited frame at `snapshot_size` and save it as PNG.
//! Falls back to the CPU distance field + compositor when no GPU adapter is available.
//! Run from the asset directory: cargo run -p viewer --bin sdf_snapshot

use std::time::Instant;

use sdfview_api::{FrameView, ImageData, RenderBackend, SceneAssets, SceneConfig};
use sdfview_bridge::SdfViewPlugin;
use sdfview_renderer::{render_cpu, CompositeInputs, RendererConfig};
use sdfview_tools::{generate_sdf_slice, MeshBvh};

fn render_gpu(plugin: &mut SdfViewPlugin, assets: &SceneAssets, view: &FrameView) -> Result<ImageData, String> {
    plugin.prepare(assets)?;
    plugin.render_frame(view)?;
    plugin.read_frame()
}

fn render_on_cpu(renderer_config: &RendererConfig, assets: &SceneAssets, view: &FrameView) -> ImageData {
    let bvh = MeshBvh::build(&assets.mesh, renderer_config.max_leaf_tris);
    let sdf = generate_sdf_slice(&bvh, assets.volume, assets.z_slice);
    let inputs = CompositeInputs {
        intensity: &assets.intensity,
        colormap: &assets.colormap,
        sdf: &sdf,
    };
    let (width, height) = view.viewport_size;
    render_cpu(&inputs, &view.params, width, height)
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let base = std::env::current_dir().map_err(|e| e.to_string())?;
    let config = SceneConfig::load_or_default(&base).map_err(|e| e.to_string())?;
    let assets = sdfview_tools::load_scene_assets(&config).map_err(|e| e.to_string())?;

    let [width, height] = config.snapshot_size;
    let mut params = config.render_params();
    params.set_viewport(width, height);
    let view = FrameView {
        viewport_size: (width, height),
        params,
    };

    let renderer_config = RendererConfig::from_scene(&config);
    let started = Instant::now();
    let frame = match SdfViewPlugin::headless(renderer_config.clone()) {
        Ok(mut plugin) => render_gpu(&mut plugin, &assets, &view)?,
        Err(e) => {
            log::warn!("no GPU available ({}), rendering on the CPU", e);
            render_on_cpu(&renderer_config, &assets, &view)
        }
    };
    log::info!("rendered {}x{} in {:?}", frame.width, frame.height, started.elapsed());

    let path = base.join(&config.snapshot_path);
    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.data)
        .ok_or("frame buffer does not match its dimensions")?;
    image.save(&path).map_err(|e| format!("save {}: {}", path.display(), e))?;
    log::info!("wrote {}", path.display());
    Ok(())
}
