//! Cut the raw dataset into viewer assets: per-layer tile grids and segment clip boxes.
//! Reads preprocess.json from the working directory: cargo run -p viewer --bin sdf_preprocess

use std::time::Instant;

use sdfview_tools::{run_preprocess, PreprocessConfig};

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let base = std::env::current_dir().map_err(|e| e.to_string())?;
    let config = PreprocessConfig::load_or_default(&base)
        .map_err(|e| e.to_string())?
        .resolved(&base);
    let started = Instant::now();
    if let Err(e) = run_preprocess(&config) {
        log::error!("preprocessing failed: {}", e);
        return Err(e.to_string());
    }
    log::info!("preprocessed into {} in {:?}", config.output_dir.display(), started.elapsed());
    Ok(())
}
