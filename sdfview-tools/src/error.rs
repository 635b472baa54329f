use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or preprocessing scene assets.
#[derive(Debug, Error)]
pub enum ToolsError {
    #[error("failed to load OBJ {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("OBJ {0} contains no mesh")]
    NoMesh(PathBuf),

    #[error("mesh {0} has no triangles")]
    EmptyMesh(PathBuf),

    #[error("{path}:{line}: malformed vertex record")]
    BadVertex { path: PathBuf, line: usize },

    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid volume dimensions {0}x{1}x{2}")]
    InvalidDims(u32, u32, u32),

    #[error("cannot split a {width}x{height} image into a {split}x{split} grid")]
    InvalidSplit { width: u32, height: u32, split: u32 },

    #[error("invalid preprocess config: {0}")]
    InvalidConfig(String),
}

impl ToolsError {
    pub(crate) fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| ToolsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
