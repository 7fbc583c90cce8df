use std::path::{Path, PathBuf};

use pcd_crs::CrsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read LAS data from {path:?}: {source}")]
    Las {
        path: PathBuf,
        #[source]
        source: las::Error,
    },
    #[error("failed to read reference system of {path:?}: {source}")]
    Crs {
        path: PathBuf,
        #[source]
        source: CrsError,
    },
    #[error("failed to read {path:?}: {message}")]
    Other { path: PathBuf, message: String },
}

impl ReadError {
    /// The tile file the failure belongs to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Las { path, .. } | Self::Crs { path, .. } | Self::Other { path, .. } => path,
        }
    }
}
