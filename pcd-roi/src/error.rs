use std::path::PathBuf;

use pcd_crs::CrsError;
use pcd_parser::ReadError;
use thiserror::Error;

use crate::reassemble::ExtractionResult;

#[derive(Debug, Error)]
pub enum RoiError {
    #[error("invalid ROI geometry: {0}")]
    InvalidGeometry(String),
    #[error("duplicate ROI name: {0:?}")]
    DuplicateRoiName(String),
    #[error("failed to read tile {tile:?}: {reason}")]
    TileReadFailure { tile: PathBuf, reason: String },
    #[error("invalid reference system: {0}")]
    InvalidReferenceSystem(String),
    #[error("catalog is empty")]
    EmptyCatalog,
    #[error("tiles {first:?} ({first_crs}) and {other:?} ({other_crs}) use different reference systems")]
    InconsistentCatalog {
        first: PathBuf,
        first_crs: String,
        other: PathBuf,
        other_crs: String,
    },
    #[error("extraction worker crashed: {message}")]
    WorkerCrashed {
        message: String,
        /// Results of every batch that finished before the crash.
        partial: Box<ExtractionResult>,
    },
    #[error("failed to start worker pool: {0}")]
    PoolCreation(#[source] std::io::Error),
}

impl From<ReadError> for RoiError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Crs {
                source: CrsError::InvalidReferenceSystem(message),
                ..
            } => RoiError::InvalidReferenceSystem(message),
            other => RoiError::TileReadFailure {
                tile: other.path().to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}
