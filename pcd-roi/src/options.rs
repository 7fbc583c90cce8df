use pcd_parser::reader::ReaderOptions;
use serde::{Deserialize, Serialize};

/// Per-call settings of an extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// `0` or `1` runs sequentially on the calling thread.
    pub workers: usize,
    /// Log one progress line per extracted ROI.
    pub progress: bool,
    pub reader: ReaderOptions,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            progress: false,
            reader: ReaderOptions::default(),
        }
    }
}
