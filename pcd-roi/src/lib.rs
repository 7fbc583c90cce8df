pub mod catalog;
pub mod coalesce;
pub mod dispatch;
pub mod engine;
mod error;
pub mod extract;
pub mod index;
pub mod options;
pub mod progress;
pub mod reassemble;
pub mod roi;

pub use catalog::Catalog;
pub use engine::RoiEngine;
pub use error::RoiError;
pub use options::ExtractOptions;
pub use reassemble::{ExtractionResult, RoiOutput};
pub use roi::{Roi, RoiSet};

#[cfg(test)]
pub(crate) mod testing;
