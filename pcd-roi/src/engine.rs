use std::time::Instant;

use pcd_core::pointcloud::clip::{PlanimetricClipper, ShapeClipper};
use pcd_parser::reader::las::LasTileReader;
use pcd_parser::reader::TileReader;

use crate::coalesce::coalesce;
use crate::dispatch::Dispatcher;
use crate::extract::BatchJob;
use crate::progress::{LogProgress, NoProgress, ProgressSink};
use crate::reassemble::{reassemble, ExtractionResult};
use crate::{Catalog, ExtractOptions, RoiError, RoiSet};

/// Extracts ROIs from a catalog: resolve, coalesce, dispatch, reassemble.
pub struct RoiEngine {
    catalog: Catalog,
    reader: Box<dyn TileReader>,
    clipper: Box<dyn ShapeClipper>,
}

impl RoiEngine {
    /// An engine reading LAS/LAZ tiles and clipping planimetrically.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            reader: Box::new(LasTileReader),
            clipper: Box::new(PlanimetricClipper),
        }
    }

    pub fn with_reader(mut self, reader: impl TileReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn with_clipper(mut self, clipper: impl ShapeClipper + 'static) -> Self {
        self.clipper = Box::new(clipper);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Column form of [`RoiEngine::extract`]. The columns are validated
    /// before any tile is touched.
    pub fn extract_arrays(
        &self,
        x: &[f64],
        y: &[f64],
        r: &[f64],
        r2: Option<&[f64]>,
        names: Option<&[String]>,
        options: &ExtractOptions,
    ) -> Result<ExtractionResult, RoiError> {
        let rois = RoiSet::from_arrays(x, y, r, r2, names)?;
        self.extract(&rois, options)
    }

    /// Progress goes to the log when `options.progress` is set.
    pub fn extract(&self, rois: &RoiSet, options: &ExtractOptions) -> Result<ExtractionResult, RoiError> {
        if options.progress {
            self.extract_with_progress(rois, options, &LogProgress::default())
        } else {
            self.extract_with_progress(rois, options, &NoProgress)
        }
    }

    /// Returns one slot per ROI in input order. A batch that fails to load
    /// leaves its slots empty; a crashed batch aborts the run with
    /// [`RoiError::WorkerCrashed`] carrying what had finished.
    pub fn extract_with_progress(
        &self,
        rois: &RoiSet,
        options: &ExtractOptions,
        progress: &dyn ProgressSink,
    ) -> Result<ExtractionResult, RoiError> {
        let start = Instant::now();

        let batches = coalesce(&self.catalog, rois);
        log::info!(
            "{} ROIs over {} tiles coalesced into {} batches",
            rois.len(),
            self.catalog.len(),
            batches.len()
        );

        let jobs = batches
            .into_iter()
            .enumerate()
            .map(|(i, batch)| BatchJob::new(i, batch, &options.reader, self.catalog.crs().clone()))
            .collect();

        progress.start(rois.len());
        let outcome = Dispatcher::new(self.reader.as_ref(), self.clipper.as_ref(), progress)
            .run(jobs, options.workers)?;
        progress.finish();

        let crash = outcome.crash.clone();
        let result = reassemble(rois, outcome);
        log::info!("extraction finished in {:?}", start.elapsed());

        match crash {
            Some(message) => Err(RoiError::WorkerCrashed {
                message,
                partial: Box::new(result),
            }),
            None => Ok(result),
        }
    }
}
