use itertools::Itertools as _;
use pcd_core::crs::ReferenceSystem;
use pcd_core::pointcloud::clip::ShapeClipper;
use pcd_core::pointcloud::point::PointCloud;
use pcd_parser::reader::{ReaderOptions, TileReader};

use crate::coalesce::QueryBatch;
use crate::RoiError;

/// Everything a worker needs for one batch, handed over by value.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub index: usize,
    pub batch: QueryBatch,
    pub reader_options: ReaderOptions,
    /// Reference system given to subsets of ROIs that hit no tile.
    pub crs: ReferenceSystem,
}

/// Subsets of one batch, in the batch's ROI order.
pub type BatchOutput = Vec<(String, PointCloud)>;

impl BatchJob {
    /// The read window is narrowed to the union of the batch's ROI envelopes.
    pub fn new(index: usize, batch: QueryBatch, options: &ReaderOptions, crs: ReferenceSystem) -> Self {
        let reader_options = match batch.envelope() {
            Some(envelope) => options.with_window(envelope),
            None => options.clone(),
        };
        Self {
            index,
            batch,
            reader_options,
            crs,
        }
    }

    pub fn roi_names(&self) -> impl Iterator<Item = &str> {
        self.batch.rois.iter().map(|roi| roi.name.as_str())
    }

    /// Loads the batch's tiles once and clips every ROI out of the merged
    /// view. `on_roi` is called after each ROI.
    pub fn run(
        &self,
        reader: &dyn TileReader,
        clipper: &dyn ShapeClipper,
        mut on_roi: impl FnMut(&str),
    ) -> Result<BatchOutput, RoiError> {
        if self.batch.tiles.is_empty() {
            log::warn!(
                "ROIs outside the catalog extent: {}",
                self.roi_names().join(", ")
            );
            return Ok(self
                .batch
                .rois
                .iter()
                .map(|roi| {
                    on_roi(&roi.name);
                    (roi.name.clone(), PointCloud::empty(self.crs.clone()))
                })
                .collect());
        }

        log::debug!(
            "batch {}: reading tiles {:?} for {} ROIs",
            self.index,
            self.batch.tile_ids(),
            self.batch.rois.len()
        );
        let merged = reader.read(&self.batch.tiles, &self.reader_options)?;

        let mut output = Vec::with_capacity(self.batch.rois.len());
        for roi in &self.batch.rois {
            let subset = clipper.clip(&merged, &roi.shape);
            log::debug!("{}: {} points", roi.name, subset.len());
            output.push((roi.name.clone(), subset));
            on_roi(&roi.name);
        }
        drop(merged);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use pcd_core::geometry::Bounds2D;
    use pcd_core::pointcloud::clip::PlanimetricClipper;

    use super::*;
    use crate::testing::{grid_tiles, CountingReader};
    use crate::Roi;

    fn job(tiles: usize, rois: Vec<Roi>) -> BatchJob {
        let batch = QueryBatch {
            tiles: grid_tiles(2, 1, 100.0).into_iter().take(tiles).collect(),
            rois,
        };
        BatchJob::new(0, batch, &ReaderOptions::default(), ReferenceSystem::Epsg(26917))
    }

    #[test]
    fn one_read_serves_every_roi_of_the_batch() {
        let reader = CountingReader::default();
        let job = job(
            1,
            vec![
                Roi::circle("a", 10.0, 10.0, 2.0),
                Roi::rectangle("b", 50.0, 50.0, 3.0, 1.0),
            ],
        );

        let mut ticks = Vec::new();
        let output = job
            .run(&reader, &PlanimetricClipper, |name| ticks.push(name.to_string()))
            .unwrap();

        assert_eq!(reader.call_count(), 1);
        assert_eq!(ticks, ["a", "b"]);
        assert_eq!(output[0].0, "a");
        // unit grid points within radius 2 of (10, 10)
        assert_eq!(output[0].1.len(), 13);
        assert_eq!(output[1].1.len(), 7 * 3);
    }

    #[test]
    fn reader_window_is_the_union_of_roi_envelopes() {
        let reader = CountingReader::default();
        let job = job(
            1,
            vec![
                Roi::circle("a", 10.0, 10.0, 2.0),
                Roi::circle("b", 30.0, 20.0, 2.0),
            ],
        );
        assert_eq!(
            job.reader_options.window,
            Some(Bounds2D::new(8.0, 8.0, 32.0, 22.0))
        );
        job.run(&reader, &PlanimetricClipper, |_| {}).unwrap();
        assert_eq!(
            reader.windows.lock().unwrap()[&vec![0]],
            Some(Bounds2D::new(8.0, 8.0, 32.0, 22.0))
        );
    }

    #[test]
    fn rois_outside_the_catalog_get_empty_subsets_without_reading() {
        let reader = CountingReader::default();
        let job = job(0, vec![Roi::circle("far", -500.0, 0.0, 1.0)]);
        let output = job.run(&reader, &PlanimetricClipper, |_| {}).unwrap();
        assert_eq!(reader.call_count(), 0);
        assert!(output[0].1.is_empty());
        assert_eq!(output[0].1.metadata.crs, ReferenceSystem::Epsg(26917));
    }

    #[test]
    fn read_failure_names_the_tile() {
        let reader = CountingReader {
            failing: [1].into(),
            ..Default::default()
        };
        let job = job(2, vec![Roi::circle("edge", 99.0, 50.0, 2.0)]);
        let err = job.run(&reader, &PlanimetricClipper, |_| {}).unwrap_err();
        assert!(matches!(
            err,
            RoiError::TileReadFailure { ref tile, .. } if tile.ends_with("tile_1_0.las")
        ));
    }
}
