use pcd_core::pointcloud::point::PointCloud;

use crate::dispatch::{BatchFailure, DispatchOutcome};
use crate::RoiSet;

/// One slot of the result, matching the ROI at the same input position.
#[derive(Debug, Clone)]
pub struct RoiOutput {
    pub name: String,
    /// `None` when the ROI's batch failed.
    pub subset: Option<PointCloud>,
}

#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub outputs: Vec<RoiOutput>,
    pub failures: Vec<BatchFailure>,
}

impl ExtractionResult {
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RoiOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.outputs
            .iter()
            .filter(|o| o.subset.is_none())
            .map(|o| o.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RoiOutput> {
        self.outputs.iter()
    }
}

impl IntoIterator for ExtractionResult {
    type Item = RoiOutput;
    type IntoIter = std::vec::IntoIter<RoiOutput>;

    fn into_iter(self) -> Self::IntoIter {
        self.outputs.into_iter()
    }
}

/// Lays the collected subsets out in input order, one slot per ROI.
pub fn reassemble(rois: &RoiSet, outcome: DispatchOutcome) -> ExtractionResult {
    let DispatchOutcome {
        mut subsets,
        failures,
        ..
    } = outcome;

    let outputs = rois
        .iter()
        .map(|roi| RoiOutput {
            name: roi.name.clone(),
            subset: subsets.remove(&roi.name),
        })
        .collect();

    ExtractionResult { outputs, failures }
}
