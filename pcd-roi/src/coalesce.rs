use std::collections::BTreeMap;

use pcd_core::geometry::Bounds2D;
use pcd_core::tile::{TileId, TileRef};

use crate::index::SpatialIndex;
use crate::{Catalog, Roi, RoiSet};

/// ROIs resolving to exactly the same tile set. `rois` keeps input order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBatch {
    pub tiles: Vec<TileRef>,
    pub rois: Vec<Roi>,
}

impl QueryBatch {
    pub fn tile_ids(&self) -> Vec<TileId> {
        self.tiles.iter().map(|t| t.id).collect()
    }

    /// Union of the ROI envelopes, or `None` for a batch without ROIs.
    pub fn envelope(&self) -> Option<Bounds2D> {
        self.rois
            .iter()
            .map(|roi| roi.shape.envelope())
            .reduce(|acc, e| acc.union(&e))
    }
}

/// Groups ROIs by resolved tile set. ROIs outside the catalog form a batch
/// with no tiles.
pub fn coalesce(catalog: &Catalog, rois: &RoiSet) -> Vec<QueryBatch> {
    // `locate` returns ascending ids, so equal sets have equal keys
    let mut groups: BTreeMap<Vec<TileId>, Vec<Roi>> = BTreeMap::new();
    for roi in rois {
        groups
            .entry(catalog.locate(&roi.shape))
            .or_default()
            .push(roi.clone());
    }

    groups
        .into_iter()
        .map(|(ids, rois)| QueryBatch {
            tiles: ids
                .iter()
                .filter_map(|&id| catalog.tile(id).cloned())
                .collect(),
            rois,
        })
        .collect()
}
