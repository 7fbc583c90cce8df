use std::path::PathBuf;

use crate::crs::ReferenceSystem;
use crate::geometry::Bounds2D;

/// Position of a tile inside its catalog.
pub type TileId = usize;

/// One file of a spatially partitioned dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRef {
    pub id: TileId,
    pub path: PathBuf,
    pub bounds: Bounds2D,
    pub crs: ReferenceSystem,
}

impl TileRef {
    pub fn new(id: TileId, path: impl Into<PathBuf>, bounds: Bounds2D, crs: ReferenceSystem) -> Self {
        Self {
            id,
            path: path.into(),
            bounds,
            crs,
        }
    }
}
