use pcd_core::geometry::Bounds2D;
use pcd_core::pointcloud::clip::Shape;
use pcd_core::tile::{TileId, TileRef};
use rstar::{RTree, RTreeObject, AABB};

use crate::Catalog;

pub trait SpatialIndex {
    /// Ids of the tiles whose bounds touch `envelope`, ascending.
    fn query(&self, envelope: &Bounds2D) -> Vec<TileId>;

    /// Tiles intersecting the shape's envelope. Shared edges count for both
    /// neighbors, so a ROI on a seam resolves to both tiles.
    fn locate(&self, shape: &Shape) -> Vec<TileId> {
        self.query(&shape.envelope())
    }
}

#[derive(Debug, Clone)]
struct TileBox {
    id: TileId,
    env: AABB<[f64; 2]>,
}

impl RTreeObject for TileBox {
    type Envelope = AABB<[f64; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

fn aabb(bounds: &Bounds2D) -> AABB<[f64; 2]> {
    AABB::from_corners([bounds.min_x, bounds.min_y], [bounds.max_x, bounds.max_y])
}

/// R-tree over tile bounds. Envelope intersection is inclusive, like
/// [`Bounds2D::intersects`].
#[derive(Debug, Clone)]
pub struct TileIndex {
    tree: RTree<TileBox>,
}

impl TileIndex {
    pub fn new(tiles: &[TileRef]) -> Self {
        let boxes = tiles
            .iter()
            .map(|tile| TileBox {
                id: tile.id,
                env: aabb(&tile.bounds),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(boxes),
        }
    }
}

impl SpatialIndex for TileIndex {
    fn query(&self, envelope: &Bounds2D) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self
            .tree
            .locate_in_envelope_intersecting(&aabb(envelope))
            .map(|tile| tile.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl SpatialIndex for Catalog {
    fn query(&self, envelope: &Bounds2D) -> Vec<TileId> {
        self.index().query(envelope)
    }
}
