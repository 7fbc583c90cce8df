use std::path::Path;

use pcd_core::crs::ReferenceSystem;
use pcd_core::geometry::Bounds2D;
use pcd_core::tile::{TileId, TileRef};
use pcd_crs::CrsCodec;
use pcd_parser::catalog::scan_tiles;

use crate::index::TileIndex;
use crate::RoiError;

/// The tiles of one dataset, sharing one reference system.
#[derive(Debug, Clone)]
pub struct Catalog {
    tiles: Vec<TileRef>,
    crs: ReferenceSystem,
    extent: Bounds2D,
    index: TileIndex,
}

impl Catalog {
    /// Tile ids are reassigned to positions in `tiles`.
    pub fn new(mut tiles: Vec<TileRef>, codec: &CrsCodec) -> Result<Self, RoiError> {
        let Some(first) = tiles.first() else {
            return Err(RoiError::EmptyCatalog);
        };

        if let Some(other) = tiles
            .iter()
            .find(|t| !codec.same_reference_system(&first.crs, &t.crs))
        {
            return Err(RoiError::InconsistentCatalog {
                first: first.path.clone(),
                first_crs: first.crs.to_string(),
                other: other.path.clone(),
                other_crs: other.crs.to_string(),
            });
        }

        let crs = first.crs.clone();
        let extent = tiles
            .iter()
            .skip(1)
            .fold(first.bounds, |acc, t| acc.union(&t.bounds));
        for (id, tile) in tiles.iter_mut().enumerate() {
            tile.id = id;
        }

        if crs.is_undefined() {
            log::warn!("catalog tiles carry no reference system");
        }
        let index = TileIndex::new(&tiles);
        Ok(Self {
            tiles,
            crs,
            extent,
            index,
        })
    }

    /// Scans the headers of `paths` and builds the catalog from them.
    pub fn open<P>(paths: &[P], codec: &CrsCodec) -> Result<Self, RoiError>
    where
        P: AsRef<Path> + Sync,
    {
        let tiles = scan_tiles(paths, codec)?;
        Self::new(tiles, codec)
    }

    pub fn tiles(&self) -> &[TileRef] {
        &self.tiles
    }

    pub fn tile(&self, id: TileId) -> Option<&TileRef> {
        self.tiles.get(id)
    }

    pub fn crs(&self) -> &ReferenceSystem {
        &self.crs
    }

    pub fn extent(&self) -> Bounds2D {
        self.extent
    }

    pub(crate) fn index(&self) -> &TileIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
