//! Header scan turning tile files into [`TileRef`]s.

use std::path::{Path, PathBuf};

use las::Reader;
use pcd_core::geometry::Bounds2D;
use pcd_core::tile::TileRef;
use pcd_crs::CrsCodec;
use rayon::iter::{IndexedParallelIterator as _, IntoParallelRefIterator as _, ParallelIterator as _};

use crate::ReadError;

/// Reads the header of every file in parallel. Tile ids follow the order of
/// `paths`. Only headers are touched; no point record is decoded.
pub fn scan_tiles<P>(paths: &[P], codec: &CrsCodec) -> Result<Vec<TileRef>, ReadError>
where
    P: AsRef<Path> + Sync,
{
    let tiles = paths
        .par_iter()
        .enumerate()
        .map(|(id, path)| scan_tile(id, path.as_ref(), codec))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("scanned {} tile headers", tiles.len());
    Ok(tiles)
}

fn scan_tile(id: usize, path: &Path, codec: &CrsCodec) -> Result<TileRef, ReadError> {
    let reader = Reader::from_path(path).map_err(|source| ReadError::Las {
        path: path.to_path_buf(),
        source,
    })?;
    let bounds = reader.header().bounds();
    let bounds = Bounds2D::new(bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y);
    if !(bounds.min_x <= bounds.max_x && bounds.min_y <= bounds.max_y) {
        return Err(ReadError::Other {
            path: path.to_path_buf(),
            message: format!("header bounds are inverted: {bounds:?}"),
        });
    }

    let crs = codec.get(path).map_err(|source| ReadError::Crs {
        path: path.to_path_buf(),
        source,
    })?;

    log::debug!("tile {id}: {path:?} {bounds:?} {crs}");
    Ok(TileRef::new(id, PathBuf::from(path), bounds, crs))
}
