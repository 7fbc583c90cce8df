use las::Reader;
use pcd_core::pointcloud::point::{Color, Point, PointAttributes, PointCloud};
use pcd_core::tile::TileRef;
use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};

use super::{ReaderOptions, TileReader};
use crate::ReadError;

/// Reads LAS/LAZ tiles with the `las` crate. Tiles of one request are decoded
/// concurrently and concatenated in request order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LasTileReader;

impl LasTileReader {
    fn read_tile(tile: &TileRef, options: &ReaderOptions) -> Result<PointCloud, ReadError> {
        let path = tile.path.as_path();
        let mut reader = Reader::from_path(path).map_err(|source| ReadError::Las {
            path: path.to_path_buf(),
            source,
        })?;

        let mut points = Vec::new();
        for las_point in reader.points() {
            let las_point = las_point.map_err(|source| ReadError::Las {
                path: path.to_path_buf(),
                source,
            })?;
            let point = Self::convert_las_point(las_point);
            if options.keeps(&point) {
                points.push(point);
            }
        }

        log::debug!("read {} points from {:?}", points.len(), path);
        Ok(PointCloud::new(points, tile.crs.clone()))
    }

    fn convert_las_point(las_point: las::Point) -> Point {
        let color = las_point
            .color
            .map(|c| Color {
                r: c.red,
                g: c.green,
                b: c.blue,
            })
            .unwrap_or(Color {
                r: 65535,
                g: 65535,
                b: 65535,
            });

        let attributes = PointAttributes {
            intensity: Some(las_point.intensity),
            return_number: Some(las_point.return_number),
            classification: Some(u8::from(las_point.classification)),
            scan_angle: Some(las_point.scan_angle),
            user_data: Some(las_point.user_data),
            point_source_id: Some(las_point.point_source_id),
            gps_time: las_point.gps_time,
        };

        Point {
            x: las_point.x,
            y: las_point.y,
            z: las_point.z,
            color,
            attributes,
        }
    }
}

impl TileReader for LasTileReader {
    fn read(&self, tiles: &[TileRef], options: &ReaderOptions) -> Result<PointCloud, ReadError> {
        let clouds = tiles
            .par_iter()
            .map(|tile| Self::read_tile(tile, options))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PointCloud::merge(clouds))
    }
}
