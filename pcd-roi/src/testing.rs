//! Shared fixtures for the engine tests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use pcd_core::crs::ReferenceSystem;
use pcd_core::geometry::Bounds2D;
use pcd_core::pointcloud::point::{Point, PointCloud};
use pcd_core::tile::{TileId, TileRef};
use pcd_parser::reader::{ReaderOptions, TileReader};
use pcd_parser::ReadError;

/// `cols x rows` tiles of `size` units, row-major from the origin.
pub fn grid_tiles(cols: usize, rows: usize, size: f64) -> Vec<TileRef> {
    let mut tiles = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let (x, y) = (col as f64 * size, row as f64 * size);
            tiles.push(TileRef::new(
                tiles.len(),
                PathBuf::from(format!("tile_{col}_{row}.las")),
                Bounds2D::new(x, y, x + size, y + size),
                ReferenceSystem::Epsg(26917),
            ));
        }
    }
    tiles
}

/// One point per unit grid node inside each tile's bounds, edges included.
pub fn grid_points(bounds: &Bounds2D) -> Vec<Point> {
    let mut points = Vec::new();
    let mut x = bounds.min_x;
    while x <= bounds.max_x {
        let mut y = bounds.min_y;
        while y <= bounds.max_y {
            points.push(Point::new(x, y, 0.0));
            y += 1.0;
        }
        x += 1.0;
    }
    points
}

/// Reader test double: records every call, serves grid points, fails or
/// panics on configured tiles.
#[derive(Default)]
pub struct CountingReader {
    pub calls: Mutex<Vec<Vec<TileId>>>,
    pub failing: HashSet<TileId>,
    pub panicking: HashSet<TileId>,
    pub serial_only: bool,
    /// A panicking read first waits until this many reads have started.
    pub panic_after_calls: usize,
    pub windows: Mutex<HashMap<Vec<TileId>, Option<Bounds2D>>>,
}

impl CountingReader {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn sorted_calls(&self) -> Vec<Vec<TileId>> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl TileReader for CountingReader {
    fn read(&self, tiles: &[TileRef], options: &ReaderOptions) -> Result<PointCloud, ReadError> {
        let ids: Vec<TileId> = tiles.iter().map(|t| t.id).collect();
        self.calls.lock().unwrap().push(ids.clone());
        self.windows.lock().unwrap().insert(ids, options.window);

        if let Some(tile) = tiles.iter().find(|t| self.panicking.contains(&t.id)) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while self.call_count() < self.panic_after_calls && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
            panic!("reader blew up on {:?}", tile.path);
        }
        if let Some(tile) = tiles.iter().find(|t| self.failing.contains(&t.id)) {
            return Err(ReadError::Other {
                path: tile.path.clone(),
                message: "corrupt header".to_string(),
            });
        }

        let points = tiles
            .iter()
            .flat_map(|t| grid_points(&t.bounds))
            .filter(|p| options.keeps(p))
            .collect();
        Ok(PointCloud::new(points, tiles[0].crs.clone()))
    }

    fn parallel_safe(&self) -> bool {
        !self.serial_only
    }
}
