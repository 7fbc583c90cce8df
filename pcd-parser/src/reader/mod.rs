pub mod las;

use std::sync::Arc;

use pcd_core::geometry::Bounds2D;
use pcd_core::pointcloud::point::{Point, PointCloud};
use pcd_core::tile::TileRef;
use serde::{Deserialize, Serialize};

use crate::ReadError;

/// Point filters applied while tiles are decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// ASPRS classification codes to keep; all classes when `None`.
    pub keep_classes: Option<Vec<u8>>,
    /// Inclusive elevation range.
    pub z_range: Option<(f64, f64)>,
    /// Planimetric read window; points outside are never materialized.
    pub window: Option<Bounds2D>,
}

impl ReaderOptions {
    pub fn with_window(&self, window: Bounds2D) -> Self {
        let window = match self.window {
            Some(existing) if existing.intersects(&window) => Bounds2D::new(
                existing.min_x.max(window.min_x),
                existing.min_y.max(window.min_y),
                existing.max_x.min(window.max_x),
                existing.max_y.min(window.max_y),
            ),
            // disjoint: the configured window still applies, nothing of `window` survives it
            Some(existing) => existing,
            None => window,
        };
        Self {
            window: Some(window),
            ..self.clone()
        }
    }

    pub fn keeps(&self, point: &Point) -> bool {
        if let Some(window) = &self.window {
            if !window.contains(point.x, point.y) {
                return false;
            }
        }
        if let Some((min_z, max_z)) = self.z_range {
            if point.z < min_z || point.z > max_z {
                return false;
            }
        }
        if let Some(classes) = &self.keep_classes {
            match point.attributes.classification {
                Some(class) if classes.contains(&class) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Loads a set of tiles as one merged point cloud.
pub trait TileReader: Send + Sync {
    fn read(&self, tiles: &[TileRef], options: &ReaderOptions) -> Result<PointCloud, ReadError>;

    /// Whether `read` may run on several threads at once.
    fn parallel_safe(&self) -> bool {
        true
    }
}

impl<R: TileReader + ?Sized> TileReader for Arc<R> {
    fn read(&self, tiles: &[TileRef], options: &ReaderOptions) -> Result<PointCloud, ReadError> {
        (**self).read(tiles, options)
    }

    fn parallel_safe(&self) -> bool {
        (**self).parallel_safe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(x: f64, y: f64, z: f64, class: u8) -> Point {
        let mut p = Point::new(x, y, z);
        p.attributes.classification = Some(class);
        p
    }

    #[test]
    fn default_options_keep_everything() {
        let options = ReaderOptions::default();
        assert!(options.keeps(&Point::new(-1e9, 1e9, 0.0)));
    }

    #[test]
    fn filters_combine() {
        let options = ReaderOptions {
            keep_classes: Some(vec![2]),
            z_range: Some((0.0, 50.0)),
            window: Some(Bounds2D::new(0.0, 0.0, 10.0, 10.0)),
        };
        assert!(options.keeps(&classified(5.0, 5.0, 10.0, 2)));
        assert!(options.keeps(&classified(10.0, 0.0, 50.0, 2)));
        assert!(!options.keeps(&classified(5.0, 5.0, 10.0, 5)));
        assert!(!options.keeps(&classified(5.0, 5.0, 51.0, 2)));
        assert!(!options.keeps(&classified(11.0, 5.0, 10.0, 2)));
        assert!(!options.keeps(&Point::new(5.0, 5.0, 10.0)));
    }

    #[test]
    fn with_window_narrows_an_existing_window() {
        let options = ReaderOptions {
            window: Some(Bounds2D::new(0.0, 0.0, 10.0, 10.0)),
            ..Default::default()
        };
        let narrowed = options.with_window(Bounds2D::new(5.0, -5.0, 20.0, 5.0));
        assert_eq!(narrowed.window, Some(Bounds2D::new(5.0, 0.0, 10.0, 5.0)));

        let disjoint = options.with_window(Bounds2D::new(50.0, 50.0, 60.0, 60.0));
        assert_eq!(disjoint.window, options.window);

        let fresh = ReaderOptions::default().with_window(Bounds2D::new(1.0, 1.0, 2.0, 2.0));
        assert_eq!(fresh.window, Some(Bounds2D::new(1.0, 1.0, 2.0, 2.0)));
    }
}
