use crate::crs::ReferenceSystem;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointAttributes {
    pub intensity: Option<u16>,
    pub return_number: Option<u8>,
    pub classification: Option<u8>,
    pub scan_angle: Option<f32>,
    pub user_data: Option<u8>,
    pub point_source_id: Option<u16>,
    pub gps_time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Color {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

// Coordinates are already de-quantized: x = (raw_x * scale[0]) + offset[0]
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub color: Color,
    pub attributes: PointAttributes,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            color: Color::default(),
            attributes: PointAttributes::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PointCloud {
    pub points: Vec<Point>,
    pub metadata: Metadata,
}

impl PointCloud {
    pub fn new(points: Vec<Point>, crs: ReferenceSystem) -> Self {
        let mut bounding_volume = BoundingVolume {
            min: [f64::MAX, f64::MAX, f64::MAX],
            max: [f64::MIN, f64::MIN, f64::MIN],
        };

        for point in &points {
            bounding_volume.max[0] = bounding_volume.max[0].max(point.x);
            bounding_volume.max[1] = bounding_volume.max[1].max(point.y);
            bounding_volume.max[2] = bounding_volume.max[2].max(point.z);
            bounding_volume.min[0] = bounding_volume.min[0].min(point.x);
            bounding_volume.min[1] = bounding_volume.min[1].min(point.y);
            bounding_volume.min[2] = bounding_volume.min[2].min(point.z);
        }

        if points.is_empty() {
            bounding_volume = BoundingVolume::default();
        }

        let metadata = Metadata {
            point_count: points.len(),
            bounding_volume,
            crs,
        };

        PointCloud { points, metadata }
    }

    pub fn empty(crs: ReferenceSystem) -> Self {
        Self::new(Vec::new(), crs)
    }

    /// Concatenates several clouds into one view. The reference system of the
    /// first cloud is kept; callers are expected to merge clouds sharing one.
    pub fn merge(clouds: Vec<PointCloud>) -> Self {
        let crs = clouds
            .first()
            .map(|pc| pc.metadata.crs.clone())
            .unwrap_or_default();
        let total = clouds.iter().map(PointCloud::len).sum();
        let mut points = Vec::with_capacity(total);
        for pc in clouds {
            points.extend(pc.points);
        }
        Self::new(points, crs)
    }

    /// Copies the points matching `predicate` into a new cloud.
    pub fn subset<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Point) -> bool,
    {
        let points = self
            .points
            .iter()
            .filter(|p| predicate(p))
            .cloned()
            .collect();
        Self::new(points, self.metadata.crs.clone())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// Minimum and maximum of the de-quantized coordinates; all zeros for an empty cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundingVolume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub point_count: usize,
    pub bounding_volume: BoundingVolume,
    pub crs: ReferenceSystem,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_volume_tracks_points() {
        let pc = PointCloud::new(
            vec![Point::new(1.0, 5.0, -2.0), Point::new(3.0, 2.0, 7.0)],
            ReferenceSystem::Epsg(26917),
        );
        assert_eq!(pc.metadata.point_count, 2);
        assert_eq!(pc.metadata.bounding_volume.min, [1.0, 2.0, -2.0]);
        assert_eq!(pc.metadata.bounding_volume.max, [3.0, 5.0, 7.0]);
    }

    #[test]
    fn empty_cloud_has_zero_bounds() {
        let pc = PointCloud::empty(ReferenceSystem::Undefined);
        assert!(pc.is_empty());
        assert_eq!(pc.metadata.bounding_volume, BoundingVolume::default());
    }

    #[test]
    fn merge_concatenates_in_order() {
        let a = PointCloud::new(vec![Point::new(0.0, 0.0, 0.0)], ReferenceSystem::Epsg(2154));
        let b = PointCloud::new(
            vec![Point::new(1.0, 1.0, 1.0), Point::new(2.0, 2.0, 2.0)],
            ReferenceSystem::Epsg(2154),
        );
        let merged = PointCloud::merge(vec![a, b]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.points[2].x, 2.0);
        assert_eq!(merged.metadata.crs, ReferenceSystem::Epsg(2154));
    }

    #[test]
    fn subset_keeps_reference_system() {
        let pc = PointCloud::new(
            (0..10).map(|i| Point::new(i as f64, 0.0, 0.0)).collect(),
            ReferenceSystem::Epsg(26917),
        );
        let sub = pc.subset(|p| p.x >= 5.0);
        assert_eq!(sub.len(), 5);
        assert_eq!(sub.metadata.crs, ReferenceSystem::Epsg(26917));
    }
}
