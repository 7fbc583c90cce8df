use serde::{Deserialize, Serialize};

use crate::geometry::Bounds2D;
use crate::pointcloud::point::{Point, PointCloud};

/// A plot footprint in catalog coordinate units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Circle {
        x: f64,
        y: f64,
        radius: f64,
    },
    Rectangle {
        x: f64,
        y: f64,
        half_width: f64,
        half_height: f64,
    },
}

impl Shape {
    pub fn center(&self) -> (f64, f64) {
        match *self {
            Shape::Circle { x, y, .. } | Shape::Rectangle { x, y, .. } => (x, y),
        }
    }

    pub fn envelope(&self) -> Bounds2D {
        match *self {
            Shape::Circle { x, y, radius } => Bounds2D::from_center(x, y, radius, radius),
            Shape::Rectangle {
                x,
                y,
                half_width,
                half_height,
            } => Bounds2D::from_center(x, y, half_width, half_height),
        }
    }

    /// Boundary points are inside for both shapes.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        match *self {
            Shape::Circle { x, y, radius } => {
                let dx = px - x;
                let dy = py - y;
                dx * dx + dy * dy <= radius * radius
            }
            Shape::Rectangle { .. } => self.envelope().contains(px, py),
        }
    }
}

pub trait ShapeClipper: Send + Sync {
    fn clip(&self, point_cloud: &PointCloud, shape: &Shape) -> PointCloud;
}

/// Planimetric clipper: selects on x and y only, z is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanimetricClipper;

impl ShapeClipper for PlanimetricClipper {
    fn clip(&self, point_cloud: &PointCloud, shape: &Shape) -> PointCloud {
        let envelope = shape.envelope();
        point_cloud.subset(|p: &Point| envelope.contains(p.x, p.y) && shape.contains(p.x, p.y))
    }
}
