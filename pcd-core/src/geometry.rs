use serde::{Deserialize, Serialize};

/// Axis-aligned 2D envelope: `[min_x, max_x] x [min_y, max_y]`, edges included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds2D {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds2D {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_center(x: f64, y: f64, half_width: f64, half_height: f64) -> Self {
        Self::new(x - half_width, y - half_height, x + half_width, y + half_height)
    }

    /// Inclusive test: envelopes that only share an edge or a corner intersect.
    pub fn intersects(&self, other: &Bounds2D) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn union(&self, other: &Bounds2D) -> Bounds2D {
        Bounds2D {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_edge_counts_as_intersection() {
        let left = Bounds2D::new(0.0, 0.0, 100.0, 100.0);
        let right = Bounds2D::new(100.0, 0.0, 200.0, 100.0);
        assert!(left.intersects(&right));
        assert!(right.intersects(&left));

        let corner = Bounds2D::new(100.0, 100.0, 150.0, 150.0);
        assert!(left.intersects(&corner));

        let apart = Bounds2D::new(100.5, 0.0, 200.0, 100.0);
        assert!(!left.intersects(&apart));
    }

    #[test]
    fn union_covers_both() {
        let a = Bounds2D::from_center(10.0, 10.0, 5.0, 5.0);
        let b = Bounds2D::from_center(30.0, 0.0, 2.0, 1.0);
        let u = a.union(&b);
        assert_eq!(u, Bounds2D::new(5.0, -1.0, 32.0, 15.0));
        assert_eq!(u.width(), 27.0);
        assert_eq!(u.height(), 16.0);
    }

    #[test]
    fn contains_is_inclusive() {
        let b = Bounds2D::new(0.0, 0.0, 1.0, 1.0);
        assert!(b.contains(1.0, 0.0));
        assert!(!b.contains(1.0001, 0.5));
    }
}
