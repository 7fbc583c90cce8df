use std::collections::HashSet;

use pcd_core::pointcloud::clip::Shape;
use serde::{Deserialize, Serialize};

use crate::RoiError;

/// A named query region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub name: String,
    #[serde(flatten)]
    pub shape: Shape,
}

impl Roi {
    pub fn circle(name: impl Into<String>, x: f64, y: f64, radius: f64) -> Self {
        Self {
            name: name.into(),
            shape: Shape::Circle { x, y, radius },
        }
    }

    pub fn rectangle(
        name: impl Into<String>,
        x: f64,
        y: f64,
        half_width: f64,
        half_height: f64,
    ) -> Self {
        Self {
            name: name.into(),
            shape: Shape::Rectangle {
                x,
                y,
                half_width,
                half_height,
            },
        }
    }

    fn validate(&self) -> Result<(), RoiError> {
        let (x, y) = self.shape.center();
        if !x.is_finite() || !y.is_finite() {
            return Err(RoiError::InvalidGeometry(format!(
                "{}: center ({x}, {y}) is not finite",
                self.name
            )));
        }
        let extents = match self.shape {
            Shape::Circle { radius, .. } => vec![("radius", radius)],
            Shape::Rectangle {
                half_width,
                half_height,
                ..
            } => vec![("half width", half_width), ("half height", half_height)],
        };
        for (what, value) in extents {
            // NaN fails this comparison too
            if !(value > 0.0 && value.is_finite()) {
                return Err(RoiError::InvalidGeometry(format!(
                    "{}: {what} must be positive, got {value}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// A validated, ordered list of ROIs with unique names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoiSet {
    rois: Vec<Roi>,
}

impl RoiSet {
    pub fn new(rois: Vec<Roi>) -> Result<Self, RoiError> {
        let mut seen = HashSet::with_capacity(rois.len());
        for roi in &rois {
            roi.validate()?;
            if !seen.insert(roi.name.as_str()) {
                return Err(RoiError::DuplicateRoiName(roi.name.clone()));
            }
        }
        Ok(Self { rois })
    }

    /// Builds ROIs from parallel columns. `r2` switches every ROI to a
    /// rectangle with half extents `(r, r2)`; without it `r` is a radius.
    /// Names default to `ROI1`, `ROI2`, ... in input order.
    pub fn from_arrays(
        x: &[f64],
        y: &[f64],
        r: &[f64],
        r2: Option<&[f64]>,
        names: Option<&[String]>,
    ) -> Result<Self, RoiError> {
        let n = x.len();
        let mut lengths = vec![("y", y.len()), ("r", r.len())];
        if let Some(r2) = r2 {
            lengths.push(("r2", r2.len()));
        }
        if let Some(names) = names {
            lengths.push(("roinames", names.len()));
        }
        if let Some((column, len)) = lengths.into_iter().find(|&(_, len)| len != n) {
            return Err(RoiError::InvalidGeometry(format!(
                "{column} has {len} values, x has {n}"
            )));
        }

        let rois = (0..n)
            .map(|i| {
                let name = names
                    .map(|names| names[i].clone())
                    .unwrap_or_else(|| format!("ROI{}", i + 1));
                match r2 {
                    Some(r2) => Roi::rectangle(name, x[i], y[i], r[i], r2[i]),
                    None => Roi::circle(name, x[i], y[i], r[i]),
                }
            })
            .collect();
        Self::new(rois)
    }

    pub fn len(&self) -> usize {
        self.rois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Roi> {
        self.rois.iter()
    }

    pub fn as_slice(&self) -> &[Roi] {
        &self.rois
    }
}

impl<'a> IntoIterator for &'a RoiSet {
    type Item = &'a Roi;
    type IntoIter = std::slice::Iter<'a, Roi>;

    fn into_iter(self) -> Self::IntoIter {
        self.rois.iter()
    }
}
