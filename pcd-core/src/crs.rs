use std::fmt;

use serde::{Deserialize, Serialize};

/// EPSG code type alias
pub type EpsgCode = u32;

/// Georeferencing of a tile or of a point cloud.
///
/// A descriptor carries whichever form the source provided. Converting between
/// the EPSG and WKT forms is a registry lookup and lives in `pcd-crs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSystem {
    Epsg(EpsgCode),
    Wkt(String),
    #[default]
    Undefined,
}

impl ReferenceSystem {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_epsg(&self) -> Option<EpsgCode> {
        match self {
            Self::Epsg(code) => Some(*code),
            _ => None,
        }
    }

    pub fn as_wkt(&self) -> Option<&str> {
        match self {
            Self::Wkt(wkt) => Some(wkt),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::Wkt(wkt) => {
                // WKT strings are long; the root keyword and name are enough to identify them
                let head: String = wkt.chars().take(48).collect();
                if head.len() < wkt.len() {
                    write!(f, "WKT {head}...")
                } else {
                    write!(f, "WKT {head}")
                }
            }
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_only_expose_the_stored_form() {
        let epsg = ReferenceSystem::Epsg(26917);
        assert_eq!(epsg.as_epsg(), Some(26917));
        assert_eq!(epsg.as_wkt(), None);

        let wkt = ReferenceSystem::Wkt("GEOGCS[\"WGS 84\"]".to_string());
        assert_eq!(wkt.as_epsg(), None);
        assert_eq!(wkt.as_wkt(), Some("GEOGCS[\"WGS 84\"]"));

        assert!(ReferenceSystem::default().is_undefined());
    }

    #[test]
    fn display_truncates_long_wkt() {
        let wkt = ReferenceSystem::Wkt(format!("PROJCS[\"{}\"]", "x".repeat(100)));
        let shown = wkt.to_string();
        assert!(shown.starts_with("WKT PROJCS["));
        assert!(shown.ends_with("..."));
        assert_eq!(ReferenceSystem::Epsg(2154).to_string(), "EPSG:2154");
    }
}
