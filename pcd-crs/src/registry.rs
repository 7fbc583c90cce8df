//! EPSG lookups backed by the `crs-definitions` database.

use std::collections::HashMap;
use std::sync::LazyLock;

use pcd_core::crs::EpsgCode;

use crate::wkt::{self, WktNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    Geographic,
    Projected,
}

#[derive(Debug, Clone)]
pub struct CrsDefinition {
    pub epsg: EpsgCode,
    pub name: String,
    pub kind: CrsKind,
    pub wkt: &'static str,
}

// lowercased horizontal system name -> lowest code carrying it
static NAMES: LazyLock<HashMap<String, EpsgCode>> = LazyLock::new(|| {
    let mut names = HashMap::new();
    for code in 1..=u16::MAX {
        if let Some(def) = definition(code) {
            names.entry(def.name.to_lowercase()).or_insert(def.epsg);
        }
    }
    log::debug!("indexed {} reference system names", names.len());
    names
});

fn kind_of_proj4(proj4: &str) -> Option<CrsKind> {
    if proj4.contains("+proj=longlat") || proj4.contains("+proj=latlong") {
        Some(CrsKind::Geographic)
    } else if proj4.contains("+proj=") && !proj4.contains("+proj=geocent") {
        Some(CrsKind::Projected)
    } else {
        None
    }
}

// Vertical, geocentric and engineering systems are left out: they cannot
// be written as a horizontal GeoKey and do not locate a tile.
fn definition(code: u16) -> Option<CrsDefinition> {
    let def = crs_definitions::from_code(code)?;
    let kind = kind_of_proj4(def.proj4)?;
    let root = wkt::parse(def.wkt).ok()?;
    if kind_of(&root) != Some(kind) {
        return None;
    }
    Some(CrsDefinition {
        epsg: code as EpsgCode,
        name: root.name().unwrap_or_default().to_string(),
        kind,
        wkt: def.wkt,
    })
}

/// Lookup between EPSG codes and their WKT1 definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrsRegistry;

impl CrsRegistry {
    pub fn get(&self, epsg: EpsgCode) -> Option<CrsDefinition> {
        u16::try_from(epsg).ok().and_then(definition)
    }

    pub fn contains(&self, epsg: EpsgCode) -> bool {
        self.get(epsg).is_some()
    }

    /// The first lookup builds a name index over the whole database.
    pub fn find_by_name(&self, name: &str) -> Option<CrsDefinition> {
        NAMES
            .get(&name.trim().to_lowercase())
            .and_then(|&code| self.get(code))
    }

    /// Identifies a parsed WKT tree: the EPSG authority of the horizontal
    /// system when registered, otherwise a registered system of the same name.
    pub fn identify(&self, root: &WktNode) -> Option<CrsDefinition> {
        let horizontal = horizontal_component(root)?;
        let kind = kind_of(horizontal);

        if let Some((authority, code)) = horizontal.authority() {
            let registered = code
                .parse::<EpsgCode>()
                .ok()
                .and_then(|c| self.get(c))
                .filter(|def| Some(def.kind) == kind);
            if let (true, Some(def)) = (authority.eq_ignore_ascii_case("EPSG"), registered) {
                return Some(def);
            }
        }

        let name = horizontal.name()?;
        self.find_by_name(name).filter(|def| Some(def.kind) == kind)
    }
}

pub(crate) fn kind_of(node: &WktNode) -> Option<CrsKind> {
    match node.keyword.to_ascii_uppercase().as_str() {
        "PROJCS" | "PROJCRS" | "PROJECTEDCRS" => Some(CrsKind::Projected),
        "GEOGCS" | "GEOGCRS" | "GEOGRAPHICCRS" => Some(CrsKind::Geographic),
        _ => None,
    }
}

/// The projected or geographic node describing horizontal positions;
/// compound systems carry it as their first such child.
pub(crate) fn horizontal_component(root: &WktNode) -> Option<&WktNode> {
    if kind_of(root).is_some() {
        return Some(root);
    }
    let compound = ["COMPD_CS", "COMPOUNDCRS"]
        .iter()
        .any(|keyword| root.keyword.eq_ignore_ascii_case(keyword));
    if compound {
        return root.children().find(|child| kind_of(child).is_some());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_lidar_systems_are_registered() {
        let registry = CrsRegistry;
        for (code, kind) in [
            (4326, CrsKind::Geographic),
            (4269, CrsKind::Geographic),
            (26917, CrsKind::Projected),
            (32617, CrsKind::Projected),
            (2193, CrsKind::Projected),
            (2154, CrsKind::Projected),
            (25832, CrsKind::Projected),
            (6677, CrsKind::Projected),
            (3857, CrsKind::Projected),
        ] {
            let def = registry.get(code).unwrap();
            assert_eq!(def.kind, kind, "{code}");
            let root = wkt::parse(def.wkt).unwrap();
            assert_eq!(kind_of(&root), Some(kind), "{code}");
            assert_eq!(registry.identify(&root).map(|d| d.epsg), Some(code));
        }
    }

    #[test]
    fn utm_definition() {
        let utm17 = CrsRegistry.get(26917).unwrap();
        assert_eq!(utm17.name, "NAD83 / UTM zone 17N");
        assert!(utm17.wkt.starts_with("PROJCS["));
        assert!(utm17.wkt.contains("central_meridian"));
    }

    #[test]
    fn unknown_and_non_horizontal_codes_are_absent() {
        let registry = CrsRegistry;
        assert!(!registry.contains(200800));
        assert!(registry.get(1).is_none());
        // NAVD88 height
        assert!(registry.get(5703).is_none());
    }

    #[test]
    fn identifies_by_name_without_authority() {
        let registry = CrsRegistry;
        let root = wkt::parse(r#"PROJCS["NAD83 / UTM zone 17N",GEOGCS["NAD83"],UNIT["metre",1]]"#)
            .unwrap();
        assert_eq!(registry.identify(&root).map(|d| d.epsg), Some(26917));

        // same name but wrong kind is not a match
        let root = wkt::parse(r#"GEOGCS["NAD83 / UTM zone 17N"]"#).unwrap();
        assert!(registry.identify(&root).is_none());
    }

    #[test]
    fn identifies_horizontal_part_of_compound_system() {
        let registry = CrsRegistry;
        let compound = format!(
            "COMPD_CS[\"NAD83 / UTM zone 17N + NAVD88 height\",{},VERT_CS[\"NAVD88 height\",VERT_DATUM[\"North American Vertical Datum 1988\",2005]]]",
            registry.get(26917).unwrap().wkt
        );
        let root = wkt::parse(&compound).unwrap();
        assert_eq!(registry.identify(&root).map(|d| d.epsg), Some(26917));
    }
}
