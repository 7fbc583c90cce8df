use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use glob::glob;
use pcd_roi::{ExtractOptions, Roi, RoiSet};

use crate::AppError;

const ROI_COLUMNS: [&str; 5] = ["x", "y", "r", "r2", "name"];

pub fn expand_globs(input_patterns: &[String]) -> Result<Vec<PathBuf>, AppError> {
    let mut paths = Vec::new();
    for pattern in input_patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let entries = glob(pattern).map_err(|err| AppError::Input(format!("{pattern}: {err}")))?;
            for entry in entries {
                match entry {
                    Ok(path) => paths.push(path),
                    Err(e) => log::warn!("skipping unreadable path: {e}"),
                }
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    if paths.is_empty() {
        return Err(AppError::Input("no input tiles matched".to_string()));
    }
    Ok(paths)
}

pub fn load_options(path: &Path) -> Result<ExtractOptions, AppError> {
    let text = std::fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|err| AppError::Input(format!("{path:?}: {err}")))
}

// header names are matched case-insensitively, ignoring `_` and `-`
fn create_field_mapping(headers: &StringRecord) -> Result<HashMap<&'static str, usize>, AppError> {
    let mut mapping = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        let normalized_header = header.trim().to_lowercase().replace(['_', '-'], "");
        let column = match normalized_header.as_str() {
            "roiname" | "roinames" => Some("name"),
            other => ROI_COLUMNS.iter().copied().find(|c| *c == other),
        };
        if let Some(column) = column {
            mapping.entry(column).or_insert(index);
        }
    }

    for required in ["x", "y", "r"] {
        if !mapping.contains_key(required) {
            return Err(AppError::Input(format!(
                "required ROI column '{required}' is missing"
            )));
        }
    }
    Ok(mapping)
}

fn parse_field(
    record: &StringRecord,
    mapping: &HashMap<&'static str, usize>,
    column: &str,
    line: usize,
) -> Result<Option<f64>, AppError> {
    let Some(value) = mapping.get(column).and_then(|&i| record.get(i)) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|err| AppError::Input(format!("line {line}: column {column}: {err}")))
}

/// Reads `x,y,r[,r2][,name]` rows. A row with `r2` is a rectangle of half
/// extents `(r, r2)`, otherwise a circle of radius `r`. Missing names
/// default to `ROI{row}`.
pub fn read_rois<R: Read>(source: R) -> Result<RoiSet, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source);
    let headers = reader.headers()?.clone();
    let mapping = create_field_mapping(&headers)?;

    let mut rois = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let field = |column| parse_field(&record, &mapping, column, line);
        let missing = |column: &str| AppError::Input(format!("line {line}: missing {column}"));

        let x = field("x")?.ok_or_else(|| missing("x"))?;
        let y = field("y")?.ok_or_else(|| missing("y"))?;
        let r = field("r")?.ok_or_else(|| missing("r"))?;
        let r2 = match mapping.get("r2").and_then(|&i| record.get(i)) {
            Some(value) if !value.trim().is_empty() => field("r2")?,
            _ => None,
        };
        let name = mapping
            .get("name")
            .and_then(|&i| record.get(i))
            .filter(|name| !name.trim().is_empty())
            .map(|name| name.trim().to_string())
            .unwrap_or_else(|| format!("ROI{}", i + 1));

        rois.push(match r2 {
            Some(r2) => Roi::rectangle(name, x, y, r, r2),
            None => Roi::circle(name, x, y, r),
        });
    }

    Ok(RoiSet::new(rois)?)
}

pub fn read_rois_from_path(path: &Path) -> Result<RoiSet, AppError> {
    let file = File::open(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_rois(file)
}
