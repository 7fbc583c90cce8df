use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use pcd_core::pointcloud::point::PointCloud;
use pcd_roi::ExtractionResult;
use serde::Serialize;

use crate::AppError;

#[derive(Debug, Serialize)]
pub struct RoiSummary {
    pub name: String,
    /// `None` when the ROI's batch failed.
    pub points: Option<usize>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct FailureSummary {
    pub rois: Vec<String>,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub crs: String,
    pub rois: Vec<RoiSummary>,
    pub failures: Vec<FailureSummary>,
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

// Distinct names can sanitize to one stem, and some file systems ignore case:
// later ROIs get their 1-based position appended.
fn unique_stem(name: &str, position: usize, taken: &mut HashSet<String>) -> String {
    let mut stem = file_stem(name);
    if taken.contains(&stem.to_lowercase()) {
        let mut suffix = position + 1;
        let base = stem.clone();
        stem = format!("{base}-{suffix}");
        while taken.contains(&stem.to_lowercase()) {
            suffix += 1;
            stem = format!("{base}-{suffix}");
        }
        log::warn!("ROI '{name}' written as {stem}.csv to avoid overwriting another ROI");
    }
    taken.insert(stem.to_lowercase());
    stem
}

pub fn write_point_csv(path: &Path, point_cloud: &PointCloud) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["x", "y", "z", "intensity", "classification", "r", "g", "b"])?;
    for point in &point_cloud.points {
        let attributes = &point.attributes;
        writer.write_record(&[
            point.x.to_string(),
            point.y.to_string(),
            point.z.to_string(),
            attributes.intensity.map(|v| v.to_string()).unwrap_or_default(),
            attributes.classification.map(|v| v.to_string()).unwrap_or_default(),
            point.color.r.to_string(),
            point.color.g.to_string(),
            point.color.b.to_string(),
        ])?;
    }
    writer.flush().map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Writes `<name>.csv` per extracted ROI and `summary.json` into `dir`.
pub fn write_result(dir: &Path, crs: String, result: &ExtractionResult) -> Result<Summary, AppError> {
    fs::create_dir_all(dir).map_err(|source| AppError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut rois = Vec::with_capacity(result.len());
    let mut taken = HashSet::new();
    for (position, output) in result.iter().enumerate() {
        let (points, file) = match &output.subset {
            Some(subset) => {
                let stem = unique_stem(&output.name, position, &mut taken);
                let file = dir.join(format!("{stem}.csv"));
                write_point_csv(&file, subset)?;
                (Some(subset.len()), Some(file))
            }
            None => (None, None),
        };
        rois.push(RoiSummary {
            name: output.name.clone(),
            points,
            file,
        });
    }

    let summary = Summary {
        crs,
        rois,
        failures: result
            .failures
            .iter()
            .map(|f| FailureSummary {
                rois: f.rois.clone(),
                error: f.error.to_string(),
            })
            .collect(),
    };

    let summary_path = dir.join("summary.json");
    log::info!("write summary: {:?}", summary_path);
    let json = serde_json::to_string_pretty(&summary).map_err(|err| AppError::Input(err.to_string()))?;
    fs::write(&summary_path, json).map_err(|source| AppError::Io {
        path: summary_path,
        source,
    })?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use pcd_core::crs::ReferenceSystem;
    use pcd_core::pointcloud::point::Point;
    use pcd_roi::RoiOutput;

    use super::*;

    #[test]
    fn names_are_made_file_safe() {
        assert_eq!(file_stem("plot/1:a"), "plot_1_a");
        assert_eq!(file_stem("ROI1"), "ROI1");
    }

    #[test]
    fn writes_one_csv_per_subset_and_a_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut point = Point::new(1.5, 2.0, 3.25);
        point.attributes.classification = Some(2);
        let result = ExtractionResult {
            outputs: vec![
                RoiOutput {
                    name: "a".into(),
                    subset: Some(PointCloud::new(vec![point], ReferenceSystem::Epsg(26917))),
                },
                RoiOutput {
                    name: "b".into(),
                    subset: None,
                },
            ],
            failures: Vec::new(),
        };

        let summary = write_result(dir.path(), "EPSG:26917".into(), &result).unwrap();
        assert_eq!(summary.rois[0].points, Some(1));
        assert_eq!(summary.rois[1].points, None);

        let csv = fs::read_to_string(dir.path().join("a.csv")).unwrap();
        assert_eq!(csv, "x,y,z,intensity,classification,r,g,b\n1.5,2,3.25,,2,0,0,0\n");
        assert!(!dir.path().join("b.csv").exists());

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
        assert_eq!(json["rois"][1]["points"], serde_json::Value::Null);
        assert_eq!(json["crs"], "EPSG:26917");
    }

    #[test]
    fn colliding_names_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = |n: usize| {
            let points = (0..n).map(|i| Point::new(i as f64, 0.0, 0.0)).collect();
            Some(PointCloud::new(points, ReferenceSystem::Epsg(26917)))
        };
        let result = ExtractionResult {
            outputs: vec![
                RoiOutput {
                    name: "plot/1".into(),
                    subset: cloud(3),
                },
                RoiOutput {
                    name: "plot_1".into(),
                    subset: cloud(1),
                },
                RoiOutput {
                    name: "PLOT_1".into(),
                    subset: cloud(2),
                },
            ],
            failures: Vec::new(),
        };

        let summary = write_result(dir.path(), "EPSG:26917".into(), &result).unwrap();
        let files: Vec<_> = summary.rois.iter().map(|r| r.file.clone().unwrap()).collect();
        assert_eq!(files[0], dir.path().join("plot_1.csv"));
        assert_eq!(files[1], dir.path().join("plot_1-2.csv"));
        assert_eq!(files[2], dir.path().join("PLOT_1-3.csv"));
        for (file, expected) in files.iter().zip([3, 1, 2]) {
            let rows = fs::read_to_string(file).unwrap().lines().count() - 1;
            assert_eq!(rows, expected, "{file:?}");
        }
    }
}
