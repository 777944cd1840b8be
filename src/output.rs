use crate::config::PipelineConfig;
use crate::data_loading::{FEATURE_COLUMNS, LABEL_COLUMN};
use crate::dataset::{Dataset, LoadReport};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Directory,
    Synthetic,
}

/// Summary written next to an exported dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub source: DataSource,
    pub config: PipelineConfig,
    pub shape: [usize; 3],
    pub class_counts: BTreeMap<i64, usize>,
    pub class_weights: BTreeMap<i64, f64>,
    pub report: Option<LoadReport>,
}

impl Manifest {
    pub fn new(
        source: DataSource,
        config: &PipelineConfig,
        dataset: &Dataset,
        report: Option<LoadReport>,
    ) -> Self {
        let (n, w, c) = dataset.x.dim();
        Self {
            generated_at: Utc::now(),
            source,
            config: config.clone(),
            shape: [n, w, c],
            class_counts: dataset.class_counts(),
            class_weights: dataset.class_weights(),
            report,
        }
    }
}

/// `<dir>/<stem>_<suffix>` for an output prefix such as `out/run1`.
pub fn output_path(prefix: &str, suffix: &str) -> PathBuf {
    let path = Path::new(prefix);
    let dir = path.parent().unwrap_or(Path::new("."));
    let stem = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    dir.join(format!("{}_{}", stem, suffix))
}

/// Long-format export: one line per (window, step).
pub fn write_dataset_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    info!("Writing {} windows to {}", dataset.len(), path.display());

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header = vec!["window", "step"];
    header.extend(FEATURE_COLUMNS);
    header.push(LABEL_COLUMN);
    writer.write_record(&header)?;

    for (i, (window, label)) in dataset.x.outer_iter().zip(dataset.y.iter()).enumerate() {
        for (step, row) in window.outer_iter().enumerate() {
            let mut record = vec![i.to_string(), step.to_string()];
            record.extend(row.iter().map(|v| v.to_string()));
            record.push(label.to_string());
            writer.write_record(&record)?;
        }
    }

    writer.flush()?;
    Ok(())
}

pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    info!("Writing manifest to {}", path.display());
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, manifest)?;
    Ok(())
}
