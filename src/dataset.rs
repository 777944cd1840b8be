use crate::config::PipelineConfig;
use crate::data_loading::{list_table_files, read_table, RawSampleTable, FEATURE_COLUMNS};
use crate::error::{PipelineError, Result};
use crate::labels::majority_vote;
use crate::preprocessing::{remove_gravity, HighPassFilter};
use crate::windowing::WindowSegmenter;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Windows and labels ready for the sequence classifier.
///
/// `x` has shape `(num_windows, window_size, 6)`, `y` has one label per window.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Array3<f64>,
    pub y: Array1<i64>,
}

impl Dataset {
    pub fn empty(window_size: usize) -> Self {
        Self {
            x: Array3::zeros((0, window_size, FEATURE_COLUMNS.len())),
            y: Array1::zeros(0),
        }
    }

    /// Stack per-window arrays of shape `(window_size, 6)`.
    pub fn from_windows(window_size: usize, windows: &[Array2<f64>], labels: Vec<i64>) -> Result<Self> {
        let channels = FEATURE_COLUMNS.len();
        let mut values = Vec::with_capacity(windows.len() * window_size * channels);
        for window in windows {
            if window.dim() != (window_size, channels) {
                return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
            }
            values.extend(window.iter().copied());
        }
        let x = Array3::from_shape_vec((windows.len(), window_size, channels), values)?;
        let y = Array1::from_vec(labels);
        if y.len() != x.len_of(ndarray::Axis(0)) {
            return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
        }
        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.x.dim().1
    }

    pub fn class_counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.y {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Balanced class weights `n / (k * count)` over the classes present.
    pub fn class_weights(&self) -> BTreeMap<i64, f64> {
        let counts = self.class_counts();
        let n = self.len() as f64;
        let k = counts.len() as f64;
        counts
            .into_iter()
            .map(|(label, count)| (label, n / (k * count as f64)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingColumns,
    SignalTooShort,
    InvalidData,
    Unreadable,
}

impl From<&PipelineError> for SkipReason {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::SchemaValidation { .. } => SkipReason::MissingColumns,
            PipelineError::SignalTooShort { .. } => SkipReason::SignalTooShort,
            PipelineError::UnknownLabel { .. }
            | PipelineError::MalformedRecord { .. }
            | PipelineError::Csv(_)
            | PipelineError::Arrow(_)
            | PipelineError::Shape(_) => SkipReason::InvalidData,
            PipelineError::Io(_)
            | PipelineError::UnsupportedFormat { .. }
            | PipelineError::InvalidConfig(_) => SkipReason::Unreadable,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub path: PathBuf,
    pub rows: usize,
    pub windows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub message: String,
}

/// What happened to each file during a directory scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub processed: Vec<ProcessedFile>,
    pub skipped: Vec<SkippedFile>,
    /// Set when the directory itself could not be listed.
    pub directory_error: Option<String>,
}

impl LoadReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn window_count(&self) -> usize {
        self.processed.iter().map(|f| f.windows).sum()
    }
}

/// Windows and labels derived from one recording.
#[derive(Debug, Clone, Default)]
pub struct FileWindows {
    pub rows: usize,
    pub windows: Vec<Array2<f64>>,
    pub labels: Vec<i64>,
}

/// Runs filter, segmenter and label vote over every recording in a directory.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    config: PipelineConfig,
    filter: Option<HighPassFilter>,
    segmenter: WindowSegmenter,
    parallel: bool,
}

impl DatasetLoader {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let filter = if config.filter.enabled {
            Some(HighPassFilter::design(&config.filter, &config.window)?)
        } else {
            None
        };
        Ok(Self {
            segmenter: WindowSegmenter::new(&config.window),
            config,
            filter,
            parallel: false,
        })
    }

    /// Process files on the rayon pool. Output order is unchanged.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Filter, segment and label one in-memory recording.
    pub fn process_table(&self, table: &RawSampleTable) -> Result<FileWindows> {
        let features = match &self.filter {
            Some(filter) => remove_gravity(table.features.view(), filter)?,
            None => table.features.clone(),
        };

        let window_size = self.segmenter.window_size();
        let mut out = FileWindows {
            rows: table.len(),
            ..FileWindows::default()
        };
        for window in self.segmenter.segment(features.view()) {
            let Some(label) = majority_vote(&table.labels[window.start..window.start + window_size]) else {
                continue;
            };
            out.windows.push(window.features);
            out.labels.push(label);
        }
        Ok(out)
    }

    /// Read and process one file. The raw table is dropped before returning.
    pub fn process_file(&self, path: &Path) -> Result<FileWindows> {
        let table = read_table(path, &self.config)?;
        debug!("{}: {} rows", path.display(), table.len());
        self.process_table(&table)
    }

    /// Build the dataset from every table file directly inside `dir`.
    ///
    /// Never fails: unreadable directories and bad files are recorded in the
    /// report, and an empty dataset tells the caller to fall back to synthetic
    /// data.
    pub fn load_dir(&self, dir: &Path) -> (Dataset, LoadReport) {
        let window_size = self.config.window.window_size;
        let mut report = LoadReport::default();

        info!("Scanning {} for recordings...", dir.display());
        let files = match list_table_files(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Cannot read directory {}: {}", dir.display(), e);
                report.directory_error = Some(e.to_string());
                return (Dataset::empty(window_size), report);
            }
        };

        let results: Vec<(PathBuf, Result<FileWindows>)> = if self.parallel {
            files
                .into_par_iter()
                .map(|path| {
                    let result = self.process_file(&path);
                    (path, result)
                })
                .collect()
        } else {
            files
                .into_iter()
                .map(|path| {
                    let result = self.process_file(&path);
                    (path, result)
                })
                .collect()
        };

        let (dataset, report) = assemble(window_size, results, report);
        info!(
            "Loaded {} windows from {} files ({} skipped)",
            dataset.len(),
            report.processed.len(),
            report.skipped_count()
        );
        (dataset, report)
    }
}

/// Shape errors in a file's windows, if any.
fn check_file_windows(window_size: usize, file: &FileWindows) -> Result<()> {
    let consistent = file.windows.len() == file.labels.len()
        && file
            .windows
            .iter()
            .all(|w| w.dim() == (window_size, FEATURE_COLUMNS.len()));
    if consistent {
        Ok(())
    } else {
        Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into())
    }
}

/// Concatenate per-file results in order, recording each file in the report.
/// Every file listed as processed contributes exactly its reported windows.
fn assemble(
    window_size: usize,
    results: Vec<(PathBuf, Result<FileWindows>)>,
    mut report: LoadReport,
) -> (Dataset, LoadReport) {
    let mut windows = Vec::new();
    let mut labels = Vec::new();
    for (path, result) in results {
        let result = result.and_then(|file| check_file_windows(window_size, &file).map(|_| file));
        match result {
            Ok(file) => {
                info!(
                    "Processed {}: {} rows -> {} windows",
                    path.display(),
                    file.rows,
                    file.windows.len()
                );
                report.processed.push(ProcessedFile {
                    path,
                    rows: file.rows,
                    windows: file.windows.len(),
                });
                windows.extend(file.windows);
                labels.extend(file.labels);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                report.skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::from(&e),
                    message: e.to_string(),
                });
            }
        }
    }

    match Dataset::from_windows(window_size, &windows, labels) {
        Ok(dataset) => (dataset, report),
        Err(e) => {
            warn!("Discarding inconsistent windows: {}", e);
            for file in report.processed.drain(..) {
                report.skipped.push(SkippedFile {
                    path: file.path,
                    reason: SkipReason::InvalidData,
                    message: e.to_string(),
                });
            }
            (Dataset::empty(window_size), report)
        }
    }
}

/// Convenience wrapper: build a loader for `config` and scan `dir`.
/// Errors only on an invalid configuration.
pub fn load_and_preprocess_data(dir: &Path, config: &PipelineConfig) -> Result<(Dataset, LoadReport)> {
    let loader = DatasetLoader::new(config.clone())?;
    Ok(loader.load_dir(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowConfig;

    fn table(rows: usize, label: impl Fn(usize) -> i64) -> RawSampleTable {
        let features = Array2::from_shape_fn((rows, 6), |(r, c)| if c == 2 { 9.81 } else { (r % 7) as f64 * 0.1 });
        RawSampleTable::new(features, (0..rows).map(label).collect()).unwrap()
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            window: WindowConfig {
                window_size: 4,
                step_size: 2,
                sampling_rate: 50.0,
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_process_table_labels_each_window() {
        let mut config = small_config();
        config.filter.enabled = false;
        let loader = DatasetLoader::new(config).unwrap();

        // rows: 0 0 1 1 1 2 2 2
        let labels = [0, 0, 1, 1, 1, 2, 2, 2];
        let out = loader.process_table(&table(8, |r| labels[r])).unwrap();
        assert_eq!(out.rows, 8);
        assert_eq!(out.windows.len(), 3);
        // [0 0 1 1] tie -> 0, [1 1 1 2] -> 1, [1 2 2 2] -> 2
        assert_eq!(out.labels, vec![0, 1, 2]);
        assert_eq!(out.windows[1].dim(), (4, 6));
    }

    #[test]
    fn test_process_table_filters_acceleration() {
        let loader = DatasetLoader::new(PipelineConfig::default()).unwrap();
        let out = loader.process_table(&table(400, |_| 2)).unwrap();
        assert_eq!(out.windows.len(), 7);
        assert!(out.labels.iter().all(|&l| l == 2));
        // gravity on az is gone in the middle of the recording
        assert!(out.windows[3][[50, 2]].abs() < 1e-2);
    }

    #[test]
    fn test_short_recording_is_an_error_when_filtering() {
        let loader = DatasetLoader::new(PipelineConfig::default()).unwrap();
        let err = loader.process_table(&table(10, |_| 0)).unwrap_err();
        assert!(matches!(err, PipelineError::SignalTooShort { .. }));
        assert_eq!(SkipReason::from(&err), SkipReason::SignalTooShort);
    }

    #[test]
    fn test_recording_shorter_than_window_contributes_nothing() {
        let loader = DatasetLoader::new(PipelineConfig::default()).unwrap();
        let out = loader.process_table(&table(60, |_| 1)).unwrap();
        assert_eq!(out.rows, 60);
        assert!(out.windows.is_empty());
    }

    #[test]
    fn test_dataset_stacking_and_class_stats() {
        let windows: Vec<Array2<f64>> = (0..4).map(|i| Array2::from_elem((3, 6), i as f64)).collect();
        let dataset = Dataset::from_windows(3, &windows, vec![0, 1, 1, 1]).unwrap();
        assert_eq!(dataset.x.dim(), (4, 3, 6));
        assert_eq!(dataset.x[[2, 1, 5]], 2.0);
        assert_eq!(dataset.window_size(), 3);
        assert_eq!(dataset.class_counts(), BTreeMap::from([(0, 1), (1, 3)]));

        let weights = dataset.class_weights();
        assert!((weights[&0] - 2.0).abs() < 1e-12);
        assert!((weights[&1] - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_dataset_rejects_mismatched_labels() {
        let windows = vec![Array2::zeros((3, 6))];
        assert!(Dataset::from_windows(3, &windows, vec![0, 1]).is_err());
        assert!(Dataset::from_windows(4, &windows, vec![0]).is_err());
    }

    #[test]
    fn test_inconsistent_file_windows_are_skipped_not_counted() {
        let good = FileWindows {
            rows: 4,
            windows: vec![Array2::ones((4, 6))],
            labels: vec![1],
        };
        let wrong_shape = FileWindows {
            rows: 4,
            windows: vec![Array2::ones((3, 6))],
            labels: vec![2],
        };
        let missing_label = FileWindows {
            rows: 4,
            windows: vec![Array2::ones((4, 6))],
            labels: vec![],
        };
        let results = vec![
            (PathBuf::from("a.csv"), Ok(good)),
            (PathBuf::from("b.csv"), Ok(wrong_shape)),
            (PathBuf::from("c.csv"), Ok(missing_label)),
        ];

        let (dataset, report) = assemble(4, results, LoadReport::default());
        assert_eq!(dataset.len(), 1);
        assert_eq!(report.window_count(), dataset.len());
        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(report
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::InvalidData));
    }

    #[test]
    fn test_missing_directory_gives_empty_dataset() {
        let loader = DatasetLoader::new(PipelineConfig::default()).unwrap();
        let (dataset, report) = loader.load_dir(Path::new("/definitely/not/a/real/dir"));
        assert!(dataset.is_empty());
        assert_eq!(dataset.x.dim(), (0, 100, 6));
        assert!(report.directory_error.is_some());
        assert!(report.processed.is_empty());
    }
}
