use crate::error::{PipelineError, Result};
use crate::labels::RoadCondition;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Windowing parameters. The step is kept consistent with the window size so
/// the overlap survives a resize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub window_size: usize,
    pub step_size: usize,
    pub sampling_rate: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        // 2 seconds of motion at 50 Hz, 50% overlap
        Self {
            window_size: 100,
            step_size: 50,
            sampling_rate: 50.0,
        }
    }
}

impl WindowConfig {
    /// Build a window configuration from an overlap fraction in `[0, 1)`.
    pub fn with_overlap(window_size: usize, overlap: f64, sampling_rate: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&overlap) {
            return Err(PipelineError::InvalidConfig(format!(
                "overlap must be in [0, 1), got {}",
                overlap
            )));
        }
        let step_size = ((window_size as f64) * (1.0 - overlap)).round().max(1.0) as usize;
        let config = Self {
            window_size,
            step_size,
            sampling_rate,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fraction of each window shared with the next one.
    pub fn overlap(&self) -> f64 {
        1.0 - self.step_size as f64 / self.window_size as f64
    }

    /// Change the window size, scaling the step so the overlap is preserved.
    pub fn resized(&self, window_size: usize) -> Result<Self> {
        Self::with_overlap(window_size, self.overlap(), self.sampling_rate)
    }

    /// Duration covered by one window.
    pub fn window_seconds(&self) -> f64 {
        self.window_size as f64 / self.sampling_rate
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "window_size must be at least 1".into(),
            ));
        }
        if self.step_size == 0 || self.step_size > self.window_size {
            return Err(PipelineError::InvalidConfig(format!(
                "step_size must be in 1..={}, got {}",
                self.window_size, self.step_size
            )));
        }
        if !(self.sampling_rate > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "sampling_rate must be positive, got {}",
                self.sampling_rate
            )));
        }
        Ok(())
    }
}

/// Butterworth high-pass used for gravity removal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub enabled: bool,
    pub order: usize,
    pub cutoff_hz: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            order: 4,
            cutoff_hz: 0.3,
        }
    }
}

impl FilterConfig {
    /// Cutoff relative to the Nyquist frequency.
    pub fn normalized_cutoff(&self, sampling_rate: f64) -> f64 {
        self.cutoff_hz / (0.5 * sampling_rate)
    }

    pub fn validate(&self, sampling_rate: f64) -> Result<()> {
        if self.order == 0 {
            return Err(PipelineError::InvalidConfig(
                "filter order must be at least 1".into(),
            ));
        }
        let wn = self.normalized_cutoff(sampling_rate);
        if !(wn > 0.0 && wn < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "normalized cutoff must be in (0, 1), got {} ({} Hz at {} Hz)",
                wn, self.cutoff_hz, sampling_rate
            )));
        }
        Ok(())
    }
}

/// Road condition label names and their integer codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap(BTreeMap<String, i64>);

impl Default for LabelMap {
    fn default() -> Self {
        Self::new(
            RoadCondition::ALL
                .iter()
                .map(|c| (c.name().to_string(), c.code())),
        )
    }
}

impl LabelMap {
    pub fn new(entries: impl IntoIterator<Item = (String, i64)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Code for a label name. An exact match wins; otherwise names compare
    /// ASCII case-insensitively, so `pothole` and `POTHOLE` resolve too.
    pub fn code(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied().or_else(|| {
            self.0
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(name))
                .map(|(_, code)| *code)
        })
    }

    pub fn name(&self, code: i64) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, c)| **c == code)
            .map(|(name, _)| name.as_str())
    }

    pub fn contains_code(&self, code: i64) -> bool {
        self.0.values().any(|c| *c == code)
    }

    /// Distinct codes in ascending order.
    pub fn codes(&self) -> Vec<i64> {
        let mut codes: Vec<i64> = self.0.values().copied().collect();
        codes.sort_unstable();
        codes.dedup();
        codes
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Explicit source header -> canonical column name table, supplied by whoever
/// produced the files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMap(BTreeMap<String, String>);

impl ColumnMap {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn insert(&mut self, source: impl Into<String>, canonical: impl Into<String>) {
        self.0.insert(source.into(), canonical.into());
    }

    /// Canonical name for a header; unmapped headers keep their (trimmed) name.
    pub fn canonical<'a>(&'a self, header: &'a str) -> &'a str {
        let header = header.trim();
        self.0.get(header).map(String::as_str).unwrap_or(header)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    pub filter: FilterConfig,
    pub labels: LabelMap,
    pub columns: ColumnMap,
}

impl PipelineConfig {
    /// Read a JSON configuration file. Missing sections fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            PipelineError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        if self.filter.enabled {
            self.filter.validate(self.window.sampling_rate)?;
        }
        if self.labels.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "label map must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// One `source=canonical` column mapping given on the command line.
#[derive(Debug, Clone)]
pub struct ColumnAlias {
    pub source: String,
    pub canonical: String,
}

impl FromStr for ColumnAlias {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((source, canonical)) if !source.trim().is_empty() && !canonical.trim().is_empty() => {
                Ok(ColumnAlias {
                    source: source.trim().to_string(),
                    canonical: canonical.trim().to_string(),
                })
            }
            _ => Err(format!(
                "Invalid column mapping: {}. Use SOURCE=CANONICAL, e.g. AccX=ax",
                s
            )),
        }
    }
}

/// Build labeled sensor windows from a directory of recordings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory containing CSV or Feather recordings
    #[arg(help = "Directory containing CSV or Feather recordings")]
    pub input_dir: PathBuf,

    /// JSON pipeline configuration; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Samples per window
    #[arg(long, env = "ROADSENSE_WINDOW_SIZE")]
    pub window_size: Option<usize>,

    /// Samples between consecutive window starts
    #[arg(long, env = "ROADSENSE_STEP_SIZE", conflicts_with = "overlap")]
    pub step_size: Option<usize>,

    /// Window overlap fraction (0.0 to <1.0), alternative to --step-size
    #[arg(long, env = "ROADSENSE_OVERLAP")]
    pub overlap: Option<f64>,

    /// Sampling rate of the recordings in Hz
    #[arg(long, env = "ROADSENSE_SAMPLING_RATE")]
    pub sampling_rate: Option<f64>,

    /// High-pass cutoff frequency in Hz
    #[arg(long)]
    pub cutoff_hz: Option<f64>,

    /// Butterworth filter order
    #[arg(long)]
    pub filter_order: Option<usize>,

    /// Skip gravity removal (inputs are already filtered)
    #[arg(long)]
    pub no_filter: bool,

    /// Map a source header to a canonical column (repeatable), e.g. --column AccX=ax
    #[arg(long = "column")]
    pub columns: Vec<ColumnAlias>,

    /// Process files in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Number of synthetic windows to generate when no real data is found
    #[arg(long, default_value = "500")]
    pub synthetic_samples: usize,

    /// Seed for synthetic data
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output file prefix (e.g. /path/to/output/prefix); writes <prefix>_windows.csv and <prefix>_manifest.json
    #[arg(long)]
    pub output: Option<String>,
}

impl Args {
    /// Resolve the effective configuration: defaults, then the JSON file, then flags.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(rate) = self.sampling_rate {
            config.window.sampling_rate = rate;
        }
        if let Some(size) = self.window_size {
            config.window = config.window.resized(size)?;
        }
        if let Some(overlap) = self.overlap {
            config.window = WindowConfig::with_overlap(
                config.window.window_size,
                overlap,
                config.window.sampling_rate,
            )?;
        }
        if let Some(step) = self.step_size {
            config.window.step_size = step;
        }
        if let Some(cutoff) = self.cutoff_hz {
            config.filter.cutoff_hz = cutoff;
        }
        if let Some(order) = self.filter_order {
            config.filter.order = order;
        }
        if self.no_filter {
            config.filter.enabled = false;
        }
        for alias in &self.columns {
            config.columns.insert(&alias.source, &alias.canonical);
        }

        config.validate()?;
        Ok(config)
    }
}
