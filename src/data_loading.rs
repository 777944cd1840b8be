use crate::config::{ColumnMap, LabelMap, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::labels::parse_label;
use arrow::array::{Array, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::ipc::reader::FileReaderBuilder;
use log::{debug, trace};
use ndarray::{s, Array2, ArrayView2, ErrorKind, ShapeError};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Feature channels in window column order.
pub const FEATURE_COLUMNS: [&str; 6] = ["ax", "ay", "az", "gx", "gy", "gz"];
pub const LABEL_COLUMN: &str = "label";
pub const REQUIRED_COLUMNS: [&str; 7] = ["ax", "ay", "az", "gx", "gy", "gz", "label"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Feather,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(TableFormat::Csv),
            "feather" | "arrow" | "ipc" => Some(TableFormat::Feather),
            _ => None,
        }
    }
}

/// One recording: six feature channels and the per-row label codes.
#[derive(Debug, Clone)]
pub struct RawSampleTable {
    /// Shape `(N, 6)`, columns in [`FEATURE_COLUMNS`] order.
    pub features: Array2<f64>,
    pub labels: Vec<i64>,
}

impl RawSampleTable {
    pub fn new(features: Array2<f64>, labels: Vec<i64>) -> Result<Self> {
        if features.ncols() != FEATURE_COLUMNS.len() || features.nrows() != labels.len() {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The three acceleration channels, shape `(N, 3)`.
    pub fn acceleration(&self) -> ArrayView2<'_, f64> {
        self.features.slice(s![.., 0..3])
    }
}

/// Positions of the required columns within a file's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub features: [usize; 6],
    pub label: usize,
}

impl ColumnLayout {
    /// Locate every required column after applying the column map. When two
    /// headers map to the same name the first one wins.
    pub fn resolve<'h, I>(headers: I, columns: &ColumnMap) -> Result<Self>
    where
        I: IntoIterator<Item = &'h str>,
    {
        let mut found: [Option<usize>; 7] = [None; 7];
        for (idx, header) in headers.into_iter().enumerate() {
            let name = columns.canonical(header);
            if let Some(slot) = REQUIRED_COLUMNS.iter().position(|c| *c == name) {
                if found[slot].is_none() {
                    found[slot] = Some(idx);
                }
            }
        }

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .zip(found.iter())
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SchemaValidation { missing });
        }

        let mut features = [0usize; 6];
        for (slot, idx) in features.iter_mut().zip(found.iter()) {
            *slot = idx.unwrap_or_default();
        }
        Ok(Self {
            features,
            label: found[6].unwrap_or_default(),
        })
    }
}

/// Table files directly inside `dir`, in lexicographic file-name order.
///
/// Symlinks are followed. An entry that cannot be inspected (a dangling link,
/// say) is still listed when its name has a table extension, so the read
/// fails later and the file shows up as skipped instead of vanishing.
pub fn list_table_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().filter(|_| e.depth() > 0).map(Path::to_path_buf);
                match path {
                    Some(path) if TableFormat::from_path(&path).is_some() => {
                        debug!("Cannot inspect {}: {}", path.display(), e);
                        files.push(path);
                    }
                    Some(path) => trace!("Ignoring {}: {}", path.display(), e),
                    None => return Err(std::io::Error::from(e).into()),
                }
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && TableFormat::from_path(path).is_some() {
            files.push(path.to_path_buf());
        } else {
            trace!("Ignoring {}", path.display());
        }
    }
    Ok(files)
}

/// Header names of a table file, as written in the file.
pub fn read_headers(path: &Path) -> Result<Vec<String>> {
    match TableFormat::from_path(path) {
        Some(TableFormat::Csv) => {
            let mut rdr = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_reader(BufReader::new(File::open(path)?));
            Ok(rdr.headers()?.iter().map(str::to_string).collect())
        }
        Some(TableFormat::Feather) => {
            let reader = FileReaderBuilder::new().build(BufReader::new(File::open(path)?))?;
            Ok(reader
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().to_string())
                .collect())
        }
        None => Err(PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Load a table file, dispatching on its extension.
pub fn read_table(path: &Path, config: &PipelineConfig) -> Result<RawSampleTable> {
    match TableFormat::from_path(path) {
        Some(TableFormat::Csv) => read_csv_table(path, &config.columns, &config.labels),
        Some(TableFormat::Feather) => read_feather_table(path, &config.columns, &config.labels),
        None => Err(PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn parse_feature(cell: &str, column: &str, row: usize) -> Result<f64> {
    match cell.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(PipelineError::MalformedRecord {
            column: column.to_string(),
            row,
            value: cell.to_string(),
        }),
    }
}

pub fn read_csv_table(path: &Path, columns: &ColumnMap, labels: &LabelMap) -> Result<RawSampleTable> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let layout = ColumnLayout::resolve(rdr.headers()?.iter(), columns)?;
    debug!("{}: column layout {:?}", path.display(), layout);

    let mut values = Vec::new();
    let mut row_labels = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        for (name, &idx) in FEATURE_COLUMNS.iter().zip(layout.features.iter()) {
            values.push(parse_feature(record.get(idx).unwrap_or(""), name, row)?);
        }
        row_labels.push(parse_label(
            record.get(layout.label).unwrap_or(""),
            labels,
            row,
        )?);
    }

    let features = Array2::from_shape_vec((row_labels.len(), FEATURE_COLUMNS.len()), values)?;
    RawSampleTable::new(features, row_labels)
}

/// Read an Arrow IPC (Feather v2) file. Numeric columns of any numeric type
/// are cast to f64; the label column may hold codes or names.
pub fn read_feather_table(
    path: &Path,
    columns: &ColumnMap,
    labels: &LabelMap,
) -> Result<RawSampleTable> {
    let file = File::open(path)?;
    let reader = FileReaderBuilder::new().build(BufReader::new(file))?;
    let schema = reader.schema();
    let layout = ColumnLayout::resolve(
        schema.fields().iter().map(|f| f.name().as_str()),
        columns,
    )?;
    debug!("{}: column layout {:?}", path.display(), layout);

    let mut channels: [Vec<f64>; 6] = Default::default();
    let mut row_labels = Vec::new();

    for batch in reader {
        let batch = batch?;
        let offset = row_labels.len();

        for ((channel, &idx), name) in channels
            .iter_mut()
            .zip(layout.features.iter())
            .zip(FEATURE_COLUMNS.iter())
        {
            let casted = cast(batch.column(idx), &DataType::Float64)?;
            let array = casted
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| PipelineError::MalformedRecord {
                    column: name.to_string(),
                    row: offset,
                    value: format!("{:?}", batch.column(idx).data_type()),
                })?;
            for (i, value) in array.iter().enumerate() {
                match value {
                    Some(v) if v.is_finite() => channel.push(v),
                    other => {
                        return Err(PipelineError::MalformedRecord {
                            column: name.to_string(),
                            row: offset + i,
                            value: format!("{:?}", other),
                        })
                    }
                }
            }
        }

        // Casting through Utf8 lets integer, float and string label columns
        // share one parser.
        let casted = cast(batch.column(layout.label), &DataType::Utf8)?;
        let array = casted
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| PipelineError::MalformedRecord {
                column: LABEL_COLUMN.to_string(),
                row: offset,
                value: format!("{:?}", batch.column(layout.label).data_type()),
            })?;
        for (i, cell) in array.iter().enumerate() {
            row_labels.push(parse_label(cell.unwrap_or(""), labels, offset + i)?);
        }
    }

    let n = row_labels.len();
    let features = Array2::from_shape_fn((n, FEATURE_COLUMNS.len()), |(r, c)| channels[c][r]);
    RawSampleTable::new(features, row_labels)
}
