pub mod config;
pub mod data_loading;
pub mod dataset;
pub mod error;
pub mod labels;
pub mod output;
pub mod preprocessing;
pub mod synthetic;
pub mod windowing;

pub use config::{ColumnMap, FilterConfig, LabelMap, PipelineConfig, WindowConfig};
pub use data_loading::{RawSampleTable, FEATURE_COLUMNS, REQUIRED_COLUMNS};
pub use dataset::{load_and_preprocess_data, Dataset, DatasetLoader, LoadReport};
pub use error::{PipelineError, Result};
pub use labels::{majority_vote, RoadCondition};
pub use preprocessing::HighPassFilter;
pub use synthetic::create_synthetic_data;
pub use windowing::{Window, WindowSegmenter};
