//! Random stand-in data with the same shape contract as [`crate::dataset::Dataset`].
//!
//! Used to smoke-test the downstream training pipeline when no recordings
//! are available. The values carry no physical meaning.

use crate::config::{LabelMap, PipelineConfig};
use crate::data_loading::FEATURE_COLUMNS;
use crate::dataset::Dataset;
use log::info;
use ndarray::{Array1, Array3};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{StandardNormal, Uniform};

/// `num_samples` windows of standard-normal values and labels drawn
/// uniformly from the label map's codes (`{0, 1, 2}` by default).
pub fn create_synthetic_data(num_samples: usize, config: &PipelineConfig, seed: Option<u64>) -> Dataset {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    generate_with(num_samples, config.window.window_size, &config.labels, &mut rng)
}

pub fn generate_with<R: Rng + ?Sized>(
    num_samples: usize,
    window_size: usize,
    labels: &LabelMap,
    rng: &mut R,
) -> Dataset {
    info!("Generating {} synthetic windows", num_samples);
    let x = Array3::random_using(
        (num_samples, window_size, FEATURE_COLUMNS.len()),
        StandardNormal,
        &mut *rng,
    );

    let codes = labels.codes();
    let y = if codes.is_empty() {
        Array1::zeros(num_samples)
    } else {
        let picks = Array1::random_using(num_samples, Uniform::new(0, codes.len()), rng);
        picks.mapv(|i| codes[i])
    };

    Dataset { x, y }
}
