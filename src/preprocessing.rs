use crate::config::{FilterConfig, WindowConfig};
use crate::error::{PipelineError, Result};
use log::debug;
use ndarray::{s, Array2, ArrayView2, Axis};
use sci_rs::signal::filter::design::{
    butter_dyn, DigitalFilter, FilterBandType, FilterOutputType, Sos, SosFormatFilter,
};
use sci_rs::signal::filter::sosfiltfilt_dyn;

/// Butterworth high-pass in second-order sections, applied forward and
/// backward so filtered events stay aligned with their labels.
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    order: usize,
    sos: Vec<Sos<f64>>,
}

impl HighPassFilter {
    pub fn design(filter: &FilterConfig, window: &WindowConfig) -> Result<Self> {
        filter.validate(window.sampling_rate)?;
        let wn = filter.normalized_cutoff(window.sampling_rate);

        let design = butter_dyn(
            filter.order,
            vec![wn],
            Some(FilterBandType::Highpass),
            Some(false),
            Some(FilterOutputType::Sos),
            None,
        );
        let DigitalFilter::Sos(SosFormatFilter { sos }) = design else {
            return Err(PipelineError::InvalidConfig(
                "butterworth design did not produce second-order sections".into(),
            ));
        };
        debug!(
            "Designed order {} high-pass at {} Hz (Wn = {:.4}), {} sections",
            filter.order,
            filter.cutoff_hz,
            wn,
            sos.len()
        );

        Ok(Self {
            order: filter.order,
            sos,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Shortest series the forward-backward pass accepts.
    ///
    /// The odd-extension padding needs more than `3 * (2 * sections + 1)`
    /// samples; series shorter than `3 * order` are refused as well.
    pub fn min_len(&self) -> usize {
        let pad = 3 * (2 * self.sos.len() + 1);
        (pad + 1).max(3 * self.order)
    }

    /// Filter one channel.
    pub fn apply(&self, signal: &[f64]) -> Result<Vec<f64>> {
        let required = self.min_len();
        if signal.len() < required {
            return Err(PipelineError::SignalTooShort {
                required,
                available: signal.len(),
            });
        }
        Ok(sosfiltfilt_dyn(signal.iter(), &self.sos))
    }

    /// Filter every column of an `(N, C)` array along the time axis.
    pub fn apply_columns(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let mut out = Array2::zeros(data.raw_dim());
        for (src, mut dst) in data.axis_iter(Axis(1)).zip(out.axis_iter_mut(Axis(1))) {
            let filtered = self.apply(&src.to_vec())?;
            for (d, v) in dst.iter_mut().zip(filtered) {
                *d = v;
            }
        }
        Ok(out)
    }
}

/// Remove gravity from the acceleration channels of an `(N, 6)` feature
/// table. Gyroscope channels are passed through untouched.
pub fn remove_gravity(features: ArrayView2<'_, f64>, filter: &HighPassFilter) -> Result<Array2<f64>> {
    let mut out = features.to_owned();
    let accel = filter.apply_columns(features.slice(s![.., 0..3]))?;
    out.slice_mut(s![.., 0..3]).assign(&accel);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn default_filter() -> HighPassFilter {
        HighPassFilter::design(&FilterConfig::default(), &WindowConfig::default()).unwrap()
    }

    #[test]
    fn test_order_four_has_two_sections() {
        let filter = default_filter();
        assert_eq!(filter.order(), 4);
        assert_eq!(filter.min_len(), 16);
    }

    #[test]
    fn test_constant_gravity_is_removed() {
        let filter = default_filter();
        let n = 1000;
        let accel = Array2::from_shape_fn((n, 3), |(_, c)| [0.0, 0.0, 9.81][c]);
        let filtered = filter.apply_columns(accel.view()).unwrap();
        assert_eq!(filtered.dim(), (n, 3));

        // Skip the edges where the transient lives.
        for row in filtered.slice(s![100..n - 100, ..]).rows() {
            for value in row {
                assert_abs_diff_eq!(*value, 0.0, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_motion_band_passes_through() {
        let filter = default_filter();
        let n = 2000;
        // 2.5 Hz vibration riding on gravity
        let signal: Vec<f64> = (0..n)
            .map(|i| 9.81 + (2.0 * PI * 2.5 * i as f64 / 50.0).sin())
            .collect();
        let filtered = filter.apply(&signal).unwrap();

        let peak = filtered[500..1500]
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        assert_abs_diff_eq!(peak, 1.0, epsilon = 0.02);
        let mean = filtered[500..1500].iter().sum::<f64>() / 1000.0;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 0.05);
    }

    #[test]
    fn test_zero_phase_keeps_event_position() {
        let filter = default_filter();
        let n = 600;
        let mut signal = vec![9.81; n];
        signal[300] += 5.0;
        let filtered = filter.apply(&signal).unwrap();
        let argmax = filtered
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(argmax, 300);
    }

    #[test]
    fn test_short_signal_rejected() {
        let filter = default_filter();
        let err = filter.apply(&[1.0; 10]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SignalTooShort {
                required: 16,
                available: 10
            }
        ));
    }

    #[test]
    fn test_gyroscope_untouched() {
        let filter = default_filter();
        let features = Array2::from_shape_fn((200, 6), |(r, c)| if c < 3 { 9.81 } else { r as f64 });
        let out = remove_gravity(features.view(), &filter).unwrap();
        assert_eq!(out.slice(s![.., 3..]), features.slice(s![.., 3..]));
        assert_abs_diff_eq!(out[[100, 2]], 0.0, epsilon = 1e-3);
    }
}
