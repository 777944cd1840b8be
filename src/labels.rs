use crate::config::LabelMap;
use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;

/// Road surface classes with their default codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadCondition {
    Smooth,
    Pothole,
    SpeedBump,
}

impl RoadCondition {
    pub const ALL: [RoadCondition; 3] = [
        RoadCondition::Smooth,
        RoadCondition::Pothole,
        RoadCondition::SpeedBump,
    ];

    pub fn code(self) -> i64 {
        match self {
            RoadCondition::Smooth => 0,
            RoadCondition::Pothole => 1,
            RoadCondition::SpeedBump => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RoadCondition::Smooth => "Smooth",
            RoadCondition::Pothole => "Pothole",
            RoadCondition::SpeedBump => "SpeedBump",
        }
    }
}

/// Majority vote over the row labels of one window.
///
/// Ties go to the lowest label value, so `[0, 1, 0, 1]` is always `0`.
/// Returns `None` only for an empty slice.
pub fn majority_vote(labels: &[i64]) -> Option<i64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }

    // BTreeMap iterates in ascending label order; strict `>` keeps the first
    // (lowest) label among equal counts.
    let mut best: Option<(i64, usize)> = None;
    for (label, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label)
}

/// Parse one label cell. Accepts integer codes (`1`, `1.0`) or label names
/// (`Pothole`, matched case-insensitively); the result must be a code known
/// to the label map.
pub fn parse_label(cell: &str, labels: &LabelMap, row: usize) -> Result<i64> {
    let cell = cell.trim();
    let unknown = || PipelineError::UnknownLabel {
        value: cell.to_string(),
        row,
    };

    let code = if let Ok(code) = cell.parse::<i64>() {
        code
    } else if let Ok(value) = cell.parse::<f64>() {
        if value.fract() != 0.0 || !value.is_finite() {
            return Err(unknown());
        }
        value as i64
    } else {
        labels.code(cell).ok_or_else(unknown)?
    };

    if labels.contains_code(code) {
        Ok(code)
    } else {
        Err(unknown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_window_keeps_label() {
        assert_eq!(majority_vote(&[2; 100]), Some(2));
        assert_eq!(majority_vote(&[1]), Some(1));
    }

    #[test]
    fn test_majority_wins() {
        assert_eq!(majority_vote(&[0, 2, 2, 1, 2, 0]), Some(2));
    }

    #[test]
    fn test_tie_goes_to_lowest_label() {
        assert_eq!(majority_vote(&[0, 1, 0, 1]), Some(0));
        assert_eq!(majority_vote(&[1, 0, 1, 0]), Some(0));
        assert_eq!(majority_vote(&[2, 1, 2, 1, 0]), Some(1));
    }

    #[test]
    fn test_empty_window_has_no_label() {
        assert_eq!(majority_vote(&[]), None);
    }

    #[test]
    fn test_parse_label_forms() {
        let labels = LabelMap::default();
        assert_eq!(parse_label("1", &labels, 0).unwrap(), 1);
        assert_eq!(parse_label(" 2.0 ", &labels, 0).unwrap(), 2);
        assert_eq!(parse_label("SpeedBump", &labels, 0).unwrap(), 2);
        assert_eq!(parse_label(" pothole ", &labels, 0).unwrap(), 1);
        assert!(matches!(
            parse_label("7", &labels, 4),
            Err(PipelineError::UnknownLabel { row: 4, .. })
        ));
        assert!(parse_label("1.5", &labels, 0).is_err());
        assert!(parse_label("Gravel", &labels, 0).is_err());
        assert!(parse_label("", &labels, 0).is_err());
    }

    #[test]
    fn test_road_condition_codes() {
        let labels = LabelMap::default();
        for condition in RoadCondition::ALL {
            assert_eq!(
                labels.code(condition.name()),
                Some(condition.code())
            );
            assert_eq!(labels.name(condition.code()), Some(condition.name()));
        }
        assert_eq!(labels.codes(), vec![0, 1, 2]);
    }
}
