//! Loss and triplet-count series built from a parsed training log.

use facever_core::{Error, Result};

use crate::charts::{DataPoint, DataSeries, COLOR_PRIMARY, COLOR_TERTIARY};
use crate::log_parser::TrainingLog;

fn series(name: &str, color: &str, xs: impl Iterator<Item = f64>, ys: &[f64]) -> DataSeries {
    DataSeries {
        name: name.to_string(),
        points: xs.zip(ys).map(|(x, &y)| DataPoint { x, y, label: None }).collect(),
        color: color.to_string(),
    }
}

fn check_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidArgument(format!("{} must be positive", name)));
    }
    Ok(())
}

/// Train and test loss against iteration
#[derive(Debug, Clone)]
pub struct LossCurves {
    pub train: DataSeries,
    pub test: DataSeries,
}

impl LossCurves {
    /// Train losses are logged every `display` iterations, test losses
    /// every `test_interval`.
    pub fn from_log(log: &TrainingLog, display: usize, test_interval: usize) -> Result<Self> {
        check_positive("display", display)?;
        check_positive("test_interval", test_interval)?;

        let train_x = (0..).map(|i: usize| (i * display) as f64);
        let test_x = (0..).map(|i: usize| (i * test_interval) as f64);
        Ok(Self {
            train: series("Train Loss", COLOR_PRIMARY, train_x, &log.train_losses),
            test: series("Test Loss", COLOR_TERTIARY, test_x, &log.test_losses),
        })
    }

    pub fn series(&self) -> Vec<DataSeries> {
        vec![self.train.clone(), self.test.clone()]
    }
}

/// Mean sampled triplet count during training and during testing.
///
/// The loss layer logs once per forward pass, so each test cycle produces
/// `test_iter` counts from the test net followed by `test_interval` counts
/// from training.
#[derive(Debug, Clone)]
pub struct TripletCurves {
    pub train: DataSeries,
    pub test: DataSeries,
}

impl TripletCurves {
    pub fn from_log(
        log: &TrainingLog,
        display: usize,
        test_interval: usize,
        test_iter: usize,
    ) -> Result<Self> {
        check_positive("display", display)?;
        check_positive("test_interval", test_interval)?;

        let counts = &log.triplet_counts;
        let cycle = test_iter + test_interval;
        let windows_per_cycle = test_interval / display;

        let mut train = Vec::new();
        let mut test = Vec::new();
        for cycle_start in (0..counts.len() / cycle).map(|i| i * cycle) {
            let test_end = cycle_start + test_iter;
            test.extend(truncated_mean(&counts[cycle_start..test_end]));

            for j in 0..windows_per_cycle {
                let start = test_end + j * display;
                let end = (start + display).min(counts.len());
                train.extend(truncated_mean(&counts[start..end]));
            }
        }

        let train_x = (0..).map(|i: usize| (i * display) as f64);
        let test_x = (0..).map(|i: usize| (i * cycle) as f64);
        Ok(Self {
            train: series("Train Triplet", COLOR_PRIMARY, train_x, &train),
            test: series("Test Triplet", COLOR_TERTIARY, test_x, &test),
        })
    }

    pub fn series(&self) -> Vec<DataSeries> {
        vec![self.train.clone(), self.test.clone()]
    }
}

/// Whole-number mean, `None` for an empty window
fn truncated_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some((values.iter().sum::<f64>() / values.len() as f64).trunc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ys(s: &DataSeries) -> Vec<f64> {
        s.points.iter().map(|p| p.y).collect()
    }

    fn xs(s: &DataSeries) -> Vec<f64> {
        s.points.iter().map(|p| p.x).collect()
    }

    #[test]
    fn test_loss_curves_positions() {
        let log = TrainingLog {
            train_losses: vec![0.9, 0.7, 0.5],
            test_losses: vec![1.0, 0.6],
            triplet_counts: vec![],
        };
        let curves = LossCurves::from_log(&log, 20, 100).unwrap();
        assert_eq!(xs(&curves.train), vec![0.0, 20.0, 40.0]);
        assert_eq!(ys(&curves.train), vec![0.9, 0.7, 0.5]);
        assert_eq!(xs(&curves.test), vec![0.0, 100.0]);
    }

    #[test]
    fn test_triplet_curves_windows() {
        // test_iter 2, test_interval 4, display 2 => cycles of 6 counts
        let log = TrainingLog {
            triplet_counts: vec![
                10.0, 11.0, 5.0, 6.0, 3.0, 4.0, // cycle 0
                9.0, 9.0, 2.0, 2.0, 1.0, 2.0, // cycle 1
                7.0, // incomplete cycle
            ],
            ..TrainingLog::default()
        };
        let curves = TripletCurves::from_log(&log, 2, 4, 2).unwrap();
        assert_eq!(ys(&curves.test), vec![10.0, 9.0]);
        assert_eq!(xs(&curves.test), vec![0.0, 6.0]);
        assert_eq!(ys(&curves.train), vec![5.0, 3.0, 2.0, 1.0]);
        assert_eq!(xs(&curves.train), vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_triplet_curves_without_test_phase() {
        let log = TrainingLog {
            triplet_counts: vec![4.0, 6.0, 8.0, 8.0],
            ..TrainingLog::default()
        };
        let curves = TripletCurves::from_log(&log, 2, 2, 0).unwrap();
        assert!(curves.test.points.is_empty());
        assert_eq!(ys(&curves.train), vec![5.0, 8.0]);
    }

    #[test]
    fn test_zero_display_rejected() {
        let log = TrainingLog::default();
        assert!(LossCurves::from_log(&log, 0, 10).is_err());
        assert!(TripletCurves::from_log(&log, 10, 0, 5).is_err());
    }
}
