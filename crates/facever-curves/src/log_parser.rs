//! Extraction of loss values and triplet counts from a training log.
//!
//! Fields are counted the way `awk` counts them: 1-based, split on runs of
//! whitespace.

use std::fs;
use std::path::Path;

use facever_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, info};

/// Field holding the loss on ` Iteration <n> ... loss = <x>` lines
const TRAIN_LOSS_FIELD: usize = 13;
/// Field holding the value on `Test loss: <x>` lines
const TEST_LOSS_FIELD: usize = 7;
/// Field holding `N` on `Totally N <a, p, n> triplets.` lines
const TRIPLET_COUNT_FIELD: usize = 6;

const ITERATION_MARKER: &str = " Iteration ";
const TEST_LOSS_MARKER: &str = "Test loss: ";
const TRIPLET_MARKER: &str = " Totally ";

/// Values extracted from one training log, in log order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingLog {
    pub train_losses: Vec<f64>,
    pub test_losses: Vec<f64>,
    pub triplet_counts: Vec<f64>,
}

/// Parse a training log held in memory.
///
/// Lines whose selected field is missing or not a number are skipped.
pub fn parse_log(text: &str) -> TrainingLog {
    let mut log = TrainingLog::default();

    for line in text.lines() {
        if is_iteration_line(line) {
            if let Some(v) = numeric_field(line, TRAIN_LOSS_FIELD) {
                log.train_losses.push(v);
            }
        }
        if line.contains(TEST_LOSS_MARKER) {
            if let Some(v) = numeric_field(line, TEST_LOSS_FIELD) {
                log.test_losses.push(v);
            }
        }
        if line.contains(TRIPLET_MARKER) {
            if let Some(v) = numeric_field(line, TRIPLET_COUNT_FIELD) {
                log.triplet_counts.push(v);
            }
        }
    }

    debug!(
        "Parsed {} train losses, {} test losses, {} triplet counts",
        log.train_losses.len(),
        log.test_losses.len(),
        log.triplet_counts.len()
    );
    log
}

/// Read and parse a training log file.
pub fn read_log(path: &Path) -> Result<TrainingLog> {
    if !path.exists() {
        return Err(Error::NotFound(format!("Log file not found: {:?}", path)));
    }
    info!("Reading training log {:?}", path);
    let text = fs::read_to_string(path)?;
    Ok(parse_log(&text))
}

/// ` Iteration ` followed by optional digits and a space.
fn is_iteration_line(line: &str) -> bool {
    line.match_indices(ITERATION_MARKER).any(|(pos, _)| {
        line[pos + ITERATION_MARKER.len()..]
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .starts_with(' ')
    })
}

fn numeric_field(line: &str, field: usize) -> Option<f64> {
    line.split_whitespace().nth(field - 1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LOG: &str = "\
I0726 11:39:00.000 100 solver.cpp:337] Iteration 0, Testing net (#0)
I0726 11:39:00.100 100 triplet_loss_layer.cpp:80] Totally 812 <a, p, n> triplets.
I0726 11:39:01.000 100 solver.cpp:404]     Test loss: 0.31
I0726 11:39:02.000 100 solver.cpp:228] Iteration 0 (0 iter/s, 1.2s/20 iters), loss = 0.29
I0726 11:39:02.100 100 triplet_loss_layer.cpp:80] Totally 640 <a, p, n> triplets.
I0726 11:39:03.000 100 solver.cpp:228] Iteration 20 (16.6 iter/s, 1.2s/20 iters), loss = 0.25
I0726 11:39:03.100 100 triplet_loss_layer.cpp:80] Totally 512 <a, p, n> triplets.
I0726 11:39:04.000 100 sgd_solver.cpp:106] Iteration 20, lr = 0.01
";

    #[test]
    fn test_parse_log() {
        let log = parse_log(LOG);
        assert_eq!(log.train_losses, vec![0.29, 0.25]);
        assert_eq!(log.test_losses, vec![0.31]);
        assert_eq!(log.triplet_counts, vec![812.0, 640.0, 512.0]);
    }

    #[test]
    fn test_iteration_marker() {
        assert!(is_iteration_line("x] Iteration 20 (1 iter/s)"));
        assert!(is_iteration_line("x] Iteration  loss"));
        assert!(!is_iteration_line("x] Iteration 20, lr = 0.01"));
        assert!(!is_iteration_line("Iteration 20 at line start"));
    }

    #[test]
    fn test_unparseable_fields_skipped() {
        let log = parse_log("a b c d Totally many <a, p, n> triplets.\nTest loss: short");
        assert!(log.triplet_counts.is_empty());
        assert!(log.test_losses.is_empty());
    }

    #[test]
    fn test_read_log() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(LOG.as_bytes()).unwrap();
        let log = read_log(file.path()).unwrap();
        assert_eq!(log.train_losses.len(), 2);

        assert!(matches!(
            read_log(Path::new("/nonexistent/train.log")),
            Err(Error::NotFound(_))
        ));
    }
}
