//! Loss and triplet-count curves from a training log.
//!
//! Writes `loss_curve.svg` / `loss_curve.csv`, and with `test_iter` given
//! also `triplet_curve.svg` / `triplet_curve.csv`.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use facever_core::setup_cli_logging;
use facever_curves::{generate_line_chart, read_log, write_csv, LossCurves, TripletCurves};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "draw-curve")]
#[command(version)]
#[command(about = "Plot training curves from a training log", long_about = None)]
struct Args {
    /// Training log file
    log_file: PathBuf,

    /// Iterations between train-loss lines
    display: usize,

    /// Iterations between test phases
    test_interval: usize,

    /// Test iterations per test phase; enables the triplet-count curve
    test_iter: Option<usize>,

    /// Output directory for charts and CSV files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Also dump the parsed values as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_cli_logging(args.verbose)?;
    run(&args)?;
    Ok(())
}

fn run(args: &Args) -> Result<Vec<PathBuf>> {
    let log = read_log(&args.log_file)
        .with_context(|| format!("Failed to read {:?}", args.log_file))?;
    fs::create_dir_all(&args.output_dir)?;

    info!(
        "{} train losses, {} test losses",
        log.train_losses.len(),
        log.test_losses.len()
    );
    if log.train_losses.is_empty() && log.test_losses.is_empty() {
        warn!("No loss values found in {:?}", args.log_file);
    }

    let mut written = Vec::new();

    let loss = LossCurves::from_log(&log, args.display, args.test_interval)?;
    written.extend(render(
        &args.output_dir,
        "loss_curve",
        "Train & Test Loss Curve",
        "loss",
        &loss.series(),
    )?);

    if let Some(test_iter) = args.test_iter {
        info!("{} triplet counts", log.triplet_counts.len());
        let triplets = TripletCurves::from_log(&log, args.display, args.test_interval, test_iter)?;
        written.extend(render(
            &args.output_dir,
            "triplet_curve",
            "Train & Test Triplet Number",
            "triplets number",
            &triplets.series(),
        )?);
    }

    if args.json {
        let path = args.output_dir.join("training_log.json");
        fs::write(&path, serde_json::to_string_pretty(&log)?)?;
        written.push(path);
    }

    for path in &written {
        println!("{} {}", "✓".green(), path.display());
    }
    Ok(written)
}

fn render(
    dir: &Path,
    stem: &str,
    title: &str,
    y_label: &str,
    series: &[facever_curves::DataSeries],
) -> Result<[PathBuf; 2]> {
    let svg = dir.join(format!("{stem}.svg"));
    let csv = dir.join(format!("{stem}.csv"));
    generate_line_chart(title, "iterations", y_label, series, &svg)?;
    write_csv(series, &csv)?;
    Ok([svg, csv])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LOG: &str = "\
I0726 11:39:00.100 100 triplet_loss_layer.cpp:80] Totally 812 <a, p, n> triplets.
I0726 11:39:01.000 100 solver.cpp:404]     Test loss: 0.31
I0726 11:39:02.000 100 solver.cpp:228] Iteration 0 (0 iter/s, 1.2s/20 iters), loss = 0.29
I0726 11:39:02.100 100 triplet_loss_layer.cpp:80] Totally 640 <a, p, n> triplets.
";

    fn args(dir: &Path, test_iter: Option<usize>) -> Args {
        let log_file = dir.join("train.log");
        fs::write(&log_file, LOG).unwrap();
        Args {
            log_file,
            display: 1,
            test_interval: 1,
            test_iter,
            output_dir: dir.join("out"),
            json: true,
            verbose: false,
        }
    }

    #[test]
    fn test_loss_only() {
        let dir = TempDir::new().unwrap();
        let written = run(&args(dir.path(), None)).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("out/loss_curve.svg").exists());
        assert!(!dir.path().join("out/triplet_curve.svg").exists());
    }

    #[test]
    fn test_with_triplets() {
        let dir = TempDir::new().unwrap();
        run(&args(dir.path(), Some(1))).unwrap();

        let csv = fs::read_to_string(dir.path().join("out/triplet_curve.csv")).unwrap();
        assert!(csv.contains("Test Triplet,0,812"));
        assert!(csv.contains("Train Triplet,0,640"));
    }

    #[test]
    fn test_missing_log() {
        let dir = TempDir::new().unwrap();
        let mut a = args(dir.path(), None);
        a.log_file = dir.path().join("missing.log");
        assert!(run(&a).is_err());
    }
}
