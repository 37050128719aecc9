//! Training curves for face verification runs.
//!
//! Parses the text log of a training run for train loss, test loss and the
//! sampled triplet counts printed by the triplet loss layer, turns them into
//! plottable series and renders them as SVG line charts.

pub mod charts;
pub mod curves;
pub mod log_parser;

pub use charts::{generate_line_chart, write_csv, DataPoint, DataSeries};
pub use curves::{LossCurves, TripletCurves};
pub use log_parser::{parse_log, read_log, TrainingLog};
