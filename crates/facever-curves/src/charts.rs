//! SVG line charts and CSV export for training curves.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use facever_core::Result;
use tracing::info;

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 80.0;
const Y_TICKS: usize = 5;
const X_TICKS: usize = 8;

pub const COLOR_PRIMARY: &str = "#3498db";
pub const COLOR_TERTIARY: &str = "#e74c3c";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// A data point for a line chart
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
    pub label: Option<String>,
}

/// A named, coloured series of points
#[derive(Debug, Clone, PartialEq)]
pub struct DataSeries {
    pub name: String,
    pub points: Vec<DataPoint>,
    pub color: String,
}

/// Render `series` as an SVG line chart at `output_path`.
///
/// Both axes are fitted to the data; a flat or single-point series gets a
/// unit-wide range around its value.
pub fn generate_line_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[DataSeries],
    output_path: &Path,
) -> Result<()> {
    fs::write(output_path, render_line_chart(title, x_label, y_label, series))?;
    info!("Chart written to {:?}", output_path);
    Ok(())
}

fn render_line_chart(title: &str, x_label: &str, y_label: &str, series: &[DataSeries]) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let (x_min, x_max, y_min, y_max) = find_ranges(series);
    let to_x = |x: f64| MARGIN_LEFT + (x - x_min) / (x_max - x_min) * plot_width;
    let to_y = |y: f64| MARGIN_TOP + plot_height - (y - y_min) / (y_max - y_min) * plot_height;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );
    let _ = write!(
        svg,
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        CHART_WIDTH, CHART_HEIGHT
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        CHART_WIDTH / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    );

    // horizontal grid with y tick labels
    for i in 0..=Y_TICKS {
        let frac = i as f64 / Y_TICKS as f64;
        let y = MARGIN_TOP + plot_height - frac * plot_height;
        let value = y_min + frac * (y_max - y_min);
        let _ = write!(
            svg,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            y,
            MARGIN_LEFT + plot_width,
            y,
            COLOR_GRID
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            COLOR_TEXT,
            format_tick(value)
        );
    }

    for i in 0..=X_TICKS {
        let value = x_min + i as f64 / X_TICKS as f64 * (x_max - x_min);
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.0}</text>"#,
            to_x(value),
            MARGIN_TOP + plot_height + 20.0,
            COLOR_TEXT,
            value
        );
    }

    // axes
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        COLOR_TEXT,
        escape_xml(x_label)
    );
    let _ = write!(
        svg,
        r#"<text x="20" y="{y}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {y})">{}</text>"#,
        COLOR_TEXT,
        escape_xml(y_label),
        y = CHART_HEIGHT / 2.0
    );

    for s in series.iter().filter(|s| !s.points.is_empty()) {
        let path: Vec<String> = s
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let cmd = if i == 0 { "M" } else { "L" };
                format!("{} {:.2} {:.2}", cmd, to_x(p.x), to_y(p.y))
            })
            .collect();
        let _ = write!(
            svg,
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            path.join(" "),
            s.color
        );

        for p in &s.points {
            if let Some(label) = &p.label {
                let _ = write!(
                    svg,
                    r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-family="Arial, sans-serif" font-size="10" fill="{}">{}</text>"#,
                    to_x(p.x),
                    to_y(p.y) - 12.0,
                    COLOR_TEXT,
                    escape_xml(label)
                );
            }
        }
    }

    let mut legend_y = MARGIN_TOP + 10.0;
    for s in series {
        let _ = write!(
            svg,
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT - 120.0,
            legend_y,
            s.color
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT - 100.0,
            legend_y + 12.0,
            COLOR_TEXT,
            escape_xml(&s.name)
        );
        legend_y += 25.0;
    }

    svg.push_str("</svg>");
    svg
}

/// Write every series as `series,x,y` rows.
pub fn write_csv(series: &[DataSeries], output_path: &Path) -> Result<()> {
    let mut csv = String::from("series,x,y\n");
    for s in series {
        for p in &s.points {
            let _ = writeln!(csv, "{},{},{}", csv_field(&s.name), p.x, p.y);
        }
    }
    fs::write(output_path, csv)?;
    Ok(())
}

/// Quote a field holding a separator, quote or line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn find_ranges(series: &[DataSeries]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for p in series.iter().flat_map(|s| &s.points) {
        x_min = x_min.min(p.x);
        x_max = x_max.max(p.x);
        y_min = y_min.min(p.y);
        y_max = y_max.max(p.y);
    }

    let (x_min, x_max) = widen(x_min, x_max);
    let (y_min, y_max) = widen(y_min, y_max);
    (x_min, x_max, y_min, y_max)
}

/// Non-empty range; no data falls back to `0..1`.
fn widen(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        (0.0, 1.0)
    } else if max - min < f64::EPSILON {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    }
}

fn format_tick(value: f64) -> String {
    if value.abs() >= 100.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.3}", value)
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loss_series() -> Vec<DataSeries> {
        vec![
            DataSeries {
                name: "Train Loss".to_string(),
                points: vec![
                    DataPoint { x: 0.0, y: 0.9, label: None },
                    DataPoint { x: 20.0, y: 0.5, label: Some("0.5".to_string()) },
                ],
                color: COLOR_PRIMARY.to_string(),
            },
            DataSeries {
                name: "Test <a, p, n>".to_string(),
                points: vec![],
                color: COLOR_TERTIARY.to_string(),
            },
        ]
    }

    #[test]
    fn test_line_chart_generation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loss.svg");
        generate_line_chart("Loss", "iterations", "loss", &loss_series(), &path).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("M 80.00 "));
        assert!(svg.contains("Test &lt;a, p, n&gt;"));
    }

    #[test]
    fn test_ranges_fit_data() {
        assert_eq!(find_ranges(&loss_series()), (0.0, 20.0, 0.5, 0.9));
        assert_eq!(find_ranges(&[]), (0.0, 1.0, 0.0, 1.0));
        assert_eq!(widen(3.0, 3.0), (2.5, 3.5));
    }

    #[test]
    fn test_write_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loss.csv");
        write_csv(&loss_series(), &path).unwrap();

        let csv = fs::read_to_string(&path).unwrap();
        assert_eq!(csv, "series,x,y\nTrain Loss,0,0.9\nTrain Loss,20,0.5\n");
    }

    #[test]
    fn test_write_csv_quotes_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("triplets.csv");
        let series = vec![DataSeries {
            name: "Test <a, p, n> \"hard\"".to_string(),
            points: vec![DataPoint { x: 0.0, y: 812.0, label: None }],
            color: COLOR_TERTIARY.to_string(),
        }];
        write_csv(&series, &path).unwrap();

        let csv = fs::read_to_string(&path).unwrap();
        assert_eq!(csv, "series,x,y\n\"Test <a, p, n> \"\"hard\"\"\",0,812\n");
        assert_eq!(csv_field("Train Loss"), "Train Loss");
    }
}
