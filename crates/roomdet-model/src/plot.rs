//! Training results graph: accuracy on the left, loss on the right.

use crate::train::EpochMetrics;
use plotters::prelude::*;
use plotters::style::FontStyle;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

pub const GRAPH_SIZE: (u32, u32) = (800, 800);

const TRAIN_COLOR: RGBColor = RGBColor(31, 119, 180);
const VAL_COLOR: RGBColor = RGBColor(255, 127, 14);

/// Registered under the family plotters falls back to for unstyled text.
const FONT_FAMILY: &str = "sans-serif";
static FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
#[error("failed to draw results graph: {0}")]
pub struct PlotError(String);

fn draw_err<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError(e.to_string())
}

/// Register the embedded font with plotters once per process.
fn ensure_font() -> Result<(), PlotError> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    let ok = *REGISTERED.get_or_init(|| {
        plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, FONT).is_ok()
    });
    if ok {
        Ok(())
    } else {
        Err(PlotError("embedded font could not be parsed".into()))
    }
}

/// One line on a panel.
struct Curve<'a> {
    label: &'static str,
    color: RGBColor,
    points: &'a [(f64, f64)],
}

/// One titled chart with its legend corner.
struct Panel<'a> {
    title: &'static str,
    legend: SeriesLabelPosition,
    curves: [Curve<'a>; 2],
}

/// Render the 800×800 two-panel PNG to `path`.
///
/// Left panel: accuracy, legend lower right. Right panel: loss, legend
/// upper right. Training curves are blue and validation curves orange; a
/// curve without points (no validation split) is left out of the legend.
pub fn render_history(history: &[EpochMetrics], path: &Path) -> Result<(), PlotError> {
    ensure_font()?;

    let root = BitMapBackend::new(path, GRAPH_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;
    let (left, right) = root.split_horizontally((GRAPH_SIZE.0 / 2) as i32);

    let series = |f: fn(&EpochMetrics) -> Option<f32>| -> Vec<(f64, f64)> {
        history
            .iter()
            .filter_map(|m| f(m).map(|v| (m.epoch as f64, v as f64)))
            .collect()
    };
    let train_acc = series(|m| Some(m.train_accuracy));
    let val_acc = series(|m| m.val_accuracy);
    let train_loss = series(|m| Some(m.train_loss));
    let val_loss = series(|m| m.val_loss);

    draw_panel(
        &left,
        &Panel {
            title: "Training and Validation Accuracy",
            legend: SeriesLabelPosition::LowerRight,
            curves: [
                Curve {
                    label: "Training Accuracy",
                    color: TRAIN_COLOR,
                    points: &train_acc,
                },
                Curve {
                    label: "Validation Accuracy",
                    color: VAL_COLOR,
                    points: &val_acc,
                },
            ],
        },
    )?;
    draw_panel(
        &right,
        &Panel {
            title: "Training and Validation Loss",
            legend: SeriesLabelPosition::UpperRight,
            curves: [
                Curve {
                    label: "Training Loss",
                    color: TRAIN_COLOR,
                    points: &train_loss,
                },
                Curve {
                    label: "Validation Loss",
                    color: VAL_COLOR,
                    points: &val_loss,
                },
            ],
        },
    )?;

    root.present().map_err(draw_err)?;
    tracing::debug!(path = %path.display(), epochs = history.len(), "rendered results graph");
    Ok(())
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    panel: &Panel<'_>,
) -> Result<(), PlotError> {
    let all = panel.curves.iter().flat_map(|c| c.points.iter());
    let (x_range, y_range) = bounds(all);

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .caption(panel.title, (FONT_FAMILY, 20))
        .x_label_area_size(30)
        .y_label_area_size(45)
        .build_cartesian_2d(x_range, y_range)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .light_line_style(RGBColor(235, 235, 235))
        .label_style((FONT_FAMILY, 12))
        .draw()
        .map_err(draw_err)?;

    for curve in panel.curves.iter().filter(|c| !c.points.is_empty()) {
        let color = curve.color;
        chart
            .draw_series(LineSeries::new(
                curve.points.iter().copied(),
                ShapeStyle::from(&color).stroke_width(2),
            ))
            .map_err(draw_err)?
            .label(curve.label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], ShapeStyle::from(&color).stroke_width(2))
            });
    }

    if panel.curves.iter().any(|c| !c.points.is_empty()) {
        chart
            .configure_series_labels()
            .position(panel.legend.clone())
            .label_font((FONT_FAMILY, 14))
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(draw_err)?;
    }

    let (w, h) = area.dim_in_pixel();
    area.draw(&Rectangle::new(
        [(0, 0), (w as i32 - 1, h as i32 - 1)],
        ShapeStyle::from(&BLACK).stroke_width(1),
    ))
    .map_err(draw_err)?;
    Ok(())
}

/// Axis ranges covering every point, padded so flat or single-point
/// curves still get a non-empty range.
fn bounds<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> (Range<f64>, Range<f64>) {
    let mut x = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y = (f64::INFINITY, f64::NEG_INFINITY);
    for &(px, py) in points.filter(|(px, py)| px.is_finite() && py.is_finite()) {
        x = (x.0.min(px), x.1.max(px));
        y = (y.0.min(py), y.1.max(py));
    }
    if !x.0.is_finite() {
        return (0.0..1.0, 0.0..1.0);
    }

    let x_range = if x.1 > x.0 { x.0..x.1 } else { x.0 - 0.5..x.0 + 0.5 };
    let pad = ((y.1 - y.0) * 0.05).max(0.01);
    (x_range, (y.0 - pad)..(y.1 + pad))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(epoch: usize, val: bool) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: 1.0 / (epoch as f32 + 1.0),
            train_accuracy: 0.5 + epoch as f32 * 0.1,
            val_loss: val.then_some(1.2 / (epoch as f32 + 1.0)),
            val_accuracy: val.then_some(0.4 + epoch as f32 * 0.1),
        }
    }

    #[test]
    fn test_bounds_padding() {
        let pts = [(0.0, 0.5), (3.0, 0.9)];
        let (x, y) = bounds(pts.iter());
        assert_eq!(x, 0.0..3.0);
        assert!(y.start < 0.5 && y.end > 0.9);

        let (x, y) = bounds([(2.0, 0.7)].iter());
        assert_eq!(x, 1.5..2.5);
        assert!(y.end > y.start);

        let (x, _) = bounds(std::iter::empty());
        assert_eq!(x, 0.0..1.0);
    }

    #[test]
    fn test_render_writes_800_square_png() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run_graph.png");
        let history: Vec<_> = (0..4).map(|e| metrics(e, true)).collect();

        render_history(&history, &path).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), GRAPH_SIZE);
    }

    #[test]
    fn test_embedded_font_registers() {
        ensure_font().unwrap();
        ensure_font().unwrap();
    }

    #[test]
    fn test_render_draws_panel_titles() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("titled_graph.png");
        let history: Vec<_> = (0..3).map(|e| metrics(e, true)).collect();

        render_history(&history, &path).unwrap();

        // Both titles are centered in the caption band of their panel.
        let img = image::open(&path).unwrap().to_rgb8();
        for x_center in [200u32, 600] {
            let inked = (22..38)
                .flat_map(|y| (x_center - 50..x_center + 50).map(move |x| (x, y)))
                .any(|(x, y)| img.get_pixel(x, y).0.iter().all(|&c| c < 100));
            assert!(inked, "no title text near x={x_center}");
        }
    }

    #[test]
    fn test_render_without_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("solo_graph.png");
        let history = vec![metrics(0, false)];

        render_history(&history, &path).unwrap();
        assert!(path.exists());
    }
}
