//! plotters backend glue
//!
//! Charts are drawn generically over `DrawingBackend`; the format only picks
//! the backend. PNG (the default) needs the `png` feature and system fonts;
//! SVG needs neither.

use std::path::Path;

use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;

use super::{ChartFormat, LineChart};
use crate::{Error, Result};

/// Fraction of the data range added as padding on every side.
const PADDING: f64 = 0.05;

fn plot_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> Error {
    Error::PlotError(e.to_string())
}

/// Padded `(min, max)` of a coordinate; widens degenerate ranges.
fn padded_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.filter(|v| v.is_finite()).fold(None::<(f64, f64)>, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
    })?;
    let span = hi - lo;
    if span > 0.0 {
        Some((lo - span * PADDING, hi + span * PADDING))
    } else {
        let pad = lo.abs().max(1.0) * PADDING;
        Some((lo - pad, hi + pad))
    }
}

fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &LineChart) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let points = || chart.series.iter().flat_map(|s| s.points.iter());
    let (x_lo, x_hi) = padded_range(points().map(|p| p.0))
        .ok_or_else(|| Error::PlotError(format!("{}: no finite points", chart.title)))?;
    let (y_lo, y_hi) = padded_range(points().map(|p| p.1))
        .ok_or_else(|| Error::PlotError(format!("{}: no finite points", chart.title)))?;

    root.fill(&WHITE).map_err(plot_err)?;
    let mut ctx = ChartBuilder::on(root)
        .caption(&chart.title, ("sans-serif", 18))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(plot_err)?;

    ctx.configure_mesh()
        .x_desc(chart.x_desc.as_str())
        .y_desc(chart.y_desc.as_str())
        .light_line_style(BLACK.mix(0.05))
        .draw()
        .map_err(plot_err)?;

    for (i, series) in chart.series.iter().enumerate() {
        let color = Palette99::pick(i).mix(0.9);
        ctx.draw_series(LineSeries::new(series.points.iter().copied(), color.stroke_width(2)))
            .map_err(plot_err)?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        if series.markers {
            ctx.draw_series(
                series
                    .points
                    .iter()
                    .map(|&p| Circle::new(p, 3, color.filled())),
            )
            .map_err(plot_err)?;
        }
    }

    ctx.configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

/// Render `chart` to `path` in the requested format.
///
/// # Errors
///
/// `InvalidInput` for PNG without the `png` feature, `PlotError` if the chart
/// has no finite points or the backend fails.
pub fn render(chart: &LineChart, path: &Path, format: ChartFormat) -> Result<()> {
    format.ensure_supported()?;
    match format {
        ChartFormat::Svg => draw(&SVGBackend::new(path, chart.size).into_drawing_area(), chart),
        ChartFormat::Png => render_png(chart, path),
    }
}

#[cfg(feature = "png")]
fn render_png(chart: &LineChart, path: &Path) -> Result<()> {
    draw(&BitMapBackend::new(path, chart.size).into_drawing_area(), chart)
}

#[cfg(not(feature = "png"))]
fn render_png(_chart: &LineChart, _path: &Path) -> Result<()> {
    ChartFormat::Png.ensure_supported()
}
