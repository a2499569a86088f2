//! PNG rendering sinks for feed series and histograms.
//!
//! Consumes fully-derived chart descriptions and renders exactly what it
//! is given; no validation or detection logic lives here, so the scan and
//! depeg passes stay testable without a graphics backend.

use anyhow::{Context, Result, bail};
use chrono::{Duration, NaiveDateTime};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;

/// 150 dpi equivalent of the original annotated chart.
pub const SERIES_SIZE: (u32, u32) = (960, 720);
/// Default size for plain plots and histograms.
pub const PLAIN_SIZE: (u32, u32) = (640, 480);

const HISTOGRAM_BINS: usize = 30;
const BAR_WIDTH: f64 = 0.9;
const GREY: RGBColor = RGBColor(128, 128, 128);

/// A depeg time span to shade. `exceeded` selects the long-duration color.
#[derive(Debug, Clone, Copy)]
pub struct DepegSpan {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub exceeded: bool,
}

/// Description of a time-series chart: the answer line, optional y
/// clamping, optional threshold reference lines, and depeg shading.
pub struct SeriesChart<'a> {
    pub title: Option<&'a str>,
    pub points: &'a [(NaiveDateTime, f64)],
    pub y_range: Option<(f64, f64)>,
    pub trigger_line: Option<f64>,
    pub recover_line: Option<f64>,
    pub spans: &'a [DepegSpan],
}

/// Description of an answer-frequency histogram.
pub struct HistogramChart<'a> {
    pub title: Option<&'a str>,
    pub values: &'a [f64],
}

/// Renders a time-series chart to a PNG file.
pub fn render_series(chart: &SeriesChart, png_path: &str, size: (u32, u32)) -> Result<()> {
    if chart.points.is_empty() {
        bail!("nothing to plot: empty feed series");
    }

    let mut x_min = chart.points[0].0;
    let mut x_max = chart.points[0].0;
    let mut data_min = chart.points[0].1;
    let mut data_max = chart.points[0].1;
    for (x, y) in chart.points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        data_min = data_min.min(*y);
        data_max = data_max.max(*y);
    }
    if x_min == x_max {
        x_max += Duration::hours(1);
    }
    let (y_min, y_max) = chart.y_range.unwrap_or_else(|| {
        let pad = ((data_max - data_min) * 0.02).max(1.0);
        (data_min - pad, data_max + pad)
    });

    let root = BitMapBackend::new(png_path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(10).x_label_area_size(40).y_label_area_size(70);
    if let Some(title) = chart.title {
        builder.caption(title, ("sans-serif", 30));
    }
    let mut ctx =
        builder.build_cartesian_2d(RangedDateTime::from(x_min..x_max), y_min..y_max)?;

    ctx.configure_mesh()
        .x_desc("updatedAt")
        .y_desc("answer")
        .x_label_formatter(&|dt: &NaiveDateTime| dt.format("%Y-%m-%d").to_string())
        .draw()?;

    // depeg shading first so the answer line stays visible on top
    for span in chart.spans {
        let color = if span.exceeded { RED } else { GREY };
        ctx.draw_series(std::iter::once(Rectangle::new(
            [(span.from, y_min), (span.to, y_max)],
            color.mix(0.3).filled(),
        )))?;
    }

    if let Some(value) = chart.recover_line {
        ctx.draw_series(LineSeries::new(
            [(x_min, value), (x_max, value)],
            GREEN.mix(0.3),
        ))?;
    }
    if let Some(value) = chart.trigger_line {
        let style = ShapeStyle::from(RED.mix(0.3));
        ctx.draw_series(DashedLineSeries::new(
            [(x_min, value), (x_max, value)],
            8,
            6,
            style,
        ))?;
    }

    ctx.draw_series(LineSeries::new(chart.points.iter().copied(), &BLUE))?;

    root.present().with_context(|| format!("writing {png_path}"))?;
    Ok(())
}

/// Renders an answer-frequency histogram to a PNG file.
pub fn render_histogram(chart: &HistogramChart, png_path: &str, size: (u32, u32)) -> Result<()> {
    if chart.values.is_empty() {
        bail!("nothing to plot: empty answer column");
    }

    let mut min = chart.values[0];
    let mut max = chart.values[0];
    for v in chart.values {
        min = min.min(*v);
        max = max.max(*v);
    }
    let span = if max > min { max - min } else { 1.0 };
    let bin_width = span / HISTOGRAM_BINS as f64;

    let mut counts = [0usize; HISTOGRAM_BINS];
    for v in chart.values {
        let idx = (((v - min) / bin_width) as usize).min(HISTOGRAM_BINS - 1);
        counts[idx] += 1;
    }
    let peak = counts.iter().copied().max().unwrap_or(0) as f64;

    let root = BitMapBackend::new(png_path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(10).x_label_area_size(40).y_label_area_size(60);
    if let Some(title) = chart.title {
        builder.caption(title, ("sans-serif", 30));
    }
    let mut ctx = builder.build_cartesian_2d(min..(min + span), 0f64..(peak * 1.05))?;

    ctx.configure_mesh()
        .x_desc("answer")
        .y_desc("frequency")
        .draw()?;

    ctx.draw_series(counts.iter().enumerate().map(|(i, &count)| {
        let x0 = min + i as f64 * bin_width + bin_width * (1.0 - BAR_WIDTH) / 2.0;
        let x1 = x0 + bin_width * BAR_WIDTH;
        Rectangle::new([(x0, 0.0), (x1, count as f64)], BLUE.filled())
    }))?;

    root.present().with_context(|| format!("writing {png_path}"))?;
    Ok(())
}
