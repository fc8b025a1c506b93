//! Bitmap chart rendering for aggregates and price series.
//!
//! Inputs are validated before any drawing starts: an empty aggregate, a
//! chart that names a series the data does not contain, or a series without
//! points all fail with [`PriceError::Render`].

use std::error::Error;
use std::fs;
use std::path::Path;

use chrono::Duration;
use log::info;
use plotters::prelude::*;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{PriceError, Result};
use crate::models::{AggregateResult, Series};

type DrawResult = std::result::Result<(), Box<dyn Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    fn background(&self) -> RGBColor {
        match self {
            Theme::Light => WHITE,
            Theme::Dark => RGBColor(20, 20, 20),
        }
    }

    fn foreground(&self) -> RGBColor {
        match self {
            Theme::Light => RGBColor(30, 30, 30),
            Theme::Dark => RGBColor(200, 200, 200),
        }
    }

    fn grid(&self) -> RGBColor {
        match self {
            Theme::Light => RGBColor(220, 220, 220),
            Theme::Dark => RGBColor(60, 60, 60),
        }
    }
}

/// What to draw and how to label it.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Fixed y-axis range; derived from the data when `None`.
    pub y_range: Option<(f64, f64)>,
    /// Keys (aggregate) or product names (series) to draw; empty draws all.
    pub series: Vec<String>,
    pub size: (u32, u32),
    pub theme: Theme,
}

impl Default for ChartSpec {
    fn default() -> Self {
        Self {
            kind: ChartKind::Bar,
            title: String::new(),
            x_label: "Date".to_string(),
            y_label: "Price".to_string(),
            y_range: None,
            series: Vec::new(),
            size: (1000, 600),
            theme: Theme::Light,
        }
    }
}

/// Draw an aggregate as bars (or a line across its keys).
pub fn render_aggregate(result: &AggregateResult, spec: &ChartSpec, output: &Path) -> Result<()> {
    for name in &spec.series {
        if !result.contains_key(name) {
            return Err(PriceError::Render(format!("unknown series: {}", name)));
        }
    }
    let bars: Vec<(String, f64)> = result
        .iter()
        .filter(|(k, _)| spec.series.is_empty() || spec.series.contains(*k))
        .filter_map(|(k, s)| s.value.and_then(|v| v.to_f64()).map(|v| (k.clone(), v)))
        .collect();
    if bars.is_empty() {
        return Err(PriceError::Render("aggregate has no values to draw".to_string()));
    }

    prepare_output(output)?;
    let values: Vec<f64> = bars.iter().map(|(_, v)| *v).collect();
    let y_range = spec.y_range.unwrap_or_else(|| {
        let (lo, hi) = calculate_y_range(&values);
        match spec.kind {
            ChartKind::Bar => (0.0, hi),
            ChartKind::Line => (lo, hi),
        }
    });
    check_range(y_range)?;

    let drawn = match spec.kind {
        ChartKind::Bar => draw_bars(&bars, spec, y_range, output),
        ChartKind::Line => draw_key_line(&bars, spec, y_range, output),
    };
    drawn.map_err(|e| PriceError::Render(format!("drawing failed: {}", e)))?;
    info!("Chart written to {}", output.display());
    Ok(())
}

/// Draw time series as one line per product.
pub fn render_series(series: &[Series], spec: &ChartSpec, output: &Path) -> Result<()> {
    for name in &spec.series {
        if !series.iter().any(|s| &s.name == name) {
            return Err(PriceError::Render(format!("unknown series: {}", name)));
        }
    }
    let selected: Vec<&Series> = series
        .iter()
        .filter(|s| spec.series.is_empty() || spec.series.contains(&s.name))
        .filter(|s| !s.points.is_empty())
        .collect();
    if selected.is_empty() {
        return Err(PriceError::Render("no series points to draw".to_string()));
    }

    prepare_output(output)?;
    let values: Vec<f64> = selected
        .iter()
        .flat_map(|s| s.points.iter().filter_map(|(_, v)| v.to_f64()))
        .collect();
    let y_range = spec.y_range.unwrap_or_else(|| calculate_y_range(&values));
    check_range(y_range)?;

    draw_series_lines(&selected, spec, y_range, output)
        .map_err(|e| PriceError::Render(format!("drawing failed: {}", e)))?;
    info!("Chart written to {}", output.display());
    Ok(())
}

/// Data range padded by 10%, never below zero.
pub(crate) fn calculate_y_range(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    let pad = if span > 0.0 {
        span * 0.1
    } else {
        (max.abs() * 0.1).max(0.5)
    };
    ((min - pad).max(0.0), max + pad)
}

fn check_range((lo, hi): (f64, f64)) -> Result<()> {
    if lo.is_finite() && hi.is_finite() && lo < hi {
        Ok(())
    } else {
        Err(PriceError::Render(format!("invalid y range {}..{}", lo, hi)))
    }
}

fn prepare_output(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                PriceError::Render(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
    }
    Ok(())
}

fn draw_bars(bars: &[(String, f64)], spec: &ChartSpec, y: (f64, f64), output: &Path) -> DrawResult {
    let theme = spec.theme;
    let root = BitMapBackend::new(output, spec.size).into_drawing_area();
    root.fill(&theme.background())?;

    let n = bars.len() as u32;
    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 28).into_font().color(&theme.foreground()))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d((0u32..n).into_segmented(), y.0..y.1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(&spec.x_label)
        .y_desc(&spec.y_label)
        .x_labels(bars.len())
        .axis_style(theme.foreground().stroke_width(1))
        .light_line_style(theme.grid().stroke_width(1))
        .label_style(("sans-serif", 14).into_font().color(&theme.foreground()))
        .axis_desc_style(("sans-serif", 16).into_font().color(&theme.foreground()))
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => bars
                .get(*i as usize)
                .map(|(k, _)| k.clone())
                .unwrap_or_default(),
            SegmentValue::Last => String::new(),
        })
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(RGBColor(0, 150, 220).filled())
            .margin(8)
            .data(bars.iter().enumerate().map(|(i, (_, v))| (i as u32, *v))),
    )?;

    root.present()?;
    Ok(())
}

fn draw_key_line(points: &[(String, f64)], spec: &ChartSpec, y: (f64, f64), output: &Path) -> DrawResult {
    let theme = spec.theme;
    let root = BitMapBackend::new(output, spec.size).into_drawing_area();
    root.fill(&theme.background())?;

    let last = points.len().saturating_sub(1).max(1);
    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 28).into_font().color(&theme.foreground()))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0..last, y.0..y.1)?;

    chart
        .configure_mesh()
        .x_desc(&spec.x_label)
        .y_desc(&spec.y_label)
        .x_labels(points.len().min(12))
        .light_line_style(theme.grid().stroke_width(1))
        .label_style(("sans-serif", 14).into_font().color(&theme.foreground()))
        .axis_desc_style(("sans-serif", 16).into_font().color(&theme.foreground()))
        .x_label_formatter(&|x| points.get(*x).map(|(k, _)| k.clone()).unwrap_or_default())
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().enumerate().map(|(i, (_, v))| (i, *v)),
        RGBColor(0, 150, 220).stroke_width(3),
    ))?;

    root.present()?;
    Ok(())
}

fn draw_series_lines(series: &[&Series], spec: &ChartSpec, y: (f64, f64), output: &Path) -> DrawResult {
    let theme = spec.theme;
    let first = series
        .iter()
        .filter_map(|s| s.points.first().map(|(d, _)| *d))
        .min()
        .ok_or("no points")?;
    let last = series
        .iter()
        .filter_map(|s| s.points.last().map(|(d, _)| *d))
        .max()
        .ok_or("no points")?;
    let span = (last - first).num_days().max(1);

    let root = BitMapBackend::new(output, spec.size).into_drawing_area();
    root.fill(&theme.background())?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 28).into_font().color(&theme.foreground()))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0i64..span, y.0..y.1)?;

    chart
        .configure_mesh()
        .x_desc(&spec.x_label)
        .y_desc(&spec.y_label)
        .x_labels(10)
        .light_line_style(theme.grid().stroke_width(1))
        .label_style(("sans-serif", 14).into_font().color(&theme.foreground()))
        .axis_desc_style(("sans-serif", 16).into_font().color(&theme.foreground()))
        .x_label_formatter(&|x| (first + Duration::days(*x)).format("%Y-%m-%d").to_string())
        .draw()?;

    for (i, s) in series.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(
                s.points
                    .iter()
                    .filter_map(|(d, v)| v.to_f64().map(|v| ((*d - first).num_days(), v))),
                color.stroke_width(2),
            ))?
            .label(s.name.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&theme.background().mix(0.8))
        .border_style(&theme.foreground())
        .label_font(("sans-serif", 14).into_font().color(&theme.foreground()))
        .draw()?;

    root.present()?;
    Ok(())
}
