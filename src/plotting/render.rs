use std::collections::{BTreeMap, BTreeSet};

use image::Rgba;

use super::canvas::Canvas;
use super::spec::Style;
use crate::color::with_alpha;
use crate::data::model::{Column, Scalar};

const TICKS: usize = 5;
const TICK_LEN: f32 = 5.0;
const SWATCH: f32 = 10.0;

/// Rows drawn in one colour.
pub(crate) struct Series {
    pub label: String,
    pub color: Rgba<u8>,
    pub rows: Vec<usize>,
}

/// Pixel rectangle inside the margins.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Frame {
    pub fn new(style: &Style) -> Self {
        let margin = style.margin as f32;
        Frame {
            left: margin,
            top: margin,
            right: style.width as f32 - margin - 1.0,
            bottom: style.height as f32 - margin - 1.0,
        }
    }

    fn width(&self) -> f32 {
        self.right - self.left
    }
}

// ---------------------------------------------------------------------------
// Axis scaling
// ---------------------------------------------------------------------------

/// Linear data-to-pixel mapping along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scale {
    min: f64,
    max: f64,
}

impl Scale {
    /// Exact bounds of `values`, widened when empty or degenerate.
    fn bounds(values: impl IntoIterator<Item = f64>) -> Self {
        let (min, max) = values
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            return Scale { min: 0.0, max: 1.0 };
        }
        if (max - min).abs() < f64::EPSILON {
            return Scale {
                min: min - 0.5,
                max: max + 0.5,
            };
        }
        Scale { min, max }
    }

    /// Bounds with 5% headroom on both sides.
    fn padded(values: impl IntoIterator<Item = f64>) -> Self {
        let exact = Self::bounds(values);
        let pad = (exact.max - exact.min) * 0.05;
        Scale {
            min: exact.min - pad,
            max: exact.max + pad,
        }
    }

    fn to_px(self, value: f64, from: f32, to: f32) -> f32 {
        let t = (value - self.min) / (self.max - self.min);
        from + t as f32 * (to - from)
    }
}

// ---------------------------------------------------------------------------
// Decorations
// ---------------------------------------------------------------------------

pub(crate) fn draw_frame(canvas: &mut Canvas, frame: &Frame, color: Rgba<u8>) {
    let Frame {
        left,
        top,
        right,
        bottom,
    } = *frame;
    canvas.fill_rect(left, top, right + 1.0, top + 1.0, color);
    canvas.fill_rect(left, bottom, right + 1.0, bottom + 1.0, color);
    canvas.fill_rect(left, top, left + 1.0, bottom + 1.0, color);
    canvas.fill_rect(right, top, right + 1.0, bottom + 1.0, color);

    for i in 0..=TICKS {
        let t = i as f32 / TICKS as f32;
        let x = (left + t * (right - left)).round();
        canvas.fill_rect(x, bottom + 1.0, x + 1.0, bottom + 1.0 + TICK_LEN, color);
        let y = (bottom - t * (bottom - top)).round();
        canvas.fill_rect(left - TICK_LEN, y, left, y + 1.0, color);
    }
}

/// Outlined swatches stacked in the top-right corner, one per series.
/// Nothing is drawn for a single series.
pub(crate) fn draw_legend(
    canvas: &mut Canvas,
    frame: &Frame,
    series: &[Series],
    outline: Rgba<u8>,
) {
    if series.len() < 2 {
        return;
    }
    let x = frame.right - SWATCH - 8.0;
    for (i, s) in series.iter().enumerate() {
        let y = frame.top + 8.0 + i as f32 * (SWATCH + 6.0);
        if y + SWATCH > frame.bottom {
            break;
        }
        canvas.fill_rect(x - 1.0, y - 1.0, x + SWATCH + 1.0, y + SWATCH + 1.0, outline);
        canvas.fill_rect(x, y, x + SWATCH, y + SWATCH, s.color);
    }
}

// ---------------------------------------------------------------------------
// Plot kinds
// ---------------------------------------------------------------------------

/// Scatter (`connect == false`) or line plot. Rows with a missing coordinate
/// are skipped; lines join points in x order. Returns the points drawn.
pub(crate) fn draw_xy(
    canvas: &mut Canvas,
    frame: &Frame,
    style: &Style,
    connect: bool,
    x: &Column,
    y: &Column,
    series: &[Series],
) -> usize {
    let mut per_series: Vec<Vec<(f64, f64)>> = series
        .iter()
        .map(|s| {
            s.rows
                .iter()
                .filter_map(|&row| Some((x.get(row)?.as_f64()?, y.get(row)?.as_f64()?)))
                .collect()
        })
        .collect();
    let xs = Scale::padded(per_series.iter().flatten().map(|p| p.0));
    let ys = Scale::padded(per_series.iter().flatten().map(|p| p.1));

    for (s, points) in series.iter().zip(per_series.iter_mut()) {
        if connect {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
        let pixels: Vec<(f32, f32)> = points
            .iter()
            .map(|&(px, py)| {
                (
                    xs.to_px(px, frame.left, frame.right),
                    ys.to_px(py, frame.bottom, frame.top),
                )
            })
            .collect();

        if !connect {
            for &(px, py) in &pixels {
                canvas.fill_circle(px, py, style.point_radius, s.color);
            }
        } else if let &[(px, py)] = pixels.as_slice() {
            canvas.fill_circle(px, py, style.line_width, s.color);
        } else {
            for pair in pixels.windows(2) {
                canvas.draw_line(pair[0], pair[1], style.line_width, s.color);
            }
        }
    }
    per_series.iter().map(Vec::len).sum()
}

/// Bar plot of `y` per `x` category, one bar per series side by side.
/// Rows sharing a category within a series are summed. Returns the rows used.
pub(crate) fn draw_bars(
    canvas: &mut Canvas,
    frame: &Frame,
    x: &Column,
    y: &Column,
    series: &[Series],
) -> usize {
    let mut used = 0;
    let sums: Vec<BTreeMap<&Scalar, f64>> = series
        .iter()
        .map(|s| {
            let mut totals = BTreeMap::new();
            for &row in &s.rows {
                let (Some(key), Some(value)) = (x.get(row), y.get(row).and_then(Scalar::as_f64))
                else {
                    continue;
                };
                if key.is_null() {
                    continue;
                }
                *totals.entry(key).or_insert(0.0) += value;
                used += 1;
            }
            totals
        })
        .collect();

    let categories: BTreeSet<&Scalar> = sums.iter().flat_map(|m| m.keys().copied()).collect();
    if categories.is_empty() {
        return 0;
    }

    let ys = Scale::padded(sums.iter().flat_map(|m| m.values().copied()).chain([0.0]));
    let baseline = ys.to_px(0.0, frame.bottom, frame.top);
    let slot = frame.width() / categories.len() as f32;
    let bar = slot * 0.8 / series.len() as f32;

    for (ci, key) in categories.iter().enumerate() {
        for (si, (s, totals)) in series.iter().zip(&sums).enumerate() {
            if let Some(&total) = totals.get(key) {
                let x0 = frame.left + ci as f32 * slot + slot * 0.1 + si as f32 * bar;
                let top = ys.to_px(total, frame.bottom, frame.top);
                canvas.fill_rect(x0, baseline, x0 + bar, top, s.color);
            }
        }
    }
    used
}

/// Histogram of `x` with `style.bins` equal-width bins over the data range.
/// Several series are overlaid translucently. Returns the values counted.
pub(crate) fn draw_histogram(
    canvas: &mut Canvas,
    frame: &Frame,
    style: &Style,
    x: &Column,
    series: &[Series],
) -> usize {
    let values: Vec<Vec<f64>> = series
        .iter()
        .map(|s| s.rows.iter().filter_map(|&row| x.get(row)?.as_f64()).collect())
        .collect();
    let xs = Scale::bounds(values.iter().flatten().copied());
    let bins = style.bins;
    let bin_width = (xs.max - xs.min) / bins as f64;

    let counts: Vec<Vec<usize>> = values
        .iter()
        .map(|vs| {
            let mut counts = vec![0; bins];
            for &v in vs {
                let bin = (((v - xs.min) / bin_width).floor() as usize).min(bins - 1);
                counts[bin] += 1;
            }
            counts
        })
        .collect();

    let ys = Scale::padded(counts.iter().flatten().map(|&c| c as f64).chain([0.0]));
    let baseline = ys.to_px(0.0, frame.bottom, frame.top);
    let alpha = if series.len() > 1 { 150 } else { 255 };

    for (s, counts) in series.iter().zip(&counts) {
        let color = with_alpha(s.color, alpha);
        for (bin, &n) in counts.iter().enumerate() {
            if n == 0 {
                continue;
            }
            let x0 = xs.to_px(xs.min + bin as f64 * bin_width, frame.left, frame.right);
            let x1 = xs.to_px(xs.min + (bin + 1) as f64 * bin_width, frame.left, frame.right);
            let top = ys.to_px(n as f64, frame.bottom, frame.top);
            canvas.fill_rect(x0, baseline, (x1 - 1.0).max(x0), top, color);
        }
    }
    values.iter().map(Vec::len).sum()
}
