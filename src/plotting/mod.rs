//! Rendering a dataset to a raster image.
//!
//! [`PlotSpec`] is validated against a schema whenever it is built or
//! changed. [`basic_plot`] checks it once more against the dataset it is
//! given, then draws the plot into an RGBA buffer and optionally writes a PNG.

mod canvas;
mod render;
mod spec;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{ImageError, ImageFormat, Rgba, RgbaImage};

use crate::color::{ColorMap, SERIES_BLUE};
use crate::data::model::{Column, DType, Dataset, Scalar};
use crate::error::{RenderError, ValidationError};
use canvas::Canvas;
use render::{Frame, Series};

pub use spec::{OutputTarget, PlotKind, PlotSpec, Style};

/// A rendered plot.
#[derive(Debug, Clone)]
pub struct Figure {
    pub image: RgbaImage,
    /// Label and colour of each series, in drawing order.
    pub legend: Vec<(String, Rgba<u8>)>,
    /// Rows that ended up on the plot.
    pub points: usize,
    /// Where the figure was written, for file targets.
    pub path: Option<PathBuf>,
}

impl Figure {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn series(&self) -> usize {
        self.legend.len()
    }

    /// Write the image as PNG.
    pub fn save(&self, path: &Path) -> Result<(), RenderError> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| save_error(path, e))
    }
}

fn save_error(path: &Path, err: ImageError) -> RenderError {
    match err {
        ImageError::IoError(source) => RenderError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => RenderError::Encode(other),
    }
}

/// Render `dataset` as configured by `spec`.
///
/// Axis columns are looked up among columns and column annotations. With
/// `color_by` set, rows are split into one series per distinct value, nulls
/// included; otherwise everything is a single series. Rows missing a
/// coordinate are left out.
pub fn basic_plot(dataset: &Dataset, spec: &PlotSpec) -> Result<Figure, RenderError> {
    let n_rows = dataset
        .row_count()
        .map_err(RenderError::InconsistentShape)?;
    let kind = spec.kind();

    let x = axis_column(dataset, spec, n_rows, spec.x(), |d| kind.accepts_x(d))?;
    let y = spec
        .y()
        .map(|name| axis_column(dataset, spec, n_rows, name, |d| kind.accepts_y(d)))
        .transpose()?;
    let color = spec
        .color_by()
        .map(|name| axis_column(dataset, spec, n_rows, name, |d| d != DType::Mixed))
        .transpose()?;

    let series = split_series(color, n_rows, spec.y().unwrap_or(spec.x()));
    let style = spec.style();
    let frame = Frame::new(style);
    let mut canvas = Canvas::new(style.width, style.height, Rgba(style.background));

    let points = match (kind, y) {
        (PlotKind::Scatter, Some(y)) => {
            render::draw_xy(&mut canvas, &frame, style, false, x, y, &series)
        }
        (PlotKind::Line, Some(y)) => {
            render::draw_xy(&mut canvas, &frame, style, true, x, y, &series)
        }
        (PlotKind::Bar, Some(y)) => render::draw_bars(&mut canvas, &frame, x, y, &series),
        (PlotKind::Histogram, _) => render::draw_histogram(&mut canvas, &frame, style, x, &series),
        // PlotSpec guarantees a y axis for these kinds
        (_, None) => 0,
    };

    let foreground = Rgba(style.foreground);
    render::draw_frame(&mut canvas, &frame, foreground);
    render::draw_legend(&mut canvas, &frame, &series, foreground);

    let mut figure = Figure {
        image: canvas.into_image(),
        legend: series.into_iter().map(|s| (s.label, s.color)).collect(),
        points,
        path: None,
    };
    if let OutputTarget::File(path) = spec.output() {
        figure.save(path)?;
        figure.path = Some(path.clone());
    }

    log::info!(
        "Rendered {kind} plot of '{}' ({} series, {points} points{})",
        spec.x(),
        figure.series(),
        figure
            .path
            .as_ref()
            .map(|p| format!(", saved to {}", p.display()))
            .unwrap_or_default()
    );
    Ok(figure)
}

fn axis_column<'a>(
    dataset: &'a Dataset,
    spec: &PlotSpec,
    n_rows: usize,
    name: &str,
    accepts: impl Fn(DType) -> bool,
) -> Result<&'a Column, RenderError> {
    let column = dataset
        .resolve(name)
        .ok_or_else(|| RenderError::MissingColumn(name.to_string()))?;
    if !accepts(column.dtype()) {
        return Err(RenderError::TypeMismatch {
            column: name.to_string(),
            expected: spec.schema().dtype(name).unwrap_or(column.dtype()),
            actual: column.dtype(),
        });
    }
    if column.len() != n_rows {
        return Err(RenderError::InconsistentShape(
            ValidationError::LengthMismatch {
                column: name.to_string(),
                expected: n_rows,
                actual: column.len(),
            },
        ));
    }
    Ok(column)
}

fn split_series(color: Option<&Column>, n_rows: usize, label: &str) -> Vec<Series> {
    let Some(column) = color else {
        return vec![Series {
            label: label.to_string(),
            color: SERIES_BLUE,
            rows: (0..n_rows).collect(),
        }];
    };

    let color_map = ColorMap::new(column.values());

    let mut groups: BTreeMap<&Scalar, Vec<usize>> = BTreeMap::new();
    for (row, value) in column.values().iter().enumerate() {
        groups.entry(value).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|(value, rows)| Series {
            label: value.to_string(),
            color: color_map.color_for(value),
            rows,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::GRAY;

    fn assay() -> Dataset {
        Dataset::from_columns(vec![
            Column::from_values("dose", [0.1, 1.0, 10.0, 0.1, 1.0, 10.0]),
            Column::from_values(
                "response",
                [Some(0.1), Some(0.5), Some(0.9), Some(0.2), None, Some(0.7)],
            ),
            Column::from_values(
                "compound",
                [Some("a"), Some("a"), Some("a"), Some("b"), Some("b"), None],
            ),
        ])
        .unwrap()
    }

    fn dose_response(ds: &Dataset, kind: PlotKind) -> PlotSpec {
        PlotSpec::new(&ds.schema(), kind, "dose", Some("response")).unwrap()
    }

    fn small(spec: &mut PlotSpec) {
        spec.set_style(Style {
            width: 200,
            height: 150,
            margin: 20,
            ..Style::default()
        })
        .unwrap();
    }

    #[test]
    fn scatter_draws_every_complete_row() {
        let ds = assay();
        let mut spec = dose_response(&ds, PlotKind::Scatter);
        small(&mut spec);
        let figure = basic_plot(&ds, &spec).unwrap();

        assert_eq!((figure.width(), figure.height()), (200, 150));
        assert_eq!(figure.points, 5);
        assert_eq!(figure.series(), 1);
        assert_eq!(figure.legend[0].0, "response");
        assert!(figure.image.pixels().any(|p| *p == SERIES_BLUE));
        assert!(figure.path.is_none());
    }

    #[test]
    fn color_by_splits_series_and_keeps_nulls() {
        let ds = assay();
        let mut spec = dose_response(&ds, PlotKind::Line);
        spec.set_color_by(Some("compound")).unwrap();
        let figure = basic_plot(&ds, &spec).unwrap();

        let labels: Vec<&str> = figure.legend.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["<null>", "a", "b"]);
        assert_eq!(figure.legend[0].1, GRAY);
        assert_ne!(figure.legend[1].1, figure.legend[2].1);
    }

    #[test]
    fn bars_and_histograms() {
        let ds = assay();
        let schema = ds.schema();
        let bar = PlotSpec::new(&schema, PlotKind::Bar, "compound", Some("response")).unwrap();
        // the null compound has no category
        assert_eq!(basic_plot(&ds, &bar).unwrap().points, 4);

        let mut hist = PlotSpec::new(&schema, PlotKind::Histogram, "response", None).unwrap();
        hist.set_style(Style { bins: 3, ..Style::default() }).unwrap();
        hist.set_color_by(Some("compound")).unwrap();
        let figure = basic_plot(&ds, &hist).unwrap();
        assert_eq!(figure.points, 5);
        assert_eq!(figure.series(), 3);
    }

    #[test]
    fn rendering_is_deterministic() {
        let ds = assay();
        let mut spec = dose_response(&ds, PlotKind::Scatter);
        spec.set_color_by(Some("compound")).unwrap();
        let a = basic_plot(&ds, &spec).unwrap();
        let b = basic_plot(&ds, &spec).unwrap();
        assert_eq!(a.image, b.image);
        assert_eq!(a.legend, b.legend);
    }

    #[test]
    fn empty_dataset_renders_a_blank_frame() {
        let ds = Dataset::from_columns(vec![
            Column::typed("dose", DType::Float, vec![]),
            Column::typed("response", DType::Float, vec![]),
        ])
        .unwrap();
        let spec = dose_response(&ds, PlotKind::Scatter);
        let figure = basic_plot(&ds, &spec).unwrap();
        assert_eq!(figure.points, 0);
    }

    #[test]
    fn data_that_no_longer_fits_the_spec() {
        let ds = assay();
        let spec = dose_response(&ds, PlotKind::Scatter);

        let dose = ds.column("dose").unwrap().clone();
        let without_response = Dataset::from_columns(vec![dose]).unwrap();
        assert!(matches!(
            basic_plot(&without_response, &spec),
            Err(RenderError::MissingColumn(name)) if name == "response"
        ));

        let retyped = Dataset::from_columns(vec![
            Column::from_values("dose", ["low", "mid", "high"]),
            Column::from_values("response", [0.1, 0.5, 0.9]),
        ])
        .unwrap();
        assert!(matches!(
            basic_plot(&retyped, &spec),
            Err(RenderError::TypeMismatch {
                expected: DType::Float,
                actual: DType::String,
                ..
            })
        ));

        let ragged = Dataset::from_columns(vec![
            Column::from_values("dose", [0.1, 1.0]),
            Column::from_values("response", [0.1]),
        ])
        .unwrap();
        assert!(matches!(
            basic_plot(&ragged, &spec),
            Err(RenderError::InconsistentShape(_))
        ));
    }

    #[test]
    fn file_targets_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dose_response.png");
        let ds = assay();
        let mut spec = dose_response(&ds, PlotKind::Scatter);
        spec.set_output(OutputTarget::File(path.clone())).unwrap();

        let figure = basic_plot(&ds, &spec).unwrap();
        assert_eq!(figure.path.as_deref(), Some(path.as_path()));
        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded, figure.image);
    }

    #[test]
    fn unwritable_targets_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("plot.png");
        let ds = assay();
        let mut spec = dose_response(&ds, PlotKind::Scatter);
        spec.set_output(OutputTarget::File(path)).unwrap();
        assert!(matches!(basic_plot(&ds, &spec), Err(RenderError::Io { .. })));
    }

    #[test]
    fn encoder_failures_are_not_io_errors() {
        use image::error::{LimitError, LimitErrorKind};

        let path = Path::new("plot.png");
        let limits = ImageError::Limits(LimitError::from_kind(LimitErrorKind::DimensionError));
        let err = save_error(path, limits);
        assert!(matches!(err, RenderError::Encode(_)));
        assert_eq!(crate::Error::from(err).kind(), crate::ErrorKind::Render);

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            save_error(path, ImageError::IoError(denied)),
            RenderError::Io { path, .. } if path == Path::new("plot.png")
        ));
    }
}
