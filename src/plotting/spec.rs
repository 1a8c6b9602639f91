use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::model::{DType, Schema};
use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    Scatter,
    Line,
    Bar,
    Histogram,
}

impl PlotKind {
    /// Whether a column of `dtype` can sit on the x axis.
    pub fn accepts_x(self, dtype: DType) -> bool {
        match self {
            PlotKind::Bar => dtype != DType::Mixed,
            _ => dtype.is_numeric(),
        }
    }

    /// Whether a column of `dtype` can sit on the y axis.
    pub fn accepts_y(self, dtype: DType) -> bool {
        self != PlotKind::Histogram && dtype.is_numeric()
    }

    pub fn needs_y(self) -> bool {
        self != PlotKind::Histogram
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlotKind::Scatter => "scatter",
            PlotKind::Line => "line",
            PlotKind::Bar => "bar",
            PlotKind::Histogram => "histogram",
        };
        f.write_str(name)
    }
}

/// Rendering parameters. Sizes are in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub width: u32,
    pub height: u32,
    /// Space between the image border and the plot frame.
    pub margin: u32,
    pub point_radius: f32,
    pub line_width: f32,
    /// Histogram bin count.
    pub bins: usize,
    pub background: [u8; 4],
    /// Frame, ticks and legend outline.
    pub foreground: [u8; 4],
}

impl Default for Style {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            margin: 48,
            point_radius: 3.0,
            line_width: 1.5,
            bins: 20,
            background: [255, 255, 255, 255],
            foreground: [40, 40, 40, 255],
        }
    }
}

impl Style {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |msg: String| Err(ConfigurationError::InvalidStyle(msg));
        for (name, size) in [("width", self.width), ("height", self.height)] {
            if !(16..=8192).contains(&size) {
                return invalid(format!("{name} {size} is outside 16..=8192"));
            }
        }
        if self.margin.saturating_mul(2) >= self.width.min(self.height) {
            return invalid(format!("margin {} leaves no room to plot", self.margin));
        }
        for (name, size) in [("point_radius", self.point_radius), ("line_width", self.line_width)] {
            if !(size > 0.0 && size <= 64.0) {
                return invalid(format!("{name} {size} is outside (0, 64]"));
            }
        }
        if !(1..=1000).contains(&self.bins) {
            return invalid(format!("bins {} is outside 1..=1000", self.bins));
        }
        Ok(())
    }
}

/// Where a rendered figure goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// Keep the image in the returned [`Figure`](super::Figure) only.
    #[default]
    Memory,
    /// Also write it as PNG.
    File(PathBuf),
}

impl OutputTarget {
    fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            OutputTarget::Memory => Ok(()),
            OutputTarget::File(path) if is_png(path) => Ok(()),
            OutputTarget::File(path) => Err(ConfigurationError::UnsupportedFormat(path.clone())),
        }
    }
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// A reusable plot configuration.
///
/// A `PlotSpec` keeps a [`Schema`] snapshot of the dataset it was built for,
/// so every mutation is checked on the spot: naming a column that does not exist,
/// or one whose type the plot kind cannot use, fails immediately. A failed
/// mutation leaves the configuration unchanged.
///
/// ```
/// # use drugbank_toolkit::data::model::{Column, Dataset};
/// # use drugbank_toolkit::plotting::{PlotKind, PlotSpec};
/// let ds = Dataset::from_columns(vec![
///     Column::from_values("dose", [0.1, 1.0]),
///     Column::from_values("response", [0.2, 0.9]),
/// ]).unwrap();
/// let schema = ds.schema();
/// let mut spec = PlotSpec::new(&schema, PlotKind::Scatter, "dose", Some("response")).unwrap();
/// assert!(spec.set_x("weight").is_err());
/// assert_eq!(spec.x(), "dose");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSpec {
    schema: Schema,
    kind: PlotKind,
    x: String,
    y: Option<String>,
    color_by: Option<String>,
    style: Style,
    output: OutputTarget,
}

impl PlotSpec {
    pub fn new(
        schema: &Schema,
        kind: PlotKind,
        x: &str,
        y: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let spec = PlotSpec {
            schema: schema.clone(),
            kind,
            x: x.to_string(),
            y: y.map(String::from),
            color_by: None,
            style: Style::default(),
            output: OutputTarget::Memory,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn kind(&self) -> PlotKind {
        self.kind
    }

    pub fn x(&self) -> &str {
        &self.x
    }

    pub fn y(&self) -> Option<&str> {
        self.y.as_deref()
    }

    pub fn color_by(&self) -> Option<&str> {
        self.color_by.as_deref()
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    /// The schema this configuration was validated against.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn set_kind(&mut self, kind: PlotKind) -> Result<(), ConfigurationError> {
        self.update(|spec| spec.kind = kind)
    }

    /// Change kind and axes in one step, for moves such as scatter →
    /// histogram that no single-field mutation can make.
    pub fn set_layout(
        &mut self,
        kind: PlotKind,
        x: &str,
        y: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        self.update(|spec| {
            spec.kind = kind;
            spec.x = x.to_string();
            spec.y = y.map(String::from);
        })
    }

    pub fn set_x(&mut self, column: &str) -> Result<(), ConfigurationError> {
        self.update(|spec| spec.x = column.to_string())
    }

    pub fn set_y(&mut self, column: Option<&str>) -> Result<(), ConfigurationError> {
        self.update(|spec| spec.y = column.map(String::from))
    }

    pub fn set_color_by(&mut self, column: Option<&str>) -> Result<(), ConfigurationError> {
        self.update(|spec| spec.color_by = column.map(String::from))
    }

    pub fn set_style(&mut self, style: Style) -> Result<(), ConfigurationError> {
        self.update(|spec| spec.style = style)
    }

    pub fn set_output(&mut self, output: OutputTarget) -> Result<(), ConfigurationError> {
        self.update(|spec| spec.output = output)
    }

    fn update(&mut self, change: impl FnOnce(&mut PlotSpec)) -> Result<(), ConfigurationError> {
        let mut next = self.clone();
        change(&mut next);
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let kind = self.kind;
        let x_type = self.column_type(&self.x)?;
        if !kind.accepts_x(x_type) {
            return Err(ConfigurationError::IncompatibleAxis {
                axis: "x",
                column: self.x.clone(),
                dtype: x_type,
                kind: kind.to_string(),
            });
        }

        match (&self.y, kind.needs_y()) {
            (None, true) => return Err(ConfigurationError::MissingAxis(kind.to_string())),
            (Some(_), false) => {
                return Err(ConfigurationError::AxisNotApplicable(kind.to_string()))
            }
            (Some(y), true) => {
                let y_type = self.column_type(y)?;
                if !kind.accepts_y(y_type) {
                    return Err(ConfigurationError::IncompatibleAxis {
                        axis: "y",
                        column: y.clone(),
                        dtype: y_type,
                        kind: kind.to_string(),
                    });
                }
            }
            (None, false) => {}
        }

        if let Some(color) = &self.color_by {
            if self.column_type(color)? == DType::Mixed {
                return Err(ConfigurationError::MixedColumn(color.clone()));
            }
        }

        self.style.validate()?;
        self.output.validate()
    }

    fn column_type(&self, name: &str) -> Result<DType, ConfigurationError> {
        self.schema
            .dtype(name)
            .ok_or_else(|| ConfigurationError::UnknownColumn(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            ("dose".into(), DType::Float),
            ("response".into(), DType::Float),
            ("compound".into(), DType::String),
            ("notes".into(), DType::Mixed),
        ])
    }

    fn scatter() -> PlotSpec {
        PlotSpec::new(&schema(), PlotKind::Scatter, "dose", Some("response")).unwrap()
    }

    #[test]
    fn unknown_axis_fails_at_construction() {
        assert_eq!(
            PlotSpec::new(&schema(), PlotKind::Scatter, "weight", Some("response")),
            Err(ConfigurationError::UnknownColumn("weight".into()))
        );
        assert_eq!(
            PlotSpec::new(&schema(), PlotKind::Scatter, "dose", Some("weight")),
            Err(ConfigurationError::UnknownColumn("weight".into()))
        );
    }

    #[test]
    fn axis_types_depend_on_the_kind() {
        assert!(matches!(
            PlotSpec::new(&schema(), PlotKind::Scatter, "compound", Some("response")),
            Err(ConfigurationError::IncompatibleAxis { axis: "x", .. })
        ));
        assert!(PlotSpec::new(&schema(), PlotKind::Bar, "compound", Some("response")).is_ok());
        assert!(matches!(
            PlotSpec::new(&schema(), PlotKind::Bar, "notes", Some("response")),
            Err(ConfigurationError::IncompatibleAxis { .. })
        ));
        assert_eq!(
            PlotSpec::new(&schema(), PlotKind::Line, "dose", None),
            Err(ConfigurationError::MissingAxis("line".into()))
        );
        assert_eq!(
            PlotSpec::new(&schema(), PlotKind::Histogram, "dose", Some("response")),
            Err(ConfigurationError::AxisNotApplicable("histogram".into()))
        );
    }

    #[test]
    fn failed_mutations_leave_the_spec_unchanged() {
        let mut spec = scatter();
        let before = spec.clone();

        assert!(spec.set_x("weight").is_err());
        assert!(spec.set_kind(PlotKind::Histogram).is_err());
        assert_eq!(
            spec.set_color_by(Some("notes")),
            Err(ConfigurationError::MixedColumn("notes".into()))
        );
        assert_eq!(spec, before);

        spec.set_color_by(Some("compound")).unwrap();
        assert_eq!(spec.color_by(), Some("compound"));
    }

    #[test]
    fn kind_and_axes_change_together() {
        let mut spec = scatter();
        assert!(spec.set_kind(PlotKind::Histogram).is_err());
        assert!(spec.set_y(None).is_err());

        spec.set_layout(PlotKind::Histogram, "response", None).unwrap();
        assert_eq!(spec.kind(), PlotKind::Histogram);
        assert_eq!(spec.x(), "response");
        assert_eq!(spec.y(), None);
    }

    #[test]
    fn style_is_checked_eagerly() {
        let mut spec = scatter();
        let base = Style::default;
        let bad = [
            Style { width: 4, ..base() },
            Style { margin: 400, ..base() },
            Style { point_radius: 0.0, ..base() },
            Style { line_width: f32::NAN, ..base() },
            Style { bins: 0, ..base() },
        ];
        for style in bad {
            assert!(matches!(
                spec.set_style(style),
                Err(ConfigurationError::InvalidStyle(_))
            ));
        }
        let small = Style {
            width: 320,
            height: 240,
            margin: 20,
            ..base()
        };
        assert!(spec.set_style(small).is_ok());
    }

    #[test]
    fn only_png_files_are_accepted() {
        let mut spec = scatter();
        assert_eq!(
            spec.set_output(OutputTarget::File("plot.svg".into())),
            Err(ConfigurationError::UnsupportedFormat("plot.svg".into()))
        );
        assert!(spec.set_output(OutputTarget::File("plot.PNG".into())).is_ok());
    }
}
