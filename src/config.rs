//! JSON pipeline description consumed by the `drugbank-toolkit` binary.
//!
//! ```json
//! {
//!   "input": "assay.csv",
//!   "preprocess": { "schema": { "concentration": "float" }, "required": ["drugbank_id"] },
//!   "tools": [{ "column": "response", "metric": "mean", "group_by": "drugbank_id" }],
//!   "plot": { "kind": "scatter", "x": "concentration", "y": "response" },
//!   "output_csv": "clean.csv"
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::model::Schema;
use crate::error::ConfigurationError;
use crate::plotting::{OutputTarget, PlotKind, PlotSpec, Style};
use crate::preprocessing::PreprocOptions;
use crate::tools::ToolOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input: PathBuf,
    #[serde(default)]
    pub preprocess: PreprocOptions,
    #[serde(default)]
    pub explode: Option<ExplodeConfig>,
    #[serde(default)]
    pub tools: Vec<ToolOptions>,
    #[serde(default)]
    pub plot: Option<PlotConfig>,
    /// Where to write the processed table.
    #[serde(default)]
    pub output_csv: Option<PathBuf>,
}

/// Split a delimited text column into one row per item, after preprocessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplodeConfig {
    pub column: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "|".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlotConfig {
    pub kind: PlotKind,
    pub x: String,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub color_by: Option<String>,
    #[serde(default)]
    pub style: Style,
    /// PNG path; the figure stays in memory when absent.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl PlotConfig {
    /// Validate against `schema` and build the plot configuration.
    pub fn to_spec(&self, schema: &Schema) -> Result<PlotSpec, ConfigurationError> {
        let mut spec = PlotSpec::new(schema, self.kind, &self.x, self.y.as_deref())?;
        spec.set_color_by(self.color_by.as_deref())?;
        spec.set_style(self.style.clone())?;
        if let Some(path) = &self.output {
            spec.set_output(OutputTarget::File(path.clone()))?;
        }
        Ok(spec)
    }
}

impl PipelineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config {}", path.display()))?;
        let mut config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.input);
        if let Some(p) = self.output_csv.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.plot.as_mut().and_then(|plot| plot.output.as_mut()) {
            resolve(p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::DType;
    use crate::preprocessing::MalformedPolicy;
    use crate::tools::Metric;

    const PIPELINE: &str = r#"{
        "input": "assay.csv",
        "explode": { "column": "synonyms" },
        "preprocess": {
            "schema": { "concentration": "float" },
            "on_malformed": "set_null",
            "required": ["drugbank_id"]
        },
        "tools": [{ "column": "response", "metric": "mean", "group_by": "drugbank_id" }],
        "plot": {
            "kind": "scatter",
            "x": "concentration",
            "y": "response",
            "output": "out/plot.png"
        },
        "output_csv": "/tmp/clean.csv"
    }"#;

    #[test]
    fn relative_paths_follow_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, PIPELINE).unwrap();

        let config = PipelineConfig::from_path(&path).unwrap();
        assert_eq!(config.input, dir.path().join("assay.csv"));
        assert_eq!(config.output_csv.as_deref(), Some(Path::new("/tmp/clean.csv")));
        assert_eq!(
            config.plot.as_ref().and_then(|p| p.output.clone()),
            Some(dir.path().join("out/plot.png"))
        );
        assert_eq!(config.explode.unwrap().separator, "|");
        assert_eq!(config.preprocess.on_malformed, MalformedPolicy::SetNull);
        assert_eq!(config.preprocess.schema.get("concentration"), Some(&DType::Float));
        assert_eq!(config.tools[0].metric, Metric::Mean);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"input": "a.parquet"}"#).unwrap();
        assert_eq!(config.preprocess, PreprocOptions::default());
        assert!(config.tools.is_empty());
        assert!(config.plot.is_none());
    }

    #[test]
    fn plot_config_is_validated_against_the_schema() {
        let schema = Schema::new(vec![
            ("concentration".into(), DType::Float),
            ("response".into(), DType::Float),
        ]);
        let plot: PlotConfig = serde_json::from_str(
            r#"{"kind": "line", "x": "concentration", "y": "response"}"#,
        )
        .unwrap();
        let spec = plot.to_spec(&schema).unwrap();
        assert_eq!(spec.kind(), PlotKind::Line);
        assert_eq!(spec.output(), &OutputTarget::Memory);

        let bad = PlotConfig {
            color_by: Some("compound".into()),
            ..plot
        };
        assert_eq!(
            bad.to_spec(&schema),
            Err(ConfigurationError::UnknownColumn("compound".into()))
        );
    }

    #[test]
    fn malformed_config_reports_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();
        let err = PipelineConfig::from_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }

    #[test]
    fn unknown_plot_fields_are_rejected() {
        // there is no text rendering, so a title would be silently lost
        let err = serde_json::from_str::<PlotConfig>(
            r#"{"kind": "bar", "x": "drugbank_id", "y": "response", "title": "Mean response"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("title"), "{err}");
    }
}
