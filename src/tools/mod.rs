//! Derived quantities over a normalised dataset.
//!
//! [`basic_tool`] computes one metric over one column, optionally per group,
//! and returns the dataset with the result attached as an [`Annotation`].
//! [`find_matches`] looks rows up by name, exactly or fuzzily.

mod aggregate;
mod search;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::model::{Annotation, Column, DType, Dataset, GroupedValues, Scalar};
use crate::error::ComputationError;

pub use search::{find_matches, levenshtein, token_set_ratio, MatchOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    /// Sample standard deviation.
    Std,
    #[serde(rename = "zscore")]
    ZScore,
    MinMax,
    /// Average rank of ties, starting at 1.
    Rank,
}

impl Metric {
    /// Transforms produce one value per row instead of one per group.
    pub fn is_transform(self) -> bool {
        matches!(self, Metric::ZScore | Metric::MinMax | Metric::Rank)
    }

    pub fn accepts(self, dtype: DType) -> bool {
        match self {
            Metric::Count => true,
            Metric::Min | Metric::Max => dtype != DType::Mixed,
            _ => dtype.is_numeric(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Sum => "sum",
            Metric::Mean => "mean",
            Metric::Median => "median",
            Metric::Min => "min",
            Metric::Max => "max",
            Metric::Count => "count",
            Metric::Std => "std",
            Metric::ZScore => "zscore",
            Metric::MinMax => "min_max",
            Metric::Rank => "rank",
        };
        f.write_str(name)
    }
}

/// Which column to analyse, with which metric, and where the result goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOptions {
    pub column: String,
    pub metric: Metric,
    #[serde(default)]
    pub group_by: Option<String>,
    /// Annotation name; defaults to `{column}_{metric}`.
    #[serde(default)]
    pub name: Option<String>,
    /// Allow replacing an existing column or annotation.
    #[serde(default)]
    pub overwrite: bool,
    /// For grouped aggregates: attach a per-row column holding each row's
    /// group result instead of a group summary.
    #[serde(default)]
    pub broadcast: bool,
}

impl ToolOptions {
    pub fn new(column: impl Into<String>, metric: Metric) -> Self {
        Self {
            column: column.into(),
            metric,
            group_by: None,
            name: None,
            overwrite: false,
            broadcast: false,
        }
    }

    pub fn grouped_by(mut self, column: impl Into<String>) -> Self {
        self.group_by = Some(column.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn overwriting(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn broadcasting(mut self) -> Self {
        self.broadcast = true;
        self
    }

    pub fn annotation_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.column, self.metric))
    }
}

/// Compute `options.metric` over `options.column` and attach the result.
///
/// The input is not modified; the returned dataset is a copy carrying the
/// new annotation. Identical inputs always give identical annotations.
pub fn basic_tool(dataset: &Dataset, options: &ToolOptions) -> Result<Dataset, ComputationError> {
    dataset
        .row_count()
        .map_err(ComputationError::InconsistentShape)?;

    let metric = options.metric;
    let column = dataset
        .resolve(&options.column)
        .ok_or_else(|| ComputationError::MissingColumn(options.column.clone()))?;
    if !metric.accepts(column.dtype()) {
        return Err(ComputationError::IncompatibleType {
            column: options.column.clone(),
            dtype: column.dtype(),
            operation: metric.to_string(),
        });
    }

    let groups = match &options.group_by {
        Some(name) => {
            let keys = dataset
                .resolve(name)
                .ok_or_else(|| ComputationError::MissingColumn(name.clone()))?;
            if keys.dtype() == DType::Mixed {
                return Err(ComputationError::IncompatibleType {
                    column: name.clone(),
                    dtype: DType::Mixed,
                    operation: "group_by".to_string(),
                });
            }
            Some(keys)
        }
        None => None,
    };

    if options.broadcast && (groups.is_none() || metric.is_transform()) {
        return Err(ComputationError::InvalidOption(
            "broadcast needs group_by and an aggregate metric".to_string(),
        ));
    }

    let name = options.annotation_name();
    if dataset.has_name(&name) && !options.overwrite {
        return Err(ComputationError::NameConflict(name));
    }

    let values = column.values();
    let annotation = if metric.is_transform() {
        let keys = groups.map(Column::values);
        Annotation::Column(Column::new(
            name.as_str(),
            aggregate::transform(metric, values, keys),
        ))
    } else {
        match groups {
            None => Annotation::Value(aggregate::aggregate(metric, column.dtype(), values.iter())?),
            Some(keys) => {
                let mut per_group: BTreeMap<Scalar, Scalar> = BTreeMap::new();
                for (key, rows) in aggregate::group_rows(keys.values()) {
                    let result = aggregate::aggregate(
                        metric,
                        column.dtype(),
                        rows.iter().map(|&row| &values[row]),
                    )?;
                    per_group.insert(key.clone(), result);
                }
                if options.broadcast {
                    let per_row = keys
                        .values()
                        .iter()
                        .map(|key| per_group.get(key).cloned().unwrap_or(Scalar::Null))
                        .collect();
                    Annotation::Column(Column::new(name.as_str(), per_row))
                } else {
                    Annotation::Grouped(GroupedValues {
                        group_by: keys.name().to_string(),
                        values: per_group,
                    })
                }
            }
        }
    };

    let mut out = dataset.clone();
    out.attach(&name, annotation);
    log::info!(
        "Computed {metric} of '{}'{} as '{name}'",
        options.column,
        options
            .group_by
            .as_ref()
            .map(|g| format!(" by '{g}'"))
            .unwrap_or_default()
    );
    Ok(out)
}
