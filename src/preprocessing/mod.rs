//! Raw dataset → normalised dataset.
//!
//! [`basic_preproc`] checks the shape of a loaded dataset, cleans its cells,
//! settles one dtype per column and drops the rows that cannot be kept.
//! [`explode`] expands delimited multi-value cells into one row per value.

mod coerce;
mod explode;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::data::filter::{filtered_indices, FilterState};
use crate::data::model::{Column, DType, Dataset, Scalar};
use crate::error::ValidationError;

pub use explode::explode;

/// What to do with a value that cannot be coerced to its column's dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Remove the whole row.
    #[default]
    DropRow,
    /// Replace the value with `Null`.
    SetNull,
    /// Abort with [`ValidationError::Unparseable`].
    Fail,
}

/// Options for [`basic_preproc`]. Every field has a default, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocOptions {
    /// Column renames, applied first. Missing sources are ignored.
    pub rename: BTreeMap<String, String>,
    pub trim_whitespace: bool,
    /// Strings treated as missing values.
    pub null_tokens: Vec<String>,
    /// Explicit dtypes; other columns are inferred.
    pub schema: BTreeMap<String, DType>,
    pub on_malformed: MalformedPolicy,
    /// Rows with a null in any of these columns are dropped.
    pub required: Vec<String>,
    /// Drop rows where every value is null.
    pub drop_empty_rows: bool,
    /// Accepted values per column, compared after coercion.
    pub keep: FilterState,
    /// Drop repeated rows, keeping the first occurrence.
    pub deduplicate: bool,
}

impl Default for PreprocOptions {
    fn default() -> Self {
        Self {
            rename: BTreeMap::new(),
            trim_whitespace: true,
            null_tokens: ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"]
                .into_iter()
                .map(String::from)
                .collect(),
            schema: BTreeMap::new(),
            on_malformed: MalformedPolicy::default(),
            required: Vec::new(),
            drop_empty_rows: true,
            keep: FilterState::new(),
            deduplicate: false,
        }
    }
}

impl PreprocOptions {
    pub fn with_type(mut self, column: impl Into<String>, dtype: DType) -> Self {
        self.schema.insert(column.into(), dtype);
        self
    }

    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }

    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    pub fn require(mut self, column: impl Into<String>) -> Self {
        self.required.push(column.into());
        self
    }

    pub fn keep_values<I, T>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        let set: BTreeSet<Scalar> = values.into_iter().map(Into::into).collect();
        self.keep.insert(column.into(), set);
        self
    }

    pub fn deduplicated(mut self) -> Self {
        self.deduplicate = true;
        self
    }
}

/// Normalise a dataset.
///
/// The output has unique column names, equal column lengths and one dtype
/// per column. Running it again with the same options returns the same
/// dataset. The input is left untouched, and nothing is returned on error.
/// Annotations are not carried over.
pub fn basic_preproc(
    dataset: &Dataset,
    options: &PreprocOptions,
) -> Result<Dataset, ValidationError> {
    let n_rows = dataset.row_count()?;
    let names = renamed_columns(dataset, &options.rename)?;

    let position = |name: &str| -> Result<usize, ValidationError> {
        names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ValidationError::UnknownColumn(name.to_string()))
    };
    for name in options.schema.keys().chain(options.keep.keys()) {
        position(name)?;
    }
    let required: Vec<usize> = options
        .required
        .iter()
        .map(|name| position(name))
        .collect::<Result<_, _>>()?;

    let mut malformed = vec![false; n_rows];
    let mut columns = Vec::with_capacity(names.len());

    for (column, name) in dataset.columns().iter().zip(&names) {
        let values: Vec<Scalar> = column
            .values()
            .iter()
            .cloned()
            .map(|v| coerce::normalize_cell(v, options.trim_whitespace, &options.null_tokens))
            .collect();

        let target = match options.schema.get(name) {
            Some(DType::Mixed) => DType::String,
            Some(&dtype) => dtype,
            None => coerce::resolve_dtype(column.dtype(), &values),
        };

        let mut out = Vec::with_capacity(n_rows);
        let mut converted = 0usize;
        let mut rejected = 0usize;
        for (row, value) in values.into_iter().enumerate() {
            match coerce::coerce(&value, target) {
                Some(v) => {
                    if v != value {
                        converted += 1;
                    }
                    out.push(v);
                }
                None => {
                    rejected += 1;
                    match options.on_malformed {
                        MalformedPolicy::DropRow => {
                            malformed[row] = true;
                            out.push(Scalar::Null);
                        }
                        MalformedPolicy::SetNull => out.push(Scalar::Null),
                        MalformedPolicy::Fail => {
                            return Err(ValidationError::Unparseable {
                                column: name.clone(),
                                row,
                                value: value.to_string(),
                                dtype: target,
                            });
                        }
                    }
                }
            }
        }
        if converted > 0 || rejected > 0 {
            log::debug!(
                "column '{name}' as {target}: {converted} values converted, {rejected} malformed"
            );
        }
        columns.push(Column::typed(name.clone(), target, out));
    }

    let mut keep_rows: Vec<usize> = (0..n_rows)
        .filter(|&row| !malformed[row])
        .filter(|&row| required.iter().all(|&c| !columns[c].values()[row].is_null()))
        .filter(|&row| {
            !(options.drop_empty_rows
                && !columns.is_empty()
                && columns.iter().all(|c| c.values()[row].is_null()))
        })
        .collect();

    let keep = coerce_keep_values(options, &names, &columns)?;
    let staged = Dataset::from_columns(columns)?;

    if !keep.is_empty() {
        let passing: BTreeSet<usize> = filtered_indices(&staged, n_rows, &keep)
            .into_iter()
            .collect();
        keep_rows.retain(|row| passing.contains(row));
    }

    if options.deduplicate {
        let mut seen: HashSet<Vec<&Scalar>> = HashSet::new();
        keep_rows.retain(|&row| {
            seen.insert(staged.columns().iter().map(|c| &c.values()[row]).collect())
        });
    }

    log::info!(
        "Preprocessed {} columns: {} rows in, {} rows out",
        staged.n_columns(),
        n_rows,
        keep_rows.len()
    );
    Ok(staged.select_rows(&keep_rows))
}

/// Bring the `keep` values to the dtype their column settled on, so that
/// `1` selects `1.0` in a float column. `row` in an error is the value's
/// position within its sorted set.
fn coerce_keep_values(
    options: &PreprocOptions,
    names: &[String],
    columns: &[Column],
) -> Result<FilterState, ValidationError> {
    let mut keep = FilterState::new();
    for (name, values) in &options.keep {
        let Some(column) = names.iter().position(|n| n == name).map(|i| &columns[i]) else {
            return Err(ValidationError::UnknownColumn(name.clone()));
        };
        let dtype = column.dtype();
        let mut set = BTreeSet::new();
        for (row, value) in values.iter().enumerate() {
            let cell = coerce::normalize_cell(
                value.clone(),
                options.trim_whitespace,
                &options.null_tokens,
            );
            let coerced =
                coerce::coerce(&cell, dtype).ok_or_else(|| ValidationError::Unparseable {
                    column: name.clone(),
                    row,
                    value: value.to_string(),
                    dtype,
                })?;
            set.insert(coerced);
        }
        keep.insert(name.clone(), set);
    }
    Ok(keep)
}

/// Column names after applying `rename`.
fn renamed_columns(
    dataset: &Dataset,
    rename: &BTreeMap<String, String>,
) -> Result<Vec<String>, ValidationError> {
    let mut names: Vec<String> = dataset
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    for (from, to) in rename {
        let Some(pos) = names.iter().position(|n| n == from) else {
            log::debug!("rename '{from}' → '{to}' skipped: no such column");
            continue;
        };
        if from != to && names.iter().any(|n| n == to) {
            return Err(ValidationError::DuplicateColumn(to.clone()));
        }
        names[pos] = to.clone();
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> Dataset {
        Dataset::from_columns(vec![
            Column::new(
                "dose",
                vec![
                    Scalar::Integer(1),
                    Scalar::from(" 2.5 "),
                    Scalar::from("NA"),
                    Scalar::from("high"),
                    Scalar::Float(4.0),
                ],
            ),
            Column::new(
                "compound",
                vec![
                    Scalar::from("aspirin "),
                    Scalar::from("ibuprofen"),
                    Scalar::from("caffeine"),
                    Scalar::from("aspirin"),
                    Scalar::Integer(7),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn mismatched_lengths_fail() {
        let ds = Dataset::from_columns(vec![
            Column::from_values("a", [1i64, 2, 3]),
            Column::from_values("b", [1i64]),
        ])
        .unwrap();
        let err = basic_preproc(&ds, &PreprocOptions::default()).unwrap_err();
        assert!(matches!(err, ValidationError::LengthMismatch { .. }));
    }

    #[test]
    fn inferred_types_turn_junk_into_text() {
        let out = basic_preproc(&raw(), &PreprocOptions::default()).unwrap();
        assert!(out.is_normalized());
        // "high" cannot be numeric, so the whole column stays text
        let dose = out.column("dose").unwrap();
        assert_eq!(dose.dtype(), DType::String);
        assert_eq!(dose.get(1), Some(&Scalar::from("2.5")));
        assert_eq!(dose.get(2), Some(&Scalar::Null));

        let compound = out.column("compound").unwrap();
        assert_eq!(compound.dtype(), DType::String);
        assert_eq!(compound.get(0), Some(&Scalar::from("aspirin")));
        assert_eq!(compound.get(4), Some(&Scalar::from("7")));
    }

    #[test]
    fn explicit_type_drops_malformed_rows() {
        let options = PreprocOptions::default().with_type("dose", DType::Float);
        let out = basic_preproc(&raw(), &options).unwrap();
        let dose = out.column("dose").unwrap();
        assert_eq!(dose.dtype(), DType::Float);
        assert_eq!(
            dose.values(),
            &[
                Scalar::Float(1.0),
                Scalar::Float(2.5),
                Scalar::Null,
                Scalar::Float(4.0)
            ]
        );
        assert_eq!(out.row_count(), Ok(4));
    }

    #[test]
    fn set_null_policy_keeps_the_row() {
        let options = PreprocOptions::default()
            .with_type("dose", DType::Float)
            .with_policy(MalformedPolicy::SetNull);
        let out = basic_preproc(&raw(), &options).unwrap();
        assert_eq!(out.row_count(), Ok(5));
        assert_eq!(out.column("dose").unwrap().get(3), Some(&Scalar::Null));
    }

    #[test]
    fn fail_policy_reports_the_cell() {
        let options = PreprocOptions::default()
            .with_type("dose", DType::Float)
            .with_policy(MalformedPolicy::Fail);
        let err = basic_preproc(&raw(), &options).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Unparseable {
                column: "dose".into(),
                row: 3,
                value: "high".into(),
                dtype: DType::Float,
            }
        );
    }

    #[test]
    fn required_columns_drop_null_rows() {
        let options = PreprocOptions::default()
            .with_type("dose", DType::Float)
            .require("dose");
        let out = basic_preproc(&raw(), &options).unwrap();
        assert_eq!(out.row_count(), Ok(3));
    }

    #[test]
    fn unknown_option_columns_are_rejected() {
        let options = PreprocOptions::default().require("weight");
        assert_eq!(
            basic_preproc(&raw(), &options),
            Err(ValidationError::UnknownColumn("weight".into()))
        );
    }

    #[test]
    fn renames_apply_before_everything_else() {
        let options = PreprocOptions::default()
            .with_rename("compound", "primary_name")
            .keep_values("primary_name", ["aspirin"]);
        let out = basic_preproc(&raw(), &options).unwrap();
        assert_eq!(out.column_names(), vec!["dose", "primary_name"]);
        assert_eq!(out.row_count(), Ok(2));
    }

    #[test]
    fn rename_onto_an_existing_column_fails() {
        let options = PreprocOptions::default().with_rename("compound", "dose");
        assert_eq!(
            basic_preproc(&raw(), &options),
            Err(ValidationError::DuplicateColumn("dose".into()))
        );
    }

    #[test]
    fn empty_and_duplicate_rows_are_dropped() {
        let ds = Dataset::from_columns(vec![
            Column::from_values("id", [Some(1i64), None, Some(1), Some(2)]),
            Column::from_values("name", [Some("a"), Some("NA"), Some("a"), Some("b")]),
        ])
        .unwrap();
        let out = basic_preproc(&ds, &PreprocOptions::default().deduplicated()).unwrap();
        assert_eq!(
            out.column("id").unwrap().values(),
            &[Scalar::Integer(1), Scalar::Integer(2)]
        );
    }

    #[test]
    fn preprocessing_is_idempotent() {
        let options = PreprocOptions::default()
            .with_rename("compound", "name")
            .with_type("dose", DType::Float)
            .deduplicated();
        let once = basic_preproc(&raw(), &options).unwrap();
        let twice = basic_preproc(&once, &options).unwrap();
        assert_eq!(once, twice);

        let once = basic_preproc(&raw(), &PreprocOptions::default()).unwrap();
        assert_eq!(basic_preproc(&once, &PreprocOptions::default()).unwrap(), once);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: PreprocOptions = serde_json::from_str(
            r#"{
                "schema": {"dose": "float"},
                "on_malformed": "set_null",
                "keep": {"plate": [1, 2]}
            }"#,
        )
        .unwrap();
        assert_eq!(options.schema.get("dose"), Some(&DType::Float));
        assert_eq!(options.on_malformed, MalformedPolicy::SetNull);
        assert!(options.trim_whitespace);
        assert!(options.keep["plate"].contains(&Scalar::Integer(1)));
    }

    #[test]
    fn keep_values_follow_the_column_dtype() {
        // mixed float and integer cells settle on Float
        let ds = Dataset::from_columns(vec![Column::new(
            "concentration",
            vec![Scalar::Float(0.1), Scalar::Integer(1), Scalar::Integer(10)],
        )])
        .unwrap();
        let options = PreprocOptions::default().keep_values("concentration", [1i64, 10]);
        let out = basic_preproc(&ds, &options).unwrap();
        assert_eq!(out.row_count(), Ok(2));
        assert_eq!(
            out.column("concentration").unwrap().values(),
            &[Scalar::Float(1.0), Scalar::Float(10.0)]
        );

        let by_text = PreprocOptions::default().keep_values("concentration", ["0.1"]);
        assert_eq!(basic_preproc(&ds, &by_text).unwrap().row_count(), Ok(1));
    }

    #[test]
    fn keep_values_that_cannot_match_are_rejected() {
        let options = PreprocOptions::default()
            .with_type("dose", DType::Float)
            .keep_values("dose", ["high"]);
        assert_eq!(
            basic_preproc(&raw(), &options),
            Err(ValidationError::Unparseable {
                column: "dose".into(),
                row: 0,
                value: "high".into(),
                dtype: DType::Float,
            })
        );
    }

    #[test]
    fn negative_zero_groups_with_zero() {
        let ds = Dataset::from_columns(vec![Column::from_values("shift", [0.0, -0.0, 0.5])])
            .unwrap();
        let out = basic_preproc(&ds, &PreprocOptions::default().deduplicated()).unwrap();
        assert_eq!(
            out.column("shift").unwrap().values(),
            &[Scalar::Float(0.0), Scalar::Float(0.5)]
        );
        assert!(out.column("shift").unwrap().values()[0]
            .as_f64()
            .is_some_and(|f| f.is_sign_positive()));
    }
}
