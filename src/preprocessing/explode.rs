use crate::data::model::{Column, DType, Dataset, Scalar};
use crate::error::ValidationError;

/// Split each cell of a text column on `separator` into one row per value.
///
/// Other columns are repeated for every produced row. Tokens are trimmed and
/// empty tokens skipped; a null cell, or a cell with no tokens, yields a
/// single row holding `Null`. An empty separator leaves cells unsplit.
///
/// ```text
///  name      aliases                  name      aliases
///  aspirin   "ASA|Aspirin"      →     aspirin   "ASA"
///                                     aspirin   "Aspirin"
/// ```
pub fn explode(
    dataset: &Dataset,
    column: &str,
    separator: &str,
) -> Result<Dataset, ValidationError> {
    let n_rows = dataset.row_count()?;
    let target = dataset
        .column(column)
        .ok_or_else(|| ValidationError::UnknownColumn(column.to_string()))?;
    if target.dtype() != DType::String {
        return Err(ValidationError::NotText {
            column: column.to_string(),
            dtype: target.dtype(),
        });
    }

    let mut source_rows = Vec::with_capacity(n_rows);
    let mut tokens = Vec::with_capacity(n_rows);
    for (row, value) in target.values().iter().enumerate() {
        let before = tokens.len();
        if let Scalar::String(text) = value {
            let parts: Vec<&str> = if separator.is_empty() {
                vec![text.as_str()]
            } else {
                text.split(separator).collect()
            };
            for token in parts.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
                source_rows.push(row);
                tokens.push(Scalar::from(token));
            }
        }
        if tokens.len() == before {
            source_rows.push(row);
            tokens.push(Scalar::Null);
        }
    }

    log::debug!(
        "exploded '{column}' on {separator:?}: {n_rows} rows → {} rows",
        tokens.len()
    );

    let repeated = dataset.select_rows(&source_rows);
    let columns = repeated
        .into_columns()
        .into_iter()
        .map(|c| {
            if c.name() == column {
                Column::typed(column, DType::String, std::mem::take(&mut tokens))
            } else {
                c
            }
        })
        .collect();
    Dataset::from_columns(columns)
}
