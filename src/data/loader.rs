use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, Dataset, Scalar};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a tabular dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – any flat Parquet file (recommended)
/// * `.json`    – `[{ "col": value, ... }, ...]` or `{ "col": [values], ... }`
/// * `.csv`     – header row with column names
///
/// The result is not normalised: run it through
/// [`basic_preproc`](crate::preprocessing::basic_preproc) before analysis.
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!(
        "Loaded {} with {} columns {:?}",
        path.display(),
        dataset.n_columns(),
        dataset.column_names()
    );
    Ok(dataset)
}

/// Write the columns of a dataset (and any column annotations) as CSV.
/// Nulls are written as empty cells.
pub fn save_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let n_rows = dataset.row_count()?;
    let schema = dataset.schema();
    let columns: Vec<&Column> = schema
        .names()
        .filter_map(|name| dataset.resolve(name))
        .collect();

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(columns.iter().map(|c| c.name()))?;
    for row in 0..n_rows {
        writer.write_record(columns.iter().map(|c| match c.get(row) {
            Some(Scalar::Null) | None => String::new(),
            Some(value) => value.to_string(),
        }))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

/// Build a dataset from named cell vectors, keeping their order.
fn dataset_from_named(columns: Vec<(String, Vec<Scalar>)>) -> Result<Dataset> {
    let columns = columns
        .into_iter()
        .map(|(name, values)| Column::new(name, values))
        .collect();
    Ok(Dataset::from_columns(columns)?)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Two layouts are accepted, matching `df.to_json(orient='records')` and
/// `df.to_json(orient='list')`:
///
/// ```json
/// [ { "drugbank_id": "DB00001", "dose": 1.5 }, ... ]
/// { "drugbank_id": ["DB00001", ...], "dose": [1.5, ...] }
/// ```
///
/// Columns come out in the order their keys first appear in the file. Keys
/// missing from a record become nulls. Column arrays may differ in length;
/// that is reported later by the shape check.
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    match root {
        JsonValue::Array(records) => load_json_records(&records),
        JsonValue::Object(map) => {
            let mut columns = Vec::with_capacity(map.len());
            for (key, val) in map {
                let values = val
                    .as_array()
                    .with_context(|| format!("Column '{key}' is not a JSON array"))?;
                columns.push((key, values.iter().map(json_to_scalar).collect()));
            }
            dataset_from_named(columns)
        }
        _ => bail!("Expected a top-level JSON array or object"),
    }
}

fn load_json_records(records: &[JsonValue]) -> Result<Dataset> {
    let mut columns: Vec<(String, Vec<Scalar>)> = Vec::new();

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        for (key, val) in obj {
            let idx = match columns.iter().position(|(name, _)| name == key) {
                Some(idx) => idx,
                None => {
                    // first sighting: earlier rows did not have this key
                    columns.push((key.clone(), vec![Scalar::Null; i]));
                    columns.len() - 1
                }
            };
            columns[idx].1.push(json_to_scalar(val));
        }
        for (_, values) in columns.iter_mut() {
            if values.len() == i {
                values.push(Scalar::Null);
            }
        }
    }

    dataset_from_named(columns)
}

fn json_to_scalar(val: &JsonValue) -> Scalar {
    match val {
        JsonValue::String(s) => Scalar::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Scalar::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Scalar::Float(f)
            } else {
                Scalar::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Scalar::Bool(*b),
        JsonValue::Null => Scalar::Null,
        other => Scalar::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per row.
/// Cell types are guessed individually; preprocessing settles the column type.
fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut columns: Vec<Vec<Scalar>> = vec![Vec::new(); headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, value) in record.iter().enumerate() {
            columns[col_idx].push(guess_scalar_type(value));
        }
    }

    dataset_from_named(headers.into_iter().zip(columns).collect())
}

fn guess_scalar_type(s: &str) -> Scalar {
    if s.is_empty() {
        return Scalar::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Scalar::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Scalar::Float(f);
    }
    if s == "true" || s == "false" {
        return Scalar::Bool(s == "true");
    }
    Scalar::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file into one column per top-level field.
///
/// Strings, booleans, integers and floats map to the matching scalar; any
/// other Arrow type (lists, dates, decimals, ...) is kept as its display text.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<Scalar>> = vec![Vec::new(); names.len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, values) in columns.iter_mut().enumerate() {
            let array = batch.column(col_idx);
            append_arrow_values(array, values)
                .with_context(|| format!("reading column '{}'", names[col_idx]))?;
        }
    }

    dataset_from_named(names.into_iter().zip(columns).collect())
}

// -- Parquet / Arrow helpers --

/// Append every cell of an Arrow column to `out`.
fn append_arrow_values(col: &Arc<dyn Array>, out: &mut Vec<Scalar>) -> Result<()> {
    macro_rules! ints {
        ($t:ty) => {{
            let arr = col.as_primitive::<$t>();
            for row in 0..arr.len() {
                out.push(if arr.is_null(row) {
                    Scalar::Null
                } else {
                    Scalar::Integer(arr.value(row) as i64)
                });
            }
        }};
    }

    match col.data_type() {
        DataType::Utf8 => {
            let arr = col.as_string::<i32>();
            out.extend(arr.iter().map(|v| Scalar::from(v.map(str::to_string))));
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            out.extend(arr.iter().map(|v| Scalar::from(v.map(str::to_string))));
        }
        DataType::Boolean => {
            out.extend(col.as_boolean().iter().map(Scalar::from));
        }
        DataType::Int8 => ints!(Int8Type),
        DataType::Int16 => ints!(Int16Type),
        DataType::Int32 => ints!(Int32Type),
        DataType::Int64 => ints!(Int64Type),
        DataType::UInt8 => ints!(UInt8Type),
        DataType::UInt16 => ints!(UInt16Type),
        DataType::UInt32 => ints!(UInt32Type),
        DataType::UInt64 => {
            let arr = col.as_primitive::<UInt64Type>();
            for v in arr.iter() {
                out.push(match v {
                    None => Scalar::Null,
                    Some(v) => match i64::try_from(v) {
                        Ok(i) => Scalar::Integer(i),
                        Err(_) => Scalar::Float(v as f64),
                    },
                });
            }
        }
        DataType::Float32 => {
            let arr = col.as_primitive::<Float32Type>();
            out.extend(arr.iter().map(|v| Scalar::from(v.map(f64::from))));
        }
        DataType::Float64 => {
            let arr = col.as_primitive::<Float64Type>();
            out.extend(arr.iter().map(Scalar::from));
        }
        _ => {
            let formatter = ArrayFormatter::try_new(col.as_ref(), &FormatOptions::default())
                .context("formatting column")?;
            for row in 0..col.len() {
                out.push(if col.is_null(row) {
                    Scalar::Null
                } else {
                    Scalar::String(formatter.value(row).to_string())
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use arrow::array::{Float64Array, Float64Builder, Int32Array, ListBuilder, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::data::model::DType;

    fn temp_with(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn csv_cells_are_typed_individually() {
        let file = temp_with(
            ".csv",
            "drugbank_id,dose,approved\nDB00001,1.5,true\nDB00002,NA,false\nDB00003,,true\n",
        );
        let ds = load_file(file.path()).unwrap();

        assert_eq!(ds.column_names(), vec!["drugbank_id", "dose", "approved"]);
        let dose = ds.column("dose").unwrap();
        assert_eq!(dose.dtype(), DType::Mixed);
        assert_eq!(dose.get(1), Some(&Scalar::from("NA")));
        assert_eq!(dose.get(2), Some(&Scalar::Null));
        assert_eq!(ds.column("approved").unwrap().dtype(), DType::Bool);
    }

    #[test]
    fn json_records_fill_missing_keys_with_null() {
        let file = temp_with(
            ".json",
            r#"[{"id": 1, "name": "a"}, {"id": 2}, {"id": 3, "extra": 0.5}]"#,
        );
        let ds = load_file(file.path()).unwrap();

        assert_eq!(ds.row_count(), Ok(3));
        assert_eq!(
            ds.column("name").unwrap().values(),
            &[Scalar::from("a"), Scalar::Null, Scalar::Null]
        );
        assert_eq!(
            ds.column("extra").unwrap().values(),
            &[Scalar::Null, Scalar::Null, Scalar::Float(0.5)]
        );
    }

    #[test]
    fn json_columns_keep_file_order() {
        let file = temp_with(
            ".json",
            r#"{"response": [0.5, 0.9], "drugbank_id": ["DB00945", "DB01050"]}"#,
        );
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.column_names(), vec!["response", "drugbank_id"]);

        let file = temp_with(".json", r#"[{"zeta": 1, "alpha": 2}, {"beta": 3}]"#);
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.column_names(), vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn json_column_arrays_may_be_ragged() {
        let file = temp_with(".json", r#"{"a": [1, 2], "b": [1, 2, 3]}"#);
        let ds = load_file(file.path()).unwrap();
        assert!(ds.row_count().is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = temp_with(".xlsx", "");
        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported file extension"));
    }

    #[test]
    fn parquet_columns_are_read_in_schema_order() {
        let mut list = ListBuilder::new(Float64Builder::new());
        list.values().append_value(1.0);
        list.append(true);
        list.append(false);

        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("count", DataType::Int32, true),
            Field::new("dose", DataType::Float64, true),
            Field::new(
                "trace",
                DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
                true,
            ),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec![Some("a"), None])),
                Arc::new(Int32Array::from(vec![Some(3), Some(4)])),
                Arc::new(Float64Array::from(vec![Some(0.5), None])),
                Arc::new(list.finish()),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.column_names(), vec!["name", "count", "dose", "trace"]);
        assert_eq!(
            ds.column("count").unwrap().values(),
            &[Scalar::Integer(3), Scalar::Integer(4)]
        );
        assert_eq!(ds.column("name").unwrap().get(1), Some(&Scalar::Null));
        assert_eq!(ds.column("trace").unwrap().get(1), Some(&Scalar::Null));
        assert_eq!(ds.column("trace").unwrap().dtype(), DType::String);
    }

    #[test]
    fn saved_csv_loads_back() {
        let ds = Dataset::from_columns(vec![
            Column::from_values("id", [1i64, 2]),
            Column::from_values("name", [Some("a"), None]),
        ])
        .unwrap();
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        save_csv(&ds, file.path()).unwrap();

        let back = load_file(file.path()).unwrap();
        assert_eq!(back, ds);
    }
}
