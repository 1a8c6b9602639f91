use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Scalar – a single cell in a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common Pandas dtypes.
/// Used as a `BTreeMap` / `BTreeSet` key downstream, so `Scalar` must be `Ord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

// -- Manual Eq/Ord so we can put Scalar in BTreeSet --
// Equality, ordering and hashing all compare floats bit for bit.

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Scalar::*;
        fn discriminant(v: &Scalar) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Scalar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::String(s) => s.hash(state),
            Scalar::Integer(i) => i.hash(state),
            Scalar::Float(f) => f.to_bits().hash(state),
            Scalar::Bool(b) => b.hash(state),
            Scalar::Null => {}
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{s}"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Null => write!(f, "<null>"),
        }
    }
}

impl Scalar {
    /// Try to interpret the value as an `f64` for numeric computation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            Scalar::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// The dtype of a non-null value.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DType::Bool),
            Scalar::Integer(_) => Some(DType::Integer),
            Scalar::Float(_) => Some(DType::Float),
            Scalar::String(_) => Some(DType::String),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::String(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Scalar::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// DType – the scalar type of a column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Bool,
    Integer,
    Float,
    String,
    /// Non-null values of more than one type.
    Mixed,
}

impl DType {
    pub fn is_numeric(self) -> bool {
        matches!(self, DType::Integer | DType::Float)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::Integer => "integer",
            DType::Float => "float",
            DType::String => "string",
            DType::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// Infer the dtype of a sequence of cells. A column without any non-null
/// value is `Float`, like an all-NaN Pandas column.
pub fn infer_dtype(values: &[Scalar]) -> DType {
    let mut observed: Option<DType> = None;
    for dtype in values.iter().filter_map(Scalar::dtype) {
        match observed {
            None => observed = Some(dtype),
            Some(seen) if seen != dtype => return DType::Mixed,
            Some(_) => {}
        }
    }
    observed.unwrap_or(DType::Float)
}

// ---------------------------------------------------------------------------
// Column – a named, typed sequence of cells
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: DType,
    values: Vec<Scalar>,
}

impl Column {
    /// Build a column, inferring its dtype from the values.
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        let dtype = infer_dtype(&values);
        Column {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Build a column from anything convertible into [`Scalar`].
    pub fn from_values<I, T>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        Column::new(name, values.into_iter().map(Into::into).collect())
    }

    /// Build a column whose values are already known to be of `dtype` (or null).
    pub(crate) fn typed(name: impl Into<String>, dtype: DType, values: Vec<Scalar>) -> Self {
        debug_assert!(values
            .iter()
            .all(|v| v.dtype().map_or(true, |d| d == dtype)));
        Column {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn get(&self, row: usize) -> Option<&Scalar> {
        self.values.get(row)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted set of distinct values, nulls included.
    pub fn unique_values(&self) -> BTreeSet<Scalar> {
        self.values.iter().cloned().collect()
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn take_rows(&self, indices: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            dtype: self.dtype,
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotation – a derived value attached by the tools
// ---------------------------------------------------------------------------

/// Summary values keyed by the distinct values of a grouping column.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedValues {
    pub group_by: String,
    pub values: BTreeMap<Scalar, Scalar>,
}

impl GroupedValues {
    pub fn get(&self, key: &Scalar) -> Option<&Scalar> {
        self.values.get(key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// One value per row.
    Column(Column),
    /// A single dataset-level value.
    Value(Scalar),
    /// One value per group.
    Grouped(GroupedValues),
}

impl Annotation {
    pub fn as_column(&self) -> Option<&Column> {
        match self {
            Annotation::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Scalar> {
        match self {
            Annotation::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_grouped(&self) -> Option<&GroupedValues> {
        match self {
            Annotation::Grouped(g) => Some(g),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Schema – names and dtypes, without the data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<(String, DType)>,
}

impl Schema {
    pub fn new(fields: Vec<(String, DType)>) -> Self {
        Schema { fields }
    }

    pub fn dtype(&self, name: &str) -> Option<DType> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| *d)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dtype(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dataset – columns plus attached annotations
// ---------------------------------------------------------------------------

/// An ordered collection of uniquely named columns.
///
/// Column names are unique by construction. Equal column lengths are *not*
/// enforced here, since loaders may hand over ragged data; use
/// [`Dataset::row_count`] to check, or run the data through
/// [`basic_preproc`](crate::preprocessing::basic_preproc).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    annotations: BTreeMap<String, Annotation>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, ValidationError> {
        let mut dataset = Dataset::new();
        for column in columns {
            dataset.push_column(column)?;
        }
        Ok(dataset)
    }

    pub fn push_column(&mut self, column: Column) -> Result<(), ValidationError> {
        if self.has_name(column.name()) {
            return Err(ValidationError::DuplicateColumn(column.name().to_string()));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Look up a column, falling back to a column annotation of that name.
    pub fn resolve(&self, name: &str) -> Option<&Column> {
        self.column(name)
            .or_else(|| self.annotations.get(name).and_then(Annotation::as_column))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows, or an error when the columns disagree.
    pub fn row_count(&self) -> Result<usize, ValidationError> {
        let Some(first) = self.columns.first() else {
            return Ok(0);
        };
        let expected = first.len();
        for column in &self.columns[1..] {
            if column.len() != expected {
                return Err(ValidationError::LengthMismatch {
                    column: column.name().to_string(),
                    expected,
                    actual: column.len(),
                });
            }
        }
        Ok(expected)
    }

    /// Equal column lengths and a single dtype per column.
    pub fn is_normalized(&self) -> bool {
        self.row_count().is_ok() && self.columns.iter().all(|c| c.dtype() != DType::Mixed)
    }

    /// A new dataset holding only the given rows, in the given order.
    /// Annotations are not carried over.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.iter().map(|c| c.take_rows(indices)).collect(),
            annotations: BTreeMap::new(),
        }
    }

    /// Distinct values of a column (or column annotation).
    pub fn unique_values(&self, name: &str) -> Option<BTreeSet<Scalar>> {
        self.resolve(name).map(Column::unique_values)
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.get(name)
    }

    pub fn annotations(&self) -> &BTreeMap<String, Annotation> {
        &self.annotations
    }

    /// Whether `name` is taken by a column or an annotation.
    pub fn has_name(&self, name: &str) -> bool {
        self.column(name).is_some() || self.annotations.contains_key(name)
    }

    /// Attach an annotation, replacing any column or annotation of the same
    /// name. Callers are responsible for the overwrite check.
    pub(crate) fn attach(&mut self, name: &str, annotation: Annotation) {
        self.columns.retain(|c| c.name() != name);
        let annotation = match annotation {
            Annotation::Column(c) => Annotation::Column(c.with_name(name)),
            other => other,
        };
        self.annotations.insert(name.to_string(), annotation);
    }

    /// Names and dtypes of the columns followed by the column annotations.
    pub fn schema(&self) -> Schema {
        let mut fields: Vec<(String, DType)> = self
            .columns
            .iter()
            .map(|c| (c.name().to_string(), c.dtype()))
            .collect();
        for (name, annotation) in &self.annotations {
            if let Annotation::Column(c) = annotation {
                fields.push((name.clone(), c.dtype()));
            }
        }
        Schema::new(fields)
    }
}
