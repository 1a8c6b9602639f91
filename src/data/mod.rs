/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset  │  Vec<Column>, attached annotations
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter  │  apply per-column value sets → row indices
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
