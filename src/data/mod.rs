/// Data layer: core types, loading, and cleaning.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → RecordTable (types inferred per column)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  clean    │  dedup, normalise, coerce, filter, impute make
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ RecordTable │  read-only from here on (stats, charts, report)
///   └─────────────┘
/// ```

pub mod clean;
pub mod loader;
pub mod model;
