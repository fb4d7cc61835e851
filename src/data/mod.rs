/// Data layer: core types, loading, splitting and export.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet / .xlsx
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → ImportanceDataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────┐
///   │ ImportanceDataset │  Vec<ObjectRecord>, image index
///   └──────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  split    │  row boundary → train / test indices
///   └──────────┘
/// ```

pub mod export;
pub mod loader;
pub mod model;
pub mod split;
