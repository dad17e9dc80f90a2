//! Categorization and aggregation core for the Garbage Vulnerable Point (GVP)
//! survey dashboard.
//!
//! Free-text survey answers are classified against ordered keyword taxonomies,
//! counted, and normalized into percentage distributions that chart widgets
//! consume directly. Every operation here is pure and synchronous.

mod aggregate;
mod dashboard;
mod record;
mod taxonomy;
mod weight;

pub use aggregate::{
    aggregate, project_record, AggregateOptions, CategoryDistribution, CategoryShare, Extraction,
    ZeroTotal,
};
pub use dashboard::{
    build_dashboard, map_points, table_rows, DashboardSummary, InsightsConfig, MapPoint,
    SelectionBreakdown, TableRow,
};
pub use record::{parse_dataset, region_options, FieldSchema, Record, RecordFilter, RecordKind};
pub use taxonomy::{
    classify, normalize_text, Fallback, FlagColumn, FlagGroup, TaxonomyEntry, TaxonomyTable,
};
pub use weight::{total_volume, waste_weight, QuantityBucket};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum InsightsError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("dataset error: {0}")]
    Dataset(String),
}
