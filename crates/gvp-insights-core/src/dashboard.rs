use serde::{Deserialize, Serialize};

use crate::aggregate::{
    aggregate, project_record, AggregateOptions, CategoryDistribution, Extraction, ZeroTotal,
};
use crate::record::{FieldSchema, Record, RecordFilter, RecordKind};
use crate::taxonomy::{FlagGroup, TaxonomyTable};
use crate::weight::{total_volume, waste_weight};
use crate::InsightsError;

/// Everything the dashboard needs to read and classify the dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InsightsConfig {
    pub fields: FieldSchema,
    pub waste_types: FlagGroup,
    pub problems: FlagGroup,
    pub reasons: FlagGroup,
    pub disposal: TaxonomyTable,
    pub setting: TaxonomyTable,
    pub solutions: TaxonomyTable,
    /// Size of the disposal and setting charts.
    pub top_n: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            fields: FieldSchema::default(),
            waste_types: FlagGroup::waste_types(),
            problems: FlagGroup::problems(),
            reasons: FlagGroup::reasons(),
            disposal: TaxonomyTable::disposal(),
            setting: TaxonomyTable::setting(),
            solutions: TaxonomyTable::solution(),
            top_n: 5,
        }
    }
}

impl InsightsConfig {
    /// # Errors
    /// Returns [`InsightsError::Validation`] for the first field schema, flag
    /// group, or taxonomy invariant that does not hold, or when `top_n` is 0.
    pub fn validate(&self) -> Result<(), InsightsError> {
        self.fields.validate()?;
        for group in [&self.waste_types, &self.problems, &self.reasons] {
            group.validate()?;
        }
        for table in [&self.disposal, &self.setting, &self.solutions] {
            table.validate()?;
        }
        if self.top_n == 0 {
            return Err(InsightsError::Validation("top_n MUST be >= 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectionBreakdown {
    pub index: usize,
    pub waste_types: CategoryDistribution,
    pub problems: CategoryDistribution,
    pub reasons: CategoryDistribution,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSummary {
    pub total_records: usize,
    pub gvp_records: usize,
    pub other_records: usize,
    pub total_volume: f64,
    pub waste_types: CategoryDistribution,
    pub problems: CategoryDistribution,
    pub reasons: CategoryDistribution,
    pub disposal: CategoryDistribution,
    pub setting: CategoryDistribution,
    pub solutions: CategoryDistribution,
    /// Present when exactly one record passes the filter.
    pub selection: Option<SelectionBreakdown>,
}

/// Recompute every dashboard output for the records passing `filter`.
#[must_use]
pub fn build_dashboard(
    records: &[Record],
    filter: &RecordFilter,
    config: &InsightsConfig,
) -> DashboardSummary {
    let fields = &config.fields;
    let selected = filter.apply(records, fields);
    let rows: Vec<&Record> = selected.iter().map(|(_, record)| *record).collect();
    tracing::debug!(
        available = records.len(),
        selected = rows.len(),
        "recomputing dashboard distributions"
    );

    let gvp_records =
        rows.iter().filter(|record| record.kind(fields) == RecordKind::Gvp).count();

    let flags = |group: &FlagGroup| {
        aggregate(rows.iter().copied(), &Extraction::Flags(group), AggregateOptions::flags())
    };
    let ranked = |field: &str, table: &TaxonomyTable| {
        aggregate(
            rows.iter().copied(),
            &Extraction::Classified { field, table },
            AggregateOptions::observed().with_top_n(config.top_n),
        )
    };

    let selection = match selected.as_slice() {
        [(index, record)] => Some(SelectionBreakdown {
            index: *index,
            waste_types: project_record(record, &config.waste_types),
            problems: project_record(record, &config.problems),
            reasons: project_record(record, &config.reasons),
        }),
        _ => None,
    };

    DashboardSummary {
        total_records: rows.len(),
        gvp_records,
        other_records: rows.len() - gvp_records,
        total_volume: total_volume(rows.iter().copied(), &fields.quantity),
        waste_types: flags(&config.waste_types),
        problems: flags(&config.problems),
        reasons: flags(&config.reasons),
        disposal: ranked(&fields.disposal, &config.disposal),
        setting: ranked(&fields.setting, &config.setting),
        solutions: aggregate(
            rows.iter().copied(),
            &Extraction::Columns { fields: &fields.solutions, table: &config.solutions },
            AggregateOptions::observed().with_zero_total(ZeroTotal::Uniform),
        ),
        selection,
    }
}

/// One line of the records table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableRow {
    pub index: usize,
    pub kind: RecordKind,
    pub region: Option<String>,
    pub location: Option<String>,
    pub waste_types: Vec<String>,
    pub disposal: Option<String>,
    pub setting: Option<String>,
    pub quantity: Option<String>,
    pub weight: f64,
}

#[must_use]
pub fn table_rows(
    records: &[Record],
    filter: &RecordFilter,
    config: &InsightsConfig,
) -> Vec<TableRow> {
    let fields = &config.fields;
    filter
        .apply(records, fields)
        .into_iter()
        .map(|(index, record)| {
            let quantity = record.trimmed_text(&fields.quantity);
            let classified = |field: &str, table: &TaxonomyTable| {
                table.classify(&record.text(field)).map(str::to_string)
            };
            TableRow {
                index,
                kind: record.kind(fields),
                region: record.trimmed_text(&fields.region),
                location: record.trimmed_text(&fields.location),
                waste_types: config.waste_types.present(record).map(str::to_string).collect(),
                disposal: classified(&fields.disposal, &config.disposal),
                setting: classified(&fields.setting, &config.setting),
                weight: waste_weight(quantity.as_deref()),
                quantity,
            }
        })
        .collect()
}

/// One map marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapPoint {
    pub index: usize,
    pub kind: RecordKind,
    pub latitude: f64,
    pub longitude: f64,
    pub label: Option<String>,
}

/// Markers for filtered records with usable coordinates; the rest are skipped.
#[must_use]
pub fn map_points(
    records: &[Record],
    filter: &RecordFilter,
    config: &InsightsConfig,
) -> Vec<MapPoint> {
    let fields = &config.fields;
    filter
        .apply(records, fields)
        .into_iter()
        .filter_map(|(index, record)| {
            let latitude =
                record.number(&fields.latitude).filter(|lat| (-90.0..=90.0).contains(lat))?;
            let longitude =
                record.number(&fields.longitude).filter(|lon| (-180.0..=180.0).contains(lon))?;
            Some(MapPoint {
                index,
                kind: record.kind(fields),
                latitude,
                longitude,
                label: record.trimmed_text(&fields.location),
            })
        })
        .collect()
}
