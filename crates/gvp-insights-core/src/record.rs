use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::InsightsError;

/// One flat survey row, keyed by field name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    /// Build a record from a JSON value; anything other than an object is rejected.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Read a field as text. Numbers read as their decimal form; every other
    /// non-string value reads as empty text.
    #[must_use]
    pub fn text(&self, field: &str) -> Cow<'_, str> {
        match self.0.get(field) {
            Some(Value::String(value)) => Cow::Borrowed(value.as_str()),
            Some(Value::Number(value)) => Cow::Owned(value.to_string()),
            _ => Cow::Borrowed(""),
        }
    }

    /// Read a field as trimmed text, `None` when the trimmed text is empty.
    #[must_use]
    pub fn trimmed_text(&self, field: &str) -> Option<String> {
        let text = self.text(field);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    #[must_use]
    pub fn flag(&self, field: &str) -> bool {
        self.0.get(field).is_some_and(is_truthy)
    }

    /// Read a finite number from a number or a numeric string.
    #[must_use]
    pub fn number(&self, field: &str) -> Option<f64> {
        let parsed = match self.0.get(field)? {
            Value::Number(value) => value.as_f64(),
            Value::String(value) => value.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|value| value.is_finite())
    }

    #[must_use]
    pub fn kind(&self, fields: &FieldSchema) -> RecordKind {
        let marker = self.text(&fields.record_kind);
        if marker.trim().eq_ignore_ascii_case(fields.gvp_marker.trim()) {
            RecordKind::Gvp
        } else {
            RecordKind::Other
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n.is_finite() && n != 0.0),
        Value::String(text) => {
            let normalized = text.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        }
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse the static dataset: a JSON array of flat objects.
///
/// # Errors
/// Returns [`InsightsError::Dataset`] when the body is not valid JSON, is not an
/// array, or contains a row that is not an object.
pub fn parse_dataset(body: &str) -> Result<Vec<Record>, InsightsError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| InsightsError::Dataset(format!("dataset is not valid JSON: {err}")))?;
    let Value::Array(rows) = value else {
        return Err(InsightsError::Dataset(format!(
            "dataset MUST be a JSON array of objects (found {})",
            json_kind(&value)
        )));
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(fields) => Ok(Record(fields)),
            other => Err(InsightsError::Dataset(format!(
                "row {index} MUST be an object (found {})",
                json_kind(&other)
            ))),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Gvp,
    Other,
}

impl RecordKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gvp => "gvp",
            Self::Other => "other",
        }
    }

    /// Accepts the exact labels produced by [`RecordKind::as_str`].
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gvp" => Some(Self::Gvp),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Source field names the dashboard reads.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct FieldSchema {
    pub region: String,
    pub record_kind: String,
    pub gvp_marker: String,
    pub quantity: String,
    pub disposal: String,
    pub setting: String,
    pub solutions: Vec<String>,
    pub latitude: String,
    pub longitude: String,
    pub location: String,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            region: "district".to_string(),
            record_kind: "record_type".to_string(),
            gvp_marker: "GVP".to_string(),
            quantity: "waste_quantity".to_string(),
            disposal: "who_disposes".to_string(),
            setting: "location_setting".to_string(),
            solutions: vec![
                "suggested_solution_1".to_string(),
                "suggested_solution_2".to_string(),
                "suggested_solution_3".to_string(),
            ],
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
            location: "location_name".to_string(),
        }
    }
}

impl FieldSchema {
    /// # Errors
    /// Returns [`InsightsError::Validation`] when a field name is blank or no
    /// solution column is configured.
    pub fn validate(&self) -> Result<(), InsightsError> {
        let named = [
            ("region", &self.region),
            ("record_kind", &self.record_kind),
            ("gvp_marker", &self.gvp_marker),
            ("quantity", &self.quantity),
            ("disposal", &self.disposal),
            ("setting", &self.setting),
            ("latitude", &self.latitude),
            ("longitude", &self.longitude),
            ("location", &self.location),
        ];
        for (name, value) in named {
            if value.trim().is_empty() {
                return Err(InsightsError::Validation(format!(
                    "field name `{name}` MUST be non-empty"
                )));
            }
        }

        if self.solutions.is_empty() {
            return Err(InsightsError::Validation(
                "at least one solution column MUST be configured".to_string(),
            ));
        }
        if self.solutions.iter().any(|column| column.trim().is_empty()) {
            return Err(InsightsError::Validation(
                "solution column names MUST be non-empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Active dashboard selection. Unset members do not constrain the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct RecordFilter {
    pub region: Option<String>,
    pub kind: Option<RecordKind>,
    pub record: Option<usize>,
}

impl RecordFilter {
    #[must_use]
    pub fn matches(&self, index: usize, record: &Record, fields: &FieldSchema) -> bool {
        if self.record.is_some_and(|selected| selected != index) {
            return false;
        }

        if let Some(kind) = self.kind {
            if record.kind(fields) != kind {
                return false;
            }
        }

        if let Some(region) = self.region.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            let value = record.text(&fields.region);
            if value.trim().to_lowercase() != region.to_lowercase() {
                return false;
            }
        }

        true
    }

    /// Records passing the filter, paired with their index in `records`.
    #[must_use]
    pub fn apply<'a>(
        &self,
        records: &'a [Record],
        fields: &FieldSchema,
    ) -> Vec<(usize, &'a Record)> {
        records
            .iter()
            .enumerate()
            .filter(|(index, record)| self.matches(*index, record, fields))
            .collect()
    }
}

/// Distinct region values for the region selector, ordered case-insensitively.
/// The first spelling seen for a region is the one reported.
#[must_use]
pub fn region_options(records: &[Record], fields: &FieldSchema) -> Vec<String> {
    let mut regions: BTreeMap<String, String> = BTreeMap::new();
    for record in records {
        let Some(region) = record.trimmed_text(&fields.region) else {
            continue;
        };
        regions.entry(region.to_lowercase()).or_insert(region);
    }
    regions.into_values().collect()
}
