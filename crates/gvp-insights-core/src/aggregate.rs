use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::taxonomy::{FlagGroup, TaxonomyTable};

/// Placeholder answer that multi-column scans ignore.
const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryShare {
    pub name: String,
    pub value: f64,
}

/// Chart-ready `(name, value)` pairs, sorted descending by value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CategoryDistribution {
    pub entries: Vec<CategoryShare>,
}

impl CategoryDistribution {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|entry| entry.value).sum()
    }

    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|entry| entry.name == name).map(|entry| entry.value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }
}

/// Output when nothing was counted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ZeroTotal {
    /// No entries at all.
    #[default]
    Empty,
    /// Every known category at 0.
    Zeros,
    /// Every known category at `100 / known`.
    Uniform,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct AggregateOptions {
    pub zero_total: ZeroTotal,
    /// Emit known categories that were never observed.
    pub keep_zero: bool,
    pub top_n: Option<usize>,
}

impl AggregateOptions {
    /// Flag groups: every column is reported, counted or not.
    #[must_use]
    pub fn flags() -> Self {
        Self { zero_total: ZeroTotal::Zeros, keep_zero: true, top_n: None }
    }

    /// Free-text classifications: only observed categories are reported.
    #[must_use]
    pub fn observed() -> Self {
        Self { zero_total: ZeroTotal::Empty, keep_zero: false, top_n: None }
    }

    #[must_use]
    pub fn with_zero_total(mut self, zero_total: ZeroTotal) -> Self {
        self.zero_total = zero_total;
        self
    }

    #[must_use]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }
}

/// How a record contributes to a tally.
#[derive(Debug, Clone, Copy)]
pub enum Extraction<'a> {
    /// Each truthy flag column counts its label once.
    Flags(&'a FlagGroup),
    /// One free-text field classified through a table.
    Classified { field: &'a str, table: &'a TaxonomyTable },
    /// Several free-text fields classified through one table; each usable
    /// column counts separately.
    Columns { fields: &'a [String], table: &'a TaxonomyTable },
    /// The trimmed field value is the category.
    Raw { field: &'a str },
}

impl Extraction<'_> {
    fn seed(&self) -> Tally {
        match self {
            Self::Flags(group) => Tally::seeded(group.labels()),
            Self::Classified { table, .. } | Self::Columns { table, .. } => {
                Tally::seeded(table.categories())
            }
            Self::Raw { .. } => Tally::default(),
        }
    }

    fn observe(&self, record: &Record, tally: &mut Tally) {
        match self {
            Self::Flags(group) => {
                for label in group.present(record) {
                    tally.increment(label);
                }
            }
            Self::Classified { field, table } => {
                if let Some(category) = table.classify(&record.text(field)) {
                    tally.increment(category);
                }
            }
            Self::Columns { fields, table } => {
                for field in *fields {
                    let text = record.text(field);
                    let answer = text.trim();
                    if answer.is_empty() || answer == NOT_APPLICABLE {
                        continue;
                    }
                    if let Some(category) = table.classify(answer) {
                        tally.increment(category);
                    }
                }
            }
            Self::Raw { field } => {
                if let Some(value) = record.trimmed_text(field) {
                    tally.increment(&value);
                }
            }
        }
    }
}

/// Category counts in first-seen order; seeded categories come first in seed order.
#[derive(Debug, Clone, Default)]
struct Tally {
    counts: Vec<(String, u64)>,
    positions: HashMap<String, usize>,
}

impl Tally {
    fn seeded<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut tally = Self::default();
        for name in names {
            tally.slot(name);
        }
        tally
    }

    fn slot(&mut self, name: &str) -> usize {
        if let Some(position) = self.positions.get(name) {
            return *position;
        }
        let position = self.counts.len();
        self.counts.push((name.to_string(), 0));
        self.positions.insert(name.to_string(), position);
        position
    }

    fn increment(&mut self, name: &str) {
        let position = self.slot(name);
        self.counts[position].1 += 1;
    }

    fn total(&self) -> u64 {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    fn into_distribution(self, options: AggregateOptions) -> CategoryDistribution {
        let total = self.total();
        let mut entries: Vec<CategoryShare> = if total == 0 {
            match options.zero_total {
                ZeroTotal::Empty => Vec::new(),
                ZeroTotal::Zeros => self
                    .counts
                    .into_iter()
                    .map(|(name, _)| CategoryShare { name, value: 0.0 })
                    .collect(),
                ZeroTotal::Uniform => {
                    let known = as_f64(u64::try_from(self.counts.len()).unwrap_or(u64::MAX));
                    self.counts
                        .into_iter()
                        .map(|(name, _)| CategoryShare { name, value: 100.0 / known })
                        .collect()
                }
            }
        } else {
            let total = as_f64(total);
            self.counts
                .into_iter()
                .filter(|(_, count)| options.keep_zero || *count > 0)
                .map(|(name, count)| CategoryShare { name, value: 100.0 * as_f64(count) / total })
                .collect()
        };

        // Stable: equal shares keep declaration order.
        entries.sort_by(|lhs, rhs| rhs.value.partial_cmp(&lhs.value).unwrap_or(Ordering::Equal));
        if let Some(top_n) = options.top_n {
            entries.truncate(top_n);
        }
        CategoryDistribution { entries }
    }
}

fn as_f64(count: u64) -> f64 {
    f64::from(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Count categories across `records` and normalize the counts to percentages.
#[must_use]
pub fn aggregate<'r, I>(
    records: I,
    extraction: &Extraction<'_>,
    options: AggregateOptions,
) -> CategoryDistribution
where
    I: IntoIterator<Item = &'r Record>,
{
    let mut tally = extraction.seed();
    for record in records {
        extraction.observe(record, &mut tally);
    }
    tally.into_distribution(options)
}

/// Presence view of one record: value 1 for each truthy flag, no normalization.
#[must_use]
pub fn project_record(record: &Record, group: &FlagGroup) -> CategoryDistribution {
    CategoryDistribution {
        entries: group
            .present(record)
            .map(|label| CategoryShare { name: label.to_string(), value: 1.0 })
            .collect(),
    }
}
