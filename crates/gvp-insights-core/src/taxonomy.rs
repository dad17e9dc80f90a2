use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::record::Record;
use crate::InsightsError;

/// Lower-case and trim free text before keyword matching.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TaxonomyEntry {
    pub category: String,
    /// Held in [`normalize_text`] form, both when built and when deserialized.
    #[serde(deserialize_with = "normalized_keywords")]
    pub keywords: Vec<String>,
}

fn normalized_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let keywords = Vec::<String>::deserialize(deserializer)?;
    Ok(keywords.iter().map(|keyword| normalize_text(keyword)).collect())
}

impl TaxonomyEntry {
    #[must_use]
    pub fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|keyword| normalize_text(keyword)).collect(),
        }
    }

    /// `normalized` must already be passed through [`normalize_text`].
    #[must_use]
    pub fn matches(&self, normalized: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && normalized.contains(keyword.as_str()))
    }
}

/// What a table answers when no entry matches.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "kind", content = "category", rename_all = "snake_case")]
pub enum Fallback {
    Category(String),
    Unmatched,
}

/// Ordered keyword rules; the first matching entry wins.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TaxonomyTable {
    pub name: String,
    pub entries: Vec<TaxonomyEntry>,
    pub fallback: Fallback,
}

impl TaxonomyTable {
    #[must_use]
    pub fn new(name: &str, entries: Vec<TaxonomyEntry>, fallback: Fallback) -> Self {
        Self { name: name.to_string(), entries, fallback }
    }

    /// Classify one free-text value. Returns `None` only for tables whose
    /// fallback is [`Fallback::Unmatched`].
    #[must_use]
    pub fn classify(&self, text: &str) -> Option<&str> {
        let normalized = normalize_text(text);
        self.entries
            .iter()
            .find(|entry| entry.matches(&normalized))
            .map(|entry| entry.category.as_str())
            .or_else(|| self.default_category())
    }

    #[must_use]
    pub fn default_category(&self) -> Option<&str> {
        match &self.fallback {
            Fallback::Category(category) => Some(category.as_str()),
            Fallback::Unmatched => None,
        }
    }

    /// Every category the table can produce, in declaration order, default last.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.category.as_str()).chain(self.default_category())
    }

    /// # Errors
    /// Returns [`InsightsError::Validation`] when the table has no entries, an
    /// entry has a blank or duplicate category, a keyword is blank, or the
    /// default category is also an entry category.
    pub fn validate(&self) -> Result<(), InsightsError> {
        let invalid = |message: String| Err(InsightsError::Validation(message));

        if self.entries.is_empty() {
            return invalid(format!("taxonomy `{}` MUST have at least one entry", self.name));
        }

        let mut seen = BTreeSet::new();
        for entry in &self.entries {
            let category = entry.category.trim();
            if category.is_empty() {
                return invalid(format!("taxonomy `{}` has an entry without category", self.name));
            }
            if !seen.insert(category) {
                return invalid(format!(
                    "taxonomy `{}` declares category `{category}` more than once",
                    self.name
                ));
            }
            if entry.keywords.is_empty() {
                return invalid(format!(
                    "taxonomy `{}` category `{category}` MUST list at least one keyword",
                    self.name
                ));
            }
            if entry.keywords.iter().any(|keyword| keyword.trim().is_empty()) {
                return invalid(format!(
                    "taxonomy `{}` category `{category}` has a blank keyword",
                    self.name
                ));
            }
        }

        if let Fallback::Category(default) = &self.fallback {
            let default = default.trim();
            if default.is_empty() {
                return invalid(format!("taxonomy `{}` default category is blank", self.name));
            }
            if seen.contains(default) {
                return invalid(format!(
                    "taxonomy `{}` default category `{default}` MUST NOT be reachable by keyword",
                    self.name
                ));
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn disposal() -> Self {
        Self::new(
            "disposal",
            vec![
                TaxonomyEntry::new(
                    "Households / Residents",
                    &[
                        "household",
                        "resident",
                        "houses",
                        "home",
                        "family",
                        "families",
                        "neighbo",
                        "colony",
                        "society",
                        "apartment",
                        "local people",
                        "ghar",
                        "घर",
                        "निवासी",
                    ],
                ),
                TaxonomyEntry::new(
                    "Shops / Businesses",
                    &[
                        "shop",
                        "stores",
                        "store owner",
                        "general store",
                        "kirana",
                        "business",
                        "commercial",
                        "dukaan",
                        "dukan",
                        "दुकान",
                    ],
                ),
                TaxonomyEntry::new(
                    "Vendors / Small Stalls",
                    &[
                        "vendor",
                        "stall",
                        "hawker",
                        "thela",
                        "thele",
                        "cart",
                        "kiosk",
                        "street food",
                        "ठेला",
                        "फेरीवाला",
                    ],
                ),
                TaxonomyEntry::new(
                    "Market / Vendor Community",
                    &["market", "bazaar", "bazar", "mandi", "traders", "बाजार", "मंडी"],
                ),
                TaxonomyEntry::new(
                    "Restaurants / Hotels",
                    &[
                        "restaurant",
                        "hotel",
                        "dhaba",
                        "eatery",
                        "canteen",
                        "cafe",
                        "food court",
                        "होटल",
                    ],
                ),
                TaxonomyEntry::new(
                    "Construction Workers",
                    &["construction", "builder", "contractor", "mason", "debris", "निर्माण"],
                ),
                TaxonomyEntry::new(
                    "Institutions (Schools / Offices)",
                    &[
                        "school",
                        "college",
                        "universit",
                        "office",
                        "hospital",
                        "clinic",
                        "institut",
                        "स्कूल",
                    ],
                ),
                TaxonomyEntry::new(
                    "Industries / Factories",
                    &["industr", "factory", "factories", "workshop", "कारखाना"],
                ),
                TaxonomyEntry::new(
                    "Waste Pickers / Scrap Dealers",
                    &[
                        "ragpicker",
                        "rag picker",
                        "waste picker",
                        "kabadi",
                        "kabari",
                        "scrap",
                        "कबाड़",
                    ],
                ),
                TaxonomyEntry::new(
                    "Municipal / Sanitation Staff",
                    &[
                        "municipal",
                        "corporation",
                        "sweeper",
                        "sanitation",
                        "safai karmachari",
                        "nagar nigam",
                        "panchayat",
                        "नगर निगम",
                    ],
                ),
                TaxonomyEntry::new(
                    "Religious / Event Gatherings",
                    &[
                        "temple",
                        "mandir",
                        "mosque",
                        "masjid",
                        "church",
                        "gurudwara",
                        "religious",
                        "festival",
                        "wedding",
                        "मंदिर",
                    ],
                ),
                TaxonomyEntry::new(
                    "Passers-by / Public",
                    &[
                        "passer",
                        "passing",
                        "public",
                        "pedestrian",
                        "commuter",
                        "travel",
                        "visitor",
                        "tourist",
                        "outsider",
                        "people",
                        "everyone",
                        "लोग",
                    ],
                ),
            ],
            Fallback::Category("Unknown / Not Mentioned".to_string()),
        )
    }

    #[must_use]
    pub fn setting() -> Self {
        Self::new(
            "setting",
            vec![
                TaxonomyEntry::new(
                    "Residential Area",
                    &[
                        "residential",
                        "residence",
                        "colony",
                        "society",
                        "apartment",
                        "housing",
                        "mohalla",
                        "basti",
                        "slum",
                        "village",
                        "गांव",
                        "मोहल्ला",
                        "कॉलोनी",
                    ],
                ),
                TaxonomyEntry::new(
                    "Market / Commercial Area",
                    &[
                        "market",
                        "bazaar",
                        "bazar",
                        "mandi",
                        "commercial",
                        "shopping",
                        "shops",
                        "बाजार",
                    ],
                ),
                TaxonomyEntry::new(
                    "Near Water Body / Drain",
                    &[
                        "drain",
                        "nala",
                        "nallah",
                        "nullah",
                        "canal",
                        "river",
                        "lake",
                        "pond",
                        "water body",
                        "sewer",
                        "नाला",
                        "नदी",
                    ],
                ),
                TaxonomyEntry::new(
                    "Railway / Bus Station",
                    &[
                        "railway",
                        "bus station",
                        "bus stand",
                        "bus stop",
                        "metro station",
                        "depot",
                        "रेलवे",
                    ],
                ),
                TaxonomyEntry::new(
                    "Religious Place",
                    &["temple", "mandir", "mosque", "masjid", "church", "gurudwara", "मंदिर"],
                ),
                TaxonomyEntry::new(
                    "Near Institution",
                    &["school", "college", "universit", "hospital", "office", "institut"],
                ),
                TaxonomyEntry::new(
                    "Industrial Area",
                    &["industr", "factory", "factories", "warehouse", "godown"],
                ),
                TaxonomyEntry::new(
                    "Park / Public Space",
                    &[
                        "public park",
                        "park gate",
                        "park area",
                        "parks",
                        "garden",
                        "playground",
                        "public",
                        "पार्क",
                    ],
                ),
                TaxonomyEntry::new(
                    "Open Plot / Vacant Land",
                    &[
                        "open plot",
                        "vacant",
                        "empty plot",
                        "open land",
                        "open area",
                        "open ground",
                        "khali",
                        "barren",
                        "field",
                        "plot",
                        "खाली",
                        "मैदान",
                    ],
                ),
                TaxonomyEntry::new(
                    "Roadside / Street",
                    &[
                        "road", "street", "highway", "lane", "footpath", "junction", "crossing",
                        "chowk", "sadak", "gali", "सड़क", "गली",
                    ],
                ),
            ],
            Fallback::Category("Unknown / Not Mentioned".to_string()),
        )
    }

    /// Suggested-solution taxonomy. Unrecognized suggestions are not counted.
    #[must_use]
    pub fn solution() -> Self {
        Self::new(
            "solution",
            vec![
                TaxonomyEntry::new(
                    "Bins and Facilites",
                    &[
                        "bins",
                        "dustbin",
                        "waste bin",
                        "garbage bin",
                        "container",
                        "dumpster",
                        "facilit",
                        "toilet",
                        "kooda daan",
                        "कूड़ादान",
                        "डस्टबिन",
                    ],
                ),
                TaxonomyEntry::new(
                    "Regular Collection",
                    &[
                        "collect",
                        "pickup",
                        "pick up",
                        "pick-up",
                        "door to door",
                        "door-to-door",
                        "vehicle",
                        "truck",
                        "tractor",
                        "daily",
                        "regular",
                        "gaadi",
                        "गाड़ी",
                    ],
                ),
                TaxonomyEntry::new(
                    "Awareness and Education",
                    &["aware", "educat", "campaign", "training", "sensiti", "jagruk", "जागरूक"],
                ),
                TaxonomyEntry::new(
                    "Fines and Enforcement",
                    &[
                        "fines",
                        "fined",
                        "impose fine",
                        "penalt",
                        "enforce",
                        "strict",
                        "police",
                        "punish",
                        "cctv",
                        "camera",
                        "challan",
                        "जुर्माना",
                    ],
                ),
                TaxonomyEntry::new(
                    "Community Participation",
                    &[
                        "community",
                        "volunteer",
                        "participat",
                        "resident welfare",
                        "together",
                        "self help",
                        "समुदाय",
                    ],
                ),
                TaxonomyEntry::new(
                    "Cleaning and Sweeping",
                    &["clean", "sweep", "safai", "swachh", "सफाई"],
                ),
                TaxonomyEntry::new(
                    "Segregation and Recycling",
                    &["segregat", "recycl", "compost", "separat", "reuse"],
                ),
                TaxonomyEntry::new(
                    "Government / Municipal Action",
                    &[
                        "government",
                        "govt",
                        "municipal",
                        "corporation",
                        "authorit",
                        "administration",
                        "councillor",
                        "nagar nigam",
                        "panchayat",
                        "सरकार",
                    ],
                ),
            ],
            Fallback::Unmatched,
        )
    }
}

/// Classify optional free text; absent text behaves like empty text.
#[must_use]
pub fn classify<'t>(text: Option<&str>, table: &'t TaxonomyTable) -> Option<&'t str> {
    table.classify(text.unwrap_or(""))
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FlagColumn {
    pub column: String,
    pub label: String,
}

/// Boolean indicator columns that together describe one categorical attribute.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FlagGroup {
    pub name: String,
    pub columns: Vec<FlagColumn>,
}

impl FlagGroup {
    #[must_use]
    pub fn new(name: &str, columns: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(column, label)| FlagColumn {
                    column: (*column).to_string(),
                    label: (*label).to_string(),
                })
                .collect(),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.label.as_str())
    }

    /// Labels of the columns set on `record`, in column order.
    pub fn present<'g>(&'g self, record: &'g Record) -> impl Iterator<Item = &'g str> + 'g {
        self.columns
            .iter()
            .filter(move |column| record.flag(&column.column))
            .map(|column| column.label.as_str())
    }

    /// # Errors
    /// Returns [`InsightsError::Validation`] when the group is empty, a column or
    /// label is blank, or a label repeats.
    pub fn validate(&self) -> Result<(), InsightsError> {
        if self.columns.is_empty() {
            return Err(InsightsError::Validation(format!(
                "flag group `{}` MUST have at least one column",
                self.name
            )));
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if column.column.trim().is_empty() || column.label.trim().is_empty() {
                return Err(InsightsError::Validation(format!(
                    "flag group `{}` columns MUST have a non-empty column and label",
                    self.name
                )));
            }
            if !seen.insert(column.label.trim()) {
                return Err(InsightsError::Validation(format!(
                    "flag group `{}` repeats label `{}`",
                    self.name,
                    column.label.trim()
                )));
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn waste_types() -> Self {
        Self::new(
            "waste_types",
            &[
                ("waste_type_plastic", "Plastic"),
                ("waste_type_organic", "Organic / Food Waste"),
                ("waste_type_paper", "Paper / Cardboard"),
                ("waste_type_glass", "Glass"),
                ("waste_type_metal", "Metal"),
                ("waste_type_construction", "Construction Debris"),
                ("waste_type_ewaste", "E-Waste"),
                ("waste_type_textile", "Textile"),
                ("waste_type_mixed", "Mixed Waste"),
            ],
        )
    }

    #[must_use]
    pub fn problems() -> Self {
        Self::new(
            "problems",
            &[
                ("problem_foul_smell", "Foul Smell"),
                ("problem_mosquitoes", "Mosquitoes / Flies"),
                ("problem_stray_animals", "Stray Animals"),
                ("problem_blocked_drains", "Blocked Drains"),
                ("problem_health_issues", "Health Issues"),
                ("problem_traffic", "Traffic Obstruction"),
                ("problem_burning", "Waste Burning"),
            ],
        )
    }

    #[must_use]
    pub fn reasons() -> Self {
        Self::new(
            "reasons",
            &[
                ("reason_no_collection", "No Collection Service"),
                ("reason_irregular_collection", "Irregular Collection"),
                ("reason_lack_of_bins", "Lack of Bins"),
                ("reason_user_fee", "Due To User Fee"),
                ("reason_lack_of_awareness", "Lack of Awareness"),
                ("reason_open_space", "Open Space Available"),
                ("reason_far_collection_point", "Far From Collection Point"),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn earlier_entry_wins_when_several_match() {
        let disposal = TaxonomyTable::disposal();
        assert_eq!(disposal.classify("street vendor stall"), Some("Vendors / Small Stalls"));
        assert_eq!(disposal.classify("Vendor market"), Some("Vendors / Small Stalls"));
        assert_eq!(
            disposal.classify("vegetable MARKET traders"),
            Some("Market / Vendor Community")
        );
    }

    #[test]
    fn classification_is_case_and_whitespace_insensitive() {
        let disposal = TaxonomyTable::disposal();
        assert_eq!(disposal.classify("   HOUSEHOLDS nearby  "), Some("Households / Residents"));
        assert_eq!(disposal.classify("ठेला वाले"), Some("Vendors / Small Stalls"));
        assert_eq!(disposal.classify("Nagar Nigam staff"), Some("Municipal / Sanitation Staff"));
    }

    #[test]
    fn disposal_and_setting_fall_back_to_unknown() {
        let disposal = TaxonomyTable::disposal();
        let setting = TaxonomyTable::setting();
        for text in ["", "   ", "no idea", "???"] {
            assert_eq!(disposal.classify(text), Some("Unknown / Not Mentioned"));
            assert_eq!(setting.classify(text), Some("Unknown / Not Mentioned"));
        }
        assert_eq!(classify(None, &disposal), Some("Unknown / Not Mentioned"));
    }

    #[test]
    fn setting_rules_resolve_common_descriptions() {
        let setting = TaxonomyTable::setting();
        assert_eq!(setting.classify("Near the nala behind colony"), Some("Residential Area"));
        assert_eq!(setting.classify("Open drain near bus stop"), Some("Near Water Body / Drain"));
        assert_eq!(setting.classify("Main road junction"), Some("Roadside / Street"));
        assert_eq!(setting.classify("vacant plot"), Some("Open Plot / Vacant Land"));
        assert_eq!(setting.classify("Outside the temple"), Some("Religious Place"));
    }

    #[test]
    fn unmatched_solution_text_has_no_category() {
        let solution = TaxonomyTable::solution();
        assert_eq!(solution.classify("More Bins"), Some("Bins and Facilites"));
        assert_eq!(solution.classify("Daily pickup by truck"), Some("Regular Collection"));
        assert_eq!(solution.classify("something else entirely"), None);
        assert_eq!(solution.classify(""), None);
        assert_eq!(classify(None, &solution), None);
    }

    #[test]
    fn short_keywords_do_not_claim_longer_words() {
        let disposal = TaxonomyTable::disposal();
        let setting = TaxonomyTable::setting();
        let solution = TaxonomyTable::solution();

        assert_eq!(setting.classify("near police station"), Some("Unknown / Not Mentioned"));
        assert_eq!(setting.classify("parking lot"), Some("Unknown / Not Mentioned"));
        assert_eq!(disposal.classify("restore workers"), Some("Unknown / Not Mentioned"));
        assert_eq!(solution.classify("define rules"), None);
        assert_eq!(solution.classify("combine efforts"), None);

        assert_eq!(setting.classify("Railway station platform"), Some("Railway / Bus Station"));
        assert_eq!(setting.classify("outside the park gate"), Some("Park / Public Space"));
        assert_eq!(disposal.classify("general store owners"), Some("Shops / Businesses"));
        assert_eq!(solution.classify("Impose fines on littering"), Some("Fines and Enforcement"));
        assert_eq!(solution.classify("put a dustbin here"), Some("Bins and Facilites"));
    }

    #[test]
    fn keywords_are_normalized_once_when_loaded() {
        let entry: TaxonomyEntry =
            serde_json::from_value(json!({"category": "Alpha", "keywords": ["  ALPHA ", "Beta"]}))
                .unwrap_or_else(|err| panic!("entry should deserialize: {err}"));
        assert_eq!(entry.keywords, vec!["alpha".to_string(), "beta".to_string()]);
        assert!(entry.matches(&normalize_text("The ALPHA team")));

        let built = TaxonomyEntry::new("Alpha", &["  ALPHA ", "Beta"]);
        assert_eq!(built, entry);
    }

    #[test]
    fn classification_is_deterministic() {
        let disposal = TaxonomyTable::disposal();
        for text in ["shop owners", "anyone", "Hotel and dhaba", "kabadi wala"] {
            assert_eq!(disposal.classify(text), disposal.classify(text));
        }
    }

    #[test]
    fn substituted_table_drives_classification() {
        let table = TaxonomyTable::new(
            "custom",
            vec![
                TaxonomyEntry::new("Alpha", &["ALPHA", "first"]),
                TaxonomyEntry::new("Beta", &["beta", "first"]),
            ],
            Fallback::Category("Other".to_string()),
        );
        assert_eq!(table.classify("the first one"), Some("Alpha"));
        assert_eq!(table.classify("Beta"), Some("Beta"));
        assert_eq!(table.classify("gamma"), Some("Other"));
        assert_eq!(table.categories().collect::<Vec<_>>(), vec!["Alpha", "Beta", "Other"]);
    }

    #[test]
    fn builtin_tables_and_groups_are_valid() {
        let tables =
            [TaxonomyTable::disposal(), TaxonomyTable::setting(), TaxonomyTable::solution()];
        for table in tables {
            assert!(table.validate().is_ok(), "{} should validate", table.name);
        }
        for group in [FlagGroup::waste_types(), FlagGroup::problems(), FlagGroup::reasons()] {
            assert!(group.validate().is_ok(), "{} should validate", group.name);
        }
        assert_eq!(TaxonomyTable::disposal().entries.len(), 12);
        assert_eq!(TaxonomyTable::solution().entries.len(), 8);
    }

    #[test]
    fn validation_rejects_reachable_default_and_blank_keywords() {
        let reachable = TaxonomyTable::new(
            "bad",
            vec![TaxonomyEntry::new("Other", &["x"])],
            Fallback::Category("Other".to_string()),
        );
        assert!(matches!(reachable.validate(), Err(InsightsError::Validation(_))));

        let blank = TaxonomyTable::new(
            "bad",
            vec![TaxonomyEntry::new("A", &["a", "  "])],
            Fallback::Unmatched,
        );
        assert!(matches!(blank.validate(), Err(InsightsError::Validation(_))));

        let duplicate = TaxonomyTable::new(
            "bad",
            vec![TaxonomyEntry::new("A", &["a"]), TaxonomyEntry::new("A", &["b"])],
            Fallback::Unmatched,
        );
        assert!(matches!(duplicate.validate(), Err(InsightsError::Validation(_))));

        let empty = TaxonomyTable::new("bad", vec![], Fallback::Unmatched);
        assert!(matches!(empty.validate(), Err(InsightsError::Validation(_))));
    }

    #[test]
    fn flag_group_reports_present_labels_in_column_order() {
        let group = FlagGroup::waste_types();
        let record = Record::from_value(json!({
            "waste_type_mixed": 1,
            "waste_type_plastic": "true",
            "waste_type_glass": 0
        }))
        .unwrap_or_default();
        assert_eq!(group.present(&record).collect::<Vec<_>>(), vec!["Plastic", "Mixed Waste"]);

        let repeated = FlagGroup::new("bad", &[("a", "Same"), ("b", "Same")]);
        assert!(matches!(repeated.validate(), Err(InsightsError::Validation(_))));
    }

    #[test]
    fn fallback_serializes_as_tagged_value() {
        let value = serde_json::to_value(Fallback::Category("Unknown".to_string()))
            .unwrap_or_else(|err| panic!("fallback should serialize: {err}"));
        assert_eq!(value, json!({"kind": "category", "category": "Unknown"}));
        let value = serde_json::to_value(Fallback::Unmatched)
            .unwrap_or_else(|err| panic!("fallback should serialize: {err}"));
        assert_eq!(value, json!({"kind": "unmatched"}));
    }
}
