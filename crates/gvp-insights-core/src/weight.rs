use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Surveyed quantity bucket of accumulated waste at a point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum QuantityBucket {
    #[serde(rename = "some_100_kg")]
    Some100Kg,
    #[serde(rename = "below_500_kg")]
    Below500Kg,
    #[serde(rename = "_500kg_1_tonne")]
    From500KgTo1Tonne,
    #[serde(rename = "above_1_tonne")]
    Above1Tonne,
}

impl QuantityBucket {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Some100Kg => "some_100_kg",
            Self::Below500Kg => "below_500_kg",
            Self::From500KgTo1Tonne => "_500kg_1_tonne",
            Self::Above1Tonne => "above_1_tonne",
        }
    }

    /// Exact label match after trimming surrounding whitespace.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "some_100_kg" => Some(Self::Some100Kg),
            "below_500_kg" => Some(Self::Below500Kg),
            "_500kg_1_tonne" => Some(Self::From500KgTo1Tonne),
            "above_1_tonne" => Some(Self::Above1Tonne),
            _ => None,
        }
    }

    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::Some100Kg => 1.0,
            Self::Below500Kg => 3.5,
            Self::From500KgTo1Tonne => 7.5,
            Self::Above1Tonne => 10.0,
        }
    }
}

/// Volume weight of a quantity label; unknown or absent labels weigh 0.
#[must_use]
pub fn waste_weight(bucket: Option<&str>) -> f64 {
    bucket.and_then(QuantityBucket::parse).map_or(0.0, QuantityBucket::weight)
}

#[must_use]
pub fn total_volume<'r, I>(records: I, field: &str) -> f64
where
    I: IntoIterator<Item = &'r Record>,
{
    records.into_iter().map(|record| waste_weight(Some(&*record.text(field)))).sum()
}
