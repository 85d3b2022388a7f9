//! Catalog record shapes and the aggregate types derived from them

use serde::{Deserialize, Serialize};

/// Stamp record as delivered by the remote catalog.
///
/// Every field is optional: the remote omits, nulls or blanks fields freely.
/// Field names follow the remote's PascalCase JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawRecord {
    // Identifiers
    pub id: Option<String>,
    pub stamp_code: Option<String>,
    pub catalog_number: Option<String>,
    pub catalog_id: Option<String>,
    pub parent_stamp_id: Option<String>,

    pub name: Option<String>,
    pub description: Option<String>,

    // Category chain
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub country_description: Option<String>,
    pub series_name: Option<String>,
    pub series_description: Option<String>,
    pub item_type_name: Option<String>,
    pub item_type_description: Option<String>,
    pub stamp_group_name: Option<String>,
    pub stamp_group_description: Option<String>,
    pub release_name: Option<String>,
    pub release_description: Option<String>,
    pub release_date: Option<String>,
    pub category_name: Option<String>,
    pub category_description: Option<String>,
    pub paper_type_name: Option<String>,
    pub paper_type_description: Option<String>,

    // Issue
    pub issue_year: Option<i32>,
    pub issue_date: Option<String>,
    pub denomination_value: Option<f64>,
    pub denomination_symbol: Option<String>,
    pub denomination_currency: Option<String>,

    // Technical specs
    pub color_name: Option<String>,
    pub design: Option<String>,
    pub designer: Option<String>,
    pub engraver: Option<String>,
    pub printer: Option<String>,
    pub printing_method: Option<String>,
    pub perforation: Option<String>,
    pub watermark: Option<String>,
    pub gum: Option<String>,
    pub sheet_format: Option<String>,
    pub width_mm: Option<f64>,
    pub height_mm: Option<f64>,
    pub print_run: Option<i64>,

    // Market
    pub mint_value: Option<f64>,
    pub used_value: Option<f64>,
    pub currency_code: Option<String>,
    pub rarity_rating: Option<i32>,
    pub last_auction_price: Option<f64>,

    // Images
    pub stamp_image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub back_image_url: Option<String>,

    // Varieties
    pub is_instance: Option<bool>,
    pub variety_type: Option<String>,
    pub variety_description: Option<String>,
    pub is_specimen: Option<bool>,

    /// Embedded JSON detail blob, kept as the remote sent it
    pub stamp_details_json: Option<String>,

    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Canonical stamp record. Every field holds a value.
///
/// Categorical fields (series, type, group, release, category, paper type)
/// default to the empty string so grouping can bucket them as unassigned.
/// `#[serde(default)]` lets older cache payloads load; the coordinator then
/// re-derives them from raw when the stored schema version is behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizedStamp {
    pub id: String,
    pub stamp_code: String,
    pub catalog_number: String,
    pub catalog_id: String,
    pub parent_stamp_id: String,

    pub name: String,
    pub description: String,

    pub country_code: String,
    pub country_name: String,
    pub country_description: String,
    pub series_name: String,
    pub series_description: String,
    pub item_type_name: String,
    pub item_type_description: String,
    pub stamp_group_name: String,
    pub stamp_group_description: String,
    pub release_name: String,
    pub release_description: String,
    pub release_date: String,
    pub category_name: String,
    pub category_description: String,
    pub paper_type_name: String,
    pub paper_type_description: String,

    /// 0 when unknown
    pub issue_year: i32,
    pub issue_date: String,
    /// Value and symbol combined, e.g. "1d" or "2½d"
    pub denomination: String,
    pub denomination_value: f64,
    pub denomination_symbol: String,

    pub color: String,
    pub design: String,
    pub designer: String,
    pub engraver: String,
    pub printer: String,
    pub printing_method: String,
    pub perforation: String,
    pub watermark: String,
    pub gum: String,
    pub sheet_format: String,
    pub print_run: i64,

    pub mint_value: f64,
    pub used_value: f64,
    pub currency_code: String,
    pub rarity_rating: i32,

    pub image_url: String,
    pub thumbnail_url: String,

    pub is_instance: bool,
    pub variety_type: String,
    pub variety_description: String,

    pub stamp_details_json: String,
}

impl NormalizedStamp {
    pub fn has_parent(&self) -> bool {
        !self.parent_stamp_id.is_empty()
    }

    /// Issue year if it is a real (non-zero) year
    pub fn known_year(&self) -> Option<i32> {
        (self.issue_year != 0).then_some(self.issue_year)
    }
}

/// Catalog hierarchy level, used to name unassigned buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Country,
    Series,
    Type,
    StampGroup,
    Release,
    Category,
    PaperType,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Country => "country",
            Level::Series => "series",
            Level::Type => "type",
            Level::StampGroup => "group",
            Level::Release => "release",
            Level::Category => "category",
            Level::PaperType => "paper_type",
        }
    }

    /// Display name for the unassigned bucket at this level
    pub fn unassigned_name(&self) -> &'static str {
        match self {
            Level::Country => "Unknown Country",
            Level::Series => "Unknown Series",
            Level::Type => "Unknown Type",
            Level::StampGroup => "Unknown Group",
            Level::Release => "Unknown Release",
            Level::Category => "Unknown Category",
            Level::PaperType => "Unknown Paper Type",
        }
    }
}

/// Grouping key for a categorical field.
///
/// Blank values go to `Unassigned` instead of being dropped. A category
/// literally named "unknown_type" stays `Named` and never merges with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Named(String),
    Unassigned,
}

impl GroupKey {
    pub fn named(value: impl Into<String>) -> Self {
        GroupKey::Named(value.into())
    }

    pub fn from_field(value: &str) -> Self {
        if value.trim().is_empty() {
            GroupKey::Unassigned
        } else {
            GroupKey::Named(value.to_string())
        }
    }

    /// Parse a key typed by a user: the legacy `unknown_<level>` label
    /// selects the unassigned bucket.
    pub fn parse(value: &str, level: Level) -> Self {
        if value == Self::sentinel(level) {
            GroupKey::Unassigned
        } else {
            Self::from_field(value)
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            GroupKey::Named(name) => !value.trim().is_empty() && name == value,
            GroupKey::Unassigned => value.trim().is_empty(),
        }
    }

    pub fn sentinel(level: Level) -> String {
        format!("unknown_{}", level.as_str())
    }

    /// Id string as shown to the browsing UI
    pub fn label(&self, level: Level) -> String {
        match self {
            GroupKey::Named(name) => name.clone(),
            GroupKey::Unassigned => Self::sentinel(level),
        }
    }

    pub fn display_name(&self, level: Level) -> &str {
        match self {
            GroupKey::Named(name) => name,
            GroupKey::Unassigned => level.unassigned_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryData {
    pub id: GroupKey,
    pub code: String,
    pub name: String,
    pub description: String,
    /// Number of member stamps
    pub total_years: usize,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesData {
    pub id: GroupKey,
    pub name: String,
    pub description: String,
    pub country_code: String,
    /// Number of member stamps
    pub total_types: usize,
    pub period_start: Option<i32>,
    pub period_end: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeData {
    pub id: GroupKey,
    pub name: String,
    pub description: String,
    pub total_stamps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampGroupData {
    pub id: GroupKey,
    pub name: String,
    pub description: String,
    pub total_stamps: usize,
    pub watermark: String,
    pub perforation: String,
    pub printer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearData {
    pub year: i32,
    pub total_stamps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseData {
    pub id: GroupKey,
    pub name: String,
    pub description: String,
    pub release_date: String,
    pub total_stamps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryData {
    pub id: GroupKey,
    pub name: String,
    pub description: String,
    pub total_stamps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperTypeData {
    pub id: GroupKey,
    pub name: String,
    pub description: String,
    pub total_stamps: usize,
}

/// Terminal query row: a stamp plus its direct varieties
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampWithInstances {
    pub stamp: NormalizedStamp,
    pub instances: Vec<NormalizedStamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key_from_field() {
        assert_eq!(GroupKey::from_field(""), GroupKey::Unassigned);
        assert_eq!(GroupKey::from_field("   "), GroupKey::Unassigned);
        assert_eq!(GroupKey::from_field("Chalon"), GroupKey::named("Chalon"));
    }

    #[test]
    fn test_sentinel_name_does_not_collide() {
        let literal = GroupKey::from_field("unknown_type");
        assert_eq!(literal, GroupKey::named("unknown_type"));
        assert!(!literal.matches(""));
        assert!(GroupKey::Unassigned.matches(""));
        assert!(!GroupKey::Unassigned.matches("unknown_type"));
    }

    #[test]
    fn test_parse_sentinel_label() {
        assert_eq!(
            GroupKey::parse("unknown_group", Level::StampGroup),
            GroupKey::Unassigned
        );
        assert_eq!(
            GroupKey::parse("unknown_group", Level::Type),
            GroupKey::named("unknown_group")
        );
        assert_eq!(GroupKey::Unassigned.label(Level::PaperType), "unknown_paper_type");
    }

    #[test]
    fn test_raw_record_reads_partial_json() {
        let json = r#"{"Id":"s1","CountryCode":"NZ","IssueYear":1855,"Unexpected":true}"#;
        let raw: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(raw.id.as_deref(), Some("s1"));
        assert_eq!(raw.issue_year, Some(1855));
        assert!(raw.series_name.is_none());
    }
}
