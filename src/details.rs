//! Stamp detail composition
//!
//! Parses the embedded detail blob lazily, on the stamp page, and builds the
//! bibliography paragraph and market summary shown next to it. Nothing in
//! here fails: bad blobs degrade to the stamp's own fields, then defaults.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::types::NormalizedStamp;

const UNKNOWN: &str = "Unknown";
const NONE: &str = "None";
const STANDARD: &str = "Standard";
const COMMON: &str = "Common";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedStampDetails {
    pub perforation: String,
    pub watermark: String,
    pub printing_method: String,
    pub paper_type: String,
    pub rarity: String,
    pub mint_value: f64,
    pub used_value: f64,
    pub varieties: Vec<String>,
    pub errors: Vec<String>,
}

impl Default for ParsedStampDetails {
    fn default() -> Self {
        Self {
            perforation: UNKNOWN.to_string(),
            watermark: NONE.to_string(),
            printing_method: STANDARD.to_string(),
            paper_type: STANDARD.to_string(),
            rarity: COMMON.to_string(),
            mint_value: 0.0,
            used_value: 0.0,
            varieties: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    pub mint_value: String,
    pub used_value: String,
    pub rarity: String,
}

/// Everything the stamp detail page renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampDetailData {
    pub id: String,
    pub name: String,
    pub catalog_number: String,
    pub country: String,
    pub issue_year: i32,
    pub denomination: String,
    pub image_url: String,
    pub details: ParsedStampDetails,
    pub bibliography: String,
    pub market_info: MarketInfo,
}

/// Look a key up under the spellings the remote has used over time
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| obj.get(*key)).filter(|v| !v.is_null())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    }
}

fn text_field(obj: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    lookup(obj, keys)
        .and_then(value_text)
        .unwrap_or_else(|| default.to_string())
}

/// Variety and error entries arrive as plain strings or as objects
fn text_list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let Some(Value::Array(items)) = lookup(obj, keys) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(entry) => lookup(entry, &["name", "Name", "description", "Description"])
                .and_then(value_text),
            other => value_text(other),
        })
        .collect()
}

fn market_value(market: &Map<String, Value>, keys: &[&str]) -> f64 {
    lookup(market, keys)
        .and_then(value_number)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn parse_blob(blob: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(blob) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(other) => Err(CatalogError::DetailParse(format!(
            "expected an object, found {}",
            match other {
                Value::Array(_) => "an array",
                Value::String(_) => "a string",
                Value::Number(_) => "a number",
                Value::Bool(_) => "a boolean",
                _ => "null",
            }
        ))),
        Err(e) => Err(CatalogError::DetailParse(e.to_string())),
    }
}

fn own_text(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        v => v.to_string(),
    }
}

impl ParsedStampDetails {
    /// The view a stamp's own normalized fields support, before any blob
    pub fn from_stamp(stamp: &NormalizedStamp) -> Self {
        Self {
            perforation: own_text(&stamp.perforation, UNKNOWN),
            watermark: own_text(&stamp.watermark, NONE),
            printing_method: own_text(&stamp.printing_method, STANDARD),
            paper_type: own_text(&stamp.paper_type_name, STANDARD),
            ..Self::default()
        }
    }
}

/// Parse a stamp's detail blob. Fields the blob lacks come from the stamp
/// itself, then from the literal defaults; a missing or malformed blob
/// yields that fallback view whole.
pub fn parse_stamp_details(stamp: &NormalizedStamp) -> ParsedStampDetails {
    let base = ParsedStampDetails::from_stamp(stamp);
    if stamp.stamp_details_json.trim().is_empty() {
        return base;
    }
    let obj = match parse_blob(&stamp.stamp_details_json) {
        Ok(obj) => obj,
        Err(e) => {
            debug!(stamp_id = %stamp.id, error = %e, "Falling back to the stamp's own details");
            return base;
        }
    };

    let market = match lookup(&obj, &["marketValues", "market_values", "MarketValues"]) {
        Some(Value::Object(m)) => m.clone(),
        _ => Map::new(),
    };

    ParsedStampDetails {
        perforation: text_field(&obj, &["perforation", "Perforation"], &base.perforation),
        watermark: text_field(&obj, &["watermark", "Watermark"], &base.watermark),
        printing_method: text_field(
            &obj,
            &["printingMethod", "printing_method", "PrintingMethod"],
            &base.printing_method,
        ),
        paper_type: text_field(&obj, &["paperType", "paper_type", "PaperType"], &base.paper_type),
        rarity: text_field(&obj, &["rarity", "Rarity"], COMMON),
        mint_value: market_value(&market, &["mint", "Mint", "mintValue"]),
        used_value: market_value(&market, &["used", "Used", "usedValue"]),
        varieties: text_list(&obj, &["varieties", "Varieties"]),
        errors: text_list(&obj, &["errors", "Errors"]),
    }
}

/// Rarity label for the numeric 0-10 rating
pub fn rarity_label(rating: i32) -> &'static str {
    match rating {
        r if r >= 9 => "Extremely Rare",
        7 | 8 => "Very Rare",
        5 | 6 => "Rare",
        3 | 4 => "Scarce",
        _ => COMMON,
    }
}

fn currency_symbol(code: &str) -> String {
    match code.to_ascii_uppercase().as_str() {
        "USD" => "$".to_string(),
        "GBP" => "£".to_string(),
        "EUR" => "€".to_string(),
        "NZD" => "NZ$".to_string(),
        "AUD" => "A$".to_string(),
        "CAD" => "C$".to_string(),
        "JPY" => "¥".to_string(),
        "" => "$".to_string(),
        other => format!("{} ", other),
    }
}

/// "$1,234.50" style formatting
pub fn format_currency(value: f64, currency_code: &str) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{}{}.{:02}", sign, currency_symbol(currency_code), grouped, cents % 100)
}

fn known(value: &str) -> Option<&str> {
    let value = value.trim();
    match value {
        "" | UNKNOWN | NONE => None,
        v => Some(v),
    }
}

/// Human-readable catalog paragraph built from fields already on hand
pub fn compose_bibliography(stamp: &NormalizedStamp, details: &ParsedStampDetails) -> String {
    let mut sentences = Vec::new();

    let mut opening = stamp.name.clone();
    if let Some(number) = known(&stamp.catalog_number) {
        opening.push_str(&format!(" ({})", number));
    }
    opening.push_str(" was issued");
    if let Some(country) = known(&stamp.country_name) {
        opening.push_str(&format!(" by {}", country));
    }
    if let Some(year) = stamp.known_year() {
        opening.push_str(&format!(" in {}", year));
    }
    if let Some(series) = known(&stamp.series_name) {
        opening.push_str(&format!(" as part of the {} series", series));
    }
    sentences.push(format!("{}.", opening));

    let designer = known(&stamp.designer);
    let engraver = known(&stamp.engraver);
    match (designer, engraver) {
        (Some(d), Some(e)) => sentences.push(format!("Designed by {} and engraved by {}.", d, e)),
        (Some(d), None) => sentences.push(format!("Designed by {}.", d)),
        (None, Some(e)) => sentences.push(format!("Engraved by {}.", e)),
        (None, None) => {}
    }

    let mut production = String::from("Printed");
    if let Some(printer) = known(&stamp.printer) {
        production.push_str(&format!(" by {}", printer));
    }
    production.push_str(&format!(
        " using the {} method on {} paper",
        details.printing_method.to_lowercase(),
        details.paper_type.to_lowercase()
    ));
    if let Some(perf) = known(&details.perforation) {
        production.push_str(&format!(", perforation {}", perf));
    }
    match known(&details.watermark) {
        Some(wmk) => production.push_str(&format!(", watermark {}", wmk)),
        None => production.push_str(", no watermark"),
    }
    sentences.push(format!("{}.", production));

    if !stamp.denomination.is_empty() {
        sentences.push(format!("Face value {}.", stamp.denomination));
    }
    if !details.varieties.is_empty() {
        sentences.push(format!("Known varieties: {}.", details.varieties.join(", ")));
    }
    if !details.errors.is_empty() {
        sentences.push(format!("Recorded errors: {}.", details.errors.join(", ")));
    }

    sentences.join(" ")
}

/// Market summary. Blob figures win over the record's own values.
pub fn compose_market_info(stamp: &NormalizedStamp, details: &ParsedStampDetails) -> MarketInfo {
    let mint = if details.mint_value > 0.0 { details.mint_value } else { stamp.mint_value };
    let used = if details.used_value > 0.0 { details.used_value } else { stamp.used_value };
    let rarity = if details.rarity != COMMON {
        details.rarity.clone()
    } else {
        rarity_label(stamp.rarity_rating).to_string()
    };
    MarketInfo {
        mint_value: format_currency(mint, &stamp.currency_code),
        used_value: format_currency(used, &stamp.currency_code),
        rarity,
    }
}

pub fn create_stamp_detail_data(stamp: &NormalizedStamp) -> StampDetailData {
    let details = parse_stamp_details(stamp);
    let bibliography = compose_bibliography(stamp, &details);
    let market_info = compose_market_info(stamp, &details);
    StampDetailData {
        id: stamp.id.clone(),
        name: stamp.name.clone(),
        catalog_number: stamp.catalog_number.clone(),
        country: stamp.country_name.clone(),
        issue_year: stamp.issue_year,
        denomination: stamp.denomination.clone(),
        image_url: stamp.image_url.clone(),
        details,
        bibliography,
        market_info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::types::RawRecord;

    fn stamp_with_blob(blob: &str) -> NormalizedStamp {
        normalize(&RawRecord {
            id: Some("nz-1".to_string()),
            name: Some("Chalon Head 1d".to_string()),
            country_name: Some("New Zealand".to_string()),
            issue_year: Some(1855),
            stamp_details_json: Some(blob.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_parse_full_blob() {
        let stamp = stamp_with_blob(
            r#"{
                "perforation": "13",
                "watermark": "Large Star",
                "printingMethod": "Recess",
                "paperType": "Blued",
                "rarity": "Very Rare",
                "marketValues": {"mint": 1200, "used": "350.50"},
                "varieties": ["Double print", {"name": "Re-entry"}],
                "errors": [{"description": "Inverted watermark"}]
            }"#,
        );
        let details = parse_stamp_details(&stamp);
        assert_eq!(details.perforation, "13");
        assert_eq!(details.watermark, "Large Star");
        assert_eq!(details.printing_method, "Recess");
        assert_eq!(details.paper_type, "Blued");
        assert_eq!(details.rarity, "Very Rare");
        assert_eq!(details.mint_value, 1200.0);
        assert_eq!(details.used_value, 350.5);
        assert_eq!(details.varieties, vec!["Double print", "Re-entry"]);
        assert_eq!(details.errors, vec!["Inverted watermark"]);
    }

    #[test]
    fn test_truncated_blob_yields_defaults() {
        let stamp = stamp_with_blob(r#"{"perforation": "13", "waterm"#);
        assert_eq!(parse_stamp_details(&stamp), ParsedStampDetails::default());

        let data = create_stamp_detail_data(&stamp);
        assert_eq!(data.details.perforation, "Unknown");
        assert_eq!(data.details.rarity, "Common");
        assert!(data.bibliography.starts_with("Chalon Head 1d was issued by New Zealand in 1855."));
    }

    #[test]
    fn test_non_object_blob_yields_defaults() {
        assert_eq!(parse_stamp_details(&stamp_with_blob("[1,2,3]")), ParsedStampDetails::default());
        assert_eq!(parse_stamp_details(&stamp_with_blob("\"text\"")), ParsedStampDetails::default());
        assert_eq!(parse_stamp_details(&stamp_with_blob("")), ParsedStampDetails::default());
    }

    #[test]
    fn test_per_field_fallbacks() {
        let stamp = stamp_with_blob(r#"{"perforation": 14, "watermark": null, "varieties": "nope"}"#);
        let details = parse_stamp_details(&stamp);
        assert_eq!(details.perforation, "14");
        assert_eq!(details.watermark, "None");
        assert_eq!(details.printing_method, "Standard");
        assert!(details.varieties.is_empty());
    }

    #[test]
    fn test_stamp_fields_fill_missing_blob() {
        let stamp = normalize(&RawRecord {
            id: Some("nz-2".to_string()),
            name: Some("Chalon Head 2d".to_string()),
            perforation: Some("13".to_string()),
            watermark: Some("Large Star".to_string()),
            printing_method: Some("Recess".to_string()),
            paper_type_name: Some("Blued".to_string()),
            ..Default::default()
        });
        let details = parse_stamp_details(&stamp);
        assert_eq!(details.perforation, "13");
        assert_eq!(details.watermark, "Large Star");
        assert_eq!(details.printing_method, "Recess");
        assert_eq!(details.paper_type, "Blued");
        assert_eq!(details.rarity, "Common");

        let text = create_stamp_detail_data(&stamp).bibliography;
        assert!(text.contains("using the recess method on blued paper, perforation 13"));
        assert!(text.contains("watermark Large Star"));
        assert!(!text.contains("no watermark"));

        let mut partial = stamp.clone();
        partial.stamp_details_json = r#"{"perforation": "14"}"#.to_string();
        let details = parse_stamp_details(&partial);
        assert_eq!(details.perforation, "14");
        assert_eq!(details.watermark, "Large Star");

        partial.stamp_details_json = "{broken".to_string();
        assert_eq!(parse_stamp_details(&partial).printing_method, "Recess");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1234.5, "USD"), "$1,234.50");
        assert_eq!(format_currency(0.0, "GBP"), "£0.00");
        assert_eq!(format_currency(1_000_000.0, "NZD"), "NZ$1,000,000.00");
        assert_eq!(format_currency(12.0, "CHF"), "CHF 12.00");
        assert_eq!(format_currency(f64::NAN, "USD"), "$0.00");
    }

    #[test]
    fn test_market_info_prefers_blob_values() {
        let mut stamp = stamp_with_blob(r#"{"marketValues": {"mint": 50}}"#);
        stamp.used_value = 12.0;
        stamp.rarity_rating = 7;
        let details = parse_stamp_details(&stamp);
        let info = compose_market_info(&stamp, &details);
        assert_eq!(info.mint_value, "$50.00");
        assert_eq!(info.used_value, "$12.00");
        assert_eq!(info.rarity, "Very Rare");
    }

    #[test]
    fn test_bibliography_mentions_production() {
        let mut stamp = stamp_with_blob(r#"{"printingMethod": "Recess", "watermark": "Large Star"}"#);
        stamp.printer = "Perkins Bacon".to_string();
        stamp.series_name = "Full Face Queens".to_string();
        stamp.denomination = "1d".to_string();
        let details = parse_stamp_details(&stamp);
        let text = compose_bibliography(&stamp, &details);
        assert!(text.contains("as part of the Full Face Queens series"));
        assert!(text.contains("Printed by Perkins Bacon using the recess method on standard paper"));
        assert!(text.contains("watermark Large Star"));
        assert!(text.contains("Face value 1d."));
    }

    #[test]
    fn test_rarity_label() {
        assert_eq!(rarity_label(10), "Extremely Rare");
        assert_eq!(rarity_label(5), "Rare");
        assert_eq!(rarity_label(3), "Scarce");
        assert_eq!(rarity_label(0), "Common");
        assert_eq!(rarity_label(-4), "Common");
    }
}
