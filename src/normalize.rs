//! Raw record → normalized stamp mapping
//!
//! This is the one place where missing remote fields get their defaults.
//! Call sites never fall back on their own.

use chrono::{Datelike, NaiveDate};

use crate::types::{NormalizedStamp, RawRecord};

pub const PLACEHOLDER_IMAGE_URL: &str = "/images/stamps/placeholder.png";

/// Treat `None`, empty and whitespace-only strings alike
fn text(value: &Option<String>) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s.clone(),
        _ => String::new(),
    }
}

fn text_or(value: &Option<String>, default: &str) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s.clone(),
        _ => default.to_string(),
    }
}

fn number(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Year from an issue date: ISO first, then the first standalone 4-digit
/// number in 1800..=2100 ("June 17, 1855", "c. 1857")
fn parse_year(date_str: &str) -> Option<i32> {
    let date_str = date_str.trim();
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Some(date.year());
    }
    if let Some(prefix) = date_str.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date.year());
        }
    }
    for word in date_str.split(|c: char| !c.is_ascii_digit()) {
        if word.len() == 4 {
            if let Ok(year) = word.parse::<i32>() {
                if (1800..=2100).contains(&year) {
                    return Some(year);
                }
            }
        }
    }
    None
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.2}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Combine value and symbol into one display string
pub fn format_denomination(value: Option<f64>, symbol: &Option<String>) -> String {
    let symbol = text(symbol);
    match value {
        Some(v) if v.is_finite() && v != 0.0 => format!("{}{}", format_amount(v), symbol),
        _ => symbol,
    }
}

/// Map a raw record to its canonical form. Total: never fails.
pub fn normalize(raw: &RawRecord) -> NormalizedStamp {
    normalize_with(raw, PLACEHOLDER_IMAGE_URL)
}

/// `normalize` with a caller-chosen image for records that have none
pub fn normalize_with(raw: &RawRecord, placeholder_image_url: &str) -> NormalizedStamp {
    let issue_date = text(&raw.issue_date);
    let issue_year = match raw.issue_year {
        Some(year) if year != 0 => year,
        _ => parse_year(&issue_date).unwrap_or(0),
    };

    let image_url = text_or(&raw.stamp_image_url, placeholder_image_url);
    let thumbnail_url = text_or(&raw.thumbnail_url, &image_url);

    NormalizedStamp {
        id: text(&raw.id),
        stamp_code: text(&raw.stamp_code),
        catalog_number: text(&raw.catalog_number),
        catalog_id: text(&raw.catalog_id),
        parent_stamp_id: text(&raw.parent_stamp_id),

        name: text_or(&raw.name, "Unnamed Stamp"),
        description: text(&raw.description),

        country_code: text(&raw.country_code),
        country_name: text_or(&raw.country_name, &text(&raw.country_code)),
        country_description: text(&raw.country_description),
        series_name: text(&raw.series_name),
        series_description: text(&raw.series_description),
        item_type_name: text(&raw.item_type_name),
        item_type_description: text(&raw.item_type_description),
        stamp_group_name: text(&raw.stamp_group_name),
        stamp_group_description: text(&raw.stamp_group_description),
        release_name: text(&raw.release_name),
        release_description: text(&raw.release_description),
        release_date: text(&raw.release_date),
        category_name: text(&raw.category_name),
        category_description: text(&raw.category_description),
        paper_type_name: text(&raw.paper_type_name),
        paper_type_description: text(&raw.paper_type_description),

        issue_year,
        issue_date,
        denomination: format_denomination(raw.denomination_value, &raw.denomination_symbol),
        denomination_value: number(raw.denomination_value),
        denomination_symbol: text(&raw.denomination_symbol),

        color: text_or(&raw.color_name, "Unknown"),
        design: text(&raw.design),
        designer: text_or(&raw.designer, "Unknown"),
        engraver: text(&raw.engraver),
        printer: text_or(&raw.printer, "Unknown"),
        printing_method: text_or(&raw.printing_method, "Standard"),
        perforation: text_or(&raw.perforation, "Unknown"),
        watermark: text_or(&raw.watermark, "None"),
        gum: text(&raw.gum),
        sheet_format: text(&raw.sheet_format),
        print_run: raw.print_run.unwrap_or(0),

        mint_value: number(raw.mint_value),
        used_value: number(raw.used_value),
        currency_code: text_or(&raw.currency_code, "USD"),
        rarity_rating: raw.rarity_rating.unwrap_or(0),

        image_url,
        thumbnail_url,

        is_instance: raw.is_instance.unwrap_or(false) || !text(&raw.parent_stamp_id).is_empty(),
        variety_type: text(&raw.variety_type),
        variety_description: text(&raw.variety_description),

        stamp_details_json: text(&raw.stamp_details_json),
    }
}

pub fn normalize_all(records: &[RawRecord]) -> Vec<NormalizedStamp> {
    normalize_all_with(records, PLACEHOLDER_IMAGE_URL)
}

pub fn normalize_all_with(records: &[RawRecord], placeholder_image_url: &str) -> Vec<NormalizedStamp> {
    records
        .iter()
        .map(|raw| normalize_with(raw, placeholder_image_url))
        .collect()
}

fn some_text(value: &str) -> Option<String> {
    Some(value.to_string())
}

/// Best-effort raw record rebuilt from a normalized one.
///
/// Used when only the normalized cache survived. Raw-only fields that the
/// normalized shape does not carry come back as "", 0 or false.
pub fn synthesize_raw(stamp: &NormalizedStamp) -> RawRecord {
    RawRecord {
        id: some_text(&stamp.id),
        stamp_code: some_text(&stamp.stamp_code),
        catalog_number: some_text(&stamp.catalog_number),
        catalog_id: some_text(&stamp.catalog_id),
        parent_stamp_id: some_text(&stamp.parent_stamp_id),

        name: some_text(&stamp.name),
        description: some_text(&stamp.description),

        country_code: some_text(&stamp.country_code),
        country_name: some_text(&stamp.country_name),
        country_description: some_text(&stamp.country_description),
        series_name: some_text(&stamp.series_name),
        series_description: some_text(&stamp.series_description),
        item_type_name: some_text(&stamp.item_type_name),
        item_type_description: some_text(&stamp.item_type_description),
        stamp_group_name: some_text(&stamp.stamp_group_name),
        stamp_group_description: some_text(&stamp.stamp_group_description),
        release_name: some_text(&stamp.release_name),
        release_description: some_text(&stamp.release_description),
        release_date: some_text(&stamp.release_date),
        category_name: some_text(&stamp.category_name),
        category_description: some_text(&stamp.category_description),
        paper_type_name: some_text(&stamp.paper_type_name),
        paper_type_description: some_text(&stamp.paper_type_description),

        issue_year: Some(stamp.issue_year),
        issue_date: some_text(&stamp.issue_date),
        denomination_value: Some(stamp.denomination_value),
        denomination_symbol: some_text(&stamp.denomination_symbol),
        denomination_currency: Some(String::new()),

        color_name: some_text(&stamp.color),
        design: some_text(&stamp.design),
        designer: some_text(&stamp.designer),
        engraver: some_text(&stamp.engraver),
        printer: some_text(&stamp.printer),
        printing_method: some_text(&stamp.printing_method),
        perforation: some_text(&stamp.perforation),
        watermark: some_text(&stamp.watermark),
        gum: some_text(&stamp.gum),
        sheet_format: some_text(&stamp.sheet_format),
        width_mm: Some(0.0),
        height_mm: Some(0.0),
        print_run: Some(stamp.print_run),

        mint_value: Some(stamp.mint_value),
        used_value: Some(stamp.used_value),
        currency_code: some_text(&stamp.currency_code),
        rarity_rating: Some(stamp.rarity_rating),
        last_auction_price: Some(0.0),

        stamp_image_url: some_text(&stamp.image_url),
        thumbnail_url: some_text(&stamp.thumbnail_url),
        back_image_url: Some(String::new()),

        is_instance: Some(stamp.is_instance),
        variety_type: some_text(&stamp.variety_type),
        variety_description: some_text(&stamp.variety_description),
        is_specimen: Some(false),

        stamp_details_json: some_text(&stamp.stamp_details_json),

        created_at: Some(String::new()),
        updated_at: Some(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_empty_record_is_total() {
        let stamp = normalize(&RawRecord::default());
        assert_eq!(stamp.image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(stamp.thumbnail_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(stamp.name, "Unnamed Stamp");
        assert_eq!(stamp.watermark, "None");
        assert_eq!(stamp.perforation, "Unknown");
        assert_eq!(stamp.printing_method, "Standard");
        assert_eq!(stamp.currency_code, "USD");
        assert_eq!(stamp.issue_year, 0);
        assert_eq!(stamp.denomination, "");
        assert!(!stamp.is_instance);

        // Every string survives a JSON round trip as a string, never null
        let value = serde_json::to_value(&stamp).unwrap();
        for (key, field) in value.as_object().unwrap() {
            assert!(!field.is_null(), "field {} is null", key);
        }
    }

    #[test]
    fn test_blank_strings_count_as_missing() {
        let raw = RawRecord {
            stamp_image_url: Some("  ".to_string()),
            watermark: Some(String::new()),
            ..Default::default()
        };
        let stamp = normalize(&raw);
        assert_eq!(stamp.image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(stamp.watermark, "None");
    }

    #[test]
    fn test_denomination_combines_value_and_symbol() {
        let raw = RawRecord {
            denomination_value: Some(1.0),
            denomination_symbol: Some("d".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).denomination, "1d");

        assert_eq!(format_denomination(Some(2.5), &Some("d".to_string())), "2.5d");
        assert_eq!(format_denomination(None, &Some("½d".to_string())), "½d");
        assert_eq!(format_denomination(Some(0.0), &None), "");
    }

    #[test]
    fn test_issue_year_falls_back_to_date() {
        let raw = RawRecord {
            issue_date: Some("1855-07-18".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).issue_year, 1855);

        let raw = RawRecord {
            issue_date: Some("July 1857".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).issue_year, 1857);

        let raw = RawRecord {
            issue_year: Some(1840),
            issue_date: Some("1855-07-18".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).issue_year, 1840);

        assert_eq!(parse_year("TBA"), None);
        assert_eq!(parse_year("Reprint 2001 of 1855"), Some(2001));
        assert_eq!(parse_year("Plate 12345, 1702 or 1859"), Some(1859));
        assert_eq!(parse_year("1855-13-45"), Some(1855));
    }

    #[test]
    fn test_normalize_with_custom_placeholder() {
        let stamp = normalize_with(&RawRecord::default(), "/static/no-image.svg");
        assert_eq!(stamp.image_url, "/static/no-image.svg");
        assert_eq!(stamp.thumbnail_url, "/static/no-image.svg");

        let raw = RawRecord {
            stamp_image_url: Some("https://img.example/a.png".to_string()),
            ..Default::default()
        };
        let stamps = normalize_all_with(&[raw, RawRecord::default()], "/static/no-image.svg");
        assert_eq!(stamps[0].image_url, "https://img.example/a.png");
        assert_eq!(stamps[1].image_url, "/static/no-image.svg");
    }

    #[test]
    fn test_parent_marks_instance() {
        let raw = RawRecord {
            id: Some("v1".to_string()),
            parent_stamp_id: Some("s1".to_string()),
            ..Default::default()
        };
        let stamp = normalize(&raw);
        assert!(stamp.is_instance);
        assert_eq!(stamp.parent_stamp_id, "s1");
    }

    #[test]
    fn test_synthesized_raw_renormalizes_to_same_stamp() {
        let raw = RawRecord {
            id: Some("nz-1855-1d".to_string()),
            name: Some("Chalon Head 1d".to_string()),
            country_code: Some("NZ".to_string()),
            series_name: Some("Full Face Queens".to_string()),
            issue_year: Some(1855),
            denomination_value: Some(1.0),
            denomination_symbol: Some("d".to_string()),
            stamp_image_url: Some("https://img.example/nz1.png".to_string()),
            ..Default::default()
        };
        let stamp = normalize(&raw);
        let synthesized = synthesize_raw(&stamp);
        assert_eq!(synthesized.back_image_url.as_deref(), Some(""));
        assert_eq!(synthesized.is_specimen, Some(false));
        assert_eq!(normalize(&synthesized), stamp);
    }
}
