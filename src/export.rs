//! CSV export of terminal query results

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::types::{NormalizedStamp, StampWithInstances};

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: &'a str,
    parent_id: &'a str,
    name: &'a str,
    country: &'a str,
    year: i32,
    denomination: &'a str,
    series: &'a str,
    item_type: &'a str,
    stamp_group: &'a str,
    perforation: &'a str,
    watermark: &'a str,
    mint_value: f64,
    used_value: f64,
    image_url: &'a str,
}

impl<'a> From<&'a NormalizedStamp> for ExportRow<'a> {
    fn from(stamp: &'a NormalizedStamp) -> Self {
        Self {
            id: &stamp.id,
            parent_id: &stamp.parent_stamp_id,
            name: &stamp.name,
            country: &stamp.country_code,
            year: stamp.issue_year,
            denomination: &stamp.denomination,
            series: &stamp.series_name,
            item_type: &stamp.item_type_name,
            stamp_group: &stamp.stamp_group_name,
            perforation: &stamp.perforation,
            watermark: &stamp.watermark,
            mint_value: stamp.mint_value,
            used_value: stamp.used_value,
            image_url: &stamp.image_url,
        }
    }
}

/// One line per stamp, each followed by its instances. Returns the number
/// of data lines written.
pub fn write_stamps_csv<W: Write>(writer: W, rows: &[StampWithInstances]) -> Result<usize> {
    let mut out = csv::Writer::from_writer(writer);
    let mut written = 0;
    for row in rows {
        out.serialize(ExportRow::from(&row.stamp))?;
        written += 1;
        for instance in &row.instances {
            out.serialize(ExportRow::from(instance))?;
            written += 1;
        }
    }
    out.flush()?;
    Ok(written)
}
