// src/extraction/reader.rs
use exif::{In, Tag, Value};
use log::debug;
use std::io::Cursor;

use super::gps::{GpsTagValue, GpsTags};

/// Reads the location tag dictionary out of raw image bytes.
///
/// A file the EXIF reader cannot parse, or one with no GPS IFD, yields an
/// empty `GpsTags` rather than an error; the extractor turns that into the
/// expected "no GPS" outcome downstream.
pub fn read_gps_tags(bytes: &[u8]) -> GpsTags {
    let mut cursor = Cursor::new(bytes);
    let exif_data = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(data) => data,
        Err(e) => {
            debug!("No readable EXIF container: {}", e);
            return GpsTags::default();
        }
    };

    GpsTags {
        latitude: tag_value(&exif_data, Tag::GPSLatitude),
        latitude_ref: ref_string(&exif_data, Tag::GPSLatitudeRef),
        longitude: tag_value(&exif_data, Tag::GPSLongitude),
        longitude_ref: ref_string(&exif_data, Tag::GPSLongitudeRef),
        altitude: tag_value(&exif_data, Tag::GPSAltitude),
        altitude_ref: byte_value(&exif_data, Tag::GPSAltitudeRef),
    }
}

fn tag_value(exif_data: &exif::Exif, tag: Tag) -> Option<GpsTagValue> {
    let field = exif_data.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Rational(rats) => Some(GpsTagValue::Rationals(
            rats.iter().map(|r| (r.num, r.denom)).collect(),
        )),
        Value::Ascii(vecs) => vecs
            .first()
            .and_then(|v| std::str::from_utf8(v).ok())
            .map(|s| GpsTagValue::Text(s.trim().to_string())),
        other => {
            debug!("Unsupported value shape for {}: {:?}", tag, other);
            None
        }
    }
}

fn ref_string(exif_data: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif_data.get_field(tag, In::PRIMARY)?;
    let rendered = field.value.display_as(tag).to_string();
    let trimmed = rendered.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn byte_value(exif_data: &exif::Exif, tag: Tag) -> Option<u8> {
    let field = exif_data.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Byte(bytes) => bytes.first().copied(),
        other => other.get_uint(0).map(|v| v as u8),
    }
}
