use crate::point::{FieldValue, Point, WritePrecision};
use std::io::{Result, Write};

mod escape;

/// Writes `point` as one line of line protocol, terminated by `\n`:
///
/// `measurement[,tag=value...] field=value[,field=value...] timestamp`
pub fn encode_point<W: Write>(
    writable: &mut W,
    point: &Point,
    precision: WritePrecision,
) -> Result<()> {
    escape::write_measurement(writable, point.measurement())?;
    for (key, value) in point.tags() {
        writable.write_all(b",")?;
        escape::write_key(writable, key)?;
        writable.write_all(b"=")?;
        escape::write_key(writable, value)?;
    }

    let mut separator = b" ";
    for (key, value) in point.fields() {
        writable.write_all(separator)?;
        separator = b",";
        escape::write_key(writable, key)?;
        writable.write_all(b"=")?;
        encode_field_value(writable, value)?;
    }

    writeln!(writable, " {}", precision.epoch(point.timestamp_nanos()))
}

pub fn encode_field_value<W: Write>(writable: &mut W, value: &FieldValue) -> Result<()> {
    match value {
        // Debug keeps a trailing ".0" on whole numbers, so 45.0 stays a float
        // on the store side instead of reading like an integer literal.
        FieldValue::Float(v) => write!(writable, "{:?}", v),
        FieldValue::Integer(v) => write!(writable, "{}i", v),
        FieldValue::UInteger(v) => write!(writable, "{}u", v),
        FieldValue::Boolean(v) => write!(writable, "{}", v),
        FieldValue::String(v) => escape::write_string_value(writable, v),
    }
}

pub fn to_line(point: &Point, precision: WritePrecision) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail and every escaped piece is valid UTF-8.
    match encode_point(&mut buf, point, precision) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => String::new(),
    }
}
