//! Line protocol encoding.

use std::fmt::Write as _;

use migrate_core::OutputPoint;

use crate::config::Precision;

/// Append one point as a line (without trailing newline).
pub fn encode_line(point: &OutputPoint, precision: Precision, out: &mut String) {
    escape_into(&point.measurement, &[',', ' '], out);
    for tag in point.tags.iter() {
        out.push(',');
        escape_into(&tag.key, &[',', '=', ' '], out);
        out.push('=');
        escape_into(&tag.value, &[',', '=', ' '], out);
    }
    out.push(' ');
    escape_into(&point.field.key, &[',', '=', ' '], out);
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "={} {}",
        point.field.value,
        precision.scale(point.timestamp)
    );
}

/// Encode a batch, one line per point.
pub fn encode_batch(points: &[OutputPoint], precision: Precision) -> String {
    let mut body = String::with_capacity(points.len() * 64);
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            body.push('\n');
        }
        encode_line(point, precision, &mut body);
    }
    body
}

fn escape_into(raw: &str, special: &[char], out: &mut String) {
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
