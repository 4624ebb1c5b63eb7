//! FITS header value representation: parsing and fixed-width formatting.

use core::str;

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes).
    String(String),
}

impl Value {
    /// The value as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as a float; integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// The value as a trimmed string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The value as a logical, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

/// Locate the ` /` comment separator in a non-string value field.
///
/// Returns `(value_part, optional_comment)`. The standard calls for
/// space-slash-space, but files written by IDL and friends omit the trailing
/// space, so only ` /` is required.
fn split_comment(field: &[u8]) -> (&[u8], Option<&str>) {
    for i in 0..field.len().saturating_sub(1) {
        if field[i] == b' ' && field[i + 1] == b'/' {
            let mut start = i + 2;
            if field.get(start) == Some(&b' ') {
                start += 1;
            }
            let comment = str::from_utf8(&field[start..])
                .ok()
                .map(|s| s.trim_end())
                .filter(|s| !s.is_empty());
            return (&field[..i], comment);
        }
    }
    (field, None)
}

/// Parse a quoted string value. Doubled quotes encode a literal quote.
fn parse_string(field: &[u8]) -> Option<(Value, Option<&str>)> {
    if field.first() != Some(&b'\'') {
        return None;
    }
    let mut out = String::new();
    let mut i = 1;
    while i < field.len() {
        if field[i] == b'\'' {
            if field.get(i + 1) == Some(&b'\'') {
                out.push('\'');
                i += 2;
            } else {
                i += 1;
                break;
            }
        } else {
            out.push(field[i] as char);
            i += 1;
        }
    }
    // FITS pads string values to a minimum width with trailing spaces.
    let trimmed = out.trim_end().to_string();
    let (_, comment) = split_comment(&field[i..]);
    Some((Value::String(trimmed), comment))
}

/// Parse a float, accepting the FITS `D` exponent marker.
fn parse_float_str(s: &str) -> Option<f64> {
    let normalized = s.replace(['D', 'd'], "E");
    normalized.parse::<f64>().ok()
}

/// Parse the 70-byte value field of a card (bytes 10..80).
///
/// The caller must already have checked that bytes 8..10 of the card hold the
/// `= ` value indicator.
pub fn parse_value(field: &[u8]) -> Option<(Value, Option<&str>)> {
    if field.is_empty() {
        return None;
    }
    if field[0] == b'\'' {
        return parse_string(field);
    }

    let (val_part, comment) = split_comment(field);
    let text = str::from_utf8(val_part).ok()?.trim();
    if text.is_empty() {
        return None;
    }

    match text {
        "T" => return Some((Value::Logical(true), comment)),
        "F" => return Some((Value::Logical(false), comment)),
        _ => {}
    }

    if !text.contains(['.', 'E', 'e', 'D', 'd']) {
        if let Ok(n) = text.parse::<i64>() {
            return Some((Value::Integer(n), comment));
        }
    }

    parse_float_str(text).map(|f| (Value::Float(f), comment))
}

/// Serialize a [`Value`] into the 70-byte value field of a card.
///
/// Numeric and logical values are right-justified in the first 20 bytes
/// (columns 11-30 of the card); strings start at byte 0.
pub fn format_value(value: &Value) -> [u8; 70] {
    let mut buf = [b' '; 70];
    match value {
        Value::Logical(b) => {
            buf[19] = if *b { b'T' } else { b'F' };
        }
        Value::Integer(n) => {
            right_justify(format!("{n}").as_bytes(), &mut buf[..20]);
        }
        Value::Float(f) => {
            right_justify(format_float(*f).as_bytes(), &mut buf[..20]);
        }
        Value::String(s) => {
            write_string(s, &mut buf);
        }
    }
    buf
}

/// Format a float in E notation with up to 15 significant digits, shrinking
/// the precision until the result fits in 20 bytes.
pub fn format_float(f: f64) -> String {
    if f == 0.0 {
        return String::from("0.0");
    }
    let mut precision = 15usize;
    loop {
        let s = format!("{f:.precision$E}");
        if s.len() <= 20 || precision == 0 {
            return s;
        }
        precision -= 1;
    }
}

fn right_justify(src: &[u8], dest: &mut [u8]) {
    let len = src.len().min(dest.len());
    let start = dest.len() - len;
    dest[start..start + len].copy_from_slice(&src[..len]);
}

fn write_string(s: &str, buf: &mut [u8; 70]) {
    let mut pos = 0;
    buf[pos] = b'\'';
    pos += 1;
    for ch in s.bytes() {
        if pos >= 69 || (ch == b'\'' && pos + 1 >= 69) {
            break;
        }
        if ch == b'\'' {
            buf[pos] = b'\'';
            buf[pos + 1] = b'\'';
            pos += 2;
        } else {
            buf[pos] = ch;
            pos += 1;
        }
    }
    // Minimum 8 characters of content between the quotes.
    while pos < 9 {
        buf[pos] = b' ';
        pos += 1;
    }
    if pos < 70 {
        buf[pos] = b'\'';
    }
}
