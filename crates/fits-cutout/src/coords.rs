//! Request-parameter parsing: coordinate pairs with optional trailing units,
//! and boolean flags.

use crate::error::{Error, Result};

/// Units a coordinate pair can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    /// Image pixels.
    Pix,
    /// Arcseconds.
    Arcsec,
    /// Arcminutes.
    Arcmin,
    /// Degrees.
    Deg,
    /// Radians.
    Rad,
}

/// A coordinate pair and the units it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coords {
    /// The two components: `(ra, dec)` for sky positions, `(x, y)` for pixel
    /// positions, `(width, height)` for sizes.
    pub c: [f64; 2],
    /// Units of both components.
    pub units: Units,
}

impl Coords {
    /// A coordinate pair with explicit units.
    pub fn new(x: f64, y: f64, units: Units) -> Coords {
        Coords { c: [x, y], units }
    }
}

impl core::fmt::Display for Units {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Units::Pix => "pix",
            Units::Arcsec => "arcsec",
            Units::Arcmin => "arcmin",
            Units::Deg => "deg",
            Units::Rad => "rad",
        })
    }
}

impl core::fmt::Display for Coords {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{},{} {}", self.c[0], self.c[1], self.units)
    }
}

fn pair_error(key: &str, require_pair: bool) -> Error {
    Error::bad_request(format!(
        "Value of {key} parameter must consist of {} comma separated floating \
         point numbers, followed by an optional units specification.",
        if require_pair { "2" } else { "1 or 2" }
    ))
}

/// Parse a parameter of the form `"<a>[,<b>][ unit]"`.
///
/// With `require_pair`, a comma is mandatory; otherwise a single number is
/// duplicated into both components. Numbers are read as the longest valid
/// floating-point prefix (strtod semantics); only whitespace may separate a
/// number from the comma or from the trailing unit token. `key` names the
/// parameter in diagnostics.
pub fn parse_coords(
    key: &str,
    value: &str,
    default_units: Units,
    require_pair: bool,
) -> Result<Coords> {
    let comma = value.find(',');
    if comma.is_none() && require_pair {
        return Err(pair_error(key, require_pair));
    }

    let (first, mut pos) =
        parse_float_prefix(value, 0).ok_or_else(|| pair_error(key, require_pair))?;
    let mut c = [first, first];

    if let Some(comma) = comma {
        pos = skip_spaces(value, pos);
        if pos != comma {
            return Err(pair_error(key, require_pair));
        }
        let (second, after) =
            parse_float_prefix(value, comma + 1).ok_or_else(|| pair_error(key, require_pair))?;
        c[1] = second;
        pos = after;
    }

    pos = skip_spaces(value, pos);
    let units = if pos == value.len() {
        default_units
    } else {
        parse_units(value[pos..].trim_end()).ok_or_else(|| {
            Error::bad_request(format!(
                "Value of {key} parameter has invalid trailing unit specification"
            ))
        })?
    };

    Ok(Coords { c, units })
}

/// Parse a boolean request flag (the `gzip` parameter).
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "t" | "on" | "true" | "yes" => Ok(true),
        "0" | "n" | "f" | "off" | "false" | "no" => Ok(false),
        _ => Err(Error::bad_request(format!("invalid parameter: {key}"))),
    }
}

fn skip_spaces(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Read the longest valid floating-point prefix starting at `start`, after
/// optional leading whitespace. Returns the value and the index one past the
/// consumed text, or `None` if no number is present.
fn parse_float_prefix(s: &str, start: usize) -> Option<(f64, usize)> {
    let bytes = s.as_bytes();
    let begin = skip_spaces(s, start);
    let mut i = begin;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_digits = eat_digits(bytes, &mut i);
    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        frac_digits = eat_digits(bytes, &mut i);
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    // An exponent only counts if at least one digit follows it.
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if eat_digits(bytes, &mut j) > 0 {
            i = j;
        }
    }

    s[begin..i].parse::<f64>().ok().map(|v| (v, i))
}

fn eat_digits(bytes: &[u8], i: &mut usize) -> usize {
    let start = *i;
    while *i < bytes.len() && bytes[*i].is_ascii_digit() {
        *i += 1;
    }
    *i - start
}

/// Match a trailing unit token. The token language mirrors the original
/// service's anchored regular expressions; trailing whitespace has already
/// been trimmed by the caller.
fn parse_units(token: &str) -> Option<Units> {
    match token {
        "p" | "px" | "pix" | "pixel" | "pixels" => Some(Units::Pix),
        "\"" | "asec" | "a-sec" | "arcsec" | "arc-sec" | "asecond" | "aseconds" | "a-second"
        | "a-seconds" | "arcsecond" | "arcseconds" | "arc-second" | "arc-seconds" => {
            Some(Units::Arcsec)
        }
        "'" | "amin" | "a-min" | "arcmin" | "arc-min" | "aminute" | "aminutes" | "a-minute"
        | "a-minutes" | "arcminute" | "arcminutes" | "arc-minute" | "arc-minutes" => {
            Some(Units::Arcmin)
        }
        "d" | "deg" | "degree" | "degrees" => Some(Units::Deg),
        "rad" | "radian" | "radians" => Some(Units::Rad),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn pair_with_default_units() {
        let c = parse_coords("center", "10.5,20.25", Units::Deg, true).unwrap();
        assert_eq!(c.c, [10.5, 20.25]);
        assert_eq!(c.units, Units::Deg);
    }

    #[test]
    fn pair_with_trailing_unit() {
        let c = parse_coords("size", "30,45 arcsec", Units::Deg, false).unwrap();
        assert_eq!(c.c, [30.0, 45.0]);
        assert_eq!(c.units, Units::Arcsec);
    }

    #[test]
    fn single_value_duplicates() {
        let c = parse_coords("size", "50 pix", Units::Deg, false).unwrap();
        assert_eq!(c.c, [50.0, 50.0]);
        assert_eq!(c.units, Units::Pix);
    }

    #[test]
    fn missing_comma_when_pair_required() {
        let e = parse_coords("center", "10", Units::Deg, true).unwrap_err();
        assert_eq!(e.class, ErrorClass::BadRequest);
        assert!(e.message.contains("center"));
        assert!(e.message.contains('2'));
    }

    #[test]
    fn garbage_before_comma() {
        assert!(parse_coords("center", "10x,20", Units::Deg, true).is_err());
    }

    #[test]
    fn empty_second_component() {
        assert!(parse_coords("center", "10,", Units::Deg, true).is_err());
    }

    #[test]
    fn unknown_unit_rejected() {
        let e = parse_coords("size", "1,1 parsecs", Units::Deg, true).unwrap_err();
        assert_eq!(e.class, ErrorClass::BadRequest);
        assert!(e.message.contains("unit"));
    }

    #[test]
    fn whitespace_around_numbers() {
        let c = parse_coords("center", "  10 , 20  deg ", Units::Rad, true).unwrap();
        assert_eq!(c.c, [10.0, 20.0]);
        assert_eq!(c.units, Units::Deg);
    }

    #[test]
    fn negative_and_exponent_forms() {
        let c = parse_coords("center", "-1.5e1,+2.5E-1", Units::Deg, true).unwrap();
        assert_eq!(c.c, [-15.0, 0.25]);
    }

    #[test]
    fn exponent_without_digits_is_trailing_text() {
        // "1e" parses as 1 followed by a trailing token "e", which is not a
        // valid unit.
        assert!(parse_coords("size", "1e", Units::Deg, false).is_err());
    }

    #[test]
    fn all_unit_tokens() {
        let cases: &[(&str, Units)] = &[
            ("p", Units::Pix),
            ("px", Units::Pix),
            ("pix", Units::Pix),
            ("pixel", Units::Pix),
            ("pixels", Units::Pix),
            ("\"", Units::Arcsec),
            ("asec", Units::Arcsec),
            ("arcsec", Units::Arcsec),
            ("arc-sec", Units::Arcsec),
            ("arcsecond", Units::Arcsec),
            ("arcseconds", Units::Arcsec),
            ("a-seconds", Units::Arcsec),
            ("'", Units::Arcmin),
            ("amin", Units::Arcmin),
            ("arcmin", Units::Arcmin),
            ("arc-min", Units::Arcmin),
            ("arcminutes", Units::Arcmin),
            ("d", Units::Deg),
            ("deg", Units::Deg),
            ("degree", Units::Deg),
            ("degrees", Units::Deg),
            ("rad", Units::Rad),
            ("radian", Units::Rad),
            ("radians", Units::Rad),
        ];
        for (token, expected) in cases {
            let c = parse_coords("size", &format!("1 {token}"), Units::Deg, false).unwrap();
            assert_eq!(c.units, *expected, "token {token:?}");
        }
    }

    #[test]
    fn case_sensitive_units() {
        assert!(parse_coords("size", "1 DEG", Units::Deg, false).is_err());
        assert!(parse_coords("size", "1 Pixels", Units::Deg, false).is_err());
    }

    #[test]
    fn parse_bool_accepted_forms() {
        for v in ["1", "y", "T", "ON", "true", "Yes"] {
            assert!(parse_bool("gzip", v).unwrap(), "{v}");
        }
        for v in ["0", "N", "f", "off", "FALSE", "no"] {
            assert!(!parse_bool("gzip", v).unwrap(), "{v}");
        }
    }

    #[test]
    fn display_parse_round_trip() {
        for units in [Units::Pix, Units::Arcsec, Units::Arcmin, Units::Deg, Units::Rad] {
            let coords = Coords::new(-12.625, 0.03125, units);
            let back = parse_coords("center", &coords.to_string(), Units::Deg, true).unwrap();
            assert_eq!(back, coords);
        }
    }

    #[test]
    fn parse_bool_rejects_garbage() {
        let e = parse_bool("gzip", "maybe").unwrap_err();
        assert_eq!(e.class, ErrorClass::BadRequest);
        assert_eq!(e.message, "invalid parameter: gzip");
    }
}
