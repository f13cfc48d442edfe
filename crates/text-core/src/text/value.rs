//! Generic header value primitives
//!
//! The toolkit interprets header values only as strings, sizes, booleans and
//! floats. Anything richer belongs to the protocol's header namespace.

use std::str;

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{digit1, space0},
    combinator::{all_consuming, map_res, value},
    number::complete::recognize_float,
    sequence::delimited,
    IResult,
};

/// Type alias for value parser results
pub type ParseResult<'a, O> = IResult<&'a [u8], O>;

/// Decimal size value (`1*DIGIT`)
pub fn size_value(input: &[u8]) -> ParseResult<usize> {
    map_res(map_res(digit1, str::from_utf8), |s: &str| s.parse::<usize>())(input)
}

/// Boolean value (`true` / `false`, any casing)
pub fn bool_value(input: &[u8]) -> ParseResult<bool> {
    alt((value(true, tag_no_case("true")), value(false, tag_no_case("false"))))(input)
}

/// Float value
pub fn float_value(input: &[u8]) -> ParseResult<f64> {
    map_res(map_res(recognize_float, str::from_utf8), |s: &str| s.parse::<f64>())(input)
}

fn trimmed<'a, O>(
    parser: impl FnMut(&'a [u8]) -> ParseResult<'a, O>,
    input: &'a [u8],
) -> Option<O> {
    all_consuming(delimited(space0, parser, space0))(input)
        .ok()
        .map(|(_, out)| out)
}

/// Parses a size, tolerating surrounding spaces
pub fn parse_size(input: &[u8]) -> Option<usize> {
    trimmed(size_value, input)
}

/// Parses a boolean, tolerating surrounding spaces
pub fn parse_bool(input: &[u8]) -> Option<bool> {
    trimmed(bool_value, input)
}

/// Parses a float, tolerating surrounding spaces
pub fn parse_float(input: &[u8]) -> Option<f64> {
    trimmed(float_value, input)
}

/// Parses a UTF-8 string value with surrounding spaces removed
pub fn parse_string(input: &[u8]) -> Option<&str> {
    str::from_utf8(input)
        .ok()
        .map(|s| s.trim_matches(|c| c == ' ' || c == '\t'))
}

/// Number of decimal digits in `value`
pub fn count_digits(value: usize) -> usize {
    let mut digits = 1;
    let mut rest = value / 10;
    while rest > 0 {
        digits += 1;
        rest /= 10;
    }
    digits
}

/// Formats a float with six decimals, then drops trailing zeros (keeping one
/// digit after the point)
pub fn format_float(value: f64) -> String {
    let mut text = format!("{:.6}", value);
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.push('0');
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size(b"42"), Some(42));
        assert_eq!(parse_size(b"  1024 "), Some(1024));
        assert_eq!(parse_size(b"0"), Some(0));
        assert_eq!(parse_size(b""), None);
        assert_eq!(parse_size(b"12a"), None);
        assert_eq!(parse_size(b"-1"), None);
        assert_eq!(parse_size(b"99999999999999999999999999"), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(b"true"), Some(true));
        assert_eq!(parse_bool(b" FALSE"), Some(false));
        assert_eq!(parse_bool(b"True "), Some(true));
        assert_eq!(parse_bool(b"yes"), None);
        assert_eq!(parse_bool(b"truely"), None);
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float(b"0.5"), Some(0.5));
        assert_eq!(parse_float(b" 1 "), Some(1.0));
        assert_eq!(parse_float(b"-2.25"), Some(-2.25));
        assert_eq!(parse_float(b"abc"), None);
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(parse_string(b"  en-US  "), Some("en-US"));
        assert_eq!(parse_string(b""), Some(""));
        assert_eq!(parse_string(&[0xff, 0xfe]), None);
    }

    #[test]
    fn test_count_digits() {
        assert_eq!(count_digits(0), 1);
        assert_eq!(count_digits(9), 1);
        assert_eq!(count_digits(10), 2);
        assert_eq!(count_digits(12345), 5);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.125), "0.125");
        assert_eq!(format_float(-3.75), "-3.75");
    }
}
