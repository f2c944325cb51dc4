//! Rounds numeric tokens to a configured precision.

use crate::dom::Document;
use crate::errors::Diagnostics;
use crate::types::Precision;

use super::Pass;

/// Attributes whose values are identity, not geometry. Ids in particular
/// may end in digits, and data URLs hide digit runs everywhere.
const SKIP_ATTRS: [&str; 4] = ["id", "class", "href", "xlink:href"];

/// Rewrites every numeric token in every attribute value, leaving
/// identifiers, `#…` literals and unit suffixes untouched.
pub struct RoundNumbers {
    precision: Precision,
}

impl RoundNumbers {
    pub fn new(precision: Precision) -> RoundNumbers {
        RoundNumbers { precision }
    }
}

impl Pass for RoundNumbers {
    fn name(&self) -> &'static str {
        "round-numbers"
    }

    fn run(&self, doc: &mut Document, _diagnostics: &mut Diagnostics) {
        for node in doc.descendants(doc.root()) {
            if !doc.is_element(node) {
                continue;
            }
            for name in doc.attr_names(node) {
                if SKIP_ATTRS.contains(&name.as_str()) {
                    continue;
                }
                let Some(value) = doc.attr(node, &name) else {
                    continue;
                };
                let rounded = round_value(value, self.precision);
                if rounded != *value {
                    doc.set_attr(node, &name, &rounded);
                }
            }
        }
    }
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' || byte == b'.'
}

/// Scan `value`, rewriting each numeric token in place.
fn round_value(value: &str, precision: Precision) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len());
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'#' {
            // hex color or id fragment: opaque until the next delimiter
            let start = i;
            i += 1;
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            out.push_str(&value[start..i]);
        } else if byte.is_ascii_alphabetic() || byte == b'_' {
            // identifier: keyword, property name, function name
            let start = i;
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            out.push_str(&value[start..i]);
        } else if starts_number(bytes, i) {
            let (number_end, unit_end) = scan_number(bytes, i);
            match value[i..number_end].parse::<f64>() {
                Ok(number) => out.push_str(&round_number(number, precision)),
                // keep the raw text if it somehow fails to parse
                Err(_) => out.push_str(&value[i..number_end]),
            }
            out.push_str(&value[number_end..unit_end]);
            i = unit_end;
        } else {
            // delimiters, including multi-byte characters, pass through
            let c = value[i..].chars().next().unwrap_or('\u{FFFD}');
            out.push(c);
            i += c.len_utf8();
        }
    }
    out
}

fn starts_number(bytes: &[u8], i: usize) -> bool {
    match bytes[i] {
        b'0'..=b'9' => true,
        b'.' => bytes.get(i + 1).is_some_and(u8::is_ascii_digit),
        b'+' | b'-' => match bytes.get(i + 1) {
            Some(b'0'..=b'9') => true,
            Some(b'.') => bytes.get(i + 2).is_some_and(u8::is_ascii_digit),
            _ => false,
        },
        _ => false,
    }
}

/// End of the number text and of its unit suffix. `1e5` is an exponent;
/// `1em` is a number with a unit.
fn scan_number(bytes: &[u8], start: usize) -> (usize, usize) {
    let mut i = start;
    if matches!(bytes[i], b'+' | b'-') {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    let number_end = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'%') {
        i += 1;
    }
    (number_end, i)
}

/// Round one value. Positive precision keeps that many decimal places and
/// trims trailing zeros; zero or negative rounds to the 10^(-n) place and
/// emits no decimal point.
fn round_number(value: f64, precision: Precision) -> String {
    let digits = precision.digits();
    let text = if digits > 0 {
        let text = format!("{:.*}", digits as usize, value);
        if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            text
        }
    } else {
        let scale = 10f64.powi(-digits);
        format!("{:.0}", (value / scale).round() * scale)
    };
    if text == "-0" { "0".to_string() } else { text }
}
