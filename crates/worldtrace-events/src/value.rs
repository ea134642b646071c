//! Scalar values that may appear as object fields or array elements.
//!
//! Strings are escaped so that no value can break the surrounding
//! structure: quotes, backslashes, control characters, angle brackets and
//! apostrophes are all written as escape sequences.

use std::fmt::Write as _;

/// A leaf value in the emitted document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    /// A string, escaped on output.
    Str(&'a str),
    /// `true` or `false`.
    Bool(bool),
    /// The `null` literal.
    Null,
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A floating point number in shortest round-trippable decimal form.
    ///
    /// Non-finite values have no textual form and are written as `null`.
    Float(f64),
}

impl Scalar<'_> {
    /// Render this value as it appears in the document.
    pub fn encode(&self) -> String {
        match *self {
            Self::Str(s) => escape(s),
            Self::Bool(true) => String::from("true"),
            Self::Bool(false) => String::from("false"),
            Self::Null => String::from("null"),
            Self::Int(v) => v.to_string(),
            Self::UInt(v) => v.to_string(),
            Self::Float(v) if v.is_finite() => v.to_string(),
            Self::Float(_) => String::from("null"),
        }
    }
}

impl<'a> From<&'a str> for Scalar<'a> {
    fn from(value: &'a str) -> Self {
        Self::Str(value)
    }
}

impl<'a> From<&'a String> for Scalar<'a> {
    fn from(value: &'a String) -> Self {
        Self::Str(value.as_str())
    }
}

impl From<bool> for Scalar<'_> {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar<'_> {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Scalar<'_> {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for Scalar<'_> {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<u32> for Scalar<'_> {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<f64> for Scalar<'_> {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<'a, T: Into<Scalar<'a>>> From<Option<T>> for Scalar<'a> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Quote and escape a string.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().saturating_add(2));
    out.push('"');
    for c in raw.chars() {
        match c {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{08}' => out.push_str("\\b"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '\'' => out.push_str("\\u0027"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => {
                // Writing into a String cannot fail.
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_strings_are_quoted() {
        assert_eq!(Scalar::from("avatar").encode(), "\"avatar\"");
    }

    #[test]
    fn structural_characters_are_escaped() {
        let encoded = escape("a \"b\" \\ <c> it's\n\t\r");
        assert_eq!(
            encoded,
            "\"a \\\"b\\\" \\\\ \\u003cc\\u003e it\\u0027s\\n\\t\\r\""
        );
        let parsed: String = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed, "a \"b\" \\ <c> it's\n\t\r");
    }

    #[test]
    fn other_control_characters_use_unicode_escapes() {
        let encoded = escape("x\u{01}y\u{7f}");
        assert_eq!(encoded, "\"x\\u0001y\\u007f\"");
        let parsed: String = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed, "x\u{01}y\u{7f}");
    }

    #[test]
    fn numbers_and_literals() {
        assert_eq!(Scalar::from(true).encode(), "true");
        assert_eq!(Scalar::Null.encode(), "null");
        assert_eq!(Scalar::from(-12_i64).encode(), "-12");
        assert_eq!(Scalar::from(7_u32).encode(), "7");
        assert_eq!(Scalar::from(0.1_f64).encode(), "0.1");
        assert_eq!(Scalar::from(f64::NAN).encode(), "null");
        assert_eq!(Scalar::from(None::<bool>).encode(), "null");
    }

    #[test]
    fn floats_round_trip() {
        let v = 1234.567_890_123_f64;
        let encoded = Scalar::from(v).encode();
        let back: f64 = encoded.parse().unwrap();
        assert!((back - v).abs() < f64::EPSILON);
    }
}
