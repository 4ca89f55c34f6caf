//! Typed property values stored on features.

use std::fmt;

use thiserror::Error;

use crate::property::{PropertyDefn, PropertyKind};

/// One cell of a feature row.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Empty token.
    Null,
    /// Parsed integer.
    Integer(i64),
    /// Parsed real number.
    Real(f64),
    /// Text, including big integers kept verbatim.
    String(String),
}

/// Raised when a numeric token does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("value {token:?} is not valid for column {column}")]
pub struct ValueParseError {
    /// Column the token belongs to.
    pub column: String,
    /// Offending token.
    pub token: String,
}

impl PropertyValue {
    /// Parse a raw token according to the column definition.
    ///
    /// Empty tokens become [`PropertyValue::Null`].
    pub fn parse(defn: &PropertyDefn, token: &str) -> Result<Self, ValueParseError> {
        if token.is_empty() {
            return Ok(Self::Null);
        }
        let invalid = || ValueParseError {
            column: defn.name().to_owned(),
            token: token.to_owned(),
        };
        match defn.kind() {
            PropertyKind::Integer => token.trim().parse().map(Self::Integer).map_err(|_| invalid()),
            PropertyKind::Real => token.trim().parse().map(Self::Real).map_err(|_| invalid()),
            PropertyKind::String => Ok(Self::String(token.to_owned())),
        }
    }

    /// Whether the value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer view; strings holding decimal digits also convert.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::String(text) => text.trim().parse().ok(),
            Self::Null | Self::Real(_) => None,
        }
    }

    /// Floating-point view of numeric values.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            Self::String(text) => text.trim().parse().ok(),
            Self::Null => None,
        }
    }

    /// Text view of string values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Normalise the value to the shape a column of `defn` would hold.
    ///
    /// Filters use this so `ID = 5` matches a big-integer column storing
    /// the text `"5"`.
    #[must_use]
    pub fn coerce(&self, defn: &PropertyDefn) -> Self {
        match (defn.kind(), self) {
            (_, Self::Null) => Self::Null,
            (PropertyKind::String, Self::Integer(value)) => Self::String(value.to_string()),
            (PropertyKind::String, Self::Real(value)) => Self::String(value.to_string()),
            (PropertyKind::Integer, Self::String(text)) => {
                text.trim().parse().map_or_else(|_| self.clone(), Self::Integer)
            }
            (PropertyKind::Real, Self::String(text)) => {
                text.trim().parse().map_or_else(|_| self.clone(), Self::Real)
            }
            (PropertyKind::Real, Self::Integer(value)) => Self::Real(*value as f64),
            _ => self.clone(),
        }
    }

    /// Hashable key used by equality indexes; `None` for nulls.
    #[must_use]
    pub fn join_key(&self) -> Option<JoinKey> {
        match self {
            Self::Null => None,
            Self::Integer(value) => Some(JoinKey::Integer(*value)),
            Self::Real(value) => Some(JoinKey::Real(normalised_bits(*value))),
            Self::String(text) => Some(JoinKey::String(text.clone())),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::String(text) => f.write_str(text),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

/// Equality key for hash indexes over property values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinKey {
    /// Integer column value.
    Integer(i64),
    /// Bit pattern of a real column value.
    Real(u64),
    /// Text column value.
    String(String),
}

fn normalised_bits(value: f64) -> u64 {
    if value == 0.0 { 0.0_f64.to_bits() } else { value.to_bits() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn defn(declaration: &str) -> PropertyDefn {
        PropertyDefn::parse(declaration).expect("valid declaration")
    }

    #[rstest]
    #[case("PORADOVE_CISLO_BODU N9", "3", PropertyValue::Integer(3))]
    #[case("SOURADNICE_X N10.2", "1045678.25", PropertyValue::Real(1_045_678.25))]
    #[case("ID N30", "1234567890123456789012", PropertyValue::String("1234567890123456789012".into()))]
    #[case("TEXT T20", "a;b", PropertyValue::String("a;b".into()))]
    #[case("PORADOVE_CISLO_BODU N9", "", PropertyValue::Null)]
    fn parses_tokens(#[case] declaration: &str, #[case] token: &str, #[case] expected: PropertyValue) {
        assert_eq!(PropertyValue::parse(&defn(declaration), token), Ok(expected));
    }

    #[rstest]
    #[case("PORADOVE_CISLO_BODU N9", "1.5")]
    #[case("SOURADNICE_X N10.2", "abc")]
    fn rejects_bad_numbers(#[case] declaration: &str, #[case] token: &str) {
        let error = PropertyValue::parse(&defn(declaration), token).expect_err("must fail");
        assert_eq!(error.token, token);
    }

    #[rstest]
    fn coerces_integers_to_big_integer_text() {
        let coerced = PropertyValue::Integer(42).coerce(&defn("ID N30"));
        assert_eq!(coerced, PropertyValue::String("42".into()));
        assert_eq!(coerced.join_key(), Some(JoinKey::String("42".into())));
    }

    #[rstest]
    fn negative_zero_shares_a_join_key_with_zero() {
        assert_eq!(
            PropertyValue::Real(-0.0).join_key(),
            PropertyValue::Real(0.0).join_key()
        );
    }
}
