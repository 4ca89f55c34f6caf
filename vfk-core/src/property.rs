//! Column declarations parsed from `&B` block headers.
//!
//! A declaration has the shape `<NAME> <Kind><Width>[.<Precision>]`, for
//! example `ID N30`, `SOURADNICE_Y N10.2` or `TEXT T255`.

use thiserror::Error;

/// Numeric columns at least this wide are kept as decimal text.
pub const BIG_INTEGER_WIDTH: u32 = 10;

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Machine integer.
    Integer,
    /// Floating-point number.
    Real,
    /// Text, dates, unknown kinds and big integers.
    String,
}

impl PropertyKind {
    /// SQLite column affinity used when the block is cached.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::String => "TEXT",
        }
    }
}

/// Errors raised while parsing a column declaration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PropertyDefnError {
    /// The declaration was blank.
    #[error("column declaration is empty")]
    MissingName,
    /// The declaration named a column but no type.
    #[error("column {name} has no type descriptor")]
    MissingDescriptor {
        /// Column name.
        name: String,
    },
    /// The width digits did not parse.
    #[error("column {name} has a non-numeric width in descriptor {descriptor:?}")]
    InvalidWidth {
        /// Column name.
        name: String,
        /// Raw descriptor text.
        descriptor: String,
    },
    /// The precision digits did not parse.
    #[error("column {name} has a non-numeric precision in descriptor {descriptor:?}")]
    InvalidPrecision {
        /// Column name.
        name: String,
        /// Raw descriptor text.
        descriptor: String,
    },
}

/// Immutable definition of one block column.
///
/// # Examples
///
/// ```
/// use vfk_core::{PropertyDefn, PropertyKind};
///
/// # fn main() -> Result<(), vfk_core::PropertyDefnError> {
/// let defn = PropertyDefn::parse("SOURADNICE_Y N10.2")?;
/// assert_eq!(defn.kind(), PropertyKind::Real);
/// assert_eq!(defn.precision(), 2);
///
/// let id = PropertyDefn::parse("ID N30")?;
/// assert!(id.is_big_integer());
/// assert_eq!(id.kind(), PropertyKind::String);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefn {
    name: String,
    kind: PropertyKind,
    width: u32,
    precision: u32,
    big_integer: bool,
    descriptor: String,
}

impl PropertyDefn {
    /// Parse a whole `NAME Descriptor` declaration.
    pub fn parse(declaration: &str) -> Result<Self, PropertyDefnError> {
        let mut parts = declaration.split_whitespace();
        let name = parts.next().ok_or(PropertyDefnError::MissingName)?;
        let descriptor = parts
            .next()
            .ok_or_else(|| PropertyDefnError::MissingDescriptor {
                name: name.to_owned(),
            })?;
        Self::new(name, descriptor)
    }

    /// Build a definition from a column name and its type descriptor.
    pub fn new(name: &str, descriptor: &str) -> Result<Self, PropertyDefnError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PropertyDefnError::MissingName);
        }
        let descriptor = descriptor.trim();
        let mut chars = descriptor.chars();
        let Some(code) = chars.next() else {
            return Err(PropertyDefnError::MissingDescriptor {
                name: name.to_owned(),
            });
        };
        let rest = chars.as_str();
        let (width_text, precision_text) = match rest.split_once('.') {
            Some((width, precision)) => (width, Some(precision)),
            None => (rest, None),
        };

        let width = parse_digits(width_text).ok_or_else(|| PropertyDefnError::InvalidWidth {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        })?;
        let precision = match precision_text {
            Some(text) => Some(parse_digits(text).ok_or_else(|| {
                PropertyDefnError::InvalidPrecision {
                    name: name.to_owned(),
                    descriptor: descriptor.to_owned(),
                }
            })?),
            None => None,
        };

        let (kind, big_integer) = match (code.to_ascii_uppercase(), precision) {
            ('N', Some(_)) => (PropertyKind::Real, false),
            ('N', None) if width < BIG_INTEGER_WIDTH => (PropertyKind::Integer, false),
            ('N', None) => (PropertyKind::String, true),
            _ => (PropertyKind::String, false),
        };

        Ok(Self {
            name: name.to_owned(),
            kind,
            width,
            precision: precision.unwrap_or(0),
            big_integer,
            descriptor: descriptor.to_owned(),
        })
    }

    /// Column name as declared.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic type.
    #[must_use]
    pub const fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Declared width, zero when absent.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Declared number of decimal places.
    #[must_use]
    pub const fn precision(&self) -> u32 {
        self.precision
    }

    /// Whether the column holds integers too wide for a machine word.
    #[must_use]
    pub const fn is_big_integer(&self) -> bool {
        self.big_integer
    }

    /// Raw descriptor, e.g. `N10.2`.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Declaration text suitable for [`PropertyDefn::parse`].
    #[must_use]
    pub fn declaration(&self) -> String {
        format!("{} {}", self.name, self.descriptor)
    }
}

/// Missing width is zero; anything non-numeric is rejected.
fn parse_digits(text: &str) -> Option<u32> {
    if text.is_empty() {
        return Some(0);
    }
    if !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
