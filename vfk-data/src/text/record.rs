//! Logical records of a VFK source.
//!
//! Physical lines are CRLF-terminated (bare LF is accepted). A line ending
//! in `¤` continues on the next one. Every logical line starts with `&` and
//! a one-letter record type.

use thiserror::Error;
use vfk_core::{PropertyDefnError, ValueParseError};

use super::encoding::SourceEncoding;
use super::tokenize::split_fields;

const CONTINUATION: char = '¤';

/// One parsed logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record<'a> {
    /// `&H<key>;<value>` metadata.
    Header {
        /// Header key, e.g. `CODEPAGE`.
        key: &'a str,
        /// Remaining fields joined by `;`, quotes stripped.
        value: String,
    },
    /// `&B<name>;<decl>;...` block declaration.
    Block {
        /// Declared block name.
        name: &'a str,
        /// Column declarations such as `ID N30`.
        columns: Vec<&'a str>,
    },
    /// `&D<name>;<v1>;...` data row.
    Data {
        /// Target block name.
        name: &'a str,
        /// Raw value tokens.
        tokens: Vec<&'a str>,
    },
    /// `&K`, end of input.
    End,
}

/// Problems that cause a record to be skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The line does not start with a known record marker.
    #[error("unknown record type {prefix:?}")]
    UnknownPrefix {
        /// First characters of the line.
        prefix: String,
    },
    /// A header, block or data record without a name.
    #[error("{record} record has no name")]
    MissingName {
        /// Record marker, e.g. `&B`.
        record: &'static str,
    },
    /// A block was declared twice.
    #[error("block {block} is already declared")]
    DuplicateBlock {
        /// Block name.
        block: String,
    },
    /// A column declaration is malformed.
    #[error("block {block} has a malformed column declaration: {source}")]
    Schema {
        /// Block name.
        block: String,
        /// Parse failure.
        #[source]
        source: PropertyDefnError,
    },
    /// A data row targets a block that was never declared.
    #[error("data row targets undeclared block {block}")]
    UndeclaredBlock {
        /// Requested block name.
        block: String,
    },
    /// A data row carries the wrong number of fields.
    #[error("block {block} expects {expected} fields but the row has {found}")]
    FieldCount {
        /// Block name.
        block: String,
        /// Declared column count.
        expected: usize,
        /// Tokens on the row.
        found: usize,
    },
    /// A numeric field does not parse.
    #[error("block {block}: {source}")]
    Value {
        /// Block name.
        block: String,
        /// Parse failure.
        #[source]
        source: ValueParseError,
    },
}

impl RecordError {
    /// Whether the record referred to a block that does not exist.
    #[must_use]
    pub const fn is_reference_error(&self) -> bool {
        matches!(self, Self::UndeclaredBlock { .. })
    }
}

/// Parse one logical line.
///
/// ```
/// use vfk_data::{Record, parse_record};
///
/// let record = parse_record("&DSOBR;1;\"x;y\"").expect("valid record");
/// assert_eq!(record, Record::Data { name: "SOBR", tokens: vec!["1", "x;y"] });
/// ```
pub fn parse_record(line: &str) -> Result<Record<'_>, RecordError> {
    let unknown = || RecordError::UnknownPrefix {
        prefix: line.chars().take(2).collect(),
    };
    let body = line.strip_prefix('&').ok_or_else(unknown)?;
    let mut chars = body.chars();
    let marker = chars.next().ok_or_else(unknown)?;
    let rest = chars.as_str();
    match marker {
        'H' => {
            let mut fields = split_fields(rest).into_iter();
            let key = named(fields.next(), "&H")?;
            Ok(Record::Header {
                key,
                value: fields.collect::<Vec<_>>().join(";"),
            })
        }
        'B' => {
            let mut fields = split_fields(rest).into_iter();
            let name = named(fields.next(), "&B")?;
            Ok(Record::Block {
                name,
                columns: fields.filter(|column| !column.trim().is_empty()).collect(),
            })
        }
        'D' => {
            let mut fields = split_fields(rest).into_iter();
            let name = named(fields.next(), "&D")?;
            Ok(Record::Data {
                name,
                tokens: fields.collect(),
            })
        }
        'K' => Ok(Record::End),
        _ => Err(unknown()),
    }
}

fn named<'a>(field: Option<&'a str>, record: &'static str) -> Result<&'a str, RecordError> {
    field
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(RecordError::MissingName { record })
}

/// A logical line together with the physical line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based physical line number.
    pub number: usize,
    /// Decoded text with continuations joined.
    pub text: String,
}

/// Iterator over the logical lines of a raw source.
///
/// The encoding can change between lines once the `CODEPAGE` header has
/// been read.
#[derive(Debug)]
pub struct LogicalLines<'a> {
    bytes: &'a [u8],
    at: usize,
    line: usize,
    encoding: SourceEncoding,
}

impl<'a> LogicalLines<'a> {
    /// Iterate over `bytes` decoded as `encoding`.
    #[must_use]
    pub const fn new(bytes: &'a [u8], encoding: SourceEncoding) -> Self {
        Self {
            bytes,
            at: 0,
            line: 0,
            encoding,
        }
    }

    /// Decode the following lines with `encoding`.
    pub const fn set_encoding(&mut self, encoding: SourceEncoding) {
        self.encoding = encoding;
    }

    /// Encoding currently applied.
    #[must_use]
    pub const fn encoding(&self) -> SourceEncoding {
        self.encoding
    }

    fn physical_line(&mut self) -> Option<&'a [u8]> {
        let rest = self.bytes.get(self.at..).filter(|rest| !rest.is_empty())?;
        let (line, consumed) = match rest.iter().position(|byte| *byte == b'\n') {
            Some(end) => (rest.get(..end).unwrap_or_default(), end + 1),
            None => (rest, rest.len()),
        };
        self.at += consumed;
        self.line += 1;
        Some(line.strip_suffix(b"\r").unwrap_or(line))
    }
}

impl Iterator for LogicalLines<'_> {
    type Item = SourceLine;

    fn next(&mut self) -> Option<SourceLine> {
        let mut pending: Option<SourceLine> = None;
        while let Some(raw) = self.physical_line() {
            let text = self.encoding.decode(raw);
            if pending.is_none() && text.trim().is_empty() {
                continue;
            }
            let line = pending.get_or_insert_with(|| SourceLine {
                number: self.line,
                text: String::new(),
            });
            match text.strip_suffix(CONTINUATION) {
                Some(head) => line.text.push_str(head),
                None => {
                    line.text.push_str(&text);
                    return pending;
                }
            }
        }
        pending
    }
}
