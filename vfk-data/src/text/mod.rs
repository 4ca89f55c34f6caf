//! Decoding and tokenising VFK text.

mod encoding;
mod record;
mod tokenize;

pub use encoding::SourceEncoding;
pub use record::{LogicalLines, Record, RecordError, SourceLine, parse_record};
pub use tokenize::split_fields;
