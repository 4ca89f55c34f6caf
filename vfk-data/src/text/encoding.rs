//! Source character sets.

use encoding_rs::{Encoding, ISO_8859_2, UTF_8, WINDOWS_1250};
use log::warn;

/// Character set named by the `CODEPAGE` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceEncoding {
    /// `WE8ISO8859P2`, assumed when the header is missing.
    #[default]
    Iso8859_2,
    /// `EE8MSWIN1250`.
    Windows1250,
    /// `UTF-8`.
    Utf8,
}

impl SourceEncoding {
    /// Map a `CODEPAGE` header value to an encoding.
    ///
    /// ```
    /// use vfk_data::SourceEncoding;
    ///
    /// assert_eq!(SourceEncoding::from_codepage("EE8MSWIN1250"), Some(SourceEncoding::Windows1250));
    /// assert_eq!(SourceEncoding::from_codepage("utf8"), Some(SourceEncoding::Utf8));
    /// assert_eq!(SourceEncoding::from_codepage("KOI8"), None);
    /// ```
    #[must_use]
    pub fn from_codepage(codepage: &str) -> Option<Self> {
        match codepage.trim().to_ascii_uppercase().as_str() {
            "WE8ISO8859P2" | "ISO-8859-2" => Some(Self::Iso8859_2),
            "EE8MSWIN1250" | "WINDOWS-1250" => Some(Self::Windows1250),
            "UTF-8" | "UTF8" => Some(Self::Utf8),
            _ => None,
        }
    }

    /// `encoding_rs` codec for this character set.
    #[must_use]
    pub fn encoding(self) -> &'static Encoding {
        match self {
            Self::Iso8859_2 => ISO_8859_2,
            Self::Windows1250 => WINDOWS_1250,
            Self::Utf8 => UTF_8,
        }
    }

    /// Decode one physical line, replacing malformed sequences.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        let (text, had_errors) = self.encoding().decode_without_bom_handling(bytes);
        if had_errors {
            warn!("malformed {} sequence replaced", self.encoding().name());
        }
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SourceEncoding::Windows1250, &[0x8A, 0x9E][..], "Šž")]
    #[case(SourceEncoding::Iso8859_2, &[0xA9, 0xBE][..], "Šž")]
    #[case(SourceEncoding::Utf8, "Šž".as_bytes(), "Šž")]
    fn czech_letters_decode(
        #[case] encoding: SourceEncoding,
        #[case] bytes: &[u8],
        #[case] expected: &str,
    ) {
        assert_eq!(encoding.decode(bytes), expected);
    }

    #[rstest]
    fn continuation_marker_is_a_single_byte_in_legacy_codepages() {
        assert_eq!(SourceEncoding::Windows1250.decode(&[0xA4]), "¤");
        assert_eq!(SourceEncoding::Iso8859_2.decode(&[0xA4]), "¤");
    }
}
