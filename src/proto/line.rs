use std::{ops::Deref, str};
use thiserror::Error;

/// A sensor line that could not be turned into text fields.
///
/// Recoverable: the line is dropped and polling goes on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// `error_len` is `None` when the line ends inside a multi-byte
    /// sequence, which happens when a read straddles a sensor write.
    #[error("Invalid UTF-8 in sensor line after {valid_up_to} bytes ({})", utf8_detail(.error_len))]
    InvalidUtf8 {
        valid_up_to: usize,
        error_len: Option<usize>,
    },
}

fn utf8_detail(error_len: &Option<usize>) -> String {
    match error_len {
        Some(n) => format!("{} invalid bytes", n),
        None => String::from("truncated sequence"),
    }
}

impl DecodeError {
    /// True if the line was cut off in the middle of a character.
    pub fn is_truncated(&self) -> bool {
        matches!(
            self,
            Self::InvalidUtf8 {
                error_len: None,
                ..
            }
        )
    }
}

impl From<str::Utf8Error> for DecodeError {
    fn from(e: str::Utf8Error) -> Self {
        Self::InvalidUtf8 {
            valid_up_to: e.valid_up_to(),
            error_len: e.error_len(),
        }
    }
}

/// Comma separated text fields of one sensor line.
///
/// No column count is enforced here, an empty line gives zero fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<String>);

impl Deref for Fields {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Fields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<&[u8]> for Fields {
    type Error = DecodeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let line = value.strip_suffix(b"\n").unwrap_or(value);
        let text = str::from_utf8(line)?;

        // The csv reader takes care of quoting and a leftover '\r'.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut record = csv::StringRecord::new();
        // Flexible records read from valid UTF-8 in memory cannot fail.
        match reader.read_record(&mut record) {
            Ok(true) => Ok(record.iter().collect()),
            Ok(false) | Err(_) => Ok(Self::default()),
        }
    }
}

impl TryFrom<&str> for Fields {
    type Error = DecodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.as_bytes())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_base_line() {
        let fields =
            Fields::try_from(&b"07,40.7128,-74.0060,10,1.2,45,2024-03-01T12:00:00\n"[..]).unwrap();
        assert_eq!(
            &fields[..],
            &[
                "07",
                "40.7128",
                "-74.0060",
                "10",
                "1.2",
                "45",
                "2024-03-01T12:00:00"
            ]
        );
    }

    #[test]
    fn test_newline_is_optional() {
        let with = Fields::try_from(&b"01,2,3\n"[..]).unwrap();
        let without = Fields::try_from(&b"01,2,3"[..]).unwrap();
        assert_eq!(with, without);
        assert_eq!(with.len(), 3);
    }

    #[test]
    fn test_crlf() {
        let fields = Fields::try_from(&b"01,2,3\r\n"[..]).unwrap();
        assert_eq!(&fields[..], &["01", "2", "3"]);
    }

    #[test]
    fn test_empty_fields_are_kept() {
        let fields = Fields::try_from("03,,,,,,").unwrap();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0], "03");
        assert!(fields[1..].iter().all(String::is_empty));
    }

    #[test]
    fn test_empty_line() {
        assert!(Fields::try_from(&b""[..]).unwrap().is_empty());
        assert!(Fields::try_from(&b"\n"[..]).unwrap().is_empty());
    }

    #[test]
    fn test_quoted_field() {
        let fields = Fields::try_from("01,\"40,5\",2").unwrap();
        assert_eq!(&fields[..], &["01", "40,5", "2"]);
    }

    #[test]
    fn test_unbalanced_quote_is_not_an_error() {
        let fields = Fields::try_from("01,\"40,5\n").unwrap();
        assert_eq!(fields[0], "01");
    }

    #[test]
    fn test_invalid_leading_byte() {
        let err = Fields::try_from(&b"\xff07,1,2\n"[..]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidUtf8 {
                valid_up_to: 0,
                error_len: Some(1)
            }
        );
        assert!(!err.is_truncated());
    }

    #[test]
    fn test_truncated_sequence() {
        // First two bytes of a three byte sequence.
        let err = Fields::try_from(&b"01,2,\xe2\x82"[..]).unwrap_err();
        assert!(err.is_truncated());
        assert_eq!(
            err,
            DecodeError::InvalidUtf8 {
                valid_up_to: 5,
                error_len: None
            }
        );
    }
}
