use std::error::Error as StdError;
use std::fmt;
use std::result;

/// A type alias for `Result<T, csv_codec::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// Where an error occurred: the row, the column, and the path of keys
/// walked to reach the offending value.
///
/// `available_keys` is populated only for [`ErrorKind::KeyNotFound`], and
/// only when a suggestion could plausibly be computed from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// 1-based row index.
    pub row: Option<u64>,
    /// The header name, or a positional marker like `"column3"`.
    pub column: Option<String>,
    /// The keys walked to reach this value, root first.
    pub coding_path: Vec<String>,
    /// The keys known to `HeaderMap` at the time of the error.
    pub available_keys: Option<Vec<String>>,
}

impl Location {
    pub(crate) fn new(row: u64, column: impl Into<String>, coding_path: Vec<String>) -> Location {
        Location {
            row: Some(row),
            column: Some(column.into()),
            coding_path,
            available_keys: None,
        }
    }

    fn fmt_prefix(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(row) = self.row {
            write!(f, " at row {}", row)?;
        }
        if let Some(ref col) = self.column {
            write!(f, ", column '{}'", col)?;
        }
        if !self.coding_path.is_empty() {
            write!(f, " (path: {})", self.coding_path.join("."))?;
        }
        Ok(())
    }
}

/// An error that can occur when decoding or encoding CSV data.
///
/// There are scenarios where an error is impossible: decoding raw byte
/// slices (no type translation) from a lenient-mode reader on an in-memory
/// buffer cannot fail.
#[derive(Debug)]
pub struct Error(Box<ErrorKind>);

impl Error {
    /// A crate-private constructor for `Error`.
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Error(Box::new(kind))
    }

    /// Return the specific type of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwrap this error into its underlying type.
    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// A human-readable message including location and, when available, a
    /// suggestion synthesized per spec §4.8.
    pub fn message(&self) -> String {
        format!("{}", self)
    }

    pub(crate) fn key_not_found(key: &str, location: Location) -> Error {
        Error::new(ErrorKind::KeyNotFound {
            key: key.to_string(),
            location,
        })
    }

    pub(crate) fn type_mismatch(expected: &str, actual: impl Into<String>, location: Location) -> Error {
        Error::new(ErrorKind::TypeMismatch {
            expected: expected.to_string(),
            actual: truncate(actual.into()),
            location,
        })
    }

    pub(crate) fn parsing_error(message: impl Into<String>, line: Option<u64>, column: Option<u64>) -> Error {
        Error::new(ErrorKind::ParsingError {
            message: message.into(),
            line,
            column,
        })
    }
}

fn truncate(mut s: String) -> String {
    const MAX: usize = 80;
    if s.len() > MAX {
        s.truncate(MAX);
        s.push('\u{2026}');
    }
    s
}

/// The specific type of an error.
///
/// Decode kinds: `InvalidEncoding`, `KeyNotFound`, `TypeMismatch`,
/// `UnsupportedType`, `ParsingError`. Encode kinds: `InvalidValue`,
/// `UnsupportedType`, `MissingKey`, `InvalidOutput`. `UnequalLengths` is a
/// writer-side shorthand for the common case of `InvalidValue` caused by a
/// flexible-record-length mismatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input bytes could not be interpreted under the configured
    /// textual encoding (e.g. invalid UTF-8 once the BOM is stripped).
    InvalidEncoding(String),
    /// A requested record key has no corresponding column.
    KeyNotFound { key: String, location: Location },
    /// A field's raw slice could not be converted to the expected type.
    TypeMismatch {
        expected: String,
        actual: String,
        location: Location,
    },
    /// A nested or otherwise unrepresentable type was requested.
    UnsupportedType(String),
    /// An RFC-4180 violation was rejected (strict mode) or an unterminated
    /// quote was found (both modes).
    ParsingError {
        message: String,
        line: Option<u64>,
        column: Option<u64>,
    },
    /// A value could not be encoded (e.g. a new key introduced after the
    /// header froze).
    InvalidValue(String),
    /// A record is missing a key required by the column-order descriptor.
    MissingKey(String),
    /// The output sink rejected a write.
    InvalidOutput(String),
    /// Two records with an unequal number of fields were written while the
    /// writer's `flexible` option was disabled.
    UnequalLengths { expected_len: u64, len: u64 },
    /// A generic message from a `serde::ser`/`serde::de` custom error.
    Message(String),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        None
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.0 {
            ErrorKind::InvalidEncoding(ref msg) => write!(f, "CSV error: invalid encoding: {}", msg),
            ErrorKind::KeyNotFound { ref key, ref location } => {
                write!(f, "CSV error: key '{}' not found", key)?;
                location.fmt_prefix(f)?;
                if let Some(suggestion) = crate::diagnostics::suggest_key(key, location.available_keys.as_deref()) {
                    write!(f, ". {}", suggestion)?;
                }
                Ok(())
            }
            ErrorKind::TypeMismatch {
                ref expected,
                ref actual,
                ref location,
            } => {
                write!(f, "CSV error: expected {}, found '{}'", expected, actual)?;
                location.fmt_prefix(f)?;
                if let Some(hint) = crate::diagnostics::suggest_type_mismatch(expected, actual) {
                    write!(f, ". {}", hint)?;
                }
                Ok(())
            }
            ErrorKind::UnsupportedType(ref msg) => write!(f, "CSV error: unsupported type: {}", msg),
            ErrorKind::ParsingError {
                ref message,
                line,
                column,
            } => {
                write!(f, "CSV parse error: {}", message)?;
                if let Some(line) = line {
                    write!(f, " (line {})", line)?;
                }
                if let Some(column) = column {
                    write!(f, " (column {})", column)?;
                }
                if let Some(hint) = crate::diagnostics::suggest_parsing_error(message) {
                    write!(f, ". {}", hint)?;
                }
                Ok(())
            }
            ErrorKind::InvalidValue(ref msg) => write!(f, "CSV write error: invalid value: {}", msg),
            ErrorKind::MissingKey(ref key) => write!(f, "CSV write error: missing key '{}'", key),
            ErrorKind::InvalidOutput(ref msg) => write!(f, "CSV write error: invalid output: {}", msg),
            ErrorKind::UnequalLengths { expected_len, len } => write!(
                f,
                "CSV error: found record with {} fields, but the previous record has {} fields",
                len, expected_len
            ),
            ErrorKind::Message(ref msg) => write!(f, "CSV error: {}", msg),
        }
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::new(ErrorKind::Message(msg.to_string()))
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::new(ErrorKind::Message(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let err = Error::key_not_found(
            "name",
            Location::new(2, "column0", vec!["row".into(), "name".into()]),
        );
        let msg = err.message();
        assert!(msg.contains("row 2"));
        assert!(msg.contains("name"));
    }

    #[test]
    fn unequal_lengths_message() {
        let err = Error::new(ErrorKind::UnequalLengths {
            expected_len: 2,
            len: 3,
        });
        assert_eq!(
            err.message(),
            "CSV error: found record with 3 fields, but the previous record has 2 fields"
        );
    }
}
