//! RFC-4180 writing (spec §4.1, §4.6) on top of a plain `Vec<u8>` sink.
//!
//! Mirrors the original writer's buffering style (resize-then-fill via
//! [`extend`], one record terminator decision per call) but drives
//! quoting through [`crate::escape`] and field stringification through
//! [`crate::codec::encode_row`] instead of `csv_core`.

use serde::Serialize;

use crate::codec::{self, EncodingStorage};
use crate::dialect::{Dialect, QuoteStyle};
use crate::error::{Error, ErrorKind, Result};
use crate::escape;
use crate::keys;
use crate::strategy::StrategySet;
use crate::translate::ValueTranslator;

/// Builds a [`Writer`] with the same chained `&mut self -> &mut Self` style
/// as [`crate::dialect::DialectBuilder`] and
/// [`crate::strategy::StrategySetBuilder`].
#[derive(Debug, Default)]
pub struct WriterBuilder {
    dialect: Dialect,
    flexible: bool,
}

impl WriterBuilder {
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// The dialect (delimiter, line ending, quoting) to write under.
    pub fn dialect(&mut self, dialect: Dialect) -> &mut WriterBuilder {
        self.dialect = dialect;
        self
    }

    /// Whether records are allowed to vary in field count.
    ///
    /// When disabled (the default), writing a record whose length differs
    /// from the first record written returns
    /// [`crate::error::ErrorKind::UnequalLengths`].
    pub fn flexible(&mut self, yes: bool) -> &mut WriterBuilder {
        self.flexible = yes;
        self
    }

    pub fn build(&self) -> Writer {
        Writer {
            dialect: self.dialect.clone(),
            flexible: self.flexible,
            first_field_count: None,
            wrote_any_record: false,
            frozen_header: None,
        }
    }
}

/// A configured CSV emitter over a caller-owned `Vec<u8>` buffer.
///
/// No trailing line terminator is ever written — a terminator is emitted
/// *before* each record except the first, so the buffer a caller reads
/// back never ends with a dangling empty line (spec §9: "no trailing
/// line terminator in either buffered or streaming mode").
#[derive(Debug)]
pub struct Writer {
    dialect: Dialect,
    flexible: bool,
    first_field_count: Option<u64>,
    wrote_any_record: bool,
    frozen_header: Option<Vec<String>>,
}

impl Default for Writer {
    fn default() -> Writer {
        WriterBuilder::default().build()
    }
}

impl Writer {
    /// Serializes a single record using its [`crate::codec`] record
    /// description, writing a header row from the first record's field
    /// names when this is the first call and `strategies`/the dialect
    /// call for one (spec §4.6).
    ///
    /// Subsequent records may not introduce a key absent from the first
    /// record's header; doing so is an
    /// [`crate::error::ErrorKind::InvalidValue`] error.
    pub fn serialize<T: Serialize>(
        &mut self,
        buf: &mut Vec<u8>,
        record: &T,
        strategies: &StrategySet,
        translator: &ValueTranslator,
    ) -> Result<()> {
        let storage = codec::encode_row(record, strategies, translator)?;

        let header = match &self.frozen_header {
            Some(h) => h.clone(),
            None => {
                let header: Vec<String> =
                    storage.keys().iter().map(|k| keys::encode_key(k, strategies.key_encoding)).collect();
                if self.dialect.has_headers() {
                    self.write_record_raw(buf, header.iter().map(|s| s.as_bytes()))?;
                }
                tracing::debug!(field_count = header.len(), "froze header from first encoded record");
                self.frozen_header = Some(header.clone());
                header
            }
        };

        self.write_storage_row(buf, &storage, &header)
    }

    fn write_storage_row(&mut self, buf: &mut Vec<u8>, storage: &EncodingStorage, header: &[String]) -> Result<()> {
        for key in storage.keys() {
            if !header.iter().any(|h| h == &key) {
                tracing::warn!(key, "record introduced a key not present in the frozen header");
                return Err(Error::new(ErrorKind::InvalidValue(format!(
                    "field '{}' was not present in the first encoded record",
                    key
                ))));
            }
        }
        let fields: Vec<&str> = header.iter().map(|k| storage.get(k).unwrap_or("")).collect();
        self.write_record_raw(buf, fields.iter().map(|s| s.as_bytes()))
    }

    /// Writes a single record of already-stringified fields.
    pub fn write_record<I, T>(&mut self, buf: &mut Vec<u8>, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.write_record_raw(buf, record.into_iter())
    }

    fn write_record_raw<I, T>(&mut self, buf: &mut Vec<u8>, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        if self.wrote_any_record {
            buf.extend_from_slice(self.dialect.line_ending.as_bytes());
        }
        let mut count: u64 = 0;
        for (i, field) in record.into_iter().enumerate() {
            if i > 0 {
                buf.push(self.dialect.delimiter);
            }
            write_field(field.as_ref(), buf, self.dialect.delimiter, self.dialect.quote_style);
            count += 1;
        }
        self.wrote_any_record = true;
        self.check_field_count(count)
    }

    fn check_field_count(&mut self, count: u64) -> Result<()> {
        if self.flexible {
            return Ok(());
        }
        match self.first_field_count {
            None => self.first_field_count = Some(count),
            Some(expected) if expected != count => {
                return Err(Error::new(ErrorKind::UnequalLengths { expected_len: expected, len: count }))
            }
            Some(_) => {}
        }
        Ok(())
    }
}

fn write_field(field: &[u8], out: &mut Vec<u8>, delim: u8, style: QuoteStyle) {
    match style {
        QuoteStyle::Necessary => escape::append_escaped(field, out, delim),
        QuoteStyle::Never => out.extend_from_slice(field),
        QuoteStyle::Always => {
            out.push(b'"');
            let mut start = 0;
            for (i, &b) in field.iter().enumerate() {
                if b == b'"' {
                    out.extend_from_slice(&field[start..i]);
                    out.extend_from_slice(b"\"\"");
                    start = i + 1;
                }
            }
            out.extend_from_slice(&field[start..]);
            out.push(b'"');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::LineEnding;

    fn buf_as_string(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn two_records_no_trailing_terminator() {
        let mut wtr = WriterBuilder::default().build();
        let mut buf = vec![];
        wtr.write_record(&mut buf, &["a", "b", "c"]).unwrap();
        wtr.write_record(&mut buf, &["x", "y", "z"]).unwrap();
        assert_eq!(buf_as_string(buf), "a,b,c\nx,y,z");
    }

    #[test]
    fn one_empty_field_is_quoted() {
        let mut wtr = WriterBuilder::default().build();
        let mut buf = vec![];
        wtr.write_record(&mut buf, &["a,b"]).unwrap();
        assert_eq!(buf_as_string(buf), "\"a,b\"");
    }

    #[test]
    fn crlf_line_ending() {
        let dialect = crate::dialect::DialectBuilder::new().line_ending(LineEnding::CRLF).build();
        let mut wtr = WriterBuilder::default().build();
        wtr.dialect = dialect;
        let mut buf = vec![];
        wtr.write_record(&mut buf, &["a", "b"]).unwrap();
        wtr.write_record(&mut buf, &["c", "d"]).unwrap();
        assert_eq!(buf_as_string(buf), "a,b\r\nc,d");
    }

    #[test]
    fn unequal_lengths_rejected() {
        let mut wtr = WriterBuilder::default().build();
        let mut buf = vec![];
        wtr.write_record(&mut buf, &["a", "b"]).unwrap();
        let err = wtr.write_record(&mut buf, &["x", "y", "z"]).unwrap_err();
        match err.kind() {
            ErrorKind::UnequalLengths { expected_len, len } => {
                assert_eq!(*expected_len, 2);
                assert_eq!(*len, 3);
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn serialize_writes_header_then_rows() {
        #[derive(serde::Serialize)]
        struct Row {
            foo: i64,
            bar: bool,
        }
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let mut wtr = WriterBuilder::default().build();
        let mut buf = vec![];
        wtr.serialize(&mut buf, &Row { foo: 42, bar: true }, &strategies, &translator).unwrap();
        wtr.serialize(&mut buf, &Row { foo: 7, bar: false }, &strategies, &translator).unwrap();
        assert_eq!(buf_as_string(buf), "foo,bar\n42,1\n7,0");
    }

    #[test]
    fn serialize_rejects_new_key_after_freeze() {
        #[derive(serde::Serialize)]
        struct A {
            x: i64,
        }
        #[derive(serde::Serialize)]
        struct B {
            x: i64,
            y: i64,
        }
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let mut wtr = WriterBuilder::default().build();
        let mut buf = vec![];
        wtr.serialize(&mut buf, &A { x: 1 }, &strategies, &translator).unwrap();
        let err = wtr.serialize(&mut buf, &B { x: 2, y: 3 }, &strategies, &translator).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidValue(_)));
    }
}
