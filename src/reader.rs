//! Single-threaded decode frontend (spec §4.4, §4.7 step 1-2).
//!
//! [`Reader`] wires [`crate::parser::CsvParser`] to
//! [`crate::header::HeaderResolver`] and [`crate::codec::decode_row`] under a
//! [`Dialect`]/[`StrategySet`] pair. It is the non-parallel decode path;
//! [`crate::parallel::ParallelDecoder`] builds on the same pieces for the
//! chunked, multi-threaded one.

use serde::de::DeserializeOwned;

use crate::codec;
use crate::dialect::{Dialect, ParsingMode};
use crate::error::{Error, ErrorKind, Result};
use crate::header::{HeaderMap, HeaderResolver, IndexMapping};
use crate::parser::{self, CsvParser, RowView};
use crate::strategy::StrategySet;
use crate::translate::ValueTranslator;

/// Builds a [`Reader`]. Mirrors [`crate::writer::WriterBuilder`]'s chained
/// `&mut self -> &mut Self` style.
#[derive(Debug, Default)]
pub struct ReaderBuilder {
    dialect: Dialect,
}

impl ReaderBuilder {
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    pub fn dialect(&mut self, dialect: Dialect) -> &mut ReaderBuilder {
        self.dialect = dialect;
        self
    }

    pub fn build(&self) -> Reader {
        Reader { dialect: self.dialect.clone() }
    }
}

/// A configured CSV decoder over an in-memory byte buffer.
#[derive(Debug, Default)]
pub struct Reader {
    dialect: Dialect,
}

impl Reader {
    /// Decodes every record in `buf` into a `Vec<T>`.
    ///
    /// Header resolution follows the fixed precedence in spec §4.4; pass
    /// `index_mapping`/`column_order` through `resolver` to override it. Row
    /// indices in reported errors are 1-based and count the header row when
    /// `dialect.has_headers()` is set, matching spec §4.4's "row 0 is the
    /// header" convention.
    pub fn decode<T: DeserializeOwned>(
        &self,
        buf: &[u8],
        resolver: &HeaderResolver,
        strategies: &StrategySet,
        translator: &ValueTranslator,
    ) -> Result<Vec<T>> {
        self.decode_iter(buf, resolver, strategies, translator)?.collect()
    }

    /// Decodes `buf` lazily, one record at a time, instead of materializing
    /// the whole result up front the way [`Reader::decode`] does (spec §6's
    /// streaming decode surface). Header resolution still runs eagerly
    /// against the first row, since every later row's decode depends on it;
    /// only the per-row `codec::decode_row` work is deferred to each `next`
    /// call.
    pub fn decode_iter<'b, T: DeserializeOwned>(
        &self,
        buf: &'b [u8],
        resolver: &HeaderResolver,
        strategies: &'b StrategySet,
        translator: &'b ValueTranslator<'b>,
    ) -> Result<impl Iterator<Item = Result<T>> + 'b> {
        let buf = parser::strip_bom(buf);
        let parser = CsvParser::new(self.dialect.delimiter());

        let mut raw_rows: Vec<RowView> = vec![];
        parser.parse(buf, |row| raw_rows.push(row));
        tracing::debug!(row_count = raw_rows.len(), "parsed rows for sequential decode");

        let mut rows = raw_rows.into_iter();
        let has_headers = self.dialect.has_headers();

        let first_row_strs: Option<Vec<String>> = if has_headers {
            rows.next().map(|row| {
                (0..row.field_count())
                    .map(|i| row.field_str(i, buf, self.dialect.trim_whitespace).unwrap_or_default().into_owned())
                    .collect()
            })
        } else {
            None
        };

        let header_width = match (&first_row_strs, resolver.column_order) {
            (Some(row), _) => row.len(),
            (None, Some(order)) => order.len(),
            (None, None) => self.dialect.expected_field_count.unwrap_or(0),
        };
        let matches_index_override = resolver
            .index_mapping
            .map(|m: &IndexMapping| !m.0.is_empty())
            .unwrap_or(false);
        let header_width = if matches_index_override {
            resolver.index_mapping.unwrap().0.keys().copied().max().unwrap_or(0) + 1
        } else {
            header_width
        };

        let headers = resolver.resolve(first_row_strs.as_deref(), has_headers, header_width);
        let trim_whitespace = self.dialect.trim_whitespace;
        let dialect = self.dialect.clone();

        Ok(rows.enumerate().map(move |(offset, row)| {
            let row_index = offset as u64 + if has_headers { 1 } else { 0 };
            check_field_count(&dialect, &row, row_index)?;
            codec::decode_row(&row, buf, &headers, strategies, translator, trim_whitespace, row_index)
        }))
    }

    /// Resolves the header only, without decoding any rows. Used by callers
    /// that want the column list ahead of time (spec §4.4).
    pub fn headers(&self, buf: &[u8], resolver: &HeaderResolver) -> Result<HeaderMap> {
        let buf = parser::strip_bom(buf);
        let parser = CsvParser::new(self.dialect.delimiter());
        let mut first: Option<RowView> = None;
        parser.parse(buf, |row| {
            if first.is_none() {
                first = Some(row);
            }
        });
        let has_headers = self.dialect.has_headers();
        let first_row_strs = if has_headers {
            first.as_ref().map(|row| {
                (0..row.field_count())
                    .map(|i| row.field_str(i, buf, self.dialect.trim_whitespace).unwrap_or_default().into_owned())
                    .collect::<Vec<_>>()
            })
        } else {
            None
        };
        let width = first_row_strs.as_ref().map(|r| r.len()).unwrap_or(0);
        Ok(resolver.resolve(first_row_strs.as_deref(), has_headers, width))
    }
}

fn check_field_count(dialect: &Dialect, row: &RowView, row_index: u64) -> Result<()> {
    if dialect.parsing_mode() != ParsingMode::Strict {
        return Ok(());
    }
    if row.unterminated_quote || row.quote_in_unquoted_field {
        tracing::warn!(row_index, "malformed quoting rejected under strict parsing mode");
        return Err(Error::new(ErrorKind::ParsingError {
            message: "malformed quoting".to_string(),
            line: Some(row_index),
            column: None,
        }));
    }
    if let Some(expected) = dialect.expected_field_count {
        let found = row.field_count();
        if found != expected {
            tracing::warn!(row_index, expected, found, "field count mismatch");
            return Err(Error::new(ErrorKind::ParsingError {
                message: format!("expected {expected} fields but found {found}"),
                line: Some(row_index),
                column: None,
            }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::KeyDecodingStrategy;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Person {
        name: String,
        age: i64,
    }

    fn default_resolver() -> HeaderResolver<'static> {
        HeaderResolver { index_mapping: None, column_mapping: None, column_order: None, key_strategy: KeyDecodingStrategy::Default }
    }

    #[test]
    fn decodes_two_rows_with_header() {
        let reader = ReaderBuilder::new().build();
        let buf = b"name,age\nAlice,30\nBob,25";
        let resolver = default_resolver();
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let rows: Vec<Person> = reader.decode(buf, &resolver, &strategies, &translator).unwrap();
        assert_eq!(rows, vec![Person { name: "Alice".into(), age: 30 }, Person { name: "Bob".into(), age: 25 }]);
    }

    #[test]
    fn decodes_without_header_using_column_order() {
        let dialect = crate::dialect::DialectBuilder::new().has_headers(false).build();
        let reader = ReaderBuilder::new().dialect(dialect).build();
        let buf = b"Alice,30\nBob,25";
        let order = ["name", "age"];
        let resolver = HeaderResolver {
            index_mapping: None,
            column_mapping: None,
            column_order: Some(&order),
            key_strategy: KeyDecodingStrategy::Default,
        };
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let rows: Vec<Person> = reader.decode(buf, &resolver, &strategies, &translator).unwrap();
        assert_eq!(rows[1], Person { name: "Bob".into(), age: 25 });
    }

    #[test]
    fn strict_mode_rejects_unequal_field_count() {
        let dialect = crate::dialect::DialectBuilder::new()
            .parsing_mode(ParsingMode::Strict)
            .expected_field_count(2)
            .build();
        let reader = ReaderBuilder::new().dialect(dialect).build();
        let buf = b"name,age\nAlice,30,extra";
        let resolver = default_resolver();
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let err = reader.decode::<Person>(buf, &resolver, &strategies, &translator).unwrap_err();
        match err.kind() {
            ErrorKind::ParsingError { message, line, column } => {
                assert_eq!(message, "expected 2 fields but found 3");
                assert_eq!(*line, Some(1));
                assert_eq!(*column, None);
            }
            other => panic!("expected ParsingError, got {other:?}"),
        }
    }

    #[test]
    fn decode_iter_yields_the_same_records_as_decode() {
        let reader = ReaderBuilder::new().build();
        let buf = b"name,age\nAlice,30\nBob,25";
        let resolver = default_resolver();
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let rows: Vec<Person> = reader
            .decode_iter::<Person>(buf, &resolver, &strategies, &translator)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows, vec![Person { name: "Alice".into(), age: 30 }, Person { name: "Bob".into(), age: 25 }]);
    }

    #[test]
    fn decode_iter_stops_at_the_first_error_without_buffering_the_rest() {
        let dialect = crate::dialect::DialectBuilder::new().parsing_mode(ParsingMode::Strict).expected_field_count(2).build();
        let reader = ReaderBuilder::new().dialect(dialect).build();
        let buf = b"name,age\nAlice,30\nBob,25,extra\nCarol,40";
        let resolver = default_resolver();
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let mut iter = reader.decode_iter::<Person>(buf, &resolver, &strategies, &translator).unwrap();
        assert_eq!(iter.next().unwrap().unwrap(), Person { name: "Alice".into(), age: 30 });
        assert!(iter.next().unwrap().is_err());
    }

    #[test]
    fn strict_mode_mismatch_emits_a_warning_span() {
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct SharedBuf(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for SharedBuf {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedBuf {
            type Writer = SharedBuf;
            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let buf = SharedBuf::default();
        let subscriber = tracing_subscriber::fmt().with_writer(buf.clone()).with_ansi(false).finish();

        let dialect = crate::dialect::DialectBuilder::new().parsing_mode(ParsingMode::Strict).expected_field_count(2).build();
        let reader = ReaderBuilder::new().dialect(dialect).build();
        let resolver = default_resolver();
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();

        tracing::subscriber::with_default(subscriber, || {
            let _ = reader.decode::<Person>(b"name,age\nAlice,30,extra", &resolver, &strategies, &translator);
        });

        let logged = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("field count mismatch"), "expected a warning span to be logged, got: {logged}");
    }
}
