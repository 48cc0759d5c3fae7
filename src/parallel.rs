//! Multi-threaded decode (spec §4.7): splits a buffer into safe chunks, then
//! decodes each chunk on its own thread.
//!
//! Chunk boundaries are found by a single sequential pass over the body
//! (step 3 of spec §4.7) that tracks quote depth so no split ever lands
//! inside a quoted field. `std::thread::scope` plus `std::sync::mpsc`
//! provide the worker pool and the backpressured streaming path; this
//! crate deliberately does not pull in a task-stealing runtime like
//! `rayon` for it (see `DESIGN.md`).

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use serde::de::DeserializeOwned;

use crate::codec;
use crate::dialect::Dialect;
use crate::error::{Error, ErrorKind, Result};
use crate::header::{HeaderMap, HeaderResolver};
use crate::parser::{self, CsvParser};
use crate::strategy::StrategySet;
use crate::translate::ValueTranslator;

/// Builds a [`ParallelDecoder`].
#[derive(Debug, Default)]
pub struct ParallelDecoderBuilder {
    dialect: Dialect,
    num_threads: usize,
}

impl ParallelDecoderBuilder {
    pub fn new() -> ParallelDecoderBuilder {
        ParallelDecoderBuilder { dialect: Dialect::default(), num_threads: 4 }
    }

    pub fn dialect(&mut self, dialect: Dialect) -> &mut ParallelDecoderBuilder {
        self.dialect = dialect;
        self
    }

    /// The number of worker threads to split decode work across. Clamped
    /// to at least 1.
    pub fn num_threads(&mut self, n: usize) -> &mut ParallelDecoderBuilder {
        self.num_threads = n;
        self
    }

    pub fn build(&self) -> ParallelDecoder {
        ParallelDecoder { dialect: self.dialect.clone(), num_threads: self.num_threads.max(1) }
    }
}

/// Splits a buffer into chunks and decodes each on its own thread.
#[derive(Debug)]
pub struct ParallelDecoder {
    dialect: Dialect,
    num_threads: usize,
}

impl Default for ParallelDecoder {
    fn default() -> ParallelDecoder {
        ParallelDecoderBuilder::default().build()
    }
}

impl ParallelDecoder {
    /// Decodes `buf` in parallel, returning records in their original file
    /// order (spec §4.7: "ordered composition" is the default since chunks
    /// are concatenated in file order, not completion order).
    pub fn decode<T>(
        &self,
        buf: &[u8],
        resolver: &HeaderResolver,
        strategies: &StrategySet,
        translator: &ValueTranslator,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let (headers, body) = self.resolve_header(buf, resolver)?;
        let chunks = partition(body, self.dialect.delimiter(), self.num_threads);
        tracing::debug!(chunk_count = chunks.len(), "partitioned body for parallel decode");
        let cancelled = AtomicBool::new(false);
        let trim_whitespace = self.dialect.trim_whitespace;

        let results: Vec<Result<Vec<T>>> = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(chunks.len());
            let mut row_base = if self.dialect.has_headers() { 1u64 } else { 0u64 };
            for chunk in &chunks {
                let bytes = &body[chunk.start..chunk.end];
                let base = row_base;
                let headers = &headers;
                let cancelled = &cancelled;
                let delim = self.dialect.delimiter();
                handles.push(scope.spawn(move || {
                    decode_chunk::<T>(bytes, base, delim, trim_whitespace, headers, strategies, translator, cancelled)
                }));
                row_base += chunk.row_count as u64;
            }
            handles.into_iter().map(|h| h.join().expect("decode worker panicked")).collect()
        });

        let mut out = Vec::new();
        for r in results {
            out.extend(r?);
        }
        Ok(out)
    }

    /// Decodes `buf` in parallel, delivering each chunk's records to
    /// `on_batch` as soon as it finishes (completion order, not file
    /// order). `on_batch` returning [`ControlFlow::Break`] is a cooperative
    /// cancellation signal: in-flight and not-yet-started chunks stop
    /// early and the call returns `Ok(())` without decoding the rest.
    ///
    /// `channel_capacity` bounds how many finished-but-undelivered batches
    /// may queue up, giving the workers backpressure against a slow
    /// consumer.
    pub fn decode_streaming<T, F>(
        &self,
        buf: &[u8],
        resolver: &HeaderResolver,
        strategies: &StrategySet,
        translator: &ValueTranslator,
        channel_capacity: usize,
        mut on_batch: F,
    ) -> Result<()>
    where
        T: DeserializeOwned + Send,
        F: FnMut(Vec<T>) -> ControlFlow<()>,
    {
        let (headers, body) = self.resolve_header(buf, resolver)?;
        let chunks = partition(body, self.dialect.delimiter(), self.num_threads);
        let cancelled = AtomicBool::new(false);
        let trim_whitespace = self.dialect.trim_whitespace;
        let delim = self.dialect.delimiter();

        let (tx, rx) = mpsc::sync_channel::<(usize, Result<Vec<T>>)>(channel_capacity.max(1));

        let first_error = std::thread::scope(|scope| {
            let mut row_base = if self.dialect.has_headers() { 1u64 } else { 0u64 };
            for (idx, chunk) in chunks.iter().enumerate() {
                let bytes = &body[chunk.start..chunk.end];
                let base = row_base;
                let headers = &headers;
                let cancelled = &cancelled;
                let tx = tx.clone();
                scope.spawn(move || {
                    let result = decode_chunk::<T>(bytes, base, delim, trim_whitespace, headers, strategies, translator, cancelled);
                    let _ = tx.send((idx, result));
                });
                row_base += chunk.row_count as u64;
            }
            drop(tx);

            // Chunks run on separate threads and may complete in any order,
            // so the first error to arrive on `rx` is not necessarily the
            // one with the lowest (earliest) row range. Keep whichever
            // candidate has the lowest chunk index instead of the first one
            // observed.
            let mut first_error: Option<(usize, Error)> = None;
            for (idx, result) in rx {
                match result {
                    Ok(rows) => {
                        if on_batch(rows).is_break() {
                            cancelled.store(true, Ordering::Relaxed);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(chunk = idx, error = %e, "cancelling remaining chunks after decode error");
                        cancelled.store(true, Ordering::Relaxed);
                        let keep = match &first_error {
                            Some((kept_idx, _)) => idx < *kept_idx,
                            None => true,
                        };
                        if keep {
                            first_error = Some((idx, e));
                        }
                    }
                }
            }
            first_error.map(|(_, e)| e)
        });

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn resolve_header<'b>(&self, buf: &'b [u8], resolver: &HeaderResolver) -> Result<(HeaderMap, &'b [u8])> {
        let buf = parser::strip_bom(buf);
        let has_headers = self.dialect.has_headers();
        if !has_headers {
            let width = resolver.column_order.map(|o| o.len()).unwrap_or(0);
            return Ok((resolver.resolve(None, false, width), buf));
        }
        let header_end = first_row_end(buf);
        let header_row = &buf[..header_end];
        let parser = CsvParser::new(self.dialect.delimiter());
        let mut first = None;
        parser.parse(header_row, |row| {
            if first.is_none() {
                first = Some(row);
            }
        });
        let raw: Vec<String> = match &first {
            Some(row) => (0..row.field_count())
                .map(|i| row.field_str(i, header_row, self.dialect.trim_whitespace).unwrap_or_default().into_owned())
                .collect(),
            None => vec![],
        };
        let width = raw.len();
        Ok((resolver.resolve(Some(&raw), true, width), &buf[header_end..]))
    }
}

fn decode_chunk<T: DeserializeOwned>(
    chunk: &[u8],
    row_index_base: u64,
    delimiter: u8,
    trim_whitespace: bool,
    headers: &HeaderMap,
    strategies: &StrategySet,
    translator: &ValueTranslator,
    cancelled: &AtomicBool,
) -> Result<Vec<T>> {
    let parser = CsvParser::new(delimiter);
    let mut raw_rows = Vec::new();
    parser.parse(chunk, |row| raw_rows.push(row));

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (i, row) in raw_rows.into_iter().enumerate() {
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        match codec::decode_row::<T>(&row, chunk, headers, strategies, translator, trim_whitespace, row_index_base + i as u64) {
            Ok(record) => rows.push(record),
            Err(e) => {
                cancelled.store(true, Ordering::Relaxed);
                return Err(e);
            }
        }
    }
    Ok(rows)
}

/// A half-open byte range of the decode body handed to one worker, plus the
/// number of complete records it contains (known from the same scan that
/// found the split point, so the next chunk's starting row index is known
/// before any chunk starts decoding).
#[derive(Clone, Copy, Debug)]
struct Chunk {
    start: usize,
    end: usize,
    row_count: usize,
}

/// Finds up to `target_chunks` safe split points in `buf`: byte offsets
/// that fall immediately after a record terminator that is not inside a
/// quoted field. A single forward scan tracks quote depth by toggling on
/// every `"` byte — correct for well-formed RFC-4180 input, where escaped
/// quotes always appear in `""` pairs and so cancel out.
fn partition(buf: &[u8], delimiter: u8, target_chunks: usize) -> Vec<Chunk> {
    let _ = delimiter; // delimiter bytes never need special handling for quote tracking.
    if buf.is_empty() {
        return vec![];
    }
    if target_chunks <= 1 {
        return vec![Chunk { start: 0, end: buf.len(), row_count: count_rows_naive(buf) }];
    }

    let target_size = (buf.len() / target_chunks).max(1);
    let mut chunks = Vec::with_capacity(target_chunks);
    let mut in_quotes = false;
    let mut chunk_start = 0usize;
    let mut rows_in_chunk = 0usize;
    let mut next_threshold = target_size;
    let n = buf.len();
    let mut i = 0usize;

    while i < n {
        let b = buf[i];
        if b == b'"' {
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if !in_quotes && (b == b'\n' || b == b'\r') {
            rows_in_chunk += 1;
            i += 1;
            if b == b'\r' && i < n && buf[i] == b'\n' {
                i += 1;
            }
            if i >= next_threshold && chunks.len() + 1 < target_chunks {
                chunks.push(Chunk { start: chunk_start, end: i, row_count: rows_in_chunk });
                chunk_start = i;
                rows_in_chunk = 0;
                next_threshold = i + target_size;
            }
            continue;
        }
        i += 1;
    }

    let trailing_partial_row = if chunk_start < n { 1 } else { 0 };
    chunks.push(Chunk { start: chunk_start, end: n, row_count: rows_in_chunk + trailing_partial_row });
    chunks
}

fn count_rows_naive(buf: &[u8]) -> usize {
    let mut in_quotes = false;
    let mut count = 0usize;
    let mut i = 0usize;
    let n = buf.len();
    let mut saw_content_since_terminator = false;
    while i < n {
        let b = buf[i];
        if b == b'"' {
            in_quotes = !in_quotes;
            saw_content_since_terminator = true;
            i += 1;
            continue;
        }
        if !in_quotes && (b == b'\n' || b == b'\r') {
            count += 1;
            saw_content_since_terminator = false;
            i += 1;
            if b == b'\r' && i < n && buf[i] == b'\n' {
                i += 1;
            }
            continue;
        }
        saw_content_since_terminator = true;
        i += 1;
    }
    if saw_content_since_terminator {
        count += 1;
    }
    count
}

fn first_row_end(buf: &[u8]) -> usize {
    let mut in_quotes = false;
    let n = buf.len();
    let mut i = 0usize;
    while i < n {
        let b = buf[i];
        if b == b'"' {
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if !in_quotes && (b == b'\n' || b == b'\r') {
            i += 1;
            if b == b'\r' && i < n && buf[i] == b'\n' {
                i += 1;
            }
            return i;
        }
        i += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::KeyDecodingStrategy;

    #[derive(serde::Deserialize, Debug, PartialEq, Clone)]
    struct Row {
        name: String,
        age: i64,
    }

    fn resolver() -> HeaderResolver<'static> {
        HeaderResolver { index_mapping: None, column_mapping: None, column_order: None, key_strategy: KeyDecodingStrategy::Default }
    }

    #[test]
    fn partition_never_splits_inside_quotes() {
        let body = b"\"a\nb\",1\nc,2\nd,3\ne,4\n";
        let chunks = partition(body, b',', 3);
        for chunk in &chunks {
            let slice = &body[chunk.start..chunk.end];
            assert!(slice.iter().filter(|&&b| b == b'"').count() % 2 == 0);
        }
        let total: usize = chunks.iter().map(|c| c.row_count).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn decode_matches_sequential_reader() {
        let mut buf = String::from("name,age\n");
        for i in 0..50 {
            buf.push_str(&format!("person{i},{i}\n"));
        }
        let decoder = ParallelDecoderBuilder::new().num_threads(4).build();
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let r = resolver();
        let rows: Vec<Row> = decoder.decode(buf.as_bytes(), &r, &strategies, &translator).unwrap();
        assert_eq!(rows.len(), 50);
        assert_eq!(rows[0], Row { name: "person0".into(), age: 0 });
        assert_eq!(rows[49], Row { name: "person49".into(), age: 49 });
    }

    #[test]
    fn streaming_delivers_all_rows() {
        let mut buf = String::from("name,age\n");
        for i in 0..20 {
            buf.push_str(&format!("person{i},{i}\n"));
        }
        let decoder = ParallelDecoderBuilder::new().num_threads(3).build();
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let r = resolver();
        let mut total = 0usize;
        decoder
            .decode_streaming::<Row, _>(buf.as_bytes(), &r, &strategies, &translator, 2, |batch| {
                total += batch.len();
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(total, 20);
    }

    #[test]
    fn error_in_one_chunk_is_propagated() {
        let buf = "name,age\nalice,30\nbob,notanumber\ncarol,40\n".repeat(1);
        let decoder = ParallelDecoderBuilder::new().num_threads(2).build();
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let r = resolver();
        let err = decoder.decode::<Row>(buf.as_bytes(), &r, &strategies, &translator).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn streaming_reports_earliest_row_even_if_its_chunk_finishes_last() {
        // Bad rows in both the first and last chunk: regardless of which
        // chunk's worker thread happens to finish first, the reported error
        // must be the one with the lowest row index (row 1, not row 19).
        let mut buf = String::from("name,age\nbadrow,notanumber\n");
        for i in 0..15 {
            buf.push_str(&format!("person{i},{i}\n"));
        }
        buf.push_str("badrow,alsonotanumber\n");

        let decoder = ParallelDecoderBuilder::new().num_threads(4).build();
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let r = resolver();

        for _ in 0..8 {
            let err = decoder
                .decode_streaming::<Row, _>(buf.as_bytes(), &r, &strategies, &translator, 1, |_| ControlFlow::Continue(()))
                .unwrap_err();
            match err.kind() {
                ErrorKind::TypeMismatch { location, .. } => assert_eq!(location.row, Some(1)),
                other => panic!("expected TypeMismatch, got {other:?}"),
            }
        }
    }
}
