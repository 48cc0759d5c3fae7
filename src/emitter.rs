//! Bounded-memory encoding over a generic sink (spec §4.9 `StreamingEmitter`,
//! §6 `encode([Record], to: sink)`).
//!
//! [`crate::writer::Writer`] serializes one record at a time into a
//! caller-owned `Vec<u8>`; [`iter`](crate::iter)/[`stream`](crate::stream)
//! reuse that per item but still hand the caller one allocation per row.
//! `StreamingEmitter` instead reuses a single scratch buffer across every
//! record and writes straight through to any `W: io::Write`, so memory stays
//! flat regardless of how many rows are encoded.

use std::io;

use serde::Serialize;

use crate::error::{Error, ErrorKind, Result};
use crate::strategy::StrategySet;
use crate::translate::ValueTranslator;
use crate::writer::Writer;

/// Wraps a [`Writer`] and any `W: io::Write`, flushing one record at a time.
pub struct StreamingEmitter<W> {
    sink: W,
    writer: Writer,
    scratch: Vec<u8>,
}

impl<W: io::Write> StreamingEmitter<W> {
    pub fn new(sink: W, writer: Writer) -> StreamingEmitter<W> {
        StreamingEmitter { sink, writer, scratch: Vec::new() }
    }

    /// Serializes and writes a single record, per [`Writer::serialize`]'s
    /// header-freeze and no-trailing-terminator rules.
    pub fn write_record<T: Serialize>(
        &mut self,
        record: &T,
        strategies: &StrategySet,
        translator: &ValueTranslator,
    ) -> Result<()> {
        self.scratch.clear();
        self.writer.serialize(&mut self.scratch, record, strategies, translator)?;
        self.sink
            .write_all(&self.scratch)
            .map_err(|e| Error::new(ErrorKind::InvalidOutput(e.to_string())))
    }

    /// Writes every record in `records`, in order.
    pub fn write_all<T, I>(&mut self, records: I, strategies: &StrategySet, translator: &ValueTranslator) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        for record in records {
            self.write_record(&record, strategies, translator)?;
        }
        Ok(())
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush().map_err(|e| Error::new(ErrorKind::InvalidOutput(e.to_string())))
    }

    /// Consumes the emitter, returning the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }
}
