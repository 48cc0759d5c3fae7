//! A type-directed CSV codec: typed records to and from RFC-4180 byte
//! streams under configurable dialect and conversion policies.
//!
//! The public surface mirrors the module layout: [`dialect`] and
//! [`strategy`] describe *how* bytes should be read or written,
//! [`reader`]/[`writer`]/[`parallel`]/[`emitter`] describe the encode/decode
//! entry points that apply those policies, and [`codec`] is the `serde`
//! binding in between. [`error`] carries the diagnostics every fallible
//! operation here returns.

pub mod codec;
pub mod datetime;
pub mod dialect;
pub mod diagnostics;
pub mod emitter;
pub mod error;
pub mod escape;
pub mod header;
mod iter;
pub mod keys;
pub mod locale;
pub mod parallel;
pub mod parser;
pub mod reader;
#[cfg(feature = "stream")]
mod stream;
pub mod strategy;
pub mod translate;
pub mod writer;

pub use codec::Date;
pub use dialect::{Dialect, DialectBuilder, LineEnding, ParsingMode, QuoteStyle, Trim};
pub use emitter::StreamingEmitter;
pub use error::{Error, ErrorKind, Result};
pub use header::{ColumnMapping, HeaderMap, HeaderResolver, IndexMapping};
pub use iter::Iter;
pub use locale::{BuiltinLocales, Locale, LocaleProvider, NumberMarks};
pub use parallel::{ParallelDecoder, ParallelDecoderBuilder};
pub use reader::{Reader, ReaderBuilder};
#[cfg(feature = "stream")]
pub use stream::{decode_stream, Stream};
pub use strategy::{
    BoolDecodingStrategy, BoolEncodingStrategy, DateDecodingStrategy, DateEncodingStrategy, DateStyle,
    KeyDecodingStrategy, KeyEncodingStrategy, NestedType, NilDecodingStrategy, NilEncodingStrategy,
    NumberDecodingStrategy, NumberEncodingStrategy, StrategySet, StrategySetBuilder,
};
pub use translate::ValueTranslator;
pub use writer::{Writer, WriterBuilder};
