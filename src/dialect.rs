//! Byte-level parsing/writing configuration shared by the reader and writer.

/// The record terminator used when writing CSV, or accepted when reading it.
///
/// Use this to specify the record terminator while parsing CSV. The default
/// on decode accepts `\r`, `\n` or `\r\n` as a single record terminator; the
/// default on encode writes `\n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LineEnding {
    /// Accepts `\r`, `\n` or `\r\n` as a single record terminator on decode;
    /// writes `\n` on encode.
    LF,
    /// Accepts `\r`, `\n` or `\r\n` as a single record terminator on decode;
    /// writes `\r\n` on encode.
    CRLF,
}

impl Default for LineEnding {
    fn default() -> LineEnding {
        LineEnding::LF
    }
}

impl LineEnding {
    pub(crate) fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::LF => b"\n",
            LineEnding::CRLF => b"\r\n",
        }
    }
}

/// RFC-4180 conformance level applied to violations discovered by the parser.
///
/// `Lenient` ignores a stray quote inside an unquoted field and accepts rows
/// whose field count differs from prior rows. `Strict` surfaces both as
/// [`crate::error::ErrorKind::ParsingError`]. Both modes always fail a row
/// whose final quote was never closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParsingMode {
    Lenient,
    Strict,
}

impl Default for ParsingMode {
    fn default() -> ParsingMode {
        ParsingMode::Lenient
    }
}

/// The quoting style to use when writing CSV data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuoteStyle {
    /// This puts quotes around every field. Always.
    Always,
    /// This puts quotes around fields only when necessary.
    ///
    /// They are necessary when fields contain a quote, delimiter or record
    /// terminator. This is the default.
    Necessary,
    /// This *never* writes quotes, even if it would produce invalid CSV data.
    Never,
}

impl Default for QuoteStyle {
    fn default() -> QuoteStyle {
        QuoteStyle::Necessary
    }
}

/// Whitespace preservation behaviour when reading CSV data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Trim {
    /// Preserves fields. This is the default.
    None,
    /// Trim leading/trailing ASCII space and tab from unquoted fields.
    Fields,
}

impl Default for Trim {
    fn default() -> Trim {
        Trim::None
    }
}

/// The immutable tuple of byte-level parsing/writing settings shared by a
/// decode or encode call.
///
/// Build one with [`DialectBuilder`]. A `Dialect` has no mutation methods of
/// its own; once built it is cheap to `Clone` and safe to share across
/// threads (spec §5: "core codec types are shareable immutable").
#[derive(Clone, Debug)]
pub struct Dialect {
    pub(crate) delimiter: u8,
    pub(crate) line_ending: LineEnding,
    pub(crate) has_headers: bool,
    pub(crate) trim_whitespace: bool,
    pub(crate) parsing_mode: ParsingMode,
    pub(crate) expected_field_count: Option<usize>,
    pub(crate) quote_style: QuoteStyle,
}

impl Default for Dialect {
    fn default() -> Dialect {
        Dialect {
            delimiter: b',',
            line_ending: LineEnding::default(),
            has_headers: true,
            trim_whitespace: true,
            parsing_mode: ParsingMode::default(),
            expected_field_count: None,
            quote_style: QuoteStyle::default(),
        }
    }
}

impl Dialect {
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn has_headers(&self) -> bool {
        self.has_headers
    }

    pub fn parsing_mode(&self) -> ParsingMode {
        self.parsing_mode
    }
}

/// Builds a [`Dialect`]. Mirrors the chained `&mut self -> &mut Self` style
/// of the crate's [`crate::writer::WriterBuilder`].
#[derive(Debug, Default)]
pub struct DialectBuilder {
    dialect: Dialect,
}

impl DialectBuilder {
    pub fn new() -> DialectBuilder {
        DialectBuilder::default()
    }

    pub fn build(&self) -> Dialect {
        self.dialect.clone()
    }

    /// The field delimiter to use. The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut DialectBuilder {
        self.dialect.delimiter = delimiter;
        self
    }

    /// The line ending accepted on decode / written on encode.
    pub fn line_ending(&mut self, line_ending: LineEnding) -> &mut DialectBuilder {
        self.dialect.line_ending = line_ending;
        self
    }

    /// Whether the first row is a header row. Default `true`.
    pub fn has_headers(&mut self, yes: bool) -> &mut DialectBuilder {
        self.dialect.has_headers = yes;
        self
    }

    /// Whether unquoted fields are trimmed of leading/trailing ASCII
    /// space/tab. Default `true` on decode.
    pub fn trim_whitespace(&mut self, yes: bool) -> &mut DialectBuilder {
        self.dialect.trim_whitespace = yes;
        self
    }

    /// RFC-4180 conformance level. Default [`ParsingMode::Lenient`].
    pub fn parsing_mode(&mut self, mode: ParsingMode) -> &mut DialectBuilder {
        self.dialect.parsing_mode = mode;
        self
    }

    /// When set, strict mode rejects any row whose field count differs.
    pub fn expected_field_count(&mut self, n: usize) -> &mut DialectBuilder {
        self.dialect.expected_field_count = Some(n);
        self
    }

    /// The quoting style used on encode. Default [`QuoteStyle::Necessary`].
    pub fn quote_style(&mut self, style: QuoteStyle) -> &mut DialectBuilder {
        self.dialect.quote_style = style;
        self
    }
}
