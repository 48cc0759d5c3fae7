//! Zero-copy streaming CSV parser (spec §4.2).
//!
//! Single-pass byte scanner over a contiguous buffer producing
//! [`RowView`]s whose field slices borrow directly from the input. The
//! parser never allocates and never fails outright — RFC-4180 violations
//! are recorded as flags on the row and policy (lenient/strict) is decided
//! by [`crate::codec`], not here.

use crate::escape;

/// One field within a [`RowView`]: an offset/length pair into the parser's
/// source buffer, plus whether it was found inside quotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSlice {
    start: usize,
    len: usize,
    pub was_quoted: bool,
}

impl FieldSlice {
    /// The raw bytes of this field within `buf`. Quotes are not included;
    /// internal `""` escapes are not collapsed here (see
    /// [`RowView::field_str`] / [`escape::unescape`]).
    pub fn raw<'buf>(&self, buf: &'buf [u8]) -> &'buf [u8] {
        &buf[self.start..self.start + self.len]
    }
}

/// A non-owning description of one parsed CSV record.
///
/// `RowView`'s field slices are only valid for the lifetime of the buffer
/// passed to [`CsvParser::parse`]; the type carries no lifetime parameter
/// itself; see [`RowView::field_str`] which needs the caller to supply that
/// buffer back.
#[derive(Clone, Debug, Default)]
pub struct RowView {
    fields: Vec<FieldSlice>,
    pub unterminated_quote: bool,
    pub quote_in_unquoted_field: bool,
}

impl RowView {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[FieldSlice] {
        &self.fields
    }

    pub fn field(&self, i: usize) -> Option<&FieldSlice> {
        self.fields.get(i)
    }

    /// The unescaped, optionally-trimmed value of field `i`, materialized
    /// as an owned `String` only if unescaping was required.
    pub fn field_str<'buf>(&self, i: usize, buf: &'buf [u8], trim_whitespace: bool) -> Option<std::borrow::Cow<'buf, str>> {
        let field = self.fields.get(i)?;
        let raw = field.raw(buf);
        let trimmed = if trim_whitespace && !field.was_quoted {
            trim_ascii_whitespace(raw)
        } else {
            raw
        };
        let unescaped = escape::unescape(trimmed, field.was_quoted);
        Some(match unescaped {
            std::borrow::Cow::Borrowed(b) => String::from_utf8_lossy(b),
            std::borrow::Cow::Owned(o) => std::borrow::Cow::Owned(String::from_utf8_lossy(&o).into_owned()),
        })
    }
}

fn trim_ascii_whitespace(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|&c| c != b' ' && c != b'\t').unwrap_or(b.len());
    let end = b.iter().rposition(|&c| c != b' ' && c != b'\t').map_or(start, |i| i + 1);
    &b[start..end]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuotedSawQuote,
}

/// Strips a leading UTF-8 BOM (`EF BB BF`) if present.
pub fn strip_bom(buf: &[u8]) -> &[u8] {
    if buf.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &buf[3..]
    } else {
        buf
    }
}

/// A single-pass tokenizer that turns a byte buffer into [`RowView`]s.
///
/// BOM stripping happens once, in [`CsvParser::parse`]; everything past
/// that point operates on the stripped slice's own offsets so a `RowView`'s
/// field offsets are always relative to the slice the caller handed in
/// *after* BOM stripping (callers that need the original offsets should
/// strip the BOM themselves before calling).
pub struct CsvParser {
    delimiter: u8,
}

impl CsvParser {
    pub fn new(delimiter: u8) -> CsvParser {
        CsvParser { delimiter }
    }

    /// Parses every row in `buf`, calling `on_row` with each [`RowView`] as
    /// it completes. Returns the number of rows emitted.
    ///
    /// This is the streaming entry point: the parser holds no buffered
    /// state beyond the row currently being built, so `on_row` may be used
    /// to bound memory (e.g. the parallel decoder calls this once per
    /// chunk).
    pub fn parse(&self, buf: &[u8], mut on_row: impl FnMut(RowView)) -> usize {
        let mut state = State::FieldStart;
        let mut row = RowView::default();
        let mut field_start = 0usize;
        let mut was_quoted = false;
        let mut rows = 0usize;
        let mut i = 0usize;
        let n = buf.len();

        macro_rules! end_field {
            ($end:expr) => {{
                row.fields.push(FieldSlice {
                    start: field_start,
                    len: $end - field_start,
                    was_quoted,
                });
                was_quoted = false;
            }};
        }

        macro_rules! end_row {
            () => {{
                on_row(std::mem::take(&mut row));
                rows += 1;
            }};
        }

        while i < n {
            let b = buf[i];
            match state {
                State::FieldStart => match b {
                    b'"' => {
                        was_quoted = true;
                        field_start = i + 1;
                        state = State::Quoted;
                        i += 1;
                    }
                    _ if b == self.delimiter => {
                        field_start = i;
                        end_field!(i);
                        field_start = i + 1;
                        i += 1;
                    }
                    b'\n' => {
                        field_start = i;
                        end_field!(i);
                        end_row!();
                        field_start = i + 1;
                        i += 1;
                    }
                    b'\r' => {
                        field_start = i;
                        end_field!(i);
                        end_row!();
                        i += 1;
                        if i < n && buf[i] == b'\n' {
                            i += 1;
                        }
                        field_start = i;
                    }
                    _ => {
                        field_start = i;
                        state = State::Unquoted;
                        i += 1;
                    }
                },
                State::Unquoted => match b {
                    _ if b == self.delimiter => {
                        end_field!(i);
                        field_start = i + 1;
                        i += 1;
                        state = State::FieldStart;
                    }
                    b'\n' => {
                        end_field!(i);
                        end_row!();
                        i += 1;
                        field_start = i;
                        state = State::FieldStart;
                    }
                    b'\r' => {
                        end_field!(i);
                        end_row!();
                        i += 1;
                        if i < n && buf[i] == b'\n' {
                            i += 1;
                        }
                        field_start = i;
                        state = State::FieldStart;
                    }
                    b'"' => {
                        row_set_quote_violation(&mut row);
                        i += 1;
                    }
                    _ => {
                        i += 1;
                    }
                },
                State::Quoted => match b {
                    b'"' => {
                        state = State::QuotedSawQuote;
                        i += 1;
                    }
                    _ => {
                        i += 1;
                    }
                },
                State::QuotedSawQuote => match b {
                    b'"' => {
                        // `""` inside quotes: escaped quote, stay quoted.
                        state = State::Quoted;
                        i += 1;
                    }
                    _ if b == self.delimiter => {
                        end_field!(i - 1);
                        field_start = i + 1;
                        i += 1;
                        state = State::FieldStart;
                    }
                    b'\n' => {
                        end_field!(i - 1);
                        end_row!();
                        i += 1;
                        field_start = i;
                        state = State::FieldStart;
                    }
                    b'\r' => {
                        end_field!(i - 1);
                        end_row!();
                        i += 1;
                        if i < n && buf[i] == b'\n' {
                            i += 1;
                        }
                        field_start = i;
                        state = State::FieldStart;
                    }
                    _ => {
                        // Closing quote followed by more data that is
                        // neither a delimiter nor a line ending: the quote
                        // still closes the field (spec §4.2: "+ other ⇒
                        // still considered closing quote"), and this byte
                        // is reinterpreted under FieldStart semantics,
                        // flagging the violation.
                        end_field!(i - 1);
                        row_set_quote_violation(&mut row);
                        state = State::FieldStart;
                        // don't advance `i`; re-dispatch as FieldStart.
                    }
                },
            }
        }

        // EOF handling.
        match state {
            State::FieldStart => {
                if !row.fields.is_empty() {
                    // The buffer ended right after a delimiter: one more
                    // (empty) field is implied, and the row it completes
                    // must still be emitted.
                    end_field!(n);
                    end_row!();
                }
            }
            State::Unquoted => {
                end_field!(n);
                end_row!();
            }
            State::Quoted | State::QuotedSawQuote => {
                if matches!(state, State::QuotedSawQuote) {
                    end_field!(n - 1);
                } else {
                    row.unterminated_quote = true;
                    end_field!(n);
                }
                if matches!(state, State::Quoted) {
                    row.unterminated_quote = true;
                }
                end_row!();
            }
        }

        rows
    }
}

fn row_set_quote_violation(row: &mut RowView) {
    row.quote_in_unquoted_field = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &str, delim: u8) -> Vec<Vec<String>> {
        let buf = strip_bom(input.as_bytes());
        let parser = CsvParser::new(delim);
        let mut rows = vec![];
        parser.parse(buf, |row| {
            let fields: Vec<String> = (0..row.field_count())
                .map(|i| row.field_str(i, buf, true).unwrap().into_owned())
                .collect();
            rows.push(fields);
        });
        rows
    }

    #[test]
    fn simple_rows() {
        let rows = parse_all("name,age\nAlice,30\nBob,25", b',');
        assert_eq!(
            rows,
            vec![
                vec!["name".to_string(), "age".to_string()],
                vec!["Alice".to_string(), "30".to_string()],
                vec!["Bob".to_string(), "25".to_string()],
            ]
        );
    }

    #[test]
    fn quoted_delimiter_and_escaped_quote() {
        let rows = parse_all("a,b\n\"x,y\",\"he said \"\"hi\"\"\"", b',');
        assert_eq!(
            rows[1],
            vec!["x,y".to_string(), "he said \"hi\"".to_string()]
        );
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert_eq!(parse_all("", b','), Vec::<Vec<String>>::new());
    }

    #[test]
    fn single_row_without_trailing_newline() {
        assert_eq!(parse_all("a,b,c", b','), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn trailing_delimiter_at_eof_yields_final_empty_field() {
        assert_eq!(parse_all("a,b,", b','), vec![vec!["a", "b", ""]]);
    }

    #[test]
    fn only_two_quotes_is_empty_string() {
        let rows = parse_all("a\n\"\"", b',');
        assert_eq!(rows[1], vec!["".to_string()]);
    }

    #[test]
    fn quoted_newline_is_preserved() {
        let rows = parse_all("a\n\"line1\nline2\"", b',');
        assert_eq!(rows[1], vec!["line1\nline2".to_string()]);
    }

    #[test]
    fn crlf_lf_and_cr_all_accepted() {
        assert_eq!(parse_all("a,b\r\n1,2", b','), vec![vec!["a", "b"], vec!["1", "2"]]);
        assert_eq!(parse_all("a,b\n1,2", b','), vec![vec!["a", "b"], vec!["1", "2"]]);
        assert_eq!(parse_all("a,b\r1,2", b','), vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn unterminated_quote_is_flagged() {
        let buf = b"a,b\n\"oops";
        let parser = CsvParser::new(b',');
        let mut flags = vec![];
        parser.parse(buf, |row| flags.push(row.unterminated_quote));
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn stray_quote_in_unquoted_field_is_flagged() {
        let buf = b"a,b\nfo\"o,bar";
        let parser = CsvParser::new(b',');
        let mut flags = vec![];
        parser.parse(buf, |row| flags.push(row.quote_in_unquoted_field));
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn bom_is_stripped() {
        let with_bom = b"\xEF\xBB\xBFa,b\n1,2";
        let stripped = strip_bom(with_bom);
        assert_eq!(stripped, b"a,b\n1,2");
    }

    proptest::proptest! {
        #[test]
        fn never_reads_outside_buffer(input in "\\PC{0,200}") {
            let buf = input.as_bytes();
            let parser = CsvParser::new(b',');
            let mut in_bounds = true;
            parser.parse(buf, |row| {
                for field in row.fields() {
                    let raw = field.raw(buf);
                    let start_ok = raw.as_ptr() as usize >= buf.as_ptr() as usize;
                    let end_ok = raw.as_ptr() as usize + raw.len() <= buf.as_ptr() as usize + buf.len();
                    in_bounds &= start_ok && end_ok;
                }
            });
            proptest::prop_assert!(in_bounds);
        }
    }
}
