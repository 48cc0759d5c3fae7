//! RFC-4180 field escaping and unescaping (spec §4.1).
//!
//! Mirrors the resize-then-fill style of [`crate::writer::Writer`]'s
//! `write_field_impl`/`extend` helpers rather than pushing byte-by-byte.

/// Fields at or above this length take the word-at-a-time scan path.
const SIMD_THRESHOLD: usize = 64;

#[inline]
fn needs_quote_byte(b: u8, delim: u8) -> bool {
    b == delim || b == b'"' || b == b'\n' || b == b'\r'
}

/// Scalar byte-at-a-time scan, used below [`SIMD_THRESHOLD`].
fn scan_scalar(src: &[u8], delim: u8) -> bool {
    src.iter().any(|&b| needs_quote_byte(b, delim))
}

/// Word-at-a-time scan over 8-byte chunks, used at/above [`SIMD_THRESHOLD`].
///
/// This is the "SIMD-friendly" prescan spec §4.1 calls for: rather than a
/// real platform SIMD intrinsic (out of scope for a portable core), eight
/// bytes are tested at once via a handful of XOR/OR compares, which the
/// compiler auto-vectorizes on targets that support it.
fn scan_wide(src: &[u8], delim: u8) -> bool {
    let chunks = src.chunks_exact(8);
    let remainder = chunks.remainder();
    for chunk in chunks {
        let word = u64::from_ne_bytes(chunk.try_into().unwrap());
        if word_has_any(word, delim) {
            return true;
        }
    }
    scan_scalar(remainder, delim)
}

#[inline]
fn word_has_any(word: u64, delim: u8) -> bool {
    has_byte(word, delim) || has_byte(word, b'"') || has_byte(word, b'\n') || has_byte(word, b'\r')
}

/// Classic "find a zero byte" bit trick, applied to `word XOR splat(needle)`.
#[inline]
fn has_byte(word: u64, needle: u8) -> bool {
    const LO: u64 = 0x0101_0101_0101_0101;
    const HI: u64 = 0x8080_8080_8080_8080;
    let x = word ^ (LO.wrapping_mul(needle as u64));
    ((x.wrapping_sub(LO)) & !x & HI) != 0
}

fn needs_quoting(src: &[u8], delim: u8) -> bool {
    if src.len() >= SIMD_THRESHOLD {
        scan_wide(src, delim)
    } else {
        scan_scalar(src, delim)
    }
}

/// Appends `src`, RFC-4180-escaped for the given delimiter, to `out`.
///
/// An empty field is written as zero bytes (the caller is responsible for
/// the field separator itself; two consecutive delimiters around an empty
/// field is a property of the caller's loop, not of this function). No
/// allocation occurs on the unquoted path.
pub fn append_escaped(src: &[u8], out: &mut Vec<u8>, delim: u8) {
    if !needs_quoting(src, delim) {
        out.extend_from_slice(src);
        return;
    }
    out.reserve(src.len() + 2);
    out.push(b'"');
    let mut start = 0;
    for (i, &b) in src.iter().enumerate() {
        if b == b'"' {
            out.extend_from_slice(&src[start..i]);
            out.extend_from_slice(b"\"\"");
            start = i + 1;
        }
    }
    out.extend_from_slice(&src[start..]);
    out.push(b'"');
}

/// Unescapes a field slice taken from [`crate::parser::RowView`].
///
/// If `was_quoted` is false the slice is returned unchanged (no allocation).
/// If true, any `""` pair is collapsed to a single `"`.
pub fn unescape(slice: &[u8], was_quoted: bool) -> std::borrow::Cow<'_, [u8]> {
    if !was_quoted || !slice.contains(&b'"') {
        return std::borrow::Cow::Borrowed(slice);
    }
    let mut out = Vec::with_capacity(slice.len());
    let mut i = 0;
    while i < slice.len() {
        if slice[i] == b'"' && slice.get(i + 1) == Some(&b'"') {
            out.push(b'"');
            i += 2;
        } else {
            out.push(slice[i]);
            i += 1;
        }
    }
    std::borrow::Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esc(s: &str) -> String {
        let mut out = vec![];
        append_escaped(s.as_bytes(), &mut out, b',');
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn plain_field_is_verbatim() {
        assert_eq!(esc("hello"), "hello");
    }

    #[test]
    fn empty_field_is_empty() {
        assert_eq!(esc(""), "");
    }

    #[test]
    fn delimiter_triggers_quoting() {
        assert_eq!(esc("a,b"), "\"a,b\"");
    }

    #[test]
    fn embedded_quote_is_doubled() {
        assert_eq!(esc(r#"he said "hi""#), r#""he said ""hi""""#);
    }

    #[test]
    fn newline_triggers_quoting() {
        assert_eq!(esc("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn long_field_without_special_bytes_is_verbatim() {
        let long = "x".repeat(200);
        assert_eq!(esc(&long), long);
    }

    #[test]
    fn long_field_with_quote_near_the_end_is_quoted() {
        let mut s = "x".repeat(100);
        s.push('"');
        let out = esc(&s);
        assert!(out.starts_with('"') && out.ends_with('"'));
        assert!(out.contains("\"\""));
    }

    #[test]
    fn unescape_roundtrip() {
        let quoted = br#"he said ""hi"""#;
        let unescaped = unescape(quoted, true);
        assert_eq!(&*unescaped, br#"he said "hi""#);
    }

    #[test]
    fn unescape_unquoted_is_verbatim() {
        let s = b"he said \"\"hi\"\"";
        assert_eq!(&*unescape(s, false), s);
    }

    proptest::proptest! {
        #[test]
        fn escape_then_unescape_roundtrips(s in "\\PC*") {
            let bytes = s.as_bytes();
            let mut out = vec![];
            append_escaped(bytes, &mut out, b',');
            let was_quoted = out.first() == Some(&b'"');
            let inner = if was_quoted { &out[1..out.len() - 1] } else { &out[..] };
            let back = unescape(inner, was_quoted);
            proptest::prop_assert_eq!(&*back, bytes);
        }
    }
}
