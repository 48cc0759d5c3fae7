//! Field-level value translation (spec §4.3): applies per-type strategies
//! with locale- and typo-aware behavior.

use crate::datetime;
use crate::error::Error;
use crate::locale::{BuiltinLocales, Locale, LocaleProvider, NumberMarks};
use crate::strategy::{
    BoolDecodingStrategy, BoolEncodingStrategy, DateDecodingStrategy, DateEncodingStrategy,
    NilDecodingStrategy, NilEncodingStrategy, NumberDecodingStrategy, NumberEncodingStrategy,
};

/// Binds per-type conversion strategies to a shared locale provider. Holds
/// no decode-local state, so one instance may be reused (and shared across
/// threads) for an entire decode or encode call.
pub struct ValueTranslator<'a> {
    pub locales: &'a dyn LocaleProvider,
}

impl Default for ValueTranslator<'static> {
    fn default() -> Self {
        ValueTranslator { locales: &BuiltinLocales }
    }
}

impl<'a> ValueTranslator<'a> {
    pub fn new(locales: &'a dyn LocaleProvider) -> Self {
        ValueTranslator { locales }
    }

    /// Whether `field` should be treated as nil under `strategy`. Applied
    /// before any typed conversion (spec §4.3).
    pub fn decode_nil(&self, field: &str, strategy: &NilDecodingStrategy) -> bool {
        match strategy {
            NilDecodingStrategy::EmptyString => field.is_empty(),
            NilDecodingStrategy::NullLiteral => field.eq_ignore_ascii_case("null"),
            NilDecodingStrategy::Custom(set) => {
                let trimmed = field.trim();
                set.iter().any(|s| s == trimmed)
            }
        }
    }

    pub fn decode_bool(&self, field: &str, strategy: &BoolDecodingStrategy) -> Result<bool, String> {
        let lower = field.trim().to_lowercase();
        match strategy {
            BoolDecodingStrategy::Standard => match lower.as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(field.to_string()),
            },
            BoolDecodingStrategy::Flexible => match lower.as_str() {
                "true" | "yes" | "1" | "oui" | "ja" | "да" | "是" => Ok(true),
                "false" | "no" | "0" | "non" | "nein" | "нет" | "否" => Ok(false),
                _ => Err(field.to_string()),
            },
            BoolDecodingStrategy::Custom { truthy, falsy } => {
                if truthy.iter().any(|s| s.eq_ignore_ascii_case(&lower)) {
                    Ok(true)
                } else if falsy.iter().any(|s| s.eq_ignore_ascii_case(&lower)) {
                    Ok(false)
                } else {
                    Err(field.to_string())
                }
            }
        }
    }

    pub fn encode_bool(&self, value: bool, strategy: BoolEncodingStrategy) -> String {
        match (strategy, value) {
            (BoolEncodingStrategy::TrueFalse, true) => "true".to_string(),
            (BoolEncodingStrategy::TrueFalse, false) => "false".to_string(),
            (BoolEncodingStrategy::Numeric, true) => "1".to_string(),
            (BoolEncodingStrategy::Numeric, false) => "0".to_string(),
            (BoolEncodingStrategy::YesNo, true) => "yes".to_string(),
            (BoolEncodingStrategy::YesNo, false) => "no".to_string(),
        }
    }

    pub fn decode_i64(&self, field: &str, strategy: &NumberDecodingStrategy) -> Result<i64, String> {
        let cleaned = self.clean_number_text(field, strategy)?;
        cleaned.parse::<i64>().map_err(|_| field.to_string())
    }

    pub fn decode_f64(&self, field: &str, strategy: &NumberDecodingStrategy) -> Result<f64, String> {
        let cleaned = self.clean_number_text(field, strategy)?;
        cleaned.parse::<f64>().map_err(|_| field.to_string())
    }

    /// Strips grouping separators and currency symbols, and normalizes the
    /// decimal mark to `.`, returning a string `str::parse` can consume.
    fn clean_number_text(&self, field: &str, strategy: &NumberDecodingStrategy) -> Result<String, String> {
        let trimmed = field.trim();
        match strategy {
            NumberDecodingStrategy::Standard => {
                if trimmed.contains(',') {
                    return Err(field.to_string());
                }
                Ok(trimmed.to_string())
            }
            NumberDecodingStrategy::Flexible => flexible_number(trimmed).ok_or_else(|| field.to_string()),
            NumberDecodingStrategy::Locale(locale) | NumberDecodingStrategy::ParseStrategy(locale) => {
                let marks = self.locales.number_marks(*locale);
                Ok(normalize_marks(trimmed, marks))
            }
            NumberDecodingStrategy::Currency { code: _, locale } => {
                let marks = self.locales.number_marks(*locale);
                let stripped: String = trimmed
                    .chars()
                    .filter(|c| !"$€£¥₹".contains(*c) && !c.is_alphabetic())
                    .collect();
                Ok(normalize_marks(stripped.trim(), marks))
            }
        }
    }

    pub fn encode_number(&self, value: f64, strategy: &NumberEncodingStrategy) -> String {
        match strategy {
            NumberEncodingStrategy::Standard => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    format!("{}", value as i64)
                } else {
                    let mut buf = ryu::Buffer::new();
                    buf.format(value).to_string()
                }
            }
            NumberEncodingStrategy::Locale(locale) => {
                let marks = self.locales.number_marks(*locale);
                let standard = self.encode_number(value, &NumberEncodingStrategy::Standard);
                standard.replace('.', &marks.decimal.to_string())
            }
            NumberEncodingStrategy::Custom(f) => f(value).unwrap_or_default(),
        }
    }

    pub fn encode_i64(&self, value: i64) -> String {
        let mut buf = itoa::Buffer::new();
        buf.format(value).to_string()
    }

    pub fn decode_date(&self, field: &str, strategy: &DateDecodingStrategy) -> Result<i64, String> {
        let trimmed = field.trim();
        match strategy {
            DateDecodingStrategy::Deferred | DateDecodingStrategy::Iso8601 => {
                datetime::parse_iso8601(trimmed).ok_or_else(|| field.to_string())
            }
            DateDecodingStrategy::SecondsSince1970 => trimmed.parse::<i64>().map_err(|_| field.to_string()),
            DateDecodingStrategy::MsSince1970 => trimmed
                .parse::<i64>()
                .map(|ms| ms.div_euclid(1000))
                .map_err(|_| field.to_string()),
            DateDecodingStrategy::Formatted(pattern) => {
                datetime::parse_pattern(trimmed, pattern).ok_or_else(|| field.to_string())
            }
            DateDecodingStrategy::Flexible => datetime::parse_flexible(trimmed).ok_or_else(|| field.to_string()),
            DateDecodingStrategy::FlexibleWithHint(preferred) => {
                datetime::parse_pattern(trimmed, preferred)
                    .or_else(|| datetime::parse_flexible(trimmed))
                    .ok_or_else(|| field.to_string())
            }
            DateDecodingStrategy::LocaleAware(locale, style) => {
                self.decode_locale_aware_date(trimmed, *locale, *style)
            }
            DateDecodingStrategy::Custom(f) => f(trimmed.to_string()).map_err(|_| field.to_string()),
        }
    }

    fn decode_locale_aware_date(
        &self,
        trimmed: &str,
        locale: Locale,
        style: crate::strategy::DateStyle,
    ) -> Result<i64, String> {
        let names = self.locales.month_names(locale, style);
        for pattern in ["d MMM yyyy", "MMM d, yyyy", "dd.MM.yyyy", "dd/MM/yyyy"] {
            if let Some(ts) = datetime::parse_pattern(trimmed, pattern) {
                return Ok(ts);
            }
        }
        let _ = names;
        Err(trimmed.to_string())
    }

    pub fn encode_date(&self, epoch_seconds: i64, strategy: &DateEncodingStrategy) -> String {
        match strategy {
            DateEncodingStrategy::Iso8601 => datetime::format_iso8601(epoch_seconds),
            DateEncodingStrategy::SecondsSince1970 => epoch_seconds.to_string(),
            DateEncodingStrategy::MsSince1970 => (epoch_seconds * 1000).to_string(),
            DateEncodingStrategy::Formatted(pattern) => datetime::format_pattern(epoch_seconds, pattern),
            DateEncodingStrategy::Custom(f) => f(epoch_seconds).unwrap_or_default(),
        }
    }
}

/// The EU/US ambiguity heuristic documented in spec §4.3 and resolved per
/// spec §9's open question: EU interpretation wins only when there's no `.`
/// anywhere in the field.
fn flexible_number(s: &str) -> Option<String> {
    let stripped: String = s
        .chars()
        .filter(|c| !"$€£¥₹".contains(*c) && !(c.is_alphabetic()))
        .collect();
    let stripped = stripped.trim();
    let has_comma = stripped.contains(',');
    let has_dot = stripped.contains('.');

    if has_comma && has_dot {
        let last_comma = stripped.rfind(',').unwrap();
        let last_dot = stripped.rfind('.').unwrap();
        if last_comma > last_dot {
            // comma is the decimal separator; dot is grouping.
            Some(stripped.replace('.', "").replace(',', "."))
        } else {
            Some(stripped.replace(',', ""))
        }
    } else if has_comma {
        let digits_after = stripped.rsplit(',').next().unwrap_or("").len();
        if stripped.matches(',').count() == 1 && digits_after >= 3 {
            Some(stripped.replace(',', "."))
        } else {
            Some(stripped.replace(',', ""))
        }
    } else {
        Some(stripped.to_string())
    }
}

fn normalize_marks(s: &str, marks: NumberMarks) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == marks.grouping {
            continue;
        }
        if c == marks.decimal {
            out.push('.');
        } else {
            out.push(c);
        }
    }
    out
}

pub(crate) fn type_mismatch(expected: &str, field: &str) -> Error {
    Error::type_mismatch(expected, field, Default::default())
}
