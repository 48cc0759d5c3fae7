//! Strategy enums for [`crate::translate::ValueTranslator`] (spec §4.3, §6).
//!
//! All strategies are sum types; variants that carry functions require
//! `Fn(..) -> .. + Send + Sync` so a [`crate::strategy::StrategySet`] stays
//! shareable across the parallel decoder's worker threads (spec §9:
//! "Strategy enums and closures").

use std::sync::Arc;

use crate::locale::Locale;

pub type CustomFn<I, O> = Arc<dyn Fn(I) -> Result<O, String> + Send + Sync>;

#[derive(Clone)]
#[non_exhaustive]
pub enum DateDecodingStrategy {
    Deferred,
    SecondsSince1970,
    MsSince1970,
    Iso8601,
    Formatted(String),
    Flexible,
    FlexibleWithHint(String),
    LocaleAware(Locale, DateStyle),
    Custom(CustomFn<String, i64>),
}

impl Default for DateDecodingStrategy {
    fn default() -> Self {
        DateDecodingStrategy::Iso8601
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateStyle {
    Numeric,
    Abbreviated,
    Long,
}

#[derive(Clone)]
#[non_exhaustive]
pub enum DateEncodingStrategy {
    Iso8601,
    SecondsSince1970,
    MsSince1970,
    Formatted(String),
    Custom(CustomFn<i64, String>),
}

impl Default for DateEncodingStrategy {
    fn default() -> Self {
        DateEncodingStrategy::Iso8601
    }
}

#[derive(Clone)]
#[non_exhaustive]
pub enum NumberDecodingStrategy {
    Standard,
    Flexible,
    Locale(Locale),
    ParseStrategy(Locale),
    Currency { code: Option<String>, locale: Locale },
}

impl Default for NumberDecodingStrategy {
    fn default() -> Self {
        NumberDecodingStrategy::Standard
    }
}

#[derive(Clone)]
#[non_exhaustive]
pub enum NumberEncodingStrategy {
    Standard,
    Locale(Locale),
    Custom(CustomFn<f64, String>),
}

impl Default for NumberEncodingStrategy {
    fn default() -> Self {
        NumberEncodingStrategy::Standard
    }
}

#[derive(Clone)]
#[non_exhaustive]
pub enum BoolDecodingStrategy {
    Standard,
    Flexible,
    Custom { truthy: Vec<String>, falsy: Vec<String> },
}

impl Default for BoolDecodingStrategy {
    fn default() -> Self {
        BoolDecodingStrategy::Standard
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum BoolEncodingStrategy {
    TrueFalse,
    Numeric,
    YesNo,
}

impl Default for BoolEncodingStrategy {
    fn default() -> Self {
        BoolEncodingStrategy::Numeric
    }
}

#[derive(Clone)]
#[non_exhaustive]
pub enum NilDecodingStrategy {
    EmptyString,
    NullLiteral,
    Custom(Vec<String>),
}

impl Default for NilDecodingStrategy {
    fn default() -> Self {
        NilDecodingStrategy::EmptyString
    }
}

#[derive(Clone)]
#[non_exhaustive]
pub enum NilEncodingStrategy {
    EmptyString,
    NullLiteral,
    Custom(String),
}

impl Default for NilEncodingStrategy {
    fn default() -> Self {
        NilEncodingStrategy::EmptyString
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyDecodingStrategy {
    Default,
    Snake,
    Kebab,
    Screaming,
    Pascal,
}

impl Default for KeyDecodingStrategy {
    fn default() -> Self {
        KeyDecodingStrategy::Default
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyEncodingStrategy {
    Default,
    Snake,
    Kebab,
    Screaming,
}

impl Default for KeyEncodingStrategy {
    fn default() -> Self {
        KeyEncodingStrategy::Default
    }
}

#[derive(Clone)]
#[non_exhaustive]
pub enum NestedType {
    Error,
    Flatten(String),
    Json,
    Codable,
}

impl Default for NestedType {
    fn default() -> Self {
        NestedType::Error
    }
}

/// The immutable bundle of per-type conversion strategies bound to a single
/// encode or decode call.
#[derive(Clone, Default)]
pub struct StrategySet {
    pub date_decoding: DateDecodingStrategy,
    pub date_encoding: DateEncodingStrategy,
    pub number_decoding: NumberDecodingStrategy,
    pub number_encoding: NumberEncodingStrategy,
    pub bool_decoding: BoolDecodingStrategy,
    pub bool_encoding: BoolEncodingStrategy,
    pub nil_decoding: NilDecodingStrategy,
    pub nil_encoding: NilEncodingStrategy,
    pub key_decoding: KeyDecodingStrategy,
    pub key_encoding: KeyEncodingStrategy,
    pub nested: NestedType,
}

/// Builds a [`StrategySet`] with the same `&mut self -> &mut Self` chaining
/// style as [`crate::dialect::DialectBuilder`].
#[derive(Debug, Default)]
pub struct StrategySetBuilder {
    set: StrategySetInner,
}

// Kept as a thin alias so the builder can hold a `StrategySet` without
// requiring `StrategySet: Debug` (its `Custom(..)` closures aren't).
#[derive(Default)]
struct StrategySetInner(StrategySet);

impl std::fmt::Debug for StrategySetInner {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("StrategySet").finish_non_exhaustive()
    }
}

impl StrategySetBuilder {
    pub fn new() -> StrategySetBuilder {
        StrategySetBuilder::default()
    }

    pub fn build(&self) -> StrategySet {
        self.set.0.clone()
    }

    pub fn date_decoding(&mut self, s: DateDecodingStrategy) -> &mut Self {
        self.set.0.date_decoding = s;
        self
    }

    pub fn date_encoding(&mut self, s: DateEncodingStrategy) -> &mut Self {
        self.set.0.date_encoding = s;
        self
    }

    pub fn number_decoding(&mut self, s: NumberDecodingStrategy) -> &mut Self {
        self.set.0.number_decoding = s;
        self
    }

    pub fn number_encoding(&mut self, s: NumberEncodingStrategy) -> &mut Self {
        self.set.0.number_encoding = s;
        self
    }

    pub fn bool_decoding(&mut self, s: BoolDecodingStrategy) -> &mut Self {
        self.set.0.bool_decoding = s;
        self
    }

    pub fn bool_encoding(&mut self, s: BoolEncodingStrategy) -> &mut Self {
        self.set.0.bool_encoding = s;
        self
    }

    pub fn nil_decoding(&mut self, s: NilDecodingStrategy) -> &mut Self {
        self.set.0.nil_decoding = s;
        self
    }

    pub fn nil_encoding(&mut self, s: NilEncodingStrategy) -> &mut Self {
        self.set.0.nil_encoding = s;
        self
    }

    pub fn key_decoding(&mut self, s: KeyDecodingStrategy) -> &mut Self {
        self.set.0.key_decoding = s;
        self
    }

    pub fn key_encoding(&mut self, s: KeyEncodingStrategy) -> &mut Self {
        self.set.0.key_encoding = s;
        self
    }

    pub fn nested(&mut self, s: NestedType) -> &mut Self {
        self.set.0.nested = s;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_encode_side() {
        let s = StrategySet::default();
        assert!(matches!(s.bool_encoding, BoolEncodingStrategy::Numeric));
        assert!(matches!(s.nil_encoding, NilEncodingStrategy::EmptyString));
        assert!(matches!(s.date_encoding, DateEncodingStrategy::Iso8601));
        assert!(matches!(s.nested, NestedType::Error));
    }
}
