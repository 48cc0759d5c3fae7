//! Case-style key conversion (spec §4.5).

use crate::strategy::{KeyDecodingStrategy, KeyEncodingStrategy};

/// Converts a `snake_case` or `kebab-case` key to `camelCase`.
fn delimited_to_camel(key: &str, sep: char) -> String {
    let mut out = String::with_capacity(key.len());
    let mut capitalize_next = false;
    for (i, segment) in key.split(sep).enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            out.push_str(&segment.to_lowercase());
        } else {
            capitalize_next = true;
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                if capitalize_next {
                    out.extend(first.to_uppercase());
                } else {
                    out.extend(first.to_lowercase());
                }
            }
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

fn pascal_to_camel(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Decodes a raw header/key into the form the record description expects,
/// per the [`KeyDecodingStrategy`] chosen.
pub fn decode_key(key: &str, strategy: KeyDecodingStrategy) -> String {
    match strategy {
        KeyDecodingStrategy::Default => key.to_string(),
        KeyDecodingStrategy::Snake => delimited_to_camel(key, '_'),
        KeyDecodingStrategy::Kebab => delimited_to_camel(key, '-'),
        KeyDecodingStrategy::Screaming => delimited_to_camel(&key.to_lowercase(), '_'),
        KeyDecodingStrategy::Pascal => pascal_to_camel(key),
    }
}

fn camel_to_delimited(key: &str, sep: char, screaming: bool) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push(sep);
        }
        if screaming {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Encodes a record key into the header form to emit, per the
/// [`KeyEncodingStrategy`] chosen. This is the inverse direction of
/// [`decode_key`] applied at header-emission time (spec §4.3: "Key
/// transformation is applied only on encode side header emission").
pub fn encode_key(key: &str, strategy: KeyEncodingStrategy) -> String {
    match strategy {
        KeyEncodingStrategy::Default => key.to_string(),
        KeyEncodingStrategy::Snake => camel_to_delimited(key, '_', false),
        KeyEncodingStrategy::Kebab => camel_to_delimited(key, '-', false),
        KeyEncodingStrategy::Screaming => camel_to_delimited(key, '_', true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_to_camel() {
        assert_eq!(decode_key("first_name", KeyDecodingStrategy::Snake), "firstName");
        assert_eq!(decode_key("last_name", KeyDecodingStrategy::Snake), "lastName");
    }

    #[test]
    fn kebab_to_camel() {
        assert_eq!(decode_key("first-name", KeyDecodingStrategy::Kebab), "firstName");
    }

    #[test]
    fn screaming_snake_to_camel() {
        assert_eq!(decode_key("FIRST_NAME", KeyDecodingStrategy::Screaming), "firstName");
    }

    #[test]
    fn pascal_to_camel_case() {
        assert_eq!(decode_key("FirstName", KeyDecodingStrategy::Pascal), "firstName");
    }

    #[test]
    fn default_is_identity() {
        assert_eq!(decode_key("firstName", KeyDecodingStrategy::Default), "firstName");
    }

    #[test]
    fn camel_to_snake_on_encode() {
        assert_eq!(encode_key("firstName", KeyEncodingStrategy::Snake), "first_name");
    }

    #[test]
    fn camel_to_screaming_on_encode() {
        assert_eq!(encode_key("firstName", KeyEncodingStrategy::Screaming), "FIRST_NAME");
    }
}
