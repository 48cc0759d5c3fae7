//! Type-directed row codec (spec §4.6): binds the parser and the
//! translator to a user record description, without runtime reflection.
//!
//! The "record description capability" from spec §3 is realized with
//! `serde`: encoding requires `T: Serialize`, decoding requires
//! `T: serde::de::DeserializeOwned`. Two private `serde` impls do the
//! actual binding — [`FieldValueSerializer`] (the "emitter") and
//! [`RowDeserializer`]/[`FieldDeserializer`] (the "visitor") — so dispatch
//! stays monomorphized by the derive macro rather than reflective (spec
//! §9).

use std::collections::HashMap;
use std::fmt;

use serde::de::{DeserializeOwned, DeserializeSeed, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Location};
use crate::header::HeaderMap;
use crate::parser::RowView;
use crate::strategy::{NestedType, StrategySet};
use crate::translate::ValueTranslator;

const DATE_MARKER: &str = "csv_codec::Date";

/// Wraps an integer field so the configured date strategy applies to it
/// instead of the configured number strategy.
///
/// ```
/// use csv_codec::codec::Date;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Event {
///     at: Date,
/// }
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Date(pub i64);

impl Serialize for Date {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(DATE_MARKER, &self.0)
    }
}

impl<'de> Deserialize<'de> for Date {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = Date;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a date")
            }
            fn visit_newtype_struct<D2>(self, deserializer: D2) -> Result<Self::Value, D2::Error>
            where
                D2: Deserializer<'de>,
            {
                i64::deserialize(deserializer).map(Date)
            }
            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Date(v))
            }
        }
        deserializer.deserialize_newtype_struct(DATE_MARKER, V)
    }
}

/// Insertion-ordered mapping from property name to an already-stringified
/// field value (spec §3). Key order is frozen from the first record a
/// [`crate::writer::Writer`] encodes.
#[derive(Clone, Debug, Default)]
pub struct EncodingStorage {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl EncodingStorage {
    pub fn set(&mut self, key: &str, value: String) {
        if let Some(&i) = self.index.get(key) {
            self.entries[i].1 = value;
        } else {
            self.index.insert(key.to_string(), self.entries.len());
            self.entries.push((key.to_string(), value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.entries[i].1.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

fn nested_storage_to_json(storage: &EncodingStorage) -> String {
    let map: serde_json::Map<String, serde_json::Value> = storage
        .entries()
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(map).to_string()
}

/// What serializing a single field value produced: either one string, or a
/// nested record's own flattened key/value pairs (a struct or map field).
enum FieldOutcome {
    Scalar(String),
    Nested(EncodingStorage),
}

/// The "emitter": accepts `(key, scalar | nested)` in declaration order.
/// Used both as the top-level record serializer and, recursively, for each
/// field's value.
struct FieldValueSerializer<'a> {
    strategies: &'a StrategySet,
    translator: &'a ValueTranslator<'a>,
}

impl<'a> FieldValueSerializer<'a> {
    fn new(strategies: &'a StrategySet, translator: &'a ValueTranslator<'a>) -> Self {
        FieldValueSerializer { strategies, translator }
    }
}

impl<'a> Serializer for FieldValueSerializer<'a> {
    type Ok = FieldOutcome;
    type Error = Error;
    type SerializeSeq = SeqCollector<'a>;
    type SerializeTuple = serde::ser::Impossible<FieldOutcome, Error>;
    type SerializeTupleStruct = serde::ser::Impossible<FieldOutcome, Error>;
    type SerializeTupleVariant = serde::ser::Impossible<FieldOutcome, Error>;
    type SerializeMap = MapCollector<'a>;
    type SerializeStruct = StructCollector<'a>;
    type SerializeStructVariant = serde::ser::Impossible<FieldOutcome, Error>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(self.translator.encode_bool(v, self.strategies.bool_encoding)))
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(v as i64)
    }
    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(v as i64)
    }
    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(v as i64)
    }
    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(self.translator.encode_i64(v)))
    }
    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(v as i64)
    }
    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(v as i64)
    }
    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(v as i64)
    }
    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(v as i64)
    }
    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }
    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(self.translator.encode_number(v, &self.strategies.number_encoding)))
    }
    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(v.to_string()))
    }
    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(String::from_utf8_lossy(v).into_owned()))
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(nil_string(self.strategies)))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(nil_string(self.strategies)))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(nil_string(self.strategies)))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(FieldOutcome::Scalar(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        if name == DATE_MARKER {
            let raw = capture_i64(value)?;
            return Ok(FieldOutcome::Scalar(
                self.translator.encode_date(raw, &self.strategies.date_encoding),
            ));
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(SeqCollector { parts: Vec::new(), strategies: self.strategies, translator: self.translator })
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(Error::new(ErrorKind::UnsupportedType("tuples are not supported".into())))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(Error::new(ErrorKind::UnsupportedType("tuple structs are not supported".into())))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(Error::new(ErrorKind::UnsupportedType("enum tuple variants are not supported".into())))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(MapCollector {
            storage: EncodingStorage::default(),
            pending_key: None,
            strategies: self.strategies,
            translator: self.translator,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(StructCollector {
            storage: EncodingStorage::default(),
            strategies: self.strategies,
            translator: self.translator,
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(Error::new(ErrorKind::UnsupportedType("enum struct variants are not supported".into())))
    }
}

fn nil_string(strategies: &StrategySet) -> String {
    match &strategies.nil_encoding {
        crate::strategy::NilEncodingStrategy::EmptyString => String::new(),
        crate::strategy::NilEncodingStrategy::NullLiteral => "null".to_string(),
        crate::strategy::NilEncodingStrategy::Custom(s) => s.clone(),
    }
}

/// Captures an integer out of a `Serialize` value without going through a
/// full `FieldValueSerializer` pass; used for the [`Date`] newtype marker.
fn capture_i64<T: ?Sized + Serialize>(value: &T) -> Result<i64, Error> {
    struct I64Capture;
    impl Serializer for I64Capture {
        type Ok = i64;
        type Error = Error;
        type SerializeSeq = serde::ser::Impossible<i64, Error>;
        type SerializeTuple = serde::ser::Impossible<i64, Error>;
        type SerializeTupleStruct = serde::ser::Impossible<i64, Error>;
        type SerializeTupleVariant = serde::ser::Impossible<i64, Error>;
        type SerializeMap = serde::ser::Impossible<i64, Error>;
        type SerializeStruct = serde::ser::Impossible<i64, Error>;
        type SerializeStructVariant = serde::ser::Impossible<i64, Error>;

        fn serialize_i64(self, v: i64) -> Result<i64, Error> {
            Ok(v)
        }
        serde::serde_if_integer128! {
            fn serialize_i128(self, v: i128) -> Result<i64, Error> { Ok(v as i64) }
        }
        fn serialize_i8(self, v: i8) -> Result<i64, Error> {
            Ok(v as i64)
        }
        fn serialize_i16(self, v: i16) -> Result<i64, Error> {
            Ok(v as i64)
        }
        fn serialize_i32(self, v: i32) -> Result<i64, Error> {
            Ok(v as i64)
        }
        fn serialize_u64(self, v: u64) -> Result<i64, Error> {
            Ok(v as i64)
        }
        fn serialize_u8(self, v: u8) -> Result<i64, Error> {
            Ok(v as i64)
        }
        fn serialize_u16(self, v: u16) -> Result<i64, Error> {
            Ok(v as i64)
        }
        fn serialize_u32(self, v: u32) -> Result<i64, Error> {
            Ok(v as i64)
        }
        fn serialize_bool(self, _v: bool) -> Result<i64, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_f32(self, v: f32) -> Result<i64, Error> {
            Ok(v as i64)
        }
        fn serialize_f64(self, v: f64) -> Result<i64, Error> {
            Ok(v as i64)
        }
        fn serialize_char(self, _v: char) -> Result<i64, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_str(self, v: &str) -> Result<i64, Error> {
            v.parse().map_err(|_| Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_bytes(self, _v: &[u8]) -> Result<i64, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_none(self) -> Result<i64, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<i64, Error> {
            value.serialize(self)
        }
        fn serialize_unit(self) -> Result<i64, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_unit_struct(self, _name: &'static str) -> Result<i64, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
        ) -> Result<i64, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            value: &T,
        ) -> Result<i64, Error> {
            value.serialize(self)
        }
        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            value: &T,
        ) -> Result<i64, Error> {
            value.serialize(self)
        }
        fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_tuple_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleStruct, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleVariant, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStructVariant, Error> {
            Err(Error::new(ErrorKind::UnsupportedType("Date expects an integer".into())))
        }
    }
    value.serialize(I64Capture)
}

struct SeqCollector<'a> {
    parts: Vec<String>,
    strategies: &'a StrategySet,
    translator: &'a ValueTranslator<'a>,
}

impl<'a> serde::ser::SerializeSeq for SeqCollector<'a> {
    type Ok = FieldOutcome;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let outcome = value.serialize(FieldValueSerializer::new(self.strategies, self.translator))?;
        match outcome {
            FieldOutcome::Scalar(s) => self.parts.push(s),
            FieldOutcome::Nested(_) => {
                return Err(Error::new(ErrorKind::UnsupportedType(
                    "sequences of nested records are not supported".into(),
                )))
            }
        }
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Error> {
        Ok(FieldOutcome::Scalar(self.parts.join(";")))
    }
}

struct MapCollector<'a> {
    storage: EncodingStorage,
    pending_key: Option<String>,
    strategies: &'a StrategySet,
    translator: &'a ValueTranslator<'a>,
}

impl<'a> SerializeMap for MapCollector<'a> {
    type Ok = FieldOutcome;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Error> {
        let outcome = key.serialize(FieldValueSerializer::new(self.strategies, self.translator))?;
        match outcome {
            FieldOutcome::Scalar(s) => self.pending_key = Some(s),
            FieldOutcome::Nested(_) => {
                return Err(Error::new(ErrorKind::UnsupportedType("map keys must be scalar".into())))
            }
        }
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue("serialize_value before serialize_key".into())))?;
        apply_field(&mut self.storage, &key, value, self.strategies, self.translator)
    }

    fn end(self) -> Result<Self::Ok, Error> {
        Ok(FieldOutcome::Nested(self.storage))
    }
}

struct StructCollector<'a> {
    storage: EncodingStorage,
    strategies: &'a StrategySet,
    translator: &'a ValueTranslator<'a>,
}

impl<'a> SerializeStruct for StructCollector<'a> {
    type Ok = FieldOutcome;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<(), Error> {
        apply_field(&mut self.storage, key, value, self.strategies, self.translator)
    }

    fn end(self) -> Result<Self::Ok, Error> {
        Ok(FieldOutcome::Nested(self.storage))
    }
}

fn apply_field<T: ?Sized + Serialize>(
    storage: &mut EncodingStorage,
    key: &str,
    value: &T,
    strategies: &StrategySet,
    translator: &ValueTranslator,
) -> Result<(), Error> {
    let outcome = value.serialize(FieldValueSerializer::new(strategies, translator))?;
    match outcome {
        FieldOutcome::Scalar(s) => storage.set(key, s),
        FieldOutcome::Nested(nested) => match &strategies.nested {
            NestedType::Error => {
                return Err(Error::new(ErrorKind::UnsupportedType(format!(
                    "field '{}' is a nested record but nested encoding is 'error'",
                    key
                ))))
            }
            NestedType::Flatten(sep) => {
                for (k, v) in nested.entries() {
                    storage.set(&format!("{key}{sep}{k}"), v.clone());
                }
            }
            NestedType::Json => storage.set(key, nested_storage_to_json(&nested)),
            NestedType::Codable => storage.set(key, nested_storage_to_json(&nested)),
        },
    }
    Ok(())
}

/// Encodes `record` into an [`EncodingStorage`] in declaration order.
pub fn encode_row<T: Serialize>(
    record: &T,
    strategies: &StrategySet,
    translator: &ValueTranslator,
) -> Result<EncodingStorage, Error> {
    let outcome = record.serialize(FieldValueSerializer::new(strategies, translator))?;
    match outcome {
        FieldOutcome::Nested(storage) => Ok(storage),
        FieldOutcome::Scalar(_) => Err(Error::new(ErrorKind::UnsupportedType(
            "top-level record must be a struct or map".into(),
        ))),
    }
}

/// Returns the ordered header list that encoding `sample` would freeze.
pub fn headers_of<T: Serialize>(
    sample: &T,
    strategies: &StrategySet,
    translator: &ValueTranslator,
) -> Result<Vec<String>, Error> {
    Ok(encode_row(sample, strategies, translator)?.keys())
}

/// Encodes `record` into a plain header→value map (spec §6 `encode_to_dict`).
pub fn encode_to_dict<T: Serialize>(
    record: &T,
    strategies: &StrategySet,
    translator: &ValueTranslator,
) -> Result<HashMap<String, String>, Error> {
    let storage = encode_row(record, strategies, translator)?;
    Ok(storage.entries().iter().cloned().collect())
}

/// Decodes a single record out of a header→value map (spec §6
/// `decode(dict) → Record`). Unlike [`decode_row`], `dict` has no row
/// buffer or column order of its own — one is synthesized by writing the
/// values out as a single escaped row and parsing it straight back, so the
/// same [`RowDeserializer`]/[`FieldDeserializer`] path handles both forms
/// of input.
pub fn decode_dict<T: DeserializeOwned>(
    dict: &HashMap<String, String>,
    strategies: &StrategySet,
    translator: &ValueTranslator,
) -> Result<T, Error> {
    let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
    let resolver = crate::header::HeaderResolver {
        index_mapping: None,
        column_mapping: None,
        column_order: Some(&keys),
        key_strategy: crate::strategy::KeyDecodingStrategy::Default,
    };
    let headers = resolver.resolve(None, false, keys.len());

    let mut buf = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        crate::escape::append_escaped(dict[*key].as_bytes(), &mut buf, b',');
    }

    let parser = crate::parser::CsvParser::new(b',');
    let mut row: Option<RowView> = None;
    parser.parse(&buf, |r| row = Some(r));
    let row = row.unwrap_or_default();

    decode_row(&row, &buf, &headers, strategies, translator, false, 0)
}

/// Decodes one [`RowView`] into `T`, using `headers` to resolve column
/// indices and `strategies`/`translator` for per-type conversion.
pub fn decode_row<T: DeserializeOwned>(
    row: &RowView,
    buf: &[u8],
    headers: &HeaderMap,
    strategies: &StrategySet,
    translator: &ValueTranslator,
    trim_whitespace: bool,
    row_index: u64,
) -> Result<T, Error> {
    let deserializer = RowDeserializer {
        row,
        buf,
        headers,
        strategies,
        translator,
        trim_whitespace,
        row_index,
        coding_path: Vec::new(),
    };
    T::deserialize(deserializer)
}

struct RowDeserializer<'a> {
    row: &'a RowView,
    buf: &'a [u8],
    headers: &'a HeaderMap,
    strategies: &'a StrategySet,
    translator: &'a ValueTranslator<'a>,
    trim_whitespace: bool,
    row_index: u64,
    coding_path: Vec<String>,
}

impl<'a, 'de> Deserializer<'de> for RowDeserializer<'a> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Error> {
        Err(Error::new(ErrorKind::UnsupportedType(
            "the top-level decode target must be a struct".into(),
        )))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_map(RowMapAccess {
            row: self.row,
            buf: self.buf,
            headers: self.headers,
            strategies: self.strategies,
            translator: self.translator,
            trim_whitespace: self.trim_whitespace,
            row_index: self.row_index,
            coding_path: self.coding_path,
            fields: fields.iter(),
            current_key: None,
        })
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string bytes
        byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

struct RowMapAccess<'a> {
    row: &'a RowView,
    buf: &'a [u8],
    headers: &'a HeaderMap,
    strategies: &'a StrategySet,
    translator: &'a ValueTranslator<'a>,
    trim_whitespace: bool,
    row_index: u64,
    coding_path: Vec<String>,
    fields: std::slice::Iter<'static, &'static str>,
    current_key: Option<&'static str>,
}

impl<'a, 'de> MapAccess<'de> for RowMapAccess<'a> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, Error> {
        match self.fields.next() {
            Some(&field) => {
                self.current_key = Some(field);
                let key_de: serde::de::value::StrDeserializer<Error> = serde::de::value::StrDeserializer::new(field);
                seed.deserialize(key_de).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Error> {
        let key = self.current_key.take().expect("next_value called without next_key");
        let column = self.headers.column_of(key).ok_or_else(|| {
            Error::key_not_found(
                key,
                Location {
                    row: Some(self.row_index),
                    column: None,
                    coding_path: self.coding_path.clone(),
                    available_keys: Some(self.headers.keys()),
                },
            )
        })?;
        let raw = self
            .row
            .field_str(column, self.buf, self.trim_whitespace)
            .unwrap_or(std::borrow::Cow::Borrowed(""));
        let mut coding_path = self.coding_path.clone();
        coding_path.push(key.to_string());
        seed.deserialize(FieldDeserializer {
            raw: raw.as_ref(),
            strategies: self.strategies,
            translator: self.translator,
            row_index: self.row_index,
            column: key,
            coding_path,
        })
    }
}

// `raw` borrows from a `Cow<str>` local to `next_value_seed` (it may be
// owned, once unescaped), so it gets its own shorter lifetime `'r`,
// distinct from `'s` which the shared strategy/translator/header data use.
struct FieldDeserializer<'r, 's> {
    raw: &'r str,
    strategies: &'s StrategySet,
    translator: &'s ValueTranslator<'s>,
    row_index: u64,
    column: &'s str,
    coding_path: Vec<String>,
}

impl<'r, 's> FieldDeserializer<'r, 's> {
    fn location(&self) -> Location {
        Location::new(self.row_index, self.column, self.coding_path.clone())
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::type_mismatch(expected, self.raw.to_string(), self.location())
    }
}

impl<'r, 's, 'de> Deserializer<'de> for FieldDeserializer<'r, 's> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let v = self
            .translator
            .decode_bool(self.raw, &self.strategies.bool_decoding)
            .map_err(|_| self.mismatch("a bool"))?;
        visitor.visit_bool(v)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let v = self
            .translator
            .decode_i64(self.raw, &self.strategies.number_decoding)
            .map_err(|_| self.mismatch("an integer"))?;
        visitor.visit_i64(v)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let v = self
            .translator
            .decode_f64(self.raw, &self.strategies.number_decoding)
            .map_err(|_| self.mismatch("a float"))?;
        visitor.visit_f64(v)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_str(self.raw)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_string(self.raw.to_string())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        if self.translator.decode_nil(self.raw, &self.strategies.nil_decoding) {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        if name == DATE_MARKER {
            let ts = self
                .translator
                .decode_date(self.raw, &self.strategies.date_decoding)
                .map_err(|_| self.mismatch("a date"))?;
            use serde::de::IntoDeserializer;
            let value_de: serde::de::value::I64Deserializer<Error> = ts.into_deserializer();
            return visitor.visit_newtype_struct(value_de);
        }
        visitor.visit_newtype_struct(self)
    }

    serde::forward_to_deserialize_any! {
        i8 i16 i32 u8 u16 u32 u64 f32 char bytes byte_buf unit unit_struct
        seq tuple tuple_struct map struct enum identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Person {
        name: String,
        age: i64,
    }

    fn parse_row(line: &str, delim: u8) -> (RowView, Vec<u8>) {
        let buf = line.as_bytes().to_vec();
        let parser = crate::parser::CsvParser::new(delim);
        let mut row = None;
        parser.parse(&buf, |r| row = Some(r));
        (row.unwrap(), buf)
    }

    #[test]
    fn decode_simple_struct() {
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let headers = crate::header::HeaderResolver {
            index_mapping: None,
            column_mapping: None,
            column_order: None,
            key_strategy: crate::strategy::KeyDecodingStrategy::Default,
        }
        .resolve(Some(&["name".to_string(), "age".to_string()]), true, 2);

        let (row, buf) = parse_row("Alice,30", b',');
        let person: Person = decode_row(&row, &buf, &headers, &strategies, &translator, true, 2).unwrap();
        assert_eq!(person, Person { name: "Alice".to_string(), age: 30 });
    }

    #[test]
    fn encode_simple_struct() {
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let person = Person { name: "Alice".to_string(), age: 30 };
        let storage = encode_row(&person, &strategies, &translator).unwrap();
        assert_eq!(storage.get("name"), Some("Alice"));
        assert_eq!(storage.get("age"), Some("30"));
        assert_eq!(storage.keys(), vec!["name".to_string(), "age".to_string()]);
    }

    #[test]
    fn missing_key_reports_available_keys() {
        #[derive(Deserialize)]
        struct Wanted {
            #[allow(dead_code)]
            name: String,
        }
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let headers = crate::header::HeaderResolver {
            index_mapping: None,
            column_mapping: None,
            column_order: None,
            key_strategy: crate::strategy::KeyDecodingStrategy::Default,
        }
        .resolve(Some(&["Naem".to_string(), "age".to_string()]), true, 2);
        let (row, buf) = parse_row("Alice,30", b',');
        let err = decode_row::<Wanted>(&row, &buf, &headers, &strategies, &translator, true, 2).unwrap_err();
        match err.kind() {
            ErrorKind::KeyNotFound { key, location } => {
                assert_eq!(key, "name");
                assert!(location.available_keys.is_some());
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn encode_to_dict_matches_encode_row() {
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let person = Person { name: "Alice".to_string(), age: 30 };
        let dict = encode_to_dict(&person, &strategies, &translator).unwrap();
        assert_eq!(dict.get("name"), Some(&"Alice".to_string()));
        assert_eq!(dict.get("age"), Some(&"30".to_string()));
    }

    #[test]
    fn decode_dict_round_trips_encode_to_dict() {
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let person = Person { name: "Alice".to_string(), age: 30 };
        let dict = encode_to_dict(&person, &strategies, &translator).unwrap();
        let back: Person = decode_dict(&dict, &strategies, &translator).unwrap();
        assert_eq!(back, person);
    }

    #[test]
    fn decode_dict_handles_commas_and_quotes_in_values() {
        let mut dict = HashMap::new();
        dict.insert("name".to_string(), "Doe, Jane \"JJ\"".to_string());
        dict.insert("age".to_string(), "41".to_string());
        let strategies = StrategySet::default();
        let translator = ValueTranslator::default();
        let person: Person = decode_dict(&dict, &strategies, &translator).unwrap();
        assert_eq!(person, Person { name: "Doe, Jane \"JJ\"".to_string(), age: 41 });
    }
}
