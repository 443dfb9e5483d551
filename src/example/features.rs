// src/example/features.rs
// ============================================================================
// tf.train.Example - Codec protobuf a mano
// ============================================================================
//
// Esquema (field numbers):
//   Example   { Features features = 1; }
//   Features  { map<string, Feature> feature = 1; }
//   Feature   { oneof kind { BytesList bytes_list = 1;
//                            FloatList float_list = 2;
//                            Int64List int64_list = 3; } }
//   BytesList { repeated bytes value = 1; }
//   FloatList { repeated float value = 1 [packed = true]; }
//   Int64List { repeated int64 value = 1 [packed = true]; }
//
// Las entradas del map se escriben ordenadas por clave (BTreeMap), así la
// salida es determinista.
//
// ============================================================================

use std::collections::BTreeMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ConvertError, Result};

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

const FIELD_BYTES_LIST: u32 = 1;
const FIELD_FLOAT_LIST: u32 = 2;
const FIELD_INT64_LIST: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Bytes(Vec<Vec<u8>>),
    Float(Vec<f32>),
    Int64(Vec<i64>),
}

impl Feature {
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(vec![value.into()])
    }

    pub fn int64(value: i64) -> Self {
        Self::Int64(vec![value])
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes_list",
            Self::Float(_) => "float_list",
            Self::Int64(_) => "int64_list",
        }
    }

    /// Serializa el mensaje Feature (oneof + lista)
    fn encode(&self) -> Vec<u8> {
        let mut list = Vec::new();
        let field = match self {
            Self::Bytes(values) => {
                for value in values {
                    put_len_delimited(&mut list, 1, value);
                }
                FIELD_BYTES_LIST
            }
            Self::Float(values) => {
                if !values.is_empty() {
                    let mut packed = vec![0u8; values.len() * 4];
                    LittleEndian::write_f32_into(values, &mut packed);
                    put_len_delimited(&mut list, 1, &packed);
                }
                FIELD_FLOAT_LIST
            }
            Self::Int64(values) => {
                if !values.is_empty() {
                    let mut packed = Vec::with_capacity(values.len());
                    for &v in values {
                        put_varint(&mut packed, v as u64);
                    }
                    put_len_delimited(&mut list, 1, &packed);
                }
                FIELD_INT64_LIST
            }
        };

        let mut out = Vec::with_capacity(list.len() + 6);
        put_len_delimited(&mut out, field, &list);
        out
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut feature = None;
        let mut reader = WireReader::new(data);

        while let Some((field, wire)) = reader.read_key()? {
            match (field, wire) {
                (FIELD_BYTES_LIST, WIRE_LEN) => {
                    feature = Some(decode_bytes_list(reader.read_len_delimited()?)?);
                }
                (FIELD_FLOAT_LIST, WIRE_LEN) => {
                    feature = Some(decode_float_list(reader.read_len_delimited()?)?);
                }
                (FIELD_INT64_LIST, WIRE_LEN) => {
                    feature = Some(decode_int64_list(reader.read_len_delimited()?)?);
                }
                _ => reader.skip(wire)?,
            }
        }

        feature.ok_or_else(|| ConvertError::Decode("feature without value".to_string()))
    }
}

/// Mensaje Example completo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Example {
    pub features: BTreeMap<String, Feature>,
}

impl Example {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, feature: Feature) {
        self.features.insert(key.into(), feature);
    }

    pub fn get(&self, key: &str) -> Option<&Feature> {
        self.features.get(key)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut features = Vec::new();
        for (key, feature) in &self.features {
            let mut entry = Vec::new();
            put_len_delimited(&mut entry, 1, key.as_bytes());
            put_len_delimited(&mut entry, 2, &feature.encode());
            put_len_delimited(&mut features, 1, &entry);
        }

        let mut out = Vec::with_capacity(features.len() + 6);
        put_len_delimited(&mut out, 1, &features);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut example = Self::new();
        let mut reader = WireReader::new(data);

        while let Some((field, wire)) = reader.read_key()? {
            if field == 1 && wire == WIRE_LEN {
                example.merge_features(reader.read_len_delimited()?)?;
            } else {
                reader.skip(wire)?;
            }
        }

        Ok(example)
    }

    fn merge_features(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = WireReader::new(data);

        while let Some((field, wire)) = reader.read_key()? {
            if field != 1 || wire != WIRE_LEN {
                reader.skip(wire)?;
                continue;
            }

            let mut entry = WireReader::new(reader.read_len_delimited()?);
            let mut key = String::new();
            let mut value = None;

            while let Some((field, wire)) = entry.read_key()? {
                match (field, wire) {
                    (1, WIRE_LEN) => {
                        key = String::from_utf8(entry.read_len_delimited()?.to_vec())
                            .map_err(|_| ConvertError::Decode("feature key is not UTF-8".to_string()))?;
                    }
                    (2, WIRE_LEN) => value = Some(Feature::decode(entry.read_len_delimited()?)?),
                    _ => entry.skip(wire)?,
                }
            }

            let value = value
                .ok_or_else(|| ConvertError::Decode(format!("feature '{}' has no value", key)))?;
            self.features.insert(key, value);
        }

        Ok(())
    }
}

// ============================================================================
// LISTAS
// ============================================================================

fn decode_bytes_list(data: &[u8]) -> Result<Feature> {
    let mut values = Vec::new();
    let mut reader = WireReader::new(data);
    while let Some((field, wire)) = reader.read_key()? {
        if field == 1 && wire == WIRE_LEN {
            values.push(reader.read_len_delimited()?.to_vec());
        } else {
            reader.skip(wire)?;
        }
    }
    Ok(Feature::Bytes(values))
}

fn decode_float_list(data: &[u8]) -> Result<Feature> {
    let mut values = Vec::new();
    let mut reader = WireReader::new(data);
    while let Some((field, wire)) = reader.read_key()? {
        match (field, wire) {
            (1, WIRE_LEN) => {
                let packed = reader.read_len_delimited()?;
                if packed.len() % 4 != 0 {
                    return Err(ConvertError::Decode("packed float list not a multiple of 4".to_string()));
                }
                values.extend(packed.chunks_exact(4).map(LittleEndian::read_f32));
            }
            // Codificación no empaquetada
            (1, WIRE_FIXED32) => values.push(LittleEndian::read_f32(reader.take(4)?)),
            _ => reader.skip(wire)?,
        }
    }
    Ok(Feature::Float(values))
}

fn decode_int64_list(data: &[u8]) -> Result<Feature> {
    let mut values = Vec::new();
    let mut reader = WireReader::new(data);
    while let Some((field, wire)) = reader.read_key()? {
        match (field, wire) {
            (1, WIRE_LEN) => {
                let mut packed = WireReader::new(reader.read_len_delimited()?);
                while !packed.is_empty() {
                    values.push(packed.read_varint()? as i64);
                }
            }
            (1, WIRE_VARINT) => values.push(reader.read_varint()? as i64),
            _ => reader.skip(wire)?,
        }
    }
    Ok(Feature::Int64(values))
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn put_key(buf: &mut Vec<u8>, field: u32, wire: u8) {
    put_varint(buf, ((field as u64) << 3) | wire as u64);
}

fn put_len_delimited(buf: &mut Vec<u8>, field: u32, data: &[u8]) {
    put_key(buf, field, WIRE_LEN);
    put_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| ConvertError::Decode("truncated message".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.take(1)?[0];
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ConvertError::Decode("varint too long".to_string()))
    }

    fn read_key(&mut self) -> Result<Option<(u32, u8)>> {
        if self.is_empty() {
            return Ok(None);
        }
        let key = self.read_varint()?;
        Ok(Some(((key >> 3) as u32, (key & 0x7) as u8)))
    }

    fn read_len_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.take(len)
    }

    fn skip(&mut self, wire: u8) -> Result<()> {
        match wire {
            WIRE_VARINT => self.read_varint().map(|_| ()),
            WIRE_FIXED64 => self.take(8).map(|_| ()),
            WIRE_LEN => self.read_len_delimited().map(|_| ()),
            WIRE_FIXED32 => self.take(4).map(|_| ()),
            other => Err(ConvertError::Decode(format!("unsupported wire type {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_encoding() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 300);
        assert_eq!(buf, vec![0x01, 0xAC, 0x02]);

        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_varint().unwrap(), 1);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_known_bytes() {
        // Example{features{feature{key:"a" value{int64_list{value:[1]}}}}}
        let mut example = Example::new();
        example.insert("a", Feature::int64(1));

        let expected: Vec<u8> = vec![
            0x0A, 0x0C, // Example.features
            0x0A, 0x0A, // Features.feature (entrada del map)
            0x0A, 0x01, b'a', // key
            0x12, 0x05, // value
            0x1A, 0x03, // Feature.int64_list
            0x0A, 0x01, 0x01, // value: packed [1]
        ];

        let encoded = example.encode();
        assert_eq!(encoded, expected);
        assert_eq!(Example::decode(&encoded).unwrap(), example);
    }

    #[test]
    fn test_packed_float_bytes() {
        let encoded = Feature::Float(vec![1.0, -2.5]).encode();
        assert_eq!(
            encoded,
            vec![
                0x12, 0x0A, // float_list, 10 bytes
                0x0A, 0x08, // value (packed), 8 bytes
                0x00, 0x00, 0x80, 0x3F, // 1.0
                0x00, 0x00, 0x20, 0xC0, // -2.5
            ]
        );
        assert_eq!(Feature::decode(&encoded).unwrap(), Feature::Float(vec![1.0, -2.5]));
    }

    #[test]
    fn test_negative_int64_and_empty_lists() {
        let mut example = Example::new();
        example.insert("neg", Feature::Int64(vec![-1, i64::MIN, 0]));
        example.insert("empty_f", Feature::Float(vec![]));
        example.insert("empty_b", Feature::Bytes(vec![]));

        let decoded = Example::decode(&example.encode()).unwrap();
        assert_eq!(decoded, example);
    }

    #[test]
    fn test_unpacked_lists_are_accepted() {
        // FloatList con dos valores no empaquetados
        let mut float_list = Vec::new();
        put_key(&mut float_list, 1, WIRE_FIXED32);
        float_list.extend_from_slice(&0.5f32.to_le_bytes());
        put_key(&mut float_list, 1, WIRE_FIXED32);
        float_list.extend_from_slice(&0.25f32.to_le_bytes());

        assert_eq!(
            decode_float_list(&float_list).unwrap(),
            Feature::Float(vec![0.5, 0.25])
        );

        let mut int_list = Vec::new();
        put_key(&mut int_list, 1, WIRE_VARINT);
        put_varint(&mut int_list, 7);
        assert_eq!(decode_int64_list(&int_list).unwrap(), Feature::Int64(vec![7]));
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let mut example = Example::new();
        example.insert("image/encoded", Feature::bytes(vec![0u8; 32]));
        let encoded = example.encode();

        let err = Example::decode(&encoded[..encoded.len() - 5]).unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut example = Example::new();
        example.insert("k", Feature::bytes("v"));
        let mut encoded = example.encode();
        // Campo 15 varint, desconocido
        put_key(&mut encoded, 15, WIRE_VARINT);
        put_varint(&mut encoded, 99);

        assert_eq!(Example::decode(&encoded).unwrap(), example);
    }
}
