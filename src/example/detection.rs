// src/example/detection.rs
// ============================================================================
// DETECTION EXAMPLE - Una imagen con sus cajas, lista para serializar
// ============================================================================

use crate::error::{ConvertError, Result};

use super::features::{Example, Feature};

/// Claves del Example que consume el pipeline de detección
pub mod keys {
    pub const HEIGHT: &str = "image/height";
    pub const WIDTH: &str = "image/width";
    pub const FILENAME: &str = "image/filename";
    pub const SOURCE_ID: &str = "image/source_id";
    pub const KEY_SHA256: &str = "image/key/sha256";
    pub const ENCODED: &str = "image/encoded";
    pub const FORMAT: &str = "image/format";
    pub const BBOX_XMIN: &str = "image/object/bbox/xmin";
    pub const BBOX_XMAX: &str = "image/object/bbox/xmax";
    pub const BBOX_YMIN: &str = "image/object/bbox/ymin";
    pub const BBOX_YMAX: &str = "image/object/bbox/ymax";
    pub const CLASS_TEXT: &str = "image/object/class/text";
    pub const CLASS_LABEL: &str = "image/object/class/label";
}

/// Coordenadas normalizadas a [0,1]; las seis listas por caja van alineadas
/// por índice.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionExample {
    pub width: u32,
    pub height: u32,
    pub filename: String,
    pub source_id: String,
    /// SHA-256 en hex de `encoded`
    pub sha256: String,
    pub encoded: Vec<u8>,
    pub format: String,
    pub xmin: Vec<f32>,
    pub xmax: Vec<f32>,
    pub ymin: Vec<f32>,
    pub ymax: Vec<f32>,
    pub class_text: Vec<String>,
    pub class_label: Vec<i64>,
}

impl DetectionExample {
    pub fn num_boxes(&self) -> usize {
        self.class_label.len()
    }

    /// Todas las listas por caja tienen la misma longitud
    pub fn is_aligned(&self) -> bool {
        let n = self.class_label.len();
        [
            self.xmin.len(),
            self.xmax.len(),
            self.ymin.len(),
            self.ymax.len(),
            self.class_text.len(),
        ]
        .iter()
        .all(|&len| len == n)
    }

    pub fn to_example(&self) -> Example {
        let mut example = Example::new();
        example.insert(keys::HEIGHT, Feature::int64(self.height as i64));
        example.insert(keys::WIDTH, Feature::int64(self.width as i64));
        example.insert(keys::FILENAME, Feature::bytes(self.filename.as_bytes()));
        example.insert(keys::SOURCE_ID, Feature::bytes(self.source_id.as_bytes()));
        example.insert(keys::KEY_SHA256, Feature::bytes(self.sha256.as_bytes()));
        example.insert(keys::ENCODED, Feature::bytes(self.encoded.as_slice()));
        example.insert(keys::FORMAT, Feature::bytes(self.format.as_bytes()));
        example.insert(keys::BBOX_XMIN, Feature::Float(self.xmin.clone()));
        example.insert(keys::BBOX_XMAX, Feature::Float(self.xmax.clone()));
        example.insert(keys::BBOX_YMIN, Feature::Float(self.ymin.clone()));
        example.insert(keys::BBOX_YMAX, Feature::Float(self.ymax.clone()));
        example.insert(
            keys::CLASS_TEXT,
            Feature::Bytes(self.class_text.iter().map(|c| c.as_bytes().to_vec()).collect()),
        );
        example.insert(keys::CLASS_LABEL, Feature::Int64(self.class_label.clone()));
        example
    }

    pub fn from_example(example: &Example) -> Result<Self> {
        let decoded = Self {
            width: dimension(example, keys::WIDTH)?,
            height: dimension(example, keys::HEIGHT)?,
            filename: single_string(example, keys::FILENAME)?,
            source_id: single_string(example, keys::SOURCE_ID)?,
            sha256: single_string(example, keys::KEY_SHA256)?,
            encoded: single_bytes(example, keys::ENCODED)?.to_vec(),
            format: single_string(example, keys::FORMAT)?,
            xmin: floats(example, keys::BBOX_XMIN)?.to_vec(),
            xmax: floats(example, keys::BBOX_XMAX)?.to_vec(),
            ymin: floats(example, keys::BBOX_YMIN)?.to_vec(),
            ymax: floats(example, keys::BBOX_YMAX)?.to_vec(),
            class_text: bytes_list(example, keys::CLASS_TEXT)?
                .iter()
                .map(|b| utf8(keys::CLASS_TEXT, b))
                .collect::<Result<_>>()?,
            class_label: int64s(example, keys::CLASS_LABEL)?.to_vec(),
        };

        if !decoded.is_aligned() {
            return Err(ConvertError::Decode(format!(
                "box lists of {} are not aligned",
                decoded.filename
            )));
        }
        Ok(decoded)
    }

    /// Payload protobuf listo para un registro TFRecord
    pub fn encode(&self) -> Vec<u8> {
        self.to_example().encode()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::from_example(&Example::decode(data)?)
    }
}

// ============================================================================
// ACCESO TIPADO
// ============================================================================

fn feature<'a>(example: &'a Example, key: &str) -> Result<&'a Feature> {
    example
        .get(key)
        .ok_or_else(|| ConvertError::Decode(format!("missing feature '{}'", key)))
}

fn wrong_kind(key: &str, found: &Feature) -> ConvertError {
    ConvertError::Decode(format!("feature '{}' has unexpected kind {}", key, found.kind()))
}

fn bytes_list<'a>(example: &'a Example, key: &str) -> Result<&'a [Vec<u8>]> {
    match feature(example, key)? {
        Feature::Bytes(values) => Ok(values.as_slice()),
        other => Err(wrong_kind(key, other)),
    }
}

fn floats<'a>(example: &'a Example, key: &str) -> Result<&'a [f32]> {
    match feature(example, key)? {
        Feature::Float(values) => Ok(values.as_slice()),
        other => Err(wrong_kind(key, other)),
    }
}

fn int64s<'a>(example: &'a Example, key: &str) -> Result<&'a [i64]> {
    match feature(example, key)? {
        Feature::Int64(values) => Ok(values.as_slice()),
        other => Err(wrong_kind(key, other)),
    }
}

fn single_bytes<'a>(example: &'a Example, key: &str) -> Result<&'a [u8]> {
    match bytes_list(example, key)? {
        [value] => Ok(value.as_slice()),
        values => Err(ConvertError::Decode(format!(
            "feature '{}' has {} values, expected 1",
            key,
            values.len()
        ))),
    }
}

fn single_string(example: &Example, key: &str) -> Result<String> {
    utf8(key, single_bytes(example, key)?)
}

fn dimension(example: &Example, key: &str) -> Result<u32> {
    match int64s(example, key)? {
        [value] => u32::try_from(*value)
            .map_err(|_| ConvertError::Decode(format!("feature '{}' out of range: {}", key, value))),
        values => Err(ConvertError::Decode(format!(
            "feature '{}' has {} values, expected 1",
            key,
            values.len()
        ))),
    }
}

fn utf8(key: &str, bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ConvertError::Decode(format!("feature '{}' is not UTF-8", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DetectionExample {
        DetectionExample {
            width: 1280,
            height: 960,
            filename: "dayClip1/frames/dayClip1--00001.png".to_string(),
            source_id: "dayClip1/frames/dayClip1--00001.png".to_string(),
            sha256: "ab".repeat(32),
            encoded: vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3],
            format: "png".to_string(),
            xmin: vec![0.1, 0.5],
            xmax: vec![0.2, 0.6],
            ymin: vec![0.3, 0.7],
            ymax: vec![0.4, 0.8],
            class_text: vec!["green".to_string(), "red".to_string()],
            class_label: vec![1, 2],
        }
    }

    #[test]
    fn test_round_trip() {
        let example = sample();
        let decoded = DetectionExample::decode(&example.encode()).unwrap();
        assert_eq!(decoded, example);
    }

    #[test]
    fn test_round_trip_without_boxes() {
        let mut example = sample();
        example.xmin.clear();
        example.xmax.clear();
        example.ymin.clear();
        example.ymax.clear();
        example.class_text.clear();
        example.class_label.clear();

        let decoded = DetectionExample::decode(&example.encode()).unwrap();
        assert_eq!(decoded.num_boxes(), 0);
        assert_eq!(decoded, example);
    }

    #[test]
    fn test_feature_keys() {
        let example = sample().to_example();
        assert_eq!(example.features.len(), 13);
        assert_eq!(example.get(keys::FORMAT), Some(&Feature::bytes("png")));
        assert_eq!(example.get(keys::WIDTH), Some(&Feature::int64(1280)));
        assert_eq!(
            example.get(keys::SOURCE_ID),
            example.get(keys::FILENAME)
        );
    }

    #[test]
    fn test_misaligned_lists_rejected() {
        let mut example = sample().to_example();
        example.insert(keys::BBOX_YMAX, Feature::Float(vec![0.4]));
        assert!(matches!(
            DetectionExample::from_example(&example),
            Err(ConvertError::Decode(_))
        ));
    }

    #[test]
    fn test_missing_feature_rejected() {
        let mut example = sample().to_example();
        example.features.remove(keys::KEY_SHA256);
        assert!(DetectionExample::from_example(&example).is_err());
    }
}
