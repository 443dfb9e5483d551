// src/example/builder.rs
// ============================================================================
// EXAMPLE BUILDER - FrameRecord → DetectionExample
// ============================================================================
//
// Orden de comprobaciones (cada rechazo deja una línea de error y el frame
// se descarta sin abortar):
//   1. el archivo existe                  → FileMissing
//   2. la imagen es PNG                   → BadFormat
//   3. tamaño == tamaño fijado            → SizeMismatch
// La primera imagen que pasa 1-2 fija el tamaño para toda la ejecución.
//
// Una clase sin entrada en el label map NO es un rechazo: es fatal.
//
// ============================================================================

use std::fmt;
use std::fs;
use std::io::Cursor;

use image::ImageFormat;
use log::{debug, error, info};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::detection::DetectionExample;
use crate::annotation::FrameRecord;
use crate::error::{ConvertError, Result};
use crate::labelmap::LabelMap;

/// Único formato aceptado
pub const EXPECTED_FORMAT: ImageFormat = ImageFormat::Png;
pub const FORMAT_TAG: &str = "png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Motivo por el que un frame no produce ejemplo
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("file not found")]
    FileMissing,
    #[error("unexpected image format '{0}'")]
    BadFormat(String),
    #[error("unexpected size {actual} (expected {expected})")]
    SizeMismatch {
        expected: ImageDimensions,
        actual: ImageDimensions,
    },
}

#[derive(Debug)]
pub enum BuildOutcome {
    Built(DetectionExample),
    Skipped(SkipReason),
}

impl BuildOutcome {
    pub fn into_example(self) -> Option<DetectionExample> {
        match self {
            Self::Built(example) => Some(example),
            Self::Skipped(_) => None,
        }
    }
}

/// Construye ejemplos de una ejecución. Guarda el tamaño fijado: se escribe
/// una vez (primera imagen válida) y solo se lee después.
pub struct ExampleBuilder<'a> {
    label_map: &'a LabelMap,
    expected: Option<ImageDimensions>,
}

impl<'a> ExampleBuilder<'a> {
    pub fn new(label_map: &'a LabelMap) -> Self {
        Self {
            label_map,
            expected: None,
        }
    }

    pub fn expected_dimensions(&self) -> Option<ImageDimensions> {
        self.expected
    }

    pub fn build(&mut self, frame: &FrameRecord) -> Result<BuildOutcome> {
        let path = &frame.filename;

        if !path.exists() {
            return Ok(self.reject(frame, SkipReason::FileMissing));
        }

        let encoded = fs::read(path).map_err(|e| ConvertError::io(path, e))?;

        let dimensions = match probe_png(&encoded) {
            Ok(dimensions) => dimensions,
            Err(reason) => return Ok(self.reject(frame, reason)),
        };

        let expected = *self.expected.get_or_insert_with(|| {
            info!("Expected image size: {}", dimensions);
            dimensions
        });

        if dimensions != expected {
            let reason = SkipReason::SizeMismatch {
                expected,
                actual: dimensions,
            };
            return Ok(self.reject(frame, reason));
        }

        let classes = frame.classes();
        debug!("{} {:?}", path.display(), classes);

        let class_label = classes
            .iter()
            .map(|class| self.label_map.resolve(class))
            .collect::<Result<Vec<i64>>>()?;

        let mut xmin = Vec::with_capacity(frame.boxes.len());
        let mut xmax = Vec::with_capacity(frame.boxes.len());
        let mut ymin = Vec::with_capacity(frame.boxes.len());
        let mut ymax = Vec::with_capacity(frame.boxes.len());
        for b in &frame.boxes {
            xmin.push(normalize(parse_coordinate(frame, "xmin", &b.xmin)?, expected.width));
            xmax.push(normalize(parse_coordinate(frame, "xmax", &b.xmax)?, expected.width));
            ymin.push(normalize(parse_coordinate(frame, "ymin", &b.ymin)?, expected.height));
            ymax.push(normalize(parse_coordinate(frame, "ymax", &b.ymax)?, expected.height));
        }

        let filename = path.to_string_lossy().into_owned();
        let sha256 = format!("{:x}", Sha256::digest(&encoded));

        Ok(BuildOutcome::Built(DetectionExample {
            width: expected.width,
            height: expected.height,
            source_id: filename.clone(),
            filename,
            sha256,
            encoded,
            format: FORMAT_TAG.to_string(),
            xmin,
            xmax,
            ymin,
            ymax,
            class_text: classes.iter().map(|c| c.to_string()).collect(),
            class_label,
        }))
    }

    fn reject(&self, frame: &FrameRecord, reason: SkipReason) -> BuildOutcome {
        error!("File {}: {}", frame.filename.display(), reason);
        BuildOutcome::Skipped(reason)
    }
}

/// Detecta el formato por contenido y lee el tamaño de la cabecera.
/// No hay conversión de formato: todo lo que no sea PNG se rechaza.
fn probe_png(encoded: &[u8]) -> std::result::Result<ImageDimensions, SkipReason> {
    let reader = image::io::Reader::new(Cursor::new(encoded))
        .with_guessed_format()
        .map_err(|e| SkipReason::BadFormat(e.to_string()))?;

    match reader.format() {
        Some(EXPECTED_FORMAT) => {}
        Some(other) => return Err(SkipReason::BadFormat(format!("{:?}", other).to_uppercase())),
        None => return Err(SkipReason::BadFormat("unknown".to_string())),
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| SkipReason::BadFormat(format!("undecodable PNG: {}", e)))?;

    Ok(ImageDimensions { width, height })
}

fn parse_coordinate(frame: &FrameRecord, field: &'static str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConvertError::InvalidCoordinate {
            filename: frame.filename.clone(),
            field,
            value: value.to_string(),
        })
}

/// Coordenada en píxeles → fracción. Sin clamping: un valor fuera de la
/// imagen queda fuera de [0,1].
pub fn normalize(pixels: f64, extent: u32) -> f32 {
    (pixels / extent as f64) as f32
}
