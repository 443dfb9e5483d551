// src/annotation/mod.rs
// ============================================================================
// ANNOTATION - Tabla de anotaciones LISA (frameAnnotationsBOX.csv)
// ============================================================================

pub mod parser;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

pub use parser::{group_adjacent, parse_annotation_dir, read_rows, AnnotationRow};

/// Nombre de la tabla de anotaciones por directorio
pub const ANNOTATION_FILE: &str = "frameAnnotationsBOX.csv";

/// Subdirectorio con las imágenes, hermano de la tabla
pub const FRAMES_DIR: &str = "frames";

/// Tag crudo → clase canónica. Cualquier otro tag se descarta.
pub const TAG_CLASSES: &[(&str, &str)] = &[
    ("go", "green"),
    ("goLeft", "green"),
    ("stop", "red"),
    ("stopLeft", "red"),
    ("warning", "yellow"),
    ("warningLeft", "yellow"),
];

/// Clases canónicas que el label map debe cubrir
pub const CANONICAL_CLASSES: &[&str] = &["green", "red", "yellow"];

static TAG_LOOKUP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| TAG_CLASSES.iter().copied().collect());

/// Clase canónica de un tag crudo
pub fn canonical_class(tag: &str) -> Option<&'static str> {
    TAG_LOOKUP.get(tag).copied()
}

/// Caja de una fila aceptada. Las coordenadas siguen en texto: la conversión
/// numérica ocurre al construir el ejemplo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBox {
    pub xmin: String,
    pub ymin: String,
    pub xmax: String,
    pub ymax: String,
    pub class: &'static str,
}

/// Todas las cajas de una imagen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// Ruta absoluta a `<dir>/frames/<basename>`
    pub filename: PathBuf,
    pub boxes: Vec<RawBox>,
}

impl FrameRecord {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            boxes: Vec::new(),
        }
    }

    pub fn classes(&self) -> Vec<&'static str> {
        self.boxes.iter().map(|b| b.class).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_class() {
        assert_eq!(canonical_class("go"), Some("green"));
        assert_eq!(canonical_class("goLeft"), Some("green"));
        assert_eq!(canonical_class("stopLeft"), Some("red"));
        assert_eq!(canonical_class("warning"), Some("yellow"));
        assert_eq!(canonical_class("caution"), None);
        assert_eq!(canonical_class("GO"), None);
    }

    #[test]
    fn test_tag_table_covers_canonical_classes() {
        for class in CANONICAL_CLASSES {
            assert!(TAG_CLASSES.iter().any(|(_, c)| c == class));
        }
        assert_eq!(TAG_CLASSES.len(), 6);
    }

    #[test]
    fn test_lookup_matches_tag_table() {
        assert_eq!(TAG_LOOKUP.len(), TAG_CLASSES.len());
        for (tag, class) in TAG_CLASSES {
            assert_eq!(canonical_class(tag), Some(*class));
        }
        assert_eq!(canonical_class(""), None);
    }
}
