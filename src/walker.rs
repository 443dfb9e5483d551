// src/walker.rs
// ============================================================================
// WALKER - Localiza directorios con tabla de anotaciones
// ============================================================================
//
// Recorrido top-down. Un directorio que contiene frameAnnotationsBOX.csv es
// una unidad hoja del dataset: se emite y NO se desciende en él.
//
// ============================================================================

use std::path::{Path, PathBuf};

use log::warn;
use walkdir::WalkDir;

use crate::annotation::ANNOTATION_FILE;

/// Iterador perezoso sobre los directorios anotados bajo una raíz.
///
/// Las entradas se ordenan por nombre para que el orden de frames (y con él
/// la asignación de shards) no dependa del sistema de archivos.
pub struct AnnotatedDirs {
    inner: walkdir::IntoIter,
}

impl AnnotatedDirs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let inner = WalkDir::new(root.as_ref())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Self { inner }
    }
}

impl Iterator for AnnotatedDirs {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable path during walk: {}", err);
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            if entry.path().join(ANNOTATION_FILE).is_file() {
                // Poda: el directorio recién emitido no se recorre
                self.inner.skip_current_dir();
                return Some(entry.into_path());
            }
        }
    }
}

/// Atajo para `AnnotatedDirs::new`
pub fn annotated_dirs(root: impl AsRef<Path>) -> AnnotatedDirs {
    AnnotatedDirs::new(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch_annotation(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(ANNOTATION_FILE), "Filename;Annotation tag\n").unwrap();
    }

    #[test]
    fn test_prunes_below_annotated_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        touch_annotation(&root.join("dayTrain/clip1"));
        touch_annotation(&root.join("dayTrain/clip1/nested"));
        touch_annotation(&root.join("dayTrain/clip2"));
        fs::create_dir_all(root.join("empty/deeper")).unwrap();
        touch_annotation(&root.join("nightTrain/clip1"));

        let dirs: Vec<PathBuf> = annotated_dirs(root).collect();
        assert_eq!(
            dirs,
            vec![
                root.join("dayTrain/clip1"),
                root.join("dayTrain/clip2"),
                root.join("nightTrain/clip1"),
            ]
        );
    }

    #[test]
    fn test_annotated_root_stops_walk() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        touch_annotation(root);
        touch_annotation(&root.join("child"));

        let dirs: Vec<PathBuf> = annotated_dirs(root).collect();
        assert_eq!(dirs, vec![root.to_path_buf()]);
    }

    #[test]
    fn test_annotation_name_as_directory_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        fs::create_dir_all(root.join("odd").join(ANNOTATION_FILE)).unwrap();

        assert_eq!(annotated_dirs(root).count(), 0);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(annotated_dirs(tmp.path().join("missing")).count(), 0);
    }
}
