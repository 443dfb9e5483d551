// src/annotation/parser.rs
// ============================================================================
// PARSER - Lee la tabla y agrupa filas por imagen
// ============================================================================
//
// El agrupamiento es por filas ADYACENTES con el mismo Filename, no un
// group-by global: una tabla con nombres intercalados produce varios frames
// parciales para la misma imagen. Se conserva así para no alterar el layout
// de shards ya generados.
//
// ============================================================================

use std::fs;
use std::path::Path;

use log::{error, info};

use super::{canonical_class, FrameRecord, RawBox, ANNOTATION_FILE, FRAMES_DIR};
use crate::error::{ConvertError, Result};

const COL_FILENAME: &str = "Filename";
const COL_TAG: &str = "Annotation tag";
const COL_UL_X: &str = "Upper left corner X";
const COL_UL_Y: &str = "Upper left corner Y";
const COL_LR_X: &str = "Lower right corner X";
const COL_LR_Y: &str = "Lower right corner Y";

/// Una fila de la tabla. Las columnas extra (Origin file, ...) se ignoran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationRow {
    pub filename: String,
    pub tag: String,
    pub upper_left_x: String,
    pub upper_left_y: String,
    pub lower_right_x: String,
    pub lower_right_y: String,
}

/// Posición de cada columna requerida dentro de la cabecera
struct ColumnIndex {
    filename: usize,
    tag: usize,
    upper_left_x: usize,
    upper_left_y: usize,
    lower_right_x: usize,
    lower_right_y: usize,
}

impl ColumnIndex {
    fn from_headers(path: &Path, headers: &csv::StringRecord) -> Result<Self> {
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ConvertError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name,
                })
        };

        Ok(Self {
            filename: column(COL_FILENAME)?,
            tag: column(COL_TAG)?,
            upper_left_x: column(COL_UL_X)?,
            upper_left_y: column(COL_UL_Y)?,
            lower_right_x: column(COL_LR_X)?,
            lower_right_y: column(COL_LR_Y)?,
        })
    }

    /// Un campo ausente (fila corta) queda vacío
    fn row(&self, record: &csv::StringRecord) -> AnnotationRow {
        let field = |idx: usize| record.get(idx).unwrap_or_default().to_string();
        AnnotationRow {
            filename: field(self.filename),
            tag: field(self.tag),
            upper_left_x: field(self.upper_left_x),
            upper_left_y: field(self.upper_left_y),
            lower_right_x: field(self.lower_right_x),
            lower_right_y: field(self.lower_right_y),
        }
    }
}

/// Parsea el texto de una tabla (`;` como separador, cabecera obligatoria).
/// `path` solo se usa en los mensajes de error.
///
/// Las filas pueden tener más o menos campos que la cabecera: los sobrantes
/// se ignoran y los que faltan quedan vacíos. Una fila corta con tag
/// reconocido falla después, al convertir sus coordenadas.
pub fn read_rows(path: &Path, text: &str) -> Result<Vec<AnnotationRow>> {
    let csv_err = |source: csv::Error| ConvertError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = ColumnIndex::from_headers(path, reader.headers().map_err(csv_err)?)?;

    reader
        .records()
        .map(|record| record.map(|r| columns.row(&r)).map_err(csv_err))
        .collect()
}

/// Agrupa elementos consecutivos con la misma clave, conservando el orden.
pub fn group_adjacent<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<(K, Vec<T>)>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        if let Some((last, group)) = groups.last_mut() {
            if *last == k {
                group.push(item);
                continue;
            }
        }
        groups.push((k, vec![item]));
    }
    groups
}

/// Construye el frame de un grupo. Devuelve None (y lo registra) si la
/// imagen no existe en `<dir>/frames/`.
fn create_frame(dir: &Path, name: &str, rows: &[AnnotationRow]) -> Option<FrameRecord> {
    // Solo cuenta el basename: los componentes de directorio del CSV se ignoran
    let Some(basename) = Path::new(name).file_name() else {
        error!("Annotation in {} has no usable filename: '{}'", dir.display(), name);
        return None;
    };
    let filename = dir.join(FRAMES_DIR).join(basename);

    if !filename.exists() {
        error!("File {} not found", filename.display());
        return None;
    }

    let mut frame = FrameRecord::new(filename);
    for row in rows {
        let Some(class) = canonical_class(&row.tag) else {
            continue;
        };
        frame.boxes.push(RawBox {
            xmin: row.upper_left_x.clone(),
            ymin: row.upper_left_y.clone(),
            xmax: row.lower_right_x.clone(),
            ymax: row.lower_right_y.clone(),
            class,
        });
    }

    Some(frame)
}

/// Procesa el frameAnnotationsBOX.csv de un directorio anotado.
///
/// Un frame sin tags reconocidos se emite igualmente, con la lista de cajas
/// vacía.
pub fn parse_annotation_dir(dir: &Path) -> Result<Vec<FrameRecord>> {
    let path = dir.join(ANNOTATION_FILE);
    info!("Processing {}", path.display());

    let text = fs::read_to_string(&path).map_err(|e| ConvertError::io(&path, e))?;
    let rows = read_rows(&path, &text)?;

    let frames = group_adjacent(rows, |row| row.filename.clone())
        .into_iter()
        .filter_map(|(name, group)| create_frame(dir, &name, &group))
        .collect();

    Ok(frames)
}
