// src/error.rs
// ============================================================================
// ERRORES - Fallos fatales de la conversión
// ============================================================================
//
// Los rechazos por registro (archivo ausente, formato, tamaño) NO son errores:
// viajan como SkipReason dentro de BuildOutcome. Todo lo que llega aquí aborta
// la ejecución.
//
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read annotation table {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("annotation table {} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("invalid label map {}: {message}", path.display())]
    LabelMap { path: PathBuf, message: String },

    #[error("class '{0}' has no entry in the label map")]
    UnknownLabel(String),

    #[error("invalid {field} coordinate '{value}' for {}", filename.display())]
    InvalidCoordinate {
        filename: PathBuf,
        field: &'static str,
        value: String,
    },

    #[error("cannot open shard {}: {source}", path.display())]
    ShardOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shard count must be positive")]
    InvalidShardCount,

    #[error("data directory {} does not exist or is not a directory", .0.display())]
    DataDir(PathBuf),

    #[error("corrupt record: {0}")]
    Record(String),

    #[error("malformed example: {0}")]
    Decode(String),
}

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
