// src/config.rs
// ============================================================================
// CONFIG - Configuración resuelta de una ejecución
// ============================================================================

use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};

/// Número de shards de salida
pub const NUM_SHARDS: usize = 30;

/// Label map incluido en el repositorio
pub const DEFAULT_LABEL_MAP_PATH: &str = "data/lisa_label_map.pbtxt";

/// Semilla por defecto para --shuffle
pub const DEFAULT_SEED: u64 = 42;

/// Parámetros de la conversión, ya validados.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub data_dir: PathBuf,
    pub output_path: PathBuf,
    pub label_map_path: PathBuf,
    pub num_shards: usize,
    /// Baraja la lista de frames antes de asignar shards
    pub shuffle: bool,
    pub seed: u64,
    /// Escribe `<prefix>.summary.json` al terminar
    pub write_summary: bool,
    pub show_progress: bool,
}

impl ConvertConfig {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        label_map_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            output_path: output_path.into(),
            label_map_path: label_map_path.into(),
            num_shards: NUM_SHARDS,
            shuffle: false,
            seed: DEFAULT_SEED,
            write_summary: false,
            show_progress: false,
        }
    }

    pub fn with_num_shards(mut self, num_shards: usize) -> Self {
        self.num_shards = num_shards;
        self
    }

    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    pub fn with_summary(mut self, enabled: bool) -> Self {
        self.write_summary = enabled;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_shards == 0 {
            return Err(ConvertError::InvalidShardCount);
        }
        if !self.data_dir.is_dir() {
            return Err(ConvertError::DataDir(self.data_dir.clone()));
        }
        Ok(())
    }

    /// Ruta del resumen JSON: `<prefix>.summary.json`
    pub fn summary_path(&self) -> PathBuf {
        summary_path_for(&self.output_path)
    }
}

fn summary_path_for(prefix: &Path) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(".summary.json");
    PathBuf::from(name)
}
