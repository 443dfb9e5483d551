// src/tfrecord/shard.rs
// ============================================================================
// SHARDS - N archivos TFRecord abiertos durante toda la ejecución
// ============================================================================
//
// Nombres: <prefix>-00000-of-00030 ... <prefix>-00029-of-00030
//
// Todos se abren al principio; si uno falla, los ya abiertos se cierran al
// soltar el ShardSet parcial y la ejecución aborta. BufWriter vacía el buffer
// en Drop, así que un abort a mitad de lista no pierde lo ya escrito; el
// cierre normal pasa por finish() para propagar errores de flush.
//
// ============================================================================

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use super::write_record;
use crate::error::{ConvertError, Result};

/// `<prefix>-<index:05>-of-<total:05>`
pub fn shard_path(prefix: &Path, index: usize, total: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!("-{:05}-of-{:05}", index, total));
    PathBuf::from(name)
}

/// Resumen de un shard cerrado
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShardSummary {
    pub path: PathBuf,
    pub records: u64,
    pub bytes: u64,
    /// CRC-32 del archivo completo
    pub crc32: u32,
}

/// Writer que acumula el CRC-32 y el tamaño de todo lo que pasa por él
struct HashingWriter<W> {
    inner: W,
    hasher: crc32fast::Hasher,
    bytes: u64,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Un archivo TFRecord con checksum incremental del contenido escrito
pub struct ShardWriter {
    path: PathBuf,
    file: HashingWriter<BufWriter<File>>,
    records: u64,
}

impl ShardWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|source| ConvertError::ShardOpen {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            file: HashingWriter {
                inner: BufWriter::new(file),
                hasher: crc32fast::Hasher::new(),
                bytes: 0,
            },
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn write_record(&mut self, data: &[u8]) -> Result<()> {
        write_record(&mut self.file, data).map_err(|e| ConvertError::io(&self.path, e))?;
        self.records += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<ShardSummary> {
        self.file
            .flush()
            .map_err(|e| ConvertError::io(&self.path, e))?;

        Ok(ShardSummary {
            path: self.path,
            records: self.records,
            bytes: self.file.bytes,
            crc32: self.file.hasher.finalize(),
        })
    }
}

/// Conjunto completo de shards. El registro en la posición `i` de la lista
/// completa va al shard `i % N`.
pub struct ShardSet {
    shards: Vec<ShardWriter>,
}

impl ShardSet {
    /// Abre los N shards; todo o nada
    pub fn open(prefix: &Path, num_shards: usize) -> Result<Self> {
        if num_shards == 0 {
            return Err(ConvertError::InvalidShardCount);
        }

        let shards = (0..num_shards)
            .map(|idx| ShardWriter::create(shard_path(prefix, idx, num_shards)))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Opened {} shards at {}-*-of-{:05}",
            num_shards,
            prefix.display(),
            num_shards
        );
        Ok(Self { shards })
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn shard_for(&self, index: usize) -> usize {
        index % self.shards.len()
    }

    /// Escribe el registro de la posición `index`; devuelve el shard usado
    pub fn write(&mut self, index: usize, data: &[u8]) -> Result<usize> {
        let shard = self.shard_for(index);
        self.shards[shard].write_record(data)?;
        Ok(shard)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.shards.iter().map(|s| s.path().to_path_buf()).collect()
    }

    pub fn finish(self) -> Result<Vec<ShardSummary>> {
        self.shards.into_iter().map(ShardWriter::finish).collect()
    }
}
