// src/tfrecord/mod.rs
// ============================================================================
// TFRECORD - Framing de registros
// ============================================================================
//
// Layout de cada registro (little-endian):
//   [0:8]     length          u64
//   [8:12]    masked_crc32c(length bytes)
//   [12:12+n] data
//   [+4]      masked_crc32c(data)
//
// ============================================================================

pub mod shard;

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ConvertError, Result};

pub use shard::{shard_path, ShardSet, ShardSummary, ShardWriter};

pub const HEADER_SIZE: usize = 12;
pub const FOOTER_SIZE: usize = 4;

const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC-32C enmascarado, tal como lo guarda TFRecord
pub fn masked_crc(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Cabecera de un registro de `len` bytes
pub fn frame_header(len: usize) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    LittleEndian::write_u64(&mut header[0..8], len as u64);
    let crc = masked_crc(&header[0..8]);
    LittleEndian::write_u32(&mut header[8..12], crc);
    header
}

pub fn frame_footer(data: &[u8]) -> [u8; FOOTER_SIZE] {
    let mut footer = [0u8; FOOTER_SIZE];
    LittleEndian::write_u32(&mut footer, masked_crc(data));
    footer
}

/// Escribe un registro completo; devuelve los bytes escritos
pub fn write_record<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<usize> {
    writer.write_all(&frame_header(data.len()))?;
    writer.write_all(data)?;
    writer.write_all(&frame_footer(data))?;
    Ok(HEADER_SIZE + data.len() + FOOTER_SIZE)
}

/// Iterador sobre los registros de un stream, verificando ambos CRC.
/// Tras el primer error deja de producir elementos.
pub struct RecordReader<R> {
    inner: R,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }

    fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; HEADER_SIZE];
        let filled = read_full(&mut self.inner, &mut header)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < HEADER_SIZE {
            return Err(ConvertError::Record(format!(
                "truncated header ({} of {} bytes)",
                filled, HEADER_SIZE
            )));
        }

        let len = LittleEndian::read_u64(&header[0..8]);
        if LittleEndian::read_u32(&header[8..12]) != masked_crc(&header[0..8]) {
            return Err(ConvertError::Record("length CRC mismatch".to_string()));
        }

        let len = usize::try_from(len)
            .map_err(|_| ConvertError::Record(format!("record length {} too large", len)))?;
        let mut data = vec![0u8; len];
        let mut footer = [0u8; FOOTER_SIZE];
        if read_full(&mut self.inner, &mut data)? < len
            || read_full(&mut self.inner, &mut footer)? < FOOTER_SIZE
        {
            return Err(ConvertError::Record("truncated record".to_string()));
        }

        if LittleEndian::read_u32(&footer) != masked_crc(&data) {
            return Err(ConvertError::Record("data CRC mismatch".to_string()));
        }

        Ok(Some(data))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(data)) => Some(Ok(data)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Como read_exact, pero devuelve cuántos bytes se leyeron antes del EOF
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ConvertError::Record(format!("read failed: {}", e))),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_known_crc() {
        // Vector de referencia de CRC-32C
        assert_eq!(crc32c::crc32c(b"123456789"), 0xe306_9283);
        let crc = 0xe306_9283u32;
        assert_eq!(
            masked_crc(b"123456789"),
            ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
        );
    }

    #[test]
    fn test_record_layout() {
        let mut buf = Vec::new();
        let written = write_record(&mut buf, b"hello").unwrap();

        assert_eq!(written, 12 + 5 + 4);
        assert_eq!(buf.len(), written);
        assert_eq!(LittleEndian::read_u64(&buf[0..8]), 5);
        assert_eq!(LittleEndian::read_u32(&buf[8..12]), masked_crc(&5u64.to_le_bytes()));
        assert_eq!(&buf[12..17], b"hello");
        assert_eq!(LittleEndian::read_u32(&buf[17..21]), masked_crc(b"hello"));
    }

    #[test]
    fn test_reader_reads_all_records() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"first").unwrap();
        write_record(&mut buf, b"").unwrap();
        write_record(&mut buf, b"third").unwrap();

        let records: Vec<Vec<u8>> = RecordReader::new(Cursor::new(buf))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records, vec![b"first".to_vec(), Vec::new(), b"third".to_vec()]);
    }

    #[test]
    fn test_reader_detects_corruption() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"payload").unwrap();
        buf[14] ^= 0xFF;

        let mut reader = RecordReader::new(Cursor::new(buf));
        assert!(matches!(reader.next(), Some(Err(ConvertError::Record(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_reader_detects_truncation() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"payload").unwrap();
        buf.truncate(buf.len() - 2);

        let mut reader = RecordReader::new(Cursor::new(buf));
        assert!(matches!(reader.next(), Some(Err(ConvertError::Record(_)))));

        let mut reader = RecordReader::new(Cursor::new(vec![0u8; 5]));
        assert!(matches!(reader.next(), Some(Err(ConvertError::Record(_)))));
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(RecordReader::new(Cursor::new(Vec::new())).count(), 0);
    }
}
