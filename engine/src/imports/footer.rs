//! Parquet footer summary for folders shipped without `metadata.json`.
//!
//! Only the file tail is fetched; its last 8 bytes hold the footer length:
//!
//! ```text
//! PAR1 | row groups | footer (FileMetaData) | u32 LE footer length | PAR1
//! ```

use parquet::file::metadata::ParquetMetaDataReader;
use tracing::debug;

use super::storage::{BulkStorage, StorageEntry};
use crate::constants::imports::{MAX_FOOTER_BYTES, PARQUET_MAGIC};
use crate::errors::StorageError;

const TAIL_LEN: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetSummary {
    pub records: u64,
    pub columns: Vec<String>,
}

/// Footer length declared by the 8 byte tail, `None` without the magic
fn footer_len(tail: &[u8]) -> Option<u64> {
    if tail.len() != 8 || &tail[4..] != PARQUET_MAGIC {
        return None;
    }
    let len = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    Some(u64::from(len))
}

fn invalid(file: &StorageEntry, reason: impl Into<String>) -> StorageError {
    StorageError::InvalidResponse {
        path: file.path.clone(),
        reason: reason.into(),
    }
}

/// Record count and column paths of one parquet file
pub async fn read_footer(
    storage: &dyn BulkStorage,
    file: &StorageEntry,
) -> Result<ParquetSummary, StorageError> {
    // Leading magic plus the tail
    let minimum = TAIL_LEN + PARQUET_MAGIC.len() as u64;
    if file.size < minimum {
        return Err(invalid(file, format!("{} bytes is too short", file.size)));
    }

    let tail = storage
        .read_range(&file.path, file.size - TAIL_LEN, TAIL_LEN)
        .await?;
    let length = footer_len(&tail).ok_or_else(|| invalid(file, "not a parquet file"))?;
    if length == 0 || length > MAX_FOOTER_BYTES || length > file.size - minimum {
        return Err(invalid(file, format!("footer length {} out of range", length)));
    }

    let footer = storage
        .read_range(&file.path, file.size - TAIL_LEN - length, length)
        .await?;
    let metadata = ParquetMetaDataReader::decode_metadata(&footer)
        .map_err(|e| invalid(file, e.to_string()))?;

    let file_metadata = metadata.file_metadata();
    let records = u64::try_from(file_metadata.num_rows())
        .map_err(|_| invalid(file, format!("negative row count {}", file_metadata.num_rows())))?;
    let columns = file_metadata
        .schema_descr()
        .columns()
        .iter()
        .map(|column| column.path().string())
        .collect();

    debug!("Parquet footer of {}: {} records", file.path, records);
    Ok(ParquetSummary { records, columns })
}
