use sha2::{Digest, Sha256};

use crate::TransferError;

/// A contiguous byte range of a blob, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: usize,
    pub end: usize,
}

impl ChunkRange {
    /// Length of the range in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Number of chunks a blob of `total_size` bytes splits into.
///
/// `ceil(total_size / chunk_size)`; zero for an empty blob.
pub fn chunk_count(total_size: usize, chunk_size: usize) -> Result<u32, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize);
    }
    u32::try_from(total_size.div_ceil(chunk_size)).map_err(|_| TransferError::TooManyChunks {
        total_size,
        chunk_size,
    })
}

/// Splits a blob of `total_size` bytes into ordered fixed-size ranges, the
/// last truncated to the remainder. An empty blob yields zero ranges.
pub fn split_ranges(
    total_size: usize,
    chunk_size: usize,
) -> Result<Vec<ChunkRange>, TransferError> {
    let count = chunk_count(total_size, chunk_size)?;
    let mut ranges = Vec::with_capacity(count as usize);
    let mut start = 0;
    while start < total_size {
        let end = usize::min(start + chunk_size, total_size);
        ranges.push(ChunkRange { start, end });
        start = end;
    }
    Ok(ranges)
}

/// Re-derives the byte range of a single chunk index.
///
/// Resume depends on this producing exactly the range `split_ranges` would
/// have produced for the same index.
pub fn range_for_index(
    total_size: usize,
    chunk_size: usize,
    index: u32,
) -> Result<ChunkRange, TransferError> {
    let total = chunk_count(total_size, chunk_size)?;
    if index >= total {
        return Err(TransferError::IndexOutOfRange { index, total });
    }
    let start = index as usize * chunk_size;
    let end = usize::min(start + chunk_size, total_size);
    Ok(ChunkRange { start, end })
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
