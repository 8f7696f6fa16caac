//! Memory-mapped shard files.
//!
//! A shard holds one contiguous batch of document vectors for one strategy.
//! Shards are written once, atomically, and only read afterwards.
//!
//! # Storage Format
//!
//! - Header (16 bytes): magic `SHRD`, version, dimension, row count (u32 LE)
//! - Rows: row-major f32 values in little-endian format
//!
//! Row `i` of shard `s` is document `s * shard_size + i`.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use crate::embedding::{ShardIndex, StoreError, Strategy, VectorDimension};
use crate::persist::atomic_write;

/// Current shard format version.
pub const SHARD_VERSION: u32 = 1;

const HEADER_SIZE: usize = 16;

const MAGIC_BYTES: &[u8; 4] = b"SHRD";

const BYTES_PER_F32: usize = 4;

/// A read-only, memory-mapped shard.
#[derive(Debug)]
pub struct EmbeddingShard {
    path: PathBuf,
    mmap: Mmap,
    strategy: Strategy,
    index: ShardIndex,
    dimension: VectorDimension,
    rows: usize,
}

impl EmbeddingShard {
    /// File name of a shard: `<strategy>.<index>.shard`.
    #[must_use]
    pub fn file_name(strategy: Strategy, index: ShardIndex) -> String {
        format!("{strategy}.{index}.shard")
    }

    #[must_use]
    pub fn path_for(directory: &Path, strategy: Strategy, index: ShardIndex) -> PathBuf {
        directory.join(Self::file_name(strategy, index))
    }

    /// Encodes `vectors` and writes them as one shard.
    ///
    /// Every vector must have `dimension` values. The file appears under its
    /// final name only once it is complete.
    pub fn write(
        directory: &Path,
        strategy: Strategy,
        index: ShardIndex,
        dimension: VectorDimension,
        vectors: &[Vec<f32>],
    ) -> Result<PathBuf, StoreError> {
        for vector in vectors {
            dimension.validate_vector(vector)?;
        }

        let mut bytes =
            Vec::with_capacity(HEADER_SIZE + vectors.len() * dimension.get() * BYTES_PER_F32);
        bytes.extend_from_slice(MAGIC_BYTES);
        bytes.extend_from_slice(&SHARD_VERSION.to_le_bytes());
        bytes.extend_from_slice(&to_u32(dimension.get(), "dimension")?.to_le_bytes());
        bytes.extend_from_slice(&to_u32(vectors.len(), "row count")?.to_le_bytes());
        for vector in vectors {
            for &value in vector {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }

        let path = Self::path_for(directory, strategy, index);
        atomic_write(&path, &bytes)?;
        tracing::debug!(
            "Wrote shard {} ({} rows x {dimension})",
            path.display(),
            vectors.len()
        );
        Ok(path)
    }

    /// Maps an existing shard and validates its header.
    pub fn open(
        directory: &Path,
        strategy: Strategy,
        index: ShardIndex,
    ) -> Result<Self, StoreError> {
        let path = Self::path_for(directory, strategy, index);
        let file = File::open(&path)?;
        // SAFETY: shards are never modified in place; replacements go through
        // a rename, which leaves this mapping pointing at the old inode.
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let (version, dimension, rows) = Self::read_header(&path, &mmap)?;
        if version != SHARD_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SHARD_VERSION,
                actual: version,
            });
        }

        let expected_len = HEADER_SIZE + rows * dimension.get() * BYTES_PER_F32;
        if mmap.len() != expected_len {
            return Err(StoreError::InvalidFormat {
                path: path.display().to_string(),
                reason: format!("expected {expected_len} bytes, found {}", mmap.len()),
            });
        }

        Ok(Self {
            path,
            mmap,
            strategy,
            index,
            dimension,
            rows,
        })
    }

    fn read_header(path: &Path, mmap: &Mmap) -> Result<(u32, VectorDimension, usize), StoreError> {
        let invalid = |reason: &str| StoreError::InvalidFormat {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        if mmap.len() < HEADER_SIZE {
            return Err(invalid("file too small to contain header"));
        }
        if &mmap[0..4] != MAGIC_BYTES {
            return Err(invalid("invalid magic bytes"));
        }

        let version = read_u32(&mmap[4..8]);
        let dimension = VectorDimension::new(read_u32(&mmap[8..12]) as usize);
        let rows = read_u32(&mmap[12..16]) as usize;
        Ok((version, dimension, rows))
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[must_use]
    pub fn index(&self) -> ShardIndex {
        self.index
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes one row, `None` past the end.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<Vec<f32>> {
        if row >= self.rows {
            return None;
        }
        let width = self.dimension.get() * BYTES_PER_F32;
        let start = HEADER_SIZE + row * width;
        Some(decode_f32s(&self.mmap[start..start + width]))
    }

    /// Iterates over every row in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = Vec<f32>> + '_ {
        (0..self.rows).filter_map(move |row| self.row(row))
    }

    /// Copies the whole shard into memory.
    #[must_use]
    pub fn to_matrix(&self) -> Vec<Vec<f32>> {
        self.iter_rows().collect()
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn decode_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_F32)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn to_u32(value: usize, what: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::InvalidFormat {
        path: String::new(),
        reason: format!("{what} {value} does not fit the shard header"),
    })
}
