//! Error types for AFFS recovery operations.

use thiserror::Error;

/// Error type for AFFS recovery operations.
///
/// Checksum problems are never raised by the decoding paths; they are
/// surfaced as flags on [`RawBlock`](crate::RawBlock) and in the
/// [`RecoveryReport`](crate::RecoveryReport). `ChecksumMismatch` only
/// appears when a caller explicitly asks for a verified block.
#[derive(Debug, Error)]
pub enum AffsError {
    /// The image could not deliver the requested bytes.
    #[error("I/O error reading block {address}: {source}")]
    Io {
        /// Block (or sector) address being read.
        address: u64,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Block address past the end of the image or partition.
    #[error("block {address} out of range (limit {limit})")]
    OutOfRange {
        /// Requested address.
        address: u64,
        /// First invalid address.
        limit: u64,
    },

    /// Missing boot magic or otherwise unusable top-level structure.
    #[error("invalid on-disk format: {0}")]
    Format(String),

    /// Block whose type / secondary type combination is not recognized.
    #[error("corrupt object at block {address} (type {block_type}, sec_type {sec_type})")]
    CorruptObject {
        /// Block address.
        address: u32,
        /// Primary type field as stored.
        block_type: i32,
        /// Secondary type field as stored.
        sec_type: i32,
    },

    /// Checksum verification failed (advisory).
    #[error("checksum mismatch at block {address}")]
    ChecksumMismatch {
        /// Block address.
        address: u64,
    },

    /// Entry not found.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Entry exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Entry exists but is not a file.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Entry exists but is not a soft link.
    #[error("not a soft link: {0}")]
    NotASymlink(String),

    /// Partition index past the end of the partition list.
    #[error("no partition with index {0}")]
    NoSuchPartition(usize),

    /// An extension or hash chain revisited an address.
    #[error("cycle detected at block {address}")]
    CycleDetected {
        /// First address seen twice.
        address: u32,
    },

    /// Recovered bytes are a strict prefix of the declared size.
    #[error("truncated recovery: {recovered} of {declared} bytes")]
    Truncated {
        /// Bytes actually recovered.
        recovered: u64,
        /// Size declared in the file header.
        declared: u64,
    },
}

impl AffsError {
    /// Returns true for the I/O family (short or out-of-range reads).
    #[inline]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::OutOfRange { .. })
    }

    /// Returns true for the format family (bad magic, bad type fields).
    #[inline]
    pub const fn is_format(&self) -> bool {
        matches!(self, Self::Format(_) | Self::CorruptObject { .. })
    }
}

/// Result type for AFFS recovery operations.
pub type Result<T> = std::result::Result<T, AffsError>;
