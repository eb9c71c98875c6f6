//! # affs-recover
//!
//! Read-only recovery of files and directories from raw Amiga AFFS disk
//! images (ADF floppies, hard disk images with a rigid disk block, or bare
//! partition dumps) without a filesystem driver.
//!
//! The crate is built for damaged media:
//!
//! - Checksums are computed for every block but never enforced; the result
//!   travels with the decoded record as a flag.
//! - Hash chains, extension chains and OFS data chains are walked with a
//!   visited set bounded by the partition size, so corrupt links cannot
//!   loop forever.
//! - File contents are reassembled lazily, with unreadable blocks replaced
//!   by zero-filled placeholders and every deviation listed in a
//!   [`RecoveryReport`].
//!
//! ## Features
//!
//! - OFS and FFS, international and directory-cache variants
//! - Block sizes from 512 to 32768 bytes
//! - Rigid disk block partition tables
//! - Hard and soft links
//! - `simd`: vectorized checksum summing
//!
//! ## Example
//!
//! ```ignore
//! use affs_recover::Disk;
//!
//! let disk = Disk::open_path("damaged.hdf")?;
//! for (n, part) in disk.partitions().iter().enumerate() {
//!     println!("{n}: {} ({} blocks)", part.name_str(), part.block_count());
//! }
//!
//! let root = disk.partition(0)?.root()?;
//! let docs = root.cd("Work/docs")?;
//! for entry in docs.list() {
//!     println!("{}", entry?.name_str());
//! }
//!
//! let file = docs.open_file("notes.txt")?;
//! let recovered = file.read_all();
//! if !recovered.report.is_complete() {
//!     eprintln!("{} gaps", recovered.report.gaps.len());
//! }
//! ```
//!
//! The crate never installs a `tracing` subscriber; recovery events are
//! emitted under the `affs::boot`, `affs::dir` and `affs::file` targets.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod block;
mod boot;
mod checksum;
mod config;
mod constants;
mod date;
mod dir;
mod disk;
mod error;
mod file;
mod handle;
mod source;
mod symlink;
mod utf8;

pub use block::{
    BlockKind, DataBlockRecord, FileExtRecord, FileRecord, HeaderRecord, Record, RootRecord,
    classify, hash_name, intl_to_upper, names_equal,
};
pub use boot::{BootInfo, BootKind, DosType, FsType, PartitionEntry};
pub use checksum::{
    block_sum, boot_sum, normal_sum, read_i32_be, read_u32_be, verify_checksum,
    verify_summed_longs,
};
pub use config::DiskConfig;
pub use constants::*;
pub use date::AmigaDate;
pub use dir::{DirEntry, DirIter, EntryKind};
pub use disk::{Disk, Partition};
pub use error::{AffsError, Result};
pub use file::{ChainEnd, Chunk, ChunkStream, FileHandle, Gap, GapReason, RecoveredFile, RecoveryReport};
pub use handle::{DirRecord, DirectoryHandle, Walk};
pub use source::{BlockSource, RawBlock};
pub use symlink::{max_symlink_len, read_symlink_target, to_host_path};
pub use utf8::{decode_name, encode_name, from_utf8};
