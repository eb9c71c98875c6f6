//! File reconstruction.
//!
//! A file's bytes are reassembled from its header's reverse-ordered pointer
//! array and the chain of extension blocks that continues it (FFS), or from
//! the `next_data` chain of self-describing data blocks (OFS). Damage along
//! the way never aborts a file. Unreadable data blocks become zero-filled
//! placeholders and broken or cyclic chains end the stream early; both are
//! recorded in the [`RecoveryReport`].
//!
//! # Example
//!
//! ```ignore
//! let file = root.open_file("s/startup-sequence")?;
//! let mut out = std::fs::File::create("startup-sequence")?;
//! let report = file.copy_to(&mut out)?;
//! if !report.is_complete() {
//!     eprintln!("recovered {} of {} bytes", report.recovered_size, report.declared_size);
//! }
//! ```

use std::collections::HashSet;
use std::io::Write;

use tracing::{debug, trace, warn};

use crate::block::{BlockKind, DataBlockRecord, FileExtRecord, FileRecord, HeaderRecord, classify};
use crate::boot::FsType;
use crate::constants::OFS_HEADER_SIZE;
use crate::disk::Partition;
use crate::error::{AffsError, Result};
use crate::source::BlockSource;

/// Why a region of the output is a zero-filled placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapReason {
    /// The pointer slot was 0.
    NullPointer,
    /// The pointer lies outside the partition.
    OutOfRange,
    /// The block could not be read from the image.
    Unreadable,
    /// The block is not an OFS data block.
    WrongType,
}

/// A zero-filled region of the recovered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Byte offset in the output.
    pub offset: u64,
    /// Placeholder length.
    pub length: u64,
    /// Block address the bytes should have come from.
    pub address: u32,
    /// Why the block was not used.
    pub reason: GapReason,
}

/// How reconstruction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEnd {
    /// The declared size was reached.
    Complete,
    /// An OFS `next_data` link was 0 before the declared size.
    NullLink,
    /// A link pointed outside the partition or at an unusable block.
    BrokenLink(u32),
    /// A chain revisited this address.
    Cycle(u32),
    /// The pointer arrays ran out before the declared size.
    PointersExhausted,
}

/// Outcome of reconstructing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Size stored in the file header.
    pub declared_size: u64,
    /// Bytes produced, placeholders included.
    pub recovered_size: u64,
    /// Zero-filled placeholders, in output order.
    pub gaps: Vec<Gap>,
    /// Blocks read along the way whose checksum did not hold.
    pub checksum_mismatches: Vec<u32>,
    /// How the walk ended.
    pub end: ChainEnd,
}

impl RecoveryReport {
    fn new(declared_size: u64) -> Self {
        Self {
            declared_size,
            recovered_size: 0,
            gaps: Vec::new(),
            checksum_mismatches: Vec::new(),
            end: ChainEnd::Complete,
        }
    }

    /// Every declared byte recovered from its own block.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.end == ChainEnd::Complete
            && self.gaps.is_empty()
            && self.recovered_size == self.declared_size
    }

    /// Output is a strict prefix of the declared size.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.recovered_size < self.declared_size
    }

    /// Output contains zero-filled placeholders.
    #[inline]
    pub fn has_gaps(&self) -> bool {
        !self.gaps.is_empty()
    }

    /// An extension or data chain looped.
    #[inline]
    pub fn cycle_detected(&self) -> bool {
        matches!(self.end, ChainEnd::Cycle(_))
    }

    /// Turn a cycle or a truncation into an error.
    ///
    /// Gaps alone are not an error: the output still has the declared
    /// length and the placeholders are listed in the report.
    pub fn into_error(self) -> Result<Self> {
        if let ChainEnd::Cycle(address) = self.end {
            return Err(AffsError::CycleDetected { address });
        }
        if self.is_truncated() {
            return Err(AffsError::Truncated {
                recovered: self.recovered_size,
                declared: self.declared_size,
            });
        }
        Ok(self)
    }
}

/// One piece of recovered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset in the file.
    pub offset: u64,
    /// Payload bytes.
    pub data: Vec<u8>,
    /// Zero-filled stand-in for a missing block.
    pub placeholder: bool,
}

/// A fully buffered file together with its report.
#[derive(Debug, Clone)]
pub struct RecoveredFile {
    /// Recovered bytes.
    pub data: Vec<u8>,
    /// What happened while recovering them.
    pub report: RecoveryReport,
}

/// An opened file header.
///
/// Holds an owned snapshot of the header. Every call to
/// [`chunks`](Self::chunks) starts a fresh walk from that snapshot.
pub struct FileHandle<'a, S: BlockSource> {
    partition: Partition<'a, S>,
    record: FileRecord,
}

impl<S: BlockSource> Clone for FileHandle<'_, S> {
    fn clone(&self) -> Self {
        Self {
            partition: self.partition,
            record: self.record.clone(),
        }
    }
}

impl<'a, S: BlockSource> FileHandle<'a, S> {
    /// Open the file header at `address`, following a hard link if needed.
    pub fn open(partition: Partition<'a, S>, address: u32) -> Result<Self> {
        let mut block = partition.read_block(address)?;
        if classify(&block)? == BlockKind::HardLinkFile {
            let link = HeaderRecord::decode(&block)?;
            debug!(target: "affs::file", event = "follow_hard_link", address, target = link.real_entry);
            block = partition.read_block(link.real_entry)?;
        }

        match classify(&block)? {
            BlockKind::File => {}
            _ => return Err(AffsError::NotAFile(format!("block {}", block.address()))),
        }

        let record = FileRecord::decode(&block)?;
        if !record.checksum_valid {
            warn!(target: "affs::file", event = "header_checksum_mismatch", address = record.address);
        }
        Ok(Self { partition, record })
    }

    /// Header snapshot.
    #[inline]
    pub const fn record(&self) -> &FileRecord {
        &self.record
    }

    /// Header block address.
    #[inline]
    pub const fn address(&self) -> u32 {
        self.record.address
    }

    /// Declared size in bytes.
    #[inline]
    pub const fn size(&self) -> u64 {
        self.record.byte_size as u64
    }

    /// Filesystem variant used to interpret the data blocks.
    #[inline]
    pub const fn fs_type(&self) -> FsType {
        self.partition.fs_type()
    }

    /// Lazy stream of recovered chunks.
    pub fn chunks(&self) -> ChunkStream<'a, S> {
        ChunkStream::new(self.partition, self.record.clone())
    }

    /// Recover the whole file into memory.
    pub fn read_all(&self) -> RecoveredFile {
        let mut stream = self.chunks();
        let bound = u64::from(self.partition.block_count()) * self.partition.block_size() as u64;
        let mut data = Vec::with_capacity(self.size().min(bound) as usize);
        for chunk in stream.by_ref() {
            data.extend_from_slice(&chunk.data);
        }
        RecoveredFile {
            data,
            report: stream.into_report(),
        }
    }

    /// Stream the recovered bytes into `out`.
    ///
    /// Only a failing writer produces an error; damage on the image is
    /// described by the returned report.
    pub fn copy_to<W: Write>(&self, out: &mut W) -> Result<RecoveryReport> {
        let mut stream = self.chunks();
        for chunk in stream.by_ref() {
            out.write_all(&chunk.data).map_err(|source| AffsError::Io {
                address: u64::from(self.record.address),
                source,
            })?;
        }
        Ok(stream.into_report())
    }
}

/// Data block pointers in file order, across the header and its extension
/// blocks. Extension blocks are read only when the previous array runs out.
struct PointerChain<'a, S: BlockSource> {
    partition: Partition<'a, S>,
    header: u32,
    segment: std::vec::IntoIter<u32>,
    next_ext: u32,
    visited: HashSet<u32>,
    yielded: u64,
    end: Option<ChainEnd>,
}

impl<'a, S: BlockSource> PointerChain<'a, S> {
    fn new(partition: Partition<'a, S>, record: &FileRecord) -> Self {
        Self {
            partition,
            header: record.address,
            segment: record.ordered_blocks().into_iter(),
            next_ext: record.extension,
            visited: HashSet::from([record.address]),
            yielded: 0,
            end: None,
        }
    }

    fn next_pointer(&mut self, report: &mut RecoveryReport) -> Option<u32> {
        loop {
            if let Some(pointer) = self.segment.next() {
                self.yielded += 1;
                return Some(pointer);
            }
            if self.end.is_some() {
                return None;
            }

            let address = self.next_ext;
            if address == 0 {
                self.end = Some(ChainEnd::PointersExhausted);
                return None;
            }
            if !self.visited.insert(address)
                || self.visited.len() > self.partition.block_count() as usize
            {
                warn!(target: "affs::file", event = "extension_cycle", header = self.header, address);
                self.end = Some(ChainEnd::Cycle(address));
                return None;
            }

            let ext = self
                .partition
                .read_block(address)
                .and_then(|block| FileExtRecord::decode(&block));
            match ext {
                Ok(ext) => {
                    trace!(
                        target: "affs::file",
                        event = "extension_block",
                        address,
                        pointers = ext.data_blocks.len()
                    );
                    if !ext.checksum_valid {
                        warn!(target: "affs::file", event = "extension_checksum_mismatch", address);
                        report.checksum_mismatches.push(address);
                    }
                    if ext.parent != self.header {
                        debug!(target: "affs::file", event = "extension_foreign_parent", address, parent = ext.parent);
                    }
                    self.segment = ext.ordered_blocks().into_iter();
                    self.next_ext = ext.extension;
                }
                Err(err) => {
                    warn!(target: "affs::file", event = "extension_broken", address, error = %err);
                    self.end = Some(ChainEnd::BrokenLink(address));
                    return None;
                }
            }
        }
    }

    /// Pointer for the 0-based block `index`, skipping ahead as needed.
    fn pointer_at(&mut self, index: u64, report: &mut RecoveryReport) -> Option<u32> {
        while self.yielded < index {
            self.next_pointer(report)?;
        }
        if self.yielded == index {
            self.next_pointer(report)
        } else {
            None
        }
    }
}

/// OFS walk position.
struct OfsCursor {
    next: u32,
    index: u64,
    visited: HashSet<u32>,
}

/// Lazy sequence of recovered chunks for one file.
///
/// Each `next` reads at most one data block (plus any extension blocks
/// needed to find it). Dropping the stream stops the walk; it cannot be
/// resumed, so restart from [`FileHandle::chunks`] to read again.
pub struct ChunkStream<'a, S: BlockSource> {
    partition: Partition<'a, S>,
    pointers: PointerChain<'a, S>,
    ofs: Option<OfsCursor>,
    block_size: usize,
    header: u32,
    offset: u64,
    report: RecoveryReport,
    done: bool,
}

impl<'a, S: BlockSource> ChunkStream<'a, S> {
    fn new(partition: Partition<'a, S>, record: FileRecord) -> Self {
        let mut report = RecoveryReport::new(u64::from(record.byte_size));
        if !record.checksum_valid {
            report.checksum_mismatches.push(record.address);
        }
        let ofs = (partition.fs_type() == FsType::Ofs).then(|| OfsCursor {
            next: record.first_data,
            index: 0,
            visited: HashSet::new(),
        });

        let mut stream = Self {
            partition,
            pointers: PointerChain::new(partition, &record),
            ofs,
            block_size: partition.block_size(),
            header: record.address,
            offset: 0,
            report,
            done: false,
        };
        if let Some(cursor) = stream.ofs.as_mut() {
            let unusable = cursor.next == 0 || cursor.next >= partition.block_count();
            if unusable && record.byte_size > 0 {
                // Fall back to the first pointer of the header's array.
                let first = stream.pointers.pointer_at(0, &mut stream.report);
                if let Some(first) = first.filter(|&p| p != 0) {
                    debug!(target: "affs::file", event = "first_data_from_table", header = record.address, first_data = cursor.next, first);
                    cursor.next = first;
                    cursor.index = 0;
                }
            }
        }
        stream
    }

    /// Report for the bytes produced so far.
    #[inline]
    pub const fn report(&self) -> &RecoveryReport {
        &self.report
    }

    /// Consume the stream, returning its report.
    pub fn into_report(self) -> RecoveryReport {
        self.report
    }

    fn remaining(&self) -> u64 {
        self.report.declared_size - self.offset
    }

    fn finish(&mut self, end: ChainEnd) {
        self.done = true;
        self.report.end = end;
        if end != ChainEnd::Complete {
            warn!(
                target: "affs::file",
                event = "recovery_incomplete",
                header = self.header,
                recovered = self.offset,
                declared = self.report.declared_size,
                end = ?end
            );
        }
    }

    fn emit(&mut self, data: Vec<u8>, placeholder: bool) -> Chunk {
        let chunk = Chunk {
            offset: self.offset,
            data,
            placeholder,
        };
        self.offset += chunk.data.len() as u64;
        self.report.recovered_size = self.offset;
        chunk
    }

    fn placeholder(&mut self, len: usize, address: u32, reason: GapReason) -> Chunk {
        warn!(target: "affs::file", event = "gap", header = self.header, address, offset = self.offset, reason = ?reason);
        self.report.gaps.push(Gap {
            offset: self.offset,
            length: len as u64,
            address,
            reason,
        });
        self.emit(vec![0u8; len], true)
    }

    fn next_ffs(&mut self) -> Option<Chunk> {
        let want = self.remaining().min(self.block_size as u64) as usize;
        let Some(address) = self.pointers.next_pointer(&mut self.report) else {
            let end = self.pointers.end.unwrap_or(ChainEnd::PointersExhausted);
            self.finish(end);
            return None;
        };

        if address == 0 {
            return Some(self.placeholder(want, address, GapReason::NullPointer));
        }
        match self.partition.read_block(address) {
            Ok(block) => {
                trace!(target: "affs::file", event = "data_block", address, len = want);
                Some(self.emit(block.data()[..want].to_vec(), false))
            }
            Err(AffsError::OutOfRange { .. }) => {
                Some(self.placeholder(want, address, GapReason::OutOfRange))
            }
            Err(_) => Some(self.placeholder(want, address, GapReason::Unreadable)),
        }
    }

    fn next_ofs(&mut self, cursor: &mut OfsCursor) -> Option<Chunk> {
        loop {
            let address = cursor.next;
            if address == 0 {
                self.finish(ChainEnd::NullLink);
                return None;
            }
            if address >= self.partition.block_count() {
                self.finish(ChainEnd::BrokenLink(address));
                return None;
            }
            if !cursor.visited.insert(address) {
                warn!(target: "affs::file", event = "data_chain_cycle", header = self.header, address);
                self.finish(ChainEnd::Cycle(address));
                return None;
            }

            let remaining = self.remaining();
            let record = self
                .partition
                .read_block(address)
                .and_then(|block| DataBlockRecord::decode(&block));
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    let reason = if err.is_format() {
                        GapReason::WrongType
                    } else {
                        GapReason::Unreadable
                    };
                    let len = remaining.min((self.block_size - OFS_HEADER_SIZE) as u64) as usize;
                    let chunk = self.placeholder(len, address, reason);

                    cursor.index += 1;
                    let resumed = self.pointers.pointer_at(cursor.index, &mut self.report);
                    match resumed {
                        Some(next) if next != 0 => {
                            debug!(target: "affs::file", event = "data_chain_resume", index = cursor.index, next);
                            cursor.next = next;
                        }
                        _ if self.remaining() > 0 => {
                            let end = match self.pointers.end {
                                Some(cycle @ ChainEnd::Cycle(_)) => cycle,
                                _ => ChainEnd::BrokenLink(address),
                            };
                            self.finish(end);
                        }
                        _ => {}
                    }
                    return Some(chunk);
                }
            };

            if !record.checksum_valid {
                warn!(target: "affs::file", event = "data_checksum_mismatch", address);
                self.report.checksum_mismatches.push(address);
            }
            if u64::from(record.seq_num) != cursor.index + 1 || record.header_key != self.header {
                debug!(
                    target: "affs::file",
                    event = "data_block_mismatch",
                    address,
                    seq_num = record.seq_num,
                    header_key = record.header_key
                );
            }

            cursor.index += 1;
            cursor.next = record.next_data;
            let data = record.data();
            let len = (data.len() as u64).min(remaining) as usize;
            if len == 0 {
                continue;
            }
            trace!(target: "affs::file", event = "data_block", address, len);
            return Some(self.emit(data[..len].to_vec(), false));
        }
    }
}

impl<S: BlockSource> Iterator for ChunkStream<'_, S> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }
        if self.remaining() == 0 {
            self.done = true;
            return None;
        }

        match self.ofs.take() {
            Some(mut cursor) => {
                let chunk = self.next_ofs(&mut cursor);
                self.ofs = Some(cursor);
                chunk
            }
            None => self.next_ffs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_complete() {
        let mut report = RecoveryReport::new(1024);
        report.recovered_size = 1024;
        assert!(report.is_complete());
        assert!(!report.is_truncated());
        assert!(report.clone().into_error().is_ok());
    }

    #[test]
    fn test_report_truncated() {
        let mut report = RecoveryReport::new(1024);
        report.recovered_size = 976;
        report.end = ChainEnd::BrokenLink(99);
        assert!(report.is_truncated());
        assert!(!report.is_complete());
        assert!(matches!(
            report.into_error(),
            Err(AffsError::Truncated {
                recovered: 976,
                declared: 1024
            })
        ));
    }

    #[test]
    fn test_report_cycle() {
        let mut report = RecoveryReport::new(4096);
        report.recovered_size = 2048;
        report.end = ChainEnd::Cycle(7);
        assert!(report.cycle_detected());
        assert!(matches!(
            report.into_error(),
            Err(AffsError::CycleDetected { address: 7 })
        ));
    }

    #[test]
    fn test_gaps_are_not_truncation() {
        let mut report = RecoveryReport::new(512);
        report.recovered_size = 512;
        report.gaps.push(Gap {
            offset: 0,
            length: 512,
            address: 0,
            reason: GapReason::NullPointer,
        });
        assert!(report.has_gaps());
        assert!(!report.is_complete());
        assert!(report.into_error().is_ok());
    }
}
