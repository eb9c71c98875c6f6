//! Directory entries and the hashed directory index.

use std::borrow::Cow;
use std::collections::HashSet;

use tracing::{trace, warn};

use crate::block::{BlockKind, HeaderRecord, hash_name, names_equal};
use crate::constants::MAX_NAME_LEN;
use crate::date::AmigaDate;
use crate::disk::Partition;
use crate::error::{AffsError, Result};
use crate::source::BlockSource;
use crate::utf8::decode_name;

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// User directory.
    UserDir,
    /// Soft link (target stored as a path string).
    SoftLink,
    /// Hard link to another header.
    HardLink {
        /// Target header block.
        target: u32,
        /// Whether the target is a directory.
        dir: bool,
    },
}

/// Directory entry information.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name, exactly as many bytes as the stored length.
    pub name: Vec<u8>,
    /// Entry kind.
    pub kind: EntryKind,
    /// File size (0 for anything but files).
    pub size: u32,
    /// Last modification date.
    pub date: AmigaDate,
    /// Parent directory block.
    pub parent: u32,
    /// Next entry in the same hash bucket.
    pub hash_chain: u32,
    /// Block address of this entry's header.
    pub address: u32,
    /// Protection bits.
    pub access: u32,
    /// Comment.
    pub comment: Vec<u8>,
    /// Advisory checksum result of the header block.
    pub checksum_valid: bool,
}

impl DirEntry {
    /// Build an entry from a decoded header.
    pub fn from_header(header: &HeaderRecord) -> Result<Self> {
        let kind = match header.kind {
            BlockKind::File => EntryKind::File,
            BlockKind::UserDir => EntryKind::UserDir,
            BlockKind::SoftLink => EntryKind::SoftLink,
            BlockKind::HardLinkDir => EntryKind::HardLink {
                target: header.real_entry,
                dir: true,
            },
            BlockKind::HardLinkFile => EntryKind::HardLink {
                target: header.real_entry,
                dir: false,
            },
            other => {
                let (block_type, sec_type) = other.type_codes();
                return Err(AffsError::CorruptObject {
                    address: header.address,
                    block_type,
                    sec_type,
                });
            }
        };

        Ok(Self {
            name: header.name.clone(),
            kind,
            size: if kind == EntryKind::File {
                header.byte_size
            } else {
                0
            },
            date: header.date,
            parent: header.parent,
            hash_chain: header.hash_chain,
            address: header.address,
            access: header.access,
            comment: header.comment.clone(),
            checksum_valid: header.checksum_valid,
        })
    }

    /// Entry name as bytes.
    #[inline]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Entry name as text (UTF-8, else Latin-1).
    #[inline]
    pub fn name_str(&self) -> Cow<'_, str> {
        decode_name(&self.name)
    }

    /// Check if this is a directory or a hard link to one.
    #[inline]
    pub const fn is_dir(&self) -> bool {
        matches!(
            self.kind,
            EntryKind::UserDir | EntryKind::HardLink { dir: true, .. }
        )
    }

    /// Check if this is a file or a hard link to one.
    #[inline]
    pub const fn is_file(&self) -> bool {
        matches!(
            self.kind,
            EntryKind::File | EntryKind::HardLink { dir: false, .. }
        )
    }

    /// Check if this is a soft link.
    #[inline]
    pub const fn is_symlink(&self) -> bool {
        matches!(self.kind, EntryKind::SoftLink)
    }

    /// Header block holding the entry's content (follows hard links).
    #[inline]
    pub const fn target(&self) -> u32 {
        match self.kind {
            EntryKind::HardLink { target, .. } => target,
            _ => self.address,
        }
    }
}

/// Read and decode one entry header.
pub(crate) fn read_entry<S: BlockSource>(
    partition: &Partition<'_, S>,
    address: u32,
) -> Result<DirEntry> {
    let block = partition.read_block(address)?;
    DirEntry::from_header(&HeaderRecord::decode(&block)?)
}

/// Find `name` in a directory hash table.
///
/// Walks the bucket chain in on-disk order and returns the first entry whose
/// stored name matches case-insensitively. A revisited address or an entry
/// that cannot be decoded ends the walk with [`AffsError::NotFound`].
pub(crate) fn lookup<S: BlockSource>(
    partition: &Partition<'_, S>,
    hash_table: &[u32],
    name: &[u8],
) -> Result<DirEntry> {
    let not_found = || AffsError::NotFound(decode_name(name).into_owned());
    if name.len() > MAX_NAME_LEN || hash_table.is_empty() {
        return Err(not_found());
    }

    let intl = partition.is_intl();
    let bucket = hash_name(name, intl, hash_table.len());
    let mut address = hash_table[bucket];
    let mut visited = HashSet::new();
    let limit = partition.block_count() as usize;

    while address != 0 {
        if !visited.insert(address) || visited.len() > limit {
            warn!(target: "affs::dir", event = "hash_chain_cycle", bucket, address);
            break;
        }
        let entry = match read_entry(partition, address) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(target: "affs::dir", event = "lookup_bad_entry", bucket, address, error = %err);
                break;
            }
        };
        trace!(target: "affs::dir", event = "chain_step", bucket, address);
        if names_equal(&entry.name, name, intl) {
            return Ok(entry);
        }
        address = entry.hash_chain;
    }

    Err(not_found())
}

/// Iterator over directory entries.
///
/// Visits buckets `0..table_size` in order and each bucket's chain in
/// on-disk order. Entries are not sorted. A block that cannot be read or
/// decoded is yielded as an error and ends its chain; iteration continues
/// with the next bucket.
pub struct DirIter<'a, S: BlockSource> {
    partition: Partition<'a, S>,
    hash_table: Vec<u32>,
    bucket: usize,
    next: u32,
    visited: HashSet<u32>,
}

impl<'a, S: BlockSource> DirIter<'a, S> {
    pub(crate) fn new(partition: Partition<'a, S>, hash_table: Vec<u32>) -> Self {
        Self {
            partition,
            hash_table,
            bucket: 0,
            next: 0,
            visited: HashSet::new(),
        }
    }
}

impl<S: BlockSource> Iterator for DirIter<'_, S> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while self.next == 0 {
                let head = *self.hash_table.get(self.bucket)?;
                self.bucket += 1;
                self.next = head;
            }

            let address = std::mem::take(&mut self.next);
            if !self.visited.insert(address)
                || self.visited.len() > self.partition.block_count() as usize
            {
                warn!(target: "affs::dir", event = "list_revisit", address);
                continue;
            }

            match read_entry(&self.partition, address) {
                Ok(entry) => {
                    self.next = entry.hash_chain;
                    return Some(Ok(entry));
                }
                Err(err) => {
                    warn!(target: "affs::dir", event = "list_bad_entry", address, error = %err);
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ST_FILE, T_LIST};

    fn header(kind: BlockKind) -> HeaderRecord {
        HeaderRecord {
            address: 77,
            kind,
            header_key: 77,
            high_seq: 0,
            first_data: 0,
            table: Vec::new(),
            access: 0,
            byte_size: 123,
            comment: Vec::new(),
            date: AmigaDate::default(),
            name: b"entry".to_vec(),
            real_entry: 0,
            next_link: 0,
            hash_chain: 0,
            parent: 880,
            extension: 0,
            checksum_valid: true,
        }
    }

    #[test]
    fn test_from_header_kinds() {
        let file = DirEntry::from_header(&header(BlockKind::File)).unwrap();
        assert!(file.is_file());
        assert_eq!(file.size, 123);

        let dir = DirEntry::from_header(&header(BlockKind::UserDir)).unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);
    }

    #[test]
    fn test_from_header_rejects_non_entry_kind() {
        assert!(matches!(
            DirEntry::from_header(&header(BlockKind::FileExt)),
            Err(AffsError::CorruptObject {
                address: 77,
                block_type: T_LIST,
                sec_type: ST_FILE
            })
        ));
    }
}
