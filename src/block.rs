//! Block classification, record decoding and name hashing.
//!
//! Every record is an owned snapshot decoded eagerly from a [`RawBlock`].
//! Length-prefixed text fields are clamped to their maximum and copied out,
//! so bytes past the declared length are never exposed.

use crate::checksum::read_u32_be;
use crate::constants::*;
use crate::date::AmigaDate;
use crate::error::{AffsError, Result};
use crate::source::RawBlock;

/// Classification of a block by its `type` and `sec_type` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Root block (type 2, sec_type 1).
    Root,
    /// User directory (type 2, sec_type 2).
    UserDir,
    /// File header (type 2, sec_type -3).
    File,
    /// Soft link (sec_type 3).
    SoftLink,
    /// Hard link to a directory (sec_type 4).
    HardLinkDir,
    /// Hard link to a file (sec_type -4).
    HardLinkFile,
    /// File extension block (type 16, sec_type -3).
    FileExt,
    /// OFS data block (type 8).
    Data,
}

impl BlockKind {
    /// Returns true for kinds that carry a directory hash table.
    #[inline]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Root | Self::UserDir | Self::HardLinkDir)
    }

    /// Returns true for file headers and hard links to files.
    #[inline]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File | Self::HardLinkFile)
    }

    /// On-disk `(type, sec_type)` pair. Data blocks carry no `sec_type`.
    pub const fn type_codes(self) -> (i32, i32) {
        match self {
            Self::Root => (T_HEADER, ST_ROOT),
            Self::UserDir => (T_HEADER, ST_DIR),
            Self::File => (T_HEADER, ST_FILE),
            Self::SoftLink => (T_HEADER, ST_LSOFT),
            Self::HardLinkDir => (T_HEADER, ST_LDIR),
            Self::HardLinkFile => (T_HEADER, ST_LFILE),
            Self::FileExt => (T_LIST, ST_FILE),
            Self::Data => (T_DATA, 0),
        }
    }

    /// Returns true for kinds that can appear in a directory hash chain.
    #[inline]
    pub const fn is_entry(self) -> bool {
        matches!(
            self,
            Self::UserDir | Self::File | Self::SoftLink | Self::HardLinkDir | Self::HardLinkFile
        )
    }
}

/// Classify a block by its type fields.
///
/// Unrecognized combinations yield [`AffsError::CorruptObject`]; the raw
/// block is still available to the caller for dumping.
pub fn classify(block: &RawBlock) -> Result<BlockKind> {
    let block_type = block.block_type();
    let sec_type = block.sec_type();

    let kind = match (block_type, sec_type) {
        (T_HEADER, ST_ROOT) => Some(BlockKind::Root),
        (T_HEADER, ST_DIR) => Some(BlockKind::UserDir),
        (T_HEADER, ST_FILE) => Some(BlockKind::File),
        (T_HEADER, ST_LSOFT) => Some(BlockKind::SoftLink),
        (T_HEADER, ST_LDIR) => Some(BlockKind::HardLinkDir),
        (T_HEADER, ST_LFILE) => Some(BlockKind::HardLinkFile),
        (T_LIST, ST_FILE) => Some(BlockKind::FileExt),
        (T_DATA, _) => Some(BlockKind::Data),
        _ => None,
    };

    kind.ok_or(AffsError::CorruptObject {
        address: block.address(),
        block_type,
        sec_type,
    })
}

/// A decoded block, tagged with its classification.
#[derive(Debug, Clone)]
pub enum Record {
    /// Root block.
    Root(RootRecord),
    /// Directory, file or link header.
    Header(HeaderRecord),
    /// File extension block.
    FileExt(FileExtRecord),
    /// OFS data block.
    Data(DataBlockRecord),
}

impl Record {
    /// Classify and fully decode a block.
    pub fn decode(block: &RawBlock) -> Result<Self> {
        match classify(block)? {
            BlockKind::Root => Ok(Self::Root(RootRecord::decode(block)?)),
            BlockKind::FileExt => Ok(Self::FileExt(FileExtRecord::decode(block)?)),
            BlockKind::Data => Ok(Self::Data(DataBlockRecord::decode(block)?)),
            _ => Ok(Self::Header(HeaderRecord::decode(block)?)),
        }
    }

    /// Classification discriminant of the decoded record.
    pub const fn kind(&self) -> BlockKind {
        match self {
            Self::Root(_) => BlockKind::Root,
            Self::Header(h) => h.kind,
            Self::FileExt(_) => BlockKind::FileExt,
            Self::Data(_) => BlockKind::Data,
        }
    }
}

fn expect_kind(block: &RawBlock, accept: impl Fn(BlockKind) -> bool) -> Result<BlockKind> {
    let kind = classify(block)?;
    if accept(kind) {
        Ok(kind)
    } else {
        Err(AffsError::CorruptObject {
            address: block.address(),
            block_type: block.block_type(),
            sec_type: block.sec_type(),
        })
    }
}

/// Read the table of `B/4 - 56` longwords starting at offset 24.
fn read_table(block: &RawBlock) -> Vec<u32> {
    let size = hash_table_size(block.len());
    (0..size)
        .map(|i| block.u32_at(OFF_TABLE + i * 4))
        .collect()
}

/// Read a length-prefixed string, clamped to `max` bytes.
pub(crate) fn read_bstr(buf: &[u8], offset: usize, max: usize) -> Vec<u8> {
    let Some(&len) = buf.get(offset) else {
        return Vec::new();
    };
    let len = (len as usize).min(max);
    let start = offset + 1;
    let end = (start + len).min(buf.len());
    buf.get(start..end).map(<[u8]>::to_vec).unwrap_or_default()
}

/// Parsed root block.
#[derive(Debug, Clone)]
pub struct RootRecord {
    /// Block address within the partition.
    pub address: u32,
    /// Hash table size as stored (the table length is always `B/4 - 56`).
    pub stored_table_size: u32,
    /// Directory hash table.
    pub hash_table: Vec<u32>,
    /// Bitmap valid flag (-1 = valid).
    pub bm_flag: i32,
    /// Bitmap page pointers.
    pub bm_pages: Vec<u32>,
    /// Bitmap extension block.
    pub bm_ext: u32,
    /// Last root directory change.
    pub root_modified: AmigaDate,
    /// Last change anywhere on the volume.
    pub volume_modified: AmigaDate,
    /// Volume creation date.
    pub created: AmigaDate,
    /// Volume name.
    pub disk_name: Vec<u8>,
    /// Directory cache extension (FFS only).
    pub extension: u32,
    /// Advisory checksum result.
    pub checksum_valid: bool,
}

impl RootRecord {
    /// Decode a root block.
    pub fn decode(block: &RawBlock) -> Result<Self> {
        expect_kind(block, |k| k == BlockKind::Root)?;
        let buf = block.data();
        let bs = block.len();

        let bm_pages = (0..BM_PAGES_ROOT_SIZE)
            .map(|i| read_u32_be(buf, tail_offset(bs, OFF_BM_PAGES) + i * 4))
            .collect();

        Ok(Self {
            address: block.address(),
            stored_table_size: block.u32_at(OFF_HT_SIZE),
            hash_table: read_table(block),
            bm_flag: block.i32_at(tail_offset(bs, OFF_BM_FLAG)),
            bm_pages,
            bm_ext: block.tail_u32(OFF_BM_EXT),
            root_modified: AmigaDate::read(buf, tail_offset(bs, OFF_DATE)),
            volume_modified: AmigaDate::read(buf, tail_offset(bs, OFF_VOLUME_MODIFIED)),
            created: AmigaDate::read(buf, tail_offset(bs, OFF_ROOT_CREATED)),
            disk_name: read_bstr(buf, tail_offset(bs, OFF_NAME), MAX_NAME_LEN),
            extension: block.tail_u32(OFF_EXTENSION),
            checksum_valid: block.checksum_valid(),
        })
    }

    /// Check if the bitmap is flagged valid.
    #[inline]
    pub const fn bitmap_valid(&self) -> bool {
        self.bm_flag == BM_VALID
    }
}

/// Parsed directory, file or link header.
///
/// For directories `table` is the hash table; for files it is the
/// reverse-ordered data block pointer array.
#[derive(Debug, Clone)]
pub struct HeaderRecord {
    /// Block address within the partition.
    pub address: u32,
    /// Entry classification.
    pub kind: BlockKind,
    /// Self pointer as stored.
    pub header_key: u32,
    /// Number of data block pointers used in this header (files).
    pub high_seq: i32,
    /// First data block (OFS files).
    pub first_data: u32,
    /// Hash table or data block pointers.
    pub table: Vec<u32>,
    /// Protection bits.
    pub access: u32,
    /// File size in bytes (files only).
    pub byte_size: u32,
    /// Comment.
    pub comment: Vec<u8>,
    /// Last modification date.
    pub date: AmigaDate,
    /// Entry name.
    pub name: Vec<u8>,
    /// Target header (hard links).
    pub real_entry: u32,
    /// Next link in the hard link chain.
    pub next_link: u32,
    /// Next entry in the same hash bucket.
    pub hash_chain: u32,
    /// Parent directory.
    pub parent: u32,
    /// First extension block (files) or directory cache block.
    pub extension: u32,
    /// Advisory checksum result.
    pub checksum_valid: bool,
}

impl HeaderRecord {
    /// Decode a non-root header block.
    pub fn decode(block: &RawBlock) -> Result<Self> {
        let kind = expect_kind(block, BlockKind::is_entry)?;
        let buf = block.data();
        let bs = block.len();

        Ok(Self {
            address: block.address(),
            kind,
            header_key: block.u32_at(OFF_HEADER_KEY),
            high_seq: block.i32_at(OFF_HIGH_SEQ),
            first_data: block.u32_at(OFF_FIRST_DATA),
            table: read_table(block),
            access: block.tail_u32(OFF_ACCESS),
            byte_size: block.tail_u32(OFF_BYTE_SIZE),
            comment: read_bstr(buf, tail_offset(bs, OFF_COMMENT), MAX_COMMENT_LEN),
            date: AmigaDate::read(buf, tail_offset(bs, OFF_DATE)),
            name: read_bstr(buf, tail_offset(bs, OFF_NAME), MAX_NAME_LEN),
            real_entry: block.tail_u32(OFF_REAL_ENTRY),
            next_link: block.tail_u32(OFF_NEXT_LINK),
            hash_chain: block.tail_u32(OFF_HASH_CHAIN),
            parent: block.tail_u32(OFF_PARENT),
            extension: block.tail_u32(OFF_EXTENSION),
            checksum_valid: block.checksum_valid(),
        })
    }
}

/// File header view used by the reconstruction engine.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Header block address.
    pub address: u32,
    /// Declared byte size.
    pub byte_size: u32,
    /// Used pointer count as stored.
    pub high_seq: i32,
    /// Data block pointers, reverse-ordered as stored.
    pub data_blocks: Vec<u32>,
    /// First OFS data block.
    pub first_data: u32,
    /// First extension block (0 = none).
    pub extension: u32,
    /// Advisory checksum result.
    pub checksum_valid: bool,
}

impl FileRecord {
    /// Decode a file header block.
    pub fn decode(block: &RawBlock) -> Result<Self> {
        expect_kind(block, |k| k == BlockKind::File)?;
        Ok(Self::from(HeaderRecord::decode(block)?))
    }

    /// Data block pointers in file order.
    pub fn ordered_blocks(&self) -> Vec<u32> {
        ordered_pointers(&self.data_blocks, self.high_seq)
    }
}

impl From<HeaderRecord> for FileRecord {
    fn from(h: HeaderRecord) -> Self {
        Self {
            address: h.address,
            byte_size: h.byte_size,
            high_seq: h.high_seq,
            data_blocks: h.table,
            first_data: h.first_data,
            extension: h.extension,
            checksum_valid: h.checksum_valid,
        }
    }
}

/// Parsed file extension block.
#[derive(Debug, Clone)]
pub struct FileExtRecord {
    /// Block address within the partition.
    pub address: u32,
    /// Self pointer as stored.
    pub header_key: u32,
    /// Used pointer count as stored.
    pub high_seq: i32,
    /// Data block pointers, reverse-ordered as stored.
    pub data_blocks: Vec<u32>,
    /// Owning file header.
    pub parent: u32,
    /// Next extension block (0 = none).
    pub extension: u32,
    /// Advisory checksum result.
    pub checksum_valid: bool,
}

impl FileExtRecord {
    /// Decode a file extension block.
    pub fn decode(block: &RawBlock) -> Result<Self> {
        expect_kind(block, |k| k == BlockKind::FileExt)?;
        Ok(Self {
            address: block.address(),
            header_key: block.u32_at(OFF_HEADER_KEY),
            high_seq: block.i32_at(OFF_HIGH_SEQ),
            data_blocks: read_table(block),
            parent: block.tail_u32(OFF_PARENT),
            extension: block.tail_u32(OFF_EXTENSION),
            checksum_valid: block.checksum_valid(),
        })
    }

    /// Data block pointers in file order.
    pub fn ordered_blocks(&self) -> Vec<u32> {
        ordered_pointers(&self.data_blocks, self.high_seq)
    }
}

/// Parsed OFS data block.
#[derive(Debug, Clone)]
pub struct DataBlockRecord {
    /// Block address within the partition.
    pub address: u32,
    /// File header this block belongs to.
    pub header_key: u32,
    /// Sequence number (1-based).
    pub seq_num: u32,
    /// Declared payload size, as stored.
    pub data_size: u32,
    /// Next data block (0 = end of chain).
    pub next_data: u32,
    /// Payload area (`B - 24` bytes, independent of `data_size`).
    pub payload: Vec<u8>,
    /// Advisory checksum result.
    pub checksum_valid: bool,
}

impl DataBlockRecord {
    /// Decode an OFS data block.
    pub fn decode(block: &RawBlock) -> Result<Self> {
        expect_kind(block, |k| k == BlockKind::Data)?;
        Ok(Self {
            address: block.address(),
            header_key: block.u32_at(OFF_HEADER_KEY),
            seq_num: block.u32_at(OFF_SEQ_NUM),
            data_size: block.u32_at(OFF_DATA_SIZE),
            next_data: block.u32_at(OFF_NEXT_DATA),
            payload: block.data().get(OFS_HEADER_SIZE..).unwrap_or_default().to_vec(),
            checksum_valid: block.checksum_valid(),
        })
    }

    /// Payload bytes, bounded by both the declared size and the block.
    #[inline]
    pub fn data(&self) -> &[u8] {
        let len = (self.data_size as usize).min(self.payload.len());
        &self.payload[..len]
    }
}

/// Reverse a stored pointer array into file order.
///
/// Slot `len - 1` holds the first block. The used count comes from
/// `high_seq` when it is plausible; otherwise the non-zero run at the end of
/// the array is taken.
pub(crate) fn ordered_pointers(table: &[u32], high_seq: i32) -> Vec<u32> {
    let count = match usize::try_from(high_seq) {
        Ok(n) if n > 0 && n <= table.len() => n,
        _ => table.iter().rev().take_while(|&&p| p != 0).count(),
    };
    table.iter().rev().take(count).copied().collect()
}

/// Compute the hash bucket for a name.
///
/// This implements the AmigaDOS filename hash: seeded with the name length,
/// `hash = (hash * 13 + upper(c)) & 0x7FF` per character, then reduced
/// modulo the table size. Only the first 30 bytes are used.
#[inline]
pub fn hash_name(name: &[u8], intl: bool, table_size: usize) -> usize {
    let name = &name[..name.len().min(MAX_NAME_LEN)];
    let mut hash = name.len() as u32;

    for &c in name {
        let upper = if intl {
            intl_to_upper(c)
        } else {
            c.to_ascii_uppercase()
        };
        hash = (hash.wrapping_mul(13).wrapping_add(upper as u32)) & 0x7FF;
    }
    (hash as usize) % table_size.max(1)
}

/// Convert character to uppercase with international support.
///
/// Handles Latin-1 characters (224-254) excluding the division sign (247).
#[inline]
pub const fn intl_to_upper(c: u8) -> u8 {
    const ASCII_CASE_DIFF: u8 = 32;
    const LATIN1_LOWER_START: u8 = 224;
    const LATIN1_LOWER_END: u8 = 254;
    const DIVISION_SIGN: u8 = 247;

    if c.is_ascii_lowercase()
        || (c >= LATIN1_LOWER_START && c <= LATIN1_LOWER_END && c != DIVISION_SIGN)
    {
        c.wrapping_sub(ASCII_CASE_DIFF)
    } else {
        c
    }
}

/// Compare two names for equality (case-insensitive).
#[inline]
pub fn names_equal(a: &[u8], b: &[u8], intl: bool) -> bool {
    if a.len() != b.len() {
        return false;
    }

    if intl {
        a.iter()
            .zip(b)
            .all(|(&ca, &cb)| intl_to_upper(ca) == intl_to_upper(cb))
    } else {
        a.eq_ignore_ascii_case(b)
    }
}
