//! On-disk constants for AFFS volumes and Amiga rigid disk blocks.

/// Default logical block (and sector) size in bytes.
pub const BLOCK_SIZE: usize = 512;

/// Size of the header preamble (type, key, seq, size, first, checksum).
pub const HEADER_PREAMBLE: usize = 24;

/// Longwords of a block not used by the hash table / pointer array.
pub const NON_TABLE_LONGS: usize = 56;

/// Offset, in a 512-byte block, where the fixed tail fields begin.
///
/// Everything at or past this offset moves with the block end when the
/// block size grows.
pub const TAIL_START: usize = 312;

/// Maximum filename length.
pub const MAX_NAME_LEN: usize = 30;

/// Maximum comment length.
pub const MAX_COMMENT_LEN: usize = 79;

/// Bitmap page pointers in the root block.
pub const BM_PAGES_ROOT_SIZE: usize = 25;

/// Reserved blocks at the start of a bare volume image.
pub const DEFAULT_RESERVED: u32 = 2;

/// Sectors per track (DD).
pub const SECTORS_PER_TRACK_DD: u32 = 11;

/// Sectors per track (HD).
pub const SECTORS_PER_TRACK_HD: u32 = 22;

/// Number of heads on a floppy.
pub const HEADS: u32 = 2;

// Filesystem type flags (in dosType[3])
/// Fast File System.
pub const DOSFS_FFS: u8 = 1;
/// International mode (case-insensitive for international characters).
pub const DOSFS_INTL: u8 = 2;
/// Directory cache mode.
pub const DOSFS_DIRCACHE: u8 = 4;
/// Highest flags value a `DOS` boot block may carry.
pub const DOSFS_MAX_FLAGS: u8 = 7;

// Block types
/// Header block type.
pub const T_HEADER: i32 = 2;
/// Data block type (OFS only).
pub const T_DATA: i32 = 8;
/// List/extension block type.
pub const T_LIST: i32 = 16;

// Secondary types
/// Root block secondary type.
pub const ST_ROOT: i32 = 1;
/// Directory secondary type.
pub const ST_DIR: i32 = 2;
/// Soft link secondary type.
pub const ST_LSOFT: i32 = 3;
/// Hard link to directory secondary type.
pub const ST_LDIR: i32 = 4;
/// File secondary type.
pub const ST_FILE: i32 = -3;
/// Hard link to file secondary type.
pub const ST_LFILE: i32 = -4;

/// Valid bitmap flag value.
pub const BM_VALID: i32 = -1;

/// OFS data block header size.
pub const OFS_HEADER_SIZE: usize = 24;

// Rigid disk block
/// Rigid disk block identifier.
pub const RDB_MAGIC: &[u8; 4] = b"RDSK";
/// Partition block identifier.
pub const PART_MAGIC: &[u8; 4] = b"PART";
/// End-of-list marker in RDB block pointers.
pub const RDB_END: u32 = 0xFFFF_FFFF;
/// Sectors searched for the rigid disk block.
pub const RDB_LOCATION_LIMIT: u32 = 16;
/// Default bound on the partition chain walk.
pub const MAX_PARTITIONS: usize = 128;

// Rigid disk block field offsets
pub(crate) const RDB_SUMMED_LONGS: usize = 4;
pub(crate) const RDB_BLOCK_BYTES: usize = 16;
pub(crate) const RDB_FLAGS: usize = 20;
pub(crate) const RDB_PARTITION_LIST: usize = 28;

// Partition block field offsets
pub(crate) const PART_NEXT: usize = 16;
pub(crate) const PART_FLAGS: usize = 20;
pub(crate) const PART_DRIVE_NAME: usize = 36;
pub(crate) const PART_DRIVE_NAME_MAX: usize = 31;
pub(crate) const PART_SIZE_BLOCK: usize = 132;
pub(crate) const PART_HEADS: usize = 140;
pub(crate) const PART_SECTORS_PER_BLOCK: usize = 144;
pub(crate) const PART_BLOCKS_PER_TRACK: usize = 148;
pub(crate) const PART_RESERVED: usize = 152;
pub(crate) const PART_LOW_CYL: usize = 164;
pub(crate) const PART_HIGH_CYL: usize = 168;
pub(crate) const PART_BOOT_PRI: usize = 188;
pub(crate) const PART_DOS_TYPE: usize = 192;

// Header block field offsets (512-byte layout)
pub(crate) const OFF_TYPE: usize = 0;
pub(crate) const OFF_HEADER_KEY: usize = 4;
pub(crate) const OFF_HIGH_SEQ: usize = 8;
pub(crate) const OFF_HT_SIZE: usize = 12;
pub(crate) const OFF_FIRST_DATA: usize = 16;
pub(crate) const OFF_CHECKSUM: usize = 20;
pub(crate) const OFF_TABLE: usize = 24;
pub(crate) const OFF_BM_FLAG: usize = 0x138;
pub(crate) const OFF_BM_PAGES: usize = 0x13C;
pub(crate) const OFF_BM_EXT: usize = 0x1A0;
pub(crate) const OFF_ACCESS: usize = 0x140;
pub(crate) const OFF_BYTE_SIZE: usize = 0x144;
pub(crate) const OFF_COMMENT: usize = 0x148;
pub(crate) const OFF_DATE: usize = 0x1A4;
pub(crate) const OFF_NAME: usize = 0x1B0;
pub(crate) const OFF_REAL_ENTRY: usize = 0x1D4;
pub(crate) const OFF_NEXT_LINK: usize = 0x1D8;
pub(crate) const OFF_VOLUME_MODIFIED: usize = 0x1D8;
pub(crate) const OFF_ROOT_CREATED: usize = 0x1E4;
pub(crate) const OFF_HASH_CHAIN: usize = 0x1F0;
pub(crate) const OFF_PARENT: usize = 0x1F4;
pub(crate) const OFF_EXTENSION: usize = 0x1F8;
pub(crate) const OFF_SEC_TYPE: usize = 0x1FC;

// OFS data block field offsets
pub(crate) const OFF_SEQ_NUM: usize = 8;
pub(crate) const OFF_DATA_SIZE: usize = 12;
pub(crate) const OFF_NEXT_DATA: usize = 16;

/// Hash table (and block pointer array) length for a block size.
#[inline]
pub const fn hash_table_size(block_size: usize) -> usize {
    (block_size / 4).saturating_sub(NON_TABLE_LONGS)
}

/// Position of a tail field for a block of `block_size` bytes.
///
/// `offset` is the field's position in the 512-byte layout.
#[inline]
pub const fn tail_offset(block_size: usize, offset: usize) -> usize {
    if offset < TAIL_START {
        offset
    } else {
        (block_size + offset).saturating_sub(BLOCK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_table_size() {
        assert_eq!(hash_table_size(512), 72);
        assert_eq!(hash_table_size(1024), 200);
        assert_eq!(hash_table_size(4096), 968);
    }

    #[test]
    fn test_tail_offset_moves_with_block_end() {
        assert_eq!(tail_offset(512, OFF_SEC_TYPE), 0x1FC);
        assert_eq!(tail_offset(1024, OFF_SEC_TYPE), 1020);
        assert_eq!(tail_offset(1024, OFF_CHECKSUM), OFF_CHECKSUM);
    }
}
