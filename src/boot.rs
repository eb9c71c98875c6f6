//! Boot block and partition discovery.
//!
//! An image is either a bare AmigaDOS volume (block 0 starts with `DOS`
//! and a flags byte in `0..=7`), or a hard disk image carrying a rigid disk
//! block (`RDSK`) in one of its first sectors. The rigid disk block heads a
//! linked list of partition blocks (`PART`), each describing a cylinder
//! range holding one volume.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::block::read_bstr;
use crate::checksum::{boot_sum, read_i32_be, read_u32_be, verify_summed_longs};
use crate::config::{DiskConfig, is_valid_block_size};
use crate::constants::*;
use crate::error::{AffsError, Result};
use crate::source::{BlockSource, read_bytes};
use crate::utf8::decode_name;

/// Filesystem variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsType {
    /// Original File System: self-describing data blocks.
    Ofs,
    /// Fast File System: raw payload data blocks.
    Ffs,
}

/// Four-byte DOS type (`DOS\0` .. `DOS\7`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosType(pub [u8; 4]);

impl DosType {
    /// Whether the first three bytes read `DOS`.
    #[inline]
    pub fn is_dos(self) -> bool {
        &self.0[..3] == b"DOS"
    }

    /// Flags byte.
    #[inline]
    pub const fn flags(self) -> u8 {
        self.0[3]
    }

    /// Filesystem variant selected by the FFS bit.
    #[inline]
    pub const fn fs_type(self) -> FsType {
        if self.flags() & DOSFS_FFS != 0 {
            FsType::Ffs
        } else {
            FsType::Ofs
        }
    }

    /// International case folding.
    #[inline]
    pub const fn is_intl(self) -> bool {
        self.flags() & DOSFS_INTL != 0
    }

    /// Directory cache mode (implies international folding).
    #[inline]
    pub const fn is_dircache(self) -> bool {
        self.flags() & DOSFS_DIRCACHE != 0
    }
}

/// How the image was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootKind {
    /// Bare volume (floppy or partition dump).
    Volume,
    /// Hard disk image with a rigid disk block.
    RigidDisk,
}

/// Parsed boot information.
#[derive(Debug, Clone)]
pub struct BootInfo {
    /// How the image was recognized.
    pub kind: BootKind,
    /// Magic bytes (`DOS?` or `RDSK`).
    pub magic: [u8; 4],
    /// Flags (DOS flags byte, or RDB flags longword).
    pub flags: u32,
    /// First partition block, in sectors (rigid disks only).
    pub partition_list: Option<u32>,
    /// Byte offset of the boot area within the image.
    pub offset: u64,
    /// Sector size used for RDB addressing.
    pub sector_size: usize,
    /// Advisory checksum result.
    pub checksum_valid: bool,
}

/// One partition with its geometry and derived extent.
#[derive(Debug, Clone)]
pub struct PartitionEntry {
    /// Drive name (e.g. `DH0`); empty for bare volumes.
    pub name: Vec<u8>,
    /// Sector address of the partition block (rigid disks only).
    pub address: Option<u32>,
    /// Partition flags.
    pub flags: u32,
    /// Sector size in bytes.
    pub sector_size: usize,
    /// Surfaces.
    pub heads: u32,
    /// Sectors per filesystem block.
    pub sectors_per_block: u32,
    /// Sectors per track.
    pub blocks_per_track: u32,
    /// Reserved blocks at the partition start.
    pub reserved: u32,
    /// First cylinder.
    pub start_cyl: u32,
    /// Last cylinder (inclusive).
    pub end_cyl: u32,
    /// Boot priority.
    pub boot_priority: i32,
    /// DOS type of the volume.
    pub dos_type: DosType,
    /// Next partition block (`0xFFFFFFFF` = none).
    pub next: u32,
    /// First sector of the partition.
    pub start: u64,
    /// Last sector of the partition (inclusive).
    pub end: u64,
    /// Extent in bytes.
    pub size_in_bytes: u64,
    /// Advisory checksum result of the partition block.
    pub checksum_valid: bool,
}

impl PartitionEntry {
    /// Compute the sector extent from the geometry.
    fn with_extent(mut self) -> Self {
        let track = u64::from(self.heads) * u64::from(self.blocks_per_track);
        self.start = u64::from(self.start_cyl) * track;
        self.end = (u64::from(self.end_cyl) + 1) * track;
        self.end = self.end.saturating_sub(1);
        self.size_in_bytes = (self.end + 1).saturating_sub(self.start) * self.sector_size as u64;
        self
    }

    fn geometry_valid(&self) -> bool {
        self.heads > 0 && self.blocks_per_track > 0 && self.end_cyl >= self.start_cyl
    }

    /// Drive name as text.
    pub fn name_str(&self) -> String {
        decode_name(&self.name).into_owned()
    }

    /// Filesystem block size in bytes.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.sector_size * self.sectors_per_block.max(1) as usize
    }

    /// Byte offset of the partition within the image.
    #[inline]
    pub fn byte_offset(&self) -> u64 {
        self.start * self.sector_size as u64
    }

    /// Number of filesystem blocks in the partition.
    #[inline]
    pub fn block_count(&self) -> u32 {
        u32::try_from(self.size_in_bytes / self.block_size() as u64).unwrap_or(u32::MAX)
    }

    /// Root block address, relative to the partition start.
    #[inline]
    pub fn root_block(&self) -> u32 {
        let sum = u64::from(self.block_count()).saturating_sub(1) + u64::from(self.reserved);
        (sum / 2) as u32
    }
}

/// Locate the boot area and enumerate partitions.
///
/// Fails only when neither a `DOS` boot block nor a rigid disk block is
/// present. Problems with individual partition blocks are logged and end or
/// skip that entry.
pub(crate) fn discover<S: BlockSource + ?Sized>(
    source: &S,
    image_len: u64,
    config: &DiskConfig,
) -> Result<(BootInfo, Vec<PartitionEntry>)> {
    let bs = config.effective_block_size();

    let block0 = read_bytes(source, image_len, 0, bs, 0)
        .map_err(|_| AffsError::Format("image too small for a boot block".into()))?;
    let dos = DosType([block0[0], block0[1], block0[2], block0[3]]);
    if dos.is_dos() && dos.flags() <= DOSFS_MAX_FLAGS {
        return Ok(volume_layout(source, image_len, bs, dos));
    }

    for sector in 0..config.rdb_scan_limit {
        let offset = u64::from(sector) * bs as u64;
        let Ok(buf) = read_bytes(source, image_len, offset, bs, u64::from(sector)) else {
            break;
        };
        if &buf[..4] != RDB_MAGIC {
            continue;
        }

        let stated = read_u32_be(&buf, RDB_BLOCK_BYTES) as usize;
        let sector_size = if is_valid_block_size(stated) { stated } else { bs };
        let checksum_valid = verify_summed_longs(&buf, read_u32_be(&buf, RDB_SUMMED_LONGS));
        if !checksum_valid {
            warn!(target: "affs::boot", event = "rdb_checksum_mismatch", sector);
        }

        let boot = BootInfo {
            kind: BootKind::RigidDisk,
            magic: *RDB_MAGIC,
            flags: read_u32_be(&buf, RDB_FLAGS),
            partition_list: Some(read_u32_be(&buf, RDB_PARTITION_LIST)),
            offset,
            sector_size,
            checksum_valid,
        };
        debug!(
            target: "affs::boot",
            event = "rdb_found",
            sector,
            sector_size,
            partition_list = ?boot.partition_list
        );
        let partitions = walk_partitions(source, image_len, &boot, config);
        return Ok((boot, partitions));
    }

    Err(AffsError::Format("no DOS boot block or rigid disk block found".into()))
}

/// Single synthetic partition spanning a bare volume image.
fn volume_layout<S: BlockSource + ?Sized>(
    source: &S,
    image_len: u64,
    bs: usize,
    dos: DosType,
) -> (BootInfo, Vec<PartitionEntry>) {
    let checksum_valid = read_bytes(source, image_len, 0, 1024, 0)
        .ok()
        .and_then(|buf| boot_sum(&buf).map(|sum| sum == read_u32_be(&buf, 4)))
        .unwrap_or(false);

    let boot = BootInfo {
        kind: BootKind::Volume,
        magic: dos.0,
        flags: u32::from(dos.flags()),
        partition_list: None,
        offset: 0,
        sector_size: bs,
        checksum_valid,
    };

    let blocks = u32::try_from(image_len / bs as u64).unwrap_or(u32::MAX);
    let (heads, blocks_per_track) = if blocks == HEADS * SECTORS_PER_TRACK_HD * 80 {
        (HEADS, SECTORS_PER_TRACK_HD)
    } else if blocks > 0 && blocks % (HEADS * SECTORS_PER_TRACK_DD) == 0 {
        (HEADS, SECTORS_PER_TRACK_DD)
    } else {
        (1, blocks.max(1))
    };
    let cylinders = (blocks / (heads * blocks_per_track)).max(1);

    let entry = PartitionEntry {
        name: Vec::new(),
        address: None,
        flags: 0,
        sector_size: bs,
        heads,
        sectors_per_block: 1,
        blocks_per_track,
        reserved: DEFAULT_RESERVED,
        start_cyl: 0,
        end_cyl: cylinders - 1,
        boot_priority: 0,
        dos_type: dos,
        next: RDB_END,
        start: 0,
        end: 0,
        size_in_bytes: 0,
        checksum_valid,
    }
    .with_extent();

    (boot, vec![entry])
}

/// Follow the partition chain from the rigid disk block.
fn walk_partitions<S: BlockSource + ?Sized>(
    source: &S,
    image_len: u64,
    boot: &BootInfo,
    config: &DiskConfig,
) -> Vec<PartitionEntry> {
    let sector_size = boot.sector_size;
    let mut partitions = Vec::new();
    let mut visited = HashSet::new();
    let mut address = boot.partition_list.unwrap_or(RDB_END);

    while address != RDB_END && visited.len() < config.max_partitions {
        if !visited.insert(address) {
            warn!(target: "affs::boot", event = "partition_cycle", address);
            break;
        }

        let offset = u64::from(address) * sector_size as u64;
        let buf = match read_bytes(source, image_len, offset, sector_size, u64::from(address)) {
            Ok(buf) => buf,
            Err(err) => {
                warn!(target: "affs::boot", event = "partition_unreadable", address, error = %err);
                break;
            }
        };
        if &buf[..4] != PART_MAGIC {
            let next = read_u32_be(&buf, PART_NEXT);
            warn!(target: "affs::boot", event = "partition_bad_magic", address, next);
            address = next;
            continue;
        }

        let entry = parse_partition(source, image_len, &buf, address, sector_size);
        if !entry.checksum_valid {
            warn!(target: "affs::boot", event = "partition_checksum_mismatch", address);
        }
        address = entry.next;

        if entry.geometry_valid() {
            debug!(
                target: "affs::boot",
                event = "partition_found",
                name = %entry.name_str(),
                start = entry.start,
                end = entry.end
            );
            partitions.push(entry);
        } else {
            warn!(target: "affs::boot", event = "partition_bad_geometry", address = ?entry.address);
        }
    }

    partitions
}

fn parse_partition<S: BlockSource + ?Sized>(
    source: &S,
    image_len: u64,
    buf: &[u8],
    address: u32,
    rdb_sector_size: usize,
) -> PartitionEntry {
    let longs = read_u32_be(buf, PART_SIZE_BLOCK) as usize;
    let sector_size = if is_valid_block_size(longs * 4) {
        longs * 4
    } else {
        rdb_sector_size
    };

    let mut sectors_per_block = read_u32_be(buf, PART_SECTORS_PER_BLOCK).max(1);
    if !is_valid_block_size(sector_size * sectors_per_block as usize) {
        warn!(target: "affs::boot", event = "partition_bad_block_size", address, sectors_per_block);
        sectors_per_block = 1;
    }

    let raw = read_u32_be(buf, PART_DOS_TYPE).to_be_bytes();
    let mut entry = PartitionEntry {
        name: read_bstr(buf, PART_DRIVE_NAME, PART_DRIVE_NAME_MAX),
        address: Some(address),
        flags: read_u32_be(buf, PART_FLAGS),
        sector_size,
        heads: read_u32_be(buf, PART_HEADS),
        sectors_per_block,
        blocks_per_track: read_u32_be(buf, PART_BLOCKS_PER_TRACK),
        reserved: read_u32_be(buf, PART_RESERVED),
        start_cyl: read_u32_be(buf, PART_LOW_CYL),
        end_cyl: read_u32_be(buf, PART_HIGH_CYL),
        boot_priority: read_i32_be(buf, PART_BOOT_PRI),
        dos_type: DosType(raw),
        next: read_u32_be(buf, PART_NEXT),
        start: 0,
        end: 0,
        size_in_bytes: 0,
        checksum_valid: verify_summed_longs(buf, read_u32_be(buf, RDB_SUMMED_LONGS)),
    }
    .with_extent();

    if !entry.dos_type.is_dos() {
        // Fall back to the volume's own boot block.
        if let Ok(first) = read_bytes(source, image_len, entry.byte_offset(), 4, u64::from(address)) {
            let own = DosType([first[0], first[1], first[2], first[3]]);
            if own.is_dos() {
                entry.dos_type = own;
            }
        }
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_formula() {
        let entry = PartitionEntry {
            name: b"DH0".to_vec(),
            address: Some(1),
            flags: 0,
            sector_size: 512,
            heads: 4,
            sectors_per_block: 1,
            blocks_per_track: 32,
            reserved: 2,
            start_cyl: 2,
            end_cyl: 9,
            boot_priority: 0,
            dos_type: DosType(*b"DOS\x01"),
            next: RDB_END,
            start: 0,
            end: 0,
            size_in_bytes: 0,
            checksum_valid: true,
        }
        .with_extent();

        assert_eq!(entry.start, 2 * 4 * 32);
        assert_eq!(entry.end, 10 * 4 * 32 - 1);
        assert_eq!(entry.size_in_bytes, 8 * 4 * 32 * 512);
        assert_eq!(entry.block_count(), 1024);
        assert_eq!(entry.root_block(), (1023 + 2) / 2);
    }

    #[test]
    fn test_dos_type_flags() {
        let dos = DosType(*b"DOS\x03");
        assert!(dos.is_dos());
        assert_eq!(dos.fs_type(), FsType::Ffs);
        assert!(dos.is_intl());
        assert!(!dos.is_dircache());
        assert_eq!(DosType(*b"DOS\x00").fs_type(), FsType::Ofs);
        assert!(!DosType(*b"PFS\x01").is_dos());
    }

    #[test]
    fn test_floppy_volume_layout() {
        let mut image = vec![0u8; 1760 * 512];
        image[..4].copy_from_slice(b"DOS\x01");
        let (boot, parts) = discover(&image, image.len() as u64, &DiskConfig::new()).unwrap();
        assert_eq!(boot.kind, BootKind::Volume);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].block_count(), 1760);
        assert_eq!(parts[0].root_block(), 880);
    }

    #[test]
    fn test_missing_magic_is_format_error() {
        let image = vec![0u8; 64 * 512];
        let err = discover(&image, image.len() as u64, &DiskConfig::new()).unwrap_err();
        assert!(matches!(err, AffsError::Format(_)));
    }

    #[test]
    fn test_out_of_range_flags_not_a_volume() {
        let mut image = vec![0u8; 64 * 512];
        image[..4].copy_from_slice(b"DOS\x09");
        assert!(discover(&image, image.len() as u64, &DiskConfig::new()).is_err());
    }
}
