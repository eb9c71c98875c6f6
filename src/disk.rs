//! Disk image access.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::block::{BlockKind, Record, RootRecord, classify};
use crate::boot::{BootInfo, DosType, FsType, PartitionEntry, discover};
use crate::config::DiskConfig;
use crate::constants::hash_table_size;
use crate::error::{AffsError, Result};
use crate::handle::DirectoryHandle;
use crate::source::{BlockSource, RawBlock, read_bytes};
use crate::utf8::decode_name;

/// Offset of the root block pointer inside a volume boot block.
const BOOT_ROOT_POINTER: usize = 8;

/// Blocks copied per read by [`Partition::copy_raw_to`].
const RAW_COPY_BLOCKS: u32 = 64;

/// An opened disk or volume image.
///
/// Owns the image source for its whole lifetime; dropping the `Disk`
/// releases it. All reads go through the source and nothing is cached
/// beyond the boot information and partition table.
///
/// # Example
///
/// ```ignore
/// use affs_recover::Disk;
///
/// let disk = Disk::open_path("workbench.adf")?;
/// let root = disk.partition(0)?.root()?;
/// for entry in root.list() {
///     let entry = entry?;
///     println!("{} {}", entry.name_str(), entry.size);
/// }
/// ```
pub struct Disk<S: BlockSource> {
    source: S,
    image_len: u64,
    boot: BootInfo,
    partitions: Vec<PartitionEntry>,
    config: DiskConfig,
}

impl<S: BlockSource> Disk<S> {
    /// Open an image with the default configuration.
    pub fn open(source: S) -> Result<Self> {
        Self::open_with(source, DiskConfig::default())
    }

    /// Open an image with an explicit configuration.
    ///
    /// Fails with [`AffsError::Format`] when the image carries neither a
    /// `DOS` boot block nor a rigid disk block.
    pub fn open_with(source: S, config: DiskConfig) -> Result<Self> {
        let image_len = source
            .len()
            .map_err(|source| AffsError::Io { address: 0, source })?;
        let (boot, partitions) = discover(&source, image_len, &config)?;
        debug!(
            target: "affs::boot",
            event = "disk_opened",
            image_len,
            kind = ?boot.kind,
            partitions = partitions.len()
        );

        Ok(Self {
            source,
            image_len,
            boot,
            partitions,
            config,
        })
    }

    /// Boot information.
    #[inline]
    pub const fn boot(&self) -> &BootInfo {
        &self.boot
    }

    /// All partitions found, in chain order.
    #[inline]
    pub fn partitions(&self) -> &[PartitionEntry] {
        &self.partitions
    }

    /// Image length in bytes.
    #[inline]
    pub const fn image_len(&self) -> u64 {
        self.image_len
    }

    /// Configuration the image was opened with.
    #[inline]
    pub const fn config(&self) -> &DiskConfig {
        &self.config
    }

    /// Partition by index.
    pub fn partition(&self, n: usize) -> Result<Partition<'_, S>> {
        let entry = self.partitions.get(n).ok_or(AffsError::NoSuchPartition(n))?;
        Ok(Partition {
            disk: self,
            entry,
            index: n,
        })
    }

    /// Partition by drive name (case-insensitive).
    pub fn partition_by_name(&self, name: &str) -> Result<Partition<'_, S>> {
        self.partitions
            .iter()
            .position(|p| decode_name(&p.name).eq_ignore_ascii_case(name))
            .ok_or_else(|| AffsError::NotFound(name.to_owned()))
            .and_then(|n| self.partition(n))
    }

    /// Give back the underlying source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl Disk<File> {
    /// Open an image file by path.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).map_err(|source| AffsError::Io { address: 0, source })?;
        Self::open(file)
    }
}

/// One partition of an opened disk.
///
/// A cheap borrowed view; block addresses taken and returned by its methods
/// are relative to the partition start.
pub struct Partition<'a, S: BlockSource> {
    disk: &'a Disk<S>,
    entry: &'a PartitionEntry,
    index: usize,
}

impl<S: BlockSource> Clone for Partition<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: BlockSource> Copy for Partition<'_, S> {}

impl<'a, S: BlockSource> Partition<'a, S> {
    /// Index within [`Disk::partitions`].
    #[inline]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Geometry and extent.
    #[inline]
    pub const fn entry(&self) -> &'a PartitionEntry {
        self.entry
    }

    /// DOS type of the volume.
    #[inline]
    pub const fn dos_type(&self) -> DosType {
        self.entry.dos_type
    }

    /// Filesystem variant.
    #[inline]
    pub const fn fs_type(&self) -> FsType {
        self.entry.dos_type.fs_type()
    }

    /// Whether names fold with the international (Latin-1) rules.
    ///
    /// Directory cache volumes always use international folding.
    #[inline]
    pub fn is_intl(&self) -> bool {
        self.disk.config.intl.unwrap_or_else(|| {
            let dos = self.entry.dos_type;
            dos.is_intl() || dos.is_dircache()
        })
    }

    /// Filesystem block size in bytes.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.entry.block_size()
    }

    /// Number of filesystem blocks.
    #[inline]
    pub fn block_count(&self) -> u32 {
        self.entry.block_count()
    }

    /// Directory hash table length for this block size.
    #[inline]
    pub fn hash_table_size(&self) -> usize {
        hash_table_size(self.block_size())
    }

    /// Read one filesystem block.
    ///
    /// Addresses at or past [`block_count`](Self::block_count) fail with
    /// [`AffsError::OutOfRange`]. The checksum is computed, never enforced.
    pub fn read_block(&self, address: u32) -> Result<RawBlock> {
        let limit = self.block_count();
        if address >= limit {
            return Err(AffsError::OutOfRange {
                address: u64::from(address),
                limit: u64::from(limit),
            });
        }

        let bs = self.block_size();
        let offset = self.entry.byte_offset() + u64::from(address) * bs as u64;
        let data = read_bytes(
            &self.disk.source,
            self.disk.image_len,
            offset,
            bs,
            u64::from(address),
        )?;
        Ok(RawBlock::new(address, data))
    }

    /// Classify the block at `address`.
    pub fn classify(&self, address: u32) -> Result<BlockKind> {
        classify(&self.read_block(address)?)
    }

    /// Read and fully decode the block at `address`.
    pub fn decode(&self, address: u32) -> Result<Record> {
        Record::decode(&self.read_block(address)?)
    }

    /// Locate and decode the root block.
    ///
    /// Tries the address derived from the geometry first, then the root
    /// pointer stored in the volume boot block.
    pub fn root_record(&self) -> Result<RootRecord> {
        let computed = self.entry.root_block();
        let first = self
            .read_block(computed)
            .and_then(|block| RootRecord::decode(&block));

        let err = match first {
            Ok(root) => return self.checked_root(root),
            Err(err) => err,
        };

        let stored = self
            .read_block(0)
            .map(|block| block.u32_at(BOOT_ROOT_POINTER))
            .unwrap_or(0);
        if stored != 0 && stored != computed {
            if let Ok(root) = self
                .read_block(stored)
                .and_then(|block| RootRecord::decode(&block))
            {
                debug!(target: "affs::boot", event = "root_from_boot_block", address = stored);
                return self.checked_root(root);
            }
        }

        warn!(target: "affs::boot", event = "root_missing", address = computed, error = %err);
        Err(err)
    }

    fn checked_root(&self, root: RootRecord) -> Result<RootRecord> {
        if !root.checksum_valid {
            warn!(target: "affs::boot", event = "root_checksum_mismatch", address = root.address);
        }
        Ok(root)
    }

    /// Directory handle positioned at the volume root.
    pub fn root(&self) -> Result<DirectoryHandle<'a, S>> {
        let root = self.root_record()?;
        Ok(DirectoryHandle::at_root(*self, root))
    }

    /// Stream the partition's raw bytes into `out`.
    ///
    /// Copies whole blocks in order and returns the byte count. Unreadable
    /// regions fail the copy.
    pub fn copy_raw_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        let bs = self.block_size() as u64;
        let total = u64::from(self.block_count()) * bs;
        let base = self.entry.byte_offset();
        let mut copied = 0u64;

        while copied < total {
            let len = (total - copied).min(u64::from(RAW_COPY_BLOCKS) * bs) as usize;
            let address = copied / bs;
            let buf = read_bytes(
                &self.disk.source,
                self.disk.image_len,
                base + copied,
                len,
                address,
            )?;
            out.write_all(&buf)
                .map_err(|source| AffsError::Io { address, source })?;
            copied += len as u64;
        }

        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::normal_sum;
    use crate::constants::*;

    fn floppy() -> Vec<u8> {
        let mut image = vec![0u8; 1760 * BLOCK_SIZE];
        image[..4].copy_from_slice(b"DOS\x01");

        let root = 880 * BLOCK_SIZE;
        let block = &mut image[root..root + BLOCK_SIZE];
        block[0..4].copy_from_slice(&T_HEADER.to_be_bytes());
        block[OFF_HT_SIZE..OFF_HT_SIZE + 4].copy_from_slice(&72u32.to_be_bytes());
        block[OFF_NAME] = 4;
        block[OFF_NAME + 1..OFF_NAME + 5].copy_from_slice(b"Test");
        block[OFF_SEC_TYPE..OFF_SEC_TYPE + 4].copy_from_slice(&ST_ROOT.to_be_bytes());
        let sum = normal_sum(block, OFF_CHECKSUM);
        block[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&sum.to_be_bytes());
        image
    }

    #[test]
    fn test_open_floppy() {
        let disk = Disk::open(floppy()).unwrap();
        let part = disk.partition(0).unwrap();
        assert_eq!(part.fs_type(), FsType::Ffs);
        assert_eq!(part.block_count(), 1760);
        assert_eq!(part.hash_table_size(), 72);

        let root = part.root_record().unwrap();
        assert_eq!(root.address, 880);
        assert_eq!(root.disk_name, b"Test");
        assert!(root.checksum_valid);
    }

    #[test]
    fn test_read_block_out_of_range() {
        let disk = Disk::open(floppy()).unwrap();
        let part = disk.partition(0).unwrap();
        assert!(matches!(
            part.read_block(1760),
            Err(AffsError::OutOfRange { address: 1760, limit: 1760 })
        ));
        assert_eq!(part.classify(880).unwrap(), BlockKind::Root);
    }

    #[test]
    fn test_no_such_partition() {
        let disk = Disk::open(floppy()).unwrap();
        assert!(matches!(disk.partition(1), Err(AffsError::NoSuchPartition(1))));
    }

    #[test]
    fn test_intl_override() {
        let disk = Disk::open_with(floppy(), DiskConfig::new().with_intl(Some(true))).unwrap();
        assert!(disk.partition(0).unwrap().is_intl());
        let disk = Disk::open(floppy()).unwrap();
        assert!(!disk.partition(0).unwrap().is_intl());
    }

    #[test]
    fn test_copy_raw() {
        let image = floppy();
        let disk = Disk::open(image.clone()).unwrap();
        let mut out = Vec::new();
        let n = disk.partition(0).unwrap().copy_raw_to(&mut out).unwrap();
        assert_eq!(n, image.len() as u64);
        assert_eq!(out, image);
    }
}
