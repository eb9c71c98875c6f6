//! Options controlling how an image is opened.

use crate::constants::{BLOCK_SIZE, MAX_PARTITIONS, RDB_LOCATION_LIMIT};

/// Options for [`Disk::open_with`](crate::Disk::open_with).
///
/// # Example
///
/// ```ignore
/// let config = DiskConfig::new().with_rdb_scan_limit(4).with_intl(Some(true));
/// let disk = Disk::open_with(image, config)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskConfig {
    /// Sector size assumed when the rigid disk block does not state one,
    /// and the block size of bare volume images.
    pub block_size: usize,
    /// Number of leading sectors searched for a rigid disk block.
    pub rdb_scan_limit: u32,
    /// Upper bound on partition blocks followed.
    pub max_partitions: usize,
    /// Force international case folding on or off.
    ///
    /// `None` derives it from each partition's DOS type.
    pub intl: Option<bool>,
}

impl DiskConfig {
    /// Default options.
    pub const fn new() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            rdb_scan_limit: RDB_LOCATION_LIMIT,
            max_partitions: MAX_PARTITIONS,
            intl: None,
        }
    }

    /// Override the default block size.
    ///
    /// Values that are not a power of two in `512..=32768` are ignored when
    /// the image is opened.
    pub const fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Override the rigid disk block search window.
    pub const fn with_rdb_scan_limit(mut self, sectors: u32) -> Self {
        self.rdb_scan_limit = sectors;
        self
    }

    /// Override the partition chain bound.
    pub const fn with_max_partitions(mut self, max: usize) -> Self {
        self.max_partitions = max;
        self
    }

    /// Force or clear the international-mode override.
    pub const fn with_intl(mut self, intl: Option<bool>) -> Self {
        self.intl = intl;
        self
    }

    /// Block size actually used, falling back to 512 for unusable values.
    pub(crate) const fn effective_block_size(&self) -> usize {
        if is_valid_block_size(self.block_size) {
            self.block_size
        } else {
            BLOCK_SIZE
        }
    }
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// AFFS block sizes are powers of two from 512 to 32768 bytes.
#[inline]
pub(crate) const fn is_valid_block_size(size: usize) -> bool {
    size.is_power_of_two() && size >= BLOCK_SIZE && size <= 32768
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiskConfig::default();
        assert_eq!(config.block_size, 512);
        assert_eq!(config.rdb_scan_limit, 16);
        assert_eq!(config.intl, None);
    }

    #[test]
    fn test_bad_block_size_falls_back() {
        assert_eq!(DiskConfig::new().with_block_size(1000).effective_block_size(), 512);
        assert_eq!(DiskConfig::new().with_block_size(256).effective_block_size(), 512);
        assert_eq!(DiskConfig::new().with_block_size(2048).effective_block_size(), 2048);
    }
}
