//! Random-access image sources and raw blocks.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use crate::checksum::{read_i32_be, read_u32_be, verify_checksum};
use crate::constants::{OFF_SEC_TYPE, OFF_TYPE, tail_offset};
use crate::error::{AffsError, Result};

/// Byte-addressable, read-only access to a disk or partition image.
///
/// Implement this trait for your storage medium (file, memory, device).
/// Implementations for in-memory buffers and [`File`] are provided.
pub trait BlockSource {
    /// Total length of the image in bytes.
    fn len(&self) -> io::Result<u64>;

    /// Fill `buf` from the image starting at byte `offset`.
    ///
    /// Must fail rather than return a partial buffer.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl BlockSource for [u8] {
    fn len(&self) -> io::Result<u64> {
        Ok(<[u8]>::len(self) as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset).map_err(|_| short_read())?;
        let src = start
            .checked_add(buf.len())
            .and_then(|end| self.get(start..end))
            .ok_or_else(short_read)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

impl BlockSource for Vec<u8> {
    fn len(&self) -> io::Result<u64> {
        Ok(self.as_slice().len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        BlockSource::read_at(self.as_slice(), offset, buf)
    }
}

impl BlockSource for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

impl<T: BlockSource + ?Sized> BlockSource for &T {
    fn len(&self) -> io::Result<u64> {
        (**self).len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_at(offset, buf)
    }
}

fn short_read() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of image")
}

/// Read `len` bytes at absolute byte `offset`, bounds-checked against
/// `image_len`.
///
/// `address` is only used to label errors.
pub(crate) fn read_bytes<S: BlockSource + ?Sized>(
    source: &S,
    image_len: u64,
    offset: u64,
    len: usize,
    address: u64,
) -> Result<Vec<u8>> {
    let end = offset.checked_add(len as u64);
    if end.is_none_or(|end| end > image_len) {
        return Err(AffsError::OutOfRange {
            address,
            limit: image_len / (len.max(1) as u64),
        });
    }
    let mut buf = vec![0u8; len];
    source
        .read_at(offset, &mut buf)
        .map_err(|source| AffsError::Io { address, source })?;
    Ok(buf)
}

/// A block read from the image, with its advisory checksum flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    address: u32,
    data: Vec<u8>,
    checksum_valid: bool,
}

impl RawBlock {
    /// Wrap bytes read at `address`; the checksum flag is computed here.
    pub fn new(address: u32, data: Vec<u8>) -> Self {
        let checksum_valid = verify_checksum(&data);
        Self {
            address,
            data,
            checksum_valid,
        }
    }

    /// Block address, relative to the owning partition.
    #[inline]
    pub const fn address(&self) -> u32 {
        self.address
    }

    /// Raw block bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Block size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length block.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the longword sum of the block is zero.
    #[inline]
    pub const fn checksum_valid(&self) -> bool {
        self.checksum_valid
    }

    /// Return the block only if its checksum holds.
    pub fn require_checksum(&self) -> Result<&Self> {
        if self.checksum_valid {
            Ok(self)
        } else {
            Err(AffsError::ChecksumMismatch {
                address: u64::from(self.address),
            })
        }
    }

    /// Big-endian u32 at a byte offset.
    #[inline]
    pub fn u32_at(&self, offset: usize) -> u32 {
        read_u32_be(&self.data, offset)
    }

    /// Big-endian i32 at a byte offset.
    #[inline]
    pub fn i32_at(&self, offset: usize) -> i32 {
        read_i32_be(&self.data, offset)
    }

    /// Big-endian u32 at a tail field given by its 512-byte layout offset.
    #[inline]
    pub fn tail_u32(&self, offset: usize) -> u32 {
        self.u32_at(tail_offset(self.len(), offset))
    }

    /// Primary type field.
    #[inline]
    pub fn block_type(&self) -> i32 {
        self.i32_at(OFF_TYPE)
    }

    /// Secondary type field (last longword of the block).
    #[inline]
    pub fn sec_type(&self) -> i32 {
        self.i32_at(tail_offset(self.len(), OFF_SEC_TYPE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source_short_read() {
        let image = vec![1u8; 1000];
        let mut buf = [0u8; 512];
        assert!(BlockSource::read_at(&image, 0, &mut buf).is_ok());
        assert!(BlockSource::read_at(&image, 600, &mut buf).is_err());
    }

    #[test]
    fn test_read_bytes_out_of_range() {
        let image = vec![0u8; 1024];
        let err = read_bytes(&image, 1024, 1024, 512, 2).unwrap_err();
        assert!(matches!(err, AffsError::OutOfRange { address: 2, limit: 2 }));
    }

    #[test]
    fn test_raw_block_flags() {
        let block = RawBlock::new(3, vec![0u8; 512]);
        assert!(block.checksum_valid());
        assert!(block.require_checksum().is_ok());

        let mut data = vec![0u8; 512];
        data[0] = 1;
        let block = RawBlock::new(3, data);
        assert!(!block.checksum_valid());
        assert!(matches!(
            block.require_checksum(),
            Err(AffsError::ChecksumMismatch { address: 3 })
        ));
    }
}
