//! Soft link targets.
//!
//! A soft link header stores its target path in place of the hash table:
//! NUL-terminated text from offset 24 up to the start of the 200-byte
//! header tail.

use std::borrow::Cow;

use memchr::memchr;

use crate::block::{BlockKind, classify};
use crate::constants::HEADER_PREAMBLE;
use crate::error::{AffsError, Result};
use crate::source::RawBlock;
use crate::utf8::decode_name;

/// Bytes at the end of a header block that never hold path text.
const SYMLINK_TAIL: usize = 200;

/// Capacity of the target path area for a block size.
///
/// 288 bytes for 512-byte blocks; grows with the block size.
#[inline]
pub const fn max_symlink_len(block_size: usize) -> usize {
    block_size.saturating_sub(HEADER_PREAMBLE + SYMLINK_TAIL)
}

/// Decode the target path of a soft link header.
///
/// The path is returned as stored (Amiga syntax, e.g. `Work:tools/ed`).
pub fn read_symlink_target(block: &RawBlock) -> Result<String> {
    if classify(block)? != BlockKind::SoftLink {
        return Err(AffsError::NotASymlink(format!("block {}", block.address())));
    }

    let end = HEADER_PREAMBLE + max_symlink_len(block.len());
    let area = block.data().get(HEADER_PREAMBLE..end).unwrap_or_default();
    let len = memchr(0, area).unwrap_or(area.len());
    Ok(decode_name(&area[..len]).into_owned())
}

/// Map a path relative to the volume root (`:dir/file`) onto `/dir/file`.
///
/// Paths naming a volume (`Work:dir`) are left untouched.
pub fn to_host_path(target: &str) -> Cow<'_, str> {
    match target.strip_prefix(':') {
        Some(rest) => Cow::Owned(format!("/{rest}")),
        None => Cow::Borrowed(target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn link_block(target: &[u8]) -> RawBlock {
        let mut buf = vec![0u8; BLOCK_SIZE];
        buf[0..4].copy_from_slice(&T_HEADER.to_be_bytes());
        buf[OFF_SEC_TYPE..OFF_SEC_TYPE + 4].copy_from_slice(&ST_LSOFT.to_be_bytes());
        buf[HEADER_PREAMBLE..HEADER_PREAMBLE + target.len()].copy_from_slice(target);
        RawBlock::new(42, buf)
    }

    #[test]
    fn test_max_len() {
        assert_eq!(max_symlink_len(512), 288);
        assert_eq!(max_symlink_len(1024), 800);
    }

    #[test]
    fn test_read_target() {
        let block = link_block(b"Work:tools/ed\0junk");
        assert_eq!(read_symlink_target(&block).unwrap(), "Work:tools/ed");
    }

    #[test]
    fn test_latin1_target() {
        let block = link_block(&[b'K', 0xE4, b's', b'e', 0]);
        assert_eq!(read_symlink_target(&block).unwrap(), "Käse");
    }

    #[test]
    fn test_unterminated_target_is_bounded() {
        let block = link_block(&[b'x'; 288]);
        assert_eq!(read_symlink_target(&block).unwrap().len(), 288);
    }

    #[test]
    fn test_not_a_link() {
        let mut buf = vec![0u8; BLOCK_SIZE];
        buf[0..4].copy_from_slice(&T_HEADER.to_be_bytes());
        buf[OFF_SEC_TYPE..OFF_SEC_TYPE + 4].copy_from_slice(&ST_FILE.to_be_bytes());
        assert!(matches!(
            read_symlink_target(&RawBlock::new(1, buf)),
            Err(AffsError::NotASymlink(_))
        ));
    }

    #[test]
    fn test_host_path() {
        assert_eq!(to_host_path(":boot/s"), "/boot/s");
        assert_eq!(to_host_path("path:to/file"), "path:to/file");
    }
}
