//! Checksum calculation and big-endian field decoding.

#[cfg(feature = "simd")]
use bytemuck::try_cast_slice;
#[cfg(feature = "simd")]
use wide::u32x4;

/// Wrapping sum of every big-endian longword in `buf`.
///
/// Trailing bytes that do not form a whole longword are ignored.
#[inline]
pub fn block_sum(buf: &[u8]) -> u32 {
    let buf = &buf[..buf.len() & !3];

    #[cfg(feature = "simd")]
    {
        block_sum_simd(buf)
    }

    #[cfg(not(feature = "simd"))]
    {
        block_sum_scalar(buf)
    }
}

#[inline]
fn block_sum_scalar(buf: &[u8]) -> u32 {
    buf.chunks_exact(4)
        .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
        .fold(0u32, u32::wrapping_add)
}

/// SIMD accumulation over an aligned view of the buffer.
///
/// Uses bytemuck for safe byte slice casting when alignment permits,
/// falls back to scalar implementation otherwise.
#[cfg(feature = "simd")]
#[inline]
fn block_sum_simd(buf: &[u8]) -> u32 {
    let Ok(words) = try_cast_slice::<u8, u32>(buf) else {
        return block_sum_scalar(buf);
    };

    let mut lanes = u32x4::ZERO;
    let mut chunks = words.chunks_exact(4);
    for c in &mut chunks {
        lanes += u32x4::new([
            u32::from_be(c[0]),
            u32::from_be(c[1]),
            u32::from_be(c[2]),
            u32::from_be(c[3]),
        ]);
    }

    let lanes = lanes.to_array();
    let mut sum = lanes[0]
        .wrapping_add(lanes[1])
        .wrapping_add(lanes[2])
        .wrapping_add(lanes[3]);
    for &w in chunks.remainder() {
        sum = sum.wrapping_add(u32::from_be(w));
    }
    sum
}

/// Check a block's checksum.
///
/// A block is valid iff the wrapping sum of all its longwords, the stored
/// checksum included, is zero. The result is advisory: nothing in this
/// crate refuses to decode a block because of it.
#[inline]
pub fn verify_checksum(buf: &[u8]) -> bool {
    block_sum(buf) == 0
}

/// Check a rigid-disk-style checksum covering only the first `longs` words.
#[inline]
pub fn verify_summed_longs(buf: &[u8], longs: u32) -> bool {
    let len = (longs as usize).saturating_mul(4).min(buf.len());
    len > 0 && block_sum(&buf[..len]) == 0
}

/// Calculate the checksum value to store at `checksum_offset`.
///
/// Used for root blocks, entry blocks, extension and OFS data blocks.
#[inline]
pub fn normal_sum(buf: &[u8], checksum_offset: usize) -> u32 {
    debug_assert!(
        checksum_offset.is_multiple_of(4),
        "Checksum offset must be aligned to 4 bytes"
    );
    let stored = read_u32_be(buf, checksum_offset);
    block_sum(buf).wrapping_sub(stored).wrapping_neg()
}

/// Calculate the boot block checksum (carry-wrapping one's complement).
///
/// Covers the first 1024 bytes; returns `None` when the buffer is shorter.
pub fn boot_sum(buf: &[u8]) -> Option<u32> {
    let buf = buf.get(..1024)?;
    let mut sum: u32 = 0;
    for (i, w) in buf.chunks_exact(4).enumerate() {
        if i == 1 {
            continue;
        }
        let d = u32::from_be_bytes([w[0], w[1], w[2], w[3]]);
        let (new_sum, carry) = sum.overflowing_add(d);
        sum = new_sum.wrapping_add(carry as u32);
    }
    Some(!sum)
}

/// Read a big-endian u32. Out-of-bounds reads yield 0.
#[inline]
pub fn read_u32_be(buf: &[u8], offset: usize) -> u32 {
    match buf.get(offset..offset + 4) {
        Some(w) => u32::from_be_bytes([w[0], w[1], w[2], w[3]]),
        None => 0,
    }
}

/// Read a big-endian i32. Out-of-bounds reads yield 0.
#[inline]
pub fn read_i32_be(buf: &[u8], offset: usize) -> i32 {
    read_u32_be(buf, offset) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed_block() -> Vec<u8> {
        let mut buf: Vec<u8> = (0..512u32).map(|i| (i * 7 + 3) as u8).collect();
        let sum = normal_sum(&buf, 20);
        buf[20..24].copy_from_slice(&sum.to_be_bytes());
        buf
    }

    #[test]
    fn test_read_u32_be() {
        let mut buf = [0u8; 512];
        buf[..4].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(read_u32_be(&buf, 0), 0x12345678);
        assert_eq!(read_u32_be(&buf, 510), 0);
    }

    #[test]
    fn test_read_i32_be() {
        let mut buf = [0u8; 512];
        buf[..4].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFD]);
        assert_eq!(read_i32_be(&buf, 0), -3);
    }

    #[test]
    fn test_sealed_block_verifies() {
        let buf = sealed_block();
        assert!(verify_checksum(&buf));
    }

    #[test]
    fn test_single_bit_flip_fails() {
        let mut buf = sealed_block();
        buf[300] ^= 0x01;
        assert!(!verify_checksum(&buf));
    }

    #[test]
    fn test_zero_block_is_valid() {
        assert!(verify_checksum(&[0u8; 512]));
    }

    #[test]
    fn test_summed_longs() {
        let mut buf = [0u8; 512];
        buf[4..8].copy_from_slice(&64u32.to_be_bytes());
        buf[8..12].copy_from_slice(&64u32.wrapping_neg().to_be_bytes());
        buf[400] = 0xAA;
        assert!(verify_summed_longs(&buf, 64));
        assert!(!verify_checksum(&buf));
        assert!(!verify_summed_longs(&buf, 0));
    }

    #[test]
    fn test_boot_sum_needs_two_sectors() {
        assert_eq!(boot_sum(&[0u8; 512]), None);
        assert_eq!(boot_sum(&[0u8; 1024]), Some(0xFFFF_FFFF));
    }
}
