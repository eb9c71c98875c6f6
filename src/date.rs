//! Amiga timestamps.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::checksum::read_i32_be;

/// Amiga date stamp as stored on disk.
///
/// Days since January 1, 1978, minutes since midnight and ticks
/// (1/50 second). Values are kept as stored; corrupted stamps are not
/// normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct AmigaDate {
    /// Days since January 1, 1978.
    pub days: i32,
    /// Minutes since midnight.
    pub mins: i32,
    /// Ticks (1/50 second).
    pub ticks: i32,
}

/// Seconds between the Unix epoch and 1978-01-01 (2922 days).
const EPOCH_OFFSET: i64 = 2922 * 86_400;

impl AmigaDate {
    /// Create a date from raw values.
    #[inline]
    pub const fn new(days: i32, mins: i32, ticks: i32) -> Self {
        Self { days, mins, ticks }
    }

    /// Decode the three consecutive longwords at `offset`.
    pub(crate) fn read(buf: &[u8], offset: usize) -> Self {
        Self::new(
            read_i32_be(buf, offset),
            read_i32_be(buf, offset + 4),
            read_i32_be(buf, offset + 8),
        )
    }

    /// Seconds since 1970-01-01 00:00:00 UTC.
    #[inline]
    pub const fn to_unix_timestamp(self) -> i64 {
        (self.days as i64) * 86_400 + (self.mins as i64) * 60 + (self.ticks as i64) / 50
            + EPOCH_OFFSET
    }

    /// Convert to [`SystemTime`], or `None` for a stamp before 1970.
    pub fn to_system_time(self) -> Option<SystemTime> {
        let secs = u64::try_from(self.to_unix_timestamp()).ok()?;
        let subsec_ms = (self.ticks.rem_euclid(50) as u64) * 20;
        UNIX_EPOCH.checked_add(Duration::from_secs(secs) + Duration::from_millis(subsec_ms))
    }

    /// Whether the stamp lies inside the ranges AmigaDOS writes.
    pub const fn is_plausible(self) -> bool {
        self.days >= 0
            && self.mins >= 0
            && self.mins < 24 * 60
            && self.ticks >= 0
            && self.ticks < 60 * 50
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch() {
        assert_eq!(AmigaDate::new(0, 0, 0).to_unix_timestamp(), 252_460_800);
    }

    #[test]
    fn test_known_date() {
        // 1997-02-18 12:34:03 UTC
        let date = AmigaDate::new(6988, 754, 150);
        assert_eq!(date.to_unix_timestamp(), 856_269_243);
        assert!(date.to_system_time().is_some());
    }

    #[test]
    fn test_read_from_buffer() {
        let mut buf = [0u8; 16];
        buf[4..8].copy_from_slice(&5i32.to_be_bytes());
        buf[8..12].copy_from_slice(&61i32.to_be_bytes());
        buf[12..16].copy_from_slice(&100i32.to_be_bytes());
        assert_eq!(AmigaDate::read(&buf, 4), AmigaDate::new(5, 61, 100));
    }

    #[test]
    fn test_plausibility() {
        assert!(AmigaDate::new(100, 600, 20).is_plausible());
        assert!(!AmigaDate::new(-1, 0, 0).is_plausible());
        assert!(!AmigaDate::new(0, 1440, 0).is_plausible());
    }
}
