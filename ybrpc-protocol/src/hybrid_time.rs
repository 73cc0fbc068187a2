//! Hybrid logical clock timestamps.
//!
//! A hybrid time packs the physical clock in microseconds since the Unix epoch
//! into the upper 52 bits and a logical counter into the lower 12 bits.

use chrono::{DateTime, Utc};
use std::fmt;

const LOGICAL_BITS: u32 = 12;
const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HybridTime(u64);

impl HybridTime {
    /// Value servers use for "no timestamp".
    pub const INVALID: HybridTime = HybridTime(u64::MAX);
    pub const MIN: HybridTime = HybridTime(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Builds a hybrid time from its parts. Logical values wider than 12 bits
    /// are masked.
    pub const fn from_parts(physical_micros: u64, logical: u64) -> Self {
        Self((physical_micros << LOGICAL_BITS) | (logical & LOGICAL_MASK))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn physical_micros(self) -> u64 {
        self.0 >> LOGICAL_BITS
    }

    pub const fn logical(self) -> u64 {
        self.0 & LOGICAL_MASK
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Wall clock time of the physical component, if representable.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if !self.is_valid() {
            return None;
        }
        let micros = i64::try_from(self.physical_micros()).ok()?;
        DateTime::from_timestamp_micros(micros)
    }
}

impl From<u64> for HybridTime {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for HybridTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "<invalid>");
        }
        write!(
            f,
            "{{ physical: {} logical: {} }}",
            self.physical_micros(),
            self.logical()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parts() {
        let ht = HybridTime::from_parts(1_700_000_000_123_456, 42);
        assert_eq!(ht.physical_micros(), 1_700_000_000_123_456);
        assert_eq!(ht.logical(), 42);
        assert_eq!(ht.raw(), (1_700_000_000_123_456 << 12) | 42);
    }

    #[test]
    fn test_logical_is_masked() {
        let ht = HybridTime::from_parts(1, 4096 + 3);
        assert_eq!(ht.physical_micros(), 1);
        assert_eq!(ht.logical(), 3);
    }

    #[test]
    fn test_to_datetime() {
        let ht = HybridTime::from_parts(1_000_000, 0);
        let expected = Utc.timestamp_opt(1, 0).unwrap();
        assert_eq!(ht.to_datetime(), Some(expected));
        assert_eq!(HybridTime::INVALID.to_datetime(), None);
    }

    #[test]
    fn test_display() {
        let ht = HybridTime::from_parts(1_500_000, 7);
        assert_eq!(ht.to_string(), "{ physical: 1500000 logical: 7 }");
        assert_eq!(HybridTime::INVALID.to_string(), "<invalid>");
    }

    #[test]
    fn test_ordering_follows_raw() {
        let a = HybridTime::from_parts(10, 4095);
        let b = HybridTime::from_parts(11, 0);
        assert!(a < b);
        assert!(HybridTime::MIN < a);
    }
}
