//! On-device disc address codec and duration arithmetic
//!
//! A MiniDisc address is a 3-byte value packing a 14-bit cluster, a
//! 6-bit sector and a 4-bit sound group. A cluster holds 32 sectors
//! (176 sound groups, about 2.04 s of SP stereo audio). A sector holds
//! 5.5 sound groups: within a sector pair the groups are numbered
//! 0..=10, groups 0-4 are addressable only from the even sector,
//! groups 6-10 only from the odd sector, and group 5 from either.
//!
//! All arithmetic in this module goes through [`Address::position`],
//! the absolute sound-group ordinal, so carries across the half-group
//! boundary are normalized instead of truncated.

use thiserror::Error;

/// Result type for address operations
pub type Result<T> = std::result::Result<T, AddressError>;

/// Highest cluster representable in the 14-bit field
pub const MAX_CLUSTER: u16 = 0x3FFF;

/// Sectors per cluster (the 6-bit field has headroom beyond this)
pub const SECTORS_PER_CLUSTER: u8 = 32;

/// Sound groups addressable within one even/odd sector pair
pub const GROUPS_PER_SECTOR_PAIR: u32 = 11;

/// Sound groups per cluster (32 sectors = 16 pairs of 11 groups)
pub const GROUPS_PER_CLUSTER: u32 = 176;

/// Audio samples carried by one sound group (SP stereo)
const SAMPLES_PER_GROUP: u64 = 512;

/// Sample rate of the recorded audio
const SAMPLE_RATE: u64 = 44_100;

/// Errors from address validation and arithmetic
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Cluster exceeds the 14-bit field
    #[error("cluster {0:#06x} exceeds the 14-bit field")]
    ClusterOutOfRange(u16),

    /// Sector outside the 32 sectors of a cluster
    #[error("sector {0} outside 0..32")]
    SectorOutOfRange(u8),

    /// Sound group outside the 0..=10 pair-relative range
    #[error("sound group {0} outside 0..=10")]
    GroupOutOfRange(u8),

    /// Group number not reachable from the given sector half
    #[error("sound group {group} is not addressable from sector {sector}")]
    HalfGroupViolation {
        /// Sector whose parity excludes the group
        sector: u8,
        /// Offending pair-relative group number
        group: u8,
    },

    /// Advancing past the end of the addressable cluster range
    #[error("advance to sound-group position {0} exceeds the addressable range")]
    CapacityExceeded(u64),

    /// `duration_between` called with a start after the end
    #[error("address range is reversed: start position {start} > end position {end}")]
    ReversedRange {
        /// Absolute position of the start address
        start: u32,
        /// Absolute position of the end address
        end: u32,
    },
}

/// A decoded on-device disc address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Address {
    /// Cluster number, 14 bits
    pub cluster: u16,
    /// Sector within the cluster, 0..32
    pub sector: u8,
    /// Sound group within the sector pair, 0..=10
    pub group: u8,
}

impl Address {
    /// Validated constructor enforcing field ranges and the half-group
    /// addressability rule.
    pub fn new(cluster: u16, sector: u8, group: u8) -> Result<Self> {
        let addr = Self {
            cluster,
            sector,
            group,
        };
        addr.validate()?;
        Ok(addr)
    }

    /// Check field ranges and the half-group rule.
    ///
    /// [`Address::from_bytes`] is total and never fails; imported
    /// addresses are validated separately with this method so that
    /// garbage in a device TOC surfaces as a typed error.
    pub fn validate(self) -> Result<()> {
        if self.cluster > MAX_CLUSTER {
            return Err(AddressError::ClusterOutOfRange(self.cluster));
        }
        if self.sector >= SECTORS_PER_CLUSTER {
            return Err(AddressError::SectorOutOfRange(self.sector));
        }
        if self.group > 10 {
            return Err(AddressError::GroupOutOfRange(self.group));
        }
        let even = self.sector % 2 == 0;
        if (even && self.group > 5) || (!even && self.group < 5) {
            return Err(AddressError::HalfGroupViolation {
                sector: self.sector,
                group: self.group,
            });
        }
        Ok(())
    }

    /// Pack into the 3-byte on-device form: 14 bits cluster, 6 bits
    /// sector, 4 bits sound group, most significant first.
    pub fn to_bytes(self) -> [u8; 3] {
        [
            (self.cluster >> 6) as u8,
            (((self.cluster & 0x3F) << 2) as u8) | (self.sector >> 4),
            ((self.sector & 0x0F) << 4) | (self.group & 0x0F),
        ]
    }

    /// Unpack from the 3-byte on-device form. Total: every bit pattern
    /// decodes to some triple; see [`Address::validate`].
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            cluster: (u16::from(bytes[0]) << 6) | (u16::from(bytes[1]) >> 2),
            sector: ((bytes[1] & 0x03) << 4) | (bytes[2] >> 4),
            group: bytes[2] & 0x0F,
        }
    }

    /// Absolute sound-group ordinal from the start of the disc.
    pub fn position(self) -> u32 {
        u32::from(self.cluster) * GROUPS_PER_CLUSTER
            + u32::from(self.sector / 2) * GROUPS_PER_SECTOR_PAIR
            + u32::from(self.group)
    }

    /// Inverse of [`Address::position`]. The shared group 5 is
    /// canonicalized onto the even sector.
    pub fn from_position(pos: u64) -> Result<Self> {
        let cluster = pos / u64::from(GROUPS_PER_CLUSTER);
        if cluster > u64::from(MAX_CLUSTER) {
            return Err(AddressError::CapacityExceeded(pos));
        }
        let rem = (pos % u64::from(GROUPS_PER_CLUSTER)) as u32;
        let pair = rem / GROUPS_PER_SECTOR_PAIR;
        let group = (rem % GROUPS_PER_SECTOR_PAIR) as u8;
        Ok(Self {
            cluster: cluster as u16,
            sector: (pair * 2) as u8 + u8::from(group > 5),
            group,
        })
    }

    /// Advance by a whole number of sound groups, carrying
    /// group -> sector -> cluster overflow.
    pub fn advance_groups(self, groups: u32) -> Result<Self> {
        Self::from_position(u64::from(self.position()) + u64::from(groups))
    }

    /// Advance by a duration in milliseconds, rounded to the nearest
    /// whole sound group.
    pub fn add_duration(self, ms: u32) -> Result<Self> {
        self.advance_groups(ms_to_groups(ms))
    }

    /// Milliseconds spanned by the groups in `self..other` (exclusive
    /// of `other`); the inverse of [`Address::add_duration`].
    pub fn duration_between(self, other: Self) -> Result<u32> {
        let (start, end) = (self.position(), other.position());
        if start > end {
            return Err(AddressError::ReversedRange { start, end });
        }
        Ok(groups_to_ms(end - start))
    }
}

/// Convert milliseconds to whole sound groups, rounding to nearest.
///
/// A nonzero duration never rounds down to zero groups: a track of any
/// length must occupy at least one group on the disc.
pub fn ms_to_groups(ms: u32) -> u32 {
    if ms == 0 {
        return 0;
    }
    let groups = (u64::from(ms) * SAMPLE_RATE + SAMPLES_PER_GROUP * 500)
        / (SAMPLES_PER_GROUP * 1000);
    (groups as u32).max(1)
}

/// Convert whole sound groups back to milliseconds, rounding to
/// nearest.
pub fn groups_to_ms(groups: u32) -> u32 {
    ((u64::from(groups) * SAMPLES_PER_GROUP * 1000 + SAMPLE_RATE / 2) / SAMPLE_RATE) as u32
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pack_unpack_known_value() {
        let addr = Address::new(0x1234, 17, 9).expect("valid address");
        let bytes = addr.to_bytes();
        assert_eq!(Address::from_bytes(bytes), addr);
    }

    #[test]
    fn test_zero_address_round_trips() {
        let addr = Address::default();
        assert_eq!(Address::from_bytes(addr.to_bytes()), addr);
        assert_eq!(addr.position(), 0);
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        assert_eq!(
            Address::new(0x4000, 0, 0),
            Err(AddressError::ClusterOutOfRange(0x4000))
        );
        assert_eq!(Address::new(0, 32, 0), Err(AddressError::SectorOutOfRange(32)));
        assert_eq!(Address::new(0, 0, 11), Err(AddressError::GroupOutOfRange(11)));
    }

    #[test]
    fn test_validate_enforces_half_group_rule() {
        // Group 7 lives in the odd half of the pair.
        assert_eq!(
            Address::new(0, 0, 7),
            Err(AddressError::HalfGroupViolation { sector: 0, group: 7 })
        );
        // Group 2 lives in the even half.
        assert_eq!(
            Address::new(0, 1, 2),
            Err(AddressError::HalfGroupViolation { sector: 1, group: 2 })
        );
        // Group 5 is addressable from both halves.
        assert!(Address::new(0, 0, 5).is_ok());
        assert!(Address::new(0, 1, 5).is_ok());
    }

    #[test]
    fn test_shared_group_5_has_one_position() {
        let even = Address::new(3, 6, 5).expect("valid");
        let odd = Address::new(3, 7, 5).expect("valid");
        assert_eq!(even.position(), odd.position());
        // The canonical decoding picks the even sector.
        assert_eq!(
            Address::from_position(u64::from(odd.position())).expect("in range"),
            even
        );
    }

    #[test]
    fn test_position_round_trips_for_canonical_addresses() {
        for pos in [0u64, 1, 5, 6, 10, 11, 175, 176, 50 * 176 + 93] {
            let addr = Address::from_position(pos).expect("in range");
            addr.validate().expect("canonical");
            assert_eq!(u64::from(addr.position()), pos);
        }
    }

    #[test]
    fn test_advance_carries_across_sector_and_cluster() {
        let addr = Address::new(0, 0, 0).expect("valid");
        // 11 groups = one full sector pair.
        let next_pair = addr.advance_groups(11).expect("in range");
        assert_eq!(next_pair, Address::new(0, 2, 0).expect("valid"));
        // 176 groups = one full cluster.
        let next_cluster = addr.advance_groups(176).expect("in range");
        assert_eq!(next_cluster, Address::new(1, 0, 0).expect("valid"));
    }

    #[test]
    fn test_advance_past_addressable_range_is_capacity_error() {
        let near_end = Address::new(MAX_CLUSTER, 31, 9).expect("valid");
        assert!(near_end.advance_groups(1).is_ok());
        assert!(matches!(
            near_end.advance_groups(2),
            Err(AddressError::CapacityExceeded(_))
        ));
    }

    #[test]
    fn test_ms_to_groups_rounds_to_nearest() {
        // One group is about 11.61 ms.
        assert_eq!(ms_to_groups(0), 0);
        assert_eq!(ms_to_groups(12), 1);
        assert_eq!(ms_to_groups(23), 2);
        // 2.04 s stereo per cluster.
        assert_eq!(ms_to_groups(groups_to_ms(176)), 176);
    }

    #[test]
    fn test_nonzero_duration_never_rounds_to_zero_groups() {
        assert_eq!(ms_to_groups(1), 1);
        assert_eq!(ms_to_groups(5), 1);
    }

    #[test]
    fn test_duration_between_inverts_add_duration() {
        let start = Address::new(50, 0, 0).expect("valid");
        for ms in [11_610u32, 60_000, 195_000] {
            let end = start.add_duration(ms).expect("in range");
            let measured = start.duration_between(end).expect("ordered");
            // Within one group of rounding.
            assert!(measured.abs_diff(ms) <= groups_to_ms(1));
        }
    }

    #[test]
    fn test_duration_between_rejects_reversed_range() {
        let a = Address::new(10, 0, 0).expect("valid");
        let b = Address::new(9, 0, 0).expect("valid");
        assert!(matches!(
            a.duration_between(b),
            Err(AddressError::ReversedRange { .. })
        ));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_bytes_round_trip(cluster in 0u16..=MAX_CLUSTER, sector in 0u8..64, group in 0u8..16) {
                // Pure bit law: holds for every field pattern, valid or not.
                let addr = Address { cluster, sector, group };
                prop_assert_eq!(Address::from_bytes(addr.to_bytes()), addr);
            }

            #[test]
            fn prop_position_round_trip(pos in 0u64..(u64::from(MAX_CLUSTER) + 1) * 176) {
                let addr = Address::from_position(pos).expect("in range");
                prop_assert!(addr.validate().is_ok());
                prop_assert_eq!(u64::from(addr.position()), pos);
            }

            #[test]
            fn prop_group_conversion_round_trip(groups in 0u32..4_000_000) {
                prop_assert_eq!(ms_to_groups(groups_to_ms(groups)), groups);
            }
        }
    }
}
