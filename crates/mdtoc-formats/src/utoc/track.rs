//! Track slot map and per-track mode byte

use crate::utoc::error::{Result, TocError};
use crate::utoc::part::{NULL_INDEX, PartIndex};
use crate::utoc::sector::TABLE_SLOTS;

/// Audio encoding carried by a track's parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Standard play, stereo
    #[default]
    SpStereo,
    /// Standard play, mono
    SpMono,
    /// Long play, 2x
    Lp2,
    /// Long play, 4x
    Lp4,
}

/// Decoded track mode byte: encoding in bits 1-2, copy protection in
/// bit 0. Carried by every part descriptor of the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackMode {
    /// Audio encoding
    pub encoding: Encoding,
    /// Copy protection flag
    pub protected: bool,
}

impl TrackMode {
    /// Pack into the descriptor mode byte
    pub fn to_byte(self) -> u8 {
        let encoding = match self.encoding {
            Encoding::SpStereo => 0,
            Encoding::SpMono => 1,
            Encoding::Lp2 => 2,
            Encoding::Lp4 => 3,
        };
        (encoding << 1) | u8::from(self.protected)
    }

    /// Unpack from the descriptor mode byte; undefined high bits are
    /// ignored, matching device tolerance for vendor extensions
    pub fn from_byte(byte: u8) -> Self {
        let encoding = match (byte >> 1) & 0x03 {
            0 => Encoding::SpStereo,
            1 => Encoding::SpMono,
            2 => Encoding::Lp2,
            _ => Encoding::Lp4,
        };
        Self {
            encoding,
            protected: byte & 0x01 != 0,
        }
    }
}

/// Track slot -> head part index map
///
/// Slot 0 is the disc's own entry and never heads an audio chain.
/// The map owns no parts; allocation and linking belong to the
/// caller, which keeps removal from the free chain atomic with
/// insertion into a track chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTable {
    heads: Vec<PartIndex>,
}

impl TrackTable {
    /// Empty map: every slot unoccupied
    pub fn new() -> Self {
        Self {
            heads: vec![NULL_INDEX; TABLE_SLOTS],
        }
    }

    /// Rebuild from the sector 0 track map
    pub fn from_raw(map: &[u8; TABLE_SLOTS]) -> Self {
        Self {
            heads: map.iter().map(|&b| PartIndex::from(b)).collect(),
        }
    }

    /// Serialize back into the sector 0 track map
    pub fn to_raw(&self) -> [u8; TABLE_SLOTS] {
        let mut map = [0u8; TABLE_SLOTS];
        for (slot, &head) in map.iter_mut().zip(&self.heads) {
            *slot = head as u8;
        }
        map
    }

    /// Head part of a track's chain, O(1)
    pub fn head_of(&self, slot: u8) -> PartIndex {
        self.heads[usize::from(slot)]
    }

    /// Point a slot at a chain head, O(1); the caller has already
    /// allocated and linked the chain
    pub fn set_head(&mut self, slot: u8, head: PartIndex) {
        self.heads[usize::from(slot)] = head;
    }

    /// Clear a slot, returning the chain head it held
    pub fn clear(&mut self, slot: u8) -> PartIndex {
        std::mem::replace(&mut self.heads[usize::from(slot)], NULL_INDEX)
    }

    /// Highest occupied track slot, 0 when the disc carries no tracks
    pub fn last_track(&self) -> u8 {
        self.heads
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .find(|&(_, &head)| head != NULL_INDEX)
            .map_or(0, |(slot, _)| slot as u8)
    }

    /// Lowest occupied track slot, 0 when the disc carries no tracks
    pub fn first_track(&self) -> u8 {
        self.heads
            .iter()
            .enumerate()
            .skip(1)
            .find(|&(_, &head)| head != NULL_INDEX)
            .map_or(0, |(slot, _)| slot as u8)
    }

    /// Require an occupied slot
    pub fn occupied_head(&self, slot: u8) -> Result<PartIndex> {
        let head = self.head_of(slot);
        if slot == 0 || head == NULL_INDEX {
            return Err(TocError::UnknownTrack(slot));
        }
        Ok(head)
    }
}

impl Default for TrackTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mode_byte_round_trips() {
        for encoding in [Encoding::SpStereo, Encoding::SpMono, Encoding::Lp2, Encoding::Lp4] {
            for protected in [false, true] {
                let mode = TrackMode { encoding, protected };
                assert_eq!(TrackMode::from_byte(mode.to_byte()), mode);
            }
        }
    }

    #[test]
    fn test_empty_table_has_no_tracks() {
        let table = TrackTable::new();
        assert_eq!(table.first_track(), 0);
        assert_eq!(table.last_track(), 0);
        assert!(matches!(table.occupied_head(1), Err(TocError::UnknownTrack(1))));
    }

    #[test]
    fn test_set_and_clear_heads() {
        let mut table = TrackTable::new();
        table.set_head(1, 5);
        table.set_head(3, 9);
        assert_eq!(table.first_track(), 1);
        assert_eq!(table.last_track(), 3);
        assert_eq!(table.occupied_head(3).expect("occupied"), 9);

        assert_eq!(table.clear(3), 9);
        assert_eq!(table.last_track(), 1);
    }

    #[test]
    fn test_slot_zero_is_never_a_track() {
        let mut table = TrackTable::new();
        table.set_head(0, 7);
        assert_eq!(table.first_track(), 0);
        assert!(matches!(table.occupied_head(0), Err(TocError::UnknownTrack(0))));
    }

    #[test]
    fn test_raw_round_trip() {
        let mut table = TrackTable::new();
        table.set_head(1, 2);
        table.set_head(2, 14);
        let rebuilt = TrackTable::from_raw(&table.to_raw());
        assert_eq!(rebuilt, table);
    }
}
