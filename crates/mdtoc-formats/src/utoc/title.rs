//! Half-width and full-width title stores
//!
//! Titles live in two separate TOC sectors with identical cell
//! layouts: a slot map pointing at chains of 8-byte cells, each cell
//! carrying seven payload bytes. The half-width sector stores one
//! byte per character (printable ASCII plus JIS X 0201 half-width
//! katakana); the full-width sector stores big-endian 16-bit code
//! units. Characters outside the device charset are rejected, never
//! silently dropped, because the firmware mis-renders or refuses
//! anything else.

use crate::utoc::error::{Result, TocError};
use crate::utoc::sector::{RawTitleCell, TABLE_SLOTS, TitleSector, empty_title_sector};
use std::collections::BTreeMap;

/// Payload bytes per title cell
const CELL_DATA: usize = 7;

/// Usable cells per title sector (cell 0 is the null terminator)
const CELL_CAPACITY: usize = TABLE_SLOTS - 1;

/// First Unicode half-width katakana code point (U+FF61)
const KATAKANA_BASE: u32 = 0xFF61;

/// JIS X 0201 byte for U+FF61
const KATAKANA_JIS_BASE: u32 = 0xA1;

/// Number of half-width katakana code points (U+FF61..=U+FF9F)
const KATAKANA_COUNT: u32 = 0x3F;

/// Per-slot title text for both character widths
///
/// The store exclusively owns its strings; the builder hands out
/// clones and never aliases into the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleStore {
    half: BTreeMap<u8, String>,
    full: BTreeMap<u8, String>,
}

impl TitleStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the two title sectors
    pub fn from_sectors(half: &TitleSector, full: &TitleSector) -> Result<Self> {
        let mut store = Self::new();
        for (slot, bytes) in unpack_cells(half)? {
            store.half.insert(slot, decode_half_width(&bytes)?);
        }
        for (slot, bytes) in unpack_cells(full)? {
            store.full.insert(slot, decode_full_width(&bytes)?);
        }
        Ok(store)
    }

    /// Set the titles for one slot, validating both charsets before
    /// any mutation. An empty half-width title clears the slot.
    pub fn set(&mut self, slot: u8, half: &str, full: Option<&str>) -> Result<()> {
        let half_bytes = encode_half_width(half)?;
        let full_bytes = full.map(encode_full_width).transpose()?;
        if half_bytes.is_empty() {
            self.half.remove(&slot);
        } else {
            self.half.insert(slot, half.to_owned());
        }
        match (full, full_bytes) {
            (Some(text), Some(bytes)) if !bytes.is_empty() => {
                self.full.insert(slot, text.to_owned());
            }
            _ => {
                self.full.remove(&slot);
            }
        }
        Ok(())
    }

    /// Half-width title of a slot
    pub fn half_width(&self, slot: u8) -> Option<&str> {
        self.half.get(&slot).map(String::as_str)
    }

    /// Full-width title of a slot
    pub fn full_width(&self, slot: u8) -> Option<&str> {
        self.full.get(&slot).map(String::as_str)
    }

    /// Drop both titles of a slot
    pub fn clear(&mut self, slot: u8) {
        self.half.remove(&slot);
        self.full.remove(&slot);
    }

    /// Serialize into the half-width title sector (TOC sector 1)
    pub fn build_half_sector(&self) -> Result<TitleSector> {
        let mut encoded = BTreeMap::new();
        for (&slot, text) in &self.half {
            encoded.insert(slot, encode_half_width(text)?);
        }
        pack_cells(1, &encoded)
    }

    /// Serialize into the full-width title sector (TOC sector 2)
    pub fn build_full_sector(&self) -> Result<TitleSector> {
        let mut encoded = BTreeMap::new();
        for (&slot, text) in &self.full {
            encoded.insert(slot, encode_full_width(text)?);
        }
        pack_cells(2, &encoded)
    }
}

/// Validate a half-width title without storing it
pub fn validate_half_width(text: &str) -> Result<()> {
    encode_half_width(text).map(|_| ())
}

/// Validate a full-width title without storing it
pub fn validate_full_width(text: &str) -> Result<()> {
    encode_full_width(text).map(|_| ())
}

fn encode_half_width(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => Ok(c as u8),
            _ => {
                let code = c as u32;
                if (KATAKANA_BASE..KATAKANA_BASE + KATAKANA_COUNT).contains(&code) {
                    Ok((code - KATAKANA_BASE + KATAKANA_JIS_BASE) as u8)
                } else {
                    Err(TocError::InvalidTitleChar(c))
                }
            }
        })
        .collect()
}

fn decode_half_width(bytes: &[u8]) -> Result<String> {
    bytes
        .iter()
        .map(|&b| match b {
            0x20..=0x7E => Ok(char::from(b)),
            0xA1..=0xDF => {
                let code = KATAKANA_BASE + u32::from(b) - KATAKANA_JIS_BASE;
                char::from_u32(code).ok_or(TocError::InvalidTitleByte(b))
            }
            _ => Err(TocError::InvalidTitleByte(b)),
        })
        .collect()
}

fn encode_full_width(text: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(text.len() * 2);
    for c in text.chars() {
        let code = c as u32;
        if code == 0 || code > 0xFFFF {
            return Err(TocError::InvalidTitleChar(c));
        }
        bytes.extend_from_slice(&(code as u16).to_be_bytes());
    }
    Ok(bytes)
}

fn decode_full_width(bytes: &[u8]) -> Result<String> {
    // Cell padding trims as trailing zeros; a code unit whose low
    // byte is zero loses it to the trim, so restore pair alignment.
    let mut bytes = bytes.to_vec();
    if bytes.len() % 2 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(2)
        .map(|pair| {
            let code = u32::from(u16::from_be_bytes([pair[0], pair[1]]));
            char::from_u32(code).ok_or(TocError::InvalidTitleByte(pair[0]))
        })
        .collect()
}

/// Pack per-slot byte strings into a title sector: cells allocated
/// sequentially, chained by the link byte, remainder strung onto the
/// free cell chain.
fn pack_cells(sector_number: u8, titles: &BTreeMap<u8, Vec<u8>>) -> Result<TitleSector> {
    let mut sector = empty_title_sector(sector_number);
    let mut next_cell = 1usize;
    for (&slot, bytes) in titles {
        if bytes.is_empty() {
            continue;
        }
        let needed = bytes.len().div_ceil(CELL_DATA);
        if next_cell + needed > TABLE_SLOTS {
            return Err(TocError::TitleCellsExhausted(CELL_CAPACITY));
        }
        sector.slot_map[usize::from(slot)] = next_cell as u8;
        for (i, chunk) in bytes.chunks(CELL_DATA).enumerate() {
            let mut data = [0u8; CELL_DATA];
            data[..chunk.len()].copy_from_slice(chunk);
            let link = if i + 1 < needed { (next_cell + 1) as u8 } else { 0 };
            sector.cells[next_cell] = RawTitleCell { data, link };
            next_cell += 1;
        }
    }
    // Remaining cells form the free chain.
    if next_cell < TABLE_SLOTS {
        sector.p_empty = next_cell as u8;
        for idx in next_cell..TABLE_SLOTS {
            sector.cells[idx].link = if idx + 1 < TABLE_SLOTS { (idx + 1) as u8 } else { 0 };
        }
    }
    Ok(sector)
}

/// Walk every slot's cell chain, with the same cycle guard as the
/// part arena.
fn unpack_cells(sector: &TitleSector) -> Result<BTreeMap<u8, Vec<u8>>> {
    let mut titles = BTreeMap::new();
    for slot in 0..TABLE_SLOTS {
        let head = sector.slot_map[slot];
        if head == 0 {
            continue;
        }
        let mut bytes = Vec::new();
        let mut cursor = usize::from(head);
        let mut steps = 0usize;
        while cursor != 0 {
            if steps >= TABLE_SLOTS {
                return Err(TocError::CycleDetected {
                    head: u16::from(head),
                    limit: CELL_CAPACITY,
                });
            }
            let cell = &sector.cells[cursor];
            bytes.extend_from_slice(&cell.data);
            cursor = usize::from(cell.link);
            steps += 1;
        }
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        if !bytes.is_empty() {
            titles.insert(slot as u8, bytes);
        }
    }
    Ok(titles)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(store: &TitleStore) -> TitleStore {
        let half = store.build_half_sector().expect("packs");
        let full = store.build_full_sector().expect("packs");
        TitleStore::from_sectors(&half, &full).expect("unpacks")
    }

    #[test]
    fn test_ascii_title_round_trips() {
        let mut store = TitleStore::new();
        store.set(1, "Track One", None).expect("valid charset");
        assert_eq!(round_trip(&store), store);
    }

    #[test]
    fn test_title_longer_than_one_cell_round_trips() {
        let mut store = TitleStore::new();
        store
            .set(0, "A Disc Title Spanning Several Cells", None)
            .expect("valid charset");
        let rebuilt = round_trip(&store);
        assert_eq!(
            rebuilt.half_width(0),
            Some("A Disc Title Spanning Several Cells")
        );
    }

    #[test]
    fn test_half_width_katakana_round_trips() {
        let mut store = TitleStore::new();
        store.set(2, "\u{FF80}\u{FF72}\u{FF84}\u{FF99}", None).expect("katakana is half-width");
        assert_eq!(
            round_trip(&store).half_width(2),
            Some("\u{FF80}\u{FF72}\u{FF84}\u{FF99}")
        );
    }

    #[test]
    fn test_full_width_title_round_trips() {
        let mut store = TitleStore::new();
        store
            .set(1, "Track One", Some("\u{30C8}\u{30E9}\u{30C3}\u{30AF}\u{FF11}"))
            .expect("valid charsets");
        assert_eq!(
            round_trip(&store).full_width(1),
            Some("\u{30C8}\u{30E9}\u{30C3}\u{30AF}\u{FF11}")
        );
    }

    #[test]
    fn test_full_width_char_with_zero_low_byte_survives_padding() {
        let mut store = TitleStore::new();
        // U+0100 serializes as 01 00; the low byte abuts the cell padding.
        store.set(1, "T", Some("\u{0100}")).expect("valid charsets");
        assert_eq!(round_trip(&store).full_width(1), Some("\u{0100}"));
    }

    #[test]
    fn test_out_of_charset_half_width_is_rejected() {
        let mut store = TitleStore::new();
        let err = store.set(1, "Caf\u{E9}", None).expect_err("é is not half-width");
        assert!(matches!(err, TocError::InvalidTitleChar('\u{E9}')));
        // Rejected, not partially applied.
        assert_eq!(store.half_width(1), None);
    }

    #[test]
    fn test_non_bmp_full_width_is_rejected() {
        let mut store = TitleStore::new();
        let err = store
            .set(1, "T", Some("\u{1F3B5}"))
            .expect_err("astral plane exceeds 16-bit code units");
        assert!(matches!(err, TocError::InvalidTitleChar(_)));
    }

    #[test]
    fn test_empty_half_width_clears_the_slot() {
        let mut store = TitleStore::new();
        store.set(3, "Gone Soon", None).expect("valid charset");
        store.set(3, "", None).expect("empty clears");
        assert_eq!(store.half_width(3), None);
    }

    #[test]
    fn test_cell_exhaustion_is_a_capacity_error() {
        let mut store = TitleStore::new();
        // 255 cells * 7 bytes = 1785 payload bytes; two slots of 900
        // ASCII characters cannot fit.
        let long = "x".repeat(900);
        store.set(1, &long, None).expect("valid charset");
        store.set(2, &long, None).expect("valid charset");
        let err = store.build_half_sector().expect_err("over capacity");
        assert!(matches!(err, TocError::TitleCellsExhausted(_)));
    }

    #[test]
    fn test_cell_cycle_detected_on_import() {
        let mut sector = empty_title_sector(1);
        sector.slot_map[1] = 1;
        sector.cells[1] = RawTitleCell { data: *b"LOOPLOO", link: 2 };
        sector.cells[2] = RawTitleCell { data: *b"PLOOPLO", link: 1 };
        let err = TitleStore::from_sectors(&sector, &empty_title_sector(2))
            .expect_err("cycle");
        assert!(matches!(err, TocError::CycleDetected { .. }));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_ascii_titles_round_trip(text in "[ -~]{0,120}") {
                let mut store = TitleStore::new();
                store.set(1, &text, None).expect("printable ASCII is valid");
                let rebuilt = round_trip(&store);
                let expected = if text.is_empty() { None } else { Some(text.as_str()) };
                prop_assert_eq!(rebuilt.half_width(1), expected);
            }
        }
    }
}
