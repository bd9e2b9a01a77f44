//! Raw 2352-byte TOC sector layout
//!
//! The UTOC occupies three fixed-size sectors:
//!
//! - sector 0: position data (track map + part descriptor table)
//! - sector 1: half-width titles (slot map + 7-byte title cells)
//! - sector 2: full-width titles (same cell layout, 16-bit code units)
//!
//! Each sector is 2352 bytes: a 16-byte [`SectorHeader`], a 32-byte
//! sector-specific block, a 256-byte map and a 2048-byte table of
//! 8-byte descriptors. The upstream material documents the addressing
//! scheme and the descriptor shape but not authoritative byte offsets,
//! so this serializer fixes its own and enforces them on import via
//! the sync pattern and header sector number.

use crate::utoc::error::{Result, TocError};
use binrw::{BinRead, BinWrite, io::Cursor};

/// Length of every TOC sector in bytes
pub const SECTOR_LEN: usize = 2352;

/// Number of sectors making up the UTOC
pub const TOC_SECTORS: usize = 3;

/// Descriptor slots per sector table (index 0 is the null terminator)
pub const TABLE_SLOTS: usize = 256;

/// Sync pattern opening every TOC sector
pub const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// Common 16-byte sector header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct SectorHeader {
    /// Sync pattern, see [`SYNC_PATTERN`]
    pub sync: [u8; 12],
    /// Cluster the TOC sector lives in
    pub cluster: u16,
    /// Sector number within the TOC (0..3)
    pub sector_number: u8,
    /// Sector mode byte
    pub mode: u8,
}

impl SectorHeader {
    /// Header for a freshly built sector
    pub fn new(sector_number: u8) -> Self {
        Self {
            sync: SYNC_PATTERN,
            cluster: 0,
            sector_number,
            mode: 0,
        }
    }

    /// Reject buffers that do not carry this layout
    pub fn validate(&self, slot: usize) -> Result<()> {
        if self.sync != SYNC_PATTERN {
            return Err(TocError::BadSyncPattern(slot));
        }
        if usize::from(self.sector_number) != slot {
            return Err(TocError::SectorNumberMismatch {
                expected: slot as u8,
                actual: self.sector_number,
            });
        }
        Ok(())
    }
}

/// One 8-byte part descriptor: an address range plus the link byte
/// chaining descriptors into per-track and free lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct RawPart {
    /// Packed start address (inclusive)
    pub start: [u8; 3],
    /// Track mode byte (encoding + protection)
    pub mode: u8,
    /// Packed end address (inclusive)
    pub end: [u8; 3],
    /// Index of the next descriptor in the chain, 0 terminates
    pub link: u8,
}

/// One 8-byte title cell: seven payload bytes plus the link byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct RawTitleCell {
    /// Title payload, NUL padded
    pub data: [u8; 7],
    /// Index of the next cell in the chain, 0 terminates
    pub link: u8,
}

/// Sector 0: disc block, track map and part descriptor table
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct PositionSector {
    /// Common header (sector number 0)
    pub header: SectorHeader,
    /// Recorder maker code, preserved across manipulations
    pub maker_code: u8,
    /// Recorder model code, preserved across manipulations
    pub model_code: u8,
    /// First recorded track number, 0 on an empty disc
    pub first_track: u8,
    /// Last recorded track number, 0 on an empty disc
    pub last_track: u8,
    /// Bitmap of TOC sectors in use
    pub used_sectors: u8,
    /// Disc flags (write protect etc.), preserved verbatim
    pub disc_flags: u8,
    /// Unassigned space in the disc block
    pub reserved: [u8; 23],
    /// Head of the defective-area chain
    pub p_defect: u8,
    /// Head of the free part-descriptor chain
    pub p_empty: u8,
    /// Head of the freely recordable area chain
    pub p_free: u8,
    /// Track slot -> head descriptor index (slot 0 is the disc entry)
    pub track_map: [u8; TABLE_SLOTS],
    /// Part descriptor table; entry 0 is never addressed
    pub parts: [RawPart; TABLE_SLOTS],
}

impl PositionSector {
    /// Parse sector 0 from a raw buffer
    pub fn parse(data: &[u8]) -> Result<Self> {
        check_len(0, data)?;
        let mut cursor = Cursor::new(data);
        let sector = Self::read(&mut cursor)?;
        sector.header.validate(0)?;
        Ok(sector)
    }

    /// Build the raw 2352-byte buffer
    pub fn build(&self) -> Result<[u8; SECTOR_LEN]> {
        build_sector(self)
    }
}

/// Sectors 1 and 2: slot map and title cell table
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct TitleSector {
    /// Common header (sector number 1 or 2)
    pub header: SectorHeader,
    /// Head of the free title-cell chain
    pub p_empty: u8,
    /// Unassigned space in the sector block
    pub reserved: [u8; 31],
    /// Track slot -> head cell index (slot 0 is the disc title)
    pub slot_map: [u8; TABLE_SLOTS],
    /// Title cell table; entry 0 is never addressed
    pub cells: [RawTitleCell; TABLE_SLOTS],
}

impl TitleSector {
    /// Parse a title sector from a raw buffer; `slot` is 1 for the
    /// half-width sector, 2 for the full-width sector
    pub fn parse(slot: usize, data: &[u8]) -> Result<Self> {
        check_len(slot, data)?;
        let mut cursor = Cursor::new(data);
        let sector = Self::read(&mut cursor)?;
        sector.header.validate(slot)?;
        Ok(sector)
    }

    /// Build the raw 2352-byte buffer
    pub fn build(&self) -> Result<[u8; SECTOR_LEN]> {
        build_sector(self)
    }
}

/// The three raw TOC sectors as read from or written to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToc {
    /// Sector buffers, index = TOC sector number
    pub sectors: [[u8; SECTOR_LEN]; TOC_SECTORS],
}

impl RawToc {
    /// Assemble from three sector buffers
    pub fn new(sectors: [[u8; SECTOR_LEN]; TOC_SECTORS]) -> Self {
        Self { sectors }
    }

    /// Assemble from arbitrary slices, validating lengths
    pub fn from_slices(slices: &[&[u8]; TOC_SECTORS]) -> Result<Self> {
        let mut sectors = [[0u8; SECTOR_LEN]; TOC_SECTORS];
        for (i, slice) in slices.iter().enumerate() {
            check_len(i, slice)?;
            sectors[i].copy_from_slice(slice);
        }
        Ok(Self { sectors })
    }

    /// Borrow one sector buffer
    pub fn sector(&self, slot: usize) -> &[u8; SECTOR_LEN] {
        &self.sectors[slot]
    }
}

fn check_len(slot: usize, data: &[u8]) -> Result<()> {
    if data.len() != SECTOR_LEN {
        return Err(TocError::BadSectorLength {
            sector: slot,
            expected: SECTOR_LEN,
            actual: data.len(),
        });
    }
    Ok(())
}

fn build_sector<T>(value: &T) -> Result<[u8; SECTOR_LEN]>
where
    T: for<'a> BinWrite<Args<'a> = ()> + binrw::meta::WriteEndian,
{
    let mut cursor = Cursor::new(Vec::with_capacity(SECTOR_LEN));
    value.write(&mut cursor)?;
    let bytes = cursor.into_inner();
    let mut out = [0u8; SECTOR_LEN];
    if bytes.len() != SECTOR_LEN {
        return Err(TocError::BadSectorLength {
            sector: 0,
            expected: SECTOR_LEN,
            actual: bytes.len(),
        });
    }
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A blank sector 0 with the header filled in
pub fn empty_position_sector() -> PositionSector {
    PositionSector {
        header: SectorHeader::new(0),
        maker_code: 0,
        model_code: 0,
        first_track: 0,
        last_track: 0,
        used_sectors: 0x07,
        disc_flags: 0,
        reserved: [0; 23],
        p_defect: 0,
        p_empty: 0,
        p_free: 0,
        track_map: [0; TABLE_SLOTS],
        parts: [RawPart::default(); TABLE_SLOTS],
    }
}

/// A blank title sector with the header filled in
pub fn empty_title_sector(sector_number: u8) -> TitleSector {
    TitleSector {
        header: SectorHeader::new(sector_number),
        p_empty: 0,
        reserved: [0; 31],
        slot_map: [0; TABLE_SLOTS],
        cells: [RawTitleCell::default(); TABLE_SLOTS],
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_position_sector_is_exactly_one_sector() {
        let built = empty_position_sector().build().expect("builds");
        assert_eq!(built.len(), SECTOR_LEN);
    }

    #[test]
    fn test_title_sector_is_exactly_one_sector() {
        let built = empty_title_sector(1).build().expect("builds");
        assert_eq!(built.len(), SECTOR_LEN);
    }

    #[test]
    fn test_position_sector_round_trips() {
        let mut sector = empty_position_sector();
        sector.first_track = 1;
        sector.last_track = 3;
        sector.p_empty = 7;
        sector.track_map[1] = 4;
        sector.parts[4] = RawPart {
            start: [0x01, 0x02, 0x03],
            mode: 0x02,
            end: [0x04, 0x05, 0x06],
            link: 0,
        };
        let built = sector.build().expect("builds");
        let parsed = PositionSector::parse(&built).expect("parses");
        assert_eq!(parsed, sector);
    }

    #[test]
    fn test_title_sector_round_trips() {
        let mut sector = empty_title_sector(1);
        sector.slot_map[0] = 1;
        sector.cells[1] = RawTitleCell {
            data: *b"My Albu",
            link: 2,
        };
        sector.cells[2] = RawTitleCell {
            data: *b"m\0\0\0\0\0\0",
            link: 0,
        };
        let built = sector.build().expect("builds");
        let parsed = TitleSector::parse(1, &built).expect("parses");
        assert_eq!(parsed, sector);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let err = PositionSector::parse(&[0u8; 100]).expect_err("short buffer");
        assert!(matches!(err, TocError::BadSectorLength { actual: 100, .. }));
    }

    #[test]
    fn test_missing_sync_pattern_rejected() {
        let buf = [0u8; SECTOR_LEN];
        let err = PositionSector::parse(&buf).expect_err("no sync");
        assert!(matches!(err, TocError::BadSyncPattern(0)));
    }

    #[test]
    fn test_wrong_sector_number_rejected() {
        let built = empty_title_sector(2).build().expect("builds");
        let err = TitleSector::parse(1, &built).expect_err("wrong slot");
        assert!(matches!(
            err,
            TocError::SectorNumberMismatch { expected: 1, actual: 2 }
        ));
    }
}
