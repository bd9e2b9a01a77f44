//! Error types for UTOC parsing, mutation and building

use crate::address::AddressError;
use thiserror::Error;

/// Result type for UTOC operations
pub type Result<T> = std::result::Result<T, TocError>;

/// Errors that can occur when parsing, mutating or building a UTOC
#[derive(Debug, Error)]
pub enum TocError {
    /// Raw sector buffer has the wrong length
    #[error("TOC sector {sector} has wrong length: expected {expected}, got {actual}")]
    BadSectorLength {
        /// Sector index within the TOC
        sector: usize,
        /// Required length in bytes
        expected: usize,
        /// Supplied length in bytes
        actual: usize,
    },

    /// Sector header does not carry the expected sync pattern
    #[error("TOC sector {0} does not start with the sync pattern")]
    BadSyncPattern(usize),

    /// Sector header carries an unexpected sector number
    #[error("TOC sector header claims sector {actual}, expected {expected}")]
    SectorNumberMismatch {
        /// Sector number required at this slot
        expected: u8,
        /// Sector number found in the header
        actual: u8,
    },

    /// A part or title-cell link chain loops back on itself
    #[error("link chain starting at index {head} cycles (walked past {limit} entries)")]
    CycleDetected {
        /// Chain head index where the walk started
        head: u16,
        /// Arena capacity used as the walk limit
        limit: usize,
    },

    /// A link references an index outside the arena
    #[error("link references index {0} outside the arena")]
    LinkOutOfRange(u16),

    /// An imported part carries an invalid or reversed address range
    #[error("part {index} has an invalid address range: {source}")]
    InvalidPartRange {
        /// Part index in the descriptor table
        index: u16,
        /// Underlying address validation failure
        source: AddressError,
    },

    /// Part arena exhausted; a real device ceiling, not a soft limit
    #[error("part arena exhausted (all {0} descriptors in use)")]
    PartsExhausted(usize),

    /// Title cell arena of one title sector exhausted
    #[error("title cell arena exhausted (all {0} cells in use)")]
    TitleCellsExhausted(usize),

    /// Requested track length does not fit the remaining DAO region
    #[error(
        "disc full: track needs {requested_groups} sound groups, {available_groups} remain"
    )]
    DiscFull {
        /// Groups the requested length converts to
        requested_groups: u32,
        /// Groups left in the splitting region
        available_groups: u32,
    },

    /// `add_track` called out of ascending sequence
    #[error("tracks must be added in ascending order: expected track {expected}, got {got}")]
    OutOfOrder {
        /// The only acceptable next track number
        expected: u8,
        /// Track number actually supplied
        got: u8,
    },

    /// Track number outside the batch declared at import
    #[error("track {got} exceeds the {declared} tracks declared for this split")]
    TooManyTracks {
        /// Track count declared via the import hint
        declared: u8,
        /// Track number actually supplied
        got: u8,
    },

    /// No track is recorded at the given number
    #[error("no track {0} on this disc")]
    UnknownTrack(u8),

    /// Title contains a character outside the device charset
    #[error("title character {0:?} is outside the supported charset")]
    InvalidTitleChar(char),

    /// Imported title cell contains a byte outside the device charset
    #[error("title cell contains invalid byte {0:#04x}")]
    InvalidTitleByte(u8),

    /// Address arithmetic failed (capacity or range)
    #[error("address arithmetic failed: {0}")]
    Address(#[from] AddressError),

    /// Binary layout parsing or building error
    #[error("binary layout error: {0}")]
    BinRw(#[from] binrw::Error),
}
