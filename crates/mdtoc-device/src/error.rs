//! Error types for a TOC manipulation run

use crate::transport::TransportError;
use mdtoc_formats::TocError;
use thiserror::Error;

/// Result type for manipulation operations
pub type Result<T> = std::result::Result<T, ManipError>;

/// How one manipulation run failed.
///
/// Every variant up to and including [`ManipError::Write`] leaves the
/// device untouched and the operation can simply be abandoned.
/// [`ManipError::TransitionalWrite`] and [`ManipError::Finalize`]
/// occur after bytes have hit the medium and carry explicit handling
/// instructions.
#[derive(Debug, Error)]
pub enum ManipError {
    /// The device rejected entering TOC-edit mode
    #[error("device refused TOC-edit mode: {0}")]
    Prepare(#[source] TransportError),

    /// A sector read failed; no write was attempted
    #[error("failed to read TOC sector {sector}: {source}")]
    Read {
        /// Sector id that failed
        sector: u8,
        /// Underlying transport failure
        source: TransportError,
    },

    /// Importing or mutating the TOC failed; no write was attempted
    #[error("TOC processing failed: {0}")]
    Toc(#[from] TocError),

    /// The run was cancelled before any write
    #[error("manipulation cancelled before writing")]
    Cancelled,

    /// The caller's track list lacks the disc entry or any track
    #[error("track list needs the disc entry plus at least one track")]
    EmptyTrackList,

    /// The caller's track list exceeds the 255 track slots of a disc
    #[error("track list of {0} tracks exceeds the 255 slots of a disc")]
    TrackListTooLong(usize),

    /// The very first sector write failed; nothing has landed on the
    /// medium and the old TOC is still fully in effect
    #[error("failed to write TOC sector {sector}: {source}")]
    Write {
        /// Sector id whose write failed
        sector: u8,
        /// Underlying transport failure
        source: TransportError,
    },

    /// A sector write failed after at least one write had already
    /// succeeded. The medium holds a partially updated TOC until all
    /// three sectors are rewritten: do not eject the disc or
    /// power-cycle the device.
    #[error(
        "TOC write failed at sector {sector} with {sectors_written} sector(s) already \
         written; the disc is in a transitional state, do not eject or power off: {source}"
    )]
    TransitionalWrite {
        /// Sectors fully written before the failure
        sectors_written: u8,
        /// Sector id whose write failed
        sector: u8,
        /// Underlying transport failure
        source: TransportError,
    },

    /// All three sectors were written but the commit failed; the new
    /// TOC is on the medium yet not effective until a finalize
    /// succeeds
    #[error("TOC written but finalize failed; retry finalize before ejecting: {0}")]
    Finalize(#[source] TransportError),
}

impl ManipError {
    /// True when the device may hold a partially applied or
    /// uncommitted TOC and must not be ejected or power-cycled
    pub fn device_at_risk(&self) -> bool {
        matches!(self, Self::TransitionalWrite { .. } | Self::Finalize(_))
    }
}
