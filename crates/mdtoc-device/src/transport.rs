//! The injected device transport seam

use mdtoc_formats::SECTOR_LEN;
use thiserror::Error;

/// Errors surfaced by the transport primitives
#[derive(Debug, Error)]
pub enum TransportError {
    /// A sector read or write failed at the transport layer
    #[error("sector I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The device rejected a protocol command
    #[error("device rejected the command: {0}")]
    Protocol(String),
}

/// The four device primitives a TOC manipulation needs.
///
/// Implementations own retries and timeouts; this engine propagates
/// their failures without retrying. One manipulation may be in flight
/// against a given handle at a time.
pub trait TocTransport {
    /// Read one raw 2352-byte TOC sector (sector ids 0..6 are valid
    /// on the medium; a manipulation touches 0..3)
    fn read_sector(&mut self, sector: u8) -> Result<[u8; SECTOR_LEN], TransportError>;

    /// Write one raw TOC sector
    fn write_sector(&mut self, sector: u8, data: &[u8; SECTOR_LEN])
    -> Result<(), TransportError>;

    /// Put the device into TOC-edit mode
    fn prepare_manipulation(&mut self) -> Result<(), TransportError>;

    /// Commit the TOC edit, optionally resetting the device and
    /// waiting for it to settle
    fn finalize(&mut self, reset: bool, wait_seconds: u8) -> Result<(), TransportError>;
}
