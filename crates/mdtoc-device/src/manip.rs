//! The TOC manipulation orchestrator
//!
//! [`TocManip`] drives one linear pass over the device protocol:
//!
//! ```text
//! Idle → Prepared → Snapshotted → Built → Mutated → Written → Finalized
//!                                                 ↘ Failed (from any phase)
//! ```
//!
//! There are no retries and no branching inside a run; transport
//! collaborators own retry policy. Everything before the first
//! `write_sector` call is abortable and leaves the device untouched.
//! The write window is the irrecoverable step: failures after the
//! first successful sector write surface as the distinct
//! [`ManipError::TransitionalWrite`] signal so callers know not to
//! eject or power-cycle the device.

use crate::error::{ManipError, Result};
use crate::transport::TocTransport;
use mdtoc_formats::{RawToc, SECTOR_LEN, TOC_SECTORS, TocBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// One entry of the caller's track list.
///
/// Index 0 of the list is the disc entry: its title becomes the disc
/// title and its length is the total length of the bulk recording.
/// Indices 1..N are the tracks in physical order on the recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSpec {
    /// Half-width title
    pub title: String,
    /// Measured length in milliseconds
    pub length_ms: u32,
}

impl TrackSpec {
    /// Convenience constructor
    pub fn new(title: impl Into<String>, length_ms: u32) -> Self {
        Self {
            title: title.into(),
            length_ms,
        }
    }
}

/// Finalize parameters for a manipulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManipConfig {
    /// Reset the device as part of the finalize
    pub finalize_reset: bool,
    /// Seconds to wait for the device to settle after finalize
    pub finalize_wait_seconds: u8,
}

impl Default for ManipConfig {
    fn default() -> Self {
        Self {
            finalize_reset: true,
            finalize_wait_seconds: 5,
        }
    }
}

/// Phases of one manipulation run, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManipPhase {
    /// Nothing has happened yet
    Idle,
    /// Device accepted TOC-edit mode
    Prepared,
    /// All three sectors read; device untouched
    Snapshotted,
    /// Snapshot parsed into a TOC graph
    Built,
    /// Track splits and titles applied in memory
    Mutated,
    /// All three sectors written back
    Written,
    /// Finalize succeeded; terminal
    Finalized,
    /// Run aborted; terminal
    Failed,
}

/// The serialized TOC a successful run wrote, for logging and
/// diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenToc {
    /// The exact bytes now on the device
    pub raw: RawToc,
}

/// Drives one TOC manipulation against an injected transport
pub struct TocManip<T: TocTransport> {
    transport: T,
    config: ManipConfig,
    phase: ManipPhase,
    cancel: Option<Arc<AtomicBool>>,
}

impl<T: TocTransport> TocManip<T> {
    /// Wrap a transport for one manipulation run
    pub fn new(transport: T, config: ManipConfig) -> Self {
        Self {
            transport,
            config,
            phase: ManipPhase::Idle,
            cancel: None,
        }
    }

    /// Install a cooperative cancellation flag. Cancellation is
    /// honored between phases up to the end of `Built`; once writing
    /// starts the run is committed.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Current phase of the run
    pub fn phase(&self) -> ManipPhase {
        self.phase
    }

    /// Give the transport back after a run
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Execute the whole manipulation: snapshot, split, write back,
    /// finalize. `tracks[0]` is the disc entry, `tracks[1..]` the
    /// tracks in strict physical order.
    pub fn run(&mut self, tracks: &[TrackSpec]) -> Result<WrittenToc> {
        if tracks.len() < 2 {
            return self.fail(ManipError::EmptyTrackList);
        }
        let track_count = tracks.len() - 1;
        if track_count > 255 {
            return self.fail(ManipError::TrackListTooLong(track_count));
        }
        let disc = &tracks[0];
        info!(
            tracks = track_count,
            total_ms = disc.length_ms,
            "starting TOC manipulation"
        );

        self.checkpoint()?;
        if let Err(source) = self.transport.prepare_manipulation() {
            return self.fail(ManipError::Prepare(source));
        }
        self.phase = ManipPhase::Prepared;
        self.checkpoint()?;

        // No partial read is ever acted upon: any failure here aborts
        // before the device has been mutated in any way.
        let mut sectors = [[0u8; SECTOR_LEN]; TOC_SECTORS];
        for (sector, buf) in sectors.iter_mut().enumerate() {
            match self.transport.read_sector(sector as u8) {
                Ok(data) => {
                    debug!(sector, "TOC sector read");
                    *buf = data;
                }
                Err(source) => {
                    return self.fail(ManipError::Read {
                        sector: sector as u8,
                        source,
                    });
                }
            }
        }
        self.phase = ManipPhase::Snapshotted;
        self.checkpoint()?;

        let mut builder =
            match TocBuilder::import(track_count as u8, disc.length_ms, &RawToc::new(sectors)) {
                Ok(builder) => builder,
                Err(err) => return self.fail(err.into()),
            };
        self.phase = ManipPhase::Built;
        self.checkpoint()?;

        if let Err(err) = self.apply_tracks(&mut builder, tracks) {
            return self.fail(err);
        }
        self.phase = ManipPhase::Mutated;

        let raw = match builder.export() {
            Ok(raw) => raw,
            Err(err) => return self.fail(err.into()),
        };

        // The irrecoverable step. From the first write until finalize
        // completes the medium holds a transitional TOC.
        if let Err(err) = self.write_back(&raw) {
            return self.fail(err);
        }
        self.phase = ManipPhase::Written;

        if let Err(source) = self
            .transport
            .finalize(self.config.finalize_reset, self.config.finalize_wait_seconds)
        {
            error!("finalize failed after a complete TOC write");
            return self.fail(ManipError::Finalize(source));
        }
        self.phase = ManipPhase::Finalized;
        info!(tracks = track_count, "TOC manipulation finalized");
        Ok(WrittenToc { raw })
    }

    /// Replay the caller's track list onto the builder, in strict
    /// ascending order.
    fn apply_tracks(&self, builder: &mut TocBuilder, tracks: &[TrackSpec]) -> Result<()> {
        builder.set_disc_title(&tracks[0].title)?;
        for (offset, spec) in tracks[1..].iter().enumerate() {
            let no = (offset + 1) as u8;
            builder.add_track(no, spec.length_ms, &spec.title)?;
            debug!(no, length_ms = spec.length_ms, "track placed");
        }
        Ok(())
    }

    fn write_back(&mut self, raw: &RawToc) -> Result<()> {
        warn!("entering TOC write window; run is no longer cancellable");
        for sector in 0..TOC_SECTORS {
            if let Err(source) = self
                .transport
                .write_sector(sector as u8, raw.sector(sector))
            {
                // Before the first sector lands the old TOC is still
                // fully in effect.
                if sector == 0 {
                    error!(sector, "TOC write failed before any sector landed");
                    return Err(ManipError::Write { sector: 0, source });
                }
                error!(
                    sector,
                    sectors_written = sector,
                    "TOC write failed mid-update; medium is in a transitional state"
                );
                return Err(ManipError::TransitionalWrite {
                    sectors_written: sector as u8,
                    sector: sector as u8,
                    source,
                });
            }
            debug!(sector, "TOC sector written");
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        let cancelled = self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        if cancelled {
            info!(phase = ?self.phase, "manipulation cancelled before writing");
            return self.fail(ManipError::Cancelled);
        }
        Ok(())
    }

    fn fail<U>(&mut self, err: ManipError) -> Result<U> {
        self.phase = ManipPhase::Failed;
        Err(err)
    }
}
