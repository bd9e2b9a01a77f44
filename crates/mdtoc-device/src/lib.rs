//! NetMD TOC manipulation protocol
//!
//! This crate drives the read-all → mutate-in-memory → write-all →
//! finalize protocol that rewrites a device's table of contents. The
//! four transport primitives (sector read/write, prepare, finalize)
//! are injected through the [`TocTransport`] trait; USB framing,
//! device discovery and audio transfer are other crates' business.
//!
//! The engine is deliberately synchronous: a device accepts exactly
//! one TOC edit at a time, and once the first sector write has been
//! issued the operation must run to completion. Callers with a UI run
//! the whole manipulation on a dedicated worker thread.

#![warn(missing_docs)]

pub mod error;
pub mod manip;
pub mod transport;

pub use error::{ManipError, Result};
pub use manip::{ManipConfig, ManipPhase, TocManip, TrackSpec, WrittenToc};
pub use transport::{TocTransport, TransportError};
