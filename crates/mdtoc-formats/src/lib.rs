//! MiniDisc UTOC sector layout, address codec and TOC builder
//!
//! This crate implements the on-device User Table of Contents (UTOC)
//! of a MiniDisc as a symmetric parser/builder pair, plus the address
//! arithmetic needed to split one contiguous Disc-At-Once recording
//! into individually titled tracks without re-transferring audio.
//!
//! # Layout
//!
//! - [`address`]: the 3-byte cluster/sector/sound-group codec and
//!   millisecond duration arithmetic
//! - [`utoc`]: the three 2352-byte TOC sectors, the part arena and
//!   track map, the title stores, and the [`utoc::TocBuilder`] façade
//!
//! # Design Principles
//!
//! - **Symmetric operations**: every sector that can be parsed can be
//!   rebuilt byte for byte
//! - **Round-trip guarantee**: `import(export(x))` preserves track
//!   count, titles, modes and address ranges
//! - **Typed failures**: malformed bytes, arena exhaustion and
//!   out-of-order mutation each surface as a distinct error variant,
//!   never as a silent fixup

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // Field widths are enforced before packing
#![allow(clippy::cast_lossless)]

pub mod address;
pub mod utoc;

pub use address::{Address, AddressError};
pub use utoc::{RawToc, TocBuilder, TocError, SECTOR_LEN, TOC_SECTORS};
