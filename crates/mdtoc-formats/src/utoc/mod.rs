//! User Table of Contents: sector layout, part arena and builder
//!
//! The UTOC is the mutable on-device index of track boundaries and
//! titles. This module provides symmetric parse/build support for its
//! three fixed 2352-byte sectors and the [`TocBuilder`] façade that
//! rewrites them, which is how a single contiguous Disc-At-Once
//! recording is split into separate tracks with no audio re-transfer.
//!
//! # Structure
//!
//! - [`sector`]: the raw binary layout of the three sectors
//! - [`part`]: the descriptor arena and index-linked fragment chains
//! - [`track`]: the track slot map and mode byte
//! - [`title`]: half-width and full-width title stores
//! - [`builder`]: import → mutate → export over all of the above

pub mod builder;
pub mod error;
pub mod part;
pub mod sector;
pub mod title;
pub mod track;

pub use builder::{DEFAULT_LAST_CLUSTER, DaoFragment, FIRST_RECORDABLE, TocBuilder};
pub use error::{Result, TocError};
pub use part::{NULL_INDEX, PART_CAPACITY, Part, PartIndex, PartTable};
pub use sector::{PositionSector, RawToc, SECTOR_LEN, TABLE_SLOTS, TOC_SECTORS, TitleSector};
pub use title::TitleStore;
pub use track::{Encoding, TrackMode, TrackTable};
