//! The TOC builder façade
//!
//! [`TocBuilder`] owns the whole in-memory TOC graph for the duration
//! of one manipulation: the part arena, the track map and both title
//! stores. It imports the three raw sectors, replays the splitting
//! pass that turns one contiguous Disc-At-Once recording into
//! individually titled tracks, and exports the rewritten sectors.
//!
//! The splitting cursor walks a list of [`DaoFragment`]s: on a blank
//! disc that list is one contiguous range, on a fragmented disc the
//! bulk recording already routes around occupied regions and each
//! `add_track` call links as many parts as it needs to follow the
//! same route.

use crate::address::{Address, ms_to_groups};
use crate::utoc::error::{Result, TocError};
use crate::utoc::part::{NULL_INDEX, PART_CAPACITY, PartIndex, PartTable};
use crate::utoc::sector::{
    PositionSector, RawToc, TABLE_SLOTS, TitleSector, empty_position_sector,
};
use crate::utoc::title::{TitleStore, validate_half_width};
use crate::utoc::track::{TrackMode, TrackTable};

/// First cluster of the recordable program area; everything before it
/// is lead-in and the TOC itself
pub const FIRST_RECORDABLE: Address = Address {
    cluster: 0x0032,
    sector: 0,
    group: 0,
};

/// Last recordable cluster of a standard blank used by
/// [`TocBuilder::blank`] (roughly a 74-minute disc)
pub const DEFAULT_LAST_CLUSTER: u16 = 0x087F;

/// One contiguous range of the bulk recording, used while a track is
/// split across a non-contiguous free region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaoFragment {
    /// First sound group (inclusive)
    pub start: Address,
    /// Last sound group (inclusive)
    pub end: Address,
}

impl DaoFragment {
    fn group_count(self) -> u32 {
        self.end.position() - self.start.position() + 1
    }
}

/// Splitting-cursor state seeded at import time
#[derive(Debug, Clone)]
struct DaoRegion {
    fragments: Vec<DaoFragment>,
    /// Fragment the cursor currently sits in
    frag_idx: usize,
    /// Groups already consumed within that fragment
    offset: u32,
    /// Groups of the recording not yet assigned to a track
    remaining: u32,
    /// Track count declared via the import hint; the final track
    /// consumes the measured remainder instead of its rounded length
    declared: u8,
}

/// In-memory TOC with import/mutate/export operations
#[derive(Debug, Clone)]
pub struct TocBuilder {
    parts: PartTable,
    tracks: TrackTable,
    titles: TitleStore,
    maker_code: u8,
    model_code: u8,
    disc_flags: u8,
    p_defect: PartIndex,
    free_area: PartIndex,
    dao: Option<DaoRegion>,
    last_added: u8,
}

impl TocBuilder {
    /// A formatted blank disc: empty track map, the whole program
    /// area on the recordable chain
    pub fn blank() -> Result<Self> {
        let mut parts = PartTable::new();
        let idx = parts.allocate()?;
        {
            let part = parts.get_mut(idx)?;
            part.start = FIRST_RECORDABLE;
            part.end = Address::new(DEFAULT_LAST_CLUSTER, 31, 10)?;
        }
        Ok(Self {
            parts,
            tracks: TrackTable::new(),
            titles: TitleStore::new(),
            maker_code: 0,
            model_code: 0,
            disc_flags: 0,
            p_defect: NULL_INDEX,
            free_area: idx,
            dao: None,
            last_added: 0,
        })
    }

    /// Parse the three raw sectors and seed the splitting cursor.
    ///
    /// `track_count_hint` and `length_ms_hint` describe the single
    /// bulk-transferred recording that is about to be split; they do
    /// not describe pre-existing tracks, which are parsed from the
    /// bytes themselves. Hints of zero yield an inspection-only
    /// builder with no splitting region.
    pub fn import(track_count_hint: u8, length_ms_hint: u32, raw: &RawToc) -> Result<Self> {
        let position = PositionSector::parse(raw.sector(0))?;
        let half = TitleSector::parse(1, raw.sector(1))?;
        let full = TitleSector::parse(2, raw.sector(2))?;

        let parts = PartTable::from_raw(&position.parts, position.p_empty)?;
        let tracks = TrackTable::from_raw(&position.track_map);
        let titles = TitleStore::from_sectors(&half, &full)?;

        let mut builder = Self {
            parts,
            tracks,
            titles,
            maker_code: position.maker_code,
            model_code: position.model_code,
            disc_flags: position.disc_flags,
            p_defect: PartIndex::from(position.p_defect),
            free_area: PartIndex::from(position.p_free),
            dao: None,
            last_added: 0,
        };
        builder.validate_chains()?;

        if track_count_hint > 0 && length_ms_hint > 0 {
            builder.seed_dao_region(track_count_hint, length_ms_hint)?;
        }
        Ok(builder)
    }

    /// Add the next track of the split. Must be called in strictly
    /// ascending order starting at track 1; any failure leaves the
    /// builder unchanged.
    pub fn add_track(&mut self, no: u8, length_ms: u32, title: &str) -> Result<()> {
        if self.last_added == u8::MAX {
            return Err(TocError::TooManyTracks {
                declared: u8::MAX,
                got: no,
            });
        }
        let expected = self.last_added + 1;
        if no != expected {
            return Err(TocError::OutOfOrder { expected, got: no });
        }
        let Some(dao) = &self.dao else {
            return Err(TocError::DiscFull {
                requested_groups: ms_to_groups(length_ms),
                available_groups: 0,
            });
        };
        if no > dao.declared {
            return Err(TocError::TooManyTracks {
                declared: dao.declared,
                got: no,
            });
        }

        // The final track consumes exactly what is left of the
        // recording; rounding the caller's estimate again would
        // accumulate drift across the batch.
        let groups = if no == dao.declared {
            dao.remaining
        } else {
            ms_to_groups(length_ms)
        };
        if groups == 0 || groups > dao.remaining {
            return Err(TocError::DiscFull {
                requested_groups: groups,
                available_groups: dao.remaining,
            });
        }

        validate_half_width(title)?;

        // Everything fallible happens before the first mutation.
        let spans = dao_spans(dao, groups)?;
        if self.parts.free_len() < spans.len() {
            return Err(TocError::PartsExhausted(PART_CAPACITY));
        }

        let mode = TrackMode::default().to_byte();
        let mut head = NULL_INDEX;
        let mut prev = NULL_INDEX;
        for &(start, end) in &spans {
            let idx = self.parts.allocate()?;
            {
                let part = self.parts.get_mut(idx)?;
                part.start = start;
                part.end = end;
                part.mode = mode;
            }
            if prev == NULL_INDEX {
                head = idx;
            } else {
                self.parts.link(prev, idx)?;
            }
            prev = idx;
        }
        self.tracks.set_head(no, head);
        self.titles.set(no, title, None)?;

        if let Some(dao) = self.dao.as_mut() {
            dao.advance(groups);
        }
        self.last_added = no;
        Ok(())
    }

    /// Set the disc's half-width title (slot 0)
    pub fn set_disc_title(&mut self, title: &str) -> Result<()> {
        self.titles.set(0, title, None)
    }

    /// Set both titles of a recorded track
    pub fn set_track_title(&mut self, no: u8, half: &str, full: Option<&str>) -> Result<()> {
        self.tracks.occupied_head(no)?;
        self.titles.set(no, half, full)
    }

    /// Set the encoding/protection mode on every part of a track
    pub fn set_track_mode(&mut self, no: u8, mode: TrackMode) -> Result<()> {
        let head = self.tracks.occupied_head(no)?;
        let chain = self.parts.collect_chain(head)?;
        for idx in chain {
            self.parts.get_mut(idx)?.mode = mode.to_byte();
        }
        Ok(())
    }

    /// Number of recorded tracks
    pub fn track_count(&self) -> u8 {
        self.tracks.last_track()
    }

    /// Disc title, empty when untitled
    pub fn disc_title(&self) -> &str {
        self.titles.half_width(0).unwrap_or("")
    }

    /// Half-width title of a track, empty when untitled
    pub fn track_title(&self, no: u8) -> Result<&str> {
        self.tracks.occupied_head(no)?;
        Ok(self.titles.half_width(no).unwrap_or(""))
    }

    /// First and last address of a track's audio extent
    pub fn track_extent(&self, no: u8) -> Result<(Address, Address)> {
        let head = self.tracks.occupied_head(no)?;
        let mut start = None;
        let mut end = Address::default();
        for item in self.parts.chain(head) {
            let (_, part) = item?;
            start.get_or_insert(part.start);
            end = part.end;
        }
        let start = start.ok_or(TocError::UnknownTrack(no))?;
        Ok((start, end))
    }

    /// Playback length of a track in milliseconds
    pub fn track_length_ms(&self, no: u8) -> Result<u32> {
        let head = self.tracks.occupied_head(no)?;
        Ok(crate::address::groups_to_ms(self.parts.chain_groups(head)?))
    }

    /// Mode of a track, read from its first part
    pub fn track_mode(&self, no: u8) -> Result<TrackMode> {
        let head = self.tracks.occupied_head(no)?;
        Ok(TrackMode::from_byte(self.parts.get(head)?.mode))
    }

    /// Human-readable diagnostic line for one track
    pub fn track_info(&self, no: u8) -> Result<String> {
        let (start, end) = self.track_extent(no)?;
        let head = self.tracks.occupied_head(no)?;
        let fragments = self.parts.collect_chain(head)?.len();
        Ok(format!(
            "track {no}: {}..{} ({} ms, {} part{}) \"{}\"",
            hex::encode(start.to_bytes()),
            hex::encode(end.to_bytes()),
            self.track_length_ms(no)?,
            fragments,
            if fragments == 1 { "" } else { "s" },
            self.track_title(no)?,
        ))
    }

    /// Human-readable aggregate diagnostic for the disc
    pub fn disc_info(&self) -> Result<String> {
        let count = self.track_count();
        let mut total_ms = 0u64;
        let mut lines = vec![format!("disc \"{}\": {count} tracks", self.disc_title())];
        for no in 1..=count {
            if self.tracks.head_of(no) == NULL_INDEX {
                continue;
            }
            total_ms += u64::from(self.track_length_ms(no)?);
            lines.push(self.track_info(no)?);
        }
        lines[0] = format!("{}, {total_ms} ms total", lines[0]);
        Ok(lines.join("\n"))
    }

    /// Serialize the TOC back into its three raw sectors
    pub fn export(&self) -> Result<RawToc> {
        let mut position = empty_position_sector();
        position.maker_code = self.maker_code;
        position.model_code = self.model_code;
        position.disc_flags = self.disc_flags;
        position.first_track = self.tracks.first_track();
        position.last_track = self.tracks.last_track();
        position.p_defect = self.p_defect as u8;
        position.p_free = self.free_area as u8;
        position.track_map = self.tracks.to_raw();
        let (raw_parts, p_empty) = self.parts.to_raw();
        position.parts = raw_parts;
        position.p_empty = p_empty;

        Ok(RawToc::new([
            position.build()?,
            self.titles.build_half_sector()?.build()?,
            self.titles.build_full_sector()?.build()?,
        ]))
    }

    /// Walk every occupied track chain and the recordable-area chain
    /// once, so cycles, dangling links and garbage address ranges
    /// fail at import instead of mid-mutation.
    fn validate_chains(&self) -> Result<()> {
        for slot in 1..TABLE_SLOTS {
            let head = self.tracks.head_of(slot as u8);
            if head == NULL_INDEX {
                continue;
            }
            self.validate_chain(head)?;
        }
        self.validate_chain(self.free_area)
    }

    fn validate_chain(&self, head: PartIndex) -> Result<()> {
        for item in self.parts.chain(head) {
            let (idx, part) = item?;
            part.start
                .validate()
                .and_then(|()| part.end.validate())
                .map_err(|source| TocError::InvalidPartRange { index: idx, source })?;
            if part.start.position() > part.end.position() {
                return Err(TocError::InvalidPartRange {
                    index: idx,
                    source: crate::address::AddressError::ReversedRange {
                        start: part.start.position(),
                        end: part.end.position(),
                    },
                });
            }
        }
        Ok(())
    }

    /// Locate the bulk recording and turn it into the fragment list
    /// the splitting cursor walks.
    fn seed_dao_region(&mut self, declared: u8, length_ms: u32) -> Result<()> {
        let total = ms_to_groups(length_ms);
        let fragments = if self.tracks.last_track() > 0 {
            self.reclaim_bulk_track(total)?
        } else {
            self.carve_free_prefix(total)?
        };
        let remaining = fragments.iter().map(|f| f.group_count()).sum::<u32>();
        self.dao = Some(DaoRegion {
            fragments,
            frag_idx: 0,
            offset: 0,
            remaining: remaining.min(total),
            declared,
        });
        Ok(())
    }

    /// The highest-numbered track on the disc is the freshly uploaded
    /// recording: its chain becomes the splitting region and its slot
    /// and titles are cleared, since the split replaces it.
    fn reclaim_bulk_track(&mut self, total: u32) -> Result<Vec<DaoFragment>> {
        let bulk = self.tracks.last_track();
        let head = self.tracks.clear(bulk);
        self.titles.clear(bulk);

        let chain = self.parts.collect_chain(head)?;
        let mut fragments = Vec::with_capacity(chain.len());
        for idx in chain {
            let part = *self.parts.get(idx)?;
            fragments.push(DaoFragment {
                start: part.start,
                end: part.end,
            });
            self.parts.release(idx)?;
        }

        // Surplus recording beyond the hint rejoins the recordable
        // area chain.
        let (kept, leftover) = trim_fragments(fragments, total)?;
        for frag in leftover.into_iter().rev() {
            let idx = self.parts.allocate()?;
            let free_area = self.free_area;
            let part = self.parts.get_mut(idx)?;
            part.start = frag.start;
            part.end = frag.end;
            part.next = free_area;
            self.free_area = idx;
        }
        Ok(kept)
    }

    /// On a trackless TOC the recording sits at the head of the
    /// recordable area: consume its prefix from the free-area chain.
    fn carve_free_prefix(&mut self, total: u32) -> Result<Vec<DaoFragment>> {
        let chain = self.parts.collect_chain(self.free_area)?;
        let mut fragments = Vec::new();
        let mut need = total;
        let mut new_head = NULL_INDEX;
        for idx in chain {
            if need == 0 {
                new_head = idx;
                break;
            }
            let part = *self.parts.get(idx)?;
            let len = part.group_count();
            if len <= need {
                fragments.push(DaoFragment {
                    start: part.start,
                    end: part.end,
                });
                need -= len;
                self.parts.release(idx)?;
            } else {
                fragments.push(DaoFragment {
                    start: part.start,
                    end: part.start.advance_groups(need - 1)?,
                });
                self.parts.get_mut(idx)?.start = part.start.advance_groups(need)?;
                new_head = idx;
                break;
            }
        }
        self.free_area = new_head;
        Ok(fragments)
    }
}

impl DaoRegion {
    fn advance(&mut self, mut groups: u32) {
        self.remaining -= groups;
        while groups > 0 {
            let frag_len = self.fragments[self.frag_idx].group_count();
            let avail = frag_len - self.offset;
            if avail == 0 {
                self.frag_idx += 1;
                self.offset = 0;
                continue;
            }
            let take = groups.min(avail);
            self.offset += take;
            groups -= take;
        }
    }
}

/// Compute the address spans a track of `need` groups will occupy,
/// without touching any state.
fn dao_spans(dao: &DaoRegion, mut need: u32) -> Result<Vec<(Address, Address)>> {
    let mut spans = Vec::new();
    let mut frag_idx = dao.frag_idx;
    let mut offset = dao.offset;
    while need > 0 {
        let frag = dao
            .fragments
            .get(frag_idx)
            .ok_or(TocError::DiscFull {
                requested_groups: need,
                available_groups: 0,
            })?;
        let avail = frag.group_count() - offset;
        if avail == 0 {
            frag_idx += 1;
            offset = 0;
            continue;
        }
        let take = need.min(avail);
        spans.push((
            frag.start.advance_groups(offset)?,
            frag.start.advance_groups(offset + take - 1)?,
        ));
        offset += take;
        need -= take;
    }
    Ok(spans)
}

/// Split a fragment list at `total` groups: the prefix stays the
/// splitting region, the suffix is returned for the free chain.
fn trim_fragments(
    fragments: Vec<DaoFragment>,
    total: u32,
) -> Result<(Vec<DaoFragment>, Vec<DaoFragment>)> {
    let mut kept = Vec::with_capacity(fragments.len());
    let mut leftover = Vec::new();
    let mut need = total;
    for frag in fragments {
        if need == 0 {
            leftover.push(frag);
            continue;
        }
        let len = frag.group_count();
        if len <= need {
            need -= len;
            kept.push(frag);
        } else {
            kept.push(DaoFragment {
                start: frag.start,
                end: frag.start.advance_groups(need - 1)?,
            });
            leftover.push(DaoFragment {
                start: frag.start.advance_groups(need)?,
                end: frag.end,
            });
            need = 0;
        }
    }
    Ok((kept, leftover))
}
