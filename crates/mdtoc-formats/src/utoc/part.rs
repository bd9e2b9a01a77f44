//! Part descriptor arena and index-linked chains
//!
//! The device format chains 8-byte part descriptors by a one-byte
//! link field. In memory that becomes a fixed arena indexed by
//! [`PartIndex`], with index 0 reserved as the chain terminator: no
//! raw pointers, and a corrupted link can at worst produce a cycle,
//! which the chain walker detects and reports instead of looping.

use crate::address::Address;
use crate::utoc::error::{Result, TocError};
use crate::utoc::sector::{RawPart, TABLE_SLOTS};

/// Index into the part arena
pub type PartIndex = u16;

/// Chain terminator; arena entry 0 is never allocated
pub const NULL_INDEX: PartIndex = 0;

/// Usable descriptors in the arena (entry 0 excluded)
pub const PART_CAPACITY: usize = TABLE_SLOTS - 1;

/// A contiguous address range plus its chain link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Part {
    /// First sound group of the range (inclusive)
    pub start: Address,
    /// Last sound group of the range (inclusive)
    pub end: Address,
    /// Raw track mode byte carried by the descriptor
    pub mode: u8,
    /// Next part in the chain, [`NULL_INDEX`] terminates
    pub next: PartIndex,
}

impl Part {
    /// Sound groups covered by this range
    pub fn group_count(&self) -> u32 {
        self.end.position() - self.start.position() + 1
    }
}

/// Fixed-capacity arena of part descriptors with a free chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTable {
    parts: Vec<Part>,
    free_head: PartIndex,
    free_count: usize,
}

impl PartTable {
    /// Arena with every descriptor on the free chain
    pub fn new() -> Self {
        let mut parts = vec![Part::default(); TABLE_SLOTS];
        for (idx, part) in parts.iter_mut().enumerate().skip(1) {
            part.next = if idx + 1 < TABLE_SLOTS {
                (idx + 1) as PartIndex
            } else {
                NULL_INDEX
            };
        }
        Self {
            parts,
            free_head: 1,
            free_count: PART_CAPACITY,
        }
    }

    /// Rebuild the arena from the descriptor table of sector 0.
    ///
    /// The free chain headed by `free_head` is walked up front so a
    /// corrupted link cycle in it is rejected at import time.
    pub fn from_raw(raw: &[RawPart; TABLE_SLOTS], free_head: u8) -> Result<Self> {
        let parts = raw
            .iter()
            .map(|p| Part {
                start: Address::from_bytes(p.start),
                end: Address::from_bytes(p.end),
                mode: p.mode,
                next: PartIndex::from(p.link),
            })
            .collect();
        let mut table = Self {
            parts,
            free_head: PartIndex::from(free_head),
            free_count: 0,
        };
        table.free_count = table.chain(table.free_head).count_checked()?;
        Ok(table)
    }

    /// Serialize back into the descriptor table plus its free head
    pub fn to_raw(&self) -> ([RawPart; TABLE_SLOTS], u8) {
        let mut raw = [RawPart::default(); TABLE_SLOTS];
        for (slot, part) in raw.iter_mut().zip(&self.parts) {
            *slot = RawPart {
                start: part.start.to_bytes(),
                mode: part.mode,
                end: part.end.to_bytes(),
                link: part.next as u8,
            };
        }
        (raw, self.free_head as u8)
    }

    /// Borrow a descriptor, rejecting the null index and out-of-range
    /// links from corrupted imports
    pub fn get(&self, idx: PartIndex) -> Result<&Part> {
        if idx == NULL_INDEX || usize::from(idx) >= TABLE_SLOTS {
            return Err(TocError::LinkOutOfRange(idx));
        }
        Ok(&self.parts[usize::from(idx)])
    }

    /// Mutably borrow a descriptor
    pub fn get_mut(&mut self, idx: PartIndex) -> Result<&mut Part> {
        if idx == NULL_INDEX || usize::from(idx) >= TABLE_SLOTS {
            return Err(TocError::LinkOutOfRange(idx));
        }
        Ok(&mut self.parts[usize::from(idx)])
    }

    /// Pop the head of the free chain.
    ///
    /// The arena is a real device ceiling: when it is empty the disc
    /// cannot hold another fragment, so this fails rather than grows.
    pub fn allocate(&mut self) -> Result<PartIndex> {
        if self.free_head == NULL_INDEX {
            return Err(TocError::PartsExhausted(PART_CAPACITY));
        }
        let idx = self.free_head;
        let next = self.get(idx)?.next;
        *self.get_mut(idx)? = Part::default();
        self.free_head = next;
        self.free_count -= 1;
        Ok(idx)
    }

    /// Push a descriptor back onto the free chain head, zeroing its
    /// range for debuggability
    pub fn release(&mut self, idx: PartIndex) -> Result<()> {
        let free_head = self.free_head;
        let part = self.get_mut(idx)?;
        *part = Part {
            next: free_head,
            ..Part::default()
        };
        self.free_head = idx;
        self.free_count += 1;
        Ok(())
    }

    /// Point `prev`'s link at `next`
    pub fn link(&mut self, prev: PartIndex, next: PartIndex) -> Result<()> {
        self.get_mut(prev)?.next = next;
        Ok(())
    }

    /// Descriptors currently on the free chain
    pub fn free_len(&self) -> usize {
        self.free_count
    }

    /// Head of the free chain (for serialization)
    pub fn free_head(&self) -> PartIndex {
        self.free_head
    }

    /// Lazily walk a chain from `head` until [`NULL_INDEX`].
    ///
    /// The walker yields an error instead of iterating forever when a
    /// chain is longer than the arena, which only a link cycle can
    /// cause; a legitimate device TOC is always acyclic.
    pub fn chain(&self, head: PartIndex) -> PartChain<'_> {
        PartChain {
            table: self,
            cursor: head,
            head,
            steps: 0,
            poisoned: false,
        }
    }

    /// Collect a chain into part indices, failing on cycles or
    /// dangling links
    pub fn collect_chain(&self, head: PartIndex) -> Result<Vec<PartIndex>> {
        self.chain(head).map(|item| Ok(item?.0)).collect()
    }

    /// Total sound groups covered by a chain
    pub fn chain_groups(&self, head: PartIndex) -> Result<u32> {
        let mut total = 0u32;
        for item in self.chain(head) {
            let (_, part) = item?;
            total += part.group_count();
        }
        Ok(total)
    }
}

impl Default for PartTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy, finite, non-restartable chain walker
pub struct PartChain<'a> {
    table: &'a PartTable,
    cursor: PartIndex,
    head: PartIndex,
    steps: usize,
    poisoned: bool,
}

impl PartChain<'_> {
    /// Count chain entries, surfacing any walk error
    pub fn count_checked(mut self) -> Result<usize> {
        let mut count = 0;
        for item in &mut self {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

impl<'a> Iterator for PartChain<'a> {
    type Item = Result<(PartIndex, &'a Part)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned || self.cursor == NULL_INDEX {
            return None;
        }
        if self.steps >= TABLE_SLOTS {
            self.poisoned = true;
            return Some(Err(TocError::CycleDetected {
                head: self.head,
                limit: PART_CAPACITY,
            }));
        }
        let idx = self.cursor;
        match self.table.get(idx) {
            Ok(part) => {
                self.cursor = part.next;
                self.steps += 1;
                Some(Ok((idx, part)))
            }
            Err(err) => {
                self.poisoned = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_arena_has_full_free_chain() {
        let table = PartTable::new();
        assert_eq!(table.free_len(), PART_CAPACITY);
        assert_eq!(
            table.collect_chain(table.free_head()).expect("acyclic").len(),
            PART_CAPACITY
        );
    }

    #[test]
    fn test_allocate_pops_and_release_pushes() {
        let mut table = PartTable::new();
        let a = table.allocate().expect("free parts remain");
        let b = table.allocate().expect("free parts remain");
        assert_ne!(a, b);
        assert_eq!(table.free_len(), PART_CAPACITY - 2);

        table.release(a).expect("valid index");
        assert_eq!(table.free_head(), a);
        assert_eq!(table.free_len(), PART_CAPACITY - 1);
    }

    #[test]
    fn test_release_zeroes_the_range() {
        let mut table = PartTable::new();
        let idx = table.allocate().expect("free parts remain");
        {
            let part = table.get_mut(idx).expect("valid index");
            part.start = Address::new(10, 0, 0).expect("valid");
            part.end = Address::new(11, 0, 0).expect("valid");
            part.mode = 0x02;
        }
        table.release(idx).expect("valid index");
        let part = table.get(idx).expect("valid index");
        assert_eq!(part.start, Address::default());
        assert_eq!(part.end, Address::default());
        assert_eq!(part.mode, 0);
    }

    #[test]
    fn test_exhausting_the_arena_is_a_capacity_error() {
        let mut table = PartTable::new();
        for _ in 0..PART_CAPACITY {
            table.allocate().expect("free parts remain");
        }
        assert!(matches!(
            table.allocate(),
            Err(TocError::PartsExhausted(PART_CAPACITY))
        ));
    }

    #[test]
    fn test_null_index_is_never_addressable() {
        let table = PartTable::new();
        assert!(matches!(table.get(0), Err(TocError::LinkOutOfRange(0))));
    }

    #[test]
    fn test_chain_walk_follows_links_in_order() {
        let mut table = PartTable::new();
        let a = table.allocate().expect("free parts remain");
        let b = table.allocate().expect("free parts remain");
        let c = table.allocate().expect("free parts remain");
        table.link(a, b).expect("valid");
        table.link(b, c).expect("valid");
        let walked = table.collect_chain(a).expect("acyclic");
        assert_eq!(walked, vec![a, b, c]);
    }

    #[test]
    fn test_link_cycle_is_detected_not_looped() {
        let mut table = PartTable::new();
        let a = table.allocate().expect("free parts remain");
        let b = table.allocate().expect("free parts remain");
        table.link(a, b).expect("valid");
        table.link(b, a).expect("valid");
        let err = table.collect_chain(a).expect_err("cycle");
        assert!(matches!(err, TocError::CycleDetected { .. }));
    }

    #[test]
    fn test_corrupted_free_chain_rejected_at_import() {
        let table = PartTable::new();
        let (mut raw, free_head) = table.to_raw();
        // Bend the tail of the free chain back to its head.
        raw[TABLE_SLOTS - 1].link = free_head;
        let err = PartTable::from_raw(&raw, free_head).expect_err("cycle");
        assert!(matches!(err, TocError::CycleDetected { .. }));
    }

    #[test]
    fn test_raw_round_trip_preserves_chains() {
        let mut table = PartTable::new();
        let a = table.allocate().expect("free parts remain");
        let b = table.allocate().expect("free parts remain");
        {
            let part = table.get_mut(a).expect("valid");
            part.start = Address::new(50, 0, 0).expect("valid");
            part.end = Address::new(60, 3, 7).expect("valid");
            part.mode = 0x01;
        }
        table.link(a, b).expect("valid");
        let (raw, free_head) = table.to_raw();
        let rebuilt = PartTable::from_raw(&raw, free_head).expect("parses");
        assert_eq!(rebuilt, table);
    }
}
