/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/
//! Decoded sectors and the per-track table they are merged into.
//!
//! A [`SectorTable`] is the long-lived state for one physical track. Every decode attempt, whether
//! over another revolution of the same capture or over a new capture, merges its sectors into the
//! table. A stored sector is only ever replaced by a strictly better one, so the validity of any
//! sector in the table never decreases.

use crate::types::{chs::DiskChsn, flags::SectorStatus};
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

/// The identifying fields of a sector header: cylinder, head, sector id and size code.
pub type SectorId = DiskChsn;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sector {
    pub id: SectorId,
    pub data: Vec<u8>,
    pub status: SectorStatus,
    /// The bit offset of the sector's address mark in the track it was decoded from.
    pub bit_offset: Option<usize>,
}

impl Sector {
    pub fn new(id: SectorId, data: Vec<u8>, status: SectorStatus) -> Self {
        Sector {
            id,
            data,
            status,
            bit_offset: None,
        }
    }

    pub fn with_bit_offset(mut self, offset: usize) -> Self {
        self.bit_offset = Some(offset);
        self
    }

    pub fn data_valid(&self) -> bool {
        self.status.data_valid()
    }

    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }

    pub fn is_deleted(&self) -> bool {
        self.status.contains(SectorStatus::DELETED)
    }
}

impl Display for Sector {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} bytes [{}{}{}]",
            self.id,
            self.data.len(),
            if self.status.header_valid() { "H" } else { "-" },
            if self.status.data_valid() { "D" } else { "-" },
            if self.is_deleted() { "X" } else { "" }
        )
    }
}

/// The result of merging a sector into a [`SectorTable`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No sector with this id was stored; the incoming sector was added.
    Inserted,
    /// The stored sector had invalid data and the incoming sector's data is valid.
    Replaced,
    /// The stored sector was at least as good as the incoming one and was kept.
    Kept,
}

/// The sectors decoded so far for one track, keyed by sector id.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorTable {
    sectors: BTreeMap<u8, Sector>,
}

impl SectorTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Merge `sector` into the table.
    pub fn merge(&mut self, sector: Sector) -> MergeOutcome {
        let id = sector.id.s();
        match self.sectors.get_mut(&id) {
            None => {
                log::trace!("SectorTable::merge(): Inserting {}", sector);
                self.sectors.insert(id, sector);
                MergeOutcome::Inserted
            }
            Some(stored) if !stored.data_valid() && sector.data_valid() => {
                log::trace!("SectorTable::merge(): Replacing {} with {}", stored, sector);
                *stored = sector;
                MergeOutcome::Replaced
            }
            Some(_) => MergeOutcome::Kept,
        }
    }

    /// Store `sector` unconditionally, returning the sector it replaced.
    pub fn insert(&mut self, sector: Sector) -> Option<Sector> {
        self.sectors.insert(sector.id.s(), sector)
    }

    /// Return true if a sector with id `id` is stored with valid data.
    pub fn has_sector(&self, id: u8) -> bool {
        self.sectors.get(&id).is_some_and(|s| s.data_valid())
    }

    pub fn get(&self, id: u8) -> Option<&Sector> {
        self.sectors.get(&id)
    }

    /// Iterate over stored sectors in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.values()
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Return the number of stored sectors with valid data.
    pub fn nr_valid(&self) -> usize {
        self.sectors.values().filter(|s| s.data_valid()).count()
    }

    pub fn clear(&mut self) {
        self.sectors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector(r: u8, status: SectorStatus, fill: u8) -> Sector {
        Sector::new(DiskChsn::new(0, 0, r, 2), vec![fill; 512], status)
    }

    #[test]
    fn test_merge_upgrades_never_downgrades() {
        let mut table = SectorTable::new();
        let header_only = SectorStatus::HEADER_VALID;
        let good = SectorStatus::HEADER_VALID | SectorStatus::DATA_VALID;

        // Pass 1: valid header, corrupt data.
        assert_eq!(table.merge(sector(3, header_only, 0x11)), MergeOutcome::Inserted);
        assert!(!table.has_sector(3));

        // Pass 2: fully valid.
        assert_eq!(table.merge(sector(3, good, 0x22)), MergeOutcome::Replaced);
        assert!(table.has_sector(3));

        // Pass 3: corrupt again. The stored sector must not revert.
        assert_eq!(table.merge(sector(3, header_only, 0x33)), MergeOutcome::Kept);
        assert!(table.has_sector(3));
        assert_eq!(table.get(3).unwrap().data[0], 0x22);
    }

    #[test]
    fn test_merge_keeps_first_valid() {
        let mut table = SectorTable::new();
        let good = SectorStatus::HEADER_VALID | SectorStatus::DATA_VALID;
        table.merge(sector(1, good, 0xAA));
        assert_eq!(table.merge(sector(1, good, 0xBB)), MergeOutcome::Kept);
        assert_eq!(table.get(1).unwrap().data[0], 0xAA);
    }

    #[test]
    fn test_iteration_order() {
        let mut table = SectorTable::new();
        for r in [5, 1, 3] {
            table.merge(sector(r, SectorStatus::HEADER_VALID | SectorStatus::DATA_VALID, r));
        }
        let ids: Vec<u8> = table.iter().map(|s| s.id.s()).collect();
        assert_eq!(ids, vec![1, 3, 5]);
        assert_eq!(table.nr_valid(), 3);
    }
}
