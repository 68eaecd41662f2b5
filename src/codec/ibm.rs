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
//! The IBM System 34 track codec, covering the PC family of FM and MFM formats.
//!
//! A track begins with an optional Index Address Mark (IAM). Each sector then consists of an ID
//! Address Mark (IDAM) followed by the sector's cylinder, head, id and size code and a CRC, and a
//! Data Address Mark (DAM, or DDAM for deleted data) followed by the sector data and a CRC.
//!
//! In MFM, each mark is preceded by three A1 sync bytes written with a missing clock (0x4489).
//! In FM, the mark byte itself is written with a non-standard clock pattern.

use crate::{
    codec::encoding::{decode_bytes, BitWriter},
    flux::{
        pll::{Pll, PllParams},
        timing::FluxTiming,
        FluxSource,
    },
    sector::{MergeOutcome, Sector, SectorTable},
    track::master::MasterTrack,
    types::{
        chs::{DiskCh, DiskChsn},
        enums::{DiskDataRate, DiskRpm, TrackDataEncoding},
        flags::SectorStatus,
    },
    util::crc_ibm_3740,
    FluxError,
};
use bit_vec::BitVec;
use std::fmt::{self, Display, Formatter};

/// A DAM must begin within this many bytes of the end of its IDAM to be associated with it.
pub const IDAM_DAM_WINDOW: usize = 80;

pub const MFM_GAP_BYTE: u8 = 0x4E;
pub const FM_GAP_BYTE: u8 = 0xFF;
pub const SYNC_BYTE: u8 = 0x00;
/// Filler written to sectors that have no data, as a FORMAT command would.
pub const FORMAT_FILL_BYTE: u8 = 0xF6;

pub const MFM_SYNC_WORD: u16 = 0x4489;
pub const MFM_IAM_SYNC_WORD: u16 = 0x5224;
pub const MFM_IAM_MARKER: u64 = 0x5224_5224_5224_5552;
pub const MFM_MARKER_MASK: u64 = 0xFFFF_FFFF_FFFF_0000;
pub const MFM_ANY_MARKER: u64 = 0x4489_4489_4489_0000;
pub const FM_SYNC_WORD: u64 = 0xAAAA_0000;
pub const FM_MARKER_MASK: u64 = 0xFFFF_0000;

const MFM_SYNC_BYTES: [u8; 3] = [0xA1, 0xA1, 0xA1];

/// The address marks of an IBM track.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IbmMarker {
    Iam,
    Idam,
    Dam,
    Ddam,
}

impl IbmMarker {
    /// The decoded mark byte.
    pub fn byte(&self) -> u8 {
        match self {
            IbmMarker::Iam => 0xFC,
            IbmMarker::Idam => 0xFE,
            IbmMarker::Dam => 0xFB,
            IbmMarker::Ddam => 0xF8,
        }
    }

    /// The raw bitcells of the mark byte, including its clock pattern.
    pub fn raw(&self, encoding: TrackDataEncoding) -> u16 {
        match (encoding, self) {
            (TrackDataEncoding::Fm, IbmMarker::Iam) => 0xF77A,
            (TrackDataEncoding::Fm, IbmMarker::Idam) => 0xF57E,
            (TrackDataEncoding::Fm, IbmMarker::Dam) => 0xF56F,
            (TrackDataEncoding::Fm, IbmMarker::Ddam) => 0xF56A,
            (_, IbmMarker::Iam) => 0x5552,
            (_, IbmMarker::Idam) => 0x5554,
            (_, IbmMarker::Dam) => 0x5545,
            (_, IbmMarker::Ddam) => 0x554A,
        }
    }

    fn from_raw(encoding: TrackDataEncoding, raw: u16) -> Option<IbmMarker> {
        [IbmMarker::Idam, IbmMarker::Dam, IbmMarker::Ddam, IbmMarker::Iam]
            .into_iter()
            .find(|m| m.raw(encoding) == raw)
    }

    /// The bytes covered by the CRC of the field this mark introduces, up to and including the
    /// mark itself.
    fn crc_prefix(&self, encoding: TrackDataEncoding) -> Vec<u8> {
        match encoding {
            TrackDataEncoding::Fm => vec![self.byte()],
            _ => {
                let mut prefix = MFM_SYNC_BYTES.to_vec();
                prefix.push(self.byte());
                prefix
            }
        }
    }

    fn is_data(&self) -> bool {
        matches!(self, IbmMarker::Dam | IbmMarker::Ddam)
    }
}

/// The physical layout of an IBM track: encoding, timing, sector list and gap lengths.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IbmTrackLayout {
    pub encoding: TrackDataEncoding,
    pub data_rate: DiskDataRate,
    pub rpm: DiskRpm,
    pub sector_ct: u8,
    pub first_id: u8,
    pub size_code: u8,
    pub interleave: u8,
    pub iam: bool,
    pub gap4a: usize,
    pub gap1: usize,
    pub gap2: usize,
    pub gap3: usize,
    pub sync_len: usize,
}

impl IbmTrackLayout {
    /// Create a layout with the standard IBM gaps for `encoding`, and no sectors.
    pub fn new(encoding: TrackDataEncoding, data_rate: DiskDataRate, rpm: DiskRpm) -> Self {
        let (gap4a, gap1, gap2, gap3, sync_len) = match encoding {
            TrackDataEncoding::Fm => (40, 26, 11, 27, 6),
            _ => (80, 50, 22, 84, 12),
        };
        IbmTrackLayout {
            encoding,
            data_rate,
            rpm,
            sector_ct: 0,
            first_id: 1,
            size_code: 2,
            interleave: 1,
            iam: true,
            gap4a,
            gap1,
            gap2,
            gap3,
            sync_len,
        }
    }

    pub fn with_sectors(mut self, sector_ct: u8, size_code: u8) -> Self {
        self.sector_ct = sector_ct;
        self.size_code = size_code;
        self
    }

    pub fn with_first_id(mut self, first_id: u8) -> Self {
        self.first_id = first_id;
        self
    }

    pub fn with_interleave(mut self, interleave: u8) -> Self {
        self.interleave = interleave.max(1);
        self
    }

    pub fn with_gap3(mut self, gap3: usize) -> Self {
        self.gap3 = gap3;
        self
    }

    pub fn with_iam(mut self, iam: bool) -> Self {
        self.iam = iam;
        self
    }

    /// Return the sector ids of the layout in ascending order.
    pub fn sector_ids(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.sector_ct).map(|i| self.first_id.wrapping_add(i))
    }

    /// Return the sector ids in the physical order they are written around the track.
    pub fn interleaved_ids(&self) -> Vec<u8> {
        let n = self.sector_ct as usize;
        let mut slots: Vec<Option<u8>> = vec![None; n];
        let mut pos = 0;
        for id in self.sector_ids() {
            while slots[pos].is_some() {
                pos = (pos + 1) % n;
            }
            slots[pos] = Some(id);
            pos = (pos + self.interleave as usize) % n;
        }
        slots.into_iter().flatten().collect()
    }

    pub fn sector_size(&self) -> usize {
        DiskChsn::n_to_bytes(self.size_code)
    }

    /// Return the nominal bitcell period in seconds.
    pub fn bitcell_period(&self) -> f64 {
        self.data_rate.bitcell_period()
    }

    /// Return the number of bitcells in one revolution.
    pub fn track_bitcells(&self) -> usize {
        (self.rpm.index_time() / self.bitcell_period()).round() as usize
    }

    fn gap_byte(&self) -> u8 {
        match self.encoding {
            TrackDataEncoding::Fm => FM_GAP_BYTE,
            _ => MFM_GAP_BYTE,
        }
    }
}

/// Diagnostics gathered while decoding a track.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodeReport {
    /// Number of IDAMs found with a valid header CRC.
    pub headers: usize,
    pub bad_headers: usize,
    /// Headers with no data mark within [`IDAM_DAM_WINDOW`].
    pub missing_data: usize,
    pub bad_data: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub kept: usize,
    /// Sectors whose header names a different cylinder or head.
    pub foreign: Vec<DiskChsn>,
    /// Sectors whose id is not part of the track layout.
    pub unexpected: Vec<DiskChsn>,
    /// Number of PLL configurations run, when decoding flux.
    pub plls_tried: usize,
    /// Number of revolutions recovered, when decoding flux.
    pub revolutions: usize,
}

impl DecodeReport {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Replaced => self.replaced += 1,
            MergeOutcome::Kept => self.kept += 1,
        }
    }

    /// Accumulate the counts of another report into this one.
    pub fn absorb(&mut self, other: DecodeReport) {
        self.headers += other.headers;
        self.bad_headers += other.bad_headers;
        self.missing_data += other.missing_data;
        self.bad_data += other.bad_data;
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.kept += other.kept;
        self.foreign.extend(other.foreign);
        self.unexpected.extend(other.unexpected);
        self.plls_tried += other.plls_tried;
        self.revolutions += other.revolutions;
    }
}

impl Display for DecodeReport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "headers: {} (bad: {}) missing data: {} bad data: {} inserted: {} replaced: {} kept: {} foreign: {} unexpected: {}",
            self.headers,
            self.bad_headers,
            self.missing_data,
            self.bad_data,
            self.inserted,
            self.replaced,
            self.kept,
            self.foreign.len(),
            self.unexpected.len()
        )
    }
}

/// A decoded or to-be-encoded IBM track.
#[derive(Clone, Debug)]
pub struct IbmTrack {
    ch: DiskCh,
    layout: IbmTrackLayout,
    sectors: SectorTable,
}

impl IbmTrack {
    pub fn new(ch: DiskCh, layout: IbmTrackLayout) -> Self {
        IbmTrack {
            ch,
            layout,
            sectors: SectorTable::new(),
        }
    }

    pub fn ch(&self) -> DiskCh {
        self.ch
    }

    pub fn layout(&self) -> &IbmTrackLayout {
        &self.layout
    }

    pub fn sectors(&self) -> &SectorTable {
        &self.sectors
    }

    /// Return true if sector `id` has been decoded with valid data.
    pub fn has_sector(&self, id: u8) -> bool {
        self.sectors.has_sector(id)
    }

    /// Return the number of layout sectors not yet decoded with valid data.
    pub fn nr_missing(&self) -> usize {
        self.layout.sector_ids().filter(|id| !self.sectors.has_sector(*id)).count()
    }

    /// Scan a bitcell stream for address marks, returning each mark with the bit offset of the
    /// first cell following it.
    pub fn scan_markers(&self, bits: &BitVec) -> Vec<(IbmMarker, usize)> {
        let encoding = self.layout.encoding;
        let mut markers = Vec::new();
        let mut shift_reg: u64 = 0;

        for (i, bit) in bits.iter().enumerate() {
            shift_reg = shift_reg << 1 | bit as u64;
            if i < 31 {
                continue;
            }
            let found = match encoding {
                TrackDataEncoding::Fm if shift_reg & FM_MARKER_MASK == FM_SYNC_WORD => {
                    IbmMarker::from_raw(encoding, shift_reg as u16)
                }
                TrackDataEncoding::Mfm if i >= 63 && shift_reg & MFM_MARKER_MASK == MFM_ANY_MARKER => {
                    IbmMarker::from_raw(encoding, shift_reg as u16).filter(|m| *m != IbmMarker::Iam)
                }
                TrackDataEncoding::Mfm if i >= 63 && shift_reg == MFM_IAM_MARKER => Some(IbmMarker::Iam),
                _ => None,
            };
            if let Some(marker) = found {
                log::trace!("IbmTrack::scan_markers(): {:?} at bit {}", marker, i + 1);
                markers.push((marker, i + 1));
            }
        }
        markers
    }

    /// Decode a single pass over a bitcell stream, merging any sectors found into the sector table.
    pub fn decode_bits(&mut self, bits: &BitVec) -> DecodeReport {
        let encoding = self.layout.encoding;
        let markers = self.scan_markers(bits);
        let mut report = DecodeReport::default();

        for (mi, (marker, offset)) in markers.iter().enumerate() {
            if *marker != IbmMarker::Idam {
                continue;
            }

            // Cylinder, head, id, size code and CRC.
            let header = match decode_bytes(bits, *offset, 6) {
                Some(header) => header,
                None => continue,
            };
            let mut crc_data = IbmMarker::Idam.crc_prefix(encoding);
            crc_data.extend_from_slice(&header);
            if crc_ibm_3740(&crc_data, None) != 0 {
                log::trace!("IbmTrack::decode_bits(): Bad header CRC at bit {}", offset);
                report.bad_headers += 1;
                continue;
            }
            report.headers += 1;

            let id = DiskChsn::new(header[0] as u16, header[1], header[2], header[3]);
            if !id.matches_ch(self.ch) {
                log::warn!(
                    "IbmTrack::decode_bits(): Discarding sector {} from foreign track (expected {})",
                    id,
                    self.ch
                );
                report.foreign.push(id);
                continue;
            }
            if !self.layout.sector_ids().any(|s| s == id.s()) {
                log::warn!("IbmTrack::decode_bits(): Discarding unexpected sector {}", id);
                report.unexpected.push(id);
                continue;
            }

            let header_end = offset + 6 * 16;
            let window_end = header_end + IDAM_DAM_WINDOW * 16;
            let data_mark = markers
                .get(mi + 1)
                .filter(|(m, o)| m.is_data() && *o <= window_end);

            let sector = match data_mark {
                Some((dam, data_offset)) => {
                    let size = id.n_size();
                    match decode_bytes(bits, *data_offset, size + 2) {
                        Some(mut data) => {
                            let mut crc_data = dam.crc_prefix(encoding);
                            crc_data.extend_from_slice(&data);
                            let mut status = SectorStatus::HEADER_VALID;
                            if crc_ibm_3740(&crc_data, None) == 0 {
                                status |= SectorStatus::DATA_VALID;
                            }
                            else {
                                report.bad_data += 1;
                            }
                            if *dam == IbmMarker::Ddam {
                                status |= SectorStatus::DELETED;
                            }
                            data.truncate(size);
                            Sector::new(id, data, status)
                        }
                        None => {
                            report.missing_data += 1;
                            Sector::new(id, Vec::new(), SectorStatus::HEADER_VALID | SectorStatus::NO_DATA)
                        }
                    }
                }
                None => {
                    report.missing_data += 1;
                    Sector::new(id, Vec::new(), SectorStatus::HEADER_VALID | SectorStatus::NO_DATA)
                }
            };

            let outcome = self.sectors.merge(sector.with_bit_offset(*offset));
            report.record(outcome);
        }

        log::debug!(
            "IbmTrack::decode_bits(): {} {} markers, {}. Missing: {}",
            self.ch,
            markers.len(),
            report,
            self.nr_missing()
        );
        report
    }

    /// Recover bitcells from `flux` with each PLL configuration in turn, decoding every pass into
    /// the sector table, until no sectors are missing or the configurations are exhausted. An empty
    /// list uses the default configuration.
    pub fn decode_flux(&mut self, flux: &FluxTiming, plls: &[PllParams]) -> Result<DecodeReport, FluxError> {
        let mut flux = flux.clone();
        flux.cue_at_index()?;

        let default = [PllParams::default()];
        let plls = if plls.is_empty() { &default[..] } else { plls };

        let mut report = DecodeReport::default();
        for params in plls {
            let pll = Pll::new(params.clone(), self.layout.bitcell_period())?;
            let track = pll.decode(&flux);
            let mut pass = self.decode_bits(track.bits());
            pass.plls_tried = 1;
            pass.revolutions = track.revolution_count();
            report.absorb(pass);

            if self.nr_missing() == 0 {
                break;
            }
            log::debug!(
                "IbmTrack::decode_flux(): {} sectors missing after PLL {}",
                self.nr_missing(),
                params
            );
        }
        Ok(report)
    }

    /// Return the data of the layout's sectors in id order. Sectors without valid data are
    /// returned zero-filled.
    pub fn get_img_track(&self) -> Vec<u8> {
        let size = self.layout.sector_size();
        let mut out = Vec::with_capacity(size * self.layout.sector_ct as usize);
        for id in self.layout.sector_ids() {
            match self.sectors.get(id) {
                Some(sector) if sector.data_valid() => {
                    let mut data = sector.data.clone();
                    data.resize(size, 0);
                    out.extend_from_slice(&data);
                }
                _ => out.resize(out.len() + size, 0),
            }
        }
        out
    }

    /// Set the data of the layout's sectors, in id order, from a sector image. Returns the number
    /// of bytes consumed. A short image leaves the remaining sectors untouched.
    pub fn set_img_track(&mut self, img: &[u8]) -> usize {
        let size = self.layout.sector_size();
        let mut table = SectorTable::new();
        let mut consumed = 0;
        for id in self.layout.sector_ids() {
            let chsn = DiskChsn::new(self.ch.c(), self.ch.h(), id, self.layout.size_code);
            match img.get(consumed..consumed + size) {
                Some(data) => {
                    table.merge(Sector::new(
                        chsn,
                        data.to_vec(),
                        SectorStatus::HEADER_VALID | SectorStatus::DATA_VALID,
                    ));
                    consumed += size;
                }
                None => {
                    if let Some(existing) = self.sectors.get(id) {
                        table.merge(existing.clone());
                    }
                }
            }
        }
        self.sectors = table;
        consumed
    }

    /// Replace the data of sector `id`, which must be part of the layout.
    pub fn write_sector(&mut self, id: u8, data: &[u8], deleted: bool) -> Result<(), FluxError> {
        if !self.layout.sector_ids().any(|s| s == id) {
            return Err(FluxError::ParameterError(format!("sector {} is not part of the track layout", id)));
        }
        let mut data = data.to_vec();
        data.resize(self.layout.sector_size(), 0);

        let mut status = SectorStatus::HEADER_VALID | SectorStatus::DATA_VALID;
        if deleted {
            status |= SectorStatus::DELETED;
        }
        let chsn = DiskChsn::new(self.ch.c(), self.ch.h(), id, self.layout.size_code);
        self.sectors.insert(Sector::new(chsn, data, status));
        Ok(())
    }

    /// Encode the track as a fully formatted [`MasterTrack`], with gaps, sync fields and address
    /// marks. Sectors without data are written with the format filler byte.
    pub fn master_track(&self) -> Result<MasterTrack, FluxError> {
        let layout = &self.layout;
        let encoding = layout.encoding;
        if matches!(encoding, TrackDataEncoding::Gcr) {
            return Err(FluxError::ParameterError("IBM tracks cannot be GCR encoded".into()));
        }

        let track_bitcells = layout.track_bitcells();
        let gap_byte = layout.gap_byte();
        let mut w = BitWriter::new(encoding, track_bitcells);

        let write_mark = |w: &mut BitWriter, marker: IbmMarker| {
            w.push_repeat(SYNC_BYTE, layout.sync_len);
            match encoding {
                TrackDataEncoding::Fm => w.push_raw(marker.raw(encoding)),
                _ => {
                    let sync = match marker {
                        IbmMarker::Iam => MFM_IAM_SYNC_WORD,
                        _ => MFM_SYNC_WORD,
                    };
                    for _ in 0..3 {
                        w.push_raw(sync);
                    }
                    w.push_raw(marker.raw(encoding));
                }
            }
        };

        w.push_repeat(gap_byte, layout.gap4a);
        if layout.iam {
            write_mark(&mut w, IbmMarker::Iam);
            w.push_repeat(gap_byte, layout.gap1);
        }

        for id in layout.interleaved_ids() {
            let chsn = DiskChsn::new(self.ch.c(), self.ch.h(), id, layout.size_code);
            let size = chsn.n_size();

            write_mark(&mut w, IbmMarker::Idam);
            let mut field = IbmMarker::Idam.crc_prefix(encoding);
            field.extend_from_slice(&chsn.to_header_bytes());
            let crc = crc_ibm_3740(&field, None);
            w.push_bytes(&chsn.to_header_bytes());
            w.push_bytes(&crc.to_be_bytes());
            w.push_repeat(gap_byte, layout.gap2);

            let (marker, mut data) = match self.sectors.get(id) {
                Some(sector) if sector.data_valid() => {
                    let marker = if sector.is_deleted() { IbmMarker::Ddam } else { IbmMarker::Dam };
                    (marker, sector.data.clone())
                }
                _ => (IbmMarker::Dam, Vec::new()),
            };
            data.resize(size, FORMAT_FILL_BYTE);

            write_mark(&mut w, marker);
            let mut field = marker.crc_prefix(encoding);
            field.extend_from_slice(&data);
            let crc = crc_ibm_3740(&field, None);
            w.push_bytes(&data);
            w.push_bytes(&crc.to_be_bytes());
            w.push_repeat(gap_byte, layout.gap3);
        }

        if w.len() > track_bitcells {
            log::warn!(
                "IbmTrack::master_track(): Format overran the index. Truncating track to {} bitcells",
                track_bitcells
            );
        }
        else {
            // Fill gap 4b up to the index, then trim the partial final byte.
            let track_bytes = track_bitcells.div_ceil(16);
            let fill = track_bytes - w.byte_len();
            w.push_repeat(gap_byte, fill);
        }

        let mut bits = w.into_bits();
        bits.truncate(track_bitcells);

        log::debug!(
            "IbmTrack::master_track(): {} {} sectors, {} bitcells",
            self.ch,
            layout.sector_ct,
            bits.len()
        );

        MasterTrack::new(bits, layout.rpm.index_time())
    }
}

impl FluxSource for IbmTrack {
    fn flux(&self) -> Result<FluxTiming, FluxError> {
        self.master_track()?.flux()
    }
}
