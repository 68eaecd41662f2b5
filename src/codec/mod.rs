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
//! Sector codecs.
//!
//! A sector codec locates self-describing records in a recovered bitcell track, validates them, and
//! merges them into a [`SectorTable`] that persists across revolutions and physical reads. It can
//! also encode its sectors back into a formatted [`MasterTrack`].
//!
//! Codecs are dispatched through the closed [`TrackCodec`] enum, which is usually created from a
//! named [`TrackFormat`].

pub mod encoding;
pub mod ibm;

use crate::{
    codec::ibm::{DecodeReport, IbmTrack, IbmTrackLayout},
    flux::{pll::PllParams, timing::FluxTiming, FluxSource},
    sector::SectorTable,
    track::master::MasterTrack,
    types::{
        chs::DiskCh,
        enums::{DiskDataRate, DiskRpm, TrackDataEncoding},
    },
    FluxError,
};
use bit_vec::BitVec;
use strum::{Display as StrumDisplay, EnumIter, EnumString};

/// The operations every sector codec provides.
pub trait SectorCodec {
    /// Decode one pass over a recovered bitcell stream, merging the sectors found.
    fn decode_bits(&mut self, bits: &BitVec) -> DecodeReport;
    /// Recover and decode `flux` with each PLL configuration in turn until no sectors are missing.
    fn decode_flux(&mut self, flux: &FluxTiming, plls: &[PllParams]) -> Result<DecodeReport, FluxError>;
    /// Encode the codec's sectors as a formatted master track.
    fn master_track(&self) -> Result<MasterTrack, FluxError>;
    fn has_sector(&self, id: u8) -> bool;
    fn nr_missing(&self) -> usize;
    fn sectors(&self) -> &SectorTable;
    fn get_img_track(&self) -> Vec<u8>;
    fn set_img_track(&mut self, img: &[u8]) -> usize;
}

impl SectorCodec for IbmTrack {
    fn decode_bits(&mut self, bits: &BitVec) -> DecodeReport {
        IbmTrack::decode_bits(self, bits)
    }
    fn decode_flux(&mut self, flux: &FluxTiming, plls: &[PllParams]) -> Result<DecodeReport, FluxError> {
        IbmTrack::decode_flux(self, flux, plls)
    }
    fn master_track(&self) -> Result<MasterTrack, FluxError> {
        IbmTrack::master_track(self)
    }
    fn has_sector(&self, id: u8) -> bool {
        IbmTrack::has_sector(self, id)
    }
    fn nr_missing(&self) -> usize {
        IbmTrack::nr_missing(self)
    }
    fn sectors(&self) -> &SectorTable {
        IbmTrack::sectors(self)
    }
    fn get_img_track(&self) -> Vec<u8> {
        IbmTrack::get_img_track(self)
    }
    fn set_img_track(&mut self, img: &[u8]) -> usize {
        IbmTrack::set_img_track(self, img)
    }
}

/// A track codec of any supported family.
#[derive(Clone, Debug)]
pub enum TrackCodec {
    Ibm(IbmTrack),
}

impl TrackCodec {
    /// Create a codec for physical track `ch` in the given named format.
    pub fn new(format: TrackFormat, ch: DiskCh) -> Self {
        TrackCodec::Ibm(IbmTrack::new(ch, format.layout()))
    }

    pub fn ch(&self) -> DiskCh {
        match self {
            TrackCodec::Ibm(track) => track.ch(),
        }
    }
}

impl SectorCodec for TrackCodec {
    fn decode_bits(&mut self, bits: &BitVec) -> DecodeReport {
        #[allow(clippy::match_single_binding)]
        match self {
            TrackCodec::Ibm(track) => track.decode_bits(bits),
        }
    }
    fn decode_flux(&mut self, flux: &FluxTiming, plls: &[PllParams]) -> Result<DecodeReport, FluxError> {
        #[allow(clippy::match_single_binding)]
        match self {
            TrackCodec::Ibm(track) => track.decode_flux(flux, plls),
        }
    }
    fn master_track(&self) -> Result<MasterTrack, FluxError> {
        #[allow(clippy::match_single_binding)]
        match self {
            TrackCodec::Ibm(track) => track.master_track(),
        }
    }
    fn has_sector(&self, id: u8) -> bool {
        #[allow(clippy::match_single_binding)]
        match self {
            TrackCodec::Ibm(track) => track.has_sector(id),
        }
    }
    fn nr_missing(&self) -> usize {
        #[allow(clippy::match_single_binding)]
        match self {
            TrackCodec::Ibm(track) => track.nr_missing(),
        }
    }
    fn sectors(&self) -> &SectorTable {
        #[allow(clippy::match_single_binding)]
        match self {
            TrackCodec::Ibm(track) => track.sectors(),
        }
    }
    fn get_img_track(&self) -> Vec<u8> {
        #[allow(clippy::match_single_binding)]
        match self {
            TrackCodec::Ibm(track) => track.get_img_track(),
        }
    }
    fn set_img_track(&mut self, img: &[u8]) -> usize {
        #[allow(clippy::match_single_binding)]
        match self {
            TrackCodec::Ibm(track) => track.set_img_track(img),
        }
    }
}

impl FluxSource for TrackCodec {
    fn flux(&self) -> Result<FluxTiming, FluxError> {
        self.master_track()?.flux()
    }
}

/// Named standard track formats.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, StrumDisplay, EnumIter, EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackFormat {
    /// 160K 5.25" DD
    #[strum(serialize = "ibm.160")]
    Ibm160,
    /// 180K 5.25" DD
    #[strum(serialize = "ibm.180")]
    Ibm180,
    /// 320K 5.25" DD
    #[strum(serialize = "ibm.320")]
    Ibm320,
    /// 360K 5.25" DD
    #[strum(serialize = "ibm.360")]
    Ibm360,
    /// 720K 3.5" DD
    #[strum(serialize = "ibm.720")]
    Ibm720,
    /// 1.2M 5.25" HD
    #[strum(serialize = "ibm.1200")]
    Ibm1200,
    /// 1.44M 3.5" HD
    #[strum(serialize = "ibm.1440")]
    Ibm1440,
    /// 2.88M 3.5" ED
    #[strum(serialize = "ibm.2880")]
    Ibm2880,
    /// 8" single density, 26 sectors of 128 bytes
    #[strum(serialize = "ibm.fm.250")]
    IbmFm250,
}

impl TrackFormat {
    pub fn encoding(&self) -> TrackDataEncoding {
        match self {
            TrackFormat::IbmFm250 => TrackDataEncoding::Fm,
            _ => TrackDataEncoding::Mfm,
        }
    }

    pub fn data_rate(&self) -> DiskDataRate {
        match self {
            TrackFormat::Ibm1200 | TrackFormat::Ibm1440 => DiskDataRate::Rate500Kbps,
            TrackFormat::Ibm2880 => DiskDataRate::Rate1000Kbps,
            _ => DiskDataRate::Rate250Kbps,
        }
    }

    pub fn rpm(&self) -> DiskRpm {
        match self {
            TrackFormat::Ibm1200 | TrackFormat::IbmFm250 => DiskRpm::Rpm360,
            _ => DiskRpm::Rpm300,
        }
    }

    /// Return the number of sectors per track.
    pub fn sector_ct(&self) -> u8 {
        match self {
            TrackFormat::Ibm160 | TrackFormat::Ibm320 => 8,
            TrackFormat::Ibm180 | TrackFormat::Ibm360 | TrackFormat::Ibm720 => 9,
            TrackFormat::Ibm1200 => 15,
            TrackFormat::Ibm1440 => 18,
            TrackFormat::Ibm2880 => 36,
            TrackFormat::IbmFm250 => 26,
        }
    }

    /// Return the sector size code.
    pub fn size_code(&self) -> u8 {
        match self {
            TrackFormat::IbmFm250 => 0,
            _ => 2,
        }
    }

    pub fn gap3(&self) -> usize {
        match self {
            TrackFormat::Ibm1200 => 0x54,
            TrackFormat::Ibm1440 => 0x6C,
            TrackFormat::Ibm2880 => 0x53,
            TrackFormat::IbmFm250 => 27,
            _ => 0x50,
        }
    }

    /// Return the track layout for this format.
    pub fn layout(&self) -> IbmTrackLayout {
        IbmTrackLayout::new(self.encoding(), self.data_rate(), self.rpm())
            .with_sectors(self.sector_ct(), self.size_code())
            .with_gap3(self.gap3())
    }

    /// Create a codec for physical track `ch` in this format.
    pub fn codec(&self, ch: DiskCh) -> TrackCodec {
        TrackCodec::new(*self, ch)
    }
}
