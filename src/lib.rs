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

//! # fluxcell
//!
//! fluxcell converts the raw flux transition timings captured from a floppy disk track into a
//! recovered bitcell stream, synthesizes flux timings from a pristine bitcell track for writeout,
//! and decodes self-describing sectors from recovered tracks across multiple noisy revolutions.
//!
//! The crate is organized leaves-first:
//!
//! * [`flux`] holds the [`FluxTiming`] model of captured flux and the software [`Pll`] that
//!   recovers a [`BitcellTrack`] from it.
//! * [`track`] holds the [`MasterTrack`] encoder, which turns a bit sequence back into flux, with
//!   weak-region synthesis, write precompensation and splice-aware stretching.
//! * [`sector`] holds the generic [`SectorTable`] merge protocol shared by all sector codecs.
//! * [`codec`] holds the sector codecs themselves. Only the IBM System 34 family (MFM and FM) is
//!   implemented.
//!
//! No file I/O is performed. Disk image readers and capture drivers hand this crate a
//! [`FluxTiming`] and receive back a [`BitcellTrack`], a decoded sector table, or another
//! [`FluxTiming`] ready for writeout.

pub mod codec;
pub mod flux;
mod random;
pub mod sector;
pub mod track;
pub mod types;
pub mod util;

use thiserror::Error;

/// The maximum sector size we will decode. The formula for calculating size from n is (128 * 2^n).
pub const MAXIMUM_SECTOR_SIZE: usize = 8192;

/// Errors raised for structural violations of the track model contracts.
///
/// Noisy-medium conditions (missing sectors, CRC errors, running out of flux before an index) are
/// never reported through this type; they are represented as data for the caller to act on.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FluxError {
    #[error("Writeout requested on flux that is not index-cued and has no splice")]
    NotIndexCued,
    #[error("Splice offset {splice} lies outside the track (length {len})")]
    SpliceOutOfRange { splice: usize, len: usize },
    #[error("Weak region at {start} (length {len}) lies outside the track (length {track_len})")]
    WeakRegionOutOfRange { start: usize, len: usize, track_len: usize },
    #[error("Weak region at {start} overlaps the preceding weak region ending at {prev_end}")]
    WeakRegionOverlap { start: usize, prev_end: usize },
    #[error("The track contains no bitcells")]
    EmptyTrack,
    #[error("The flux contains no complete revolution")]
    NoRevolution,
    #[error("Bit duration list length {durations} does not match bit count {bits}")]
    BitDurationMismatch { bits: usize, durations: usize },
    #[error("Invalid parameters were specified to a library function: {0}")]
    ParameterError(String),
}

#[doc(hidden)]
#[macro_export]
macro_rules! format_us {
    ($value:expr) => {
        format!("{:.4}μs", $value * 1_000_000.0)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! format_ms {
    ($value:expr) => {
        format!("{:.4}ms", $value * 1_000.0)
    };
}

pub use crate::{
    codec::{
        ibm::{DecodeReport, IbmTrack, IbmTrackLayout},
        SectorCodec,
        TrackCodec,
        TrackFormat,
    },
    flux::{
        pll::{BitcellTrack, Pll, PllParams, PllPreset},
        timing::FluxTiming,
        FluxSource,
    },
    sector::{MergeOutcome, Sector, SectorTable},
    track::{
        master::{MasterTrack, WeakRegion},
        precomp::Precomp,
    },
    types::{
        chs::{DiskCh, DiskChsn},
        enums::{DiskDataRate, DiskRpm, TrackDataEncoding},
        flags::SectorStatus,
    },
};

pub mod prelude {
    pub use crate::{
        codec::{SectorCodec, TrackCodec, TrackFormat},
        flux::{FluxSource, FluxTiming},
        BitcellTrack,
        DiskCh,
        DiskChsn,
        DiskDataRate,
        DiskRpm,
        FluxError,
        IbmTrack,
        IbmTrackLayout,
        MasterTrack,
        Pll,
        PllParams,
        PllPreset,
        Precomp,
        SectorStatus,
        TrackDataEncoding,
        WeakRegion,
    };
}
