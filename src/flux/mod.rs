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

//! The `flux` module models captured flux transition timings and recovers bitcell tracks from
//! them with a software PLL.
//!
//! A [`FluxTiming`] is produced by a capture device driver or a flux image reader. It can be cued,
//! rescaled and trimmed in place, then handed to a [`Pll`](pll::Pll) to recover a
//! [`BitcellTrack`](pll::BitcellTrack).

pub mod pll;
pub mod timing;

pub use pll::{BitcellTrack, Pll, PllParams, PllPreset};
pub use timing::FluxTiming;

use crate::FluxError;

/// Anything that can present itself as flux timings: captured flux (identity), a master track
/// (read simulation) or a sector codec (encode, then read simulation).
pub trait FluxSource {
    /// Produce flux timings for this source, as they would be read from a drive.
    fn flux(&self) -> Result<FluxTiming, FluxError>;
}

impl FluxSource for FluxTiming {
    fn flux(&self) -> Result<FluxTiming, FluxError> {
        Ok(self.clone())
    }
}
