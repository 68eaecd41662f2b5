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

//! A software phase-locked loop that recovers a bitcell stream from flux transition intervals.
//!
//! The PLL keeps a running estimate of the bitcell period (the `clock`) and of the phase of the
//! bitcell window relative to incoming transitions. Each transition emits a `1`, preceded by one
//! `0` per whole bitcell elapsed since the previous transition. The clock is nudged toward the
//! observed timing while the loop is in sync, and relaxes back toward the nominal period during
//! long runs without transitions, which are typical of unformatted or damaged areas.
//!
//! Index pulses partition the recovered stream into revolutions. Each bit is assigned a corrected
//! duration, and the running time to the next index is decremented by those durations. A bit that
//! takes it negative spans the index and begins the next revolution.

use crate::{
    flux::timing::FluxTiming,
    format_us,
    types::enums::DiskDataRate,
    FluxError,
};
use bit_vec::BitVec;
use std::{
    fmt::{self, Display, Formatter},
    iter,
    ops::Range,
};
use strum::{Display as StrumDisplay, EnumIter, EnumString};

/// The number of consecutive zero bits after which the PLL considers itself out of sync. While out
/// of sync, the clock period relaxes toward the nominal period instead of tracking the input.
pub const PLL_SYNC_ZEROS: u32 = 3;

/// Fraction of a bit's duration by which it may overrun an index or sector hole and still be
/// counted before it.
const CROSSING_TOLERANCE: f64 = 0.01;

/// The threshold used by [`PllPreset::LowPass`], in seconds.
pub const PLL_LOWPASS_THRESHOLD: f64 = 1.5e-6;

/// Named PLL configurations. Codecs walk a list of these when sectors are still missing after a
/// decode pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, StrumDisplay, EnumIter, EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum PllPreset {
    /// Fast tracking of both period and phase. Suits most captures.
    #[default]
    Aggressive,
    /// Slow tracking. Tolerates noisy flux at the cost of losing lock on badly warped media.
    Conservative,
    /// Aggressive tracking with short spurious transitions filtered out.
    LowPass,
}

/// Tuning parameters for the [`Pll`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PllParams {
    /// Proportion of the residual phase error applied to the clock period on each transition.
    pub period_adj: f64,
    /// Proportion of the residual phase error absorbed by the bitcell window on each transition.
    pub phase_adj: f64,
    /// Maximum deviation of the clock period from nominal, as a fraction of nominal.
    pub max_adj: f64,
    /// Runs of zeros longer than this are treated as loss of sync.
    pub sync_zeros: u32,
    /// Intervals shorter than this many seconds are merged into a neighbour before decoding.
    pub lowpass_thresh: Option<f64>,
}

impl Default for PllParams {
    fn default() -> Self {
        PllParams {
            period_adj: 0.05,
            phase_adj: 0.60,
            max_adj: 0.10,
            sync_zeros: PLL_SYNC_ZEROS,
            lowpass_thresh: None,
        }
    }
}

impl From<PllPreset> for PllParams {
    fn from(preset: PllPreset) -> Self {
        match preset {
            PllPreset::Aggressive => PllParams::default(),
            PllPreset::Conservative => PllParams {
                period_adj: 0.01,
                phase_adj: 0.10,
                ..PllParams::default()
            },
            PllPreset::LowPass => PllParams {
                lowpass_thresh: Some(PLL_LOWPASS_THRESHOLD),
                ..PllParams::default()
            },
        }
    }
}

impl Display for PllParams {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "period_adj: {:.2} phase_adj: {:.2} max_adj: {:.2} sync_zeros: {}",
            self.period_adj, self.phase_adj, self.max_adj, self.sync_zeros
        )?;
        if let Some(thresh) = self.lowpass_thresh {
            write!(f, " lowpass: {}", format_us!(thresh))?;
        }
        Ok(())
    }
}

impl PllParams {
    /// Return the ordered list of PLL configurations a codec should try in turn while sectors
    /// remain missing.
    pub fn fallback_chain() -> Vec<PllParams> {
        vec![
            PllPreset::Aggressive.into(),
            PllPreset::Conservative.into(),
            PllPreset::LowPass.into(),
        ]
    }

    pub fn with_lowpass(mut self, thresh: Option<f64>) -> Self {
        self.lowpass_thresh = thresh;
        self
    }

    pub fn with_sync_zeros(mut self, sync_zeros: u32) -> Self {
        self.sync_zeros = sync_zeros;
        self
    }

    fn validate(&self) -> Result<(), FluxError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        // A full-scale adjustment would let the clock collapse to zero.
        let max_adj_ok = self.max_adj.is_finite() && (0.0..1.0).contains(&self.max_adj);
        if !in_unit(self.period_adj) || !in_unit(self.phase_adj) || !max_adj_ok {
            return Err(FluxError::ParameterError(format!("invalid PLL parameters: {}", self)));
        }
        if let Some(thresh) = self.lowpass_thresh {
            if !thresh.is_finite() || thresh < 0.0 {
                return Err(FluxError::ParameterError(format!(
                    "invalid low-pass threshold: {}",
                    thresh
                )));
            }
        }
        Ok(())
    }
}

/// Statistics gathered during a single PLL decode.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PllStats {
    /// Number of flux transitions that produced bits.
    pub flux_ct: usize,
    /// Number of transitions preceded by a run of zeros longer than the sync threshold.
    pub out_of_sync: usize,
    /// Number of intervals removed by the low-pass filter.
    pub lowpass_merged: usize,
    /// Number of bits decoded ahead of the first index and discarded.
    pub discarded_bits: usize,
    pub shortest_flux: f64,
    pub longest_flux: f64,
    pub clock_min: f64,
    pub clock_max: f64,
}

impl Display for PllStats {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Flux: {} Out of sync: {} Low-pass merged: {} Discarded: {} Shortest: {} Longest: {} Clock: {}-{}",
            self.flux_ct,
            self.out_of_sync,
            self.lowpass_merged,
            self.discarded_bits,
            format_us!(self.shortest_flux),
            format_us!(self.longest_flux),
            format_us!(self.clock_min),
            format_us!(self.clock_max)
        )
    }
}

/// The bitcell stream recovered by the [`Pll`] from a [`FluxTiming`].
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitcellTrack {
    pub(crate) bits: BitVec,
    pub(crate) bit_durations: Vec<f64>,
    pub(crate) revolutions: Vec<usize>,
    pub(crate) hard_sector_bits: Option<Vec<Vec<usize>>>,
    pub(crate) stats: PllStats,
}

impl BitcellTrack {
    /// Return the recovered bits. Only complete revolutions are included.
    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    /// Return the duration of each recovered bit, in seconds.
    pub fn bit_durations(&self) -> &[f64] {
        &self.bit_durations
    }

    /// Return the number of bits in each recovered revolution.
    pub fn revolutions(&self) -> &[usize] {
        &self.revolutions
    }

    pub fn revolution_count(&self) -> usize {
        self.revolutions.len()
    }

    /// For hard-sectored media, return the bit length of each sector segment within each revolution.
    pub fn hard_sector_bits(&self) -> Option<&Vec<Vec<usize>>> {
        self.hard_sector_bits.as_ref()
    }

    pub fn stats(&self) -> &PllStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Return the range of bit indices belonging to revolution `rev`.
    pub fn revolution_range(&self, rev: usize) -> Option<Range<usize>> {
        let len = *self.revolutions.get(rev)?;
        let start = self.revolutions[..rev].iter().sum::<usize>();
        Some(start..start + len)
    }

    /// Return a copy of the bits of revolution `rev`.
    pub fn revolution_bits(&self, rev: usize) -> Option<BitVec> {
        let range = self.revolution_range(rev)?;
        Some(range.map(|i| self.bits[i]).collect())
    }

    /// Return the sum of the bit durations of revolution `rev`, in seconds.
    pub fn revolution_time(&self, rev: usize) -> Option<f64> {
        let range = self.revolution_range(rev)?;
        Some(self.bit_durations[range].iter().sum())
    }
}

/// Merge flux intervals shorter than `thresh` into their longer neighbour. When the right
/// neighbour is itself shorter than the interval under examination, it is resolved first. Returns
/// the number of intervals removed.
///
/// Total time is preserved.
pub fn lowpass_filter(intervals: &mut Vec<f64>, thresh: f64) -> usize {
    let mut merged = 0;
    let mut out: Vec<f64> = Vec::with_capacity(intervals.len());
    let mut rest = std::mem::take(intervals).into_iter();
    let mut cur = rest.next();
    let mut right = rest.next();

    while let Some(x) = cur {
        if x >= thresh || right.is_some_and(|r| r < x) {
            out.push(x);
            cur = right;
            right = rest.next();
            continue;
        }

        match (out.last_mut(), right) {
            (Some(l), Some(r)) if r > *l => right = Some(r + x),
            (Some(l), _) => *l += x,
            (None, Some(r)) => right = Some(r + x),
            (None, None) => {
                out.push(x);
                break;
            }
        }
        merged += 1;

        // Re-examine the left neighbour, which may itself be short.
        cur = match out.pop() {
            Some(l) => Some(l),
            None => std::mem::replace(&mut right, rest.next()),
        };
    }
    *intervals = out;
    merged
}

/// Tracks the position of the next index pulse and hard-sector hole relative to the bit currently
/// being placed.
struct IndexTracker<'a> {
    /// Index positions in seconds from the start of the input.
    index: &'a [f64],
    next_index: usize,
    to_index: f64,
    /// True while decoding the partial revolution preceding the first index of an uncued capture.
    leading: bool,
    sectors: Option<&'a [Vec<f64>]>,
    holes: Vec<f64>,
    next_hole: usize,
    to_hole: f64,
}

impl<'a> IndexTracker<'a> {
    fn new(index: &'a [f64], index_cued: bool, sectors: Option<&'a [Vec<f64>]>) -> Self {
        let mut tracker = IndexTracker {
            index,
            next_index: 0,
            to_index: index.first().copied().unwrap_or(0.0),
            leading: !index_cued,
            sectors,
            holes: Vec::new(),
            next_hole: 0,
            to_hole: f64::INFINITY,
        };
        if index_cued {
            tracker.load_holes(0, 0.0);
        }
        tracker
    }

    /// Load the sector holes of revolution `rev`. `offset` is the time from the start of the current
    /// bit to the start of the revolution.
    fn load_holes(&mut self, rev: usize, offset: f64) {
        self.holes = self
            .sectors
            .and_then(|s| s.get(rev))
            .map(|h| h.iter().copied().filter(|p| *p > 0.0).collect())
            .unwrap_or_default();
        self.next_hole = 0;
        self.to_hole = self.holes.first().map(|h| offset + *h).unwrap_or(f64::INFINITY);
    }

    /// Advance past the current index. Returns false if there are no further index pulses.
    fn advance_index(&mut self) -> bool {
        self.next_index += 1;
        if self.next_index >= self.index.len() {
            return false;
        }
        let offset = self.to_index;
        self.to_index += self.index[self.next_index] - self.index[self.next_index - 1];
        let rev = match self.leading {
            true => self.next_index - 1,
            false => self.next_index,
        };
        self.load_holes(rev, offset);
        true
    }

    fn advance_hole(&mut self) {
        self.next_hole += 1;
        match self.holes.get(self.next_hole) {
            Some(h) => self.to_hole += *h - self.holes[self.next_hole - 1],
            None => self.to_hole = f64::INFINITY,
        }
    }

    fn elapse(&mut self, duration: f64) {
        self.to_index -= duration;
        self.to_hole -= duration;
    }
}

/// A software PLL recovering bitcells from flux transition intervals.
#[derive(Clone, Debug)]
pub struct Pll {
    params: PllParams,
    /// Nominal bitcell period in seconds.
    period: f64,
}

impl Pll {
    /// Create a new PLL with the given parameters and nominal bitcell period in seconds.
    pub fn new(params: PllParams, period: f64) -> Result<Pll, FluxError> {
        params.validate()?;
        if !period.is_finite() || period <= 0.0 {
            return Err(FluxError::ParameterError(format!("invalid bitcell period: {}", period)));
        }
        log::debug!(
            "Pll::new(): Nominal period: {} {}",
            format_us!(period),
            params
        );
        Ok(Pll { params, period })
    }

    /// Create a new PLL from a preset, clocked for the given data rate.
    pub fn from_preset(preset: PllPreset, rate: DiskDataRate) -> Result<Pll, FluxError> {
        Pll::new(preset.into(), rate.bitcell_period())
    }

    pub fn params(&self) -> &PllParams {
        &self.params
    }

    /// Return the nominal bitcell period in seconds.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Recover bitcells from `flux`, producing one revolution per index-to-index span.
    pub fn decode(&self, flux: &FluxTiming) -> BitcellTrack {
        self.decode_revolutions(flux, None)
    }

    /// Recover bitcells from `flux`, stopping after at most `revs` revolutions.
    pub fn decode_revolutions(&self, flux: &FluxTiming, revs: Option<usize>) -> BitcellTrack {
        let freq = flux.sample_frequency();
        let mut index: Vec<f64> = flux.index_positions().iter().map(|p| *p / freq).collect();
        if let Some(revs) = revs {
            let keep = if flux.is_index_cued() { revs } else { revs + 1 };
            index.truncate(keep.max(1));
        }
        let sectors: Option<Vec<Vec<f64>>> = flux.sector_positions().map(|s| {
            s.iter()
                .map(|rev| rev.iter().map(|p| *p / freq).collect())
                .collect()
        });

        let mut merged = 0;
        let mut track = match self.params.lowpass_thresh {
            Some(thresh) => {
                let mut intervals = flux.intervals().to_vec();
                merged = lowpass_filter(&mut intervals, thresh * freq);
                log::debug!("Pll::decode(): Low-pass filter merged {} intervals", merged);
                self.decode_inner(intervals.into_iter(), freq, &index, flux.is_index_cued(), sectors.as_deref())
            }
            None => self.decode_inner(
                flux.intervals().iter().copied(),
                freq,
                &index,
                flux.is_index_cued(),
                sectors.as_deref(),
            ),
        };
        track.stats.lowpass_merged = merged;
        track
    }

    /// Recover bitcells from any source of flux intervals, in ticks of `sample_frequency`.
    /// `index_positions` are cumulative tick positions, interpreted as for [`FluxTiming`].
    ///
    /// The low-pass filter is not applied, as it requires look-ahead over the whole input.
    pub fn decode_iter<I>(
        &self,
        intervals: I,
        sample_frequency: f64,
        index_positions: &[f64],
        index_cued: bool,
    ) -> BitcellTrack
    where
        I: IntoIterator<Item = f64>,
    {
        let index: Vec<f64> = index_positions.iter().map(|p| *p / sample_frequency).collect();
        self.decode_inner(intervals.into_iter(), sample_frequency, &index, index_cued, None)
    }

    fn decode_inner<I>(
        &self,
        intervals: I,
        freq: f64,
        index: &[f64],
        index_cued: bool,
        sectors: Option<&[Vec<f64>]>,
    ) -> BitcellTrack
    where
        I: Iterator<Item = f64>,
    {
        let nominal = self.period;
        let min_clock = nominal * (1.0 - self.params.max_adj);
        let max_clock = nominal * (1.0 + self.params.max_adj);
        let mut clock = nominal;

        let mut out = BitcellTrack {
            stats: PllStats {
                shortest_flux: f64::MAX,
                clock_min: clock,
                clock_max: clock,
                ..PllStats::default()
            },
            ..BitcellTrack::default()
        };

        if index.is_empty() {
            log::warn!("Pll::decode(): No index positions, nothing to decode");
            return out;
        }

        let final_index = index[index.len() - 1];
        let mut tracker = IndexTracker::new(index, index_cued, sectors);
        let mut rev_start = 0;
        let mut seg_start = 0;
        let mut segments: Vec<usize> = Vec::new();
        let mut hard_sectors: Vec<Vec<usize>> = Vec::new();

        let mut total = 0.0;
        let mut ticks = 0.0;

        // A trailing interval is synthesized once the input runs dry, long enough to carry the
        // loop at least two bitcells past the final index.
        'flux: for interval in intervals.map(Some).chain(iter::once(None)) {
            let x = match interval {
                Some(x) => {
                    let x = x / freq;
                    total += x;
                    x
                }
                None => (final_index - total + 2.0 * clock).max(0.0),
            };

            ticks += x;
            if ticks < clock / 2.0 {
                continue;
            }

            if interval.is_some() {
                out.stats.shortest_flux = out.stats.shortest_flux.min(x);
                out.stats.longest_flux = out.stats.longest_flux.max(x);
            }

            let mut zeros: u32 = 0;
            loop {
                ticks -= clock;
                if ticks >= clock / 2.0 {
                    zeros += 1;
                }
                else {
                    break;
                }
            }
            out.stats.flux_ct += 1;

            let new_ticks = ticks * (1.0 - self.params.phase_adj);
            let duration = clock + (ticks - new_ticks) / (zeros + 1) as f64;

            // A bit crossing the index or a sector hole starts the next revolution or segment.
            let overrun = -duration * CROSSING_TOLERANCE;
            for n in 0..=zeros {
                if tracker.to_index - duration < overrun {
                    if tracker.leading {
                        out.stats.discarded_bits = out.bits.len();
                        out.bits.truncate(0);
                        out.bit_durations.clear();
                        tracker.leading = false;
                    }
                    else {
                        segments.push(out.bits.len() - seg_start);
                        out.revolutions.push(out.bits.len() - rev_start);
                        hard_sectors.push(std::mem::take(&mut segments));
                    }
                    rev_start = out.bits.len();
                    seg_start = rev_start;
                    if !tracker.advance_index() {
                        break 'flux;
                    }
                }
                if !tracker.leading && tracker.to_hole - duration < overrun {
                    segments.push(out.bits.len() - seg_start);
                    seg_start = out.bits.len();
                    tracker.advance_hole();
                }
                tracker.elapse(duration);
                out.bits.push(n == zeros);
                out.bit_durations.push(duration);
            }

            if zeros <= self.params.sync_zeros {
                clock += ticks * self.params.period_adj;
            }
            else {
                out.stats.out_of_sync += 1;
                clock += (nominal - clock) * self.params.period_adj;
            }
            clock = clock.clamp(min_clock, max_clock);
            out.stats.clock_min = out.stats.clock_min.min(clock);
            out.stats.clock_max = out.stats.clock_max.max(clock);
            ticks = new_ticks;
        }

        // Drop any trailing partial revolution.
        let complete = out.revolutions.iter().sum::<usize>();
        if out.bits.len() > complete {
            out.bits.truncate(complete);
            out.bit_durations.truncate(complete);
        }

        if sectors.is_some() {
            out.hard_sector_bits = Some(hard_sectors);
        }
        if out.stats.shortest_flux == f64::MAX {
            out.stats.shortest_flux = 0.0;
        }

        log::debug!(
            "Pll::decode(): Recovered {} bits in {} revolutions. {}",
            out.bits.len(),
            out.revolutions.len(),
            out.stats
        );

        out
    }
}
