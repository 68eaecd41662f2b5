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

//! A [`MasterTrack`] holds the pristine bit sequence of a track, as it should be written, along
//! with the metadata needed to turn it back into flux: the write splice position, weak regions,
//! optional per-bit timing and a precompensation policy.
//!
//! Two kinds of flux can be produced:
//! * [`MasterTrack::flux`] simulates a read of the track, starting at the index. It is used to
//!   verify a track by decoding it through the same path as a real capture.
//! * [`MasterTrack::flux_for_writeout`] produces flux to be written to a real disk, padded so that
//!   drive speed variation cannot make the write run short.

use crate::{
    flux::{timing::FluxTiming, FluxSource},
    format_ms,
    random::WeakBitSource,
    track::precomp::Precomp,
    util::rotate_bits,
    FluxError,
};
use bit_vec::BitVec;

/// Weak regions shorter than this many bits are filled with a sparse transition pattern rather
/// than fuzzy MFM words.
pub const WEAK_FUZZY_MIN_BITS: usize = 400;
/// Spacing of the artificial transitions placed in sparse weak region filler. Devices reporting
/// a "no flux" fault on long transition-free areas are kept happy by these.
pub const WEAK_FILLER_SPACING: usize = 32;
/// An MFM word with an ambiguous transition in bitcell 10. Read either as written (0x12A5, data
/// byte 0x43) or with the transition in bitcell 11 (0x1295, data byte 0x47).
pub const WEAK_FUZZY_WORD: u16 = 0x12A5;
const FUZZY_BIT: usize = 10;
/// The random jitter applied to each fuzzy transition during read simulation, in bitcells.
pub const WEAK_JITTER: f64 = 0.15;
/// Length of the track header repeated ahead of a mid-track splice on writeout.
pub const HEADER_FILL_BITS: usize = 32;
/// A splice within this many bits of the index is treated as being at the index.
pub const SPLICE_INDEX_TOLERANCE: usize = 4;

/// A range of bits whose content is deliberately non-deterministic on readback.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeakRegion {
    pub start: usize,
    pub len: usize,
}

impl WeakRegion {
    pub fn new(start: usize, len: usize) -> Self {
        WeakRegion { start, len }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// The pristine bit sequence of a track together with its writeout metadata. `bits` is in write
/// order, beginning at the write splice; `splice` gives the position of the splice relative to
/// the index.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MasterTrack {
    bits: BitVec,
    time_per_revolution: f64,
    bit_durations: Option<Vec<f64>>,
    splice: usize,
    weak_regions: Vec<WeakRegion>,
    precomp: Option<Precomp>,
    force_random_weak: bool,
}

impl MasterTrack {
    /// Create a new `MasterTrack` from `bits`, to be written over one revolution of
    /// `time_per_revolution` seconds.
    pub fn new(bits: BitVec, time_per_revolution: f64) -> Result<MasterTrack, FluxError> {
        if bits.is_empty() {
            return Err(FluxError::EmptyTrack);
        }
        if !time_per_revolution.is_finite() || time_per_revolution <= 0.0 {
            return Err(FluxError::ParameterError(format!(
                "invalid time per revolution: {}",
                time_per_revolution
            )));
        }
        Ok(MasterTrack {
            bits,
            time_per_revolution,
            bit_durations: None,
            splice: 0,
            weak_regions: Vec::new(),
            precomp: None,
            force_random_weak: false,
        })
    }

    /// Set non-uniform timing for each bit. Durations are relative weights; the track is always
    /// scaled to `time_per_revolution`.
    pub fn with_bit_durations(mut self, durations: Vec<f64>) -> Result<MasterTrack, FluxError> {
        if durations.len() != self.bits.len() {
            return Err(FluxError::BitDurationMismatch {
                bits: self.bits.len(),
                durations: durations.len(),
            });
        }
        if durations.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(FluxError::ParameterError("bit durations must be positive".into()));
        }
        self.bit_durations = Some(durations);
        Ok(self)
    }

    pub fn with_splice(mut self, splice: usize) -> Result<MasterTrack, FluxError> {
        self.set_splice(splice)?;
        Ok(self)
    }

    pub fn with_weak_regions(mut self, regions: Vec<WeakRegion>) -> Result<MasterTrack, FluxError> {
        self.set_weak_regions(regions)?;
        Ok(self)
    }

    pub fn with_precomp(mut self, precomp: Option<Precomp>) -> MasterTrack {
        self.precomp = precomp;
        self
    }

    pub fn set_splice(&mut self, splice: usize) -> Result<(), FluxError> {
        if splice >= self.bits.len() {
            return Err(FluxError::SpliceOutOfRange {
                splice,
                len: self.bits.len(),
            });
        }
        self.splice = splice;
        Ok(())
    }

    /// Replace the weak regions of the track. Regions must be ordered, must not overlap, and must
    /// lie within the track.
    pub fn set_weak_regions(&mut self, regions: Vec<WeakRegion>) -> Result<(), FluxError> {
        let mut prev_end = 0;
        for (i, region) in regions.iter().enumerate() {
            if region.len == 0 || region.end() > self.bits.len() {
                return Err(FluxError::WeakRegionOutOfRange {
                    start: region.start,
                    len: region.len,
                    track_len: self.bits.len(),
                });
            }
            if i > 0 && region.start < prev_end {
                return Err(FluxError::WeakRegionOverlap {
                    start: region.start,
                    prev_end,
                });
            }
            prev_end = region.end();
        }
        self.weak_regions = regions;
        Ok(())
    }

    /// Add a weak region, keeping the region list ordered.
    pub fn add_weak_region(&mut self, start: usize, len: usize) -> Result<(), FluxError> {
        let mut regions = self.weak_regions.clone();
        let pos = regions.partition_point(|r| r.start <= start);
        regions.insert(pos, WeakRegion::new(start, len));
        self.set_weak_regions(regions)
    }

    pub fn set_precomp(&mut self, precomp: Option<Precomp>) {
        self.precomp = precomp;
    }

    /// Force every weak region to be synthesized as sparse filler, regardless of its length.
    pub fn set_force_random_weak(&mut self, force: bool) {
        self.force_random_weak = force;
    }

    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn time_per_revolution(&self) -> f64 {
        self.time_per_revolution
    }

    pub fn bit_durations(&self) -> Option<&[f64]> {
        self.bit_durations.as_deref()
    }

    pub fn splice(&self) -> usize {
        self.splice
    }

    pub fn weak_regions(&self) -> &[WeakRegion] {
        &self.weak_regions
    }

    pub fn precomp(&self) -> Option<&Precomp> {
        self.precomp.as_ref()
    }

    pub fn force_random_weak(&self) -> bool {
        self.force_random_weak
    }

    /// Return the number of ticks in one revolution. A tick is one unit of bit weight; with uniform
    /// timing, one bitcell.
    fn ticks_per_revolution(&self) -> f64 {
        match &self.bit_durations {
            Some(durations) => durations.iter().sum(),
            None => self.bits.len() as f64,
        }
    }

    /// Return the sample frequency of flux produced from this track, in ticks per second.
    pub fn sample_frequency(&self) -> f64 {
        self.ticks_per_revolution() / self.time_per_revolution
    }

    fn splice_at_index(&self) -> bool {
        self.splice < SPLICE_INDEX_TOLERANCE || self.bits.len() - self.splice < SPLICE_INDEX_TOLERANCE
    }

    /// Produce the flux of a read of this track beginning at the index. Two revolutions are
    /// produced unless the splice is at the index, so that a complete index-to-index revolution
    /// either side of the splice is available to decoders. Weak regions read back differently on
    /// each revolution and on each call.
    pub fn flux(&self) -> Result<FluxTiming, FluxError> {
        let mut jitter = WeakBitSource::new();
        let revs = if self.splice_at_index() { 1 } else { 2 };
        let rev_ticks = self.ticks_per_revolution();

        let mut bits = BitVec::with_capacity(self.bits.len() * revs);
        let mut weights = Vec::with_capacity(self.bits.len() * revs);
        for _ in 0..revs {
            let (rev_bits, rev_weights) = self.revolution(Some(&mut jitter));
            bits.extend(rev_bits.iter());
            weights.extend(rev_weights);
        }

        let index_positions = (1..=revs).map(|r| r as f64 * rev_ticks).collect();
        let intervals = bits_to_intervals(&bits, &weights);
        let mut flux = FluxTiming::new(index_positions, intervals, self.sample_frequency(), true)?;
        flux.set_splice_offset(Some(self.splice_ticks(&weights)));
        Ok(flux)
    }

    /// Produce flux for writing this track to a disk.
    ///
    /// * With `cue_at_index` false, the write is not synchronized to the index, and ~10% of the
    ///   stream's leading bits are written ahead of it as a header.
    /// * With the splice at the index, ~10% of the track's leading bits are appended as a footer,
    ///   so a slow drive still reaches the index before the write ends.
    /// * Otherwise, the write starts at the index with the track header repeated backwards from
    ///   the splice, runs round to the index and ends exactly at the splice on the second pass.
    pub fn flux_for_writeout(&self, cue_at_index: bool) -> Result<FluxTiming, FluxError> {
        let n = self.bits.len();
        let (rev_bits, rev_weights) = self.revolution(None);

        let (mut bits, mut weights) = match self.splice_at_index() {
            true => {
                let mut bits = rev_bits.clone();
                let mut weights = rev_weights.clone();
                bits.extend(rev_bits.iter().take(n / 10));
                weights.extend_from_slice(&rev_weights[..n / 10]);
                (bits, weights)
            }
            false => self.splice_writeout(&rev_bits, &rev_weights),
        };

        let splice_ticks = match self.splice_at_index() {
            true => 0.0,
            false => self.splice_ticks(&weights),
        };
        let rev_ticks: f64 = weights[..n].iter().sum();

        let mut index_positions = vec![rev_ticks];
        if !cue_at_index {
            let header_len = (n / 10) & !15;
            let header_ticks: f64 = weights[..header_len].iter().sum();
            let mut header_bits: BitVec = bits.iter().take(header_len).collect();
            header_bits.extend(bits.iter());
            let mut header_weights = weights[..header_len].to_vec();
            header_weights.extend_from_slice(&weights);
            bits = header_bits;
            weights = header_weights;
            index_positions = vec![header_ticks, header_ticks + rev_ticks];
        }

        let freq = self.sample_frequency();
        if let Some(precomp) = &self.precomp {
            // Weights are in ticks of the sample frequency.
            precomp.apply(&bits, &mut weights, freq);
        }

        let intervals = bits_to_intervals(&bits, &weights);
        let mut flux = FluxTiming::new(index_positions, intervals, freq, cue_at_index)?;
        flux.set_splice_offset(Some(splice_ticks));

        log::debug!(
            "MasterTrack::flux_for_writeout(): {} bits, splice: {} ({}), {}",
            bits.len(),
            self.splice,
            format_ms!(splice_ticks / freq),
            flux.summary()
        );
        Ok(flux)
    }

    /// Build the two-pass writeout of a track spliced away from the index, from one revolution
    /// rotated to the index. The span from the index to the splice is filled with the first
    /// [`HEADER_FILL_BITS`] bits written after the splice, repeated so that the last copy ends at
    /// the splice.
    fn splice_writeout(&self, rev_bits: &BitVec, rev_weights: &[f64]) -> (BitVec, Vec<f64>) {
        let n = self.bits.len();
        let period = HEADER_FILL_BITS.min(n);
        let phase = period - self.splice % period;

        let mut bits = BitVec::with_capacity(n + self.splice);
        let mut weights = Vec::with_capacity(n + self.splice);
        for i in 0..self.splice {
            let k = (self.splice + (i + phase) % period) % n;
            bits.push(rev_bits[k]);
            weights.push(rev_weights[k]);
        }
        bits.extend(rev_bits.iter().skip(self.splice));
        weights.extend_from_slice(&rev_weights[self.splice..]);
        bits.extend(rev_bits.iter().take(self.splice));
        weights.extend_from_slice(&rev_weights[..self.splice]);
        (bits, weights)
    }

    fn splice_ticks(&self, rev_weights: &[f64]) -> f64 {
        rev_weights[..self.splice].iter().sum()
    }

    /// Produce one revolution of bits and weights, with weak regions synthesized and rotated so
    /// that the first bit follows the index. Fuzzy transitions are jittered if `jitter` is given.
    fn revolution(&self, jitter: Option<&mut WeakBitSource>) -> (BitVec, Vec<f64>) {
        let n = self.bits.len();
        let mut bits = self.bits.clone();
        let mut weights = self.bit_durations.clone().unwrap_or_else(|| vec![1.0; n]);

        self.synthesize_weak(&mut bits, &mut weights, jitter);

        // bits[k] after rotation is bits[k - splice] in write order.
        let index = (n - self.splice) % n;
        weights.rotate_left(index);
        (rotate_bits(&bits, index), weights)
    }

    fn synthesize_weak(&self, bits: &mut BitVec, weights: &mut [f64], mut jitter: Option<&mut WeakBitSource>) {
        let n = bits.len();
        for region in &self.weak_regions {
            // Outside neighbours are read before the region is overwritten.
            let before = bits[(region.start + n - 1) % n];
            let after = bits[region.end() % n];

            if region.len < WEAK_FUZZY_MIN_BITS || self.force_random_weak {
                for k in 0..region.len {
                    bits.set(region.start + k, k % WEAK_FILLER_SPACING == WEAK_FILLER_SPACING / 2);
                }
            }
            else {
                for k in 0..region.len {
                    bits.set(region.start + k, (WEAK_FUZZY_WORD >> (15 - (k % 16))) & 1 != 0);
                }
                let mut word_start = region.start;
                while word_start + FUZZY_BIT + 1 < region.end() {
                    let j = match jitter.as_deref_mut() {
                        Some(source) => match source.next_bit() {
                            true => WEAK_JITTER,
                            false => -WEAK_JITTER,
                        },
                        None => 0.0,
                    };
                    weights[word_start + FUZZY_BIT] += 0.5 + j;
                    weights[word_start + FUZZY_BIT + 1] -= 0.5 + j;
                    word_start += 16;
                }
            }

            bits.set(region.start, !before);
            bits.set(region.end() - 1, !after);

            log::trace!(
                "MasterTrack::synthesize_weak(): Weak region at {} len {} ({})",
                region.start,
                region.len,
                if region.len < WEAK_FUZZY_MIN_BITS || self.force_random_weak {
                    "filler"
                }
                else {
                    "fuzzy"
                }
            );
        }
    }
}

impl FluxSource for MasterTrack {
    fn flux(&self) -> Result<FluxTiming, FluxError> {
        MasterTrack::flux(self)
    }
}

/// Convert bits and per-bit weights to flux intervals. Each `1` ends an interval. Time following
/// the last transition is not represented.
pub(crate) fn bits_to_intervals(bits: &BitVec, weights: &[f64]) -> Vec<f64> {
    let mut intervals = Vec::with_capacity(bits.len() / 2);
    let mut t = 0.0;
    for (bit, weight) in bits.iter().zip(weights.iter()) {
        t += *weight;
        if bit {
            intervals.push(t);
            t = 0.0;
        }
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::enums::TrackDataEncoding;

    fn pattern_track(n: usize) -> BitVec {
        // A simple MFM-legal pattern: 1 every 2-4 cells.
        (0..n).map(|i| [true, false, false, true, false, true, false, false, false][i % 9]).collect()
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(matches!(MasterTrack::new(BitVec::new(), 0.2), Err(FluxError::EmptyTrack)));
    }

    #[test]
    fn test_splice_validation() {
        let track = MasterTrack::new(pattern_track(100), 0.2).unwrap();
        assert!(matches!(
            track.clone().with_splice(100),
            Err(FluxError::SpliceOutOfRange { splice: 100, len: 100 })
        ));
        assert!(track.with_splice(99).is_ok());
    }

    #[test]
    fn test_weak_region_validation() {
        let mut track = MasterTrack::new(pattern_track(1000), 0.2).unwrap();
        assert!(matches!(
            track.set_weak_regions(vec![WeakRegion::new(990, 20)]),
            Err(FluxError::WeakRegionOutOfRange { .. })
        ));
        assert!(matches!(
            track.set_weak_regions(vec![WeakRegion::new(100, 50), WeakRegion::new(120, 10)]),
            Err(FluxError::WeakRegionOverlap {
                start: 120,
                prev_end: 150
            })
        ));
        track.add_weak_region(300, 10).unwrap();
        track.add_weak_region(100, 10).unwrap();
        assert_eq!(track.weak_regions()[0].start, 100);
        assert!(track.add_weak_region(105, 10).is_err());
        assert_eq!(track.weak_regions().len(), 2);
    }

    #[test]
    fn test_bit_duration_mismatch() {
        let track = MasterTrack::new(pattern_track(100), 0.2).unwrap();
        assert!(matches!(
            track.with_bit_durations(vec![1.0; 99]),
            Err(FluxError::BitDurationMismatch { bits: 100, durations: 99 })
        ));
    }

    #[test]
    fn test_read_simulation_revolutions() {
        let track = MasterTrack::new(pattern_track(900), 0.2).unwrap();
        let flux = track.flux().unwrap();
        assert!(flux.is_index_cued());
        assert_eq!(flux.index_positions(), &[900.0]);
        assert!((flux.sample_frequency() - 4500.0).abs() < 1e-9);

        let track = track.with_splice(450).unwrap();
        let flux = track.flux().unwrap();
        assert_eq!(flux.index_positions(), &[900.0, 1800.0]);
        assert_eq!(flux.splice_offset(), Some(450.0));
    }

    #[test]
    fn test_rotation_to_index() {
        // Write order starts at the splice: the first written bit sits `splice` cells after the index.
        let mut bits = BitVec::from_elem(64, false);
        bits.set(0, true);
        bits.set(63, true);
        let track = MasterTrack::new(bits, 0.2).unwrap().with_splice(10).unwrap();
        let (rotated, _) = track.revolution(None);
        assert!(rotated[10]);
        assert!(rotated[9]);
        assert_eq!(rotated.iter().filter(|b| *b).count(), 2);
    }

    #[test]
    fn test_writeout_splice_at_index() {
        let track = MasterTrack::new(pattern_track(9000), 0.2).unwrap();
        let flux = track.flux_for_writeout(true).unwrap();
        let ratio = flux.duration() / track.time_per_revolution();
        assert!(ratio > 1.09 && ratio < 1.11, "ratio: {}", ratio);
        assert_eq!(flux.splice_offset(), Some(0.0));
    }

    #[test]
    fn test_writeout_mid_track_splice() {
        let track = MasterTrack::new(pattern_track(9000), 0.2).unwrap().with_splice(4500).unwrap();
        let flux = track.flux_for_writeout(true).unwrap();
        let ratio = flux.duration() / track.time_per_revolution();
        assert!(ratio > 1.49 && ratio <= 1.5, "ratio: {}", ratio);
        assert_eq!(flux.splice_offset(), Some(4500.0));
    }

    #[test]
    fn test_writeout_header_fill() {
        let bits = pattern_track(1600);
        let splice = 810;
        let track = MasterTrack::new(bits.clone(), 0.2).unwrap().with_splice(splice).unwrap();
        let (rev_bits, rev_weights) = track.revolution(None);
        let (out, weights) = track.splice_writeout(&rev_bits, &rev_weights);
        assert_eq!(out.len(), 1600 + splice);
        assert_eq!(weights.len(), out.len());

        // Ahead of the splice, the header repeats backwards from the splice.
        for i in 0..splice {
            let back = splice - i;
            let expected = bits[(HEADER_FILL_BITS - back % HEADER_FILL_BITS) % HEADER_FILL_BITS];
            assert_eq!(out[i], expected, "bit {}", i);
        }
        // From the splice, one full track in write order, ending exactly at the splice.
        let written: BitVec = out.iter().skip(splice).collect();
        assert_eq!(written, bits);

        let flux = track.flux_for_writeout(true).unwrap();
        assert_eq!(flux.intervals(), &bits_to_intervals(&out, &weights)[..]);
        assert_eq!(flux.index_positions(), &[1600.0]);
        assert_eq!(flux.splice_offset(), Some(splice as f64));
    }

    #[test]
    fn test_writeout_uncued() {
        let track = MasterTrack::new(pattern_track(9000), 0.2).unwrap();
        let flux = track.flux_for_writeout(false).unwrap();
        assert!(!flux.is_index_cued());
        // 900 bits rounded down to a multiple of 16.
        assert_eq!(flux.index_positions(), &[896.0, 9896.0]);
    }

    #[test]
    fn test_weak_filler() {
        let mut track = MasterTrack::new(BitVec::from_elem(1000, true), 0.2).unwrap();
        track.set_weak_regions(vec![WeakRegion::new(100, 128)]).unwrap();
        let (bits, weights) = track.revolution(None);
        let ones: Vec<usize> = (100..228).filter(|i| bits[*i]).collect();
        assert_eq!(ones, vec![116, 148, 180, 212]);
        assert!(weights.iter().all(|w| *w == 1.0));
    }

    #[test]
    fn test_weak_fuzzy_words() {
        let mut track = MasterTrack::new(BitVec::from_elem(2000, false), 0.2).unwrap();
        track.set_weak_regions(vec![WeakRegion::new(160, 640)]).unwrap();
        let (bits, weights) = track.revolution(None);

        // Interior words are the fuzzy word, with the fuzzy transition centred between cells.
        for word in 1..39 {
            let start = 160 + word * 16;
            let value = (0..16).fold(0u16, |acc, k| acc << 1 | bits[start + k] as u16);
            assert_eq!(value, WEAK_FUZZY_WORD);
            assert_eq!(weights[start + FUZZY_BIT], 1.5);
            assert_eq!(weights[start + FUZZY_BIT + 1], 0.5);
        }
        // Boundary bits differ from their outside neighbours.
        assert!(bits[160]);
        assert!(bits[799]);
    }

    #[test]
    fn test_weak_jitter_varies() {
        let mut track = MasterTrack::new(BitVec::from_elem(4000, false), 0.2).unwrap();
        track.set_weak_regions(vec![WeakRegion::new(160, 3200)]).unwrap();
        let mut source = WeakBitSource::new();
        let (_, weights) = track.revolution(Some(&mut source));
        let early = (0..200).filter(|w| weights[160 + w * 16 + FUZZY_BIT] < 1.5).count();
        assert!(early > 0 && early < 200);
    }

    #[test]
    fn test_writeout_precomp() {
        let track = MasterTrack::new(pattern_track(9000), 0.2)
            .unwrap()
            .with_precomp(Some(Precomp::new(TrackDataEncoding::Mfm, 140.0)));
        let plain = MasterTrack::new(pattern_track(9000), 0.2).unwrap();
        let a = track.flux_for_writeout(true).unwrap();
        let b = plain.flux_for_writeout(true).unwrap();
        assert_eq!(a.intervals().len(), b.intervals().len());
        // Shifts are pairwise; only a pair split by the final transition can change the total.
        let t = 140e-9 * track.sample_frequency();
        assert!((a.total_ticks() - b.total_ticks()).abs() <= t + 1e-9);
        assert_ne!(a.intervals(), b.intervals());

        // GCR tracks are compensated on their adjacent ones.
        let gcr_bits: BitVec = (0..900).map(|i| [true, true, false, true, false][i % 5]).collect();
        let mut gcr = MasterTrack::new(gcr_bits, 0.2).unwrap();
        let plain = gcr.flux_for_writeout(true).unwrap();
        gcr.set_precomp(Some(Precomp::new(TrackDataEncoding::Gcr, 140.0)));
        assert_eq!(gcr.precomp().map(|p| p.encoding), Some(TrackDataEncoding::Gcr));
        let shifted = gcr.flux_for_writeout(true).unwrap();
        assert_eq!(plain.intervals().len(), shifted.intervals().len());
        assert_ne!(plain.intervals(), shifted.intervals());
    }
}
