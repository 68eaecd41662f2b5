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

//! A [`FluxTiming`] holds the intervals between flux transitions for one capture of a track, along
//! with the positions of the index pulses observed during the capture.
//!
//! All times are expressed in ticks of `sample_frequency`. Intervals are stored as `f64` so that
//! rescaled and precompensated timings keep their sub-tick precision.

use crate::{format_ms, FluxError};

/// A sequence of flux transition intervals and index pulse positions captured from one track.
///
/// When `index_cued` is true the first interval begins exactly at an index pulse, and
/// `index_positions[k]` marks the end of revolution `k`. When it is false,
/// `index_positions[0]` marks the first index pulse and the data preceding it is a partial
/// leading revolution.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FluxTiming {
    pub(crate) index_positions: Vec<f64>,
    pub(crate) intervals: Vec<f64>,
    pub(crate) sample_frequency: f64,
    pub(crate) index_cued: bool,
    pub(crate) splice_offset: Option<f64>,
    pub(crate) sector_positions: Option<Vec<Vec<f64>>>,
}

impl FluxTiming {
    /// Create a new `FluxTiming` from cumulative index positions and flux intervals, both in ticks
    /// of `sample_frequency`.
    ///
    /// Zero-length intervals are physically meaningless and are dropped. Negative or non-finite
    /// values are rejected.
    pub fn new(
        index_positions: Vec<f64>,
        intervals: Vec<f64>,
        sample_frequency: f64,
        index_cued: bool,
    ) -> Result<Self, FluxError> {
        if !sample_frequency.is_finite() || sample_frequency <= 0.0 {
            return Err(FluxError::ParameterError(format!(
                "invalid sample frequency: {}",
                sample_frequency
            )));
        }
        if index_positions.is_empty() {
            return Err(FluxError::ParameterError("at least one index position is required".into()));
        }
        if index_positions.iter().any(|p| !p.is_finite() || *p < 0.0)
            || index_positions.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(FluxError::ParameterError(
                "index positions must be finite, non-negative and strictly increasing".into(),
            ));
        }
        if intervals.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(FluxError::ParameterError(
                "flux intervals must be finite and non-negative".into(),
            ));
        }

        let interval_ct = intervals.len();
        let intervals = Self::merge_zero_intervals(intervals);
        if intervals.len() != interval_ct {
            log::debug!(
                "FluxTiming::new(): Dropped {} zero-length flux intervals",
                interval_ct - intervals.len()
            );
        }

        Ok(FluxTiming {
            index_positions,
            intervals,
            sample_frequency,
            index_cued,
            splice_offset: None,
            sector_positions: None,
        })
    }

    /// Create a new `FluxTiming` from index pulse deltas, as reported by most capture devices:
    /// the first entry is the time from the start of the capture to the first index pulse, and each
    /// following entry is the time between consecutive index pulses.
    pub fn from_index_deltas(
        index_deltas: &[f64],
        intervals: Vec<f64>,
        sample_frequency: f64,
        index_cued: bool,
    ) -> Result<Self, FluxError> {
        let positions = index_deltas
            .iter()
            .scan(0.0, |acc, d| {
                *acc += *d;
                Some(*acc)
            })
            .collect();
        Self::new(positions, intervals, sample_frequency, index_cued)
    }

    fn merge_zero_intervals(intervals: Vec<f64>) -> Vec<f64> {
        intervals.into_iter().filter(|x| *x > 0.0).collect()
    }

    /// Return the cumulative tick positions of each index pulse.
    pub fn index_positions(&self) -> &[f64] {
        &self.index_positions
    }

    /// Return the flux transition intervals, in ticks.
    pub fn intervals(&self) -> &[f64] {
        &self.intervals
    }

    /// Return the sample frequency in ticks per second.
    pub fn sample_frequency(&self) -> f64 {
        self.sample_frequency
    }

    /// Return true if the first interval begins exactly at an index pulse.
    pub fn is_index_cued(&self) -> bool {
        self.index_cued
    }

    /// Return the tick offset of a known write splice relative to the first index, if any.
    pub fn splice_offset(&self) -> Option<f64> {
        self.splice_offset
    }

    pub fn set_splice_offset(&mut self, splice: Option<f64>) {
        self.splice_offset = splice;
    }

    /// Return the sector hole positions of a hard-sectored capture. Each entry holds the tick
    /// offsets of the sector holes within one revolution, relative to the start of that revolution.
    pub fn sector_positions(&self) -> Option<&Vec<Vec<f64>>> {
        self.sector_positions.as_ref()
    }

    pub fn set_sector_positions(&mut self, positions: Option<Vec<Vec<f64>>>) {
        self.sector_positions = positions;
    }

    /// Return the number of complete index-to-index revolutions described by the index positions.
    pub fn revolution_count(&self) -> usize {
        match self.index_cued {
            true => self.index_positions.len(),
            false => self.index_positions.len().saturating_sub(1),
        }
    }

    /// Return the start and end tick positions of revolution `rev`, if present.
    pub fn revolution_bounds(&self, rev: usize) -> Option<(f64, f64)> {
        if rev >= self.revolution_count() {
            return None;
        }
        let end_idx = if self.index_cued { rev } else { rev + 1 };
        let start = match end_idx {
            0 => 0.0,
            _ => self.index_positions[end_idx - 1],
        };
        Some((start, self.index_positions[end_idx]))
    }

    /// Return the mean length of a complete revolution in ticks, or `None` if the capture does not
    /// contain a complete revolution.
    pub fn ticks_per_revolution(&self) -> Option<f64> {
        let revs = self.revolution_count();
        if revs == 0 {
            return None;
        }
        let (start, _) = self.revolution_bounds(0)?;
        let (_, end) = self.revolution_bounds(revs - 1)?;
        Some((end - start) / revs as f64)
    }

    /// Return the total number of ticks spanned by the flux intervals.
    pub fn total_ticks(&self) -> f64 {
        self.intervals.iter().sum()
    }

    /// Return the total time spanned by the flux intervals, in seconds.
    pub fn duration(&self) -> f64 {
        self.total_ticks() / self.sample_frequency
    }

    /// Return a one-line summary of the capture, for logging.
    pub fn summary(&self) -> String {
        let rev_time = self.ticks_per_revolution().unwrap_or(0.0) / self.sample_frequency;
        format!(
            "{} flux, {} revolutions of {}, {:.3}MHz sample clock{}",
            self.intervals.len(),
            self.revolution_count(),
            format_ms!(rev_time),
            self.sample_frequency / 1e6,
            if self.index_cued { ", index cued" } else { "" }
        )
    }

    /// Drop the flux preceding the first index pulse, so that the first interval begins exactly at
    /// the index. The interval straddling the index is split and its leading part discarded.
    ///
    /// If the capture runs out of flux before the first index, the interval list is left empty.
    /// A capture without a complete revolution after the first index cannot be cued and is left
    /// unchanged.
    pub fn cue_at_index(&mut self) -> Result<(), FluxError> {
        if self.index_cued {
            return Ok(());
        }
        if self.index_positions.len() < 2 {
            return Err(FluxError::NoRevolution);
        }

        let first_index = self.index_positions[0];
        let mut to_index = first_index;
        let mut cut = None;
        for (i, x) in self.intervals.iter().enumerate() {
            to_index -= *x;
            if to_index < 0.0 {
                cut = Some(i);
                break;
            }
        }

        match cut {
            Some(i) => {
                let mut cued = Vec::with_capacity(self.intervals.len() - i);
                cued.push(-to_index);
                cued.extend_from_slice(&self.intervals[i + 1..]);
                self.intervals = cued;
            }
            None => {
                log::warn!("FluxTiming::cue_at_index(): Ran out of flux before reaching the index");
                self.intervals.clear();
            }
        }

        self.index_positions.remove(0);
        for pos in self.index_positions.iter_mut() {
            *pos -= first_index;
        }
        self.index_cued = true;
        Ok(())
    }

    /// Rescale the capture so that the recovered track is `factor` times as long, without touching
    /// the raw samples. Used to compensate for a drive spinning at a different speed than the
    /// nominal speed of the media.
    pub fn scale(&mut self, factor: f64) -> Result<(), FluxError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(FluxError::ParameterError(format!("invalid scale factor: {}", factor)));
        }
        self.sample_frequency /= factor;
        Ok(())
    }

    /// Truncate or extend the capture to exactly `revs` complete revolutions.
    ///
    /// Truncation drops the extra index positions along with all flux beginning after the new final
    /// index. Extension repeats the flux of the last complete revolution. A capture with no
    /// complete revolution cannot be extended and is left unchanged. At least one revolution must
    /// be requested.
    pub fn set_revolution_count(&mut self, revs: usize) -> Result<(), FluxError> {
        if revs == 0 {
            return Err(FluxError::ParameterError("revolution count must be at least 1".into()));
        }
        let have = self.revolution_count();
        let lead = if self.index_cued { 0 } else { 1 };

        if revs < have {
            self.index_positions.truncate(revs + lead);
            let end = self.index_positions.last().copied().unwrap_or(0.0);
            let mut t = 0.0;
            let mut keep = 0;
            for x in &self.intervals {
                if t >= end {
                    break;
                }
                t += *x;
                keep += 1;
            }
            self.intervals.truncate(keep);
            if let Some(sectors) = self.sector_positions.as_mut() {
                sectors.truncate(revs);
            }
        }
        else if revs > have {
            if have == 0 {
                log::warn!("FluxTiming::set_revolution_count(): No complete revolution to extend from");
                return Ok(());
            }
            self.extend_revolutions(revs - have);
        }
        Ok(())
    }

    fn extend_revolutions(&mut self, extra: usize) {
        let (rev_start, rev_end) = match self.revolution_bounds(self.revolution_count() - 1) {
            Some(bounds) => bounds,
            None => return,
        };
        let rev_len = rev_end - rev_start;

        // Keep only flux that ends at or before the final index, and collect the flux of the last
        // revolution as the block to repeat. The first flux of the block may straddle the
        // revolution start; only its portion after the index is repeated.
        let mut kept = Vec::with_capacity(self.intervals.len());
        let mut block = Vec::new();
        let mut t = 0.0;
        for x in &self.intervals {
            if t + *x > rev_end {
                break;
            }
            let end = t + *x;
            if end > rev_start {
                block.push(if t < rev_start { end - rev_start } else { *x });
            }
            kept.push(*x);
            t = end;
        }
        let gap = rev_end - t;

        if block.is_empty() {
            log::warn!("FluxTiming::set_revolution_count(): Last revolution contains no flux");
        }

        let mut last_index = rev_end;
        for _ in 0..extra {
            if let Some((first, rest)) = block.split_first() {
                kept.push(gap + *first);
                kept.extend_from_slice(rest);
            }
            last_index += rev_len;
            self.index_positions.push(last_index);
        }
        self.intervals = kept;

        if let Some(sectors) = self.sector_positions.as_mut() {
            if let Some(last) = sectors.last().cloned() {
                sectors.extend(std::iter::repeat(last).take(extra));
            }
        }

        log::debug!(
            "FluxTiming::set_revolution_count(): Extended to {} revolutions",
            self.revolution_count()
        );
    }

    /// Append another capture of the same track to this one. The appended capture is rescaled to
    /// this capture's sample frequency. Any flux trailing this capture's final index and the flux
    /// leading the other capture's first index are joined into a single revolution.
    pub fn append(&mut self, other: &FluxTiming) {
        let factor = self.sample_frequency / other.sample_frequency;
        let offset = self.total_ticks();

        self.intervals.extend(other.intervals.iter().map(|x| *x * factor));
        self.index_positions
            .extend(other.index_positions.iter().map(|p| *p * factor + offset));

        self.sector_positions = match (self.sector_positions.take(), other.sector_positions.as_ref()) {
            (Some(mut ours), Some(theirs)) => {
                ours.extend(
                    theirs
                        .iter()
                        .map(|rev| rev.iter().map(|p| *p * factor).collect::<Vec<_>>()),
                );
                Some(ours)
            }
            _ => None,
        };
    }

    /// Prepare captured flux for writing back to a disk. The result begins at the index and covers
    /// one full revolution, then continues into the next revolution up to the splice point. When
    /// the splice is at the index, a ~10% footer is appended instead so that a slow drive still
    /// reaches the index before the write ends.
    ///
    /// Flux beyond the first revolution is taken from the following captured revolution if one is
    /// present, otherwise it wraps around to the start of the first revolution.
    pub fn flux_for_writeout(&self, cue_at_index: bool) -> Result<FluxTiming, FluxError> {
        if !self.index_cued && self.splice_offset.is_none() {
            return Err(FluxError::NotIndexCued);
        }

        let mut cued = self.clone();
        cued.cue_at_index()?;

        let rev = match cued.index_positions.first() {
            Some(rev) if !cued.intervals.is_empty() => *rev,
            _ => return Err(FluxError::EmptyTrack),
        };

        let splice = self.splice_offset.unwrap_or(0.0);
        if !(0.0..rev).contains(&splice) {
            return Err(FluxError::SpliceOutOfRange {
                splice: splice as usize,
                len: rev as usize,
            });
        }

        let end = if splice == 0.0 { rev * 1.1 } else { rev + splice };

        // Collect the first revolution, used to wrap around if the capture runs short.
        let mut first_rev = Vec::new();
        let mut t = 0.0;
        for x in &cued.intervals {
            if t >= rev {
                break;
            }
            first_rev.push(*x);
            t += *x;
        }

        let mut out = Vec::new();
        let mut t = 0.0;
        let mut source = cued.intervals.iter().chain(first_rev.iter().cycle());
        while t < end {
            match source.next() {
                Some(x) => {
                    out.push(*x);
                    t += *x;
                }
                None => break,
            }
        }

        log::debug!(
            "FluxTiming::flux_for_writeout(): {} flux, {} of {} revolution, splice at {}",
            out.len(),
            format_ms!(t / self.sample_frequency),
            format_ms!(rev / self.sample_frequency),
            format_ms!(splice / self.sample_frequency)
        );

        Ok(FluxTiming {
            index_positions: vec![rev],
            intervals: out,
            sample_frequency: self.sample_frequency,
            index_cued: cue_at_index,
            splice_offset: Some(splice),
            sector_positions: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uncued() -> FluxTiming {
        // Leading partial revolution of 25 ticks, then two revolutions of 100 ticks.
        let intervals = vec![10.0, 10.0, 10.0, 20.0, 30.0, 30.0, 20.0, 25.0, 25.0, 25.0, 25.0, 10.0];
        FluxTiming::new(vec![25.0, 125.0, 225.0], intervals, 1_000.0, false).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(FluxTiming::new(vec![], vec![1.0], 1.0, true).is_err());
        assert!(FluxTiming::new(vec![10.0], vec![-1.0], 1.0, true).is_err());
        assert!(FluxTiming::new(vec![10.0, 5.0], vec![1.0], 1.0, true).is_err());
        assert!(FluxTiming::new(vec![10.0], vec![1.0], 0.0, true).is_err());
    }

    #[test]
    fn test_zero_intervals_merged() {
        let flux = FluxTiming::new(vec![10.0], vec![2.0, 0.0, 3.0, 0.0, 0.0, 5.0], 1.0, true).unwrap();
        assert_eq!(flux.intervals(), &[2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_from_index_deltas() {
        let flux = FluxTiming::from_index_deltas(&[25.0, 100.0, 100.0], vec![1.0; 10], 1.0, false).unwrap();
        assert_eq!(flux.index_positions(), &[25.0, 125.0, 225.0]);
        assert_eq!(flux.revolution_count(), 2);
    }

    #[test]
    fn test_cue_at_index() {
        let mut flux = uncued();
        assert_eq!(flux.revolution_count(), 2);
        flux.cue_at_index().unwrap();
        assert!(flux.is_index_cued());
        // 10 + 10 = 20, the third interval straddles the index at 25, leaving 5 ticks.
        assert_eq!(flux.intervals()[0], 5.0);
        assert_eq!(flux.intervals()[1], 20.0);
        assert_eq!(flux.index_positions(), &[100.0, 200.0]);
        assert_eq!(flux.revolution_count(), 2);
        assert_eq!(flux.ticks_per_revolution(), Some(100.0));

        // Cueing again is a no-op.
        let before = flux.clone();
        flux.cue_at_index().unwrap();
        assert_eq!(flux, before);
    }

    #[test]
    fn test_cue_at_index_runs_out() {
        let mut flux = FluxTiming::new(vec![100.0, 200.0], vec![10.0, 10.0], 1.0, false).unwrap();
        flux.cue_at_index().unwrap();
        assert!(flux.intervals().is_empty());
        assert!(flux.is_index_cued());
    }

    #[test]
    fn test_cue_at_index_needs_revolution() {
        // A single index with nothing after it leaves no revolution to cue.
        let mut flux = FluxTiming::new(vec![25.0], vec![10.0, 20.0, 30.0], 1.0, false).unwrap();
        assert_eq!(flux.cue_at_index(), Err(FluxError::NoRevolution));
        assert!(!flux.is_index_cued());
        assert_eq!(flux.index_positions(), &[25.0]);
        assert_eq!(flux.intervals(), &[10.0, 20.0, 30.0]);

        flux.set_splice_offset(Some(10.0));
        assert_eq!(flux.flux_for_writeout(true), Err(FluxError::NoRevolution));
    }

    #[test]
    fn test_scale() {
        let mut flux = uncued();
        let duration = flux.duration();
        flux.scale(1.02).unwrap();
        assert!((flux.duration() - duration * 1.02).abs() < 1e-12);
        assert_eq!(flux.intervals(), uncued().intervals());
        assert!(flux.scale(0.0).is_err());
    }

    #[test]
    fn test_set_revolution_count_truncate() {
        let mut flux = uncued();
        flux.cue_at_index().unwrap();
        flux.set_revolution_count(1).unwrap();
        assert_eq!(flux.revolution_count(), 1);
        assert_eq!(flux.index_positions(), &[100.0]);
        assert!(flux.total_ticks() >= 100.0);
        // Only the flux straddling the new final index remains past it.
        let last = *flux.intervals().last().unwrap();
        assert!(flux.total_ticks() - last < 100.0);

        // Every capture keeps at least one revolution.
        assert!(flux.set_revolution_count(0).is_err());
        assert_eq!(flux.index_positions(), &[100.0]);
    }

    #[test]
    fn test_set_revolution_count_extend() {
        let mut flux = FluxTiming::new(vec![100.0], vec![20.0, 30.0, 30.0, 15.0], 1.0, true).unwrap();
        flux.set_revolution_count(3).unwrap();
        assert_eq!(flux.revolution_count(), 3);
        assert_eq!(flux.index_positions(), &[100.0, 200.0, 300.0]);
        // The 5 tick gap before the index is folded into the first repeated flux.
        assert_eq!(
            flux.intervals(),
            &[20.0, 30.0, 30.0, 15.0, 25.0, 30.0, 30.0, 15.0, 25.0, 30.0, 30.0, 15.0]
        );
        assert_eq!(flux.total_ticks(), 295.0);
    }

    #[test]
    fn test_set_revolution_count_no_revolution() {
        let mut flux = FluxTiming::new(vec![100.0], vec![20.0, 30.0], 1.0, false).unwrap();
        assert_eq!(flux.revolution_count(), 0);
        flux.set_revolution_count(2).unwrap();
        assert_eq!(flux.revolution_count(), 0);
    }

    #[test]
    fn test_append() {
        let mut a = FluxTiming::new(vec![100.0], vec![40.0, 40.0, 40.0], 1_000.0, true).unwrap();
        let b = FluxTiming::new(vec![10.0, 60.0], vec![10.0, 20.0, 20.0, 10.0], 500.0, false).unwrap();
        a.append(&b);
        assert_eq!(a.intervals(), &[40.0, 40.0, 40.0, 20.0, 40.0, 40.0, 20.0]);
        assert_eq!(a.index_positions(), &[100.0, 140.0, 240.0]);
        assert_eq!(a.sample_frequency(), 1_000.0);
        assert_eq!(a.revolution_count(), 3);
    }

    #[test]
    fn test_flux_for_writeout_requires_cue() {
        let flux = uncued();
        let mut no_cue = flux.clone();
        no_cue.index_cued = false;
        assert!(matches!(no_cue.flux_for_writeout(true), Err(FluxError::NotIndexCued)));

        let mut spliced = flux.clone();
        spliced.set_splice_offset(Some(150.0));
        assert!(matches!(
            spliced.flux_for_writeout(true),
            Err(FluxError::SpliceOutOfRange { .. })
        ));
    }

    #[test]
    fn test_flux_for_writeout() {
        let mut flux = uncued();
        flux.cue_at_index().unwrap();

        let out = flux.flux_for_writeout(true).unwrap();
        assert!(out.is_index_cued());
        assert!(out.total_ticks() >= 110.0);
        assert!(out.total_ticks() < 140.0);

        flux.set_splice_offset(Some(50.0));
        let out = flux.flux_for_writeout(true).unwrap();
        assert!(out.total_ticks() >= 150.0);
        assert_eq!(out.splice_offset(), Some(50.0));
        assert_eq!(out.index_positions(), &[100.0]);
    }
}
