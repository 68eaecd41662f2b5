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

//! Write precompensation.
//!
//! Magnetic write heads shift closely spaced transitions away from each other. Precompensation
//! counters this by writing the affected transitions slightly early or late. The adjustment is
//! applied to per-bit timing weights; every shift moves time between two adjacent bits, so the
//! total track time is unchanged.

use crate::{types::enums::TrackDataEncoding, util::find_bit_pattern};
use bit_vec::BitVec;

const MFM_EARLY: [bool; 5] = [true, false, true, false, false];
const MFM_LATE: [bool; 5] = [false, false, true, false, true];
const ADJACENT_EARLY: [bool; 3] = [true, true, false];
const ADJACENT_LATE: [bool; 3] = [false, true, true];

/// A write precompensation policy.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Precomp {
    /// The encoding family, which selects the bit patterns that are compensated.
    pub encoding: TrackDataEncoding,
    /// The shift applied to each affected transition, in nanoseconds.
    pub ns: f64,
}

impl Precomp {
    pub fn new(encoding: TrackDataEncoding, ns: f64) -> Self {
        Precomp { encoding, ns }
    }

    /// Apply precompensation to the timing `weights` of `bits`. `ticks_per_second` converts the
    /// configured shift to weight units.
    pub fn apply(&self, bits: &BitVec, weights: &mut [f64], ticks_per_second: f64) {
        let t = self.ns * 1e-9 * ticks_per_second;
        let mut shifted = 0;

        if self.encoding == TrackDataEncoding::Mfm {
            for i in find_bit_pattern(bits, &MFM_EARLY) {
                weights[i + 2] -= t;
                weights[i + 3] += t;
                shifted += 1;
            }
            for i in find_bit_pattern(bits, &MFM_LATE) {
                weights[i + 2] += t;
                weights[i + 3] -= t;
                shifted += 1;
            }
        }

        // Adjacent ones only occur in FM and GCR, or in deliberately illegal MFM.
        for i in find_bit_pattern(bits, &ADJACENT_EARLY) {
            weights[i + 1] -= t;
            weights[i + 2] += t;
            shifted += 1;
        }
        for i in find_bit_pattern(bits, &ADJACENT_LATE) {
            weights[i + 1] += t;
            weights[i + 2] -= t;
            shifted += 1;
        }

        log::debug!(
            "Precomp::apply(): {} encoding, shifted {} transitions by {:.1}ns ({:.4} ticks)",
            self.encoding,
            shifted,
            self.ns,
            t
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> BitVec {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn test_mfm_precomp() {
        let b = bits("0010100100");
        let mut weights = vec![1.0; b.len()];
        // 1 tick per ns.
        Precomp::new(TrackDataEncoding::Mfm, 0.25).apply(&b, &mut weights, 1e9);

        // "10100" at 2 shifts the transition at 4 early; "00101" at 0 shifts the transition at 2 late.
        let expected = [1.0, 1.0, 1.25, 0.75, 0.75, 1.25, 1.0, 1.0, 1.0, 1.0];
        for (w, e) in weights.iter().zip(expected.iter()) {
            assert!((w - e).abs() < 1e-12);
        }
        assert!((weights.iter().sum::<f64>() - b.len() as f64).abs() < 1e-12);
    }

    #[test]
    fn test_adjacent_precomp() {
        let b = bits("0110");
        let mut weights = vec![1.0; 4];
        Precomp::new(TrackDataEncoding::Fm, 0.1).apply(&b, &mut weights, 1e9);
        assert!((weights[1] - 1.1).abs() < 1e-12);
        assert!((weights[2] - 0.8).abs() < 1e-12);
        assert!((weights[3] - 1.1).abs() < 1e-12);
        assert!((weights.iter().sum::<f64>() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_gcr_precomp() {
        // An MFM early pattern at 2 and adjacent ones at 7 and 8.
        let b = bits("0010100110");
        let mut gcr = vec![1.0; b.len()];
        Precomp::new(TrackDataEncoding::Gcr, 0.1).apply(&b, &mut gcr, 1e9);
        let expected = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.1, 0.8, 1.1];
        for (w, e) in gcr.iter().zip(expected.iter()) {
            assert!((w - e).abs() < 1e-12, "{:?}", gcr);
        }

        // MFM compensates the same adjacent ones, and the MFM pattern as well.
        let mut mfm = vec![1.0; b.len()];
        Precomp::new(TrackDataEncoding::Mfm, 0.1).apply(&b, &mut mfm, 1e9);
        assert!((mfm[4] - 0.9).abs() < 1e-12);
        assert!((mfm[5] - 1.1).abs() < 1e-12);
        assert_eq!(&mfm[7..], &gcr[7..]);
    }
}
