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

    tests/common/mod.rs

    Common support routines for tests
*/
#![allow(dead_code)]

use fluxcell::{codec::encoding::BitWriter, prelude::*};

use bit_vec::BitVec;
use rand::{rngs::StdRng, Rng, SeedableRng};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Return `len` bytes of seeded random data.
pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen::<u8>()).collect()
}

/// MFM-encode `bytes` into a bitcell stream.
pub fn mfm_bits(bytes: &[u8]) -> BitVec {
    let mut w = BitWriter::new(TrackDataEncoding::Mfm, bytes.len() * 16);
    w.push_bytes(bytes);
    w.into_bits()
}

/// A 300RPM 250Kbps MFM track of seeded random data: 100,000 bitcells.
pub fn random_mfm_track(seed: u64) -> BitVec {
    mfm_bits(&random_bytes(seed, 6250))
}

/// Create a codec for `ch` in `format` with every sector filled from seeded random data.
pub fn filled_track(format: TrackFormat, ch: DiskCh, seed: u64) -> IbmTrack {
    let layout = format.layout();
    let mut track = IbmTrack::new(ch, layout.clone());
    let img = random_bytes(seed, layout.sector_size() * layout.sector_ct as usize);
    assert_eq!(track.set_img_track(&img), img.len());
    track
}

/// Decode a data byte at `offset` from a bitcell stream.
pub fn data_byte(bits: &BitVec, offset: usize) -> u8 {
    (0..8).fold(0u8, |acc, i| acc << 1 | bits[offset + 2 * i + 1] as u8)
}

/// Displace each flux transition of `flux` by a uniformly random amount of up to `bitcells`
/// bitcells of `period` seconds, without accumulating the displacement along the track.
pub fn jitter_flux(flux: &FluxTiming, period: f64, bitcells: f64, seed: u64) -> FluxTiming {
    let mut rng = StdRng::seed_from_u64(seed);
    let max = bitcells * period * flux.sample_frequency();

    let mut t = 0.0;
    let mut prev = 0.0;
    let mut intervals = Vec::with_capacity(flux.intervals().len());
    for x in flux.intervals() {
        t += *x;
        let moved = t + rng.gen_range(-max..max);
        intervals.push(moved - prev);
        prev = moved;
    }
    FluxTiming::new(
        flux.index_positions().to_vec(),
        intervals,
        flux.sample_frequency(),
        flux.is_index_cued(),
    )
    .unwrap()
}
