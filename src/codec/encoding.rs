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
//! FM and MFM bitcell encoding helpers.
//!
//! Both encodings spend two bitcells per data bit: a clock cell followed by a data cell. FM always
//! writes a clock transition; MFM writes one only between two zero data bits. Decoding is the same
//! for both, reading the data cells at odd offsets.

use crate::types::enums::TrackDataEncoding;
use bit_vec::BitVec;

/// Builds an FM or MFM encoded bitcell stream.
pub struct BitWriter {
    encoding: TrackDataEncoding,
    bits: BitVec,
    prev: bool,
}

impl BitWriter {
    pub fn new(encoding: TrackDataEncoding, capacity: usize) -> Self {
        BitWriter {
            encoding,
            bits: BitVec::with_capacity(capacity),
            prev: false,
        }
    }

    pub fn push_byte(&mut self, byte: u8) {
        for i in (0..8).rev() {
            let bit = byte & (1 << i) != 0;
            let clock = match self.encoding {
                TrackDataEncoding::Mfm => !self.prev && !bit,
                _ => true,
            };
            self.bits.push(clock);
            self.bits.push(bit);
            self.prev = bit;
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.push_byte(*byte);
        }
    }

    pub fn push_repeat(&mut self, byte: u8, count: usize) {
        for _ in 0..count {
            self.push_byte(byte);
        }
    }

    /// Push a raw 16-bit cell pattern, as used for address marks with missing clocks.
    pub fn push_raw(&mut self, word: u16) {
        for i in (0..16).rev() {
            self.bits.push(word & (1 << i) != 0);
        }
        self.prev = word & 1 != 0;
    }

    /// Return the current length in bytes (16 bitcells per byte).
    pub fn byte_len(&self) -> usize {
        self.bits.len() / 16
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn into_bits(self) -> BitVec {
        self.bits
    }
}

/// Decode one byte starting at bitcell `offset`. The first cell is a clock cell.
pub fn decode_byte(bits: &BitVec, offset: usize) -> Option<u8> {
    if offset + 16 > bits.len() {
        return None;
    }
    Some((0..8).fold(0u8, |acc, i| acc << 1 | bits[offset + 2 * i + 1] as u8))
}

/// Decode `len` consecutive bytes starting at bitcell `offset`.
pub fn decode_bytes(bits: &BitVec, offset: usize, len: usize) -> Option<Vec<u8>> {
    if offset + len * 16 > bits.len() {
        return None;
    }
    (0..len).map(|i| decode_byte(bits, offset + i * 16)).collect()
}
