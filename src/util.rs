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

//! Miscellaneous helpers: checksums and bit-level utilities shared by the codecs and encoders.

use bit_vec::BitVec;

/// Calculate a CRC-16/IBM-3740 (CCITT polynomial 0x1021, initial value 0xFFFF) over `data`.
/// An existing CRC may be passed in `start` to continue a running calculation.
pub fn crc_ibm_3740(data: &[u8], start: Option<u16>) -> u16 {
    const POLY: u16 = 0x1021;
    let mut crc = start.unwrap_or(0xFFFF);

    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
        }
    }
    crc
}

/// Return the bit indices at which `pattern` occurs in `bits`. Overlapping matches are reported.
/// Patterns are limited to 64 bits.
pub fn find_bit_pattern(bits: &BitVec, pattern: &[bool]) -> Vec<usize> {
    let len = pattern.len().min(64);
    if len == 0 || bits.len() < len {
        return Vec::new();
    }

    let pat = pattern[..len].iter().fold(0u64, |acc, &b| acc << 1 | b as u64);
    let mask = if len == 64 { u64::MAX } else { (1u64 << len) - 1 };

    let mut matches = Vec::new();
    let mut shift_reg = 0u64;
    for (i, bit) in bits.iter().enumerate() {
        shift_reg = shift_reg << 1 | bit as u64;
        if i + 1 >= len && (shift_reg & mask) == pat {
            matches.push(i + 1 - len);
        }
    }
    matches
}

/// Rotate a BitVec left by `n` bits, so that bit `n` becomes bit 0.
pub fn rotate_bits(bits: &BitVec, n: usize) -> BitVec {
    if bits.is_empty() {
        return BitVec::new();
    }
    let n = n % bits.len();
    bits.iter().skip(n).chain(bits.iter().take(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_ibm_3740() {
        // Standard check value for CRC-16/IBM-3740
        assert_eq!(crc_ibm_3740(b"123456789", None), 0x29B1);
        // Running calculation matches a single pass.
        let crc = crc_ibm_3740(b"1234", None);
        assert_eq!(crc_ibm_3740(b"56789", Some(crc)), 0x29B1);
        // A sector header including its own CRC yields a zero residue.
        let mut header = vec![0xA1, 0xA1, 0xA1, 0xFE, 0x00, 0x00, 0x01, 0x02];
        let crc = crc_ibm_3740(&header, None);
        header.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(crc_ibm_3740(&header, None), 0);
    }

    #[test]
    fn test_find_bit_pattern() {
        let bits = BitVec::from_bytes(&[0b1010_0101, 0b0010_1000]);
        let found = find_bit_pattern(&bits, &[true, false, true, false, false]);
        assert_eq!(found, vec![0, 5, 10]);
        let found = find_bit_pattern(&bits, &[false, false, true, false, true]);
        assert_eq!(found, vec![3, 8]);
    }

    #[test]
    fn test_rotate_bits() {
        let bits = BitVec::from_bytes(&[0b1000_0001]);
        let rotated = rotate_bits(&bits, 1);
        assert_eq!(rotated.to_bytes(), vec![0b0000_0011]);
        assert_eq!(rotate_bits(&bits, 8), bits);
    }
}
