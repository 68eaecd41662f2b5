/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

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

//! The `chs` module defines structures for working with Cylinder-Head addressing of tracks and the
//! four-component sector IDs found in IBM-style sector headers.

use crate::MAXIMUM_SECTOR_SIZE;
use std::fmt::Display;

/// A structure representing the physical address of a track: a Cylinder (c) and Head (h) pair.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskCh {
    pub(crate) c: u16,
    pub(crate) h: u8,
}

impl From<(u16, u8)> for DiskCh {
    fn from((c, h): (u16, u8)) -> Self {
        Self { c, h }
    }
}

impl From<DiskChsn> for DiskCh {
    fn from(chsn: DiskChsn) -> Self {
        Self {
            c: chsn.c(),
            h: chsn.h(),
        }
    }
}

impl Display for DiskCh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{} h:{}]", self.c, self.h)
    }
}

impl DiskCh {
    /// Create a new DiskCh structure from a Cylinder (c) and Head (h) specifier.
    pub fn new(c: u16, h: u8) -> Self {
        Self { c, h }
    }
    /// Return the cylinder (c) field.
    pub fn c(&self) -> u16 {
        self.c
    }
    /// Return the head (h) field.
    pub fn h(&self) -> u8 {
        self.h
    }
}

/// A structure representing the four components of a sector header:
///  - Cylinder ID (c)
///  - Head ID (h)
///  - Sector ID (s)
///  - Sector Size (n)
///
/// The values stored in a sector header need not match the physical track the header was found
/// on. Copy protection schemes in particular are fond of mismatched IDs.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskChsn {
    c: u16,
    h: u8,
    s: u8,
    n: u8,
}

impl Default for DiskChsn {
    fn default() -> Self {
        Self { c: 0, h: 0, s: 1, n: 2 }
    }
}

impl From<(u16, u8, u8, u8)> for DiskChsn {
    fn from((c, h, s, n): (u16, u8, u8, u8)) -> Self {
        Self { c, h, s, n }
    }
}

impl Display for DiskChsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{:2} h:{} s:{:3} n:{}]", self.c, self.h, self.s, self.n)
    }
}

impl DiskChsn {
    /// Create a new DiskChsn structure from the four sector ID components.
    pub fn new(c: u16, h: u8, s: u8, n: u8) -> Self {
        Self { c, h, s, n }
    }

    /// Return the cylinder (c) field.
    #[inline]
    pub fn c(&self) -> u16 {
        self.c
    }
    /// Return the head (h) field.
    #[inline]
    pub fn h(&self) -> u8 {
        self.h
    }
    /// Return the sector id (s) field.
    #[inline]
    pub fn s(&self) -> u8 {
        self.s
    }
    /// Return the size (n) field.
    #[inline]
    pub fn n(&self) -> u8 {
        self.n
    }
    /// Return the size of the 'n' parameter in bytes.
    /// The formula for calculating size from n is (128 * 2^n)
    /// We enforce a maximum size of 8192 bytes for a single sector.
    #[inline]
    pub fn n_size(&self) -> usize {
        Self::n_to_bytes(self.n)
    }
    /// Convert a sector size parameter `n` to a size in bytes.
    pub fn n_to_bytes(n: u8) -> usize {
        match n {
            0..=6 => std::cmp::min(MAXIMUM_SECTOR_SIZE, 128usize << n),
            _ => MAXIMUM_SECTOR_SIZE,
        }
    }
    /// Return true if the cylinder and head of this ID match the specified track address.
    #[inline]
    pub fn matches_ch(&self, ch: DiskCh) -> bool {
        self.c == ch.c && self.h == ch.h
    }
    /// Return the four ID bytes as they are recorded in an IBM sector header.
    pub fn to_header_bytes(&self) -> [u8; 4] {
        [self.c as u8, self.h, self.s, self.n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n_size() {
        assert_eq!(DiskChsn::new(0, 0, 1, 0).n_size(), 128);
        assert_eq!(DiskChsn::new(0, 0, 1, 2).n_size(), 512);
        assert_eq!(DiskChsn::new(0, 0, 1, 6).n_size(), 8192);
        // Out of range size codes are clamped
        assert_eq!(DiskChsn::new(0, 0, 1, 7).n_size(), MAXIMUM_SECTOR_SIZE);
        assert_eq!(DiskChsn::new(0, 0, 1, 255).n_size(), MAXIMUM_SECTOR_SIZE);
    }

    #[test]
    fn test_matches_ch() {
        let id = DiskChsn::new(39, 1, 9, 2);
        assert!(id.matches_ch(DiskCh::new(39, 1)));
        assert!(!id.matches_ch(DiskCh::new(39, 0)));
        assert_eq!(id.to_header_bytes(), [39, 1, 9, 2]);
    }
}
