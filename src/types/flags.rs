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

    src/types/flags.rs

    Defines common bitflags
*/
use bitflags::bitflags;

bitflags! {
    /// Status flags of a decoded sector record. Header and data validity are tracked
    /// independently - a sector may have a valid header but corrupt data.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[rustfmt::skip]
    pub struct SectorStatus: u32 {
        #[doc = "The sector header (address field) passed its checksum"]
        const HEADER_VALID  = 0b0000_0000_0000_0001;
        #[doc = "The sector data field passed its checksum"]
        const DATA_VALID    = 0b0000_0000_0000_0010;
        #[doc = "The sector data was written with a deleted data address mark"]
        const DELETED       = 0b0000_0000_0000_0100;
        #[doc = "A header was found but no data field followed it within the expected window"]
        const NO_DATA       = 0b0000_0000_0000_1000;
    }
}

impl SectorStatus {
    /// Return true if both the header and data of the sector are valid.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.contains(SectorStatus::HEADER_VALID | SectorStatus::DATA_VALID)
    }

    /// Return true if the sector data is valid.
    #[inline]
    pub fn data_valid(&self) -> bool {
        self.contains(SectorStatus::DATA_VALID)
    }

    /// Return true if the sector header is valid.
    #[inline]
    pub fn header_valid(&self) -> bool {
        self.contains(SectorStatus::HEADER_VALID)
    }
}
