//! Memory sections and the list of memory regions of a coredump.

use std::convert::TryFrom;
use std::io::{self, Write};

use coredump_common::format as md;
use range_map::{Range, RangeMap};
use scroll::ctx::SizeWith;
use scroll::LE;
use tracing::warn;

use crate::header::PointerWidth;
use crate::image::RawImage;
use crate::Error;

/// The number of leading bytes of a region shown by [`CoredumpMemory::print`].
const PREVIEW_SIZE: usize = 16;

/// A region of memory contained in a coredump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoredumpMemory<'a> {
    /// The offset of the section's tag byte in the file.
    pub offset: usize,
    /// The address of the first byte of the region.
    pub start: u64,
    /// The address just past the last byte of the region.
    pub end: u64,
    /// `end - start`
    pub size: u64,
    /// The contents of the region, exactly `size` bytes.
    pub bytes: &'a [u8],
}

impl<'a> CoredumpMemory<'a> {
    /// Read the memory section whose tag is at `offset`, with addresses as wide as `width`.
    ///
    /// Returns the region and the number of bytes the section occupies.
    pub fn read(
        image: &RawImage<'a>,
        offset: usize,
        width: PointerWidth,
    ) -> Result<(CoredumpMemory<'a>, usize), Error> {
        let raw: md::COREDUMP_MEM_HEADER = image.read(offset)?;
        if raw.version != md::MEMORY_SECTION_VERSION {
            return Err(Error::VersionMismatch {
                expected: md::MEMORY_SECTION_VERSION,
                got: raw.version,
            });
        }

        let mut cursor = offset + md::COREDUMP_MEM_HEADER::size_with(&LE);
        // Check the whole address pair up front so a truncation is reported against it.
        image.bytes(cursor, 2 * width.size_in_bytes())?;
        let start = image.read_address(cursor, width)?;
        cursor += width.size_in_bytes();
        let end = image.read_address(cursor, width)?;
        cursor += width.size_in_bytes();

        if end < start {
            return Err(Error::InvalidRange { start, end });
        }
        let size = end - start;
        let bytes = image.bytes(cursor, usize::try_from(size).unwrap_or(usize::MAX))?;
        cursor += bytes.len();

        Ok((
            CoredumpMemory {
                offset,
                start,
                end,
                size,
                bytes,
            },
            cursor - offset,
        ))
    }

    /// The range of addresses covered by this region, `None` if it is empty.
    pub fn memory_range(&self) -> Option<Range<u64>> {
        if self.size == 0 {
            return None;
        }
        Some(Range::new(self.start, self.end - 1))
    }

    /// Write a human-readable description of this `CoredumpMemory` to `f`.
    pub fn print<T: Write>(&self, f: &mut T) -> io::Result<()> {
        let preview = &self.bytes[..self.bytes.len().min(PREVIEW_SIZE)];
        write!(
            f,
            "COREDUMP_MEM_HEADER
  offset        = {:#x}
  start_address = {:#x}
  end_address   = {:#x}
  size          = {}
  data[..{}]    = {}

",
            self.offset,
            self.start,
            self.end,
            self.size,
            preview.len(),
            bytes_to_hex(preview),
        )
    }
}

/// Format `bytes` as a String of hex digits
fn bytes_to_hex(bytes: &[u8]) -> String {
    let hex_bytes: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    hex_bytes.join("")
}

/// The memory regions of a coredump, in file order.
#[derive(Debug, Clone)]
pub struct CoredumpMemoryList<'a> {
    regions: Vec<CoredumpMemory<'a>>,
    /// Map from address range to index in regions. Use
    /// [`CoredumpMemoryList::memory_at_address`].
    regions_by_addr: RangeMap<u64, usize>,
}

impl<'a> CoredumpMemoryList<'a> {
    /// Return an empty `CoredumpMemoryList`.
    pub fn new() -> CoredumpMemoryList<'a> {
        CoredumpMemoryList {
            regions: vec![],
            regions_by_addr: RangeMap::new(),
        }
    }

    /// Create a `CoredumpMemoryList` from regions in file order.
    ///
    /// When regions overlap, the address lookup keeps the one with the lowest start
    /// address and ignores the others; they are still part of the list.
    pub fn from_regions(regions: Vec<CoredumpMemory<'a>>) -> CoredumpMemoryList<'a> {
        let ranges = regions
            .iter()
            .enumerate()
            .filter_map(|(i, region)| region.memory_range().map(|range| (range, i)));
        let regions_by_addr = RangeMap::try_from_iter(ranges).unwrap_or_else(|err| {
            for (range, index) in &err.discarded {
                warn!(
                    "Memory region {} ({:#x}..={:#x}) overlaps another region, ignoring it for address lookups",
                    index, range.start, range.end,
                );
            }
            err.non_overlapping
        });

        CoredumpMemoryList {
            regions,
            regions_by_addr,
        }
    }

    /// Return the region containing `address`, if one exists.
    pub fn memory_at_address(&self, address: u64) -> Option<&CoredumpMemory<'a>> {
        self.regions_by_addr
            .get(address)
            .map(|&index| &self.regions[index])
    }

    /// Iterate over the memory regions in the order contained in the coredump.
    pub fn iter<'slf>(&'slf self) -> impl Iterator<Item = &'slf CoredumpMemory<'a>> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Write a human-readable description of this `CoredumpMemoryList` to `f`.
    pub fn print<T: Write>(&self, f: &mut T) -> io::Result<()> {
        write!(
            f,
            "CoredumpMemoryList
  region_count = {}

",
            self.regions.len()
        )?;
        for (i, region) in self.regions.iter().enumerate() {
            writeln!(f, "region[{}]", i)?;
            region.print(f)?;
        }
        Ok(())
    }
}

impl<'a> Default for CoredumpMemoryList<'a> {
    fn default() -> Self {
        Self::new()
    }
}
