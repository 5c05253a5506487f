//! Bounds-checked access to the bytes of a file holding a coredump.

use scroll::ctx::{SizeWith, TryFromCtx};
use scroll::{Pread, LE};

use crate::header::PointerWidth;
use crate::Error;

/// An immutable view of the whole input file.
///
/// Every read is checked against the end of the buffer first; reading past it
/// produces [`Error::Truncated`] instead of a short read.
#[derive(Debug, Clone, Copy)]
pub struct RawImage<'a> {
    data: &'a [u8],
}

impl<'a> RawImage<'a> {
    pub fn new(data: &'a [u8]) -> RawImage<'a> {
        RawImage { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole buffer.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// The number of bytes from `offset` to the end of the buffer.
    pub fn remaining(&self, offset: usize) -> usize {
        self.data.len().saturating_sub(offset)
    }

    /// The byte at `offset`, if there is one.
    pub fn byte(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }

    /// Get the `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], Error> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(Error::Truncated {
                offset,
                needed: len,
                available: self.remaining(offset),
            })
    }

    /// Read a little-endian `T` at `offset`.
    pub fn read<T>(&self, offset: usize) -> Result<T, Error>
    where
        T: TryFromCtx<'a, scroll::Endian, [u8], Error = scroll::Error>,
        T: SizeWith<scroll::Endian>,
    {
        let size = T::size_with(&LE);
        let bytes = self.bytes(offset, size)?;
        bytes.pread_with(0, LE).or(Err(Error::Truncated {
            offset,
            needed: size,
            available: self.remaining(offset),
        }))
    }

    /// Read an address as wide as `width` at `offset`.
    pub fn read_address(&self, offset: usize, width: PointerWidth) -> Result<u64, Error> {
        match width {
            PointerWidth::Bits32 => self.read::<u32>(offset).map(u64::from),
            PointerWidth::Bits64 => self.read::<u64>(offset),
        }
    }

    /// The offset of the first occurrence of `needle`.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() {
            return Some(0);
        }
        self.data
            .windows(needle.len())
            .position(|window| window == needle)
    }
}
