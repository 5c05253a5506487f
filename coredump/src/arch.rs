//! Architecture sections.

use std::io::{self, Write};

use coredump_common::format as md;
use scroll::ctx::SizeWith;
use scroll::LE;

use crate::image::RawImage;
use crate::Error;

/// An architecture section of a coredump.
///
/// The payload is usually the register block of the crashed thread. It is exposed
/// as-is and not interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoredumpArch<'a> {
    /// The offset of the section's tag byte in the file.
    pub offset: usize,
    /// The raw section header.
    pub raw: md::COREDUMP_ARCH_HEADER,
    /// The opaque payload.
    pub payload: &'a [u8],
}

impl<'a> CoredumpArch<'a> {
    /// Read the architecture section whose tag is at `offset`.
    ///
    /// Returns the section and the number of bytes it occupies.
    pub fn read(image: &RawImage<'a>, offset: usize) -> Result<(CoredumpArch<'a>, usize), Error> {
        let raw: md::COREDUMP_ARCH_HEADER = image.read(offset)?;
        let header_size = md::COREDUMP_ARCH_HEADER::size_with(&LE);
        let payload = image.bytes(offset + header_size, usize::from(raw.payload_length))?;
        Ok((
            CoredumpArch {
                offset,
                raw,
                payload,
            },
            header_size + payload.len(),
        ))
    }

    pub fn arch_type(&self) -> u16 {
        self.raw.arch_type
    }

    /// Write a human-readable description of this `CoredumpArch` to `f`.
    pub fn print<T: Write>(&self, f: &mut T) -> io::Result<()> {
        write!(
            f,
            "COREDUMP_ARCH_HEADER
  offset         = {:#x}
  arch_type      = {:#x}
  payload_length = {}

",
            self.offset, self.raw.arch_type, self.raw.payload_length,
        )
    }
}
