//! Locating a coredump inside a host file and decoding its main header.

use std::fmt;
use std::io::{self, Write};

use coredump_common::format as md;
use scroll::ctx::SizeWith;
use scroll::LE;
use tracing::{debug, warn};

use crate::image::RawImage;
use crate::Error;

/// The width of a pointer on the dumped target.
///
/// It decides how wide the addresses in memory sections are.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    /// Resolve the width declared as `2^exponent` bits in the main header.
    pub fn from_exponent(exponent: u8) -> Option<PointerWidth> {
        match 1u32.checked_shl(u32::from(exponent))? {
            32 => Some(PointerWidth::Bits32),
            64 => Some(PointerWidth::Bits64),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            PointerWidth::Bits32 => 32,
            PointerWidth::Bits64 => 64,
        }
    }

    pub fn size_in_bytes(self) -> usize {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }
}

impl fmt::Display for PointerWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// The decoded main header of a coredump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainHeader {
    /// The raw header from the file.
    pub raw: md::COREDUMP_HEADER,
    /// The pointer width resolved from `raw.pointer_size_exponent`.
    pub pointer_width: PointerWidth,
}

impl MainHeader {
    /// The size of the main header in the file.
    pub fn size() -> usize {
        md::COREDUMP_HEADER::size_with(&LE)
    }

    /// Decode the main header at `offset`.
    ///
    /// The magic and the pointer width are the only fields that are checked.
    pub fn read(image: &RawImage<'_>, offset: usize) -> Result<MainHeader, Error> {
        let raw: md::COREDUMP_HEADER = image.read(offset)?;
        if raw.magic != md::COREDUMP_MAGIC {
            return Err(Error::NotFound);
        }
        let pointer_width = PointerWidth::from_exponent(raw.pointer_size_exponent).ok_or(
            Error::UnsupportedPointerWidth {
                exponent: raw.pointer_size_exponent,
            },
        )?;
        if raw.header_version != md::COREDUMP_HEADER_VERSION {
            warn!(
                "Coredump header version {} (expected {}), decoding anyway",
                raw.header_version,
                md::COREDUMP_HEADER_VERSION
            );
        }
        Ok(MainHeader { raw, pointer_width })
    }

    pub fn header_version(&self) -> u16 {
        self.raw.header_version
    }

    pub fn flags(&self) -> u16 {
        self.raw.flags
    }

    pub fn pointer_size_exponent(&self) -> u8 {
        self.raw.pointer_size_exponent
    }

    pub fn body_length(&self) -> u32 {
        self.raw.body_length
    }

    /// Write a human-readable description of this `MainHeader` to `f`.
    pub fn print<T: Write>(&self, f: &mut T) -> io::Result<()> {
        write!(
            f,
            "COREDUMP_HEADER
  magic                 = {:?}
  header_version        = {}
  flags                 = {:#x}
  pointer_size_exponent = {} ({})
  reserved              = {:#x}
  body_length           = {}

",
            String::from_utf8_lossy(&self.raw.magic),
            self.raw.header_version,
            self.raw.flags,
            self.raw.pointer_size_exponent,
            self.pointer_width,
            self.raw.reserved,
            self.raw.body_length,
        )
    }
}

/// Find the first coredump magic in `image` and decode the main header there.
///
/// Returns the offset of the magic, which is where the coredump starts. The
/// first section starts [`MainHeader::size`] bytes later.
pub fn locate(image: &RawImage<'_>) -> Result<(usize, MainHeader), Error> {
    let start = image.find(&md::COREDUMP_MAGIC).ok_or(Error::NotFound)?;
    debug!("Coredump magic found at offset {:#x}", start);
    let header = MainHeader::read(image, start)?;
    debug!(
        "Coredump header version {}, {} pointers, body_length {}",
        header.header_version(),
        header.pointer_width,
        header.body_length()
    );
    Ok((start, header))
}
