//! Coredump structure definitions.
//!
//! A coredump is a main header followed by a sequence of sections. Every section starts
//! with a one byte tag; the sequence ends with a [`TERMINATOR_TAG`] byte, an unknown tag,
//! or the end of the buffer. All multi-byte integers are little-endian.
//!
//! The sizes of the fixed parts are derived from these layouts with
//! [`scroll::ctx::SizeWith`], so the parser never hard-codes them.
#![allow(non_camel_case_types)]

use scroll::{Pread, SizeWith};

/// The 2-byte magic at the start of a coredump.
pub const COREDUMP_MAGIC: [u8; 2] = *b"ZE";

/// The header version this implementation was written against.
pub const COREDUMP_HEADER_VERSION: u16 = 1;

/// Tag byte marking the clean end of the section sequence.
pub const TERMINATOR_TAG: u8 = 0x00;

/// Tag byte of an architecture section.
pub const ARCH_SECTION_TAG: u8 = b'A';

/// Tag byte of a memory section.
pub const MEMORY_SECTION_TAG: u8 = b'M';

/// The only memory section version that can be decoded.
pub const MEMORY_SECTION_VERSION: u16 = 1;

/// The main header at the start of a coredump.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pread, SizeWith)]
pub struct COREDUMP_HEADER {
    /// This should be [`COREDUMP_MAGIC`].
    pub magic: [u8; 2],
    pub header_version: u16,
    pub flags: u16,
    /// The pointer width of the dumped target is `2^pointer_size_exponent` bits.
    pub pointer_size_exponent: u8,
    pub reserved: u8,
    /// Length of the coredump body. Informational only, nothing relies on it.
    pub body_length: u32,
}

/// The fixed part of an architecture section.
///
/// It is followed by `payload_length` opaque bytes (usually the register block).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pread, SizeWith)]
pub struct COREDUMP_ARCH_HEADER {
    /// This should be [`ARCH_SECTION_TAG`].
    pub tag: u8,
    pub arch_type: u16,
    pub payload_length: u16,
}

/// The fixed part of a memory section.
///
/// It is followed by a start and an end address, each as wide as the pointer width
/// declared in the main header, and then by `end - start` bytes of memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pread, SizeWith)]
pub struct COREDUMP_MEM_HEADER {
    /// This should be [`MEMORY_SECTION_TAG`].
    pub tag: u8,
    /// This should be [`MEMORY_SECTION_VERSION`].
    pub version: u16,
}

/// The kinds of section tags.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SectionTag {
    /// The end of the section sequence
    Terminator = TERMINATOR_TAG,
    /// Architecture specific data, see [`COREDUMP_ARCH_HEADER`]
    Arch = ARCH_SECTION_TAG,
    /// A snapshot of a memory range, see [`COREDUMP_MEM_HEADER`]
    Memory = MEMORY_SECTION_TAG,
}

impl SectionTag {
    /// Classify a raw tag byte, `None` if the byte is not a known tag.
    pub fn from_u8(tag: u8) -> Option<SectionTag> {
        match tag {
            TERMINATOR_TAG => Some(SectionTag::Terminator),
            ARCH_SECTION_TAG => Some(SectionTag::Arch),
            MEMORY_SECTION_TAG => Some(SectionTag::Memory),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scroll::ctx::SizeWith;
    use scroll::LE;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(COREDUMP_HEADER::size_with(&LE), 12);
        assert_eq!(COREDUMP_ARCH_HEADER::size_with(&LE), 5);
        assert_eq!(COREDUMP_MEM_HEADER::size_with(&LE), 3);
    }

    #[test]
    fn test_header_layout() {
        let bytes = [
            b'Z', b'E', 0x01, 0x00, 0x34, 0x12, 0x06, 0x00, 0x78, 0x56, 0x34, 0x12,
        ];
        let header: COREDUMP_HEADER = bytes.pread_with(0, LE).unwrap();
        assert_eq!(header.magic, COREDUMP_MAGIC);
        assert_eq!(header.header_version, 1);
        assert_eq!(header.flags, 0x1234);
        assert_eq!(header.pointer_size_exponent, 6);
        assert_eq!(header.reserved, 0);
        assert_eq!(header.body_length, 0x12345678);
    }

    #[test]
    fn test_section_tags() {
        assert_eq!(SectionTag::from_u8(0), Some(SectionTag::Terminator));
        assert_eq!(SectionTag::from_u8(b'A'), Some(SectionTag::Arch));
        assert_eq!(SectionTag::from_u8(b'M'), Some(SectionTag::Memory));
        assert_eq!(SectionTag::from_u8(b'X'), None);
        assert_eq!(SectionTag::Memory as u8, MEMORY_SECTION_TAG);
    }
}
