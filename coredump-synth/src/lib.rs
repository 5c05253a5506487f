// Copyright 2016 Ted Mielczarek. See the COPYRIGHT
// file at the top-level directory of this distribution.

//! Synthetic Coredumps for Testing
//!
//! This intentionally writes every field by hand instead of going through
//! coredump-common's layouts, so that incorrect changes to coredump-common itself
//! are caught by the tests that use it. It exists as a dev-dependency of the
//! coredump and coredump-strip crates.
//!
//! Basic usage is to create a [SynthCoredump][], use its methods to build up the binary,
//! and then `finish()` to write the binary to a buffer. Then you can either write
//! that to disk as an actual file or feed it directly to the coredump crate.

// Some test_assembler types do not have Debug, so be a bit more lenient here.
#![allow(missing_debug_implementations)]

use coredump_common::format as md;
use test_assembler::*;

/// Everything is little-endian in a coredump.
const ENDIAN: Endian = Endian::Little;

/// Fields of the main header that tests may want to vary.
#[derive(Clone, Copy, Debug)]
pub struct Header {
    pub magic: [u8; 2],
    pub header_version: u16,
    pub flags: u16,
    pub pointer_size_exponent: u8,
    pub reserved: u8,
}

impl Default for Header {
    fn default() -> Header {
        Header {
            magic: md::COREDUMP_MAGIC,
            header_version: md::COREDUMP_HEADER_VERSION,
            flags: 0,
            // 32-bit pointers
            pointer_size_exponent: 5,
            reserved: 0,
        }
    }
}

/// A writer of synthetic coredumps.
pub struct SynthCoredump {
    /// Host file contents that precede the coredump.
    prefix: Section,
    /// The main header.
    header: Section,
    /// The size of `body`, for the header.
    body_length: Label,
    /// The sections following the header.
    body: Section,
    /// Host file contents that follow the coredump.
    trailer: Section,
    /// Width in bytes of the addresses in memory sections.
    address_size: usize,
}

impl SynthCoredump {
    /// Create a `SynthCoredump` for a target with 32-bit pointers.
    pub fn new() -> SynthCoredump {
        SynthCoredump::with_header(Header::default())
    }

    /// Create a `SynthCoredump` with `2^exponent`-bit pointers.
    pub fn with_pointer_size_exponent(exponent: u8) -> SynthCoredump {
        SynthCoredump::with_header(Header {
            pointer_size_exponent: exponent,
            ..Header::default()
        })
    }

    /// Create a `SynthCoredump` whose main header holds `header`.
    ///
    /// Memory sections use 8-byte addresses when the exponent is 6 and 4-byte
    /// addresses otherwise.
    pub fn with_header(header: Header) -> SynthCoredump {
        let body_length = Label::new();
        let section = Section::with_endian(ENDIAN)
            .append_bytes(&header.magic)
            .D16(header.header_version)
            .D16(header.flags)
            .D8(header.pointer_size_exponent)
            .D8(header.reserved)
            .D32(&body_length);
        assert_eq!(section.size(), 12);
        SynthCoredump {
            prefix: Section::with_endian(ENDIAN),
            header: section,
            body_length,
            body: Section::with_endian(ENDIAN),
            trailer: Section::with_endian(ENDIAN),
            address_size: if header.pointer_size_exponent == 6 { 8 } else { 4 },
        }
    }

    /// Put `bytes` in front of the coredump, as the host file would.
    pub fn with_prefix(mut self, bytes: &[u8]) -> SynthCoredump {
        self.prefix = self.prefix.append_bytes(bytes);
        self
    }

    /// Put `bytes` after the coredump, as padding or unrelated data would.
    pub fn with_trailer(mut self, bytes: &[u8]) -> SynthCoredump {
        self.trailer = self.trailer.append_bytes(bytes);
        self
    }

    /// Append an architecture section.
    pub fn add_arch(mut self, arch: Arch) -> SynthCoredump {
        let payload_length = arch
            .payload_length
            .unwrap_or(arch.payload.size() as u16);
        let section = Section::with_endian(ENDIAN)
            .D8(md::ARCH_SECTION_TAG)
            .D16(arch.arch_type)
            .D16(payload_length)
            .append_section(arch.payload);
        self.body = self.body.append_section(section);
        self
    }

    /// Append a memory section.
    pub fn add_memory(mut self, memory: Memory) -> SynthCoredump {
        let end = memory
            .end
            .unwrap_or(memory.address + memory.section.size());
        let section = Section::with_endian(ENDIAN)
            .D8(md::MEMORY_SECTION_TAG)
            .D16(memory.version);
        let section = if self.address_size == 8 {
            section.D64(memory.address).D64(end)
        } else {
            section.D32(memory.address as u32).D32(end as u32)
        };
        self.body = self.body.append_section(section.append_section(memory.section));
        self
    }

    /// Append arbitrary contents to the section sequence.
    pub fn add_raw(mut self, section: Section) -> SynthCoredump {
        self.body = self.body.append_section(section);
        self
    }

    /// Append the terminator tag.
    pub fn terminate(mut self) -> SynthCoredump {
        self.body = self.body.D8(md::TERMINATOR_TAG);
        self
    }

    /// Finish generating the coredump and return the contents of the whole file.
    pub fn finish(self) -> Option<Vec<u8>> {
        self.body_length.set_const(self.body.size());
        self.prefix
            .append_section(self.header)
            .append_section(self.body)
            .append_section(self.trailer)
            .get_contents()
    }
}

impl Default for SynthCoredump {
    fn default() -> Self {
        Self::new()
    }
}

/// An architecture section.
pub struct Arch {
    arch_type: u16,
    payload: Section,
    /// Overrides the length written in the header.
    payload_length: Option<u16>,
}

impl Arch {
    pub fn new(arch_type: u16, payload: &[u8]) -> Arch {
        Arch {
            arch_type,
            payload: Section::with_endian(ENDIAN).append_bytes(payload),
            payload_length: None,
        }
    }

    /// Declare `length` payload bytes regardless of how many are actually present.
    pub fn payload_length(mut self, length: u16) -> Arch {
        self.payload_length = Some(length);
        self
    }
}

/// A memory section: a snapshot of the memory starting at `address`.
pub struct Memory {
    section: Section,
    pub address: u64,
    /// Overrides the end address, which is otherwise `address + section.size()`.
    end: Option<u64>,
    version: u16,
}

impl Memory {
    /// Create a new `Memory` object representing memory starting at `address`,
    /// containing the contents of `section`.
    pub fn with_section(section: Section, address: u64) -> Memory {
        Memory {
            section,
            address,
            end: None,
            version: md::MEMORY_SECTION_VERSION,
        }
    }

    /// Shorthand for a `Memory` holding exactly `bytes`.
    pub fn with_bytes(bytes: &[u8], address: u64) -> Memory {
        Memory::with_section(Section::with_endian(ENDIAN).append_bytes(bytes), address)
    }

    /// Write `end` as the end address instead of the real end of the contents.
    pub fn end_address(mut self, end: u64) -> Memory {
        self.end = Some(end);
        self
    }

    /// Write `version` as the section version.
    pub fn version(mut self, version: u16) -> Memory {
        self.version = version;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_empty_coredump() {
        let contents = SynthCoredump::new().finish().unwrap();
        assert_eq!(contents, b"ZE\x01\x00\x00\x00\x05\x00\x00\x00\x00\x00");
    }

    #[test]
    fn test_body_length() {
        let contents = SynthCoredump::new()
            .add_arch(Arch::new(3, &[1, 2, 3, 4]))
            .terminate()
            .with_trailer(&[0xff; 7])
            .finish()
            .unwrap();
        // 5 + 4 bytes of arch section, 1 terminator; the trailer doesn't count.
        assert_eq!(&contents[8..12], &[10, 0, 0, 0]);
        assert_eq!(contents.len(), 12 + 10 + 7);
    }

    #[test]
    fn test_memory_32() {
        let contents = SynthCoredump::new()
            .add_memory(Memory::with_bytes(&[0xaa; 2], 0x1000))
            .finish()
            .unwrap();
        assert_eq!(
            &contents[12..],
            &[b'M', 1, 0, 0x00, 0x10, 0, 0, 0x02, 0x10, 0, 0, 0xaa, 0xaa]
        );
    }

    #[test]
    fn test_memory_64() {
        let contents = SynthCoredump::with_pointer_size_exponent(6)
            .add_memory(Memory::with_bytes(&[0xbb], 0x1_0000_0000).version(2))
            .finish()
            .unwrap();
        assert_eq!(contents[6], 6);
        assert_eq!(
            &contents[12..],
            &[
                b'M', 2, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0xbb
            ]
        );
    }
}
