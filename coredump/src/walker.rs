//! Walking the sections that follow the main header.

use std::fmt;
use std::io::{self, Write};

use coredump_common::format::SectionTag;
use tracing::{debug, info, warn};

use crate::arch::CoredumpArch;
use crate::header::{locate, MainHeader, PointerWidth};
use crate::image::RawImage;
use crate::memory::{CoredumpMemory, CoredumpMemoryList};
use crate::Error;

/// Why a walk ended without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// A terminator tag was reached. The terminator is not part of the coredump.
    Terminator,
    /// The buffer ended right after the last section.
    EndOfBuffer,
    /// A tag that is neither a section nor the terminator was reached. Everything
    /// from there on is treated as unrelated data.
    UnknownTag(u8),
}

/// The state of a [`SectionWalker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkState {
    /// Nothing has been read yet.
    Scanning,
    /// Sections are being read.
    Walking,
    /// The end of the sections was found.
    Done(EndReason),
    /// A section could not be decoded. The walk stopped at its tag byte.
    Failed(Error),
}

impl WalkState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WalkState::Done(_) | WalkState::Failed(_))
    }
}

impl fmt::Display for WalkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkState::Scanning => write!(f, "scanning"),
            WalkState::Walking => write!(f, "walking"),
            WalkState::Done(EndReason::Terminator) => write!(f, "done (terminator)"),
            WalkState::Done(EndReason::EndOfBuffer) => write!(f, "done (end of buffer)"),
            WalkState::Done(EndReason::UnknownTag(tag)) => {
                write!(f, "done (unknown tag {:#04x})", tag)
            }
            WalkState::Failed(err) => write!(f, "failed ({}: {})", err.name(), err),
        }
    }
}

/// The decoded contents of a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionContents<'a> {
    Arch(CoredumpArch<'a>),
    Memory(CoredumpMemory<'a>),
}

/// A section read from a coredump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    /// The offset of the section's tag byte in the file.
    pub offset: usize,
    /// The number of bytes the section occupies, tag included.
    pub size: usize,
    pub contents: SectionContents<'a>,
}

/// Reads the sections following a main header one at a time.
///
/// Every item is either a section that was fully consumed or the error that
/// stopped the walk; after an error or the end of the sections the iterator is
/// exhausted and [`SectionWalker::state`] tells why.
#[derive(Debug, Clone)]
pub struct SectionWalker<'a> {
    image: RawImage<'a>,
    offset: usize,
    pointer_width: PointerWidth,
    state: WalkState,
}

impl<'a> SectionWalker<'a> {
    /// Walk the sections starting at `offset`, which must point at a tag byte.
    pub fn new(image: RawImage<'a>, offset: usize, pointer_width: PointerWidth) -> SectionWalker<'a> {
        SectionWalker {
            image,
            offset,
            pointer_width,
            state: WalkState::Scanning,
        }
    }

    /// The offset of the next tag byte; once the walk is over, the exclusive end
    /// of the consumed sections.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn state(&self) -> &WalkState {
        &self.state
    }

    fn finish(&mut self, reason: EndReason) {
        match reason {
            EndReason::UnknownTag(tag) => warn!(
                "Unknown section tag {:#04x} at offset {:#x}, stopping",
                tag, self.offset
            ),
            _ => info!("Reached {:?} at offset {:#x}", reason, self.offset),
        }
        self.state = WalkState::Done(reason);
    }
}

impl<'a> Iterator for SectionWalker<'a> {
    type Item = Result<Section<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == WalkState::Scanning {
            self.state = WalkState::Walking;
        }
        if self.state != WalkState::Walking {
            return None;
        }

        let raw_tag = match self.image.byte(self.offset) {
            Some(raw_tag) => raw_tag,
            None => {
                self.finish(EndReason::EndOfBuffer);
                return None;
            }
        };
        let read = match SectionTag::from_u8(raw_tag) {
            Some(SectionTag::Terminator) => {
                self.finish(EndReason::Terminator);
                return None;
            }
            Some(SectionTag::Arch) => CoredumpArch::read(&self.image, self.offset)
                .map(|(arch, size)| (SectionContents::Arch(arch), size)),
            Some(SectionTag::Memory) => {
                CoredumpMemory::read(&self.image, self.offset, self.pointer_width)
                    .map(|(memory, size)| (SectionContents::Memory(memory), size))
            }
            None => {
                self.finish(EndReason::UnknownTag(raw_tag));
                return None;
            }
        };

        match read {
            Ok((contents, size)) => {
                debug!(
                    "Read section {:?} at offset {:#x} ({} bytes)",
                    char::from(raw_tag),
                    self.offset,
                    size
                );
                let section = Section {
                    offset: self.offset,
                    size,
                    contents,
                };
                // Every section is at least a few bytes long, so the walk always advances.
                self.offset += size;
                Some(Ok(section))
            }
            Err(err) => {
                warn!(
                    "Failed to read section {:?} at offset {:#x}: {}",
                    char::from(raw_tag),
                    self.offset,
                    err
                );
                self.state = WalkState::Failed(err.clone());
                Some(Err(err))
            }
        }
    }
}

/// Everything a walk over the sections produced.
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    /// The sections that were fully consumed, in file order.
    pub sections: Vec<Section<'a>>,
    /// The exclusive end of the last consumed section.
    pub end: usize,
    /// Always [`WalkState::Done`] or [`WalkState::Failed`].
    pub state: WalkState,
}

/// Read every section starting at `offset` until the walk ends.
pub fn walk<'a>(image: &RawImage<'a>, offset: usize, pointer_width: PointerWidth) -> Walk<'a> {
    let mut walker = SectionWalker::new(*image, offset, pointer_width);
    // An error is always the last item, and it is kept in the walker's state.
    let sections = walker.by_ref().filter_map(Result::ok).collect();
    Walk {
        sections,
        end: walker.offset(),
        state: walker.state().clone(),
    }
}

/// A located and walked coredump.
#[derive(Debug, Clone)]
pub struct ParseResult<'a> {
    /// The main header.
    pub header: MainHeader,
    /// The offset of the main header, where the coredump starts.
    pub start: usize,
    /// The exclusive end of the recognized coredump.
    pub end: usize,
    /// Every section that was fully consumed, in file order.
    pub sections: Vec<Section<'a>>,
    /// The memory regions among `sections`.
    pub memory: CoredumpMemoryList<'a>,
    /// How the walk ended.
    pub state: WalkState,
}

impl<'a> ParseResult<'a> {
    pub fn new(header: MainHeader, start: usize, walk: Walk<'a>) -> ParseResult<'a> {
        let regions = walk
            .sections
            .iter()
            .filter_map(|section| match &section.contents {
                SectionContents::Memory(memory) => Some(memory.clone()),
                SectionContents::Arch(_) => None,
            })
            .collect();
        let body = walk.end.saturating_sub(start + MainHeader::size());
        if body != header.body_length() as usize {
            debug!(
                "Recognized {} bytes of sections, header body_length is {}",
                body,
                header.body_length()
            );
        }
        ParseResult {
            header,
            start,
            end: walk.end,
            sections: walk.sections,
            memory: CoredumpMemoryList::from_regions(regions),
            state: walk.state,
        }
    }

    /// Iterate over the architecture sections in file order.
    pub fn arch(&self) -> impl Iterator<Item = &CoredumpArch<'a>> {
        self.sections.iter().filter_map(|section| match &section.contents {
            SectionContents::Arch(arch) => Some(arch),
            SectionContents::Memory(_) => None,
        })
    }

    /// Whether the walk reached the end of the sections without failing.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, WalkState::Done(_))
    }

    /// The error that stopped the walk, if any.
    pub fn error(&self) -> Option<&Error> {
        match &self.state {
            WalkState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// The length of the recognized coredump.
    pub fn recognized_len(&self) -> usize {
        self.end - self.start
    }

    /// Turn a failed walk into its error.
    pub fn into_result(self) -> Result<ParseResult<'a>, Error> {
        match self.state {
            WalkState::Failed(err) => Err(err),
            _ => Ok(self),
        }
    }

    /// Write a human-readable description of this `ParseResult` to `f`.
    pub fn print<T: Write>(&self, f: &mut T) -> io::Result<()> {
        self.header.print(f)?;
        for (i, arch) in self.arch().enumerate() {
            writeln!(f, "arch[{}]", i)?;
            arch.print(f)?;
        }
        self.memory.print(f)?;
        write!(
            f,
            "Coredump
  start         = {:#x}
  end           = {:#x}
  section_count = {}
  state         = {}
",
            self.start,
            self.end,
            self.sections.len(),
            self.state,
        )
    }
}

/// Locate the coredump in `data` and walk its sections.
///
/// Failing to find or decode the main header is an error. A walk that fails part
/// way is not: the result keeps what was read before the failure and carries the
/// error in [`ParseResult::state`].
pub fn parse(data: &[u8]) -> Result<ParseResult<'_>, Error> {
    let image = RawImage::new(data);
    let (start, header) = locate(&image)?;
    let walked = walk(&image, start + MainHeader::size(), header.pointer_width);
    Ok(ParseResult::new(header, start, walked))
}

#[cfg(test)]
mod test {
    use super::*;
    use coredump_synth::{Arch, Memory, SynthCoredump};
    use test_assembler::{Endian, Section as SynthSection};

    fn synth(dump: SynthCoredump) -> Vec<u8> {
        dump.finish().unwrap()
    }

    #[test]
    fn test_walker_states() {
        let dump = synth(SynthCoredump::new().add_arch(Arch::new(1, &[])).terminate());
        let mut walker = SectionWalker::new(RawImage::new(&dump), 12, PointerWidth::Bits32);
        assert_eq!(walker.state(), &WalkState::Scanning);
        assert!(walker.next().unwrap().is_ok());
        assert_eq!(walker.state(), &WalkState::Walking);
        assert_eq!(walker.offset(), 17);
        assert!(walker.next().is_none());
        assert_eq!(walker.state(), &WalkState::Done(EndReason::Terminator));
        // The terminator isn't consumed.
        assert_eq!(walker.offset(), 17);
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_sections_in_file_order() {
        let dump = synth(
            SynthCoredump::new()
                .add_arch(Arch::new(3, &[0x11; 8]))
                .add_memory(Memory::with_bytes(b"first", 0x1000))
                .add_memory(Memory::with_bytes(b"second", 0x800))
                .add_memory(Memory::with_bytes(b"", 0x4000))
                .terminate(),
        );
        let result = parse(&dump).unwrap();
        assert_eq!(result.state, WalkState::Done(EndReason::Terminator));
        assert_eq!(result.sections.len(), 4);
        assert_eq!(result.arch().count(), 1);
        assert_eq!(result.memory.len(), 3);

        let regions: Vec<_> = result.memory.iter().collect();
        assert_eq!(regions[0].start, 0x1000);
        assert_eq!(regions[0].bytes, b"first");
        assert_eq!(regions[1].start, 0x800);
        assert_eq!(regions[1].bytes, b"second");
        assert_eq!(regions[2].start, 0x4000);
        for region in regions {
            assert_eq!(region.size, region.end - region.start);
            assert_eq!(region.bytes.len() as u64, region.size);
        }

        let offsets: Vec<(usize, usize)> = result
            .sections
            .iter()
            .map(|section| (section.offset, section.size))
            .collect();
        assert_eq!(offsets, vec![(12, 13), (25, 16), (41, 17), (58, 11)]);
        assert_eq!(result.end, 69);
        assert_eq!(dump[result.end], 0);
    }

    #[test]
    fn test_end_of_buffer() {
        let dump = synth(SynthCoredump::new().add_memory(Memory::with_bytes(&[1; 4], 0x10)));
        let result = parse(&dump).unwrap();
        assert_eq!(result.state, WalkState::Done(EndReason::EndOfBuffer));
        assert_eq!(result.end, dump.len());
        assert!(result.is_complete());
    }

    #[test]
    fn test_header_only() {
        let dump = synth(SynthCoredump::new());
        let result = parse(&dump).unwrap();
        assert_eq!(result.state, WalkState::Done(EndReason::EndOfBuffer));
        assert_eq!(result.end, 12);
        assert!(result.sections.is_empty());
    }

    #[test]
    fn test_unknown_tag() {
        let dump = synth(
            SynthCoredump::new()
                .add_memory(Memory::with_bytes(&[1; 4], 0x10))
                .add_raw(SynthSection::with_endian(Endian::Little).D8(b'X'))
                .add_memory(Memory::with_bytes(&[2; 4], 0x20)),
        );
        let result = parse(&dump).unwrap();
        assert_eq!(result.state, WalkState::Done(EndReason::UnknownTag(b'X')));
        assert_eq!(result.end, 12 + 15);
        assert_eq!(result.memory.len(), 1);
        assert!(result.is_complete());
        assert_eq!(result.error(), None);
    }

    #[test]
    fn test_reversed_range_stops_walk() {
        let dump = synth(
            SynthCoredump::new()
                .add_arch(Arch::new(2, &[0; 6]))
                .add_memory(Memory::with_bytes(&[], 0x1000).end_address(0xfff))
                .add_memory(Memory::with_bytes(&[3; 4], 0x30))
                .terminate(),
        );
        let result = parse(&dump).unwrap();
        // The walk stops at the tag byte of the reversed region.
        assert_eq!(result.end, 12 + 11);
        assert_eq!(dump[result.end], b'M');
        assert_eq!(result.sections.len(), 1);
        assert!(result.memory.is_empty());
        assert_eq!(
            result.state,
            WalkState::Failed(Error::InvalidRange {
                start: 0x1000,
                end: 0xfff
            })
        );
        assert!(result.state.is_terminal());
        assert!(result.into_result().is_err());
    }

    #[test]
    fn test_version_mismatch_stops_walk() {
        let dump = synth(
            SynthCoredump::new()
                .add_memory(Memory::with_bytes(&[1; 4], 0x10))
                .add_memory(Memory::with_bytes(&[2; 4], 0x20).version(7))
                .add_memory(Memory::with_bytes(&[3; 4], 0x30))
                .terminate(),
        );
        let mut walker = SectionWalker::new(RawImage::new(&dump), 12, PointerWidth::Bits32);
        assert!(walker.next().unwrap().is_ok());
        assert_eq!(
            walker.next(),
            Some(Err(Error::VersionMismatch {
                expected: 1,
                got: 7
            }))
        );
        // The failing section is not consumed and nothing after it is read.
        assert_eq!(walker.offset(), 27);
        assert!(walker.next().is_none());
        assert!(walker.next().is_none());

        let result = parse(&dump).unwrap();
        assert_eq!(result.end, 27);
        assert_eq!(result.memory.len(), 1);
        assert!(!result.is_complete());
        assert_eq!(
            result.error(),
            Some(&Error::VersionMismatch {
                expected: 1,
                got: 7
            })
        );
        assert!(result.into_result().is_err());
    }

    #[test]
    fn test_truncated_section_fails() {
        let dump = synth(
            SynthCoredump::new()
                .add_arch(Arch::new(1, &[0; 2]))
                .add_arch(Arch::new(1, &[0; 2]).payload_length(0x400)),
        );
        let result = parse(&dump).unwrap();
        assert_eq!(result.end, 19);
        assert_eq!(
            result.state,
            WalkState::Failed(Error::Truncated {
                offset: 24,
                needed: 0x400,
                available: 2
            })
        );
    }

    #[test]
    fn test_truncated_tag_header_fails() {
        // A lone memory tag at the very end of the buffer.
        let dump = synth(
            SynthCoredump::new().add_raw(SynthSection::with_endian(Endian::Little).D8(b'M')),
        );
        let result = parse(&dump).unwrap();
        assert_eq!(result.end, 12);
        assert!(matches!(
            result.state,
            WalkState::Failed(Error::Truncated { offset: 12, .. })
        ));
    }

    #[test]
    fn test_walk_64() {
        let dump = synth(
            SynthCoredump::with_pointer_size_exponent(6)
                .add_memory(Memory::with_bytes(&[9; 3], 0xffff_ffff_0000_0000))
                .terminate(),
        );
        let result = parse(&dump).unwrap();
        assert_eq!(result.header.pointer_width, PointerWidth::Bits64);
        assert_eq!(result.end, 12 + 3 + 16 + 3);
        let region = result.memory.memory_at_address(0xffff_ffff_0000_0002).unwrap();
        assert_eq!(region.bytes, &[9; 3]);
    }

    #[test]
    fn test_parse_header_errors() {
        assert_eq!(parse(b"nothing to see").unwrap_err(), Error::NotFound);
        let dump = synth(SynthCoredump::with_pointer_size_exponent(3));
        assert_eq!(
            parse(&dump).unwrap_err(),
            Error::UnsupportedPointerWidth { exponent: 3 }
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            WalkState::Done(EndReason::UnknownTag(0x58)).to_string(),
            "done (unknown tag 0x58)"
        );
        assert_eq!(
            WalkState::Failed(Error::VersionMismatch {
                expected: 1,
                got: 2
            })
            .to_string(),
            "failed (VersionMismatch: Section version mismatch: expected 1, found 2)"
        );
    }

    #[test]
    fn test_print() {
        let dump = synth(
            SynthCoredump::new()
                .add_arch(Arch::new(0x3, &[0; 4]))
                .add_memory(Memory::with_bytes(&[0xaa; 16], 0x1000))
                .terminate(),
        );
        let result = parse(&dump).unwrap();
        let mut out = Vec::new();
        result.print(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("COREDUMP_HEADER\n"));
        assert!(out.contains("arch[0]\nCOREDUMP_ARCH_HEADER\n"));
        assert!(out.contains("  arch_type      = 0x3\n"));
        assert!(out.contains("region[0]\nCOREDUMP_MEM_HEADER\n"));
        assert!(out.contains("  section_count = 2\n"));
        assert!(out.ends_with("  state         = done (terminator)\n"));
    }
}
