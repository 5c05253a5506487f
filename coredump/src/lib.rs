//! A parser for embedded coredumps.
//!
//! Firmware crash handlers often write their coredump into a flash partition or
//! a log capture, so the coredump usually sits somewhere inside a larger file,
//! followed by padding or unrelated data. This crate finds the coredump, walks
//! its sections, and writes out exactly the bytes that were recognized.
//!
//! A coredump is a main header (see [`MainHeader`]) followed by tagged sections:
//! architecture sections ([`CoredumpArch`]) and memory sections
//! ([`CoredumpMemory`]). The section sequence ends with a terminator tag, an
//! unknown tag, or the end of the file.
//!
//! # Examples
//!
//! ```
//! use coredump::{parse, EndReason, WalkState};
//!
//! let mut data = b"padding".to_vec();
//! // Main header: magic, version 1, no flags, 32-bit pointers, no body length.
//! data.extend_from_slice(b"ZE\x01\x00\x00\x00\x05\x00\x00\x00\x00\x00");
//! // One memory section of 4 bytes at 0x1000.
//! data.extend_from_slice(b"M\x01\x00\x00\x10\x00\x00\x04\x10\x00\x00\xde\xad\xbe\xef");
//! data.push(0);
//!
//! let result = parse(&data).unwrap();
//! assert_eq!(result.state, WalkState::Done(EndReason::Terminator));
//! assert_eq!(result.start, 7);
//! assert_eq!(result.recognized_len(), 12 + 15);
//! let region = result.memory.memory_at_address(0x1002).unwrap();
//! assert_eq!(region.bytes, b"\xde\xad\xbe\xef");
//! ```

pub use coredump_common::format;

pub use crate::arch::*;
pub use crate::coredump::*;
pub use crate::error::*;
pub use crate::header::*;
pub use crate::image::*;
pub use crate::memory::*;
pub use crate::output::*;
pub use crate::walker::*;

mod arch;
mod coredump;
mod error;
mod header;
mod image;
mod memory;
mod output;
mod walker;
