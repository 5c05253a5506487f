//! Writing the recognized coredump out of its host file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::image::RawImage;
use crate::walker::ParseResult;
use crate::Error;

/// What to do with a coredump whose walk failed part way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialOutput {
    /// Write nothing and return the error that stopped the walk.
    #[default]
    Refuse,
    /// Write everything up to the section that failed.
    Allow,
}

/// Copy `image[start..end]` verbatim to `out`.
pub fn write_range<W: Write>(
    image: &RawImage<'_>,
    start: usize,
    end: usize,
    out: &mut W,
) -> Result<usize, Error> {
    let len = end.checked_sub(start).ok_or(Error::InvalidRange {
        start: start as u64,
        end: end as u64,
    })?;
    let bytes = image.bytes(start, len)?;
    out.write_all(bytes)?;
    Ok(bytes.len())
}

/// Write the recognized coredump of `result` to `out`.
///
/// Returns the number of bytes written.
pub fn write_recognized<W: Write>(
    image: &RawImage<'_>,
    result: &ParseResult<'_>,
    out: &mut W,
    policy: PartialOutput,
) -> Result<usize, Error> {
    if let Some(err) = result.error() {
        if policy == PartialOutput::Refuse {
            return Err(err.clone());
        }
        warn!(
            "Writing a partial coredump, the walk failed at offset {:#x}: {}",
            result.end, err
        );
    }
    write_range(image, result.start, result.end, out)
}

/// Write the recognized coredump of `result` to a new file at `path`, replacing
/// any existing file. Nothing is created if `policy` refuses the output.
pub fn write_recognized_to_path<P: AsRef<Path>>(
    image: &RawImage<'_>,
    result: &ParseResult<'_>,
    path: P,
    policy: PartialOutput,
) -> Result<usize, Error> {
    if let (Some(err), PartialOutput::Refuse) = (result.error(), policy) {
        return Err(err.clone());
    }
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    let written = write_recognized(image, result, &mut out, policy)?;
    out.flush()?;
    info!("Wrote {} bytes of coredump to {}", written, path.display());
    Ok(written)
}
