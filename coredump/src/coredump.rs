// Copyright 2015 Ted Mielczarek. See the COPYRIGHT
// file at the top-level directory of this distribution.

use std::fs;
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::Path;

use crate::header::{locate, MainHeader};
use crate::image::RawImage;
use crate::output::{write_recognized_to_path, PartialOutput};
use crate::walker::{walk, ParseResult};
use crate::Error;

/// A file holding a coredump somewhere in its contents.
///
/// The `Coredump` struct owns the file contents and the decoded main header. It can
/// be instantiated by calling the [`Coredump::read`] or [`Coredump::read_path`]
/// methods; the sections are read by [`Coredump::parse`].
///
/// # Examples
///
/// ```no_run
/// use coredump::{Coredump, PartialOutput};
///
/// # fn foo() -> Result<(), coredump::Error> {
/// let dump = Coredump::read_path("firmware_crash.bin")?;
/// let result = dump.parse();
/// println!("{} memory regions", result.memory.len());
/// dump.write_stripped(&result, "firmware_crash_final.bin", PartialOutput::Refuse)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Coredump<'a, T>
where
    T: Deref<Target = [u8]> + 'a,
{
    data: T,
    /// The offset of the main header in the file.
    pub start: usize,
    /// The decoded main header.
    pub header: MainHeader,
    _phantom: PhantomData<&'a [u8]>,
}

impl<'a, T> Coredump<'a, T>
where
    T: Deref<Target = [u8]> + 'a,
{
    /// Read a `Coredump` from the provided `data`.
    ///
    /// Typically this will be a `Vec<u8>` or `&[u8]` with the full contents of the file.
    pub fn read(data: T) -> Result<Coredump<'a, T>, Error> {
        let (start, header) = locate(&RawImage::new(&data))?;
        Ok(Coredump {
            data,
            start,
            header,
            _phantom: PhantomData,
        })
    }

    /// The whole file contents.
    pub fn image(&self) -> RawImage<'_> {
        RawImage::new(&self.data)
    }

    /// Walk the sections following the main header.
    pub fn parse(&self) -> ParseResult<'_> {
        let image = self.image();
        let walked = walk(
            &image,
            self.start + MainHeader::size(),
            self.header.pointer_width,
        );
        ParseResult::new(self.header, self.start, walked)
    }

    /// Write the coredump recognized in `result` to `path`.
    ///
    /// `result` must come from [`Coredump::parse`] on this same `Coredump`.
    /// `path` may be the file this `Coredump` was read from.
    pub fn write_stripped<P: AsRef<Path>>(
        &self,
        result: &ParseResult<'_>,
        path: P,
        policy: PartialOutput,
    ) -> Result<usize, Error> {
        write_recognized_to_path(&self.image(), result, path, policy)
    }
}

impl<'a> Coredump<'a, Vec<u8>> {
    /// Read a `Coredump` from a `Path` to a file on disk.
    ///
    /// The whole file is read into memory, so the stripped coredump may be
    /// written back over the same path.
    ///
    /// See [the type definition](Coredump.html) for an example.
    pub fn read_path<P>(path: P) -> Result<Coredump<'a, Vec<u8>>, Error>
    where
        P: AsRef<Path>,
    {
        let data = fs::read(path)?;
        Coredump::read(data)
    }
}
