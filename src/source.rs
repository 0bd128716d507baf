//! Block sources the verifier reads media from.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Sequential reader over a media image of known size.
///
/// `seek` is only used by the verifier to step past a chunk that failed to
/// read; every other read continues where the previous one stopped.
pub(crate) trait BlockSource {
    fn open(path: &Path) -> io::Result<Self>
    where
        Self: Sized;

    /// Total media size in bytes.
    fn size(&self) -> u64;

    /// Read up to `buf.len()` bytes at the current offset.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Release the underlying handle. Calling it twice is harmless.
    fn close(&mut self) -> io::Result<()>;
}

/// A raw, already flattened media image stored in a regular file.
pub(crate) struct RawImage {
    file: Option<File>,
    size: u64,
}

impl RawImage {
    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "media image is closed"))
    }
}

impl BlockSource for RawImage {
    fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "source is a directory",
            ));
        }
        Ok(Self {
            file: Some(file),
            size: metadata.len(),
        })
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.file()?;
        loop {
            match file.read(buf) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.file()?.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.file.take();
        Ok(())
    }
}
