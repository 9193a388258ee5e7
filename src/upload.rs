//! Byte source feeding a storage volume upload stream.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ImageError, ImageResult};

/// Default chunk size for streamed uploads.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Byte producer for a volume upload.
///
/// The source owns the open image file for the duration of one upload and
/// hands out chunks until end-of-file. A source can exist without a file
/// attached; asking such a source for bytes is a wiring mistake and fails
/// deterministically with [`ImageError::DetachedSource`] before any read is
/// attempted, regardless of the requested chunk size. Ordinary I/O failures
/// pass through as the underlying [`std::io::Error`].
#[derive(Debug)]
pub struct UploadSource {
    file: Option<File>,
}

impl UploadSource {
    /// Create a source reading from an already-open file.
    pub fn attached(file: File) -> Self {
        Self { file: Some(file) }
    }

    /// Create a source with no file attached.
    pub fn detached() -> Self {
        Self { file: None }
    }

    /// Open `path` read-only and attach it.
    ///
    /// An open failure surfaces the raw OS error.
    pub fn open(path: impl AsRef<Path>) -> ImageResult<Self> {
        let file = File::open(path)?;
        Ok(Self::attached(file))
    }

    /// Whether a file is attached.
    pub fn is_attached(&self) -> bool {
        self.file.is_some()
    }

    /// Fill `buf` with the next chunk, returning the number of bytes read.
    ///
    /// Returns `Ok(0)` at end-of-file.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> ImageResult<usize> {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Err(ImageError::DetachedSource),
        };
        Ok(file.read(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn detached_source_fails_before_reading() {
        let mut source = UploadSource::detached();
        assert!(!source.is_attached());

        // Deterministic regardless of how many bytes are requested.
        for size in [0, 1, DEFAULT_CHUNK_SIZE] {
            let mut buf = vec![0u8; size];
            let err = source.read_chunk(&mut buf).unwrap_err();
            assert!(matches!(err, ImageError::DetachedSource));
            assert_eq!(err.code(), 1001);
        }
    }

    #[test]
    fn attached_source_drains_file() {
        let mut img = tempfile::NamedTempFile::new().unwrap();
        let payload = vec![0xabu8; 10 * 1024];
        img.write_all(&payload).unwrap();

        let mut source = UploadSource::open(img.path()).unwrap();
        let mut buf = [0u8; 4096];
        let mut drained = Vec::new();
        loop {
            let n = source.read_chunk(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            drained.extend_from_slice(&buf[..n]);
        }
        assert_eq!(drained, payload);
    }

    #[test]
    fn open_missing_file_passes_errno_through() {
        let err = UploadSource::open("/no/such/image.img").unwrap_err();
        match &err {
            ImageError::Io(io) => {
                assert_eq!(io.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("expected Io error, got {other:?}"),
        }
        assert_eq!(err.code(), 2);
    }
}
