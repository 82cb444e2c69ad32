//! Byte-stream abstraction consumed by loaders and the archive reader.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use crate::error::{AssetError, AssetResult};

/// Origin for [`ByteStream::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Begin,
    Current,
    End,
}

/// Resolve a seek request against a stream of `size` bytes.
///
/// Returns `None` if the target falls outside `[0, size]`.
pub fn seek_target(position: u64, size: u64, offset: i64, origin: SeekOrigin) -> Option<u64> {
    let base = match origin {
        SeekOrigin::Begin => 0,
        SeekOrigin::Current => position as i128,
        SeekOrigin::End => size as i128,
    };
    let target = base + offset as i128;
    (0..=size as i128).contains(&target).then_some(target as u64)
}

/// A readable, seekable run of bytes with a known size.
///
/// Implementations must be `Send`: decoding happens on worker threads.
pub trait ByteStream: Send {
    /// Read up to `buf.len()` bytes, returning how many were read.
    /// Zero means end of stream (or a read error, which is logged).
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Current position from the start of the stream.
    fn tell(&self) -> u64;

    /// Move the cursor. Returns `false`, leaving the cursor untouched, if the
    /// target lies outside the stream.
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> bool;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Path this stream was opened from, for diagnostics and extension checks.
    fn path(&self) -> &str;

    /// Fill `buf` completely or fail.
    fn read_exact(&mut self, buf: &mut [u8]) -> AssetResult<()> {
        let read = self.read(buf);
        if read == buf.len() {
            Ok(())
        } else {
            Err(AssetError::Io {
                path: self.path().to_string(),
                message: format!("expected {} bytes, got {}", buf.len(), read),
            })
        }
    }

    /// Read everything from the cursor to the end.
    fn read_to_end(&mut self) -> AssetResult<Vec<u8>> {
        let remaining = self.size().saturating_sub(self.tell()) as usize;
        let mut bytes = vec![0; remaining];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

/// Stream over a file on disk.
pub struct FileStream {
    file: File,
    path: String,
    size: u64,
    position: u64,
}

impl FileStream {
    /// Open `path` for reading. `None` if it does not exist or cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!("Failed to open '{}': {}", path.display(), e);
                return None;
            }
        };
        let size = file.metadata().ok()?.len();

        Some(Self {
            file,
            path: path.to_string_lossy().replace('\\', "/"),
            size,
            position: 0,
        })
    }
}

impl ByteStream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("Read error on '{}': {}", self.path, e);
                    break;
                }
            }
        }
        self.position += total as u64;
        total
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> bool {
        let Some(target) = seek_target(self.position, self.size, offset, origin) else {
            return false;
        };
        match self.file.seek(SeekFrom::Start(target)) {
            Ok(position) => {
                self.position = position;
                true
            }
            Err(e) => {
                tracing::warn!("Seek error on '{}': {}", self.path, e);
                false
            }
        }
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn path(&self) -> &str {
        &self.path
    }
}

/// Stream over shared in-memory bytes.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    bytes: Arc<[u8]>,
    path: String,
    position: u64,
}

impl MemoryStream {
    pub fn new(path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            path: path.into(),
            position: 0,
        }
    }
}

impl ByteStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let start = (self.position as usize).min(self.bytes.len());
        let count = buf.len().min(self.bytes.len() - start);
        buf[..count].copy_from_slice(&self.bytes[start..start + count]);
        self.position += count as u64;
        count
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> bool {
        match seek_target(self.position, self.bytes.len() as u64, offset, origin) {
            Some(target) => {
                self.position = target;
                true
            }
            None => false,
        }
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_memory_stream_read_and_seek() {
        let mut stream = MemoryStream::new("mem.bin", b"hello world".to_vec());
        let mut buf = [0u8; 5];
        assert_eq!(stream.read(&mut buf), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(stream.tell(), 5);

        assert!(stream.seek(-5, SeekOrigin::End));
        assert_eq!(stream.read_to_end().unwrap(), b"world");

        assert!(!stream.seek(1, SeekOrigin::End));
        assert!(!stream.seek(-1, SeekOrigin::Begin));
        assert_eq!(stream.tell(), 11);
    }

    #[test]
    fn test_memory_stream_short_read() {
        let mut stream = MemoryStream::new("mem.bin", vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf), 3);
        assert_eq!(stream.read(&mut buf), 0);
        assert!(stream.seek(0, SeekOrigin::Begin));
        assert!(stream.read_exact(&mut buf).is_err());
    }

    #[test]
    fn test_file_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let mut stream = FileStream::open(file.path()).unwrap();
        assert_eq!(stream.size(), 10);
        assert!(stream.seek(3, SeekOrigin::Begin));
        assert!(stream.seek(2, SeekOrigin::Current));
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"567");
        assert_eq!(stream.tell(), 8);
    }

    #[test]
    fn test_file_stream_missing() {
        assert!(FileStream::open("/definitely/not/here.bin").is_none());
    }
}
