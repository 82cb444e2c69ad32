//! `DFRE` packed archive container.
//!
//! Layout (little-endian, no padding):
//!
//! ```text
//! [Header: 14 bytes][payload bytes ...][Entry; entries_count]
//! Header = magic "DFRE", version: u16, entries_offset: u32, entries_count: u32
//! Entry  = offset: i32, length: i32, file_name: [u8; 128] (NUL-terminated)
//! ```
//!
//! Readers never panic on malformed input: a bad magic or table leaves the
//! container empty and logs a single warning.

use std::io::{Seek, SeekFrom, Write};
use std::sync::{Arc, Weak};

use bytemuck::{Pod, Zeroable};
use kiln_core::alloc::HashMap;
use kiln_core::profiling::profile_function;
use parking_lot::Mutex;

use crate::error::{AssetError, AssetResult};
use crate::io::{ByteStream, FileStream, SeekOrigin, seek_target};
use crate::path::canonical_path;

pub const MAGIC: [u8; 4] = *b"DFRE";
pub const VERSION: u16 = 1;
/// Names must be strictly shorter than this to leave room for the terminator.
pub const MAX_FILENAME_LEN: usize = 128;

pub const HEADER_SIZE: usize = std::mem::size_of::<RawHeader>();
pub const ENTRY_SIZE: usize = std::mem::size_of::<RawEntry>();

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RawHeader {
    magic: [u8; 4],
    version: [u8; 2],
    entries_offset: [u8; 4],
    entries_count: [u8; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RawEntry {
    offset: [u8; 4],
    length: [u8; 4],
    file_name: [u8; MAX_FILENAME_LEN],
}

static_assertions::assert_eq_size!(RawHeader, [u8; 14]);
static_assertions::assert_eq_size!(RawEntry, [u8; 136]);

impl RawEntry {
    fn name(&self) -> Option<&str> {
        let end = self.file_name.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&self.file_name[..end]).ok()
    }
}

/// A named payload inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub offset: u64,
    pub length: u64,
}

type SharedStream = Arc<Mutex<Box<dyn ByteStream>>>;

/// Read-only view of a `DFRE` archive.
///
/// Immutable once opened. Entry streams share the backing stream through a
/// lock and only hold a weak reference to it.
pub struct ArchiveContainer {
    stream: SharedStream,
    path: String,
    version: u16,
    entries: Vec<ArchiveEntry>,
    by_name: HashMap<String, usize>,
}

impl ArchiveContainer {
    /// Parse the header and entry table of `stream`.
    ///
    /// Malformed input yields an empty container and one warning.
    pub fn open(mut stream: Box<dyn ByteStream>) -> Self {
        profile_function!();
        let path = stream.path().to_string();
        let (version, entries) = match Self::read_table(stream.as_mut()) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!("Ignoring resource container '{}': {}", path, e);
                (0, Vec::new())
            }
        };

        // Lookups go through the canonical form, whatever the writer stored.
        let mut by_name = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            match canonical_path(&entry.name) {
                Some(key) => {
                    by_name.entry(key).or_insert(i);
                }
                None => tracing::warn!(
                    "Entry '{}' in resource container '{}' has no usable name",
                    entry.name,
                    path
                ),
            }
        }

        tracing::debug!("Opened resource container '{}' with {} entries", path, entries.len());

        Self {
            stream: Arc::new(Mutex::new(stream)),
            path,
            version,
            entries,
            by_name,
        }
    }

    /// Open an archive file on disk. `None` only if the file cannot be opened.
    pub fn open_file(path: impl AsRef<std::path::Path>) -> Option<Self> {
        FileStream::open(path).map(|stream| Self::open(Box::new(stream)))
    }

    fn read_table(stream: &mut dyn ByteStream) -> AssetResult<(u16, Vec<ArchiveEntry>)> {
        let size = stream.size();
        let mut header = RawHeader::zeroed();
        stream
            .read_exact(bytemuck::bytes_of_mut(&mut header))
            .map_err(|_| archive_error("file is smaller than the header"))?;

        if header.magic != MAGIC {
            return Err(archive_error("invalid magic"));
        }
        let version = u16::from_le_bytes(header.version);
        let entries_offset = u32::from_le_bytes(header.entries_offset) as u64;
        let entries_count = u32::from_le_bytes(header.entries_count) as u64;

        let table_end = entries_offset + entries_count * ENTRY_SIZE as u64;
        if entries_offset < HEADER_SIZE as u64 || table_end > size {
            return Err(archive_error(format!(
                "entry table [{}, {}) lies outside the {} byte file",
                entries_offset, table_end, size
            )));
        }
        if !stream.seek(entries_offset as i64, SeekOrigin::Begin) {
            return Err(archive_error("cannot seek to the entry table"));
        }

        let mut raw = vec![RawEntry::zeroed(); entries_count as usize];
        stream
            .read_exact(bytemuck::cast_slice_mut(&mut raw))
            .map_err(|_| archive_error("truncated entry table"))?;

        let mut entries = Vec::with_capacity(raw.len());
        for (i, entry) in raw.iter().enumerate() {
            let offset = i32::from_le_bytes(entry.offset);
            let length = i32::from_le_bytes(entry.length);
            let name = entry
                .name()
                .ok_or_else(|| archive_error(format!("entry {} has an unreadable name", i)))?;
            if offset < HEADER_SIZE as i32 || length < 0 {
                return Err(archive_error(format!(
                    "entry '{}' has a bad range ({}, {})",
                    name, offset, length
                )));
            }
            let (offset, length) = (offset as u64, length as u64);
            if offset + length > entries_offset {
                return Err(archive_error(format!("entry '{}' overruns the payload", name)));
            }
            entries.push(ArchiveEntry {
                name: name.to_string(),
                offset,
                length,
            });
        }

        let mut ranges: Vec<_> = entries.iter().map(|e| (e.offset, e.length)).collect();
        ranges.sort_unstable();
        if ranges.windows(2).any(|w| w[0].0 + w[0].1 > w[1].0) {
            return Err(archive_error("entries overlap"));
        }

        Ok((version, entries))
    }

    /// Path of the backing stream.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Format version from the header, 0 if the header was rejected.
    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name. Both the query and the stored names are
    /// compared in canonical form, so `/data/a.txt`, `data\a.txt` and
    /// `data/a.txt` all find the same entry.
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        let name = canonical_path(name)?;
        self.by_name.get(&name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// A bounded stream over the entry's bytes.
    pub fn open_entry(&self, name: &str) -> Option<ArchiveEntryStream> {
        let entry = self.entry(name)?.clone();
        Some(ArchiveEntryStream {
            backing: Arc::downgrade(&self.stream),
            entry,
            position: 0,
        })
    }
}

impl std::fmt::Debug for ArchiveContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveContainer")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn archive_error(message: impl Into<String>) -> AssetError {
    AssetError::Archive {
        message: message.into(),
    }
}

/// Stream over one archive entry.
///
/// Reads and seeks are clamped to the entry's range. Once the owning
/// [`ArchiveContainer`] is dropped every read returns 0.
pub struct ArchiveEntryStream {
    backing: Weak<Mutex<Box<dyn ByteStream>>>,
    entry: ArchiveEntry,
    position: u64,
}

impl ArchiveEntryStream {
    pub fn entry(&self) -> &ArchiveEntry {
        &self.entry
    }

    /// `false` once the archive has been dropped.
    pub fn is_alive(&self) -> bool {
        self.backing.strong_count() > 0
    }
}

impl ByteStream for ArchiveEntryStream {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let Some(backing) = self.backing.upgrade() else {
            return 0;
        };
        let remaining = self.entry.length.saturating_sub(self.position);
        let wanted = (buf.len() as u64).min(remaining) as usize;
        if wanted == 0 {
            return 0;
        }

        let mut stream = backing.lock();
        let start = self.entry.offset + self.position;
        if !stream.seek(start as i64, SeekOrigin::Begin) {
            tracing::warn!("Cannot seek to '{}' in '{}'", self.entry.name, stream.path());
            return 0;
        }
        let read = stream.read(&mut buf[..wanted]);
        self.position += read as u64;
        read
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> bool {
        match seek_target(self.position, self.entry.length, offset, origin) {
            Some(target) => {
                self.position = target;
                true
            }
            None => false,
        }
    }

    fn size(&self) -> u64 {
        self.entry.length
    }

    fn path(&self) -> &str {
        &self.entry.name
    }
}

/// Builds `DFRE` archives.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use kiln_assets::archive::{ArchiveContainer, ArchiveWriter};
/// use kiln_assets::io::{ByteStream, MemoryStream};
///
/// let mut writer = ArchiveWriter::new();
/// writer.add("a.txt", b"hello".to_vec()).unwrap();
///
/// let mut out = Cursor::new(Vec::new());
/// writer.write_to(&mut out).unwrap();
///
/// let archive = ArchiveContainer::open(Box::new(MemoryStream::new("data.pak", out.into_inner())));
/// let mut entry = archive.open_entry("a.txt").unwrap();
/// assert_eq!(entry.read_to_end().unwrap(), b"hello");
/// ```
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    entries: Vec<(String, Vec<u8>)>,
    payload_size: u64,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a payload under `name`. The name is stored canonicalised.
    pub fn add(&mut self, name: &str, bytes: Vec<u8>) -> AssetResult<()> {
        let name = canonical_path(name).ok_or_else(|| archive_error("empty entry name"))?;
        if name.len() >= MAX_FILENAME_LEN {
            return Err(archive_error(format!(
                "entry name '{}' is {} bytes, the limit is {}",
                name,
                name.len(),
                MAX_FILENAME_LEN - 1
            )));
        }
        if self.entries.iter().any(|(existing, _)| *existing == name) {
            return Err(archive_error(format!("duplicate entry '{}'", name)));
        }

        let payload_size = self.payload_size + bytes.len() as u64;
        let table_end = HEADER_SIZE as u64
            + payload_size
            + (self.entries.len() as u64 + 1) * ENTRY_SIZE as u64;
        if payload_size + HEADER_SIZE as u64 > i32::MAX as u64 || table_end > u32::MAX as u64 {
            return Err(archive_error(format!("adding '{}' exceeds the archive size limit", name)));
        }

        self.payload_size = payload_size;
        self.entries.push((name, bytes));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write header, payloads and entry table. The header is written last, so
    /// a failed write never leaves a valid-looking archive behind.
    pub fn write_to<W: Write + Seek>(&self, out: &mut W) -> AssetResult<()> {
        profile_function!();
        let io_error = |e: std::io::Error| AssetError::Io {
            path: "<archive>".to_string(),
            message: e.to_string(),
        };

        out.write_all(&[0; HEADER_SIZE]).map_err(io_error)?;

        let mut table = Vec::with_capacity(self.entries.len());
        let mut offset = HEADER_SIZE as u64;
        for (name, bytes) in &self.entries {
            out.write_all(bytes).map_err(io_error)?;

            let mut raw = RawEntry::zeroed();
            raw.offset = (offset as i32).to_le_bytes();
            raw.length = (bytes.len() as i32).to_le_bytes();
            raw.file_name[..name.len()].copy_from_slice(name.as_bytes());
            table.push(raw);
            offset += bytes.len() as u64;
        }
        out.write_all(bytemuck::cast_slice(&table)).map_err(io_error)?;

        let header = RawHeader {
            magic: MAGIC,
            version: VERSION.to_le_bytes(),
            entries_offset: (offset as u32).to_le_bytes(),
            entries_count: (table.len() as u32).to_le_bytes(),
        };
        let end = out.stream_position().map_err(io_error)?;
        out.seek(SeekFrom::Start(0)).map_err(io_error)?;
        out.write_all(bytemuck::bytes_of(&header)).map_err(io_error)?;
        out.seek(SeekFrom::Start(end)).map_err(io_error)?;
        out.flush().map_err(io_error)?;

        tracing::debug!("Wrote resource container with {} entries", table.len());
        Ok(())
    }
}
