//! Path canonicalisation and resolution.
//!
//! A canonical path is the GUID of a resource: forward slashes only, no empty
//! or `.` segments, `dir/..` pairs folded away and no leading slash.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_core::alloc::HashMap;
use kiln_core::profiling::profile_function;
use parking_lot::{ReentrantMutex, RwLock};

use crate::archive::ArchiveContainer;
use crate::io::{ByteStream, FileStream, MemoryStream};

/// Normalise `raw` into the resource GUID format.
///
/// Returns `None` for an empty input or one that folds away to nothing.
/// Leading `..` segments that cannot be folded are kept.
///
/// ```
/// use kiln_assets::path::canonical_path;
///
/// assert_eq!(canonical_path(r"data\\textures/./../meshes//a.mesh").as_deref(), Some("data/meshes/a.mesh"));
/// assert_eq!(canonical_path("/abs/file.txt").as_deref(), Some("abs/file.txt"));
/// assert_eq!(canonical_path(""), None);
/// ```
pub fn canonical_path(raw: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." if segments.last().is_some_and(|last| *last != "..") => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Lower-cased extension of a canonical path, without the dot.
pub fn extension(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_lowercase())
}

/// Maps resource paths to full paths and opens them.
///
/// Shared between the designated thread and workers, so implementations must
/// be thread-safe.
pub trait PathResolver: Send + Sync {
    /// Resolve `path` to the location it would be opened from. `None` if it
    /// does not exist anywhere the resolver looks.
    fn full_path(&self, path: &str) -> Option<String>;

    /// Open `path` for reading.
    fn open(&self, path: &str) -> Option<Box<dyn ByteStream>>;
}

/// Resolver over the disk and any mounted archives.
///
/// Lookups try mounted archives first (most recently mounted wins), then the
/// path as given, then each search path in order. Results of
/// [`full_path`](PathResolver::full_path) are cached until the search paths
/// change.
pub struct FileSystem {
    search_paths: RwLock<Vec<PathBuf>>,
    archives: RwLock<Vec<Arc<ArchiveContainer>>>,
    cache: ReentrantMutex<RefCell<HashMap<String, Option<String>>>>,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem {
    pub fn new() -> Self {
        Self {
            search_paths: RwLock::new(Vec::new()),
            archives: RwLock::new(Vec::new()),
            cache: ReentrantMutex::new(RefCell::new(HashMap::new())),
        }
    }

    /// Add a directory to look in. Ignored if already present.
    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut search_paths = self.search_paths.write();
        if search_paths.contains(&path) {
            return;
        }
        tracing::debug!("Added search path '{}'", path.display());
        search_paths.push(path);
        drop(search_paths);
        self.clear_cache();
    }

    pub fn remove_search_path(&self, path: impl AsRef<Path>) {
        self.search_paths.write().retain(|p| p != path.as_ref());
        self.clear_cache();
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.read().clone()
    }

    /// Make the entries of `archive` visible to lookups.
    pub fn mount(&self, archive: ArchiveContainer) -> Arc<ArchiveContainer> {
        let archive = Arc::new(archive);
        tracing::debug!("Mounted resource container '{}'", archive.path());
        self.archives.write().push(Arc::clone(&archive));
        self.clear_cache();
        archive
    }

    /// Open and mount the archive at `path`. `false` if it could not be opened.
    pub fn mount_file(&self, path: impl AsRef<Path>) -> bool {
        match ArchiveContainer::open_file(path.as_ref()) {
            Some(archive) => {
                self.mount(archive);
                true
            }
            None => {
                tracing::warn!("Failed to mount resource container '{}'", path.as_ref().display());
                false
            }
        }
    }

    pub fn unmount_all(&self) {
        self.archives.write().clear();
        self.clear_cache();
    }

    pub fn clear_cache(&self) {
        self.cache.lock().borrow_mut().clear();
    }

    fn find_archive(&self, canonical: &str) -> Option<Arc<ArchiveContainer>> {
        self.archives
            .read()
            .iter()
            .rev()
            .find(|archive| archive.contains(canonical))
            .cloned()
    }

    fn find_on_disk(&self, canonical: &str) -> Option<String> {
        let direct = Path::new(canonical);
        if direct.is_file() {
            return Some(canonical.to_string());
        }
        // `canonical_path` strips the leading slash of absolute paths.
        let absolute = format!("/{}", canonical);
        if Path::new(&absolute).is_file() {
            return Some(absolute);
        }

        self.search_paths
            .read()
            .iter()
            .map(|dir| dir.join(canonical))
            .find(|candidate| candidate.is_file())
            .map(|found| found.to_string_lossy().replace('\\', "/"))
    }
}

impl PathResolver for FileSystem {
    fn full_path(&self, path: &str) -> Option<String> {
        profile_function!();
        let canonical = canonical_path(path)?;

        let cache = self.cache.lock();
        if let Some(cached) = cache.borrow().get(&canonical) {
            return cached.clone();
        }

        let resolved = if self.find_archive(&canonical).is_some() {
            Some(canonical.clone())
        } else {
            self.find_on_disk(&canonical)
        };
        cache.borrow_mut().insert(canonical, resolved.clone());
        resolved
    }

    fn open(&self, path: &str) -> Option<Box<dyn ByteStream>> {
        profile_function!();
        let canonical = canonical_path(path)?;
        if let Some(archive) = self.find_archive(&canonical) {
            return archive
                .open_entry(&canonical)
                .map(|stream| Box::new(stream) as Box<dyn ByteStream>);
        }

        let full_path = self.full_path(&canonical)?;
        FileStream::open(&full_path).map(|stream| Box::new(stream) as Box<dyn ByteStream>)
    }
}

/// Resolver backed by a map of canonical path to bytes.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under the canonical form of `path`, replacing any
    /// previous contents.
    pub fn insert(&self, path: &str, bytes: impl Into<Arc<[u8]>>) {
        match canonical_path(path) {
            Some(path) => {
                self.files.write().insert(path, bytes.into());
            }
            None => tracing::warn!("Ignoring in-memory file with empty path"),
        }
    }

    pub fn remove(&self, path: &str) -> bool {
        canonical_path(path).is_some_and(|path| self.files.write().remove(&path).is_some())
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl PathResolver for MemoryFileSystem {
    fn full_path(&self, path: &str) -> Option<String> {
        let path = canonical_path(path)?;
        self.files.read().contains_key(&path).then_some(path)
    }

    fn open(&self, path: &str) -> Option<Box<dyn ByteStream>> {
        let path = canonical_path(path)?;
        let bytes = self.files.read().get(&path).cloned()?;
        Some(Box::new(MemoryStream::new(path, bytes)))
    }
}
