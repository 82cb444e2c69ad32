//! Resource loading for the Kiln engine.
//!
//! - [`registry::ResourceRegistry`] caches resources by canonical path and
//!   loads them in three stages (dummy, worker decode, designated-thread
//!   finalise).
//! - [`loader::ResourceLoader`] is the contract a resource type implements.
//! - [`path::FileSystem`] resolves paths against search directories and
//!   mounted [`archive::ArchiveContainer`]s.

pub mod archive;
pub mod error;
pub mod event;
pub mod handle;
pub mod io;
pub mod loader;
pub mod path;
pub mod registry;
pub mod state;

pub use archive::{ArchiveContainer, ArchiveEntry, ArchiveEntryStream, ArchiveWriter};
pub use error::{AssetError, AssetResult};
pub use event::ResourceEvent;
pub use handle::{ResourceHandle, UntypedResourceHandle};
pub use io::{ByteStream, FileStream, MemoryStream, SeekOrigin};
pub use loader::{BytesLoader, FinalizeContext, LoaderRegistry, ResourceLoader, TextLoader};
pub use path::{FileSystem, MemoryFileSystem, PathResolver, canonical_path};
pub use registry::{RegistryConfig, ResourceRegistry};
pub use state::{LoadMode, LoadState};
