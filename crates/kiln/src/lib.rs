//! Kiln - engine core services
//!
//! Re-exports the Kiln sub-crates and ties them together:
//!
//! - [`Engine`] owns the [`FileSystem`](assets::FileSystem), the
//!   [`ResourceRegistry`](assets::ResourceRegistry) and the [`Services`] map
//! - [`Engine::update`] finalises completed loads once per frame
//!
//! # Quick Start
//!
//! ```no_run
//! use kiln::prelude::*;
//!
//! let mut engine = Engine::builder()
//!     .add_search_path("assets")
//!     .mount_archive("assets/data.pak")
//!     .install_logging(true)
//!     .build();
//!
//! let readme = engine.load::<String>("docs/readme.txt", LoadMode::Async).unwrap();
//! while !engine.registry().is_resident(readme) {
//!     engine.update();
//! }
//! ```

pub mod engine;
pub mod services;

pub use kiln_assets as assets;
pub use kiln_core as core;

pub use engine::{Engine, EngineBuilder, EngineConfig};
pub use kiln_assets::{LoadMode, RegistryConfig, ResourceHandle, ResourceLoader};
pub use services::{Service, Services};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::{Engine, EngineBuilder, EngineConfig};
    pub use crate::services::{Service, Services};

    pub use kiln_assets::{
        AssetError, AssetResult, ByteStream, FinalizeContext, LoadMode, LoadState,
        RegistryConfig, ResourceEvent, ResourceHandle, ResourceLoader, ResourceRegistry,
    };
    pub use kiln_core::alloc::{DenseComponentStore, Handle, HandleAllocator};
}
