//! Engine: owns the file system, the resource registry and the service map.

use std::path::PathBuf;
use std::sync::Arc;

use kiln_assets::{
    BytesLoader, FileSystem, LoadMode, RegistryConfig, ResourceEvent, ResourceHandle,
    ResourceLoader, ResourceRegistry, TextLoader,
};
use kiln_core::config::Config;
use kiln_core::profiling::{self, profile_function};

use crate::services::{Service, Services};

/// Everything needed to build an [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub core: Config,
    pub registry: RegistryConfig,
    /// Directories searched, in order, for files not found in an archive.
    pub search_paths: Vec<PathBuf>,
    /// Archive files mounted at startup. Later archives take precedence.
    pub archives: Vec<PathBuf>,
    /// Register [`TextLoader`] and [`BytesLoader`].
    pub default_loaders: bool,
    /// Install the `tracing` subscriber (and profiler) from `core` on build.
    pub install_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            core: Config::default(),
            registry: RegistryConfig::default(),
            search_paths: Vec::new(),
            archives: Vec::new(),
            default_loaders: true,
            install_logging: false,
        }
    }
}

type LoaderRegistration = Box<dyn FnOnce(&ResourceRegistry)>;

/// Builder for an [`Engine`].
///
/// # Example
///
/// ```
/// use kiln::{EngineBuilder, LoadMode};
///
/// let dir = std::env::temp_dir();
/// let engine = EngineBuilder::new()
///     .add_search_path(&dir)
///     .insert_service(60u32)
///     .build();
///
/// assert_eq!(*engine.services().get::<u32>().unwrap(), 60);
/// assert!(engine.registry().request::<String>("", LoadMode::Immediate).is_none());
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    loaders: Vec<LoaderRegistration>,
    services: Services,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            loaders: Vec::new(),
            services: Services::new(),
        }
    }

    pub fn registry_config(mut self, registry: RegistryConfig) -> Self {
        self.config.registry = registry;
        self
    }

    pub fn add_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.search_paths.push(path.into());
        self
    }

    pub fn mount_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.archives.push(path.into());
        self
    }

    pub fn default_loaders(mut self, enabled: bool) -> Self {
        self.config.default_loaders = enabled;
        self
    }

    pub fn install_logging(mut self, enabled: bool) -> Self {
        self.config.install_logging = enabled;
        self
    }

    /// Register a loader once the registry exists.
    pub fn add_loader<L: ResourceLoader>(mut self, loader: L) -> Self {
        self.loaders
            .push(Box::new(move |registry| registry.register_loader(loader)));
        self
    }

    pub fn insert_service<S: Service>(mut self, service: S) -> Self {
        self.services.insert(service);
        self
    }

    /// Build the engine. The calling thread becomes the registry's designated
    /// thread, so this should run on the thread that will call
    /// [`Engine::update`].
    pub fn build(self) -> Engine {
        let EngineBuilder {
            config,
            loaders,
            services,
        } = self;

        if config.install_logging {
            config.core.apply();
        }

        let file_system = Arc::new(FileSystem::new());
        for path in &config.search_paths {
            file_system.add_search_path(path.clone());
        }
        for path in &config.archives {
            if !file_system.mount_file(path) {
                tracing::warn!("Could not mount archive '{}'", path.display());
            }
        }

        let registry = Arc::new(ResourceRegistry::new(
            file_system.clone(),
            config.registry.clone(),
        ));
        if config.default_loaders {
            registry.register_loader(TextLoader);
            registry.register_loader(BytesLoader);
        }
        let custom_loaders = loaders.len();
        for register in loaders {
            register(&registry);
        }

        tracing::info!(
            "Engine built: {} search paths, {} archives, {} custom loaders",
            config.search_paths.len(),
            config.archives.len(),
            custom_loaders
        );

        Engine {
            services,
            registry,
            file_system,
            config,
            events: Vec::new(),
            frame: 0,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The services of a running engine.
///
/// Dropping the engine drops the services first, then the registry (joining
/// its workers), then the file system.
pub struct Engine {
    services: Services,
    registry: Arc<ResourceRegistry>,
    file_system: Arc<FileSystem>,
    config: EngineConfig,
    /// Registry events drained by the last [`Engine::update`].
    events: Vec<ResourceEvent>,
    frame: u64,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn file_system(&self) -> &Arc<FileSystem> {
        &self.file_system
    }

    /// Shorthand for [`ResourceRegistry::request`].
    pub fn load<T: Send + 'static>(&self, path: &str, mode: LoadMode) -> Option<ResourceHandle<T>> {
        self.registry.request(path, mode)
    }

    /// Run one frame: finalise completed loads and collect this frame's
    /// registry events. Returns how many loads were finalised.
    ///
    /// Events from the previous frame are discarded, so the registry's event
    /// buffer never outgrows one frame.
    pub fn update(&mut self) -> usize {
        profiling::new_frame();
        profile_function!();
        self.frame += 1;
        let finalized = self.registry.pump();
        self.events = self.registry.drain_events();
        finalized
    }

    /// Registry events collected by the last [`update`](Self::update).
    pub fn events(&self) -> &[ResourceEvent] {
        &self.events
    }

    /// Frames run so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        tracing::debug!("Shutting down engine after {} frames", self.frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_registers_default_loaders() {
        let engine = EngineBuilder::new().build();
        assert!(engine.registry().has_loader_for::<String>("txt"));
        assert!(engine.registry().has_loader_for::<Vec<u8>>("bin"));

        let bare = EngineBuilder::new().default_loaders(false).build();
        assert!(!bare.registry().has_loader_for::<String>("txt"));
    }

    #[test]
    fn test_update_counts_frames() {
        let mut engine = Engine::builder().build();
        assert_eq!(engine.update(), 0);
        assert_eq!(engine.update(), 0);
        assert_eq!(engine.frame(), 2);
    }

    #[test]
    fn test_update_keeps_one_frame_of_events() {
        let mut engine = EngineBuilder::new().build();
        engine.registry().insert_manual("builtin/answer", 42u32).unwrap();
        assert!(engine.events().is_empty());

        engine.update();
        assert_eq!(engine.events().len(), 1);
        assert!(engine.events()[0].is_loaded());

        engine.update();
        assert!(engine.events().is_empty());
        assert!(engine.registry().drain_events().is_empty());
    }

    #[test]
    fn test_missing_archive_is_skipped() {
        let engine = EngineBuilder::new()
            .mount_archive("/definitely/not/here.pak")
            .build();
        assert_eq!(engine.config().archives.len(), 1);
        assert!(engine.registry().is_empty());
    }
}
