//! The resource registry - caches resources by GUID and drives their loading.
//!
//! Loading happens in three stages: the dummy is created on the requesting
//! thread, bytes are decoded on the worker pool, and the decoded data is
//! finalised on the designated thread by [`ResourceRegistry::pump`].
//!
//! Lock order: registry lock, then the resolver's path cache, then the worker
//! queue. The completion queue lock is a leaf and a resource's own lock is
//! never held while taking the registry lock.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

use kiln_core::alloc::{DenseComponentStore, Handle, HandleAllocator, HashMap, HashSet};
use kiln_core::profiling::{profile_function, profile_scope};
use kiln_core::worker::WorkerPool;
use parking_lot::{Condvar, Mutex, ReentrantMutex, RwLock};

use crate::error::{AssetError, AssetResult};
use crate::event::{ResourceEvent, ResourceEventBuffer};
use crate::handle::ResourceHandle;
use crate::loader::{ErasedLoader, FinalizeContext, LoaderRegistry, ResourceLoader};
use crate::path::{PathResolver, canonical_path, extension};
use crate::state::{AtomicLoadState, LoadMode, LoadState};

/// Registry settings.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Threads in the decode pool, 1 to [`kiln_core::worker::MAX_WORKERS`].
    pub worker_count: usize,
    /// Upper bound on finalisations per [`ResourceRegistry::pump`].
    pub max_finalize_per_pump: usize,
    /// Mode used by [`ResourceRegistry::load`].
    pub default_mode: LoadMode,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            max_finalize_per_pump: usize::MAX,
            default_mode: LoadMode::Async,
        }
    }
}

impl RegistryConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_max_finalize_per_pump(mut self, max: usize) -> Self {
        self.max_finalize_per_pump = max.max(1);
        self
    }

    pub fn with_default_mode(mut self, mode: LoadMode) -> Self {
        self.default_mode = mode;
        self
    }
}

/// One cached resource.
struct Entry {
    guid: String,
    full_path: Option<String>,
    type_id: TypeId,
    type_name: &'static str,
    /// `None` for resources inserted with [`ResourceRegistry::insert_manual`].
    loader: Option<Arc<dyn ErasedLoader>>,
    state: AtomicLoadState,
    initialized: AtomicBool,
    resident: AtomicBool,
    /// `None` only between reservation and dummy creation.
    object: Mutex<Option<Box<dyn Any + Send>>>,
}

impl Entry {
    fn finalize_context(&self) -> FinalizeContext<'_> {
        FinalizeContext {
            guid: &self.guid,
            full_path: self.full_path.as_deref().unwrap_or(&self.guid),
        }
    }
}

/// A finished decode waiting for the designated thread.
struct Completion {
    handle: Handle,
    entry: Arc<Entry>,
    result: AssetResult<Box<dyn Any + Send>>,
}

#[derive(Default)]
struct CompletionQueue {
    completions: Mutex<VecDeque<Completion>>,
    ready: Condvar,
}

impl CompletionQueue {
    fn push(&self, completion: Completion) {
        self.completions.lock().push_back(completion);
        self.ready.notify_all();
    }

    fn try_pop(&self) -> Option<Completion> {
        self.completions.lock().pop_front()
    }

    /// Pop the oldest completion, waiting up to `timeout` for one to arrive.
    fn wait_pop(&self, timeout: Duration) -> Option<Completion> {
        let mut completions = self.completions.lock();
        if completions.is_empty() {
            self.ready.wait_for(&mut completions, timeout);
        }
        completions.pop_front()
    }

    fn len(&self) -> usize {
        self.completions.lock().len()
    }

    fn is_empty(&self) -> bool {
        self.completions.lock().is_empty()
    }
}

#[derive(Default)]
struct Inner {
    handles: HandleAllocator,
    entries: DenseComponentStore<Arc<Entry>>,
    by_guid: HashMap<String, Handle>,
    /// Handles whose decode has not been finalised yet.
    in_flight: HashSet<Handle>,
    events: ResourceEventBuffer,
}

/// Caches resources by canonical path and loads them through registered
/// [`ResourceLoader`]s.
///
/// The thread that creates the registry is its designated thread: only it
/// may [`pump`](Self::pump) or [`wait_for`](Self::wait_for). Requests may come
/// from any thread.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kiln_assets::loader::TextLoader;
/// use kiln_assets::path::MemoryFileSystem;
/// use kiln_assets::registry::{RegistryConfig, ResourceRegistry};
/// use kiln_assets::state::LoadMode;
///
/// let fs = Arc::new(MemoryFileSystem::new());
/// fs.insert("greeting.txt", b"hello".to_vec());
///
/// let registry = ResourceRegistry::new(fs, RegistryConfig::default());
/// registry.register_loader(TextLoader);
///
/// let handle = registry.request::<String>("greeting.txt", LoadMode::Async).unwrap();
/// registry.wait_for(handle);
/// assert_eq!(registry.with_resource(handle, |s| s.clone()).unwrap(), "hello");
/// ```
pub struct ResourceRegistry {
    inner: ReentrantMutex<RefCell<Inner>>,
    loaders: RwLock<LoaderRegistry>,
    resolver: Arc<dyn PathResolver>,
    completions: Arc<CompletionQueue>,
    pool: WorkerPool,
    /// Immediate-mode decodes running on a requesting thread.
    caller_decodes: AtomicUsize,
    config: RegistryConfig,
    designated: ThreadId,
}

/// How long [`ResourceRegistry::wait_for`] sleeps before re-checking whether
/// anything can still complete.
const WAIT_SLICE: Duration = Duration::from_millis(10);

impl ResourceRegistry {
    /// Create a registry whose designated thread is the current one.
    ///
    /// # Panics
    ///
    /// Panics if `config.worker_count` is out of range.
    pub fn new(resolver: Arc<dyn PathResolver>, config: RegistryConfig) -> Self {
        tracing::debug!(
            "Creating resource registry with {} workers",
            config.worker_count
        );
        Self {
            inner: ReentrantMutex::new(RefCell::new(Inner::default())),
            loaders: RwLock::new(LoaderRegistry::new()),
            resolver,
            completions: Arc::new(CompletionQueue::default()),
            pool: WorkerPool::new(config.worker_count),
            caller_decodes: AtomicUsize::new(0),
            config,
            designated: thread::current().id(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<dyn PathResolver> {
        &self.resolver
    }

    pub fn register_loader<L: ResourceLoader>(&self, loader: L) {
        self.loaders.write().register(loader);
    }

    pub fn has_loader_for<T: 'static>(&self, extension: &str) -> bool {
        self.loaders.read().has_loader_for::<T>(extension)
    }

    pub fn is_designated_thread(&self) -> bool {
        thread::current().id() == self.designated
    }

    fn check_designated(&self, operation: &str) -> bool {
        let ok = self.is_designated_thread();
        debug_assert!(ok, "{operation} must run on the designated thread");
        if !ok {
            tracing::error!("{} called off the designated thread, ignoring", operation);
        }
        ok
    }

    /// [`request`](Self::request) with the configured default mode.
    pub fn load<T: Send + 'static>(&self, path: &str) -> Option<ResourceHandle<T>> {
        self.request(path, self.config.default_mode)
    }

    /// Get or start loading the resource at `path`.
    ///
    /// A cached GUID returns its existing handle, whatever its load state. A
    /// new one gets a dummy straight away, and is decoded either before this
    /// returns or on the worker pool, according to `mode`. Concurrent first
    /// requests for one GUID share a single decode.
    ///
    /// Returns `None`, with a warning, if the path is empty, no loader for
    /// `T` handles its extension, or the GUID is cached as another type.
    pub fn request<T: Send + 'static>(
        &self,
        path: &str,
        mode: LoadMode,
    ) -> Option<ResourceHandle<T>> {
        profile_function!();
        let Some(guid) = canonical_path(path) else {
            tracing::warn!("Cannot request a resource with an empty path");
            return None;
        };

        // Held until the GUID is reserved, so first requests for it coalesce.
        // Decoding happens after it is released.
        let guard = self.inner.lock();

        let cached = guard.borrow().by_guid.get(&guid).copied();
        if let Some(handle) = cached {
            return self.cached_handle::<T>(handle, &guid);
        }

        let loader = match extension(&guid) {
            Some(ext) => self.loaders.read().get::<T>(&ext).cloned(),
            None => None,
        };
        let Some(loader) = loader else {
            let err = AssetError::NoLoader {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                extension: extension(&guid),
            };
            tracing::warn!("Cannot load '{}': {}", guid, err);
            return None;
        };

        let full_path = self.resolver.full_path(&guid);
        let entry = Arc::new(Entry {
            guid: guid.clone(),
            full_path: full_path.clone(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            loader: Some(Arc::clone(&loader)),
            state: AtomicLoadState::new(LoadState::Created),
            initialized: AtomicBool::new(false),
            resident: AtomicBool::new(false),
            object: Mutex::new(None),
        });

        // Reserve the GUID before any loader code runs, so a loader that
        // requests its own GUID gets this handle back.
        let handle = {
            let mut inner = guard.borrow_mut();
            let handle = inner.handles.allocate();
            inner.entries.add(handle, Arc::clone(&entry));
            inner.by_guid.insert(guid.clone(), handle);
            inner.events.push(ResourceEvent::LoadRequested {
                handle,
                type_id: entry.type_id,
                guid: guid.clone(),
            });
            handle
        };

        let dummy = {
            profile_scope!("create_dummy");
            loader.create_dummy_erased()
        };
        *entry.object.lock() = Some(dummy);
        entry.initialized.store(true, Ordering::Release);

        if full_path.is_none() {
            let err = AssetError::NotFound { path: guid.clone() };
            tracing::warn!("Failed to load '{}': {}", guid, err);
            self.fail(handle, &entry, &err);
            return Some(ResourceHandle::new(handle));
        }

        match mode {
            LoadMode::Immediate => {
                entry.state.set(LoadState::Decoding);
                guard.borrow_mut().in_flight.insert(handle);
                self.caller_decodes.fetch_add(1, Ordering::AcqRel);
                drop(guard);
                self.load_immediate(handle, entry);
            }
            LoadMode::Async => {
                self.load_async(handle, entry);
                drop(guard);
            }
        }

        Some(ResourceHandle::new(handle))
    }

    /// [`request`](Self::request) every path in `paths`, in order.
    ///
    /// The result has one slot per path; `None` where the request was
    /// rejected.
    pub fn request_all<T, I>(&self, paths: I, mode: LoadMode) -> Vec<Option<ResourceHandle<T>>>
    where
        T: Send + 'static,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        profile_function!();
        paths
            .into_iter()
            .map(|path| self.request(path.as_ref(), mode))
            .collect()
    }

    fn cached_handle<T: 'static>(&self, handle: Handle, guid: &str) -> Option<ResourceHandle<T>> {
        let entry = self.entry(handle)?;
        if entry.type_id != TypeId::of::<T>() {
            tracing::warn!(
                "'{}' was requested as {} but is cached as {}",
                guid,
                std::any::type_name::<T>(),
                entry.type_name
            );
            return None;
        }
        Some(ResourceHandle::new(handle))
    }

    /// Decode on the calling thread. The handle is already in flight and the
    /// registry lock is not held.
    fn load_immediate(&self, handle: Handle, entry: Arc<Entry>) {
        let result = decode(self.resolver.as_ref(), &entry);

        if self.is_designated_thread() {
            let _guard = self.inner.lock();
            self.complete(Completion {
                handle,
                entry,
                result,
            });
        } else {
            // Finalisation has to wait for the designated thread.
            if result.is_ok() {
                entry.state.set(LoadState::Decoded);
            }
            self.completions.push(Completion {
                handle,
                entry,
                result,
            });
        }
        self.caller_decodes.fetch_sub(1, Ordering::AcqRel);
    }

    fn load_async(&self, handle: Handle, entry: Arc<Entry>) {
        entry.state.set(LoadState::Queued);
        self.inner.lock().borrow_mut().in_flight.insert(handle);

        let resolver = Arc::clone(&self.resolver);
        let completions = Arc::clone(&self.completions);
        self.pool.enqueue(move || {
            entry.state.set(LoadState::Decoding);
            let result = decode(resolver.as_ref(), &entry);
            if result.is_ok() {
                entry.state.set(LoadState::Decoded);
            }
            completions.push(Completion {
                handle,
                entry,
                result,
            });
        });
    }

    /// Finalise completed decodes, oldest first.
    ///
    /// Must run on the designated thread. Processes at most
    /// `max_finalize_per_pump` completions and returns how many it handled.
    pub fn pump(&self) -> usize {
        profile_function!();
        if !self.check_designated("ResourceRegistry::pump") {
            return 0;
        }

        let _guard = self.inner.lock();
        let mut processed = 0;
        while processed < self.config.max_finalize_per_pump {
            let Some(completion) = self.completions.try_pop() else {
                break;
            };
            self.complete(completion);
            processed += 1;
        }
        processed
    }

    /// Block until the in-flight decode of `handle` is finalised.
    ///
    /// Completions that arrive first are finalised along the way, in order.
    /// Gives up, returning `false`, once the pool is suspended and nothing
    /// that could finish `handle` is still running. Returns whether the
    /// resource ended up resident.
    pub fn wait_for<T>(&self, handle: ResourceHandle<T>) -> bool
    where
        T: 'static,
    {
        profile_function!();
        if !self.check_designated("ResourceRegistry::wait_for") {
            return false;
        }

        let handle = handle.handle();
        loop {
            let in_flight = self.inner.lock().borrow().in_flight.contains(&handle);
            if !in_flight {
                break;
            }
            if let Some(completion) = self.completions.wait_pop(WAIT_SLICE) {
                let _guard = self.inner.lock();
                self.complete(completion);
                continue;
            }
            if self.is_stalled() {
                tracing::warn!("Not waiting for {:?}: the worker pool is suspended", handle);
                return false;
            }
        }
        self.is_resident_raw(handle)
    }

    /// `true` if no completion can arrive until the pool is resumed.
    ///
    /// Running jobs and caller decodes push their completion before they stop
    /// counting, so reading the counters before the queue never misses one.
    fn is_stalled(&self) -> bool {
        self.pool.is_suspended()
            && self.pool.running_job_count() == 0
            && self.caller_decodes.load(Ordering::Acquire) == 0
            && self.completions.is_empty()
    }

    fn complete(&self, completion: Completion) {
        let Completion {
            handle,
            entry,
            result,
        } = completion;

        let current = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            inner.in_flight.remove(&handle);
            inner.entries.try_get(handle).cloned()
        };
        if !current.is_some_and(|current| Arc::ptr_eq(&current, &entry)) {
            tracing::debug!("Discarding decode result for unloaded resource '{}'", entry.guid);
            return;
        }

        match result {
            Ok(decoded) => self.finalize(handle, &entry, decoded),
            Err(err) => self.fail(handle, &entry, &err),
        }
    }

    fn finalize(&self, handle: Handle, entry: &Entry, decoded: Box<dyn Any + Send>) {
        profile_function!();
        let result = match (&entry.loader, entry.object.lock().as_mut()) {
            (Some(loader), Some(object)) => {
                loader.on_decoded_erased(object.as_mut(), decoded, &entry.finalize_context())
            }
            _ => Err(AssetError::finalize(&entry.guid, "resource has no loader or dummy")),
        };
        if let Err(err) = result {
            tracing::warn!("Failed to finalize '{}': {}", entry.guid, err);
        }

        entry.resident.store(true, Ordering::Release);
        entry.state.set(LoadState::Finalized);
        tracing::debug!("Finalized '{}'", entry.guid);

        self.emit(ResourceEvent::Loaded {
            handle,
            type_id: entry.type_id,
            guid: entry.guid.clone(),
        });
    }

    fn fail(&self, handle: Handle, entry: &Entry, err: &AssetError) {
        entry.state.set(LoadState::Failed);
        self.emit(ResourceEvent::LoadFailed {
            handle,
            type_id: entry.type_id,
            guid: entry.guid.clone(),
            error: err.to_string(),
        });
    }

    fn emit(&self, event: ResourceEvent) {
        self.inner.lock().borrow_mut().events.push(event);
    }

    fn entry(&self, handle: Handle) -> Option<Arc<Entry>> {
        self.inner.lock().borrow().entries.try_get(handle).cloned()
    }

    fn is_resident_raw(&self, handle: Handle) -> bool {
        self.entry(handle)
            .is_some_and(|entry| entry.resident.load(Ordering::Acquire))
    }

    /// Register an already-built resource under `guid`.
    ///
    /// Returns `None`, with a warning, if the GUID is already taken.
    pub fn insert_manual<T: Send + 'static>(
        &self,
        guid: &str,
        resource: T,
    ) -> Option<ResourceHandle<T>> {
        let Some(guid) = canonical_path(guid) else {
            tracing::warn!("Cannot insert a resource with an empty GUID");
            return None;
        };

        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner.by_guid.contains_key(&guid) {
            tracing::warn!("Resource '{}' already exists", guid);
            return None;
        }

        let entry = Arc::new(Entry {
            guid: guid.clone(),
            full_path: None,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            loader: None,
            state: AtomicLoadState::new(LoadState::Finalized),
            initialized: AtomicBool::new(true),
            resident: AtomicBool::new(true),
            object: Mutex::new(Some(Box::new(resource))),
        });

        let handle = inner.handles.allocate();
        inner.entries.add(handle, entry);
        inner.by_guid.insert(guid.clone(), handle);
        inner.events.push(ResourceEvent::Loaded {
            handle,
            type_id: TypeId::of::<T>(),
            guid,
        });
        Some(ResourceHandle::new(handle))
    }

    /// Handle of an already cached resource, without loading anything.
    pub fn find<T: 'static>(&self, path: &str) -> Option<ResourceHandle<T>> {
        let guid = canonical_path(path)?;
        let handle = self.inner.lock().borrow().by_guid.get(&guid).copied()?;
        self.entry(handle)
            .filter(|entry| entry.type_id == TypeId::of::<T>())
            .map(|_| ResourceHandle::new(handle))
    }

    /// Run `f` on the resource. `None` if the handle is stale or the resource
    /// is still being reserved.
    ///
    /// The registry lock is not held while `f` runs; the resource's own lock
    /// is.
    pub fn with_resource<T: 'static, R>(
        &self,
        handle: ResourceHandle<T>,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        let entry = self.entry(handle.handle())?;
        let object = entry.object.lock();
        object.as_ref()?.downcast_ref::<T>().map(f)
    }

    pub fn with_resource_mut<T: 'static, R>(
        &self,
        handle: ResourceHandle<T>,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let entry = self.entry(handle.handle())?;
        let mut object = entry.object.lock();
        object.as_mut()?.downcast_mut::<T>().map(f)
    }

    /// `true` once the dummy exists.
    pub fn is_initialized<T: 'static>(&self, handle: ResourceHandle<T>) -> bool {
        self.entry(handle.handle())
            .is_some_and(|entry| entry.initialized.load(Ordering::Acquire))
    }

    /// `true` once decoded data has been finalised into the resource.
    pub fn is_resident<T: 'static>(&self, handle: ResourceHandle<T>) -> bool {
        self.is_resident_raw(handle.handle())
    }

    pub fn state<T: 'static>(&self, handle: ResourceHandle<T>) -> Option<LoadState> {
        self.entry(handle.handle()).map(|entry| entry.state.get())
    }

    pub fn guid<T: 'static>(&self, handle: ResourceHandle<T>) -> Option<String> {
        self.entry(handle.handle()).map(|entry| entry.guid.clone())
    }

    /// `false` once the handle has been unloaded.
    pub fn contains<T: 'static>(&self, handle: ResourceHandle<T>) -> bool {
        self.inner.lock().borrow().entries.contains(handle.handle())
    }

    /// Whether `path` is cached, in any state.
    pub fn resource_exists(&self, path: &str) -> bool {
        canonical_path(path)
            .is_some_and(|guid| self.inner.lock().borrow().by_guid.contains_key(&guid))
    }

    /// Whether `path` is cached and resident.
    pub fn resource_loaded(&self, path: &str) -> bool {
        let Some(guid) = canonical_path(path) else {
            return false;
        };
        let handle = self.inner.lock().borrow().by_guid.get(&guid).copied();
        handle.is_some_and(|handle| self.is_resident_raw(handle))
    }

    /// Drop the resource, whatever its load state. A decode still in flight
    /// runs to completion and its result is discarded.
    pub fn unload<T: 'static>(&self, handle: ResourceHandle<T>) -> bool {
        self.remove(handle.handle())
    }

    pub fn unload_guid(&self, path: &str) -> bool {
        let Some(guid) = canonical_path(path) else {
            return false;
        };
        let handle = self.inner.lock().borrow().by_guid.get(&guid).copied();
        handle.is_some_and(|handle| self.remove(handle))
    }

    fn remove(&self, handle: Handle) -> bool {
        let guard = self.inner.lock();
        let entry = {
            let mut inner = guard.borrow_mut();
            let Some(entry) = inner.entries.try_get(handle).cloned() else {
                return false;
            };
            inner.entries.remove(handle);
            inner.handles.release(handle);
            inner.by_guid.remove(&entry.guid);
            inner.in_flight.remove(&handle);
            inner.events.push(ResourceEvent::Unloaded {
                handle,
                type_id: entry.type_id,
                guid: entry.guid.clone(),
            });
            entry
        };
        tracing::debug!("Unloaded '{}'", entry.guid);
        // The resource is dropped here, outside the borrow, unless a worker
        // still holds the entry.
        drop(entry);
        true
    }

    /// Unload every resource.
    pub fn clear(&self) {
        profile_function!();
        let handles: Vec<Handle> = self.inner.lock().borrow().entries.owners().to_vec();
        for handle in handles {
            self.remove(handle);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resources whose decode has not been finalised yet.
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().borrow().in_flight.len()
    }

    /// Stop starting new decodes. Running decodes finish.
    pub fn suspend(&self) {
        self.pool.suspend();
    }

    pub fn resume(&self) {
        self.pool.resume();
    }

    /// Take every buffered event. Events accumulate until drained; an owner
    /// that never calls this should not keep the registry for long.
    pub fn drain_events(&self) -> Vec<ResourceEvent> {
        self.inner.lock().borrow_mut().events.drain().collect()
    }
}

impl Drop for ResourceRegistry {
    fn drop(&mut self) {
        tracing::debug!(
            "Dropping resource registry with {} resources ({} in flight)",
            self.len(),
            self.in_flight_count()
        );
    }
}

/// Open and decode `entry` on the current thread, logging one warning on
/// failure. A panicking loader counts as a failed decode.
fn decode(resolver: &dyn PathResolver, entry: &Entry) -> AssetResult<Box<dyn Any + Send>> {
    profile_function!();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let loader = entry
            .loader
            .as_ref()
            .ok_or_else(|| AssetError::decode(&entry.guid, "no loader"))?;
        let mut stream = resolver.open(&entry.guid).ok_or_else(|| AssetError::NotFound {
            path: entry.guid.clone(),
        })?;
        loader.decode_erased(stream.as_mut())
    }))
    .unwrap_or_else(|_| Err(AssetError::decode(&entry.guid, "loader panicked")));

    if let Err(err) = &result {
        tracing::warn!("Failed to load '{}': {}", entry.guid, err);
    }
    result
}
