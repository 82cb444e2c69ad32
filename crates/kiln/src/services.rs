//! Engine-wide services.
//!
//! Services are the shared objects a subsystem needs (the file system, the
//! resource registry, game configuration). They are constructed once, owned by
//! the [`Engine`](crate::Engine) and handed out by reference, so there is no
//! process-wide singleton to initialise or tear down.

use std::any::{Any, TypeId};

use kiln_core::alloc::HashMap;

/// Marker trait for types that can be stored as services.
pub trait Service: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Service for T {}

struct ServiceEntry {
    data: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// One instance per service type.
///
/// # Example
///
/// ```
/// use kiln::Services;
///
/// struct GameConfig {
///     title: String,
/// }
///
/// let mut services = Services::new();
/// services.insert(GameConfig {
///     title: "Kiln".to_string(),
/// });
///
/// assert_eq!(services.get::<GameConfig>().unwrap().title, "Kiln");
/// ```
#[derive(Default)]
pub struct Services {
    storage: HashMap<TypeId, ServiceEntry>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a service, returning the one it replaced.
    pub fn insert<S: Service>(&mut self, service: S) -> Option<S> {
        let entry = ServiceEntry {
            data: Box::new(service),
            type_name: std::any::type_name::<S>(),
        };
        self.storage
            .insert(TypeId::of::<S>(), entry)
            .and_then(|old| old.data.downcast::<S>().ok().map(|b| *b))
    }

    pub fn get<S: Service>(&self) -> Option<&S> {
        self.storage
            .get(&TypeId::of::<S>())
            .and_then(|entry| entry.data.downcast_ref())
    }

    pub fn get_mut<S: Service>(&mut self) -> Option<&mut S> {
        self.storage
            .get_mut(&TypeId::of::<S>())
            .and_then(|entry| entry.data.downcast_mut())
    }

    pub fn remove<S: Service>(&mut self) -> Option<S> {
        self.storage
            .remove(&TypeId::of::<S>())
            .and_then(|entry| entry.data.downcast::<S>().ok().map(|b| *b))
    }

    pub fn contains<S: Service>(&self) -> bool {
        self.storage.contains_key(&TypeId::of::<S>())
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Get the service, inserting `f()` first if it is missing.
    pub fn get_or_insert_with<S: Service>(&mut self, f: impl FnOnce() -> S) -> &mut S {
        let entry = self
            .storage
            .entry(TypeId::of::<S>())
            .or_insert_with(|| ServiceEntry {
                data: Box::new(f()),
                type_name: std::any::type_name::<S>(),
            });
        match entry.data.downcast_mut::<S>() {
            Some(service) => service,
            // Keys are the TypeId of the boxed value.
            None => unreachable!("service stored under the wrong TypeId"),
        }
    }

    pub fn get_or_default<S: Service + Default>(&mut self) -> &mut S {
        self.get_or_insert_with(S::default)
    }

    /// Type names of every stored service, for debugging.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.storage.values().map(|entry| entry.type_name)
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("count", &self.storage.len())
            .field("types", &self.type_names().collect::<Vec<_>>())
            .finish()
    }
}
