//! Typed resource handles.
//!
//! A [`ResourceHandle<T>`] is a registry [`Handle`] tagged with the resource
//! type it was requested as. It is `Copy` and carries no ownership: after the
//! resource is unloaded the handle simply stops resolving.

use std::any::TypeId;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use kiln_core::alloc::Handle;

/// A typed handle to a resource in a [`ResourceRegistry`](crate::registry::ResourceRegistry).
pub struct ResourceHandle<T> {
    handle: Handle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ResourceHandle<T> {
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    /// The untyped registry handle.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn untyped(self) -> UntypedResourceHandle {
        UntypedResourceHandle {
            handle: self.handle,
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T> std::fmt::Debug for ResourceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("type", &std::any::type_name::<T>())
            .field("index", &self.handle.index())
            .field("generation", &self.handle.generation())
            .finish()
    }
}

impl<T> Clone for ResourceHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ResourceHandle<T> {}

impl<T> PartialEq for ResourceHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T> Eq for ResourceHandle<T> {}

impl<T> Hash for ResourceHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

/// A handle whose resource type is only known at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UntypedResourceHandle {
    handle: Handle,
    type_id: TypeId,
}

impl UntypedResourceHandle {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Convert back to a typed handle. `None` if `T` is not the type it was
    /// created with.
    pub fn typed<T: 'static>(self) -> Option<ResourceHandle<T>> {
        (self.type_id == TypeId::of::<T>()).then(|| ResourceHandle::new(self.handle))
    }
}

impl<T: 'static> From<ResourceHandle<T>> for UntypedResourceHandle {
    fn from(handle: ResourceHandle<T>) -> Self {
        handle.untyped()
    }
}
