//! Resource lifecycle events.

use std::any::TypeId;

use kiln_core::alloc::Handle;

/// Events emitted by the [`ResourceRegistry`](crate::registry::ResourceRegistry).
///
/// Buffered until the designated thread drains them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    /// A new GUID entered the registry and its dummy was created.
    LoadRequested {
        handle: Handle,
        type_id: TypeId,
        guid: String,
    },

    /// `on_decoded` ran and the resource is resident.
    Loaded {
        handle: Handle,
        type_id: TypeId,
        guid: String,
    },

    /// Opening or decoding failed; the dummy stays in place.
    LoadFailed {
        handle: Handle,
        type_id: TypeId,
        guid: String,
        error: String,
    },

    /// The resource was removed from the registry.
    Unloaded {
        handle: Handle,
        type_id: TypeId,
        guid: String,
    },
}

impl ResourceEvent {
    pub fn handle(&self) -> Handle {
        match self {
            ResourceEvent::LoadRequested { handle, .. }
            | ResourceEvent::Loaded { handle, .. }
            | ResourceEvent::LoadFailed { handle, .. }
            | ResourceEvent::Unloaded { handle, .. } => *handle,
        }
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            ResourceEvent::LoadRequested { type_id, .. }
            | ResourceEvent::Loaded { type_id, .. }
            | ResourceEvent::LoadFailed { type_id, .. }
            | ResourceEvent::Unloaded { type_id, .. } => *type_id,
        }
    }

    pub fn guid(&self) -> &str {
        match self {
            ResourceEvent::LoadRequested { guid, .. }
            | ResourceEvent::Loaded { guid, .. }
            | ResourceEvent::LoadFailed { guid, .. }
            | ResourceEvent::Unloaded { guid, .. } => guid,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ResourceEvent::Loaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ResourceEvent::LoadFailed { .. })
    }
}

/// A buffer of events drained once per frame.
#[derive(Debug, Default)]
pub struct ResourceEventBuffer {
    events: Vec<ResourceEvent>,
}

impl ResourceEventBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: ResourceEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = ResourceEvent> + '_ {
        self.events.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
