//! Generational handles.
//!
//! A [`Handle`] packs a slot index and a generation counter into one `u64`.
//! The [`HandleAllocator`] hands out indices, recycles them through a free list
//! and bumps the generation on every release, so a handle kept past its
//! release is detected by [`HandleAllocator::is_valid`] instead of silently
//! aliasing the slot's next owner.

use std::fmt;

use crate::profiling::profile_function;

/// Number of bits used for the index part of a handle.
pub const HANDLE_INDEX_BITS: u32 = 32;
/// Largest generation before it wraps back to 1.
pub const MAX_GENERATION: u32 = u32::MAX;

const INDEX_MASK: u64 = (1 << HANDLE_INDEX_BITS) - 1;

/// An index + generation pair identifying a slot owned by a [`HandleAllocator`].
///
/// Generation 0 is never issued, which makes the all-zero value
/// ([`Handle::INVALID`]) a safe sentinel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Handle(u64);

impl Handle {
    /// The "no handle" sentinel.
    pub const INVALID: Handle = Handle(0);

    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << HANDLE_INDEX_BITS) | index as u64)
    }

    /// Rebuild a handle from [`Handle::id`].
    pub const fn from_id(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }

    pub const fn index(&self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    pub const fn generation(&self) -> u32 {
        (self.0 >> HANDLE_INDEX_BITS) as u32
    }

    /// `false` only for the sentinel. Says nothing about liveness; ask the
    /// allocator for that.
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Handle({}v{})", self.index(), self.generation())
        } else {
            f.write_str("Handle(INVALID)")
        }
    }
}

static_assertions::assert_eq_size!(Handle, u64);

/// Issues and reclaims generation-checked handles.
///
/// Not synchronised: wrap it in a lock if more than one thread allocates.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    generations: Vec<u32>,
    free: Vec<u32>,
    live: usize,
}

impl HandleAllocator {
    pub const fn new() -> Self {
        Self {
            generations: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Returns a fresh handle, reusing the most recently freed index if any.
    pub fn allocate(&mut self) -> Handle {
        profile_function!();
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = self.generations.len() as u32;
                self.generations.push(1);
                index
            }
        };
        self.live += 1;
        Handle::new(index, self.generations[index as usize])
    }

    /// Release a live handle.
    ///
    /// Releasing a stale or foreign handle is a contract violation: it
    /// asserts in debug builds and is ignored in release builds.
    pub fn release(&mut self, handle: Handle) {
        profile_function!();
        debug_assert!(self.is_valid(handle), "releasing invalid handle {handle:?}");
        if !self.is_valid(handle) {
            return;
        }

        let generation = &mut self.generations[handle.index() as usize];
        *generation = if *generation == MAX_GENERATION {
            1
        } else {
            *generation + 1
        };
        self.free.push(handle.index());
        self.live -= 1;
    }

    pub fn is_valid(&self, handle: Handle) -> bool {
        self.generations
            .get(handle.index() as usize)
            .is_some_and(|&generation| generation == handle.generation())
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of indices ever issued (live or free).
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    /// Forget every handle. Previously issued handles may validate again
    /// after a reset, so only call this when tearing the owner down.
    pub fn reset(&mut self) {
        self.generations = Vec::new();
        self.free = Vec::new();
        self.live = 0;
    }
}

/// Returned by [`FixedHandleAllocator::allocate`] when every slot is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleExhausted {
    pub capacity: usize,
}

impl fmt::Display for HandleExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all {} handles are in use", self.capacity)
    }
}

impl std::error::Error for HandleExhausted {}

/// A [`HandleAllocator`] that never grows past a fixed number of slots.
#[derive(Debug)]
pub struct FixedHandleAllocator {
    inner: HandleAllocator,
    capacity: usize,
}

impl FixedHandleAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: HandleAllocator {
                generations: Vec::with_capacity(capacity),
                free: Vec::new(),
                live: 0,
            },
            capacity,
        }
    }

    pub fn allocate(&mut self) -> Result<Handle, HandleExhausted> {
        if self.inner.free.is_empty() && self.inner.generations.len() >= self.capacity {
            return Err(HandleExhausted {
                capacity: self.capacity,
            });
        }
        Ok(self.inner.allocate())
    }

    pub fn release(&mut self, handle: Handle) {
        self.inner.release(handle);
    }

    pub fn is_valid(&self, handle: Handle) -> bool {
        self.inner.is_valid(handle)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Declares a newtype around [`Handle`] so handles of different subsystems
/// cannot be mixed up.
///
/// ```
/// kiln_core::define_handle!(
///     /// A texture living on the GPU.
///     pub struct TextureHandle;
/// );
///
/// let tex = TextureHandle::INVALID;
/// assert!(!tex.is_valid());
/// ```
#[macro_export]
macro_rules! define_handle {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        $vis struct $name(pub $crate::alloc::handle::Handle);

        impl $name {
            pub const INVALID: Self = Self($crate::alloc::handle::Handle::INVALID);

            pub const fn handle(&self) -> $crate::alloc::handle::Handle {
                self.0
            }

            pub const fn id(&self) -> u64 {
                self.0.id()
            }

            pub const fn index(&self) -> u32 {
                self.0.index()
            }

            pub const fn is_valid(&self) -> bool {
                self.0.is_valid()
            }
        }

        impl From<$crate::alloc::handle::Handle> for $name {
            fn from(handle: $crate::alloc::handle::Handle) -> Self {
                Self(handle)
            }
        }

        impl From<$name> for $crate::alloc::handle::Handle {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }
    };
}
