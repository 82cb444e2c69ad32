//! Resource load state machine.

use std::sync::atomic::{AtomicU8, Ordering};

/// Where a resource is in the loading pipeline.
///
/// ```text
/// Created -> Queued -> Decoding -> Decoded -> Finalized
///                          \
///                           -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoadState {
    /// Dummy created, nothing scheduled yet.
    Created = 0,
    /// Waiting for a worker.
    Queued = 1,
    /// A worker is reading and decoding the bytes.
    Decoding = 2,
    /// Decoded data is waiting for the designated thread.
    Decoded = 3,
    /// `on_decoded` has run; the resource is resident.
    Finalized = 4,
    /// Decoding failed; the dummy stays in place.
    Failed = 5,
}

impl LoadState {
    /// Returns true if loading has completed (successfully or not).
    pub fn is_done(&self) -> bool {
        matches!(self, LoadState::Finalized | LoadState::Failed)
    }

    /// Returns true while a decode for the resource is queued or running, or
    /// its result has not been finalised yet.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            LoadState::Queued | LoadState::Decoding | LoadState::Decoded
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoadState::Created,
            1 => LoadState::Queued,
            2 => LoadState::Decoding,
            3 => LoadState::Decoded,
            4 => LoadState::Finalized,
            _ => LoadState::Failed,
        }
    }
}

/// A [`LoadState`] readable from any thread.
#[derive(Debug)]
pub(crate) struct AtomicLoadState(AtomicU8);

impl AtomicLoadState {
    pub(crate) fn new(state: LoadState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> LoadState {
        LoadState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: LoadState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// How [`request`](crate::registry::ResourceRegistry::request) loads a
/// resource that is not cached yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Decode on the calling thread before returning.
    Immediate,
    /// Decode on the worker pool; finalise on a later `pump`.
    #[default]
    Async,
}
