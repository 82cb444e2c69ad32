//! Allocation and collection types for Kiln.
//!
//! This module provides:
//! - Re-exports of optimized hash collections using AHash
//! - Generational handles and their allocator
//! - The dense component store built on those handles

pub mod dense;
pub mod handle;

pub use dense::DenseComponentStore;
pub use handle::{FixedHandleAllocator, Handle, HandleAllocator, HandleExhausted};

// Re-export optimized hash collections
pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};
