//! Kiln Core
//!
//! Generational handles, dense component storage and the background worker
//! pool shared by every Kiln subsystem.

pub mod alloc;
pub mod config;
pub mod logging;
pub mod profiling;
pub mod worker;
