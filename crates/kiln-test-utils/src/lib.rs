//! Test utilities for the Kiln engine.
//!
//! - [`LogCapture`] - a `tracing` layer that records events, for asserting on
//!   warning counts
//! - [`MockGpu`] - a fake device that records which thread issued each call
//!
//! # Example
//!
//! ```rust
//! use kiln_test_utils::{LogCapture, MockGpu};
//!
//! let gpu = MockGpu::default();
//! let (_, logs) = LogCapture::capture(|| {
//!     let buffer = gpu.create_buffer(64).unwrap();
//!     gpu.write_buffer(buffer, 0, &[0; 64]);
//! });
//!
//! assert_eq!(gpu.count_buffer_creates(), 1);
//! assert_eq!(logs.count(tracing::Level::WARN), 0);
//! ```

pub mod log_capture;
pub mod mock_gpu;

pub use log_capture::{CaptureLayer, CapturedEvent, LogCapture};
pub use mock_gpu::{GpuBuffer, GpuCall, MockGpu, RecordedCall};
