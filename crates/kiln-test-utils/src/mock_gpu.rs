//! Mock GPU backend for testing designated-thread uploads.
//!
//! Records every call together with the thread that made it, so tests can
//! check that finalisation never touches the "GPU" from a worker.

use std::thread::{self, ThreadId};

use kiln_core::alloc::{FixedHandleAllocator, HandleExhausted};
use kiln_core::define_handle;
use parking_lot::Mutex;

define_handle! {
    /// A buffer created by [`MockGpu`].
    pub struct GpuBuffer;
}

/// Records a GPU operation for verification in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuCall {
    CreateBuffer { buffer: GpuBuffer, size: u64 },
    WriteBuffer { buffer: GpuBuffer, offset: u64, size: usize },
    DestroyBuffer { buffer: GpuBuffer },
}

/// A recorded call plus the thread it came from.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: GpuCall,
    pub thread: ThreadId,
}

/// Mock GPU with a fixed number of buffer slots.
///
/// # Example
///
/// ```rust
/// use kiln_test_utils::MockGpu;
///
/// let gpu = MockGpu::new(16);
/// let buffer = gpu.create_buffer(256).unwrap();
/// gpu.write_buffer(buffer, 0, &[0u8; 256]);
///
/// assert_eq!(gpu.count_buffer_writes(), 1);
/// assert!(gpu.all_calls_from(std::thread::current().id()));
/// ```
pub struct MockGpu {
    calls: Mutex<Vec<RecordedCall>>,
    buffers: Mutex<FixedHandleAllocator>,
}

impl MockGpu {
    /// A device that can hold `max_buffers` live buffers.
    pub fn new(max_buffers: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            buffers: Mutex::new(FixedHandleAllocator::new(max_buffers)),
        }
    }

    fn record(&self, call: GpuCall) {
        self.calls.lock().push(RecordedCall {
            call,
            thread: thread::current().id(),
        });
    }

    pub fn create_buffer(&self, size: u64) -> Result<GpuBuffer, HandleExhausted> {
        let buffer = GpuBuffer(self.buffers.lock().allocate()?);
        self.record(GpuCall::CreateBuffer { buffer, size });
        Ok(buffer)
    }

    pub fn write_buffer(&self, buffer: GpuBuffer, offset: u64, data: &[u8]) {
        debug_assert!(self.is_live(buffer), "writing to dead buffer {buffer:?}");
        self.record(GpuCall::WriteBuffer {
            buffer,
            offset,
            size: data.len(),
        });
    }

    pub fn destroy_buffer(&self, buffer: GpuBuffer) {
        let mut buffers = self.buffers.lock();
        if buffers.is_valid(buffer.handle()) {
            buffers.release(buffer.handle());
            drop(buffers);
            self.record(GpuCall::DestroyBuffer { buffer });
        }
    }

    pub fn is_live(&self, buffer: GpuBuffer) -> bool {
        self.buffers.lock().is_valid(buffer.handle())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Get a copy of all recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn count_buffer_creates(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::CreateBuffer { .. }))
    }

    pub fn count_buffer_writes(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::WriteBuffer { .. }))
    }

    fn count(&self, predicate: impl Fn(&GpuCall) -> bool) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|recorded| predicate(&recorded.call))
            .count()
    }

    /// `true` if every recorded call came from `thread`.
    pub fn all_calls_from(&self, thread: ThreadId) -> bool {
        self.calls.lock().iter().all(|recorded| recorded.thread == thread)
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockGpu {
    fn default() -> Self {
        Self::new(1024)
    }
}
