//! Integration tests for the resource registry and archive container.
//!
//! These tests use tempfile to create isolated test environments.

use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use kiln_assets::*;
use kiln_test_utils::{GpuBuffer, LogCapture, MockGpu};

// ============================================================================
// Test Resource Types
// ============================================================================

/// A mesh whose vertex data lives in a (mock) GPU buffer.
#[derive(Debug, Default)]
struct Mesh {
    buffer: Option<GpuBuffer>,
    vertex_count: usize,
}

/// Decodes `.mesh` files (raw little-endian f32 triples) and uploads them on
/// the designated thread.
struct MeshLoader {
    gpu: Arc<MockGpu>,
    decodes: Arc<AtomicUsize>,
}

impl ResourceLoader for MeshLoader {
    type Resource = Mesh;
    type Decoded = Vec<u8>;

    fn extensions(&self) -> &[&str] {
        &["mesh"]
    }

    fn create_dummy(&self) -> Mesh {
        Mesh::default()
    }

    fn decode(&self, stream: &mut dyn ByteStream) -> AssetResult<Vec<u8>> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        let bytes = stream.read_to_end()?;
        if bytes.is_empty() || bytes.len() % 12 != 0 {
            return Err(AssetError::decode(
                stream.path(),
                format!("{} bytes is not a whole number of vertices", bytes.len()),
            ));
        }
        Ok(bytes)
    }

    fn on_decoded(
        &self,
        mesh: &mut Mesh,
        vertices: Vec<u8>,
        ctx: &FinalizeContext<'_>,
    ) -> AssetResult<()> {
        let buffer = self
            .gpu
            .create_buffer(vertices.len() as u64)
            .map_err(|e| AssetError::finalize(ctx.guid, e.to_string()))?;
        self.gpu.write_buffer(buffer, 0, &vertices);
        mesh.buffer = Some(buffer);
        mesh.vertex_count = vertices.len() / 12;
        Ok(())
    }
}

/// Always panics while decoding.
struct PanickingLoader;

impl ResourceLoader for PanickingLoader {
    type Resource = u8;
    type Decoded = ();

    fn extensions(&self) -> &[&str] {
        &["boom"]
    }

    fn create_dummy(&self) -> u8 {
        0
    }

    fn decode(&self, _stream: &mut dyn ByteStream) -> AssetResult<()> {
        panic!("decoder bug");
    }

    fn on_decoded(&self, _: &mut u8, _: (), _: &FinalizeContext<'_>) -> AssetResult<()> {
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

struct Fixture {
    fs: Arc<MemoryFileSystem>,
    gpu: Arc<MockGpu>,
    decodes: Arc<AtomicUsize>,
    registry: Arc<ResourceRegistry>,
}

fn fixture(config: RegistryConfig, max_buffers: usize) -> Fixture {
    let fs = Arc::new(MemoryFileSystem::new());
    let gpu = Arc::new(MockGpu::new(max_buffers));
    let decodes = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(ResourceRegistry::new(fs.clone(), config));
    registry.register_loader(MeshLoader {
        gpu: Arc::clone(&gpu),
        decodes: Arc::clone(&decodes),
    });
    registry.register_loader(TextLoader);
    registry.register_loader(PanickingLoader);
    Fixture {
        fs,
        gpu,
        decodes,
        registry,
    }
}

fn mesh_bytes(vertices: usize) -> Vec<u8> {
    (0..vertices * 3)
        .flat_map(|i| (i as f32).to_le_bytes())
        .collect()
}

fn write_archive(path: &std::path::Path, entries: &[(&str, &[u8])]) {
    let mut writer = ArchiveWriter::new();
    for (name, bytes) in entries {
        writer.add(name, bytes.to_vec()).unwrap();
    }
    let mut file = File::create(path).unwrap();
    writer.write_to(&mut file).unwrap();
    file.flush().unwrap();
}

// ============================================================================
// Archive Tests
// ============================================================================

#[test]
fn test_archive_round_trip_on_disk() {
    let temp_dir = tempfile::tempdir().unwrap();
    let archive_path = temp_dir.path().join("data.pak");
    write_archive(&archive_path, &[("a.txt", &b"hello"[..])]);

    let archive = ArchiveContainer::open_file(&archive_path).unwrap();
    assert_eq!(archive.len(), 1);

    let entry = archive.entry("a.txt").unwrap();
    assert_eq!(entry.length, 5);

    let mut stream = archive.open_entry("a.txt").unwrap();
    assert_eq!(stream.read_to_end().unwrap(), b"hello");
}

#[test]
fn test_corrupt_archive_logs_one_warning() {
    let temp_dir = tempfile::tempdir().unwrap();
    let archive_path = temp_dir.path().join("corrupt.pak");
    std::fs::write(&archive_path, b"NOPE and some more bytes").unwrap();

    let (archive, logs) = LogCapture::capture(|| ArchiveContainer::open_file(&archive_path).unwrap());
    assert!(archive.is_empty());
    assert_eq!(logs.warnings_containing("corrupt.pak"), 1);
}

#[test]
fn test_load_through_mounted_archive() {
    let temp_dir = tempfile::tempdir().unwrap();
    let archive_path = temp_dir.path().join("data.pak");
    write_archive(
        &archive_path,
        &[
            ("text/readme.txt", &b"from the archive"[..]),
            ("meshes/tri.mesh", &mesh_bytes(3)[..]),
        ],
    );

    let fs = Arc::new(FileSystem::new());
    assert!(fs.mount_file(&archive_path));
    let registry = ResourceRegistry::new(fs, RegistryConfig::default());
    registry.register_loader(TextLoader);

    let handle = registry
        .request::<String>("text/../text/readme.txt", LoadMode::Async)
        .unwrap();
    assert!(registry.wait_for(handle));
    assert_eq!(
        registry.with_resource(handle, |s| s.clone()).unwrap(),
        "from the archive"
    );
}

#[test]
fn test_load_from_search_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("config")).unwrap();
    std::fs::write(temp_dir.path().join("config/game.cfg"), "name: test").unwrap();

    let fs = Arc::new(FileSystem::new());
    fs.add_search_path(temp_dir.path());
    let registry = ResourceRegistry::new(fs, RegistryConfig::default());
    registry.register_loader(TextLoader);

    let handle = registry
        .request::<String>("config/game.cfg", LoadMode::Immediate)
        .unwrap();
    assert!(registry.is_resident(handle));
    assert_eq!(registry.with_resource(handle, |s| s.clone()).unwrap(), "name: test");
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_decode_failure_keeps_dummy_and_warns_once() {
    let f = fixture(RegistryConfig::default(), 16);
    f.fs.insert("broken.mesh", vec![1, 2, 3]);

    let (handle, logs) = LogCapture::capture(|| {
        f.registry
            .request::<Mesh>("broken.mesh", LoadMode::Immediate)
            .unwrap()
    });

    assert!(f.registry.is_initialized(handle));
    assert!(!f.registry.is_resident(handle));
    assert_eq!(f.registry.state(handle), Some(LoadState::Failed));
    assert_eq!(logs.warnings_containing("broken.mesh"), 1);
    assert_eq!(logs.count(tracing::Level::WARN), 1);
    assert_eq!(f.gpu.count_buffer_creates(), 0);
}

#[test]
fn test_async_decode_failure_warns_once() {
    let logs = LogCapture::global();
    let f = fixture(RegistryConfig::default(), 16);
    f.fs.insert("async_broken.mesh", vec![9; 5]);

    let handle = f
        .registry
        .request::<Mesh>("async_broken.mesh", LoadMode::Async)
        .unwrap();
    assert!(!f.registry.wait_for(handle));

    assert!(f.registry.is_initialized(handle));
    assert_eq!(f.registry.state(handle), Some(LoadState::Failed));
    assert_eq!(logs.warnings_containing("async_broken.mesh"), 1);
    assert!(f.registry.drain_events().iter().any(ResourceEvent::is_failed));
}

#[test]
fn test_finalize_failure_still_marks_resident() {
    let f = fixture(RegistryConfig::default(), 1);
    f.fs.insert("one.mesh", mesh_bytes(1));
    f.fs.insert("two.mesh", mesh_bytes(1));

    let one = f.registry.request::<Mesh>("one.mesh", LoadMode::Immediate).unwrap();
    let (two, logs) = LogCapture::capture(|| {
        f.registry
            .request::<Mesh>("two.mesh", LoadMode::Immediate)
            .unwrap()
    });

    assert!(f.registry.is_resident(one));
    assert!(f.registry.is_resident(two));
    assert_eq!(f.registry.with_resource(two, |m| m.buffer), Some(None));
    assert_eq!(logs.warnings_containing("two.mesh"), 1);
}

#[test]
fn test_panicking_decoder_fails_the_resource() {
    let f = fixture(RegistryConfig::default(), 16);
    f.fs.insert("bad.boom", vec![0]);

    let handle = f.registry.request::<u8>("bad.boom", LoadMode::Async).unwrap();
    assert!(!f.registry.wait_for(handle));
    assert_eq!(f.registry.state(handle), Some(LoadState::Failed));
    assert_eq!(f.registry.with_resource(handle, |v| *v), Some(0));
}

// ============================================================================
// Async Tests
// ============================================================================

#[test]
fn test_double_request_shares_one_decode() {
    let f = fixture(RegistryConfig::default(), 16);
    f.fs.insert("cube.mesh", mesh_bytes(36));

    f.registry.suspend();
    let first = f.registry.request::<Mesh>("cube.mesh", LoadMode::Async).unwrap();
    let second = f.registry.request::<Mesh>("cube.mesh", LoadMode::Async).unwrap();
    assert_eq!(first, second);
    assert_eq!(f.registry.with_resource(first, |m| m.vertex_count), Some(0));
    f.registry.resume();

    assert!(f.registry.wait_for(first));
    assert_eq!(f.decodes.load(Ordering::SeqCst), 1);
    assert_eq!(f.registry.with_resource(second, |m| m.vertex_count), Some(36));
}

#[test]
fn test_concurrent_first_requests_coalesce() {
    let f = fixture(RegistryConfig::default(), 16);
    f.fs.insert("shared.mesh", mesh_bytes(4));

    let barrier = Arc::new(Barrier::new(4));
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&f.registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry
                    .request::<Mesh>("shared.mesh", LoadMode::Async)
                    .unwrap()
            })
        })
        .collect();
    let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

    assert!(handles.windows(2).all(|w| w[0] == w[1]));
    assert!(f.registry.wait_for(handles[0]));
    assert_eq!(f.decodes.load(Ordering::SeqCst), 1);
    assert_eq!(f.registry.len(), 1);
}

#[test]
fn test_finalize_runs_on_designated_thread() {
    let f = fixture(RegistryConfig::default().with_worker_count(4), 64);
    let main = thread::current().id();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let path = format!("meshes/{}.mesh", i);
            f.fs.insert(&path, mesh_bytes(i + 1));
            f.registry.request::<Mesh>(&path, LoadMode::Async).unwrap()
        })
        .collect();

    for &handle in &handles {
        f.registry.wait_for(handle);
    }

    assert!(handles.iter().all(|&h| f.registry.is_resident(h)));
    assert_eq!(f.gpu.count_buffer_creates(), 16);
    assert!(f.gpu.all_calls_from(main));
}

#[test]
fn test_immediate_request_off_designated_thread_defers_finalize() {
    let f = fixture(RegistryConfig::default(), 16);
    f.fs.insert("remote.mesh", mesh_bytes(2));
    let main = thread::current().id();

    let registry = Arc::clone(&f.registry);
    let handle = thread::spawn(move || {
        registry
            .request::<Mesh>("remote.mesh", LoadMode::Immediate)
            .unwrap()
    })
    .join()
    .unwrap();

    // Decoded on the requesting thread, not finalised yet.
    assert_eq!(f.decodes.load(Ordering::SeqCst), 1);
    assert_eq!(f.registry.state(handle), Some(LoadState::Decoded));
    assert!(!f.registry.is_resident(handle));
    assert_eq!(f.gpu.call_count(), 0);

    assert_eq!(f.registry.pump(), 1);
    assert!(f.registry.is_resident(handle));
    assert!(f.gpu.all_calls_from(main));
}

#[test]
fn test_pump_finalizes_in_completion_order() {
    let f = fixture(RegistryConfig::default().with_worker_count(1), 16);
    let paths: Vec<_> = (0..6).map(|i| format!("ordered/{}.mesh", i)).collect();
    for path in &paths {
        f.fs.insert(path, mesh_bytes(1));
    }

    f.registry.suspend();
    for path in &paths {
        f.registry.request::<Mesh>(path, LoadMode::Async).unwrap();
    }
    f.registry.drain_events();
    f.registry.resume();

    let last = f.registry.find::<Mesh>(&paths[5]).unwrap();
    f.registry.wait_for(last);
    f.registry.pump();

    let loaded: Vec<_> = f
        .registry
        .drain_events()
        .into_iter()
        .filter(ResourceEvent::is_loaded)
        .map(|event| event.guid().to_string())
        .collect();
    assert_eq!(loaded, paths);
}

#[test]
fn test_unload_while_decoding() {
    let f = fixture(RegistryConfig::default(), 16);
    f.fs.insert("gone.mesh", mesh_bytes(1));

    f.registry.suspend();
    let handle = f.registry.request::<Mesh>("gone.mesh", LoadMode::Async).unwrap();
    assert!(f.registry.unload(handle));
    f.registry.resume();

    // Nothing left to wait for; the late result is discarded by pump.
    assert!(!f.registry.wait_for(handle));
    while f.decodes.load(Ordering::SeqCst) == 0 {
        thread::yield_now();
    }
    f.registry.pump();
    assert_eq!(f.gpu.count_buffer_creates(), 0);
    assert!(!f.registry.resource_exists("gone.mesh"));
}
