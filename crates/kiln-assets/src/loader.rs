//! Resource loader contract and the table that selects loaders.

use std::any::{Any, TypeId};
use std::sync::Arc;

use kiln_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};
use crate::io::ByteStream;

/// What a loader sees while finalising a resource on the designated thread.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    /// Canonical path of the resource.
    pub guid: &'a str,
    /// Where the bytes were read from.
    pub full_path: &'a str,
}

/// Default priority for loaders.
pub const DEFAULT_LOADER_PRIORITY: i32 = 0;

/// Turns bytes into a resource in three steps.
///
/// 1. [`create_dummy`](Self::create_dummy) runs on the requesting thread and
///    produces the placeholder handed out immediately.
/// 2. [`decode`](Self::decode) runs on a worker thread. It only gets `&self`
///    and the stream, and returns the staged data as [`Decoded`](Self::Decoded).
/// 3. [`on_decoded`](Self::on_decoded) runs on the designated thread and moves
///    the staged data into the resource (uploading it, for GPU resources).
///
/// # Example
///
/// ```ignore
/// struct MeshLoader { gpu: Arc<Gpu> }
///
/// impl ResourceLoader for MeshLoader {
///     type Resource = Mesh;
///     type Decoded = Vec<Vertex>;
///
///     fn extensions(&self) -> &[&str] { &["mesh"] }
///     fn create_dummy(&self) -> Mesh { Mesh::empty() }
///
///     fn decode(&self, stream: &mut dyn ByteStream) -> AssetResult<Vec<Vertex>> {
///         parse_vertices(&stream.read_to_end()?)
///     }
///
///     fn on_decoded(&self, mesh: &mut Mesh, vertices: Vec<Vertex>, _: &FinalizeContext<'_>) -> AssetResult<()> {
///         mesh.buffer = self.gpu.upload(&vertices);
///         Ok(())
///     }
/// }
/// ```
pub trait ResourceLoader: Send + Sync + 'static {
    /// The resource type this loader produces.
    type Resource: Send + 'static;

    /// Staged data handed from `decode` to `on_decoded`.
    type Decoded: Send + 'static;

    /// The file extensions this loader handles (without dots).
    fn extensions(&self) -> &[&str];

    /// Higher priority loaders win when several handle the same type and
    /// extension.
    fn priority(&self) -> i32 {
        DEFAULT_LOADER_PRIORITY
    }

    fn create_dummy(&self) -> Self::Resource;

    fn decode(&self, stream: &mut dyn ByteStream) -> AssetResult<Self::Decoded>;

    fn on_decoded(
        &self,
        resource: &mut Self::Resource,
        decoded: Self::Decoded,
        ctx: &FinalizeContext<'_>,
    ) -> AssetResult<()>;
}

/// Object-safe view of a [`ResourceLoader`].
pub trait ErasedLoader: Send + Sync {
    fn resource_type_id(&self) -> TypeId;

    fn resource_type_name(&self) -> &'static str;

    fn extensions(&self) -> &[&str];

    fn priority(&self) -> i32;

    fn create_dummy_erased(&self) -> Box<dyn Any + Send>;

    fn decode_erased(&self, stream: &mut dyn ByteStream) -> AssetResult<Box<dyn Any + Send>>;

    fn on_decoded_erased(
        &self,
        resource: &mut (dyn Any + Send),
        decoded: Box<dyn Any + Send>,
        ctx: &FinalizeContext<'_>,
    ) -> AssetResult<()>;
}

impl<L: ResourceLoader> ErasedLoader for L {
    fn resource_type_id(&self) -> TypeId {
        TypeId::of::<L::Resource>()
    }

    fn resource_type_name(&self) -> &'static str {
        std::any::type_name::<L::Resource>()
    }

    fn extensions(&self) -> &[&str] {
        ResourceLoader::extensions(self)
    }

    fn priority(&self) -> i32 {
        ResourceLoader::priority(self)
    }

    fn create_dummy_erased(&self) -> Box<dyn Any + Send> {
        Box::new(self.create_dummy())
    }

    fn decode_erased(&self, stream: &mut dyn ByteStream) -> AssetResult<Box<dyn Any + Send>> {
        let decoded = self.decode(stream)?;
        Ok(Box::new(decoded))
    }

    fn on_decoded_erased(
        &self,
        resource: &mut (dyn Any + Send),
        decoded: Box<dyn Any + Send>,
        ctx: &FinalizeContext<'_>,
    ) -> AssetResult<()> {
        let resource =
            resource
                .downcast_mut::<L::Resource>()
                .ok_or_else(|| AssetError::TypeMismatch {
                    expected: std::any::type_name::<L::Resource>(),
                })?;
        let decoded = decoded
            .downcast::<L::Decoded>()
            .map_err(|_| AssetError::TypeMismatch {
                expected: std::any::type_name::<L::Decoded>(),
            })?;
        self.on_decoded(resource, *decoded, ctx)
    }
}

/// Key for indexing loaders by type and extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LoaderKey {
    type_id: TypeId,
    extension: String,
}

struct LoaderEntry {
    loader: Arc<dyn ErasedLoader>,
    priority: i32,
}

/// Registry of loaders, indexed by resource type and extension.
///
/// When several loaders match, the one with the highest priority is used;
/// ties go to the one registered first.
#[derive(Default)]
pub struct LoaderRegistry {
    by_type_and_ext: HashMap<LoaderKey, Vec<LoaderEntry>>,
    by_type: HashMap<TypeId, Vec<Arc<dyn ErasedLoader>>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader for its declared extensions.
    pub fn register<L: ResourceLoader>(&mut self, loader: L) {
        let loader: Arc<dyn ErasedLoader> = Arc::new(loader);
        let type_id = loader.resource_type_id();
        let priority = loader.priority();

        for ext in loader.extensions() {
            let key = LoaderKey {
                type_id,
                extension: ext.to_lowercase(),
            };

            let entries = self.by_type_and_ext.entry(key).or_default();
            entries.push(LoaderEntry {
                loader: Arc::clone(&loader),
                priority,
            });
            // Stable sort keeps registration order among equal priorities.
            entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        }

        tracing::debug!(
            "Registered {} loader for {:?}",
            loader.resource_type_name(),
            loader.extensions()
        );
        self.by_type.entry(type_id).or_default().push(loader);
    }

    /// The best loader producing `type_id` from files with `extension`.
    pub fn find(&self, type_id: TypeId, extension: &str) -> Option<&Arc<dyn ErasedLoader>> {
        let key = LoaderKey {
            type_id,
            extension: extension.to_lowercase(),
        };

        self.by_type_and_ext
            .get(&key)
            .and_then(|entries| entries.first())
            .map(|entry| &entry.loader)
    }

    pub fn get<T: 'static>(&self, extension: &str) -> Option<&Arc<dyn ErasedLoader>> {
        self.find(TypeId::of::<T>(), extension)
    }

    pub fn has_loader_for<T: 'static>(&self, extension: &str) -> bool {
        self.get::<T>(extension).is_some()
    }

    pub fn has_loader_for_type<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// All extensions registered for `T`.
    pub fn extensions_for_type<T: 'static>(&self) -> Vec<&str> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|loaders| {
                loaders
                    .iter()
                    .flat_map(|l| l.extensions().iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// Loads UTF-8 text into a `String`.
pub struct TextLoader;

impl ResourceLoader for TextLoader {
    type Resource = String;
    type Decoded = String;

    fn extensions(&self) -> &[&str] {
        &["txt", "text", "md", "json", "cfg"]
    }

    fn create_dummy(&self) -> String {
        String::new()
    }

    fn decode(&self, stream: &mut dyn ByteStream) -> AssetResult<String> {
        let bytes = stream.read_to_end()?;
        String::from_utf8(bytes)
            .map_err(|e| AssetError::decode(stream.path(), format!("Invalid UTF-8: {}", e)))
    }

    fn on_decoded(
        &self,
        resource: &mut String,
        decoded: String,
        _ctx: &FinalizeContext<'_>,
    ) -> AssetResult<()> {
        *resource = decoded;
        Ok(())
    }
}

/// Loads raw bytes.
pub struct BytesLoader;

impl ResourceLoader for BytesLoader {
    type Resource = Vec<u8>;
    type Decoded = Vec<u8>;

    fn extensions(&self) -> &[&str] {
        &["bin", "bytes", "dat"]
    }

    fn create_dummy(&self) -> Vec<u8> {
        Vec::new()
    }

    fn decode(&self, stream: &mut dyn ByteStream) -> AssetResult<Vec<u8>> {
        stream.read_to_end()
    }

    fn on_decoded(
        &self,
        resource: &mut Vec<u8>,
        decoded: Vec<u8>,
        _ctx: &FinalizeContext<'_>,
    ) -> AssetResult<()> {
        *resource = decoded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;

    #[derive(Debug, PartialEq)]
    struct TestData {
        value: i32,
    }

    struct FixedLoader {
        value: i32,
        priority: i32,
    }

    impl ResourceLoader for FixedLoader {
        type Resource = TestData;
        type Decoded = i32;

        fn extensions(&self) -> &[&str] {
            &["dat"]
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn create_dummy(&self) -> TestData {
            TestData { value: 0 }
        }

        fn decode(&self, _stream: &mut dyn ByteStream) -> AssetResult<i32> {
            Ok(self.value)
        }

        fn on_decoded(
            &self,
            resource: &mut TestData,
            decoded: i32,
            _ctx: &FinalizeContext<'_>,
        ) -> AssetResult<()> {
            resource.value = decoded;
            Ok(())
        }
    }

    const CTX: FinalizeContext<'static> = FinalizeContext {
        guid: "test",
        full_path: "test",
    };

    fn run(loader: &dyn ErasedLoader, bytes: &[u8]) -> AssetResult<Box<dyn Any + Send>> {
        let mut resource = loader.create_dummy_erased();
        let mut stream = MemoryStream::new("test", bytes.to_vec());
        let decoded = loader.decode_erased(&mut stream)?;
        loader.on_decoded_erased(resource.as_mut(), decoded, &CTX)?;
        Ok(resource)
    }

    #[test]
    fn test_text_loader() {
        let resource = run(&TextLoader, b"Hello, World!").unwrap();
        assert_eq!(resource.downcast_ref::<String>().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_text_loader_rejects_invalid_utf8() {
        let err = run(&TextLoader, &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[test]
    fn test_bytes_loader() {
        let resource = run(&BytesLoader, &[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(resource.downcast_ref::<Vec<u8>>().unwrap(), &vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_loader_registry_by_type() {
        let mut registry = LoaderRegistry::new();
        registry.register(TextLoader);
        registry.register(BytesLoader);

        assert!(registry.has_loader_for::<String>("txt"));
        assert!(registry.has_loader_for::<String>("TXT"));
        assert!(registry.has_loader_for::<Vec<u8>>("bin"));

        // Wrong type for the extension.
        assert!(!registry.has_loader_for::<String>("bin"));
        assert!(!registry.has_loader_for::<Vec<u8>>("txt"));

        assert!(registry.has_loader_for_type::<String>());
        assert!(registry.extensions_for_type::<Vec<u8>>().contains(&"dat"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_loader_priority() {
        for high_first in [true, false] {
            let mut registry = LoaderRegistry::new();
            let low = FixedLoader { value: 1, priority: -10 };
            let high = FixedLoader { value: 100, priority: 10 };
            if high_first {
                registry.register(high);
                registry.register(low);
            } else {
                registry.register(low);
                registry.register(high);
            }

            let loader = registry.get::<TestData>("dat").unwrap();
            let resource = run(loader.as_ref(), b"").unwrap();
            assert_eq!(resource.downcast_ref::<TestData>().unwrap().value, 100);
        }
    }

    #[test]
    fn test_on_decoded_type_mismatch() {
        let mut resource: Box<dyn Any + Send> = Box::new(0u64);
        let decoded: Box<dyn Any + Send> = Box::new(String::new());
        let err = TextLoader
            .on_decoded_erased(resource.as_mut(), decoded, &CTX)
            .unwrap_err();
        assert!(matches!(err, AssetError::TypeMismatch { .. }));
    }
}
