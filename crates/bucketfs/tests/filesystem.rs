//! Behavioral tests run against both filesystem variants.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, fmt};

use bucketfs::vfs::{ObjectMeta, ObjectReader, ObjectWriter};
use bucketfs::{
    ContentFormat, EntryKind, FileContent, FileSystem, FsOptions, LocalStore, MarkerFs, NativeFs,
    ObjectStoreBackend, PathResolver, StoreOps, VfsError, VfsResult, WriteMode,
};

/// Store wrapper counting every backend round-trip.
struct Counting<S> {
    inner: S,
    calls: Arc<AtomicUsize>,
}

impl<S> Counting<S> {
    fn new(inner: S) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: StoreOps> StoreOps for Counting<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list(&self, path: &str) -> VfsResult<Vec<String>> {
        self.tick();
        self.inner.list(path).await
    }

    async fn stat(&self, path: &str) -> VfsResult<ObjectMeta> {
        self.tick();
        self.inner.stat(path).await
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        self.tick();
        self.inner.exists(path).await
    }

    async fn open_read(&self, path: &str) -> VfsResult<Box<dyn ObjectReader>> {
        self.tick();
        self.inner.open_read(path).await
    }

    async fn open_write(&self, path: &str, mode: WriteMode) -> VfsResult<Box<dyn ObjectWriter>> {
        self.tick();
        self.inner.open_write(path, mode).await
    }

    async fn copy_object(&self, from: &str, to: &str) -> VfsResult<()> {
        self.tick();
        self.inner.copy_object(from, to).await
    }

    async fn delete_object(&self, path: &str) -> VfsResult<()> {
        self.tick();
        self.inner.delete_object(path).await
    }

    async fn walk(&self, path: &str) -> VfsResult<Vec<String>> {
        self.tick();
        self.inner.walk(path).await
    }

    async fn make_directory(&self, path: &str) -> VfsResult<()> {
        self.tick();
        self.inner.make_directory(path).await
    }

    async fn remove_tree(&self, path: &str) -> VfsResult<()> {
        self.tick();
        self.inner.remove_tree(path).await
    }
}

#[derive(Debug, Clone, Copy)]
enum Variant {
    Native,
    Marker,
}

const VARIANTS: [Variant; 2] = [Variant::Native, Variant::Marker];

/// A filesystem plus whatever keeps its backing storage alive.
struct Harness {
    fs: Box<dyn FileSystem>,
    calls: Arc<AtomicUsize>,
    _dir: Option<TempDir>,
}

/// Route filesystem logs to the test harness; `RUST_LOG=bucketfs=debug`.
fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Harness {
    async fn open(variant: Variant, options: FsOptions) -> Self {
        init_tracing();
        let resolver = PathResolver::new("notebooks", "team", "/");
        match variant {
            Variant::Native => {
                let dir = TempDir::new().unwrap();
                let (store, calls) = Counting::new(LocalStore::new(dir.path()));
                let fs = NativeFs::open(store, resolver, options).await.unwrap();
                Self {
                    fs: Box::new(fs),
                    calls,
                    _dir: Some(dir),
                }
            }
            Variant::Marker => {
                let (store, calls) = Counting::new(ObjectStoreBackend::memory("notebooks"));
                let fs = MarkerFs::open(store, resolver, options).await.unwrap();
                Self {
                    fs: Box::new(fs),
                    calls,
                    _dir: None,
                }
            }
        }
    }

    async fn with_defaults(variant: Variant) -> Self {
        Self::open(variant, FsOptions::default()).await
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn write_text(&self, path: &str, text: &str) {
        self.fs
            .write(path, text, ContentFormat::Text, WriteMode::Truncate)
            .await
            .unwrap();
    }

    async fn read_text(&self, path: &str) -> String {
        match self.fs.read(path, Some(ContentFormat::Text)).await.unwrap() {
            FileContent::Text(text) => text,
            other => panic!("expected text for {path}, got {other:?}"),
        }
    }
}

fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

#[tokio::test]
async fn test_text_round_trip() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("notes/today.md", "# hello\nwörld\n").await;
        assert_eq!(h.read_text("notes/today.md").await, "# hello\nwörld\n", "{variant:?}");
    }
}

#[tokio::test]
async fn test_base64_round_trip() {
    let bytes: Vec<u8> = (0..=255).collect();
    let encoded = STANDARD.encode(&bytes);
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.fs
            .write("blob.bin", &encoded, ContentFormat::Base64, WriteMode::Truncate)
            .await
            .unwrap();

        match h.fs.read("blob.bin", Some(ContentFormat::Base64)).await.unwrap() {
            FileContent::Base64(b) => assert_eq!(b, encoded, "{variant:?}"),
            other => panic!("{variant:?}: expected base64, got {other:?}"),
        }
        // not UTF-8, no format requested: falls back to base64
        match h.fs.read("blob.bin", None).await.unwrap() {
            FileContent::Base64(b) => assert_eq!(STANDARD.decode(b).unwrap(), bytes),
            other => panic!("{variant:?}: expected base64, got {other:?}"),
        }
        let err = h.fs.read("blob.bin", Some(ContentFormat::Text)).await.unwrap_err();
        assert!(matches!(err, VfsError::Format(_)), "{variant:?}: {err}");
    }
}

#[tokio::test]
async fn test_read_missing_is_no_such_file() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        let err = h.fs.read("nope.txt", None).await.unwrap_err();
        match err {
            VfsError::NoSuchFile(path) => assert_eq!(path, "notebooks/team/nope.txt"),
            other => panic!("{variant:?}: expected NoSuchFile, got {other}"),
        }
    }
}

#[tokio::test]
async fn test_prefixed_and_logical_paths_are_equivalent() {
    let r = PathResolver::new("notebooks", "team", "/");
    for p in ["", "a", "a/b.txt", "/a/b/", "notebooks/team/a/b.txt"] {
        let once = r.resolve(p);
        assert_eq!(r.resolve(&once), once);
        assert_eq!(r.unprefix(&once), r.unprefix(p));
    }

    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("a/b.txt", "x").await;
        assert!(h.fs.is_file("notebooks/team/a/b.txt").await.unwrap());
        assert!(h.fs.is_dir("/notebooks/team/a/").await.unwrap());
        assert_eq!(h.read_text("notebooks/team/a/b.txt").await, "x");
    }
}

#[tokio::test]
async fn test_stat_is_cached_within_ttl() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("f.txt", "x").await;

        assert!(h.fs.is_file("f.txt").await.unwrap());
        let after_first = h.calls();
        assert!(h.fs.is_file("f.txt").await.unwrap());
        assert!(!h.fs.is_dir("f.txt").await.unwrap());
        assert_eq!(h.calls(), after_first, "{variant:?}");
    }
}

#[tokio::test]
async fn test_absent_result_is_cached() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        assert_eq!(h.fs.lstat("ghost").await.unwrap().kind, EntryKind::Absent);
        let after_first = h.calls();
        assert!(!h.fs.is_file("ghost").await.unwrap());
        assert!(!h.fs.is_dir("ghost").await.unwrap());
        assert_eq!(h.calls(), after_first, "{variant:?}");
    }
}

#[tokio::test]
async fn test_external_change_is_stale_until_ttl() {
    let options = FsOptions {
        stat_ttl: Duration::from_millis(50),
        ..FsOptions::default()
    };
    for variant in VARIANTS {
        let h = Harness::open(variant, options.clone()).await;
        assert!(!h.fs.is_file("late.txt").await.unwrap());

        // written behind the filesystem's back
        let backend = h.fs.resolver().resolve("late.txt");
        let mut sink = h.fs.store().open_write(&backend, WriteMode::Truncate).await.unwrap();
        sink.write(b"late").await.unwrap();
        sink.finish().await.unwrap();

        assert!(!h.fs.is_file("late.txt").await.unwrap(), "{variant:?}");
        tokio::time::sleep(Duration::from_millis(80)).await;
        let before = h.calls();
        assert!(h.fs.is_file("late.txt").await.unwrap(), "{variant:?}");
        assert!(h.calls() > before);
    }
}

#[tokio::test]
async fn test_cache_capacity_evicts_oldest() {
    let options = FsOptions {
        stat_capacity: 3,
        ..FsOptions::default()
    };
    for variant in VARIANTS {
        let h = Harness::open(variant, options.clone()).await;
        h.fs.cache().clear();
        for p in ["p1", "p2", "p3", "p4"] {
            h.fs.lstat(p).await.unwrap();
        }
        assert_eq!(h.fs.cache().len(), 3);
        assert!(!h.fs.cache().contains("p1"), "{variant:?}");
        assert!(h.fs.cache().contains("p4"));
    }
}

#[tokio::test]
async fn test_mkdir_then_remove() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.fs.mkdir("d").await.unwrap();
        assert!(h.fs.is_dir("d").await.unwrap(), "{variant:?}");
        assert!(!h.fs.is_file("d").await.unwrap());
        assert!(h.fs.list("d", false).await.unwrap().is_empty());

        h.fs.remove("d").await.unwrap();
        assert_eq!(h.fs.lstat("d").await.unwrap().kind, EntryKind::Absent, "{variant:?}");
        assert!(!h.fs.store().exists(&h.fs.resolver().resolve("d")).await.unwrap());
    }
}

#[tokio::test]
async fn test_remove_missing_is_noop() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.fs.remove("nothing/here").await.unwrap();
        assert!(h.fs.is_dir("").await.unwrap());
    }
}

#[tokio::test]
async fn test_list_hides_dotfiles() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("dir/a.txt", "a").await;
        h.write_text("dir/.hidden", "h").await;
        h.fs.mkdir("dir/sub").await.unwrap();

        let visible = sorted(h.fs.list("dir", false).await.unwrap());
        assert_eq!(visible, vec!["dir/a.txt", "dir/sub"], "{variant:?}");
        let all = sorted(h.fs.list("dir", true).await.unwrap());
        assert!(all.contains(&"dir/.hidden".to_string()));
    }
}

#[tokio::test]
async fn test_recursive_copy() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("a/x.txt", "x").await;
        h.write_text("a/sub/y.txt", "y").await;

        h.fs.copy("a", "b").await.unwrap();
        assert_eq!(h.read_text("b/x.txt").await, "x", "{variant:?}");
        assert_eq!(h.read_text("b/sub/y.txt").await, "y", "{variant:?}");
        assert!(h.fs.is_dir("b/sub").await.unwrap());
        // source untouched
        assert_eq!(h.read_text("a/sub/y.txt").await, "y");
    }
}

#[tokio::test]
async fn test_copy_keeps_repeated_segments() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("a/a/f.txt", "deep").await;
        h.fs.copy("a", "b").await.unwrap();
        assert_eq!(h.read_text("b/a/f.txt").await, "deep", "{variant:?}");
        assert!(!h.fs.is_file("b/b/f.txt").await.unwrap());
    }
}

#[tokio::test]
async fn test_copy_into_itself_is_rejected() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("a/x.txt", "x").await;
        let err = h.fs.copy("a", "a/inner").await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)), "{variant:?}: {err}");
    }
}

#[tokio::test]
async fn test_move_file_and_directory() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("old.txt", "contents").await;
        assert!(h.fs.is_file("old.txt").await.unwrap());

        h.fs.mv("old.txt", "new.txt").await.unwrap();
        assert!(!h.fs.is_file("old.txt").await.unwrap(), "{variant:?}");
        assert_eq!(h.read_text("new.txt").await, "contents");

        h.write_text("src/one.txt", "1").await;
        h.write_text("src/deep/two.txt", "2").await;
        h.fs.mv("src", "dst").await.unwrap();
        assert_eq!(h.fs.lstat("src").await.unwrap().kind, EntryKind::Absent, "{variant:?}");
        assert_eq!(h.read_text("dst/deep/two.txt").await, "2");
    }
}

#[tokio::test]
async fn test_large_file_is_chunked() {
    let options = FsOptions {
        large_file_threshold: 16,
        chunk_size: 10,
        ..FsOptions::default()
    };
    let data: Vec<u8> = (0..45u8).map(|b| b.wrapping_mul(7)).collect();
    for variant in VARIANTS {
        let h = Harness::open(variant, options.clone()).await;
        h.fs
            .write("big.bin", &STANDARD.encode(&data), ContentFormat::Base64, WriteMode::Truncate)
            .await
            .unwrap();

        let FileContent::Chunked(mut chunks) = h.fs.read("big.bin", None).await.unwrap() else {
            panic!("{variant:?}: expected chunked content");
        };
        assert_eq!(chunks.size(), 45);

        let mut joined = Vec::new();
        let mut sizes = Vec::new();
        while let Some(encoded) = chunks.next_base64().await.unwrap() {
            let chunk = STANDARD.decode(encoded).unwrap();
            sizes.push(chunk.len());
            joined.extend(chunk);
        }
        assert_eq!(sizes, vec![10, 10, 10, 10, 5], "{variant:?}");
        assert_eq!(joined, data);
        assert!(!chunks.is_open());
    }
}

#[tokio::test]
async fn test_file_at_threshold_is_read_whole() {
    let options = FsOptions {
        large_file_threshold: 4,
        chunk_size: 2,
        ..FsOptions::default()
    };
    for variant in VARIANTS {
        let h = Harness::open(variant, options.clone()).await;
        h.write_text("four.txt", "abcd").await;
        h.write_text("five.txt", "abcde").await;
        assert_eq!(h.read_text("four.txt").await, "abcd", "{variant:?}");
        assert!(h.fs.read("five.txt", None).await.unwrap().is_chunked());
    }
}

#[tokio::test]
async fn test_lstat_reports_metadata() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("m.txt", "12345").await;
        let st = h.fs.lstat("m.txt").await.unwrap();
        assert_eq!(st.kind, EntryKind::File);
        assert_eq!(st.size, Some(5), "{variant:?}");
        assert!(st.mtime_millis() > 0);
    }
}

#[tokio::test]
async fn test_reserved_characters_in_names() {
    let names = ["notes#1~.txt", "100% done.txt", "a b.txt"];
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        for name in names {
            h.write_text(&format!("src/{name}"), name).await;
        }

        let listed = sorted(h.fs.list("src", false).await.unwrap());
        let expected = sorted(names.iter().map(|n| format!("src/{n}")).collect());
        assert_eq!(listed, expected, "{variant:?}");
        for path in &listed {
            assert!(h.fs.is_file(path).await.unwrap(), "{variant:?}: {path}");
        }

        h.fs.copy("src", "copied").await.unwrap();
        for name in names {
            assert_eq!(h.read_text(&format!("copied/{name}")).await, name, "{variant:?}");
        }

        h.fs.mv("src", "dst").await.unwrap();
        for name in names {
            assert!(h.fs.is_file(&format!("dst/{name}")).await.unwrap(), "{variant:?}");
        }
        let src = h.fs.resolver().resolve("src");
        assert!(h.fs.store().walk(&src).await.unwrap().is_empty(), "{variant:?}");

        h.fs.remove("dst").await.unwrap();
        let dst = h.fs.resolver().resolve("dst");
        assert!(h.fs.store().walk(&dst).await.unwrap().is_empty(), "{variant:?}");
    }
}

#[tokio::test]
async fn test_read_after_external_delete_is_no_such_file() {
    for variant in VARIANTS {
        let h = Harness::with_defaults(variant).await;
        h.write_text("gone.txt", "soon").await;
        assert!(h.fs.is_file("gone.txt").await.unwrap());

        // deleted behind the filesystem's back while the File entry is cached
        let backend = h.fs.resolver().resolve("gone.txt");
        h.fs.store().delete_object(&backend).await.unwrap();

        match h.fs.read("gone.txt", None).await.unwrap_err() {
            VfsError::NoSuchFile(path) => assert_eq!(path, backend),
            other => panic!("{variant:?}: expected NoSuchFile, got {other}"),
        }
        assert!(!h.fs.is_file("gone.txt").await.unwrap(), "{variant:?}");
    }
}
