/// Contract tests run against every storage backend
///
/// The object store backend runs over an in-process fake client, so these
/// tests exercise the compose-based append without a network.
use parking_lot::Mutex;
use proptest::prelude::*;
use rstest::rstest;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use vigil_storage::{
    LocalFileBackend, MemoryBackend, ObjectClient, ObjectStoreBackend, RelationalBackend,
    StorageBackend,
};

mod helpers {
    use super::*;

    #[derive(Default)]
    pub struct FakeObjectClient {
        objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
        counter: AtomicU64,
    }

    impl FakeObjectClient {
        fn next_etag(&self) -> String {
            format!("\"etag-{}\"", self.counter.fetch_add(1, Ordering::SeqCst))
        }

        pub fn names(&self) -> Vec<String> {
            self.objects.lock().keys().cloned().collect()
        }
    }

    impl ObjectClient for FakeObjectClient {
        fn head(&self, name: &str) -> anyhow::Result<Option<String>> {
            Ok(self.objects.lock().get(name).map(|(_, etag)| etag.clone()))
        }

        fn get(&self, name: &str) -> anyhow::Result<Vec<u8>> {
            self.objects
                .lock()
                .get(name)
                .map(|(body, _)| body.clone())
                .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {}", name))
        }

        fn put(&self, name: &str, body: Vec<u8>) -> anyhow::Result<String> {
            let etag = self.next_etag();
            self.objects
                .lock()
                .insert(name.to_string(), (body, etag.clone()));
            Ok(etag)
        }

        fn delete(&self, name: &str) -> anyhow::Result<()> {
            self.objects.lock().remove(name);
            Ok(())
        }

        fn compose(&self, target: &str, sources: Vec<String>) -> anyhow::Result<String> {
            let mut body = Vec::new();
            for source in &sources {
                body.extend(self.get(source)?);
            }
            self.put(target, body)
        }

        fn list(&self) -> anyhow::Result<Vec<String>> {
            Ok(self.names())
        }
    }

    /// A backend plus whatever keeps its storage alive
    pub struct Harness {
        pub backend: Arc<dyn StorageBackend>,
        _dir: Option<TempDir>,
    }

    pub fn harness(kind: &str) -> Harness {
        match kind {
            "memory" => Harness {
                backend: Arc::new(MemoryBackend::new()),
                _dir: None,
            },
            "local" => {
                let dir = TempDir::new().unwrap();
                Harness {
                    backend: Arc::new(LocalFileBackend::new(dir.path().join("inputs"))),
                    _dir: Some(dir),
                }
            }
            "relational" => {
                let dir = TempDir::new().unwrap();
                let backend = RelationalBackend::open(&dir.path().join("vigil.db")).unwrap();
                Harness {
                    backend: Arc::new(backend),
                    _dir: Some(dir),
                }
            }
            "object" => Harness {
                backend: Arc::new(ObjectStoreBackend::new(FakeObjectClient::default())),
                _dir: None,
            },
            other => panic!("unknown backend {}", other),
        }
    }

    pub fn rows(range: std::ops::Range<usize>) -> Vec<u8> {
        range.flat_map(|i| format!("row-{}\n", i).into_bytes()).collect()
    }
}

use helpers::*;

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
#[case("object")]
fn exists_only_after_write(#[case] kind: &str) {
    let h = harness(kind);
    assert!(!h.backend.exists("m-data"));
    assert!(!h.backend.try_exists("m-data").unwrap());
    h.backend.write("m-data", &rows(0..3), true).unwrap();
    assert!(h.backend.exists("m-data"));
    assert!(h.backend.try_exists("m-data").unwrap());
}

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
#[case("object")]
fn full_read_round_trips(#[case] kind: &str) {
    let h = harness(kind);
    h.backend.write("m-data", &rows(0..10), true).unwrap();
    assert_eq!(h.backend.read("m-data").unwrap(), rows(0..10));
}

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
#[case("object")]
fn read_of_missing_key_is_read_error(#[case] kind: &str) {
    let h = harness(kind);
    assert!(h.backend.read("missing-data").unwrap_err().is_read());
}

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
#[case("object")]
fn write_without_overwrite_appends(#[case] kind: &str) {
    let h = harness(kind);
    h.backend.write("m-data", &rows(0..4), false).unwrap();
    h.backend.write("m-data", &rows(4..6), false).unwrap();
    assert_eq!(h.backend.read("m-data").unwrap(), rows(0..6));

    h.backend.write("m-data", &rows(10..11), true).unwrap();
    assert_eq!(h.backend.read("m-data").unwrap(), rows(10..11));
}

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
#[case("object")]
fn append_requires_existing_destination(#[case] kind: &str) {
    let h = harness(kind);
    let err = h.backend.append("nowhere-data", &rows(0..1)).unwrap_err();
    assert!(err.is_write());
    assert!(!h.backend.exists("nowhere-data"));
}

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
#[case("object")]
fn reversed_range_is_illegal_argument(#[case] kind: &str) {
    let h = harness(kind);
    h.backend.write("m-data", &rows(0..5), true).unwrap();
    assert!(h.backend.read_range("m-data", 3, 3).unwrap_err().is_illegal_argument());
    assert!(h.backend.read_range("m-data", 4, 1).unwrap_err().is_illegal_argument());
    // Checked before any lookup, even for missing keys
    assert!(h.backend.read_range("missing", 2, 0).unwrap_err().is_illegal_argument());
}

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
fn batch_and_range_reads(#[case] kind: &str) {
    let h = harness(kind);
    h.backend.write("m-data", &rows(0..10), true).unwrap();
    h.backend.write("m-data", &rows(10..15), false).unwrap();

    assert_eq!(h.backend.read_last("m-data", 5).unwrap(), rows(10..15));
    assert_eq!(h.backend.read_last("m-data", 100).unwrap(), rows(0..15));
    assert!(h.backend.read_last("m-data", 0).unwrap().is_empty());
    assert_eq!(h.backend.read_range("m-data", 8, 12).unwrap(), rows(8..12));
    assert_eq!(h.backend.read_range("m-data", 14, 40).unwrap(), rows(14..15));
    assert!(h.backend.read_range("m-data", 20, 40).unwrap().is_empty());
}

#[test]
fn object_store_refuses_partial_reads() {
    let h = harness("object");
    h.backend.write("m-data", &rows(0..10), true).unwrap();
    assert!(!h.backend.supports_partial_reads());
    assert!(h.backend.read_last("m-data", 5).unwrap_err().is_read());
    assert!(h.backend.read_range("m-data", 0, 5).unwrap_err().is_read());
    assert!(h.backend.read_last("m-data", 0).unwrap().is_empty());
}

#[test]
fn object_store_append_cleans_up_temp_objects() {
    let client = Arc::new(FakeObjectClient::default());
    struct Shared(Arc<FakeObjectClient>);
    impl ObjectClient for Shared {
        fn head(&self, name: &str) -> anyhow::Result<Option<String>> {
            self.0.head(name)
        }
        fn get(&self, name: &str) -> anyhow::Result<Vec<u8>> {
            self.0.get(name)
        }
        fn put(&self, name: &str, body: Vec<u8>) -> anyhow::Result<String> {
            self.0.put(name, body)
        }
        fn delete(&self, name: &str) -> anyhow::Result<()> {
            self.0.delete(name)
        }
        fn compose(&self, target: &str, sources: Vec<String>) -> anyhow::Result<String> {
            self.0.compose(target, sources)
        }
        fn list(&self) -> anyhow::Result<Vec<String>> {
            self.0.list()
        }
    }

    let backend = ObjectStoreBackend::new(Shared(client.clone()));
    backend.replace("m-data", &rows(0..2)).unwrap();
    backend.append("m-data", &rows(2..4)).unwrap();
    backend.append("m-data", &rows(4..5)).unwrap();

    assert_eq!(backend.read("m-data").unwrap(), rows(0..5));
    assert_eq!(client.names(), vec!["m-data".to_string()]);
}

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
#[case("object")]
fn version_changes_with_content(#[case] kind: &str) {
    let h = harness(kind);
    assert!(h.backend.last_modified("m-data").is_err());
    h.backend.write("m-data", &rows(0..2), true).unwrap();
    let first = h.backend.last_modified("m-data").unwrap();
    h.backend.append("m-data", &rows(2..3)).unwrap();
    assert_ne!(h.backend.last_modified("m-data").unwrap(), first);
}

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
#[case("object")]
fn list_keys_reports_written_keys(#[case] kind: &str) {
    let h = harness(kind);
    h.backend.write("a-data", &rows(0..1), true).unwrap();
    h.backend.write("b-data", &rows(0..1), true).unwrap();
    h.backend.append("b-data", &rows(1..2)).unwrap();

    let mut keys = h.backend.list_keys().unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a-data".to_string(), "b-data".to_string()]);
}

#[rstest]
#[case("memory")]
#[case("local")]
#[case("relational")]
fn concurrent_appends_keep_every_row(#[case] kind: &str) {
    let h = harness(kind);
    h.backend.write("m-data", b"", true).unwrap();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let backend = h.backend.clone();
            scope.spawn(move || {
                for i in 0..25 {
                    backend
                        .append("m-data", format!("t{}-{}\n", t, i).as_bytes())
                        .unwrap();
                }
            });
        }
    });

    let all = h.backend.read("m-data").unwrap();
    assert_eq!(all.iter().filter(|b| **b == b'\n').count(), 100);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn local_batch_reads_return_the_tail(total in 0usize..200, n in 0usize..250) {
        let h = harness("local");
        h.backend.write("m-data", &rows(0..total), true).unwrap();
        let expected = rows(total.saturating_sub(n)..total);
        prop_assert_eq!(h.backend.read_last("m-data", n).unwrap(), expected);
    }

    #[test]
    fn local_range_reads_match_memory(
        total in 0usize..120,
        start in 0usize..150,
        len in 1usize..60,
    ) {
        let local = harness("local");
        let memory = harness("memory");
        for h in [&local, &memory] {
            h.backend.write("m-data", &rows(0..total), true).unwrap();
        }
        prop_assert_eq!(
            local.backend.read_range("m-data", start, start + len).unwrap(),
            memory.backend.read_range("m-data", start, start + len).unwrap()
        );
    }
}
