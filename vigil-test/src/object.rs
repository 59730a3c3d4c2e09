//! In-process object store client

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use vigil_storage::ObjectClient;

/// Object client holding every object in memory, with sequential ETags
#[derive(Default)]
pub struct InMemoryObjectClient {
    objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
    generation: AtomicU64,
    failing_heads: Mutex<BTreeSet<String>>,
}

impl InMemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_names(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    /// Make the next `head` of `name` fail as an unreachable store would
    pub fn fail_next_head(self, name: &str) -> Self {
        self.failing_heads.lock().insert(name.to_string());
        self
    }
}

impl ObjectClient for InMemoryObjectClient {
    fn head(&self, name: &str) -> Result<Option<String>> {
        if self.failing_heads.lock().remove(name) {
            return Err(anyhow!("503 Service Unavailable: HEAD {}", name));
        }
        Ok(self.objects.lock().get(name).map(|(_, etag)| etag.clone()))
    }

    fn get(&self, name: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .get(name)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| anyhow!("NoSuchKey: {}", name))
    }

    fn put(&self, name: &str, body: Vec<u8>) -> Result<String> {
        let etag = format!("\"{}\"", self.generation.fetch_add(1, Ordering::SeqCst));
        self.objects
            .lock()
            .insert(name.to_string(), (body, etag.clone()));
        Ok(etag)
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.objects.lock().remove(name);
        Ok(())
    }

    fn compose(&self, target: &str, sources: Vec<String>) -> Result<String> {
        let mut body = Vec::new();
        for source in &sources {
            body.extend(self.get(source)?);
        }
        self.put(target, body)
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.object_names())
    }
}
