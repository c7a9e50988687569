use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::supervisor::Supervisor;

/// Process-wide mapping of stream ids to supervisors, plus the two lookup indexes
/// the dispatcher needs: source URI → id (so `/start` can find an already-running
/// stream) and alias → id (so `/stream/<alias>/...` can redirect to the canonical
/// id). A preload table seeds aliases that should lazy-start on first request.
/// All mutation happens from the dispatcher or a supervisor's own terminal
/// failure path; reads vastly outnumber writes, so one coarse lock is enough.
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    streams: HashMap<String, Arc<Supervisor>>,
    by_uri: HashMap<String, String>,
    by_alias: HashMap<String, String>,
    preload: HashMap<String, String>,
}

pub struct StreamEntry {
    pub id: String,
    pub alias: Option<String>,
    pub running: bool,
}

impl Registry {
    pub fn new() -> Self {
        Registry { inner: RwLock::new(Inner::default()) }
    }

    pub fn by_uri(&self, uri: &str) -> Option<Arc<Supervisor>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let id = inner.by_uri.get(uri)?;
        inner.streams.get(id).cloned()
    }

    pub fn by_id(&self, id: &str) -> Option<Arc<Supervisor>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.streams.get(id).cloned()
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_alias.get(alias).cloned()
    }

    pub fn take_preload(&self, alias: &str) -> Option<String> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.preload.remove(alias)
    }

    pub fn seed_preload(&self, alias: String, uri: String) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.preload.insert(alias, uri);
    }

    /// Registers a freshly-started supervisor. Only called after a successful
    /// start, so the registry never holds a record pointing at a dead transition.
    pub fn insert(&self, supervisor: Arc<Supervisor>, alias: Option<String>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let id = supervisor.spec.id.clone();
        let uri = supervisor.spec.original_uri.clone();
        inner.by_uri.insert(uri, id.clone());
        if let Some(a) = &alias {
            inner.by_alias.insert(a.clone(), id.clone());
        }
        inner.streams.insert(id, supervisor);
    }

    pub fn alias_for(&self, id: &str) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_alias.iter().find(|(_, v)| v.as_str() == id).map(|(k, _)| k.clone())
    }

    /// Removes a stream and every reference to it in a single critical section.
    pub fn remove(&self, id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(sup) = inner.streams.remove(id) {
            inner.by_uri.retain(|_, v| v != id);
            inner.by_alias.retain(|_, v| v != id);
            drop(sup);
        }
    }

    pub fn list(&self) -> Vec<StreamEntry> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .streams
            .values()
            .map(|sup| {
                let id = sup.spec.id.clone();
                let alias = inner.by_alias.iter().find(|(_, v)| **v == id).map(|(k, _)| k.clone());
                StreamEntry { id, alias, running: sup.liveness.is_active() && sup.is_running() }
            })
            .collect()
    }

    pub fn preload_aliases(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.preload.keys().cloned().collect()
    }

    pub fn all(&self) -> Vec<Arc<Supervisor>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.streams.values().cloned().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::StreamSpec;
    use std::time::Duration;

    fn fake_supervisor(id: &str, uri: &str) -> Arc<Supervisor> {
        Arc::new(Supervisor::new(
            StreamSpec {
                id: id.to_string(),
                original_uri: uri.to_string(),
                store_dir: std::env::temp_dir().join(id),
                binary: "true".to_string(),
                audio_enabled: true,
                keep_files: false,
                wait_timeout: Duration::from_secs(1),
            },
            Duration::from_secs(60),
            None,
        ))
    }

    #[test]
    fn insert_and_lookup_by_uri_and_alias() {
        let reg = Registry::new();
        let sup = fake_supervisor("s1", "rtsp://cam/1");
        reg.insert(sup, Some("front-door".to_string()));

        assert!(reg.by_uri("rtsp://cam/1").is_some());
        assert_eq!(reg.resolve_alias("front-door"), Some("s1".to_string()));
        assert!(reg.by_id("s1").is_some());
    }

    #[test]
    fn remove_clears_every_reference() {
        let reg = Registry::new();
        let sup = fake_supervisor("s1", "rtsp://cam/1");
        reg.insert(sup, Some("front-door".to_string()));
        reg.remove("s1");

        assert!(reg.by_id("s1").is_none());
        assert!(reg.by_uri("rtsp://cam/1").is_none());
        assert!(reg.resolve_alias("front-door").is_none());
    }

    #[test]
    fn preload_table_round_trips() {
        let reg = Registry::new();
        reg.seed_preload("front-door".to_string(), "rtsp://cam/1".to_string());
        assert_eq!(reg.preload_aliases(), vec!["front-door".to_string()]);
        assert_eq!(reg.take_preload("front-door"), Some("rtsp://cam/1".to_string()));
        assert_eq!(reg.take_preload("front-door"), None);
    }
}
