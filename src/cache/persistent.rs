use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, oneshot};
use tracing::{debug, warn};

use crate::errors::{CodeContextError, Result};
use crate::graph::CodeGraph;
use crate::parse::VersionedAst;

const INDEX_FILE: &str = "index.bin";
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct GraphCacheConfig {
    pub directory: PathBuf,
    pub max_size: usize,
    pub ttl: Duration,
    pub enable_lru: bool,
    pub enable_metrics: bool,
}

impl Default for GraphCacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".codecontext/cache"),
            max_size: 1000,
            ttl: Duration::from_secs(24 * 60 * 60),
            enable_lru: true,
            enable_metrics: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_size_bytes: u64,
    pub last_cleanup: Option<DateTime<Utc>>,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
enum CacheValue {
    Graph(CodeGraph),
    Ast(VersionedAst),
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: CacheValue,
    created_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
    size_estimate: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DiskIndex {
    entries: HashMap<String, DiskIndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskIndexEntry {
    file: String,
    created_at: DateTime<Utc>,
    size_estimate: u64,
}

#[derive(Serialize, Deserialize)]
struct PersistedGraph {
    key: String,
    created_at: DateTime<Utc>,
    graph: CodeGraph,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, StoredEntry>,
    metrics: CacheMetrics,
}

/// Hybrid graph/AST store: an in-memory entry map with LRU access stamps
/// and a disk layer that persists graph entries only. One file per graph
/// under the cache directory, named by the hex digest of the key, plus an
/// index flushed after every successful save and on `close()`.
pub struct PersistentGraphCache {
    config: GraphCacheConfig,
    inner: Arc<RwLock<Inner>>,
    shutdown: std::sync::Mutex<Option<oneshot::Sender<()>>>,
    sweeper: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PersistentGraphCache {
    /// Opens the cache, reloading persisted graphs. A missing index means
    /// an empty cache; unreadable entry files are skipped.
    pub async fn open(config: GraphCacheConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.directory)
            .await
            .map_err(|e| CodeContextError::CacheIo(e.to_string()))?;

        let mut inner = Inner::default();
        let index = load_index(&config.directory).await;

        for (key, meta) in &index.entries {
            let path = config.directory.join(&meta.file);
            match load_entry(&path).await {
                Some(persisted) if persisted.key == *key => {
                    inner.metrics.total_size_bytes += meta.size_estimate;
                    inner.entries.insert(
                        key.clone(),
                        StoredEntry {
                            value: CacheValue::Graph(persisted.graph),
                            created_at: persisted.created_at,
                            last_access: persisted.created_at,
                            size_estimate: meta.size_estimate,
                        },
                    );
                }
                _ => {
                    warn!(key = %key, "skipping unreadable cache entry");
                }
            }
        }

        let cache = Self {
            config,
            inner: Arc::new(RwLock::new(inner)),
            shutdown: std::sync::Mutex::new(None),
            sweeper: std::sync::Mutex::new(None),
        };
        cache.spawn_sweeper();
        Ok(cache)
    }

    fn spawn_sweeper(&self) {
        if self.config.ttl.is_zero() {
            return;
        }

        let (tx, mut rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        sweep_expired(&inner, &config).await;
                    }
                }
            }
        });

        *self.shutdown.lock().expect("shutdown lock") = Some(tx);
        *self.sweeper.lock().expect("sweeper lock") = Some(handle);
    }

    pub async fn get_graph(&self, key: &str) -> Option<CodeGraph> {
        let mut inner = self.inner.write().await;

        let expired = match inner.entries.get(key) {
            Some(entry) => self.is_expired(entry),
            None => {
                self.record_miss(&mut inner);
                return None;
            }
        };

        if expired {
            self.evict_entry(&mut inner, key).await;
            self.record_miss(&mut inner);
            return None;
        }

        let entry = inner.entries.get_mut(key).expect("entry present");
        entry.last_access = Utc::now();
        let result = match &entry.value {
            CacheValue::Graph(graph) => Some(graph.clone()),
            CacheValue::Ast(_) => None,
        };

        match result {
            Some(graph) => {
                self.record_hit(&mut inner);
                Some(graph)
            }
            None => {
                self.record_miss(&mut inner);
                None
            }
        }
    }

    pub async fn set_graph(&self, key: &str, graph: CodeGraph) -> Result<()> {
        let size = estimate_graph_size(&graph);
        let created_at = Utc::now();

        {
            let mut inner = self.inner.write().await;
            self.make_room(&mut inner, key).await;
            let previous = inner.entries.insert(
                key.to_string(),
                StoredEntry {
                    value: CacheValue::Graph(graph.clone()),
                    created_at,
                    last_access: created_at,
                    size_estimate: size,
                },
            );
            if let Some(previous) = previous {
                inner.metrics.total_size_bytes =
                    inner.metrics.total_size_bytes.saturating_sub(previous.size_estimate);
            }
            inner.metrics.total_size_bytes += size;
        }

        let persisted = PersistedGraph {
            key: key.to_string(),
            created_at,
            graph,
        };
        let path = self.config.directory.join(entry_file_name(key));
        match bincode::serialize(&persisted) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    warn!(key = %key, error = %e, "graph cache save failed");
                } else {
                    self.flush_index().await?;
                }
            }
            Err(e) => warn!(key = %key, error = %e, "graph cache encode failed"),
        }

        Ok(())
    }

    pub async fn get_ast(&self, path: &str) -> Option<VersionedAst> {
        let key = ast_key(path);
        let mut inner = self.inner.write().await;

        let expired = match inner.entries.get(&key) {
            Some(entry) => self.is_expired(entry),
            None => {
                self.record_miss(&mut inner);
                return None;
            }
        };

        if expired {
            self.evict_entry(&mut inner, &key).await;
            self.record_miss(&mut inner);
            return None;
        }

        let entry = inner.entries.get_mut(&key).expect("entry present");
        entry.last_access = Utc::now();
        let result = match &entry.value {
            CacheValue::Ast(ast) => Some(ast.clone()),
            CacheValue::Graph(_) => None,
        };

        match result {
            Some(ast) => {
                self.record_hit(&mut inner);
                Some(ast)
            }
            None => {
                self.record_miss(&mut inner);
                None
            }
        }
    }

    /// ASTs stay memory-only; reparsing is cheaper than persisting trees.
    pub async fn set_ast(&self, path: &str, ast: VersionedAst) {
        let key = ast_key(path);
        let size = estimate_ast_size(&ast);
        let now = Utc::now();

        let mut inner = self.inner.write().await;
        self.make_room(&mut inner, &key).await;
        let previous = inner.entries.insert(
            key,
            StoredEntry {
                value: CacheValue::Ast(ast),
                created_at: now,
                last_access: now,
                size_estimate: size,
            },
        );
        if let Some(previous) = previous {
            inner.metrics.total_size_bytes =
                inner.metrics.total_size_bytes.saturating_sub(previous.size_estimate);
        }
        inner.metrics.total_size_bytes += size;
    }

    pub async fn clear(&self) -> Result<()> {
        let keys: Vec<String> = {
            let inner = self.inner.read().await;
            inner.entries.keys().cloned().collect()
        };

        for key in &keys {
            let path = self.config.directory.join(entry_file_name(key));
            let _ = tokio::fs::remove_file(path).await;
        }

        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.metrics.total_size_bytes = 0;
        drop(inner);

        self.flush_index().await
    }

    pub async fn metrics(&self) -> CacheMetrics {
        self.inner.read().await.metrics.clone()
    }

    pub async fn size(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Flushes the index and stops the TTL sweeper.
    pub async fn close(&self) -> Result<()> {
        if let Some(tx) = self.shutdown.lock().expect("shutdown lock").take() {
            let _ = tx.send(());
        }
        let handle = self.sweeper.lock().expect("sweeper lock").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.flush_index().await
    }

    fn is_expired(&self, entry: &StoredEntry) -> bool {
        if self.config.ttl.is_zero() {
            return false;
        }
        let age = Utc::now().signed_duration_since(entry.created_at);
        age.to_std().map(|d| d >= self.config.ttl).unwrap_or(false)
    }

    fn record_hit(&self, inner: &mut Inner) {
        if self.config.enable_metrics {
            inner.metrics.hits += 1;
        }
    }

    fn record_miss(&self, inner: &mut Inner) {
        if self.config.enable_metrics {
            inner.metrics.misses += 1;
        }
    }

    /// Evicts one victim before an insert that would exceed `max_size`:
    /// least-recently-accessed with LRU enabled, else oldest by creation.
    async fn make_room(&self, inner: &mut Inner, incoming_key: &str) {
        if inner.entries.contains_key(incoming_key)
            || inner.entries.len() < self.config.max_size
        {
            return;
        }

        let victim = if self.config.enable_lru {
            inner
                .entries
                .iter()
                .min_by_key(|(key, entry)| (entry.last_access, (*key).clone()))
                .map(|(key, _)| key.clone())
        } else {
            inner
                .entries
                .iter()
                .min_by_key(|(key, entry)| (entry.created_at, (*key).clone()))
                .map(|(key, _)| key.clone())
        };

        if let Some(victim) = victim {
            debug!(key = %victim, "evicting cache entry");
            self.evict_entry(inner, &victim).await;
        }
    }

    async fn evict_entry(&self, inner: &mut Inner, key: &str) {
        if let Some(entry) = inner.entries.remove(key) {
            inner.metrics.total_size_bytes =
                inner.metrics.total_size_bytes.saturating_sub(entry.size_estimate);
            inner.metrics.evictions += 1;

            if matches!(entry.value, CacheValue::Graph(_)) {
                let path = self.config.directory.join(entry_file_name(key));
                let _ = tokio::fs::remove_file(path).await;
            }
        }
    }

    async fn flush_index(&self) -> Result<()> {
        let index = {
            let inner = self.inner.read().await;
            let mut index = DiskIndex::default();
            for (key, entry) in &inner.entries {
                if matches!(entry.value, CacheValue::Graph(_)) {
                    index.entries.insert(
                        key.clone(),
                        DiskIndexEntry {
                            file: entry_file_name(key),
                            created_at: entry.created_at,
                            size_estimate: entry.size_estimate,
                        },
                    );
                }
            }
            index
        };

        let bytes = bincode::serialize(&index)
            .map_err(|e| CodeContextError::CacheIo(e.to_string()))?;
        tokio::fs::write(self.config.directory.join(INDEX_FILE), bytes)
            .await
            .map_err(|e| CodeContextError::CacheIo(e.to_string()))
    }
}

async fn sweep_expired(inner: &Arc<RwLock<Inner>>, config: &GraphCacheConfig) {
    let now = Utc::now();
    let mut guard = inner.write().await;

    let expired: Vec<(String, bool)> = guard
        .entries
        .iter()
        .filter(|(_, entry)| {
            now.signed_duration_since(entry.created_at)
                .to_std()
                .map(|d| d >= config.ttl)
                .unwrap_or(false)
        })
        .map(|(key, entry)| (key.clone(), matches!(entry.value, CacheValue::Graph(_))))
        .collect();

    for (key, on_disk) in &expired {
        if let Some(entry) = guard.entries.remove(key) {
            guard.metrics.total_size_bytes =
                guard.metrics.total_size_bytes.saturating_sub(entry.size_estimate);
            guard.metrics.evictions += 1;
        }
        if *on_disk {
            let _ = tokio::fs::remove_file(config.directory.join(entry_file_name(key))).await;
        }
    }

    guard.metrics.last_cleanup = Some(now);
    if !expired.is_empty() {
        debug!(count = expired.len(), "ttl sweep evicted entries");
    }
}

async fn load_index(directory: &Path) -> DiskIndex {
    let path = directory.join(INDEX_FILE);
    match tokio::fs::read(&path).await {
        Ok(bytes) => match bincode::deserialize(&bytes) {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "corrupt cache index; starting empty");
                DiskIndex::default()
            }
        },
        Err(_) => DiskIndex::default(),
    }
}

async fn load_entry(path: &Path) -> Option<PersistedGraph> {
    let bytes = tokio::fs::read(path).await.ok()?;
    bincode::deserialize(&bytes).ok()
}

fn entry_file_name(key: &str) -> String {
    format!("{}.bin", blake3::hash(key.as_bytes()).to_hex())
}

fn ast_key(path: &str) -> String {
    format!("ast:{}", path)
}

/// Estimated entry footprint in bytes.
fn estimate_graph_size(graph: &CodeGraph) -> u64 {
    1000 * graph.files.len() as u64
        + 500 * graph.symbols.len() as u64
        + 300 * graph.nodes.len() as u64
        + 200 * graph.edges.len() as u64
}

fn estimate_ast_size(ast: &VersionedAst) -> u64 {
    ast.root.text_or_empty().len() as u64 + 1000
}
