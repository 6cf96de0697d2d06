use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::parse::VersionedAst;

pub const DEFAULT_MAX_SIZE: usize = 1000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Structural delta between two cached versions of a file's tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AstDiff {
    pub from_version: String,
    pub to_version: String,
    pub nodes_before: usize,
    pub nodes_after: usize,
    pub line_delta: i64,
    pub created_at: DateTime<Utc>,
}

impl AstDiff {
    pub fn between(old: &VersionedAst, new: &VersionedAst) -> Self {
        Self {
            from_version: old.version.clone(),
            to_version: new.version.clone(),
            nodes_before: old.root.descendant_count(),
            nodes_after: new.root.descendant_count(),
            line_delta: i64::from(new.root.span.end_line) - i64::from(old.root.span.end_line),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstCacheStats {
    pub entries: usize,
    pub diff_files: usize,
    pub max_size: usize,
    pub ttl: Duration,
}

struct StoredAst {
    ast: VersionedAst,
    stored_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, StoredAst>,
    diffs: HashMap<String, Vec<AstDiff>>,
}

/// In-memory versioned AST store. Composite key is `file_id:version`;
/// entries expire after the TTL and the oldest entry is evicted when an
/// insert would exceed `max_size`. Set/get are linearisable per key.
pub struct AstCache {
    inner: RwLock<Inner>,
    max_size: usize,
    ttl: Duration,
}

impl Default for AstCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

impl AstCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_size: max_size.max(1),
            ttl,
        }
    }

    fn key(file_id: &str, version: &str) -> String {
        format!("{}:{}", file_id, version)
    }

    /// Returns the entry iff present and younger than the TTL; an expired
    /// entry is evicted and reported as a miss. With no version, the most
    /// recently stored version of the file wins.
    pub fn get(&self, file_id: &str, version: Option<&str>) -> Option<VersionedAst> {
        let key = match version {
            Some(version) => Self::key(file_id, version),
            None => self.latest_key(file_id)?,
        };

        {
            let inner = self.inner.read().expect("ast cache lock");
            match inner.entries.get(&key) {
                Some(stored) if stored.stored_at.elapsed() < self.ttl => {
                    return Some(stored.ast.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict under the write lock, re-checking age.
        let mut inner = self.inner.write().expect("ast cache lock");
        if let Some(stored) = inner.entries.get(&key) {
            if stored.stored_at.elapsed() < self.ttl {
                return Some(stored.ast.clone());
            }
            inner.entries.remove(&key);
        }
        None
    }

    fn latest_key(&self, file_id: &str) -> Option<String> {
        let prefix = format!("{}:", file_id);
        let inner = self.inner.read().expect("ast cache lock");
        inner
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .max_by_key(|(_, stored)| stored.stored_at)
            .map(|(key, _)| key.clone())
    }

    pub fn set(&self, file_id: &str, ast: VersionedAst) {
        let key = Self::key(file_id, &ast.version);
        let mut inner = self.inner.write().expect("ast cache lock");

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_size {
            if let Some(victim) = inner
                .entries
                .iter()
                .min_by_key(|(_, stored)| stored.stored_at)
                .map(|(key, _)| key.clone())
            {
                inner.entries.remove(&victim);
            }
        }

        inner.entries.insert(
            key,
            StoredAst {
                ast,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn get_diffs(&self, file_id: &str) -> Vec<AstDiff> {
        self.inner
            .read()
            .expect("ast cache lock")
            .diffs
            .get(file_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_diffs(&self, file_id: &str, diffs: Vec<AstDiff>) {
        self.inner
            .write()
            .expect("ast cache lock")
            .diffs
            .insert(file_id.to_string(), diffs);
    }

    /// Removes all cached versions of a file plus its diff entries.
    pub fn invalidate(&self, file_id: &str) {
        let prefix = format!("{}:", file_id);
        let mut inner = self.inner.write().expect("ast cache lock");
        inner.entries.retain(|key, _| !key.starts_with(&prefix));
        inner.diffs.remove(file_id);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("ast cache lock");
        inner.entries.clear();
        inner.diffs.clear();
    }

    pub fn size(&self) -> usize {
        self.inner.read().expect("ast cache lock").entries.len()
    }

    pub fn stats(&self) -> AstCacheStats {
        let inner = self.inner.read().expect("ast cache lock");
        AstCacheStats {
            entries: inner.entries.len(),
            diff_files: inner.diffs.len(),
            max_size: self.max_size,
            ttl: self.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_versioned;

    fn ast(version: &str, source: &str) -> VersionedAst {
        parse_versioned("src/lib.rs", source, version).expect("parses")
    }

    #[test]
    fn round_trips_within_ttl() {
        let cache = AstCache::new(10, Duration::from_secs(60));
        cache.set("src/lib.rs", ast("v1", "fn a() {}"));

        let hit = cache.get("src/lib.rs", Some("v1")).expect("hit");
        assert_eq!(hit.version, "v1");
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn expired_entries_are_evicted_on_get() {
        let cache = AstCache::new(10, Duration::from_millis(50));
        cache.set("src/lib.rs", ast("v1", "fn a() {}"));
        std::thread::sleep(Duration::from_millis(80));

        assert!(cache.get("src/lib.rs", Some("v1")).is_none());
        assert_eq!(cache.size(), 0, "expired entry must not linger");
    }

    #[test]
    fn insert_over_capacity_evicts_oldest() {
        let cache = AstCache::new(2, Duration::from_secs(60));
        cache.set("a.rs", ast("v1", "fn a() {}"));
        std::thread::sleep(Duration::from_millis(5));
        cache.set("b.rs", ast("v1", "fn b() {}"));
        std::thread::sleep(Duration::from_millis(5));
        cache.set("c.rs", ast("v1", "fn c() {}"));

        assert_eq!(cache.size(), 2);
        assert!(cache.get("a.rs", Some("v1")).is_none(), "oldest evicted");
        assert!(cache.get("c.rs", Some("v1")).is_some());
    }

    #[test]
    fn versionless_get_returns_latest() {
        let cache = AstCache::default();
        cache.set("lib.rs", ast("v1", "fn a() {}"));
        std::thread::sleep(Duration::from_millis(5));
        cache.set("lib.rs", ast("v2", "fn a() {}\nfn b() {}"));

        let latest = cache.get("lib.rs", None).expect("hit");
        assert_eq!(latest.version, "v2");
    }

    #[test]
    fn invalidate_drops_all_versions_and_diffs() {
        let cache = AstCache::default();
        let v1 = ast("v1", "fn a() {}");
        let v2 = ast("v2", "fn a() {}\nfn b() {}");
        cache.set("lib.rs", v1.clone());
        cache.set("lib.rs", v2.clone());
        cache.set_diffs("lib.rs", vec![AstDiff::between(&v1, &v2)]);

        cache.invalidate("lib.rs");
        assert!(cache.get("lib.rs", None).is_none());
        assert!(cache.get_diffs("lib.rs").is_empty());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn diff_records_structural_delta() {
        let v1 = ast("v1", "fn a() {}\n");
        let v2 = ast("v2", "fn a() {}\nfn b() {}\n");
        let diff = AstDiff::between(&v1, &v2);

        assert_eq!(diff.from_version, "v1");
        assert_eq!(diff.to_version, "v2");
        assert!(diff.nodes_after > diff.nodes_before);
        assert_eq!(diff.line_delta, 1);
    }

    #[test]
    fn stats_reflect_configuration() {
        let cache = AstCache::new(5, Duration::from_secs(30));
        cache.set("a.rs", ast("v1", "fn a() {}"));
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.max_size, 5);
        assert_eq!(stats.ttl, Duration::from_secs(30));
    }
}
