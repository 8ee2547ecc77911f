//! # RuleCache
//!
//! Bounds the cost of rule resolution (`spec.md` §4.2). Keyed by
//! `method:path`, holding an ordered rule list plus an insertion
//! timestamp; entries older than the configured TTL are treated as
//! misses. Readers dominate, writers are rare (population on miss,
//! invalidation on rule/orchestration changes), so the local tier is a
//! `RwLock`-guarded map rather than a fully lock-free structure — the
//! same trade-off the teacher's `REDIRECT_RULES` static makes for its
//! routing table.
//!
//! A second, optional remote tier ([`RemoteRuleCache`]) may front the
//! repository with a longer TTL; the core functions correctly if it is
//! absent.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::RoutingRule;

struct CacheEntry {
    rules: Vec<Arc<RoutingRule>>,
    inserted_at: Instant,
}

/// The process-local tier of the rule cache.
pub struct RuleCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    remote: Option<Arc<dyn RemoteRuleCache>>,
}

impl RuleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            remote: None,
        }
    }

    pub fn with_remote(ttl: Duration, remote: Arc<dyn RemoteRuleCache>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            remote: Some(remote),
        }
    }

    /// Returns the cached ordered rule list for `key` if a fresh entry
    /// exists locally. Does not consult the remote tier — that lookup is
    /// async and is the router's job to perform on a confirmed local
    /// miss (see `get_with_remote`).
    pub fn get(&self, key: &str) -> Option<Vec<Arc<RoutingRule>>> {
        let entries = self.entries.read().expect("rule cache lock poisoned");
        entries.get(key).and_then(|entry| {
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.rules.clone())
            } else {
                None
            }
        })
    }

    /// Local-miss path that also consults the remote tier, if any,
    /// populating the local tier on a remote hit.
    pub async fn get_with_remote(&self, key: &str) -> Option<Vec<Arc<RoutingRule>>> {
        if let Some(rules) = self.get(key) {
            return Some(rules);
        }
        let remote = self.remote.as_ref()?;
        let rules = remote.get(key).await?;
        let rules: Vec<Arc<RoutingRule>> = rules.into_iter().map(Arc::new).collect();
        self.put(key.to_string(), rules.clone());
        Some(rules)
    }

    pub fn put(&self, key: String, rules: Vec<Arc<RoutingRule>>) {
        let mut entries = self.entries.write().expect("rule cache lock poisoned");
        entries.insert(
            key,
            CacheEntry {
                rules,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Explicit invalidation on rule create/update/delete or on
    /// OrchestrationRule mode change.
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().expect("rule cache lock poisoned");
        entries.remove(key);
    }

    /// Invalidates every entry whose cached rule list contains
    /// `rule_id` — used when an OrchestrationRule mode change needs to
    /// evict all `method:path` keys that might have resolved to it.
    pub fn invalidate_rule(&self, rule_id: &str) {
        let mut entries = self.entries.write().expect("rule cache lock poisoned");
        entries.retain(|_, entry| !entry.rules.iter().any(|r| r.rule_id == rule_id));
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().expect("rule cache lock poisoned");
        entries.clear();
    }
}

/// An optional remote cache layer (e.g. a key-value store) fronting the
/// repository with a longer TTL than the local tier.
#[async_trait]
pub trait RemoteRuleCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<RoutingRule>>;
    async fn put(&self, key: &str, rules: &[RoutingRule]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn rule(id: &str) -> Arc<RoutingRule> {
        Arc::new(RoutingRule::new(
            id,
            "rule",
            "/a/*",
            "GET",
            HashMap::new(),
            HashMap::new(),
            0,
            true,
            true,
            None,
            "legacy",
            "modern",
            Utc::now(),
        ))
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = RuleCache::new(Duration::from_millis(10));
        cache.put("GET:/a".to_string(), vec![rule("r1")]);
        assert!(cache.get("GET:/a").is_some());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("GET:/a").is_none());
    }

    #[test]
    fn invalidate_rule_drops_every_key_referencing_it() {
        let cache = RuleCache::new(Duration::from_secs(60));
        cache.put("GET:/a".to_string(), vec![rule("shared")]);
        cache.put("POST:/b".to_string(), vec![rule("shared")]);
        cache.put("GET:/c".to_string(), vec![rule("other")]);

        cache.invalidate_rule("shared");

        assert!(cache.get("GET:/a").is_none());
        assert!(cache.get("POST:/b").is_none());
        assert!(cache.get("GET:/c").is_some());
    }
}
