use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// A pattern-plus-constraints record mapping inbound requests to a
/// legacy/modern endpoint pair.
///
/// The path pattern is a glob (`*` wildcard); it is compiled to a regex
/// once per rule, on first use, and cached on the instance via
/// `compiled_pattern` — `spec.md` §3's "lazily-compiled regex derived
/// from the path pattern". `RoutingRule` is not `Clone`: the cache and
/// router share rules through `Arc<RoutingRule>` so every reader sees
/// the same compiled regex instance.
#[derive(Debug)]
pub struct RoutingRule {
    pub rule_id: String,
    pub name: String,
    /// Glob pattern with `*` wildcard, e.g. `/api/users/*`.
    pub path_pattern: String,
    /// `GET|POST|...|*`.
    pub method_pattern: String,
    pub header_match: HashMap<String, String>,
    pub query_match: HashMap<String, String>,
    /// Lower value = higher precedence.
    pub priority: i64,
    pub is_active: bool,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: Option<u64>,
    pub legacy_endpoint_id: String,
    pub modern_endpoint_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    compiled: OnceLock<Regex>,
}

impl RoutingRule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule_id: impl Into<String>,
        name: impl Into<String>,
        path_pattern: impl Into<String>,
        method_pattern: impl Into<String>,
        header_match: HashMap<String, String>,
        query_match: HashMap<String, String>,
        priority: i64,
        is_active: bool,
        cache_enabled: bool,
        cache_ttl_seconds: Option<u64>,
        legacy_endpoint_id: impl Into<String>,
        modern_endpoint_id: impl Into<String>,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            name: name.into(),
            path_pattern: path_pattern.into(),
            method_pattern: method_pattern.into(),
            header_match,
            query_match,
            priority,
            is_active,
            cache_enabled,
            cache_ttl_seconds,
            legacy_endpoint_id: legacy_endpoint_id.into(),
            modern_endpoint_id: modern_endpoint_id.into(),
            created_at,
            compiled: OnceLock::new(),
        }
    }

    /// Converts the glob pattern to an anchored regex, quoting regex
    /// metacharacters and replacing the escaped `*` with `.*`, then
    /// memoizes the result.
    pub fn compiled_pattern(&self) -> &Regex {
        self.compiled.get_or_init(|| {
            let quoted = regex::escape(&self.path_pattern);
            let wildcarded = quoted.replace(r"\*", ".*");
            let anchored = format!("^{}$", wildcarded);
            Regex::new(&anchored).expect("glob-derived pattern always compiles")
        })
    }

    /// Full match predicate from `spec.md` §4.1, evaluated against a
    /// request's method, path, headers and query parameters.
    pub fn matches(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        query: &HashMap<String, String>,
    ) -> bool {
        if !self.is_active {
            return false;
        }
        if self.method_pattern != "*" && self.method_pattern != method {
            return false;
        }
        if !self.compiled_pattern().is_match(path) {
            return false;
        }
        for (k, v) in &self.header_match {
            if headers.get(k) != Some(v) {
                return false;
            }
        }
        for (k, v) in &self.query_match {
            if query.get(k) != Some(v) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(pattern: &str, method: &str, priority: i64) -> RoutingRule {
        RoutingRule::new(
            "r1",
            "rule",
            pattern,
            method,
            HashMap::new(),
            HashMap::new(),
            priority,
            true,
            true,
            None,
            "legacy",
            "modern",
            Utc::now(),
        )
    }

    #[test]
    fn wildcard_matches_prefix_and_nested_paths() {
        let r = rule("/a/*", "GET", 0);
        assert!(r.matches("GET", "/a/x", &HashMap::new(), &HashMap::new()));
        assert!(r.matches("GET", "/a/x/y", &HashMap::new(), &HashMap::new()));
        assert!(r.matches("GET", "/a/", &HashMap::new(), &HashMap::new()));
        assert!(!r.matches("GET", "/b", &HashMap::new(), &HashMap::new()));
    }

    #[test]
    fn wildcard_method_matches_anything() {
        let r = rule("/a", "*", 0);
        assert!(r.matches("POST", "/a", &HashMap::new(), &HashMap::new()));
    }

    #[test]
    fn inactive_rule_never_matches() {
        let mut r = rule("/a", "*", 0);
        r.is_active = false;
        assert!(!r.matches("GET", "/a", &HashMap::new(), &HashMap::new()));
    }

    #[test]
    fn header_and_query_constraints_are_enforced() {
        let mut r = rule("/a", "*", 0);
        r.header_match.insert("x-flag".to_string(), "1".to_string());
        r.query_match.insert("v".to_string(), "2".to_string());

        let mut headers = HashMap::new();
        headers.insert("x-flag".to_string(), "1".to_string());
        let mut query = HashMap::new();
        query.insert("v".to_string(), "2".to_string());

        assert!(r.matches("GET", "/a", &headers, &query));
        assert!(!r.matches("GET", "/a", &HashMap::new(), &query));
    }

    #[test]
    fn compiled_pattern_is_memoized() {
        let r = rule("/a/*", "GET", 0);
        let first = r.compiled_pattern() as *const Regex;
        let second = r.compiled_pattern() as *const Regex;
        assert_eq!(first, second);
    }
}
