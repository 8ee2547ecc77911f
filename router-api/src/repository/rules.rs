use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use router_core::domain::RoutingRule;
use router_core::error::{CoreError, CoreResult};
use router_core::repository::RoutingRuleRepository;

use crate::db::{Database, DatabaseResult};

pub fn ensure_table(db: &Database) -> DatabaseResult<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS routing_rules (
            rule_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            path_pattern TEXT NOT NULL,
            method_pattern TEXT NOT NULL,
            header_match TEXT NOT NULL,
            query_match TEXT NOT NULL,
            priority INTEGER NOT NULL,
            is_active INTEGER NOT NULL,
            cache_enabled INTEGER NOT NULL,
            cache_ttl_seconds INTEGER,
            legacy_endpoint_id TEXT NOT NULL,
            modern_endpoint_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoutingRule> {
    let header_match: HashMap<String, String> =
        serde_json::from_str(&row.get::<_, String>(4)?).unwrap_or_default();
    let query_match: HashMap<String, String> =
        serde_json::from_str(&row.get::<_, String>(5)?).unwrap_or_default();
    let created_at: DateTime<Utc> = row
        .get::<_, String>(12)?
        .parse()
        .unwrap_or_else(|_| Utc::now());

    Ok(RoutingRule::new(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        header_match,
        query_match,
        row.get::<_, i64>(6)?,
        row.get::<_, i64>(7)? != 0,
        row.get::<_, i64>(8)? != 0,
        row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
        row.get::<_, String>(10)?,
        row.get::<_, String>(11)?,
        created_at,
    ))
}

#[derive(Clone)]
pub struct SqliteRoutingRuleRepository {
    db: Database,
}

impl SqliteRoutingRuleRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Used by the admin CRUD handlers to read back a full list for
    /// `GET /rules`; the trait only exposes the coarse `find_matching`
    /// lookup the dispatcher needs.
    pub fn list(&self) -> DatabaseResult<Vec<RoutingRule>> {
        self.db.query(
            "SELECT rule_id, name, path_pattern, method_pattern, header_match, query_match,
                    priority, is_active, cache_enabled, cache_ttl_seconds,
                    legacy_endpoint_id, modern_endpoint_id, created_at
             FROM routing_rules ORDER BY priority ASC, created_at ASC",
            [],
            row_to_rule,
        )
    }
}

#[async_trait]
impl RoutingRuleRepository for SqliteRoutingRuleRepository {
    async fn find_matching(&self, method: &str, _path: &str) -> CoreResult<Vec<RoutingRule>> {
        self.db
            .query(
                "SELECT rule_id, name, path_pattern, method_pattern, header_match, query_match,
                        priority, is_active, cache_enabled, cache_ttl_seconds,
                        legacy_endpoint_id, modern_endpoint_id, created_at
                 FROM routing_rules
                 WHERE is_active = 1 AND (method_pattern = ?1 OR method_pattern = '*')
                 ORDER BY priority ASC, created_at ASC",
                [method],
                row_to_rule,
            )
            .map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn get(&self, rule_id: &str) -> CoreResult<Option<RoutingRule>> {
        self.db
            .query_one(
                "SELECT rule_id, name, path_pattern, method_pattern, header_match, query_match,
                        priority, is_active, cache_enabled, cache_ttl_seconds,
                        legacy_endpoint_id, modern_endpoint_id, created_at
                 FROM routing_rules WHERE rule_id = ?1",
                [rule_id],
                row_to_rule,
            )
            .map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn create(&self, rule: RoutingRule) -> CoreResult<()> {
        self.save(&rule).map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn update(&self, rule: RoutingRule) -> CoreResult<()> {
        self.save(&rule).map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn delete(&self, rule_id: &str) -> CoreResult<()> {
        self.db
            .execute("DELETE FROM routing_rules WHERE rule_id = ?1", [rule_id])
            .map(|_| ())
            .map_err(|err| CoreError::Repository(err.to_string()))
    }
}

impl SqliteRoutingRuleRepository {
    fn save(&self, rule: &RoutingRule) -> DatabaseResult<()> {
        let header_match = serde_json::to_string(&rule.header_match).unwrap_or_default();
        let query_match = serde_json::to_string(&rule.query_match).unwrap_or_default();

        self.db.execute(
            "INSERT INTO routing_rules (
                rule_id, name, path_pattern, method_pattern, header_match, query_match,
                priority, is_active, cache_enabled, cache_ttl_seconds,
                legacy_endpoint_id, modern_endpoint_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(rule_id) DO UPDATE SET
                name = excluded.name,
                path_pattern = excluded.path_pattern,
                method_pattern = excluded.method_pattern,
                header_match = excluded.header_match,
                query_match = excluded.query_match,
                priority = excluded.priority,
                is_active = excluded.is_active,
                cache_enabled = excluded.cache_enabled,
                cache_ttl_seconds = excluded.cache_ttl_seconds,
                legacy_endpoint_id = excluded.legacy_endpoint_id,
                modern_endpoint_id = excluded.modern_endpoint_id",
            rusqlite::params![
                rule.rule_id,
                rule.name,
                rule.path_pattern,
                rule.method_pattern,
                header_match,
                query_match,
                rule.priority,
                rule.is_active as i64,
                rule.cache_enabled as i64,
                rule.cache_ttl_seconds.map(|v| v as i64),
                rule.legacy_endpoint_id,
                rule.modern_endpoint_id,
                rule.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> Database {
        let dir = std::env::temp_dir().join(format!("router-api-rules-test-{}", uuid::Uuid::new_v4()));
        let db = Database::open(&dir.join("core.sqlite3")).unwrap();
        ensure_table(&db).unwrap();
        db
    }

    fn rule(id: &str, method: &str, priority: i64) -> RoutingRule {
        RoutingRule::new(
            id,
            "test rule",
            "/a/*",
            method,
            HashMap::new(),
            HashMap::new(),
            priority,
            true,
            true,
            Some(30),
            "legacy-1",
            "modern-1",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn saved_rule_round_trips_through_get() {
        let repo = SqliteRoutingRuleRepository::new(temp_db());
        repo.create(rule("r1", "GET", 10)).await.unwrap();

        let fetched = repo.get("r1").await.unwrap().unwrap();
        assert_eq!(fetched.rule_id, "r1");
        assert_eq!(fetched.priority, 10);
    }

    #[tokio::test]
    async fn find_matching_filters_by_method_and_orders_by_priority() {
        let repo = SqliteRoutingRuleRepository::new(temp_db());
        repo.create(rule("low", "GET", 20)).await.unwrap();
        repo.create(rule("high", "GET", 5)).await.unwrap();
        repo.create(rule("other-method", "POST", 1)).await.unwrap();

        let matched = repo.find_matching("GET", "/a/x").await.unwrap();
        let ids: Vec<_> = matched.iter().map(|r| r.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn delete_removes_the_rule() {
        let repo = SqliteRoutingRuleRepository::new(temp_db());
        repo.create(rule("r1", "GET", 1)).await.unwrap();
        repo.delete("r1").await.unwrap();
        assert!(repo.get("r1").await.unwrap().is_none());
    }
}
