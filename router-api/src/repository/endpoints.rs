use std::time::Duration;

use async_trait::async_trait;
use router_core::domain::Endpoint;
use router_core::error::{CoreError, CoreResult};
use router_core::repository::EndpointRepository;

use crate::db::{Database, DatabaseResult};

pub fn ensure_table(db: &Database) -> DatabaseResult<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS endpoints (
            endpoint_id TEXT PRIMARY KEY,
            base_url TEXT NOT NULL,
            health_probe_path TEXT,
            is_active INTEGER NOT NULL,
            timeout_ms INTEGER NOT NULL,
            retry_count INTEGER NOT NULL,
            is_legacy INTEGER NOT NULL,
            is_default INTEGER NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn row_to_endpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Endpoint> {
    Ok(Endpoint {
        endpoint_id: row.get(0)?,
        base_url: row.get(1)?,
        health_probe_path: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
        timeout: Duration::from_millis(row.get::<_, i64>(4)? as u64),
        retry_count: row.get::<_, i64>(5)? as u32,
        is_legacy: row.get::<_, i64>(6)? != 0,
        is_default: row.get::<_, i64>(7)? != 0,
    })
}

const SELECT_COLUMNS: &str =
    "endpoint_id, base_url, health_probe_path, is_active, timeout_ms, retry_count, is_legacy, is_default";

#[derive(Clone)]
pub struct SqliteEndpointRepository {
    db: Database,
}

impl SqliteEndpointRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn list(&self) -> DatabaseResult<Vec<Endpoint>> {
        self.db.query(
            &format!("SELECT {SELECT_COLUMNS} FROM endpoints ORDER BY endpoint_id ASC"),
            [],
            row_to_endpoint,
        )
    }

    /// Administration-only write path: `EndpointRepository` only
    /// exposes the read lookups the dispatcher needs, so the admin
    /// CRUD handlers call these inherent methods on the concrete
    /// repository directly. See `DESIGN.md`.
    pub fn save(&self, endpoint: &Endpoint) -> DatabaseResult<()> {
        self.db.execute(
            "INSERT INTO endpoints (
                endpoint_id, base_url, health_probe_path, is_active, timeout_ms,
                retry_count, is_legacy, is_default
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(endpoint_id) DO UPDATE SET
                base_url = excluded.base_url,
                health_probe_path = excluded.health_probe_path,
                is_active = excluded.is_active,
                timeout_ms = excluded.timeout_ms,
                retry_count = excluded.retry_count,
                is_legacy = excluded.is_legacy,
                is_default = excluded.is_default",
            rusqlite::params![
                endpoint.endpoint_id,
                endpoint.base_url,
                endpoint.health_probe_path,
                endpoint.is_active as i64,
                endpoint.timeout.as_millis() as i64,
                endpoint.retry_count as i64,
                endpoint.is_legacy as i64,
                endpoint.is_default as i64,
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, endpoint_id: &str) -> DatabaseResult<bool> {
        let affected = self
            .db
            .execute("DELETE FROM endpoints WHERE endpoint_id = ?1", [endpoint_id])?;
        Ok(affected > 0)
    }
}

#[async_trait]
impl EndpointRepository for SqliteEndpointRepository {
    async fn find_by_id(&self, endpoint_id: &str) -> CoreResult<Option<Endpoint>> {
        self.db
            .query_one(
                &format!("SELECT {SELECT_COLUMNS} FROM endpoints WHERE endpoint_id = ?1"),
                [endpoint_id],
                row_to_endpoint,
            )
            .map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn find_default_legacy(&self) -> CoreResult<Option<Endpoint>> {
        self.db
            .query_one(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM endpoints
                     WHERE is_default = 1 AND is_legacy = 1 AND is_active = 1 LIMIT 1"
                ),
                [],
                row_to_endpoint,
            )
            .map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn find_default_modern(&self) -> CoreResult<Option<Endpoint>> {
        self.db
            .query_one(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM endpoints
                     WHERE is_default = 1 AND is_legacy = 0 AND is_active = 1 LIMIT 1"
                ),
                [],
                row_to_endpoint,
            )
            .map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn list_active(&self) -> CoreResult<Vec<Endpoint>> {
        self.db
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM endpoints WHERE is_active = 1"),
                [],
                row_to_endpoint,
            )
            .map_err(|err| CoreError::Repository(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> Database {
        let dir = std::env::temp_dir().join(format!("router-api-endpoints-test-{}", uuid::Uuid::new_v4()));
        let db = Database::open(&dir.join("core.sqlite3")).unwrap();
        ensure_table(&db).unwrap();
        db
    }

    fn endpoint(id: &str, legacy: bool, default: bool) -> Endpoint {
        Endpoint {
            endpoint_id: id.to_string(),
            base_url: "http://example".to_string(),
            health_probe_path: None,
            is_active: true,
            timeout: Duration::from_secs(2),
            retry_count: 1,
            is_legacy: legacy,
            is_default: default,
        }
    }

    #[tokio::test]
    async fn default_legacy_lookup_finds_the_flagged_row() {
        let repo = SqliteEndpointRepository::new(temp_db());
        repo.save(&endpoint("legacy-1", true, true)).unwrap();
        repo.save(&endpoint("modern-1", false, true)).unwrap();

        let found = repo.find_default_legacy().await.unwrap().unwrap();
        assert_eq!(found.endpoint_id, "legacy-1");
    }

    #[tokio::test]
    async fn delete_then_lookup_returns_none() {
        let repo = SqliteEndpointRepository::new(temp_db());
        repo.save(&endpoint("e1", true, false)).unwrap();
        assert!(repo.delete("e1").unwrap());
        assert!(repo.find_by_id("e1").await.unwrap().is_none());
    }
}
