use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use router_core::domain::{APIComparison, DiffEntry, Response};
use router_core::error::{CoreError, CoreResult};
use router_core::repository::{ComparisonRepository, ComparisonStatistics};
use serde::{Deserialize, Serialize};

use crate::db::{Database, DatabaseResult};

pub fn ensure_table(db: &Database) -> DatabaseResult<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS comparisons (
            comparison_id TEXT PRIMARY KEY,
            request_id TEXT NOT NULL,
            rule_id TEXT NOT NULL,
            legacy_response TEXT,
            modern_response TEXT,
            match_rate REAL NOT NULL,
            diffs TEXT NOT NULL,
            compared_fields INTEGER NOT NULL,
            matched_fields INTEGER NOT NULL,
            duration_ms INTEGER NOT NULL,
            timestamp TEXT NOT NULL
        )",
        [],
    )?;
    db.execute(
        "CREATE INDEX IF NOT EXISTS comparisons_rule_id_timestamp
         ON comparisons (rule_id, timestamp DESC)",
        [],
    )?;
    Ok(())
}

/// `Response`'s fields are private to its own module, so it doesn't
/// derive `Serialize`; this shadow row carries the same four fields
/// for storage and goes through its public accessors/constructor.
#[derive(Serialize, Deserialize)]
struct ResponseRow {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl From<&Response> for ResponseRow {
    fn from(r: &Response) -> Self {
        Self {
            status: r.status(),
            headers: r.headers().clone(),
            body: r.body().to_vec(),
        }
    }
}

impl From<ResponseRow> for Response {
    fn from(r: ResponseRow) -> Self {
        Response::new(r.status, r.headers, r.body)
    }
}

fn encode_response(response: &Option<Response>) -> Option<String> {
    response
        .as_ref()
        .map(|r| serde_json::to_string(&ResponseRow::from(r)).unwrap_or_default())
}

fn decode_response(raw: Option<String>) -> Option<Response> {
    raw.and_then(|s| serde_json::from_str::<ResponseRow>(&s).ok())
        .map(Response::from)
}

fn row_to_comparison(row: &rusqlite::Row<'_>) -> rusqlite::Result<APIComparison> {
    let diffs: Vec<DiffEntry> = serde_json::from_str(&row.get::<_, String>(6)?).unwrap_or_default();
    let timestamp: DateTime<Utc> = row
        .get::<_, String>(10)?
        .parse()
        .unwrap_or_else(|_| Utc::now());

    Ok(APIComparison {
        comparison_id: row.get(0)?,
        request_id: row.get(1)?,
        rule_id: row.get(2)?,
        legacy_response: decode_response(row.get(3)?),
        modern_response: decode_response(row.get(4)?),
        match_rate: row.get(5)?,
        diffs,
        compared_fields: row.get::<_, i64>(7)? as u64,
        matched_fields: row.get::<_, i64>(8)? as u64,
        duration: Duration::from_millis(row.get::<_, i64>(9)? as u64),
        timestamp,
    })
}

#[derive(Clone)]
pub struct SqliteComparisonRepository {
    db: Database,
}

impl SqliteComparisonRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ComparisonRepository for SqliteComparisonRepository {
    async fn save(&self, comparison: APIComparison) -> CoreResult<()> {
        let diffs = serde_json::to_string(&comparison.diffs).unwrap_or_default();

        self.db
            .execute(
                "INSERT INTO comparisons (
                    comparison_id, request_id, rule_id, legacy_response, modern_response,
                    match_rate, diffs, compared_fields, matched_fields, duration_ms, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(comparison_id) DO NOTHING",
                rusqlite::params![
                    comparison.comparison_id,
                    comparison.request_id,
                    comparison.rule_id,
                    encode_response(&comparison.legacy_response),
                    encode_response(&comparison.modern_response),
                    comparison.match_rate,
                    diffs,
                    comparison.compared_fields as i64,
                    comparison.matched_fields as i64,
                    comparison.duration.as_millis() as i64,
                    comparison.timestamp.to_rfc3339(),
                ],
            )
            .map(|_| ())
            .map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn find_recent(&self, rule_id: &str, limit: usize) -> CoreResult<Vec<APIComparison>> {
        self.db
            .query(
                "SELECT comparison_id, request_id, rule_id, legacy_response, modern_response,
                        match_rate, diffs, compared_fields, matched_fields, duration_ms, timestamp
                 FROM comparisons WHERE rule_id = ?1
                 ORDER BY timestamp DESC LIMIT ?2",
                rusqlite::params![rule_id, limit as i64],
                row_to_comparison,
            )
            .map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn statistics(
        &self,
        rule_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<ComparisonStatistics> {
        let rows = self
            .db
            .query(
                "SELECT match_rate FROM comparisons
                 WHERE rule_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3",
                rusqlite::params![rule_id, from.to_rfc3339(), to.to_rfc3339()],
                |row| row.get::<_, f64>(0),
            )
            .map_err(|err| CoreError::Repository(err.to_string()))?;

        if rows.is_empty() {
            return Ok(ComparisonStatistics::default());
        }

        let sample_count = rows.len() as u64;
        let sum: f64 = rows.iter().sum();
        let min_match_rate = rows.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_match_rate = rows.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Ok(ComparisonStatistics {
            sample_count,
            mean_match_rate: sum / sample_count as f64,
            min_match_rate,
            max_match_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn temp_db() -> Database {
        let dir = std::env::temp_dir().join(format!("router-api-comparisons-test-{}", uuid::Uuid::new_v4()));
        let db = Database::open(&dir.join("core.sqlite3")).unwrap();
        ensure_table(&db).unwrap();
        db
    }

    fn comparison(id: &str, rule_id: &str, match_rate: f64, timestamp: DateTime<Utc>) -> APIComparison {
        APIComparison {
            comparison_id: id.to_string(),
            request_id: "req-1".to_string(),
            rule_id: rule_id.to_string(),
            legacy_response: Some(Response::new(200, Map::new(), b"legacy".to_vec())),
            modern_response: Some(Response::new(200, Map::new(), b"modern".to_vec())),
            match_rate,
            diffs: vec![],
            compared_fields: 10,
            matched_fields: 9,
            duration: Duration::from_millis(42),
            timestamp,
        }
    }

    #[tokio::test]
    async fn find_recent_orders_descending_by_timestamp() {
        let repo = SqliteComparisonRepository::new(temp_db());
        let base = Utc::now();
        repo.save(comparison("c1", "r1", 0.9, base)).await.unwrap();
        repo.save(comparison("c2", "r1", 0.95, base + chrono::Duration::seconds(10)))
            .await
            .unwrap();

        let recent = repo.find_recent("r1", 10).await.unwrap();
        assert_eq!(recent[0].comparison_id, "c2");
        assert_eq!(recent[1].comparison_id, "c1");
        assert_eq!(recent[0].legacy_response.as_ref().unwrap().status(), 200);
    }

    #[tokio::test]
    async fn statistics_aggregate_match_rate_over_a_window() {
        let repo = SqliteComparisonRepository::new(temp_db());
        let base = Utc::now();
        repo.save(comparison("c1", "r1", 0.80, base)).await.unwrap();
        repo.save(comparison("c2", "r1", 1.0, base)).await.unwrap();

        let stats = repo
            .statistics("r1", base - chrono::Duration::seconds(1), base + chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(stats.sample_count, 2);
        assert!((stats.mean_match_rate - 0.9).abs() < 1e-9);
        assert_eq!(stats.min_match_rate, 0.80);
        assert_eq!(stats.max_match_rate, 1.0);
    }
}
