use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use router_core::domain::{ComparisonConfig, Mode, OrchestrationRule, TransitionConfig};
use router_core::error::{CoreError, CoreResult};
use router_core::repository::OrchestrationRepository;
use serde::{Deserialize, Serialize};

use crate::db::{Database, DatabaseResult};

pub fn ensure_table(db: &Database) -> DatabaseResult<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS orchestration_rules (
            rule_id TEXT PRIMARY KEY,
            mode TEXT NOT NULL,
            transition TEXT NOT NULL,
            comparison TEXT NOT NULL,
            last_mode_change TEXT
        )",
        [],
    )?;
    Ok(())
}

/// `TransitionConfig`/`ComparisonConfig` don't derive `Serialize` — they
/// are `router_core` internals, not wire types — so storage goes
/// through these field-for-field shadow DTOs instead.
#[derive(Serialize, Deserialize)]
struct TransitionConfigRow {
    auto_enabled: bool,
    match_rate_threshold: f64,
    stability_period_secs: u64,
    min_requests_for_transition: usize,
    rollback_threshold: f64,
}

impl From<&TransitionConfig> for TransitionConfigRow {
    fn from(c: &TransitionConfig) -> Self {
        Self {
            auto_enabled: c.auto_enabled,
            match_rate_threshold: c.match_rate_threshold,
            stability_period_secs: c.stability_period.as_secs(),
            min_requests_for_transition: c.min_requests_for_transition,
            rollback_threshold: c.rollback_threshold,
        }
    }
}

impl From<TransitionConfigRow> for TransitionConfig {
    fn from(r: TransitionConfigRow) -> Self {
        Self {
            auto_enabled: r.auto_enabled,
            match_rate_threshold: r.match_rate_threshold,
            stability_period: Duration::from_secs(r.stability_period_secs),
            min_requests_for_transition: r.min_requests_for_transition,
            rollback_threshold: r.rollback_threshold,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ComparisonConfigRow {
    enabled: bool,
    ignore_fields: Vec<String>,
    allowable_numeric_difference: f64,
    strict_mode: bool,
    save_history: bool,
}

impl From<&ComparisonConfig> for ComparisonConfigRow {
    fn from(c: &ComparisonConfig) -> Self {
        Self {
            enabled: c.enabled,
            ignore_fields: c.ignore_fields.clone(),
            allowable_numeric_difference: c.allowable_numeric_difference,
            strict_mode: c.strict_mode,
            save_history: c.save_history,
        }
    }
}

impl From<ComparisonConfigRow> for ComparisonConfig {
    fn from(r: ComparisonConfigRow) -> Self {
        Self {
            enabled: r.enabled,
            ignore_fields: r.ignore_fields,
            allowable_numeric_difference: r.allowable_numeric_difference,
            strict_mode: r.strict_mode,
            save_history: r.save_history,
        }
    }
}

fn mode_to_str(mode: Mode) -> &'static str {
    match mode {
        Mode::LegacyOnly => "legacy_only",
        Mode::ModernOnly => "modern_only",
        Mode::Parallel => "parallel",
    }
}

fn mode_from_str(s: &str) -> Mode {
    match s {
        "modern_only" => Mode::ModernOnly,
        "parallel" => Mode::Parallel,
        _ => Mode::LegacyOnly,
    }
}

fn row_to_orchestration(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrchestrationRule> {
    let transition: TransitionConfigRow =
        serde_json::from_str(&row.get::<_, String>(2)?).unwrap_or_else(|_| TransitionConfigRow::from(&TransitionConfig::default()));
    let comparison: ComparisonConfigRow =
        serde_json::from_str(&row.get::<_, String>(3)?).unwrap_or_else(|_| ComparisonConfigRow::from(&ComparisonConfig::default()));
    let last_mode_change: Option<DateTime<Utc>> = row
        .get::<_, Option<String>>(4)?
        .and_then(|raw| raw.parse().ok());

    Ok(OrchestrationRule {
        rule_id: row.get(0)?,
        mode: mode_from_str(&row.get::<_, String>(1)?),
        transition: transition.into(),
        comparison: comparison.into(),
        last_mode_change,
    })
}

#[derive(Clone)]
pub struct SqliteOrchestrationRepository {
    db: Database,
}

impl SqliteOrchestrationRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrchestrationRepository for SqliteOrchestrationRepository {
    async fn find_by_rule_id(&self, rule_id: &str) -> CoreResult<Option<OrchestrationRule>> {
        self.db
            .query_one(
                "SELECT rule_id, mode, transition, comparison, last_mode_change
                 FROM orchestration_rules WHERE rule_id = ?1",
                [rule_id],
                row_to_orchestration,
            )
            .map_err(|err| CoreError::Repository(err.to_string()))
    }

    async fn update(&self, rule: OrchestrationRule) -> CoreResult<()> {
        let transition = serde_json::to_string(&TransitionConfigRow::from(&rule.transition)).unwrap_or_default();
        let comparison = serde_json::to_string(&ComparisonConfigRow::from(&rule.comparison)).unwrap_or_default();
        let last_mode_change = rule.last_mode_change.map(|t| t.to_rfc3339());

        self.db
            .execute(
                "INSERT INTO orchestration_rules (rule_id, mode, transition, comparison, last_mode_change)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(rule_id) DO UPDATE SET
                     mode = excluded.mode,
                     transition = excluded.transition,
                     comparison = excluded.comparison,
                     last_mode_change = excluded.last_mode_change",
                rusqlite::params![rule.rule_id, mode_to_str(rule.mode), transition, comparison, last_mode_change],
            )
            .map(|_| ())
            .map_err(|err| CoreError::Repository(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> Database {
        let dir = std::env::temp_dir().join(format!("router-api-orch-test-{}", uuid::Uuid::new_v4()));
        let db = Database::open(&dir.join("core.sqlite3")).unwrap();
        ensure_table(&db).unwrap();
        db
    }

    #[tokio::test]
    async fn mode_and_thresholds_round_trip() {
        let repo = SqliteOrchestrationRepository::new(temp_db());
        let mut rule = OrchestrationRule::new("r1", Mode::Parallel);
        rule.transition.match_rate_threshold = 0.99;
        rule.last_mode_change = Some(Utc::now());

        repo.update(rule).await.unwrap();

        let fetched = repo.find_by_rule_id("r1").await.unwrap().unwrap();
        assert_eq!(fetched.mode, Mode::Parallel);
        assert_eq!(fetched.transition.match_rate_threshold, 0.99);
        assert!(fetched.last_mode_change.is_some());
    }

    #[tokio::test]
    async fn missing_rule_id_returns_none() {
        let repo = SqliteOrchestrationRepository::new(temp_db());
        assert!(repo.find_by_rule_id("missing").await.unwrap().is_none());
    }
}
