//! # SQLite Repository Implementations
//!
//! Implements `router_core::repository`'s four traits against the
//! `Database` wrapper, following the teacher's `gwnode_queries`-style
//! pattern: each module owns its own `CREATE TABLE IF NOT EXISTS` and
//! maps rows to `router_core::domain` types directly. Variable-shaped
//! fields (`RoutingRule`'s header/query maps, `OrchestrationRule`'s
//! nested transition/comparison config) are stored as JSON columns.

pub mod comparisons;
pub mod endpoints;
pub mod orchestration;
pub mod rules;

pub use comparisons::SqliteComparisonRepository;
pub use endpoints::SqliteEndpointRepository;
pub use orchestration::SqliteOrchestrationRepository;
pub use rules::SqliteRoutingRuleRepository;

use crate::db::{Database, DatabaseResult};

/// Creates every repository's table. Called once at startup so the
/// CRUD handlers never have to worry about table existence — the
/// teacher's modules instead re-check `IF NOT EXISTS` on every call,
/// which we keep for the same reason (defensive against a table being
/// dropped out from under a running process) while doing it once up
/// front too.
pub fn ensure_schema(db: &Database) -> DatabaseResult<()> {
    rules::ensure_table(db)?;
    endpoints::ensure_table(db)?;
    orchestration::ensure_table(db)?;
    comparisons::ensure_table(db)?;
    Ok(())
}
