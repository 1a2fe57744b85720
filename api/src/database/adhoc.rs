use super::rows::{bind_params, row_to_json};
use super::types::Database;
use crate::config::ExecutionLimits;
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqliteConnection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tenant_query::{assemble, QueryError, QueryLimits, QuerySpec, RawSqlGuard};

/// SQLite virtual machine instructions between deadline checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQueryResult {
    pub rows: Vec<Map<String, Value>>,
    /// Set when the row cap cut the result short.
    pub truncated: bool,
}

/// Wall-clock budget for the statements run on one connection.
///
/// Arming installs a SQLite progress handler that interrupts the running
/// statement once the budget is spent, so the connection is free again as
/// soon as the error comes back. The handler goes inert when the deadline is
/// dropped, which keeps a cancelled request from poisoning a pooled
/// connection.
pub struct StatementDeadline {
    armed: Arc<AtomicBool>,
    started: Instant,
    budget: Duration,
}

impl StatementDeadline {
    pub async fn arm(conn: &mut SqliteConnection, budget: Duration) -> Result<Self, sqlx::Error> {
        let armed = Arc::new(AtomicBool::new(true));
        let started = Instant::now();
        let deadline = started + budget;
        let flag = Arc::clone(&armed);
        conn.lock_handle()
            .await?
            .set_progress_handler(PROGRESS_CHECK_OPS, move || {
                !flag.load(Ordering::Relaxed) || Instant::now() < deadline
            });
        Ok(Self {
            armed,
            started,
            budget,
        })
    }

    /// Removes the handler. Must run before the connection is used for
    /// anything outside the budget, such as a rollback.
    pub async fn disarm(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.armed.store(false, Ordering::Relaxed);
        conn.lock_handle().await?.remove_progress_handler();
        Ok(())
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    /// Maps the outcome of the budgeted work. A failure after the deadline
    /// is the interrupt and reports as a timeout.
    pub fn finish<T>(&self, outcome: Result<T, sqlx::Error>) -> Result<T, QueryError> {
        match outcome {
            Ok(value) => Ok(value),
            Err(e) if self.expired() => {
                tracing::warn!(
                    "Query exceeded its {} ms budget and was interrupted: {}",
                    self.budget.as_millis(),
                    e
                );
                Err(QueryError::QueryTimeout {
                    budget_ms: self.budget.as_millis() as u64,
                })
            }
            Err(e) => {
                tracing::error!("Query execution failed: {}", e);
                Err(QueryError::execution(e))
            }
        }
    }
}

impl Drop for StatementDeadline {
    fn drop(&mut self) {
        self.armed.store(false, Ordering::Relaxed);
    }
}

impl Database {
    /// Executes an admin query-builder request for one tenant.
    pub async fn run_query_spec(
        &self,
        spec: &QuerySpec,
        tenant_id: &str,
        limits: &QueryLimits,
        execution: &ExecutionLimits,
    ) -> Result<Vec<Map<String, Value>>, QueryError> {
        let statement = assemble(spec, tenant_id, limits)?;
        tracing::info!(
            table = %spec.table,
            tenant_id = %tenant_id,
            "Ad-hoc query: {}",
            statement.sql
        );

        let mut conn = self.pool.acquire().await.map_err(QueryError::execution)?;
        let deadline = StatementDeadline::arm(&mut conn, execution.timeout)
            .await
            .map_err(QueryError::execution)?;
        let outcome = async {
            let rows = bind_params(sqlx::query(&statement.sql), &statement.params)
                .fetch_all(&mut *conn)
                .await?;
            rows.iter()
                .map(row_to_json)
                .collect::<Result<Vec<_>, sqlx::Error>>()
        }
        .await;
        deadline
            .disarm(&mut conn)
            .await
            .map_err(QueryError::execution)?;
        deadline.finish(outcome)
    }

    /// Executes a guarded raw SELECT. The statement runs inside a transaction
    /// that is always rolled back, and at most `max_rows` rows are returned.
    pub async fn run_raw_sql(
        &self,
        sql: &str,
        guard: &RawSqlGuard,
        execution: &ExecutionLimits,
    ) -> Result<RawQueryResult, QueryError> {
        let statement = guard.validate(sql)?;
        tracing::info!("Raw SQL: {}", statement);

        let max_rows = execution.max_rows;
        let mut tx = self.pool.begin().await.map_err(QueryError::execution)?;
        let deadline = StatementDeadline::arm(&mut tx, execution.timeout)
            .await
            .map_err(QueryError::execution)?;
        let outcome = async {
            let mut rows = Vec::new();
            let mut truncated = false;
            let mut stream = sqlx::query(&statement).fetch(&mut *tx);
            while let Some(row) = stream.try_next().await? {
                if rows.len() >= max_rows {
                    truncated = true;
                    break;
                }
                rows.push(row_to_json(&row)?);
            }
            Ok::<_, sqlx::Error>(RawQueryResult { rows, truncated })
        }
        .await;
        deadline
            .disarm(&mut tx)
            .await
            .map_err(QueryError::execution)?;

        let rolled_back = tx.rollback().await;
        let result = deadline.finish(outcome)?;
        rolled_back.map_err(QueryError::execution)?;
        Ok(result)
    }
}
