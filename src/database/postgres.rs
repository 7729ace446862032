//! PostgreSQL-backed [`LimsStore`].
//!
//! Queries are checked at runtime (`sqlx::query_as`) so the crate builds without
//! a live database. Each workflow or task change runs in a single transaction
//! whose first statement is the conditional update.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use super::migrations::DatabaseMigrations;
use super::{
    AppliedWorkflowChange, LimsStore, SideEffect, StoreError, StoreResult, TaskChange,
    WorkflowChange,
};
use crate::config::DatabaseConfig;
use crate::models::{
    Commission, NewTestTask, NewTransitionLogEntry, NewWorkflowInstance, SampleReceipt, TestTask,
    TestTaskFilter, TransitionLogEntry, TransitionLogFilter, User, WorkflowFilter,
    WorkflowInstance,
};
use crate::state_machine::{TestTaskStatus, WorkflowState};

const WORKFLOW_COLUMNS: &str = "id, sample_receipt_id, current_state, assignee_id, priority, \
     expected_completion_date, actual_completion_date, notes, created_by, is_deleted, \
     created_at, updated_at";

const LOG_COLUMNS: &str =
    "id, workflow_id, from_state, to_state, operator_id, action, remarks, created_at";

const TASK_COLUMNS: &str = "id, workflow_id, tester_id, test_items, status, start_time, \
     end_time, notes, created_by, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            StoreError::Database(sqlx::Error::Configuration(
                "database.url is not configured".into(),
            ))
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        DatabaseMigrations::run_all(&self.pool).await
    }

    async fn insert_log_entry(
        tx: &mut Transaction<'_, Postgres>,
        entry: &NewTransitionLogEntry,
    ) -> StoreResult<TransitionLogEntry> {
        let sql = format!(
            "INSERT INTO lims_workflow_transition_logs \
             (workflow_id, from_state, to_state, operator_id, action, remarks) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {LOG_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TransitionLogEntry>(&sql)
            .bind(entry.workflow_id)
            .bind(entry.from_state.as_str())
            .bind(entry.to_state.as_str())
            .bind(entry.operator_id)
            .bind(entry.action.as_str())
            .bind(entry.remarks.as_deref())
            .fetch_one(&mut **tx)
            .await?;
        Ok(row)
    }

    async fn apply_side_effect(
        tx: &mut Transaction<'_, Postgres>,
        effect: &SideEffect,
    ) -> StoreResult<()> {
        match effect {
            SideEffect::SetCommissionStatus {
                commission_id,
                status,
            } => {
                let result = sqlx::query(
                    "UPDATE lims_commissions SET status = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(commission_id)
                .bind(status.as_str())
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound {
                        entity: "commission",
                        id: *commission_id,
                    });
                }
            }
        }
        Ok(())
    }
}

fn unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .map_or(false, |db| db.is_unique_violation())
}

#[async_trait]
impl LimsStore for PgStore {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, role, is_active FROM lims_users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_sample_receipt(&self, id: i64) -> StoreResult<Option<SampleReceipt>> {
        let receipt = sqlx::query_as::<_, SampleReceipt>(
            "SELECT id, commission_id, receive_code, receiver_id, received_at \
             FROM lims_sample_receipts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(receipt)
    }

    async fn find_commission(&self, id: i64) -> StoreResult<Option<Commission>> {
        let commission = sqlx::query_as::<_, Commission>(
            "SELECT id, code, sample_name, status FROM lims_commissions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(commission)
    }

    async fn insert_workflow(&self, new: NewWorkflowInstance) -> StoreResult<WorkflowInstance> {
        let sql = format!(
            "INSERT INTO lims_sample_workflows \
             (sample_receipt_id, current_state, priority, expected_completion_date, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {WORKFLOW_COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowInstance>(&sql)
            .bind(new.sample_receipt_id)
            .bind(WorkflowState::Received.as_str())
            .bind(new.priority.value())
            .bind(new.expected_completion_date)
            .bind(new.notes.as_deref())
            .bind(new.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if unique_violation(&e) {
                    StoreError::AlreadyExists(format!(
                        "sample receipt {} already has a workflow",
                        new.sample_receipt_id
                    ))
                } else {
                    StoreError::Database(e)
                }
            })
    }

    async fn get_workflow(&self, id: i64) -> StoreResult<Option<WorkflowInstance>> {
        let sql = format!(
            "SELECT {WORKFLOW_COLUMNS} FROM lims_sample_workflows WHERE id = $1 AND NOT is_deleted"
        );
        let workflow = sqlx::query_as::<_, WorkflowInstance>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(workflow)
    }

    async fn list_workflows(&self, filter: &WorkflowFilter) -> StoreResult<Vec<WorkflowInstance>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {WORKFLOW_COLUMNS} FROM lims_sample_workflows WHERE NOT is_deleted"
        ));

        if let Some(state) = filter.state {
            query.push(" AND current_state = ").push_bind(state.as_str());
        }
        if let Some(states) = &filter.states {
            let codes: Vec<String> = states.iter().map(|s| s.as_str().to_string()).collect();
            query.push(" AND current_state = ANY(").push_bind(codes).push(")");
        }
        if let Some(assignee_id) = filter.assignee_id {
            query.push(" AND assignee_id = ").push_bind(assignee_id);
        }
        if let Some(priority) = filter.priority {
            query.push(" AND priority = ").push_bind(priority.value());
        }
        if let Some(term) = filter.search_term() {
            let pattern = format!("%{}%", escape_like(term));
            query
                .push(
                    " AND sample_receipt_id IN (SELECT r.id FROM lims_sample_receipts r \
                     JOIN lims_commissions c ON c.id = r.commission_id \
                     WHERE r.receive_code ILIKE ",
                )
                .push_bind(pattern.clone())
                .push(" OR c.code ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        query.push(" ORDER BY ");
        if let Some(ordering) = filter.ordering {
            query.push(ordering.sql()).push(", ");
        }
        query.push(
            "priority DESC, expected_completion_date ASC NULLS LAST, created_at DESC, id DESC",
        );

        let workflows = query
            .build_query_as::<WorkflowInstance>()
            .fetch_all(&self.pool)
            .await?;
        Ok(workflows)
    }

    async fn apply_workflow_change(
        &self,
        change: WorkflowChange,
    ) -> StoreResult<AppliedWorkflowChange> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE lims_sample_workflows SET \
               current_state = COALESCE($3, current_state), \
               assignee_id = COALESCE($4, assignee_id), \
               priority = COALESCE($5, priority), \
               expected_completion_date = COALESCE($6, expected_completion_date), \
               actual_completion_date = COALESCE(actual_completion_date, $7), \
               updated_at = NOW() \
             WHERE id = $1 AND current_state = $2 AND NOT is_deleted \
             RETURNING {WORKFLOW_COLUMNS}"
        );
        let update = &change.update;
        let updated = sqlx::query_as::<_, WorkflowInstance>(&sql)
            .bind(change.workflow_id)
            .bind(change.expected_state.as_str())
            .bind(update.current_state.map(|s| s.as_str()))
            .bind(update.assignee_id)
            .bind(update.priority.map(|p| p.value()))
            .bind(update.expected_completion_date)
            .bind(update.actual_completion_date)
            .fetch_optional(&mut *tx)
            .await?;

        let workflow = match updated {
            Some(workflow) => workflow,
            None => {
                let current: Option<PgRow> = sqlx::query(
                    "SELECT current_state FROM lims_sample_workflows \
                     WHERE id = $1 AND NOT is_deleted",
                )
                .bind(change.workflow_id)
                .fetch_optional(&mut *tx)
                .await?;

                return Err(match current {
                    None => StoreError::NotFound {
                        entity: "workflow",
                        id: change.workflow_id,
                    },
                    Some(row) => {
                        let actual: WorkflowState = crate::models::decode_code(&row, "current_state")?;
                        tracing::debug!(
                            workflow_id = change.workflow_id,
                            expected = %change.expected_state,
                            actual = %actual,
                            "Conditional workflow update lost"
                        );
                        StoreError::StateConflict {
                            workflow_id: change.workflow_id,
                            actual,
                        }
                    }
                });
            }
        };

        let log_entry = match &change.log_entry {
            Some(entry) => Some(Self::insert_log_entry(&mut tx, entry).await?),
            None => None,
        };

        for effect in &change.side_effects {
            Self::apply_side_effect(&mut tx, effect).await?;
        }

        tx.commit().await?;

        Ok(AppliedWorkflowChange {
            workflow,
            log_entry,
        })
    }

    async fn soft_delete_workflow(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE lims_sample_workflows SET is_deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "workflow",
                id,
            });
        }
        Ok(())
    }

    async fn list_transition_logs(
        &self,
        filter: &TransitionLogFilter,
    ) -> StoreResult<Vec<TransitionLogEntry>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {LOG_COLUMNS} FROM lims_workflow_transition_logs WHERE TRUE"
        ));

        if let Some(workflow_id) = filter.workflow_id {
            query.push(" AND workflow_id = ").push_bind(workflow_id);
        }
        if let Some(operator_id) = filter.operator_id {
            query.push(" AND operator_id = ").push_bind(operator_id);
        }
        if let Some(action) = filter.action {
            query.push(" AND action = ").push_bind(action.as_str());
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let entries = query
            .build_query_as::<TransitionLogEntry>()
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    async fn insert_test_task(&self, new: NewTestTask) -> StoreResult<TestTask> {
        let sql = format!(
            "INSERT INTO lims_test_tasks (workflow_id, tester_id, test_items, status, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TASK_COLUMNS}"
        );
        let task = sqlx::query_as::<_, TestTask>(&sql)
            .bind(new.workflow_id)
            .bind(new.tester_id)
            .bind(Json(&new.test_items))
            .bind(TestTaskStatus::Pending.as_str())
            .bind(new.notes.as_deref())
            .bind(new.created_by)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn get_test_task(&self, id: i64) -> StoreResult<Option<TestTask>> {
        let sql =
            format!("SELECT {TASK_COLUMNS} FROM lims_test_tasks WHERE id = $1 AND NOT is_deleted");
        let task = sqlx::query_as::<_, TestTask>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn list_test_tasks(&self, filter: &TestTaskFilter) -> StoreResult<Vec<TestTask>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {TASK_COLUMNS} FROM lims_test_tasks WHERE NOT is_deleted"
        ));

        if let Some(workflow_id) = filter.workflow_id {
            query.push(" AND workflow_id = ").push_bind(workflow_id);
        }
        if let Some(tester_id) = filter.tester_id {
            query.push(" AND tester_id = ").push_bind(tester_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let tasks = query
            .build_query_as::<TestTask>()
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn apply_task_change(&self, change: TaskChange) -> StoreResult<TestTask> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE lims_test_tasks SET \
               status = $3, \
               start_time = COALESCE($4, start_time), \
               end_time = COALESCE($5, end_time), \
               updated_at = NOW() \
             WHERE id = $1 AND status = $2 AND NOT is_deleted \
             RETURNING {TASK_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, TestTask>(&sql)
            .bind(change.task_id)
            .bind(change.expected_status.as_str())
            .bind(change.status.as_str())
            .bind(change.start_time)
            .bind(change.end_time)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(task) = updated {
            tx.commit().await?;
            return Ok(task);
        }

        let current: Option<PgRow> =
            sqlx::query("SELECT status FROM lims_test_tasks WHERE id = $1 AND NOT is_deleted")
                .bind(change.task_id)
                .fetch_optional(&mut *tx)
                .await?;

        Err(match current {
            None => StoreError::NotFound {
                entity: "test task",
                id: change.task_id,
            },
            Some(row) => StoreError::TaskStatusConflict {
                task_id: change.task_id,
                actual: crate::models::decode_code(&row, "status")?,
            },
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        let row = sqlx::query("SELECT 1 AS health")
            .fetch_one(&self.pool)
            .await?;
        let health: i32 = row.try_get("health")?;
        if health != 1 {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "unexpected health check result".into(),
            )));
        }
        Ok(())
    }
}

/// Escape `LIKE` wildcards so a search term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
