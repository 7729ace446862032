use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::errors::{ServiceError, ServiceResult};
use crate::database::{LimsStore, StoreError, TaskChange};
use crate::models::{NewTestTask, TestTask, TestTaskFilter};
use crate::state_machine::{validate_task_transition, StateMachineError, TestTaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTestTask {
    pub workflow_id: i64,
    pub tester_id: i64,
    #[serde(default)]
    pub test_items: Vec<Value>,
    pub notes: Option<String>,
}

/// Test task lifecycle. Deliberately unaware of the owning workflow's state:
/// a task may complete while its workflow is still `Assigned`.
#[derive(Debug, Clone)]
pub struct TestTaskService {
    store: Arc<dyn LimsStore>,
}

impl TestTaskService {
    pub fn new(store: Arc<dyn LimsStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: CreateTestTask, operator_id: i64) -> ServiceResult<TestTask> {
        if self.store.get_workflow(request.workflow_id).await?.is_none() {
            return Err(ServiceError::not_found("workflow", request.workflow_id));
        }
        if self.store.find_user(request.tester_id).await?.is_none() {
            return Err(ServiceError::not_found("user", request.tester_id));
        }

        let task = self
            .store
            .insert_test_task(NewTestTask {
                workflow_id: request.workflow_id,
                tester_id: request.tester_id,
                test_items: request.test_items,
                notes: request.notes.filter(|n| !n.trim().is_empty()),
                created_by: Some(operator_id),
            })
            .await?;

        info!(
            task_id = task.id,
            workflow_id = task.workflow_id,
            tester_id = task.tester_id,
            "Test task created"
        );
        Ok(task)
    }

    pub async fn get(&self, task_id: i64) -> ServiceResult<TestTask> {
        self.store
            .get_test_task(task_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("test task", task_id))
    }

    pub async fn list(&self, filter: &TestTaskFilter) -> ServiceResult<Vec<TestTask>> {
        Ok(self.store.list_test_tasks(filter).await?)
    }

    /// `Pending -> InProgress`, stamping `start_time`
    pub async fn start(&self, task_id: i64, operator_id: i64) -> ServiceResult<TestTask> {
        self.move_task(task_id, TestTaskStatus::InProgress, "start", operator_id)
            .await
    }

    /// `InProgress -> Completed`, stamping `end_time`
    pub async fn complete(&self, task_id: i64, operator_id: i64) -> ServiceResult<TestTask> {
        self.move_task(task_id, TestTaskStatus::Completed, "complete", operator_id)
            .await
    }

    /// `Pending | InProgress -> Cancelled`
    pub async fn cancel(&self, task_id: i64, operator_id: i64) -> ServiceResult<TestTask> {
        self.move_task(task_id, TestTaskStatus::Cancelled, "cancel", operator_id)
            .await
    }

    async fn move_task(
        &self,
        task_id: i64,
        to: TestTaskStatus,
        operation: &'static str,
        operator_id: i64,
    ) -> ServiceResult<TestTask> {
        let task = self.get(task_id).await?;
        validate_task_transition(task.status, to, operation).map_err(|e| match e {
            StateMachineError::InvalidTaskState { status, operation } => {
                ServiceError::InvalidState {
                    task_id,
                    status,
                    operation,
                }
            }
            other => other.into(),
        })?;

        let now = Utc::now();
        let change = TaskChange {
            task_id,
            expected_status: task.status,
            status: to,
            start_time: (to == TestTaskStatus::InProgress).then_some(now),
            end_time: (to == TestTaskStatus::Completed).then_some(now),
        };

        let updated = match self.store.apply_task_change(change).await {
            Ok(updated) => updated,
            // Someone else moved it first; report against what they committed
            Err(StoreError::TaskStatusConflict { actual, .. }) => {
                warn!(task_id, observed = %task.status, actual = %actual, "Task update lost a race");
                return Err(ServiceError::InvalidState {
                    task_id,
                    status: actual,
                    operation,
                });
            }
            Err(error) => return Err(error.into()),
        };

        info!(
            task_id,
            from = %task.status,
            to = %to,
            operator_id,
            operation,
            "Test task status changed"
        );
        Ok(updated)
    }
}
