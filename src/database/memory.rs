//! In-process [`LimsStore`] for tests, demos and the `memory` backend.
//!
//! All tables sit behind one `parking_lot::Mutex`. Each trait method takes the
//! lock once, validates, then mutates, so a change is all-or-nothing and the
//! compare-and-set semantics match [`PgStore`](super::PgStore). The lock is
//! never held across an `.await`.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::{
    AppliedWorkflowChange, LimsStore, SideEffect, StoreError, StoreResult, TaskChange,
    WorkflowChange,
};
use crate::models::{
    Commission, NewTestTask, NewTransitionLogEntry, NewWorkflowInstance, SampleReceipt, TestTask,
    TestTaskFilter, TransitionLogEntry, TransitionLogFilter, User, WorkflowFilter,
    WorkflowInstance,
};
use crate::state_machine::{TestTaskStatus, WorkflowState};

/// Seed data for the registries the workflow core reads from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub commissions: Vec<Commission>,
    #[serde(default)]
    pub sample_receipts: Vec<SampleReceipt>,
}

impl Fixtures {
    pub fn from_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Fixture(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Fixture(format!("{}: {e}", path.display())))
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    commissions: BTreeMap<i64, Commission>,
    receipts: BTreeMap<i64, SampleReceipt>,
    workflows: BTreeMap<i64, WorkflowInstance>,
    logs: Vec<TransitionLogEntry>,
    tasks: BTreeMap<i64, TestTask>,
    next_workflow_id: i64,
    next_log_id: i64,
    next_task_id: i64,
}

impl Tables {
    fn live_workflow(&self, id: i64) -> Option<&WorkflowInstance> {
        self.workflows.get(&id).filter(|w| !w.is_deleted)
    }

    /// Receipt or commission code contains `term`, ignoring case
    fn matches_search(&self, workflow: &WorkflowInstance, term: &str) -> bool {
        let needle = term.to_lowercase();
        let Some(receipt) = self.receipts.get(&workflow.sample_receipt_id) else {
            return false;
        };
        receipt.receive_code.to_lowercase().contains(&needle)
            || self
                .commissions
                .get(&receipt.commission_id)
                .is_some_and(|c| c.code.to_lowercase().contains(&needle))
    }

    // Mirrors the operator foreign key on the log table
    fn check_operator(&self, entry: &NewTransitionLogEntry) -> StoreResult<()> {
        if self.users.contains_key(&entry.operator_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: "user",
                id: entry.operator_id,
            })
        }
    }

    fn check_side_effect(&self, effect: &SideEffect) -> StoreResult<()> {
        match effect {
            SideEffect::SetCommissionStatus { commission_id, .. } => {
                if !self.commissions.contains_key(commission_id) {
                    return Err(StoreError::NotFound {
                        entity: "commission",
                        id: *commission_id,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_side_effect(&mut self, effect: &SideEffect) {
        match effect {
            SideEffect::SetCommissionStatus {
                commission_id,
                status,
            } => {
                if let Some(commission) = self.commissions.get_mut(commission_id) {
                    commission.status = *status;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixtures(fixtures: Fixtures) -> Self {
        let store = Self::new();
        store.load_fixtures(fixtures);
        store
    }

    pub fn load_fixtures(&self, fixtures: Fixtures) {
        let mut tables = self.tables.lock();
        for user in fixtures.users {
            tables.users.insert(user.id, user);
        }
        for commission in fixtures.commissions {
            tables.commissions.insert(commission.id, commission);
        }
        for receipt in fixtures.sample_receipts {
            tables.receipts.insert(receipt.id, receipt);
        }
    }

    pub fn add_user(&self, user: User) {
        self.tables.lock().users.insert(user.id, user);
    }

    pub fn add_commission(&self, commission: Commission) {
        self.tables.lock().commissions.insert(commission.id, commission);
    }

    pub fn add_sample_receipt(&self, receipt: SampleReceipt) {
        self.tables.lock().receipts.insert(receipt.id, receipt);
    }

    /// Number of audit entries across all workflows
    pub fn transition_log_count(&self) -> usize {
        self.tables.lock().logs.len()
    }
}

#[async_trait]
impl LimsStore for InMemoryStore {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn find_sample_receipt(&self, id: i64) -> StoreResult<Option<SampleReceipt>> {
        Ok(self.tables.lock().receipts.get(&id).cloned())
    }

    async fn find_commission(&self, id: i64) -> StoreResult<Option<Commission>> {
        Ok(self.tables.lock().commissions.get(&id).cloned())
    }

    async fn insert_workflow(&self, new: NewWorkflowInstance) -> StoreResult<WorkflowInstance> {
        let mut tables = self.tables.lock();

        if !tables.receipts.contains_key(&new.sample_receipt_id) {
            return Err(StoreError::NotFound {
                entity: "sample receipt",
                id: new.sample_receipt_id,
            });
        }
        // Unique per receipt, soft-deleted rows included
        if tables
            .workflows
            .values()
            .any(|w| w.sample_receipt_id == new.sample_receipt_id)
        {
            return Err(StoreError::AlreadyExists(format!(
                "sample receipt {} already has a workflow",
                new.sample_receipt_id
            )));
        }

        tables.next_workflow_id += 1;
        let now = Utc::now();
        let workflow = WorkflowInstance {
            id: tables.next_workflow_id,
            sample_receipt_id: new.sample_receipt_id,
            current_state: WorkflowState::Received,
            assignee_id: None,
            priority: new.priority,
            expected_completion_date: new.expected_completion_date,
            actual_completion_date: None,
            notes: new.notes,
            created_by: new.created_by,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        tables.workflows.insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    async fn get_workflow(&self, id: i64) -> StoreResult<Option<WorkflowInstance>> {
        Ok(self.tables.lock().live_workflow(id).cloned())
    }

    async fn list_workflows(&self, filter: &WorkflowFilter) -> StoreResult<Vec<WorkflowInstance>> {
        let tables = self.tables.lock();
        let term = filter.search_term();
        let mut workflows: Vec<WorkflowInstance> = tables
            .workflows
            .values()
            .filter(|w| filter.matches(w))
            .filter(|w| term.map_or(true, |t| tables.matches_search(w, t)))
            .cloned()
            .collect();
        filter.sort(&mut workflows);
        Ok(workflows)
    }

    async fn apply_workflow_change(
        &self,
        change: WorkflowChange,
    ) -> StoreResult<AppliedWorkflowChange> {
        let mut tables = self.tables.lock();

        let current = tables
            .live_workflow(change.workflow_id)
            .map(|w| w.current_state)
            .ok_or(StoreError::NotFound {
                entity: "workflow",
                id: change.workflow_id,
            })?;
        if current != change.expected_state {
            return Err(StoreError::StateConflict {
                workflow_id: change.workflow_id,
                actual: current,
            });
        }
        if let Some(entry) = &change.log_entry {
            tables.check_operator(entry)?;
        }
        for effect in &change.side_effects {
            tables.check_side_effect(effect)?;
        }

        // Validated; nothing below can fail
        let now = Utc::now();
        let update = &change.update;
        let workflow = {
            let Some(workflow) = tables.workflows.get_mut(&change.workflow_id) else {
                return Err(StoreError::NotFound {
                    entity: "workflow",
                    id: change.workflow_id,
                });
            };
            if let Some(state) = update.current_state {
                workflow.current_state = state;
            }
            if let Some(assignee_id) = update.assignee_id {
                workflow.assignee_id = Some(assignee_id);
            }
            if let Some(priority) = update.priority {
                workflow.priority = priority;
            }
            if let Some(date) = update.expected_completion_date {
                workflow.expected_completion_date = Some(date);
            }
            if workflow.actual_completion_date.is_none() {
                workflow.actual_completion_date = update.actual_completion_date;
            }
            workflow.updated_at = now;
            workflow.clone()
        };

        let log_entry = change.log_entry.map(|entry| {
            tables.next_log_id += 1;
            let logged = TransitionLogEntry {
                id: tables.next_log_id,
                workflow_id: entry.workflow_id,
                from_state: entry.from_state,
                to_state: entry.to_state,
                operator_id: entry.operator_id,
                action: entry.action,
                remarks: entry.remarks,
                created_at: now,
            };
            tables.logs.push(logged.clone());
            logged
        });

        for effect in &change.side_effects {
            tables.apply_side_effect(effect);
        }

        Ok(AppliedWorkflowChange {
            workflow,
            log_entry,
        })
    }

    async fn soft_delete_workflow(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        match tables.workflows.get_mut(&id).filter(|w| !w.is_deleted) {
            Some(workflow) => {
                workflow.is_deleted = true;
                workflow.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "workflow",
                id,
            }),
        }
    }

    async fn list_transition_logs(
        &self,
        filter: &TransitionLogFilter,
    ) -> StoreResult<Vec<TransitionLogEntry>> {
        let tables = self.tables.lock();
        let mut entries: Vec<TransitionLogEntry> = tables
            .logs
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        entries.sort_by(TransitionLogEntry::newest_first);
        Ok(entries)
    }

    async fn insert_test_task(&self, new: NewTestTask) -> StoreResult<TestTask> {
        let mut tables = self.tables.lock();

        tables.next_task_id += 1;
        let now = Utc::now();
        let task = TestTask {
            id: tables.next_task_id,
            workflow_id: new.workflow_id,
            tester_id: new.tester_id,
            test_items: new.test_items,
            status: TestTaskStatus::Pending,
            start_time: None,
            end_time: None,
            notes: new.notes,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_test_task(&self, id: i64) -> StoreResult<Option<TestTask>> {
        Ok(self.tables.lock().tasks.get(&id).cloned())
    }

    async fn list_test_tasks(&self, filter: &TestTaskFilter) -> StoreResult<Vec<TestTask>> {
        let tables = self.tables.lock();
        let mut tasks: Vec<TestTask> = tables
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn apply_task_change(&self, change: TaskChange) -> StoreResult<TestTask> {
        let mut tables = self.tables.lock();
        let task = tables
            .tasks
            .get_mut(&change.task_id)
            .ok_or(StoreError::NotFound {
                entity: "test task",
                id: change.task_id,
            })?;

        if task.status != change.expected_status {
            return Err(StoreError::TaskStatusConflict {
                task_id: change.task_id,
                actual: task.status,
            });
        }

        task.status = change.status;
        if change.start_time.is_some() {
            task.start_time = change.start_time;
        }
        if change.end_time.is_some() {
            task.end_time = change.end_time;
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
