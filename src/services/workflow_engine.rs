//! # Workflow Engine
//!
//! Owns `current_state` for every workflow instance. Each operation reads the
//! workflow, validates against the transition table, then submits one
//! [`WorkflowChange`] whose conditional write is keyed on the state it read.
//! The state update, the audit entry and any commission side effect commit
//! together or not at all; events are published only after the commit.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::commission::CommissionLifecycle;
use super::errors::{ServiceError, ServiceResult};
use crate::database::{
    AppliedWorkflowChange, LimsStore, StoreError, WorkflowChange, WorkflowUpdate,
};
use crate::events::EventPublisher;
use crate::models::{
    NewTransitionLogEntry, NewWorkflowInstance, TransitionLogEntry, TransitionLogFilter, User,
    WorkflowFilter, WorkflowInstance,
};
use crate::state_machine::{validate_transition, Priority, WorkflowEvent, WorkflowState};

const DEFAULT_ASSIGN_RETRY_LIMIT: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkflow {
    pub sample_receipt_id: i64,
    pub priority: Option<Priority>,
    pub expected_completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignee_id: i64,
    pub priority: Option<Priority>,
    pub expected_completion_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

/// Result of a state-changing call: the committed row and a display message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowOutcome {
    pub workflow: WorkflowInstance,
    /// Audit entry written by this call, if any
    pub log_entry: Option<TransitionLogEntry>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowDetail {
    #[serde(flatten)]
    pub workflow: WorkflowInstance,
    /// Newest first
    pub logs: Vec<TransitionLogEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateOption {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityOption {
    pub value: i16,
    pub label: &'static str,
}

#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn LimsStore>,
    publisher: EventPublisher,
    commissions: CommissionLifecycle,
    assign_retry_limit: u32,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn LimsStore>, publisher: EventPublisher) -> Self {
        Self {
            store,
            publisher,
            commissions: CommissionLifecycle,
            assign_retry_limit: DEFAULT_ASSIGN_RETRY_LIMIT,
        }
    }

    pub fn with_assign_retry_limit(mut self, limit: u32) -> Self {
        self.assign_retry_limit = limit.max(1);
        self
    }

    /// Move a workflow to `to`, recording who did it and why.
    ///
    /// A caller that loses a race against a concurrent writer gets
    /// `InvalidTransition` naming the state that writer committed; the call
    /// is not retried.
    #[instrument(skip(self, remarks))]
    pub async fn transition(
        &self,
        workflow_id: i64,
        to: WorkflowState,
        operator_id: i64,
        remarks: Option<String>,
    ) -> ServiceResult<WorkflowOutcome> {
        let workflow = self.load(workflow_id).await?;
        let from = workflow.current_state;
        validate_transition(from, to)?;

        let mut update = WorkflowUpdate {
            current_state: Some(to),
            ..WorkflowUpdate::default()
        };
        let log_entry = NewTransitionLogEntry::new(
            workflow_id,
            from,
            to,
            operator_id,
            normalize(remarks),
        );
        let mut events = vec![WorkflowEvent::Transitioned {
            workflow_id,
            from,
            to,
            action: log_entry.action,
            operator_id,
        }];

        if to == WorkflowState::Completed {
            let completed_on = Utc::now().date_naive();
            let receipt = self
                .store
                .find_sample_receipt(workflow.sample_receipt_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::not_found("sample receipt", workflow.sample_receipt_id)
                })?;
            update.actual_completion_date = Some(completed_on);
            events.push(WorkflowEvent::Completed {
                workflow_id,
                sample_receipt_id: receipt.id,
                commission_id: receipt.commission_id,
                completed_on,
            });
        }

        let change = WorkflowChange {
            workflow_id,
            expected_state: from,
            update,
            log_entry: Some(log_entry),
            side_effects: self.commissions.side_effects_for(&events),
        };

        let applied = match self.store.apply_workflow_change(change).await {
            Ok(applied) => applied,
            Err(StoreError::StateConflict { actual, .. }) => {
                warn!(
                    workflow_id,
                    observed = %from,
                    actual = %actual,
                    "Transition lost a concurrent update"
                );
                return Err(ServiceError::InvalidTransition { from: actual, to });
            }
            Err(error) => return Err(error.into()),
        };

        self.publish(&events);
        info!(
            workflow_id,
            from = %from,
            to = %to,
            operator_id,
            "Workflow transitioned"
        );

        Ok(WorkflowOutcome {
            message: format!("status updated to \"{}\"", to.label()),
            workflow: applied.workflow,
            log_entry: applied.log_entry,
        })
    }

    /// Set the responsible person, and for a freshly received sample also move
    /// it to `Assigned` with an audit entry. In any other state only the
    /// assignment fields change and nothing is logged.
    #[instrument(skip(self, assignment), fields(assignee_id = assignment.assignee_id))]
    pub async fn assign(
        &self,
        workflow_id: i64,
        assignment: Assignment,
        operator_id: i64,
    ) -> ServiceResult<WorkflowOutcome> {
        let mut workflow = self.load(workflow_id).await?;
        let assignee = self.user(assignment.assignee_id).await?;
        let remarks = normalize(assignment.remarks.clone());

        for attempt in 1..=self.assign_retry_limit {
            match self
                .try_assign(&workflow, &assignee, &assignment, remarks.clone(), operator_id)
                .await
            {
                Ok((applied, events)) => {
                    self.publish(&events);
                    info!(
                        workflow_id,
                        assignee = %assignee.username,
                        moved = applied.log_entry.is_some(),
                        "Workflow assigned"
                    );
                    return Ok(WorkflowOutcome {
                        message: format!("assigned to {}", assignee.username),
                        workflow: applied.workflow,
                        log_entry: applied.log_entry,
                    });
                }
                Err(StoreError::StateConflict { actual, .. }) => {
                    debug!(
                        workflow_id,
                        attempt,
                        observed = %workflow.current_state,
                        actual = %actual,
                        "Assignment raced a state change, re-reading"
                    );
                    workflow = self.load(workflow_id).await?;
                }
                Err(error) => return Err(error.into()),
            }
        }

        warn!(
            workflow_id,
            attempts = self.assign_retry_limit,
            "Assignment abandoned after repeated concurrent updates"
        );
        Err(ServiceError::Conflict(format!(
            "workflow {workflow_id} kept changing state; assignment was not applied"
        )))
    }

    async fn try_assign(
        &self,
        workflow: &WorkflowInstance,
        assignee: &User,
        assignment: &Assignment,
        remarks: Option<String>,
        operator_id: i64,
    ) -> Result<(AppliedWorkflowChange, Vec<WorkflowEvent>), StoreError> {
        let from = workflow.current_state;
        let moves = from == WorkflowState::Received;
        let to = WorkflowState::Assigned;

        let mut events = vec![WorkflowEvent::Assigned {
            workflow_id: workflow.id,
            assignee_id: assignee.id,
            operator_id,
        }];

        let log_entry = if moves {
            let entry = NewTransitionLogEntry::new(
                workflow.id,
                from,
                to,
                operator_id,
                Some(remarks.unwrap_or_else(|| format!("assigned to {}", assignee.username))),
            );
            events.push(WorkflowEvent::Transitioned {
                workflow_id: workflow.id,
                from,
                to,
                action: entry.action,
                operator_id,
            });
            Some(entry)
        } else {
            None
        };

        let change = WorkflowChange {
            workflow_id: workflow.id,
            expected_state: from,
            update: WorkflowUpdate {
                current_state: moves.then_some(to),
                assignee_id: Some(assignee.id),
                priority: assignment.priority,
                expected_completion_date: assignment.expected_completion_date,
                actual_completion_date: None,
            },
            log_entry,
            side_effects: self.commissions.side_effects_for(&events),
        };

        let applied = self.store.apply_workflow_change(change).await?;
        Ok((applied, events))
    }

    /// Open work for one user, most urgent first
    pub async fn my_tasks(&self, user_id: i64) -> ServiceResult<Vec<WorkflowInstance>> {
        Ok(self
            .store
            .list_workflows(&WorkflowFilter::active_for(user_id))
            .await?)
    }

    /// Start tracking a received sample; the new workflow is `Received`
    pub async fn create_for_receipt(
        &self,
        request: CreateWorkflow,
        operator_id: i64,
    ) -> ServiceResult<WorkflowInstance> {
        if self
            .store
            .find_sample_receipt(request.sample_receipt_id)
            .await?
            .is_none()
        {
            return Err(ServiceError::not_found(
                "sample receipt",
                request.sample_receipt_id,
            ));
        }

        let workflow = self
            .store
            .insert_workflow(NewWorkflowInstance {
                sample_receipt_id: request.sample_receipt_id,
                priority: request.priority.unwrap_or_default(),
                expected_completion_date: request.expected_completion_date,
                notes: normalize(request.notes),
                created_by: Some(operator_id),
            })
            .await?;

        info!(
            workflow_id = workflow.id,
            sample_receipt_id = workflow.sample_receipt_id,
            operator_id,
            "Workflow created"
        );
        Ok(workflow)
    }

    pub async fn get(&self, workflow_id: i64) -> ServiceResult<WorkflowDetail> {
        let workflow = self.load(workflow_id).await?;
        let logs = self
            .store
            .list_transition_logs(&TransitionLogFilter::for_workflow(workflow_id))
            .await?;
        Ok(WorkflowDetail { workflow, logs })
    }

    pub async fn list(&self, filter: &WorkflowFilter) -> ServiceResult<Vec<WorkflowInstance>> {
        Ok(self.store.list_workflows(filter).await?)
    }

    pub async fn list_logs(
        &self,
        filter: &TransitionLogFilter,
    ) -> ServiceResult<Vec<TransitionLogEntry>> {
        Ok(self.store.list_transition_logs(filter).await?)
    }

    pub async fn soft_delete(&self, workflow_id: i64, operator_id: i64) -> ServiceResult<()> {
        self.store.soft_delete_workflow(workflow_id).await?;
        info!(workflow_id, operator_id, "Workflow soft-deleted");
        Ok(())
    }

    pub fn status_options() -> Vec<StateOption> {
        WorkflowState::ALL
            .iter()
            .map(|state| StateOption {
                value: state.as_str(),
                label: state.label(),
            })
            .collect()
    }

    pub fn priority_options() -> Vec<PriorityOption> {
        Priority::ALL
            .iter()
            .map(|priority| PriorityOption {
                value: priority.value(),
                label: priority.label(),
            })
            .collect()
    }

    async fn load(&self, workflow_id: i64) -> ServiceResult<WorkflowInstance> {
        self.store
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("workflow", workflow_id))
    }

    async fn user(&self, user_id: i64) -> ServiceResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))
    }

    fn publish(&self, events: &[WorkflowEvent]) {
        for event in events {
            if let Err(error) = self.publisher.publish_workflow_event(event) {
                warn!(event = event.event_name(), %error, "Failed to publish workflow event");
            }
        }
    }
}

/// Blank remarks and notes are stored as absent
fn normalize(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
