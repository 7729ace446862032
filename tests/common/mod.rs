//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use lims_workflow::config::LimsConfig;
use lims_workflow::database::{Fixtures, InMemoryStore, LimsStore};
use lims_workflow::events::EventPublisher;
use lims_workflow::models::{Commission, CommissionStatus, Role, SampleReceipt, User, WorkflowInstance};
use lims_workflow::services::{Assignment, CreateWorkflow, TestTaskService, WorkflowEngine};
use lims_workflow::state_machine::WorkflowState;

pub const ADMIN: i64 = 1;
pub const RECEIVER: i64 = 2;
pub const TESTER: i64 = 3;
pub const OTHER_TESTER: i64 = 4;
pub const REVIEWER: i64 = 5;
pub const APPROVER: i64 = 6;
pub const CLIENT: i64 = 7;
pub const INACTIVE: i64 = 8;

pub const COMMISSION: i64 = 100;
pub const RECEIPT: i64 = 500;
pub const SECOND_RECEIPT: i64 = 501;

fn user(id: i64, username: &str, role: Role, is_active: bool) -> User {
    User {
        id,
        username: username.to_string(),
        role,
        is_active,
    }
}

pub fn fixtures() -> Fixtures {
    let received_at = Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap();
    Fixtures {
        users: vec![
            user(ADMIN, "admin", Role::Admin, true),
            user(RECEIVER, "reception", Role::Receiver, true),
            user(TESTER, "tester.li", Role::Tester, true),
            user(OTHER_TESTER, "tester.wang", Role::Tester, true),
            user(REVIEWER, "reviewer", Role::Reviewer, true),
            user(APPROVER, "approver", Role::Approver, true),
            user(CLIENT, "client", Role::Client, true),
            user(INACTIVE, "former.staff", Role::Tester, false),
        ],
        commissions: vec![
            Commission {
                id: COMMISSION,
                code: "WT-2026-0001".to_string(),
                sample_name: "Concrete core C30".to_string(),
                status: CommissionStatus::Received,
            },
            Commission {
                id: COMMISSION + 1,
                code: "WT-2026-0002".to_string(),
                sample_name: "Rebar HRB400".to_string(),
                status: CommissionStatus::Received,
            },
        ],
        sample_receipts: vec![
            SampleReceipt {
                id: RECEIPT,
                commission_id: COMMISSION,
                receive_code: "SR-0001".to_string(),
                receiver_id: RECEIVER,
                received_at,
            },
            SampleReceipt {
                id: SECOND_RECEIPT,
                commission_id: COMMISSION + 1,
                receive_code: "SR-0002".to_string(),
                receiver_id: RECEIVER,
                received_at,
            },
        ],
    }
}

pub fn seeded_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::with_fixtures(fixtures()))
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub engine: WorkflowEngine,
    pub tasks: TestTaskService,
    pub publisher: EventPublisher,
}

impl Harness {
    pub fn new() -> Self {
        Self::new_on(seeded_store())
    }

    pub fn new_on(store: Arc<InMemoryStore>) -> Self {
        let publisher = EventPublisher::new(64);
        let dyn_store: Arc<dyn LimsStore> = store.clone();
        Self {
            engine: WorkflowEngine::new(dyn_store.clone(), publisher.clone()),
            tasks: TestTaskService::new(dyn_store),
            store,
            publisher,
        }
    }

    pub async fn create_workflow(&self, receipt_id: i64) -> WorkflowInstance {
        self.engine
            .create_for_receipt(
                CreateWorkflow {
                    sample_receipt_id: receipt_id,
                    priority: None,
                    expected_completion_date: None,
                    notes: None,
                },
                RECEIVER,
            )
            .await
            .expect("workflow created")
    }

    pub async fn assign_to(&self, workflow_id: i64, assignee_id: i64) -> WorkflowInstance {
        self.engine
            .assign(
                workflow_id,
                Assignment {
                    assignee_id,
                    priority: None,
                    expected_completion_date: None,
                    remarks: None,
                },
                RECEIVER,
            )
            .await
            .expect("workflow assigned")
            .workflow
    }

    /// Drive a workflow through `path` with the admin as operator
    pub async fn walk(&self, workflow_id: i64, path: &[WorkflowState]) -> WorkflowInstance {
        let mut last = None;
        for &to in path {
            let outcome = self
                .engine
                .transition(workflow_id, to, ADMIN, None)
                .await
                .unwrap_or_else(|e| panic!("transition to {to} failed: {e}"));
            last = Some(outcome.workflow);
        }
        last.expect("non-empty path")
    }
}

/// The states before `target` on the main line, starting after `Received`
pub fn path_to(target: WorkflowState) -> Vec<WorkflowState> {
    use WorkflowState::*;

    let main_line = [
        Assigned,
        Testing,
        TestCompleted,
        ReportEditing,
        UnderReview,
        UnderApproval,
        Completed,
    ];
    match target {
        Received => vec![],
        Rejected => vec![Assigned, Rejected],
        other => {
            let end = main_line.iter().position(|s| *s == other).unwrap_or(0);
            main_line[..=end].to_vec()
        }
    }
}

pub fn test_config() -> LimsConfig {
    LimsConfig::default()
}
