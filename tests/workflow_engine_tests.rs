//! # Workflow Engine Integration Tests
//!
//! Engine behaviour against the in-memory store: the transition table, the
//! audit trail, assignment, the commission reaction and soft deletion.

mod common;

use chrono::NaiveDate;
use common::*;

use lims_workflow::database::LimsStore;
use lims_workflow::models::{
    CommissionStatus, SampleReceipt, TransitionLogFilter, WorkflowFilter,
};
use lims_workflow::services::{Assignment, CreateWorkflow, ServiceError};
use lims_workflow::state_machine::{ActionKind, Priority, WorkflowState};

#[tokio::test]
async fn test_full_lifecycle_completes_commission() {
    use WorkflowState::*;

    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    assert_eq!(workflow.current_state, Received);
    assert_eq!(workflow.priority, Priority::Normal);

    let done = h.walk(workflow.id, &path_to(Completed)).await;
    assert_eq!(done.current_state, Completed);
    assert!(done.actual_completion_date.is_some());

    let commission = h.store.find_commission(COMMISSION).await.unwrap().unwrap();
    assert_eq!(commission.status, CommissionStatus::Completed);

    // The other commission is untouched
    let other = h.store.find_commission(COMMISSION + 1).await.unwrap().unwrap();
    assert_eq!(other.status, CommissionStatus::Received);

    let detail = h.engine.get(workflow.id).await.unwrap();
    let actions: Vec<ActionKind> = detail.logs.iter().map(|l| l.action).collect();
    assert_eq!(
        actions,
        vec![
            ActionKind::Approve,
            ActionKind::Review,
            ActionKind::Submit,
            ActionKind::Submit,
            ActionKind::Complete,
            ActionKind::Start,
            ActionKind::Assign,
        ]
    );
    assert_eq!(detail.logs[0].from_state, UnderApproval);
    assert_eq!(detail.logs[0].to_state, Completed);
    assert_eq!(detail.logs[0].operator_id, ADMIN);
}

#[tokio::test]
async fn test_transition_message_and_log_entry() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    h.assign_to(workflow.id, TESTER).await;

    let outcome = h
        .engine
        .transition(
            workflow.id,
            WorkflowState::Testing,
            TESTER,
            Some("  starting compression test ".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(outcome.message, "status updated to \"Testing\"");
    let entry = outcome.log_entry.expect("transition logs an entry");
    assert_eq!(entry.from_state, WorkflowState::Assigned);
    assert_eq!(entry.to_state, WorkflowState::Testing);
    assert_eq!(entry.action, ActionKind::Start);
    assert_eq!(entry.remarks.as_deref(), Some("starting compression test"));
    assert_eq!(entry.operator_id, TESTER);
}

#[tokio::test]
async fn test_invalid_transition_changes_nothing() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    h.walk(workflow.id, &path_to(WorkflowState::Testing)).await;
    let logs_before = h.store.transition_log_count();

    let err = h
        .engine
        .transition(workflow.id, WorkflowState::Completed, ADMIN, None)
        .await
        .unwrap_err();

    match err {
        ServiceError::InvalidTransition { from, to } => {
            assert_eq!(from, WorkflowState::Testing);
            assert_eq!(to, WorkflowState::Completed);
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }

    let current = h.engine.get(workflow.id).await.unwrap().workflow;
    assert_eq!(current.current_state, WorkflowState::Testing);
    assert_eq!(h.store.transition_log_count(), logs_before);
}

#[tokio::test]
async fn test_report_editing_cannot_be_rejected() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    h.walk(workflow.id, &path_to(WorkflowState::ReportEditing)).await;

    let err = h
        .engine
        .transition(workflow.id, WorkflowState::Rejected, REVIEWER, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_completed_is_terminal() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    h.walk(workflow.id, &path_to(WorkflowState::Completed)).await;

    for to in WorkflowState::ALL {
        let result = h.engine.transition(workflow.id, to, ADMIN, None).await;
        assert!(
            matches!(result, Err(ServiceError::InvalidTransition { .. })),
            "completed -> {to} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_rejected_workflow_can_be_reassigned() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    h.walk(workflow.id, &path_to(WorkflowState::UnderReview)).await;

    let rejected = h
        .engine
        .transition(
            workflow.id,
            WorkflowState::Rejected,
            REVIEWER,
            Some("figures do not match raw data".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.workflow.current_state, WorkflowState::Rejected);
    assert_eq!(
        rejected.log_entry.map(|l| l.action),
        Some(ActionKind::Reject)
    );

    // assign does not move a rejected workflow; only the transition does
    let reassigned = h.assign_to(workflow.id, OTHER_TESTER).await;
    assert_eq!(reassigned.current_state, WorkflowState::Rejected);
    assert_eq!(reassigned.assignee_id, Some(OTHER_TESTER));

    let back = h.walk(workflow.id, &[WorkflowState::Assigned]).await;
    assert_eq!(back.current_state, WorkflowState::Assigned);
}

#[tokio::test]
async fn test_assign_from_received_moves_and_logs_default_remark() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    let due = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();

    let outcome = h
        .engine
        .assign(
            workflow.id,
            Assignment {
                assignee_id: TESTER,
                priority: Some(Priority::Urgent),
                expected_completion_date: Some(due),
                remarks: None,
            },
            RECEIVER,
        )
        .await
        .unwrap();

    assert_eq!(outcome.message, "assigned to tester.li");
    assert_eq!(outcome.workflow.current_state, WorkflowState::Assigned);
    assert_eq!(outcome.workflow.assignee_id, Some(TESTER));
    assert_eq!(outcome.workflow.priority, Priority::Urgent);
    assert_eq!(outcome.workflow.expected_completion_date, Some(due));

    let entry = outcome.log_entry.expect("received -> assigned is logged");
    assert_eq!(entry.action, ActionKind::Assign);
    assert_eq!(entry.operator_id, RECEIVER);
    assert_eq!(entry.remarks.as_deref(), Some("assigned to tester.li"));
}

#[tokio::test]
async fn test_assign_keeps_explicit_remarks() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;

    let outcome = h
        .engine
        .assign(
            workflow.id,
            Assignment {
                assignee_id: TESTER,
                priority: None,
                expected_completion_date: None,
                remarks: Some("rush job".to_string()),
            },
            RECEIVER,
        )
        .await
        .unwrap();
    assert_eq!(
        outcome.log_entry.and_then(|l| l.remarks).as_deref(),
        Some("rush job")
    );
}

#[tokio::test]
async fn test_assign_outside_received_only_updates_fields() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    h.walk(workflow.id, &path_to(WorkflowState::Testing)).await;
    let logs_before = h.store.transition_log_count();

    let outcome = h
        .engine
        .assign(
            workflow.id,
            Assignment {
                assignee_id: OTHER_TESTER,
                priority: Some(Priority::Critical),
                expected_completion_date: None,
                remarks: Some("handover".to_string()),
            },
            ADMIN,
        )
        .await
        .unwrap();

    assert_eq!(outcome.workflow.current_state, WorkflowState::Testing);
    assert_eq!(outcome.workflow.assignee_id, Some(OTHER_TESTER));
    assert_eq!(outcome.workflow.priority, Priority::Critical);
    assert!(outcome.log_entry.is_none());
    assert_eq!(h.store.transition_log_count(), logs_before);
}

#[tokio::test]
async fn test_assign_unknown_user_or_workflow() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;

    let assignment = |assignee_id| Assignment {
        assignee_id,
        priority: None,
        expected_completion_date: None,
        remarks: None,
    };

    let err = h
        .engine
        .assign(workflow.id, assignment(9999), RECEIVER)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "user", id: 9999 }));

    let err = h
        .engine
        .assign(4242, assignment(TESTER), RECEIVER)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "workflow", id: 4242 }));

    // Nothing was written by either failure
    let current = h.engine.get(workflow.id).await.unwrap().workflow;
    assert_eq!(current.current_state, WorkflowState::Received);
    assert_eq!(current.assignee_id, None);
}

#[tokio::test]
async fn test_my_tasks_lists_open_work_most_urgent_first() {
    let h = Harness::new();
    let first = h.create_workflow(RECEIPT).await;
    let second = h.create_workflow(SECOND_RECEIPT).await;

    h.assign_to(first.id, TESTER).await;
    h.engine
        .assign(
            second.id,
            Assignment {
                assignee_id: TESTER,
                priority: Some(Priority::Critical),
                expected_completion_date: None,
                remarks: None,
            },
            RECEIVER,
        )
        .await
        .unwrap();

    let mine = h.engine.my_tasks(TESTER).await.unwrap();
    let ids: Vec<i64> = mine.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    assert!(h.engine.my_tasks(OTHER_TESTER).await.unwrap().is_empty());

    // Finished work drops out
    h.walk(second.id, &path_to(WorkflowState::Completed)[1..]).await;
    let mine = h.engine.my_tasks(TESTER).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, first.id);
}

#[tokio::test]
async fn test_one_workflow_per_receipt() {
    let h = Harness::new();
    h.create_workflow(RECEIPT).await;

    let err = h
        .engine
        .create_for_receipt(
            CreateWorkflow {
                sample_receipt_id: RECEIPT,
                priority: None,
                expected_completion_date: None,
                notes: None,
            },
            RECEIVER,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyExists(_)));

    let err = h
        .engine
        .create_for_receipt(
            CreateWorkflow {
                sample_receipt_id: 777,
                priority: None,
                expected_completion_date: None,
                notes: None,
            },
            RECEIVER,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound {
            entity: "sample receipt",
            ..
        }
    ));
}

#[tokio::test]
async fn test_soft_deleted_workflow_disappears() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    h.assign_to(workflow.id, TESTER).await;

    h.engine.soft_delete(workflow.id, ADMIN).await.unwrap();

    assert!(matches!(
        h.engine.get(workflow.id).await,
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        h.engine
            .transition(workflow.id, WorkflowState::Testing, TESTER, None)
            .await,
        Err(ServiceError::NotFound { .. })
    ));
    assert!(h
        .engine
        .list(&WorkflowFilter::default())
        .await
        .unwrap()
        .is_empty());
    assert!(h.engine.my_tasks(TESTER).await.unwrap().is_empty());
    assert!(matches!(
        h.engine.soft_delete(workflow.id, ADMIN).await,
        Err(ServiceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_completion_without_commission_rolls_back() {
    let h = Harness::new();
    h.store.add_sample_receipt(SampleReceipt {
        id: 900,
        commission_id: 9_999,
        receive_code: "SR-ORPHAN".to_string(),
        receiver_id: RECEIVER,
        received_at: chrono::Utc::now(),
    });
    let workflow = h.create_workflow(900).await;
    h.walk(workflow.id, &path_to(WorkflowState::UnderApproval)).await;
    let logs_before = h.store.transition_log_count();

    let err = h
        .engine
        .transition(workflow.id, WorkflowState::Completed, APPROVER, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound {
            entity: "commission",
            ..
        }
    ));

    let current = h.engine.get(workflow.id).await.unwrap().workflow;
    assert_eq!(current.current_state, WorkflowState::UnderApproval);
    assert!(current.actual_completion_date.is_none());
    assert_eq!(h.store.transition_log_count(), logs_before);
}

#[tokio::test]
async fn test_events_published_after_commit() {
    let h = Harness::new();
    let mut events = h.publisher.subscribe();
    let workflow = h.create_workflow(RECEIPT).await;

    h.assign_to(workflow.id, TESTER).await;
    let first = events.recv().await.unwrap();
    assert_eq!(first.name, "workflow.assigned");
    let second = events.recv().await.unwrap();
    assert_eq!(second.name, "workflow.transitioned");

    h.walk(workflow.id, &path_to(WorkflowState::Completed)[1..]).await;
    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.name);
    }
    assert_eq!(names.last().map(String::as_str), Some("workflow.completed"));
    assert_eq!(
        names.iter().filter(|n| *n == "workflow.transitioned").count(),
        6
    );
}

#[tokio::test]
async fn test_log_filters() {
    let h = Harness::new();
    let first = h.create_workflow(RECEIPT).await;
    let second = h.create_workflow(SECOND_RECEIPT).await;
    h.assign_to(first.id, TESTER).await;
    h.walk(second.id, &path_to(WorkflowState::Rejected)).await;

    let for_second = h
        .engine
        .list_logs(&TransitionLogFilter::for_workflow(second.id))
        .await
        .unwrap();
    assert_eq!(for_second.len(), 2);
    assert_eq!(for_second[0].action, ActionKind::Reject);

    let assigns = h
        .engine
        .list_logs(&TransitionLogFilter {
            action: Some(ActionKind::Assign),
            ..TransitionLogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(assigns.len(), 2);

    let by_receiver = h
        .engine
        .list_logs(&TransitionLogFilter {
            operator_id: Some(RECEIVER),
            ..TransitionLogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_receiver.len(), 1);
    assert_eq!(by_receiver[0].workflow_id, first.id);
}
