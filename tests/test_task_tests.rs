//! # Test Task Lifecycle Tests

mod common;

use common::*;
use serde_json::json;

use lims_workflow::models::TestTaskFilter;
use lims_workflow::services::{CreateTestTask, ServiceError};
use lims_workflow::state_machine::{TestTaskStatus, WorkflowState};

fn request(workflow_id: i64, tester_id: i64) -> CreateTestTask {
    CreateTestTask {
        workflow_id,
        tester_id,
        test_items: vec![
            json!({"name": "compressive strength", "standard": "GB/T 50081"}),
            json!({"name": "density"}),
        ],
        notes: Some("core 3 of 5".to_string()),
    }
}

#[tokio::test]
async fn test_task_happy_path() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;

    let task = h.tasks.create(request(workflow.id, TESTER), RECEIVER).await.unwrap();
    assert_eq!(task.status, TestTaskStatus::Pending);
    assert_eq!(task.test_items.len(), 2);
    assert_eq!(task.created_by, Some(RECEIVER));
    assert!(task.start_time.is_none());

    let started = h.tasks.start(task.id, TESTER).await.unwrap();
    assert_eq!(started.status, TestTaskStatus::InProgress);
    assert!(started.start_time.is_some());
    assert!(started.end_time.is_none());

    let completed = h.tasks.complete(task.id, TESTER).await.unwrap();
    assert_eq!(completed.status, TestTaskStatus::Completed);
    assert!(completed.end_time.is_some());
    assert_eq!(completed.start_time, started.start_time);
}

#[tokio::test]
async fn test_complete_requires_in_progress() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    let task = h.tasks.create(request(workflow.id, TESTER), RECEIVER).await.unwrap();

    let err = h.tasks.complete(task.id, TESTER).await.unwrap_err();
    match err {
        ServiceError::InvalidState {
            task_id,
            status,
            operation,
        } => {
            assert_eq!(task_id, task.id);
            assert_eq!(status, TestTaskStatus::Pending);
            assert_eq!(operation, "complete");
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }

    h.tasks.start(task.id, TESTER).await.unwrap();
    let err = h.tasks.start(task.id, TESTER).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InvalidState {
            status: TestTaskStatus::InProgress,
            ..
        }
    ));
}

#[tokio::test]
async fn test_cancel_only_open_tasks() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;

    let pending = h.tasks.create(request(workflow.id, TESTER), RECEIVER).await.unwrap();
    let cancelled = h.tasks.cancel(pending.id, RECEIVER).await.unwrap();
    assert_eq!(cancelled.status, TestTaskStatus::Cancelled);
    assert!(matches!(
        h.tasks.start(pending.id, TESTER).await,
        Err(ServiceError::InvalidState { .. })
    ));

    let running = h.tasks.create(request(workflow.id, TESTER), RECEIVER).await.unwrap();
    h.tasks.start(running.id, TESTER).await.unwrap();
    assert_eq!(
        h.tasks.cancel(running.id, RECEIVER).await.unwrap().status,
        TestTaskStatus::Cancelled
    );

    let finished = h.tasks.create(request(workflow.id, TESTER), RECEIVER).await.unwrap();
    h.tasks.start(finished.id, TESTER).await.unwrap();
    h.tasks.complete(finished.id, TESTER).await.unwrap();
    assert!(matches!(
        h.tasks.cancel(finished.id, RECEIVER).await,
        Err(ServiceError::InvalidState {
            status: TestTaskStatus::Completed,
            operation: "cancel",
            ..
        })
    ));
}

#[tokio::test]
async fn test_tasks_ignore_workflow_state() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;
    h.assign_to(workflow.id, TESTER).await;

    let task = h.tasks.create(request(workflow.id, TESTER), RECEIVER).await.unwrap();
    h.tasks.start(task.id, TESTER).await.unwrap();
    h.tasks.complete(task.id, TESTER).await.unwrap();

    let current = h.engine.get(workflow.id).await.unwrap().workflow;
    assert_eq!(current.current_state, WorkflowState::Assigned);
}

#[tokio::test]
async fn test_create_requires_workflow_and_tester() {
    let h = Harness::new();
    let workflow = h.create_workflow(RECEIPT).await;

    assert!(matches!(
        h.tasks.create(request(31337, TESTER), RECEIVER).await,
        Err(ServiceError::NotFound {
            entity: "workflow",
            ..
        })
    ));
    assert!(matches!(
        h.tasks.create(request(workflow.id, 31337), RECEIVER).await,
        Err(ServiceError::NotFound { entity: "user", .. })
    ));
    assert!(matches!(
        h.tasks.get(31337).await,
        Err(ServiceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_task_filters() {
    let h = Harness::new();
    let first = h.create_workflow(RECEIPT).await;
    let second = h.create_workflow(SECOND_RECEIPT).await;

    let a = h.tasks.create(request(first.id, TESTER), RECEIVER).await.unwrap();
    h.tasks.create(request(first.id, OTHER_TESTER), RECEIVER).await.unwrap();
    h.tasks.create(request(second.id, TESTER), RECEIVER).await.unwrap();
    h.tasks.start(a.id, TESTER).await.unwrap();

    let mine = h
        .tasks
        .list(&TestTaskFilter {
            tester_id: Some(TESTER),
            ..TestTaskFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|t| t.tester_id == TESTER));

    let for_first = h
        .tasks
        .list(&TestTaskFilter {
            workflow_id: Some(first.id),
            ..TestTaskFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(for_first.len(), 2);

    let running = h
        .tasks
        .list(&TestTaskFilter {
            status: Some(TestTaskStatus::InProgress),
            ..TestTaskFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, a.id);
}
