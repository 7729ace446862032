use crate::database::SideEffect;
use crate::models::CommissionStatus;
use crate::state_machine::WorkflowEvent;

/// Commission-side reaction to workflow events.
///
/// The engine never writes commission rows directly. It hands its events to
/// this consumer, and the returned side effects travel inside the same atomic
/// change as the workflow update that produced them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommissionLifecycle;

impl CommissionLifecycle {
    pub fn on_event(&self, event: &WorkflowEvent) -> Option<SideEffect> {
        match event {
            WorkflowEvent::Completed { commission_id, .. } => {
                Some(SideEffect::SetCommissionStatus {
                    commission_id: *commission_id,
                    status: CommissionStatus::Completed,
                })
            }
            WorkflowEvent::Transitioned { .. } | WorkflowEvent::Assigned { .. } => None,
        }
    }

    pub fn side_effects_for(&self, events: &[WorkflowEvent]) -> Vec<SideEffect> {
        events.iter().filter_map(|event| self.on_event(event)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{ActionKind, WorkflowState};
    use chrono::NaiveDate;

    #[test]
    fn test_only_completion_touches_commission() {
        let lifecycle = CommissionLifecycle;
        let events = vec![
            WorkflowEvent::Transitioned {
                workflow_id: 1,
                from: WorkflowState::UnderApproval,
                to: WorkflowState::Completed,
                action: ActionKind::Approve,
                operator_id: 7,
            },
            WorkflowEvent::Completed {
                workflow_id: 1,
                sample_receipt_id: 3,
                commission_id: 42,
                completed_on: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            },
        ];

        assert_eq!(
            lifecycle.side_effects_for(&events),
            vec![SideEffect::SetCommissionStatus {
                commission_id: 42,
                status: CommissionStatus::Completed,
            }]
        );
    }
}
