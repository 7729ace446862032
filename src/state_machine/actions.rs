use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ParseStateError;
use super::states::WorkflowState;

/// Audit classification of a transition, derived from its target state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Assign,
    Start,
    Complete,
    Submit,
    Review,
    Approve,
    Reject,
    Other,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        Self::Assign,
        Self::Start,
        Self::Complete,
        Self::Submit,
        Self::Review,
        Self::Approve,
        Self::Reject,
        Self::Other,
    ];

    /// Fixed mapping from the transition's target state
    pub fn for_target(to: WorkflowState) -> Self {
        match to {
            WorkflowState::Assigned => Self::Assign,
            WorkflowState::Testing => Self::Start,
            WorkflowState::TestCompleted => Self::Complete,
            WorkflowState::ReportEditing | WorkflowState::UnderReview => Self::Submit,
            WorkflowState::UnderApproval => Self::Review,
            WorkflowState::Completed => Self::Approve,
            WorkflowState::Rejected => Self::Reject,
            WorkflowState::Received => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Submit => "submit",
            Self::Review => "review",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Assign => "Assign",
            Self::Start => "Start testing",
            Self::Complete => "Complete testing",
            Self::Submit => "Submit",
            Self::Review => "Review",
            Self::Approve => "Approve",
            Self::Reject => "Reject",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ParseStateError::new("action kind", s))
    }
}
