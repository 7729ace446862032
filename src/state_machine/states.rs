use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ParseStateError;

/// Lifecycle state of a sample workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Sample receipt recorded, nobody assigned yet
    Received,
    /// A responsible person has been assigned
    Assigned,
    /// Testing is under way
    Testing,
    /// All tests finished
    TestCompleted,
    /// Report is being written
    ReportEditing,
    /// Report submitted for review
    UnderReview,
    /// Review passed, waiting for approval
    UnderApproval,
    /// Report approved; terminal
    Completed,
    /// Sent back; can be re-assigned
    Rejected,
}

impl WorkflowState {
    /// All states in declaration order
    pub const ALL: [WorkflowState; 9] = [
        Self::Received,
        Self::Assigned,
        Self::Testing,
        Self::TestCompleted,
        Self::ReportEditing,
        Self::UnderReview,
        Self::UnderApproval,
        Self::Completed,
        Self::Rejected,
    ];

    /// States in which a workflow counts as open work for its assignee
    pub const ACTIVE: [WorkflowState; 6] = [
        Self::Assigned,
        Self::Testing,
        Self::TestCompleted,
        Self::ReportEditing,
        Self::UnderReview,
        Self::UnderApproval,
    ];

    /// Storage and wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Assigned => "assigned",
            Self::Testing => "testing",
            Self::TestCompleted => "test_completed",
            Self::ReportEditing => "report_editing",
            Self::UnderReview => "under_review",
            Self::UnderApproval => "under_approval",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Assigned => "Assigned",
            Self::Testing => "Testing",
            Self::TestCompleted => "Test completed",
            Self::ReportEditing => "Report editing",
            Self::UnderReview => "Under review",
            Self::UnderApproval => "Under approval",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
        }
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if the workflow is open work for its assignee
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::Received
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ParseStateError::new("workflow state", s))
    }
}

/// Status of a test task; independent from the owning workflow's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestTaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TestTaskStatus {
    pub const ALL: [TestTaskStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl Default for TestTaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TestTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestTaskStatus {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStateError::new("test task status", s))
    }
}

/// Workflow priority. Ordered so that `Critical > Urgent > Normal`.
///
/// Travels as the integers 1, 2 and 3 on the wire and in storage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "i16", into = "i16")]
pub enum Priority {
    Normal,
    Urgent,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::Normal, Self::Urgent, Self::Critical];

    pub fn value(&self) -> i16 {
        match self {
            Self::Normal => 1,
            Self::Urgent => 2,
            Self::Critical => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Urgent => "Urgent",
            Self::Critical => "Critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<Priority> for i16 {
    fn from(priority: Priority) -> Self {
        priority.value()
    }
}

impl TryFrom<i16> for Priority {
    type Error = ParseStateError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Normal),
            2 => Ok(Self::Urgent),
            3 => Ok(Self::Critical),
            other => Err(ParseStateError::new("priority", other.to_string())),
        }
    }
}
