// Sample workflow state machine
//
// The lifecycle of a sample moving through receipt, testing, report authoring,
// review and approval, plus the small independent lifecycle of test tasks.

pub mod actions;
pub mod errors;
pub mod events;
pub mod states;
pub mod transitions;

pub use actions::ActionKind;
pub use errors::{ParseStateError, StateMachineError, StateMachineResult};
pub use events::WorkflowEvent;
pub use states::{Priority, TestTaskStatus, WorkflowState};
pub use transitions::{allowed_targets, can_transition, validate_task_transition, validate_transition};
