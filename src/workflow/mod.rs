pub mod state;

pub use state::{StepPlan, WorkflowState, WorkflowStatus};
