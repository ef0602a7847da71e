//! The two end-to-end workflows and their observable lifecycle.
//!
//! [`create::CreateWorkflow`] turns semi-structured text into a rendered
//! deck; [`convert::ConvertWorkflow`] turns scanned page images into one.
//! Both drive the same stages from [`crate::pipeline`] and surface progress
//! through [`WorkflowState`].

use std::sync::Mutex;

pub mod convert;
pub mod create;

/// Lifecycle of one workflow run.
///
/// `Running` names the stage currently in flight, so an operator polling the
/// state can see *where* a long run is, not just that it is alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    /// Constructed, not yet started.
    Pending,
    /// Executing the named stage.
    Running { step: String },
    /// Finished successfully; the rendered deck was returned to the caller.
    Completed,
    /// Finished with the recorded error.
    Failed { error: String },
}

/// Shared state cell used by both workflows.
#[derive(Debug)]
pub(crate) struct StateCell {
    inner: Mutex<WorkflowState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(WorkflowState::Pending),
        }
    }

    pub(crate) fn set(&self, state: WorkflowState) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = state;
        }
    }

    pub(crate) fn running(&self, step: &str) {
        self.set(WorkflowState::Running {
            step: step.to_string(),
        });
    }

    pub(crate) fn get(&self) -> WorkflowState {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(WorkflowState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_transitions() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), WorkflowState::Pending);
        cell.running("render");
        assert_eq!(
            cell.get(),
            WorkflowState::Running {
                step: "render".into()
            }
        );
        cell.set(WorkflowState::Completed);
        assert_eq!(cell.get(), WorkflowState::Completed);
    }
}
