use std::fmt;

/// Lifecycle of a single dump or restore run.
///
/// `Idle -> Running -> Completed | Failed`. There is no pause or resume;
/// an interrupted run ends in `Failed` and needs a fresh invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    pub(crate) fn finish<T, E>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => RunState::Completed,
            Err(_) => RunState::Failed,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}
