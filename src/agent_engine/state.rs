use crate::agent_engine::action::ActionDescriptor;

/// States of one objective's step loop.
#[derive(Debug, Clone, PartialEq)]
pub enum StepState {
    Capture,
    Propose,
    AwaitValid { raw: String },
    RepeatCheck { candidate: ActionDescriptor },
    Execute { action: ActionDescriptor },
    StepDone,
    SessionComplete,
    SessionAborted(SessionStop),
}

/// Why an objective's session ended. Not an error type: every variant is a
/// normal way for the loop to finish.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStop {
    Completed,
    RepeatDetected(String),
    RetryBudgetExhausted,
    StepBudgetExceeded,
    CaptureFailure(String),
    ExecutionFailure(String),
    ProposerFailure(String),
}

impl SessionStop {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for SessionStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("objective completed"),
            Self::RepeatDetected(why) => write!(f, "repeated action detected: {why}"),
            Self::RetryBudgetExhausted => f.write_str("proposer exhausted retries"),
            Self::StepBudgetExceeded => f.write_str("step budget exceeded"),
            Self::CaptureFailure(e) => write!(f, "screen capture failed: {e}"),
            Self::ExecutionFailure(e) => write!(f, "action execution failed: {e}"),
            Self::ProposerFailure(e) => write!(f, "proposer call failed: {e}"),
        }
    }
}

/// Result of running one objective to a terminal state.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub stop: SessionStop,
    pub steps_executed: u32,
    pub session_id: String,
}
