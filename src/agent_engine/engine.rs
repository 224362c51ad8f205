use crate::agent_engine::action::{ActionDescriptor, ActionKind};
use crate::agent_engine::history::{HistoryEntry, MarkerKind, SessionHistory};
use crate::agent_engine::loop_control::{RetryBudget, StepCounter};
use crate::agent_engine::parser::parse_action;
use crate::agent_engine::repeat_guard::RepeatGuard;
use crate::agent_engine::state::{SessionOutcome, SessionStop, StepState};
use crate::config::AgentConfig;
use crate::errors::EyeControlError;
use crate::executor::dispatcher::Executor;
use crate::executor::safety::CoordinateValidator;
use crate::llm::provider::{ActionProposer, ProposalRequest};
use crate::perception::preview::{draw_preview, preview_path};
use crate::perception::screenshot::{ScreenCapture, Screenshot};

/// Drives one objective from the first capture to a terminal state.
///
/// Strictly sequential: one proposer query or execution is in flight at a
/// time. History and counters are owned here for the objective's lifetime.
pub struct StepOrchestrator<'a> {
    config: &'a AgentConfig,
    proposer: &'a dyn ActionProposer,
    capture: &'a dyn ScreenCapture,
    executor: &'a dyn Executor,
    validator: CoordinateValidator,
    repeat_guard: RepeatGuard,

    // ── Per-objective state ───────────────────────────────────────────────
    objective: String,
    history: SessionHistory,
    steps: StepCounter,
    retries: RetryBudget,
    screenshot: Option<Screenshot>,
    state: StepState,
}

impl<'a> StepOrchestrator<'a> {
    pub fn new(
        config: &'a AgentConfig,
        proposer: &'a dyn ActionProposer,
        capture: &'a dyn ScreenCapture,
        executor: &'a dyn Executor,
        objective: impl Into<String>,
        history: SessionHistory,
    ) -> Self {
        Self {
            config,
            proposer,
            capture,
            executor,
            validator: CoordinateValidator::new(config.min_margin),
            repeat_guard: RepeatGuard::new(config.repeat_threshold, config.coord_tolerance),
            objective: objective.into(),
            history,
            steps: StepCounter::new(config.max_steps),
            retries: RetryBudget::new(config.model_retry),
            screenshot: None,
            state: StepState::Capture,
        }
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn steps(&self) -> &StepCounter {
        &self.steps
    }

    /// Run until `SessionComplete` or `SessionAborted`.
    pub async fn run(&mut self) -> SessionOutcome {
        tracing::info!(
            objective = %self.objective,
            session = %self.history.session_id,
            proposer = %self.proposer.name(),
            "objective session started"
        );

        loop {
            let state = std::mem::replace(&mut self.state, StepState::Capture);
            self.state = match state {
                // ── Capture: settle, then screenshot ──────────────────────
                StepState::Capture => {
                    tracing::info!(step = self.steps.current(), "step started");
                    self.retries = RetryBudget::new(self.config.model_retry);
                    tokio::time::sleep(self.config.wait_before_capture()).await;
                    match self.capture.capture(&self.config.screenshot_path).await {
                        Ok(shot) => {
                            self.screenshot = Some(shot);
                            StepState::Propose
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "screen capture failed");
                            StepState::SessionAborted(SessionStop::CaptureFailure(e.to_string()))
                        }
                    }
                }

                // ── Propose: the single suspension point on the model ─────
                StepState::Propose => self.propose().await,

                // ── AwaitValid: parse + coordinate guard ──────────────────
                StepState::AwaitValid { raw } => self.validate(raw),

                // ── RepeatCheck: futile repetition stops gracefully ───────
                StepState::RepeatCheck { candidate } => {
                    let window = self.history.window(self.config.history_window);
                    let (stop, why) = self.repeat_guard.check(window, &candidate);
                    if stop {
                        tracing::warn!(reason = %why, "repeat guard triggered");
                        StepState::SessionAborted(SessionStop::RepeatDetected(why))
                    } else {
                        StepState::Execute { action: candidate }
                    }
                }

                // ── Execute: hand off, record, count ──────────────────────
                StepState::Execute { action } => self.execute(action).await,

                StepState::StepDone => {
                    if self.steps.exceeded() {
                        tracing::warn!(max_steps = self.config.max_steps, "step budget exceeded");
                        StepState::SessionAborted(SessionStop::StepBudgetExceeded)
                    } else {
                        StepState::Capture
                    }
                }

                StepState::SessionComplete => return self.finish(SessionStop::Completed),
                StepState::SessionAborted(stop) => return self.finish(stop),
            };
        }
    }

    async fn propose(&mut self) -> StepState {
        let attempt = self.retries.begin_attempt();
        let Some(screenshot) = self.screenshot.as_ref() else {
            return StepState::SessionAborted(SessionStop::CaptureFailure("no screenshot available".into()));
        };
        let window = self.history.window_values(self.config.history_window);
        tracing::debug!(attempt, window = window.len(), "querying proposer");

        let request = ProposalRequest {
            objective: &self.objective,
            history: &window,
            screenshot,
        };
        match self.proposer.propose(request).await {
            Ok(raw) => {
                tracing::debug!(attempt, raw = %raw, "proposer replied");
                StepState::AwaitValid { raw }
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "proposer call failed");
                StepState::SessionAborted(SessionStop::ProposerFailure(e.to_string()))
            }
        }
    }

    fn validate(&mut self, raw: String) -> StepState {
        let candidate = match parse_action(&raw) {
            Ok(candidate) => candidate,
            Err(e) => return self.reject_malformed(e, raw),
        };

        if candidate.action == ActionKind::Done {
            tracing::info!(why = ?candidate.why_short, "model reported the objective as done");
            return StepState::SessionComplete;
        }

        if candidate.action.needs_coordinates() {
            if let Err(reason) = self.check_coordinates(&candidate) {
                return self.reject_coordinates(candidate, reason);
            }
        }

        if let Some(field) = candidate.missing_payload() {
            return self.reject_payload(candidate, field);
        }

        tracing::info!(action = %candidate.action, target = ?candidate.target, "candidate accepted");
        StepState::RepeatCheck { candidate }
    }

    fn check_coordinates(&self, candidate: &ActionDescriptor) -> Result<(), String> {
        let (x, y) = candidate
            .coordinates()
            .ok_or_else(|| format!("{} missing x/y coordinates", candidate.action))?;
        match self.validator.validate(x, y) {
            (true, _) => Ok(()),
            (false, reason) => Err(reason),
        }
    }

    fn reject_malformed(&mut self, error: EyeControlError, raw: String) -> StepState {
        tracing::warn!(error = %error, "malformed proposer response");
        self.history.push(HistoryEntry::marker(
            MarkerKind::MalformedResponse,
            "no JSON action object found",
            serde_json::Value::String(raw),
        ));
        self.retry_or_abort()
    }

    fn reject_coordinates(&mut self, candidate: ActionDescriptor, reason: String) -> StepState {
        tracing::warn!(reason = %reason, "invalid coordinates, asking again");
        self.history.push(HistoryEntry::marker(
            MarkerKind::InvalidCoords,
            reason,
            candidate.to_value(),
        ));
        self.retry_or_abort()
    }

    fn reject_payload(&mut self, candidate: ActionDescriptor, field: &str) -> StepState {
        let reason = format!("{} without {field}", candidate.action);
        tracing::warn!(reason = %reason, "incomplete action, asking again");
        self.history.push(HistoryEntry::marker(
            MarkerKind::MissingPayload,
            reason,
            candidate.to_value(),
        ));
        self.retry_or_abort()
    }

    fn retry_or_abort(&mut self) -> StepState {
        if self.retries.consume() {
            StepState::Propose
        } else {
            tracing::error!(attempts = self.retries.attempts(), "proposer exhausted retries");
            StepState::SessionAborted(SessionStop::RetryBudgetExhausted)
        }
    }

    async fn execute(&mut self, action: ActionDescriptor) -> StepState {
        let step = self.steps.current();
        self.write_preview(&action, step);

        tracing::info!(step, action = ?action, "executing");
        if let Err(e) = self.executor.execute(&action).await {
            tracing::error!(step, error = %e, "execution failed");
            return StepState::SessionAborted(SessionStop::ExecutionFailure(e.to_string()));
        }
        self.history.push(HistoryEntry::executed(action));
        self.steps.record_execution();
        StepState::StepDone
    }

    fn write_preview(&self, action: &ActionDescriptor, step: u32) {
        let (Some(template), Some(shot), Some((x, y))) = (
            self.config.preview_path_template.as_deref(),
            self.screenshot.as_ref(),
            action.coordinates(),
        ) else {
            return;
        };
        let dest = preview_path(template, step);
        match draw_preview(&shot.image_bytes, x, y, &dest) {
            Ok(()) => tracing::debug!(path = %dest.display(), "click preview written"),
            Err(e) => tracing::warn!(error = %e, "click preview failed"),
        }
    }

    fn finish(&self, stop: SessionStop) -> SessionOutcome {
        tracing::info!(
            session = %self.history.session_id,
            steps = self.steps.executed(),
            history = self.history.entries().len(),
            reason = %stop,
            "objective session ended"
        );
        SessionOutcome {
            stop,
            steps_executed: self.steps.executed(),
            session_id: self.history.session_id.clone(),
        }
    }
}
