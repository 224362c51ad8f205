use std::path::PathBuf;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::agent_engine::engine::StepOrchestrator;
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::state::SessionOutcome;
use crate::config::AgentConfig;
use crate::errors::EyeControlResult;
use crate::executor::dispatcher::Executor;
use crate::llm::provider::ActionProposer;
use crate::perception::screenshot::ScreenCapture;

/// Case-insensitive tokens that end the whole process.
pub const EXIT_TOKENS: [&str; 5] = ["exit", "quit", "q", "çık", "çıkış"];

const PROMPT: &str = "objective> ";

/// One line from the operator, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorInput {
    Exit,
    Empty,
    Objective(String),
}

impl OperatorInput {
    pub fn classify(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        let lower = trimmed.to_lowercase();
        if EXIT_TOKENS.contains(&lower.as_str()) {
            Self::Exit
        } else {
            Self::Objective(trimmed.to_string())
        }
    }
}

/// Outer loop: read an objective, run it to a terminal state, repeat until
/// the operator exits. The proposer and sandbox handles are borrowed for
/// the whole process lifetime.
pub struct ObjectiveSession<'a> {
    config: &'a AgentConfig,
    proposer: &'a dyn ActionProposer,
    capture: &'a dyn ScreenCapture,
    executor: &'a dyn Executor,
    audit_dir: Option<PathBuf>,
}

impl<'a> ObjectiveSession<'a> {
    pub fn new(
        config: &'a AgentConfig,
        proposer: &'a dyn ActionProposer,
        capture: &'a dyn ScreenCapture,
        executor: &'a dyn Executor,
        audit_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            config,
            proposer,
            capture,
            executor,
            audit_dir,
        }
    }

    /// Returns the outcome of every objective run before the operator exited.
    /// End of input counts as an exit.
    pub async fn run<R, W>(&self, input: R, mut out: W) -> EyeControlResult<Vec<SessionOutcome>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut outcomes = Vec::new();

        out.write_all(
            format!("Agent ready. Type {} to quit.\n", EXIT_TOKENS[..3].join(", ")).as_bytes(),
        )
        .await?;

        loop {
            out.write_all(PROMPT.as_bytes()).await?;
            out.flush().await?;

            let Some(line) = lines.next_line().await? else {
                tracing::info!("operator input closed");
                break;
            };

            let objective = match OperatorInput::classify(&line) {
                OperatorInput::Exit => break,
                OperatorInput::Empty => {
                    out.write_all(b"Objective cannot be empty. Try again.\n").await?;
                    continue;
                }
                OperatorInput::Objective(objective) => objective,
            };

            let history = match &self.audit_dir {
                Some(dir) => SessionHistory::new(dir),
                None => SessionHistory::in_memory(),
            };
            let mut orchestrator = StepOrchestrator::new(
                self.config,
                self.proposer,
                self.capture,
                self.executor,
                objective,
                history,
            );
            let outcome = orchestrator.run().await;

            let line = if outcome.stop.is_completed() {
                format!("[DONE] {} after {} step(s)\n", outcome.stop, outcome.steps_executed)
            } else {
                format!("[STOP] {} after {} step(s)\n", outcome.stop, outcome.steps_executed)
            };
            out.write_all(line.as_bytes()).await?;
            out.write_all(b"Ready for the next objective.\n").await?;
            outcomes.push(outcome);
        }

        out.write_all(b"Agent shutting down.\n").await?;
        out.flush().await?;
        tracing::info!(objectives = outcomes.len(), "operator exited");
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::engine::tests::{test_config, FakeCapture, RecordingExecutor, ScriptedProposer};
    use crate::agent_engine::state::SessionStop;
    use std::sync::atomic::Ordering;

    #[test]
    fn classify_exit_tokens_case_insensitively() {
        for token in ["exit", "QUIT", " q ", "Çık", "ÇıkıŞ", "çıkış"] {
            assert_eq!(OperatorInput::classify(token), OperatorInput::Exit, "{token}");
        }
        assert_eq!(OperatorInput::classify("   "), OperatorInput::Empty);
        assert_eq!(
            OperatorInput::classify("  open the terminal "),
            OperatorInput::Objective("open the terminal".into())
        );
    }

    #[tokio::test]
    async fn runs_objectives_until_exit_token() {
        let cfg = test_config();
        let proposer = ScriptedProposer::new([
            r#"{"action":"CLICK","x":0.5,"y":0.5}"#,
            r#"{"action":"DONE"}"#,
            r#"{"action":"DONE"}"#,
        ]);
        let capture = FakeCapture { fail: false };
        let executor = RecordingExecutor::default();
        let session = ObjectiveSession::new(&cfg, &proposer, &capture, &executor, None);

        let input: &[u8] = b"\nopen the browser\n   \nclose it\nexit\nnever read\n";
        let mut out = Vec::new();
        let outcomes = session.run(input, &mut out).await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].stop, SessionStop::Completed);
        assert_eq!(outcomes[0].steps_executed, 1);
        assert_eq!(outcomes[1].steps_executed, 0);
        assert_ne!(outcomes[0].session_id, outcomes[1].session_id);
        assert_eq!(proposer.calls.load(Ordering::SeqCst), 3);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Objective cannot be empty").count(), 2);
        assert_eq!(text.matches("Ready for the next objective.").count(), 2);
        assert!(text.ends_with("Agent shutting down.\n"));
    }

    #[tokio::test]
    async fn aborted_objective_reports_reason_and_reprompts() {
        let cfg = AgentConfig {
            model_retry: 0,
            ..test_config()
        };
        let proposer = ScriptedProposer::new(["no json here", r#"{"action":"DONE"}"#]);
        let capture = FakeCapture { fail: false };
        let executor = RecordingExecutor::default();
        let session = ObjectiveSession::new(&cfg, &proposer, &capture, &executor, None);

        let input: &[u8] = b"first\nsecond\n";
        let mut out = Vec::new();
        let outcomes = session.run(input, &mut out).await.unwrap();

        assert_eq!(outcomes[0].stop, SessionStop::RetryBudgetExhausted);
        assert_eq!(outcomes[1].stop, SessionStop::Completed);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[STOP] proposer exhausted retries"));
        assert!(text.contains("[DONE] objective completed"));
    }
}
