pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;
pub mod sandbox;

use std::path::PathBuf;

use crate::agent_engine::history::default_audit_dir;
use crate::agent_engine::session::ObjectiveSession;
use crate::errors::EyeControlResult;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::sandbox::DockerSandbox;

/// Process-level options from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub no_vnc_viewer: bool,
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Start the sandbox, serve objectives from stdin until the operator exits,
/// then stop the sandbox again (also when the session loop fails).
pub async fn run(options: RunOptions) -> EyeControlResult<()> {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let mut cfg = config::load_config(options.config_path.as_deref())?;
    if options.no_vnc_viewer {
        cfg.agent.open_vnc_viewer = false;
    }

    let (provider_id, entry) = cfg.llm.active_entry()?;
    let proposer = OpenAiCompatibleProvider::from_entry(provider_id, entry, cfg.agent.min_margin)?;
    tracing::info!(provider = %provider_id, model = %entry.model, "action proposer ready");

    let audit_dir = cfg.agent.audit_dir.clone().unwrap_or_else(default_audit_dir);
    std::fs::create_dir_all(&audit_dir)?;

    let mut sandbox = DockerSandbox::new(cfg.sandbox.clone(), cfg.agent.max_wait_sec);
    sandbox.start().await?;
    if cfg.agent.open_vnc_viewer {
        sandbox.launch_vnc_viewer();
    }

    let result = {
        let session = ObjectiveSession::new(&cfg.agent, &proposer, &sandbox, &sandbox, Some(audit_dir));
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        session.run(stdin, tokio::io::stdout()).await
    };

    if let Err(e) = sandbox.stop().await {
        tracing::warn!(error = %e, "sandbox stop failed");
    }
    result.map(|outcomes| {
        tracing::info!(objectives = outcomes.len(), "eyecontrol exiting");
    })
}
