use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{EyeControlError, EyeControlResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// Control-loop tuning. Every field has a default so a partial `[agent]`
/// table is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Settle time before every screenshot.
    pub wait_before_capture_sec: f64,
    /// Extra proposer queries allowed per step (total queries = retry + 1).
    pub model_retry: u32,
    /// Forbidden edge band, as a fraction of the screen.
    pub min_margin: f64,
    pub max_steps: u32,
    /// Number of most recent history entries shown to the model.
    pub history_window: usize,
    /// Consecutive equivalent executed actions tolerated before stopping.
    pub repeat_threshold: usize,
    /// Normalized distance under which two pointer targets are the same.
    pub coord_tolerance: f64,
    /// Upper bound for a single WAIT action.
    pub max_wait_sec: f64,
    pub screenshot_path: PathBuf,
    /// `{i}` is replaced with the step number.
    pub preview_path_template: Option<String>,
    pub open_vnc_viewer: bool,
    /// JSONL audit trail location; `None` falls back to the platform data dir.
    pub audit_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            wait_before_capture_sec: 1.0,
            model_retry: 2,
            min_margin: 0.05,
            max_steps: 30,
            history_window: 6,
            repeat_threshold: 2,
            coord_tolerance: 0.02,
            max_wait_sec: 30.0,
            screenshot_path: PathBuf::from("screen.png"),
            preview_path_template: None,
            open_vnc_viewer: true,
            audit_dir: None,
        }
    }
}

impl AgentConfig {
    pub fn wait_before_capture(&self) -> Duration {
        Duration::from_secs_f64(self.wait_before_capture_sec.max(0.0))
    }

    pub fn validate(&self) -> EyeControlResult<()> {
        if !(0.0..0.5).contains(&self.min_margin) {
            return Err(EyeControlError::Config(format!(
                "agent.min_margin must be in [0, 0.5), got {}",
                self.min_margin
            )));
        }
        if self.history_window == 0 {
            return Err(EyeControlError::Config("agent.history_window must be >= 1".into()));
        }
        if self.repeat_threshold == 0 {
            return Err(EyeControlError::Config("agent.repeat_threshold must be >= 1".into()));
        }
        if self.max_steps == 0 {
            return Err(EyeControlError::Config("agent.max_steps must be >= 1".into()));
        }
        if !self.wait_before_capture_sec.is_finite() || !self.max_wait_sec.is_finite() {
            return Err(EyeControlError::Config("agent wait durations must be finite".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub display_name: String,
    /// Full chat-completions URL, e.g. `http://localhost:8080/v1/chat/completions`.
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
    /// Optional API key stored in config.toml (falls back to env var EYECONTROL_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_temperature() -> f64 {
    0.1
}

fn default_top_p() -> f64 {
    0.9
}

fn default_max_tokens() -> u32 {
    220
}

fn default_request_timeout() -> u64 {
    120
}

fn default_stop() -> Vec<String> {
    vec!["<|im_end|>".to_string()]
}

impl LlmConfig {
    pub fn active_entry(&self) -> EyeControlResult<(&str, &ProviderEntry)> {
        self.providers
            .get_key_value(&self.active_provider)
            .map(|(id, entry)| (id.as_str(), entry))
            .ok_or_else(|| {
                EyeControlError::Config(format!(
                    "Active provider '{}' not found under [llm.providers]",
                    self.active_provider
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub image: String,
    pub container_name: String,
    pub display: String,
    pub vnc_port: u16,
    pub novnc_port: u16,
    /// noVNC port inside the container.
    pub novnc_container_port: u16,
    /// Extra `docker run` arguments placed before the image name.
    pub run_args: Vec<String>,
    /// Used when the container cannot report its geometry.
    pub screen_width: u32,
    pub screen_height: u32,
    /// Argv of a VNC viewer; `None` opens the noVNC page instead.
    pub viewer_command: Option<Vec<String>>,
    pub command_timeout_secs: u64,
    pub reuse_running: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "dorowu/ubuntu-desktop-lxde-vnc:latest".to_string(),
            container_name: "eyecontrol-sandbox".to_string(),
            display: ":1".to_string(),
            vnc_port: 5900,
            novnc_port: 6080,
            novnc_container_port: 80,
            run_args: Vec::new(),
            screen_width: 1280,
            screen_height: 800,
            viewer_command: None,
            command_timeout_secs: 15,
            reuse_running: true,
        }
    }
}

fn resolve_config_path() -> EyeControlResult<Option<PathBuf>> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    Ok(None)
}

/// Load the config from `explicit` if given, else from the usual locations,
/// else fall back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> EyeControlResult<AppConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => resolve_config_path()?,
    };

    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            let config = parse_config(&content)?;
            tracing::info!(
                path = %path.display(),
                provider = %config.llm.active_provider,
                "config loaded"
            );
            config
        }
        None => {
            tracing::warn!("config.toml not found next to executable or in working directory; using defaults");
            AppConfig::default()
        }
    };
    Ok(config)
}

pub fn parse_config(content: &str) -> EyeControlResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.agent.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_agent_table_keeps_defaults() {
        let cfg = parse_config(
            r#"
            [agent]
            max_steps = 12
            min_margin = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(cfg.agent.max_steps, 12);
        assert_eq!(cfg.agent.min_margin, 0.1);
        assert_eq!(cfg.agent.history_window, 6);
        assert_eq!(cfg.agent.model_retry, 2);
        assert_eq!(cfg.sandbox.display, ":1");
    }

    #[test]
    fn provider_defaults_are_applied() {
        let cfg = parse_config(
            r#"
            [llm]
            active_provider = "local"

            [llm.providers.local]
            api_base = "http://localhost:8080/v1/chat/completions"
            model = "qwen3-vl"
            "#,
        )
        .unwrap();
        let (id, entry) = cfg.llm.active_entry().unwrap();
        assert_eq!(id, "local");
        assert_eq!(entry.max_tokens, 220);
        assert!(!entry.stream);
        assert_eq!(entry.stop, vec!["<|im_end|>".to_string()]);
    }

    #[test]
    fn missing_active_provider_is_a_config_error() {
        let cfg = AppConfig::default();
        assert!(matches!(
            cfg.llm.active_entry(),
            Err(EyeControlError::Config(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_margin() {
        let err = parse_config("[agent]\nmin_margin = 0.6\n").unwrap_err();
        assert!(matches!(err, EyeControlError::Config(_)));
    }

    #[test]
    fn rejects_zero_window() {
        assert!(parse_config("[agent]\nhistory_window = 0\n").is_err());
    }
}
