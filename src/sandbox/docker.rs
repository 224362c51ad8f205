use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent_engine::action::ActionDescriptor;
use crate::config::SandboxConfig;
use crate::errors::{EyeControlError, EyeControlResult};
use crate::executor::dispatcher::Executor;
use crate::executor::input::{plan_input, InputCommand, ScreenGeometry};
use crate::perception::screenshot::{ScreenCapture, Screenshot};
use crate::sandbox::command::{run_cmd, run_cmd_text};

/// X11 desktop running in a Docker container, driven with `xdotool` and
/// captured with ImageMagick's `import`.
pub struct DockerSandbox {
    config: SandboxConfig,
    max_wait_sec: f64,
    geometry: ScreenGeometry,
    started_here: bool,
}

impl DockerSandbox {
    pub fn new(config: SandboxConfig, max_wait_sec: f64) -> Self {
        let geometry = ScreenGeometry {
            width: config.screen_width,
            height: config.screen_height,
        };
        Self {
            config,
            max_wait_sec,
            geometry,
            started_here: false,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.command_timeout_secs.max(1))
    }

    pub fn geometry(&self) -> ScreenGeometry {
        self.geometry
    }

    /// `docker exec -e DISPLAY=<display> <container> <program> <args...>`
    fn exec_args(&self, program: &str, args: &[String]) -> Vec<String> {
        let mut argv = vec![
            "exec".to_string(),
            "-e".to_string(),
            format!("DISPLAY={}", self.config.display),
            self.config.container_name.clone(),
            program.to_string(),
        ];
        argv.extend(args.iter().cloned());
        argv
    }

    fn run_args(&self) -> Vec<String> {
        let mut argv = vec![
            "run".to_string(),
            "-d".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            self.config.container_name.clone(),
            "-p".to_string(),
            format!("{}:5900", self.config.vnc_port),
            "-p".to_string(),
            format!("{}:{}", self.config.novnc_port, self.config.novnc_container_port),
        ];
        argv.extend(self.config.run_args.iter().cloned());
        argv.push(self.config.image.clone());
        argv
    }

    async fn is_running(&self) -> bool {
        let args = vec![
            "inspect".to_string(),
            "-f".to_string(),
            "{{.State.Running}}".to_string(),
            self.config.container_name.clone(),
        ];
        matches!(run_cmd_text("docker", &args, self.timeout()).await.as_deref(), Ok("true"))
    }

    /// Bring the container up (or attach to a running one) and learn the
    /// real screen size.
    pub async fn start(&mut self) -> EyeControlResult<()> {
        if self.config.reuse_running && self.is_running().await {
            tracing::info!(container = %self.config.container_name, "reusing running sandbox");
        } else {
            let id = run_cmd_text("docker", &self.run_args(), self.timeout()).await?;
            self.started_here = true;
            tracing::info!(
                container = %self.config.container_name,
                id = %id,
                image = %self.config.image,
                "sandbox started"
            );
        }

        let geometry_args = self.exec_args("xdotool", &["getdisplaygeometry".to_string()]);
        match run_cmd_text("docker", &geometry_args, self.timeout()).await {
            Ok(out) => match ScreenGeometry::parse(&out) {
                Some(g) => self.geometry = g,
                None => tracing::warn!(output = %out, "unexpected display geometry output"),
            },
            Err(e) => tracing::warn!(error = %e, "display geometry unavailable, using configured size"),
        }
        tracing::info!(
            width = self.geometry.width,
            height = self.geometry.height,
            "sandbox screen geometry"
        );
        Ok(())
    }

    /// Open a viewer on the sandbox desktop. Failures are only logged.
    pub fn launch_vnc_viewer(&self) {
        let argv = match &self.config.viewer_command {
            Some(cmd) if !cmd.is_empty() => cmd.clone(),
            _ => vec![
                "xdg-open".to_string(),
                format!("http://localhost:{}/vnc.html", self.config.novnc_port),
            ],
        };
        match std::process::Command::new(&argv[0])
            .args(&argv[1..])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
        {
            Ok(_) => tracing::info!(viewer = %argv.join(" "), "VNC viewer launched"),
            Err(e) => tracing::warn!(viewer = %argv[0], error = %e, "could not launch VNC viewer"),
        }
    }

    /// Stop the container if this process started it.
    pub async fn stop(&mut self) -> EyeControlResult<()> {
        if !self.started_here {
            return Ok(());
        }
        let args = vec!["stop".to_string(), self.config.container_name.clone()];
        run_cmd("docker", &args, Duration::from_secs(30)).await?;
        self.started_here = false;
        tracing::info!(container = %self.config.container_name, "sandbox stopped");
        Ok(())
    }
}

#[async_trait]
impl ScreenCapture for DockerSandbox {
    async fn capture(&self, dest: &Path) -> EyeControlResult<Screenshot> {
        let args = self.exec_args(
            "import",
            &["-window".to_string(), "root".to_string(), "png:-".to_string()],
        );
        let image_bytes = run_cmd("docker", &args, self.timeout())
            .await
            .map_err(|e| EyeControlError::Capture(e.to_string()))?;
        if image_bytes.is_empty() {
            return Err(EyeControlError::Capture("empty screenshot".into()));
        }
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(dest, &image_bytes).await?;
        tracing::debug!(path = %dest.display(), bytes = image_bytes.len(), "screenshot captured");
        Ok(Screenshot {
            path: dest.to_path_buf(),
            image_bytes,
        })
    }
}

#[async_trait]
impl Executor for DockerSandbox {
    async fn execute(&self, action: &ActionDescriptor) -> EyeControlResult<()> {
        for cmd in plan_input(action, self.geometry, self.max_wait_sec)? {
            match cmd {
                InputCommand::Xdotool(args) => {
                    let argv = self.exec_args("xdotool", &args);
                    run_cmd("docker", &argv, self.timeout())
                        .await
                        .map_err(|e| EyeControlError::Executor(e.to_string()))?;
                }
                InputCommand::Sleep(d) => {
                    tracing::info!(secs = d.as_secs_f64(), "waiting");
                    tokio::time::sleep(d).await;
                }
            }
        }
        tracing::info!(action = %action.action, "action executed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_args_target_container_display() {
        let sb = DockerSandbox::new(SandboxConfig::default(), 30.0);
        let argv = sb.exec_args("xdotool", &["key".to_string(), "Return".to_string()]);
        assert_eq!(
            argv,
            vec!["exec", "-e", "DISPLAY=:1", "eyecontrol-sandbox", "xdotool", "key", "Return"]
        );
    }

    #[test]
    fn run_args_publish_ports_and_end_with_image() {
        let cfg = SandboxConfig {
            run_args: vec!["-e".into(), "RESOLUTION=1280x800".into()],
            ..SandboxConfig::default()
        };
        let sb = DockerSandbox::new(cfg.clone(), 30.0);
        let argv = sb.run_args();
        assert_eq!(&argv[..5], &["run", "-d", "--rm", "--name", "eyecontrol-sandbox"]);
        assert!(argv.contains(&"5900:5900".to_string()));
        assert!(argv.contains(&format!("6080:{}", cfg.novnc_container_port)));
        assert!(argv.contains(&"RESOLUTION=1280x800".to_string()));
        assert_eq!(argv.last(), Some(&cfg.image));
    }

    #[test]
    fn geometry_defaults_to_config() {
        let sb = DockerSandbox::new(SandboxConfig::default(), 30.0);
        assert_eq!(sb.geometry(), ScreenGeometry { width: 1280, height: 800 });
    }

    #[tokio::test]
    async fn stop_is_a_noop_when_not_started_here() {
        let mut sb = DockerSandbox::new(SandboxConfig::default(), 30.0);
        assert!(sb.stop().await.is_ok());
    }
}
