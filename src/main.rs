use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "eyecontrol", version, about = "Drive a sandboxed desktop toward an objective with a vision model")]
struct Cli {
    /// Path to config.toml (default: next to the executable, then the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not open a VNC viewer on the sandbox desktop
    #[arg(long)]
    no_vnc_viewer: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    eyecontrol_lib::init_tracing();

    let options = eyecontrol_lib::RunOptions {
        config_path: cli.config,
        no_vnc_viewer: cli.no_vnc_viewer,
    };
    if let Err(e) = eyecontrol_lib::run(options).await {
        tracing::error!(error = %e, "eyecontrol failed");
        std::process::exit(1);
    }
}
