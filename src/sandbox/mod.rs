pub mod command;
pub mod docker;

pub use docker::DockerSandbox;
