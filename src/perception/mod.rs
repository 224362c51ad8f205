pub mod preview;
pub mod screenshot;
