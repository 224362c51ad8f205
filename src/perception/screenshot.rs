use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;

use crate::errors::EyeControlResult;

/// A captured frame: where it was written and its PNG bytes.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub path: PathBuf,
    pub image_bytes: Vec<u8>,
}

impl Screenshot {
    pub fn image_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.image_bytes)
    }

    /// `data:image/png;base64,...` for OpenAI-style `image_url` parts.
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.image_base64())
    }
}

/// Produces the current screen at `dest`.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self, dest: &Path) -> EyeControlResult<Screenshot>;
}
