use async_trait::async_trait;

use crate::agent_engine::action::ActionDescriptor;
use crate::errors::EyeControlResult;

/// Performs one validated action against the sandbox. No result is read
/// back into the loop beyond success or failure.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, action: &ActionDescriptor) -> EyeControlResult<()>;
}
