use async_trait::async_trait;

use crate::errors::EyeControlResult;
use crate::perception::screenshot::Screenshot;

/// Everything the model sees for one decision.
#[derive(Debug, Clone, Copy)]
pub struct ProposalRequest<'a> {
    pub objective: &'a str,
    /// Most recent history entries, oldest first, as flat records.
    pub history: &'a [serde_json::Value],
    pub screenshot: &'a Screenshot,
}

/// The decision oracle. Returns the model's raw reply; parsing and
/// validation are the caller's job since the reply is untrusted.
#[async_trait]
pub trait ActionProposer: Send + Sync {
    /// Returns the provider's identifier (matches config.toml key).
    fn name(&self) -> &str;

    async fn propose(&self, request: ProposalRequest<'_>) -> EyeControlResult<String>;
}
