use anyhow::{bail, Result};
use async_trait::async_trait;

/// Text generation backend. Implementations return the raw model text;
/// cleanup for SMS happens in [`crate::reply::ReplyFilter`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Stand-in used when no model credentials are configured. Every call
/// fails, which sends the runtime down its canned-reply path.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredLlm;

#[async_trait]
impl LlmClient for UnconfiguredLlm {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("text generation is not configured (set llm.api_key)")
    }
}
