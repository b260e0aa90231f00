use async_trait::async_trait;

pub mod agent;
pub mod client;
pub mod safety;

pub use agent::Agent;
pub use client::LlmClient;
pub use safety::SafetySetting;

/// Everything one generation needs: the question, the persona, the tools the
/// model may call and the content-filter configuration.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub prompt: String,
    pub tools: Vec<String>,
    pub safety_settings: Vec<SafetySetting>,
}

/// Prompt + tools in, text out. The backend may call tools any number of times.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<String>;
}
