//! The `/ask` flow: acknowledge, generate under a deadline, edit the acknowledgment.
//!
//! Platform response deadlines are shorter than generation latency, so nothing
//! expensive starts before the deferred acknowledgment has gone out. Every path
//! after that ends in exactly one edit carrying either the answer or a fixed
//! fallback.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::llm::{safety, GenerationRequest, Generator};

pub const APOLOGY_FALLBACK: &str =
    "Sorry, I couldn't come up with an answer right now. Please try again in a moment.";
pub const NO_RESPONSE_FALLBACK: &str = "I don't have a response for that.";

/// Request-scoped data for one invocation, passed explicitly down the call chain.
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub interaction_id: String,
    pub user_id: String,
    pub user_name: String,
    pub guild_id: Option<String>,
    pub question: String,
}

/// The two platform calls an invocation makes: the deferred acknowledgment and
/// the edit that replaces it.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn acknowledge(&self) -> anyhow::Result<()>;
    async fn deliver(&self, content: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    Generated,
    /// Backend error or deadline exceeded.
    Apology,
    /// Backend answered with nothing but whitespace.
    NoResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOutcome {
    NotAcknowledged,
    Delivered(AnswerKind),
    DeliveryFailed(AnswerKind),
}

pub struct AskOrchestrator {
    generator: Arc<dyn Generator>,
    system_instruction: String,
    tools: Vec<String>,
    ack_timeout: Duration,
    generation_timeout: Duration,
}

impl AskOrchestrator {
    pub fn new(
        generator: Arc<dyn Generator>,
        system_instruction: impl Into<String>,
        tools: Vec<String>,
        ack_timeout: Duration,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            system_instruction: system_instruction.into(),
            tools,
            ack_timeout,
            generation_timeout,
        }
    }

    pub async fn handle(&self, request: &AskRequest, responder: &dyn Responder) -> AskOutcome {
        let span = info_span!(
            "ask",
            interaction_id = %request.interaction_id,
            user_id = %request.user_id
        );
        self.run(request, responder).instrument(span).await
    }

    async fn run(&self, request: &AskRequest, responder: &dyn Responder) -> AskOutcome {
        info!(
            "Ask from {} in guild {:?}: {}",
            request.user_name, request.guild_id, request.question
        );

        match timeout(self.ack_timeout, responder.acknowledge()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Ask: failed to acknowledge interaction: {}", e);
                return AskOutcome::NotAcknowledged;
            }
            Err(_) => {
                error!("Ask: acknowledgment timed out after {:?}", self.ack_timeout);
                return AskOutcome::NotAcknowledged;
            }
        }

        let (text, kind) = self.generate(request).await;
        let text = truncate_for_discord(&text);

        match responder.deliver(&text).await {
            Ok(()) => {
                info!("Ask: delivered {:?} answer ({} chars)", kind, text.chars().count());
                AskOutcome::Delivered(kind)
            }
            Err(e) => {
                error!("Ask: failed to edit acknowledgment: {}", e);
                AskOutcome::DeliveryFailed(kind)
            }
        }
    }

    async fn generate(&self, request: &AskRequest) -> (String, AnswerKind) {
        let generation = GenerationRequest {
            system_instruction: self.system_instruction.clone(),
            prompt: request.question.clone(),
            tools: self.tools.clone(),
            safety_settings: safety::unblocked(),
        };

        match timeout(self.generation_timeout, self.generator.generate(generation)).await {
            Ok(Ok(answer)) if answer.trim().is_empty() => {
                warn!("Ask: backend returned an empty answer");
                (NO_RESPONSE_FALLBACK.to_string(), AnswerKind::NoResponse)
            }
            Ok(Ok(answer)) => (answer, AnswerKind::Generated),
            Ok(Err(e)) => {
                error!("Ask: generation failed: {}", e);
                (APOLOGY_FALLBACK.to_string(), AnswerKind::Apology)
            }
            Err(_) => {
                warn!("Ask: generation timed out after {:?}", self.generation_timeout);
                (APOLOGY_FALLBACK.to_string(), AnswerKind::Apology)
            }
        }
    }
}

fn truncate_for_discord(text: &str) -> String {
    if text.chars().count() <= DISCORD_MESSAGE_LIMIT {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(DISCORD_MESSAGE_LIMIT - 1).collect();
    truncated.push('…');
    truncated
}
