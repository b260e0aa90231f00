use super::IncomingMessage;
use thiserror::Error;

/// Why an event was not persisted. Variants are listed in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("direct message (no guild)")]
    DirectMessage,
    #[error("author is a bot account")]
    BotAuthor,
    #[error("authored by this bot")]
    SelfAuthored,
    #[error("empty content")]
    EmptyContent,
}

/// Pure eligibility check applied to both created and edited messages.
#[derive(Debug, Clone)]
pub struct EventFilter {
    bot_id: String,
}

impl EventFilter {
    pub fn new(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
        }
    }

    pub fn check(&self, event: &IncomingMessage) -> Result<(), Rejection> {
        if event.guild_id.is_none() {
            return Err(Rejection::DirectMessage);
        }
        if event.author.is_bot {
            return Err(Rejection::BotAuthor);
        }
        if event.author.id == self.bot_id {
            return Err(Rejection::SelfAuthored);
        }
        if event.content.trim().is_empty() {
            return Err(Rejection::EmptyContent);
        }
        Ok(())
    }
}
