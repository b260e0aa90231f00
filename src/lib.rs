pub mod ask;
pub mod commands;
pub mod config;
pub mod db;
pub mod events;
pub mod health;
pub mod ingest;
pub mod llm;
pub mod system_prompt;
pub mod tools;

/// Custom data passed to all commands
pub struct Data {
    pub ingestor: ingest::Ingestor,
    pub ask: ask::AskOrchestrator,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
