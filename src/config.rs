use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Clone, Deserialize)]
pub struct Config {
    pub discord_token: String,
    /// Scope the slash commands are reconciled against. `None` means global.
    pub guild_id: Option<u64>,
    pub database_url: String,
    pub llm_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub system_prompt: String,
    pub status_message: String,
    pub health_port: u16,

    // Deadlines
    pub ask_timeout_secs: u64,
    pub ack_timeout_secs: u64,
    pub store_timeout_secs: u64,

    // Generation
    pub agent_max_iterations: usize,
    pub recent_messages_default_limit: usize,
    pub recent_messages_max_limit: usize,
}

const DEFAULT_LLM_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

const DEFAULT_SYSTEM_PROMPT: &str = "You are SEV0, a helpful assistant living in a Discord server. \
You can read the most recent messages posted in the server with the recentMessages tool, \
each with its author's name and the time it was sent. \
When a question is about what people said, what happened recently or who did what, call the tool before answering \
and ground your answer in those messages. Keep answers short and to the point.";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let guild_id = match env::var("DISCORD_GUILD_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("DISCORD_GUILD_ID must be a valid u64"))?,
            ),
            _ => None,
        };

        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            guild_id,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/sev0.db".to_string()),
            llm_url: env::var("LLM_URL").unwrap_or_else(|_| DEFAULT_LLM_URL.to_string()),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "gemini-flash-latest".to_string()),
            llm_api_key: env::var("LLM_API_KEY")
                .or_else(|_| env::var("GEMINI_API_KEY"))
                .ok(),
            system_prompt: env::var("SYSTEM_PROMPT")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string()),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Watching the channels".to_string()),
            health_port: parse_or("PORT", 8080),
            ask_timeout_secs: parse_or("ASK_TIMEOUT_SECS", 30),
            ack_timeout_secs: parse_or("ACK_TIMEOUT_SECS", 3),
            store_timeout_secs: parse_or("STORE_TIMEOUT_SECS", 5),
            agent_max_iterations: parse_or("AGENT_MAX_ITERATIONS", 5),
            recent_messages_default_limit: parse_or("RECENT_MESSAGES_DEFAULT_LIMIT", 20),
            recent_messages_max_limit: parse_or("RECENT_MESSAGES_MAX_LIMIT", 100),
        })
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("guild_id", &self.guild_id)
            .field("database_url", &self.database_url)
            .field("llm_url", &self.llm_url)
            .field("llm_model", &self.llm_model)
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("system_prompt", &self.system_prompt)
            .field("status_message", &self.status_message)
            .field("health_port", &self.health_port)
            .field("ask_timeout_secs", &self.ask_timeout_secs)
            .field("ack_timeout_secs", &self.ack_timeout_secs)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("agent_max_iterations", &self.agent_max_iterations)
            .field(
                "recent_messages_default_limit",
                &self.recent_messages_default_limit,
            )
            .field("recent_messages_max_limit", &self.recent_messages_max_limit)
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
