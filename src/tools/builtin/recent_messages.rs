use crate::db::MessageStore;
use crate::tools::Tool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const TOOL_NAME: &str = "recentMessages";

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct RecentMessagesInput {
    /// How many of the most recent messages to return
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMessagesOutput {
    pub messages: Vec<RecentMessageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMessageEntry {
    pub content: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

/// Read-only recency window over everything the bot has stored, newest first.
pub struct RecentMessagesTool {
    store: Arc<dyn MessageStore>,
    default_limit: usize,
    max_limit: usize,
}

impl RecentMessagesTool {
    pub fn new(store: Arc<dyn MessageStore>, default_limit: usize, max_limit: usize) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            store,
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }

    /// Missing, zero or negative limits mean "the default", never "everything".
    fn effective_limit(&self, requested: Option<i64>) -> usize {
        match requested {
            Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX).min(self.max_limit),
            _ => self.default_limit,
        }
    }

    pub async fn fetch(&self, input: RecentMessagesInput) -> anyhow::Result<RecentMessagesOutput> {
        let limit = self.effective_limit(input.limit);
        let rows = self.store.recent_messages(limit).await?;
        debug!(
            "{}: requested {:?}, returning {} messages",
            TOOL_NAME,
            input.limit,
            rows.len()
        );

        Ok(RecentMessagesOutput {
            messages: rows
                .into_iter()
                .map(|row| RecentMessageEntry {
                    content: row.content,
                    author: row.author_display_name,
                    timestamp: row.created_at,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl Tool for RecentMessagesTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the recent messages, it also includes author's name and message timestamp"
    }

    fn parameters_schema(&self) -> Value {
        let settings = SchemaSettings::draft07().with(|s| {
            s.option_nullable = false;
            s.option_add_null_type = false;
            s.meta_schema = None;
        });
        let schema = settings
            .into_generator()
            .into_root_schema_for::<RecentMessagesInput>();

        let mut value = serde_json::to_value(schema)
            .unwrap_or_else(|_| json!({"type": "object", "properties": {}}));
        if let Some(obj) = value.as_object_mut() {
            obj.remove("title");
        }
        value
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let input = match serde_json::from_value::<RecentMessagesInput>(params.clone()) {
            Ok(input) => input,
            Err(e) => {
                warn!("{}: ignoring malformed arguments {}: {}", TOOL_NAME, params, e);
                RecentMessagesInput::default()
            }
        };

        let output = self.fetch(input).await?;
        Ok(serde_json::to_value(output)?)
    }
}
