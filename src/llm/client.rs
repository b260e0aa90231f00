use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionTool, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};
use crate::config::Config;
use crate::llm::SafetySetting;
use serde_json::{json, Value};
use std::time::Duration;

pub struct LlmClient {
    chat_client: Client<OpenAIConfig>,
    chat_model: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let chat_config = OpenAIConfig::new()
            .with_api_base(&config.llm_url)
            .with_api_key(config.llm_api_key.as_deref().unwrap_or("unused"));

        // Per-HTTP-call ceiling; the ask deadline bounds the whole tool loop on top of this.
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ask_timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            chat_client: Client::with_config(chat_config).with_http_client(http_client),
            chat_model: config.llm_model.clone(),
        })
    }

    pub async fn chat_with_tools(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<Value>,
        safety_settings: &[SafetySetting],
    ) -> anyhow::Result<CreateChatCompletionResponse> {
        let body = build_request_body(&self.chat_model, messages, tools, safety_settings)?;
        let response: CreateChatCompletionResponse =
            self.chat_client.chat().create_byot(body).await?;
        Ok(response)
    }
}

/// The typed request plus `extra_body.google.safety_settings`, which the
/// OpenAI-compatible Gemini endpoint reads for its content filters.
pub(crate) fn build_request_body(
    model: &str,
    messages: Vec<ChatCompletionRequestMessage>,
    tools: Vec<Value>,
    safety_settings: &[SafetySetting],
) -> anyhow::Result<Value> {
    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(model).messages(messages);

    if !tools.is_empty() {
        let tools = tools
            .into_iter()
            .map(serde_json::from_value::<ChatCompletionTool>)
            .collect::<Result<Vec<_>, _>>()?;
        args.tools(tools);
    }

    let mut body = serde_json::to_value(args.build()?)?;
    if !safety_settings.is_empty() {
        body["extra_body"] = json!({
            "google": {
                "safety_settings": safety_settings
            }
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::safety;
    use async_openai::types::ChatCompletionRequestUserMessageArgs;

    #[test]
    fn test_request_body_carries_tools_and_safety() {
        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content("what happened yesterday?")
            .build()
            .unwrap()
            .into()];
        let tools = vec![json!({
            "type": "function",
            "function": {
                "name": "recentMessages",
                "description": "Get the recent messages",
                "parameters": {"type": "object", "properties": {"limit": {"type": "integer"}}}
            }
        })];

        let body = build_request_body("gemini-flash-latest", messages, tools, &safety::unblocked())
            .unwrap();

        assert_eq!(body["model"], "gemini-flash-latest");
        assert_eq!(body["messages"][0]["content"], "what happened yesterday?");
        assert_eq!(body["tools"][0]["function"]["name"], "recentMessages");
        let settings = body["extra_body"]["google"]["safety_settings"]
            .as_array()
            .unwrap();
        assert_eq!(settings.len(), 5);
        assert!(settings.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn test_request_body_without_tools() {
        let body = build_request_body("m", Vec::new(), Vec::new(), &[]).unwrap();
        assert!(body.get("tools").map_or(true, Value::is_null));
        assert!(body.get("extra_body").is_none());
    }
}
