use crate::llm::client::LlmClient;
use crate::llm::{GenerationRequest, Generator, SafetySetting};
use crate::system_prompt::build_system_instruction;
use crate::tools::executor::ToolExecutor;
use crate::tools::ToolRegistry;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Runs the model/tool round-trip loop until the model answers in plain text.
pub struct Agent {
    llm: Arc<LlmClient>,
    tools: Arc<ToolRegistry>,
    executor: ToolExecutor,
    max_iterations: usize,
}

impl Agent {
    pub fn new(llm: Arc<LlmClient>, tools: Arc<ToolRegistry>, max_iterations: usize) -> Self {
        Self {
            llm,
            executor: ToolExecutor::new(tools.clone()),
            tools,
            max_iterations: max_iterations.max(1),
        }
    }

    pub async fn run(
        &self,
        mut messages: Vec<ChatCompletionRequestMessage>,
        tool_names: &[String],
        safety_settings: &[SafetySetting],
    ) -> anyhow::Result<String> {
        let tool_definitions = self.tools.definitions_for(tool_names);

        for i in 0..self.max_iterations {
            tracing::info!("Agent iteration {}/{}", i + 1, self.max_iterations);

            let response = self
                .llm
                .chat_with_tools(messages.clone(), tool_definitions.clone(), safety_settings)
                .await?;
            let choice = response
                .choices
                .first()
                .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?;

            let assistant_message = &choice.message;
            let tool_calls = assistant_message
                .tool_calls
                .as_ref()
                .filter(|calls| !calls.is_empty());

            let Some(tool_calls) = tool_calls else {
                tracing::info!("Agent task completed after {} iterations", i + 1);
                return Ok(assistant_message.content.clone().unwrap_or_default());
            };

            // The assistant turn that requested the calls must precede their results.
            messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );

            tracing::info!("LLM requested {} tool calls", tool_calls.len());
            for tool_call in tool_calls {
                let result = dispatch_tool_call(&self.executor, tool_call).await;
                messages.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(tool_call.id.clone())
                        .content(result.to_string())
                        .build()?
                        .into(),
                );
            }
        }

        tracing::warn!(
            "Agent exceeded max iterations ({}) - potential runaway loop or recursive tool calls",
            self.max_iterations
        );
        Err(anyhow::anyhow!(
            "reasoning limit of {} steps reached",
            self.max_iterations
        ))
    }
}

#[async_trait]
impl Generator for Agent {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(build_system_instruction(&request.system_instruction))
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt)
                .build()?
                .into(),
        ];

        self.run(messages, &request.tools, &request.safety_settings)
            .await
    }
}

/// Tool failures are returned to the model as `{"error": ...}`.
pub(crate) async fn dispatch_tool_call(
    executor: &ToolExecutor,
    tool_call: &ChatCompletionMessageToolCall,
) -> Value {
    let name = &tool_call.function.name;
    let raw_arguments = tool_call.function.arguments.trim();
    let arguments: Value = if raw_arguments.is_empty() {
        json!({})
    } else {
        match serde_json::from_str(raw_arguments) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Tool {} called with invalid JSON arguments: {}", name, e);
                return json!({"error": format!("invalid arguments: {}", e)});
            }
        }
    };

    tracing::info!("Agent executing tool: {} with arguments: {}", name, arguments);

    match executor.execute(name, arguments).await {
        Ok(v) => {
            tracing::debug!("Tool {} returned: {}", name, v);
            v
        }
        Err(e) => {
            tracing::error!("Tool {} failed: {}", name, e);
            json!({"error": e.to_string()})
        }
    }
}
