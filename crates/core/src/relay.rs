//! Model relay: submits a prompt under a running conversation and returns
//! the model's text reply.
//!
//! The production implementation drives an OpenAI-compatible chat
//! completions endpoint, which also covers Gemini through its compatibility
//! surface. The call carries a deadline; a model that never answers must
//! not wedge the analysis guard.

use std::time::Duration;

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use tokio::time::timeout;

/// A backend that can answer a text prompt within an ongoing conversation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelRelay: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speaker {
    User,
    Assistant,
}

/// The running exchange fed to the model on every call.
///
/// The system prompt is fixed at session start; user prompts and model
/// replies accumulate behind it so later analyses see the earlier ones.
#[derive(Debug)]
pub struct ConversationContext {
    system_prompt: String,
    turns: Vec<(Speaker, String)>,
}

impl ConversationContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            turns: Vec::new(),
        }
    }

    pub fn record_user(&mut self, text: &str) {
        self.turns.push((Speaker::User, text.to_owned()));
    }

    pub fn record_assistant(&mut self, text: &str) {
        self.turns.push((Speaker::Assistant, text.to_owned()));
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Builds the full message list for a chat completions request.
    pub fn to_request_messages(&self) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()?
                .into(),
        ];
        for (speaker, text) in &self.turns {
            match speaker {
                Speaker::User => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(text.clone())
                        .build()?
                        .into(),
                ),
                Speaker::Assistant => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(text.clone())
                        .build()?
                        .into(),
                ),
            }
        }
        Ok(messages)
    }
}

/// `ModelRelay` over any OpenAI-compatible chat completions API.
pub struct OpenAICompatibleRelay {
    client: Client<OpenAIConfig>,
    model: String,
    deadline: Duration,
    conversation: tokio::sync::Mutex<ConversationContext>,
}

impl OpenAICompatibleRelay {
    /// Creates a relay for the given endpoint configuration.
    ///
    /// `deadline` bounds each model call; an expired call surfaces as an
    /// ordinary relay failure.
    pub fn new(
        config: OpenAIConfig,
        model: String,
        system_prompt: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            deadline,
            conversation: tokio::sync::Mutex::new(ConversationContext::new(system_prompt)),
        }
    }
}

#[async_trait]
impl ModelRelay for OpenAICompatibleRelay {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut conversation = self.conversation.lock().await;
        conversation.record_user(prompt);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(conversation.to_request_messages()?)
            .build()?;

        let response = timeout(self.deadline, self.client.chat().create(request))
            .await
            .context("model call exceeded its deadline")??;

        let reply = response
            .choices
            .first()
            .context("no response choice from model")?
            .message
            .content
            .as_ref()
            .context("no content in model response")?
            .clone();

        conversation.record_assistant(&reply);
        Ok(reply)
    }
}
