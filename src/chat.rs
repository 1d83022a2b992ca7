//! # Response orchestration
//!
//! Turns a user query into a stream of response text fragments:
//! retrieve relevant chunks, assemble a token-budgeted context, build the
//! prompt for the selected mode, stream the model's completion, and update
//! session history only when the stream ran to completion.
//!
//! Failures never escape as errors. Retrieval problems, empty context, and
//! provider errors all surface as ordinary text items in the stream, so the
//! consumer just prints whatever arrives.

use std::sync::Arc;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
    },
};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::{debug, error};

use crate::config::SopAssistConfig;
use crate::context::assemble_context;
use crate::error::GenerationError;
use crate::prompts::{
    NO_CONTEXT_NOTICE, SYSTEM_PROMPT_CHAT, SYSTEM_PROMPT_REPORT, chat_user_message,
    report_user_message,
};
use crate::session::{Role, SessionStore};
use crate::vector_store::Retrieve;

/// How the answer should be shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Conversational answer that carries recent history.
    Chat,
    /// Structured multi-section report; history is not included.
    Report,
}

/// Which configured model serves the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Premium,
    Standard,
}

/// Provider-agnostic prompt message.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// Sampling parameters forwarded to the provider.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

/// Stream of response text fragments; errors arrive in-band.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Streaming completion seam. Request-construction failures arrive as the
/// first stream item rather than a separate error channel.
pub trait GenerationProvider: Send + Sync {
    fn stream_generate(
        &self,
        messages: Vec<PromptMessage>,
        model: &str,
        params: &GenerationParams,
    ) -> FragmentStream;
}

/// OpenAI-compatible chat-completions provider.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
}

impl OpenAiGenerator {
    pub fn new(config: &SopAssistConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.api_base.clone());
        Self {
            client: Client::with_config(openai_config),
        }
    }
}

#[allow(deprecated)]
fn to_openai_messages(messages: Vec<PromptMessage>) -> Vec<ChatCompletionRequestMessage> {
    messages
        .into_iter()
        .map(|message| match message.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(message.content),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(message.content),
                name: None,
            }),
            Role::Assistant => {
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        message.content,
                    )),
                    name: None,
                    refusal: None,
                    audio: None,
                    tool_calls: None,
                    function_call: None,
                })
            }
        })
        .collect()
}

impl GenerationProvider for OpenAiGenerator {
    fn stream_generate(
        &self,
        messages: Vec<PromptMessage>,
        model: &str,
        params: &GenerationParams,
    ) -> FragmentStream {
        let client = self.client.clone();
        let model = model.to_string();
        let params = params.clone();

        Box::pin(stream! {
            let request = match CreateChatCompletionRequestArgs::default()
                .model(model)
                .temperature(params.temperature)
                .top_p(params.top_p)
                .max_tokens(params.max_tokens)
                .messages(to_openai_messages(messages))
                .build()
            {
                Ok(request) => request,
                Err(err) => {
                    yield Err(GenerationError::Request(err.to_string()));
                    return;
                }
            };

            let mut stream = match client.chat().create_stream(request).await {
                Ok(stream) => stream,
                Err(err) => {
                    yield Err(GenerationError::Provider(err.to_string()));
                    return;
                }
            };

            while let Some(result) = stream.next().await {
                match result {
                    Ok(response) => {
                        for chat_choice in &response.choices {
                            if let Some(ref content) = chat_choice.delta.content {
                                if !content.is_empty() {
                                    yield Ok(content.clone());
                                }
                            }
                        }
                    }
                    Err(err) => {
                        yield Err(GenerationError::Provider(err.to_string()));
                        return;
                    }
                }
            }
        })
    }
}

/// Drives the retrieve → assemble → generate pipeline for one query.
pub struct ResponseOrchestrator {
    config: SopAssistConfig,
    generator: Arc<dyn GenerationProvider>,
}

impl ResponseOrchestrator {
    pub fn new(config: SopAssistConfig, generator: Arc<dyn GenerationProvider>) -> Self {
        Self { config, generator }
    }

    /// Stream the response to `query` within session `session_id`.
    ///
    /// The session's histories gain the user turn and the assistant turn
    /// only when the whole stream completes; a provider failure rolls the
    /// user turn back out and yields a readable error message instead.
    pub fn respond<'a>(
        &'a self,
        store: &'a mut SessionStore,
        retriever: &'a dyn Retrieve,
        session_id: &'a str,
        query: &'a str,
        mode: ResponseMode,
        tier: ModelTier,
    ) -> impl Stream<Item = String> + 'a {
        stream! {
            debug!(session = session_id, ?mode, ?tier, "retrieving context");
            let chunks = match retriever.retrieve(query) {
                Ok(chunks) => chunks,
                Err(err) => {
                    error!(error = %err, "retrieval failed");
                    yield format!("Error retrieving documents: {err}");
                    return;
                }
            };

            let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
            if texts.join("\n").is_empty() {
                yield NO_CONTEXT_NOTICE.to_string();
                return;
            }
            let context = assemble_context(&texts, self.config.max_context_tokens);

            let messages = {
                let session = store.get_or_create(session_id);
                session.push_user(query);
                match mode {
                    ResponseMode::Report => vec![
                        PromptMessage {
                            role: Role::System,
                            content: SYSTEM_PROMPT_REPORT.to_string(),
                        },
                        PromptMessage {
                            role: Role::User,
                            content: report_user_message(&context, query),
                        },
                    ],
                    ResponseMode::Chat => {
                        let mut messages = vec![PromptMessage {
                            role: Role::System,
                            content: SYSTEM_PROMPT_CHAT.to_string(),
                        }];
                        for message in session.recent_exchanges(self.config.max_history_messages) {
                            messages.push(PromptMessage {
                                role: message.role,
                                content: message.content.clone(),
                            });
                        }
                        messages.push(PromptMessage {
                            role: Role::User,
                            content: chat_user_message(&context, query),
                        });
                        messages
                    }
                }
            };

            let model = match tier {
                ModelTier::Premium => self.config.premium_model.as_str(),
                ModelTier::Standard => self.config.standard_model.as_str(),
            };
            let params = GenerationParams {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                max_tokens: self.config.max_response_tokens,
            };

            debug!(model, "streaming completion");
            let mut answer = String::new();
            let mut failure: Option<String> = None;
            {
                let mut fragments = self.generator.stream_generate(messages, model, &params);
                while let Some(result) = fragments.next().await {
                    match result {
                        Ok(fragment) => {
                            answer.push_str(&fragment);
                            yield fragment;
                        }
                        Err(err) => {
                            error!(error = %err, "generation failed");
                            failure = Some(err.user_message());
                            break;
                        }
                    }
                }
            }

            if let Some(message) = failure {
                store.get_or_create(session_id).pop_last_user();
                yield message;
                return;
            }

            if !answer.is_empty() {
                let session = store.get_or_create(session_id);
                session.push_assistant(&answer, mode == ResponseMode::Report);
                session.trim_model_history();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_roles_map_to_openai_variants() {
        let messages = to_openai_messages(vec![
            PromptMessage {
                role: Role::System,
                content: "persona".to_string(),
            },
            PromptMessage {
                role: Role::User,
                content: "question".to_string(),
            },
            PromptMessage {
                role: Role::Assistant,
                content: "answer".to_string(),
            },
        ]);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
    }
}
