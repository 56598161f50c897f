//! Conversation history budgeting for the chat assistant.
//!
//! Token counts are a word/punctuation estimate, not a model tokenizer.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;

/// Default token budget for the history sent with a prompt.
pub const DEFAULT_HISTORY_TOKENS: usize = 1500;

/// Histories longer than this many messages are summarized.
pub const SUMMARIZE_AFTER_MESSAGES: usize = 10;

const SUMMARY_SYSTEM: &str = "You are a context summarization assistant.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Context handed to the next prompt: either a summary or the messages themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryContext {
    Summary(String),
    Messages(Vec<ChatMessage>),
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+|[^\w\s]").expect("token pattern is valid"))
}

/// Number of word and punctuation tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    token_regex().find_iter(text).count()
}

pub fn count_message_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| count_tokens(&m.content)).sum()
}

/// Keep the most recent messages that fit in `max_tokens`, oldest first.
///
/// Walks backwards and stops at the first message that would overflow, so an
/// oversized message hides everything older than it.
pub fn trim_history(messages: &[ChatMessage], max_tokens: usize) -> Vec<ChatMessage> {
    let mut total = 0;
    let mut start = messages.len();
    for (i, message) in messages.iter().enumerate().rev() {
        let tokens = count_tokens(&message.content);
        if total + tokens > max_tokens {
            break;
        }
        total += tokens;
        start = i;
    }
    messages[start..].to_vec()
}

/// Summarize long histories through `llm`; short ones, and any LLM failure,
/// return the messages unchanged.
pub fn summarize_history(
    messages: &[ChatMessage],
    llm: &dyn LlmClient,
    model: &str,
) -> HistoryContext {
    if messages.len() <= SUMMARIZE_AFTER_MESSAGES {
        return HistoryContext::Messages(messages.to_vec());
    }

    let transcript = messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "Summarize the key points and context from the following conversation history, \
         focusing on the most relevant information for future context:\n\n{transcript}\n\n\
         Provide a concise summary that captures the essential context."
    );

    match llm.generate(model, &prompt, SUMMARY_SYSTEM) {
        Ok(summary) => HistoryContext::Summary(summary.trim().to_string()),
        Err(e) => {
            tracing::warn!(error = %e, messages = messages.len(), "History summarization failed");
            HistoryContext::Messages(messages.to_vec())
        }
    }
}
