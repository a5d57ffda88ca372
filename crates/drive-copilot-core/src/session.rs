//! Conversational session
//!
//! A submission is a two-phase append to the history ledger: the user turn is
//! pushed synchronously, and exactly one assistant turn (answer or error
//! notice) is pushed when the request resolves. Only one request is
//! outstanding at a time, so turns can never pair up out of order.

use tokio::task::{JoinError, JoinHandle};

use crate::api::ApiClient;
use crate::error::{ApiResult, SubmitError};
use crate::filter::ContextFilter;
use crate::state::{ChatMessage, ChatRequest, ChatResponse, ChatRole};

pub const CHAT_ERROR_MESSAGE: &str = "Sorry, I encountered an error processing your request.";

pub struct ChatSession {
    client: ApiClient,
    history: Vec<ChatMessage>,
    pending: Option<JoinHandle<ApiResult<ChatResponse>>>,
}

impl ChatSession {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            history: Vec::new(),
            pending: None,
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn user_turns(&self) -> usize {
        self.count(ChatRole::User)
    }

    pub fn assistant_turns(&self) -> usize {
        self.count(ChatRole::Assistant)
    }

    /// Append the user's turn and send it, scoped by `filter`.
    ///
    /// The request carries the history as it was before this turn; the new
    /// message travels separately in `message`.
    pub fn submit(&mut self, text: &str, filter: &ContextFilter) -> Result<(), SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::Empty);
        }
        if self.pending.is_some() {
            return Err(SubmitError::Pending);
        }

        let request = ChatRequest {
            message: text.to_string(),
            conversation_history: self.history.clone(),
            folder_id: filter.folder_id().map(str::to_string),
            file_id: filter.file_id().map(str::to_string),
        };
        self.history.push(ChatMessage::user(text));

        tracing::debug!(
            turn = self.history.len(),
            folder = ?request.folder_id,
            file = ?request.file_id,
            "chat submitted"
        );
        let client = self.client.clone();
        self.pending = Some(tokio::spawn(async move { client.chat(&request).await }));
        Ok(())
    }

    /// Wait for the outstanding request and append its assistant turn
    pub async fn resolve(&mut self) -> Option<&ChatMessage> {
        let handle = self.pending.take()?;
        let result = handle.await;
        self.append_reply(result);
        self.history.last()
    }

    /// Like `resolve`, but only if the request has already finished
    pub async fn poll_resolved(&mut self) -> Option<&ChatMessage> {
        if !self.pending.as_ref()?.is_finished() {
            return None;
        }
        self.resolve().await
    }

    fn append_reply(&mut self, result: Result<ApiResult<ChatResponse>, JoinError>) {
        let reply = match result {
            Ok(Ok(response)) => ChatMessage::assistant(response.message, response.sources),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "chat request failed");
                ChatMessage::assistant_notice(CHAT_ERROR_MESSAGE)
            }
            Err(err) => {
                tracing::error!(error = %err, "chat task did not finish");
                ChatMessage::assistant_notice(CHAT_ERROR_MESSAGE)
            }
        };
        self.history.push(reply);
    }

    fn count(&self, role: ChatRole) -> usize {
        self.history.iter().filter(|m| m.role == role).count()
    }
}
