//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation history, sends
//! each turn to the chat completion endpoint, and applies the response to the active
//! assistant placeholder as it arrives.
//!
//! A turn moves through `Sending`, then `Streaming`, and ends `Completed`, `Cancelled` or
//! `Failed`.  Every state change is published as a fresh [`SessionSnapshot`] so readers never
//! see a half-edited history.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::chat::compactor::compact;
use crate::chat::config::ChatConfig;
use crate::chat::request::build_request;
use crate::client::{OpenAiClient, ResponseBody, Transport};
use crate::error::{Error, Result};
use crate::observability::{
    SESSION_CANCELLATIONS, SESSION_FAILURES, SESSION_TURN_DURATION, SESSION_TURNS,
};
use crate::render::Renderer;
use crate::sse::{StreamRecord, process_records};
use crate::types::{
    Attachment, ChatCompletionChunk, ChatCompletionRequest, ChatMessage, Role, TokenUsage,
    resolve_model,
};

/// Notice appended to a turn the caller cancelled.
pub const STOPPED_NOTICE: &str = "⏹️ Streaming stopped by user.";

/// Prefix of the notice appended to a turn that failed.
pub const FAILURE_NOTICE: &str = "⚠️ LLM backend not responding.";

/// What readers of the session see.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// The conversation history.  Never mutated in place once published.
    pub history: Arc<Vec<ChatMessage>>,

    /// True from the start of a send until its terminal state.
    pub busy: bool,

    /// Index of the assistant placeholder being filled, while busy.
    pub active: Option<usize>,

    /// Token accounting of the last completed turn.
    pub usage: Option<TokenUsage>,
}

/// How a turn ended.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The response was received in full.
    Completed,

    /// The caller's cancellation token fired.
    Cancelled,

    /// The transport or the response failed; the error is also in the assistant message.
    Failed(Error),
}

impl TurnOutcome {
    /// Returns true if the turn completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed)
    }

    /// Returns true if the turn was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TurnOutcome::Cancelled)
    }

    /// Returns true if the turn failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, TurnOutcome::Failed(_))
    }
}

/// A chat session that manages conversation state and API interactions.
pub struct ChatSession<T: Transport = OpenAiClient> {
    transport: T,
    config: ChatConfig,
    state: watch::Sender<SessionSnapshot>,
}

/// Returns the session to idle when a turn ends, including when its future is dropped.
struct IdleGuard<'a> {
    state: &'a watch::Sender<SessionSnapshot>,
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|snapshot| {
            snapshot.busy = false;
            snapshot.active = None;
        });
    }
}

impl<T: Transport> ChatSession<T> {
    /// Creates a new chat session with an empty history.
    pub fn new(transport: T, config: ChatConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            transport,
            config,
            state,
        }
    }

    /// A receiver that is notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// The current history.
    pub fn history(&self) -> Arc<Vec<ChatMessage>> {
        Arc::clone(&self.state.borrow().history)
    }

    /// Returns true while a send is in flight.
    pub fn is_busy(&self) -> bool {
        self.state.borrow().busy
    }

    /// Token accounting of the last completed turn.
    pub fn usage(&self) -> Option<TokenUsage> {
        self.state.borrow().usage
    }

    /// Index of the placeholder being filled, while busy.
    pub fn active_index(&self) -> Option<usize> {
        self.state.borrow().active
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Changes the model used for later turns.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.model = model.into();
    }

    /// Sets or clears the system prompt.
    ///
    /// A conversation that already starts with a system message keeps it until [`reset`].
    ///
    /// [`reset`]: ChatSession::reset
    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.config.system_prompt = prompt;
    }

    /// Sets the memory window.
    pub fn set_memory_turns(&mut self, turns: usize) {
        self.config.memory_turns = turns;
    }

    /// Clears the conversation, keeping only a leading system message.
    pub fn reset(&mut self) {
        self.state.send_modify(|snapshot| {
            let system = snapshot
                .history
                .first()
                .filter(|message| message.role == Role::System)
                .cloned();
            snapshot.history = Arc::new(system.into_iter().collect());
            snapshot.usage = None;
        });
    }

    /// Lists the models the endpoint offers.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.transport.list_models(&self.config).await
    }

    /// Refreshes the model listing and makes sure the selected model is one of them.
    ///
    /// Returns the selection, or `None` when the endpoint lists nothing.
    pub async fn discover_model(&mut self) -> Result<Option<String>> {
        let available = self.list_models().await?;
        let previous = Some(self.config.model.as_str()).filter(|m| !m.is_empty());
        let selected = resolve_model(&available, previous);
        if let Some(model) = &selected {
            self.config.model = model.clone();
        }
        Ok(selected)
    }

    /// Sends a user message and applies the response to the history.
    pub async fn send_message(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        self.send_message_with_renderer(text, attachments, cancel, &mut ())
            .await
    }

    /// Sends a user message, reporting each applied fragment and the terminal notice to
    /// `renderer`.
    ///
    /// Errors never escape: a failed turn ends with a diagnostic notice in the assistant
    /// message and [`TurnOutcome::Failed`].
    pub async fn send_message_with_renderer(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
        cancel: CancellationToken,
        renderer: &mut dyn Renderer,
    ) -> TurnOutcome {
        let start = Instant::now();
        SESSION_TURNS.click();
        let config = self.config.clone();

        let user = ChatMessage::user(text)
            .with_attachments(attachments.iter().map(Attachment::to_data_uri).collect());
        let history = compact(
            &self.history(),
            user,
            config.memory_turns,
            config.effective_system_prompt(),
        );
        let index = history.len() - 1;
        let request = build_request(&config.model, &history);

        self.state.send_modify(|snapshot| {
            snapshot.history = Arc::new(history);
            snapshot.busy = true;
            snapshot.active = Some(index);
            snapshot.usage = None;
        });
        let _guard = IdleGuard { state: &self.state };
        tracing::debug!(model = %config.model, messages = request.messages.len(), "sending");

        let outcome = match self
            .run_turn(&config, &request, index, &cancel, renderer)
            .await
        {
            Ok(usage) => {
                self.complete(index, usage);
                if let Some(usage) = &usage {
                    renderer.print_usage(usage);
                }
                tracing::debug!(?usage, "completed");
                TurnOutcome::Completed
            }
            Err(err) if cancel.is_cancelled() || err.is_abort() => {
                SESSION_CANCELLATIONS.click();
                self.append_notice(index, STOPPED_NOTICE);
                renderer.print_notice(STOPPED_NOTICE);
                tracing::debug!("cancelled");
                TurnOutcome::Cancelled
            }
            Err(err) => {
                SESSION_FAILURES.click();
                let notice = format!("{FAILURE_NOTICE} {err}");
                self.append_notice(index, &notice);
                renderer.print_notice(&notice);
                tracing::warn!(error = %err, "turn failed");
                TurnOutcome::Failed(err)
            }
        };
        renderer.finish_response();
        SESSION_TURN_DURATION.add(start.elapsed().as_secs_f64());
        outcome
    }

    /// Drive one request to the end of its response.  Cancellation surfaces as
    /// [`Error::Abort`].
    async fn run_turn(
        &self,
        config: &ChatConfig,
        request: &ChatCompletionRequest,
        index: usize,
        cancel: &CancellationToken,
        renderer: &mut dyn Renderer,
    ) -> Result<Option<TokenUsage>> {
        config.validate()?;
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::abort("cancelled while sending")),
            body = self.transport.chat_completion(config, request) => body?,
        };
        if cancel.is_cancelled() {
            return Err(Error::abort("cancelled while sending"));
        }

        match body {
            ResponseBody::Complete(bytes) => {
                let chunk: ChatCompletionChunk = serde_json::from_slice(&bytes)?;
                self.apply_chunk(index, &chunk, renderer);
                Ok(chunk.usage)
            }
            ResponseBody::Streaming(stream) => {
                tracing::debug!("streaming");
                self.consume(stream, index, cancel, renderer).await
            }
        }
    }

    async fn consume(
        &self,
        stream: BoxStream<'static, Result<bytes::Bytes>>,
        index: usize,
        cancel: &CancellationToken,
        renderer: &mut dyn Renderer,
    ) -> Result<Option<TokenUsage>> {
        let records = process_records(stream);
        futures::pin_mut!(records);

        let mut usage = None;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::abort("cancelled while streaming"));
            }
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::abort("cancelled while streaming")),
                next = records.next() => next,
            };
            // A record obtained in the same poll as the cancellation is not applied.
            if cancel.is_cancelled() {
                return Err(Error::abort("cancelled while streaming"));
            }
            match next {
                None => return Ok(usage),
                Some(Err(err)) => return Err(err),
                Some(Ok(StreamRecord::Chunk(chunk))) => {
                    usage = chunk.usage.or(usage);
                    self.apply_chunk(index, &chunk, renderer);
                }
                Some(Ok(StreamRecord::Trailing(chunk))) => {
                    tracing::debug!("applying unterminated trailing record");
                    usage = chunk.usage.or(usage);
                    self.apply_chunk(index, &chunk, renderer);
                }
                Some(Ok(StreamRecord::Malformed { text, error })) => {
                    tracing::debug!(%error, record = %text, "skipping malformed record");
                }
            }
        }
    }

    fn apply_chunk(&self, index: usize, chunk: &ChatCompletionChunk, renderer: &mut dyn Renderer) {
        let Some(fragment) = chunk.fragment() else {
            return;
        };
        self.update_message(index, |message| message.apply_fragment(fragment));
        renderer.print_text(fragment);
    }

    fn append_notice(&self, index: usize, notice: &str) {
        self.update_message(index, |message| message.append_notice(notice));
    }

    fn complete(&self, index: usize, usage: Option<TokenUsage>) {
        self.state.send_modify(|snapshot| {
            let history = Arc::make_mut(&mut snapshot.history);
            for message in history.iter_mut() {
                message.usage = None;
            }
            if let Some(message) = history.get_mut(index) {
                if message.is_streaming() {
                    message.content.clear();
                }
                message.usage = usage;
            }
            snapshot.usage = usage;
        });
    }

    /// Edit one entry and publish the result as a new history.
    ///
    /// Readers holding the previous `Arc` keep seeing the previous history.
    fn update_message(&self, index: usize, edit: impl FnOnce(&mut ChatMessage)) {
        self.state.send_modify(|snapshot| {
            if let Some(message) = Arc::make_mut(&mut snapshot.history).get_mut(index) {
                edit(message);
            }
        });
    }
}
