use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, instrument, warn};

use llamachat_core::{AppConfig, ChatSession};

use crate::{ChatEvent, ChatRequest, OllamaApi, OllamaClient, SessionController};

/// Chat controller - drives the session model via &mut references
pub struct ChatService {
    runtime: Arc<Runtime>,
    controller: SessionController,
    rx: Option<Receiver<ChatEvent>>,
}

impl ChatService {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        let controller = SessionController::new(runtime.handle().clone());
        Self {
            runtime,
            controller,
            rx: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.rx.is_some()
    }

    /// Send the user's text to `model` against the configured server.
    ///
    /// Returns false when nothing was sent (empty input or no model).
    pub fn send_message(&mut self, session: &mut ChatSession, model: &str, text: &str, config: &AppConfig) -> bool {
        if !Self::accepts(session, model, text) {
            return false;
        }

        let client = match OllamaClient::new(&config.connection) {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build HTTP client: {}", e);
                session.error = Some(e.to_string());
                return false;
            }
        };

        self.send_with(session, Arc::new(client), model, text, config);
        true
    }

    /// Same as [`send_message`](Self::send_message) against an explicit server.
    #[instrument(skip_all, fields(model = %model, host = %api.base_url()))]
    pub fn send_with(
        &mut self,
        session: &mut ChatSession,
        api: Arc<dyn OllamaApi>,
        model: &str,
        text: &str,
        config: &AppConfig,
    ) {
        if !Self::accepts(session, model, text) {
            return;
        }

        // The controller stops the running exchange before starting this one
        if session.streaming {
            session.cancel();
        }

        session.start(model, text.trim());
        let request = ChatRequest::build(model, &session.transcript, &config.generation);
        info!(messages = request.messages.len(), "Sending chat message");

        let rx = self.runtime.block_on(self.controller.send(api, request));
        self.rx = Some(rx);
    }

    fn accepts(session: &mut ChatSession, model: &str, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        if model.is_empty() {
            session.set_status("Please select a model first");
            return false;
        }
        true
    }

    /// Drain pending events into the session. Call once per frame.
    pub fn poll(&mut self, session: &mut ChatSession) {
        let Some(mut receiver) = self.rx.take() else { return };

        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    if Self::handle_event(session, event) {
                        return;
                    }
                }
                Err(TryRecvError::Empty) => {
                    self.rx = Some(receiver);
                    return;
                }
                Err(TryRecvError::Disconnected) => {
                    if session.streaming {
                        warn!("Chat worker stopped without a result");
                        session.fail("Response ended unexpectedly".to_string());
                    }
                    return;
                }
            }
        }
    }

    /// Returns true once the event ends the exchange.
    fn handle_event(session: &mut ChatSession, event: ChatEvent) -> bool {
        match event {
            ChatEvent::Chunk { content } => {
                debug!(len = content.len(), "Chat fragment");
                session.append_fragment(&content);
                false
            }
            ChatEvent::Complete { content } => {
                session.complete(content);
                true
            }
            ChatEvent::Error { message } => {
                session.fail(message);
                true
            }
        }
    }

    pub fn cancel(&mut self, session: &mut ChatSession) {
        self.controller.cancel();
        self.rx = None;
        if session.streaming {
            session.cancel();
        }
    }

    /// Stop any running exchange and empty the transcript. Settings are untouched.
    pub fn clear(&mut self, session: &mut ChatSession) {
        self.cancel(session);
        session.clear();
        info!("Conversation cleared");
    }
}
