//! Chat request lifecycle: at most one streaming exchange per controller.

use std::sync::Arc;

use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{ChatRequest, OllamaApi, OllamaError};

const EVENT_BUFFER: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Incremental, non-empty text fragment
    Chunk { content: String },
    /// Full accumulated response; the request is finished
    Complete { content: String },
    Error { message: String },
}

struct ActiveRequest {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the single in-flight chat request.
///
/// Each `send` gets its own channel, and the previous request is cancelled and
/// awaited first, so listeners never see fragments from two requests.
pub struct SessionController {
    runtime: Handle,
    active: Option<ActiveRequest>,
}

impl SessionController {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            active: None,
        }
    }

    #[instrument(skip_all, fields(model = %request.model))]
    pub async fn send(
        &mut self,
        api: Arc<dyn OllamaApi>,
        request: ChatRequest,
    ) -> mpsc::Receiver<ChatEvent> {
        self.stop_active().await;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let task = self
            .runtime
            .spawn(run_chat(api, request, cancel.clone(), tx));

        self.active = Some(ActiveRequest { cancel, task });
        rx
    }

    /// Request cancellation without waiting for the task to wind down.
    ///
    /// The task handle is kept so the next `send` can wait for it to finish.
    pub fn cancel(&mut self) {
        if let Some(active) = &self.active {
            if !active.cancel.is_cancelled() {
                info!("Cancelling chat request");
                active.cancel.cancel();
            }
        }
    }

    /// True while a request is running and has not been cancelled
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.cancel.is_cancelled() && !active.task.is_finished())
    }

    async fn stop_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if active.task.is_finished() {
            return;
        }

        info!("Stopping previous chat request before starting a new one");
        active.cancel.cancel();
        if let Err(e) = active.task.await {
            warn!("Previous chat task ended abnormally: {}", e);
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Drive one streaming chat call, reporting through `tx`.
///
/// Emits nothing once `cancel` fires; dropping the stream abandons the connection.
pub async fn run_chat(
    api: Arc<dyn OllamaApi>,
    request: ChatRequest,
    cancel: CancellationToken,
    tx: mpsc::Sender<ChatEvent>,
) {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Chat cancelled before the response started");
            return;
        }
        opened = api.chat(&request) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            report_error(&tx, &cancel, e).await;
            return;
        }
    };

    let mut accumulated = String::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(chars = accumulated.len(), "Chat cancelled, discarding partial output");
                return;
            }
            next = stream.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                report_error(&tx, &cancel, e).await;
                return;
            }
            None => {
                report_error(&tx, &cancel, OllamaError::Truncated).await;
                return;
            }
        };

        let content = chunk.content();
        if !content.is_empty() {
            accumulated.push_str(content);
            let event = ChatEvent::Chunk {
                content: content.to_string(),
            };
            if !emit(&tx, &cancel, event).await {
                return;
            }
        }

        if chunk.done {
            info!(chars = accumulated.len(), "Chat response complete");
            emit(&tx, &cancel, ChatEvent::Complete { content: accumulated }).await;
            return;
        }
    }
}

/// Deliver one event unless the request is cancelled first.
///
/// A full channel must not keep the task alive past cancellation, since
/// `send` waits for the previous task before starting the next one.
/// Returns false when the task should stop.
pub(crate) async fn emit<E>(tx: &mpsc::Sender<E>, cancel: &CancellationToken, event: E) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Dropping event after cancellation");
            false
        }
        sent = tx.send(event) => {
            if sent.is_err() {
                debug!("Event receiver dropped");
            }
            sent.is_ok()
        }
    }
}

async fn report_error(tx: &mpsc::Sender<ChatEvent>, cancel: &CancellationToken, e: OllamaError) {
    if cancel.is_cancelled() {
        debug!("Suppressing error after cancellation: {}", e);
        return;
    }

    warn!("Chat request failed: {}", e);
    emit(tx, cancel, ChatEvent::Error { message: e.to_string() }).await;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::{stream, StreamExt};

    use llamachat_core::ModelSummary;

    use crate::{ChatChunk, ChatRequest, ChunkStream, OllamaApi, OllamaError, PullUpdate, ResponseMessage};

    pub fn chunk(content: &str, done: bool) -> Result<ChatChunk, OllamaError> {
        Ok(ChatChunk {
            message: Some(ResponseMessage {
                content: content.to_string(),
            }),
            done,
        })
    }

    pub fn progress(status: &str, total: Option<u64>, completed: Option<u64>) -> Result<PullUpdate, OllamaError> {
        Ok(PullUpdate {
            status: status.to_string(),
            total,
            completed,
            digest: None,
        })
    }

    /// Scripted server. Each call pops the next script; `stall` keeps the
    /// stream open after the scripted items instead of ending it.
    #[derive(Default)]
    pub struct FakeApi {
        pub chats: Mutex<Vec<(Vec<Result<ChatChunk, OllamaError>>, bool)>>,
        pub pulls: Mutex<Vec<(Vec<Result<PullUpdate, OllamaError>>, bool)>>,
        pub models: Mutex<Option<Result<Vec<ModelSummary>, OllamaError>>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl FakeApi {
        pub fn with_chats(chats: Vec<(Vec<Result<ChatChunk, OllamaError>>, bool)>) -> Self {
            Self {
                chats: Mutex::new(chats.into_iter().rev().collect()),
                ..Default::default()
            }
        }

        pub fn with_pulls(pulls: Vec<(Vec<Result<PullUpdate, OllamaError>>, bool)>) -> Self {
            Self {
                pulls: Mutex::new(pulls.into_iter().rev().collect()),
                ..Default::default()
            }
        }

        pub fn with_models(models: Result<Vec<ModelSummary>, OllamaError>) -> Self {
            Self {
                models: Mutex::new(Some(models)),
                ..Default::default()
            }
        }
    }

    fn scripted<T: Send + 'static>(items: Vec<Result<T, OllamaError>>, stall: bool) -> ChunkStream<T> {
        let items = stream::iter(items);
        if stall {
            Box::pin(items.chain(stream::pending()))
        } else {
            Box::pin(items)
        }
    }

    #[async_trait]
    impl OllamaApi for FakeApi {
        fn base_url(&self) -> &str {
            "http://fake:11434"
        }

        async fn list(&self) -> Result<Vec<ModelSummary>, OllamaError> {
            self.models
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(OllamaError::ConnectionRefused(self.base_url().to_string())))
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChunkStream<ChatChunk>, OllamaError> {
            self.requests.lock().unwrap().push(request.clone());
            let (items, stall) = self.chats.lock().unwrap().pop().unwrap_or_default();
            Ok(scripted(items, stall))
        }

        async fn pull(&self, _model: &str) -> Result<ChunkStream<PullUpdate>, OllamaError> {
            let (items, stall) = self.pulls.lock().unwrap().pop().unwrap_or_default();
            Ok(scripted(items, stall))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{chunk, FakeApi};
    use super::*;
    use llamachat_core::{GenerationConfig, Message, Transcript};

    fn request() -> ChatRequest {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hi"));
        ChatRequest::build("llama3.2:latest", &transcript, &GenerationConfig::default())
    }

    async fn drain(mut rx: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn streams_fragments_then_completes() {
        let api = Arc::new(FakeApi::with_chats(vec![(
            vec![chunk("Hel", false), chunk("", false), chunk("lo", false), chunk("", true)],
            false,
        )]));
        let mut controller = SessionController::new(Handle::current());

        let events = drain(controller.send(api, request()).await).await;

        assert_eq!(
            events,
            vec![
                ChatEvent::Chunk { content: "Hel".into() },
                ChatEvent::Chunk { content: "lo".into() },
                ChatEvent::Complete { content: "Hello".into() },
            ]
        );
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn stream_without_done_is_an_error() {
        let api = Arc::new(FakeApi::with_chats(vec![(vec![chunk("partial", false)], false)]));
        let mut controller = SessionController::new(Handle::current());

        let events = drain(controller.send(api, request()).await).await;

        let errors = events.iter().filter(|e| matches!(e, ChatEvent::Error { .. })).count();
        let completions = events.iter().filter(|e| matches!(e, ChatEvent::Complete { .. })).count();
        assert_eq!(errors, 1);
        assert_eq!(completions, 0);
    }

    #[tokio::test]
    async fn transport_error_is_reported_once() {
        let api = Arc::new(FakeApi::with_chats(vec![(
            vec![chunk("a", false), Err(OllamaError::Server("model crashed".into()))],
            false,
        )]));
        let mut controller = SessionController::new(Handle::current());

        let events = drain(controller.send(api, request()).await).await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ChatEvent::Error { message: "Server error: model crashed".into() }
        );
    }

    #[tokio::test]
    async fn new_send_cancels_previous_request() {
        let api = Arc::new(FakeApi::with_chats(vec![
            (vec![chunk("first", false)], true),
            (vec![chunk("second", false), chunk("", true)], false),
        ]));
        let mut controller = SessionController::new(Handle::current());

        let mut first = controller.send(api.clone(), request()).await;
        assert_eq!(
            first.recv().await,
            Some(ChatEvent::Chunk { content: "first".into() })
        );
        assert!(controller.is_active());

        let second = controller.send(api.clone(), request()).await;

        // The first task has already stopped: its channel is closed and empty
        assert_eq!(first.recv().await, None);

        let events = drain(second).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Chunk { content: "second".into() },
                ChatEvent::Complete { content: "second".into() },
            ]
        );
        assert_eq!(api.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancel_suppresses_further_events() {
        let api = Arc::new(FakeApi::with_chats(vec![(vec![chunk("one", false)], true)]));
        let mut controller = SessionController::new(Handle::current());

        let mut rx = controller.send(api, request()).await;
        assert_eq!(rx.recv().await, Some(ChatEvent::Chunk { content: "one".into() }));

        controller.cancel();

        assert!(!controller.is_active());
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn new_send_is_not_blocked_by_a_full_unread_channel() {
        let flood: Vec<_> = (0..150).map(|i| chunk(&format!("t{i} "), false)).collect();
        let api = Arc::new(FakeApi::with_chats(vec![
            (flood, true),
            (vec![chunk("fresh", false), chunk("", true)], false),
        ]));
        let mut controller = SessionController::new(Handle::current());

        let mut stale = controller.send(api.clone(), request()).await;
        assert!(stale.recv().await.is_some());
        // Let the first task fill the channel while nobody reads it
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let second = tokio::time::timeout(
            std::time::Duration::from_secs(3),
            controller.send(api.clone(), request()),
        )
        .await
        .expect("second send waited on a cancelled request");

        let events = drain(second).await;
        assert_eq!(events.last(), Some(&ChatEvent::Complete { content: "fresh".into() }));
        drop(stale);
    }

    #[tokio::test]
    async fn send_after_cancel_waits_for_the_cancelled_task() {
        let api = Arc::new(FakeApi::with_chats(vec![
            (vec![chunk("old", false)], true),
            (vec![chunk("new", false), chunk("", true)], false),
        ]));
        let mut controller = SessionController::new(Handle::current());

        let mut old = controller.send(api.clone(), request()).await;
        assert!(old.recv().await.is_some());
        controller.cancel();

        let new = controller.send(api.clone(), request()).await;

        // send only returns once the cancelled task has dropped its sender
        assert!(matches!(old.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
        assert_eq!(drain(new).await.len(), 2);
    }
}
