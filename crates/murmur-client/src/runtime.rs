//! Async runtime for the session engine.
//!
//! The runtime drives the event loop, coordinating between:
//! - [`SessionController`]: chat session state machine
//! - [`Driver`]: platform-specific transport I/O
//! - [`ModerationService`]: external moderation calls
//!
//! Transport frames, presentation commands and moderation completions are
//! multiplexed with `tokio::select!` and handed to the controller one at a
//! time, so no two events are ever processed concurrently. Moderation calls run
//! on spawned tasks and come back through a channel; a frame that arrives while
//! a verdict is outstanding is processed immediately.

use std::{collections::VecDeque, future::Future};

use murmur_core::Environment;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::{
    config::SessionConfig,
    error::SessionError,
    event::{SessionAction, SessionChange, SessionEvent},
    moderation::{ModerationError, Verdict},
    session::SessionController,
};

/// Abstracts the transport for the runtime.
///
/// # Implementations
///
/// - **Production**: [`WebSocketDriver`](crate::transport::WebSocketDriver)
///   (feature `transport`)
/// - **Tests**: in-memory channels
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the transport to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened.
    fn connect(&mut self, endpoint: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed or the write fails.
    fn send_frame(&mut self, frame: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receive the next text frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the transport (or it was
    /// never opened). Must be cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport broke instead of closing.
    fn recv_frame(&mut self) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    /// Release the transport. Idempotent.
    fn stop(&mut self);
}

/// Abstracts the moderation service for the runtime.
///
/// Cloned into spawned tasks, one per call.
pub trait ModerationService: Clone + Send + Sync + 'static {
    /// Analyze one outgoing text.
    fn analyze(&self, text: String)
    -> impl Future<Output = Result<Verdict, ModerationError>> + Send;

    /// Read the room's moderation count.
    fn fetch_count(&self) -> impl Future<Output = Result<u64, ModerationError>> + Send;
}

/// Commands from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Send a chat message.
    SendText(String),
    /// Leave the room and end the session.
    Leave,
}

/// Errors that end [`Runtime::run`].
#[derive(Error, Debug)]
pub enum RuntimeError<E: std::error::Error + 'static> {
    /// The session could not be started.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The transport could not be opened.
    #[error("failed to open transport: {0}")]
    Connect(#[source] E),
}

enum Wake<F> {
    Frame(Result<Option<String>, F>),
    Command(Option<SessionCommand>),
    Completion(SessionEvent),
}

/// Runtime that executes a [`SessionController`]'s actions.
///
/// The driver is stopped on every exit path, including when the runtime is
/// dropped mid-`run`.
pub struct Runtime<D, M, E>
where
    D: Driver,
    M: ModerationService,
    E: Environment,
{
    driver: D,
    moderation: M,
    session: SessionController<E>,
    completions_tx: mpsc::UnboundedSender<SessionEvent>,
    completions_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<D, M, E> Runtime<D, M, E>
where
    D: Driver,
    M: ModerationService,
    E: Environment,
{
    /// Create a runtime. Nothing happens until [`Self::run`].
    pub fn new(driver: D, moderation: M, config: &SessionConfig, env: E) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            driver,
            moderation,
            session: SessionController::new(config, env),
            completions_tx,
            completions_rx,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.session.subscribe()
    }

    /// The session state machine.
    pub fn session(&self) -> &SessionController<E> {
        &self.session
    }

    /// Run a session as `identity` until it ends.
    ///
    /// The session ends on [`SessionCommand::Leave`], when the command channel
    /// closes, or when the transport closes or fails. The driver is stopped
    /// before this returns.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Session` if the identity is missing
    /// - `RuntimeError::Connect` if the transport cannot be opened
    pub async fn run(
        &mut self,
        identity: &str,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Result<(), RuntimeError<D::Error>> {
        let actions = self.session.start(identity)?;
        tracing::info!(
            identity = identity.trim(),
            mode = %self.session.moderation_mode(),
            "session starting"
        );
        self.execute(actions).await?;

        while self.session.is_active() {
            let wake = tokio::select! {
                frame = self.driver.recv_frame() => Wake::Frame(frame),
                command = commands.recv() => Wake::Command(command),
                Some(event) = self.completions_rx.recv() => Wake::Completion(event),
            };

            let actions = match wake {
                Wake::Frame(Ok(Some(raw))) => {
                    tracing::debug!(frame = %raw, "frame received");
                    self.session.handle(SessionEvent::FrameReceived(raw))
                },
                Wake::Frame(Ok(None)) => {
                    tracing::info!("transport closed by peer");
                    self.session.handle(SessionEvent::TransportClosed)
                },
                Wake::Frame(Err(err)) => {
                    tracing::warn!(error = %err, "transport failed");
                    self.session.handle(SessionEvent::TransportFailed { reason: err.to_string() })
                },
                Wake::Command(Some(SessionCommand::SendText(text))) => {
                    match self.session.send_text(&text) {
                        Ok(actions) => actions,
                        Err(err) => {
                            tracing::warn!(error = %err, "message not sent");
                            Vec::new()
                        },
                    }
                },
                Wake::Command(Some(SessionCommand::Leave) | None) => break,
                Wake::Completion(event) => self.session.handle(event),
            };
            self.execute(actions).await?;
        }

        let actions = self.session.teardown();
        self.execute(actions).await?;
        tracing::info!("session ended");
        Ok(())
    }

    /// Execute actions, feeding follow-up events back into the session until
    /// nothing is left.
    async fn execute(&mut self, actions: Vec<SessionAction>) -> Result<(), RuntimeError<D::Error>> {
        let mut queue: VecDeque<SessionAction> = actions.into();
        let mut connect_failure = None;

        while let Some(action) = queue.pop_front() {
            match action {
                SessionAction::Connect { endpoint } => match self.driver.connect(&endpoint).await {
                    Ok(()) => {
                        tracing::info!(%endpoint, "transport open");
                        queue.extend(self.session.handle(SessionEvent::TransportOpened));
                    },
                    Err(err) => {
                        let reason = err.to_string();
                        queue.extend(self.session.handle(SessionEvent::TransportFailed { reason }));
                        connect_failure = Some(err);
                    },
                },
                SessionAction::SendFrame(frame) => {
                    tracing::debug!(%frame, "frame sent");
                    if let Err(err) = self.driver.send_frame(frame).await {
                        let reason = err.to_string();
                        queue.extend(self.session.handle(SessionEvent::TransportFailed { reason }));
                    }
                },
                SessionAction::CloseTransport => self.driver.stop(),
                SessionAction::AnalyzeText { request_id, text } => {
                    let service = self.moderation.clone();
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = service.analyze(text).await;
                        // Receiver gone means the runtime is gone; nothing to deliver.
                        let verdict = SessionEvent::ModerationVerdict { request_id, result };
                        let _ = completions.send(verdict);
                    });
                },
                SessionAction::FetchCount => {
                    let service = self.moderation.clone();
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = service.fetch_count().await;
                        let _ = completions.send(SessionEvent::CountFetched(result));
                    });
                },
                SessionAction::Report(incident) => {
                    tracing::warn!(%incident, "session incident");
                },
            }
        }

        match connect_failure {
            Some(err) => Err(RuntimeError::Connect(err)),
            None => Ok(()),
        }
    }
}

impl<D, M, E> Drop for Runtime<D, M, E>
where
    D: Driver,
    M: ModerationService,
    E: Environment,
{
    fn drop(&mut self) {
        self.driver.stop();
    }
}
