//! Terminal front end for murmur.
//!
//! A thin shell over [`murmur_client::Runtime`]: stdin lines become
//! [`SessionCommand`](murmur_client::SessionCommand)s and published
//! [`SessionChange`](murmur_client::SessionChange)s become stdout lines. All
//! session logic lives in `murmur-client`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod render;

use std::{future::Future, io};

use murmur_client::{
    ConfigError, ModerationError, RuntimeError, SessionCommand, transport::TransportError,
};
use thiserror::Error;
use tokio::sync::mpsc;

/// Command that leaves the room.
pub const QUIT_COMMAND: &str = "/quit";

/// Errors that end the program.
#[derive(Error, Debug)]
pub enum CliError {
    /// Arguments do not form a valid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The moderation client could not be built.
    #[error(transparent)]
    Moderation(#[from] ModerationError),

    /// The session ended with an error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError<TransportError>),
}

/// Leave the room once `signal` fires.
///
/// Used with `tokio::signal::ctrl_c()` so an interrupt still runs session
/// teardown. A signal that cannot be installed leaves nothing to wait for.
pub async fn leave_on<F>(signal: F, commands: mpsc::Sender<SessionCommand>)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::info!("interrupted, leaving");
            let _ = commands.send(SessionCommand::Leave).await;
        },
        Err(err) => tracing::warn!(error = %err, "cannot listen for interrupt"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_sends_leave() {
        let (commands, mut command_rx) = mpsc::channel(1);
        leave_on(async { Ok(()) }, commands).await;
        assert_eq!(command_rx.recv().await, Some(SessionCommand::Leave));
    }

    #[tokio::test]
    async fn failed_signal_sends_nothing() {
        let (commands, mut command_rx) = mpsc::channel(1);
        leave_on(async { Err(io::Error::other("no signal handler")) }, commands).await;
        assert_eq!(command_rx.recv().await, None);
    }
}
