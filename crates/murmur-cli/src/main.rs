//! murmur terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Join the local room as alice
//! murmur --nickname alice
//!
//! # Server-counted moderation against a remote deployment
//! MURMUR_NICKNAME=alice murmur \
//!     --endpoint ws://chat.example:8080/ws/chat \
//!     --moderation-url http://moderation.example:5000 \
//!     --moderation-mode server-authoritative
//! ```
//!
//! Every stdin line is sent as a chat message. `/quit` or Ctrl-C leaves the
//! room.

use std::{
    io::{self, Write},
    time::Duration,
};

use clap::Parser;
use murmur_cli::{CliError, QUIT_COMMAND, leave_on, render};
use murmur_client::{
    DEFAULT_CHANGE_CAPACITY, DEFAULT_ENDPOINT, DEFAULT_MODERATION_URL, ModerationConfig,
    ModerationMode, Runtime, SessionChange, SessionCommand, SessionConfig, SystemEnv,
    http::HttpModeration, transport::WebSocketDriver,
};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// murmur chat client
#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(about = "Join a murmur chat room from the terminal")]
#[command(version)]
struct Args {
    /// Name shown to other participants
    #[arg(short, long, env = "MURMUR_NICKNAME")]
    nickname: String,

    /// Chat endpoint (ws:// or wss://)
    #[arg(short, long, env = "MURMUR_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Moderation service base URL
    #[arg(long, env = "MURMUR_MODERATION_URL", default_value = DEFAULT_MODERATION_URL)]
    moderation_url: String,

    /// Moderation policy (client-checked, server-authoritative)
    #[arg(long, env = "MURMUR_MODERATION_MODE", default_value = "client-checked")]
    moderation_mode: ModerationMode,

    /// Moderation request timeout in seconds
    #[arg(long, env = "MURMUR_MODERATION_TIMEOUT", default_value = "10")]
    moderation_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoint: self.endpoint.clone(),
            moderation: ModerationConfig {
                mode: self.moderation_mode,
                base_url: self.moderation_url.clone(),
                request_timeout: Duration::from_secs(self.moderation_timeout),
            },
            change_capacity: DEFAULT_CHANGE_CAPACITY,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr so they never interleave with the chat on stdout.
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let config = args.session_config();
    config.validate()?;

    let moderation = HttpModeration::new(&config.moderation)?;
    let mut runtime = Runtime::new(WebSocketDriver::new(), moderation, &config, SystemEnv::new());

    let printer = tokio::spawn(print_changes(runtime.subscribe()));
    let (commands, command_rx) = mpsc::channel(32);
    tokio::spawn(leave_on(tokio::signal::ctrl_c(), commands.clone()));
    std::thread::spawn(move || read_commands(&commands));

    let result = runtime.run(&args.nickname, command_rx).await;

    // Dropping the runtime closes the change channel and ends the printer.
    drop(runtime);
    if let Err(err) = printer.await {
        tracing::warn!(error = %err, "printer task failed");
    }

    result?;
    Ok(())
}

/// Forward stdin lines as commands until `/quit` or end of input.
///
/// Runs on a dedicated thread: a blocking stdin read must not hold up runtime
/// shutdown when the session ends from the other side.
fn read_commands(commands: &mpsc::Sender<SessionCommand>) {
    for line in io::stdin().lines() {
        let command = match line {
            Ok(line) if line.trim() == QUIT_COMMAND => SessionCommand::Leave,
            Ok(line) => SessionCommand::SendText(line),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read stdin");
                SessionCommand::Leave
            },
        };

        let leaving = command == SessionCommand::Leave;
        if commands.blocking_send(command).is_err() || leaving {
            return;
        }
    }
    let _ = commands.blocking_send(SessionCommand::Leave);
}

/// Print every published change until the session is gone.
async fn print_changes(mut changes: broadcast::Receiver<SessionChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                let mut stdout = io::stdout().lock();
                if writeln!(stdout, "{}", render::change_line(&change)).is_err() {
                    break;
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "output fell behind; changes dropped");
            },
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
