//! `FadeChat`: self-destructing encrypted chat in the terminal.
//!
//! Joins a room on a WebSocket relay. Every message is sealed with a key
//! derived from the shared secret (or the channel password), shown for ten
//! seconds, and acknowledged once the other side has actually seen it.
//!
//! ```bash
//! cargo run --bin fadechat -- --relay-url ws://127.0.0.1:8080/ws \
//!     --chat-id room1 --password secret1
//!
//! # Or via environment variables
//! FADECHAT_RELAY_URL=ws://127.0.0.1:8080/ws FADECHAT_CHAT_ID=room1 \
//!     FADECHAT_PASSWORD=secret1 cargo run --bin fadechat
//! ```

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use fadechat::app::App;
use fadechat::config::{CliArgs, ClientConfig};
use fadechat::net::{self, NetCommand, NetHandle};
use fadechat::ui;

/// How long to wait for the session task to close on quit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Configuration errors stop us before anything touches the network.
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fadechat: {e}");
            return ExitCode::FAILURE;
        }
    };
    let net_config = match config.to_net_config() {
        Ok(n) => n,
        Err(e) => {
            eprintln!("fadechat: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging before terminal setup (logs go to file, not stdout).
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(chat_id = %config.chat_id, key_derivation = %config.key_derivation, "fadechat starting");

    let handle = match net::spawn_net(net_config).await {
        Ok(h) => h,
        Err(e) => {
            eprintln!("fadechat: could not join {}: {e}", config.chat_id);
            return ExitCode::FAILURE;
        }
    };

    match run_terminal(handle, &config).await {
        Ok(()) => {
            tracing::info!("fadechat exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("fadechat: terminal error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, since ratatui owns the terminal).
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("fadechat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Set up the terminal, run the UI loop, and restore the terminal.
async fn run_terminal(handle: NetHandle, config: &ClientConfig) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, handle, config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

/// Main application loop.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    handle: NetHandle,
    config: &ClientConfig,
) -> io::Result<()> {
    let NetHandle {
        commands,
        mut events,
        task,
    } = handle;
    let mut app = App::new(&config.chat_id).with_timestamp_format(&config.timestamp_format);

    loop {
        // Step 1: Apply all pending NetEvents (non-blocking).
        while let Ok(event) = events.try_recv() {
            app.apply_event(event);
        }

        // Step 2: Draw, and report which inbound lines are on screen.
        let mut drawn = Vec::new();
        terminal.draw(|frame| drawn = ui::draw(frame, &app))?;
        if let Some(report) = app.visibility_report(&drawn, Instant::now()) {
            dispatch(&mut app, &commands, report);
        }

        // Step 3: Poll for terminal input events.
        if event::poll(config.poll_timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && let Some(cmd) = app.handle_key_event(key)
        {
            dispatch(&mut app, &commands, cmd);
        }

        if app.should_quit {
            let _ = commands.try_send(NetCommand::Shutdown);
            // A full queue still drains to `None` once the sender is gone.
            drop(commands);
            if let Ok(Ok(stats)) = tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                tracing::info!(?stats, "session finished");
            }
            return Ok(());
        }
    }
}

/// Hand a command to the session task, noting in the status bar when it
/// cannot take it.
fn dispatch(app: &mut App, commands: &mpsc::Sender<NetCommand>, cmd: NetCommand) {
    match commands.try_send(cmd) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            app.notice = Some("Network busy, try again".to_string());
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            app.notice = Some("Network disconnected".to_string());
        }
    }
}
