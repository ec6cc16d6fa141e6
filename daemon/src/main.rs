//! echo-agent: wake-word voice command agent
//!
//! Listens for the wake phrase, captures one spoken command, runs the
//! matching system action (or asks a local language model) and speaks the
//! result.
//!
//! The listen/dispatch/speak loop is synchronous and runs on a blocking
//! thread; the async runtime only relays agent events to the log and waits
//! for a shutdown signal.

mod actions;
mod agent;
mod audio;
mod config;
mod error;
mod events;
mod intent;
mod lifecycle;
mod llm;
mod speech;
mod state;
mod voice;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info, trace, warn};
use tracing_subscriber::EnvFilter;

use crate::actions::DesktopActions;
use crate::agent::Agent;
use crate::audio::Microphone;
use crate::config::Config;
use crate::events::AgentEvent;
use crate::intent::Dispatcher;
use crate::lifecycle::ShutdownSignal;
use crate::llm::{GenerativeFallback, LlamaServer};
use crate::speech::WhisperHttp;
use crate::voice::{CommandEngineFactory, VoiceGuard, VoiceSettings};

/// Time left for in-flight blocking work once shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "echo-agent", version, about = "Voice-activated command agent")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "ECHO_CONFIG")]
    config: Option<PathBuf>,

    /// Dispatch one typed command, speak and print the reply, then exit
    #[arg(long, value_name = "COMMAND")]
    text: Option<String>,

    /// Skip the startup greeting
    #[arg(long)]
    no_greeting: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "echo-agent starting");

    // Blocking HTTP clients must be built outside the async runtime
    let (agent, events) = match build_agent(&cli) {
        Ok(built) => built,
        Err(e) => {
            error!(error = format!("{e:#}"), "initialization failed");
            return Err(e);
        }
    };

    if let Some(command) = cli.text.as_deref() {
        match agent.respond_once(command) {
            Some(outcome) => println!("{}", outcome.response),
            None => warn!(command, "command too short to dispatch"),
        }
        return Ok(());
    }

    if !cli.no_greeting {
        agent.greet();
    }

    let running = agent.running();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;

    let result = runtime.block_on(supervise(agent, events));

    // A blocked listen cannot be interrupted; stop after the current call
    running.store(false, Ordering::SeqCst);
    info!("shutting down...");
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    info!("echo-agent stopped");

    result
}

/// Construct every collaborator; any failure here is fatal
fn build_agent(cli: &Cli) -> Result<(Agent, broadcast::Receiver<AgentEvent>)> {
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    info!(
        wake_phrase = %config.wake.phrase,
        llm = %config.llm.endpoint,
        stt = %config.stt.endpoint,
        "configuration loaded"
    );

    let model = LlamaServer::connect(&config.llm).context("generation backend unavailable")?;
    let fallback = GenerativeFallback::new(Box::new(model), &config.llm);

    let working_dir = config.working_dir()?;
    let actions = DesktopActions::from_config(&config.actions, working_dir)
        .context("failed to set up system actions")?;
    let dispatcher = Dispatcher::new(Arc::new(actions), fallback);

    let recognizer = WhisperHttp::new(&config.stt).context("failed to set up speech recognition")?;
    let voice = VoiceGuard::new(
        Box::new(CommandEngineFactory),
        VoiceSettings::from(&config.voice),
        Duration::from_millis(config.voice.cooldown_ms),
    );
    let microphone = Microphone::new(config.capture.energy_threshold);

    let (event_tx, event_rx) = broadcast::channel(64);
    let agent = Agent::new(
        &config,
        Box::new(microphone),
        Box::new(recognizer),
        dispatcher,
        Arc::new(voice),
        event_tx,
    );

    Ok((agent, event_rx))
}

/// Run the agent until it stops or a shutdown signal arrives
async fn supervise(mut agent: Agent, mut events: broadcast::Receiver<AgentEvent>) -> Result<()> {
    let shutdown = ShutdownSignal::new();
    let mut agent_task = tokio::task::spawn_blocking(move || agent.run());

    info!("agent initialized, entering main loop");

    tokio::select! {
        result = &mut agent_task => {
            if let Err(e) = result {
                error!(error = %e, "agent task failed");
            }
        }

        _ = relay_events(&mut events) => {
            info!("agent event channel closed");
        }

        result = shutdown.wait() => {
            result.context("failed to install signal handlers")?;
            info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn relay_events(events: &mut broadcast::Receiver<AgentEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                info!(%event, "agent event");
                if let Ok(json) = serde_json::to_string(&event) {
                    trace!(event = json, "agent event payload");
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "agent event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
