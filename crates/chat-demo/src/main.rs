mod states;

use anyhow::{Context, Result};
use chat_machine::{Machine, MachineConfig, SharedMachine};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use states::HelloState;

/// Console host for the chat state machine: every stdin line is one turn.
#[derive(Debug, Parser)]
#[command(name = "chat-demo")]
struct Args {
    /// Session key used for lines without an explicit `/as <key>` prefix
    #[arg(long, default_value = "console")]
    session: String,

    /// Maximum chained transitions per turn; CHAT_MACHINE_MAX_TRANSITION_CHAIN applies when omitted
    #[arg(long)]
    max_transition_chain: Option<usize>,
}

/// One parsed stdin line.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    /// `/session <key>` switches the default session
    Switch(&'a str),
    /// `/as <key> <text>` sends one message from another session
    As { key: &'a str, text: &'a str },
    Say(&'a str),
    Quit,
    Empty,
}

fn parse_line(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if line == "/quit" {
        return Command::Quit;
    }
    if let Some(rest) = line.strip_prefix("/session ") {
        let key = rest.trim();
        if !key.is_empty() {
            return Command::Switch(key);
        }
    }
    if let Some(rest) = line.strip_prefix("/as ") {
        let rest = rest.trim_start();
        if let Some((key, text)) = rest.split_once(char::is_whitespace) {
            return Command::As { key, text: text.trim() };
        }
    }
    Command::Say(line)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chat_demo=info,chat_machine=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = match args.max_transition_chain {
        Some(limit) => MachineConfig::default().with_max_transition_chain(limit),
        None => MachineConfig::from_env().context("reading machine configuration")?,
    };

    let mut machine =
        Machine::with_config(HelloState, config).context("building the state machine")?;
    machine.set_on_enter_hook(|session| {
        info!(
            session = session.key(),
            state = session.current_state_name().unwrap_or_default(),
            "entering state"
        );
    });
    machine.set_on_exit_hook(|session| {
        info!(
            session = session.key(),
            state = session.current_state_name().unwrap_or_default(),
            "leaving state"
        );
    });
    let machine = SharedMachine::new(machine);

    info!(session = %args.session, "chat demo running; type /quit or press Ctrl-C to exit");
    let mut current = args.session;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let (key, text) = match parse_line(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Switch(key) => {
                current = key.to_string();
                info!(session = %current, "switched session");
                continue;
            }
            Command::As { key, text } => (key.to_string(), text.to_string()),
            Command::Say(text) => (current.clone(), text.to_string()),
        };

        match machine.run_turn(&text, &key).await {
            Ok(output) => print!("{}", output),
            Err(e) => warn!(session = %key, error = %e, "turn failed"),
        }
    }

    let remaining = machine.lock().await.session_count();
    info!(sessions = remaining, "chat demo stopped");
    Ok(())
}
