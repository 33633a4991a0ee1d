//! Agent CLI - run prompts through Claude Code, Codex or Gemini.

mod display;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agent_cli_sdk::stream::EventRules;
use agent_cli_sdk::{
    AgentError, Backend, Client, ConfigLoader, ExecuteOptions, ExecutionResponse, Session,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Claude,
    Codex,
    Gemini,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Claude => Backend::Claude,
            BackendArg::Codex => Backend::Codex,
            BackendArg::Gemini => Backend::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "agent-cli",
    about = "Run prompts through command-line AI agents",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Backend to use; defaults to the configured one.
    #[arg(short, long, value_enum, global = true)]
    backend: Option<BackendArg>,

    /// Model override.
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Working directory for the agent.
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Per-call timeout in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Extract a JSON value from the answer.
    #[arg(long, global = true)]
    json: bool,

    /// Echo raw stdout instead of rendered events.
    #[arg(long, global = true)]
    raw: bool,

    /// Config file path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write execution logs under this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one prompt.
    Run {
        /// The prompt to send.
        prompt: String,
        /// Resume an existing backend session.
        #[arg(long)]
        resume: Option<String>,
    },
    /// Multi-turn conversation reading one prompt per stdin line.
    Chat {
        /// Resume an existing backend session.
        #[arg(long)]
        resume: Option<String>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Options shared by every call, wired to the live display.
fn build_options(cli: &Cli, client: &Client, streamed: &Arc<AtomicBool>) -> ExecuteOptions {
    let mut options = ExecuteOptions::new();
    if let Some(model) = &cli.model {
        options = options.model(model.clone());
    }
    if let Some(cwd) = &cli.cwd {
        options = options.cwd(cwd.clone());
    }
    if let Some(ms) = cli.timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }
    if cli.json {
        options = options.json_output(None);
    }
    if let Some(dir) = &cli.log_dir {
        options = options.log_dir(dir.clone());
    }

    if cli.raw {
        return options.on_output(display::print_raw);
    }
    let rules: Arc<dyn EventRules> = Arc::from(client.adapter().event_rules(&options));
    let streamed = Arc::clone(streamed);
    options.on_event(move |event| {
        for signal in rules.signals(event) {
            if display::print_signal(&signal) {
                streamed.store(true, Ordering::Relaxed);
            }
        }
    })
}

fn print_response(response: &ExecutionResponse, json: bool, streamed: &AtomicBool) {
    if json {
        match serde_json::to_string_pretty(&response.data) {
            Ok(pretty) => println!("{pretty}"),
            Err(e) => display::print_error(&e.to_string()),
        }
    } else if !streamed.swap(false, Ordering::Relaxed) {
        println!("{}", response.text());
    }
    display::print_summary(response);
}

async fn run(cli: Cli) -> Result<ExitCode, AgentError> {
    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = loader.load()?;
    let client = Client::from_config(&config, cli.backend.map(Into::into));
    let streamed = Arc::new(AtomicBool::new(false));
    let options = build_options(&cli, &client, &streamed);

    match cli.command {
        Commands::Run { ref prompt, ref resume } => {
            display::print_session_start(client.adapter().name(), resume.as_deref());
            let options = match resume {
                Some(id) => options.resume(id.clone()),
                None => options,
            };
            let response = client.execute(prompt, options).await?;
            print_response(&response, cli.json, &streamed);
            Ok(if response.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Chat { ref resume } => {
            let options = match resume {
                Some(id) => options.resume(id.clone()),
                None => options,
            };
            let session = client.create_session(Some(options))?;
            display::print_session_start(client.adapter().name(), resume.as_deref());
            abort_on_ctrl_c(session.clone());
            chat(&session, cli.json, &streamed).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn abort_on_ctrl_c(session: Session) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            session.abort().await;
        }
    });
}

async fn chat(session: &Session, json: bool, streamed: &AtomicBool) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                display::print_error(&format!("failed to read stdin: {e}"));
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match session.send(&line, None).await {
            Ok(response) => print_response(&response, json, streamed),
            Err(AgentError::Aborted | AgentError::SessionClosed) => break,
            // The session survives a failed turn; the user may retry.
            Err(e) => display::print_error(&e.to_string()),
        }
    }
    session.abort().await;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::from(2)
        }
    }
}
