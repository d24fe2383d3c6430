use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use charla::app::App;
use charla::config::Config;
use charla::handler;
use charla::openai::OpenAiClient;
use charla::tui::{self, EventHandler};
use charla::ui;

const TICK_RATE: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "charla")]
#[command(about = "Terminal chat client for OpenAI-compatible completion APIs")]
struct Cli {
    /// Model to chat with (overrides the config file)
    #[arg(short, long)]
    model: Option<String>,

    /// API base URL, e.g. http://localhost:11434/v1 for Ollama
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the models the endpoint serves
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let config = Config::load().unwrap_or_else(|_| Config::new());

    match cli.command {
        Some(Commands::Models) => list_models(&config, cli.base_url).await,
        None => run_chat(&config, cli.model, cli.base_url).await,
    }
}

async fn run_chat(
    config: &Config,
    model: Option<String>,
    base_url: Option<String>,
) -> Result<()> {
    let mut app = App::new(config, model, base_url)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK_RATE);

    let result = run_loop(&mut terminal, &mut events, &mut app).await;

    // Abandon any outstanding request before tearing the screen down
    app.abort_pending();
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut tui::Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::draw(frame, app))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await,
            None => break,
        }
    }
    Ok(())
}

async fn list_models(config: &Config, base_url: Option<String>) -> Result<()> {
    let url = config.resolved_base_url(base_url.as_deref());
    let client = OpenAiClient::new(&url, config.resolved_api_key())?;

    match client.list_models().await {
        Ok(models) if models.is_empty() => println!("No models served at {url}"),
        Ok(models) => {
            for model in models {
                println!("{model}");
            }
        }
        Err(err) => {
            eprintln!("Error listing models from {url}: {err}");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Log to a file under the config dir when CHARLA_LOG is set; the terminal
/// belongs to the TUI.
fn init_tracing() -> Result<()> {
    let Ok(filter) = std::env::var("CHARLA_LOG") else {
        return Ok(());
    };

    let path = Config::log_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
