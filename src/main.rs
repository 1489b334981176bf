mod app;
mod config;
mod constants;
mod error;
mod input;
mod player;
mod resolver;
mod state;
mod ui;
mod youtube;

use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::{Config, Overrides};
use constants::constants;
use resolver::{PlayerKind, strategy_for};
use youtube::SearchClient;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Search YouTube, keep a playlist, play videos", long_about = None)]
struct Args {
  /// Playback strategy: 'browser' opens the watch page, 'native' resolves a stream and plays it in mpv
  #[arg(short, long)]
  player: Option<PlayerKind>,

  /// Search API key (overrides the environment and prefs.toml)
  #[arg(long)]
  api_key: Option<String>,

  /// Search endpoint URL
  #[arg(long)]
  endpoint: Option<String>,
}

// --- Logging ---

/// Log to a file under the data dir; the terminal belongs to the UI.
fn init_logging() -> Result<WorkerGuard> {
  let dir = config::log_dir();
  std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, "ytlist.log"));
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Ok(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _guard = init_logging()?;

  let overrides = Overrides { api_key: args.api_key, player: args.player, endpoint: args.endpoint };
  let settings = Config::load().resolve(overrides, std::env::var(&constants().api_key_env).ok())?;
  info!(player = settings.player.label(), endpoint = %settings.endpoint, "starting");

  let client = SearchClient::new(reqwest::Client::new(), &settings.endpoint, settings.api_key)?;
  let app = App::new(client, strategy_for(settings.player));

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, app).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, mut app: App) -> Result<()> {
  loop {
    app.tick().await;

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.player.stop().await?;
  info!("exiting");
  Ok(())
}
