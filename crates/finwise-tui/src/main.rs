use anyhow::Result;
use finwise_core::{Config, HttpEndpoint, RequestController};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

const LOG_FILE: &str = "finwise-tui.log";

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logging()?;

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let endpoint = HttpEndpoint::from_config(&config)?;
    info!(endpoint = endpoint.url(), "starting finwise-tui");

    let (controller, controller_events) = RequestController::new(endpoint);
    let controller = controller.with_prompt_limit(config.prompt_limit());
    let mut app = App::new(&config, controller);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(controller_events);

    let result = run(&mut app, &mut terminal, &mut events).await;

    // Abandon any in-flight request before the view goes away
    app.shutdown();
    tui::restore()?;
    result
}

async fn run(app: &mut App, terminal: &mut tui::Tui, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}

/// Log to a file in the config directory; the terminal belongs to the UI.
fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = Config::config_dir()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FINWISE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(guard)
}
