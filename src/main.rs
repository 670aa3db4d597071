use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use finwise_core::input::limit_characters;
use finwise_core::{Config, ControllerEvent, HttpEndpoint, LifecycleState, RequestController, SubmitOutcome};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "finwise")]
#[command(about = "Get AI-powered guidance on debt and financial management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe your financial situation and stream guidance
    Ask {
        /// Your financial worries or questions, in English or Filipino
        situation: String,
        /// Generation endpoint URL (overrides config and FINWISE_ENDPOINT)
        #[arg(short, long)]
        endpoint: Option<String>,
    },
    /// Show the configuration, or update it
    Config {
        /// Save a new generation endpoint URL
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FINWISE_LOG").unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|_| Config::new());

    match cli.command {
        Commands::Ask { situation, endpoint } => ask(&config, &situation, endpoint.as_deref()).await,
        Commands::Config { endpoint } => {
            show_or_update_config(&config, endpoint.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn ask(config: &Config, situation: &str, endpoint_override: Option<&str>) -> Result<ExitCode> {
    let url = endpoint_override
        .map(str::to_string)
        .unwrap_or_else(|| config.endpoint_url());
    let endpoint = HttpEndpoint::with_timeout(&url, config.request_timeout())?;

    let (prompt, truncated) = limit_characters(situation, config.prompt_limit());
    if truncated {
        eprintln!("{}", "You have reached the maximum number of characters.".yellow());
    }

    let (controller, events) = RequestController::new(endpoint);
    let mut controller = controller.with_prompt_limit(config.prompt_limit());

    eprintln!("{}", "💬 Getting financial guidance...".dimmed());
    let printer = tokio::spawn(print_events(events));

    let outcome = controller.submit(prompt).await;
    let state = controller.state().clone();
    // Closing the controller ends the event channel so the printer can finish
    drop(controller);
    printer.await?;

    let outcome = outcome?;
    match outcome {
        SubmitOutcome::Completed => {
            println!();
        }
        SubmitOutcome::NoContent => {
            eprintln!("{}", "No guidance was returned.".yellow());
        }
        SubmitOutcome::Failed | SubmitOutcome::Abandoned => {
            if let LifecycleState::Failed(failure) = state {
                eprintln!("\n{}", failure.user_message().red().bold());
                if let Some(info) = failure.rate_limit.filter(|info| !info.is_empty()) {
                    eprintln!(
                        "{}",
                        format!(
                            "limit: {}  remaining: {}  reset: {}",
                            info.limit.as_deref().unwrap_or("-"),
                            info.remaining.as_deref().unwrap_or("-"),
                            info.reset_at.as_deref().unwrap_or("-"),
                        )
                        .dimmed()
                    );
                }
            }
        }
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Write each decoded increment to stdout as it arrives.
async fn print_events(mut events: mpsc::UnboundedReceiver<ControllerEvent>) {
    let mut stdout = std::io::stdout();
    while let Some(event) = events.recv().await {
        if let ControllerEvent::TextUpdated { chunk, .. } = event {
            let _ = stdout.write_all(chunk.as_bytes());
            let _ = stdout.flush();
        }
    }
}

fn show_or_update_config(config: &Config, endpoint: Option<&str>) -> Result<()> {
    if let Some(endpoint) = endpoint {
        Config::save_endpoint(endpoint)?;
        println!("{} {}", "Saved endpoint:".green(), endpoint.bold());
        return Ok(());
    }

    println!("\n{}", "⚙️  FinWise Configuration".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    println!("  config file:  {}", Config::get_config_path()?.display().to_string().dimmed());
    println!("  endpoint:     {}", config.endpoint_url().green());
    println!("  max chars:    {}", config.prompt_limit().to_string().bold());
    match config.request_timeout() {
        Some(timeout) => println!("  timeout:      {}s", timeout.as_secs()),
        None => println!("  timeout:      {}", "none".dimmed()),
    }

    Ok(())
}
