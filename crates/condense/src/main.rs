use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use condense_common::{logger, AppConfig};
use condense_llm::{Condenser, CondenserOptions, GeminiClient, ProcessingMode};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    if let Some(root) = find_project_root() {
        let env_path = root.join(".env");
        if env_path.exists() {
            dotenv::from_path(&env_path).ok();
        }
    } else {
        dotenv::dotenv().ok();
    }
}

#[derive(Parser)]
#[command(name = "condense")]
#[command(about = "Condense - LLM-backed text and transcript condensation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides SERVER_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Condense a single input locally and exit
    Run {
        /// document or transcript
        #[arg(long, default_value = "document")]
        mode: ProcessingMode,

        /// Target length as a fraction of the input (0 < ratio <= 1)
        #[arg(long, default_value_t = 0.5)]
        ratio: f64,

        /// Input file; stdin when omitted or "-"
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let (mut config, diagnostics) = AppConfig::from_env()?;
    if let Some(host) = host {
        config.server_host = host;
    }
    if let Some(port) = port {
        config.server_port = port;
    }
    config.validate()?;

    logger::setup_logging(&config.log_dir, &config.log_level)?;
    diagnostics.emit();

    tracing::info!("Condense starting...");
    tracing::info!("Configuration loaded:");
    tracing::info!("  Bind: {}", config.server_bind_address());
    tracing::info!("  Model: {} (analysis: {})", config.llm_model, config.analysis_model);
    tracing::info!("  Max concurrent: {}", config.max_concurrent);

    println!("Server listening on http://{}", config.server_bind_address());

    condense_server::start_server(config).await?;
    Ok(())
}

fn read_input(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

async fn run(
    mode: ProcessingMode,
    ratio: f64,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let (config, diagnostics) = AppConfig::from_env()?;
    logger::setup_console_logging(&config.log_level)?;
    diagnostics.emit();

    let text = read_input(input.as_ref())?;

    let client = Arc::new(GeminiClient::from_config(&config)?);
    let condenser = Condenser::new(client, CondenserOptions::from_config(&config)?)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight segments");
            on_ctrl_c.cancel();
        }
    });

    let report = condenser
        .condense_with_deadline(&text, ratio, mode, &cancel, config.request_timeout)
        .await?;

    tracing::info!(
        "{} condensed: {} -> {} words ({:.1}% reduction), {} segments, {} failed, {} ms",
        report.mode,
        report.input_words,
        report.output_words,
        report.reduction_percent(),
        report.segments,
        report.segments_failed,
        report.elapsed_ms
    );
    for (role, name) in report.speakers.iter() {
        tracing::info!("  Speaker {}: {}", role, name);
    }

    match output {
        Some(path) => {
            std::fs::write(&path, &report.text)
                .with_context(|| format!("Failed to write output file {}", path.display()))?;
            tracing::info!("Output written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", report.text)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // AppConfig::from_env() also loads .env, but the project root copy wins
    load_dotenv_from_project_root();

    match cli.command {
        Some(Commands::Serve { host, port }) => serve(host, port).await,
        Some(Commands::Run {
            mode,
            ratio,
            input,
            output,
        }) => run(mode, ratio, input, output).await,
        None => serve(None, None).await,
    }
}
