//! Mapforge - ACBS/CAP field mapping generator
//!
//! CLI entry point for assembling and synthesizing mapping tables.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use mapforge::cli::{Cli, Command, generate_after_help, get_log_path};
use mapforge::config::Config;
use mapforge::llm::{LlmClient, create_client};
use mapforge::pipeline::{Pipeline, PipelineConfig};
use mapforge::tables;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a local .env file
    dotenv::dotenv().ok();

    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Run {
            metadata,
            rules,
            output,
            max_in_flight,
        }) => {
            debug!(?metadata, ?rules, ?output, ?max_in_flight, "main: matched Run command");
            cmd_run(&config, metadata, rules, output, max_in_flight).await
        }
        Some(Command::Assemble { rules, output }) => {
            debug!(?rules, ?output, "main: matched Assemble command");
            cmd_assemble(&config, rules, output)
        }
        Some(Command::Prompt { index }) => {
            debug!(?index, "main: matched Prompt command");
            cmd_prompt(&config, index)
        }
        None => {
            debug!("main: no command, defaulting to Run");
            cmd_run(&config, None, None, None, None).await
        }
    }
}

async fn cmd_run(
    config: &Config,
    metadata: Option<PathBuf>,
    rules: Option<PathBuf>,
    output: Option<PathBuf>,
    max_in_flight: Option<usize>,
) -> Result<()> {
    debug!("cmd_run: called");
    let mut pipeline_config = PipelineConfig::from_config(config)?;
    if let Some(path) = metadata {
        pipeline_config.metadata_path = path;
    }
    if let Some(path) = rules {
        pipeline_config.rules_path = path;
    }
    if let Some(path) = output {
        pipeline_config.output_path = path;
    }
    if let Some(n) = max_in_flight {
        pipeline_config.synthesis.max_in_flight = n;
    }

    // Fail fast on a missing credential before reading any table
    let resolved = config.resolve_llm()?;
    let client: Arc<dyn LlmClient> = create_client(&resolved).context("Failed to create LLM client")?;
    debug!(provider = %resolved.provider, model = %resolved.model, "cmd_run: LLM client created");

    println!("{}", "Generating mapping table".bright_cyan().bold());
    println!("  Metadata: {}", pipeline_config.metadata_path.display());
    println!("  Rules:    {}", pipeline_config.rules_path.display());
    println!("  Model:    {} ({})", resolved.model, resolved.provider);
    println!();

    let summary = Pipeline::new(pipeline_config, client).run().await?;

    println!(
        "{} {} candidates: {} synthesized, {} failed",
        "✓".green(),
        summary.candidates,
        summary.synthesized.to_string().green(),
        if summary.failed > 0 {
            summary.failed.to_string().red()
        } else {
            summary.failed.to_string().normal()
        }
    );
    for (kind, count) in &summary.failures_by_kind {
        println!("  {:20} {}", kind.yellow(), count);
    }
    println!(
        "  Tokens: {} in, {} out",
        summary.usage.input_tokens, summary.usage.output_tokens
    );
    println!("  Output: {}", summary.output.display());

    if config.output.preview_rows > 0 && !summary.rows.is_empty() {
        println!();
        print!("{}", tables::preview_markdown(&summary.rows, config.output.preview_rows));
    }
    Ok(())
}

fn cmd_assemble(config: &Config, rules: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    debug!("cmd_assemble: called");
    let mut pipeline_config = PipelineConfig::from_config(config)?;
    if let Some(path) = rules {
        pipeline_config.rules_path = path;
    }
    if let Some(path) = output {
        pipeline_config.output_path = path;
    }

    let candidates = Pipeline::assemble_only(&pipeline_config)?;
    let count = candidates.len();
    Pipeline::write_unsynthesized(&pipeline_config, candidates)?;

    println!(
        "{} {} candidates written to {}",
        "✓".green(),
        count,
        pipeline_config.output_path.display()
    );
    Ok(())
}

fn cmd_prompt(config: &Config, index: Option<usize>) -> Result<()> {
    debug!(?index, "cmd_prompt: called");
    let pipeline_config = PipelineConfig::from_config(config)?;
    let rendered = Pipeline::render_requests(&pipeline_config)?;

    let selected: Vec<_> = match index {
        Some(i) => {
            let total = rendered.len();
            let item = rendered
                .into_iter()
                .nth(i)
                .ok_or_else(|| eyre::eyre!("Candidate index {} out of range ({} candidates)", i, total))?;
            vec![(i, item)]
        }
        None => rendered.into_iter().enumerate().collect(),
    };

    for (position, (candidate, request)) in selected {
        println!(
            "{}",
            format!(
                "# [{}] {}.{} -> {}",
                position, candidate.source_table, candidate.source_field, candidate.target_field
            )
            .bold()
        );
        match request {
            Ok(request) => println!("{}\n", request.prompt().unwrap_or_default()),
            Err(failure) => println!("{} {}\n", "skipped:".yellow(), failure),
        }
    }
    Ok(())
}
