use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod backend;
mod charts;
mod config;
mod enumerate;
mod generator;
mod models;
mod output;
mod prompt;
mod rating;
mod session;
mod store;

use crate::config::Config;
use crate::generator::{GenerationSettings, Generator};
use crate::output::OutputFormat;
use crate::rating::{RatingOutcome, TerminalRater};
use crate::session::RatingSession;

/// Prompt strategy evaluation - generate answers, rate them by hand, chart the scores
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the TOML run file
    #[arg(short, long, global = true, default_value = "eval.toml")]
    config: PathBuf,

    /// Verbose output - debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the evaluation units in generation and rating order
    Plan,
    /// Run every evaluation unit through the model backend and store the answers
    Generate,
    /// Score the stored answers interactively
    Rate {
        /// Continue from the checkpoint of an interrupted session
        #[arg(long)]
        resume: bool,
    },
    /// Aggregate the score log into charts and a summary
    Charts {
        /// Summary output format: plain or json
        #[arg(short, long, default_value = "plain")]
        output: OutputFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::from_file(&args.config)?;

    match args.command {
        Command::Plan => run_plan(&config),
        Command::Generate => run_generate(&config).await,
        Command::Rate { resume } => run_rate(&config, resume),
        Command::Charts { output } => run_charts(&config, output),
    }
}

fn run_plan(config: &Config) -> anyhow::Result<()> {
    let tasks = store::load_tasks(&config.tasks_path)?;
    let units = enumerate::enumerate_units(&tasks, &config.models, &config.prompt_types);
    output::print_plan(&units);
    Ok(())
}

async fn run_generate(config: &Config) -> anyhow::Result<()> {
    let tasks = store::load_tasks(&config.tasks_path)?;
    let units = enumerate::enumerate_units(&tasks, &config.models, &config.prompt_types);

    let backend = backend::from_config(&config.backend)?;
    let mut generator = Generator::new(backend, GenerationSettings::from(&config.backend));
    let answers = generator.generate_all(&units).await;

    store::write_json(&config.answers_path, &answers)?;
    tracing::info!(
        "{} answers generated and saved to {}",
        answers.len(),
        config.answers_path.display()
    );
    Ok(())
}

fn run_rate(config: &Config, resume: bool) -> anyhow::Result<()> {
    let tasks = store::load_tasks(&config.tasks_path)?;
    let answers = store::load_answers(&config.answers_path)?;
    let units = enumerate::enumerate_units(&tasks, &config.models, &config.prompt_types);
    let paired = session::pair_units(&units, answers)?;

    let mut session = if resume && config.checkpoint_path.exists() {
        let checkpoint: RatingSession = store::read_json(&config.checkpoint_path)?;
        let session = RatingSession::resume(paired, checkpoint)?;
        tracing::info!("Resuming at unit {}/{}", session.cursor() + 1, session.len());
        session
    } else {
        if resume {
            tracing::warn!(
                "No checkpoint at {}, starting a new session",
                config.checkpoint_path.display()
            );
        } else if config.checkpoint_path.exists() {
            tracing::warn!(
                "Starting a new session; the checkpoint at {} will be overwritten on the first submission (use --resume to continue it)",
                config.checkpoint_path.display()
            );
        }
        RatingSession::new(paired)
    };

    match rating::run_session(&mut session, &mut TerminalRater, &config.checkpoint_path)? {
        RatingOutcome::Completed => {
            store::write_json(&config.scores_path, session.export()?)?;
            println!("Test suite completed!");
            tracing::info!(
                "{} scores saved to {}",
                session.records().len(),
                config.scores_path.display()
            );
        }
        RatingOutcome::Paused { cursor, total } => {
            tracing::info!(
                "Session paused at {}/{}; rerun with --resume to continue",
                cursor,
                total
            );
        }
    }
    Ok(())
}

fn run_charts(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let records = store::load_scores(&config.scores_path)?;
    let summary = aggregate::summarize(&records)?;
    charts::render_all(&summary, &config.charts_dir)?;
    output::print_summary(&summary, format);
    Ok(())
}
