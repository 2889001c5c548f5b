use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_grabber::cli::{Cli, Commands, OutputFormat};
use transcript_grabber::config::Config;
use transcript_grabber::extract::{ExtractionResult, TranscriptExtractor, VideoId};
use transcript_grabber::{batch, output, utils, BatchOrchestrator, BatchSummary};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "transcript_grabber=debug"
    } else {
        "transcript_grabber=info"
    };
    let json_layer = cli
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!cli.log_json)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json_layer)
        .with(text_layer)
        .init();

    let mut config = Config::load().await?;

    match cli.command {
        Commands::Extract {
            video,
            output,
            format,
            browser,
        } => {
            browser.apply(&mut config);
            extract_one(&config, &video, output, format, cli.quiet).await
        }
        Commands::Batch {
            mut videos,
            input,
            concurrency,
            output_dir,
            format,
            browser,
        } => {
            browser.apply(&mut config);
            if let Some(path) = input {
                videos.extend(utils::read_video_ids(&path)?);
            }
            if videos.is_empty() {
                anyhow::bail!("No video ids given; pass ids or --input FILE");
            }
            let concurrency = concurrency.unwrap_or(config.batch.max_concurrency);
            extract_batch(&config, &videos, concurrency, &output_dir, format, cli.quiet).await
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Edit it to change defaults, or run with --show to print them.");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn extract_one(
    config: &Config,
    video: &VideoId,
    output: Option<PathBuf>,
    format: OutputFormat,
    quiet: bool,
) -> Result<ExitCode> {
    let extractor = TranscriptExtractor::from_config(config).await?;

    let progress = spinner(quiet);
    progress.set_message(format!("Extracting transcript for {}...", video));

    let started = Instant::now();
    let result = utils::until_cancelled(extractor.extract(video), utils::ctrl_c()).await;
    progress.finish_and_clear();

    if let Err(e) = extractor.session().shutdown().await {
        tracing::warn!("Browser shutdown failed: {}", e);
    }

    let Some(result) = result else {
        return Ok(cancelled());
    };

    match result {
        ExtractionResult::Success(transcript) => {
            tracing::info!(
                "{} segment(s) in {}",
                transcript.len(),
                utils::format_duration(started.elapsed())
            );
            match output {
                Some(path) => {
                    output::save_to_file(&transcript, &path, format).await?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => output::print_to_console(&transcript, format)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        ExtractionResult::Failure { kind, detail } => {
            eprintln!("{} {}: {}", style("✗").red().bold(), kind, detail);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn extract_batch(
    config: &Config,
    videos: &[VideoId],
    concurrency: usize,
    output_dir: &std::path::Path,
    format: OutputFormat,
    quiet: bool,
) -> Result<ExitCode> {
    let extractor = Arc::new(TranscriptExtractor::from_config(config).await?);
    let orchestrator = BatchOrchestrator::new(Arc::clone(&extractor));

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(batch::distinct_ids(videos).len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar
    };

    let started = Instant::now();
    let run = orchestrator.extract_many_with_progress(videos, concurrency, |id, result| {
        let mark = if result.is_success() {
            style("✓").green()
        } else {
            style("✗").red()
        };
        progress.set_message(format!("{} {}", mark, id));
        progress.inc(1);
    });
    let results = utils::until_cancelled(run, utils::ctrl_c()).await;
    progress.finish_and_clear();

    if let Err(e) = extractor.session().shutdown().await {
        tracing::warn!("Browser shutdown failed: {}", e);
    }

    let Some(results) = results else {
        return Ok(cancelled());
    };

    let summary = BatchSummary::new(results);
    for (id, result) in &summary.results {
        if let Some(transcript) = result.transcript() {
            let path = output::batch_file_path(output_dir, id, format);
            output::save_to_file(transcript, &path, format).await?;
        }
    }
    let report = output::save_batch_report(&summary, output_dir).await?;

    println!(
        "{} {} succeeded, {} failed in {}",
        style("Batch complete:").bold(),
        style(summary.succeeded).green(),
        style(summary.failed).red(),
        utils::format_duration(started.elapsed())
    );
    for (kind, count) in summary.failures_by_kind() {
        println!("  {}: {}", style(kind).yellow(), count);
    }
    println!("Report saved to: {}", report.display());

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cancelled() -> ExitCode {
    eprintln!("{}", style("Operation cancelled by user.").yellow());
    ExitCode::FAILURE
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        progress.set_style(style);
    }
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}
