use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{BrowserEngine, Config};
use crate::extract::VideoId;
use crate::utils::extract_video_id;

#[derive(Parser)]
#[command(
    name = "transcript-grabber",
    about = "Transcript Grabber - Extract timestamped YouTube transcripts by driving a real browser",
    version,
    long_about = "Opens each video's watch page in a headless Chromium-family browser, reveals the transcript panel and reads the rendered segments. No API key needed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the transcript of one video
    Extract {
        /// Video id or YouTube URL (watch, youtu.be, embed, shorts)
        #[arg(value_name = "VIDEO_ID_OR_URL", value_parser = parse_video_id)]
        video: VideoId,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Extract transcripts for many videos
    Batch {
        /// Video ids or YouTube URLs
        #[arg(value_name = "VIDEO_ID_OR_URL", value_parser = parse_video_id)]
        videos: Vec<VideoId>,

        /// File with one video id or URL per line ('#' starts a comment)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Videos extracted at the same time (overrides config)
        #[arg(short, long, value_name = "K")]
        concurrency: Option<usize>,

        /// Directory for per-video transcripts and the batch report
        #[arg(long, value_name = "DIR", default_value = "transcripts")]
        output_dir: PathBuf,

        /// Output format for per-video files
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Show or locate the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Browser overrides shared by the extraction commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BrowserArgs {
    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Browser to launch
    #[arg(long, value_enum, value_name = "ENGINE")]
    pub browser: Option<BrowserEngine>,

    /// Per-stage timeout in milliseconds (page load and browser requests)
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Overall ceiling for one video in milliseconds
    #[arg(long, value_name = "MS")]
    pub video_timeout: Option<u64>,
}

impl BrowserArgs {
    /// Layer the command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if self.headful {
            config.browser.headless = false;
        }
        if let Some(engine) = self.browser {
            config.browser.engine = engine;
        }
        if let Some(ms) = self.timeout {
            config.extraction.per_stage_timeout_ms = ms.max(1);
        }
        if let Some(ms) = self.video_timeout {
            config.extraction.video_timeout_ms = ms.max(1);
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One "timestamp text" line per segment
    Text,
    /// JSON array of segments
    Json,
    /// Debug list of (timestamp, text) tuples
    Raw,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text | OutputFormat::Raw => "txt",
            OutputFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Raw => write!(f, "raw"),
        }
    }
}

fn parse_video_id(value: &str) -> Result<VideoId, String> {
    extract_video_id(value).map_err(|e| e.to_string())
}
