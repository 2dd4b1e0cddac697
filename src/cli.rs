use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ytsum::job::JobKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "ytsum",
    about = "YouTube transcript fetcher and summarizer with layered caption fallbacks",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable the multi-profile fallback for hosted/datacenter networks
    #[arg(long, global = true)]
    pub hosted: bool,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,

    /// Show which strategy produced the transcript
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the transcript of one or more videos
    Transcript {
        /// YouTube video URL or video ID (reads from stdin if omitted)
        url: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Preferred caption language [default: config or "en"]
        #[arg(short, long)]
        lang: Option<String>,

        /// Write output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a video, optionally with a quiz and flashcards
    Summarize {
        /// YouTube video URL or video ID
        url: String,

        /// Also generate N quiz questions
        #[arg(long, value_name = "N")]
        quiz: Option<usize>,

        /// Also generate N flashcards
        #[arg(long, value_name = "N")]
        flashcards: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Preferred caption language [default: config or "en"]
        #[arg(short, long)]
        lang: Option<String>,

        /// LLM model [default: config or gemini-2.0-flash]
        #[arg(long)]
        model: Option<String>,

        /// Write output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the HTTP API
    Serve {
        /// Port to listen on [default: $PORT, config or 8080]
        #[arg(short, long)]
        port: Option<u16>,

        /// LLM model [default: config or gemini-2.0-flash]
        #[arg(long)]
        model: Option<String>,
    },

    /// Process a JSON request file and write a JSON result file
    Job {
        #[arg(value_enum)]
        kind: JobKind,

        /// Input JSON file
        input: PathBuf,

        /// Output JSON file
        output: PathBuf,
    },
}
