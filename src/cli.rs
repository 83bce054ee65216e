use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ytnote", about = "YouTube transcript collector and summarizer", version)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Summarize the transcript after collection
    #[arg(short, long)]
    pub summarize: bool,

    /// Output language for the summary (default from config, then "ja")
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Model identifier for the summarization endpoint
    #[arg(long)]
    pub model: Option<String>,

    /// Print the collected record as JSON instead of plain transcript text
    #[arg(long)]
    pub json: bool,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show collection metadata on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
