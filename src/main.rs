use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::Parser;
use eyre::{Result, bail, eyre};
use log::info;

use ytnote::host::{DetachedDom, HttpFetcher};
use ytnote::summarize::OpenRouterChat;
use ytnote::{SummaryRecord, VideoRecord};

mod cli;

use cli::Cli;

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytnote.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytnote")
        .join("logs")
}

fn render_summary(summary: &SummaryRecord) -> String {
    let mut out = String::new();
    out.push_str(&summary.summary_lines.join("\n"));
    out.push_str("\n\nKey points:\n");
    for point in &summary.key_points {
        out.push_str("- ");
        out.push_str(point);
        out.push('\n');
    }
    out.push_str(&format!("\nKeywords: {}\n", summary.keywords.join(", ")));
    out.push_str(&format!("Tags: {}\n", summary.broad_tags.join(", ")));
    out.push_str(&format!("Model: {}\n", summary.model));
    if let Some(ref notice) = summary.language_notice {
        out.push('\n');
        out.push_str(notice);
        out.push('\n');
    }
    out
}

fn render_record(record: &VideoRecord, as_json: bool) -> Result<String> {
    if as_json {
        Ok(serde_json::to_string_pretty(record)?)
    } else {
        Ok(record.transcript_text.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();

    // Load config file (non-fatal if missing/invalid)
    let config = ytnote::config::Config::load().unwrap_or_default();
    let model = cli
        .model
        .clone()
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| ytnote::config::DEFAULT_MODEL.to_string());
    let lang = cli
        .lang
        .clone()
        .or_else(|| config.language.clone())
        .unwrap_or_else(|| ytnote::config::DEFAULT_LANGUAGE.to_string());

    let client = reqwest::Client::new();
    let fetcher = HttpFetcher::new(client.clone());

    // Collect URLs: from arg or stdin
    let urls = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    if urls.is_empty() {
        bail!("no URL or video ID provided\n\nUsage: ytnote <URL>\n       echo <URL> | ytnote");
    }

    for url_input in &urls {
        let url_input = url_input.trim();
        if url_input.is_empty() {
            continue;
        }

        let video_id = ytnote::extract_video_id(url_input)
            .ok_or_else(|| eyre!("could not extract video ID from: {url_input}\n\nSupported formats:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  https://www.youtube.com/embed/ID\n  https://www.youtube.com/shorts/ID\n  <11-character video ID>"))?;

        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        let dom = DetachedDom::new(&watch_url);

        let record = ytnote::collector::collect_video_data(&fetcher, &dom)
            .await
            .map_err(|e| eyre!("[{}] {e}", e.code()))?;

        if cli.verbose {
            eprintln!(
                "Video: {} ({})\nChannel: {}\nPublished: {}\nTranscript: {} chars",
                record.title,
                record.video_id,
                record.channel,
                record.published_at.as_deref().unwrap_or("unknown"),
                record.transcript_text.chars().count(),
            );
        }

        let rendered = render_record(&record, cli.json)?;
        if let Some(ref path) = cli.output {
            std::fs::write(path, &rendered)?;
            if cli.verbose {
                eprintln!("Output written to: {}", path.display());
            }
        } else {
            println!("{rendered}");
        }

        if cli.summarize {
            let api_key = config
                .resolve_api_key()
                .ok_or_else(|| eyre!("no API key configured: set api_key in config.toml or OPENROUTER_API_KEY"))?;
            let chat = OpenRouterChat::new(client.clone(), api_key);

            let summary = ytnote::summarize::summarize_video(&chat, &record, &model, &lang)
                .await
                .map_err(|e| eyre!("[{}] {e}", e.code()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\n--- Summary ---\n{}", render_summary(&summary));
            }
        }
    }

    Ok(())
}
