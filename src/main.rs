use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use structured_scraper::{ConfigSection, MultiExtractor, StructuredDataExtractor};

#[derive(Parser)]
#[command(
    name = "structured-scraper",
    about = "Extract structured JSON from an HTML page using declarative rulesets"
)]
struct Cli {
    /// Path to a single ruleset JSON file
    #[arg(long, conflicts_with = "config_dir")]
    config: Option<PathBuf>,

    /// Directory of ruleset files; dispatches on --url
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// File name pattern for --config-dir
    #[arg(long, default_value = "*.json")]
    pattern: String,

    /// Page URL, required with --config-dir
    #[arg(long)]
    url: Option<String>,

    /// Path to the HTML file to process
    #[arg(long)]
    html: PathBuf,

    /// Write JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let html = fs::read_to_string(&cli.html)
        .with_context(|| format!("failed to read HTML file {}", cli.html.display()))?;

    let json = match (&cli.config, &cli.config_dir) {
        (Some(config_path), _) => {
            let config = ConfigSection::parse_file(config_path)?;
            let extractor = StructuredDataExtractor::new(&config)?;
            let value = extractor.extract(&html)?;
            serde_json::to_string_pretty(&value)?
        }
        (None, Some(dir)) => {
            let url = cli
                .url
                .as_deref()
                .context("--url is required with --config-dir")?;
            let multi = MultiExtractor::from_directory(dir, &cli.pattern)?;
            multi
                .parse_page(url, &html)
                .context("no ruleset matched the URL, or extraction failed")?
        }
        (None, None) => anyhow::bail!("one of --config or --config-dir is required"),
    };

    match &cli.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }

    Ok(())
}
