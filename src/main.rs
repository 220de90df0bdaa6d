use clap::{Args, Parser, Subcommand};
use std::{
    io::{IsTerminal, Write},
    path::PathBuf,
    process::ExitCode,
};
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use webscrape_fetch::{
    dispatch::MISSING_KEY,
    download::{read_urls, validate_url, DEFAULT_OUTPUT_DIR},
    extract,
    fetch::{parse_headers, scrape_headers},
    format_output, describe_lookup, lookup_key, ContentKind, Downloader, Fetch, Headers,
    HtmlParser, HttpFetcher, OutputFormat, ScrapeError, SelectionSpec,
};

#[derive(Debug, Parser)]
#[command(name = "webscrape-fetch", version, about = "A CLI tool for scraping websites")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract elements from an HTML page or a value from a JSON response
    Scrape(ScrapeArgs),
    /// Download files from URLs (accepts direct URL or piped input)
    Download(DownloadArgs),
}

#[derive(Debug, Args)]
struct ScrapeArgs {
    /// URL of the website to scrape
    url: String,

    /// CSS selector for HTML filtering
    #[arg(short, long)]
    selector: Option<String>,

    /// Key to select a value from JSON response (dotted path)
    #[arg(short, long)]
    key: Option<String>,

    /// HTML attribute to extract (e.g. href, src) or "text" for text content
    #[arg(short, long)]
    attribute: Option<String>,

    /// Output format (plain/json)
    #[arg(short, long, default_value = "plain")]
    format: String,

    /// Custom headers in JSON format
    #[arg(short = 'H', long)]
    headers: Option<String>,
}

#[derive(Debug, Args)]
struct DownloadArgs {
    /// Direct URL to download
    url: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,
}

async fn scrape(args: ScrapeArgs) -> Result<(), ScrapeError> {
    info!("Fetching data from: {}", args.url);

    let custom = match args.headers.as_deref() {
        Some(raw) => parse_headers(raw)?,
        None => Headers::new(),
    };
    let headers = scrape_headers(&args.url, &custom)?;
    let fetched = HttpFetcher::new().fetch(&args.url, &headers).await?;

    match ContentKind::classify(&fetched.content_type)? {
        ContentKind::Html => {
            let spec = SelectionSpec {
                selector: args.selector,
                attribute: args.attribute,
                format: OutputFormat::from(args.format.as_str()),
            };
            let extraction = extract(&HtmlParser, &fetched.text(), &spec)?;
            let formatted = format_output(extraction.output(), spec.format)?;
            if extraction.is_fatal() {
                return Err(ScrapeError::Usage(formatted));
            }

            let mut stdout = std::io::stdout().lock();
            stdout.write_all(formatted.as_bytes())?;
            stdout.flush()?;
        }
        ContentKind::Json => {
            info!("Detected JSON response");
            let key = args
                .key
                .filter(|key| !key.is_empty())
                .ok_or_else(|| ScrapeError::Usage(MISSING_KEY.to_string()))?;
            let data: serde_json::Value = serde_json::from_slice(&fetched.body)?;
            println!("{}", describe_lookup(&key, lookup_key(&data, &key)));
        }
    }

    Ok(())
}

async fn download(args: DownloadArgs) -> Result<(), ScrapeError> {
    let urls = match args.url {
        Some(url) => {
            validate_url(&url)?;
            vec![url]
        }
        None => {
            if std::io::stdin().is_terminal() {
                return Err(ScrapeError::Usage(
                    "No input provided. Pipe URLs to this command.".to_string(),
                ));
            }
            let mut input = String::new();
            tokio::io::stdin().read_to_string(&mut input).await?;

            let urls = read_urls(&input);
            if urls.is_empty() {
                return Err(ScrapeError::Usage(
                    "No valid URLs received from pipe".to_string(),
                ));
            }
            urls
        }
    };

    info!("Downloading {} URL(s) into {}", urls.len(), args.output.display());
    let summary = Downloader::new(HttpFetcher::new())
        .run(urls.as_slice(), &args.output)
        .await?;
    info!(
        "Finished: {} downloaded, {} failed",
        summary.succeeded, summary.failed
    );

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Scrape(args) => scrape(args).await,
        Command::Download(args) => download(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
