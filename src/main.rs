use anyhow::Result;
use book2epub::{BookConfig, Downloader, OutputFormat};
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "book2epub")]
#[command(about = "CLI utility to turn an online book's table of contents into an EPUB for offline reading")]
#[command(version = "0.1.0")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every chapter and assemble the book
    Build {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory used to save files
        #[arg(short = 'o', long = "out-dir")]
        out_dir: Option<PathBuf>,

        /// Output format
        #[arg(short = 'f', long = "format", value_enum)]
        format: Option<OutputFormat>,

        /// Keep image references pointing at the website instead of embedding them
        #[arg(long = "no-images")]
        no_images: bool,

        /// Number of chapters fetched at once
        #[arg(short = 'j', long = "concurrency", value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: Option<u16>,

        /// Request timeout in seconds
        #[arg(short = 't', long = "timeout", value_parser = parse_timeout)]
        timeout: Option<f64>,
    },
    /// Print the table of contents as JSON without fetching chapters
    Index {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(ClapArgs)]
struct SourceArgs {
    /// TOML file overriding the built-in book configuration
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

impl SourceArgs {
    async fn load(&self) -> Result<BookConfig> {
        match &self.config {
            Some(path) => BookConfig::load(path).await,
            None => Ok(BookConfig::default()),
        }
    }
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if !(value.is_finite() && value > 0.0) {
        return Err("Must be a positive number.".to_string());
    }
    Ok(value)
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Build {
            source,
            out_dir,
            format,
            no_images,
            concurrency,
            timeout,
        } => {
            let mut config = source.load().await?;
            if let Some(dir) = out_dir {
                config.output.dir = dir;
            }
            if let Some(format) = format {
                config.output.format = format;
            }
            if no_images {
                config.download_images = false;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = usize::from(concurrency);
            }
            if let Some(timeout) = timeout {
                config.timeout_secs = timeout;
            }

            let path = Downloader::new(config).run().await?;
            println!("Book created: {}", path.display().to_string().green());
            Ok(())
        }
        Commands::Index { source } => {
            let config = source.load().await?;
            let toc = Downloader::new(config).index().await?;
            println!("{}", serde_json::to_string_pretty(&toc)?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("book2epub=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command).await {
        error!("{}", format!("Error: {:#}", e).red());
        process::exit(1);
    }
}
