use anyhow::Result;
use colored::*;
use std::path::PathBuf;
use tracing::info;

use crate::assembler::assemble;
use crate::config::BookConfig;
use crate::content::fetch_contents;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::index::fetch_index;
use crate::model::TableOfContents;

/// Runs the three stages (index, contents, assembly) for one book.
pub struct Downloader {
    config: BookConfig,
}

impl Downloader {
    pub fn new(config: BookConfig) -> Self {
        Self { config }
    }

    /// Build the book over HTTP and return the location of the artifact.
    pub async fn run(&self) -> Result<PathBuf> {
        self.config.validate()?;
        let fetcher = HttpFetcher::new(self.config.timeout_secs)?;
        self.run_with(&fetcher).await
    }

    pub async fn run_with<F: Fetcher>(&self, fetcher: &F) -> Result<PathBuf> {
        info!("Visiting \"{}\"", self.config.toc_url.to_string().green());

        let mut toc = fetch_index(fetcher, &self.config).await?;
        fetch_contents(fetcher, &self.config, &mut toc).await?;
        let path = assemble(&toc, &self.config).await?;

        info!("Book created: {}", path.display().to_string().blue());
        Ok(path)
    }

    /// Only the first stage: the table of contents as discovered.
    pub async fn index(&self) -> Result<TableOfContents> {
        self.config.validate()?;
        let fetcher = HttpFetcher::new(self.config.timeout_secs)?;
        fetch_index(&fetcher, &self.config).await
    }
}
