//! Configuration for a single book build.
//!
//! Every field has a default that targets *Game Programming Patterns*, so a
//! run without a config file reproduces the original fixed behaviour. A TOML
//! file may override any subset of the fields.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use slug::slugify;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Scheme and host used for root-relative references.
    pub base_url: Url,
    pub toc_url: Url,
    pub selectors: Selectors,
    pub metadata: BookMetadata,
    pub output: OutputConfig,
    /// When false, image `src` attributes are made absolute and nothing is fetched.
    pub download_images: bool,
    /// Number of chapters fetched at once. Output order never depends on it.
    pub concurrency: usize,
    pub timeout_secs: f64,
}

impl Default for BookConfig {
    fn default() -> Self {
        let base_url = Url::parse("http://gameprogrammingpatterns.com").expect("valid literal URL");
        let toc_url = base_url.join("/contents.html").expect("valid literal URL");
        Self {
            base_url,
            toc_url,
            selectors: Selectors::default(),
            metadata: BookMetadata::default(),
            output: OutputConfig::default(),
            download_images: true,
            concurrency: 1,
            timeout_secs: 30.0,
        }
    }
}

impl BookConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(anyhow!("concurrency must be at least 1"));
        }
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(anyhow!("timeout_secs must be a positive number"));
        }
        if self.base_url.cannot_be_a_base() {
            return Err(anyhow!("base_url '{}' cannot be used as a base", self.base_url));
        }
        Ok(())
    }

    /// Where the EPUB lands: `<dir>/<file_name>`, defaulting to the slug of the title.
    pub fn epub_path(&self) -> PathBuf {
        let file_name = self
            .output
            .file_name
            .clone()
            .unwrap_or_else(|| format!("{}.epub", slugify(&self.metadata.title)));
        self.output.dir.join(file_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// One match per section of the table of contents.
    pub section: String,
    /// Chapter links inside a section.
    pub link: String,
    /// The main content of a chapter page.
    pub content: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            section: "ol[type=I] > li".to_string(),
            link: "a[href]".to_string(),
            content: "div.content".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookMetadata {
    pub identifier: String,
    pub title: String,
    pub language: String,
    pub author: String,
}

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            identifier: "gpp".to_string(),
            title: "Game Programming Patterns".to_string(),
            language: "en".to_string(),
            author: "Robert Nystrom".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A single packaged EPUB file
    #[default]
    Epub,
    /// One standalone HTML file per chapter
    Html,
}

impl OutputFormat {
    pub fn chapter_extension(self) -> &'static str {
        match self {
            OutputFormat::Epub => "xhtml",
            OutputFormat::Html => "html",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub file_name: Option<String>,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("epubs"),
            file_name: None,
            format: OutputFormat::Epub,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_game_programming_patterns() {
        let config = BookConfig::default();
        assert_eq!(config.toc_url.as_str(), "http://gameprogrammingpatterns.com/contents.html");
        assert_eq!(config.metadata.identifier, "gpp");
        assert_eq!(config.metadata.language, "en");
        assert_eq!(config.epub_path(), PathBuf::from("epubs/game-programming-patterns.epub"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = BookConfig::parse(
            r#"
            concurrency = 4

            [metadata]
            title = "Crafting Interpreters"

            [output]
            dir = "out"
            format = "html"
            "#,
        )
        .unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.metadata.title, "Crafting Interpreters");
        assert_eq!(config.metadata.author, "Robert Nystrom");
        assert_eq!(config.output.format, OutputFormat::Html);
        assert_eq!(config.selectors.content, "div.content");
        assert_eq!(config.epub_path(), PathBuf::from("out/crafting-interpreters.epub"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = BookConfig::parse("concurrency = 0").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }
}
