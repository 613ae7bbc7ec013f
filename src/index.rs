use anyhow::{anyhow, Result};
use colored::*;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::{BookConfig, Selectors};
use crate::fetch::Fetcher;
use crate::model::{Link, Section, TableOfContents};

/// Fetch the table of contents page and parse it into sections.
pub async fn fetch_index<F: Fetcher>(fetcher: &F, config: &BookConfig) -> Result<TableOfContents> {
    info!("Fetching table of contents \"{}\"", config.toc_url.to_string().green());

    let html = fetcher
        .fetch(&config.toc_url)
        .await?
        .into_text(&config.toc_url)?;

    let toc = parse_index(&html, &config.base_url, &config.selectors)?;
    if toc.link_count() == 0 {
        return Err(anyhow!(
            "No chapter links matched '{}' in {}",
            config.selectors.section,
            config.toc_url
        ));
    }

    info!(
        "Found {} chapters in {} sections",
        toc.link_count(),
        toc.sections.len()
    );
    Ok(toc)
}

/// Parse table-of-contents markup. Sections and links keep document order;
/// only anchors carrying an `href` count as links.
pub fn parse_index(html: &str, base_url: &Url, selectors: &Selectors) -> Result<TableOfContents> {
    let document = Html::parse_document(html);
    let section_selector = parse_selector(&selectors.section)?;
    let link_selector = parse_selector(&selectors.link)?;

    let mut sections = Vec::new();
    for (section_index, section) in document.select(&section_selector).enumerate() {
        let mut links = Vec::new();
        for anchor in section.select(&link_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let url = base_url
                .join(href)
                .map_err(|e| anyhow!("Failed to join '{}' onto {}: {}", href, base_url, e))?;
            let title = anchor.text().collect::<String>().trim().to_string();
            debug!("Section {} link {}: {} -> {}", section_index, links.len(), title, url);
            links.push(Link::new(section_index, links.len(), title, url));
        }
        sections.push(Section::new(section_index, links));
    }

    Ok(TableOfContents::new(sections))
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Invalid selector '{}': {:?}", selector, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;

    const TOC: &str = r#"
        <html><body>
        <ol type="I">
          <li><a href="introduction.html">Introduction</a>
            <ol>
              <li><a href="architecture-performance-and-games.html">Architecture, Performance, and Games</a></li>
            </ol>
          </li>
          <li><a href="design-patterns-revisited.html">Design Patterns Revisited</a>
            <ol>
              <li><a href="command.html">Command</a></li>
              <li><a name="no-href">Anchor without href</a></li>
              <li><a href="/flyweight.html">Flyweight</a></li>
            </ol>
          </li>
        </ol>
        <ol><li><a href="ignored.html">Not part of the contents</a></li></ol>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("http://gameprogrammingpatterns.com").unwrap()
    }

    #[test]
    fn parses_sections_in_document_order() {
        let toc = parse_index(TOC, &base(), &Selectors::default()).unwrap();

        assert_eq!(toc.sections.len(), 2);
        let first: Vec<_> = toc.sections[0].links.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(first, ["Introduction", "Architecture, Performance, and Games"]);

        let second: Vec<_> = toc.sections[1].links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            second,
            [
                "http://gameprogrammingpatterns.com/design-patterns-revisited.html",
                "http://gameprogrammingpatterns.com/command.html",
                "http://gameprogrammingpatterns.com/flyweight.html",
            ]
        );
    }

    #[test]
    fn links_carry_their_positions() {
        let toc = parse_index(TOC, &base(), &Selectors::default()).unwrap();
        let flyweight = &toc.sections[1].links[2];
        assert_eq!((flyweight.section_index, flyweight.index), (1, 2));
        assert_eq!(flyweight.stem(), "s01_c02");
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let selectors = Selectors {
            section: "ol[[".to_string(),
            ..Selectors::default()
        };
        assert!(parse_index(TOC, &base(), &selectors).is_err());
    }

    #[tokio::test]
    async fn fetch_index_fails_on_error_status() {
        let config = BookConfig::default();
        let fetcher = StaticFetcher::new().with_response(config.toc_url.as_str(), 500, b"oops");

        let err = fetch_index(&fetcher, &config).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn fetch_index_rejects_empty_contents() {
        let config = BookConfig::default();
        let fetcher = StaticFetcher::new().with_page(config.toc_url.as_str(), "<p>nothing here</p>");

        assert!(fetch_index(&fetcher, &config).await.is_err());
    }
}
