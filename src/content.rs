use anyhow::{anyhow, Result};
use colored::*;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use scraper::Html;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::BookConfig;
use crate::fetch::Fetcher;
use crate::index::parse_selector;
use crate::model::{chapter_file_name, image_file_name, Image, Link, TableOfContents};
use crate::sanitize::{wrap_document, Fragment};

/// Everything the content fetcher produces for one link.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub content: String,
    pub file_name: String,
    pub images: Vec<Image>,
}

/// Fill in content, file name and images for every link of `toc`.
///
/// Up to `config.concurrency` chapters are in flight at once; results are
/// applied in table-of-contents order regardless of completion order. The
/// first chapter failure aborts the whole run.
pub async fn fetch_contents<F: Fetcher>(
    fetcher: &F,
    config: &BookConfig,
    toc: &mut TableOfContents,
) -> Result<()> {
    let chapters: Vec<Chapter> = stream::iter(toc.links().map(|link| fetch_chapter(fetcher, config, link)))
        .buffered(config.concurrency.max(1))
        .try_collect()
        .await?;

    for (link, chapter) in toc.links_mut().zip(chapters) {
        link.content = Some(chapter.content);
        link.file_name = Some(chapter.file_name);
        link.images = chapter.images;
    }

    Ok(())
}

pub async fn fetch_chapter<F: Fetcher>(fetcher: &F, config: &BookConfig, link: &Link) -> Result<Chapter> {
    info!("Fetching chapter \"{}\"", link.title.green());

    let html = fetcher.fetch(&link.url).await?.into_text(&link.url)?;
    let fragment = extract_fragment(&html, &config.selectors.content)
        .map_err(|e| anyhow!("{} ({})", e, link.url))?;

    let mut sources = Vec::with_capacity(fragment.image_sources().len());
    let mut images = Vec::new();

    for (image_index, src) in fragment.image_sources().iter().enumerate() {
        if src.starts_with("data:") {
            sources.push(src.clone());
            continue;
        }

        let url = match resolve_image_url(src, &config.base_url, &link.url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Dropping image \"{}\" in \"{}\": {}", src, link.title, e);
                sources.push(String::new());
                continue;
            }
        };

        if !config.download_images {
            sources.push(url.to_string());
            continue;
        }

        let (extension, media_type) = image_type(&url);
        let file_name = image_file_name(link.section_index, link.index, image_index, &extension);
        let data = fetch_image(fetcher, &url).await;

        sources.push(if data.is_empty() { String::new() } else { file_name.clone() });
        images.push(Image {
            file_name,
            media_type: media_type.to_string(),
            data,
        });
    }

    let body = fragment.fill(&sources);
    Ok(Chapter {
        content: wrap_document(&link.title, &body),
        file_name: chapter_file_name(
            link.section_index,
            link.index,
            config.output.format.chapter_extension(),
        ),
        images,
    })
}

/// Locate the first element matching `content_selector` and sanitize it.
pub fn extract_fragment(html: &str, content_selector: &str) -> Result<Fragment> {
    let document = Html::parse_document(html);
    let selector = parse_selector(content_selector)?;
    let root = document
        .select(&selector)
        .next()
        .ok_or_else(|| anyhow!("No element matches '{}'", content_selector))?;

    Ok(Fragment::from_element(root))
}

/// Image fetch failures degrade to an empty body instead of an error.
async fn fetch_image<F: Fetcher>(fetcher: &F, url: &Url) -> Vec<u8> {
    match fetcher.fetch(url).await {
        Ok(resp) if resp.is_success() && !resp.body.is_empty() => {
            debug!("Fetched image {} ({} bytes)", url, resp.body.len());
            resp.body
        }
        Ok(resp) => {
            warn!("Image \"{}\" returned status {}", url.to_string().yellow(), resp.status);
            Vec::new()
        }
        Err(e) => {
            warn!("Image \"{}\" failed: {:#}", url.to_string().yellow(), e);
            Vec::new()
        }
    }
}

/// Absolute source URL of an image: absolute `src` as-is, root-relative
/// against the site's scheme and host, anything else against the chapter.
pub fn resolve_image_url(src: &str, base_url: &Url, chapter_url: &Url) -> Result<Url> {
    let resolved = if let Ok(absolute) = Url::parse(src) {
        absolute
    } else if src.starts_with('/') {
        base_url.join(src)?
    } else {
        chapter_url.join(src)?
    };
    Ok(resolved)
}

/// File extension and media type derived from the URL's path.
pub fn image_type(url: &Url) -> (String, &'static str) {
    let extension = Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));

    let media_type = match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };

    (extension.unwrap_or_else(|| "bin".to_string()), media_type)
}
