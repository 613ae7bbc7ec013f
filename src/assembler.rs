use anyhow::{anyhow, Result};
use colored::*;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::config::{BookConfig, BookMetadata, OutputFormat};
use crate::epub_writer::EpubWriter;
use crate::model::{Link, TableOfContents};

/// Write the enriched table of contents in the configured format and return
/// the location of the result: the EPUB file, or the directory of HTML files.
pub async fn assemble(toc: &TableOfContents, config: &BookConfig) -> Result<PathBuf> {
    let out_dir = &config.output.dir;
    fs::create_dir_all(out_dir)
        .await
        .map_err(|e| anyhow!("Failed to create output directory {}: {}", out_dir.display(), e))?;

    match config.output.format {
        OutputFormat::Epub => {
            let path = config.epub_path();
            build_epub(toc, &config.metadata)?.save(&path).await?;
            Ok(path)
        }
        OutputFormat::Html => {
            write_html_files(toc, out_dir).await?;
            Ok(out_dir.clone())
        }
    }
}

/// One chapter item per link and one image item per fetched image, in
/// table-of-contents order.
pub fn build_epub(toc: &TableOfContents, metadata: &BookMetadata) -> Result<EpubWriter> {
    let mut writer = EpubWriter::new(metadata.clone());

    for link in toc.links() {
        let (file_name, content) = chapter_parts(link)?;
        writer.add_chapter(&link.display_title(), file_name, content);

        for image in link.images.iter().filter(|i| i.is_fetched()) {
            writer.add_image(&image.file_name, &image.media_type, &image.data);
        }
    }

    Ok(writer)
}

async fn write_html_files(toc: &TableOfContents, out_dir: &Path) -> Result<()> {
    for link in toc.links() {
        let (file_name, content) = chapter_parts(link)?;
        let path = out_dir.join(file_name);
        fs::write(&path, content)
            .await
            .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
        info!("Wrote \"{}\"", path.display().to_string().blue());

        for image in link.images.iter().filter(|i| i.is_fetched()) {
            let path = out_dir.join(&image.file_name);
            fs::write(&path, &image.data)
                .await
                .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
        }
    }
    Ok(())
}

fn chapter_parts(link: &Link) -> Result<(&str, &str)> {
    match (&link.file_name, &link.content) {
        (Some(file_name), Some(content)) => Ok((file_name.as_str(), content.as_str())),
        _ => Err(anyhow!("Chapter \"{}\" has no content", link.title)),
    }
}
