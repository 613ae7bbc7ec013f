use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::BookMetadata;
use crate::sanitize::{escape_attr, escape_text};

struct ChapterItem {
    title: String,
    file_name: String,
    content: String,
}

struct ImageItem {
    file_name: String,
    media_type: String,
    data: Vec<u8>,
}

/// Collects chapters and images, then packages them as an EPUB.
///
/// Chapters become the spine and the table of contents in the order they
/// were added.
pub struct EpubWriter {
    metadata: BookMetadata,
    modified: DateTime<Utc>,
    chapters: Vec<ChapterItem>,
    images: Vec<ImageItem>,
}

impl EpubWriter {
    pub fn new(metadata: BookMetadata) -> Self {
        Self {
            metadata,
            modified: Utc::now(),
            chapters: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Overrides the `dcterms:modified` timestamp, which defaults to creation time.
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    pub fn add_chapter(&mut self, title: &str, file_name: &str, content: &str) {
        debug!("Adding chapter {} ({})", file_name, title);
        self.chapters.push(ChapterItem {
            title: title.to_string(),
            file_name: file_name.to_string(),
            content: content.to_string(),
        });
    }

    pub fn add_image(&mut self, file_name: &str, media_type: &str, data: &[u8]) {
        debug!("Adding image {} ({}, {} bytes)", file_name, media_type, data.len());
        self.images.push(ImageItem {
            file_name: file_name.to_string(),
            media_type: media_type.to_string(),
            data: data.to_vec(),
        });
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub async fn save(&self, output_path: &Path) -> Result<()> {
        if self.chapters.is_empty() {
            return Err(anyhow!("No chapters added to the book"));
        }

        let data = self.to_bytes()?;

        fs::write(output_path, data)
            .await
            .map_err(|e| anyhow!("Failed to write EPUB to {}: {}", output_path.display(), e))?;

        info!(
            "Packaged {} chapters and {} images into {}",
            self.chapters.len(),
            self.images.len(),
            output_path.display()
        );
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.write_to(&mut buf)
            .map_err(|e| anyhow!("Failed to package EPUB: {}", e))?;
        Ok(buf.into_inner())
    }

    fn write_to<W: Write + Seek>(&self, writer: W) -> zip::result::ZipResult<()> {
        let mut zip = ZipWriter::new(writer);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // mimetype must come first and stay uncompressed
        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER_XML.as_bytes())?;

        zip.start_file("OEBPS/content.opf", deflated)?;
        zip.write_all(self.package_document().as_bytes())?;

        zip.start_file("OEBPS/toc.ncx", deflated)?;
        zip.write_all(self.ncx().as_bytes())?;

        zip.start_file("OEBPS/nav.xhtml", deflated)?;
        zip.write_all(self.nav_document().as_bytes())?;

        for chapter in &self.chapters {
            zip.start_file(format!("OEBPS/{}", chapter.file_name), deflated)?;
            zip.write_all(chapter.content.as_bytes())?;
        }

        for image in &self.images {
            zip.start_file(format!("OEBPS/{}", image.file_name), deflated)?;
            zip.write_all(&image.data)?;
        }

        zip.finish()?;
        Ok(())
    }

    fn package_document(&self) -> String {
        let meta = &self.metadata;
        let mut opf = String::new();

        opf.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
        );
        opf.push_str(&format!(
            "    <dc:identifier id=\"id\">{}</dc:identifier>\n",
            escape_text(&meta.identifier)
        ));
        opf.push_str(&format!("    <dc:title>{}</dc:title>\n", escape_text(&meta.title)));
        opf.push_str(&format!(
            "    <dc:language>{}</dc:language>\n",
            escape_text(&meta.language)
        ));
        opf.push_str(&format!(
            "    <dc:creator id=\"creator\">{}</dc:creator>\n",
            escape_text(&meta.author)
        ));
        opf.push_str(&format!(
            "    <meta property=\"dcterms:modified\">{}</meta>\n",
            self.modified.format("%Y-%m-%dT%H:%M:%SZ")
        ));
        opf.push_str("  </metadata>\n  <manifest>\n");
        opf.push_str(
            "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
        );
        opf.push_str(
            "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
        );

        for chapter in &self.chapters {
            opf.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                item_id(&chapter.file_name),
                escape_attr(&chapter.file_name)
            ));
        }
        for image in &self.images {
            opf.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
                item_id(&image.file_name),
                escape_attr(&image.file_name),
                escape_attr(&image.media_type)
            ));
        }

        opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
        for chapter in &self.chapters {
            opf.push_str(&format!("    <itemref idref=\"{}\"/>\n", item_id(&chapter.file_name)));
        }
        opf.push_str("  </spine>\n</package>\n");
        opf
    }

    fn ncx(&self) -> String {
        let mut ncx = String::new();
        ncx.push_str(&format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
"#,
            escape_attr(&self.metadata.identifier),
            escape_text(&self.metadata.title)
        ));

        for (i, chapter) in self.chapters.iter().enumerate() {
            let order = i + 1;
            ncx.push_str(&format!(
                "    <navPoint id=\"navpoint-{}\" playOrder=\"{}\">\n      <navLabel>\n        <text>{}</text>\n      </navLabel>\n      <content src=\"{}\"/>\n    </navPoint>\n",
                order,
                order,
                escape_text(&chapter.title),
                escape_attr(&chapter.file_name)
            ));
        }

        ncx.push_str("  </navMap>\n</ncx>\n");
        ncx
    }

    fn nav_document(&self) -> String {
        let mut nav = String::new();
        nav.push_str(&format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><meta charset="UTF-8" /><title>{}</title></head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{}</h1>
    <ol>
"#,
            escape_text(&self.metadata.title),
            escape_text(&self.metadata.title)
        ));

        for chapter in &self.chapters {
            nav.push_str(&format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                escape_attr(&chapter.file_name),
                escape_text(&chapter.title)
            ));
        }

        nav.push_str("    </ol>\n  </nav>\n</body>\n</html>\n");
        nav
    }
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Manifest ids must be XML names; generated file names only need `.` replaced.
fn item_id(file_name: &str) -> String {
    format!("item_{}", file_name.replace(['/', '.', ' ', '-'], "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Read;
    use zip::ZipArchive;

    fn sample() -> EpubWriter {
        let modified = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        let mut writer = EpubWriter::new(BookMetadata::default()).with_modified(modified);
        writer.add_chapter("Introduction", "s00_c00.xhtml", "<html>intro</html>");
        writer.add_chapter(" - Architecture", "s00_c01.xhtml", "<html>arch</html>");
        writer.add_image("s00_c01_i00.png", "image/png", b"PNG");
        writer
    }

    fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut out = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let bytes = sample().to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn package_lists_metadata_manifest_and_spine() {
        let bytes = sample().to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let opf = read_entry(&mut archive, "OEBPS/content.opf");

        assert!(opf.contains(r#"<dc:identifier id="id">gpp</dc:identifier>"#));
        assert!(opf.contains("<dc:title>Game Programming Patterns</dc:title>"));
        assert!(opf.contains("<dc:language>en</dc:language>"));
        assert!(opf.contains("Robert Nystrom"));
        assert!(opf.contains(r#"version="3.0""#));
        assert_eq!(opf.matches("dcterms:modified").count(), 1);
        assert!(opf.contains(r#"<meta property="dcterms:modified">2024-03-09T07:05:00Z</meta>"#));
        assert!(opf.contains(r#"href="s00_c01_i00.png" media-type="image/png""#));

        let first = opf.find(r#"<itemref idref="item_s00_c00_xhtml"/>"#).unwrap();
        let second = opf.find(r#"<itemref idref="item_s00_c01_xhtml"/>"#).unwrap();
        assert!(first < second);
    }

    #[test]
    fn navigation_keeps_subordinated_titles() {
        let bytes = sample().to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let nav = read_entry(&mut archive, "OEBPS/nav.xhtml");
        assert!(nav.contains(r#"<a href="s00_c01.xhtml"> - Architecture</a>"#));

        let ncx = read_entry(&mut archive, "OEBPS/toc.ncx");
        assert!(ncx.contains(r#"playOrder="2""#));
        assert_eq!(read_entry(&mut archive, "OEBPS/s00_c00.xhtml"), "<html>intro</html>");
    }

    #[tokio::test]
    async fn empty_book_is_rejected() {
        let writer = EpubWriter::new(BookMetadata::default());
        let dir = tempfile::tempdir().unwrap();
        assert!(writer.save(&dir.path().join("empty.epub")).await.is_err());
    }
}
