use serde::Serialize;
use url::Url;

/// The scraped table of contents: sections in document order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableOfContents {
    pub sections: Vec<Section>,
}

impl TableOfContents {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Total number of links across all sections.
    pub fn link_count(&self) -> usize {
        self.sections.iter().map(|s| s.links.len()).sum()
    }

    /// Links in reading order: section-major, link-minor.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.sections.iter().flat_map(|s| s.links.iter())
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut Link> {
        self.sections.iter_mut().flat_map(|s| s.links.iter_mut())
    }
}

/// A top-level grouping of chapters, e.g. a book "Part".
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub index: usize,
    pub links: Vec<Link>,
}

impl Section {
    pub fn new(index: usize, links: Vec<Link>) -> Self {
        Self { index, links }
    }
}

/// One table-of-contents entry, enriched in place by the content fetcher.
#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub section_index: usize,
    pub index: usize,
    pub title: String,
    pub url: Url,
    #[serde(skip)]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip)]
    pub images: Vec<Image>,
}

impl Link {
    pub fn new(section_index: usize, index: usize, title: impl Into<String>, url: Url) -> Self {
        Self {
            section_index,
            index,
            title: title.into(),
            url,
            content: None,
            file_name: None,
            images: Vec::new(),
        }
    }

    /// Title as shown in the book's contents; every entry after the first in
    /// its section is subordinated under the section's title entry.
    pub fn display_title(&self) -> String {
        if self.index > 0 {
            format!(" - {}", self.title)
        } else {
            self.title.clone()
        }
    }

    /// File name stem shared by the chapter document and its images.
    pub fn stem(&self) -> String {
        chapter_stem(self.section_index, self.index)
    }
}

/// An image referenced by a chapter. `data` is empty when the fetch failed.
#[derive(Debug, Clone)]
pub struct Image {
    pub file_name: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

impl Image {
    pub fn is_fetched(&self) -> bool {
        !self.data.is_empty()
    }
}

/// `s{SS}_c{LL}`. Indices of 100 or more widen the name instead of wrapping.
pub fn chapter_stem(section_index: usize, link_index: usize) -> String {
    format!("s{:02}_c{:02}", section_index, link_index)
}

pub fn chapter_file_name(section_index: usize, link_index: usize, extension: &str) -> String {
    format!("{}.{}", chapter_stem(section_index, link_index), extension)
}

pub fn image_file_name(
    section_index: usize,
    link_index: usize,
    image_index: usize,
    extension: &str,
) -> String {
    format!(
        "{}_i{:02}.{}",
        chapter_stem(section_index, link_index),
        image_index,
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn link(section: usize, index: usize, title: &str) -> Link {
        let url = Url::parse("http://example.com/").unwrap().join(title).unwrap();
        Link::new(section, index, title, url)
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(chapter_file_name(0, 3, "xhtml"), "s00_c03.xhtml");
        assert_eq!(chapter_file_name(12, 7, "html"), "s12_c07.html");
        assert_eq!(image_file_name(1, 2, 3, "png"), "s01_c02_i03.png");
    }

    #[test]
    fn file_names_are_unique_below_one_hundred() {
        let mut seen = HashSet::new();
        for s in 0..100 {
            for c in 0..100 {
                assert!(seen.insert(chapter_file_name(s, c, "xhtml")));
            }
        }
    }

    #[test]
    fn file_names_widen_at_one_hundred() {
        assert_eq!(chapter_stem(100, 0), "s100_c00");
        assert_eq!(image_file_name(0, 0, 100, "gif"), "s00_c00_i100.gif");
    }

    #[test]
    fn display_title_subordinates_later_links() {
        assert_eq!(link(0, 0, "Introduction").display_title(), "Introduction");
        assert_eq!(link(0, 1, "Architecture").display_title(), " - Architecture");
    }

    #[test]
    fn links_are_flattened_section_major() {
        let toc = TableOfContents::new(vec![
            Section::new(0, vec![link(0, 0, "a"), link(0, 1, "b")]),
            Section::new(1, vec![link(1, 0, "c")]),
        ]);

        let titles: Vec<_> = toc.links().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
        assert_eq!(toc.link_count(), 3);
    }
}
