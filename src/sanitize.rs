//! Turns a chapter's content element into standalone XHTML.
//!
//! `nav` elements are dropped, anchors are replaced by their text, and every
//! surviving `img[src]` becomes a slot whose final value is chosen after the
//! image has been resolved and fetched.

use scraper::{ElementRef, Node};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// A serialized fragment with holes for image sources.
///
/// `parts` always holds one more entry than `image_sources`: the markup is
/// `parts[0] src[0] parts[1] src[1] ... parts[n]`.
#[derive(Debug, Clone)]
pub struct Fragment {
    parts: Vec<String>,
    image_sources: Vec<String>,
}

impl Fragment {
    /// Sanitize `root` and everything below it. The root itself is always kept.
    pub fn from_element(root: ElementRef<'_>) -> Self {
        let mut renderer = Renderer::default();
        renderer.element(root);
        renderer.finish()
    }

    /// Original `src` values of the kept images, in document order.
    pub fn image_sources(&self) -> &[String] {
        &self.image_sources
    }

    /// Markup with the original image sources left in place.
    pub fn to_html(&self) -> String {
        self.fill(&self.image_sources)
    }

    /// Markup with image `src` attributes replaced, position for position.
    /// Missing trailing entries render as an empty `src`.
    pub fn fill(&self, sources: &[String]) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            out.push_str(part);
            if i < self.image_sources.len() {
                let src = sources.get(i).map(String::as_str).unwrap_or("");
                out.push_str(&escape_attr(src));
            }
        }
        out
    }
}

#[derive(Default)]
struct Renderer {
    buf: String,
    parts: Vec<String>,
    image_sources: Vec<String>,
}

impl Renderer {
    fn finish(mut self) -> Fragment {
        self.parts.push(self.buf);
        Fragment {
            parts: self.parts,
            image_sources: self.image_sources,
        }
    }

    fn child(&mut self, element: ElementRef<'_>) {
        match element.value().name() {
            "nav" => {}
            "a" => {
                let text: String = element.text().collect();
                self.buf.push_str(&escape_text(&text));
            }
            _ => self.element(element),
        }
    }

    fn element(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        self.buf.push('<');
        self.buf.push_str(name);

        for (key, value) in element.value().attrs() {
            self.buf.push(' ');
            self.buf.push_str(key);
            self.buf.push_str("=\"");
            if name == "img" && key == "src" {
                self.image_sources.push(value.to_string());
                self.parts.push(std::mem::take(&mut self.buf));
            } else {
                self.buf.push_str(&escape_attr(value));
            }
            self.buf.push('"');
        }

        if VOID_ELEMENTS.contains(&name) {
            self.buf.push_str(" />");
            return;
        }
        self.buf.push('>');

        for node in element.children() {
            match node.value() {
                Node::Text(text) => self.buf.push_str(&escape_text(text)),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(node) {
                        self.child(child);
                    }
                }
                _ => {}
            }
        }

        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push('>');
    }
}

/// Minimal standalone document around a sanitized fragment.
pub fn wrap_document(title: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\">\n\
         <head><meta charset=\"UTF-8\" /><title>{}</title></head>\n\
         <body>{}</body>\n\
         </html>\n",
        escape_text(title),
        body
    )
}

pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub(crate) fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;").replace('\'', "&apos;")
}
