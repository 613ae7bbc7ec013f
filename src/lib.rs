//! # book2epub
//!
//! A CLI utility to turn an online book's table of contents into an EPUB.
//!
//! The run is a straight pipeline: fetch the contents page, fetch and clean
//! every chapter (dropping navigation, flattening links, localizing images),
//! then package everything as an EPUB or as loose HTML files.
//!
//! ## Usage
//!
//! ```bash
//! book2epub build --out-dir epubs
//! book2epub index --config book.toml
//! ```

pub mod assembler;
pub mod config;
pub mod content;
mod downloader;
mod epub_writer;
pub mod fetch;
pub mod index;
pub mod model;
pub mod sanitize;

pub use config::{BookConfig, BookMetadata, OutputFormat, Selectors};
pub use downloader::Downloader;
pub use epub_writer::EpubWriter;
pub use fetch::{Fetcher, HttpFetcher};
#[cfg(any(test, feature = "test-util"))]
pub use fetch::StaticFetcher;
pub use model::{Image, Link, Section, TableOfContents};
