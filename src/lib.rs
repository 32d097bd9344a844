//! # folio
//!
//! Print and e-reader layout for books written as HTML chapters.
//!
//! ## Features
//!
//! - Page geometry: margins, gutter and columns from a trim size, and the
//!   smallest standard sheet it prints on
//! - Command lines for an external HTML renderer, n-up compositor and
//!   reshape script
//! - Page-numbered outlines recovered from rendered PDFs, with fallbacks
//!   for scripts the PDF tools can't read back
//! - Printed contents pages reconciled against the book's own TOC
//! - Splitting of oversized chapters for e-readers
//!
//! ## Quick Start
//!
//! ```no_run
//! use folio::{Book, BookAssembler, Config, GeometryOptions, PageGeometry, SystemRunner};
//! use std::path::Path;
//!
//! let config = Config::default();
//! let book = Book::open("manual.zip").unwrap();
//! let geometry = PageGeometry::from_mm(&config, 148.0, 210.0, &GeometryOptions::default()).unwrap();
//!
//! let mut assembler = BookAssembler::new(&config, book, geometry, SystemRunner).unwrap();
//! assembler.make_pdf(Path::new("manual.pdf"), false).unwrap();
//! ```
//!
//! ## Splitting chapters
//!
//! ```
//! use folio::{Config, split_html};
//!
//! let config = Config::default();
//! let parts = split_html("<html><body><p>short</p></body></html>", None, &config).unwrap();
//! assert_eq!(parts.len(), 1);
//! ```

pub mod assembly;
pub mod book;
pub mod config;
pub mod dom;
pub mod error;
pub mod geometry;
pub mod outline;
pub mod pdf;
pub mod split;
pub mod toc;
pub mod tools;
pub(crate) mod util;

pub use assembly::{BookAssembler, ChapterFile, EreaderChapters, WorkDir};
pub use book::{Book, BookInfo, ManifestItem, Metadata};
pub use config::{Config, TextDirection};
pub use error::{Error, Result};
pub use geometry::{Columns, GeometryOptions, PageGeometry};
pub use outline::{Outline, OutlineEntry, OutlineExtractor, parse_outline_xml};
pub use pdf::PdfMaker;
pub use split::{Section, SplitTree, split_html, split_tree};
pub use toc::{ContentsTable, NumberLocaliser, TocPoint, reconcile};
pub use tools::{SystemRunner, ToolCommand, ToolOutput, ToolRunner};
