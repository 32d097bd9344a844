//! Page-numbered outlines of rendered PDFs.
//!
//! The renderer can write its outline to an XML file as it goes; that is
//! the first choice. If the file is missing, unreadable, or empty, the flat
//! bookmark dump of the PDF is tried ([`bookmarks`]). If that is empty too
//! (usually because the headings are in a script the PDF tools can't turn
//! back into text) the document is rendered again with ASCII keys in place
//! of its headings and the keys are mapped back ([`substitute`]).

pub mod bookmarks;
pub mod substitute;

use std::fs;
use std::path::Path;

use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::dom::{ArenaDom, document_to_html};
use crate::error::{Error, Result};
use crate::geometry::RenderOptions;
use crate::pdf::{PdfMaker, count_pdf_pages, dump_pdf_data};
use crate::tools::ToolRunner;

pub use bookmarks::{BookmarkDump, parse_bookmark_dump};
pub use substitute::HeadingSubstitution;

/// One heading of a rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    /// 0 is the document itself; chapters are 1.
    pub depth: u32,
    /// 1-based page number.
    pub page: u32,
}

/// Which source an outline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineTier {
    /// The renderer's own outline file.
    Dumped,
    /// The PDF's flat bookmark list.
    Bookmarks,
    /// Bookmarks of a second render with substituted headings.
    Substituted,
}

/// An extracted outline plus the PDF's real page count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    pub entries: Vec<OutlineEntry>,
    pub page_count: u32,
    pub tier: OutlineTier,
}

/// Parse a renderer outline file:
///
/// ```xml
/// <outline xmlns="http://wkhtmltopdf.org/outline">
///   <item title="" page="0">
///     <item title="1.%20Anonymous" page="2"/>
///     <item title="2.%20How%20this%20book%20is%20written" page="4">
///       <item title="What%20is%20a%20book%20sprint%3F" page="4"/>
///     </item>
///   </item>
/// </outline>
/// ```
///
/// Top-level items stand for whole documents and are not reported. Items
/// deeper than `max_depth` are not reported either, but their children are
/// still visited. Pages in the file are 0-based; `page_bias` is added.
pub fn parse_outline_xml(xml: &str, max_depth: u32, page_bias: u32) -> Result<Vec<OutlineEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut open_items = 0u32;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"item" => {
                record_item(&e, open_items, max_depth, page_bias, &mut entries)?;
                open_items += 1;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"item" => {
                record_item(&e, open_items, max_depth, page_bias, &mut entries)?;
            }
            Event::End(e) if e.local_name().as_ref() == b"item" => {
                open_items = open_items.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn record_item(
    e: &BytesStart<'_>,
    depth: u32,
    max_depth: u32,
    page_bias: u32,
    entries: &mut Vec<OutlineEntry>,
) -> Result<()> {
    if depth == 0 || depth > max_depth {
        return Ok(());
    }

    let mut title = None;
    let mut page = None;
    for attr in e.attributes().flatten() {
        let raw = String::from_utf8_lossy(&attr.value);
        match attr.key.local_name().as_ref() {
            b"title" => {
                let unescaped = quick_xml::escape::unescape(&raw).map_err(quick_xml::Error::from)?;
                let decoded = percent_decode_str(&unescaped).decode_utf8_lossy();
                title = Some(decoded.trim().to_string());
            }
            b"page" => page = raw.trim().parse::<u32>().ok(),
            _ => {}
        }
    }

    let page = page.ok_or_else(|| Error::Outline("outline item without a page".to_string()))?;
    let title = title.unwrap_or_default();
    if title.is_empty() {
        log::warn!("heading level {depth} on page {page} is empty string");
    }
    entries.push(OutlineEntry {
        title,
        depth,
        page: page + page_bias,
    });
    Ok(())
}

/// Read and parse an outline file written by the renderer.
pub fn read_outline_file(path: &Path, max_depth: u32, page_bias: u32) -> Result<Vec<OutlineEntry>> {
    let xml = fs::read_to_string(path)?;
    parse_outline_xml(&xml, max_depth, page_bias)
}

/// Runs the three extraction tiers for one rendered body.
pub struct OutlineExtractor<'a, R: ToolRunner> {
    maker: &'a PdfMaker<'a, R>,
    workdir: &'a Path,
}

impl<'a, R: ToolRunner> OutlineExtractor<'a, R> {
    /// `maker` must be the one that rendered the body, so a substitution
    /// render comes out with the same page geometry.
    pub fn new(maker: &'a PdfMaker<'a, R>, workdir: &'a Path) -> Self {
        Self { maker, workdir }
    }

    /// Outline of `body_pdf`, rendered from `document`, whose renderer
    /// outline (if any) was written to `outline_file`.
    pub fn extract(&self, document: &ArenaDom, body_pdf: &Path, outline_file: &Path) -> Result<Outline> {
        let config = self.maker.config();
        let page_count = count_pdf_pages(self.maker.runner(), config, body_pdf)?;

        match read_outline_file(outline_file, config.contents_depth, config.outline_page_bias) {
            Ok(entries) if !entries.is_empty() => {
                return Ok(Outline {
                    entries,
                    page_count,
                    tier: OutlineTier::Dumped,
                });
            }
            Ok(_) => log::info!("outline file {} is empty", outline_file.display()),
            Err(e) => log::warn!("could not read outline file {}: {e}", outline_file.display()),
        }

        let entries = self.bookmarks(body_pdf, "extracted-outline.txt");
        if !entries.is_empty() {
            return Ok(Outline {
                entries,
                page_count,
                tier: OutlineTier::Bookmarks,
            });
        }

        log::info!("no outline: trying again with ascii headings");
        let substitution = HeadingSubstitution::new(document);
        let html_file = self.workdir.join("body-ascii-headings.html");
        let pdf_file = self.workdir.join("body-ascii-headings.pdf");
        fs::write(&html_file, document_to_html(&substitution.document))?;
        self.maker.make_raw_pdf(
            &html_file,
            &pdf_file,
            &RenderOptions {
                outline: true,
                ..Default::default()
            },
        )?;
        let keyed = self.bookmarks(&pdf_file, "ascii-extracted-outline.txt");
        Ok(Outline {
            entries: substitution.resolve_entries(keyed),
            page_count,
            tier: OutlineTier::Substituted,
        })
    }

    /// Flat bookmarks of `pdf`. A failing dump tool is logged and treated
    /// as an empty outline so the next tier can run.
    fn bookmarks(&self, pdf: &Path, debug_name: &str) -> Vec<OutlineEntry> {
        let config = self.maker.config();
        let dump = match dump_pdf_data(self.maker.runner(), config, pdf) {
            Ok(dump) => dump,
            Err(e) => {
                log::warn!("bookmark dump of {} failed: {e}", pdf.display());
                return Vec::new();
            }
        };
        let debug_file = self.workdir.join(debug_name);
        if let Err(e) = fs::write(&debug_file, &dump) {
            log::warn!("could not write to {}: {e}", debug_file.display());
        }
        parse_bookmark_dump(&dump, config.contents_depth).entries
    }
}
