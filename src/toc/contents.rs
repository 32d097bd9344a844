//! Matching the declared contents against the rendered outline.

use std::fmt::Write;

use super::{NumberLocaliser, TocPoint};
use crate::dom::serialize::escape_text;
use crate::outline::OutlineEntry;

/// Forward-only reader over an outline, yielding chapter-level entries.
pub struct OutlineCursor<'a> {
    entries: std::slice::Iter<'a, OutlineEntry>,
}

/// Result of advancing an [`OutlineCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep<'a> {
    Found(&'a OutlineEntry),
    Exhausted,
}

impl<'a> OutlineCursor<'a> {
    pub fn new(entries: &'a [OutlineEntry]) -> Self {
        Self {
            entries: entries.iter(),
        }
    }

    /// Skip entries nested below chapter level and return the next
    /// chapter entry.
    pub fn next_chapter(&mut self) -> CursorStep<'a> {
        match self.entries.by_ref().find(|e| e.depth <= 1) {
            Some(entry) => CursorStep::Found(entry),
            None => CursorStep::Exhausted,
        }
    }
}

/// One line of the printed contents page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentsRow {
    /// A top-level point with no chapters.
    EmptySection(String),
    /// A top-level point heading its chapters.
    Section(String),
    Chapter {
        number: String,
        title: String,
        page: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentsTable {
    pub rows: Vec<ContentsRow>,
}

impl ContentsTable {
    pub fn chapter_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, ContentsRow::Chapter { .. }))
            .count()
    }

    pub fn section_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, ContentsRow::Section(_)))
            .count()
    }

    /// The contents as an HTML table.
    pub fn to_html(&self) -> String {
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let mut s = String::new();
                let _ = match row {
                    ContentsRow::EmptySection(title) => writeln!(
                        s,
                        "<tr><td class=\"empty-section\" colspan=\"3\">{}</td></tr>",
                        escape_text(title)
                    ),
                    ContentsRow::Section(title) => writeln!(
                        s,
                        "<tr><td class=\"section\" colspan=\"3\">{}</td></tr>",
                        escape_text(title)
                    ),
                    ContentsRow::Chapter {
                        number,
                        title,
                        page,
                    } => writeln!(
                        s,
                        "<tr><td class=\"chapter\">{number}</td><td class=\"title\">{}</td><td class=\"pagenumber\">{page}</td></tr>",
                        escape_text(title)
                    ),
                };
                s
            })
            .collect();
        format!("<table class=\"toc\">\n{}\n</table>", rows.join("\n"))
    }
}

/// Walk the top-level points in step with the outline.
///
/// Each chapter takes the next chapter-level outline entry for its page
/// number. Once the outline runs out, no further chapter rows are produced
/// (section rows still are); the contents page is then incomplete rather
/// than missing.
pub fn reconcile(toc: &[TocPoint], outline: &[OutlineEntry], localiser: NumberLocaliser) -> ContentsTable {
    let mut cursor = OutlineCursor::new(outline);
    let mut rows = Vec::new();
    let mut chapter = 1;

    for section in toc {
        if !section.has_children() {
            rows.push(ContentsRow::EmptySection(section.declared_title().to_string()));
            continue;
        }
        rows.push(ContentsRow::Section(section.declared_title().to_string()));

        for point in &section.children {
            let entry = match cursor.next_chapter() {
                CursorStep::Found(entry) => entry,
                CursorStep::Exhausted => {
                    log::warn!("contents data not found for {:?}. Stopping", point.title);
                    break;
                }
            };
            rows.push(ContentsRow::Chapter {
                number: localiser.localise(chapter),
                title: point.best_title().to_string(),
                page: localiser.localise(entry.page),
            });
            chapter += 1;
        }
    }

    ContentsTable { rows }
}
