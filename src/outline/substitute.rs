//! Heading substitution for documents whose headings don't survive as
//! extractable bookmark text.
//!
//! Every `h1`..`h4` in a copy of the document is replaced by a plain ASCII
//! key such as `h2_3`. After the copy is rendered, the bookmark titles are
//! keys and can be mapped back to the real heading text.

use std::collections::BTreeMap;

use super::OutlineEntry;
use crate::dom::ArenaDom;
use crate::util::strip_whitespace_and_null;

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4"];

/// Junk some PDF tools leave on the end of a bookmark title.
const JUNK_SUFFIX: &str = "&#0;";

/// A document with substituted headings and the table to undo it.
#[derive(Debug, Clone)]
pub struct HeadingSubstitution {
    pub document: ArenaDom,
    titles: BTreeMap<String, String>,
}

impl HeadingSubstitution {
    /// Copy `source` and substitute its headings.
    pub fn new(source: &ArenaDom) -> Self {
        let mut document = source.clone();
        let mut titles = BTreeMap::new();

        for tag in HEADING_TAGS {
            let headings = document.elements_by_tag(document.document(), tag);
            for (i, heading) in headings.into_iter().enumerate() {
                let key = format!("{tag}_{i}");
                let text = document.collect_text(heading);
                titles.insert(key.clone(), strip_whitespace_and_null(&text).to_string());

                document.clear_children(heading);
                // top-level headings carry the same chapter-number
                // decoration as a normal render so pages break alike
                let holder = if *tag == "h1" {
                    let strong = document.create_html_element("strong", &[("class", "initial")]);
                    document.append(heading, strong);
                    strong
                } else {
                    heading
                };
                document.append_text(holder, &key);
                log::debug!("key: {key:?}, value: {:?}", titles[&key]);
            }
        }

        Self { document, titles }
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// The real title behind a recovered bookmark title, or `""` if the
    /// key is unknown.
    pub fn resolve(&self, recovered: &str) -> &str {
        let key = recovered.strip_suffix(JUNK_SUFFIX).unwrap_or(recovered);
        // numbering may have been prepended to the key
        let key = key.rsplit_once(' ').map_or(key, |(_, last)| last);
        self.titles.get(key).map_or("", String::as_str)
    }

    /// Swap each entry's key for its real title. Consumes the table.
    pub fn resolve_entries(self, entries: Vec<OutlineEntry>) -> Vec<OutlineEntry> {
        entries
            .into_iter()
            .map(|entry| OutlineEntry {
                title: self.resolve(&entry.title).to_string(),
                ..entry
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{document_to_html, parse_html};

    fn substituted() -> HeadingSubstitution {
        let dom = parse_html(
            "<html><body><h1>Введение</h1><p>x</p><h2> Звук <em>и</em> волны </h2><h1>Глава 2</h1></body></html>"
                .as_bytes(),
        );
        HeadingSubstitution::new(&dom)
    }

    #[test]
    fn test_headings_are_replaced_by_keys() {
        let sub = substituted();
        assert_eq!(sub.len(), 3);
        let html = document_to_html(&sub.document);
        assert!(html.contains("<h1><strong class=\"initial\">h1_0</strong></h1>"));
        assert!(html.contains("<h1><strong class=\"initial\">h1_1</strong></h1>"));
        assert!(html.contains("<h2>h2_0</h2>"));
        assert!(html.contains("<p>x</p>"));
    }

    #[test]
    fn test_source_is_untouched() {
        let dom = parse_html(b"<h1>Title</h1>");
        let _ = HeadingSubstitution::new(&dom);
        assert_eq!(dom.collect_text(dom.document()), "Title");
    }

    #[test]
    fn test_resolve_handles_prefix_and_junk() {
        let sub = substituted();
        assert_eq!(sub.resolve("h1_0"), "Введение");
        assert_eq!(sub.resolve("1. h1_1"), "Глава 2");
        assert_eq!(sub.resolve("h2_0&#0;"), "Звук и волны");
        assert_eq!(sub.resolve("h3_9"), "");
    }

    #[test]
    fn test_resolve_entries_keeps_pages() {
        let sub = substituted();
        let entries = vec![OutlineEntry {
            title: "h1_1".into(),
            depth: 1,
            page: 7,
        }];
        let resolved = sub.resolve_entries(entries);
        assert_eq!(resolved[0].title, "Глава 2");
        assert_eq!(resolved[0].page, 7);
    }
}
