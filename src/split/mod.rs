//! Splitting oversized HTML documents for e-readers.
//!
//! Markers are dropped into the serialized document at evenly spaced tag
//! boundaries ([`insert_markers`]), the result is parsed, and the tree is
//! cut at each marker ([`split_tree`]). Branches that don't contain a
//! marker are moved whole; only the ancestors of a marker are copied, once
//! per cut.

use std::io::Write as _;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use memchr::{memchr, memmem};

use crate::config::Config;
use crate::dom::{ArenaDom, ArenaNodeId, parse_html, to_html, to_xhtml_document};
use crate::error::Result;

/// One piece of a split document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Root element of this section, a copy of the source root.
    pub root: ArenaNodeId,
    /// Taken from the marker that opened this section.
    pub id: Option<String>,
    pub title: Option<String>,
}

/// The sections of a split document. They share one node arena.
#[derive(Debug, Clone)]
pub struct SplitTree {
    pub dom: ArenaDom,
    pub sections: Vec<Section>,
}

impl SplitTree {
    /// Each section serialized as a complete HTML document.
    pub fn to_html(&self) -> Vec<String> {
        self.sections
            .iter()
            .map(|s| to_html(&self.dom, s.root))
            .collect()
    }

    /// Each section serialized as a standalone XHTML document.
    pub fn to_xhtml(&self) -> Vec<String> {
        self.sections
            .iter()
            .map(|s| to_xhtml_document(&self.dom, s.root))
            .collect()
    }
}

/// How many cuts a document of `len` bytes (`compressed` when zipped)
/// needs to fit the size limits.
pub fn split_count(config: &Config, len: usize, compressed: usize) -> usize {
    let by_compressed = compressed / config.epub_compressed_size_max.max(1);
    let by_length = len / config.epub_file_size_max.max(1);
    by_compressed.max(by_length)
}

/// zlib-compressed size of `data`.
pub fn compressed_len(data: &[u8]) -> Result<usize> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?.len())
}

/// Insert `splits` markers into serialized HTML, each at the first tag
/// opening at or after an evenly spaced target offset. A target with no
/// tag after it puts its marker at the end.
///
/// Only tags in ordinary content count: a `<` inside an attribute value, a
/// comment, or the raw text of a script-like element is never a cut.
pub fn insert_markers(html: &str, splits: usize, marker_class: &str) -> String {
    if splits == 0 {
        return html.to_string();
    }
    let starts = markup_starts(html);
    let target = html.len() / (splits + 1);
    let mut out = String::with_capacity(html.len() + splits * 80);
    let mut start = 0;

    for i in 0..splits {
        let from = (target * (i + 1)).max(start);
        let cut = starts
            .get(starts.partition_point(|&p| p < from))
            .copied()
            .unwrap_or(html.len());
        out.push_str(&html[start..cut]);
        out.push_str(&format!("<hr class=\"{marker_class}\" id=\"split_{i}\" />"));
        start = cut;
    }
    out.push_str(&html[start..]);
    out
}

/// Elements whose content the parser reads as text up to the end tag.
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "title", "xmp"];

/// Offsets of every `<` that opens a tag, end tag, comment or doctype in
/// ordinary content, in order. End tags of raw-text elements are left out;
/// a marker there would land in the raw text.
fn markup_starts(html: &str) -> Vec<usize> {
    let bytes = html.as_bytes();
    let mut starts = Vec::new();
    let mut pos = 0;

    while let Some(found) = memchr(b'<', &bytes[pos..]) {
        let lt = pos + found;
        if bytes[lt + 1..].starts_with(b"!--") {
            starts.push(lt);
            pos = bytes
                .get(lt + 4..)
                .and_then(|rest| memmem::find(rest, b"-->"))
                .map_or(bytes.len(), |end| lt + 4 + end + 3);
            continue;
        }
        if !is_tag_start(bytes, lt) {
            pos = lt + 1;
            continue;
        }
        starts.push(lt);
        pos = tag_end(bytes, lt + 1);
        if let Some(tag) = raw_text_tag(bytes, lt + 1) {
            pos = raw_text_end(bytes, pos, tag);
        }
    }
    starts
}

/// A `<` that opens a tag, end tag, comment or doctype.
fn is_tag_start(bytes: &[u8], pos: usize) -> bool {
    bytes
        .get(pos + 1)
        .is_some_and(|&b| b.is_ascii_alphabetic() || b == b'/' || b == b'!')
}

/// Offset just past the `>` closing the tag whose name starts at `from`.
/// Quoted attribute values may contain `>`.
fn tag_end(bytes: &[u8], from: usize) -> usize {
    let mut quote = None;
    let mut after_equals = false;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'>' => return i + 1,
                b'"' | b'\'' if after_equals => quote = Some(b),
                b'=' => after_equals = true,
                b if b.is_ascii_whitespace() => {}
                _ => after_equals = false,
            },
        }
    }
    bytes.len()
}

/// The raw-text element opened by the start tag whose name begins at `from`.
fn raw_text_tag(bytes: &[u8], from: usize) -> Option<&'static str> {
    let name_len = bytes[from..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    let name = &bytes[from..from + name_len];
    RAW_TEXT_TAGS
        .iter()
        .copied()
        .find(|tag| name.eq_ignore_ascii_case(tag.as_bytes()))
}

/// Offset just past the end tag closing raw-text element `tag`, searching
/// from `from`.
fn raw_text_end(bytes: &[u8], from: usize, tag: &str) -> usize {
    for close in memmem::find_iter(&bytes[from..], b"</").map(|p| from + p) {
        let name_start = close + 2;
        let name_end = name_start + tag.len();
        let matches = bytes
            .get(name_start..name_end)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag.as_bytes()));
        let whole_name = bytes
            .get(name_end)
            .is_none_or(|b| !b.is_ascii_alphanumeric());
        if matches && whole_name {
            return tag_end(bytes, name_start);
        }
    }
    bytes.len()
}

/// Cut `dom` at every `hr` carrying `marker_class`.
///
/// The first section runs up to the first marker; each marker's `id` and
/// `title` belong to the section after it. With no markers the whole
/// document is the single section. Text after a marker is kept.
pub fn split_tree(mut dom: ArenaDom, marker_class: &str) -> SplitTree {
    let Some(root) = dom.document_element() else {
        return SplitTree {
            dom,
            sections: Vec::new(),
        };
    };

    // ancestor chains, root first, marker last
    let lineages: Vec<Vec<ArenaNodeId>> = dom
        .descendants(root)
        .filter(|&n| dom.is_element_named(n, "hr") && dom.get_attr(n, "class") == Some(marker_class))
        .map(|marker| {
            let mut chain: Vec<_> = dom.ancestors(marker).take_while(|&a| a != dom.document()).collect();
            chain.reverse();
            chain.push(marker);
            chain
        })
        .collect();

    let mut sections = Vec::with_capacity(lineages.len() + 1);
    let mut id = None;
    let mut title = None;

    for lineage in &lineages {
        let marker = lineage[lineage.len() - 1];
        let section_root = dom.shallow_copy(root);
        let mut src = root;
        let mut dest = section_root;
        let mut level = 1;

        loop {
            let next_on_line = lineage[level];
            let mut child = dom.get(src).map_or(ArenaNodeId::NONE, |n| n.first_child);
            while child.is_some() && child != next_on_line {
                let following = dom.get(child).map_or(ArenaNodeId::NONE, |n| n.next_sibling);
                dom.reparent(child, dest);
                child = following;
            }
            if next_on_line == marker {
                break;
            }
            let shell = dom.shallow_copy(next_on_line);
            dom.append(dest, shell);
            dest = shell;
            src = next_on_line;
            level += 1;
        }

        sections.push(Section {
            root: section_root,
            id: id.take(),
            title: title.take(),
        });
        id = dom.get_attr(marker, "id").map(str::to_string);
        title = dom.get_attr(marker, "title").map(str::to_string);
        dom.detach(marker);
    }

    sections.push(Section { root, id, title });
    SplitTree { dom, sections }
}

/// Split serialized HTML into XHTML documents that fit the configured
/// limits.
///
/// `compressed_size` is the document's size in its zip container if known;
/// otherwise it is measured. Documents already small enough come back as a
/// single XHTML document.
pub fn split_html(html: &str, compressed_size: Option<usize>, config: &Config) -> Result<Vec<String>> {
    let compressed = match compressed_size {
        Some(size) => size,
        None => compressed_len(html.as_bytes())?,
    };
    let splits = split_count(config, html.len(), compressed);
    log::info!(
        "uncompressed: {}, compressed: {compressed}, splits: {splits}",
        html.len()
    );
    let marked = insert_markers(html, splits, &config.marker_class_split);
    let tree = split_tree(parse_html(marked.as_bytes()), &config.marker_class_split);
    Ok(tree.to_xhtml())
}
