//! Turn an [`ArenaDom`] branch back into markup.
//!
//! Two flavours: plain HTML (void elements bare, script/style raw) for the
//! renderer, and XHTML (self-closed voids, XML declaration, XHTML 1.1
//! doctype) for e-reader chapters.

use std::fmt::Write;

use super::arena::{ArenaDom, ArenaNodeData, ArenaNodeId};

pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const XHTML11_DOCTYPE: &str = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Html,
    Xhtml,
}

/// Serialize `node` and everything below it as HTML.
pub fn to_html(dom: &ArenaDom, node: ArenaNodeId) -> String {
    let mut out = String::new();
    write_node(dom, node, Flavor::Html, false, &mut out);
    out
}

/// Serialize a whole tree as HTML, doctype included if the parser saw one.
pub fn document_to_html(dom: &ArenaDom) -> String {
    to_html(dom, dom.document())
}

/// A standalone XHTML 1.1 document with `root` as its `<html>` element.
pub fn to_xhtml_document(dom: &ArenaDom, root: ArenaNodeId) -> String {
    let mut out = String::from(XML_DECLARATION);
    out.push_str(XHTML11_DOCTYPE);
    write_node(dom, root, Flavor::Xhtml, false, &mut out);
    out
}

fn write_node(dom: &ArenaDom, id: ArenaNodeId, flavor: Flavor, raw: bool, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };

    match &node.data {
        ArenaNodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, flavor, false, out);
            }
        }
        ArenaNodeData::Doctype { name, .. } => {
            if flavor == Flavor::Html {
                let _ = writeln!(out, "<!DOCTYPE {name}>");
            }
        }
        ArenaNodeData::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        ArenaNodeData::Text(text) => {
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        ArenaNodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();
            out.push('<');
            out.push_str(tag);
            let is_root = dom.parent(id).is_none_or(|p| p == dom.document());
            if flavor == Flavor::Xhtml
                && is_root
                && !attrs.iter().any(|a| a.name.local.as_ref() == "xmlns")
            {
                let _ = write!(out, " xmlns=\"{XHTML_NS}\"");
            }
            for attr in attrs {
                let _ = write!(
                    out,
                    " {}=\"{}\"",
                    attr.name.local.as_ref(),
                    escape_attr(&attr.value)
                );
            }

            let is_void = VOID_ELEMENTS.contains(&tag);
            if is_void {
                out.push_str(match flavor {
                    Flavor::Html => ">",
                    Flavor::Xhtml => " />",
                });
                return;
            }
            out.push('>');

            let raw_children = flavor == Flavor::Html && RAW_TEXT_ELEMENTS.contains(&tag);
            for child in dom.children(id) {
                write_node(dom, child, flavor, raw_children, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

/// Escape text content.
pub fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape an attribute value (or any text going into markup).
pub fn escape_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_html_round_trip_keeps_structure() {
        let dom = parse_html(b"<!DOCTYPE html><html><head><title>t</title></head><body><p class=\"a\">x &amp; y<br>z</p></body></html>");
        let html = document_to_html(&dom);
        assert_eq!(
            html,
            "<!DOCTYPE html>\n<html><head><title>t</title></head><body><p class=\"a\">x &amp; y<br>z</p></body></html>"
        );
    }

    #[test]
    fn test_script_is_raw_in_html() {
        let dom = parse_html(b"<html><head><script>if (a < b) {}</script></head><body></body></html>");
        let html = document_to_html(&dom);
        assert!(html.contains("<script>if (a < b) {}</script>"));
    }

    #[test]
    fn test_xhtml_document() {
        let dom = parse_html(b"<html><body><hr><p>\"q\"</p><div></div></body></html>");
        let root = dom.document_element().unwrap();
        let xhtml = to_xhtml_document(&dom, root);
        assert!(xhtml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html PUBLIC"));
        assert!(xhtml.contains("<html xmlns=\"http://www.w3.org/1999/xhtml\">"));
        assert!(xhtml.contains("<hr />"));
        assert!(xhtml.contains("<div></div>"));
        assert!(xhtml.contains("<p>\"q\"</p>"));
    }

    #[test]
    fn test_attr_escaping() {
        assert_eq!(escape_attr("a\"b<&"), "a&quot;b&lt;&amp;");
        assert_eq!(escape_text("\"<>"), "\"&lt;&gt;");
    }
}
