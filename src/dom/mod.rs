//! Mutable HTML document trees.
//!
//! Documents are parsed with html5ever into an index-linked [`ArenaDom`],
//! edited in place, and written back out with [`serialize`].

pub mod arena;
pub mod serialize;
pub mod tree_sink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

pub use arena::{ArenaDom, ArenaNodeData, ArenaNodeId, Attribute};
pub use serialize::{Flavor, document_to_html, to_html, to_xhtml_document};
pub use tree_sink::ArenaSink;

/// Parse an HTML document. Never fails: broken markup is repaired the way a
/// browser would repair it, and invalid UTF-8 is replaced.
pub fn parse_html(bytes: &[u8]) -> ArenaDom {
    parse_document(ArenaSink::new(), ParseOpts::default())
        .from_utf8()
        .one(bytes)
        .into_dom()
}

/// The `<body>` element, created if the document somehow lacks one.
pub fn body(dom: &mut ArenaDom) -> ArenaNodeId {
    if let Some(body) = dom.find_by_tag("body") {
        return body;
    }
    let root = match dom.document_element() {
        Some(root) => root,
        None => {
            let html = dom.create_html_element("html", &[]);
            let doc = dom.document();
            dom.append(doc, html);
            html
        }
    };
    let body = dom.create_html_element("body", &[]);
    dom.append(root, body);
    body
}
