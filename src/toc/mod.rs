//! The book's declared table of contents.
//!
//! [`TocPoint`]s are read from the book's `info.json`, annotated once by
//! [`annotate_toc`], decorated with rendered ids and titles while the
//! chapters are joined, and finally matched against the PDF outline by
//! [`reconcile`].

pub mod contents;
pub mod localise;

use serde::{Deserialize, Serialize};

pub use contents::{ContentsRow, ContentsTable, CursorStep, OutlineCursor, reconcile};
pub use localise::NumberLocaliser;

/// One entry of the declared table of contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocPoint>,

    /// 1 for top-level points.
    #[serde(skip)]
    pub depth: u32,
    /// Position in a pre-order walk of the whole tree.
    #[serde(skip)]
    pub index: usize,
    /// The url without any leading `/` or fragment.
    #[serde(skip)]
    pub filename: String,
    #[serde(skip)]
    pub fragment: Option<String>,
    /// Text of the heading the chapter actually starts with.
    #[serde(skip)]
    pub html_title: Option<String>,
    /// Id of the element this point lands on in the joined document.
    #[serde(skip)]
    pub html_id: Option<String>,
}

impl TocPoint {
    pub fn new(title: &str, url: Option<&str>) -> Self {
        Self {
            title: Some(title.to_string()),
            url: url.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_children(mut self, children: Vec<TocPoint>) -> Self {
        self.children = children;
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// The rendered heading if one was found, else the declared title.
    pub fn best_title(&self) -> &str {
        self.html_title
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("Untitled")
    }

    pub fn declared_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    fn set_url_parts(&mut self, url: &str) {
        let url = url.trim_start_matches('/');
        match url.split_once('#') {
            Some((filename, fragment)) => {
                self.filename = filename.to_string();
                self.fragment = Some(fragment.to_string());
            }
            None => {
                self.filename = url.to_string();
                self.fragment = None;
            }
        }
    }
}

/// Fill in depth, index, filename and fragment for every point. A point
/// without a url takes its first child's.
pub fn annotate_toc(toc: &mut [TocPoint]) {
    annotate_level(toc, 1, 0);
}

fn annotate_level(toc: &mut [TocPoint], depth: u32, mut index: usize) -> usize {
    for point in toc {
        point.depth = depth;
        point.index = index;
        index += 1;
        index = annotate_level(&mut point.children, depth + 1, index);

        let url = match point.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => url.to_string(),
            None => match point.children.first().and_then(|c| c.url.clone()) {
                Some(inherited) => {
                    point.url = Some(inherited.clone());
                    inherited
                }
                None => {
                    log::warn!("toc item with empty url: {:?}", point.title);
                    String::new()
                }
            },
        };
        point.set_url_parts(&url);
    }
    index
}

/// Visit every point in pre-order.
pub fn walk_toc_mut(toc: &mut [TocPoint], f: &mut impl FnMut(&mut TocPoint)) {
    for point in toc {
        f(point);
        walk_toc_mut(&mut point.children, f);
    }
}
