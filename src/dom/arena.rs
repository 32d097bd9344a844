//! Arena-based document tree.
//!
//! Nodes live in one contiguous vector and link to each other by index, so
//! moving a whole branch to a new parent is a handful of index updates no
//! matter how large the branch is. The splitter depends on that.

use std::collections::HashMap;

use html5ever::{LocalName, QualName, ns};

/// Index of a node in an [`ArenaDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaNodeId(pub u32);

impl ArenaNodeId {
    /// Marks an absent link.
    pub const NONE: ArenaNodeId = ArenaNodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// What a node holds.
#[derive(Debug, Clone)]
pub enum ArenaNodeData {
    /// Document root.
    Document,
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Copied out of `attrs` when the element is created.
        id: Option<String>,
        classes: Vec<String>,
    },
    /// Text content.
    Text(String),
    Comment(String),
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
}

/// HTML attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// One node plus its tree links.
#[derive(Debug, Clone)]
pub struct ArenaNode {
    pub data: ArenaNodeData,
    pub parent: ArenaNodeId,
    pub first_child: ArenaNodeId,
    pub last_child: ArenaNodeId,
    pub prev_sibling: ArenaNodeId,
    pub next_sibling: ArenaNodeId,
}

impl ArenaNode {
    fn new(data: ArenaNodeData) -> Self {
        Self {
            data,
            parent: ArenaNodeId::NONE,
            first_child: ArenaNodeId::NONE,
            last_child: ArenaNodeId::NONE,
            prev_sibling: ArenaNodeId::NONE,
            next_sibling: ArenaNodeId::NONE,
        }
    }
}

/// An HTML-namespace element name.
pub fn html_name(local: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(local))
}

/// An attribute with no namespace.
pub fn attr_name(local: &str) -> QualName {
    QualName::new(None, ns!(), LocalName::from(local))
}

/// Arena-based DOM tree.
///
/// Parent/child/sibling links use indices into the node vector. Detached
/// nodes stay allocated; they simply have no parent.
#[derive(Debug, Clone)]
pub struct ArenaDom {
    nodes: Vec<ArenaNode>,
    document: ArenaNodeId,
    /// `id` attribute -> element, kept current by `set_attr`.
    id_map: HashMap<String, ArenaNodeId>,
}

impl ArenaDom {
    /// A tree holding only its document node.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: ArenaNodeId::NONE,
            id_map: HashMap::new(),
        };
        dom.document = dom.alloc(ArenaNode::new(ArenaNodeData::Document));
        dom
    }

    fn alloc(&mut self, node: ArenaNode) -> ArenaNodeId {
        let id = ArenaNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn document(&self) -> ArenaNodeId {
        self.document
    }

    /// The outermost element (normally `<html>`).
    pub fn document_element(&self) -> Option<ArenaNodeId> {
        self.children(self.document).find(|&c| self.is_element(c))
    }

    pub fn get(&self, id: ArenaNodeId) -> Option<&ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ArenaNodeId) -> Option<&mut ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a new element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> ArenaNodeId {
        let mut id = None;
        let mut classes = Vec::new();

        for attr in &attrs {
            if attr.name.local.as_ref() == "id" {
                id = Some(attr.value.clone());
            } else if attr.name.local.as_ref() == "class" {
                classes = attr
                    .value
                    .split_whitespace()
                    .map(|s| s.to_string())
                    .collect();
            }
        }

        let node_id = self.alloc(ArenaNode::new(ArenaNodeData::Element {
            name,
            attrs,
            id: id.clone(),
            classes,
        }));

        if let Some(id_str) = id {
            self.id_map.entry(id_str).or_insert(node_id);
        }

        node_id
    }

    /// Create an HTML element from a tag and `(name, value)` pairs.
    pub fn create_html_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> ArenaNodeId {
        let attrs = attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: attr_name(name),
                value: value.to_string(),
            })
            .collect();
        self.create_element(html_name(tag), attrs)
    }

    pub fn create_text(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Text(text)))
    }

    pub fn create_comment(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Comment(text)))
    }

    pub fn create_doctype(
        &mut self,
        name: String,
        public_id: String,
        system_id: String,
    ) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Doctype {
            name,
            public_id,
            system_id,
        }))
    }

    /// Append a child to a parent node. The child must be detached.
    pub fn append(&mut self, parent: ArenaNodeId, child: ArenaNodeId) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
            child_node.next_sibling = ArenaNodeId::NONE;
        }

        if last_child.is_some()
            && let Some(last_node) = self.get_mut(last_child)
        {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a detached node before a sibling.
    pub fn insert_before(&mut self, sibling: ArenaNodeId, new_node: ArenaNodeId) {
        let parent = self
            .get(sibling)
            .map(|n| n.parent)
            .unwrap_or(ArenaNodeId::NONE);
        let prev = self
            .get(sibling)
            .map(|n| n.prev_sibling)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Insert a detached node as the first child of `parent`.
    pub fn prepend(&mut self, parent: ArenaNodeId, child: ArenaNodeId) {
        match self.get(parent).map(|n| n.first_child) {
            Some(first) if first.is_some() => self.insert_before(first, child),
            _ => self.append(parent, child),
        }
    }

    /// Unlink a node (and its whole branch) from its parent and siblings.
    ///
    /// The branch stays intact and can be appended elsewhere.
    pub fn detach(&mut self, target: ArenaNodeId) {
        let (parent, prev, next) = match self.get(target) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(target) {
            node.parent = ArenaNodeId::NONE;
            node.prev_sibling = ArenaNodeId::NONE;
            node.next_sibling = ArenaNodeId::NONE;
        }
    }

    /// Detach every child of `parent`.
    pub fn clear_children(&mut self, parent: ArenaNodeId) {
        let children: Vec<_> = self.children(parent).collect();
        for child in children {
            self.detach(child);
        }
    }

    /// Move a node (with its branch) to the end of `new_parent`.
    pub fn reparent(&mut self, node: ArenaNodeId, new_parent: ArenaNodeId) {
        self.detach(node);
        self.append(new_parent, node);
    }

    /// Adds text under `parent`, extending its last child when that is already text.
    pub fn append_text(&mut self, parent: ArenaNodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let ArenaNodeData::Text(ref mut existing) = last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// A parentless copy of `id` without its children.
    pub fn shallow_copy(&mut self, id: ArenaNodeId) -> ArenaNodeId {
        let data = match self.get(id) {
            Some(node) => node.data.clone(),
            None => return ArenaNodeId::NONE,
        };
        match data {
            ArenaNodeData::Element { name, attrs, .. } => self.create_element(name, attrs),
            other => self.alloc(ArenaNode::new(other)),
        }
    }

    /// Deep-copy the branch at `node` from another tree into this one.
    /// The copy is returned detached.
    pub fn import(&mut self, src: &ArenaDom, node: ArenaNodeId) -> ArenaNodeId {
        let Some(data) = src.get(node).map(|n| n.data.clone()) else {
            return ArenaNodeId::NONE;
        };
        let copy = match data {
            ArenaNodeData::Element { name, attrs, .. } => self.create_element(name, attrs),
            other => self.alloc(ArenaNode::new(other)),
        };
        for child in src.children(node) {
            let child_copy = self.import(src, child);
            self.append(copy, child_copy);
        }
        copy
    }

    /// Element carrying `id=".."`, if any.
    pub fn get_by_id(&self, id: &str) -> Option<ArenaNodeId> {
        self.id_map.get(id).copied()
    }

    /// Set (or replace) an attribute on an element.
    pub fn set_attr(&mut self, id: ArenaNodeId, attr: &str, value: &str) {
        let Some(node) = self.get_mut(id) else {
            return;
        };
        let ArenaNodeData::Element {
            attrs,
            id: element_id,
            classes,
            ..
        } = &mut node.data
        else {
            return;
        };

        match attrs.iter_mut().find(|a| a.name.local.as_ref() == attr) {
            Some(existing) => existing.value = value.to_string(),
            None => attrs.push(Attribute {
                name: attr_name(attr),
                value: value.to_string(),
            }),
        }
        match attr {
            "id" => {
                *element_id = Some(value.to_string());
                self.id_map.insert(value.to_string(), id);
            }
            "class" => *classes = value.split_whitespace().map(str::to_string).collect(),
            _ => {}
        }
    }

    /// Allocated nodes, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing but the document node was ever allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn parent(&self, id: ArenaNodeId) -> Option<ArenaNodeId> {
        self.get(id).map(|n| n.parent).filter(ArenaNodeId::is_some)
    }

    /// Direct children, first to last.
    pub fn children(&self, parent: ArenaNodeId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(ArenaNodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// First child that is an element.
    pub fn first_element_child(&self, parent: ArenaNodeId) -> Option<ArenaNodeId> {
        self.children(parent).find(|&c| self.is_element(c))
    }

    /// `node` and everything below it, in document order.
    pub fn descendants(&self, node: ArenaNodeId) -> Descendants<'_> {
        Descendants {
            dom: self,
            stack: vec![node],
        }
    }

    /// Ancestors of `node`, nearest first, not including `node`.
    pub fn ancestors(&self, node: ArenaNodeId) -> impl Iterator<Item = ArenaNodeId> + '_ {
        std::iter::successors(self.parent(node), move |&n| self.parent(n))
    }

    /// Find the first node matching a predicate (DFS).
    pub fn find<F>(&self, predicate: F) -> Option<ArenaNodeId>
    where
        F: Fn(&ArenaNode) -> bool,
    {
        self.descendants(self.document)
            .find(|&id| self.get(id).is_some_and(&predicate))
    }

    /// First element with this tag, in allocation order.
    pub fn find_by_tag(&self, tag: &str) -> Option<ArenaNodeId> {
        self.find(|node| {
            if let ArenaNodeData::Element { name, .. } = &node.data {
                name.local.as_ref() == tag
            } else {
                false
            }
        })
    }

    /// All elements named `tag` under `root`, in document order.
    pub fn elements_by_tag(&self, root: ArenaNodeId, tag: &str) -> Vec<ArenaNodeId> {
        self.descendants(root)
            .filter(|&id| self.is_element_named(id, tag))
            .collect()
    }
}

impl Default for ArenaDom {
    fn default() -> Self {
        Self::new()
    }
}

/// See [`ArenaDom::children`].
pub struct ChildrenIter<'a> {
    dom: &'a ArenaDom,
    current: ArenaNodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = ArenaNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(ArenaNodeId::NONE);
        Some(id)
    }
}

/// Pre-order walk of a branch.
pub struct Descendants<'a> {
    dom: &'a ArenaDom,
    stack: Vec<ArenaNodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = ArenaNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        // reversed so the stack pops them in document order
        let mut children: Vec<_> = self.dom.children(id).collect();
        children.reverse();
        self.stack.extend(children);
        Some(id)
    }
}

// Element accessors
impl ArenaDom {
    /// Tag name.
    pub fn element_name(&self, id: ArenaNodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    pub fn is_element_named(&self, id: ArenaNodeId, tag: &str) -> bool {
        self.element_name(id).is_some_and(|n| n.as_ref() == tag)
    }

    pub fn get_attr(&self, id: ArenaNodeId, attr_name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.local.as_ref() == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    pub fn element_id(&self, id: ArenaNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    /// Classes in attribute order; empty for non-elements.
    pub fn element_classes(&self, id: ArenaNodeId) -> &[String] {
        static EMPTY: &[String] = &[];
        self.get(id)
            .and_then(|n| match &n.data {
                ArenaNodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(EMPTY)
    }

    pub fn has_class(&self, id: ArenaNodeId, class: &str) -> bool {
        self.element_classes(id).iter().any(|c| c == class)
    }

    pub fn is_element(&self, id: ArenaNodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, ArenaNodeData::Element { .. }))
    }

    /// Contents of a text node.
    pub fn text_content(&self, id: ArenaNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// All text under `id`, concatenated in document order.
    pub fn collect_text(&self, id: ArenaNodeId) -> String {
        self.descendants(id)
            .filter_map(|n| self.text_content(n))
            .collect()
    }
}
