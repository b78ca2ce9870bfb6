//! Generic labelled XML tree
//!
//! Elements live in an arena owned by [`XmlTree`] and are addressed through
//! stable [`ElementId`] handles. Detaching an element only unlinks it from its
//! parent, so handles kept elsewhere (e.g., by Petri net nodes loaded from a
//! document) never dangle. Use [`XmlTree::compacted`] to obtain a copy
//! containing only the elements still reachable from the root.
use std::collections::VecDeque;

use thiserror::Error;

/// Namespace stripping (tag and attribute local-name rewrite)
pub mod namespace;
/// Parsing XML into an [`XmlTree`]
pub mod reader;
/// Serializing an [`XmlTree`]
pub mod writer;

#[doc(inline)]
pub use namespace::strip_namespaces;

///
/// Error encountered while reading or writing XML
///
#[derive(Debug, Error)]
pub enum XmlError {
    /// XML syntax error reported by [`quick_xml`]
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Malformed attribute
    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The document is well-formed on the token level but not a single-rooted tree
    #[error("malformed XML document: {0}")]
    Malformed(&'static str),
}

/// Handle of an element inside an [`XmlTree`]
///
/// Handles are only meaningful for the tree that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

#[derive(Debug, Clone, PartialEq)]
struct XmlElement {
    tag: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<ElementId>,
    parent: Option<ElementId>,
}

impl XmlElement {
    fn new(tag: &str, parent: Option<ElementId>) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
            parent,
        }
    }
}

///
/// XML element tree with a single root element
///
/// Only elements, attributes and text content are represented; comments and
/// processing instructions are not kept.
///
#[derive(Debug, Clone, PartialEq)]
pub struct XmlTree {
    elements: Vec<XmlElement>,
    root: ElementId,
}

impl XmlTree {
    /// Create a new tree consisting only of a root element with the given tag
    pub fn new(root_tag: &str) -> Self {
        Self {
            elements: vec![XmlElement::new(root_tag, None)],
            root: ElementId(0),
        }
    }

    /// Root element
    pub fn root(&self) -> ElementId {
        self.root
    }

    fn element(&self, el: ElementId) -> &XmlElement {
        &self.elements[el.0]
    }

    fn element_mut(&mut self, el: ElementId) -> &mut XmlElement {
        &mut self.elements[el.0]
    }

    /// Tag of an element
    pub fn tag(&self, el: ElementId) -> &str {
        &self.element(el).tag
    }

    /// Replace the tag of an element
    pub fn set_tag(&mut self, el: ElementId, tag: impl Into<String>) {
        self.element_mut(el).tag = tag.into();
    }

    /// All attributes of an element, in document order
    pub fn attributes(&self, el: ElementId) -> &[(String, String)] {
        &self.element(el).attributes
    }

    /// Value of the attribute `key`
    pub fn attribute(&self, el: ElementId, key: &str) -> Option<&str> {
        self.element(el)
            .attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set (or insert) the attribute `key`
    pub fn set_attribute(&mut self, el: ElementId, key: &str, value: impl Into<String>) {
        let value = value.into();
        let attributes = &mut self.element_mut(el).attributes;
        match attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => attributes.push((key.to_string(), value)),
        }
    }

    /// Remove the attribute `key`, returning its previous value
    pub fn remove_attribute(&mut self, el: ElementId, key: &str) -> Option<String> {
        let attributes = &mut self.element_mut(el).attributes;
        let pos = attributes.iter().position(|(k, _)| k == key)?;
        Some(attributes.remove(pos).1)
    }

    pub(crate) fn replace_attributes(&mut self, el: ElementId, attributes: Vec<(String, String)>) {
        self.element_mut(el).attributes = attributes;
    }

    /// Text content of an element
    pub fn text(&self, el: ElementId) -> Option<&str> {
        self.element(el).text.as_deref()
    }

    /// Replace the text content of an element
    pub fn set_text(&mut self, el: ElementId, text: impl Into<String>) {
        self.element_mut(el).text = Some(text.into());
    }

    pub(crate) fn push_text(&mut self, el: ElementId, text: &str) {
        match &mut self.element_mut(el).text {
            Some(existing) => existing.push_str(text),
            t @ None => *t = Some(text.to_string()),
        }
    }

    /// Child elements, in document order
    pub fn children(&self, el: ElementId) -> &[ElementId] {
        &self.element(el).children
    }

    /// Parent element (`None` for the root and for detached elements)
    pub fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.element(el).parent
    }

    /// Child elements with the given tag
    pub fn children_named<'a>(
        &'a self,
        el: ElementId,
        tag: &'a str,
    ) -> impl Iterator<Item = ElementId> + 'a {
        self.children(el)
            .iter()
            .copied()
            .filter(move |c| self.tag(*c) == tag)
    }

    /// First child element with the given tag
    pub fn child(&self, el: ElementId, tag: &str) -> Option<ElementId> {
        self.children_named(el, tag).next()
    }

    ///
    /// Follow a `/`-separated path of child tags, starting at `el`
    ///
    /// Each step may carry one attribute predicate, e.g.
    /// `toolspecific[@tool="PNLab"]/scale/text`.
    /// For each step, the first matching child is used.
    ///
    pub fn find(&self, el: ElementId, path: &str) -> Option<ElementId> {
        path.split('/')
            .filter(|step| !step.is_empty())
            .try_fold(el, |current, step| {
                let step = PathStep::parse(step);
                self.children(current)
                    .iter()
                    .copied()
                    .find(|c| step.matches(self, *c))
            })
    }

    /// Trimmed text of the element at `path` (see [`XmlTree::find`])
    pub fn find_text(&self, el: ElementId, path: &str) -> Option<&str> {
        self.find(el, path)
            .and_then(|found| self.text(found))
            .map(str::trim)
    }

    /// Append a new, empty child element
    pub fn append_element(&mut self, parent: ElementId, tag: &str) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(XmlElement::new(tag, Some(parent)));
        self.element_mut(parent).children.push(id);
        id
    }

    /// Append a new child element with the given attributes
    pub fn append_element_with_attributes(
        &mut self,
        parent: ElementId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> ElementId {
        let id = self.append_element(parent, tag);
        for (key, value) in attributes {
            self.set_attribute(id, key, *value);
        }
        id
    }

    /// First child with the given tag, appending an empty one if there is none
    pub fn get_or_create(&mut self, parent: ElementId, tag: &str) -> ElementId {
        match self.child(parent, tag) {
            Some(el) => el,
            None => self.append_element(parent, tag),
        }
    }

    /// First child with the given tag and `key="value"` attribute,
    /// appending one with `attributes` if there is none
    pub fn get_or_create_with_attribute(
        &mut self,
        parent: ElementId,
        tag: &str,
        (key, value): (&str, &str),
        attributes: &[(&str, &str)],
    ) -> ElementId {
        let existing = self
            .children_named(parent, tag)
            .find(|c| self.attribute(*c, key) == Some(value));
        match existing {
            Some(el) => el,
            None => {
                let el = self.append_element_with_attributes(parent, tag, &[(key, value)]);
                for (k, v) in attributes {
                    self.set_attribute(el, k, *v);
                }
                el
            }
        }
    }

    /// Follow `path` of plain tags, creating missing elements on the way
    pub fn get_or_create_path(&mut self, el: ElementId, path: &str) -> ElementId {
        path.split('/')
            .filter(|step| !step.is_empty())
            .fold(el, |current, step| self.get_or_create(current, step))
    }

    /// Unlink an element (and with it its subtree) from its parent
    ///
    /// The root element cannot be detached.
    pub fn detach(&mut self, el: ElementId) {
        if let Some(parent) = self.element_mut(el).parent.take() {
            self.element_mut(parent).children.retain(|c| *c != el);
        }
    }

    /// Check whether an element is (still) reachable from the root
    pub fn is_attached(&self, el: ElementId) -> bool {
        let mut current = el;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// All descendants of `el` (not including `el` itself) in document order
    pub fn descendants(&self, el: ElementId) -> Descendants<'_> {
        let mut stack: Vec<ElementId> = self.children(el).to_vec();
        stack.reverse();
        Descendants { tree: self, stack }
    }

    /// Breadth-first search below `el` for elements with `tag`
    ///
    /// The search does not descend into matching elements.
    pub fn find_all_breadth_first(&self, el: ElementId, tag: &str) -> Vec<ElementId> {
        let mut found = Vec::new();
        let mut queue: VecDeque<ElementId> = self.children(el).iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if self.tag(current) == tag {
                found.push(current);
            } else {
                queue.extend(self.children(current).iter().copied());
            }
        }
        found
    }

    /// Deep copy the subtree at `source_el` of `source` below `parent` of this tree
    pub fn copy_subtree(
        &mut self,
        source: &XmlTree,
        source_el: ElementId,
        parent: ElementId,
    ) -> ElementId {
        let copied = self.append_element(parent, source.tag(source_el));
        {
            let from = source.element(source_el);
            let to = self.element_mut(copied);
            to.attributes = from.attributes.clone();
            to.text = from.text.clone();
        }
        for child in source.children(source_el) {
            self.copy_subtree(source, *child, copied);
        }
        copied
    }

    /// New tree rooted at (a copy of) `el`
    pub fn subtree(&self, el: ElementId) -> XmlTree {
        let mut tree = XmlTree::new(self.tag(el));
        let root = tree.root();
        {
            let from = self.element(el);
            let to = tree.element_mut(root);
            to.attributes = from.attributes.clone();
            to.text = from.text.clone();
        }
        for child in self.children(el) {
            tree.copy_subtree(self, *child, root);
        }
        tree
    }

    /// Copy of this tree without detached elements
    pub fn compacted(&self) -> XmlTree {
        self.subtree(self.root)
    }

    /// Number of elements reachable from the root
    pub fn len(&self) -> usize {
        1 + self.descendants(self.root).count()
    }

    /// A tree always has a root element, so it is never empty
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Iterator over the descendants of an element (see [`XmlTree::descendants`])
#[derive(Debug)]
pub struct Descendants<'a> {
    tree: &'a XmlTree,
    stack: Vec<ElementId>,
}

impl Iterator for Descendants<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<Self::Item> {
        let el = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(el).iter().rev().copied());
        Some(el)
    }
}

struct PathStep<'a> {
    tag: &'a str,
    predicate: Option<(&'a str, &'a str)>,
}

impl<'a> PathStep<'a> {
    fn parse(step: &'a str) -> Self {
        let Some((tag, rest)) = step.split_once('[') else {
            return Self {
                tag: step,
                predicate: None,
            };
        };
        let predicate = rest
            .strip_suffix(']')
            .and_then(|p| p.strip_prefix('@'))
            .and_then(|p| p.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim().trim_matches(['"', '\''])));
        Self { tag, predicate }
    }

    fn matches(&self, tree: &XmlTree, el: ElementId) -> bool {
        tree.tag(el) == self.tag
            && self
                .predicate
                .map_or(true, |(key, value)| tree.attribute(el, key) == Some(value))
    }
}
