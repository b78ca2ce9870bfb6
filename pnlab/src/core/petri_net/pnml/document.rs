//! Per-net PNML document and the constants of the PNLab layout
//!
//! Every decoded net owns a copy of its `net` element. Encoding merges into a
//! clone of that document.
use std::collections::HashMap;

use crate::core::xml::{ElementId, XmlTree};

/// Namespace of the PNML grammar written to new documents
pub const PNML_NAMESPACE: &str = "http://www.pnml.org/version-2009/grammar/pnml";
/// Net type written to new documents
pub const PT_NET_TYPE: &str = "http://www.pnml.org/version-2009/grammar/ptnet";
/// Id of the page created for nets that do not have one
pub const TOP_LEVEL_PAGE_ID: &str = "PNLab_top_lvl";
/// Value of the `tool` attribute of PNLab `toolspecific` blocks
pub const TOOL_NAME: &str = "PNLab";
/// Value of the `version` attribute of PNLab `toolspecific` blocks
pub const TOOL_VERSION: &str = "1.0";

/// Path of the PNLab tool-specific block of a node or net
pub(crate) const TOOL_BLOCK: &str = "toolspecific[@tool=\"PNLab\"]";

///
/// XML document backing a single [`PetriNet`](crate::PetriNet)
///
/// Holds a `pnml` root with exactly one `net` element. Nodes and arcs loaded
/// from a file keep handles into this tree, so that an encode can merge into
/// the original elements.
///
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NetDocument {
    pub(crate) tree: XmlTree,
    pub(crate) net: ElementId,
}

impl NetDocument {
    /// Fresh document for a net without any nodes
    pub(crate) fn new(name: &str) -> Self {
        let mut tree = XmlTree::new("pnml");
        let root = tree.root();
        tree.set_attribute(root, "xmlns", PNML_NAMESPACE);
        let net = tree.append_element_with_attributes(
            root,
            "net",
            &[("id", name), ("type", PT_NET_TYPE)],
        );
        let text = tree.get_or_create_path(net, "name/text");
        tree.set_text(text, name);
        tree.append_element_with_attributes(net, "page", &[("id", TOP_LEVEL_PAGE_ID)]);
        Self { tree, net }
    }

    /// Document holding a copy of the `net` element of `source` (and the attributes of its root)
    pub(crate) fn from_net(source: &XmlTree, net: ElementId) -> Self {
        let source_root = source.root();
        let mut tree = XmlTree::new(source.tag(source_root));
        let root = tree.root();
        for (key, value) in source.attributes(source_root) {
            tree.set_attribute(root, key, value.as_str());
        }
        let net = tree.copy_subtree(source, net, root);
        Self { tree, net }
    }

    /// First page of the net, created if the net has none
    pub(crate) fn first_page(&mut self) -> ElementId {
        match self.tree.child(self.net, "page") {
            Some(page) => page,
            None => self.tree.append_element_with_attributes(
                self.net,
                "page",
                &[("id", TOP_LEVEL_PAGE_ID)],
            ),
        }
    }

    /// The net element and all (arbitrarily nested) pages below it
    pub(crate) fn containers(&self) -> Vec<ElementId> {
        let mut containers = vec![self.net];
        let mut i = 0;
        while i < containers.len() {
            let pages: Vec<ElementId> = self.tree.children_named(containers[i], "page").collect();
            containers.extend(pages);
            i += 1;
        }
        containers
    }

    /// Child elements with `tag` of all containers
    pub(crate) fn elements_named(&self, tag: &str) -> Vec<ElementId> {
        self.containers()
            .into_iter()
            .flat_map(|container| self.tree.children_named(container, tag).collect::<Vec<_>>())
            .collect()
    }

    pub(crate) fn detach(&mut self, el: ElementId) {
        self.tree.detach(el);
    }

    ///
    /// Rewrite the `source`/`target` attributes of arcs and the `ref` attributes
    /// of `referencePlace`/`referenceTransition` elements in all containers
    ///
    /// All replacements are applied in a single pass, so chains (`a` to `b`,
    /// `b` to `c`) and swaps are not applied twice.
    ///
    pub(crate) fn rewrite_references(&mut self, renamed: &HashMap<String, String>) {
        if renamed.is_empty() {
            return;
        }
        const ARC_KEYS: &[&str] = &["source", "target"];
        const REFERENCE_KEYS: &[&str] = &["ref"];
        let mut elements: Vec<(ElementId, &[&str])> = Vec::new();
        for el in self.elements_named("arc") {
            elements.push((el, ARC_KEYS));
        }
        for tag in ["referencePlace", "referenceTransition"] {
            for el in self.elements_named(tag) {
                elements.push((el, REFERENCE_KEYS));
            }
        }
        for (el, keys) in elements {
            for key in keys.iter().copied() {
                let replacement = self
                    .tree
                    .attribute(el, key)
                    .and_then(|value| renamed.get(value))
                    .cloned();
                if let Some(replacement) = replacement {
                    self.tree.set_attribute(el, key, replacement);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{NetDocument, TOP_LEVEL_PAGE_ID};

    #[test]
    fn new_document_shape() {
        let doc = NetDocument::new("My Net");
        let tree = &doc.tree;
        assert_eq!(tree.tag(tree.root()), "pnml");
        assert_eq!(tree.attribute(doc.net, "id"), Some("My Net"));
        assert_eq!(tree.find_text(doc.net, "name/text"), Some("My Net"));
        let page = tree.child(doc.net, "page").unwrap();
        assert_eq!(tree.attribute(page, "id"), Some(TOP_LEVEL_PAGE_ID));
        assert_eq!(doc.containers(), vec![doc.net, page]);
    }

    #[test]
    fn rewrite_references_swaps_in_one_pass() {
        let mut doc = NetDocument::new("n");
        let page = doc.first_page();
        let arc = doc.tree.append_element_with_attributes(
            page,
            "arc",
            &[("source", "p.a"), ("target", "p.b")],
        );
        let renamed = HashMap::from([
            ("p.a".to_string(), "p.b".to_string()),
            ("p.b".to_string(), "p.a".to_string()),
        ]);
        doc.rewrite_references(&renamed);
        assert_eq!(doc.tree.attribute(arc, "source"), Some("p.b"));
        assert_eq!(doc.tree.attribute(arc, "target"), Some("p.a"));
    }

    #[test]
    fn rewrite_references_leaves_foreign_content_alone() {
        let mut doc = NetDocument::new("n");
        let page = doc.first_page();
        let alias = doc
            .tree
            .append_element_with_attributes(page, "referencePlace", &[("ref", "p.a"), ("source", "p.a")]);
        let tool = doc
            .tree
            .append_element_with_attributes(page, "toolspecific", &[("tool", "OtherTool")]);
        let link = doc
            .tree
            .append_element_with_attributes(tool, "link", &[("source", "p.a"), ("ref", "p.a")]);
        let renamed = HashMap::from([("p.a".to_string(), "p.b".to_string())]);
        doc.rewrite_references(&renamed);
        assert_eq!(doc.tree.attribute(alias, "ref"), Some("p.b"));
        assert_eq!(doc.tree.attribute(alias, "source"), Some("p.a"));
        assert_eq!(doc.tree.attribute(link, "source"), Some("p.a"));
        assert_eq!(doc.tree.attribute(link, "ref"), Some("p.a"));
    }
}
