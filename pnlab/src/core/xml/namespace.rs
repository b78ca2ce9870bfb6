use super::XmlTree;

fn local_name(name: &str) -> &str {
    // Clark notation ({uri}local) as well as prefixed names (ns:local)
    let name = name.rsplit_once('}').map_or(name, |(_, local)| local);
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn is_namespace_declaration(key: &str) -> bool {
    key == "xmlns" || key.starts_with("xmlns:")
}

///
/// Rewrite all tags and attribute names of the tree to their local names
///
/// Namespace declarations (`xmlns`, `xmlns:*`) are removed.
/// If two attributes of an element map to the same local name, the first one is kept.
///
pub fn strip_namespaces(tree: &mut XmlTree) {
    let root = tree.root();
    let elements: Vec<_> = std::iter::once(root)
        .chain(tree.descendants(root))
        .collect();
    for el in elements {
        let tag = local_name(tree.tag(el)).to_string();
        tree.set_tag(el, tag);

        let mut stripped: Vec<(String, String)> = Vec::new();
        for (key, value) in tree.attributes(el) {
            if is_namespace_declaration(key) {
                continue;
            }
            let key = local_name(key);
            if stripped.iter().any(|(k, _)| k == key) {
                log::debug!("Dropping attribute {key} after namespace stripping (duplicate)");
                continue;
            }
            stripped.push((key.to_string(), value.clone()));
        }
        tree.replace_attributes(el, stripped);
    }
}

#[cfg(test)]
mod tests {
    use super::strip_namespaces;
    use crate::core::xml::reader::parse_xml_slice;

    #[test]
    fn strips_prefixes_and_declarations() {
        let mut tree = parse_xml_slice(
            br#"<pn:pnml xmlns:pn="http://www.pnml.org/version-2009/grammar/pnml" xmlns="urn:x">
                <pn:net id="n" pn:type="ptnet" type="other"><pn:page id="p"/></pn:net>
            </pn:pnml>"#,
        )
        .unwrap();
        strip_namespaces(&mut tree);
        let root = tree.root();
        assert_eq!(tree.tag(root), "pnml");
        assert!(tree.attributes(root).is_empty());
        let net = tree.find(root, "net").unwrap();
        assert_eq!(tree.attribute(net, "type"), Some("ptnet"));
        assert_eq!(tree.attributes(net).len(), 2);
        assert!(tree.find(root, "net/page").is_some());
    }
}
