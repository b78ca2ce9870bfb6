//! PIPE (Platform Independent Petri net Editor) dialect of PNML
//!
//! PIPE stores every field in a `value` child, knows no pages and writes
//! transition timing and orientation as plain net elements:
//!
//! ```xml
//! <transition id="T0">
//!   <name><value>T0</value></name>
//!   <orientation><value>90</value></orientation>
//!   <rate><value>1.0</value></rate>
//!   <timed><value>true</value></timed>
//!   <infiniteServer><value>false</value></infiniteServer>
//!   <priority><value>1</value></priority>
//! </transition>
//! ```
use std::collections::HashMap;

use log::{debug, warn};

use super::{expect_pnml_root, DialectConverter, DialectError};
use crate::core::petri_net::pnml::document::{
    PNML_NAMESPACE, PT_NET_TYPE, TOOL_BLOCK, TOOL_NAME, TOOL_VERSION, TOP_LEVEL_PAGE_ID,
};
use crate::core::petri_net::pnml::import_pnml::{field_text, parse_bool, parse_count};
use crate::core::petri_net::{NodeType, TransitionType};
use crate::core::xml::{ElementId, XmlTree};

/// Value of the `tool` attribute of the block keeping PIPE-only fields
pub const PIPE_TOOL_NAME: &str = "PIPE";
/// Net type written to PIPE documents
pub const PIPE_NET_TYPE: &str = "P/T net";

const PIPE_TOOL_BLOCK: &str = "toolspecific[@tool=\"PIPE\"]";

/// Converter between the PIPE and PNLab layouts
#[derive(Debug, Clone, Copy, Default)]
pub struct PipeDialect;

fn set_path_text(tree: &mut XmlTree, el: ElementId, path: &str, value: &str) {
    let target = tree.get_or_create_path(el, path);
    tree.set_text(target, value);
}

/// Non-empty `value` (or `text`) of a PIPE field element
fn value_of(tree: &XmlTree, field: ElementId) -> Option<&str> {
    tree.find_text(field, "value")
        .filter(|v| !v.is_empty())
        .or_else(|| tree.find_text(field, "text").filter(|v| !v.is_empty()))
}

fn required<'a>(
    tree: &'a XmlTree,
    el: ElementId,
    key: &'static str,
) -> Result<&'a str, DialectError> {
    tree.attribute(el, key)
        .ok_or(DialectError::MissingAttribute(key))
}

/// Canonical counterpart of `parent/field` with `value` replaced by `text`
///
/// Any other children (e.g. `graphics`) are copied along.
fn field_to_canonical(
    tree: &XmlTree,
    field: ElementId,
    out: &mut XmlTree,
    parent: ElementId,
    convert: impl FnOnce(&str) -> String,
) {
    let canonical = out.append_element(parent, tree.tag(field));
    if let Some(value) = value_of(tree, field) {
        set_path_text(out, canonical, "text", &convert(value));
    }
    for child in tree.children(field) {
        if !matches!(tree.tag(*child), "value" | "text") {
            out.copy_subtree(tree, *child, canonical);
        }
    }
}

/// Normalised count, keeping the raw value so that decoding reports it
fn canonical_count(value: &str) -> String {
    parse_count(value).map_or_else(|| value.to_string(), |n| n.to_string())
}

fn tool_block(out: &mut XmlTree, el: ElementId, tool: &str) -> ElementId {
    out.get_or_create_with_attribute(
        el,
        "toolspecific",
        ("tool", tool),
        &[("version", TOOL_VERSION)],
    )
}

fn place_to_canonical(
    tree: &XmlTree,
    el: ElementId,
    out: &mut XmlTree,
    page: ElementId,
) -> Result<(), DialectError> {
    let id = required(tree, el, "id")?;
    let place = out.append_element_with_attributes(page, "place", &[("id", id)]);
    for child in tree.children(el) {
        let child = *child;
        match tree.tag(child) {
            "name" => field_to_canonical(tree, child, out, place, str::to_string),
            "initialMarking" => field_to_canonical(tree, child, out, place, canonical_count),
            "capacity" => match value_of(tree, child).and_then(parse_count) {
                Some(0) | None => {}
                Some(capacity) => {
                    let tool = tool_block(out, place, TOOL_NAME);
                    set_path_text(out, tool, "capacity/text", &capacity.to_string());
                }
            },
            _ => {
                out.copy_subtree(tree, child, place);
            }
        }
    }
    Ok(())
}

fn transition_to_canonical(
    tree: &XmlTree,
    el: ElementId,
    out: &mut XmlTree,
    page: ElementId,
) -> Result<(), DialectError> {
    let id = required(tree, el, "id")?;
    let transition = out.append_element_with_attributes(page, "transition", &[("id", id)]);
    let tool = tool_block(out, transition, TOOL_NAME);
    let mut timed = false;
    for child in tree.children(el) {
        let child = *child;
        let value = value_of(tree, child);
        match tree.tag(child) {
            "name" => field_to_canonical(tree, child, out, transition, str::to_string),
            "orientation" => {
                let horizontal = value
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .is_some_and(|angle| angle.rem_euclid(180.0) == 90.0);
                set_path_text(out, tool, "isHorizontal/text", if horizontal { "1" } else { "0" });
            }
            "timed" => timed = value.and_then(parse_bool).unwrap_or(false),
            "rate" | "priority" => {
                if let Some(value) = value {
                    set_path_text(out, tool, &format!("{}/text", tree.tag(child)), value);
                }
            }
            "infiniteServer" => {
                if let Some(value) = value {
                    let pipe = tool_block(out, transition, PIPE_TOOL_NAME);
                    set_path_text(out, pipe, "infiniteServer/text", value);
                }
            }
            _ => {
                out.copy_subtree(tree, child, transition);
            }
        }
    }
    let transition_type = if timed {
        TransitionType::Stochastic
    } else {
        TransitionType::Immediate
    };
    set_path_text(out, tool, "type/text", transition_type.as_str());
    Ok(())
}

/// Returns `false` if the arc was dropped
fn arc_to_canonical(
    tree: &XmlTree,
    el: ElementId,
    out: &mut XmlTree,
    page: ElementId,
) -> Result<bool, DialectError> {
    let source = required(tree, el, "source")?;
    let target = required(tree, el, "target")?;
    let arc_type = tree.child(el, "type").and_then(|t| tree.attribute(t, "value"));
    if let Some(kind) = arc_type.filter(|kind| *kind != "normal") {
        warn!("Dropping {kind} arc from {source} to {target}");
        return Ok(false);
    }
    let arc = out.append_element_with_attributes(page, "arc", &[("source", source), ("target", target)]);
    if let Some(id) = tree.attribute(el, "id") {
        out.set_attribute(arc, "id", id);
    }
    for child in tree.children(el) {
        let child = *child;
        match tree.tag(child) {
            "inscription" => field_to_canonical(tree, child, out, arc, canonical_count),
            "type" => {}
            _ => {
                out.copy_subtree(tree, child, arc);
            }
        }
    }
    Ok(true)
}

/// Text of a field of the PNLab tool-specific block
fn tool_text<'a>(tree: &'a XmlTree, el: ElementId, field: &str) -> Option<&'a str> {
    field_text(tree, el, &format!("{TOOL_BLOCK}/{field}"))
}

fn copy_position(tree: &XmlTree, el: ElementId, out: &mut XmlTree, pipe: ElementId) {
    if let Some(position) = tree.find(el, "graphics/position") {
        let graphics = out.append_element(pipe, "graphics");
        out.copy_subtree(tree, position, graphics);
    }
}

fn place_from_canonical(
    tree: &XmlTree,
    el: ElementId,
    out: &mut XmlTree,
    net: ElementId,
) -> Result<(), DialectError> {
    let id = required(tree, el, "id")?;
    let place = out.append_element_with_attributes(net, "place", &[("id", id)]);
    copy_position(tree, el, out, place);
    set_path_text(out, place, "name/value", field_text(tree, el, "name").unwrap_or(id));
    let marking = field_text(tree, el, "initialMarking")
        .and_then(parse_count)
        .unwrap_or(0);
    set_path_text(out, place, "initialMarking/value", &format!("Default,{marking}"));
    let capacity = tool_text(tree, el, "capacity")
        .and_then(parse_count)
        .unwrap_or(0);
    set_path_text(out, place, "capacity/value", &capacity.to_string());
    Ok(())
}

fn transition_from_canonical(
    tree: &XmlTree,
    el: ElementId,
    out: &mut XmlTree,
    net: ElementId,
) -> Result<(), DialectError> {
    let id = required(tree, el, "id")?;
    let transition = out.append_element_with_attributes(net, "transition", &[("id", id)]);
    copy_position(tree, el, out, transition);
    let name = field_text(tree, el, "name").unwrap_or(id);
    set_path_text(out, transition, "name/value", name);

    let horizontal = tool_text(tree, el, "isHorizontal")
        .and_then(parse_bool)
        .unwrap_or(false);
    set_path_text(out, transition, "orientation/value", if horizontal { "90" } else { "0" });
    set_path_text(out, transition, "rate/value", tool_text(tree, el, "rate").unwrap_or("1.0"));
    let transition_type = tool_text(tree, el, "type")
        .and_then(TransitionType::from_type_name)
        .or_else(|| TransitionType::split_prefixed(name).0)
        .unwrap_or_default();
    let timed = transition_type == TransitionType::Stochastic;
    set_path_text(out, transition, "timed/value", if timed { "true" } else { "false" });
    let infinite_server = field_text(tree, el, &format!("{PIPE_TOOL_BLOCK}/infiniteServer"));
    set_path_text(
        out,
        transition,
        "infiniteServer/value",
        infinite_server.unwrap_or("false"),
    );
    set_path_text(
        out,
        transition,
        "priority/value",
        tool_text(tree, el, "priority").unwrap_or("1"),
    );
    Ok(())
}

/// Concrete node id behind every `referencePlace` / `referenceTransition` of a net
fn alias_targets(tree: &XmlTree, net: ElementId) -> HashMap<String, String> {
    let mut refs: HashMap<&str, &str> = HashMap::new();
    for tag in ["referencePlace", "referenceTransition"] {
        for el in tree.find_all_breadth_first(net, tag) {
            if let (Some(id), Some(target)) = (tree.attribute(el, "id"), tree.attribute(el, "ref")) {
                refs.insert(id, target);
            }
        }
    }
    refs.keys()
        .filter_map(|alias| {
            let mut current = *alias;
            for _ in 0..=refs.len() {
                match refs.get(current) {
                    Some(next) => current = *next,
                    None => return Some((alias.to_string(), current.to_string())),
                }
            }
            warn!("Reference cycle through {alias:?}");
            None
        })
        .collect()
}

fn arc_from_canonical(
    tree: &XmlTree,
    el: ElementId,
    out: &mut XmlTree,
    net: ElementId,
    aliases: &HashMap<String, String>,
) -> Result<(), DialectError> {
    let concrete = |id: &str| aliases.get(id).map_or_else(|| id.to_string(), String::clone);
    let source = concrete(required(tree, el, "source")?);
    let target = concrete(required(tree, el, "target")?);
    let id = tree
        .attribute(el, "id")
        .map_or_else(|| format!("{source}_{target}"), str::to_string);
    let arc = out.append_element_with_attributes(
        net,
        "arc",
        &[
            ("id", id.as_str()),
            ("source", source.as_str()),
            ("target", target.as_str()),
        ],
    );
    let weight = field_text(tree, el, "inscription")
        .and_then(parse_count)
        .filter(|w| *w > 0)
        .unwrap_or(1);
    set_path_text(out, arc, "inscription/value", &format!("Default,{weight}"));
    out.append_element_with_attributes(arc, "type", &[("value", "normal")]);
    Ok(())
}

impl DialectConverter for PipeDialect {
    fn to_canonical(&self, tree: &XmlTree) -> Result<XmlTree, DialectError> {
        expect_pnml_root(tree)?;
        let mut out = XmlTree::new("pnml");
        let out_root = out.root();
        out.set_attribute(out_root, "xmlns", PNML_NAMESPACE);
        for net in tree.find_all_breadth_first(tree.root(), "net") {
            let canonical = out.append_element_with_attributes(out_root, "net", &[("type", PT_NET_TYPE)]);
            if let Some(id) = tree.attribute(net, "id") {
                out.set_attribute(canonical, "id", id);
            }
            if let Some(name) = field_text(tree, net, "name") {
                set_path_text(&mut out, canonical, "name/text", name);
            }
            let page = out.append_element_with_attributes(canonical, "page", &[("id", TOP_LEVEL_PAGE_ID)]);
            let mut dropped = 0;
            for child in tree.children(net) {
                let child = *child;
                match tree.tag(child) {
                    "place" => place_to_canonical(tree, child, &mut out, page)?,
                    "transition" => transition_to_canonical(tree, child, &mut out, page)?,
                    "arc" => {
                        if !arc_to_canonical(tree, child, &mut out, page)? {
                            dropped += 1;
                        }
                    }
                    "name" => {}
                    _ => {
                        out.copy_subtree(tree, child, canonical);
                    }
                }
            }
            debug!(
                "Converted PIPE net {:?} ({dropped} arcs dropped)",
                tree.attribute(net, "id").unwrap_or_default()
            );
        }
        Ok(out)
    }

    fn from_canonical(&self, tree: &XmlTree) -> Result<XmlTree, DialectError> {
        expect_pnml_root(tree)?;
        let mut out = XmlTree::new("pnml");
        let out_root = out.root();
        for net in tree.find_all_breadth_first(tree.root(), "net") {
            let pipe = out.append_element(out_root, "net");
            let id = tree
                .attribute(net, "id")
                .or_else(|| field_text(tree, net, "name"))
                .ok_or(DialectError::MissingAttribute("id"))?;
            out.set_attribute(pipe, "id", id);
            out.set_attribute(pipe, "type", PIPE_NET_TYPE);
            for place in tree.find_all_breadth_first(net, "place") {
                place_from_canonical(tree, place, &mut out, pipe)?;
            }
            for transition in tree.find_all_breadth_first(net, "transition") {
                transition_from_canonical(tree, transition, &mut out, pipe)?;
            }
            let aliases = alias_targets(tree, net);
            for arc in tree.find_all_breadth_first(net, "arc") {
                arc_from_canonical(tree, arc, &mut out, pipe, &aliases)?;
            }
            debug!(
                "Flattened net {id:?} to PIPE ({} references dropped)",
                aliases.len()
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::core::dialect::Dialect;
    use crate::core::petri_net::pnml::{
        decode_pnml, export_pnml_to_writer, import_pnml_from_path_with_options,
        PnmlExportOptions, PnmlImportOptions,
    };
    use crate::core::petri_net::{
        Node, PetriNet, Place, PlaceID, PlaceType, Transition, TransitionID,
    };
    use crate::core::xml::reader::{parse_xml_file, parse_xml_slice};
    use crate::utils::test_utils::get_test_data_path;

    fn pipe_options() -> PnmlImportOptions {
        PnmlImportOptions {
            dialect: Dialect::Pipe,
            ..Default::default()
        }
    }

    fn sample_path() -> std::path::PathBuf {
        get_test_data_path().join("petri-net").join("pipe-sample.xml")
    }

    fn arc_triples(net: &PetriNet) -> BTreeSet<(String, String, u32)> {
        net.arcs()
            .map(|a| {
                (
                    a.from_to.source().id().to_string(),
                    a.from_to.target().id().to_string(),
                    a.weight,
                )
            })
            .collect()
    }

    #[test]
    fn import_pipe_sample() {
        let nets = import_pnml_from_path_with_options(sample_path(), &pipe_options()).unwrap();
        assert_eq!(nets.len(), 1);
        let net = &nets[0];
        assert_eq!(net.name(), "Net-One");

        let p0 = net.place(&PlaceID("p.P0".into())).unwrap();
        assert_eq!(p0.properties.init_marking, 2);
        assert_eq!(p0.properties.capacity, None);
        assert_eq!(p0.properties.position.x, 135.0);
        let p1 = net.place(&PlaceID("a.done".into())).unwrap();
        assert_eq!(p1.node_type(), PlaceType::Action);
        assert_eq!(p1.properties.capacity.map(|c| c.get()), Some(3));

        let t0 = net.transition(&TransitionID("s.T0".into())).unwrap();
        assert!(t0.properties.is_horizontal);
        assert_eq!(t0.properties.rate, 0.5);
        let t1 = net.transition(&TransitionID("i.T1".into())).unwrap();
        assert!(!t1.properties.is_horizontal);
        assert_eq!(t1.properties.priority.get(), 2);

        // the inhibitor arc is dropped
        assert_eq!(
            arc_triples(net),
            BTreeSet::from([
                ("p.P0".to_string(), "s.T0".to_string(), 2),
                ("s.T0".to_string(), "a.done".to_string(), 1),
            ])
        );
    }

    #[test]
    fn canonical_form_of_pipe_transition() {
        let tree = parse_xml_file(sample_path()).unwrap();
        let canonical = PipeDialect.to_canonical(&tree).unwrap();
        let root = canonical.root();
        let t0 = canonical
            .find(root, "net/page[@id='PNLab_top_lvl']/transition[@id='T0']")
            .unwrap();
        assert_eq!(
            canonical.find_text(t0, "toolspecific[@tool='PNLab']/type/text"),
            Some("stochastic")
        );
        assert_eq!(
            canonical.find_text(t0, "toolspecific[@tool='PIPE']/infiniteServer/text"),
            Some("true")
        );
        // name graphics are kept, value becomes text
        assert_eq!(canonical.find_text(t0, "name/text"), Some("T0"));
        assert!(canonical.find(t0, "name/graphics/offset").is_some());
        assert!(canonical.find(t0, "name/value").is_none());
    }

    #[test]
    fn pnlab_to_pipe_and_back() {
        let mut net = PetriNet::new("Shuttle").unwrap();
        let waiting = net
            .try_add_place(
                Place::new("waiting", PlaceType::Task)
                    .unwrap()
                    .with_init_marking(3)
                    .with_capacity(5)
                    .with_position(1.0, 2.0),
                false,
            )
            .unwrap();
        let moved = net
            .try_add_place(Place::new("moved", PlaceType::Action).unwrap(), false)
            .unwrap();
        let go = net
            .try_add_transition(
                Transition::new("go", crate::core::petri_net::TransitionType::Stochastic)
                    .unwrap()
                    .with_horizontal(true)
                    .with_rate(2.0),
                false,
            )
            .unwrap();
        net.add_arc(&waiting.into(), &go.clone().into(), Some(2))
            .unwrap();
        net.add_arc(&go.into(), &moved.into(), None).unwrap();

        let mut bytes = Vec::new();
        let options = PnmlExportOptions {
            dialect: Dialect::Pipe,
            ..Default::default()
        };
        export_pnml_to_writer(&net, &mut bytes, &options).unwrap();
        let pipe = parse_xml_slice(&bytes).unwrap();
        let root = pipe.root();
        assert!(pipe.find(root, "net/page").is_none());
        assert_eq!(
            pipe.find_text(root, "net/place[@id='t.waiting']/initialMarking/value"),
            Some("Default,3")
        );
        assert_eq!(
            pipe.find_text(root, "net/transition/orientation/value"),
            Some("90")
        );
        assert_eq!(
            pipe.find_text(root, "net/arc[@id='t.waiting_s.go']/inscription/value"),
            Some("Default,2")
        );

        let back = decode_pnml(pipe, &pipe_options()).unwrap().remove(0);
        assert_eq!(back.name(), "Shuttle");
        assert_eq!(arc_triples(&back), arc_triples(&net));
        assert_eq!(
            back.places().keys().collect::<BTreeSet<_>>(),
            net.places().keys().collect::<BTreeSet<_>>()
        );
        for (id, transition) in net.transitions() {
            assert_eq!(back.transition(id).unwrap().properties, transition.properties);
            assert_eq!(back.transition(id).unwrap().node_type(), transition.node_type());
        }
        assert_eq!(
            back.place(&PlaceID("t.waiting".into()))
                .unwrap()
                .properties
                .capacity
                .map(|c| c.get()),
            Some(5)
        );
    }

    #[test]
    fn pipe_only_fields_survive_round_trip() {
        let net = import_pnml_from_path_with_options(sample_path(), &pipe_options())
            .unwrap()
            .remove(0);
        let canonical = net.to_element_tree();
        let pipe = PipeDialect.from_canonical(&canonical).unwrap();
        let t0 = pipe
            .find(pipe.root(), "net/transition[@id='s.T0']")
            .unwrap();
        assert_eq!(pipe.find_text(t0, "infiniteServer/value"), Some("true"));
        assert_eq!(pipe.find_text(t0, "timed/value"), Some("true"));
    }

    #[test]
    fn references_are_flattened() {
        let path = get_test_data_path()
            .join("petri-net")
            .join("pnlab-sample.pnml");
        let net = PetriNet::from_pnml_file(path).unwrap().remove(0);
        let pipe = PipeDialect.from_canonical(&net.to_element_tree()).unwrap();
        let pipe_net = pipe.find(pipe.root(), "net").unwrap();
        assert_eq!(pipe.children_named(pipe_net, "place").count(), 2);
        assert_eq!(pipe.children_named(pipe_net, "transition").count(), 2);
        assert_eq!(pipe.children_named(pipe_net, "arc").count(), 4);
        assert!(pipe.find(pipe_net, "referencePlace").is_none());
        let sources: BTreeSet<&str> = pipe
            .children_named(pipe_net, "arc")
            .filter_map(|a| pipe.attribute(a, "source"))
            .collect();
        assert!(sources.contains("a.fill_cup"));
        assert!(!sources.contains("ref1"));
    }

    #[test]
    fn unexpected_root() {
        let tree = parse_xml_slice(b"<net id=\"x\"/>").unwrap();
        assert_eq!(
            PipeDialect.to_canonical(&tree),
            Err(DialectError::UnexpectedRoot("net".to_string()))
        );
        let tree = parse_xml_slice(b"<pnml><net><place/></net></pnml>").unwrap();
        assert_eq!(
            PipeDialect.to_canonical(&tree),
            Err(DialectError::MissingAttribute("id"))
        );
    }
}
