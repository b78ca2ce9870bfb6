use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::document::{NetDocument, PNML_NAMESPACE, TOOL_NAME, TOOL_VERSION};
use super::style::{NodeColors, PnmlStyle};
use crate::core::dialect::{Dialect, DialectError};
use crate::core::petri_net::{Arc, Node, NodeType, PetriNet, Place, Position, Transition};
use crate::core::xml::{writer::write_xml, ElementId, XmlError, XmlTree};

///
/// Error encountered while writing PNML
///
#[derive(Debug, Error)]
pub enum PNMLWriteError {
    /// XML serialization failed
    #[error("failed to write PNML: {0}")]
    Xml(#[from] XmlError),
    /// IO error
    #[error("failed to write PNML: {0}")]
    Io(#[from] std::io::Error),
    /// Dialect conversion failed
    #[error(transparent)]
    Dialect(#[from] DialectError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Options for PNML export
pub struct PnmlExportOptions {
    /// Presentation settings of the `graphics` blocks
    pub style: PnmlStyle,
    /// Spaces per nesting level (`0` disables pretty-printing)
    pub indent: usize,
    /// Dialect of the written document
    pub dialect: Dialect,
}

impl Default for PnmlExportOptions {
    fn default() -> Self {
        Self {
            style: PnmlStyle::default(),
            indent: 2,
            dialect: Dialect::default(),
        }
    }
}

fn fmt_float(value: f64) -> String {
    format!("{value:?}")
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Set `parent/tag/text`, creating missing elements
fn set_text_child(tree: &mut XmlTree, parent: ElementId, tag: &str, value: &str) {
    let child = tree.get_or_create(parent, tag);
    let text = tree.get_or_create(child, "text");
    tree.set_text(text, value);
}

fn tool_block(tree: &mut XmlTree, el: ElementId) -> ElementId {
    tree.get_or_create_with_attribute(
        el,
        "toolspecific",
        ("tool", TOOL_NAME),
        &[("version", TOOL_VERSION)],
    )
}

fn set_position(tree: &mut XmlTree, graphics: ElementId, tag: &str, x: f64, y: f64) {
    let el = tree.get_or_create(graphics, tag);
    tree.set_attribute(el, "x", fmt_float(x));
    tree.set_attribute(el, "y", fmt_float(y));
}

struct Shape<'a> {
    position: Position,
    half_size: (f64, f64),
    label_offset: f64,
    colors: &'a NodeColors,
}

fn populate_node_common(
    tree: &mut XmlTree,
    el: ElementId,
    id: &str,
    full_name: &str,
    shape: Shape<'_>,
    style: &PnmlStyle,
    created: bool,
) {
    tree.set_attribute(el, "id", id);
    let name = tree.get_or_create(el, "name");
    set_text_child(tree, el, "name", full_name);
    if created || style.update_label_offset {
        let graphics = tree.get_or_create(name, "graphics");
        set_position(tree, graphics, "offset", 0.0, shape.label_offset);
    }

    let graphics = tree.get_or_create(el, "graphics");
    set_position(
        tree,
        graphics,
        "position",
        shape.position.x,
        shape.position.y,
    );
    set_position(
        tree,
        graphics,
        "dimension",
        shape.half_size.0,
        shape.half_size.1,
    );
    let fill = tree.get_or_create(graphics, "fill");
    tree.set_attribute(fill, "color", shape.colors.fill.as_str());
    let line = tree.get_or_create(graphics, "line");
    tree.set_attribute(line, "color", shape.colors.outline.as_str());
    tree.set_attribute(line, "width", fmt_float(style.line_width));
    if tree.attribute(line, "style").is_none() {
        tree.set_attribute(line, "style", "solid");
    }
}

fn populate_place(
    tree: &mut XmlTree,
    el: ElementId,
    place: &Place,
    scale: f64,
    style: &PnmlStyle,
    created: bool,
) {
    let props = &place.properties;
    let shape = Shape {
        position: props.position,
        half_size: (style.place_radius * scale, style.place_radius * scale),
        label_offset: style.place_label_padding * scale,
        colors: style.place_colors(place.node_type()),
    };
    populate_node_common(
        tree,
        el,
        place.id(),
        &place.full_name(),
        shape,
        style,
        created,
    );
    set_text_child(tree, el, "initialMarking", &props.init_marking.to_string());

    let tool = tool_block(tree, el);
    set_text_child(tree, tool, "type", place.node_type().as_str());
    match props.capacity {
        Some(capacity) => set_text_child(tree, tool, "capacity", &capacity.to_string()),
        None => {
            let stale: Vec<ElementId> = tree.children_named(tool, "capacity").collect();
            for el in stale {
                tree.detach(el);
            }
        }
    }
    for (field, value) in [
        ("isRunningCondition", props.is_running_condition),
        ("isEffect", props.is_effect),
        ("isOutput", props.is_output),
        ("isNegated", props.is_negated),
    ] {
        set_text_child(tree, tool, field, bool_text(value));
    }
}

fn populate_transition(
    tree: &mut XmlTree,
    el: ElementId,
    transition: &Transition,
    scale: f64,
    style: &PnmlStyle,
    created: bool,
) {
    let props = &transition.properties;
    let (half_width, half_height) = style.transition_half_size(props.is_horizontal);
    let shape = Shape {
        position: props.position,
        half_size: (half_width * scale, half_height * scale),
        label_offset: style.transition_label_padding(props.is_horizontal) * scale,
        colors: style.transition_colors(transition.node_type()),
    };
    populate_node_common(
        tree,
        el,
        transition.id(),
        &transition.full_name(),
        shape,
        style,
        created,
    );

    let tool = tool_block(tree, el);
    set_text_child(tree, tool, "type", transition.node_type().as_str());
    set_text_child(tree, tool, "isHorizontal", bool_text(props.is_horizontal));
    set_text_child(tree, tool, "rate", &fmt_float(props.rate));
    set_text_child(tree, tool, "priority", &props.priority.to_string());
}

/// Endpoints still leading to the arc's node (directly or through an alias) are kept
fn populate_arc(tree: &mut XmlTree, el: ElementId, arc: &Arc, aliases: &HashMap<String, String>) {
    tree.set_attribute(el, "id", arc.id());
    for (key, endpoint) in [
        ("source", arc.from_to.source()),
        ("target", arc.from_to.target()),
    ] {
        let resolves = tree.attribute(el, key).is_some_and(|current| {
            current == endpoint.id() || aliases.get(current).is_some_and(|id| id == endpoint.id())
        });
        if !resolves {
            tree.set_attribute(el, key, endpoint.id());
        }
    }
    set_text_child(tree, el, "inscription", &arc.weight.to_string());
}

/// Alias id -> id of the node it stands for, for all aliases left in the document
fn alias_targets(doc: &NetDocument, pn: &PetriNet) -> HashMap<String, String> {
    let places = pn.places.values().map(|p| (p.id(), &p.core.references));
    let transitions = pn
        .transitions
        .values()
        .map(|t| (t.id(), &t.core.references));
    let mut aliases = HashMap::new();
    for (id, references) in places.chain(transitions) {
        for el in references.iter().filter(|el| doc.tree.is_attached(**el)) {
            if let Some(alias) = doc.tree.attribute(*el, "id") {
                aliases.insert(alias.to_string(), id.to_string());
            }
        }
    }
    aliases
}

/// Element loaded for a node or arc, or a new one on the first page
fn locate_or_create(doc: &mut NetDocument, element: Option<ElementId>, tag: &str) -> (ElementId, bool) {
    match element.filter(|el| doc.tree.is_attached(*el)) {
        Some(el) => (el, false),
        None => {
            let page = doc.first_page();
            (doc.tree.append_element(page, tag), true)
        }
    }
}

/// Record the id change of a loaded element
fn note_renamed(
    doc: &NetDocument,
    el: ElementId,
    created: bool,
    id: &str,
    renamed: &mut HashMap<String, String>,
) {
    if created {
        return;
    }
    if let Some(old) = doc.tree.attribute(el, "id") {
        if old != id {
            renamed.insert(old.to_string(), id.to_string());
        }
    }
}

///
/// Encode a [`PetriNet`] as PNML document
///
/// Nodes and arcs loaded from a document are merged into their original
/// elements, keeping all children this crate does not know about.
/// Everything else is created from scratch on the first page of the net.
///
/// The internal document of the net is not modified: the result is an
/// independent copy (without elements of removed nodes).
///
pub fn to_element_tree(pn: &PetriNet, style: &PnmlStyle) -> XmlTree {
    let mut doc = pn.document.clone();

    // Locate or create all elements first, so that references to renamed
    // nodes can be rewritten before any id attribute changes
    let mut renamed = HashMap::new();
    let mut places = Vec::with_capacity(pn.places.len());
    for place in pn.places.values().sorted_by(|a, b| a.id().cmp(b.id())) {
        let (el, created) = locate_or_create(&mut doc, place.core.element, "place");
        note_renamed(&doc, el, created, place.id(), &mut renamed);
        places.push((place, el, created));
    }
    let mut transitions = Vec::with_capacity(pn.transitions.len());
    for transition in pn.transitions.values().sorted_by(|a, b| a.id().cmp(b.id())) {
        let (el, created) = locate_or_create(&mut doc, transition.core.element, "transition");
        note_renamed(&doc, el, created, transition.id(), &mut renamed);
        transitions.push((transition, el, created));
    }
    let mut arcs = Vec::new();
    for arc in pn.arcs().sorted_by(|a, b| a.from_to.cmp(&b.from_to)) {
        let (el, _) = locate_or_create(&mut doc, arc.element, "arc");
        arcs.push((arc, el));
    }
    doc.rewrite_references(&renamed);
    let aliases = alias_targets(&doc, pn);

    let tree = &mut doc.tree;
    for (place, el, created) in places {
        populate_place(tree, el, place, pn.scale, style, created);
    }
    for (transition, el, created) in transitions {
        populate_transition(tree, el, transition, pn.scale, style, created);
    }
    for (arc, el) in arcs {
        populate_arc(tree, el, arc, &aliases);
    }
    let root = tree.root();
    if tree.attribute(root, "xmlns").is_none() {
        tree.set_attribute(root, "xmlns", PNML_NAMESPACE);
    }
    set_text_child(tree, doc.net, "name", &pn.name);
    let tool = tool_block(tree, doc.net);
    set_text_child(tree, tool, "scale", &fmt_float(pn.scale));

    debug!(
        "Encoded net {:?} ({} renamed references)",
        pn.name,
        renamed.len()
    );
    doc.tree.compacted()
}

///
/// Export a [`PetriNet`] to PNML and write the result to the provided writer
///
pub fn export_petri_net_to_pnml<W: Write>(pn: &PetriNet, writer: W) -> Result<(), PNMLWriteError> {
    export_pnml_to_writer(pn, writer, &PnmlExportOptions::default())
}

/// Export a [`PetriNet`] to PNML using the given options
pub fn export_pnml_to_writer<W: Write>(
    pn: &PetriNet,
    writer: W,
    options: &PnmlExportOptions,
) -> Result<(), PNMLWriteError> {
    let tree = to_element_tree(pn, &options.style);
    let tree = options.dialect.converter().from_canonical(&tree)?;
    write_xml(&tree, writer, options.indent)?;
    Ok(())
}

///
/// Export a [`PetriNet`] to a PNML file at the specified path
///
pub fn export_petri_net_to_pnml_path<P: AsRef<Path>>(
    pn: &PetriNet,
    path: P,
) -> Result<(), PNMLWriteError> {
    export_petri_net_to_pnml_path_with_options(pn, path, &PnmlExportOptions::default())
}

/// Export a [`PetriNet`] to a PNML file using the given options
pub fn export_petri_net_to_pnml_path_with_options<P: AsRef<Path>>(
    pn: &PetriNet,
    path: P,
    options: &PnmlExportOptions,
) -> Result<(), PNMLWriteError> {
    let file = File::create(path)?;
    export_pnml_to_writer(pn, BufWriter::new(file), options)
}
