use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::num::NonZeroU32;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::document::{NetDocument, TOOL_BLOCK};
use crate::core::dialect::{Dialect, DialectError};
use crate::core::petri_net::{
    Node, NodeKey, NodeType, PetriNet, PetriNetError, Place, PlaceID, PlaceType, Transition,
    TransitionID, TransitionType,
};
use crate::core::xml::{
    reader::{parse_xml_file, parse_xml_reader},
    strip_namespaces, ElementId, XmlError, XmlTree,
};

/// Name of nets that neither declare a name nor an id (and no fallback name is given)
pub const DEFAULT_NET_NAME: &str = "PetriNet";

///
/// Error encountered while parsing PNML
///
/// Missing or malformed optional fields never cause an error; they are
/// replaced by their defaults.
///
#[derive(Debug, Error)]
pub enum PNMLParseError {
    /// The input is not well-formed XML
    #[error("failed to parse PNML: {0}")]
    Xml(#[from] XmlError),
    /// Encountered no PNML tag (i.e., the parsed data was not a PNML file)
    #[error("failed to parse PNML: root element is not <pnml>")]
    NoPNMLTag,
    /// The name of a place or transition is empty after removing its type prefix
    #[error("failed to parse PNML: empty name of node {0:?}")]
    EmptyNodeName(String),
    /// Missing key on XML element (with expected key included)
    #[error("failed to parse PNML: missing attribute {0}")]
    MissingKey(&'static str),
    /// Reference (`ref`, arc `source`/`target`) that does not lead to a node
    #[error("failed to parse PNML: unresolved reference {0:?}")]
    UnresolvedReference(String),
    /// Graph model error (e.g., an arc between two places)
    #[error(transparent)]
    Model(#[from] PetriNetError),
    /// Dialect conversion failed
    #[error(transparent)]
    Dialect(#[from] DialectError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Options for PNML import
pub struct PnmlImportOptions {
    /// Rewrite tags and attribute names to their local names before decoding
    pub strip_namespaces: bool,
    /// Dialect of the input document
    pub dialect: Dialect,
    /// Name of nets that declare neither a name nor an id
    pub fallback_name: Option<String>,
}

impl Default for PnmlImportOptions {
    fn default() -> Self {
        Self {
            strip_namespaces: true,
            dialect: Dialect::default(),
            fallback_name: None,
        }
    }
}

/// Non-empty text of `path/text`, falling back to `path/value`
pub(crate) fn field_text<'a>(tree: &'a XmlTree, el: ElementId, path: &str) -> Option<&'a str> {
    tree.find_text(el, &format!("{path}/text"))
        .filter(|t| !t.is_empty())
        .or_else(|| {
            tree.find_text(el, &format!("{path}/value"))
                .filter(|t| !t.is_empty())
        })
}

/// Field of the PNLab tool-specific block, falling back to a direct child
fn tool_field<'a>(tree: &'a XmlTree, el: ElementId, field: &str) -> Option<&'a str> {
    field_text(tree, el, &format!("{TOOL_BLOCK}/{field}")).or_else(|| field_text(tree, el, field))
}

/// Integer count, also accepting the `Default,3` layout of legacy documents
pub(crate) fn parse_count(value: &str) -> Option<u32> {
    let value = value.rsplit(',').next().unwrap_or(value).trim();
    value.parse::<u32>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0 && *v <= u32::MAX as f64)
            .map(|v| v as u32)
    })
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an optional field, using `default` (and logging) if it is present but invalid
fn lenient<T>(
    value: Option<&str>,
    parse: impl FnOnce(&str) -> Option<T>,
    default: T,
    field: &str,
    node: &str,
) -> T {
    match value {
        None => default,
        Some(raw) => parse(raw).unwrap_or_else(|| {
            warn!("Invalid {field} {raw:?} of {node}, using default");
            default
        }),
    }
}

fn position(tree: &XmlTree, el: ElementId, node: &str) -> (f64, f64) {
    let Some(pos) = tree.find(el, "graphics/position") else {
        return (0.0, 0.0);
    };
    let x = tree.attribute(pos, "x").and_then(parse_float);
    let y = tree.attribute(pos, "y").and_then(parse_float);
    match (x, y) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            warn!("Invalid position of {node}, using origin");
            (0.0, 0.0)
        }
    }
}

///
/// Stored name of a node: `name/text`, legacy `name/value`, or the `id` attribute
///
/// A present but empty `name/text` (or `name/value`) is returned as empty name.
///
fn stored_name(tree: &XmlTree, el: ElementId) -> Option<&str> {
    if let Some(name) = field_text(tree, el, "name") {
        return Some(name);
    }
    if tree.find(el, "name/text").is_some() || tree.find(el, "name/value").is_some() {
        return Some("");
    }
    tree.attribute(el, "id")
}

fn node_name_and_type<'a, T: NodeType>(
    tree: &'a XmlTree,
    el: ElementId,
) -> Result<(&'a str, T), PNMLParseError> {
    let stored = stored_name(tree, el).ok_or(PNMLParseError::MissingKey("id"))?;
    let (prefixed, name) = T::split_prefixed(stored);
    let explicit = tool_field(tree, el, "type").and_then(|t| {
        let parsed = T::from_type_name(t);
        if parsed.is_none() {
            warn!("Unknown type {t:?} of {stored}, using name prefix");
        }
        parsed
    });
    if name.trim().is_empty() {
        return Err(PNMLParseError::EmptyNodeName(stored.to_string()));
    }
    Ok((name, explicit.or(prefixed).unwrap_or_default()))
}

fn decode_place(tree: &XmlTree, el: ElementId) -> Result<Place, PNMLParseError> {
    let (name, place_type) = node_name_and_type::<PlaceType>(tree, el)?;
    let mut place = Place::new(name, place_type)?;
    let node = place.id().to_string();
    let (x, y) = position(tree, el, &node);
    let props = &mut place.properties;
    props.position.x = x;
    props.position.y = y;
    props.init_marking = lenient(
        field_text(tree, el, "initialMarking"),
        parse_count,
        0,
        "initial marking",
        &node,
    );
    props.capacity = NonZeroU32::new(lenient(
        tool_field(tree, el, "capacity"),
        parse_count,
        0,
        "capacity",
        &node,
    ));
    let flag = |field: &str| lenient(tool_field(tree, el, field), parse_bool, false, field, &node);
    props.is_running_condition = flag("isRunningCondition");
    props.is_effect = flag("isEffect");
    props.is_output = flag("isOutput");
    props.is_negated = flag("isNegated");
    Ok(place)
}

fn decode_transition(tree: &XmlTree, el: ElementId) -> Result<Transition, PNMLParseError> {
    let (name, transition_type) = node_name_and_type::<TransitionType>(tree, el)?;
    let mut transition = Transition::new(name, transition_type)?;
    let node = transition.id().to_string();
    let (x, y) = position(tree, el, &node);
    let props = &mut transition.properties;
    props.position.x = x;
    props.position.y = y;
    props.is_horizontal = lenient(
        tool_field(tree, el, "isHorizontal"),
        parse_bool,
        false,
        "isHorizontal",
        &node,
    );
    props.rate = lenient(
        tool_field(tree, el, "rate"),
        |v| parse_float(v).filter(|r| *r >= 0.0),
        1.0,
        "rate",
        &node,
    );
    props.priority = lenient(
        tool_field(tree, el, "priority"),
        |v| parse_count(v).and_then(NonZeroU32::new),
        NonZeroU32::MIN,
        "priority",
        &node,
    );
    Ok(transition)
}

fn node_key(pn: &PetriNet, id: &str) -> Option<NodeKey> {
    let place = PlaceID(id.to_string());
    if pn.places.contains_key(&place) {
        return Some(NodeKey::Place(place));
    }
    let transition = TransitionID(id.to_string());
    if pn.transitions.contains_key(&transition) {
        return Some(NodeKey::Transition(transition));
    }
    None
}

/// Register all places and transitions and rewrite references to their raw ids
fn decode_nodes(pn: &mut PetriNet) -> Result<(), PNMLParseError> {
    let mut renamed: HashMap<String, String> = HashMap::new();
    for el in pn.document.elements_named("place") {
        let place = decode_place(&pn.document.tree, el)?;
        match pn.try_add_place(place, false) {
            Ok(id) => {
                register_element(pn, el, id.as_str(), &mut renamed);
                if let Some(place) = pn.places.get_mut(&id) {
                    place.core.element = Some(el);
                }
            }
            Err(duplicate) => {
                warn!("Dropping duplicate place {}", duplicate.id());
                drop_duplicate(pn, el, duplicate.id(), &mut renamed);
            }
        }
    }
    for el in pn.document.elements_named("transition") {
        let transition = decode_transition(&pn.document.tree, el)?;
        match pn.try_add_transition(transition, false) {
            Ok(id) => {
                register_element(pn, el, id.as_str(), &mut renamed);
                if let Some(transition) = pn.transitions.get_mut(&id) {
                    transition.core.element = Some(el);
                }
            }
            Err(duplicate) => {
                warn!("Dropping duplicate transition {}", duplicate.id());
                drop_duplicate(pn, el, duplicate.id(), &mut renamed);
            }
        }
    }
    debug!(
        "Registered {} places and {} transitions of net {:?}",
        pn.places.len(),
        pn.transitions.len(),
        pn.name
    );
    pn.document.rewrite_references(&renamed);
    Ok(())
}

fn register_element(
    pn: &mut PetriNet,
    el: ElementId,
    id: &str,
    renamed: &mut HashMap<String, String>,
) {
    let tree = &mut pn.document.tree;
    if let Some(raw) = tree.attribute(el, "id") {
        if raw != id {
            renamed.insert(raw.to_string(), id.to_string());
        }
    }
    tree.set_attribute(el, "id", id);
}

/// Detach a duplicate node element, redirecting references to it to the surviving node
fn drop_duplicate(
    pn: &mut PetriNet,
    el: ElementId,
    id: &str,
    renamed: &mut HashMap<String, String>,
) {
    if let Some(raw) = pn.document.tree.attribute(el, "id") {
        if raw != id {
            renamed
                .entry(raw.to_string())
                .or_insert_with(|| id.to_string());
        }
    }
    pn.document.detach(el);
}

#[derive(Debug)]
struct Alias {
    element: ElementId,
    place: bool,
    target: String,
}

///
/// Resolve all `referencePlace` / `referenceTransition` elements
///
/// Returns the map from alias id to the (concrete) node it stands for.
/// References are followed transitively; cycles and dangling references fail.
///
fn resolve_references(pn: &mut PetriNet) -> Result<HashMap<String, NodeKey>, PNMLParseError> {
    let mut aliases: Vec<(Option<String>, Alias)> = Vec::new();
    for (tag, place) in [("referencePlace", true), ("referenceTransition", false)] {
        for element in pn.document.elements_named(tag) {
            let tree = &pn.document.tree;
            let target = tree
                .attribute(element, "ref")
                .ok_or(PNMLParseError::MissingKey("ref"))?
                .to_string();
            let id = tree.attribute(element, "id").map(str::to_string);
            aliases.push((
                id,
                Alias {
                    element,
                    place,
                    target,
                },
            ));
        }
    }
    let by_id: HashMap<&str, &Alias> = aliases
        .iter()
        .filter_map(|(id, alias)| id.as_deref().map(|id| (id, alias)))
        .collect();

    let mut resolved: Vec<(Option<String>, ElementId, NodeKey)> = Vec::new();
    for (id, alias) in &aliases {
        let mut current = alias.target.as_str();
        let mut visited: HashSet<&str> = HashSet::new();
        let key = loop {
            if let Some(key) = node_key(pn, current) {
                break key;
            }
            match by_id.get(current) {
                Some(next) if visited.insert(current) => current = next.target.as_str(),
                _ => return Err(PNMLParseError::UnresolvedReference(alias.target.clone())),
            }
        };
        if matches!(key, NodeKey::Place(_)) != alias.place {
            return Err(PNMLParseError::UnresolvedReference(alias.target.clone()));
        }
        resolved.push((id.clone(), alias.element, key));
    }

    let mut alias_map = HashMap::new();
    for (id, element, key) in resolved {
        match &key {
            NodeKey::Place(p) => {
                if let Some(place) = pn.places.get_mut(p) {
                    place.core.references.insert(element);
                }
            }
            NodeKey::Transition(t) => {
                if let Some(transition) = pn.transitions.get_mut(t) {
                    transition.core.references.insert(element);
                }
            }
        }
        if let Some(id) = id {
            alias_map.insert(id, key);
        }
    }
    Ok(alias_map)
}

fn decode_arcs(
    pn: &mut PetriNet,
    aliases: &HashMap<String, NodeKey>,
) -> Result<(), PNMLParseError> {
    for el in pn.document.elements_named("arc") {
        let tree = &pn.document.tree;
        let resolve = |key: &'static str| -> Result<NodeKey, PNMLParseError> {
            let id = tree
                .attribute(el, key)
                .ok_or(PNMLParseError::MissingKey(key))?;
            node_key(pn, id)
                .or_else(|| aliases.get(id).cloned())
                .ok_or_else(|| PNMLParseError::UnresolvedReference(id.to_string()))
        };
        let source = resolve("source")?;
        let target = resolve("target")?;
        let arc_name = format!("arc {} -> {}", source.id(), target.id());
        let weight = lenient(
            field_text(tree, el, "inscription"),
            |v| parse_count(v).filter(|w| *w > 0),
            1,
            "weight",
            &arc_name,
        );
        match pn.add_arc(&source, &target, Some(weight))? {
            Some(arc) => {
                pn.update_arc(&arc.from_to, |arc| arc.element = Some(el));
            }
            None => {
                warn!("Dropping duplicate {arc_name}");
                pn.document.detach(el);
            }
        }
    }
    Ok(())
}

fn net_name(tree: &XmlTree, net: ElementId, fallback_name: Option<&str>) -> String {
    field_text(tree, net, "name")
        .or_else(|| tree.attribute(net, "id"))
        .or(fallback_name)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NET_NAME)
        .to_string()
}

fn net_scale(tree: &XmlTree, net: ElementId, name: &str) -> f64 {
    let scale = tree
        .find_text(net, &format!("{TOOL_BLOCK}/scale/text"))
        .or_else(|| tree.find_text(net, &format!("{TOOL_BLOCK}/scale/scale/text")));
    lenient(
        scale,
        |v| parse_float(v).filter(|s| *s > 0.0),
        1.0,
        "scale",
        name,
    )
}

fn decode_net(
    tree: &XmlTree,
    net: ElementId,
    fallback_name: Option<&str>,
) -> Result<PetriNet, PNMLParseError> {
    let name = net_name(tree, net, fallback_name);
    let mut pn = PetriNet::from_document(name, NetDocument::from_net(tree, net));
    pn.scale = net_scale(tree, net, &pn.name);
    decode_nodes(&mut pn)?;
    let aliases = resolve_references(&mut pn)?;
    decode_arcs(&mut pn, &aliases)?;
    Ok(pn)
}

///
/// Decode all nets of a parsed PNML document
///
/// The tree is processed according to `options` (namespace stripping and
/// dialect conversion) before decoding. Nets are collected breadth-first.
///
pub fn decode_pnml(
    tree: XmlTree,
    options: &PnmlImportOptions,
) -> Result<Vec<PetriNet>, PNMLParseError> {
    let mut tree = tree;
    if options.strip_namespaces {
        strip_namespaces(&mut tree);
    }
    let tree = options.dialect.converter().to_canonical(&tree)?;
    let root = tree.root();
    if tree.tag(root) != "pnml" {
        return Err(PNMLParseError::NoPNMLTag);
    }
    let nets = tree.find_all_breadth_first(root, "net");
    debug!("Found {} net(s) in PNML document", nets.len());
    nets.into_iter()
        .map(|net| decode_net(&tree, net, options.fallback_name.as_deref()))
        .collect()
}

///
/// Decode all nets of a PNML document (with default options)
///
/// `fallback_name` is used for nets that declare neither a name nor an id.
///
pub fn from_element_tree(
    tree: &XmlTree,
    fallback_name: Option<&str>,
) -> Result<Vec<PetriNet>, PNMLParseError> {
    let options = PnmlImportOptions {
        fallback_name: fallback_name.map(str::to_string),
        ..Default::default()
    };
    decode_pnml(tree.clone(), &options)
}

///
/// Import all Petri nets of a PNML document from the given standard buffered reader
///
/// Also see [`import_pnml_from_path`] for importing from a filepath directly.
///
pub fn import_pnml_reader<T>(reader: T) -> Result<Vec<PetriNet>, PNMLParseError>
where
    T: BufRead,
{
    import_pnml_reader_with_options(reader, &PnmlImportOptions::default())
}

/// Import all Petri nets of a PNML document from a buffered reader using the given options
pub fn import_pnml_reader_with_options<T>(
    reader: T,
    options: &PnmlImportOptions,
) -> Result<Vec<PetriNet>, PNMLParseError>
where
    T: BufRead,
{
    decode_pnml(parse_xml_reader(reader)?, options)
}

///
/// Import all Petri nets of a PNML file from the given filepath
///
/// Nets without declared name or id are named after the file
/// (see [`fallback_name_from_path`]).
///
pub fn import_pnml_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<PetriNet>, PNMLParseError> {
    import_pnml_from_path_with_options(path, &PnmlImportOptions::default())
}

/// Import all Petri nets of a PNML file using the given options
///
/// If `options` has no fallback name, the name is derived from the path.
pub fn import_pnml_from_path_with_options<P: AsRef<Path>>(
    path: P,
    options: &PnmlImportOptions,
) -> Result<Vec<PetriNet>, PNMLParseError> {
    let path = path.as_ref();
    let mut options = options.clone();
    if options.fallback_name.is_none() {
        options.fallback_name = fallback_name_from_path(path);
    }
    decode_pnml(parse_xml_file(path)?, &options)
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}

///
/// Net name derived from a file path
///
/// Strips `.pnml.xml`, `.pnml`, or else the last extension from the file name.
///
/// ```
/// use pnlab::core::petri_net::pnml::fallback_name_from_path;
/// assert_eq!(fallback_name_from_path("nets/Mutex.PNML.xml".as_ref()), Some("Mutex".to_string()));
/// assert_eq!(fallback_name_from_path("a.b.xml".as_ref()), Some("a.b".to_string()));
/// ```
pub fn fallback_name_from_path(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_string_lossy();
    let name = strip_suffix_ignore_case(&file_name, ".pnml.xml")
        .or_else(|| strip_suffix_ignore_case(&file_name, ".pnml"))
        .or_else(|| file_name.rsplit_once('.').map(|(stem, _)| stem))
        .unwrap_or(&file_name);
    (!name.is_empty()).then(|| name.to_string())
}
