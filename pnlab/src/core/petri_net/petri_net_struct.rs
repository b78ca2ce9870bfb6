use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::io::BufRead;
use std::num::NonZeroU32;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pnml::{
    document::NetDocument,
    export_pnml::{self, PNMLWriteError},
    import_pnml::{self, PNMLParseError},
    style::PnmlStyle,
};
use crate::core::dialect::Dialect;
use crate::core::xml::{ElementId, XmlTree};

///
/// Error of a graph operation on a [`PetriNet`]
///
/// These indicate a wrong use of the graph API (e.g., connecting two places)
/// and are never produced for soft conflicts like duplicate ids.
///
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PetriNetError {
    /// A node name was empty (after removing the type prefix)
    #[error("node name must not be empty")]
    EmptyName,
    /// The net name was empty
    #[error("net name must not be empty")]
    EmptyNetName,
    /// Arcs must connect exactly one place and one transition
    #[error("cannot connect {from} to {to}: arcs connect a place and a transition")]
    InvalidConnection {
        /// Requested source
        from: NodeKey,
        /// Requested target
        to: NodeKey,
    },
    /// Arc endpoint that is not part of the net
    #[error("{0} is not part of the net")]
    UnknownNode(NodeKey),
    /// Arc weights must be positive
    #[error("invalid arc weight {0}: weights must be positive")]
    InvalidWeight(u32),
    /// Place not found
    #[error("place {0} not found")]
    PlaceNotFound(PlaceID),
    /// Transition not found
    #[error("transition {0} not found")]
    TransitionNotFound(TransitionID),
    /// Scales must be positive and finite
    #[error("invalid scale {0}: scales must be positive")]
    InvalidScale(f64),
    /// Two nodes with the same id (e.g., in a JSON snapshot)
    #[error("duplicate node {0}")]
    DuplicateNode(NodeKey),
}

///
/// Closed set of types of one node category (places or transitions)
///
/// The first character of the type name is used as prefix of ids and full names.
///
pub trait NodeType:
    Copy + Eq + std::hash::Hash + std::fmt::Debug + Default + Display + 'static
{
    /// All types of this category
    const ALL: &'static [Self];

    /// Type name
    fn as_str(&self) -> &'static str;

    /// Additional accepted type names
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Single-character prefix, e.g. `a` for action places
    fn prefix(&self) -> char {
        self.as_str().chars().next().unwrap_or('_')
    }

    /// Parse a type name (case-insensitive, aliases included)
    fn from_type_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == name || t.aliases().contains(&name.as_str()))
    }

    ///
    /// Split a recognised type prefix off a stored name or id
    ///
    /// Long prefixes (`action.`) are matched before short ones (`a.`).
    /// Returns `None` as type if no prefix is recognised, in which case the
    /// input is returned unchanged.
    ///
    fn split_prefixed(raw: &str) -> (Option<Self>, &str) {
        for t in Self::ALL {
            for long in std::iter::once(t.as_str()).chain(t.aliases().iter().copied()) {
                if let Some(rest) = raw.strip_prefix(long).and_then(|r| r.strip_prefix('.')) {
                    return (Some(*t), rest);
                }
            }
        }
        for t in Self::ALL {
            let mut chars = raw.chars();
            if chars.next() == Some(t.prefix()) && chars.next() == Some('.') {
                return (Some(*t), &raw[2..]);
            }
        }
        (None, raw)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
/// Type of a [`Place`]
pub enum PlaceType {
    /// Action place (`a.`)
    Action,
    /// Predicate place (`p.`), also used for unprefixed names
    #[default]
    Predicate,
    /// Task place (`t.`)
    Task,
    /// Regular (generic) place (`r.`)
    #[serde(alias = "generic")]
    Regular,
}

impl NodeType for PlaceType {
    const ALL: &'static [Self] = &[Self::Action, Self::Predicate, Self::Task, Self::Regular];

    fn as_str(&self) -> &'static str {
        match self {
            PlaceType::Action => "action",
            PlaceType::Predicate => "predicate",
            PlaceType::Task => "task",
            PlaceType::Regular => "regular",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            PlaceType::Regular => &["generic"],
            _ => &[],
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
/// Type of a [`Transition`]
pub enum TransitionType {
    /// Immediate transition (`i.`)
    #[default]
    Immediate,
    /// Timed stochastic transition (`s.`)
    #[serde(alias = "timed_stochastic")]
    Stochastic,
}

impl NodeType for TransitionType {
    const ALL: &'static [Self] = &[Self::Immediate, Self::Stochastic];

    fn as_str(&self) -> &'static str {
        match self {
            TransitionType::Immediate => "immediate",
            TransitionType::Stochastic => "stochastic",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            TransitionType::Stochastic => &["timed_stochastic"],
            TransitionType::Immediate => &[],
        }
    }
}

impl Display for PlaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for TransitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Id of a node with the given type prefix and name
///
/// ```
/// use pnlab::core::petri_net::node_id;
/// assert_eq!(node_id('a', "pick up (left, right)"), "a.pick_up___left__right__");
/// ```
pub fn node_id(prefix: char, name: &str) -> String {
    let mut id = String::with_capacity(name.len() + 2);
    id.push(prefix);
    id.push('.');
    for c in name.chars() {
        match c {
            ' ' | ',' => id.push('_'),
            '(' | ')' => id.push_str("__"),
            c => id.push(c),
        }
    }
    id
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Hash, PartialOrd, Ord)]
/// Place ID
pub struct PlaceID(pub String);

impl PlaceID {
    /// Id as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Place> for PlaceID {
    fn from(value: &Place) -> Self {
        PlaceID(value.core.id.clone())
    }
}

impl Display for PlaceID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Hash, PartialOrd, Ord)]
/// Transition ID
pub struct TransitionID(pub String);

impl TransitionID {
    /// Id as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Transition> for TransitionID {
    fn from(value: &Transition) -> Self {
        TransitionID(value.core.id.clone())
    }
}

impl Display for TransitionID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Hash, PartialOrd, Ord)]
#[serde(tag = "kind", content = "id")]
/// Endpoint of an arc: either a place or a transition
pub enum NodeKey {
    /// Place with the given id
    Place(PlaceID),
    /// Transition with the given id
    Transition(TransitionID),
}

impl NodeKey {
    /// Id of the node
    pub fn id(&self) -> &str {
        match self {
            NodeKey::Place(p) => p.as_str(),
            NodeKey::Transition(t) => t.as_str(),
        }
    }
}

impl From<PlaceID> for NodeKey {
    fn from(value: PlaceID) -> Self {
        NodeKey::Place(value)
    }
}

impl From<TransitionID> for NodeKey {
    fn from(value: TransitionID) -> Self {
        NodeKey::Transition(value)
    }
}

impl From<&Place> for NodeKey {
    fn from(value: &Place) -> Self {
        NodeKey::Place(value.into())
    }
}

impl From<&Transition> for NodeKey {
    fn from(value: &Transition) -> Self {
        NodeKey::Transition(value.into())
    }
}

impl Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKey::Place(p) => write!(f, "place {p}"),
            NodeKey::Transition(t) => write!(f, "transition {t}"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(tag = "type", content = "nodes")]
/// Arc type in a Petri net
pub enum ArcType {
    /// From Place to Transition
    PlaceTransition(PlaceID, TransitionID),
    /// From Transition to Place
    TransitionPlace(TransitionID, PlaceID),
}

impl ArcType {
    /// Create new from place to transition
    pub fn place_to_transition(from: PlaceID, to: TransitionID) -> ArcType {
        ArcType::PlaceTransition(from, to)
    }

    /// Create new from transition to place
    pub fn transition_to_place(from: TransitionID, to: PlaceID) -> ArcType {
        ArcType::TransitionPlace(from, to)
    }

    /// Direction of an arc from `source` to `target`
    ///
    /// Fails with [`PetriNetError::InvalidConnection`] unless exactly one
    /// endpoint is a place and the other a transition.
    pub fn from_endpoints(source: &NodeKey, target: &NodeKey) -> Result<ArcType, PetriNetError> {
        match (source, target) {
            (NodeKey::Place(p), NodeKey::Transition(t)) => {
                Ok(ArcType::PlaceTransition(p.clone(), t.clone()))
            }
            (NodeKey::Transition(t), NodeKey::Place(p)) => {
                Ok(ArcType::TransitionPlace(t.clone(), p.clone()))
            }
            (from, to) => Err(PetriNetError::InvalidConnection {
                from: from.clone(),
                to: to.clone(),
            }),
        }
    }

    /// Source of the arc
    pub fn source(&self) -> NodeKey {
        match self {
            ArcType::PlaceTransition(p, _) => NodeKey::Place(p.clone()),
            ArcType::TransitionPlace(t, _) => NodeKey::Transition(t.clone()),
        }
    }

    /// Target of the arc
    pub fn target(&self) -> NodeKey {
        match self {
            ArcType::PlaceTransition(_, t) => NodeKey::Transition(t.clone()),
            ArcType::TransitionPlace(_, p) => NodeKey::Place(p.clone()),
        }
    }

    /// The place this arc is connected to
    pub fn place(&self) -> &PlaceID {
        match self {
            ArcType::PlaceTransition(p, _) | ArcType::TransitionPlace(_, p) => p,
        }
    }

    /// The transition this arc is connected to
    pub fn transition(&self) -> &TransitionID {
        match self {
            ArcType::PlaceTransition(_, t) | ArcType::TransitionPlace(t, _) => t,
        }
    }

    /// The endpoint opposite of `key` (`None` if `key` is not an endpoint)
    pub fn other_endpoint(&self, key: &NodeKey) -> Option<NodeKey> {
        match key {
            NodeKey::Place(p) if p == self.place() => {
                Some(NodeKey::Transition(self.transition().clone()))
            }
            NodeKey::Transition(t) if t == self.transition() => {
                Some(NodeKey::Place(self.place().clone()))
            }
            _ => None,
        }
    }

    /// Checks if a given node is start or end of this arc
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.other_endpoint(key).is_some()
    }

    /// Same direction and transition, connected to another place
    pub fn with_place(&self, place: PlaceID) -> ArcType {
        match self {
            ArcType::PlaceTransition(_, t) => ArcType::PlaceTransition(place, t.clone()),
            ArcType::TransitionPlace(t, _) => ArcType::TransitionPlace(t.clone(), place),
        }
    }

    /// Same direction and place, connected to another transition
    pub fn with_transition(&self, transition: TransitionID) -> ArcType {
        match self {
            ArcType::PlaceTransition(p, _) => ArcType::PlaceTransition(p.clone(), transition),
            ArcType::TransitionPlace(_, p) => ArcType::TransitionPlace(transition, p.clone()),
        }
    }

    /// Id of the arc element: `<source id>_<target id>`
    pub fn id(&self) -> String {
        match self {
            ArcType::PlaceTransition(p, t) => format!("{p}_{t}"),
            ArcType::TransitionPlace(t, p) => format!("{t}_{p}"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Hash, PartialEq, Eq)]
/// Arc in a Petri net
///
/// Connecting a transition and a place (or the other way around)
pub struct Arc {
    /// Source and target of Arc
    pub from_to: ArcType,
    /// Weight (i.e., how many tokens this arc moves)
    pub weight: u32,
    #[serde(skip)]
    pub(crate) element: Option<ElementId>,
}

impl Arc {
    /// Id of the arc element: `<source id>_<target id>`
    pub fn id(&self) -> String {
        self.from_to.id()
    }

    /// If this arc was loaded from an element of a PNML document
    pub fn has_tree_element(&self) -> bool {
        self.element.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
/// Position of a node (layout metadata only)
pub struct Position {
    /// x coordinate
    pub x: f64,
    /// y coordinate
    pub y: f64,
}

impl Position {
    /// Create a new position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeCore<T> {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) node_type: T,
    /// Neighbour id -> arc
    pub(crate) incoming_arcs: HashMap<String, Arc>,
    pub(crate) outgoing_arcs: HashMap<String, Arc>,
    pub(crate) element: Option<ElementId>,
    /// `referencePlace` / `referenceTransition` elements aliasing this node
    pub(crate) references: BTreeSet<ElementId>,
}

/// Names are stored trimmed, as surrounding whitespace does not survive PNML
fn node_name(name: String) -> Result<String, PetriNetError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PetriNetError::EmptyName);
    }
    if trimmed.len() == name.len() {
        Ok(name)
    } else {
        Ok(trimmed.to_string())
    }
}

fn net_name(name: String) -> Result<String, PetriNetError> {
    node_name(name).map_err(|_| PetriNetError::EmptyNetName)
}

impl<T: NodeType> NodeCore<T> {
    fn new(name: String, node_type: T) -> Result<Self, PetriNetError> {
        let name = node_name(name)?;
        Ok(Self {
            id: node_id(node_type.prefix(), &name),
            name,
            node_type,
            incoming_arcs: HashMap::new(),
            outgoing_arcs: HashMap::new(),
            element: None,
            references: BTreeSet::new(),
        })
    }

    fn set_name(&mut self, name: String) {
        self.id = node_id(self.node_type.prefix(), &name);
        self.name = name;
    }

    fn reset(&mut self) {
        self.incoming_arcs.clear();
        self.outgoing_arcs.clear();
        self.element = None;
        self.references.clear();
    }

    fn arcs(&self) -> impl Iterator<Item = &Arc> {
        self.incoming_arcs.values().chain(self.outgoing_arcs.values())
    }
}

///
/// Capability shared by [`Place`]s and [`Transition`]s
///
pub trait Node {
    /// Type set of this node category
    type Type: NodeType;

    /// Id (`<prefix>.<name>` with spaces, commas and parentheses replaced)
    fn id(&self) -> &str;
    /// Name without type prefix
    fn name(&self) -> &str;
    /// Node type
    fn node_type(&self) -> Self::Type;
    /// Key of this node as arc endpoint
    fn key(&self) -> NodeKey;
    /// Arcs ending in this node, keyed by the id of their source
    fn incoming_arcs(&self) -> HashMap<String, Arc>;
    /// Arcs starting in this node, keyed by the id of their target
    fn outgoing_arcs(&self) -> HashMap<String, Arc>;
    /// If this node was loaded from an element of a PNML document
    fn has_tree_element(&self) -> bool;

    /// Name including the type prefix, e.g. `a.pick up`
    fn full_name(&self) -> String {
        format!("{}.{}", self.node_type().prefix(), self.name())
    }
}

macro_rules! impl_node {
    ($node:ty, $node_type:ty) => {
        impl Node for $node {
            type Type = $node_type;

            fn id(&self) -> &str {
                &self.core.id
            }
            fn name(&self) -> &str {
                &self.core.name
            }
            fn node_type(&self) -> $node_type {
                self.core.node_type
            }
            fn key(&self) -> NodeKey {
                NodeKey::from(self)
            }
            fn incoming_arcs(&self) -> HashMap<String, Arc> {
                self.core.incoming_arcs.clone()
            }
            fn outgoing_arcs(&self) -> HashMap<String, Arc> {
                self.core.outgoing_arcs.clone()
            }
            fn has_tree_element(&self) -> bool {
                self.core.element.is_some()
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
/// Editable properties of a [`Place`]
pub struct PlaceProperties {
    /// Position
    pub position: Position,
    /// Initial number of tokens
    pub init_marking: u32,
    /// Upper bound on the marking (`None` = unbounded or unknown)
    pub capacity: Option<NonZeroU32>,
    /// Place is a running condition
    pub is_running_condition: bool,
    /// Place is an effect
    pub is_effect: bool,
    /// Place is an output
    pub is_output: bool,
    /// Place is negated
    pub is_negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
/// Place in a Petri net
pub struct Place {
    pub(crate) core: NodeCore<PlaceType>,
    /// Properties that can be edited while the place is part of a net
    pub properties: PlaceProperties,
}

impl Place {
    /// Create a new (detached) place
    pub fn new(name: impl Into<String>, place_type: PlaceType) -> Result<Self, PetriNetError> {
        Ok(Self {
            core: NodeCore::new(name.into(), place_type)?,
            properties: PlaceProperties::default(),
        })
    }

    /// Set the position
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.properties.position = Position::new(x, y);
        self
    }

    /// Set the initial marking
    pub fn with_init_marking(mut self, tokens: u32) -> Self {
        self.properties.init_marking = tokens;
        self
    }

    /// Set the capacity (`0` = unbounded)
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.properties.capacity = NonZeroU32::new(capacity);
        self
    }

    /// Id of this place
    pub fn place_id(&self) -> PlaceID {
        self.into()
    }
}

impl_node!(Place, PlaceType);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Editable properties of a [`Transition`]
pub struct TransitionProperties {
    /// Position
    pub position: Position,
    /// Orientation (presentation only)
    pub is_horizontal: bool,
    /// Firing rate (stochastic transitions)
    pub rate: f64,
    /// Priority (positive)
    pub priority: NonZeroU32,
}

impl Default for TransitionProperties {
    fn default() -> Self {
        Self {
            position: Position::default(),
            is_horizontal: false,
            rate: 1.0,
            priority: NonZeroU32::MIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Transition in a Petri net
pub struct Transition {
    pub(crate) core: NodeCore<TransitionType>,
    /// Properties that can be edited while the transition is part of a net
    pub properties: TransitionProperties,
}

impl Transition {
    /// Create a new (detached) transition
    pub fn new(
        name: impl Into<String>,
        transition_type: TransitionType,
    ) -> Result<Self, PetriNetError> {
        Ok(Self {
            core: NodeCore::new(name.into(), transition_type)?,
            properties: TransitionProperties::default(),
        })
    }

    /// Set the position
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.properties.position = Position::new(x, y);
        self
    }

    /// Set the orientation
    pub fn with_horizontal(mut self, is_horizontal: bool) -> Self {
        self.properties.is_horizontal = is_horizontal;
        self
    }

    /// Set the rate
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.properties.rate = rate;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: NonZeroU32) -> Self {
        self.properties.priority = priority;
        self
    }

    /// Id of this transition
    pub fn transition_id(&self) -> TransitionID {
        self.into()
    }
}

impl_node!(Transition, TransitionType);

#[derive(Debug, Clone)]
///
/// A Petri net of [`Place`]s and [`Transition`]s
///
/// Bipartite graph of [`Place`]s and [`Transition`]s with [`Arc`]s connecting them.
/// All changes go through the methods of this struct, so that the arcs stored
/// at both endpoints always agree and every arc endpoint is part of the net.
///
/// A net also owns the PNML document it was loaded from (or a fresh one).
/// Encoding merges the net into a copy of it (see [`PetriNet::to_element_tree`]).
pub struct PetriNet {
    pub(crate) name: String,
    pub(crate) places: HashMap<PlaceID, Place>,
    pub(crate) transitions: HashMap<TransitionID, Transition>,
    pub(crate) scale: f64,
    pub(crate) document: NetDocument,
}

impl PetriNet {
    /// Create new [`PetriNet`] with no places or transitions
    pub fn new(name: impl Into<String>) -> Result<Self, PetriNetError> {
        let name = net_name(name.into())?;
        let document = NetDocument::new(&name);
        Ok(Self::from_document(name, document))
    }

    pub(crate) fn from_document(name: String, document: NetDocument) -> Self {
        Self {
            name,
            places: HashMap::new(),
            transitions: HashMap::new(),
            scale: 1.0,
            document,
        }
    }

    /// Name of the net
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the net
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), PetriNetError> {
        let name = net_name(name.into())?;
        self.name = name;
        Ok(())
    }

    /// Scale of the net (presentation only)
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Set the scale, which must be positive and finite
    pub fn set_scale(&mut self, scale: f64) -> Result<(), PetriNetError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(PetriNetError::InvalidScale(scale));
        }
        self.scale = scale;
        Ok(())
    }

    /// All places, keyed by their id
    pub fn places(&self) -> &HashMap<PlaceID, Place> {
        &self.places
    }

    /// All transitions, keyed by their id
    pub fn transitions(&self) -> &HashMap<TransitionID, Transition> {
        &self.transitions
    }

    /// Get a place
    pub fn place(&self, id: &PlaceID) -> Option<&Place> {
        self.places.get(id)
    }

    /// Get the editable properties of a place
    pub fn place_mut(&mut self, id: &PlaceID) -> Option<&mut PlaceProperties> {
        self.places.get_mut(id).map(|p| &mut p.properties)
    }

    /// Get a transition
    pub fn transition(&self, id: &TransitionID) -> Option<&Transition> {
        self.transitions.get(id)
    }

    /// Get the editable properties of a transition
    pub fn transition_mut(&mut self, id: &TransitionID) -> Option<&mut TransitionProperties> {
        self.transitions.get_mut(id).map(|t| &mut t.properties)
    }

    /// Check if the node is part of this net
    pub fn contains(&self, key: &NodeKey) -> bool {
        match key {
            NodeKey::Place(p) => self.places.contains_key(p),
            NodeKey::Transition(t) => self.transitions.contains_key(t),
        }
    }

    ///
    /// Add a place
    ///
    /// If a place with the same id exists, the place is handed back unless
    /// `overwrite` is set. When overwriting, the existing place is removed
    /// first (including all of its arcs).
    /// The inserted place starts without any arcs.
    ///
    pub fn try_add_place(&mut self, place: Place, overwrite: bool) -> Result<PlaceID, Place> {
        let id = place.place_id();
        if self.places.contains_key(&id) {
            if !overwrite {
                return Err(place);
            }
            self.remove_place(&id);
        }
        let mut place = place;
        place.core.reset();
        self.places.insert(id.clone(), place);
        Ok(id)
    }

    /// Add a place, returning `false` if it was not added (see [`PetriNet::try_add_place`])
    pub fn add_place(&mut self, place: Place, overwrite: bool) -> bool {
        self.try_add_place(place, overwrite).is_ok()
    }

    /// Add a transition (see [`PetriNet::try_add_place`])
    pub fn try_add_transition(
        &mut self,
        transition: Transition,
        overwrite: bool,
    ) -> Result<TransitionID, Transition> {
        let id = transition.transition_id();
        if self.transitions.contains_key(&id) {
            if !overwrite {
                return Err(transition);
            }
            self.remove_transition(&id);
        }
        let mut transition = transition;
        transition.core.reset();
        self.transitions.insert(id.clone(), transition);
        Ok(id)
    }

    /// Add a transition, returning `false` if it was not added
    pub fn add_transition(&mut self, transition: Transition, overwrite: bool) -> bool {
        self.try_add_transition(transition, overwrite).is_ok()
    }

    ///
    /// Remove a place and all of its arcs
    ///
    /// The elements of the place (and of all references to it) are removed
    /// from the document. Returns `None` if there is no such place.
    ///
    pub fn remove_place(&mut self, id: &PlaceID) -> Option<Place> {
        let arcs: Vec<ArcType> = self
            .places
            .get(id)?
            .core
            .arcs()
            .map(|arc| arc.from_to.clone())
            .collect();
        for from_to in arcs {
            self.discard_arc(&from_to);
        }
        let mut place = self.places.remove(id)?;
        self.detach_elements(&place.core);
        place.core.reset();
        Some(place)
    }

    /// Remove a transition and all of its arcs (see [`PetriNet::remove_place`])
    pub fn remove_transition(&mut self, id: &TransitionID) -> Option<Transition> {
        let arcs: Vec<ArcType> = self
            .transitions
            .get(id)?
            .core
            .arcs()
            .map(|arc| arc.from_to.clone())
            .collect();
        for from_to in arcs {
            self.discard_arc(&from_to);
        }
        let mut transition = self.transitions.remove(id)?;
        self.detach_elements(&transition.core);
        transition.core.reset();
        Some(transition)
    }

    fn detach_elements<T>(&mut self, core: &NodeCore<T>) {
        for el in core.element.iter().chain(core.references.iter()) {
            self.document.detach(*el);
        }
    }

    ///
    /// Rename a place (changing its id)
    ///
    /// Returns `Ok(false)` without changing anything if another place already
    /// has the resulting id. On success, all arcs are re-attached with the same
    /// weight.
    ///
    pub fn rename_place(
        &mut self,
        id: &PlaceID,
        new_name: impl Into<String>,
    ) -> Result<bool, PetriNetError> {
        let new_name = node_name(new_name.into())?;
        let place = self
            .places
            .get_mut(id)
            .ok_or_else(|| PetriNetError::PlaceNotFound(id.clone()))?;
        let new_id = PlaceID(node_id(place.core.node_type.prefix(), &new_name));
        if &new_id == id {
            place.core.name = new_name;
            return Ok(true);
        }
        if self.places.contains_key(&new_id) {
            return Ok(false);
        }
        let Some(mut place) = self.places.remove(id) else {
            return Err(PetriNetError::PlaceNotFound(id.clone()));
        };
        let arcs: Vec<Arc> = place.core.arcs().cloned().collect();
        place.core.incoming_arcs.clear();
        place.core.outgoing_arcs.clear();
        for arc in &arcs {
            self.take_arc(&arc.from_to);
        }
        place.core.set_name(new_name);
        self.places.insert(new_id.clone(), place);
        for arc in arcs {
            self.insert_arc(Arc {
                from_to: arc.from_to.with_place(new_id.clone()),
                ..arc
            });
        }
        Ok(true)
    }

    /// Rename a transition (see [`PetriNet::rename_place`])
    pub fn rename_transition(
        &mut self,
        id: &TransitionID,
        new_name: impl Into<String>,
    ) -> Result<bool, PetriNetError> {
        let new_name = node_name(new_name.into())?;
        let transition = self
            .transitions
            .get_mut(id)
            .ok_or_else(|| PetriNetError::TransitionNotFound(id.clone()))?;
        let new_id = TransitionID(node_id(transition.core.node_type.prefix(), &new_name));
        if &new_id == id {
            transition.core.name = new_name;
            return Ok(true);
        }
        if self.transitions.contains_key(&new_id) {
            return Ok(false);
        }
        let Some(mut transition) = self.transitions.remove(id) else {
            return Err(PetriNetError::TransitionNotFound(id.clone()));
        };
        let arcs: Vec<Arc> = transition.core.arcs().cloned().collect();
        transition.core.incoming_arcs.clear();
        transition.core.outgoing_arcs.clear();
        for arc in &arcs {
            self.take_arc(&arc.from_to);
        }
        transition.core.set_name(new_name);
        self.transitions.insert(new_id.clone(), transition);
        for arc in arcs {
            self.insert_arc(Arc {
                from_to: arc.from_to.with_transition(new_id.clone()),
                ..arc
            });
        }
        Ok(true)
    }

    fn validate_arc(
        &self,
        source: &NodeKey,
        target: &NodeKey,
    ) -> Result<ArcType, PetriNetError> {
        let from_to = ArcType::from_endpoints(source, target)?;
        for key in [source, target] {
            if !self.contains(key) {
                return Err(PetriNetError::UnknownNode(key.clone()));
            }
        }
        Ok(from_to)
    }

    ///
    /// Add an arc from `source` to `target` (default weight: 1)
    ///
    /// If there already is an arc between the two nodes (in this direction),
    /// nothing is changed and `Ok(None)` is returned. In particular, the weight
    /// of the existing arc is not updated (see [`PetriNet::set_arc_weight`]).
    ///
    pub fn add_arc(
        &mut self,
        source: &NodeKey,
        target: &NodeKey,
        weight: Option<u32>,
    ) -> Result<Option<Arc>, PetriNetError> {
        let from_to = self.validate_arc(source, target)?;
        let weight = weight.unwrap_or(1);
        if weight == 0 {
            return Err(PetriNetError::InvalidWeight(weight));
        }
        if self.arc(&from_to).is_some() {
            return Ok(None);
        }
        let arc = Arc {
            from_to,
            weight,
            element: None,
        };
        self.insert_arc(arc.clone());
        Ok(Some(arc))
    }

    /// Remove the arc from `source` to `target`, if there is one
    pub fn remove_arc(
        &mut self,
        source: &NodeKey,
        target: &NodeKey,
    ) -> Result<Option<Arc>, PetriNetError> {
        let from_to = self.validate_arc(source, target)?;
        Ok(self.discard_arc(&from_to))
    }

    /// Update the weight of an existing arc, returning `false` if there is no such arc
    pub fn set_arc_weight(
        &mut self,
        source: &NodeKey,
        target: &NodeKey,
        weight: u32,
    ) -> Result<bool, PetriNetError> {
        let from_to = self.validate_arc(source, target)?;
        if weight == 0 {
            return Err(PetriNetError::InvalidWeight(weight));
        }
        Ok(self.update_arc(&from_to, |arc| arc.weight = weight))
    }

    /// Get the arc with the given direction and endpoints
    pub fn arc(&self, from_to: &ArcType) -> Option<&Arc> {
        let place = self.places.get(from_to.place())?;
        let transition = from_to.transition().as_str();
        match from_to {
            ArcType::PlaceTransition(..) => place.core.outgoing_arcs.get(transition),
            ArcType::TransitionPlace(..) => place.core.incoming_arcs.get(transition),
        }
    }

    /// All arcs of this net
    pub fn arcs(&self) -> impl Iterator<Item = &Arc> {
        self.places.values().flat_map(|p| p.core.arcs())
    }

    pub(crate) fn insert_arc(&mut self, arc: Arc) {
        let (place_id, transition_id) = (arc.from_to.place(), arc.from_to.transition());
        let (place_key, transition_key) = (place_id.0.clone(), transition_id.0.clone());
        let outgoing_from_place = matches!(arc.from_to, ArcType::PlaceTransition(..));
        if let Some(t) = self.transitions.get_mut(transition_id) {
            let map = if outgoing_from_place {
                &mut t.core.incoming_arcs
            } else {
                &mut t.core.outgoing_arcs
            };
            map.insert(place_key, arc.clone());
        }
        if let Some(p) = self.places.get_mut(place_id) {
            let map = if outgoing_from_place {
                &mut p.core.outgoing_arcs
            } else {
                &mut p.core.incoming_arcs
            };
            map.insert(transition_key, arc);
        }
    }

    /// Remove the arc from both endpoints (without touching the document)
    fn take_arc(&mut self, from_to: &ArcType) -> Option<Arc> {
        let place_id = from_to.place();
        let transition_id = from_to.transition();
        let outgoing_from_place = matches!(from_to, ArcType::PlaceTransition(..));
        let from_transition = self.transitions.get_mut(transition_id).and_then(|t| {
            if outgoing_from_place {
                t.core.incoming_arcs.remove(place_id.as_str())
            } else {
                t.core.outgoing_arcs.remove(place_id.as_str())
            }
        });
        let from_place = self.places.get_mut(place_id).and_then(|p| {
            if outgoing_from_place {
                p.core.outgoing_arcs.remove(transition_id.as_str())
            } else {
                p.core.incoming_arcs.remove(transition_id.as_str())
            }
        });
        from_place.or(from_transition)
    }

    /// Remove the arc from both endpoints and its element from the document
    fn discard_arc(&mut self, from_to: &ArcType) -> Option<Arc> {
        let mut arc = self.take_arc(from_to)?;
        if let Some(el) = arc.element.take() {
            self.document.detach(el);
        }
        Some(arc)
    }

    /// Apply `f` to both stored copies of an arc
    pub(crate) fn update_arc(&mut self, from_to: &ArcType, f: impl FnOnce(&mut Arc)) -> bool {
        let Some(mut arc) = self.take_arc(from_to) else {
            return false;
        };
        f(&mut arc);
        self.insert_arc(arc);
        true
    }

    /// Transitions with an arc into the place
    pub fn preset_of_place(&self, p: &PlaceID) -> Vec<TransitionID> {
        sorted_neighbours(self.places.get(p).map(|p| &p.core.incoming_arcs))
            .map(TransitionID)
            .collect()
    }

    /// Transitions the place has an arc to
    pub fn postset_of_place(&self, p: &PlaceID) -> Vec<TransitionID> {
        sorted_neighbours(self.places.get(p).map(|p| &p.core.outgoing_arcs))
            .map(TransitionID)
            .collect()
    }

    /// Places with an arc into the transition
    pub fn preset_of_transition(&self, t: &TransitionID) -> Vec<PlaceID> {
        sorted_neighbours(self.transitions.get(t).map(|t| &t.core.incoming_arcs))
            .map(PlaceID)
            .collect()
    }

    /// Places the transition has an arc to
    pub fn postset_of_transition(&self, t: &TransitionID) -> Vec<PlaceID> {
        sorted_neighbours(self.transitions.get(t).map(|t| &t.core.outgoing_arcs))
            .map(PlaceID)
            .collect()
    }

    /// Encode this net as PNML document (see [`export_pnml::to_element_tree`])
    pub fn to_element_tree(&self) -> XmlTree {
        export_pnml::to_element_tree(self, &PnmlStyle::default())
    }

    /// Encode this net as PNML document using the given style
    pub fn to_element_tree_with_style(&self, style: &PnmlStyle) -> XmlTree {
        export_pnml::to_element_tree(self, style)
    }

    /// Export Petri net to a PNML file
    ///
    /// The PNML file is written to the specified filepath
    ///
    /// The resulting file can also be imported as a Petri net again (see [`PetriNet::from_pnml_file`]).
    pub fn to_pnml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PNMLWriteError> {
        export_pnml::export_petri_net_to_pnml_path(self, path)
    }

    /// Decode all nets of a PNML document (see [`import_pnml::from_element_tree`])
    pub fn from_element_tree(
        tree: &XmlTree,
        fallback_name: Option<&str>,
    ) -> Result<Vec<PetriNet>, PNMLParseError> {
        import_pnml::from_element_tree(tree, fallback_name)
    }

    /// Import all Petri nets of a PNML file
    ///
    /// The PNML file is read from the specified filepath. Nets without a
    /// declared name are named after the file.
    ///
    /// For the related export function, see [`PetriNet::to_pnml_file`])
    pub fn from_pnml_file<P: AsRef<Path>>(path: P) -> Result<Vec<PetriNet>, PNMLParseError> {
        import_pnml::import_pnml_from_path(path)
    }

    /// Import all Petri nets of a PNML document from a buffered reader
    pub fn from_pnml_reader<R: BufRead>(reader: R) -> Result<Vec<PetriNet>, PNMLParseError> {
        import_pnml::import_pnml_reader(reader)
    }

    /// Import all Petri nets of a file written by PIPE
    pub fn from_pipe_file<P: AsRef<Path>>(path: P) -> Result<Vec<PetriNet>, PNMLParseError> {
        let options = import_pnml::PnmlImportOptions {
            dialect: Dialect::Pipe,
            ..Default::default()
        };
        import_pnml::import_pnml_from_path_with_options(path, &options)
    }

    /// Export Petri net to a file in the PIPE dialect (without pages and references)
    pub fn to_pipe_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PNMLWriteError> {
        let options = export_pnml::PnmlExportOptions {
            dialect: Dialect::Pipe,
            ..Default::default()
        };
        export_pnml::export_petri_net_to_pnml_path_with_options(self, path, &options)
    }
}

fn sorted_neighbours(arcs: Option<&HashMap<String, Arc>>) -> impl Iterator<Item = String> {
    let mut ids: Vec<String> = arcs.into_iter().flat_map(|m| m.keys().cloned()).collect();
    ids.sort();
    ids.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_net() -> (PetriNet, PlaceID, TransitionID) {
        let mut net = PetriNet::new("T").unwrap();
        let p1 = net
            .try_add_place(Place::new("p1", PlaceType::Predicate).unwrap(), false)
            .unwrap();
        let t1 = net
            .try_add_transition(Transition::new("t1", TransitionType::Immediate).unwrap(), false)
            .unwrap();
        (net, p1, t1)
    }

    #[test]
    fn ids_are_type_prefixed() {
        let p = Place::new("pick up (left, right)", PlaceType::Action).unwrap();
        assert_eq!(p.id(), "a.pick_up___left__right__");
        assert_eq!(p.full_name(), "a.pick up (left, right)");
        let t = Transition::new("fire", TransitionType::Stochastic).unwrap();
        assert_eq!(t.id(), "s.fire");
        assert!(Place::new("  ", PlaceType::Task).is_err());
        assert_eq!(PetriNet::new("").unwrap_err(), PetriNetError::EmptyNetName);
    }

    #[test]
    fn prefixes_are_recognised() {
        assert_eq!(
            PlaceType::split_prefixed("action.x"),
            (Some(PlaceType::Action), "x")
        );
        assert_eq!(PlaceType::split_prefixed("a.x"), (Some(PlaceType::Action), "x"));
        assert_eq!(PlaceType::split_prefixed("t.x"), (Some(PlaceType::Task), "x"));
        assert_eq!(
            PlaceType::split_prefixed("generic.x"),
            (Some(PlaceType::Regular), "x")
        );
        assert_eq!(PlaceType::split_prefixed("x"), (None, "x"));
        assert_eq!(PlaceType::split_prefixed("ab"), (None, "ab"));
        assert_eq!(
            TransitionType::split_prefixed("timed_stochastic.x"),
            (Some(TransitionType::Stochastic), "x")
        );
        assert_eq!(
            TransitionType::from_type_name(" Immediate "),
            Some(TransitionType::Immediate)
        );
        assert_eq!(PlaceType::from_type_name("unknown"), None);
    }

    #[test]
    fn add_and_remove_place_cascades_arcs() {
        let (mut net, p1, t1) = sample_net();
        let arc = net
            .add_arc(&p1.clone().into(), &t1.clone().into(), Some(2))
            .unwrap()
            .unwrap();
        assert_eq!(arc.id(), "p.p1_i.t1");
        let t = net.transition(&t1).unwrap();
        assert_eq!(t.incoming_arcs()["p.p1"].weight, 2);
        assert_eq!(
            net.place(&p1).unwrap().outgoing_arcs()["i.t1"],
            t.incoming_arcs()["p.p1"]
        );

        let removed = net.remove_place(&p1).unwrap();
        assert!(removed.incoming_arcs().is_empty() && removed.outgoing_arcs().is_empty());
        assert!(net.transition(&t1).unwrap().incoming_arcs().is_empty());
        assert!(!net.places().contains_key(&p1));
        assert!(net.remove_place(&p1).is_none());
        assert_eq!(net.arcs().count(), 0);
    }

    #[test]
    fn add_then_remove_arc_restores_adjacency() {
        let (mut net, p1, t1) = sample_net();
        let before_p = net.place(&p1).unwrap().clone();
        let before_t = net.transition(&t1).unwrap().clone();
        net.add_arc(&t1.clone().into(), &p1.clone().into(), None)
            .unwrap();
        assert_eq!(net.preset_of_place(&p1), vec![t1.clone()]);
        assert_eq!(net.postset_of_transition(&t1), vec![p1.clone()]);
        let removed = net
            .remove_arc(&t1.clone().into(), &p1.clone().into())
            .unwrap();
        assert_eq!(removed.map(|a| a.weight), Some(1));
        assert_eq!(net.place(&p1).unwrap(), &before_p);
        assert_eq!(net.transition(&t1).unwrap(), &before_t);
    }

    #[test]
    fn readding_arc_keeps_weight() {
        let (mut net, p1, t1) = sample_net();
        let (p, t): (NodeKey, NodeKey) = (p1.clone().into(), t1.clone().into());
        assert!(net.add_arc(&p, &t, Some(2)).unwrap().is_some());
        assert!(net.add_arc(&p, &t, Some(5)).unwrap().is_none());
        assert_eq!(net.arcs().count(), 1);
        assert_eq!(
            net.arc(&ArcType::place_to_transition(p1, t1)).unwrap().weight,
            2
        );
        assert!(net.set_arc_weight(&p, &t, 7).unwrap());
        assert_eq!(net.arcs().next().unwrap().weight, 7);
        assert_eq!(
            net.add_arc(&p, &t, Some(0)),
            Err(PetriNetError::InvalidWeight(0))
        );
    }

    #[test]
    fn invalid_connections_are_errors() {
        let (mut net, p1, t1) = sample_net();
        let p2 = net
            .try_add_place(Place::new("p2", PlaceType::Action).unwrap(), false)
            .unwrap();
        let places_before = net.places().clone();
        let transitions_before = net.transitions().clone();

        let res = net.add_arc(&p1.clone().into(), &p2.clone().into(), None);
        assert!(matches!(
            res,
            Err(PetriNetError::InvalidConnection { .. })
        ));
        assert!(matches!(
            net.remove_arc(&t1.clone().into(), &t1.clone().into()),
            Err(PetriNetError::InvalidConnection { .. })
        ));
        let unknown = NodeKey::Transition(TransitionID("i.nope".into()));
        assert_eq!(
            net.add_arc(&p1.clone().into(), &unknown, None),
            Err(PetriNetError::UnknownNode(unknown))
        );
        assert_eq!(net.places(), &places_before);
        assert_eq!(net.transitions(), &transitions_before);
    }

    #[test]
    fn duplicate_places_are_rejected_or_overwritten() {
        let (mut net, p1, t1) = sample_net();
        net.add_arc(&p1.clone().into(), &t1.clone().into(), None)
            .unwrap();
        let dup = Place::new("p1", PlaceType::Predicate)
            .unwrap()
            .with_init_marking(4);
        let rejected = net.try_add_place(dup, false).unwrap_err();
        assert_eq!(rejected.properties.init_marking, 4);
        assert!(net.add_place(rejected, true));
        assert_eq!(net.place(&p1).unwrap().properties.init_marking, 4);
        // no stale arcs of the overwritten place
        assert!(net.transition(&t1).unwrap().incoming_arcs().is_empty());
        assert!(net.place(&p1).unwrap().outgoing_arcs().is_empty());
    }

    #[test]
    fn rename_migrates_arcs() {
        let (mut net, p1, t1) = sample_net();
        net.add_arc(&p1.clone().into(), &t1.clone().into(), Some(3))
            .unwrap();
        net.add_arc(&t1.clone().into(), &p1.clone().into(), None)
            .unwrap();
        assert!(net.rename_place(&p1, "buffer full").unwrap());
        let new_id = PlaceID("p.buffer_full".into());
        assert!(!net.places().contains_key(&p1));
        let place = net.place(&new_id).unwrap();
        assert_eq!(place.name(), "buffer full");
        assert_eq!(place.outgoing_arcs()["i.t1"].weight, 3);
        let t = net.transition(&t1).unwrap();
        assert_eq!(t.incoming_arcs()["p.buffer_full"].weight, 3);
        assert!(t.outgoing_arcs().contains_key("p.buffer_full"));
        assert!(!t.incoming_arcs().contains_key("p.p1"));

        assert!(net.rename_transition(&t1, "go").unwrap());
        let t2 = TransitionID("i.go".into());
        assert_eq!(net.preset_of_transition(&t2), vec![new_id.clone()]);
        assert_eq!(net.postset_of_place(&new_id), vec![t2]);
    }

    #[test]
    fn rename_collision_changes_nothing() {
        let (mut net, p1, t1) = sample_net();
        let p2 = net
            .try_add_place(Place::new("p2", PlaceType::Predicate).unwrap(), false)
            .unwrap();
        net.add_arc(&p1.clone().into(), &t1.clone().into(), Some(2))
            .unwrap();
        let before = net.place(&p1).unwrap().clone();
        assert!(!net.rename_place(&p1, "p2").unwrap());
        assert_eq!(net.place(&p1).unwrap(), &before);
        assert!(net.place(&p2).unwrap().incoming_arcs().is_empty());
        assert_eq!(
            net.transition(&t1).unwrap().incoming_arcs()["p.p1"].weight,
            2
        );
        assert_eq!(net.rename_place(&p1, ""), Err(PetriNetError::EmptyName));
        assert!(matches!(
            net.rename_place(&PlaceID("p.x".into()), "y"),
            Err(PetriNetError::PlaceNotFound(_))
        ));
    }

    #[test]
    fn other_endpoint() {
        let from_to = ArcType::place_to_transition(PlaceID("p.a".into()), TransitionID("i.b".into()));
        let p: NodeKey = PlaceID("p.a".into()).into();
        let t: NodeKey = TransitionID("i.b".into()).into();
        assert_eq!(from_to.other_endpoint(&p), Some(t.clone()));
        assert_eq!(from_to.other_endpoint(&t), Some(p.clone()));
        assert_eq!(from_to.source(), p);
        assert_eq!(from_to.target(), t);
        assert_eq!(
            from_to.other_endpoint(&NodeKey::Place(PlaceID("p.c".into()))),
            None
        );
    }

    #[test]
    fn names_are_trimmed() {
        let p = Place::new(" x ", PlaceType::Predicate).unwrap();
        assert_eq!(p.id(), "p.x");
        assert_eq!(p.name(), "x");
        let (mut net, p1, _) = sample_net();
        assert!(net.rename_place(&p1, " moved\t").unwrap());
        let moved = PlaceID("p.moved".into());
        assert_eq!(net.place(&moved).unwrap().name(), "moved");
        // a padded variant of the same name keeps the id
        assert!(net.rename_place(&moved, "moved  ").unwrap());
        assert!(net.place(&moved).is_some());
        assert_eq!(PetriNet::new(" T ").unwrap().name(), "T");
        net.set_name("\nnet").unwrap();
        assert_eq!(net.name(), "net");
    }

    #[test]
    fn scale_must_be_positive() {
        let (mut net, _, _) = sample_net();
        assert_eq!(net.set_scale(0.0), Err(PetriNetError::InvalidScale(0.0)));
        assert!(net.set_scale(-1.5).is_err());
        assert!(net.set_scale(f64::NAN).is_err());
        assert_eq!(net.scale(), 1.0);
        net.set_scale(1.5).unwrap();
        assert_eq!(net.scale(), 1.5);
        let t = Transition::new("t", TransitionType::Immediate).unwrap();
        assert_eq!(t.properties.priority.get(), 1);
    }
}
