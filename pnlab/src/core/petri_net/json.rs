//! JSON (serde) snapshot of a [`PetriNet`]
//!
//! The snapshot holds the graph and all node properties. The PNML document
//! backing a net is not part of it: a deserialized net starts from a fresh one.
use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::{
    Arc, Node, PetriNet, PetriNetError, Place, PlaceProperties, PlaceType, Transition,
    TransitionProperties, TransitionType,
};

/// Error of [`json_to_petrinet`]
#[derive(Debug, Error)]
pub enum PetriNetJsonError {
    /// Invalid JSON (or JSON not shaped like a [`PetriNetSnapshot`])
    #[error("invalid Petri net JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The snapshot violates a graph invariant
    #[error(transparent)]
    Model(#[from] PetriNetError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Place of a [`PetriNetSnapshot`]
pub struct PlaceSnapshot {
    /// Name without type prefix
    pub name: String,
    /// Place type
    #[serde(rename = "type", default)]
    pub place_type: PlaceType,
    /// Place properties
    #[serde(flatten)]
    pub properties: PlaceProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Transition of a [`PetriNetSnapshot`]
pub struct TransitionSnapshot {
    /// Name without type prefix
    pub name: String,
    /// Transition type
    #[serde(rename = "type", default)]
    pub transition_type: TransitionType,
    /// Transition properties
    #[serde(flatten)]
    pub properties: TransitionProperties,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Serializable form of a [`PetriNet`], with nodes and arcs sorted by id
pub struct PetriNetSnapshot {
    /// Net name
    pub name: String,
    /// Net scale
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Places
    #[serde(default)]
    pub places: Vec<PlaceSnapshot>,
    /// Transitions
    #[serde(default)]
    pub transitions: Vec<TransitionSnapshot>,
    /// Arcs
    #[serde(default)]
    pub arcs: Vec<Arc>,
}

impl From<&PetriNet> for PetriNetSnapshot {
    fn from(net: &PetriNet) -> Self {
        Self {
            name: net.name.clone(),
            scale: net.scale,
            places: net
                .places
                .values()
                .sorted_by(|a, b| a.id().cmp(b.id()))
                .map(|p| PlaceSnapshot {
                    name: p.name().to_string(),
                    place_type: p.node_type(),
                    properties: p.properties.clone(),
                })
                .collect(),
            transitions: net
                .transitions
                .values()
                .sorted_by(|a, b| a.id().cmp(b.id()))
                .map(|t| TransitionSnapshot {
                    name: t.name().to_string(),
                    transition_type: t.node_type(),
                    properties: t.properties.clone(),
                })
                .collect(),
            arcs: net
                .arcs()
                .sorted_by(|a, b| a.from_to.cmp(&b.from_to))
                .map(|a| Arc {
                    element: None,
                    ..a.clone()
                })
                .collect(),
        }
    }
}

impl TryFrom<PetriNetSnapshot> for PetriNet {
    type Error = PetriNetError;

    fn try_from(snapshot: PetriNetSnapshot) -> Result<Self, Self::Error> {
        let mut net = PetriNet::new(snapshot.name)?;
        net.set_scale(snapshot.scale)?;
        for p in snapshot.places {
            let mut place = Place::new(p.name, p.place_type)?;
            place.properties = p.properties;
            net.try_add_place(place, false)
                .map_err(|rejected| PetriNetError::DuplicateNode(rejected.key()))?;
        }
        for t in snapshot.transitions {
            let mut transition = Transition::new(t.name, t.transition_type)?;
            transition.properties = t.properties;
            net.try_add_transition(transition, false)
                .map_err(|rejected| PetriNetError::DuplicateNode(rejected.key()))?;
        }
        for arc in snapshot.arcs {
            let (source, target) = (arc.from_to.source(), arc.from_to.target());
            if net.add_arc(&source, &target, Some(arc.weight))?.is_none() {
                warn!("Ignoring duplicate arc from {source} to {target}");
            }
        }
        Ok(net)
    }
}

impl Serialize for PetriNet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PetriNetSnapshot::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PetriNet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshot = PetriNetSnapshot::deserialize(deserializer)?;
        PetriNet::try_from(snapshot).map_err(serde::de::Error::custom)
    }
}

///
/// Serialize a [`PetriNet`] as a JSON [`String`]
///
pub fn petrinet_to_json(net: &PetriNet) -> Result<String, serde_json::Error> {
    serde_json::to_string(net)
}

///
/// Deserialize a [`PetriNet`] from a JSON [`String`]
///
pub fn json_to_petrinet(net_json: &str) -> Result<PetriNet, PetriNetJsonError> {
    let snapshot: PetriNetSnapshot = serde_json::from_str(net_json)?;
    Ok(PetriNet::try_from(snapshot)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::petri_net::{NodeKey, PlaceID};
    use crate::utils::test_utils::get_test_data_path;

    #[test]
    fn json_round_trip() {
        let path = get_test_data_path()
            .join("petri-net")
            .join("pnlab-sample.pnml");
        let net = PetriNet::from_pnml_file(path).unwrap().remove(0);
        let json = petrinet_to_json(&net).unwrap();
        let back = json_to_petrinet(&json).unwrap();
        assert_eq!(PetriNetSnapshot::from(&back), PetriNetSnapshot::from(&net));
        assert!(back.places().values().all(|p| !p.has_tree_element()));
        assert!(back.arcs().all(|a| !a.has_tree_element()));
        // no references to the old document
        let tree = back.to_element_tree();
        assert!(tree.find(tree.root(), "net/page/page").is_none());
    }

    #[test]
    fn duplicate_nodes_are_rejected() {
        let json = r#"{
            "name": "dup",
            "places": [
                {"name": "x", "type": "task", "init_marking": 1},
                {"name": "x", "type": "task"}
            ]
        }"#;
        match json_to_petrinet(json) {
            Err(PetriNetJsonError::Model(PetriNetError::DuplicateNode(key))) => {
                assert_eq!(key, NodeKey::Place(PlaceID("t.x".into())))
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn arcs_are_validated() {
        let json = r#"{
            "name": "bad",
            "places": [{"name": "x"}],
            "arcs": [{"from_to": {"type": "PlaceTransition", "nodes": ["p.x", "i.y"]}, "weight": 1}]
        }"#;
        assert!(matches!(
            json_to_petrinet(json),
            Err(PetriNetJsonError::Model(PetriNetError::UnknownNode(_)))
        ));
    }

    #[test]
    fn invalid_priority_and_scale_are_rejected() {
        let json = r#"{"name": "bad", "transitions": [{"name": "t", "priority": 0}]}"#;
        assert!(matches!(
            json_to_petrinet(json),
            Err(PetriNetJsonError::Json(_))
        ));
        let json = r#"{"name": "bad", "scale": 0.0}"#;
        assert!(matches!(
            json_to_petrinet(json),
            Err(PetriNetJsonError::Model(PetriNetError::InvalidScale(_)))
        ));
    }
}
