use std::collections::BTreeSet;

use super::{assert_consistent, load_sample};
use crate::core::petri_net::pnml::{from_element_tree, PnmlStyle};
use crate::core::petri_net::*;
use crate::core::xml::{reader::parse_xml_slice, writer::write_xml_to_vec};

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
fn encoding_is_a_fixpoint() {
    let net = load_sample();
    let first = net.to_element_tree();
    let decoded = from_element_tree(&first, None).unwrap().remove(0);
    assert_consistent(&decoded);
    assert_eq!(decoded.to_element_tree(), first);
}

#[test]
fn edits_survive_serialization() {
    let mut net = load_sample();
    let serve = TransitionID("s.serve".into());
    let ready = PlaceID("p.ready".into());
    net.transition_mut(&serve).unwrap().rate = 0.75;
    net.place_mut(&ready).unwrap().init_marking = 4;
    net.set_arc_weight(&serve.clone().into(), &ready.clone().into(), 3)
        .unwrap();
    let waiting = net
        .try_add_place(
            Place::new("waiting", PlaceType::Task)
                .unwrap()
                .with_position(5.0, 6.0),
            false,
        )
        .unwrap();
    net.add_arc(&serve.clone().into(), &waiting.clone().into(), None)
        .unwrap();
    net.set_scale(2.0).unwrap();

    let bytes = write_xml_to_vec(&net.to_element_tree(), 2).unwrap();
    let tree = parse_xml_slice(&bytes).unwrap();
    // new elements go to the first page
    let top = tree.find(tree.root(), "net/page[@id='top']").unwrap();
    assert!(tree.find(top, "place[@id='t.waiting']").is_some());

    let back = from_element_tree(&tree, None).unwrap().remove(0);
    assert_eq!(arc_triples(&back), arc_triples(&net));
    assert_eq!(back.transition(&serve).unwrap().properties.rate, 0.75);
    assert_eq!(back.place(&ready).unwrap().properties.init_marking, 4);
    assert_eq!(
        back.place(&waiting).unwrap().properties.position,
        Position::new(5.0, 6.0)
    );
    assert_eq!(back.scale(), 2.0);
}

#[test]
fn label_offsets_of_loaded_nodes_can_be_kept() {
    let net = load_sample();
    let style = PnmlStyle {
        update_label_offset: false,
        place_label_padding: 99.0,
        ..Default::default()
    };
    let tree = net.to_element_tree_with_style(&style);
    let offset = tree
        .find(tree.root(), "net/page/place[@id='p.ready']/name/graphics/offset")
        .unwrap();
    assert_eq!(tree.attribute(offset, "y"), Some("40.0"));

    let mut fresh = PetriNet::new("fresh").unwrap();
    fresh.add_place(Place::new("a", PlaceType::Predicate).unwrap(), false);
    let tree = fresh.to_element_tree_with_style(&style);
    let offset = tree
        .find(tree.root(), "net/page/place/name/graphics/offset")
        .unwrap();
    assert_eq!(tree.attribute(offset, "y"), Some("99.0"));
}

#[test]
fn padded_names_keep_their_ids() {
    let mut net = PetriNet::new(" padded ").unwrap();
    let p = net
        .try_add_place(Place::new("x ", PlaceType::Predicate).unwrap(), false)
        .unwrap();
    let t = net
        .try_add_transition(Transition::new("\tgo", TransitionType::Immediate).unwrap(), false)
        .unwrap();
    net.add_arc(&p.clone().into(), &t.clone().into(), None).unwrap();
    let back = from_element_tree(&net.to_element_tree(), None)
        .unwrap()
        .remove(0);
    assert_eq!(back.name(), net.name());
    assert!(back.places().contains_key(&p));
    assert!(back.transitions().contains_key(&t));
    assert_eq!(arc_triples(&back), arc_triples(&net));
}

const ALIASED_PAGES: &str = r#"<pnml><net id="n">
    <page id="top"><place id="p.a"/><transition id="i.t"/>
        <page id="sub">
            <referencePlace id="r" ref="p.a"/>
            <arc id="x" source="r" target="i.t"/>
        </page>
    </page>
</net></pnml>"#;

#[test]
fn arcs_through_aliases_keep_the_alias() {
    let net = from_element_tree(&parse_xml_slice(ALIASED_PAGES.as_bytes()).unwrap(), None)
        .unwrap()
        .remove(0);
    let tree = net.to_element_tree();
    let sub = tree.find(tree.root(), "net/page/page[@id='sub']").unwrap();
    let arc = tree.find(sub, "arc").unwrap();
    assert_eq!(tree.attribute(arc, "source"), Some("r"));
    assert_eq!(tree.attribute(arc, "target"), Some("i.t"));
    assert_eq!(tree.attribute(arc, "id"), Some("p.a_i.t"));

    let back = from_element_tree(&tree, None).unwrap().remove(0);
    assert_consistent(&back);
    assert_eq!(arc_triples(&back), arc_triples(&net));
}

#[test]
fn arcs_through_aliases_follow_renames() {
    let mut net = from_element_tree(&parse_xml_slice(ALIASED_PAGES.as_bytes()).unwrap(), None)
        .unwrap()
        .remove(0);
    assert!(net.rename_place(&PlaceID("p.a".into()), "b").unwrap());
    let tree = net.to_element_tree();
    let sub = tree.find(tree.root(), "net/page/page[@id='sub']").unwrap();
    let alias = tree.find(sub, "referencePlace").unwrap();
    assert_eq!(tree.attribute(alias, "ref"), Some("p.b"));
    let arc = tree.find(sub, "arc").unwrap();
    assert_eq!(tree.attribute(arc, "source"), Some("r"));

    let back = from_element_tree(&tree, None).unwrap().remove(0);
    assert_eq!(arc_triples(&back), arc_triples(&net));
}
