use super::*;
use crate::utils::test_utils::get_test_data_path;

mod pnml_round_trip_tests;

/// Both stored copies of every arc agree and all endpoints are part of the net
fn assert_consistent(net: &PetriNet) {
    for (id, place) in &net.places {
        assert_eq!(id.as_str(), place.id());
        for (t, arc) in &place.core.outgoing_arcs {
            let transition = &net.transitions[&TransitionID(t.clone())];
            assert_eq!(transition.core.incoming_arcs.get(id.as_str()), Some(arc));
            assert_eq!(arc.from_to, ArcType::PlaceTransition(id.clone(), TransitionID(t.clone())));
        }
        for (t, arc) in &place.core.incoming_arcs {
            let transition = &net.transitions[&TransitionID(t.clone())];
            assert_eq!(transition.core.outgoing_arcs.get(id.as_str()), Some(arc));
            assert!(arc.weight > 0);
        }
    }
    for (id, transition) in &net.transitions {
        assert_eq!(id.as_str(), transition.id());
        for p in transition
            .core
            .incoming_arcs
            .keys()
            .chain(transition.core.outgoing_arcs.keys())
        {
            assert!(net.places.contains_key(&PlaceID(p.clone())));
        }
    }
}

fn load_sample() -> PetriNet {
    let path = get_test_data_path()
        .join("petri-net")
        .join("pnlab-sample.pnml");
    PetriNet::from_pnml_file(path).unwrap().remove(0)
}

#[test]
fn editing_keeps_net_consistent() {
    let mut net = load_sample();
    assert_consistent(&net);

    let brew = TransitionID("i.brew".into());
    let ready = PlaceID("p.ready".into());
    let cup = PlaceID("a.fill_cup".into());
    assert!(net.rename_transition(&brew, "brew coffee").unwrap());
    assert_consistent(&net);
    let brew = TransitionID("i.brew_coffee".into());
    assert_eq!(
        net.arc(&ArcType::PlaceTransition(ready.clone(), brew.clone()))
            .map(|a| a.weight),
        Some(2)
    );

    let extra = net
        .try_add_place(Place::new("extra", PlaceType::Regular).unwrap(), false)
        .unwrap();
    net.add_arc(&brew.clone().into(), &extra.clone().into(), Some(4))
        .unwrap()
        .unwrap();
    assert_consistent(&net);

    // overwrite drops all arcs of the replaced place
    assert!(net.add_place(Place::new("fill cup", PlaceType::Action).unwrap(), true));
    assert_consistent(&net);
    assert!(net.preset_of_place(&cup).is_empty());
    assert!(net.postset_of_place(&cup).is_empty());

    net.remove_transition(&brew).unwrap();
    assert_consistent(&net);
    assert!(net.preset_of_place(&extra).is_empty());
    assert_eq!(net.arcs().count(), 1);
}

#[test]
fn invalid_arcs_are_rejected() {
    let mut net = load_sample();
    let ready: NodeKey = PlaceID("p.ready".into()).into();
    let cup: NodeKey = PlaceID("a.fill_cup".into()).into();
    let ghost: NodeKey = TransitionID("i.ghost".into()).into();
    let arcs = net.arcs().count();
    assert_eq!(
        net.add_arc(&ready, &cup, None),
        Err(PetriNetError::InvalidConnection {
            from: ready.clone(),
            to: cup.clone()
        })
    );
    assert_eq!(
        net.add_arc(&ready, &ghost, None),
        Err(PetriNetError::UnknownNode(ghost.clone()))
    );
    let serve: NodeKey = TransitionID("s.serve".into()).into();
    assert_eq!(
        net.add_arc(&serve, &ready, Some(0)),
        Err(PetriNetError::InvalidWeight(0))
    );
    // already connected
    assert_eq!(net.add_arc(&serve, &ready, Some(7)), Ok(None));
    assert_eq!(net.arcs().count(), arcs);
    assert_consistent(&net);
}
