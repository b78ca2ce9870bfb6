//! Convenient Macros for creating Petri nets
use super::{NodeKey, PetriNet, PetriNetError, Place, PlaceType, Transition, TransitionType};

///
/// Creates a [`PetriNet`](crate::core::petri_net::PetriNet).
///
/// Every group `(a, b ; c)` adds a place with arcs from the immediate
/// transitions `a` and `b` and an arc to the immediate transition `c`.
/// Transitions with the same label are shared between groups.
///
/// # Examples
///
/// ```rust
/// use pnlab::petri_net;
/// let petri_net = petri_net!("Example"; ("a", "b", "c"; "c", "d"), ("f"; "e", "g")).unwrap();
/// assert_eq!(petri_net.places().len(), 2);
/// assert_eq!(petri_net.transitions().len(), 7);
/// ```
#[macro_export]
macro_rules! petri_net {
    ( $name:expr; $( ($($x:expr),* ; $($y:expr),* ) ),* $(,)? ) => {
        $crate::core::petri_net::macros::build_from_groups(
            $name,
            &[ $( (
                vec![$($x.to_string()),*],
                vec![$($y.to_string()),*],
            ) ),* ],
        )
    };
}

#[doc(hidden)]
pub fn build_from_groups(
    name: &str,
    groups: &[(Vec<String>, Vec<String>)],
) -> Result<PetriNet, PetriNetError> {
    let mut result = PetriNet::new(name)?;
    for (counter, (inputs, outputs)) in groups.iter().enumerate() {
        let place = Place::new(format!("p_{}", counter + 1), PlaceType::Predicate)?;
        let place = match result.try_add_place(place, false) {
            Ok(id) => NodeKey::Place(id),
            Err(existing) => return Err(PetriNetError::DuplicateNode(existing.place_id().into())),
        };
        for (labels, incoming) in [(inputs, true), (outputs, false)] {
            for label in labels {
                let transition = Transition::new(label.as_str(), TransitionType::Immediate)?;
                let transition = NodeKey::Transition(
                    match result.try_add_transition(transition, false) {
                        Ok(id) => id,
                        Err(existing) => existing.transition_id(),
                    },
                );
                if incoming {
                    result.add_arc(&transition, &place, None)?;
                } else {
                    result.add_arc(&place, &transition, None)?;
                }
            }
        }
    }
    Ok(result)
}
