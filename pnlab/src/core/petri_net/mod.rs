//! Petri nets
//!
//! The graph model ([`PetriNet`], [`Place`], [`Transition`], [`Arc`]) and
//! its PNML codec.
pub(crate) mod petri_net_struct;
pub use petri_net_struct::*;
pub mod io;
pub mod json;
pub mod macros;
pub mod pnml;

#[cfg(test)]
mod tests;
