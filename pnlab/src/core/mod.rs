//! Core modules: XML tree, Petri nets and PNML dialects

pub mod dialect;

/// IO Traits
pub mod io;

pub mod petri_net;
pub mod xml;

pub use petri_net::PetriNet;
pub use xml::XmlTree;
