#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]

#![allow(clippy::needless_doctest_main)]

#![doc = include_str!("../README.md")]

pub mod core;


#[doc(inline)]
pub use crate::core::petri_net::PetriNet;

#[doc(inline)]
pub use crate::core::petri_net::{
    Arc, ArcType, Node, NodeKey, NodeType, PetriNetError, Place, PlaceID, PlaceType, Position,
    Transition, TransitionID, TransitionType,
};

#[doc(inline)]
pub use crate::core::io::{Exportable, Importable};

#[doc(inline)]
pub use crate::core::dialect::{Dialect, DialectConverter};

#[doc(inline)]
pub use crate::core::petri_net::json::{json_to_petrinet, petrinet_to_json};

#[doc(inline)]
pub use crate::core::petri_net::pnml::{
    export_petri_net_to_pnml, import_pnml_from_path, import_pnml_reader, PNMLParseError,
    PNMLWriteError, PnmlExportOptions, PnmlImportOptions, PnmlStyle,
};

#[doc(inline)]
pub use crate::core::xml::XmlTree;
