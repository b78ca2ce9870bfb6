//! PNML File Format for Petri nets
//!
//! Decoding keeps the parsed document alongside the net, so that encoding can
//! merge changes into the original elements instead of writing a new file.
pub mod document;
pub(crate) mod export_pnml;
pub(crate) mod import_pnml;
/// Presentation settings of encoded documents
pub mod style;

#[doc(inline)]
pub use export_pnml::*;
#[doc(inline)]
pub use import_pnml::*;
#[doc(inline)]
pub use style::PnmlStyle;
