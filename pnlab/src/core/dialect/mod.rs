//! Conversion between PNML dialects
//!
//! The codec only understands the PNLab layout of PNML. Documents written by
//! other editors are converted to it before decoding (and back after encoding).
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::xml::XmlTree;

pub mod pipe;

pub use pipe::PipeDialect;

///
/// Error encountered while converting a document between dialects
///
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialectError {
    /// The document root is not `pnml`
    #[error("cannot convert document with root <{0}>")]
    UnexpectedRoot(String),
    /// A required attribute is missing on a net element
    #[error("cannot convert element without {0} attribute")]
    MissingAttribute(&'static str),
    /// Unknown dialect name
    #[error("unknown dialect {0:?} (expected pnlab or pipe)")]
    UnknownDialect(String),
}

///
/// Pure conversion of a whole document from and to the PNLab layout
///
/// Both directions take the namespace-stripped tree and return a new tree.
///
pub trait DialectConverter: std::fmt::Debug {
    /// Convert a document of this dialect to the PNLab layout
    fn to_canonical(&self, tree: &XmlTree) -> Result<XmlTree, DialectError>;
    /// Convert a document in PNLab layout to this dialect
    fn from_canonical(&self, tree: &XmlTree) -> Result<XmlTree, DialectError>;
}

/// The PNLab layout itself
#[derive(Debug, Clone, Copy, Default)]
pub struct PnLabDialect;

impl DialectConverter for PnLabDialect {
    fn to_canonical(&self, tree: &XmlTree) -> Result<XmlTree, DialectError> {
        Ok(tree.clone())
    }

    fn from_canonical(&self, tree: &XmlTree) -> Result<XmlTree, DialectError> {
        Ok(tree.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Supported PNML dialects
pub enum Dialect {
    /// PNLab layout (`text` children, `toolspecific` blocks, pages)
    #[default]
    PnLab,
    /// Platform Independent Petri net Editor (`value` children, no pages)
    Pipe,
}

impl Dialect {
    /// Converter for this dialect
    pub fn converter(&self) -> &'static dyn DialectConverter {
        match self {
            Dialect::PnLab => &PnLabDialect,
            Dialect::Pipe => &PipeDialect,
        }
    }

    /// Name of the dialect, as accepted by [`Dialect::from_str`]
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::PnLab => "pnlab",
            Dialect::Pipe => "pipe",
        }
    }
}

impl FromStr for Dialect {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pnlab" | "pnml" => Ok(Dialect::PnLab),
            "pipe" => Ok(Dialect::Pipe),
            _ => Err(DialectError::UnknownDialect(s.to_string())),
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fail unless the root of `tree` is `pnml`
pub(crate) fn expect_pnml_root(tree: &XmlTree) -> Result<(), DialectError> {
    let tag = tree.tag(tree.root());
    if tag == "pnml" {
        Ok(())
    } else {
        Err(DialectError::UnexpectedRoot(tag.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_names() {
        assert_eq!("PIPE".parse::<Dialect>(), Ok(Dialect::Pipe));
        assert_eq!("pnml".parse::<Dialect>(), Ok(Dialect::PnLab));
        assert!(matches!(
            "tina".parse::<Dialect>(),
            Err(DialectError::UnknownDialect(_))
        ));
        assert_eq!(Dialect::default().to_string(), "pnlab");
        assert_eq!(
            serde_json::to_string(&Dialect::Pipe).unwrap(),
            "\"pipe\""
        );
    }

    #[test]
    fn identity_conversion() {
        let tree = XmlTree::new("pnml");
        let converter = Dialect::PnLab.converter();
        assert_eq!(converter.to_canonical(&tree).unwrap(), tree);
        assert_eq!(converter.from_canonical(&tree).unwrap(), tree);
    }
}
