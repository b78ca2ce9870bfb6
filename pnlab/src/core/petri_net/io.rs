//! IO implementations for `PetriNet`

use std::io::{BufReader, Read, Write};

use log::warn;
use thiserror::Error;

use crate::core::dialect::Dialect;
use crate::core::io::{Exportable, ExtensionWithMime, Importable};
use crate::core::petri_net::pnml::{
    export_pnml_to_writer, import_pnml_reader_with_options, PNMLParseError, PNMLWriteError,
    PnmlExportOptions, PnmlImportOptions,
};
use crate::core::petri_net::PetriNet;

/// Error type for `PetriNet` IO operations
#[derive(Debug, Error)]
pub enum PetriNetIOError {
    /// IO Error
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// PNML Parsing Error
    #[error("PNML Error: {0}")]
    Pnml(#[from] PNMLParseError),
    /// PNML Writing Error
    #[error("PNML Error: {0}")]
    Write(#[from] PNMLWriteError),
    /// The document does not contain any net
    #[error("document does not contain a net")]
    NoNet,
    /// Unsupported Format
    #[error("Unsupported Format: {0}")]
    UnsupportedFormat(String),
}

/// Dialect of a format name, `None` if unsupported
fn dialect_of_format(format: &str) -> Option<Dialect> {
    let format = format.trim_start_matches('.').to_ascii_lowercase();
    match format.as_str() {
        "pnml" | "pnml.xml" => Some(Dialect::PnLab),
        "pipe" => Some(Dialect::Pipe),
        _ => None,
    }
}

impl Importable for PetriNet {
    type Error = PetriNetIOError;
    type ImportOptions = PnmlImportOptions;

    /// Import the first net of the document
    ///
    /// The `pipe` format overrides the dialect of `options`.
    fn import_from_reader_with_options<R: Read>(
        reader: R,
        format: &str,
        options: Self::ImportOptions,
    ) -> Result<Self, Self::Error> {
        let dialect = dialect_of_format(format)
            .ok_or_else(|| PetriNetIOError::UnsupportedFormat(format.to_string()))?;
        let mut options = options;
        if dialect == Dialect::Pipe {
            options.dialect = dialect;
        }
        let mut nets = import_pnml_reader_with_options(BufReader::new(reader), &options)?;
        if nets.len() > 1 {
            warn!(
                "Document contains {} nets, only importing the first",
                nets.len()
            );
        }
        if nets.is_empty() {
            return Err(PetriNetIOError::NoNet);
        }
        Ok(nets.swap_remove(0))
    }

    fn known_import_formats() -> Vec<ExtensionWithMime> {
        vec![
            ExtensionWithMime::new("pnml", "text/plain"),
            ExtensionWithMime::new("pipe", "application/xml"),
        ]
    }
}

impl Exportable for PetriNet {
    type Error = PetriNetIOError;
    type ExportOptions = PnmlExportOptions;

    fn export_to_writer_with_options<W: Write>(
        &self,
        writer: W,
        format: &str,
        options: Self::ExportOptions,
    ) -> Result<(), Self::Error> {
        let dialect = dialect_of_format(format)
            .ok_or_else(|| PetriNetIOError::UnsupportedFormat(format.to_string()))?;
        let mut options = options;
        if dialect == Dialect::Pipe {
            options.dialect = dialect;
        }
        export_pnml_to_writer(self, writer, &options)?;
        Ok(())
    }

    fn known_export_formats() -> Vec<ExtensionWithMime> {
        vec![
            ExtensionWithMime::new("pnml", "text/plain"),
            ExtensionWithMime::new("pipe", "application/xml"),
        ]
    }
}
