use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{ElementId, XmlError, XmlTree};

fn write_element<W: Write>(
    tree: &XmlTree,
    el: ElementId,
    writer: &mut Writer<W>,
) -> Result<(), XmlError> {
    let mut start = BytesStart::new(tree.tag(el));
    for (key, value) in tree.attributes(el) {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    let text = tree.text(el).filter(|t| !t.is_empty());
    if text.is_none() && tree.children(el).is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    if let Some(text) = text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in tree.children(el) {
        write_element(tree, *child, writer)?;
    }
    writer.write_event(Event::End(BytesEnd::new(tree.tag(el))))?;
    Ok(())
}

///
/// Serialize an [`XmlTree`] as UTF-8 XML (with XML declaration)
///
/// `indent` is the number of spaces used per nesting level, `0` disables
/// pretty-printing.
///
pub fn write_xml<W: Write>(tree: &XmlTree, writer: W, indent: usize) -> Result<(), XmlError> {
    let mut writer = if indent > 0 {
        Writer::new_with_indent(writer, b' ', indent)
    } else {
        Writer::new(writer)
    };
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(tree, tree.root(), &mut writer)?;
    writer.into_inner().flush()?;
    Ok(())
}

/// Serialize an [`XmlTree`] into a byte vector
pub fn write_xml_to_vec(tree: &XmlTree, indent: usize) -> Result<Vec<u8>, XmlError> {
    let mut out = Vec::new();
    write_xml(tree, &mut out, indent)?;
    Ok(out)
}

/// Serialize an [`XmlTree`] into the file at the given path
pub fn write_xml_file<P: AsRef<Path>>(
    tree: &XmlTree,
    path: P,
    indent: usize,
) -> Result<(), XmlError> {
    let file = File::create(path)?;
    write_xml(tree, BufWriter::new(file), indent)
}
