use std::io::BufRead;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{ElementId, XmlError, XmlTree};

fn read_to_string(x: &[u8]) -> String {
    String::from_utf8_lossy(x).to_string()
}

fn start_element(
    tree: &mut Option<XmlTree>,
    stack: &[ElementId],
    b: &BytesStart<'_>,
) -> Result<ElementId, XmlError> {
    let tag = read_to_string(b.name().as_ref());
    let mut attributes = Vec::new();
    for attr in b.attributes() {
        let attr = attr?;
        attributes.push((
            read_to_string(attr.key.as_ref()),
            attr.unescape_value()?.to_string(),
        ));
    }
    let el = match (tree.as_mut(), stack.last()) {
        (Some(tree), Some(parent)) => tree.append_element(*parent, &tag),
        (Some(_), None) => return Err(XmlError::Malformed("more than one root element")),
        (None, _) => {
            let new_tree = XmlTree::new(&tag);
            let root = new_tree.root();
            *tree = Some(new_tree);
            root
        }
    };
    if let Some(tree) = tree.as_mut() {
        tree.replace_attributes(el, attributes);
    }
    Ok(el)
}

///
/// Parse an [`XmlTree`] from the given XML reader ([`quick_xml::Reader`])
///
/// Leading and trailing whitespace of text content is trimmed.
/// Comments, processing instructions and the XML declaration are skipped.
///
pub fn parse_xml<T>(reader: &mut Reader<T>) -> Result<XmlTree, XmlError>
where
    T: BufRead,
{
    reader.config_mut().trim_text(true);
    let mut buf: Vec<u8> = Vec::new();
    let mut tree: Option<XmlTree> = None;
    let mut stack: Vec<ElementId> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(b) => {
                let el = start_element(&mut tree, &stack, &b)?;
                stack.push(el);
            }
            Event::Empty(b) => {
                start_element(&mut tree, &stack, &b)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                match (tree.as_mut(), stack.last()) {
                    (Some(tree), Some(el)) => tree.push_text(*el, &text),
                    _ if text.trim().is_empty() => {}
                    _ => return Err(XmlError::Malformed("text outside of the root element")),
                }
            }
            Event::CData(t) => {
                let text = read_to_string(t.as_ref());
                if let (Some(tree), Some(el)) = (tree.as_mut(), stack.last()) {
                    tree.push_text(*el, &text)
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(XmlError::Malformed("unclosed element"));
    }
    tree.ok_or(XmlError::Malformed("no root element"))
}

/// Parse an [`XmlTree`] from a buffered reader
pub fn parse_xml_reader<T>(reader: T) -> Result<XmlTree, XmlError>
where
    T: BufRead,
{
    parse_xml(&mut Reader::from_reader(reader))
}

/// Parse an [`XmlTree`] from a byte slice
pub fn parse_xml_slice(xml: &[u8]) -> Result<XmlTree, XmlError> {
    parse_xml_reader(xml)
}

/// Parse an [`XmlTree`] from the file at the given path
pub fn parse_xml_file<P: AsRef<Path>>(path: P) -> Result<XmlTree, XmlError> {
    parse_xml(&mut Reader::from_file(path)?)
}
