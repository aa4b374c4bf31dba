use std::fs;
use std::path::Path;

use dw_core::{DictWikiError, OutputDocument, OutputNode};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

/// Renders the document as indented UTF-8 XML with a declaration.
pub fn render_output_document(document: &OutputDocument) -> Result<String, DictWikiError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;
    write_node(&mut writer, &document.root)?;

    String::from_utf8(writer.into_inner()).map_err(|error| {
        DictWikiError::new(
            "OUTPUT_WRITE",
            format!("Rendered document is not UTF-8: {}", error),
        )
    })
}

pub fn write_output_document(document: &OutputDocument, path: &Path) -> Result<(), DictWikiError> {
    let xml = render_output_document(document)?;
    fs::write(path, xml).map_err(|error| {
        DictWikiError::new(
            "OUTPUT_WRITE",
            format!("Cannot write \"{}\": {}", path.display(), error),
        )
    })?;
    debug!("Wrote import document to {}", path.display());
    Ok(())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &OutputNode) -> Result<(), DictWikiError> {
    let mut start = BytesStart::new(node.tag.as_str());
    for (name, value) in &node.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if node.text.is_none() && node.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    if let Some(text) = &node.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error)?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.tag.as_str())))
        .map_err(write_error)
}

fn write_error(error: quick_xml::Error) -> DictWikiError {
    DictWikiError::new("OUTPUT_WRITE", format!("Cannot render XML: {}", error))
}
