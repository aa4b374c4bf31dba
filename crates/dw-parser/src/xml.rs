use std::collections::BTreeMap;

use dw_core::{DictWikiError, SourceLocation, SourceSpan};
use roxmltree::{Document, Node, NodeType};

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElementNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElementNode),
    Text(XmlTextNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElementNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlNode>,
    pub location: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlTextNode {
    pub value: String,
    pub location: SourceSpan,
}

impl XmlElementNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

pub fn parse_xml_document(source: &str) -> Result<XmlDocument, DictWikiError> {
    let document = Document::parse(source)
        .map_err(|error| DictWikiError::new("XML_PARSE_ERROR", error.to_string()))?;

    let Some(root) = document.root().children().find(|node| node.is_element()) else {
        return Err(DictWikiError::new(
            "XML_PARSE_ERROR",
            "XML document must contain a root element.",
        ));
    };

    Ok(XmlDocument {
        root: parse_element(&document, root),
    })
}

pub fn element_children(node: &XmlElementNode) -> impl Iterator<Item = &XmlElementNode> {
    node.children.iter().filter_map(|entry| match entry {
        XmlNode::Element(element) => Some(element),
        _ => None,
    })
}

/// Concatenated direct text children; `None` when the element has no text.
pub fn inline_text_content(node: &XmlElementNode) -> Option<String> {
    let parts = node
        .children
        .iter()
        .filter_map(|entry| match entry {
            XmlNode::Text(XmlTextNode { value, .. }) => Some(value.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>();
    if parts.is_empty() {
        None
    } else {
        Some(parts.concat())
    }
}

fn parse_element(document: &Document<'_>, node: Node<'_, '_>) -> XmlElementNode {
    let mut attributes = BTreeMap::new();
    for attribute in node.attributes() {
        attributes.insert(attribute.name().to_string(), attribute.value().to_string());
    }

    let mut children = Vec::new();
    for child in node.children() {
        match child.node_type() {
            NodeType::Element => children.push(XmlNode::Element(parse_element(document, child))),
            NodeType::Text => {
                let value = child.text().unwrap_or_default().to_string();
                if value.trim().is_empty() {
                    continue;
                }
                children.push(XmlNode::Text(XmlTextNode {
                    value,
                    location: node_span(document, child.range().start, child.range().end),
                }));
            }
            _ => {}
        }
    }

    XmlElementNode {
        name: node.tag_name().name().to_string(),
        attributes,
        children,
        location: node_span(document, node.range().start, node.range().end),
    }
}

fn node_span(document: &Document<'_>, start: usize, end: usize) -> SourceSpan {
    let start_pos = document.text_pos_at(start);
    let end_pos = document.text_pos_at(end);
    SourceSpan {
        start: SourceLocation {
            line: start_pos.row as usize,
            column: start_pos.col as usize,
        },
        end: SourceLocation {
            line: end_pos.row as usize,
            column: end_pos.col as usize,
        },
    }
}

#[cfg(test)]
mod xml_tests {
    use super::*;

    #[test]
    fn parse_xml_document_builds_form_tree() {
        let source = r#"
<Config>
  <Form Name="Group" Page_Template="GroupTemplate" Page_Title="[[Name]] Group" Node_Type="Group">
    <Field XMLName="Labels" Sequence="1" ParsingCode="1" ChildTagName="Label">group</Field>
  </Form>
</Config>
"#;
        let document = parse_xml_document(source).expect("xml should parse");
        assert_eq!(document.root.name, "Config");

        let forms = element_children(&document.root).collect::<Vec<_>>();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].attr("Name"), Some("Group"));
        assert!(forms[0].location.start.line >= 2);

        let field = element_children(forms[0]).next().expect("field");
        assert_eq!(field.attr("ChildTagName"), Some("Label"));
        assert_eq!(inline_text_content(field).as_deref(), Some("group"));
    }

    #[test]
    fn whitespace_only_text_is_dropped() {
        let document = parse_xml_document("<a>\n  <b/>\n</a>").expect("xml should parse");
        assert_eq!(document.root.children.len(), 1);
        assert_eq!(inline_text_content(&document.root), None);
    }

    #[test]
    fn entities_are_decoded_in_text() {
        let document = parse_xml_document("<f>&lt;n/a&gt;</f>").expect("xml should parse");
        assert_eq!(inline_text_content(&document.root).as_deref(), Some("<n/a>"));
    }

    #[test]
    fn parse_xml_document_returns_parse_error_for_invalid_xml() {
        let error = parse_xml_document("<Config>").expect_err("invalid xml should fail");
        assert_eq!(error.code, "XML_PARSE_ERROR");
    }

    #[test]
    fn parse_xml_document_returns_parse_error_when_root_element_is_missing() {
        let error = parse_xml_document("<?xml version=\"1.0\"?><!---->")
            .expect_err("missing root element should fail");
        assert_eq!(error.code, "XML_PARSE_ERROR");
    }
}
