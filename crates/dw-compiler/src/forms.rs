use std::collections::BTreeMap;

use dw_core::{DictWikiError, SourceSpan};
use dw_parser::{element_children, inline_text_content, parse_xml_document, XmlElementNode};

pub const FORM_TAG: &str = "Form";
pub const NAME_PLACEHOLDER: &str = "[[Name]]";
pub const CHAR_PLACEHOLDER: &str = "[[Char]]";
pub const ALPHA_PLACEHOLDER: &str = "[[alpha]]";

/// Closed set of field rule behaviours. `Unmapped` keeps configured codes
/// that have no handler so the render pass can decide what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    CopyValue,
    LabelList,
    Date,
    LookupPropReference,
    GroupReference,
    Lookup,
    LookupStatus,
    LookupFieldInValue,
    ModificationTimestamp,
    LookupIdCompute,
    LookupFieldIdCompute,
    RecordIdCompute,
    FieldReferenceList,
    CollectionLink,
    Unmapped(String),
}

impl RuleKind {
    /// Accepts the numeric parsing codes as well as kebab-case names.
    pub fn from_code(raw: &str) -> Self {
        match raw.trim() {
            "0" | "copy-value" => Self::CopyValue,
            "1" | "label-list" => Self::LabelList,
            "3" | "date" => Self::Date,
            "4" | "lookup-prop-reference" => Self::LookupPropReference,
            "5" | "group-reference" => Self::GroupReference,
            "6" | "lookup-value" | "lookup" => Self::Lookup,
            "7" | "lookup-status" => Self::LookupStatus,
            "8" | "lookup-field-within-value" => Self::LookupFieldInValue,
            "9" | "modification-timestamp" => Self::ModificationTimestamp,
            "10" | "lookup-id-compute" => Self::LookupIdCompute,
            "11" | "lookup-field-id-compute" => Self::LookupFieldIdCompute,
            "12" | "record-id-compute" => Self::RecordIdCompute,
            "13" | "field-reference-list" => Self::FieldReferenceList,
            "14" | "collection-link" => Self::CollectionLink,
            other => Self::Unmapped(other.to_string()),
        }
    }

    pub fn requires_child_tag(&self) -> bool {
        matches!(
            self,
            Self::LabelList
                | Self::LookupPropReference
                | Self::GroupReference
                | Self::FieldReferenceList
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub xml_name: String,
    pub sequence: i64,
    pub kind: RuleKind,
    /// Source column name, or the literal used by label rules.
    pub value: Option<String>,
    pub auto_compute: bool,
    pub child_tag: Option<String>,
    pub default_value: Option<String>,
    pub collection_template: Option<String>,
    pub location: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub name: String,
    pub page_template: String,
    pub page_title: String,
    pub node_type: String,
    /// Sorted by `(sequence, xml_name)`.
    pub rules: Vec<FieldRule>,
    pub location: SourceSpan,
}

impl Form {
    pub fn rule(&self, xml_name: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.xml_name == xml_name)
    }

    pub fn title_for_name(&self, name: &str) -> String {
        self.page_title.replace(NAME_PLACEHOLDER, name)
    }

    pub fn title_for_char(&self, letter: &str) -> String {
        self.page_title.replace(CHAR_PLACEHOLDER, letter)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormSet {
    forms: BTreeMap<String, Form>,
}

impl FormSet {
    pub fn get(&self, name: &str) -> Result<&Form, DictWikiError> {
        self.forms.get(name).ok_or_else(|| {
            DictWikiError::new(
                "FORM_NOT_FOUND",
                format!("Form \"{}\" is not defined in the form config.", name),
            )
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.forms.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.forms.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

impl FromIterator<Form> for FormSet {
    fn from_iter<T: IntoIterator<Item = Form>>(iter: T) -> Self {
        Self {
            forms: iter
                .into_iter()
                .map(|form| (form.name.clone(), form))
                .collect(),
        }
    }
}

/// Parses `DDWikiImportConfig.xml`. Elements other than `<Form>` under the
/// root are ignored.
pub fn load_form_set(source: &str) -> Result<FormSet, DictWikiError> {
    let document = parse_xml_document(source)?;
    let mut forms = BTreeMap::new();

    for node in element_children(&document.root).filter(|node| node.name == FORM_TAG) {
        let form = parse_form(node)?;
        if forms.contains_key(&form.name) {
            return Err(DictWikiError::with_span(
                "FORM_DUPLICATE",
                format!("Form \"{}\" is declared more than once.", form.name),
                node.location.clone(),
            ));
        }
        forms.insert(form.name.clone(), form);
    }

    Ok(FormSet { forms })
}

fn parse_form(node: &XmlElementNode) -> Result<Form, DictWikiError> {
    let name = required_attr(node, "Name", "<Form>")?;
    let page_template = required_attr(node, "Page_Template", &name)?;
    let page_title = required_attr(node, "Page_Title", &name)?;
    let node_type = required_attr(node, "Node_Type", &name)?;

    let mut rules: Vec<FieldRule> = Vec::new();
    for field in element_children(node) {
        let rule = parse_rule(field, &name)?;
        if rules.iter().any(|known| known.xml_name == rule.xml_name) {
            return Err(DictWikiError::with_span(
                "FORM_FIELD_DUPLICATE",
                format!(
                    "Field \"{}\" appears more than once in form \"{}\".",
                    rule.xml_name, name
                ),
                field.location.clone(),
            ));
        }
        rules.push(rule);
    }
    rules.sort_by(|left, right| {
        left.sequence
            .cmp(&right.sequence)
            .then_with(|| left.xml_name.cmp(&right.xml_name))
    });

    Ok(Form {
        name,
        page_template,
        page_title: page_title.trim().to_string(),
        node_type,
        rules,
        location: node.location.clone(),
    })
}

fn parse_rule(node: &XmlElementNode, form_name: &str) -> Result<FieldRule, DictWikiError> {
    let xml_name = required_attr(node, "XMLName", form_name)?;
    let raw_sequence = required_attr(node, "Sequence", form_name)?;
    let sequence = raw_sequence.trim().parse::<i64>().map_err(|_| {
        DictWikiError::with_span(
            "FORM_INVALID",
            format!(
                "Field \"{}\" in form \"{}\" has a non-integer Sequence \"{}\".",
                xml_name, form_name, raw_sequence
            ),
            node.location.clone(),
        )
    })?;

    let kind = node
        .attr("ParsingCode")
        .map(RuleKind::from_code)
        .unwrap_or(RuleKind::CopyValue);
    let child_tag = optional_attr(node, "ChildTagName");
    if kind.requires_child_tag() && child_tag.is_none() {
        return Err(DictWikiError::with_span(
            "FORM_INVALID",
            format!(
                "Field \"{}\" in form \"{}\" needs a ChildTagName.",
                xml_name, form_name
            ),
            node.location.clone(),
        ));
    }

    Ok(FieldRule {
        xml_name,
        sequence,
        kind,
        value: inline_text_content(node)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        auto_compute: node.attr("AutoCompute") == Some("Y"),
        child_tag,
        default_value: node.attr("DefaultValue").map(str::to_string),
        collection_template: optional_attr(node, "CollectionTemplate"),
        location: node.location.clone(),
    })
}

fn optional_attr(node: &XmlElementNode, name: &str) -> Option<String> {
    node.attr(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required_attr(node: &XmlElementNode, name: &str, owner: &str) -> Result<String, DictWikiError> {
    match node.attr(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(DictWikiError::with_span(
            "FORM_INVALID",
            format!(
                "Missing required attribute \"{}\" on <{}> in form \"{}\".",
                name, node.name, owner
            ),
            node.location.clone(),
        )),
    }
}
