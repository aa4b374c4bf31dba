use chrono::{NaiveDateTime, Timelike};
use dw_core::{
    parse_group_path, CellValue, DictWikiError, OutputNode, Row, LINK_ATTR, PAGE_TEMPLATE_ATTR,
    PAGE_TITLE_ATTR,
};
use tracing::warn;

use crate::config::ProgramConfig;
use crate::forms::{FieldRule, Form, RuleKind};
use crate::id_allocator::IdAllocator;
use crate::title_registry::{PageKind, TitleRegistry};

/// Columns that are never copied into the output.
pub const IGNORED_FIELDS: [&str; 1] = ["OriginalEntryTimestamp"];

pub const LOOKUPS_SUFFIX: &str = " Lookups";
pub const NOT_APPLICABLE: &str = "<n/a>";
pub const NOT_DEFINED: &str = "<Not Defined>";
pub const PROP_NO_LOOKUP_TEMPLATE: &str = "PropNoLookupResourceTemplate";
pub const OTHER_NO_LOOKUP_TEMPLATE: &str = "OtherNoLookupResourceTemplate";
pub const REFERENCE_NO_LOOKUP_TEMPLATE: &str = "ReferenceNoLookupResourceTemplate";
pub const LOOKUP_FIELD_TEMPLATE: &str = "LookupFieldTemplate";

const COMMENT_MARKER: char = '<';
const LIST_MARKER: &str = "List";
const SIMPLE_DATA_TYPE_RULE: &str = "Simple_Data_Type";
const LOOKUP_FIELD_RULE: &str = "Lookup_Field";
const LOOKUP_VALUE_RULE: &str = "Lookup_Value";
const MODIFICATION_TIMESTAMP: &str = "ModificationTimestamp";
const LOOKUP_FIELD_REF: &str = "lookupfield_ref";
const RESOURCE_DESCRIPTION: &str = "Resource_Description";
const COLLECTION_SUFFIX: &str = " Collection";
const FIELD_SUFFIX: &str = " Field";
const TODAY_DEFAULT: &str = "*";
const TEXT_DATE_FORMAT: &str = "%Y%m%dT%H%M";
const TEXT_DAY_FORMAT: &str = "%Y%m%d";
const DATE_ONLY_FORMAT: &str = "%b %d %Y";
const DATE_TIME_FORMAT: &str = "%b %d %Y %I:%M %p";

/// What to do with a rule whose parsing code has no handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedRulePolicy {
    /// Log the first occurrence of the run and skip every occurrence.
    #[default]
    WarnOnce,
    /// Fail the run with `RULE_KIND_UNMAPPED`.
    Reject,
}

/// The data a form is rendered from.
#[derive(Debug, Clone, Copy)]
pub enum RenderInput<'a> {
    Row(&'a Row),
    /// One value used by every plain copy rule.
    Literal(Option<&'a str>),
    Empty,
}

impl<'a> RenderInput<'a> {
    /// `None` when the column does not exist for this input.
    fn cell(&self, column: &str) -> Option<&'a CellValue> {
        match *self {
            Self::Row(row) => row.get(column),
            Self::Literal(_) | Self::Empty => None,
        }
    }
}

struct RenderContext<'a> {
    form: &'a Form,
    input: RenderInput<'a>,
    /// Proposed title before the title registry has seen it.
    page_title: &'a str,
    labels: Option<&'a str>,
    resource_name: &'a str,
}

/// Turns one form plus one input into an output subtree. Identifier and
/// title state is borrowed so every render of a run shares it.
pub struct FieldRuleInterpreter<'a> {
    config: &'a ProgramConfig,
    ids: &'a mut IdAllocator,
    titles: &'a mut TitleRegistry,
    run_started: NaiveDateTime,
    policy: UnmappedRulePolicy,
    unmapped_reported: bool,
}

impl<'a> FieldRuleInterpreter<'a> {
    pub fn new(
        config: &'a ProgramConfig,
        ids: &'a mut IdAllocator,
        titles: &'a mut TitleRegistry,
        run_started: NaiveDateTime,
        policy: UnmappedRulePolicy,
    ) -> Self {
        Self {
            config,
            ids,
            titles,
            run_started,
            policy,
            unmapped_reported: false,
        }
    }

    pub fn render(
        &mut self,
        form: &Form,
        input: RenderInput<'_>,
        page_title: Option<&str>,
        labels: Option<&str>,
        resource_name: &str,
    ) -> Result<OutputNode, DictWikiError> {
        let proposed = page_title.unwrap_or(&form.page_title).trim();
        let resolved = self.titles.resolve_title(
            proposed,
            resource_name,
            PageKind::from_template(&form.page_template),
        );
        let mut node = OutputNode::new(&form.node_type)
            .with_attr(PAGE_TEMPLATE_ATTR, &form.page_template)
            .with_attr(PAGE_TITLE_ATTR, resolved);

        let context = RenderContext {
            form,
            input,
            page_title: proposed,
            labels,
            resource_name,
        };
        for rule in &form.rules {
            if IGNORED_FIELDS.contains(&rule.xml_name.as_str()) {
                continue;
            }
            self.apply_rule(&context, rule, &mut node)?;
        }
        Ok(node)
    }

    fn apply_rule(
        &mut self,
        context: &RenderContext<'_>,
        rule: &FieldRule,
        node: &mut OutputNode,
    ) -> Result<(), DictWikiError> {
        match &rule.kind {
            RuleKind::CopyValue => {
                let text = self.copy_value(context, rule)?;
                node.push(OutputNode::new(&rule.xml_name).with_text(text));
            }
            RuleKind::Date => {
                let text = self.date_value(context, rule)?;
                node.push(OutputNode::new(&rule.xml_name).with_text(text));
            }
            RuleKind::ModificationTimestamp => {
                let text = self.run_started.format(DATE_ONLY_FORMAT).to_string();
                node.push(OutputNode::new(&rule.xml_name).with_text(text));
            }
            RuleKind::LabelList => node.push(label_list(context, rule)?),
            RuleKind::LookupPropReference => node.push(self.prop_references(context, rule)?),
            RuleKind::GroupReference => node.push(self.group_references(context, rule)?),
            RuleKind::Lookup => self.lookup(context, rule, node)?,
            RuleKind::LookupStatus => {
                let value = cell_text(context, rule)?;
                let text = if !is_list_field(context)? {
                    NOT_APPLICABLE.to_string()
                } else {
                    value.unwrap_or_else(|| NOT_DEFINED.to_string())
                };
                node.push(OutputNode::new(&rule.xml_name).with_text(text));
            }
            RuleKind::LookupFieldInValue => node.push(lookup_field_in_value(context, rule)?),
            RuleKind::LookupIdCompute => {
                let text = self.lookup_id(context, rule)?;
                node.push(OutputNode::new(&rule.xml_name).with_text(text));
            }
            RuleKind::LookupFieldIdCompute => {
                let field_name = if node.page_template() == Some(LOOKUP_FIELD_TEMPLATE) {
                    node.page_title()
                        .unwrap_or_default()
                        .replace(LOOKUPS_SUFFIX, "")
                } else {
                    lookup_field_name(context)?
                };
                let text = self.ids.allocate_lookup_field_id(&field_name).to_string();
                node.push(OutputNode::new(&rule.xml_name).with_text(text));
            }
            RuleKind::RecordIdCompute => {
                let text = match optional_cell_text(context, rule) {
                    Some(sourced) => sourced,
                    None => self
                        .ids
                        .allocate_record_id(context.resource_name)?
                        .to_string(),
                };
                node.push(OutputNode::new(&rule.xml_name).with_text(text));
            }
            RuleKind::FieldReferenceList => node.push(field_references(context, rule)?),
            RuleKind::CollectionLink => self.collection_link(context, rule, node)?,
            RuleKind::Unmapped(code) => self.unmapped(context, rule, code)?,
        }
        Ok(())
    }

    fn copy_value(
        &self,
        context: &RenderContext<'_>,
        rule: &FieldRule,
    ) -> Result<String, DictWikiError> {
        if rule.auto_compute {
            return match rule.xml_name.as_str() {
                LOOKUP_FIELD_REF => Ok(context.page_title.replace(' ', "_").to_lowercase()),
                RESOURCE_DESCRIPTION => self.resource_description(context),
                _ => Err(DictWikiError::new(
                    "AUTO_COMPUTE_UNSUPPORTED",
                    format!(
                        "Cannot auto-compute field \"{}\" on page \"{}\".",
                        rule.xml_name, context.page_title
                    ),
                )),
            };
        }

        let text = match context.input {
            RenderInput::Row(row) => match row.get(source_column(rule)) {
                Some(cell) => cell
                    .as_text()
                    .or_else(|| rule.default_value.clone())
                    .unwrap_or_default(),
                None => rule
                    .default_value
                    .clone()
                    .ok_or_else(|| missing_column(context, rule))?,
            },
            RenderInput::Literal(value) => value.unwrap_or_default().to_string(),
            RenderInput::Empty => String::new(),
        };
        Ok(text.replace("&#13;", " ").replace('\r', " "))
    }

    fn resource_description(&self, context: &RenderContext<'_>) -> Result<String, DictWikiError> {
        let key = if context.page_title.contains(COLLECTION_SUFFIX) {
            context.page_title
        } else {
            context
                .page_title
                .split(' ')
                .next()
                .unwrap_or(context.page_title)
        };
        self.config
            .resource_description(key)
            .map(str::to_string)
            .ok_or_else(|| {
                DictWikiError::new(
                    "RESOURCE_DESCRIPTION_MISSING",
                    format!(
                        "Cannot find a resource description for \"{}\" (resource \"{}\").",
                        key, context.resource_name
                    ),
                )
            })
    }

    fn date_value(
        &self,
        context: &RenderContext<'_>,
        rule: &FieldRule,
    ) -> Result<String, DictWikiError> {
        if rule.auto_compute {
            if rule.xml_name == MODIFICATION_TIMESTAMP {
                return Ok(self.run_started.format(DATE_ONLY_FORMAT).to_string());
            }
            return Err(DictWikiError::new(
                "DATE_AUTO_COMPUTE_INVALID",
                format!(
                    "Cannot auto-compute date field \"{}\" on page \"{}\".",
                    rule.xml_name, context.page_title
                ),
            ));
        }

        let invalid = || {
            DictWikiError::new(
                "DATE_FORMAT_INVALID",
                format!(
                    "Column \"{}\" on page \"{}\" is not a date.",
                    source_column(rule),
                    context.page_title
                ),
            )
        };
        let default = rule.default_value.as_deref().map(|value| {
            if value == TODAY_DEFAULT {
                self.run_started.format(TEXT_DAY_FORMAT).to_string()
            } else {
                value.to_string()
            }
        });

        let date = match context
            .input
            .cell(source_column(rule))
            .filter(|cell| !cell.is_empty())
        {
            Some(CellValue::DateTime(value)) => *value,
            Some(cell) => parse_text_date(&cell.as_text().unwrap_or_default()).ok_or_else(invalid)?,
            None => {
                let Some(default) = default else {
                    return Err(DictWikiError::new(
                        "DATE_VALUE_MISSING",
                        format!(
                            "Cannot find a value for date column \"{}\" on page \"{}\".",
                            source_column(rule),
                            context.page_title
                        ),
                    ));
                };
                parse_text_date(&default).ok_or_else(invalid)?
            }
        };

        let format = if date.hour() == 0 && date.minute() == 0 {
            DATE_ONLY_FORMAT
        } else {
            DATE_TIME_FORMAT
        };
        Ok(date.format(format).to_string())
    }

    fn prop_references(
        &self,
        context: &RenderContext<'_>,
        rule: &FieldRule,
    ) -> Result<OutputNode, DictWikiError> {
        let raw = cell_text(context, rule)?.ok_or_else(|| empty_reference(context, rule))?;
        let child_tag = child_tag(rule)?;
        let mut parent = OutputNode::new(&rule.xml_name);
        for token in split_references(&raw) {
            let Some(link) = self.config.page_link(token) else {
                return Err(DictWikiError::new(
                    "PAGE_LINK_MISSING",
                    format!(
                        "Cannot create link for ref \"{}\" within column \"{}\" on page \"{}\". Check section [PageLinks] in config.ini.",
                        token, rule.xml_name, context.page_title
                    ),
                ));
            };
            parent.push(
                OutputNode::new(child_tag)
                    .with_attr(LINK_ATTR, link)
                    .with_text(token),
            );
        }
        Ok(parent)
    }

    fn group_references(
        &self,
        context: &RenderContext<'_>,
        rule: &FieldRule,
    ) -> Result<OutputNode, DictWikiError> {
        let segments = cell_text(context, rule)?
            .map(|raw| parse_group_path(&raw))
            .unwrap_or_default();
        let child_tag = child_tag(rule)?;
        let mut parent = OutputNode::new(&rule.xml_name);
        for segment in &segments {
            let link = self.config.page_link(segment).unwrap_or(segment);
            parent.push(
                OutputNode::new(child_tag)
                    .with_attr(LINK_ATTR, link)
                    .with_text(link),
            );
        }
        Ok(parent)
    }

    fn lookup(
        &self,
        context: &RenderContext<'_>,
        rule: &FieldRule,
        node: &mut OutputNode,
    ) -> Result<(), DictWikiError> {
        let value = cell_text(context, rule)?;
        let mut link = None;

        let text = if is_list_field(context)? {
            let mut value = value.unwrap_or_else(|| NOT_DEFINED.to_string());
            if value.starts_with(COMMENT_MARKER) {
                let template = node.page_template().unwrap_or_default().to_string();
                let Some(at) = template.find("Resource") else {
                    return Err(DictWikiError::new(
                        "TEMPLATE_RESOURCE_MARKER_MISSING",
                        format!(
                            "Expected text \"Resource\" in page template \"{}\" for column \"{}\" on page \"{}\".",
                            template, rule.xml_name, context.page_title
                        ),
                    ));
                };
                node.set_attr(
                    PAGE_TEMPLATE_ATTR,
                    format!("{}NoLookup{}", &template[..at], &template[at..]),
                );
            } else {
                if !value.ends_with(LOOKUPS_SUFFIX) {
                    value.push_str(LOOKUPS_SUFFIX);
                }
                link = Some(value.clone());
            }
            value
        } else {
            switch_to_no_lookup_template(node);
            if let Some(found) = value.as_deref().filter(|found| *found != NOT_APPLICABLE) {
                warn!(
                    "Lookup value should be {} for column '{}' on page '{}' in resource '{}' because Simple_Data_Type is not a list (found '{}')",
                    NOT_APPLICABLE, rule.xml_name, context.page_title, context.resource_name, found
                );
            }
            NOT_APPLICABLE.to_string()
        };

        let mut child = OutputNode::new(&rule.xml_name);
        if let Some(link) = link {
            child.set_attr(LINK_ATTR, link);
        }
        node.push(child.with_text(text));
        Ok(())
    }

    fn lookup_id(
        &mut self,
        context: &RenderContext<'_>,
        rule: &FieldRule,
    ) -> Result<String, DictWikiError> {
        if let Some(sourced) = optional_cell_text(context, rule) {
            return Ok(sourced);
        }
        let field_name = lookup_field_name(context)?;
        let id = self
            .ids
            .allocate_lookup_value_id(&field_name)
            .map_err(|error| {
                let value = context
                    .form
                    .rule(LOOKUP_VALUE_RULE)
                    .and_then(|value_rule| optional_cell_text(context, value_rule))
                    .unwrap_or_default();
                DictWikiError::new(
                    error.code,
                    format!("{} Lookup value: \"{}\".", error.message, value),
                )
            })?;
        Ok(id.to_string())
    }

    fn collection_link(
        &self,
        context: &RenderContext<'_>,
        rule: &FieldRule,
        node: &mut OutputNode,
    ) -> Result<(), DictWikiError> {
        let Some(value) = cell_text(context, rule)? else {
            return Ok(());
        };
        let token = value.strip_suffix(COLLECTION_SUFFIX).unwrap_or(&value);
        let Some(link) = self.config.page_link(token) else {
            return Err(DictWikiError::new(
                "PAGE_LINK_MISSING",
                format!(
                    "Cannot create link for collection value \"{}\" within column \"{}\" on page \"{}\". Check section [PageLinks] in config.ini.",
                    token, rule.xml_name, context.page_title
                ),
            ));
        };
        let Some(template) = rule.collection_template.as_deref() else {
            return Err(DictWikiError::with_span(
                "COLLECTION_TEMPLATE_MISSING",
                format!(
                    "Field \"{}\" in form \"{}\" has no CollectionTemplate attribute.",
                    rule.xml_name, context.form.name
                ),
                rule.location.clone(),
            ));
        };
        node.set_attr(PAGE_TEMPLATE_ATTR, template);
        node.push(
            OutputNode::new(&rule.xml_name)
                .with_attr(LINK_ATTR, link)
                .with_text(link),
        );
        Ok(())
    }

    fn unmapped(
        &mut self,
        context: &RenderContext<'_>,
        rule: &FieldRule,
        code: &str,
    ) -> Result<(), DictWikiError> {
        match self.policy {
            UnmappedRulePolicy::Reject => Err(DictWikiError::with_span(
                "RULE_KIND_UNMAPPED",
                format!(
                    "No handler for parsing code \"{}\" of field \"{}\" on page \"{}\".",
                    code, rule.xml_name, context.page_title
                ),
                rule.location.clone(),
            )),
            UnmappedRulePolicy::WarnOnce => {
                if !self.unmapped_reported {
                    warn!(
                        "No handler for parsing code '{}' of field '{}' on page '{}'; such fields are skipped",
                        code, rule.xml_name, context.page_title
                    );
                    self.unmapped_reported = true;
                }
                Ok(())
            }
        }
    }
}

fn label_list(context: &RenderContext<'_>, rule: &FieldRule) -> Result<OutputNode, DictWikiError> {
    let labels = context
        .labels
        .or(rule.value.as_deref())
        .unwrap_or_default();
    let child_tag = child_tag(rule)?;
    let mut parent = OutputNode::new(&rule.xml_name);
    for label in labels.split(',').map(str::trim).filter(|label| !label.is_empty()) {
        parent.push(OutputNode::new(child_tag).with_text(label));
    }
    Ok(parent)
}

fn lookup_field_in_value(
    context: &RenderContext<'_>,
    rule: &FieldRule,
) -> Result<OutputNode, DictWikiError> {
    let child = OutputNode::new(&rule.xml_name);
    match cell_text(context, rule)? {
        Some(mut value) if !value.starts_with(COMMENT_MARKER) => {
            if !value.ends_with(LOOKUPS_SUFFIX) {
                value.push_str(LOOKUPS_SUFFIX);
            }
            Ok(child.with_attr(LINK_ATTR, &value).with_text(value))
        }
        other => Ok(child.with_text(other.unwrap_or_default())),
    }
}

fn field_references(
    context: &RenderContext<'_>,
    rule: &FieldRule,
) -> Result<OutputNode, DictWikiError> {
    let raw = cell_text(context, rule)?.ok_or_else(|| empty_reference(context, rule))?;
    let child_tag = child_tag(rule)?;
    let mut parent = OutputNode::new(&rule.xml_name);
    for token in split_references(&raw) {
        let label = format!("{}{}", token, FIELD_SUFFIX);
        parent.push(
            OutputNode::new(child_tag)
                .with_attr(LINK_ATTR, &label)
                .with_text(label),
        );
    }
    Ok(parent)
}

fn is_list_field(context: &RenderContext<'_>) -> Result<bool, DictWikiError> {
    let Some(rule) = context.form.rule(SIMPLE_DATA_TYPE_RULE) else {
        return Err(DictWikiError::with_span(
            "FORM_RULE_MISSING",
            format!(
                "Form \"{}\" needs a \"{}\" field for its lookup rules.",
                context.form.name, SIMPLE_DATA_TYPE_RULE
            ),
            context.form.location.clone(),
        ));
    };
    Ok(cell_text(context, rule)?.is_some_and(|value| value.contains(LIST_MARKER)))
}

fn lookup_field_name(context: &RenderContext<'_>) -> Result<String, DictWikiError> {
    let Some(rule) = context.form.rule(LOOKUP_FIELD_RULE) else {
        return Err(DictWikiError::with_span(
            "FORM_RULE_MISSING",
            format!(
                "Form \"{}\" needs a \"{}\" field to compute lookup ids.",
                context.form.name, LOOKUP_FIELD_RULE
            ),
            context.form.location.clone(),
        ));
    };
    cell_text(context, rule)?.ok_or_else(|| {
        DictWikiError::new(
            "LOOKUP_FIELD_BLANK",
            format!(
                "Column \"{}\" is blank on page \"{}\".",
                source_column(rule),
                context.page_title
            ),
        )
    })
}

fn switch_to_no_lookup_template(node: &mut OutputNode) {
    let Some(template) = node.page_template() else {
        return;
    };
    if template.contains("Collection") {
        return;
    }
    let replacement = if template.starts_with("Prop") {
        PROP_NO_LOOKUP_TEMPLATE
    } else if template.contains("Reference") {
        REFERENCE_NO_LOOKUP_TEMPLATE
    } else {
        OTHER_NO_LOOKUP_TEMPLATE
    };
    node.set_attr(PAGE_TEMPLATE_ATTR, replacement);
}

fn parse_text_date(raw: &str) -> Option<NaiveDateTime> {
    let mut value = raw.trim().to_string();
    if value.len() == 8 {
        value.push_str("T0000");
    }
    NaiveDateTime::parse_from_str(&value, TEXT_DATE_FORMAT).ok()
}

fn split_references(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn source_column(rule: &FieldRule) -> &str {
    rule.value.as_deref().unwrap_or(&rule.xml_name)
}

fn cell_text(context: &RenderContext<'_>, rule: &FieldRule) -> Result<Option<String>, DictWikiError> {
    context
        .input
        .cell(source_column(rule))
        .map(CellValue::as_text)
        .ok_or_else(|| missing_column(context, rule))
}

fn optional_cell_text(context: &RenderContext<'_>, rule: &FieldRule) -> Option<String> {
    context
        .input
        .cell(source_column(rule))
        .and_then(CellValue::as_text)
}

fn child_tag(rule: &FieldRule) -> Result<&str, DictWikiError> {
    rule.child_tag.as_deref().ok_or_else(|| {
        DictWikiError::with_span(
            "FORM_INVALID",
            format!("Field \"{}\" needs a ChildTagName.", rule.xml_name),
            rule.location.clone(),
        )
    })
}

fn missing_column(context: &RenderContext<'_>, rule: &FieldRule) -> DictWikiError {
    DictWikiError::new(
        "ROW_COLUMN_MISSING",
        format!(
            "Missing column \"{}\" for field \"{}\" on page \"{}\".",
            source_column(rule),
            rule.xml_name,
            context.page_title
        ),
    )
}

fn empty_reference(context: &RenderContext<'_>, rule: &FieldRule) -> DictWikiError {
    DictWikiError::new(
        "REFERENCE_VALUE_MISSING",
        format!(
            "Found an empty reference in column \"{}\" on page \"{}\".",
            source_column(rule),
            context.page_title
        ),
    )
}

#[cfg(test)]
mod field_rules_tests {
    use super::*;
    use crate::forms::{load_form_set, FormSet};
    use chrono::NaiveDate;
    use dw_core::MaxIdReport;
    use std::collections::BTreeMap;

    const FORMS: &str = r#"
<DDWikiImportConfig>
  <Form Name="PropResourceField" Page_Template="PropResourceTemplate" Page_Title="[[Name]] Field" Node_Type="Field">
    <Field XMLName="StandardName" Sequence="1">StandardName</Field>
    <Field XMLName="Definition" Sequence="2" DefaultValue="TBD">Definition</Field>
    <Field XMLName="Simple_Data_Type" Sequence="3">SimpleDataType</Field>
    <Field XMLName="Lookup" Sequence="4" ParsingCode="6">Lookup</Field>
    <Field XMLName="Lookup_Status" Sequence="5" ParsingCode="7">LookupStatus</Field>
    <Field XMLName="Groupings" Sequence="6" ParsingCode="5" ChildTagName="Group">Groups</Field>
    <Field XMLName="Property_Types" Sequence="7" ParsingCode="4" ChildTagName="Class">PropertyTypes</Field>
    <Field XMLName="RecordID" Sequence="8" ParsingCode="12">RecordID</Field>
    <Field XMLName="Revised" Sequence="9" ParsingCode="3" DefaultValue="20170105">RevisedDate</Field>
    <Field XMLName="ModificationTimestamp" Sequence="10" ParsingCode="3" AutoCompute="Y"/>
    <Field XMLName="OriginalEntryTimestamp" Sequence="11">OriginalEntryTimestamp</Field>
    <Field XMLName="Labels" Sequence="12" ParsingCode="1" ChildTagName="Label">field, prop</Field>
    <Field XMLName="Panel" Sequence="13" ParsingCode="2"/>
  </Form>
  <Form Name="CollectionResourceField" Page_Template="CollectionResourceTemplate" Page_Title="[[Name]] Field" Node_Type="Field">
    <Field XMLName="StandardName" Sequence="1">StandardName</Field>
    <Field XMLName="Collection" Sequence="2" ParsingCode="14" CollectionTemplate="MediaCollectionTemplate">Collection</Field>
    <Field XMLName="References" Sequence="3" ParsingCode="13" ChildTagName="Reference">References</Field>
  </Form>
  <Form Name="Resource" Page_Template="ResourceTemplate" Page_Title="[[Name]] Resource" Node_Type="Resource">
    <Field XMLName="Resource_Description" Sequence="1" AutoCompute="Y"/>
    <Field XMLName="Labels" Sequence="2" ParsingCode="1" ChildTagName="Label">resource</Field>
  </Form>
  <Form Name="LookupIndexField" Page_Template="LookupFieldTemplate" Page_Title="[[Name]] Lookups" Node_Type="LookupField">
    <Field XMLName="lookupfield_ref" Sequence="1" AutoCompute="Y"/>
    <Field XMLName="LookupFieldID" Sequence="2" ParsingCode="11">LookupFieldID</Field>
    <Field XMLName="EnumerationID" Sequence="3">LookupFieldID</Field>
  </Form>
  <Form Name="LookupValue" Page_Template="LookupValueTemplate" Page_Title="[[Name]]" Node_Type="LookupValue">
    <Field XMLName="Lookup_Value" Sequence="1">LookupValue</Field>
    <Field XMLName="Lookup_Field" Sequence="2" ParsingCode="8">LookupField</Field>
    <Field XMLName="LookupID" Sequence="3" ParsingCode="10">LookupID</Field>
    <Field XMLName="LookupFieldID" Sequence="4" ParsingCode="11">LookupFieldID</Field>
  </Form>
  <Form Name="SourcedLookupValue" Page_Template="LookupValueTemplate" Page_Title="[[Name]]" Node_Type="LookupValue">
    <Field XMLName="Lookup_Value" Sequence="1">LookupValue</Field>
    <Field XMLName="Lookup_Field" Sequence="2" ParsingCode="8">LookupField</Field>
    <Field XMLName="LookupID" Sequence="3" ParsingCode="10">LookupID</Field>
  </Form>
</DDWikiImportConfig>
"#;

    fn forms() -> FormSet {
        load_form_set(FORMS).expect("forms")
    }

    fn config() -> ProgramConfig {
        let mut page_links = BTreeMap::new();
        page_links.insert("Property".to_string(), "Property Resource".to_string());
        page_links.insert("Listing".to_string(), "Listing Group".to_string());
        page_links.insert("RESI".to_string(), "Residential".to_string());
        page_links.insert("LAND".to_string(), "Land".to_string());
        page_links.insert("Media".to_string(), "Media Collection".to_string());
        let mut resource_descriptions = BTreeMap::new();
        resource_descriptions.insert(
            "Property".to_string(),
            "The property being listed. ".to_string(),
        );
        ProgramConfig {
            page_links,
            resource_descriptions,
            ..ProgramConfig::default()
        }
    }

    fn run_started() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 4, 20)
            .and_then(|date| date.and_hms_opt(9, 15, 0))
            .expect("date")
    }

    fn field_row(name: &str, simple_type: &str, lookup: &str) -> Row {
        Row::new()
            .with_text("StandardName", name)
            .with_text("Definition", "")
            .with_text("SimpleDataType", simple_type)
            .with_text("Lookup", lookup)
            .with_text("LookupStatus", "")
            .with_text("Groups", "Property,Listing")
            .with_text("PropertyTypes", "RESI, LAND")
            .with_text("RecordID", "")
            .with_text("RevisedDate", "")
    }

    struct Harness {
        config: ProgramConfig,
        forms: FormSet,
        ids: IdAllocator,
        titles: TitleRegistry,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                config: config(),
                forms: forms(),
                ids: IdAllocator::new(),
                titles: TitleRegistry::new(),
            }
        }

        fn render(
            &mut self,
            form: &str,
            input: RenderInput<'_>,
            page_title: Option<&str>,
            labels: Option<&str>,
            resource: &str,
            policy: UnmappedRulePolicy,
        ) -> Result<OutputNode, DictWikiError> {
            let form = self.forms.get(form)?.clone();
            let mut interpreter = FieldRuleInterpreter::new(
                &self.config,
                &mut self.ids,
                &mut self.titles,
                run_started(),
                policy,
            );
            interpreter.render(&form, input, page_title, labels, resource)
        }

        fn field(&mut self, row: &Row) -> Result<OutputNode, DictWikiError> {
            let title = format!("{} Field", row.text("StandardName").unwrap_or_default());
            self.render(
                "PropResourceField",
                RenderInput::Row(row),
                Some(&title),
                None,
                "Property",
                UnmappedRulePolicy::WarnOnce,
            )
        }
    }

    #[test]
    fn list_field_lookup_gets_suffix_and_link() {
        let mut harness = Harness::new();
        let node = harness
            .field(&field_row("StandardStatus", "String List, Single", "Status"))
            .expect("render");
        let lookup = node.child("Lookup").expect("lookup");
        assert_eq!(lookup.text_or_empty(), "Status Lookups");
        assert_eq!(lookup.attr(LINK_ATTR), Some("Status Lookups"));
        assert_eq!(node.page_template(), Some("PropResourceTemplate"));
        assert_eq!(
            node.child("Lookup_Status").map(OutputNode::text_or_empty),
            Some(NOT_DEFINED)
        );
    }

    #[test]
    fn non_list_field_is_forced_to_not_applicable() {
        let mut harness = Harness::new();
        let node = harness
            .field(&field_row("ListPrice", "Number", "Status"))
            .expect("render");
        let lookup = node.child("Lookup").expect("lookup");
        assert_eq!(lookup.text_or_empty(), NOT_APPLICABLE);
        assert_eq!(lookup.attr(LINK_ATTR), None);
        assert_eq!(node.page_template(), Some(PROP_NO_LOOKUP_TEMPLATE));
        assert_eq!(
            node.child("Lookup_Status").map(OutputNode::text_or_empty),
            Some(NOT_APPLICABLE)
        );
    }

    #[test]
    fn commented_lookup_switches_to_no_lookup_variant() {
        let mut harness = Harness::new();
        let node = harness
            .field(&field_row("Dates", "String List, Multi", "<see notes>"))
            .expect("render");
        assert_eq!(node.page_template(), Some("PropNoLookupResourceTemplate"));
        let lookup = node.child("Lookup").expect("lookup");
        assert_eq!(lookup.text_or_empty(), "<see notes>");
        assert_eq!(lookup.attr(LINK_ATTR), None);
    }

    #[test]
    fn copy_rules_use_default_and_skip_ignored_columns() {
        let mut harness = Harness::new();
        let row = field_row("ListPrice", "Number", "").with_text("OriginalEntryTimestamp", "x");
        let node = harness.field(&row).expect("render");
        assert_eq!(
            node.child("Definition").map(OutputNode::text_or_empty),
            Some("TBD")
        );
        assert!(node.child("OriginalEntryTimestamp").is_none());
        assert!(node.child("Panel").is_none());
        assert_eq!(node.page_title(), Some("ListPrice Field"));
    }

    #[test]
    fn copy_rule_without_column_or_default_fails() {
        let mut harness = Harness::new();
        let row = Row::new().with_text("SimpleDataType", "Number");
        let error = harness.field(&row).expect_err("missing column");
        assert_eq!(error.code, "ROW_COLUMN_MISSING");
        assert!(error.message.contains("StandardName"));
    }

    #[test]
    fn carriage_return_literals_are_scrubbed() {
        let mut harness = Harness::new();
        let row = field_row("ListPrice", "Number", "").with_text("Definition", "One&#13;Two\rThree");
        let node = harness.field(&row).expect("render");
        assert_eq!(
            node.child("Definition").map(OutputNode::text_or_empty),
            Some("One Two Three")
        );
    }

    #[test]
    fn dates_render_with_or_without_time() {
        let mut harness = Harness::new();
        let node = harness
            .field(&field_row("ListPrice", "Number", ""))
            .expect("render");
        assert_eq!(
            node.child("Revised").map(OutputNode::text_or_empty),
            Some("Jan 05 2017")
        );
        assert_eq!(
            node.child("ModificationTimestamp")
                .map(OutputNode::text_or_empty),
            Some("Apr 20 2018")
        );

        let timed = field_row("ListPrice", "Number", "").with_text("RevisedDate", "20170105T1530");
        let node = harness.field(&timed).expect("render");
        assert_eq!(
            node.child("Revised").map(OutputNode::text_or_empty),
            Some("Jan 05 2017 03:30 PM")
        );

        let structured = field_row("ListPrice", "Number", "").with_cell(
            "RevisedDate",
            CellValue::DateTime(run_started()),
        );
        let node = harness.field(&structured).expect("render");
        assert_eq!(
            node.child("Revised").map(OutputNode::text_or_empty),
            Some("Apr 20 2018 09:15 AM")
        );

        let bad = field_row("ListPrice", "Number", "").with_text("RevisedDate", "yesterday");
        let error = harness.field(&bad).expect_err("bad date");
        assert_eq!(error.code, "DATE_FORMAT_INVALID");
    }

    #[test]
    fn references_and_groups_resolve_through_page_links() {
        let mut harness = Harness::new();
        let node = harness
            .field(&field_row("ListPrice", "Number", ""))
            .expect("render");
        let groups = node.child("Groupings").expect("groupings");
        let links = groups
            .children_tagged("Group")
            .map(|child| child.attr(LINK_ATTR).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(links, vec!["Property Resource", "Listing Group"]);

        let classes = node.child("Property_Types").expect("property types");
        let class_texts = classes
            .children_tagged("Class")
            .map(OutputNode::text_or_empty)
            .collect::<Vec<_>>();
        assert_eq!(class_texts, vec!["RESI", "LAND"]);
        assert_eq!(
            classes.children[0].attr(LINK_ATTR),
            Some("Residential")
        );

        let unknown = field_row("ListPrice", "Number", "").with_text("PropertyTypes", "RESI,BOAT");
        let error = harness.field(&unknown).expect_err("unknown class");
        assert_eq!(error.code, "PAGE_LINK_MISSING");
        assert!(error.message.contains("BOAT"));
    }

    #[test]
    fn record_ids_are_sourced_or_allocated() {
        let mut harness = Harness::new();
        let node = harness
            .field(&field_row("ListPrice", "Number", ""))
            .expect("render");
        assert_eq!(node.child("RecordID").map(OutputNode::text_or_empty), Some("1"));

        let sourced = field_row("Status", "Number", "").with_text("RecordID", "7001");
        let node = harness.field(&sourced).expect("render");
        assert_eq!(node.child("RecordID").map(OutputNode::text_or_empty), Some("7001"));

        let node = harness
            .field(&field_row("Area", "Number", ""))
            .expect("render");
        assert_eq!(node.child("RecordID").map(OutputNode::text_or_empty), Some("2"));
    }

    #[test]
    fn repeated_names_get_disambiguated_titles() {
        let mut harness = Harness::new();
        let first = harness
            .field(&field_row("ListPrice", "Number", ""))
            .expect("render");
        let second = harness
            .field(&field_row("ListPrice", "Number", ""))
            .expect("render");
        assert_eq!(first.page_title(), Some("ListPrice Field"));
        assert_eq!(second.page_title(), Some("ListPrice (Property) Field"));
    }

    #[test]
    fn unmapped_rules_are_skipped_or_rejected() {
        let mut harness = Harness::new();
        let row = field_row("ListPrice", "Number", "");
        let error = harness
            .render(
                "PropResourceField",
                RenderInput::Row(&row),
                Some("ListPrice Field"),
                None,
                "Property",
                UnmappedRulePolicy::Reject,
            )
            .expect_err("strict mode");
        assert_eq!(error.code, "RULE_KIND_UNMAPPED");
        assert!(error.message.contains("Panel"));
    }

    #[test]
    fn unmapped_rules_warn_once_and_are_left_out() {
        let mut harness = Harness::new();
        let form = harness.forms.get("PropResourceField").expect("form").clone();
        let first = field_row("ListPrice", "Number", "");
        let second = field_row("ListingKey", "String", "");
        let mut interpreter = FieldRuleInterpreter::new(
            &harness.config,
            &mut harness.ids,
            &mut harness.titles,
            run_started(),
            UnmappedRulePolicy::WarnOnce,
        );
        assert!(!interpreter.unmapped_reported);

        let node = interpreter
            .render(&form, RenderInput::Row(&first), Some("ListPrice Field"), None, "Property")
            .expect("first render");
        assert!(interpreter.unmapped_reported);
        assert!(node.child("Panel").is_none());
        assert!(node.child("Labels").is_some());

        let node = interpreter
            .render(&form, RenderInput::Row(&second), Some("ListingKey Field"), None, "Property")
            .expect("second render");
        assert!(interpreter.unmapped_reported);
        assert!(node.child("Panel").is_none());
        assert_eq!(node.page_title(), Some("ListingKey Field"));
    }

    #[test]
    fn exhausted_lookup_block_names_field_and_value() {
        let mut report = MaxIdReport::default();
        report.max_lookup_ids.insert("Status".to_string(), 4999);
        report.max_record_ids.insert("Property".to_string(), 2010);
        let mut harness = Harness::new();
        harness.ids = IdAllocator::from_report(&report);

        let row = Row::new()
            .with_text("LookupValue", "Withdrawn")
            .with_text("LookupField", "Status")
            .with_text("LookupID", "");
        let error = harness
            .render(
                "LookupValue",
                RenderInput::Row(&row),
                Some("Withdrawn"),
                None,
                "Status",
                UnmappedRulePolicy::WarnOnce,
            )
            .expect_err("block is full");
        assert_eq!(error.code, "ID_BLOCK_EXHAUSTED");
        assert!(error.message.contains("\"Status\""));
        assert!(error.message.contains("Lookup value: \"Withdrawn\""));
    }

    #[test]
    fn sourced_lookup_id_needs_no_lookup_field() {
        let mut harness = Harness::new();
        let row = Row::new()
            .with_text("LookupValue", "Active")
            .with_text("LookupField", "")
            .with_text("LookupID", "4501");
        let node = harness
            .render(
                "SourcedLookupValue",
                RenderInput::Row(&row),
                Some("Active"),
                None,
                "Status",
                UnmappedRulePolicy::WarnOnce,
            )
            .expect("sourced id");
        assert_eq!(node.child("LookupID").map(OutputNode::text_or_empty), Some("4501"));

        let row = row.with_text("LookupID", "");
        let error = harness
            .render(
                "SourcedLookupValue",
                RenderInput::Row(&row),
                Some("Pending"),
                None,
                "Status",
                UnmappedRulePolicy::WarnOnce,
            )
            .expect_err("allocation needs a field");
        assert_eq!(error.code, "LOOKUP_FIELD_BLANK");
    }

    #[test]
    fn label_override_replaces_configured_labels() {
        let mut harness = Harness::new();
        let node = harness
            .render(
                "Resource",
                RenderInput::Empty,
                Some("Property Resource"),
                Some("resource, property"),
                "Property",
                UnmappedRulePolicy::WarnOnce,
            )
            .expect("render");
        let labels = node
            .child("Labels")
            .map(|labels| {
                labels
                    .children_tagged("Label")
                    .map(OutputNode::text_or_empty)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        assert_eq!(labels, vec!["resource", "property"]);
        assert_eq!(
            node.child("Resource_Description")
                .map(OutputNode::text_or_empty),
            Some("The property being listed. ")
        );
    }

    #[test]
    fn missing_resource_description_fails() {
        let mut harness = Harness::new();
        let error = harness
            .render(
                "Resource",
                RenderInput::Empty,
                Some("Member Resource"),
                None,
                "Member",
                UnmappedRulePolicy::WarnOnce,
            )
            .expect_err("no description");
        assert_eq!(error.code, "RESOURCE_DESCRIPTION_MISSING");
    }

    #[test]
    fn collection_link_swaps_template_and_field_references_get_suffix() {
        let mut harness = Harness::new();
        let row = Row::new()
            .with_text("StandardName", "Photos")
            .with_text("Collection", "Media Collection")
            .with_text("References", "ListingKey, MemberKey");
        let node = harness
            .render(
                "CollectionResourceField",
                RenderInput::Row(&row),
                Some("Photos Field"),
                None,
                "Property",
                UnmappedRulePolicy::WarnOnce,
            )
            .expect("render");
        assert_eq!(node.page_template(), Some("MediaCollectionTemplate"));
        let collection = node.child("Collection").expect("collection");
        assert_eq!(collection.text_or_empty(), "Media Collection");
        assert_eq!(collection.attr(LINK_ATTR), Some("Media Collection"));

        let references = node
            .child("References")
            .map(|references| {
                references
                    .children_tagged("Reference")
                    .map(|child| child.attr(LINK_ATTR).unwrap_or_default())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        assert_eq!(references, vec!["ListingKey Field", "MemberKey Field"]);
    }

    #[test]
    fn lookup_pages_compute_field_and_value_ids() {
        let mut harness = Harness::new();
        let field_node = harness
            .render(
                "LookupIndexField",
                RenderInput::Literal(Some("42")),
                Some("Standard Status Lookups"),
                None,
                "Lookup Field",
                UnmappedRulePolicy::WarnOnce,
            )
            .expect("lookup field");
        assert_eq!(
            field_node
                .child("lookupfield_ref")
                .map(OutputNode::text_or_empty),
            Some("standard_status_lookups")
        );
        assert_eq!(
            field_node.child("LookupFieldID").map(OutputNode::text_or_empty),
            Some("0")
        );
        assert_eq!(
            field_node.child("EnumerationID").map(OutputNode::text_or_empty),
            Some("42")
        );

        let value_row = Row::new()
            .with_text("LookupValue", "Active")
            .with_text("LookupField", "Standard Status");
        let value_node = harness
            .render(
                "LookupValue",
                RenderInput::Row(&value_row),
                Some("Active"),
                None,
                "Standard Status",
                UnmappedRulePolicy::WarnOnce,
            )
            .expect("lookup value");
        assert_eq!(
            value_node.child("LookupID").map(OutputNode::text_or_empty),
            Some("1")
        );
        assert_eq!(
            value_node
                .child("LookupFieldID")
                .map(OutputNode::text_or_empty),
            Some("0")
        );
        let field_ref = value_node.child("Lookup_Field").expect("lookup field ref");
        assert_eq!(field_ref.text_or_empty(), "Standard Status Lookups");
        assert_eq!(field_ref.attr(LINK_ATTR), Some("Standard Status Lookups"));
    }
}
