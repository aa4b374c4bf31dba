use std::collections::BTreeMap;

use dw_core::{DictWikiError, LookupFieldRows, OutputNode, ResourceSheet, Row, LINK_ATTR};
use tracing::info;

use crate::config::ProgramConfig;
use crate::field_rules::{FieldRuleInterpreter, RenderInput};
use crate::forms::{Form, FormSet, ALPHA_PLACEHOLDER};
use crate::grouping_tree::{build_grouping_tree, GroupNodeId, GroupingTree};

pub const RESOURCE_FORM: &str = "Resource";
pub const GROUP_FORM: &str = "Group";
pub const LOOKUP_TOP_FORM: &str = "LookupTopIndex";
pub const LOOKUP_ALPHA_FORM: &str = "LookupIndexAlpha";
pub const LOOKUP_FIELD_FORM: &str = "LookupIndexField";
pub const LOOKUP_VALUE_FORM: &str = "LookupValue";

pub const DISPLAY_NAME_COLUMN: &str = "StandardName";
pub const LOOKUP_VALUE_COLUMN: &str = "LookupValue";
pub const LOOKUP_FIELD_ID_COLUMN: &str = "LookupFieldID";

const LABELS_TAG: &str = "Labels";
const LABEL_TAG: &str = "Label";
const LOOKUP_TAG: &str = "Lookup";
const PROPERTY_TYPES_TAG: &str = "Property_Types";
const CLASS_TAG: &str = "Class";

const LOOKUP_TOP_DISAMBIGUATOR: &str = "Lookup";
const LOOKUP_ALPHA_DISAMBIGUATOR: &str = "Lookup Index";
const LOOKUP_FIELD_DISAMBIGUATOR: &str = "Lookup Field";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssemblyStats {
    pub resources: usize,
    pub lookup_fields: usize,
    pub lookup_values: usize,
}

/// Walks resource trees and lookup rows, rendering each page through the
/// field rule interpreter.
pub struct DocumentAssembler<'a> {
    forms: &'a FormSet,
    config: &'a ProgramConfig,
    interpreter: FieldRuleInterpreter<'a>,
    stats: AssemblyStats,
}

impl<'a> DocumentAssembler<'a> {
    pub fn new(
        forms: &'a FormSet,
        config: &'a ProgramConfig,
        interpreter: FieldRuleInterpreter<'a>,
    ) -> Self {
        Self {
            forms,
            config,
            interpreter,
            stats: AssemblyStats::default(),
        }
    }

    pub fn stats(&self) -> AssemblyStats {
        self.stats
    }

    /// Renders one resource sheet: the resource page, its groups depth
    /// first, and the item pages of every group.
    pub fn assemble_resource(&mut self, sheet: &ResourceSheet) -> Result<OutputNode, DictWikiError> {
        info!(
            "Processing resource sheet '{}' for resource '{}'",
            sheet.sheet_name, sheet.resource_name
        );
        let forms = self.forms;
        let item_form = forms.get(self.config.item_form_name(&sheet.resource_name)?)?;
        let tree = build_grouping_tree(&sheet.resource_name, &sheet.rows_by_group)?;

        let Some(root) = tree.find(&sheet.resource_name) else {
            return Err(DictWikiError::new(
                "GROUP_NOT_FOUND",
                format!(
                    "Sheet \"{}\" has no rows grouped under resource \"{}\" (found root \"{}\").",
                    sheet.sheet_name,
                    sheet.resource_name,
                    tree.root().map(|root| root.key.as_str()).unwrap_or_default()
                ),
            ));
        };

        let node = self.emit_group(sheet, &tree, root, item_form)?;
        self.stats.resources += 1;
        Ok(node)
    }

    fn emit_group(
        &mut self,
        sheet: &ResourceSheet,
        tree: &GroupingTree,
        id: GroupNodeId,
        item_form: &Form,
    ) -> Result<OutputNode, DictWikiError> {
        let forms = self.forms;
        let group = tree.node(id);
        let (form, title) = if group.depth == 0 {
            let form = forms.get(RESOURCE_FORM)?;
            let title = self
                .config
                .page_link(&group.name)
                .map(str::to_string)
                .unwrap_or_else(|| form.title_for_name(&group.name));
            (form, title)
        } else {
            let form = forms.get(GROUP_FORM)?;
            (form, form.title_for_name(&group.name))
        };
        let mut node = self.interpreter.render(
            form,
            RenderInput::Empty,
            Some(&title),
            None,
            &sheet.resource_name,
        )?;

        if let Some(rows) = sheet.rows_by_group.get(&group.key) {
            for (name, row) in sorted_by_display_name(rows, &sheet.resource_name)? {
                let title = item_form.title_for_name(&name);
                let mut item = self.interpreter.render(
                    item_form,
                    RenderInput::Row(row),
                    Some(&title),
                    None,
                    &sheet.resource_name,
                )?;
                attach_auxiliary_labels(&mut item);
                node.push(item);
            }
        }

        for child in &group.children {
            node.push(self.emit_group(sheet, tree, *child, item_form)?);
        }
        Ok(node)
    }

    /// Renders the lookup index: top page, one page per first letter, one
    /// page per lookup field, then its values in sheet order. Returns `None`
    /// when there are no lookup fields.
    pub fn assemble_lookups(
        &mut self,
        lookups: &[LookupFieldRows],
    ) -> Result<Option<OutputNode>, DictWikiError> {
        if lookups.is_empty() {
            return Ok(None);
        }
        info!("Processing {} lookup fields", lookups.len());

        let forms = self.forms;
        let top_form = forms.get(LOOKUP_TOP_FORM)?;
        let alpha_form = forms.get(LOOKUP_ALPHA_FORM)?;
        let field_form = forms.get(LOOKUP_FIELD_FORM)?;
        let value_form = forms.get(LOOKUP_VALUE_FORM)?;

        let mut top = self.interpreter.render(
            top_form,
            RenderInput::Empty,
            None,
            None,
            LOOKUP_TOP_DISAMBIGUATOR,
        )?;

        let mut buckets: BTreeMap<char, Vec<&LookupFieldRows>> = BTreeMap::new();
        for field in lookups {
            if let Some(letter) = field.field_name.chars().next() {
                buckets.entry(letter).or_default().push(field);
            }
        }

        for (letter, mut fields) in buckets {
            fields.sort_by(|left, right| left.field_name.cmp(&right.field_name));
            let title = alpha_form.title_for_char(&letter.to_string());
            let mut alpha = self.interpreter.render(
                alpha_form,
                RenderInput::Empty,
                Some(&title),
                None,
                LOOKUP_ALPHA_DISAMBIGUATOR,
            )?;
            for field in fields {
                alpha.push(self.emit_lookup_field(field_form, value_form, field)?);
            }
            top.push(alpha);
        }

        Ok(Some(top))
    }

    fn emit_lookup_field(
        &mut self,
        field_form: &Form,
        value_form: &Form,
        field: &LookupFieldRows,
    ) -> Result<OutputNode, DictWikiError> {
        let title = field_form.title_for_name(&field.field_name);
        let alpha = title
            .chars()
            .next()
            .map(|first| first.to_lowercase().to_string())
            .unwrap_or_default();
        let labels = field_form
            .rule(LABELS_TAG)
            .and_then(|rule| rule.value.as_deref())
            .map(|value| value.replace(ALPHA_PLACEHOLDER, &alpha));
        // Every value row of a field carries the same field id.
        let field_id = field
            .rows
            .first()
            .and_then(|row| row.text(LOOKUP_FIELD_ID_COLUMN));

        let mut node = self.interpreter.render(
            field_form,
            RenderInput::Literal(field_id.as_deref()),
            Some(&title),
            labels.as_deref(),
            LOOKUP_FIELD_DISAMBIGUATOR,
        )?;

        for row in &field.rows {
            let Some(value) = row.get(LOOKUP_VALUE_COLUMN) else {
                return Err(DictWikiError::new(
                    "ROW_COLUMN_MISSING",
                    format!(
                        "Missing column \"{}\" in a lookup row of field \"{}\".",
                        LOOKUP_VALUE_COLUMN, field.field_name
                    ),
                ));
            };
            // The value page is titled by the raw value; the form's
            // Page_Title pattern is not applied.
            let title = value.as_text().unwrap_or_default();
            node.push(self.interpreter.render(
                value_form,
                RenderInput::Row(row),
                Some(&title),
                None,
                &field.field_name,
            )?);
            self.stats.lookup_values += 1;
        }

        self.stats.lookup_fields += 1;
        Ok(node)
    }
}

fn sorted_by_display_name<'r>(
    rows: &'r [Row],
    resource_name: &str,
) -> Result<Vec<(String, &'r Row)>, DictWikiError> {
    let mut keyed = rows
        .iter()
        .map(|row| {
            if !row.has_column(DISPLAY_NAME_COLUMN) {
                return Err(DictWikiError::new(
                    "ROW_COLUMN_MISSING",
                    format!(
                        "Missing column \"{}\" in a row of resource \"{}\".",
                        DISPLAY_NAME_COLUMN, resource_name
                    ),
                ));
            }
            Ok((row.text(DISPLAY_NAME_COLUMN).unwrap_or_default(), row))
        })
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort_by(|left, right| left.0.cmp(&right.0));
    Ok(keyed)
}

fn attach_auxiliary_labels(item: &mut OutputNode) {
    let mut extra = Vec::new();
    if let Some(link) = item
        .child(LOOKUP_TAG)
        .filter(|lookup| !lookup.text_or_empty().is_empty())
        .and_then(|lookup| lookup.attr(LINK_ATTR))
    {
        extra.push(link.replace(' ', "_").to_lowercase());
    }
    if let Some(property_types) = item.child(PROPERTY_TYPES_TAG) {
        extra.extend(
            property_types
                .children_tagged(CLASS_TAG)
                .map(|class| format!("prop_{}", class.text_or_empty()).to_lowercase()),
        );
    }
    if extra.is_empty() {
        return;
    }

    if item.child(LABELS_TAG).is_none() {
        item.push(OutputNode::new(LABELS_TAG));
    }
    if let Some(labels) = item.child_mut(LABELS_TAG) {
        for label in extra {
            labels.push(OutputNode::new(LABEL_TAG).with_text(label));
        }
    }
}
