mod assembler;
mod config;
mod field_rules;
mod forms;
mod grouping_tree;
mod id_allocator;
mod pipeline;
mod title_registry;

pub use assembler::{
    AssemblyStats, DocumentAssembler, DISPLAY_NAME_COLUMN, GROUP_FORM, LOOKUP_ALPHA_FORM,
    LOOKUP_FIELD_FORM, LOOKUP_FIELD_ID_COLUMN, LOOKUP_TOP_FORM, LOOKUP_VALUE_COLUMN,
    LOOKUP_VALUE_FORM, RESOURCE_FORM,
};
pub use config::{
    load_program_config, ProgramConfig, ResourceSheetConfig, COLLECTION_ITEM_FORM,
    LOOKUP_ITEM_FORM, LOOKUP_SHEETS_SECTION, LOOKUP_SHEET_KEY, OTHER_ITEM_FORM,
    PAGE_LINKS_SECTION, PROP_ITEM_FORM, RESOURCE_DESCRIPTIONS_SECTION, RESOURCE_SHEETS_SECTION,
};
pub use field_rules::{
    FieldRuleInterpreter, RenderInput, UnmappedRulePolicy, IGNORED_FIELDS,
    LOOKUP_FIELD_TEMPLATE, LOOKUPS_SUFFIX, NOT_APPLICABLE, NOT_DEFINED,
    OTHER_NO_LOOKUP_TEMPLATE, PROP_NO_LOOKUP_TEMPLATE, REFERENCE_NO_LOOKUP_TEMPLATE,
};
pub use forms::{
    load_form_set, FieldRule, Form, FormSet, RuleKind, ALPHA_PLACEHOLDER, CHAR_PLACEHOLDER,
    FORM_TAG, NAME_PLACEHOLDER,
};
pub use grouping_tree::{build_grouping_tree, GroupNode, GroupNodeId, GroupingTree};
pub use id_allocator::{IdAllocator, ID_BLOCK_SIZE};
pub use pipeline::{
    compile_import_document, CompileRequest, CompileResult, ROOT_TAG, TIMESTAMP_FORMAT,
    XLSX_DATE_ATTR, XML_CREATE_DATE_ATTR,
};
pub use title_registry::{PageKind, TitleRegistry, LOOKUP_VALUE_TEMPLATE, RESERVED_TITLE_SUFFIXES};
