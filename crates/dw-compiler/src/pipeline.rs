use chrono::NaiveDateTime;
use dw_core::{DictWikiError, ImportSheets, MaxIdReport, OutputDocument, OutputNode};
use tracing::info;

use crate::assembler::{AssemblyStats, DocumentAssembler};
use crate::config::ProgramConfig;
use crate::field_rules::{FieldRuleInterpreter, UnmappedRulePolicy};
use crate::forms::FormSet;
use crate::id_allocator::IdAllocator;
use crate::title_registry::TitleRegistry;

pub const ROOT_TAG: &str = "wikiimport";
pub const XML_CREATE_DATE_ATTR: &str = "XMLCreateDate";
pub const XLSX_DATE_ATTR: &str = "XlsxDate";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M";

/// Everything one conversion run reads.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub config: &'a ProgramConfig,
    pub forms: &'a FormSet,
    pub sheets: &'a ImportSheets,
    pub seed: &'a MaxIdReport,
    /// Titles already published by an earlier import.
    pub prior_titles: &'a [String],
    pub run_started: NaiveDateTime,
    pub xlsx_date: NaiveDateTime,
    pub rule_policy: UnmappedRulePolicy,
}

#[derive(Debug, Clone)]
pub struct CompileResult {
    pub document: OutputDocument,
    pub stats: AssemblyStats,
}

/// Builds the whole import document. Resource sheets come first in
/// configured order, followed by the lookup index.
pub fn compile_import_document(request: &CompileRequest<'_>) -> Result<CompileResult, DictWikiError> {
    let mut ids = IdAllocator::from_report(request.seed);
    let mut titles = TitleRegistry::new();
    titles.seed(request.prior_titles.iter().cloned());
    if !titles.is_empty() {
        info!("Seeded {} page titles from the prior export", titles.len());
    }

    let interpreter = FieldRuleInterpreter::new(
        request.config,
        &mut ids,
        &mut titles,
        request.run_started,
        request.rule_policy,
    );
    let mut assembler = DocumentAssembler::new(request.forms, request.config, interpreter);

    let mut root = OutputNode::new(ROOT_TAG)
        .with_attr(
            XML_CREATE_DATE_ATTR,
            request.run_started.format(TIMESTAMP_FORMAT).to_string(),
        )
        .with_attr(
            XLSX_DATE_ATTR,
            request.xlsx_date.format(TIMESTAMP_FORMAT).to_string(),
        );
    for sheet in &request.sheets.resources {
        root.push(assembler.assemble_resource(sheet)?);
    }
    if let Some(lookups) = assembler.assemble_lookups(&request.sheets.lookups)? {
        root.push(lookups);
    }

    Ok(CompileResult {
        document: OutputDocument { root },
        stats: assembler.stats(),
    })
}
