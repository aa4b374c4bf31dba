mod workbook;
mod writer;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use dw_compiler::{
    compile_import_document, load_form_set, load_program_config, AssemblyStats, CompileRequest,
    CompileResult, UnmappedRulePolicy,
};
use dw_core::{DictWikiError, LookupFieldRows};
use dw_parser::{collect_prior_titles, parse_max_id_report};
use tracing::info;

pub use workbook::{
    grid_rows, load_import_sheets, MemoryWorkbook, SheetGrid, SheetSource, XlsxWorkbook,
    LOOKUP_FIELD_COLUMN,
};
pub use writer::{render_output_document, write_output_document};

pub const CONFIG_FILE_NAME: &str = "config.ini";
pub const FORM_CONFIG_FILE_NAME: &str = "DDWikiImportConfig.xml";
pub const DEFAULT_MAX_ID_FILE_NAME: &str = "stat_warning_log.txt";
pub const DATA_FOLDER_NAME: &str = "files";

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Resolved under `<working_folder>/files` unless absolute.
    pub xlsx: PathBuf,
    pub working_folder: PathBuf,
    pub max_id_file: String,
    pub wiki_export: Option<String>,
    pub xlsx_date: Option<NaiveDate>,
    /// Defaults to the workbook path with an `.xml` extension.
    pub output: Option<PathBuf>,
    pub rule_policy: UnmappedRulePolicy,
}

impl ConvertOptions {
    pub fn new(xlsx: impl Into<PathBuf>, working_folder: impl Into<PathBuf>) -> Self {
        Self {
            xlsx: xlsx.into(),
            working_folder: working_folder.into(),
            max_id_file: DEFAULT_MAX_ID_FILE_NAME.to_string(),
            wiki_export: None,
            xlsx_date: None,
            output: None,
            rule_policy: UnmappedRulePolicy::default(),
        }
    }

    pub fn data_folder(&self) -> PathBuf {
        self.working_folder.join(DATA_FOLDER_NAME)
    }

    pub fn xlsx_path(&self) -> PathBuf {
        self.data_folder().join(&self.xlsx)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.xlsx_path().with_extension("xml"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertReport {
    pub output: PathBuf,
    pub stats: AssemblyStats,
}

/// A text input together with the name used in error messages.
#[derive(Debug, Clone, Copy)]
pub struct NamedSource<'a> {
    pub name: &'a str,
    pub text: &'a str,
}

/// Inputs for a conversion that never touches the file system.
#[derive(Debug, Clone, Copy)]
pub struct CompileSources<'a> {
    pub config_ini: &'a str,
    pub form_config: &'a str,
    pub max_id_report: NamedSource<'a>,
    pub prior_export: Option<NamedSource<'a>>,
    pub run_started: NaiveDateTime,
    pub xlsx_date: Option<NaiveDateTime>,
    pub rule_policy: UnmappedRulePolicy,
}

pub fn compile_from_sources<S: SheetSource + ?Sized>(
    sources: &CompileSources<'_>,
    workbook: &mut S,
) -> Result<CompileResult, DictWikiError> {
    let config = load_program_config(sources.config_ini, CONFIG_FILE_NAME)?;
    let forms = load_form_set(sources.form_config)?;
    let seed = parse_max_id_report(sources.max_id_report.text, sources.max_id_report.name)?;
    let prior_titles = match sources.prior_export {
        Some(export) => collect_prior_titles(export.text, export.name)?.titles,
        None => Vec::new(),
    };
    let sheets = load_import_sheets(workbook, &config)?;

    compile_import_document(&CompileRequest {
        config: &config,
        forms: &forms,
        sheets: &sheets,
        seed: &seed,
        prior_titles: &prior_titles,
        run_started: sources.run_started,
        xlsx_date: sources.xlsx_date.unwrap_or(sources.run_started),
        rule_policy: sources.rule_policy,
    })
}

/// Reads the working folder and workbook, compiles the import document and
/// writes it to the output path.
pub fn convert_workbook(options: &ConvertOptions) -> Result<ConvertReport, DictWikiError> {
    let run_started = Local::now().naive_local();
    let data_folder = options.data_folder();
    let xlsx_path = options.xlsx_path();
    info!("Importing workbook {}", xlsx_path.display());
    info!("Base folder for config files is {}", options.working_folder.display());

    let config_ini = read_text(&options.working_folder.join(CONFIG_FILE_NAME), "CONFIG_NOT_FOUND")?;
    let form_config = read_text(
        &options.working_folder.join(FORM_CONFIG_FILE_NAME),
        "FORM_CONFIG_NOT_FOUND",
    )?;
    let max_id_report = read_text(&data_folder.join(&options.max_id_file), "SEED_NOT_FOUND")?;
    let prior_export = options
        .wiki_export
        .as_ref()
        .map(|name| read_text(&data_folder.join(name), "PRIOR_EXPORT_NOT_FOUND"))
        .transpose()?;

    let mut workbook = XlsxWorkbook::open(&xlsx_path)?;
    let result = compile_from_sources(
        &CompileSources {
            config_ini: &config_ini,
            form_config: &form_config,
            max_id_report: NamedSource {
                name: &options.max_id_file,
                text: &max_id_report,
            },
            prior_export: match (&options.wiki_export, &prior_export) {
                (Some(name), Some(text)) => Some(NamedSource { name, text }),
                _ => None,
            },
            run_started,
            xlsx_date: options
                .xlsx_date
                .map(|date| date.and_time(NaiveTime::default())),
            rule_policy: options.rule_policy,
        },
        &mut workbook,
    )?;

    let output = options.output_path();
    write_output_document(&result.document, &output)?;
    info!("Resultant import file is {}", output.display());
    Ok(ConvertReport {
        output,
        stats: result.stats,
    })
}

/// Lookup fields of one first letter with their value counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupLetter {
    pub letter: char,
    pub fields: Vec<(String, usize)>,
}

pub fn index_lookup_fields(lookups: &[LookupFieldRows]) -> Vec<LookupLetter> {
    let mut letters: BTreeMap<char, Vec<(String, usize)>> = BTreeMap::new();
    for field in lookups {
        if let Some(letter) = field.field_name.chars().next() {
            letters
                .entry(letter)
                .or_default()
                .push((field.field_name.clone(), field.rows.len()));
        }
    }
    letters
        .into_iter()
        .map(|(letter, mut fields)| {
            fields.sort();
            LookupLetter { letter, fields }
        })
        .collect()
}

/// Reads only the lookup sheet of the workbook and indexes its fields.
pub fn list_lookup_fields(
    xlsx: &Path,
    working_folder: &Path,
) -> Result<Vec<LookupLetter>, DictWikiError> {
    let config_ini = read_text(&working_folder.join(CONFIG_FILE_NAME), "CONFIG_NOT_FOUND")?;
    let mut config = load_program_config(&config_ini, CONFIG_FILE_NAME)?;
    config.resource_sheets.clear();

    let mut workbook = XlsxWorkbook::open(&working_folder.join(DATA_FOLDER_NAME).join(xlsx))?;
    let sheets = load_import_sheets(&mut workbook, &config)?;
    Ok(index_lookup_fields(&sheets.lookups))
}

fn read_text(path: &Path, missing_code: &str) -> Result<String, DictWikiError> {
    fs::read_to_string(path).map_err(|error| {
        DictWikiError::new(
            missing_code,
            format!("Cannot read \"{}\": {}", path.display(), error),
        )
    })
}
