use std::ffi::OsString;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use dw_api::{convert_workbook, list_lookup_fields, ConvertOptions};
use dw_compiler::UnmappedRulePolicy;
use dw_core::DictWikiError;

mod cli_args;
mod error_map;
mod logging;

pub(crate) use cli_args::{Cli, ConvertArgs, LogArgs, LookupsArgs, Mode};
pub(crate) use error_map::{
    emit_error, map_cli_date, map_cli_log_file, map_cli_log_level, map_cli_path,
};
pub(crate) use logging::init_logging;

const XLSX_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, DictWikiError> {
    match cli.command {
        Mode::Convert(args) => run_convert(args),
        Mode::Lookups(args) => run_lookups(args),
    }
}

fn run_convert(args: ConvertArgs) -> Result<i32, DictWikiError> {
    init_logging(&args.log)?;
    let options = convert_options(args)?;
    let report = convert_workbook(&options)?;

    println!("RESULT:OK");
    println!("OUTPUT:{}", report.output.display());
    println!("RESOURCES:{}", report.stats.resources);
    println!("LOOKUP_FIELDS:{}", report.stats.lookup_fields);
    println!("LOOKUP_VALUES:{}", report.stats.lookup_values);
    Ok(0)
}

fn run_lookups(args: LookupsArgs) -> Result<i32, DictWikiError> {
    init_logging(&args.log)?;
    let working_folder = resolve_working_folder(args.working_folder)?;
    let letters = list_lookup_fields(&PathBuf::from(args.xlsx), &working_folder)?;

    println!("RESULT:OK");
    for letter in letters {
        println!("LETTER:{}", letter.letter);
        for (name, count) in letter.fields {
            println!("FIELD:{}|{}", name, count);
        }
    }
    Ok(0)
}

fn convert_options(args: ConvertArgs) -> Result<ConvertOptions, DictWikiError> {
    let working_folder = resolve_working_folder(args.working_folder)?;
    let mut options = ConvertOptions::new(args.xlsx, working_folder);
    if let Some(max_id_file) = args.max_id_file {
        options.max_id_file = max_id_file;
    }
    options.wiki_export = args.wiki_export;
    options.xlsx_date = args
        .xlsx_date
        .as_deref()
        .map(parse_xlsx_date)
        .transpose()?;
    options.output = args.output.map(PathBuf::from);
    if args.strict_rules {
        options.rule_policy = UnmappedRulePolicy::Reject;
    }
    Ok(options)
}

fn resolve_working_folder(raw: Option<String>) -> Result<PathBuf, DictWikiError> {
    match raw {
        Some(folder) => Ok(PathBuf::from(folder)),
        None => std::env::current_dir().map_err(map_cli_path),
    }
}

fn parse_xlsx_date(raw: &str) -> Result<NaiveDate, DictWikiError> {
    NaiveDate::parse_from_str(raw.trim(), XLSX_DATE_FORMAT).map_err(map_cli_date)
}
