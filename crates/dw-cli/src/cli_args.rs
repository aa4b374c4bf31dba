use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "dictwiki")]
#[command(about = "Data dictionary workbook to wiki import converter")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Convert a workbook into a wiki import document.
    Convert(ConvertArgs),
    /// List the lookup fields of a workbook by first letter.
    Lookups(LookupsArgs),
}

#[derive(Debug, Args)]
pub(crate) struct ConvertArgs {
    #[arg(long = "xlsx")]
    pub(crate) xlsx: String,
    #[arg(long = "working-folder")]
    pub(crate) working_folder: Option<String>,
    #[arg(long = "max-id-file")]
    pub(crate) max_id_file: Option<String>,
    #[arg(long = "wiki-export")]
    pub(crate) wiki_export: Option<String>,
    /// Workbook date as YYYY-MM-DD; defaults to the run start.
    #[arg(long = "xlsx-date")]
    pub(crate) xlsx_date: Option<String>,
    #[arg(long = "output")]
    pub(crate) output: Option<String>,
    /// Fail on parsing codes that have no rule instead of skipping them.
    #[arg(long = "strict-rules")]
    pub(crate) strict_rules: bool,
    #[command(flatten)]
    pub(crate) log: LogArgs,
}

#[derive(Debug, Args)]
pub(crate) struct LookupsArgs {
    #[arg(long = "xlsx")]
    pub(crate) xlsx: String,
    #[arg(long = "working-folder")]
    pub(crate) working_folder: Option<String>,
    #[command(flatten)]
    pub(crate) log: LogArgs,
}

#[derive(Debug, Args)]
pub(crate) struct LogArgs {
    /// Overridden by RUST_LOG when set.
    #[arg(long = "log-level", default_value = "info")]
    pub(crate) log_level: String,
    #[arg(long = "log-file")]
    pub(crate) log_file: Option<String>,
}
