use dw_core::DictWikiError;
use std::fmt::Display;

fn map_error(code: &'static str, error: impl Display) -> DictWikiError {
    DictWikiError::new(code, error.to_string())
}

pub(crate) fn emit_error(error: DictWikiError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
    );
    1
}

pub(crate) fn map_cli_path(error: std::io::Error) -> DictWikiError {
    map_error("CLI_PATH", error)
}

pub(crate) fn map_cli_date(error: chrono::ParseError) -> DictWikiError {
    map_error("CLI_DATE_INVALID", error)
}

pub(crate) fn map_cli_log_file(error: std::io::Error) -> DictWikiError {
    map_error("CLI_LOG_FILE", error)
}

pub(crate) fn map_cli_log_level(error: impl Display) -> DictWikiError {
    map_error("CLI_LOG_LEVEL", error)
}
