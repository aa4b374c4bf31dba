use std::collections::BTreeMap;

use dw_core::{DictWikiError, MaxIdReport, SourceLocation, SourceSpan};

pub const RECORD_SECTION_MARKER: &str = "Max RecordID per Resource Report";
pub const LOOKUP_SECTION_MARKER: &str = "Max LookupID per Lookup Field";

const DEPRECATED_MARKER: &str = "Deprecated";
const BANNER_PREFIX: &str = "**";
const COLUMN_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Lookups,
    Records,
}

impl Section {
    fn label(self) -> &'static str {
        match self {
            Self::Preamble => "preamble",
            Self::Lookups => "lookup",
            Self::Records => "record",
        }
    }
}

/// Reads the wiki statistics report that lists the highest lookup id per
/// lookup field and the highest record id per resource.
pub fn parse_max_id_report(source: &str, file_name: &str) -> Result<MaxIdReport, DictWikiError> {
    let mut report = MaxIdReport::default();
    let mut section = Section::Preamble;

    for (index, line) in source.lines().enumerate() {
        if line.contains(RECORD_SECTION_MARKER) {
            section = Section::Records;
            continue;
        }
        if line.contains(LOOKUP_SECTION_MARKER) {
            section = Section::Lookups;
            continue;
        }
        if section == Section::Preamble || line.starts_with(BANNER_PREFIX) {
            continue;
        }

        let mut tokens = line.split_whitespace().collect::<Vec<_>>();
        if tokens.is_empty() {
            continue;
        }
        normalize_deprecated(&mut tokens);

        let line_no = index + 1;
        if tokens.len() != COLUMN_COUNT {
            return Err(seed_error(
                "SEED_LINE_INVALID",
                format!(
                    "Max ID file {} expects {} columns per {} line, found {} for \"{}\".",
                    file_name,
                    COLUMN_COUNT,
                    section.label(),
                    tokens.len(),
                    tokens[0]
                ),
                line_no,
            ));
        }

        let value = tokens[COLUMN_COUNT - 1].parse::<i64>().map_err(|_| {
            seed_error(
                "SEED_VALUE_INVALID",
                format!(
                    "Max ID file {} has an illegal {} id \"{}\" for \"{}\".",
                    file_name,
                    section.label(),
                    tokens[COLUMN_COUNT - 1],
                    tokens[0]
                ),
                line_no,
            )
        })?;

        let target: &mut BTreeMap<String, i64> = match section {
            Section::Lookups => &mut report.max_lookup_ids,
            Section::Records => &mut report.max_record_ids,
            Section::Preamble => continue,
        };
        target.insert(tokens[0].to_string(), value);
    }

    if report.max_record_ids.is_empty() {
        return Err(DictWikiError::new(
            "SEED_SECTION_EMPTY",
            format!("No record id entries found in max ID file {}.", file_name),
        ));
    }
    if report.max_lookup_ids.is_empty() {
        return Err(DictWikiError::new(
            "SEED_SECTION_EMPTY",
            format!("No lookup id entries found in max ID file {}.", file_name),
        ));
    }

    Ok(report)
}

// Deprecated rows carry one ("Fields") or two ("Lookup ...") extra words
// after the marker.
fn normalize_deprecated(tokens: &mut Vec<&str>) {
    if tokens.first() != Some(&DEPRECATED_MARKER) || tokens.len() < 2 {
        return;
    }
    match tokens[1] {
        "Fields" => {
            tokens.remove(1);
        }
        "Lookup" => {
            let end = tokens.len().min(3);
            tokens.drain(1..end);
        }
        _ => {}
    }
}

fn seed_error(code: &str, message: String, line: usize) -> DictWikiError {
    let location = SourceLocation { line, column: 1 };
    DictWikiError::with_span(
        code,
        message,
        SourceSpan {
            start: location.clone(),
            end: location,
        },
    )
}
