use dw_core::{DictWikiError, SourceLocation, SourceSpan};
use ini::{Ini, ParseOption};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IniDocument {
    pub sections: Vec<IniSection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IniSection {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl IniDocument {
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|section| section.name == name)
    }
}

impl IniSection {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry_key, _)| entry_key == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads INI text with case-sensitive keys, `=` or `:` separators and
/// `;`/`#` comment lines. Quotes and backslashes are kept as written.
pub fn parse_ini_document(source: &str, file_name: &str) -> Result<IniDocument, DictWikiError> {
    let option = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(source, option).map_err(|error| {
        let location = SourceLocation {
            line: error.line,
            column: error.col,
        };
        DictWikiError::with_span(
            "INI_LINE_INVALID",
            format!("{} is not valid INI: {}", file_name, error),
            SourceSpan {
                start: location.clone(),
                end: location,
            },
        )
    })?;

    let mut document = IniDocument::default();
    for (name, properties) in ini.iter() {
        let Some(name) = name else {
            if let Some((key, _)) = properties.iter().next() {
                return Err(DictWikiError::new(
                    "INI_KEY_OUTSIDE_SECTION",
                    format!("Key \"{}\" of {} is not inside a [section].", key, file_name),
                ));
            }
            continue;
        };
        if document.section(name).is_some() {
            return Err(DictWikiError::new(
                "INI_DUPLICATE_SECTION",
                format!("Section \"{}\" appears twice in {}.", name, file_name),
            ));
        }

        let mut section = IniSection {
            name: name.to_string(),
            entries: Vec::new(),
        };
        for (key, value) in properties.iter() {
            if key.is_empty() {
                return Err(DictWikiError::new(
                    "INI_LINE_INVALID",
                    format!("Section [{}] of {} has an empty key.", name, file_name),
                ));
            }
            if section.get(key).is_some() {
                return Err(DictWikiError::new(
                    "INI_DUPLICATE_KEY",
                    format!(
                        "Key \"{}\" appears twice in section [{}] of {}.",
                        key, name, file_name
                    ),
                ));
            }
            section.entries.push((key.to_string(), value.to_string()));
        }
        document.sections.push(section);
    }

    Ok(document)
}
