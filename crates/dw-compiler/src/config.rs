use std::collections::BTreeMap;

use dw_core::DictWikiError;
use dw_parser::{parse_ini_document, IniDocument, IniSection};

pub const RESOURCE_SHEETS_SECTION: &str = "ResourceSheets";
pub const LOOKUP_SHEETS_SECTION: &str = "LookupSheets";
pub const LOOKUP_SHEET_KEY: &str = "LookupSheet";
pub const RESOURCE_DESCRIPTIONS_SECTION: &str = "Resource-Descriptions";
pub const PAGE_LINKS_SECTION: &str = "PageLinks";

pub const PROP_ITEM_FORM: &str = "PropResourceField";
pub const COLLECTION_ITEM_FORM: &str = "CollectionResourceField";
pub const LOOKUP_ITEM_FORM: &str = "LookupValue";
pub const OTHER_ITEM_FORM: &str = "OtherResourceField";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSheetConfig {
    pub sheet_name: String,
    pub resource_name: String,
}

/// Program settings read from `config.ini`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramConfig {
    pub resource_sheets: Vec<ResourceSheetConfig>,
    pub lookup_sheet: Option<String>,
    pub resource_descriptions: BTreeMap<String, String>,
    pub page_links: BTreeMap<String, String>,
}

impl ProgramConfig {
    pub fn from_ini(document: &IniDocument, file_name: &str) -> Result<Self, DictWikiError> {
        let resource_sheets = document
            .section(RESOURCE_SHEETS_SECTION)
            .filter(|section| !section.is_empty())
            .map(|section| {
                section
                    .entries
                    .iter()
                    .map(|(sheet_name, resource_name)| ResourceSheetConfig {
                        sheet_name: sheet_name.clone(),
                        resource_name: resource_name.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let lookup_sheet = match document
            .section(LOOKUP_SHEETS_SECTION)
            .filter(|section| !section.is_empty())
        {
            Some(section) => match section.get(LOOKUP_SHEET_KEY) {
                Some(name) if !name.is_empty() => Some(name.to_string()),
                _ => {
                    return Err(DictWikiError::new(
                        "CONFIG_LOOKUP_SHEET_MISSING",
                        format!(
                            "Section [{}] in {} has no \"{}\" key.",
                            LOOKUP_SHEETS_SECTION, file_name, LOOKUP_SHEET_KEY
                        ),
                    ))
                }
            },
            None => None,
        };

        if resource_sheets.is_empty() && lookup_sheet.is_none() {
            return Err(DictWikiError::new(
                "CONFIG_SHEETS_MISSING",
                format!(
                    "Missing sections [{}] and [{}] in {}.",
                    RESOURCE_SHEETS_SECTION, LOOKUP_SHEETS_SECTION, file_name
                ),
            ));
        }

        // Descriptions are stored as sentences ready to drop into a page.
        let resource_descriptions = section_map(document.section(RESOURCE_DESCRIPTIONS_SECTION))
            .into_iter()
            .map(|(token, description)| (token, format!("{}. ", description)))
            .collect();

        Ok(Self {
            resource_sheets,
            lookup_sheet,
            resource_descriptions,
            page_links: section_map(document.section(PAGE_LINKS_SECTION)),
        })
    }

    pub fn page_link(&self, token: &str) -> Option<&str> {
        self.page_links.get(token).map(String::as_str)
    }

    pub fn resource_description(&self, token: &str) -> Option<&str> {
        self.resource_descriptions.get(token).map(String::as_str)
    }

    /// Form used for the leaf rows of a resource, picked from the shape of
    /// the resource's page-link title.
    pub fn item_form_name(&self, resource_name: &str) -> Result<&'static str, DictWikiError> {
        let Some(full_name) = self.page_link(resource_name) else {
            return Err(DictWikiError::new(
                "PAGE_LINK_MISSING",
                format!(
                    "Cannot find resource \"{}\" in config.ini [{}] section.",
                    resource_name, PAGE_LINKS_SECTION
                ),
            ));
        };

        if full_name == "Property Resource" {
            Ok(PROP_ITEM_FORM)
        } else if full_name.split_whitespace().last() == Some("Collection") {
            Ok(COLLECTION_ITEM_FORM)
        } else if full_name.starts_with("Lookup") {
            Ok(LOOKUP_ITEM_FORM)
        } else {
            Ok(OTHER_ITEM_FORM)
        }
    }
}

pub fn load_program_config(source: &str, file_name: &str) -> Result<ProgramConfig, DictWikiError> {
    let document = parse_ini_document(source, file_name)?;
    ProgramConfig::from_ini(&document, file_name)
}

fn section_map(section: Option<&IniSection>) -> BTreeMap<String, String> {
    section
        .map(|section| section.entries.iter().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod config_tests {
    use super::*;

    const SAMPLE: &str = r#"
[ResourceSheets]
Property = Property
Media = Media

[LookupSheets]
LookupSheet = Lookups

[Resource-Descriptions]
Property = The property being listed
Media Collection = Photos and documents

[PageLinks]
Property = Property Resource
Media = Media Collection
Member = Member Resource
Lookup = Lookup Resource
"#;

    #[test]
    fn load_reads_all_sections() {
        let config = load_program_config(SAMPLE, "config.ini").expect("config");
        assert_eq!(
            config.resource_sheets,
            vec![
                ResourceSheetConfig {
                    sheet_name: "Property".to_string(),
                    resource_name: "Property".to_string(),
                },
                ResourceSheetConfig {
                    sheet_name: "Media".to_string(),
                    resource_name: "Media".to_string(),
                },
            ]
        );
        assert_eq!(config.lookup_sheet.as_deref(), Some("Lookups"));
        assert_eq!(
            config.resource_description("Property"),
            Some("The property being listed. ")
        );
        assert_eq!(config.page_link("Media"), Some("Media Collection"));
    }

    #[test]
    fn item_form_follows_page_link_title() {
        let config = load_program_config(SAMPLE, "config.ini").expect("config");
        assert_eq!(config.item_form_name("Property"), Ok(PROP_ITEM_FORM));
        assert_eq!(config.item_form_name("Media"), Ok(COLLECTION_ITEM_FORM));
        assert_eq!(config.item_form_name("Lookup"), Ok(LOOKUP_ITEM_FORM));
        assert_eq!(config.item_form_name("Member"), Ok(OTHER_ITEM_FORM));

        let error = config
            .item_form_name("Office")
            .expect_err("unknown resource");
        assert_eq!(error.code, "PAGE_LINK_MISSING");
    }

    #[test]
    fn optional_sections_default_to_empty() {
        let config =
            load_program_config("[LookupSheets]\nLookupSheet = Lookups\n", "config.ini")
                .expect("config");
        assert!(config.resource_sheets.is_empty());
        assert!(config.page_links.is_empty());
        assert!(config.resource_descriptions.is_empty());
    }

    #[test]
    fn missing_sheet_sections_fail() {
        let error = load_program_config("[PageLinks]\nA = B\n", "config.ini")
            .expect_err("no sheets");
        assert_eq!(error.code, "CONFIG_SHEETS_MISSING");

        let error = load_program_config("[LookupSheets]\nSheet = Lookups\n", "config.ini")
            .expect_err("no lookup sheet key");
        assert_eq!(error.code, "CONFIG_LOOKUP_SHEET_MISSING");
    }
}
