use dw_core::DictWikiError;
use roxmltree::{Document, ParsingOptions};

/// Element names whose text is an already published page title stem.
pub const PRIOR_TITLE_TAGS: [&str; 2] = ["StandardName", "LookupValue"];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriorTitles {
    pub titles: Vec<String>,
    pub standard_names: usize,
    pub lookup_values: usize,
}

/// Scans a previous wiki export for field and lookup value names, keeping
/// first-seen order and dropping repeats.
pub fn collect_prior_titles(source: &str, file_name: &str) -> Result<PriorTitles, DictWikiError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(source, options).map_err(|error| {
        DictWikiError::new(
            "PRIOR_EXPORT_INVALID",
            format!("Cannot read wiki export {}: {}", file_name, error),
        )
    })?;

    let mut collected = PriorTitles::default();
    for tag in PRIOR_TITLE_TAGS {
        for node in document
            .descendants()
            .filter(|node| node.is_element() && node.tag_name().name() == tag)
        {
            if tag == PRIOR_TITLE_TAGS[0] {
                collected.standard_names += 1;
            } else {
                collected.lookup_values += 1;
            }
            let Some(text) = node.text().filter(|text| !text.is_empty()) else {
                continue;
            };
            if !collected.titles.iter().any(|known| known == text) {
                collected.titles.push(text.to_string());
            }
        }
    }
    Ok(collected)
}
