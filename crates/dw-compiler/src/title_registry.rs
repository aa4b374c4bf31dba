use std::collections::HashSet;

/// Last words of structural page titles; such titles never collide.
pub const RESERVED_TITLE_SUFFIXES: [&str; 6] =
    ["Resource", "Group", "Collection", "Fields", "Values", "Lookups"];

pub const LOOKUP_VALUE_TEMPLATE: &str = "LookupValueTemplate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// The whole title is the comparison key.
    LookupValue,
    /// The first word of the title is the comparison key.
    Item,
}

impl PageKind {
    pub fn from_template(page_template: &str) -> Self {
        if page_template == LOOKUP_VALUE_TEMPLATE {
            Self::LookupValue
        } else {
            Self::Item
        }
    }
}

/// Run-wide set of page title stems already handed out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleRegistry {
    known: HashSet<String>,
}

impl TitleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed<I, S>(&mut self, titles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known.extend(titles.into_iter().map(Into::into));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.known.contains(key)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Returns the proposed title when its key is still free, registering the
    /// key; otherwise returns `key (disambiguator) suffix`.
    pub fn resolve_title(&mut self, proposed: &str, disambiguator: &str, kind: PageKind) -> String {
        let suffix = proposed
            .rsplit_once(' ')
            .map(|(_, last)| last)
            .unwrap_or(proposed);
        if RESERVED_TITLE_SUFFIXES.contains(&suffix) {
            return proposed.to_string();
        }

        let (key, suffix) = match kind {
            PageKind::LookupValue => (proposed, ""),
            PageKind::Item => (proposed.split(' ').next().unwrap_or(proposed), suffix),
        };

        if self.known.contains(key) {
            format!("{} ({}) {}", key, disambiguator, suffix)
                .trim_end()
                .to_string()
        } else {
            self.known.insert(key.to_string());
            proposed.to_string()
        }
    }
}

#[cfg(test)]
mod title_registry_tests {
    use super::*;

    #[test]
    fn first_writer_keeps_the_plain_title() {
        let mut titles = TitleRegistry::new();
        assert_eq!(
            titles.resolve_title("Status Field", "Property", PageKind::Item),
            "Status Field"
        );
        assert_eq!(
            titles.resolve_title("Status Field", "Member", PageKind::Item),
            "Status (Member) Field"
        );
        assert!(titles.contains("Status"));
    }

    #[test]
    fn reserved_suffixes_pass_through() {
        let mut titles = TitleRegistry::new();
        for title in ["Property Resource", "Listing Group", "Status Lookups", "Media Collection"] {
            assert_eq!(titles.resolve_title(title, "x", PageKind::Item), title);
            assert_eq!(titles.resolve_title(title, "x", PageKind::Item), title);
        }
        assert!(titles.is_empty());
    }

    #[test]
    fn lookup_values_compare_whole_title() {
        let mut titles = TitleRegistry::new();
        assert_eq!(
            titles.resolve_title("Active Under Contract", "StandardStatus", PageKind::LookupValue),
            "Active Under Contract"
        );
        assert_eq!(
            titles.resolve_title("Active", "StandardStatus", PageKind::LookupValue),
            "Active"
        );
        assert_eq!(
            titles.resolve_title("Active", "MlsStatus", PageKind::LookupValue),
            "Active (MlsStatus)"
        );
    }

    #[test]
    fn single_word_titles_use_the_word_as_key() {
        let mut titles = TitleRegistry::new();
        assert_eq!(titles.resolve_title("Pool", "Property", PageKind::Item), "Pool");
        assert_eq!(
            titles.resolve_title("Pool", "Member", PageKind::Item),
            "Pool (Member) Pool"
        );
    }

    #[test]
    fn seeded_titles_count_as_taken() {
        let mut titles = TitleRegistry::new();
        titles.seed(["ListPrice", "Active"]);
        assert_eq!(titles.len(), 2);
        assert_eq!(
            titles.resolve_title("ListPrice Field", "Property", PageKind::Item),
            "ListPrice (Property) Field"
        );
        assert_eq!(
            PageKind::from_template(LOOKUP_VALUE_TEMPLATE),
            PageKind::LookupValue
        );
        assert_eq!(PageKind::from_template("PropResourceTemplate"), PageKind::Item);
    }
}
