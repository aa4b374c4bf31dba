mod ini;
mod prior_export;
mod seed;
mod xml;

pub use ini::{parse_ini_document, IniDocument, IniSection};
pub use prior_export::{collect_prior_titles, PriorTitles, PRIOR_TITLE_TAGS};
pub use seed::{parse_max_id_report, LOOKUP_SECTION_MARKER, RECORD_SECTION_MARKER};
pub use xml::{
    element_children, inline_text_content, parse_xml_document, XmlDocument, XmlElementNode,
    XmlNode, XmlTextNode,
};
