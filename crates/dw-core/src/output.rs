use serde::{Deserialize, Serialize};

pub const PAGE_TEMPLATE_ATTR: &str = "Page_Template";
pub const PAGE_TITLE_ATTR: &str = "Page_Title";
pub const LINK_ATTR: &str = "Link";

/// Element of the output tree handed to the serializer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<OutputNode>,
}

impl OutputNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Replaces an existing attribute in place so attribute order stays stable.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn push(&mut self, child: OutputNode) {
        self.children.push(child);
    }

    pub fn child(&self, tag: &str) -> Option<&OutputNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut OutputNode> {
        self.children.iter_mut().find(|child| child.tag == tag)
    }

    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a OutputNode> {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    pub fn page_title(&self) -> Option<&str> {
        self.attr(PAGE_TITLE_ATTR)
    }

    pub fn page_template(&self) -> Option<&str> {
        self.attr(PAGE_TEMPLATE_ATTR)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub root: OutputNode,
}
