//! Headless rendered output and the queries tests run against it

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Heading,
    Text,
    Alert,
    Textbox,
    Combobox,
    Button,
}

/// One rendered element
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub role: Role,
    pub text: String,
    /// Identifies the element to its view when it is the target of an event
    pub key: Option<String>,
    pub placeholder: Option<String>,
    pub test_id: Option<String>,
    pub value: Option<String>,
    pub options: Vec<String>,
}

impl Node {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            key: None,
            placeholder: None,
            test_id: None,
            value: None,
            options: Vec::new(),
        }
    }

    pub fn heading(text: impl Into<String>) -> Self {
        Self::new(Role::Heading, text)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Role::Text, text)
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self::new(Role::Alert, text)
    }

    pub fn textbox(key: &str, placeholder: &str, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.to_string()),
            placeholder: Some(placeholder.to_string()),
            value: Some(value.into()),
            ..Self::new(Role::Textbox, "")
        }
    }

    pub fn combobox<I, S>(key: &str, options: I, value: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: Some(key.to_string()),
            value: Some(value.into()),
            options: options.into_iter().map(Into::into).collect(),
            ..Self::new(Role::Combobox, "")
        }
    }

    pub fn button(key: &str, label: impl Into<String>) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::new(Role::Button, label)
        }
    }

    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }
}

/// How a test locates an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Whole text, exact
    Text(String),
    /// Substring of the text, ignoring case
    TextContains(String),
    Placeholder(String),
    Role(Role),
    /// Button whose label contains this, ignoring case
    Button(String),
    TestId(String),
}

impl Query {
    pub fn text(text: impl Into<String>) -> Self {
        Query::Text(text.into())
    }

    pub fn text_contains(text: impl Into<String>) -> Self {
        Query::TextContains(text.into())
    }

    pub fn placeholder(placeholder: impl Into<String>) -> Self {
        Query::Placeholder(placeholder.into())
    }

    pub fn button(label: impl Into<String>) -> Self {
        Query::Button(label.into())
    }

    pub fn test_id(test_id: impl Into<String>) -> Self {
        Query::TestId(test_id.into())
    }

    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Query::Text(text) => node.text.trim() == text,
            Query::TextContains(needle) => contains_ignore_case(&node.text, needle),
            Query::Placeholder(p) => node.placeholder.as_deref() == Some(p.as_str()),
            Query::Role(role) => node.role == *role,
            Query::Button(label) => node.role == Role::Button && contains_ignore_case(&node.text, label),
            Query::TestId(id) => node.test_id.as_deref() == Some(id.as_str()),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Text(t) => write!(f, "text {:?}", t),
            Query::TextContains(t) => write!(f, "text containing {:?}", t),
            Query::Placeholder(p) => write!(f, "placeholder {:?}", p),
            Query::Role(r) => write!(f, "role {:?}", r),
            Query::Button(l) => write!(f, "button {:?}", l),
            Query::TestId(id) => write!(f, "test id {:?}", id),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// A rendered page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) -> &mut Self {
        self.nodes.push(node);
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, query: &Query) -> Option<&Node> {
        self.nodes.iter().find(|n| query.matches(n))
    }

    pub fn find_all(&self, query: &Query) -> Vec<&Node> {
        self.nodes.iter().filter(|n| query.matches(n)).collect()
    }

    pub fn contains(&self, query: &Query) -> bool {
        self.find(query).is_some()
    }

    /// Exact text present on some element
    pub fn has_text(&self, text: &str) -> bool {
        self.contains(&Query::text(text))
    }

    /// All visible text, one element per line
    pub fn text_content(&self) -> String {
        self.nodes
            .iter()
            .filter(|n| !n.text.is_empty())
            .map(|n| n.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text_content())
    }
}
