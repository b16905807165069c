//! In-memory routing: path patterns with `:param` segments and a history
//! stack preloaded with initial entries

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::render::view::Page;

/// Parameters captured from `:name` segments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(BTreeMap<String, String>);

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    /// `*` swallows the rest of the path
    Rest,
}

/// A route path such as `/perks/:perkId/view`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s {
                "*" => Segment::Rest,
                s if s.starts_with(':') => Segment::Param(s[1..].to_string()),
                s => Segment::Static(s.to_string()),
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a location (query string and fragment ignored). Static
    /// segments compare case-insensitively.
    pub fn matches(&self, location: &str) -> Option<RouteParams> {
        let parts: Vec<&str> = split_path(path_of(location)).collect();
        let mut params = BTreeMap::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => {
                    params.insert("*".to_string(), parts[i.min(parts.len())..].join("/"));
                    return Some(RouteParams(params));
                }
                Segment::Static(expected) => {
                    if !parts.get(i)?.eq_ignore_ascii_case(expected) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), parts.get(i)?.to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(RouteParams(params))
    }
}

fn path_of(location: &str) -> &str {
    location
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default()
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Route table; the first matching pattern wins
#[derive(Clone, Default)]
pub struct Routes {
    routes: Vec<(RoutePattern, Arc<dyn Page>)>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: &str, page: impl Page + 'static) -> Self {
        self.routes.push((RoutePattern::parse(pattern), Arc::new(page)));
        self
    }

    pub fn resolve(&self, location: &str) -> Option<(Arc<dyn Page>, RouteParams)> {
        self.routes
            .iter()
            .find_map(|(pattern, page)| pattern.matches(location).map(|params| (Arc::clone(page), params)))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(p, _)| p.as_str()))
            .finish()
    }
}

/// Navigation stack kept entirely in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryHistory {
    entries: Vec<String>,
    index: usize,
}

impl MemoryHistory {
    /// Preload `entries`; the last one is the current location. An empty
    /// list starts at `/`.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            entries.push("/".to_string());
        }
        let index = entries.len() - 1;
        Self { entries, index }
    }

    pub fn location(&self) -> &str {
        &self.entries[self.index]
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Push a new entry, dropping any forward history
    pub fn push(&mut self, location: impl Into<String>) {
        self.entries.truncate(self.index + 1);
        self.entries.push(location.into());
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, location: impl Into<String>) {
        self.entries[self.index] = location.into();
    }

    /// Step back; false when already at the first entry
    pub fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        self.index += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("/perks", "/perks", true ; "exact static")]
    #[test_case("/perks", "/perks/", true ; "trailing slash")]
    #[test_case("/perks", "/Perks", true ; "case insensitive")]
    #[test_case("/perks", "/perks/create", false ; "longer path")]
    #[test_case("/perks/:perkId/view", "/perks/abc/view", true ; "param")]
    #[test_case("/perks/:perkId/view", "/perks/abc/edit", false ; "static mismatch after param")]
    #[test_case("/perks/:perkId/view", "/perks/view", false ; "missing param")]
    #[test_case("/explore", "/explore?merchant=x", true ; "query ignored")]
    #[test_case("/docs/*", "/docs/a/b", true ; "rest")]
    fn test_pattern_matching(pattern: &str, location: &str, expected: bool) {
        assert_eq!(RoutePattern::parse(pattern).matches(location).is_some(), expected);
    }

    #[test]
    fn test_params_are_extracted() {
        let params = RoutePattern::parse("/perks/:perkId/view")
            .matches("/perks/65f0c0ffee/view#top")
            .unwrap();
        assert_eq!(params.get("perkId"), Some("65f0c0ffee"));
        assert_eq!(params.get("other"), None);
    }

    #[test]
    fn test_history_starts_at_last_entry() {
        let mut history = MemoryHistory::new(["/perks", "/perks/1/view"]);
        assert_eq!(history.location(), "/perks/1/view");

        assert!(history.back());
        assert_eq!(history.location(), "/perks");
        assert!(!history.back());

        history.push("/explore");
        assert_eq!(history.entries(), ["/perks", "/explore"]);
        assert!(!history.forward());

        history.replace("/perks/create");
        assert_eq!(history.location(), "/perks/create");
    }

    #[test]
    fn test_empty_history_is_root() {
        let history = MemoryHistory::new(Vec::<String>::new());
        assert_eq!(history.location(), "/");
    }
}
