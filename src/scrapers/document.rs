//! Typed queries over a parsed HTML document.

use regex::Regex;
use scraper::{ElementRef, Html};

/// A node in a [`ParsedDocument`].
pub type Node<'a> = ElementRef<'a>;

/// Explicit element predicate: tag name, optional class pattern, optional attribute test.
///
/// ```ignore
/// let published = ElementMatch::tags(&["meta"]).attr_eq("property", "article:published_time");
/// let stamped = ElementMatch::tags(&["time"]).has_attr("datetime");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ElementMatch<'p> {
    tags: &'p [&'p str],
    class: Option<&'p Regex>,
    attribute: Option<(&'p str, Option<&'p str>)>,
}

impl<'p> ElementMatch<'p> {
    /// Match elements whose tag is any of `tags`.
    pub const fn tags(tags: &'p [&'p str]) -> Self {
        Self { tags, class: None, attribute: None }
    }

    /// Additionally require the `class` attribute to match `pattern`.
    pub fn class_matching(mut self, pattern: &'p Regex) -> Self {
        self.class = Some(pattern);
        self
    }

    /// Additionally require attribute `name` to be present.
    pub fn has_attr(mut self, name: &'p str) -> Self {
        self.attribute = Some((name, None));
        self
    }

    /// Additionally require attribute `name` to equal `value`.
    pub fn attr_eq(mut self, name: &'p str, value: &'p str) -> Self {
        self.attribute = Some((name, Some(value)));
        self
    }

    pub fn matches(&self, node: &Node<'_>) -> bool {
        let element = node.value();
        if !self.tags.iter().any(|t| element.name().eq_ignore_ascii_case(t)) {
            return false;
        }
        if let Some(pattern) = self.class {
            match element.attr("class") {
                Some(class) if pattern.is_match(class) => {}
                _ => return false,
            }
        }
        match self.attribute {
            None => true,
            Some((name, None)) => element.attr(name).is_some(),
            Some((name, Some(expected))) => element.attr(name) == Some(expected),
        }
    }
}

/// A parsed HTML document.
pub struct ParsedDocument {
    html: Html,
}

impl ParsedDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// All elements, in document order.
    fn elements(&self) -> impl Iterator<Item = Node<'_>> {
        self.html.root_element().descendants().filter_map(ElementRef::wrap)
    }

    /// First element in document order satisfying `predicate`.
    pub fn find_first(&self, predicate: &ElementMatch<'_>) -> Option<Node<'_>> {
        self.elements().find(|node| predicate.matches(node))
    }

    /// Every element satisfying `predicate`, in document order.
    pub fn find_all(&self, predicate: &ElementMatch<'_>) -> Vec<Node<'_>> {
        self.elements().filter(|node| predicate.matches(node)).collect()
    }

    /// Concatenated text of `node` and all its descendants.
    pub fn text(node: &Node<'_>) -> String {
        node.text().collect()
    }

    /// Value of attribute `name` on `node`.
    pub fn attribute<'a>(node: &Node<'a>, name: &str) -> Option<&'a str> {
        node.value().attr(name)
    }
}
