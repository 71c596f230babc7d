//! DOM snapshot querying.
//!
//! A [`Document`] wraps one parsed page snapshot, and [`ElementHandle`]
//! exposes the minimal capability surface field extraction needs: visible
//! text, attribute reads, and scoped lookups. Absence of a match is a
//! first-class outcome — `find_one` returns `None` and `find_all` returns an
//! empty vector, never an error — so callers can substitute sentinels
//! uniformly.

use scraper::{ElementRef, Html, Selector as CssSelector};
use thiserror::Error;

/// Error produced when a selector fails to parse at plan-compile time.
#[derive(Debug, Clone, Error)]
#[error("invalid selector '{selector}': {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

/// A selector compiled for execution against a snapshot.
///
/// `Css` covers structural paths; `FollowingSibling` is the relational
/// lookup anchored plans need ("the `ul` that follows this heading"). A
/// relational selector only resolves inside an element scope — at document
/// scope there is no reference node, so it matches nothing.
#[derive(Debug, Clone)]
pub enum CompiledSelector {
    Css(CssSelector),
    FollowingSibling(String),
}

impl CompiledSelector {
    /// Parse a CSS selector.
    pub fn css(input: &str) -> Result<Self, SelectorError> {
        CssSelector::parse(input)
            .map(CompiledSelector::Css)
            .map_err(|err| SelectorError {
                selector: input.to_string(),
                message: err.to_string(),
            })
    }

    /// Build a following-sibling lookup for the given tag name.
    pub fn following_sibling(tag: &str) -> Self {
        CompiledSelector::FollowingSibling(tag.trim().to_ascii_lowercase())
    }

    /// Whether this selector needs an element scope to resolve.
    pub fn is_relational(&self) -> bool {
        matches!(self, CompiledSelector::FollowingSibling(_))
    }
}

/// One parsed page snapshot.
pub struct Document {
    inner: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Document {
            inner: Html::parse_document(html),
        }
    }

    /// Resolve a selector to the first match under the document root.
    pub fn find_one(&self, selector: &CompiledSelector) -> Option<ElementHandle<'_>> {
        self.find_all(selector).into_iter().next()
    }

    /// Resolve a selector to every match under the document root, in DOM order.
    pub fn find_all(&self, selector: &CompiledSelector) -> Vec<ElementHandle<'_>> {
        match selector {
            CompiledSelector::Css(css) => self
                .inner
                .select(css)
                .map(|element| ElementHandle { element })
                .collect(),
            // No reference node at document scope.
            CompiledSelector::FollowingSibling(_) => Vec::new(),
        }
    }
}

/// Handle to one element inside a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ElementHandle<'a> {
    element: ElementRef<'a>,
}

impl<'a> ElementHandle<'a> {
    /// The element's visible text: descendant text nodes joined, with
    /// whitespace runs collapsed to single spaces.
    pub fn text(&self) -> String {
        let raw: String = self.element.text().collect();
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Read a named attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.element.value().attr(name).map(|value| value.to_string())
    }

    /// Resolve a selector to the first match within this element's scope.
    pub fn find_one(&self, selector: &CompiledSelector) -> Option<ElementHandle<'a>> {
        match selector {
            CompiledSelector::Css(css) => self
                .element
                .select(css)
                .next()
                .map(|element| ElementHandle { element }),
            CompiledSelector::FollowingSibling(tag) => {
                self.following_siblings(tag).into_iter().next()
            }
        }
    }

    /// Resolve a selector to every match within this element's scope.
    pub fn find_all(&self, selector: &CompiledSelector) -> Vec<ElementHandle<'a>> {
        match selector {
            CompiledSelector::Css(css) => self
                .element
                .select(css)
                .map(|element| ElementHandle { element })
                .collect(),
            CompiledSelector::FollowingSibling(tag) => self.following_siblings(tag),
        }
    }

    fn following_siblings(&self, tag: &str) -> Vec<ElementHandle<'a>> {
        self.element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|sibling| sibling.value().name().eq_ignore_ascii_case(tag))
            .map(|element| ElementHandle { element })
            .collect()
    }
}
