//! Extraction rules
//!
//! A rule is a tagged union over the ways a field can be read from a page.
//! Every variant carries an ordered list of CSS selectors; the first selector
//! that produces a value wins.

use crate::extract::FieldValue;
use scraper::{ElementRef, Html, Selector};
use std::fmt;

/// A CSS selector together with the text it was parsed from
#[derive(Debug, Clone)]
pub struct CompiledSelector {
    source: String,
    selector: Selector,
}

impl CompiledSelector {
    /// Parses a CSS selector, returning `None` if it is not valid
    pub fn parse(source: &str) -> Option<Self> {
        Selector::parse(source).ok().map(|selector| Self {
            source: source.to_string(),
            selector,
        })
    }

    fn first<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        document.select(&self.selector).next()
    }
}

impl fmt::Display for CompiledSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// How a field is read from a page
#[derive(Debug, Clone)]
pub enum ExtractionRule {
    /// Trimmed text content of the first matching element
    Text { selectors: Vec<CompiledSelector> },

    /// Value of an attribute on the first matching element
    Attribute {
        selectors: Vec<CompiledSelector>,
        name: String,
    },

    /// First number in the matched text, thousands separators removed
    Number { selectors: Vec<CompiledSelector> },

    /// `1` when any selector matches, `0` otherwise; never absent
    Presence { selectors: Vec<CompiledSelector> },
}

impl ExtractionRule {
    /// The selectors this rule tries, in order
    pub fn selectors(&self) -> &[CompiledSelector] {
        match self {
            Self::Text { selectors }
            | Self::Attribute { selectors, .. }
            | Self::Number { selectors }
            | Self::Presence { selectors } => selectors,
        }
    }

    /// Short name of the rule kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Attribute { .. } => "attribute",
            Self::Number { .. } => "number",
            Self::Presence { .. } => "presence",
        }
    }

    /// Applies the rule to a parsed document
    ///
    /// A rule that matches nothing yields `FieldValue::Absent`; it never fails.
    pub fn apply(&self, document: &Html) -> FieldValue {
        match self {
            Self::Text { selectors } => first_value(selectors, document, |el| {
                non_empty(element_text(&el))
            }),
            Self::Attribute { selectors, name } => first_value(selectors, document, |el| {
                el.value().attr(name).and_then(|v| non_empty(v.trim().to_string()))
            }),
            Self::Number { selectors } => first_value(selectors, document, |el| {
                parse_number(&element_text(&el))
            }),
            Self::Presence { selectors } => {
                let found = selectors.iter().any(|s| s.first(document).is_some());
                FieldValue::Present(if found { "1" } else { "0" }.to_string())
            }
        }
    }
}

fn first_value<F>(selectors: &[CompiledSelector], document: &Html, read: F) -> FieldValue
where
    F: Fn(ElementRef<'_>) -> Option<String>,
{
    selectors
        .iter()
        .filter_map(|s| s.first(document))
        .find_map(read)
        .map(FieldValue::Present)
        .unwrap_or(FieldValue::Absent)
}

fn element_text(element: &ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Extracts the first number from display text
///
/// Thousands separators are dropped and a decimal fraction is kept, so
/// `"12,900원"` becomes `"12900"` and `"$1,299.50"` becomes `"1299.50"`.
/// Returns `None` when the text holds no digits.
pub fn parse_number(text: &str) -> Option<String> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let start = cleaned.find(|c: char| c.is_ascii_digit())?;
    let rest = &cleaned[start..];

    let int_len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let mut number = rest[..int_len].to_string();

    let after = &rest[int_len..];
    if let Some(fraction) = after.strip_prefix('.') {
        let frac_len = fraction
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(fraction.len());
        if frac_len > 0 {
            number.push('.');
            number.push_str(&fraction[..frac_len]);
        }
    }

    Some(number)
}
