//! Page extractor
//!
//! Applies every rule in the registry to a fetched page. Missing fields are
//! recorded as absent; only a page that is not an HTML document at all is an
//! error.

use crate::extract::{ExtractError, FieldValue, Fields, Page, SelectorRegistry};
use scraper::Html;

/// Extracts all registry fields from a page
///
/// Fields are read in registry order. A field whose rule matches nothing and
/// that declares a fallback takes the fallback field's value.
///
/// # Errors
///
/// Returns `ExtractError::PageUnreadable` if the page is not an HTML document
/// or has an empty body.
///
/// # Example
///
/// ```
/// use harvest::config::{FieldConfig, RuleKind};
/// use harvest::extract::{extract, Page, SelectorRegistry};
///
/// let registry = SelectorRegistry::from_config(&[FieldConfig {
///     name: "name".to_string(),
///     kind: RuleKind::Text,
///     selectors: vec!["h1".to_string()],
///     attribute: None,
///     fallback: None,
///     required: true,
///     numeric: false,
/// }])
/// .unwrap();
///
/// let page = Page::html("https://shop.example/p/1", "<html><body><h1>Kettle</h1></body></html>");
/// let fields = extract(&page, &registry).unwrap();
/// assert_eq!(fields["name"].as_str(), Some("Kettle"));
/// ```
pub fn extract(page: &Page, registry: &SelectorRegistry) -> Result<Fields, ExtractError> {
    check_readable(page)?;

    let document = Html::parse_document(&page.body);

    let mut fields = Fields::new();
    for field in registry.fields() {
        let value = field.rule.apply(&document);
        if !value.is_present() {
            tracing::debug!("Field '{}' not found on {}", field.name, page.url);
        }
        fields.insert(field.name.clone(), value);
    }

    // Fallbacks read the first-pass values only, so they never chain
    let resolved: Vec<(String, FieldValue)> = registry
        .fields()
        .iter()
        .filter(|f| !fields[&f.name].is_present())
        .filter_map(|f| {
            let fallback = f.fallback.as_ref()?;
            let value = fields.get(fallback)?;
            value.is_present().then(|| (f.name.clone(), value.clone()))
        })
        .collect();

    for (name, value) in resolved {
        tracing::debug!("Field '{}' filled from fallback on {}", name, page.url);
        fields.insert(name, value);
    }

    Ok(fields)
}

fn check_readable(page: &Page) -> Result<(), ExtractError> {
    if let Some(content_type) = &page.content_type {
        let lower = content_type.to_ascii_lowercase();
        if !lower.contains("html") {
            return Err(ExtractError::PageUnreadable {
                url: page.url.clone(),
                reason: format!("expected an HTML document, got '{}'", content_type),
            });
        }
    }

    if page.body.trim().is_empty() {
        return Err(ExtractError::PageUnreadable {
            url: page.url.clone(),
            reason: "empty response body".to_string(),
        });
    }

    Ok(())
}
