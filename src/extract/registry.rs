//! Selector registry
//!
//! Immutable mapping from field name to extraction rule, built once from the
//! `[[field]]` entries at startup and shared read-only for the whole run.

use crate::config::{FieldConfig, RuleKind};
use crate::extract::rule::{CompiledSelector, ExtractionRule};
use crate::{ConfigError, HarvestError, UnknownFieldError};

/// A configured field: its rule plus the validation flags attached to it
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: String,
    pub rule: ExtractionRule,
    /// Field whose value is used when this one is absent
    pub fallback: Option<String>,
    pub required: bool,
    pub numeric: bool,
}

/// Field name to extraction rule, in configuration order
#[derive(Debug, Clone)]
pub struct SelectorRegistry {
    fields: Vec<FieldRule>,
}

impl SelectorRegistry {
    /// Builds the registry from field configuration
    ///
    /// # Errors
    ///
    /// * `ConfigError::InvalidSelector` - a selector is not valid CSS
    /// * `UnknownFieldError` - a fallback names a field that is not configured
    pub fn from_config(fields: &[FieldConfig]) -> Result<Self, HarvestError> {
        let mut rules = Vec::with_capacity(fields.len());

        for field in fields {
            let selectors = field
                .selectors
                .iter()
                .map(|source| {
                    CompiledSelector::parse(source).ok_or_else(|| ConfigError::InvalidSelector {
                        field: field.name.clone(),
                        selector: source.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let rule = match field.kind {
                RuleKind::Text => ExtractionRule::Text { selectors },
                RuleKind::Attribute => ExtractionRule::Attribute {
                    selectors,
                    name: field.attribute.clone().ok_or_else(|| {
                        ConfigError::Validation(format!(
                            "field '{}' has kind = \"attribute\" but no attribute name",
                            field.name
                        ))
                    })?,
                },
                RuleKind::Number => ExtractionRule::Number { selectors },
                RuleKind::Presence => ExtractionRule::Presence { selectors },
            };

            rules.push(FieldRule {
                name: field.name.clone(),
                rule,
                fallback: field.fallback.clone(),
                required: field.required,
                numeric: field.numeric,
            });
        }

        let registry = Self { fields: rules };

        // Every fallback must resolve before the run starts
        for field in &registry.fields {
            if let Some(fallback) = &field.fallback {
                registry.resolve(fallback)?;
            }
        }

        Ok(registry)
    }

    /// Returns the extraction rule for a field
    pub fn resolve(&self, name: &str) -> Result<&ExtractionRule, UnknownFieldError> {
        self.field(name).map(|f| &f.rule)
    }

    /// Returns the full field entry for a field
    pub fn field(&self, name: &str) -> Result<&FieldRule, UnknownFieldError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| UnknownFieldError(name.to_string()))
    }

    /// All fields in configuration order
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Field names in configuration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Names of fields marked `required`
    pub fn required_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Names of fields marked `numeric`
    pub fn numeric_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.numeric)
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
