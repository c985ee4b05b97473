//! Typed operator attributes with defaulting lookups

use std::collections::HashMap;

use tracing::warn;

/// One attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Integer attribute
    Int(i64),
    /// Floating-point attribute
    Float(f32),
    /// String attribute
    Str(String),
}

/// Named attribute set parsed from a framework operator definition
///
/// Lookups never fail hard: a missing or mistyped attribute logs a warning
/// and yields the caller's default, since framework descriptions routinely
/// omit optional parameters.
#[derive(Debug, Clone, Default)]
pub struct AttrMap {
    items: HashMap<String, AttrValue>,
}

impl AttrMap {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: AttrValue) {
        self.items.insert(name.into(), value);
    }

    /// Raw lookup without defaulting
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.items.get(name)
    }

    /// Integer attribute, or `default` with a warning when absent/mistyped
    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        match self.items.get(name) {
            Some(AttrValue::Int(value)) => *value,
            Some(other) => {
                warn!(attr = name, found = ?other, default, "attribute has wrong type, using default");
                default
            }
            None => {
                warn!(attr = name, default, "attribute missing, using default");
                default
            }
        }
    }

    /// Float attribute, or `default` with a warning when absent/mistyped
    pub fn float_or(&self, name: &str, default: f32) -> f32 {
        match self.items.get(name) {
            Some(AttrValue::Float(value)) => *value,
            Some(other) => {
                warn!(attr = name, found = ?other, default, "attribute has wrong type, using default");
                default
            }
            None => {
                warn!(attr = name, default, "attribute missing, using default");
                default
            }
        }
    }

    /// String attribute, or `default` with a warning when absent/mistyped
    pub fn str_or(&self, name: &str, default: &str) -> String {
        match self.items.get(name) {
            Some(AttrValue::Str(value)) => value.clone(),
            Some(other) => {
                warn!(attr = name, found = ?other, default, "attribute has wrong type, using default");
                default.to_string()
            }
            None => {
                warn!(attr = name, default, "attribute missing, using default");
                default.to_string()
            }
        }
    }

    /// Number of attributes set
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no attributes are set
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
