//! Input overrides: typed lookup of script parameters by title.
//!
//! A lookup returns the override when one exists under the title and its type
//! fits, and otherwise the script's default. Integers and floats convert into
//! each other (float → int truncates toward zero). Any other mismatch falls
//! back to the default; that is part of the contract, not an error. An empty
//! title disables lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A dynamically typed override value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl InputValue {
    /// Parse command-line text: `true`/`false`, then integer, then float, else
    /// the text itself.
    pub fn parse(text: &str) -> Self {
        match text {
            "true" => InputValue::Bool(true),
            "false" => InputValue::Bool(false),
            _ => {
                if let Ok(i) = text.parse::<i64>() {
                    InputValue::Int(i)
                } else if let Ok(f) = text.parse::<f64>() {
                    InputValue::Float(f)
                } else {
                    InputValue::String(text.to_string())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputOverrides {
    values: BTreeMap<String, InputValue>,
}

impl InputOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, title: impl Into<String>, value: InputValue) {
        self.values.insert(title.into(), value);
    }

    /// Merge `other` on top of `self`.
    pub fn extend(&mut self, other: InputOverrides) {
        self.values.extend(other.values);
    }

    /// Parse a `Title=value` assignment.
    pub fn insert_assignment(&mut self, assignment: &str) -> Option<()> {
        let (title, value) = assignment.split_once('=')?;
        self.insert(title.trim(), InputValue::parse(value.trim()));
        Some(())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    fn lookup(&self, title: &str) -> Option<&InputValue> {
        if title.is_empty() {
            return None;
        }
        self.values.get(title)
    }

    pub fn int(&self, default: i64, title: &str) -> i64 {
        match self.lookup(title) {
            Some(InputValue::Int(v)) => *v,
            Some(InputValue::Float(v)) if v.is_finite() => v.trunc() as i64,
            _ => default,
        }
    }

    pub fn float(&self, default: f64, title: &str) -> f64 {
        match self.lookup(title) {
            Some(InputValue::Float(v)) => *v,
            Some(InputValue::Int(v)) => *v as f64,
            _ => default,
        }
    }

    pub fn string(&self, default: &str, title: &str) -> String {
        match self.lookup(title) {
            Some(InputValue::String(v)) => v.clone(),
            _ => default.to_string(),
        }
    }

    pub fn bool(&self, default: bool, title: &str) -> bool {
        match self.lookup(title) {
            Some(InputValue::Bool(v)) => *v,
            _ => default,
        }
    }
}

impl FromIterator<(String, InputValue)> for InputOverrides {
    fn from_iter<I: IntoIterator<Item = (String, InputValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
