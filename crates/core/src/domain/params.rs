use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw field values pulled out of free text, not yet validated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialParams {
    fields: BTreeMap<String, String>,
}

impl PartialParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.fields.remove(field);
        } else {
            self.fields.insert(field.to_string(), trimmed.to_string());
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Values in `newer` replace values already present.
    pub fn merge(&mut self, newer: PartialParams) {
        for (field, value) in newer.fields {
            self.fields.insert(field, value);
        }
    }

    /// Drops every field the schema does not know about.
    pub fn restricted_to(mut self, schema: &ParameterSchema) -> Self {
        self.fields.retain(|field, _| schema.field(field).is_some());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Static description of the parameters one advisor collects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParameterSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl ParameterSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| field.required)
    }
}
