// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conditional update expressions.
//!
//! An update is a list of attribute assignments plus one equality
//! precondition. Attribute names and values are referenced through
//! placeholders (`#n0`, `:v0`) so that no attribute name can collide with a
//! reserved word of a store's expression language. Adapters without an
//! expression language use [`ConditionalUpdate::assignments`] and
//! [`ConditionalUpdate::precondition`], which resolve the placeholders.

use crate::db::StoreError;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// A validated set-list with an equality precondition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalUpdate {
    names: BTreeMap<String, String>,
    values: BTreeMap<String, Value>,
    sets: Vec<(String, String)>,
    condition: (String, String),
}

/// Builder for [`ConditionalUpdate`].
#[derive(Debug, Default)]
pub struct UpdateBuilder {
    sets: Vec<(String, Value)>,
    condition: Option<(String, Value)>,
}

impl UpdateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` to `attribute`.
    pub fn set(mut self, attribute: impl Into<String>, value: Value) -> Self {
        self.sets.push((attribute.into(), value));
        self
    }

    /// Require the stored `attribute` to equal `value`.
    pub fn condition_equals(mut self, attribute: impl Into<String>, value: Value) -> Self {
        self.condition = Some((attribute.into(), value));
        self
    }

    pub fn build(self) -> Result<ConditionalUpdate, StoreError> {
        if self.sets.is_empty() {
            return Err(StoreError::Expression("no attributes to set".to_string()));
        }
        let (condition_attribute, condition_value) = self
            .condition
            .ok_or_else(|| StoreError::Expression("missing precondition".to_string()))?;

        let mut seen = HashSet::new();
        for (attribute, _) in &self.sets {
            if attribute.is_empty() {
                return Err(StoreError::Expression("empty attribute name".to_string()));
            }
            if !seen.insert(attribute.as_str()) {
                return Err(StoreError::Expression(format!(
                    "attribute {attribute} assigned more than once"
                )));
            }
        }

        let mut placeholders = Placeholders::default();
        let sets = self
            .sets
            .into_iter()
            .map(|(attribute, value)| (placeholders.name(attribute), placeholders.value(value)))
            .collect();
        let condition = (
            placeholders.name(condition_attribute),
            placeholders.value(condition_value),
        );

        Ok(ConditionalUpdate {
            names: placeholders.names,
            values: placeholders.values,
            sets,
            condition,
        })
    }
}

#[derive(Default)]
struct Placeholders {
    names: BTreeMap<String, String>,
    by_attribute: BTreeMap<String, String>,
    values: BTreeMap<String, Value>,
}

impl Placeholders {
    /// One placeholder per distinct attribute.
    fn name(&mut self, attribute: String) -> String {
        if let Some(placeholder) = self.by_attribute.get(&attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.clone());
        self.by_attribute.insert(attribute, placeholder.clone());
        placeholder
    }

    fn value(&mut self, value: Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }
}

impl ConditionalUpdate {
    pub fn builder() -> UpdateBuilder {
        UpdateBuilder::new()
    }

    /// Name placeholders mapped to attribute names.
    pub fn names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    /// Value placeholders mapped to values.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// e.g. `SET #n0 = :v0, #n1 = :v1`
    pub fn update_expression(&self) -> String {
        let clauses: Vec<String> = self
            .sets
            .iter()
            .map(|(name, value)| format!("{name} = {value}"))
            .collect();
        format!("SET {}", clauses.join(", "))
    }

    /// e.g. `#n1 = :v2`
    pub fn condition_expression(&self) -> String {
        format!("{} = {}", self.condition.0, self.condition.1)
    }

    /// Assignments with placeholders resolved, in insertion order.
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.sets
            .iter()
            .map(|(name, value)| (self.resolve_name(name), &self.values[value]))
    }

    /// Attribute and expected value of the precondition.
    pub fn precondition(&self) -> (&str, &Value) {
        let (name, value) = &self.condition;
        (self.resolve_name(name), &self.values[value])
    }

    /// Whether the stored item satisfies the precondition.
    pub fn precondition_holds(&self, item: &crate::db::Attributes) -> bool {
        let (attribute, expected) = self.precondition();
        item.get(attribute) == Some(expected)
    }

    /// Assigned attributes with their new values.
    pub fn assigned(&self) -> crate::db::Attributes {
        self.assignments()
            .map(|(attribute, value)| (attribute.to_string(), value.clone()))
            .collect()
    }

    fn resolve_name<'a>(&'a self, placeholder: &'a str) -> &'a str {
        self.names
            .get(placeholder)
            .map(String::as_str)
            .unwrap_or(placeholder)
    }
}
