//! Registry of normalized models

use std::collections::BTreeMap;

use super::{Model, Property, normalize};
use crate::error::Result;

/// Outcome of registering a batch of models
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl Registration {
    /// True when the batch left the registry untouched
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty()
    }
}

/// Closed set of models. Raw definitions are kept so later batches can be
/// compared structurally and the whole set re-normalized.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    raw: BTreeMap<String, Model>,
    models: BTreeMap<String, Model>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch. Changed models replace their previous definition
    /// wholesale. The registry is unchanged if normalization fails.
    pub fn register(&mut self, batch: Vec<Model>) -> Result<Registration> {
        let mut registration = Registration::default();
        let mut raw = self.raw.clone();

        for model in batch {
            match raw.get(&model.id) {
                Some(existing) if *existing == model => {
                    registration.unchanged.push(model.id.clone());
                    continue;
                }
                Some(_) => registration.changed.push(model.id.clone()),
                None => registration.added.push(model.id.clone()),
            }
            raw.insert(model.id.clone(), model);
        }

        if registration.is_noop() {
            return Ok(registration);
        }

        self.models = normalize(&raw)?;
        self.raw = raw;

        tracing::debug!(
            added = registration.added.len(),
            changed = registration.changed.len(),
            total = self.models.len(),
            "Registered models"
        );
        Ok(registration)
    }

    pub fn get(&self, id: &str) -> Option<&Model> {
        self.models.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models that get root query fields
    pub fn fetchable(&self) -> impl Iterator<Item = &Model> {
        self.models.values().filter(|m| m.is_fetchable())
    }

    /// Walk `subClassOf` and declared interfaces looking for `ancestor`
    pub fn is_subclass_of(&self, id: &str, ancestor: &str) -> bool {
        let mut pending = vec![id];
        let mut seen = Vec::new();
        while let Some(current) = pending.pop() {
            if current == ancestor {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            if let Some(model) = self.models.get(current) {
                pending.extend(model.sub_class_of.as_deref());
                pending.extend(model.interfaces.iter().map(String::as_str));
            }
        }
        false
    }

    /// Every registered model id that is `ancestor` or descends from it
    pub fn descendants(&self, ancestor: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .models
            .keys()
            .filter(|id| self.is_subclass_of(id, ancestor))
            .cloned()
            .collect();
        if !ids.iter().any(|id| id == ancestor) {
            ids.push(ancestor.to_string());
        }
        ids
    }

    /// Whether a reference property embeds its target by value
    pub fn is_inlined_reference(&self, property: &Property) -> bool {
        property.declares_inlined()
            || property
                .reference()
                .and_then(|id| self.models.get(id))
                .is_some_and(|target| target.inlined)
    }
}
