use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{registry::TypeDefinition, utils::error::AttributeError};

/// An instance of a registered type.
///
/// Holds one optional value per slot of the effective layout and, when the
/// type chain carries one, the dynamic fallback store. Slots always take
/// precedence over the fallback.
#[derive(Debug, Clone)]
pub struct Instance<V> {
    definition: Arc<TypeDefinition>,
    slots: BTreeMap<String, Option<V>>,
    dynamic: Option<BTreeMap<String, V>>,
}

impl<V> Instance<V> {
    pub(crate) fn new(
        definition: Arc<TypeDefinition>,
        slots: BTreeSet<String>,
        dynamic_store: bool,
    ) -> Self {
        Self {
            definition,
            slots: slots.into_iter().map(|name| (name, None)).collect(),
            dynamic: dynamic_store.then(BTreeMap::new),
        }
    }

    pub fn definition(&self) -> &Arc<TypeDefinition> {
        &self.definition
    }

    pub fn type_name(&self) -> &str {
        &self.definition.name
    }

    fn unset(&self, name: &str) -> AttributeError {
        AttributeError::Unset {
            type_name: self.type_name().to_string(),
            name: name.to_string(),
        }
    }

    /// Assign `name`, returning the previous value if there was one.
    pub fn set_attr(&mut self, name: &str, value: V) -> Result<Option<V>, AttributeError> {
        if let Some(slot) = self.slots.get_mut(name) {
            return Ok(slot.replace(value));
        }
        match &mut self.dynamic {
            Some(store) => Ok(store.insert(name.to_string(), value)),
            None => Err(AttributeError::NotAssignable {
                type_name: self.definition.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    pub fn get_attr(&self, name: &str) -> Result<&V, AttributeError> {
        let value = match self.slots.get(name) {
            Some(slot) => slot.as_ref(),
            None => self.dynamic.as_ref().and_then(|store| store.get(name)),
        };
        value.ok_or_else(|| self.unset(name))
    }

    /// True when `name` currently holds a value.
    pub fn has_attr(&self, name: &str) -> bool {
        self.get_attr(name).is_ok()
    }

    /// Remove the value held under `name`. The slot itself stays part of
    /// the layout and can be assigned again.
    pub fn del_attr(&mut self, name: &str) -> Result<V, AttributeError> {
        let removed = match self.slots.get_mut(name) {
            Some(slot) => slot.take(),
            None => self.dynamic.as_mut().and_then(|store| store.remove(name)),
        };
        removed.ok_or_else(|| self.unset(name))
    }

    /// Whether `name` can be assigned on this instance at all.
    pub fn accepts(&self, name: &str) -> bool {
        self.slots.contains_key(name) || self.dynamic.is_some()
    }

    /// Own layout of the instance's type, as declared on the type.
    pub fn slot_names(&self) -> &BTreeSet<String> {
        &self.definition.layout.slots
    }

    /// Every slot the instance holds, inherited ones included.
    pub fn effective_slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// The dynamic fallback store, `None` for fixed-only instances.
    pub fn dynamic_store(&self) -> Option<&BTreeMap<String, V>> {
        self.dynamic.as_ref()
    }
}
