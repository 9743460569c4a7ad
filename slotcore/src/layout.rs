//! Layout builder
//!
//! Merges what the author declared with what the scanner inferred into the
//! layout contribution of a single type. Ancestors are not consulted here;
//! see [`crate::hierarchy`] for everything that depends on them.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    namespace::Namespace,
    scanner::inferred_attribute_names_with,
    utils::{
        conf::RegistryConfig,
        error::{SlotError, SlotResult},
    },
};

/// Attribute names a type's instances hold directly, beyond those its
/// ancestors already provide, plus whether the type carries the dynamic
/// fallback store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedLayout {
    pub slots: BTreeSet<String>,
    pub dynamic_store: bool,
}

impl FixedLayout {
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains(name)
    }

    /// True when the layout neither adds slots nor carries a dynamic store.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && !self.dynamic_store
    }

    /// The layout spelled as a declaration: the slot names, plus the
    /// dynamic store marker when present. Feeding this back as the declared
    /// names of an equivalent namespace rebuilds the same layout.
    pub fn declared_names(&self, config: &RegistryConfig) -> Vec<String> {
        let mut names: Vec<String> = self.slots.iter().cloned().collect();
        if self.dynamic_store {
            names.push(config.dynamic_store_name.clone());
        }
        names
    }
}

/// Identifier check applied to pre-declared names.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Computes the own layout contribution of a type from its namespace.
pub struct LayoutBuilder<'a> {
    config: &'a RegistryConfig,
}

impl<'a> LayoutBuilder<'a> {
    pub fn new(config: &'a RegistryConfig) -> Self {
        Self { config }
    }

    /// Union of the pre-declared names and, when `infer` is set and the
    /// namespace has a constructor, the names the constructor assigns.
    ///
    /// The reserved dynamic store name never becomes a slot; it sets
    /// [`FixedLayout::dynamic_store`] instead.
    pub fn build(&self, type_name: &str, namespace: &Namespace, infer: bool) -> SlotResult<FixedLayout> {
        let mut layout = FixedLayout::default();

        for name in namespace.declared_slots.iter().flatten() {
            if !is_identifier(name) {
                return Err(SlotError::InvalidSlotName {
                    type_name: type_name.to_string(),
                    slot: name.clone(),
                });
            }
            self.insert(&mut layout, name);
        }

        if let (true, Some(constructor)) = (infer, &namespace.constructor) {
            let inferred =
                inferred_attribute_names_with(constructor, &self.config.instance_fallback_name);
            for name in &inferred {
                self.insert(&mut layout, name);
            }
        }

        Ok(layout)
    }

    fn insert(&self, layout: &mut FixedLayout, name: &str) {
        if name == self.config.dynamic_store_name {
            layout.dynamic_store = true;
        } else {
            layout.slots.insert(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_utils;

    fn slots(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn declared_and_inferred_names_are_merged() {
        let config = RegistryConfig::default();
        let namespace = Namespace::new()
            .with_declared_slots(["z", "__weakref__"])
            .with_constructor(tests_utils::two_field_init());

        let layout = LayoutBuilder::new(&config)
            .build("A", &namespace, true)
            .unwrap();
        assert_eq!(layout.slots, slots(&["__weakref__", "x", "y", "z"]));
        assert!(!layout.dynamic_store);
    }

    #[test]
    fn nothing_declared_and_no_constructor_is_empty() {
        let config = RegistryConfig::default();
        let layout = LayoutBuilder::new(&config)
            .build("A", &Namespace::new(), true)
            .unwrap();
        assert!(layout.is_empty());
    }

    #[test]
    fn constructor_is_ignored_without_inference() {
        let config = RegistryConfig::default();
        let namespace = Namespace::new().with_constructor(tests_utils::two_field_init());
        let layout = LayoutBuilder::new(&config)
            .build("A", &namespace, false)
            .unwrap();
        assert!(layout.is_empty());
    }

    #[test]
    fn dynamic_store_marker_is_a_flag() {
        let config = RegistryConfig::default();
        let namespace = Namespace::new().with_declared_slots(["z", "__dict__"]);
        let layout = LayoutBuilder::new(&config)
            .build("A", &namespace, true)
            .unwrap();
        assert_eq!(layout.slots, slots(&["z"]));
        assert!(layout.dynamic_store);
        assert_eq!(layout.declared_names(&config), ["z", "__dict__"]);
    }

    #[test]
    fn rebuilding_from_the_result_is_idempotent() {
        let config = RegistryConfig::default();
        let builder = LayoutBuilder::new(&config);
        let namespace = Namespace::new()
            .with_declared_slots(["z"])
            .with_constructor(tests_utils::conditional_init());

        let first = builder.build("A", &namespace, true).unwrap();
        let processed = namespace
            .clone()
            .with_declared_slots(first.declared_names(&config));
        let second = builder.build("A", &processed, true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn declared_names_must_be_identifiers() {
        let config = RegistryConfig::default();
        let namespace = Namespace::new().with_declared_slots(["ok", "not ok"]);
        let err = LayoutBuilder::new(&config)
            .build("A", &namespace, true)
            .unwrap_err();
        assert!(err.is_invalid_slot_name());
    }

    #[test]
    fn identifier_check() {
        assert!(is_identifier("_private"));
        assert!(is_identifier("x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
