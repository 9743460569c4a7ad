use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use slotinstr::routine::Routine;

/// Body of a type definition as handed to the construction hook.
///
/// Only the constructor is ever analysed. Other methods and class-level
/// attributes are carried so that the hook can detect names that collide
/// with the fixed layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    /// The constructor routine, if the type declares one.
    pub constructor: Option<Arc<Routine>>,

    /// Names the author pre-declared as part of the fixed layout. `None`
    /// when nothing was declared, which is different from declaring an
    /// empty layout for types that did not opt into inference.
    pub declared_slots: Option<Vec<String>>,

    /// Class-level attributes bound in the body.
    pub class_attributes: BTreeSet<String>,

    /// Methods other than the constructor, by name.
    pub methods: BTreeMap<String, Arc<Routine>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constructor(mut self, constructor: impl Into<Arc<Routine>>) -> Self {
        self.constructor = Some(constructor.into());
        self
    }

    pub fn with_declared_slots<S: Into<String>>(mut self, slots: impl IntoIterator<Item = S>) -> Self {
        self.declared_slots = Some(slots.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_class_attribute(mut self, name: impl Into<String>) -> Self {
        self.class_attributes.insert(name.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<Arc<Routine>>) -> Self {
        let method = method.into();
        self.methods.insert(method.name.clone(), method);
        self
    }

    /// Whether `name` is bound at class level, either as an attribute or as
    /// a method (the constructor included).
    pub fn binds(&self, name: &str) -> bool {
        self.class_attributes.contains(name)
            || self.methods.contains_key(name)
            || self
                .constructor
                .as_ref()
                .is_some_and(|constructor| constructor.name == name)
    }
}
