#![allow(dead_code)]

use slotcore::{
    namespace::Namespace,
    registry::{TypeCreateInfo, TypeRef, TypeRegistry},
    utils::error::SlotResult,
};
use slotinstr::{parser::parse_routine, routine::Routine};

pub use slotcore::tests_utils::{assigning_init, super_calling_init};

pub fn listing(src: &str) -> Routine {
    parse_routine(src).expect("test listing should parse")
}

pub fn try_define(
    registry: &TypeRegistry,
    name: &str,
    ancestors: &[TypeRef],
    namespace: Namespace,
) -> SlotResult<TypeRef> {
    registry.define_type(TypeCreateInfo {
        name,
        ancestors,
        namespace,
    })
}

pub fn define(
    registry: &TypeRegistry,
    name: &str,
    ancestors: &[TypeRef],
    namespace: Namespace,
) -> TypeRef {
    try_define(registry, name, ancestors, namespace).expect("type definition should succeed")
}

/// Type whose constructor assigns `attributes` without calling the parent
/// constructor.
pub fn define_with_init(
    registry: &TypeRegistry,
    name: &str,
    ancestors: &[TypeRef],
    attributes: &[&str],
) -> TypeRef {
    define(
        registry,
        name,
        ancestors,
        Namespace::new().with_constructor(assigning_init(attributes.iter().copied())),
    )
}

/// Type whose constructor calls the parent constructor, then assigns
/// `attributes`.
pub fn define_with_super_init(
    registry: &TypeRegistry,
    name: &str,
    ancestors: &[TypeRef],
    attributes: &[&str],
) -> TypeRef {
    define(
        registry,
        name,
        ancestors,
        Namespace::new().with_constructor(super_calling_init(attributes.iter().copied())),
    )
}

pub fn names(list: &[&str]) -> std::collections::BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}
