//! Self-attribute scanner
//!
//! Recovers the attribute names a constructor assigns onto its instance
//! parameter. An attribute store pops its target object last, so the target
//! is always pushed by the instruction right before the store: an assignment
//! `self.x = value` is the pair (load of `self`, store of `x`). The scan looks
//! at every adjacent pair of the trace and nothing else, which makes it
//! insensitive to branches and loops: a name assigned on any path, reachable
//! or not, is reported.
use std::collections::BTreeSet;

use log::{trace, warn};
use slotinstr::{instr::Instr, parser::parse_routine, routine::InstructionTrace};

/// Set of attribute names inferred from one routine.
pub type AttributeNameSet = BTreeSet<String>;

/// Instance parameter assumed when a routine declares no parameters.
pub const DEFAULT_INSTANCE_NAME: &str = "self";

/// Collect the attribute names assigned onto the first parameter of
/// `routine`.
///
/// ```rust
/// # use slotcore::scanner::inferred_attribute_names;
/// # use slotinstr::{instr::Instr, routine::Routine};
/// let init = Routine::new("__init__", ["self", "a"])
///     .with(Instr::LoadLocal("a".into()))
///     .with(Instr::LoadLocal("self".into()))
///     .with(Instr::StoreAttr("x".into()));
/// assert_eq!(inferred_attribute_names(&init), ["x".to_string()].into());
/// ```
pub fn inferred_attribute_names<T: InstructionTrace>(routine: &T) -> AttributeNameSet {
    inferred_attribute_names_with(routine, DEFAULT_INSTANCE_NAME)
}

/// Same as [`inferred_attribute_names`], with an explicit instance name for
/// routines without parameters.
pub fn inferred_attribute_names_with<T: InstructionTrace>(
    routine: &T,
    fallback_instance: &str,
) -> AttributeNameSet {
    let instance = routine.instance_parameter().unwrap_or(fallback_instance);

    // Second iterator runs one instruction ahead
    let pairs = routine
        .instructions()
        .zip(routine.instructions().skip(1));

    let mut names = AttributeNameSet::new();
    for (current, next) in pairs {
        let loads_instance = current.loaded_local() == Some(instance);
        if let (true, Some(attribute)) = (loads_instance, next.stored_attribute()) {
            if names.insert(attribute.to_string()) {
                trace!(
                    "Routine `{}` assigns `{}.{}`",
                    routine.name(),
                    instance,
                    attribute
                );
            }
        }
    }

    names
}

/// Whether `routine` hands over to the constructor it overrides, through
/// `super().__init__(...)` or `Base.__init__(self, ...)`: some instruction
/// loads an attribute named like the routine itself.
///
/// Like the attribute scan this is branch-insensitive.
pub fn delegates_to_parent<T: InstructionTrace>(routine: &T) -> bool {
    let name = routine.name();
    routine
        .instructions()
        .any(|instr| matches!(instr, Instr::LoadAttr(attribute) if attribute == name))
}

/// Scan a textual listing holding a single routine.
///
/// A listing that cannot be decoded degrades to the empty set: a type with
/// no usable constructor is still a legal type.
pub fn inferred_attribute_names_from_listing(src: &str) -> AttributeNameSet {
    match parse_routine(src) {
        Ok(routine) => inferred_attribute_names(&routine),
        Err(e) => {
            warn!("Could not decode constructor listing, assuming no attributes: {}", e);
            AttributeNameSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use slotinstr::{instr::Instr, routine::Routine};

    use super::*;
    use crate::tests_utils;

    fn names(list: &[&str]) -> AttributeNameSet {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reassigned_attribute_is_reported_once() {
        let init = tests_utils::reassigning_init();
        assert_eq!(inferred_attribute_names(&init), names(&["x", "y"]));
    }

    #[test]
    fn captured_instance_is_detected() {
        let init = tests_utils::capturing_init();
        assert_eq!(inferred_attribute_names(&init), names(&["x", "y"]));
    }

    #[test]
    fn every_branch_contributes() {
        let init = tests_utils::conditional_init();
        assert_eq!(inferred_attribute_names(&init), names(&["x", "y"]));
    }

    #[test]
    fn instance_parameter_is_positional_not_named_self() {
        let init = tests_utils::renamed_instance_init();
        assert_eq!(inferred_attribute_names(&init), names(&["x", "y"]));
    }

    #[test]
    fn parameters_and_other_targets_are_ignored() {
        // other.z = a ; self.inner.w = b ; self.x = a
        let init = Routine::new("__init__", ["self", "a", "b", "other"])
            .with(Instr::LoadLocal("a".into()))
            .with(Instr::LoadLocal("other".into()))
            .with(Instr::StoreAttr("z".into()))
            .with(Instr::LoadLocal("b".into()))
            .with(Instr::LoadLocal("self".into()))
            .with(Instr::LoadAttr("inner".into()))
            .with(Instr::StoreAttr("w".into()))
            .with(Instr::LoadLocal("a".into()))
            .with(Instr::LoadLocal("self".into()))
            .with(Instr::StoreAttr("x".into()));

        assert_eq!(inferred_attribute_names(&init), names(&["x"]));
    }

    #[test]
    fn captured_outer_binding_is_not_the_instance() {
        let init = Routine::new("__init__", ["self"])
            .with_free(["outer"])
            .with(Instr::LoadConst(slotinstr::instr::Const::Int(1)))
            .with(Instr::LoadCaptured("outer".into()))
            .with(Instr::StoreAttr("leak".into()));

        assert!(inferred_attribute_names(&init).is_empty());
    }

    #[test]
    fn store_must_immediately_follow_the_load() {
        let init = Routine::new("__init__", ["self"])
            .with(Instr::LoadLocal("self".into()))
            .with(Instr::Nop)
            .with(Instr::StoreAttr("x".into()));

        assert!(inferred_attribute_names(&init).is_empty());
    }

    #[test]
    fn nested_routines_are_not_scanned() {
        let mut init = Routine::new("__init__", ["self"]).with_cells(["self"]);
        let inner = Routine::new("inner", Vec::<String>::new())
            .with_free(["self"])
            .with(Instr::LoadConst(slotinstr::instr::Const::None))
            .with(Instr::LoadCaptured("self".into()))
            .with(Instr::StoreAttr("late".into()));
        let index = init.push_nested(inner);
        init.push(Instr::MakeClosure(index));
        init.push(Instr::Pop);

        assert!(inferred_attribute_names(&init).is_empty());
    }

    #[test]
    fn empty_and_parameterless_routines_yield_nothing() {
        assert!(inferred_attribute_names(&Routine::new("__init__", ["self"])).is_empty());

        let no_params = Routine::new("__init__", Vec::<String>::new())
            .with(Instr::LoadConst(slotinstr::instr::Const::None))
            .with(Instr::LoadLocal("self".into()))
            .with(Instr::StoreAttr("x".into()));
        assert_eq!(inferred_attribute_names(&no_params), names(&["x"]));
        assert!(inferred_attribute_names_with(&no_params, "this").is_empty());
    }

    #[test]
    fn parent_constructor_call_is_detected() {
        assert!(delegates_to_parent(&tests_utils::super_calling_init(["w"])));
        assert!(!delegates_to_parent(&tests_utils::two_field_init()));
        assert!(!delegates_to_parent(&tests_utils::capturing_init()));

        // `Base.__init__(self)` inside a branch still counts
        let explicit = Routine::new("__init__", ["self", "flag"])
            .with(Instr::LoadLocal("flag".into()))
            .with(Instr::JumpIfFalse(6))
            .with(Instr::LoadGlobal("Base".into()))
            .with(Instr::LoadAttr("__init__".into()))
            .with(Instr::LoadLocal("self".into()))
            .with(Instr::Call(1))
            .with(Instr::Return);
        assert!(delegates_to_parent(&explicit));

        // Reading an unrelated attribute is not a call to the parent
        let unrelated = Routine::new("__init__", ["self", "other"])
            .with(Instr::LoadLocal("other".into()))
            .with(Instr::LoadAttr("setup".into()))
            .with(Instr::Call(0))
            .with(Instr::Return);
        assert!(!delegates_to_parent(&unrelated));
    }

    #[test]
    fn undecodable_listing_degrades_to_empty() {
        assert!(inferred_attribute_names_from_listing("routine __init__(self) {").is_empty());
        assert_eq!(
            inferred_attribute_names_from_listing(
                "routine __init__(self, a) { load.local a\n load.local self\n store.attr q\n return }"
            ),
            names(&["q"])
        );
    }
}
