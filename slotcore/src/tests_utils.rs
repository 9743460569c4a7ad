use slotinstr::{
    instr::{Const, Instr},
    parser::parse_routine,
    routine::Routine,
};

/// `self.x = a; self.y = b`
pub fn two_field_init() -> Routine {
    assigning_init(["x", "y"])
}

/// Constructor assigning every name in `attributes` from a same-named
/// parameter, in order.
pub fn assigning_init<'a>(attributes: impl IntoIterator<Item = &'a str>) -> Routine {
    let attributes: Vec<&str> = attributes.into_iter().collect();
    let mut params = vec!["self"];
    params.extend(attributes.iter().copied());

    let mut init = Routine::new("__init__", params);
    for attribute in attributes {
        init.push(Instr::LoadLocal(attribute.into()));
        init.push(Instr::LoadLocal("self".into()));
        init.push(Instr::StoreAttr(attribute.into()));
    }
    init.push(Instr::LoadConst(Const::None));
    init.push(Instr::Return);
    init
}

/// Same as [`assigning_init`], but the parent constructor is called first
/// through `super().__init__()`.
pub fn super_calling_init<'a>(attributes: impl IntoIterator<Item = &'a str>) -> Routine {
    let own = assigning_init(attributes);
    let mut init = Routine::new("__init__", own.params.clone())
        .with(Instr::LoadGlobal("super".into()))
        .with(Instr::Call(0))
        .with(Instr::LoadAttr("__init__".into()))
        .with(Instr::Call(0))
        .with(Instr::Pop);
    init.body.extend(own.body);
    init
}

/// Assigns `x` twice, the second time from a constant.
pub fn reassigning_init() -> Routine {
    parse_routine(
        r#"
        routine __init__(self, a, b) {
            load.local a
            load.local self
            store.attr x
            load.local b
            load.local self
            store.attr y
            load.const "bleh"
            load.local self
            store.attr x
            load.const none
            return
        }
        "#,
    )
    .unwrap()
}

/// The instance parameter is captured by a nested routine, so every access
/// goes through the captured-variable form.
pub fn capturing_init() -> Routine {
    parse_routine(
        r#"
        routine __init__(self, a, b) cells(self) {
            routine show() free(self) {
                load.global print
                load.captured self
                call 1
                return
            }

            load.local a
            load.captured self
            store.attr x
            make.closure show
            store.local show
            load.local b
            load.captured self
            store.attr y
            load.const none
            return
        }
        "#,
    )
    .unwrap()
}

/// `if a: self.x = 1 elif b: self.y = 2`
pub fn conditional_init() -> Routine {
    parse_routine(
        r#"
        routine __init__(self, a, b) {
            load.local a
            jump.if_false elif
            load.const 1
            load.local self
            store.attr x
            jump end
        elif:
            load.local b
            jump.if_false end
            load.const 2
            load.local self
            store.attr y
        end:
            load.const none
            return
        }
        "#,
    )
    .unwrap()
}

/// Instance parameter named `blah` rather than `self`.
pub fn renamed_instance_init() -> Routine {
    parse_routine(
        r#"
        routine __init__(blah, a, b) {
            load.local a
            load.local blah
            store.attr x
            load.local b
            load.local blah
            store.attr y
            load.const none
            return
        }
        "#,
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_verify() {
        for routine in [
            two_field_init(),
            super_calling_init(["w"]),
            reassigning_init(),
            capturing_init(),
            conditional_init(),
            renamed_instance_init(),
        ] {
            routine.verify().unwrap();
        }
    }
}
