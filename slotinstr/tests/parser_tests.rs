use slotinstr::{
    instr::{Const, Instr, InstrKind},
    parser::{parse_routine, parse_routines, render_diagnostics},
    routine::{InstructionTrace, Routine},
    utils::Error,
};

const CLOSURE_SOURCE: &str = r#"
; constructor whose instance parameter is captured by a nested routine
routine __init__(self, a, b) cells(self) {
    routine f() free(self) {
        load.global print
        load.captured self
        call 1
        pop
        load.const none
        return
    }

    load.local a
    load.captured self
    store.attr x
    make.closure f
    store.local f
    load.local b
    compare eq
    jump.if_false done      ; skip the second store
    load.const "bleh"
    load.captured self
    store.attr x
done:
    load.const none
    return
}
"#;

fn parse_closure_source() -> Routine {
    parse_routine(CLOSURE_SOURCE).expect("sample listing should parse")
}

#[test]
fn listing_with_nested_routine_parses() {
    let routine = parse_closure_source();

    assert_eq!(routine.name(), "__init__");
    assert_eq!(routine.parameters(), ["self", "a", "b"]);
    assert_eq!(routine.cells, ["self"]);
    assert_eq!(routine.nested.len(), 1);
    assert_eq!(routine.nested[0].free, ["self"]);
    assert_eq!(routine.body.len(), 13);

    assert_eq!(routine.body[3], Instr::MakeClosure(0));
    assert_eq!(routine.body[7], Instr::JumpIfFalse(11));
    assert_eq!(routine.body[8], Instr::LoadConst(Const::Str("bleh".into())));
    assert_eq!(routine.body[11], Instr::LoadConst(Const::None));
}

#[test]
fn printed_listing_parses_back_to_the_same_routine() {
    let routine = parse_closure_source();
    let printed = routine.to_string();
    let reparsed = parse_routine(&printed).expect("printed listing should parse");
    assert_eq!(reparsed, routine);
}

#[test]
fn several_routines_can_share_a_listing() {
    let routines = parse_routines(
        r#"
        routine __init__(self) {
            return
        }
        routine reset(self) {
            load.const 0
            load.local self
            store.attr counter
            load.const -1
            return
        }
        "#,
    )
    .unwrap();

    assert_eq!(routines.len(), 2);
    assert_eq!(routines[1].name, "reset");
    assert_eq!(routines[1].body[3], Instr::LoadConst(Const::Int(-1)));
}

#[test]
fn undefined_label_is_reported() {
    let err = parse_routine(
        r#"
        routine __init__(self) {
            jump nowhere
            return
        }
        "#,
    )
    .unwrap_err();

    let Error::ParserErrors { errors } = err else {
        panic!("expected parser errors, got {:?}", err);
    };
    assert!(errors.iter().any(|e| e.message.contains("undefined label `nowhere`")));
}

#[test]
fn unknown_mnemonic_is_reported() {
    let err = parse_routine("routine __init__(self) { load.fast self }").unwrap_err();
    assert!(err.is_parser_errors());
}

#[test]
fn missing_operand_is_reported() {
    let err = parse_routine("routine __init__(self) { store.attr }").unwrap_err();
    assert!(err.is_parser_errors());
}

#[test]
fn captured_access_must_be_declared() {
    let err = parse_routine(
        r#"
        routine __init__(self) {
            load.captured self
            return
        }
        "#,
    )
    .unwrap_err();
    assert!(err.is_undeclared_capture());
}

#[test]
fn opaque_instructions_keep_their_text() {
    let routine = parse_routine(
        r#"
        routine __init__(self) {
            opaque SETUP_ANNOTATIONS 3
            return
        }
        "#,
    )
    .unwrap();
    assert_eq!(routine.body[0], Instr::Opaque("SETUP_ANNOTATIONS 3".into()));
    assert_eq!(routine.body[0].kind(), InstrKind::Opaque);
}

#[test]
fn diagnostics_render_with_their_message() {
    let source = "routine __init__(self) {\n    jump nowhere\n    return\n}\n";
    let Err(Error::ParserErrors { errors }) = parse_routine(source) else {
        panic!("listing should not parse");
    };

    let rendered = render_diagnostics("init.listing", source, &errors);
    assert!(rendered.contains("undefined label `nowhere`"));
    assert!(rendered.contains("init.listing"));
}
