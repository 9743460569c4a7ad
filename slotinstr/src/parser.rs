//! Textual listings
//!
//! A listing spells one routine per `routine` block. Blocks nest: a routine
//! written inside another becomes one of its nested routines and can be
//! referred to by `make.closure NAME` (or by index, `make.closure #0`).
//! Labels (`name:`) mark the next instruction and are resolved to
//! instruction indices. Comments start with `;` and run to the end of the
//! line.
//!
//! ```rust
//! # use slotinstr::parser::parse_routine;
//! let routine = parse_routine(r#"
//!     routine __init__(self, a) {
//!         load.local a
//!         load.local self
//!         store.attr x
//!         load.const none
//!         return
//!     }
//! "#).unwrap();
//! assert_eq!(routine.params, ["self", "a"]);
//! assert_eq!(routine.body.len(), 5);
//! ```
use std::collections::BTreeMap;

use ariadne::{Config, Label, Report, ReportKind, Source};
use chumsky::prelude::*;
use either::Either;

use crate::{
    instr::{Const, Instr, InstrKind},
    routine::Routine,
    utils::{Error, ParseDiagnostic},
};

type Extra<'src> = extra::Err<Rich<'src, char>>;

/// Operand as written, before it is checked against the mnemonic.
#[derive(Debug, Clone)]
enum RawOperand {
    Str(String),
    Int(i64),
    Index(u32),
    Word(String),
}

/// Instruction whose label or closure operand has not been resolved yet.
#[derive(Debug, Clone)]
enum RawInstr {
    Ready(Instr),
    Branch(InstrKind, String),
    Closure(Either<String, u32>),
}

#[derive(Debug, Clone)]
enum Item {
    Label(String),
    Instr(RawInstr),
    Nested(Routine),
}

struct Header {
    name: String,
    params: Vec<String>,
    cells: Vec<String>,
    free: Vec<String>,
}

fn comment<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just(';')
        .then(none_of("\n").repeated())
        .ignored()
        .labelled("comment")
}

/// Any amount of whitespace and comments, possibly none.
fn pad<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    choice((
        any().filter(|c: &char| c.is_whitespace()).ignored(),
        comment(),
    ))
    .repeated()
    .ignored()
}

/// Horizontal whitespace separating a mnemonic from its operand.
fn gap<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    any()
        .filter(|c: &char| *c == ' ' || *c == '\t')
        .repeated()
        .at_least(1)
        .ignored()
}

fn identifier<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    text::ascii::ident()
        .map(|s: &str| s.to_string())
        .labelled("identifier")
}

fn string_parser<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    let escape = just('\\').ignore_then(choice((
        just('"'),
        just('\\'),
        just('n').to('\n'),
    )));

    none_of("\\\"")
        .or(escape)
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .labelled("string")
}

fn integer_parser<'src>() -> impl Parser<'src, &'src str, i64, Extra<'src>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .try_map(|digits: &str, span| {
            digits
                .parse::<i64>()
                .map_err(|e| Rich::custom(span, format!("invalid integer {}: {}", digits, e)))
        })
        .labelled("integer")
}

fn operand_parser<'src>() -> impl Parser<'src, &'src str, RawOperand, Extra<'src>> + Clone {
    let index = just('#')
        .ignore_then(text::int(10))
        .try_map(|digits: &str, span| {
            digits
                .parse::<u32>()
                .map_err(|e| Rich::custom(span, format!("invalid index {}: {}", digits, e)))
        })
        .labelled("index");

    choice((
        string_parser().map(RawOperand::Str),
        integer_parser().map(RawOperand::Int),
        index.map(RawOperand::Index),
        identifier().map(RawOperand::Word),
    ))
    .labelled("operand")
}

/// Check an operand against the mnemonic it follows.
fn build_instr(kind: InstrKind, operand: Option<RawOperand>) -> Result<RawInstr, String> {
    use RawOperand::*;

    let instr = match (kind, operand) {
        (InstrKind::LoadLocal, Some(Word(s))) => Instr::LoadLocal(s),
        (InstrKind::LoadCaptured, Some(Word(s))) => Instr::LoadCaptured(s),
        (InstrKind::LoadGlobal, Some(Word(s))) => Instr::LoadGlobal(s),
        (InstrKind::LoadAttr, Some(Word(s))) => Instr::LoadAttr(s),
        (InstrKind::StoreLocal, Some(Word(s))) => Instr::StoreLocal(s),
        (InstrKind::StoreCaptured, Some(Word(s))) => Instr::StoreCaptured(s),
        (InstrKind::StoreAttr, Some(Word(s))) => Instr::StoreAttr(s),
        (InstrKind::DeleteAttr, Some(Word(s))) => Instr::DeleteAttr(s),
        (InstrKind::Binary, Some(Word(s))) => Instr::Binary(s),
        (InstrKind::Compare, Some(Word(s))) => Instr::Compare(s),
        (InstrKind::LoadConst, Some(Str(s))) => Instr::LoadConst(Const::Str(s)),
        (InstrKind::LoadConst, Some(Int(i))) => Instr::LoadConst(Const::Int(i)),
        (InstrKind::LoadConst, Some(Word(w))) => match w.as_str() {
            "none" => Instr::LoadConst(Const::None),
            "true" => Instr::LoadConst(Const::Bool(true)),
            "false" => Instr::LoadConst(Const::Bool(false)),
            _ => return Err(format!("`{}` is not a constant", w)),
        },
        (InstrKind::Call, Some(Int(argc))) => {
            let argc = u32::try_from(argc)
                .map_err(|_| format!("argument count {} is out of range", argc))?;
            Instr::Call(argc)
        }
        (InstrKind::MakeClosure, Some(Word(name))) => {
            return Ok(RawInstr::Closure(Either::Left(name)));
        }
        (InstrKind::MakeClosure, Some(Index(index))) => {
            return Ok(RawInstr::Closure(Either::Right(index)));
        }
        (kind @ (InstrKind::Jump | InstrKind::JumpIfTrue | InstrKind::JumpIfFalse), Some(Word(label))) => {
            return Ok(RawInstr::Branch(kind, label));
        }
        (InstrKind::Pop, None) => Instr::Pop,
        (InstrKind::Return, None) => Instr::Return,
        (InstrKind::Nop, None) => Instr::Nop,
        (kind, None) => return Err(format!("`{}` expects an operand", kind)),
        (kind, Some(_)) => return Err(format!("invalid operand for `{}`", kind)),
    };

    Ok(RawInstr::Ready(instr))
}

fn instr_parser<'src>() -> impl Parser<'src, &'src str, RawInstr, Extra<'src>> + Clone {
    let opaque = just("opaque")
        .ignore_then(gap())
        .ignore_then(none_of("\n;").repeated().at_least(1).to_slice())
        .map(|text: &str| RawInstr::Ready(Instr::Opaque(text.trim_end().to_string())))
        .labelled("opaque instruction");

    let mnemonic = any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .repeated()
        .at_least(1)
        .to_slice()
        .try_map(|s: &str, span| {
            InstrKind::from_mnemonic(s)
                .ok_or_else(|| Rich::custom(span, format!("unknown mnemonic `{}`", s)))
        })
        .labelled("mnemonic");

    let regular = mnemonic
        .then(gap().ignore_then(operand_parser()).or_not())
        .try_map(|(kind, operand), span| {
            build_instr(kind, operand).map_err(|message| Rich::custom(span, message))
        })
        .labelled("instruction");

    choice((opaque, regular))
}

fn name_list<'src>(keyword: &'static str) -> impl Parser<'src, &'src str, Vec<String>, Extra<'src>> + Clone {
    just(keyword).ignore_then(
        identifier()
            .padded_by(pad())
            .separated_by(just(','))
            .collect::<Vec<_>>()
            .delimited_by(just('(').then(pad()), just(')')),
    )
}

fn header_parser<'src>() -> impl Parser<'src, &'src str, Header, Extra<'src>> + Clone {
    just("routine")
        .ignore_then(gap())
        .ignore_then(identifier())
        .then(
            identifier()
                .padded_by(pad())
                .separated_by(just(','))
                .collect::<Vec<_>>()
                .delimited_by(just('(').then(pad()), just(')')),
        )
        .then(pad().ignore_then(name_list("cells")).or_not())
        .then(pad().ignore_then(name_list("free")).or_not())
        .map(|(((name, params), cells), free)| Header {
            name,
            params,
            cells: cells.unwrap_or_default(),
            free: free.unwrap_or_default(),
        })
        .labelled("routine header")
}

/// Resolve labels and closure references of a parsed body.
fn assemble(
    header: Header,
    items: Vec<(Item, SimpleSpan)>,
    mut emit: impl FnMut(SimpleSpan, String),
) -> Routine {
    let mut routine = Routine {
        name: header.name,
        params: header.params,
        cells: header.cells,
        free: header.free,
        body: Vec::new(),
        nested: Vec::new(),
    };

    let mut labels: BTreeMap<String, u32> = BTreeMap::new();
    let mut branches = Vec::new();
    let mut closures = Vec::new();

    for (item, span) in items {
        let index = routine.body.len();
        match item {
            Item::Label(label) => {
                if labels.insert(label.clone(), index as u32).is_some() {
                    emit(span, format!("label `{}` is defined more than once", label));
                }
            }
            Item::Nested(nested) => routine.nested.push(nested),
            Item::Instr(RawInstr::Ready(instr)) => routine.body.push(instr),
            Item::Instr(RawInstr::Branch(kind, label)) => {
                branches.push((index, label, span));
                routine.body.push(match kind {
                    InstrKind::Jump => Instr::Jump(0),
                    InstrKind::JumpIfTrue => Instr::JumpIfTrue(0),
                    _ => Instr::JumpIfFalse(0),
                });
            }
            Item::Instr(RawInstr::Closure(target)) => {
                closures.push((index, target, span));
                routine.body.push(Instr::MakeClosure(0));
            }
        }
    }

    let len = routine.body.len() as u32;
    for (index, label, span) in branches {
        match labels.get(&label) {
            Some(&target) if target < len => routine.body[index].set_branch_target(target),
            Some(_) => emit(
                span,
                format!("label `{}` does not precede any instruction", label),
            ),
            None => emit(span, format!("undefined label `{}`", label)),
        }
    }

    for (index, target, span) in closures {
        let resolved = match target {
            Either::Left(name) => match routine.nested_by_name(&name) {
                Some((nested, _)) => nested,
                None => {
                    emit(span, format!("undefined nested routine `{}`", name));
                    continue;
                }
            },
            Either::Right(nested) if (nested as usize) < routine.nested.len() => nested,
            Either::Right(nested) => {
                emit(span, format!("undefined nested routine #{}", nested));
                continue;
            }
        };
        routine.body[index] = Instr::MakeClosure(resolved);
    }

    routine
}

/// Parser for a single `routine` block, including its nested routines.
pub fn routine_parser<'src>() -> impl Parser<'src, &'src str, Routine, Extra<'src>> + Clone {
    recursive(|routine| {
        let label = identifier()
            .then_ignore(just(':'))
            .map(Item::Label)
            .labelled("label");

        let item = choice((
            routine.map(Item::Nested),
            label,
            instr_parser().map(Item::Instr),
        ))
        .map_with(|item, e| (item, e.span()));

        header_parser()
            .then_ignore(pad())
            .then_ignore(just('{'))
            .then(item.padded_by(pad()).repeated().collect::<Vec<_>>())
            .then_ignore(pad())
            .then_ignore(just('}'))
            .validate(|(header, items), _, emitter| {
                assemble(header, items, |span, message| {
                    emitter.emit(Rich::custom(span, message))
                })
            })
    })
}

fn into_error(errors: Vec<Rich<'_, char>>) -> Error {
    Error::ParserErrors {
        errors: errors
            .into_iter()
            .map(|e| ParseDiagnostic {
                message: e.to_string(),
                start: e.span().start,
                end: e.span().end,
            })
            .collect(),
    }
}

/// Parse a listing holding exactly one routine and verify it.
pub fn parse_routine(src: &str) -> Result<Routine, Error> {
    let routine = routine_parser()
        .padded_by(pad())
        .then_ignore(end())
        .parse(src)
        .into_result()
        .map_err(into_error)?;

    routine.verify()?;
    Ok(routine)
}

/// Parse a listing holding any number of top-level routines and verify them.
pub fn parse_routines(src: &str) -> Result<Vec<Routine>, Error> {
    let routines = routine_parser()
        .padded_by(pad())
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
        .parse(src)
        .into_result()
        .map_err(into_error)?;

    routines.iter().try_for_each(Routine::verify)?;
    Ok(routines)
}

/// Render parse diagnostics against their source, one report per error.
pub fn render_diagnostics(source_id: &str, source: &str, errors: &[ParseDiagnostic]) -> String {
    let mut out = Vec::new();
    for error in errors {
        let span = (source_id, error.start..error.end);
        let written = Report::build(ReportKind::Error, span.clone())
            .with_config(Config::default().with_color(false))
            .with_message(&error.message)
            .with_label(Label::new(span).with_message("the error occurred here"))
            .finish()
            .write((source_id, Source::from(source)), &mut out);

        if let Err(e) = written {
            log::warn!("Failed to render diagnostic `{}`: {}", error, e);
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
