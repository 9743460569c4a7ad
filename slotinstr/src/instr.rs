//! Instruction model
//!
//! Every instruction is a variant of [`Instr`], a tagged union over the
//! operations a constructor body may contain. Operands are carried inline:
//! binding and attribute names as strings, jump targets as instruction
//! indices inside the owning routine and closures as indices into the
//! routine's nested routines.
//!
//! Two families matter for slot inference:
//!
//! - loads of a local binding, in both the direct form ([`Instr::LoadLocal`])
//!   and the captured form ([`Instr::LoadCaptured`]) used once a nested
//!   routine closes over the binding;
//! - attribute stores ([`Instr::StoreAttr`]).
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumDiscriminants, EnumIs, EnumIter, EnumTryAs, IntoEnumIterator};

/// Literal operand of [`Instr::LoadConst`].
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Const {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl std::fmt::Display for Const {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Const::None => write!(f, "none"),
            Const::Bool(b) => write!(f, "{}", b),
            Const::Int(i) => write!(f, "{}", i),
            Const::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
        }
    }
}

/// Index of an instruction inside the trace of its routine.
pub type Target = u32;

/// Discriminated union covering every instruction of a routine body.
///
/// The generated [`InstrKind`] discriminant (via `strum`) is handy for fast
/// classification without matching on operands.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(InstrKind))]
#[strum_discriminants(derive(Hash, PartialOrd, Ord, EnumIter))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Instr {
    /// Push the value of a local binding of the current routine.
    LoadLocal(String),

    /// Push the value of a binding stored in a cell, either one of the
    /// routine's own cell variables or a free variable of an enclosing
    /// routine.
    LoadCaptured(String),

    /// Push the value of a global binding.
    LoadGlobal(String),

    /// Push a literal.
    LoadConst(Const),

    /// Pop a value and push one of its attributes.
    LoadAttr(String),

    /// Pop a value into a local binding.
    StoreLocal(String),

    /// Pop a value into a cell binding.
    StoreCaptured(String),

    /// Pop the target object, then the value, and store the value under the
    /// named attribute of the object. The target is the top of the stack, so
    /// the instruction immediately preceding a store is the one that pushed
    /// the target.
    StoreAttr(String),

    /// Pop an object and delete the named attribute.
    DeleteAttr(String),

    /// Call with the given number of positional arguments.
    Call(u32),

    /// Build a closure over the nested routine with the given index.
    MakeClosure(u32),

    /// Binary arithmetic or logical operator.
    Binary(String),

    /// Comparison operator.
    Compare(String),

    /// Discard the top of the stack.
    Pop,

    Jump(Target),
    JumpIfTrue(Target),
    JumpIfFalse(Target),
    Return,
    Nop,

    /// An operation the accessor could not decode. Carries the raw text.
    Opaque(String),
}

impl Instr {
    /// Get the kind of this instruction.
    pub fn kind(&self) -> InstrKind {
        self.into()
    }

    /// Name of the local binding pushed by this instruction, if it loads one.
    ///
    /// Both the direct and the captured form are reported, so callers never
    /// have to care about how the binding happens to be stored.
    pub fn loaded_local(&self) -> Option<&str> {
        match self {
            Instr::LoadLocal(name) | Instr::LoadCaptured(name) => Some(name),
            _ => None,
        }
    }

    /// Attribute name written by this instruction, if it is an attribute store.
    pub fn stored_attribute(&self) -> Option<&str> {
        match self {
            Instr::StoreAttr(name) => Some(name),
            _ => None,
        }
    }

    /// Jump target of a branch instruction.
    pub fn branch_target(&self) -> Option<Target> {
        match self {
            Instr::Jump(t) | Instr::JumpIfTrue(t) | Instr::JumpIfFalse(t) => Some(*t),
            _ => None,
        }
    }

    /// Redirect the jump target of a branch instruction. No-op otherwise.
    pub fn set_branch_target(&mut self, target: Target) {
        if let Instr::Jump(t) | Instr::JumpIfTrue(t) | Instr::JumpIfFalse(t) = self {
            *t = target;
        }
    }
}

impl InstrKind {
    /// Mnemonic used by textual listings.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstrKind::LoadLocal => "load.local",
            InstrKind::LoadCaptured => "load.captured",
            InstrKind::LoadGlobal => "load.global",
            InstrKind::LoadConst => "load.const",
            InstrKind::LoadAttr => "load.attr",
            InstrKind::StoreLocal => "store.local",
            InstrKind::StoreCaptured => "store.captured",
            InstrKind::StoreAttr => "store.attr",
            InstrKind::DeleteAttr => "delete.attr",
            InstrKind::Call => "call",
            InstrKind::MakeClosure => "make.closure",
            InstrKind::Binary => "binary",
            InstrKind::Compare => "compare",
            InstrKind::Pop => "pop",
            InstrKind::Jump => "jump",
            InstrKind::JumpIfTrue => "jump.if_true",
            InstrKind::JumpIfFalse => "jump.if_false",
            InstrKind::Return => "return",
            InstrKind::Nop => "nop",
            InstrKind::Opaque => "opaque",
        }
    }

    /// Parse a mnemonic back into a kind.
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        InstrKind::iter().find(|kind| kind.mnemonic() == s)
    }
}

impl std::fmt::Display for InstrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl std::fmt::Display for Instr {
    /// Formats the instruction the way listings spell it. Jump targets are
    /// printed as `L<index>`; closures by index as `#<index>`. The routine
    /// printer resolves both to names.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mnemonic = self.kind().mnemonic();
        match self {
            Instr::LoadLocal(s)
            | Instr::LoadCaptured(s)
            | Instr::LoadGlobal(s)
            | Instr::LoadAttr(s)
            | Instr::StoreLocal(s)
            | Instr::StoreCaptured(s)
            | Instr::StoreAttr(s)
            | Instr::DeleteAttr(s)
            | Instr::Binary(s)
            | Instr::Compare(s)
            | Instr::Opaque(s) => write!(f, "{} {}", mnemonic, s),
            Instr::LoadConst(c) => write!(f, "{} {}", mnemonic, c),
            Instr::Call(argc) => write!(f, "{} {}", mnemonic, argc),
            Instr::MakeClosure(index) => write!(f, "{} #{}", mnemonic, index),
            Instr::Jump(t) | Instr::JumpIfTrue(t) | Instr::JumpIfFalse(t) => {
                write!(f, "{} L{}", mnemonic, t)
            }
            Instr::Pop | Instr::Return | Instr::Nop => f.write_str(mnemonic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_load_forms_report_the_binding() {
        assert_eq!(Instr::LoadLocal("self".into()).loaded_local(), Some("self"));
        assert_eq!(
            Instr::LoadCaptured("self".into()).loaded_local(),
            Some("self")
        );
        assert_eq!(Instr::LoadGlobal("self".into()).loaded_local(), None);
        assert_eq!(Instr::LoadAttr("self".into()).loaded_local(), None);
    }

    #[test]
    fn mnemonics_are_unique_and_reversible() {
        for kind in InstrKind::iter() {
            assert_eq!(InstrKind::from_mnemonic(kind.mnemonic()), Some(kind));
        }
        assert_eq!(InstrKind::from_mnemonic("load.fast"), None);
    }

    #[test]
    fn string_constants_are_escaped() {
        let c = Const::Str("a \"b\"\n".into());
        assert_eq!(c.to_string(), r#""a \"b\"\n""#);
    }

    #[test]
    fn retarget_only_touches_branches() {
        let mut jump = Instr::JumpIfFalse(3);
        jump.set_branch_target(7);
        assert_eq!(jump.branch_target(), Some(7));

        let mut ret = Instr::Return;
        ret.set_branch_target(7);
        assert_eq!(ret, Instr::Return);
    }
}
