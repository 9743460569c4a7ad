//! Routines and the trace accessor trait.
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{instr::Instr, utils::Error};

/// Access to a decoded instruction stream.
///
/// This is the only thing slot inference requires from a host runtime: the
/// ordered parameter names of a routine and its flat, ordered trace. Any
/// representation able to produce both (a bytecode decoder, a lowered syntax
/// tree, ...) can implement it.
pub trait InstructionTrace {
    /// Display name of the routine.
    fn name(&self) -> &str;

    /// Declared parameter names, in declaration order.
    fn parameters(&self) -> &[String];

    /// Iterate over the body, in trace order.
    fn instructions(&self) -> impl Iterator<Item = &Instr>;

    /// The parameter conventionally bound to the object under construction.
    fn instance_parameter(&self) -> Option<&str> {
        self.parameters().first().map(String::as_str)
    }
}

/// A constructor-like routine: parameters, captured bindings, a flat trace
/// and the routines nested inside it.
///
/// `cells` lists the routine's own bindings that nested routines close over;
/// accesses to them inside this routine go through [`Instr::LoadCaptured`] /
/// [`Instr::StoreCaptured`]. `free` lists bindings captured from an
/// enclosing routine.
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Routine {
    pub name: String,
    pub params: Vec<String>,
    pub cells: Vec<String>,
    pub free: Vec<String>,
    pub body: Vec<Instr>,
    pub nested: Vec<Routine>,
}

impl Routine {
    pub fn new<S: Into<String>>(name: impl Into<String>, params: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Declare the cell variables of this routine.
    pub fn with_cells<S: Into<String>>(mut self, cells: impl IntoIterator<Item = S>) -> Self {
        self.cells = cells.into_iter().map(Into::into).collect();
        self
    }

    /// Declare the free variables of this routine.
    pub fn with_free<S: Into<String>>(mut self, free: impl IntoIterator<Item = S>) -> Self {
        self.free = free.into_iter().map(Into::into).collect();
        self
    }

    /// Append an instruction and return its index.
    pub fn push(&mut self, instr: Instr) -> u32 {
        self.body.push(instr);
        (self.body.len() - 1) as u32
    }

    /// Builder form of [`Self::push`].
    pub fn with(mut self, instr: Instr) -> Self {
        self.body.push(instr);
        self
    }

    /// Append a nested routine and return the index [`Instr::MakeClosure`]
    /// uses to refer to it.
    pub fn push_nested(&mut self, routine: Routine) -> u32 {
        self.nested.push(routine);
        (self.nested.len() - 1) as u32
    }

    /// Find a nested routine by name.
    pub fn nested_by_name(&self, name: &str) -> Option<(u32, &Routine)> {
        self.nested
            .iter()
            .enumerate()
            .find(|(_, r)| r.name == name)
            .map(|(i, r)| (i as u32, r))
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Check the structural well-formedness of the routine and every nested
    /// routine:
    /// 1) parameter names are unique;
    /// 2) branch targets fall inside the trace;
    /// 3) closures refer to existing nested routines;
    /// 4) captured accesses name a cell or free variable.
    pub fn verify(&self) -> Result<(), Error> {
        let mut seen = BTreeSet::new();
        for param in &self.params {
            if !seen.insert(param.as_str()) {
                return Err(Error::DuplicateParameter {
                    routine: self.name.clone(),
                    parameter: param.clone(),
                });
            }
        }

        let len = self.body.len();
        for (index, instr) in self.body.iter().enumerate() {
            if let Some(target) = instr.branch_target() {
                if target as usize >= len {
                    return Err(Error::BranchOutOfRange {
                        routine: self.name.clone(),
                        index,
                        target,
                        len,
                    });
                }
            }

            match instr {
                Instr::MakeClosure(nested) if *nested as usize >= self.nested.len() => {
                    return Err(Error::UndefinedNestedRoutine {
                        routine: self.name.clone(),
                        index,
                        nested: *nested,
                        count: self.nested.len(),
                    });
                }
                Instr::LoadCaptured(binding) | Instr::StoreCaptured(binding)
                    if !self.cells.contains(binding) && !self.free.contains(binding) =>
                {
                    return Err(Error::UndeclaredCapture {
                        routine: self.name.clone(),
                        index,
                        binding: binding.clone(),
                    });
                }
                _ => {}
            }
        }

        self.nested.iter().try_for_each(Routine::verify)
    }

    /// Render the routine as a listing, indented by `depth` levels.
    fn fmt_listing(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        let indent = "    ".repeat(depth);
        write!(f, "{}routine {}({})", indent, self.name, self.params.join(", "))?;
        if !self.cells.is_empty() {
            write!(f, " cells({})", self.cells.join(", "))?;
        }
        if !self.free.is_empty() {
            write!(f, " free({})", self.free.join(", "))?;
        }
        writeln!(f, " {{")?;

        for nested in &self.nested {
            nested.fmt_listing(f, depth + 1)?;
        }

        // Every branch target gets a label
        let labels: BTreeMap<u32, String> = self
            .body
            .iter()
            .filter_map(Instr::branch_target)
            .map(|t| (t, format!("L{}", t)))
            .collect();

        for (index, instr) in self.body.iter().enumerate() {
            if let Some(label) = labels.get(&(index as u32)) {
                writeln!(f, "{}{}:", indent, label)?;
            }
            match instr {
                Instr::MakeClosure(nested) => match self.nested.get(*nested as usize) {
                    Some(routine) => {
                        writeln!(f, "{}    {} {}", indent, instr.kind(), routine.name)?
                    }
                    None => writeln!(f, "{}    {}", indent, instr)?,
                },
                _ => writeln!(f, "{}    {}", indent, instr)?,
            }
        }

        writeln!(f, "{}}}", indent)
    }
}

impl InstructionTrace for Routine {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[String] {
        &self.params
    }

    fn instructions(&self) -> impl Iterator<Item = &Instr> {
        self.body.iter()
    }
}

impl<T: InstructionTrace> InstructionTrace for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn parameters(&self) -> &[String] {
        (**self).parameters()
    }

    fn instructions(&self) -> impl Iterator<Item = &Instr> {
        (**self).instructions()
    }
}

impl std::fmt::Display for Routine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_listing(f, 0)
    }
}
