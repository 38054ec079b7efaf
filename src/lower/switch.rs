//! `switch` lowering.
//!
//! Case values go into an ordered map as the front end encounters them, with
//! duplicates rejected on the spot. Dispatch is emitted as a balanced
//! three-way search over the sorted values: each node tests equality into
//! its body, then splits on an unsigned less-than; leaves fall to the
//! default label.

use std::collections::BTreeMap;

use crate::errors::{Error, Result};
use crate::ir::entities::Block;
use crate::ir::instructions::Opcode;
use crate::ir::repr::I32;
use crate::ir::value::Value;
use crate::tree::SourceLoc;

use super::FuncBuilder;

/// The case table of one `switch` statement.
///
/// Keys are the case values reinterpreted as unsigned, which matches the
/// comparison order the emitted search uses.
#[derive(Default)]
pub struct SwitchCases {
    cases: BTreeMap<u64, Block>,
}

impl SwitchCases {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `case` label, rejecting a value seen before.
    pub fn insert(&mut self, loc: SourceLoc, value: u64, body: Block) -> Result<()> {
        if self.cases.insert(value, body).is_some() {
            return Err(Error::DuplicateCase { loc });
        }
        Ok(())
    }

    /// Number of recorded cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// True when no cases have been recorded.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl FuncBuilder<'_> {
    /// Emit the dispatch for `switch (v)`, ending in the default label.
    ///
    /// The current block is terminated when this returns; case bodies are
    /// placed by the caller through their own labels.
    pub fn switch(&mut self, v: Value, cases: &SwitchCases, default: Block) {
        if self.func.is_sealed() {
            return;
        }
        let sorted: Vec<(u64, Block)> = cases.cases.iter().map(|(&k, &b)| (k, b)).collect();
        self.case_search(&v, &sorted, default);
    }

    fn case_search(&mut self, v: &Value, cases: &[(u64, Block)], default: Block) {
        use Opcode::*;
        if cases.is_empty() {
            self.func.jmp(default);
            return;
        }
        let mid = cases.len() / 2;
        let (key, body) = cases[mid];

        let ne = self.new_block("switch_ne");
        let lt = self.new_block("switch_lt");
        let gt = self.new_block("switch_gt");

        let word = v.repr.is_word();
        let key_val = Value::int_const(v.repr, key);
        let eq = self.op(if word { Ceqw } else { Ceql }, I32, v.clone(), Some(key_val.clone()));
        self.func.jnz(eq, body, ne);
        self.func.label(ne);
        let below = self.op(if word { Cultw } else { Cultl }, I32, v.clone(), Some(key_val));
        self.func.jnz(below, lt, gt);
        self.func.label(lt);
        self.case_search(v, &cases[..mid], default);
        self.func.label(gt);
        self.case_search(v, &cases[mid + 1..], default);
    }
}
