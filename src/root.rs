// SPDX-License-Identifier: Apache-2.0

//! The elaboration root: literal allocation, the global clause store, QBF
//! prefix assembly, and result decoding.
//!
//! One `Root` exists per synthesis run. It owns three monotone literal
//! counters, one per variable class, each starting at a fixed base so the
//! class ranges can never overlap:
//!
//! - Config (existential, solver-chosen) from `FIRST_CONFIG`,
//! - Input (universal) from `FIRST_INPUT`,
//! - Signal (existential, derived) from `FIRST_SIGNAL`.
//!
//! Literal IDs are never reclaimed; elaboration does not backtrack. Because
//! an oracle expects a contiguous 1..N numbering, the root computes a
//! compacting renumbering (a displacement per class, order-preserving within
//! each class) before submission and inverts it on the returned assignment.

use log::info;

use crate::bus::{Bus, Lit};
use crate::error::{Error, Result};
use crate::oracle::{ExpansionOracle, Oracle, QuantifierKind, SolveResult};
use crate::scope::{ScopeId, ScopeTree};

pub const FIRST_CONFIG: i32 = 4;
pub const FIRST_INPUT: i32 = 0x3FFF_0000;
pub const FIRST_SIGNAL: i32 = 0x4000_0000;

#[derive(Debug)]
pub struct Root {
    /// Flat clause store; literals in raw signed form, clauses terminated
    /// by 0. Sentinel literals are filtered out on entry.
    clauses: Vec<i32>,
    config_next: i32,
    input_next: i32,
    signal_next: i32,
    scopes: ScopeTree,
    choose_serial: u32,
    verdict: Option<SolveResult>,
    assignment: Vec<i32>,
}

impl Root {
    pub fn new(top_name: impl Into<String>) -> Self {
        Root {
            clauses: Vec::new(),
            config_next: FIRST_CONFIG,
            input_next: FIRST_INPUT,
            signal_next: FIRST_SIGNAL,
            scopes: ScopeTree::new(top_name),
            choose_serial: 0,
            verdict: None,
            assignment: Vec::new(),
        }
    }

    //- Literal allocation ---------------------------------------------------

    pub fn allocate_config(&mut self, width: usize) -> Bus {
        Self::allocate(&mut self.config_next, width)
    }

    pub fn allocate_input(&mut self, width: usize) -> Bus {
        Self::allocate(&mut self.input_next, width)
    }

    pub fn allocate_signal(&mut self, width: usize) -> Bus {
        Self::allocate(&mut self.signal_next, width)
    }

    fn allocate(next: &mut i32, width: usize) -> Bus {
        let lits = (0..width)
            .map(|_| {
                let lit = Lit::new(*next);
                *next += 1;
                lit
            })
            .collect();
        Bus::from_lits(lits)
    }

    /// Synthesized scope name for the implicit config field of a choose
    /// operator.
    pub fn next_choose_name(&mut self, k: usize) -> String {
        let serial = self.choose_serial;
        self.choose_serial += 1;
        format!("CHOOSE<{}>/{}", k, serial)
    }

    //- Clause store ---------------------------------------------------------

    /// Appends a clause. A constant-true literal makes the clause trivially
    /// satisfied and discards it; constant-false literals are dropped from
    /// the clause.
    pub fn add_clause(&mut self, lits: &[Lit]) {
        let mark = self.clauses.len();
        for &lit in lits {
            if lit.is_const_true() {
                self.clauses.truncate(mark);
                return;
            }
            if lit.is_const_false() {
                continue;
            }
            self.clauses.push(lit.raw());
        }
        self.clauses.push(0);
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.iter().filter(|&&w| w == 0).count()
    }

    /// Debug rendering of the clause store, one clause per line, literals in
    /// `c`/`i`/`n` class notation.
    pub fn render_clauses(&self) -> String {
        let mut out = String::new();
        for &w in &self.clauses {
            if w == 0 {
                out.push('\n');
            } else {
                out.push_str(&LitName(w).to_string());
                out.push(' ');
            }
        }
        out
    }

    //- Scope tree -----------------------------------------------------------

    pub fn scope_root(&self) -> ScopeId {
        self.scopes.root()
    }

    pub fn create_scope(
        &mut self,
        parent: ScopeId,
        label: impl Into<String>,
        display: impl Into<String>,
    ) -> Result<ScopeId> {
        self.scopes.create_child(parent, label, display)
    }

    pub fn register_config(
        &mut self,
        scope: ScopeId,
        name: impl Into<String>,
        bus: Bus,
    ) -> Result<()> {
        self.scopes.add_config(scope, name, bus)
    }

    //- Solving --------------------------------------------------------------

    pub(crate) fn var_map(&self) -> VarMap {
        VarMap {
            num_config: self.config_next - FIRST_CONFIG,
            num_input: self.input_next - FIRST_INPUT,
            num_signal: self.signal_next - FIRST_SIGNAL,
        }
    }

    pub(crate) fn clause_words(&self) -> &[i32] {
        &self.clauses
    }

    pub(crate) fn config_vars(&self) -> std::ops::Range<i32> {
        FIRST_CONFIG..self.config_next
    }

    pub(crate) fn input_vars(&self) -> std::ops::Range<i32> {
        FIRST_INPUT..self.input_next
    }

    pub(crate) fn signal_vars(&self) -> std::ops::Range<i32> {
        FIRST_SIGNAL..self.signal_next
    }

    /// Assembles the ∃∀∃ problem, submits it, and decodes the assignment.
    /// Idempotent: a second call returns the cached verdict.
    pub fn solve_with(&mut self, oracle: &mut dyn Oracle) -> SolveResult {
        if let Some(verdict) = self.verdict {
            return verdict;
        }
        let map = self.var_map();
        info!(
            "solving: {} config / {} input / {} signal variables, {} clauses",
            map.num_config,
            map.num_input,
            map.num_signal,
            self.num_clauses()
        );

        oracle.open_scope(QuantifierKind::Existential);
        for v in self.config_vars() {
            oracle.add_variable(map.compact_var(v));
        }
        oracle.add_variable(0);

        oracle.open_scope(QuantifierKind::Universal);
        for v in self.input_vars() {
            oracle.add_variable(map.compact_var(v));
        }
        oracle.add_variable(0);

        oracle.open_scope(QuantifierKind::Existential);
        for v in self.signal_vars() {
            oracle.add_variable(map.compact_var(v));
        }
        oracle.add_variable(0);

        for &w in &self.clauses {
            oracle.add_literal(if w == 0 { 0 } else { map.compact_lit(w) });
        }

        let verdict = oracle.solve();
        info!("verdict: {}", verdict);
        if verdict.is_satisfiable() {
            self.assignment = oracle
                .assignment()
                .iter()
                .map(|&l| map.expand_lit(l))
                .collect();
        }
        self.verdict = Some(verdict);
        verdict
    }

    /// Solves with the built-in universal-expansion oracle.
    pub fn solve(&mut self) -> SolveResult {
        let mut oracle = ExpansionOracle::new();
        self.solve_with(&mut oracle)
    }

    /// Looks up the polarity of a literal in the satisfying assignment.
    pub fn resolve(&self, lit: Lit) -> Result<bool> {
        if lit.is_const_true() {
            return Ok(true);
        }
        if lit.is_const_false() {
            return Ok(false);
        }
        for &a in &self.assignment {
            if a.abs() == lit.var() {
                return Ok((a > 0) != lit.is_negated());
            }
        }
        Err(Error::UnresolvedName(LitName(lit.raw()).to_string()))
    }

    /// The hierarchical configuration report; valid after a satisfiable
    /// solve.
    pub fn config_report(&self) -> Result<String> {
        self.scopes.render_report(&|lit| self.resolve(lit))
    }
}

/// Per-class displacement between the sparse class-based numbering and the
/// contiguous 1..N numbering an oracle expects. Relative order within each
/// class is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VarMap {
    pub num_config: i32,
    pub num_input: i32,
    pub num_signal: i32,
}

impl VarMap {
    pub fn num_vars(&self) -> i32 {
        self.num_config + self.num_input + self.num_signal
    }

    pub fn compact_var(&self, v: i32) -> i32 {
        if v >= FIRST_SIGNAL {
            v - FIRST_SIGNAL + self.num_config + self.num_input + 1
        } else if v >= FIRST_INPUT {
            v - FIRST_INPUT + self.num_config + 1
        } else {
            v - FIRST_CONFIG + 1
        }
    }

    pub fn compact_lit(&self, lit: i32) -> i32 {
        lit.signum() * self.compact_var(lit.abs())
    }

    pub fn expand_lit(&self, lit: i32) -> i32 {
        let v = lit.abs();
        let expanded = if v > self.num_config + self.num_input {
            v - self.num_config - self.num_input - 1 + FIRST_SIGNAL
        } else if v > self.num_config {
            v - self.num_config - 1 + FIRST_INPUT
        } else {
            v - 1 + FIRST_CONFIG
        };
        lit.signum() * expanded
    }
}

/// Debug notation for a literal: `~` for negation, then a class letter and
/// the offset within the class (`c0`, `i3`, `n17`). Sentinels render as `T`
/// and `F`.
pub(crate) struct LitName(pub i32);

impl std::fmt::Display for LitName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut v = self.0;
        if v < 0 {
            write!(f, "~")?;
            v = -v;
        }
        if v >= FIRST_SIGNAL {
            write!(f, "n{}", v - FIRST_SIGNAL)
        } else if v >= FIRST_INPUT {
            write!(f, "i{}", v - FIRST_INPUT)
        } else if v >= FIRST_CONFIG {
            write!(f, "c{}", v - FIRST_CONFIG)
        } else if v == Lit::TRUE.raw() {
            write!(f, "T")
        } else {
            write!(f, "F")
        }
    }
}
