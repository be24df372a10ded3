// SPDX-License-Identifier: Apache-2.0

//! The QBF oracle interface and the built-in two-level solver.
//!
//! The elaboration root talks to an oracle through the narrow contract below:
//! quantifier scopes and clauses are streamed in as zero-terminated integer
//! sequences over a contiguous 1..N variable numbering, then a single `solve`
//! call produces a verdict and, when satisfiable, an assignment for the
//! outermost existential block.
//!
//! `ExpansionOracle` implements the contract for the ∃∀∃ prefixes this crate
//! produces by expanding the universal block: the outer existentials are
//! shared across all expansions, the inner existentials are duplicated per
//! universal assignment, and the resulting propositional problem goes to
//! varisat. That is exponential in the number of universal variables, which
//! is fine for the input widths circuit matching is practical at.

use std::collections::HashMap;

use log::{info, warn};
use varisat::ExtendFormula;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierKind {
    Existential,
    Universal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveResult {
    Unknown,
    Satisfiable,
    Unsatisfiable,
}

impl SolveResult {
    pub fn is_satisfiable(self) -> bool {
        self == SolveResult::Satisfiable
    }
}

impl std::fmt::Display for SolveResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SolveResult::Unknown => "UNKNOWN",
            SolveResult::Satisfiable => "SATISFIABLE",
            SolveResult::Unsatisfiable => "UNSATISFIABLE",
        };
        write!(f, "{}", text)
    }
}

pub trait Oracle {
    /// Begins a quantifier scope; variables follow via `add_variable`.
    fn open_scope(&mut self, kind: QuantifierKind);
    /// Appends a variable to the open scope; `0` terminates the scope.
    fn add_variable(&mut self, var: i32);
    /// Appends a literal to the current clause; `0` terminates the clause.
    fn add_literal(&mut self, lit: i32);
    fn solve(&mut self) -> SolveResult;
    /// The satisfying assignment for the outermost existential block; valid
    /// only after a satisfiable `solve`.
    fn assignment(&self) -> &[i32];
}

/// Universal-expansion 2QBF solver over varisat.
pub struct ExpansionOracle {
    scopes: Vec<(QuantifierKind, Vec<i32>)>,
    clauses: Vec<Vec<i32>>,
    current: Vec<i32>,
    assignment: Vec<i32>,
}

/// Expanding more universal variables than this is hopeless; bail out with
/// an unknown verdict instead of thrashing.
const MAX_UNIVERSALS: usize = 24;

#[derive(Clone, Copy)]
enum VarClass {
    Outer,
    Universal(usize),
    Inner(usize),
}

impl ExpansionOracle {
    pub fn new() -> Self {
        ExpansionOracle {
            scopes: Vec::new(),
            clauses: Vec::new(),
            current: Vec::new(),
            assignment: Vec::new(),
        }
    }

    /// Classifies every declared variable as outer-existential, universal, or
    /// inner-existential. More than one quantifier alternation is rejected.
    fn classify(&self) -> Option<(HashMap<i32, VarClass>, usize, usize)> {
        let mut classes: HashMap<i32, VarClass> = HashMap::new();
        let mut universals = 0usize;
        let mut inners = 0usize;
        let mut seen_universal = false;
        for (kind, vars) in &self.scopes {
            match kind {
                QuantifierKind::Universal => {
                    // A universal scope after an inner existential scope would
                    // be a third quantifier level; this solver handles two.
                    if inners > 0 && !vars.is_empty() {
                        return None;
                    }
                    seen_universal = true;
                    for &v in vars {
                        classes.insert(v, VarClass::Universal(universals));
                        universals += 1;
                    }
                }
                QuantifierKind::Existential => {
                    for &v in vars {
                        if seen_universal {
                            classes.insert(v, VarClass::Inner(inners));
                            inners += 1;
                        } else {
                            classes.insert(v, VarClass::Outer);
                        }
                    }
                }
            }
        }
        Some((classes, universals, inners))
    }
}

impl Default for ExpansionOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Oracle for ExpansionOracle {
    fn open_scope(&mut self, kind: QuantifierKind) {
        self.scopes.push((kind, Vec::new()));
    }

    fn add_variable(&mut self, var: i32) {
        if var == 0 {
            return; // scope terminator
        }
        match self.scopes.last_mut() {
            Some((_, vars)) => vars.push(var),
            None => warn!("variable {} added outside any scope; ignored", var),
        }
    }

    fn add_literal(&mut self, lit: i32) {
        if lit == 0 {
            self.clauses.push(std::mem::take(&mut self.current));
        } else {
            self.current.push(lit);
        }
    }

    fn solve(&mut self) -> SolveResult {
        let Some((classes, universals, inners)) = self.classify() else {
            warn!("prefix has more than one quantifier alternation");
            return SolveResult::Unknown;
        };
        if universals > MAX_UNIVERSALS {
            warn!(
                "{} universal variables exceed the expansion limit of {}",
                universals, MAX_UNIVERSALS
            );
            return SolveResult::Unknown;
        }
        info!(
            "expanding {} universal variables over {} clauses",
            universals,
            self.clauses.len()
        );

        let mut solver = varisat::Solver::new();
        let mut outer_lits: HashMap<i32, varisat::Lit> = HashMap::new();
        for (kind, vars) in &self.scopes {
            if *kind == QuantifierKind::Existential {
                for &v in vars {
                    if matches!(classes[&v], VarClass::Outer) {
                        outer_lits.entry(v).or_insert_with(|| solver.new_lit());
                    }
                }
            }
        }

        for mask in 0u64..(1u64 << universals) {
            // Inner existentials get fresh variables per expansion.
            let inner_lits: Vec<varisat::Lit> = (0..inners).map(|_| solver.new_lit()).collect();
            'clauses: for clause in &self.clauses {
                let mut lits: Vec<varisat::Lit> = Vec::with_capacity(clause.len());
                for &lit in clause {
                    let negated = lit < 0;
                    match classes.get(&lit.abs()) {
                        Some(VarClass::Outer) => {
                            let l = outer_lits[&lit.abs()];
                            lits.push(if negated { !l } else { l });
                        }
                        Some(VarClass::Universal(idx)) => {
                            let value = mask >> idx & 1 != 0;
                            if value != negated {
                                // Literal holds under this expansion; the
                                // whole clause is satisfied.
                                continue 'clauses;
                            }
                            // Literal is falsified; drop it.
                        }
                        Some(VarClass::Inner(idx)) => {
                            let l = inner_lits[*idx];
                            lits.push(if negated { !l } else { l });
                        }
                        None => {
                            warn!("clause references undeclared variable {}", lit.abs());
                            return SolveResult::Unknown;
                        }
                    }
                }
                solver.add_clause(&lits);
            }
        }

        match solver.solve() {
            Ok(true) => {
                let model = solver.model().expect("model available when satisfiable");
                let model: std::collections::HashSet<varisat::Lit> = model.into_iter().collect();
                let mut vars: Vec<i32> = outer_lits.keys().copied().collect();
                vars.sort_unstable();
                self.assignment = vars
                    .into_iter()
                    .map(|v| if model.contains(&outer_lits[&v]) { v } else { -v })
                    .collect();
                SolveResult::Satisfiable
            }
            Ok(false) => SolveResult::Unsatisfiable,
            Err(e) => {
                warn!("varisat failed: {:?}", e);
                SolveResult::Unknown
            }
        }
    }

    fn assignment(&self) -> &[i32] {
        &self.assignment
    }
}
