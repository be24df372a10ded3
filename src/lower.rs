// SPDX-License-Identifier: Apache-2.0

//! The bit-vector compiler: lowers vector-valued expressions to buses,
//! emitting Tseitin clauses into the root as it goes.
//!
//! Every operator that produces fresh bits allocates Signal literals and
//! asserts their equivalence to the operand function per bit. Operand width
//! mismatches are absorbed by the zero-extending bus reads, so every gate is
//! compiled over the wider operand's width. Concatenation and inversion are
//! pure bus operations and emit nothing.
//!
//! The indexed select and the choose operator both follow the same scheme:
//! one clause pair per (code, connection) fixing the selector/config bits to
//! the code's binary pattern, plus one selector-only clause per unused code
//! making it unsatisfiable.

use crate::bus::{Bus, Lit};
use crate::elab::Context;
use crate::error::{Error, Result};
use crate::eval::{clog2, eval_const};
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::root::Root;
use crate::scope::ScopeId;

pub(crate) struct Lowering<'a> {
    pub root: &'a mut Root,
    pub ctx: &'a Context,
    pub scope: ScopeId,
}

impl Lowering<'_> {
    pub fn lower(&mut self, expr: &Expr) -> Result<Bus> {
        match expr {
            Expr::Const(val) => Ok(Bus::from_value(*val as u64)),
            Expr::Name(name) => self.ctx.resolve_bus(name),
            Expr::Unary { op, arg } => match op {
                UnaryOp::Not => Ok(self.lower(arg)?.invert()),
                _ => Err(Error::UnsupportedOperator(expr.to_string())),
            },
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                    let lhs = self.lower(lhs)?;
                    let rhs = self.lower(rhs)?;
                    Ok(self.lower_gate(*op, &lhs, &rhs))
                }
                BinaryOp::Select => {
                    let lhs = self.lower(lhs)?;
                    let rhs = self.lower(rhs)?;
                    Ok(self.lower_select(&lhs, &rhs))
                }
                BinaryOp::Concat => {
                    let lhs = self.lower(lhs)?;
                    let rhs = self.lower(rhs)?;
                    Ok(lhs.concat(&rhs))
                }
                _ => Err(Error::UnsupportedOperator(expr.to_string())),
            },
            Expr::Cond { cond, pos, neg } => {
                let cond = self.lower(cond)?;
                let pos = self.lower(pos)?;
                let neg = self.lower(neg)?;
                Ok(self.lower_cond(&cond, &pos, &neg))
            }
            Expr::Range { base, left, right } => {
                let left = eval_const(left, self.ctx)?;
                let right = eval_const(right, self.ctx)?;
                let base = self.lower(base)?;
                if left < right {
                    return Ok(Bus::empty());
                }
                let lo = bound(right)?;
                let hi = bound(left)?;
                Ok(base.slice(lo, hi))
            }
            Expr::Choose { k, from } => {
                let k = bound(eval_const(k, self.ctx)?)?;
                let from = self.lower(from)?;
                self.lower_choose(k, &from)
            }
        }
    }

    /// AND/OR/XOR over the wider operand's width, one fresh result literal
    /// per bit.
    fn lower_gate(&mut self, op: BinaryOp, lhs: &Bus, rhs: &Bus) -> Bus {
        let width = lhs.width().max(rhs.width());
        let res = self.root.allocate_signal(width);
        for i in 0..width {
            let y = res.get(i);
            let a = lhs.get(i);
            let b = rhs.get(i);
            match op {
                BinaryOp::And => {
                    self.root.add_clause(&[y, -a, -b]);
                    self.root.add_clause(&[-y, a]);
                    self.root.add_clause(&[-y, b]);
                }
                BinaryOp::Or => {
                    self.root.add_clause(&[-y, a, b]);
                    self.root.add_clause(&[y, -a]);
                    self.root.add_clause(&[y, -b]);
                }
                BinaryOp::Xor => {
                    self.root.add_clause(&[-y, -a, -b]);
                    self.root.add_clause(&[-y, a, b]);
                    self.root.add_clause(&[y, -a, b]);
                    self.root.add_clause(&[y, a, -b]);
                }
                _ => unreachable!("not a gate operator"),
            }
        }
        res
    }

    /// Bitwise conditional: bit `i` of the result follows `pos[i]` where
    /// `cond[i]` holds and `neg[i]` where it does not.
    fn lower_cond(&mut self, cond: &Bus, pos: &Bus, neg: &Bus) -> Bus {
        let width = cond.width().max(pos.width()).max(neg.width());
        let res = self.root.allocate_signal(width);
        for i in 0..width {
            let y = res.get(i);
            let c = cond.get(i);
            let p = pos.get(i);
            let n = neg.get(i);
            self.root.add_clause(&[-c, -p, y]);
            self.root.add_clause(&[-c, p, -y]);
            self.root.add_clause(&[c, -n, y]);
            self.root.add_clause(&[c, n, -y]);
        }
        res
    }

    /// Indexed select `lhs @ rhs`: a single-bit multiplexer whose selector
    /// codes beyond the line range are unsatisfiable.
    fn lower_select(&mut self, lhs: &Bus, rhs: &Bus) -> Bus {
        let res = self.root.allocate_signal(1);
        let y = res.get(0);
        let range = lhs.width();
        let width = clog2(range as u64);

        // Tie y to the selected line.
        for line in 0..range {
            let pattern: Vec<Lit> = (0..width)
                .map(|i| {
                    if line >> i & 1 != 0 {
                        -rhs.get(i)
                    } else {
                        rhs.get(i)
                    }
                })
                .collect();
            let mut clause = pattern.clone();
            clause.push(lhs.get(line));
            clause.push(-y);
            self.root.add_clause(&clause);
            clause.truncate(width);
            clause.push(-lhs.get(line));
            clause.push(y);
            self.root.add_clause(&clause);
        }

        // Disallow selector values beyond the index range of lhs.
        for line in range..(1usize << width) {
            let clause: Vec<Lit> = (0..width)
                .map(|i| {
                    if line >> i & 1 != 0 {
                        -rhs.get(i)
                    } else {
                        rhs.get(i)
                    }
                })
                .collect();
            self.root.add_clause(&clause);
        }

        // Tie spare selector bits to constant false.
        for i in width..rhs.width() {
            self.root.add_clause(&[-rhs.get(i)]);
        }
        res
    }

    /// `choose<k>(from)`: wires one k-subset of `from`'s bits to the result,
    /// indexed by an implicit config field over the C(n,k) subsets in
    /// lexicographic next-combination order.
    fn lower_choose(&mut self, k: usize, from: &Bus) -> Result<Bus> {
        let n = from.width();
        if k >= n {
            // Degenerate: everything is taken, pad with zeros.
            return Ok(Bus::from_value_width(0, k - n).concat(from));
        }

        // Start from the k smallest indices and count the selections.
        let mut sel: Vec<usize> = (0..k).collect();
        let mut count: u64 = 1;
        for i in 1..=k {
            count = count * (n - k + i) as u64 / i as u64;
        }

        let width = clog2(count);
        let cfg = self.root.allocate_config(width);
        let name = self.root.next_choose_name(k);
        self.root.register_config(self.scope, name, cfg.clone())?;
        let res = self.root.allocate_signal(k);

        let pattern = |code: u64| -> Vec<Lit> {
            (0..width)
                .map(|j| {
                    if code >> j & 1 == 0 {
                        cfg.get(j)
                    } else {
                        -cfg.get(j)
                    }
                })
                .collect()
        };

        for code in 0..count {
            // Connect this selection's bits while the config encodes `code`.
            for j in 0..k {
                let mut clause = pattern(code);
                clause.push(from.get(sel[j]));
                clause.push(-res.get(j));
                self.root.add_clause(&clause);
                clause.truncate(width);
                clause.push(-from.get(sel[j]));
                clause.push(res.get(j));
                self.root.add_clause(&clause);
            }

            // Advance to the next combination.
            for j in (0..k).rev() {
                let next = sel[j] + 1;
                if next <= n - k + j {
                    for l in j..k {
                        sel[l] = next + (l - j);
                    }
                    break;
                }
            }
        }

        // Forbid the config codes with no selection.
        for code in count..(1u64 << width) {
            self.root.add_clause(&pattern(code));
        }
        Ok(res)
    }

    /// Per-bit equality clauses for `lhs = rhs`; the narrower side reads as
    /// zero-extended. No fresh literals.
    pub fn equate(&mut self, lhs: &Bus, rhs: &Bus) {
        for i in 0..lhs.width().max(rhs.width()) {
            let a = lhs.get(i);
            let b = rhs.get(i);
            self.root.add_clause(&[a, -b]);
            self.root.add_clause(&[-a, b]);
        }
    }
}

fn bound(val: i64) -> Result<usize> {
    usize::try_from(val).map_err(|_| Error::MalformedInput(format!("negative bound {}", val)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    /// Brute-forces every assignment of the variables mentioned by the
    /// clause store and returns the satisfying ones.
    fn satisfying_models(root: &Root) -> Vec<HashMap<i32, bool>> {
        let mut vars: Vec<i32> = root
            .clause_words()
            .iter()
            .filter(|&&w| w != 0)
            .map(|w| w.abs())
            .collect();
        vars.sort_unstable();
        vars.dedup();
        let clauses: Vec<&[i32]> = root
            .clause_words()
            .split(|&w| w == 0)
            .filter(|c| !c.is_empty())
            .collect();
        let empty_clause = root.clause_words().starts_with(&[0])
            || root.clause_words().windows(2).any(|w| w == [0, 0]);

        let mut models = Vec::new();
        if empty_clause {
            return models;
        }
        for mask in 0u64..(1 << vars.len()) {
            let assign: HashMap<i32, bool> = vars
                .iter()
                .enumerate()
                .map(|(i, &v)| (v, mask >> i & 1 != 0))
                .collect();
            let ok = clauses.iter().all(|clause| {
                clause
                    .iter()
                    .any(|&lit| assign[&lit.abs()] == (lit > 0))
            });
            if ok {
                models.push(assign);
            }
        }
        models
    }

    fn value_of(model: &HashMap<i32, bool>, bus: &Bus) -> u64 {
        let mut val = 0;
        for i in (0..bus.width()).rev() {
            val <<= 1;
            let lit = bus.get(i);
            let bit = if lit.is_const_false() {
                false
            } else {
                model[&lit.var()] != lit.is_negated()
            };
            val |= bit as u64;
        }
        val
    }

    fn lower_in(root: &mut Root, ctx: &Context, expr: &Expr) -> Bus {
        let scope = root.scope_root();
        let mut lowering = Lowering { root, ctx, scope };
        lowering.lower(expr).unwrap()
    }

    fn gate_models(op: BinaryOp) -> (Root, Bus, Bus, Bus) {
        let mut root = Root::new("<top>");
        let mut ctx = Context::new();
        let a = root.allocate_input(1);
        let b = root.allocate_input(1);
        ctx.register_bus("a", a.clone()).unwrap();
        ctx.register_bus("b", b.clone()).unwrap();
        let y = lower_in(
            &mut root,
            &ctx,
            &Expr::binary(op, Expr::name("a"), Expr::name("b")),
        );
        (root, a, b, y)
    }

    #[test]
    fn gate_truth_tables() {
        for (op, f) in [
            (BinaryOp::And, (|a, b| a & b) as fn(u64, u64) -> u64),
            (BinaryOp::Or, |a, b| a | b),
            (BinaryOp::Xor, |a, b| a ^ b),
        ] {
            let (root, a, b, y) = gate_models(op);
            let models = satisfying_models(&root);
            // One model per input combination, each with the matching output.
            assert_eq!(models.len(), 4, "{:?}", op);
            let mut seen: Vec<(u64, u64)> = models
                .iter()
                .map(|m| (value_of(m, &a), value_of(m, &b)))
                .collect();
            seen.sort_unstable();
            assert_eq!(seen, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
            for m in &models {
                assert_eq!(
                    value_of(m, &y),
                    f(value_of(m, &a), value_of(m, &b)),
                    "{:?}",
                    op
                );
            }
        }
    }

    #[test]
    fn conditional_truth_table() {
        let mut root = Root::new("<top>");
        let mut ctx = Context::new();
        for name in ["c", "p", "n"] {
            let bus = root.allocate_input(1);
            ctx.register_bus(name, bus).unwrap();
        }
        let y = lower_in(
            &mut root,
            &ctx,
            &Expr::cond(Expr::name("c"), Expr::name("p"), Expr::name("n")),
        );
        let c = ctx.resolve_bus("c").unwrap();
        let p = ctx.resolve_bus("p").unwrap();
        let n = ctx.resolve_bus("n").unwrap();
        let models = satisfying_models(&root);
        assert_eq!(models.len(), 8);
        for m in &models {
            let expected = if value_of(m, &c) != 0 {
                value_of(m, &p)
            } else {
                value_of(m, &n)
            };
            assert_eq!(value_of(m, &y), expected);
        }
    }

    #[test]
    fn equation_zero_extends_the_narrow_side() {
        let mut root = Root::new("<top>");
        let wide = root.allocate_signal(3);
        let narrow = root.allocate_signal(2);
        let ctx = Context::new();
        let scope = root.scope_root();
        let mut lowering = Lowering {
            root: &mut root,
            ctx: &ctx,
            scope,
        };
        lowering.equate(&wide, &narrow);
        let models = satisfying_models(&root);
        assert_eq!(models.len(), 4);
        for m in &models {
            assert_eq!(value_of(m, &wide), value_of(m, &narrow));
            // Bit 2 of the wide side is pinned to the zero-extension.
            assert!(!m[&wide.get(2).var()]);
        }
    }

    #[test]
    fn select_ties_result_to_indexed_line() {
        let mut root = Root::new("<top>");
        let mut ctx = Context::new();
        let lines = root.allocate_input(3);
        let sel = root.allocate_input(2);
        ctx.register_bus("lines", lines.clone()).unwrap();
        ctx.register_bus("sel", sel.clone()).unwrap();
        let y = lower_in(
            &mut root,
            &ctx,
            &Expr::binary(BinaryOp::Select, Expr::name("lines"), Expr::name("sel")),
        );
        let models = satisfying_models(&root);
        // 3 valid selector codes x 8 line values; code 3 never satisfies.
        assert_eq!(models.len(), 3 * 8);
        for m in &models {
            let index = value_of(m, &sel) as usize;
            assert!(index < 3);
            assert_eq!(value_of(m, &y), value_of(m, &lines) >> index & 1);
        }
    }

    #[test]
    fn select_forces_spare_selector_bits_low() {
        let mut root = Root::new("<top>");
        let mut ctx = Context::new();
        let lines = root.allocate_input(2);
        let sel = root.allocate_input(3); // one spare bit beyond ceil(log2(2))
        ctx.register_bus("lines", lines).unwrap();
        ctx.register_bus("sel", sel.clone()).unwrap();
        lower_in(
            &mut root,
            &ctx,
            &Expr::binary(BinaryOp::Select, Expr::name("lines"), Expr::name("sel")),
        );
        for m in satisfying_models(&root) {
            assert!(!m[&sel.get(2).var()]);
        }
    }

    #[test]
    fn choose_degenerates_to_zero_extension() {
        let mut root = Root::new("<top>");
        let mut ctx = Context::new();
        let from = root.allocate_input(2);
        ctx.register_bus("from", from.clone()).unwrap();
        let res = lower_in(
            &mut root,
            &ctx,
            &Expr::choose(Expr::constant(4), Expr::name("from")),
        );
        assert_eq!(res.width(), 4);
        assert_eq!(res.get(0), from.get(0));
        assert_eq!(res.get(1), from.get(1));
        assert!(res.get(2).is_const_false());
        assert!(res.get(3).is_const_false());
        assert_eq!(root.num_clauses(), 0);
    }

    #[test]
    fn choose_one_of_three() {
        let mut root = Root::new("<top>");
        let mut ctx = Context::new();
        let from = root.allocate_input(3);
        ctx.register_bus("from", from.clone()).unwrap();
        let res = lower_in(
            &mut root,
            &ctx,
            &Expr::choose(Expr::constant(1), Expr::name("from")),
        );
        // C(3,1) = 3 selections over a 2-bit config; code 3 is forbidden.
        let cfg = cfg_bus(&root);
        assert_eq!(cfg.width(), 2);
        let models = satisfying_models(&root);
        let mut codes: Vec<u64> = models.iter().map(|m| value_of(m, &cfg)).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes, vec![0, 1, 2]);
        for m in &models {
            let code = value_of(m, &cfg) as usize;
            assert_eq!(value_of(m, &res), value_of(m, &from) >> code & 1);
        }
    }

    #[test]
    fn choose_two_of_four_enumeration_order() {
        let mut root = Root::new("<top>");
        let mut ctx = Context::new();
        let from = root.allocate_input(4);
        ctx.register_bus("from", from.clone()).unwrap();
        let res = lower_in(
            &mut root,
            &ctx,
            &Expr::choose(Expr::constant(2), Expr::name("from")),
        );
        let cfg = cfg_bus(&root);
        // C(4,2) = 6 selections over a 3-bit config.
        assert_eq!(cfg.width(), 3);
        let subsets: [[usize; 2]; 6] = [[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];
        let models = satisfying_models(&root);
        let mut codes: Vec<u64> = models.iter().map(|m| value_of(m, &cfg)).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);
        for m in &models {
            let code = value_of(m, &cfg) as usize;
            let from_val = value_of(m, &from);
            for (j, &src) in subsets[code].iter().enumerate() {
                assert_eq!(value_of(m, &res) >> j & 1, from_val >> src & 1);
            }
        }
    }

    /// The config bus a lone choose operator allocated, reconstructed from
    /// the known class base.
    fn cfg_bus(root: &Root) -> Bus {
        let vars: Vec<Lit> = root.config_vars().map(Lit::new).collect();
        Bus::from_lits(vars)
    }

    #[test]
    fn arithmetic_in_vector_position_is_unsupported() {
        let mut root = Root::new("<top>");
        let ctx = Context::new();
        let scope = root.scope_root();
        let mut lowering = Lowering {
            root: &mut root,
            ctx: &ctx,
            scope,
        };
        let expr = Expr::binary(BinaryOp::Add, Expr::constant(1), Expr::constant(2));
        let err = lowering.lower(&expr).unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedOperator("(1)+(2)".to_string())
        );
    }
}
