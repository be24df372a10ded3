// SPDX-License-Identifier: Apache-2.0

//! Constant folding for the integer-valued expression subset.
//!
//! Widths, generic parameter values and generate-loop bounds must resolve to
//! definite integers before any wire is allocated; this module folds those
//! expressions over the name bindings of the current context. Division and
//! modulo by zero are left to the host runtime, per the input contract.

use crate::elab::Context;
use crate::error::{Error, Result};
use crate::expr::{BinaryOp, Expr, UnaryOp};

/// Bits needed to represent every value in `[0, x)`.
pub(crate) fn clog2(x: u64) -> usize {
    if x <= 1 {
        0
    } else {
        (64 - (x - 1).leading_zeros()) as usize
    }
}

pub fn eval_const(expr: &Expr, ctx: &Context) -> Result<i64> {
    match expr {
        Expr::Const(val) => Ok(*val),
        Expr::Name(name) => ctx.resolve_const(name),
        Expr::Unary { op, arg } => {
            let arg = eval_const(arg, ctx)?;
            match op {
                UnaryOp::Not => Ok(!arg),
                UnaryOp::Neg => Ok(-arg),
                UnaryOp::Log2Ceil => Ok(clog2(arg as u64) as i64),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = eval_const(lhs, ctx)?;
            let r = eval_const(rhs, ctx)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div => Ok(l / r),
                BinaryOp::Mod => Ok(l % r),
                BinaryOp::Pow => Ok((l as f64).powf(r as f64).round() as i64),
                _ => Err(Error::UnsupportedOperator(expr.to_string())),
            }
        }
        Expr::Cond { cond, pos, neg } => {
            if eval_const(cond, ctx)? != 0 {
                eval_const(pos, ctx)
            } else {
                eval_const(neg, ctx)
            }
        }
        Expr::Range { base, left, right } => {
            let base = eval_const(base, ctx)? as u64;
            let left = eval_const(left, ctx)?;
            let right = eval_const(right, ctx)?;
            if left < right {
                return Ok(0);
            }
            let shifted = if right >= 64 { 0 } else { base >> right };
            let bits = (left - right + 1) as u64;
            let mask = if bits >= 64 { u64::MAX } else { (1 << bits) - 1 };
            Ok((shifted & mask) as i64)
        }
        Expr::Choose { .. } => Err(Error::UnsupportedOperator(expr.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn eval(expr: &Expr) -> Result<i64> {
        eval_const(expr, &Context::new())
    }

    #[test_case(BinaryOp::Add, 7, 3 => 10)]
    #[test_case(BinaryOp::Sub, 7, 3 => 4)]
    #[test_case(BinaryOp::Mul, 7, 3 => 21)]
    #[test_case(BinaryOp::Div, 7, 3 => 2)]
    #[test_case(BinaryOp::Mod, 7, 3 => 1)]
    #[test_case(BinaryOp::Pow, 2, 10 => 1024)]
    fn binary_ops(op: BinaryOp, l: i64, r: i64) -> i64 {
        eval(&Expr::binary(op, Expr::constant(l), Expr::constant(r))).unwrap()
    }

    #[test_case(0 => 0)]
    #[test_case(1 => 0)]
    #[test_case(2 => 1)]
    #[test_case(3 => 2)]
    #[test_case(4 => 2)]
    #[test_case(5 => 3)]
    #[test_case(1024 => 10)]
    #[test_case(1025 => 11)]
    fn ceiling_log2(x: u64) -> usize {
        clog2(x)
    }

    #[test]
    fn unary_ops() {
        assert_eq!(
            eval(&Expr::unary(UnaryOp::Neg, Expr::constant(5))).unwrap(),
            -5
        );
        assert_eq!(
            eval(&Expr::unary(UnaryOp::Not, Expr::constant(0))).unwrap(),
            -1
        );
        assert_eq!(
            eval(&Expr::unary(UnaryOp::Log2Ceil, Expr::constant(9))).unwrap(),
            4
        );
    }

    #[test]
    fn conditional_picks_branch() {
        let e = Expr::cond(Expr::constant(1), Expr::constant(10), Expr::constant(20));
        assert_eq!(eval(&e).unwrap(), 10);
        let e = Expr::cond(Expr::constant(0), Expr::constant(10), Expr::constant(20));
        assert_eq!(eval(&e).unwrap(), 20);
    }

    #[test]
    fn range_extracts_bit_field() {
        // 0b110110[4:1] == 0b1011
        let e = Expr::range(Expr::constant(0b110110), Expr::constant(4), Expr::constant(1));
        assert_eq!(eval(&e).unwrap(), 0b1011);
        // Inverted bounds fold to zero.
        let e = Expr::range(Expr::constant(0b110110), Expr::constant(1), Expr::constant(4));
        assert_eq!(eval(&e).unwrap(), 0);
    }

    #[test]
    fn name_lookup() {
        let mut ctx = Context::new();
        ctx.define_const("N", 12).unwrap();
        assert_eq!(eval_const(&Expr::name("N"), &ctx).unwrap(), 12);
        assert_eq!(
            eval_const(&Expr::name("M"), &ctx),
            Err(Error::UnresolvedName("M".to_string()))
        );
    }

    #[test]
    fn bus_operators_are_rejected() {
        let e = Expr::binary(BinaryOp::Select, Expr::constant(1), Expr::constant(2));
        assert!(matches!(eval(&e), Err(Error::UnsupportedOperator(_))));
        let e = Expr::choose(Expr::constant(1), Expr::name("a"));
        assert!(matches!(eval(&e), Err(Error::UnsupportedOperator(_))));
    }
}
