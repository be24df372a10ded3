// SPDX-License-Identifier: Apache-2.0

//! The immutable expression tree handed over by the front end.
//!
//! Expressions are consumed in two different positions: constant contexts
//! (widths, generic values, loop bounds) folded by `eval`, and bit-vector
//! contexts lowered to buses and clauses by `lower`. A node kind that is
//! meaningless in the position it appears in fails there with
//! `UnsupportedOperator`; the `Display` rendering below is what ends up in
//! that diagnostic.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation (constant contexts only).
    Neg,
    /// Bit complement; bus inversion in vector contexts.
    Not,
    /// Ceiling log2: bits needed to represent values in `[0, x)`.
    Log2Ceil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    /// Indexed select `lhs @ rhs`: rhs is a binary line selector over lhs.
    Select,
    /// Concatenation; the right operand takes the low bit positions.
    Concat,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Const(i64),
    Name(String),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        pos: Box<Expr>,
        neg: Box<Expr>,
    },
    /// Bit-range select `base[left:right]`; both bounds are constant
    /// expressions.
    Range {
        base: Box<Expr>,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Combinatorial k-subset selection `choose<k>(from)`.
    Choose {
        k: Box<Expr>,
        from: Box<Expr>,
    },
}

impl Expr {
    pub fn constant(val: i64) -> Expr {
        Expr::Const(val)
    }

    pub fn name(name: impl Into<String>) -> Expr {
        Expr::Name(name.into())
    }

    pub fn unary(op: UnaryOp, arg: Expr) -> Expr {
        Expr::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn cond(cond: Expr, pos: Expr, neg: Expr) -> Expr {
        Expr::Cond {
            cond: Box::new(cond),
            pos: Box::new(pos),
            neg: Box::new(neg),
        }
    }

    pub fn range(base: Expr, left: Expr, right: Expr) -> Expr {
        Expr::Range {
            base: Box::new(base),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Single-bit select `base[i]`.
    pub fn bit(base: Expr, i: i64) -> Expr {
        Expr::range(base, Expr::Const(i), Expr::Const(i))
    }

    pub fn choose(k: Expr, from: Expr) -> Expr {
        Expr::Choose {
            k: Box::new(k),
            from: Box::new(from),
        }
    }
}

impl UnaryOp {
    fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "~",
            UnaryOp::Log2Ceil => "ld ",
        }
    }
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Select => "@",
            BinaryOp::Concat => ",",
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Const(val) => write!(f, "{}", val),
            Expr::Name(name) => write!(f, "{}", name),
            Expr::Unary { op, arg } => write!(f, "{}({})", op.symbol(), arg),
            Expr::Binary { op, lhs, rhs } => write!(f, "({}){}({})", lhs, op.symbol(), rhs),
            Expr::Cond { cond, pos, neg } => write!(f, "({})?({}):({})", cond, pos, neg),
            Expr::Range { base, left, right } => write!(f, "({})[{}:{}]", base, left, right),
            Expr::Choose { k, from } => write!(f, "CHOOSE<{}>({})", k, from),
        }
    }
}
