// SPDX-License-Identifier: Apache-2.0

//! Signed literals and fixed-width literal vectors.
//!
//! A `Lit` names a solver variable by magnitude and carries polarity in its
//! sign. The magnitudes `1` and `2` are reserved sentinels for the constant
//! values true and false; they never name a real variable. Negation flips the
//! truth value of a sentinel the same way it flips the polarity of a variable,
//! so `-FALSE` reads as constant true.
//!
//! A `Bus` is an ordered sequence of literals, index 0 being the least
//! significant bit. Reads past the declared width yield constant false, which
//! is what makes mixed-width operand handling behave as implicit
//! zero-extension throughout the compiler.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lit(i32);

impl Lit {
    /// Sentinel for constant true.
    pub const TRUE: Lit = Lit(1);
    /// Sentinel for constant false.
    pub const FALSE: Lit = Lit(2);

    pub fn new(raw: i32) -> Self {
        debug_assert!(raw != 0, "literal 0 is reserved as a terminator");
        Lit(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    /// The variable magnitude, without polarity.
    pub fn var(self) -> i32 {
        self.0.abs()
    }

    pub fn is_negated(self) -> bool {
        self.0 < 0
    }

    pub fn is_const_true(self) -> bool {
        self.0 == Self::TRUE.0 || self.0 == -Self::FALSE.0
    }

    pub fn is_const_false(self) -> bool {
        self.0 == Self::FALSE.0 || self.0 == -Self::TRUE.0
    }

    pub fn is_sentinel(self) -> bool {
        self.var() <= Self::FALSE.0
    }
}

impl std::ops::Neg for Lit {
    type Output = Lit;

    fn neg(self) -> Lit {
        Lit(-self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bus {
    lits: Vec<Lit>,
}

impl Bus {
    pub fn empty() -> Self {
        Bus { lits: Vec::new() }
    }

    /// Encodes `val` little-endian over exactly as many bits as its leading
    /// one requires (zero encodes as the empty bus).
    pub fn from_value(val: u64) -> Self {
        Self::from_value_width(val, bit_width(val))
    }

    /// Encodes the low `width` bits of `val` little-endian.
    pub fn from_value_width(mut val: u64, width: usize) -> Self {
        let mut lits = Vec::with_capacity(width);
        for _ in 0..width {
            lits.push(if val & 1 != 0 { Lit::TRUE } else { Lit::FALSE });
            val >>= 1;
        }
        Bus { lits }
    }

    pub fn from_lits(lits: Vec<Lit>) -> Self {
        Bus { lits }
    }

    pub fn width(&self) -> usize {
        self.lits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    /// Bit read with implicit zero-extension past the declared width.
    pub fn get(&self, ofs: usize) -> Lit {
        self.lits.get(ofs).copied().unwrap_or(Lit::FALSE)
    }

    /// Inclusive slice `[beg, end]`; positions beyond the source width read
    /// as constant false and `end < beg` yields the empty bus.
    pub fn slice(&self, beg: usize, end: usize) -> Bus {
        if end < beg {
            return Bus::empty();
        }
        Bus {
            lits: (beg..=end).map(|i| self.get(i)).collect(),
        }
    }

    /// Concatenation with `low` occupying the low bit positions.
    #[must_use]
    pub fn concat(&self, low: &Bus) -> Bus {
        let mut lits = Vec::with_capacity(self.width() + low.width());
        lits.extend_from_slice(&low.lits);
        lits.extend_from_slice(&self.lits);
        Bus { lits }
    }

    /// Bitwise inversion; negates every literal, sentinels included.
    #[must_use]
    pub fn invert(&self) -> Bus {
        Bus {
            lits: self.lits.iter().map(|&l| -l).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Lit> + '_ {
        self.lits.iter().copied()
    }
}

/// Number of bits occupied by `val` (0 occupies none).
fn bit_width(val: u64) -> usize {
    (64 - val.leading_zeros()) as usize
}
