// SPDX-License-Identifier: Apache-2.0

//! QDIMACS emission for external QBF solvers.
//!
//! The prefix is the same ∃∀∃ structure the built-in oracle receives, over
//! the compacted contiguous variable numbering. Empty quantifier blocks are
//! omitted, since QDIMACS does not allow a quantifier line without
//! variables.

use std::io::{self, Write};

use crate::root::Root;

impl Root {
    pub fn write_qdimacs<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let map = self.var_map();
        writeln!(out, "p cnf {} {}", map.num_vars(), self.num_clauses())?;

        let blocks = [
            ('e', self.config_vars()),
            ('a', self.input_vars()),
            ('e', self.signal_vars()),
        ];
        for (quant, vars) in blocks {
            if vars.is_empty() {
                continue;
            }
            write!(out, "{}", quant)?;
            for v in vars {
                write!(out, " {}", map.compact_var(v))?;
            }
            writeln!(out, " 0")?;
        }

        for &w in self.clause_words() {
            if w == 0 {
                writeln!(out, "0")?;
            } else {
                write!(out, "{} ", map.compact_lit(w))?;
            }
        }
        Ok(())
    }
}
