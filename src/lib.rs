// SPDX-License-Identifier: Apache-2.0

//! Circuit synthesis by matching: elaborates a hierarchical component
//! description into a three-block 2QBF problem ("does a configuration exist
//! that is correct for every input?") and either solves it directly or emits
//! it as QDIMACS for an external solver.
//!
//! The pipeline is `elab` (statement execution over a component library) on
//! top of `lower` (bit-vector expression compilation to Tseitin clauses) on
//! top of `root` (the literal allocator and clause store), with `oracle`
//! supplying the solver back end.

pub mod bus;
pub mod elab;
pub mod error;
pub mod eval;
pub mod expr;
pub mod lower;
pub mod oracle;
pub mod qdimacs;
pub mod root;
pub mod scope;
