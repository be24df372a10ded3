// SPDX-License-Identifier: Apache-2.0

//! Command line driver: matches a K-input lookup table against a target
//! truth table.
//!
//! Builds the library programmatically (a `lut` component whose config bus
//! is index-selected by the input bus, instantiated under a top that pins
//! the output to the target function), then either solves the problem with
//! the built-in oracle or writes it out as QDIMACS.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;

use qbm::elab::{CompDecl, Direction, Inst, Library, Stmt};
use qbm::error::{Error, Result};
use qbm::expr::{BinaryOp, Expr};

#[derive(Parser)]
#[command(about = "Synthesizes a LUT configuration matching a target truth table")]
struct Args {
    /// Number of LUT inputs.
    #[arg(short = 'k', long, default_value_t = 2)]
    inputs: usize,

    /// Target truth table, MSB first, one binary digit per input code
    /// (e.g. "1000" is 2-input AND).
    #[arg(short, long)]
    target: String,

    /// Write the problem as QDIMACS to this path instead of solving it.
    #[arg(long)]
    qdimacs: Option<PathBuf>,
}

/// The built-in oracle expands all universal input assignments, so anything
/// beyond its limit cannot be solved anyway.
const MAX_INPUTS: usize = 24;

fn parse_target(text: &str, k: usize) -> Result<u64> {
    if k > MAX_INPUTS {
        return Err(Error::MalformedInput(format!(
            "{} inputs exceed the supported maximum of {}",
            k, MAX_INPUTS
        )));
    }
    if text.len() != 1 << k {
        return Err(Error::MalformedInput(format!(
            "target '{}' must have {} digits for {} inputs",
            text,
            1u64 << k,
            k
        )));
    }
    u64::from_str_radix(text, 2)
        .map_err(|_| Error::MalformedInput(format!("target '{}' is not binary", text)))
}

fn build_library(k: usize, target: u64) -> Result<Library> {
    let mut lut = CompDecl::new("lut");
    lut.add_param("K");
    lut.add_port(Direction::In, "x", Expr::name("K"));
    lut.add_port(Direction::Out, "y", Expr::constant(1));
    lut.add_stmt(Stmt::Config {
        name: "c".to_string(),
        width: Expr::binary(BinaryOp::Pow, Expr::constant(2), Expr::name("K")),
    });
    lut.add_stmt(Stmt::Equation {
        lhs: Expr::name("y"),
        rhs: Expr::binary(BinaryOp::Select, Expr::name("c"), Expr::name("x")),
    });

    // The target table is a constant bus indexed by the same inputs, so the
    // equation forces the LUT to realize it for every input code. The range
    // pads the constant to the full 2**K lines, otherwise a table with a
    // zero in its top entries would leave some input codes without a line.
    let mut top = CompDecl::new("top");
    top.add_port(Direction::In, "x", Expr::constant(k as i64));
    top.add_port(Direction::Out, "y", Expr::constant(1));
    top.add_stmt(Stmt::Instantiate(
        Inst::new("u0", "lut")
            .generic(Expr::constant(k as i64))
            .connect(Expr::name("x"))
            .connect(Expr::name("y")),
    ));
    top.add_stmt(Stmt::Equation {
        lhs: Expr::name("y"),
        rhs: Expr::binary(
            BinaryOp::Select,
            Expr::range(
                Expr::constant(target as i64),
                Expr::constant((1i64 << k) - 1),
                Expr::constant(0),
            ),
            Expr::name("x"),
        ),
    });

    let mut lib = Library::new();
    lib.declare(lut)?;
    lib.declare(top)?;
    Ok(lib)
}

fn run(args: &Args) -> Result<bool> {
    let target = parse_target(&args.target, args.inputs)?;
    let lib = build_library(args.inputs, target)?;
    let mut root = lib.elaborate("top", &[])?;

    if let Some(path) = &args.qdimacs {
        let file = File::create(path)
            .map_err(|e| Error::MalformedInput(format!("{}: {}", path.display(), e)))?;
        root.write_qdimacs(&mut BufWriter::new(file))
            .map_err(|e| Error::MalformedInput(format!("{}: {}", path.display(), e)))?;
        println!("wrote {}", path.display());
        return Ok(true);
    }

    let verdict = root.solve();
    println!("{}", verdict);
    if verdict.is_satisfiable() {
        print!("{}", root.config_report()?);
    }
    Ok(verdict.is_satisfiable())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parsing() {
        assert_eq!(parse_target("1000", 2).unwrap(), 8);
        assert!(matches!(
            parse_target("10", 2),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            parse_target("12xy", 2),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn oversized_input_count_is_rejected() {
        // Far past any usable width; must fail cleanly, not overflow the
        // table-size computation.
        assert!(matches!(
            parse_target("1000", 200),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            parse_target("1000", usize::MAX),
            Err(Error::MalformedInput(_))
        ));
    }
}

fn main() {
    let _ = env_logger::builder()
        .format_timestamp(None)
        .try_init();
    let args = Args::parse();
    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}
