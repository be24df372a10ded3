// SPDX-License-Identifier: Apache-2.0

//! Component declarations and the statement executor.
//!
//! A `Library` holds the component declarations handed over by the front
//! end. Elaboration starts at a top-level declaration and executes its
//! statement list top to bottom, recursing into a fresh context and scope
//! frame for every instantiation. Nothing is rolled back: every error is
//! fatal to the whole pass.
//!
//! Binding tables are lexical. An instantiation seeds its child context with
//! the declaration's formals only (generic values and port buses); a generate
//! iteration runs on a snapshot of the enclosing context with the loop
//! variable shadowed locally, so siblings and ancestors are never mutated
//! through a child.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::bus::Bus;
use crate::error::{Error, Result};
use crate::eval::eval_const;
use crate::expr::Expr;
use crate::lower::Lowering;
use crate::root::Root;
use crate::scope::ScopeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone)]
pub struct PortDecl {
    pub dir: Direction,
    pub name: String,
    pub width: Expr,
}

/// One instantiation site: a labeled reference to a component declaration
/// with generic actuals and port connections.
#[derive(Debug, Clone)]
pub struct Inst {
    pub label: String,
    pub component: String,
    pub generics: Vec<Expr>,
    pub connections: Vec<Expr>,
}

impl Inst {
    pub fn new(label: impl Into<String>, component: impl Into<String>) -> Self {
        Inst {
            label: label.into(),
            component: component.into(),
            generics: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn generic(mut self, expr: Expr) -> Self {
        self.generics.push(expr);
        self
    }

    pub fn connect(mut self, expr: Expr) -> Self {
        self.connections.push(expr);
        self
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Constant { name: String, value: Expr },
    Config { name: String, width: Expr },
    Signal { name: String, width: Expr },
    Equation { lhs: Expr, rhs: Expr },
    Instantiate(Inst),
    Generate {
        var: String,
        lo: Expr,
        hi: Expr,
        body: Vec<Stmt>,
    },
}

impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stmt::Constant { name, value } => write!(f, "constant {} = {}", name, value),
            Stmt::Config { name, width } => write!(f, "config {}[{}]", name, width),
            Stmt::Signal { name, width } => write!(f, "signal {}[{}]", name, width),
            Stmt::Equation { lhs, rhs } => write!(f, "{} = {}", lhs, rhs),
            Stmt::Instantiate(inst) => {
                write!(f, "{} : {}", inst.label, inst.component)?;
                if !inst.generics.is_empty() {
                    let mut sep = '<';
                    for g in &inst.generics {
                        write!(f, "{}{}", sep, g)?;
                        sep = ',';
                    }
                    write!(f, ">")?;
                }
                write!(f, "(")?;
                for (i, c) in inst.connections.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            Stmt::Generate { var, lo, hi, body } => {
                write!(f, "generate {} = {}..{} [{} statements]", var, lo, hi, body.len())
            }
        }
    }
}

#[derive(Debug)]
pub struct CompDecl {
    pub name: String,
    pub params: Vec<String>,
    pub ports: Vec<PortDecl>,
    pub stmts: Vec<Stmt>,
}

impl CompDecl {
    pub fn new(name: impl Into<String>) -> Self {
        CompDecl {
            name: name.into(),
            params: Vec::new(),
            ports: Vec::new(),
            stmts: Vec::new(),
        }
    }

    pub fn add_param(&mut self, name: impl Into<String>) {
        self.params.push(name.into());
    }

    pub fn add_port(&mut self, dir: Direction, name: impl Into<String>, width: Expr) {
        self.ports.push(PortDecl {
            dir,
            name: name.into(),
            width,
        });
    }

    pub fn add_stmt(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }
}

/// The lexical binding tables of one elaboration context: constants and
/// buses, both shadowable in child snapshots but never mutated upward.
#[derive(Debug, Clone, Default)]
pub struct Context {
    consts: HashMap<String, i64>,
    buses: HashMap<String, Bus>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn define_const(&mut self, name: impl Into<String>, val: i64) -> Result<()> {
        let name = name.into();
        if self.consts.contains_key(&name) {
            return Err(Error::NameConflict(name));
        }
        self.consts.insert(name, val);
        Ok(())
    }

    /// Unconditional (re)definition, used for generate loop variables.
    pub fn shadow_const(&mut self, name: impl Into<String>, val: i64) {
        self.consts.insert(name.into(), val);
    }

    pub fn resolve_const(&self, name: &str) -> Result<i64> {
        self.consts
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnresolvedName(name.to_string()))
    }

    pub fn register_bus(&mut self, name: impl Into<String>, bus: Bus) -> Result<()> {
        let name = name.into();
        if self.buses.contains_key(&name) {
            return Err(Error::NameConflict(name));
        }
        self.buses.insert(name, bus);
        Ok(())
    }

    /// Resolves a name to a bus, falling back to the little-endian encoding
    /// of a constant of the same name.
    pub fn resolve_bus(&self, name: &str) -> Result<Bus> {
        if let Some(bus) = self.buses.get(name) {
            return Ok(bus.clone());
        }
        Ok(Bus::from_value(self.resolve_const(name)? as u64))
    }
}

#[derive(Debug, Default)]
pub struct Library {
    comps: BTreeMap<String, CompDecl>,
}

impl Library {
    pub fn new() -> Self {
        Library::default()
    }

    pub fn declare(&mut self, decl: CompDecl) -> Result<()> {
        if self.comps.contains_key(&decl.name) {
            return Err(Error::NameConflict(decl.name));
        }
        self.comps.insert(decl.name.clone(), decl);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&CompDecl> {
        self.comps
            .get(name)
            .ok_or_else(|| Error::UnresolvedName(name.to_string()))
    }

    /// Runs the single elaboration pass over `top`, returning the root that
    /// now owns the assembled problem. Top-level `in` ports are backed by
    /// universal Input literals; `out` ports by Signal literals.
    pub fn elaborate(&self, top: &str, generics: &[i64]) -> Result<Root> {
        let decl = self.resolve(top)?;
        if generics.len() != decl.params.len() {
            return Err(Error::ArityMismatch {
                component: decl.name.clone(),
                what: "generics",
                expected: decl.params.len(),
                actual: generics.len(),
            });
        }
        let mut root = Root::new(top);
        let mut ctx = Context::new();
        for (formal, &value) in decl.params.iter().zip(generics) {
            ctx.define_const(formal.clone(), value)?;
        }
        for port in &decl.ports {
            let width = width_of(&port.width, &ctx)?;
            let bus = match port.dir {
                Direction::In => root.allocate_input(width),
                Direction::Out => root.allocate_signal(width),
            };
            ctx.register_bus(port.name.clone(), bus)?;
        }
        let scope = root.scope_root();
        Elaborator {
            lib: self,
            root: &mut root,
            generates: 0,
        }
        .run_body(decl, &mut ctx, scope)?;
        Ok(root)
    }
}

fn width_of(expr: &Expr, ctx: &Context) -> Result<usize> {
    let width = eval_const(expr, ctx)?;
    usize::try_from(width).map_err(|_| Error::MalformedInput(format!("negative width {}", width)))
}

struct Elaborator<'a> {
    lib: &'a Library,
    root: &'a mut Root,
    /// Serial per executed generate statement; keeps unrolled iterations of
    /// distinct loops apart even when they reuse a loop variable name.
    generates: u32,
}

impl<'a> Elaborator<'a> {
    fn run_body(&mut self, decl: &CompDecl, ctx: &mut Context, scope: ScopeId) -> Result<()> {
        debug!("compiling {} ...", decl.name);
        for stmt in &decl.stmts {
            debug!("  {}", stmt);
            self.execute(stmt, ctx, scope)?;
        }
        debug!("compiling {} done", decl.name);
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt, ctx: &mut Context, scope: ScopeId) -> Result<()> {
        match stmt {
            Stmt::Constant { name, value } => {
                let value = eval_const(value, ctx)?;
                ctx.define_const(name.clone(), value)
            }
            Stmt::Config { name, width } => {
                let width = width_of(width, ctx)?;
                let bus = self.root.allocate_config(width);
                ctx.register_bus(name.clone(), bus.clone())?;
                self.root.register_config(scope, name.clone(), bus)
            }
            Stmt::Signal { name, width } => {
                let width = width_of(width, ctx)?;
                let bus = self.root.allocate_signal(width);
                ctx.register_bus(name.clone(), bus)
            }
            Stmt::Equation { lhs, rhs } => {
                let mut lowering = Lowering {
                    root: self.root,
                    ctx,
                    scope,
                };
                let lhs = lowering.lower(lhs)?;
                let rhs = lowering.lower(rhs)?;
                lowering.equate(&lhs, &rhs);
                Ok(())
            }
            Stmt::Instantiate(inst) => self.instantiate(inst, ctx, scope),
            Stmt::Generate { var, lo, hi, body } => {
                let lo = eval_const(lo, ctx)?;
                let hi = eval_const(hi, ctx)?;
                let serial = self.generates;
                self.generates += 1;
                for value in lo..=hi {
                    let mut iter_ctx = ctx.clone();
                    iter_ctx.shadow_const(var.clone(), value);
                    let display = format!("{}#{}", var, value);
                    let iter_scope = self.root.create_scope(
                        scope,
                        format!("{}@{}", display, serial),
                        display,
                    )?;
                    for stmt in body {
                        self.execute(stmt, &mut iter_ctx, iter_scope)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn instantiate(&mut self, inst: &Inst, ctx: &Context, scope: ScopeId) -> Result<()> {
        let lib = self.lib;
        let decl = lib.resolve(&inst.component)?;
        if inst.generics.len() != decl.params.len() {
            return Err(Error::ArityMismatch {
                component: decl.name.clone(),
                what: "generics",
                expected: decl.params.len(),
                actual: inst.generics.len(),
            });
        }
        if inst.connections.len() != decl.ports.len() {
            return Err(Error::ArityMismatch {
                component: decl.name.clone(),
                what: "ports",
                expected: decl.ports.len(),
                actual: inst.connections.len(),
            });
        }

        let mut child_ctx = Context::new();
        for (formal, actual) in decl.params.iter().zip(&inst.generics) {
            child_ctx.define_const(formal.clone(), eval_const(actual, ctx)?)?;
        }
        for (port, actual) in decl.ports.iter().zip(&inst.connections) {
            let bus = Lowering {
                root: self.root,
                ctx,
                scope,
            }
            .lower(actual)?;
            child_ctx.register_bus(port.name.clone(), bus)?;
        }

        // Labels are the namespace; the component type only shows up in the
        // report path.
        let child_scope = self.root.create_scope(
            scope,
            inst.label.clone(),
            format!("{}:{}", inst.label, decl.name),
        )?;
        self.run_body(decl, &mut child_ctx, child_scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;
    use pretty_assertions::assert_eq;

    fn lib_with(decl: CompDecl) -> Library {
        let mut lib = Library::new();
        lib.declare(decl).unwrap();
        lib
    }

    #[test]
    fn duplicate_declaration_is_a_conflict() {
        let mut top = CompDecl::new("top");
        top.add_stmt(Stmt::Signal {
            name: "s".to_string(),
            width: Expr::constant(1),
        });
        top.add_stmt(Stmt::Signal {
            name: "s".to_string(),
            width: Expr::constant(1),
        });
        let lib = lib_with(top);
        assert_eq!(
            lib.elaborate("top", &[]).unwrap_err(),
            Error::NameConflict("s".to_string())
        );
    }

    #[test]
    fn unresolved_identifier_aborts() {
        let mut top = CompDecl::new("top");
        top.add_stmt(Stmt::Equation {
            lhs: Expr::name("nonesuch"),
            rhs: Expr::constant(0),
        });
        let lib = lib_with(CompDecl::new("other"));
        assert_eq!(
            lib.elaborate("top", &[]).unwrap_err(),
            Error::UnresolvedName("top".to_string())
        );
        let lib = lib_with(top);
        assert_eq!(
            lib.elaborate("top", &[]).unwrap_err(),
            Error::UnresolvedName("nonesuch".to_string())
        );
    }

    #[test]
    fn generic_arity_is_checked() {
        let mut inner = CompDecl::new("inner");
        inner.add_param("K");
        let mut top = CompDecl::new("top");
        top.add_stmt(Stmt::Instantiate(Inst::new("u0", "inner")));
        let mut lib = lib_with(inner);
        lib.declare(top).unwrap();
        assert_eq!(
            lib.elaborate("top", &[]).unwrap_err(),
            Error::ArityMismatch {
                component: "inner".to_string(),
                what: "generics",
                expected: 1,
                actual: 0,
            }
        );
    }

    #[test]
    fn port_arity_is_checked() {
        let mut inner = CompDecl::new("inner");
        inner.add_port(Direction::In, "a", Expr::constant(1));
        let mut top = CompDecl::new("top");
        top.add_stmt(Stmt::Instantiate(Inst::new("u0", "inner")));
        let mut lib = lib_with(inner);
        lib.declare(top).unwrap();
        assert_eq!(
            lib.elaborate("top", &[]).unwrap_err(),
            Error::ArityMismatch {
                component: "inner".to_string(),
                what: "ports",
                expected: 1,
                actual: 0,
            }
        );
    }

    #[test]
    fn duplicate_instance_label_is_a_conflict() {
        let inner = CompDecl::new("inner");
        let mut top = CompDecl::new("top");
        top.add_stmt(Stmt::Instantiate(Inst::new("u0", "inner")));
        top.add_stmt(Stmt::Instantiate(Inst::new("u0", "inner")));
        let mut lib = lib_with(inner);
        lib.declare(top).unwrap();
        assert_eq!(
            lib.elaborate("top", &[]).unwrap_err(),
            Error::NameConflict("u0".to_string())
        );
    }

    #[test]
    fn duplicate_label_across_component_types_is_a_conflict() {
        // The label alone is the namespace; differing types do not make two
        // instantiations under the same label distinct.
        let mut top = CompDecl::new("top");
        top.add_stmt(Stmt::Instantiate(Inst::new("u0", "a")));
        top.add_stmt(Stmt::Instantiate(Inst::new("u0", "b")));
        let mut lib = lib_with(CompDecl::new("a"));
        lib.declare(CompDecl::new("b")).unwrap();
        lib.declare(top).unwrap();
        assert_eq!(
            lib.elaborate("top", &[]).unwrap_err(),
            Error::NameConflict("u0".to_string())
        );
    }

    #[test]
    fn sequential_generates_may_reuse_the_loop_variable() {
        let loop_body = |width: i64| Stmt::Generate {
            var: "i".to_string(),
            lo: Expr::constant(0),
            hi: Expr::constant(1),
            body: vec![Stmt::Config {
                name: "c".to_string(),
                width: Expr::constant(width),
            }],
        };
        let mut top = CompDecl::new("top");
        top.add_stmt(loop_body(1));
        top.add_stmt(loop_body(2));
        let lib = lib_with(top);
        let mut root = lib.elaborate("top", &[]).unwrap();
        // Both loops unroll fully: 2 x 1-bit plus 2 x 2-bit configs.
        assert_eq!(root.config_vars().len(), 6);
        assert!(root.solve().is_satisfiable());
        // The iterations of both loops render under the plain var#value path.
        let report = root.config_report().unwrap();
        assert_eq!(report.matches("/i#0\n").count(), 2);
        assert_eq!(report.matches("/i#1\n").count(), 2);
    }

    #[test]
    fn generate_unrolls_into_numbered_scopes() {
        let mut top = CompDecl::new("top");
        top.add_stmt(Stmt::Generate {
            var: "i".to_string(),
            lo: Expr::constant(0),
            hi: Expr::constant(2),
            body: vec![
                Stmt::Config {
                    name: "c".to_string(),
                    width: Expr::constant(1),
                },
                // The loop variable is a constant inside the body.
                Stmt::Equation {
                    lhs: Expr::name("c"),
                    rhs: Expr::binary(
                        BinaryOp::And,
                        Expr::name("c"),
                        Expr::range(Expr::name("i"), Expr::constant(0), Expr::constant(0)),
                    ),
                },
            ],
        });
        let lib = lib_with(top);
        let mut root = lib.elaborate("top", &[]).unwrap();
        // One 1-bit config per iteration, no collision across iterations.
        assert_eq!(root.config_vars().len(), 3);
        assert!(root.solve().is_satisfiable());
        let report = root.config_report().unwrap();
        assert!(report.contains("/i#0\n"));
        assert!(report.contains("/i#1\n"));
        assert!(report.contains("/i#2\n"));
    }

    #[test]
    fn constant_generic_binding_reaches_widths() {
        let mut inner = CompDecl::new("inner");
        inner.add_param("K");
        inner.add_port(Direction::In, "x", Expr::name("K"));
        inner.add_stmt(Stmt::Config {
            name: "c".to_string(),
            width: Expr::binary(BinaryOp::Pow, Expr::constant(2), Expr::name("K")),
        });
        let mut top = CompDecl::new("top");
        top.add_port(Direction::In, "x", Expr::constant(3));
        top.add_stmt(Stmt::Instantiate(
            Inst::new("u0", "inner")
                .generic(Expr::constant(3))
                .connect(Expr::name("x")),
        ));
        let mut lib = lib_with(inner);
        lib.declare(top).unwrap();
        let root = lib.elaborate("top", &[]).unwrap();
        assert_eq!(root.config_vars().len(), 8);
        assert_eq!(root.input_vars().len(), 3);
    }
}
