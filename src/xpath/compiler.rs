//! XPath Expression Compiler
//!
//! Compiles parsed XPath expressions into a stack program. Namespace
//! prefixes in name tests are resolved here, so a compiled expression is
//! tied to the bindings it was compiled with.

use super::parser::{self, Axis, BinaryOp, Expr, NodeTest, Step};
use crate::dom::namespace::ns;

/// Compiled XPath expression
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub ops: Vec<Op>,
}

/// Compiled operation
#[derive(Debug, Clone)]
pub enum Op {
    /// Push the document node onto the stack
    Root,
    /// Push context node onto stack
    Context,
    /// Replace the node-set on top of the stack with the nodes reached by
    /// one location step; predicates see positions in axis order
    Step {
        axis: Axis,
        test: CompiledNodeTest,
        predicates: Vec<CompiledExpr>,
    },
    /// Filter the node-set on top of the stack, positions in document order
    Filter(Box<CompiledExpr>),
    /// Union two node sets
    Union,
    /// Push literal number
    Number(f64),
    /// Push literal string
    String(String),
    /// Call function
    Call(String, usize), // name, arg count
    /// Binary operation
    Binary(BinaryOp),
    /// `and` with its right operand, evaluated only when needed
    And(Box<CompiledExpr>),
    /// `or` with its right operand, evaluated only when needed
    Or(Box<CompiledExpr>),
    /// Negate
    Negate,
    /// Variable reference
    Variable(String),
}

/// Compiled node test, names carrying their namespace URI
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledNodeTest {
    Any,
    Name { namespace: Option<String>, local: String },
    NamespaceWildcard(String),
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
}

/// Parse and compile `source` with `namespaces` as the prefix bindings
pub fn compile(source: &str, namespaces: &[(String, String)]) -> Result<CompiledExpr, String> {
    let expr = parser::parse(source)?;
    CompiledExpr::compile(&expr, namespaces)
}

struct Compiler<'a> {
    namespaces: &'a [(String, String)],
}

impl Compiler<'_> {
    fn resolve(&self, prefix: &str) -> Result<String, String> {
        if prefix == "xml" {
            return Ok(ns::XML.to_string());
        }
        self.namespaces
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
            .ok_or_else(|| format!("Undefined namespace prefix: {}", prefix))
    }

    fn compile(&self, expr: &Expr) -> Result<CompiledExpr, String> {
        let mut ops = Vec::new();
        self.compile_expr(expr, &mut ops)?;
        Ok(CompiledExpr { ops })
    }

    fn compile_expr(&self, expr: &Expr, ops: &mut Vec<Op>) -> Result<(), String> {
        match expr {
            Expr::Root => {
                ops.push(Op::Root);
            }
            Expr::Number(n) => {
                ops.push(Op::Number(*n));
            }
            Expr::String(s) => {
                ops.push(Op::String(s.clone()));
            }
            Expr::Variable(name) => {
                ops.push(Op::Variable(name.clone()));
            }
            Expr::Negate(inner) => {
                self.compile_expr(inner, ops)?;
                ops.push(Op::Negate);
            }
            Expr::Binary(left, BinaryOp::And, right) => {
                self.compile_expr(left, ops)?;
                ops.push(Op::And(Box::new(self.compile(right)?)));
            }
            Expr::Binary(left, BinaryOp::Or, right) => {
                self.compile_expr(left, ops)?;
                ops.push(Op::Or(Box::new(self.compile(right)?)));
            }
            Expr::Binary(left, op, right) => {
                self.compile_expr(left, ops)?;
                self.compile_expr(right, ops)?;
                ops.push(Op::Binary(*op));
            }
            Expr::Union(left, right) => {
                self.compile_expr(left, ops)?;
                self.compile_expr(right, ops)?;
                ops.push(Op::Union);
            }
            Expr::Path(base, step) => {
                self.compile_expr(base, ops)?;
                ops.push(self.compile_step(step)?);
            }
            Expr::Filter(base, pred) => {
                self.compile_expr(base, ops)?;
                ops.push(Op::Filter(Box::new(self.compile(pred)?)));
            }
            Expr::Step(step) => {
                ops.push(Op::Context);
                ops.push(self.compile_step(step)?);
            }
            Expr::Function(name, args) => {
                for arg in args {
                    self.compile_expr(arg, ops)?;
                }
                ops.push(Op::Call(name.clone(), args.len()));
            }
        }
        Ok(())
    }

    fn compile_step(&self, step: &Step) -> Result<Op, String> {
        let test = match &step.node_test {
            NodeTest::Any => CompiledNodeTest::Any,
            NodeTest::Name(n) => CompiledNodeTest::Name {
                namespace: None,
                local: n.clone(),
            },
            NodeTest::QName(prefix, local) => CompiledNodeTest::Name {
                namespace: Some(self.resolve(prefix)?),
                local: local.clone(),
            },
            NodeTest::NamespaceWildcard(prefix) => CompiledNodeTest::NamespaceWildcard(self.resolve(prefix)?),
            NodeTest::Node => CompiledNodeTest::Node,
            NodeTest::Text => CompiledNodeTest::Text,
            NodeTest::Comment => CompiledNodeTest::Comment,
            NodeTest::ProcessingInstruction(arg) => CompiledNodeTest::ProcessingInstruction(arg.clone()),
        };

        let predicates = step
            .predicates
            .iter()
            .map(|pred| self.compile(pred))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Op::Step {
            axis: step.axis,
            test,
            predicates,
        })
    }
}

impl CompiledExpr {
    /// Compile an XPath expression
    pub fn compile(expr: &Expr, namespaces: &[(String, String)]) -> Result<Self, String> {
        Compiler { namespaces }.compile(expr)
    }
}
