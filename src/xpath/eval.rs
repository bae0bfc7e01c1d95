//! XPath Evaluation Engine
//!
//! Evaluates compiled XPath expressions against a [`Document`]. Variables,
//! extension functions and the prefix map used by `print()` travel in
//! [`Bindings`].

use std::collections::HashMap;

use super::axes::{matches_node_test, navigate};
use super::compiler::{CompiledExpr, Op};
use super::extensions::FunctionRegistry;
use super::functions::{self, FunctionContext};
use super::parser::BinaryOp;
use super::value::{parse_number, XPathValue};
use crate::dom::{Document, NodeRef, DOCUMENT_NODE};
use crate::query::namespaces::PrefixMap;

/// Variable values by name, without the `$`
pub type Variables = HashMap<String, XPathValue>;

/// Everything an expression may refer to besides the document
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub variables: &'a Variables,
    pub functions: &'a FunctionRegistry,
    pub prefixes: &'a PrefixMap,
}

/// Evaluation context
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub doc: &'a Document,
    pub context_node: NodeRef,
    pub context_position: usize,
    pub context_size: usize,
    pub bindings: Bindings<'a>,
}

impl<'a> EvalContext<'a> {
    /// Context of a top-level evaluation at `node`
    pub fn new(doc: &'a Document, node: NodeRef, bindings: Bindings<'a>) -> Self {
        EvalContext {
            doc,
            context_node: node,
            context_position: 1,
            context_size: 1,
            bindings,
        }
    }

    fn at(&self, node: NodeRef, position: usize, size: usize) -> Self {
        EvalContext {
            context_node: node,
            context_position: position,
            context_size: size,
            ..*self
        }
    }

    fn function_context(&self) -> FunctionContext<'a> {
        FunctionContext {
            doc: self.doc,
            node: self.context_node,
            position: self.context_position,
            size: self.context_size,
            prefixes: self.bindings.prefixes,
        }
    }
}

/// Evaluate a compiled expression
pub fn evaluate_compiled(expr: &CompiledExpr, ctx: &EvalContext<'_>) -> Result<XPathValue, String> {
    let mut stack: Vec<XPathValue> = Vec::new();

    for op in &expr.ops {
        match op {
            Op::Root => {
                stack.push(XPathValue::single_node(NodeRef::Node(DOCUMENT_NODE)));
            }

            Op::Context => {
                stack.push(XPathValue::single_node(ctx.context_node));
            }

            Op::Step { axis, test, predicates } => {
                let nodes = pop_nodeset(&mut stack, "Path step")?;
                let mut result = Vec::new();
                for node in nodes {
                    let mut candidates: Vec<NodeRef> = navigate(ctx.doc, node, *axis)
                        .into_iter()
                        .filter(|n| matches_node_test(ctx.doc, *n, *axis, test))
                        .collect();
                    for predicate in predicates {
                        candidates = apply_predicate(ctx, candidates, predicate)?;
                    }
                    result.extend(candidates);
                }
                ctx.doc.sort_document_order(&mut result);
                stack.push(XPathValue::NodeSet(result));
            }

            Op::Filter(predicate) => {
                let nodes = pop_nodeset(&mut stack, "Predicate")?;
                stack.push(XPathValue::NodeSet(apply_predicate(ctx, nodes, predicate)?));
            }

            Op::Union => {
                let right = pop_nodeset(&mut stack, "Union")?;
                let mut left = pop_nodeset(&mut stack, "Union")?;
                left.extend(right);
                ctx.doc.sort_document_order(&mut left);
                stack.push(XPathValue::NodeSet(left));
            }

            Op::Number(n) => {
                stack.push(XPathValue::Number(*n));
            }

            Op::String(s) => {
                stack.push(XPathValue::String(s.clone()));
            }

            Op::Call(name, argc) => {
                if stack.len() < *argc {
                    return Err(format!("Missing arguments for {}()", name));
                }
                let args = stack.split_off(stack.len() - argc);
                let fctx = ctx.function_context();
                let result = if functions::is_core(name) {
                    functions::call(name, args, &fctx)?
                } else if let Some(function) = ctx.bindings.functions.get(name) {
                    function(&fctx, args)?
                } else {
                    return Err(format!("Unknown function: {}()", name));
                };
                stack.push(result);
            }

            Op::Binary(op) => {
                let right = pop(&mut stack)?;
                let left = pop(&mut stack)?;
                stack.push(binary(ctx.doc, *op, &left, &right));
            }

            Op::And(right) => {
                let left = pop(&mut stack)?.to_boolean();
                let value = left && evaluate_compiled(right, ctx)?.to_boolean();
                stack.push(XPathValue::Boolean(value));
            }

            Op::Or(right) => {
                let left = pop(&mut stack)?.to_boolean();
                let value = left || evaluate_compiled(right, ctx)?.to_boolean();
                stack.push(XPathValue::Boolean(value));
            }

            Op::Negate => {
                let value = pop(&mut stack)?;
                stack.push(XPathValue::Number(-value.to_number_in(ctx.doc)));
            }

            Op::Variable(name) => match ctx.bindings.variables.get(name) {
                Some(value) => stack.push(value.clone()),
                None => return Err(format!("Undefined variable: ${}", name)),
            },
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(value), true) => Ok(value),
        _ => Err("Malformed expression".to_string()),
    }
}

fn pop(stack: &mut Vec<XPathValue>) -> Result<XPathValue, String> {
    stack.pop().ok_or_else(|| "Malformed expression".to_string())
}

fn pop_nodeset(stack: &mut Vec<XPathValue>, what: &str) -> Result<Vec<NodeRef>, String> {
    match pop(stack)? {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        _ => Err(format!("{} applied to a value that is not a node-set", what)),
    }
}

/// Keep the nodes for which `predicate` holds; positions follow the order
/// of `nodes`
fn apply_predicate(ctx: &EvalContext<'_>, nodes: Vec<NodeRef>, predicate: &CompiledExpr) -> Result<Vec<NodeRef>, String> {
    let size = nodes.len();
    let mut kept = Vec::with_capacity(size);
    for (index, node) in nodes.into_iter().enumerate() {
        let position = index + 1;
        let keep = match evaluate_compiled(predicate, &ctx.at(node, position, size))? {
            XPathValue::Number(n) => n == position as f64,
            other => other.to_boolean(),
        };
        if keep {
            kept.push(node);
        }
    }
    Ok(kept)
}

fn binary(doc: &Document, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> XPathValue {
    match op {
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            XPathValue::Boolean(compare_values(doc, op, left, right))
        }
        BinaryOp::And => XPathValue::Boolean(left.to_boolean() && right.to_boolean()),
        BinaryOp::Or => XPathValue::Boolean(left.to_boolean() || right.to_boolean()),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let l = left.to_number_in(doc);
            let r = right.to_number_in(doc);
            XPathValue::Number(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                _ => l % r,
            })
        }
    }
}

fn compare_numbers(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::GtEq => a >= b,
        _ => false,
    }
}

/// Two strings: equality compares text, ordering compares numbers
fn compare_strings(op: BinaryOp, a: &str, b: &str) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        _ => compare_numbers(op, parse_number(a), parse_number(b)),
    }
}

/// Two non-set values
fn compare_atoms(doc: &Document, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
    let is_boolean = |v: &XPathValue| matches!(v, XPathValue::Boolean(_));
    let is_number = |v: &XPathValue| matches!(v, XPathValue::Number(_));
    match op {
        BinaryOp::Eq | BinaryOp::NotEq if is_boolean(left) || is_boolean(right) => {
            let equal = left.to_boolean() == right.to_boolean();
            (op == BinaryOp::Eq) == equal
        }
        BinaryOp::Eq | BinaryOp::NotEq if !is_number(left) && !is_number(right) => {
            compare_strings(op, &left.to_string_in(doc), &right.to_string_in(doc))
        }
        _ => compare_numbers(op, left.to_number_in(doc), right.to_number_in(doc)),
    }
}

/// A set's members against a non-set value; `set_on_left` keeps operand
/// order for the ordering operators
fn compare_set_atom(
    doc: &Document,
    op: BinaryOp,
    set: &XPathValue,
    members: &[String],
    atom: &XPathValue,
    set_on_left: bool,
) -> bool {
    let ordered = |a: f64, b: f64| {
        if set_on_left {
            compare_numbers(op, a, b)
        } else {
            compare_numbers(op, b, a)
        }
    };
    match atom {
        XPathValue::Boolean(_) => {
            let as_boolean = XPathValue::Boolean(set.to_boolean());
            if set_on_left {
                compare_atoms(doc, op, &as_boolean, atom)
            } else {
                compare_atoms(doc, op, atom, &as_boolean)
            }
        }
        XPathValue::Number(n) => members.iter().any(|m| ordered(parse_number(m), *n)),
        _ => {
            let s = atom.to_string_in(doc);
            match op {
                BinaryOp::Eq => members.iter().any(|m| *m == s),
                BinaryOp::NotEq => members.iter().any(|m| *m != s),
                _ => {
                    let n = parse_number(&s);
                    members.iter().any(|m| ordered(parse_number(m), n))
                }
            }
        }
    }
}

/// XPath 1.0 comparison: node-sets (and string lists) compare member by
/// member and hold if any pair does
fn compare_values(doc: &Document, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
    match (left.members_in(doc), right.members_in(doc)) {
        (Some(l), Some(r)) => l.iter().any(|a| r.iter().any(|b| compare_strings(op, a, b))),
        (Some(l), None) => compare_set_atom(doc, op, left, &l, right, true),
        (None, Some(r)) => compare_set_atom(doc, op, right, &r, left, false),
        (None, None) => compare_atoms(doc, op, left, right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseConfig;
    use crate::parse::parse_str;
    use crate::xpath::compiler::compile;

    struct Fixture {
        doc: Document,
        variables: Variables,
        functions: FunctionRegistry,
        prefixes: PrefixMap,
    }

    impl Fixture {
        fn new(text: &str) -> Self {
            Fixture {
                doc: parse_str(text, &ParseConfig::default(), None).unwrap().document,
                variables: Variables::new(),
                functions: FunctionRegistry::with_defaults(),
                prefixes: PrefixMap::new(),
            }
        }

        fn eval_at(&self, node: NodeRef, xpath: &str) -> Result<XPathValue, String> {
            let compiled = compile(xpath, &self.prefixes.xpath_namespaces())?;
            let bindings = Bindings {
                variables: &self.variables,
                functions: &self.functions,
                prefixes: &self.prefixes,
            };
            evaluate_compiled(&compiled, &EvalContext::new(&self.doc, node, bindings))
        }

        fn eval(&self, xpath: &str) -> Result<XPathValue, String> {
            self.eval_at(NodeRef::Node(DOCUMENT_NODE), xpath)
        }

        fn count(&self, xpath: &str) -> usize {
            self.eval(xpath).unwrap().as_nodeset().map_or(0, Vec::len)
        }

        fn string(&self, xpath: &str) -> String {
            self.eval(xpath).unwrap().to_string_in(&self.doc)
        }
    }

    #[test]
    fn test_simple_paths() {
        let f = Fixture::new("<root><a/><b/><a/></root>");
        assert_eq!(f.count("/root"), 1);
        assert_eq!(f.count("/root/a"), 2);
        assert_eq!(f.count("//a"), 2);
        assert_eq!(f.count("/"), 1);
        assert_eq!(f.count("/root/*"), 3);
    }

    #[test]
    fn test_predicates_are_per_step() {
        let f = Fixture::new("<r><p><i>1</i><i>2</i></p><p><i>3</i></p></r>");
        assert_eq!(f.count("//i[1]"), 2);
        assert_eq!(f.count("(//i)[1]"), 1);
        assert_eq!(f.string("(//i)[last()]"), "3");
        assert_eq!(f.string("//p[2]/i"), "3");
    }

    #[test]
    fn test_reverse_axis_positions() {
        let f = Fixture::new("<r><a/><b/><c/></r>");
        let c = NodeRef::Node(4);
        let nearest = f.eval_at(c, "preceding-sibling::*[1]").unwrap();
        assert_eq!(nearest, XPathValue::NodeSet(vec![NodeRef::Node(3)]));
        let ancestor = f.eval_at(c, "ancestor::node()[1]").unwrap();
        assert_eq!(ancestor, XPathValue::NodeSet(vec![NodeRef::Node(1)]));
    }

    #[test]
    fn test_text_and_attribute_nodes() {
        let f = Fixture::new("<r k=\"v\">one<b/>two</r>");
        assert_eq!(f.count("/r/text()"), 2);
        assert_eq!(f.string("/r/text()[2]"), "two");
        assert_eq!(f.string("/r/@k"), "v");
        assert_eq!(f.count("//@*"), 1);
        assert_eq!(f.count("//node()"), 4);
    }

    #[test]
    fn test_nodeset_comparisons() {
        let f = Fixture::new("<r><n>1</n><n>5</n></r>");
        assert_eq!(f.eval("//n = 5").unwrap(), XPathValue::Boolean(true));
        assert_eq!(f.eval("//n != 5").unwrap(), XPathValue::Boolean(true));
        assert_eq!(f.eval("//n > 4").unwrap(), XPathValue::Boolean(true));
        assert_eq!(f.eval("4 > //n").unwrap(), XPathValue::Boolean(true));
        assert_eq!(f.eval("//n > 5").unwrap(), XPathValue::Boolean(false));
        assert_eq!(f.eval("//n = '1'").unwrap(), XPathValue::Boolean(true));
        assert_eq!(f.eval("//missing = false()").unwrap(), XPathValue::Boolean(true));
        assert_eq!(f.eval("//n = //n").unwrap(), XPathValue::Boolean(true));
    }

    #[test]
    fn test_atom_comparisons() {
        let f = Fixture::new("<r/>");
        assert_eq!(f.eval("1 = '1.0'").unwrap(), XPathValue::Boolean(true));
        assert_eq!(f.eval("'1' = '1.0'").unwrap(), XPathValue::Boolean(false));
        assert_eq!(f.eval("true() = 'x'").unwrap(), XPathValue::Boolean(true));
        assert_eq!(f.eval("'10' < '9'").unwrap(), XPathValue::Boolean(false));
    }

    #[test]
    fn test_arithmetic() {
        let f = Fixture::new("<r/>");
        assert_eq!(f.eval("7 mod 3").unwrap(), XPathValue::Number(1.0));
        assert_eq!(f.eval("-7 mod 3").unwrap(), XPathValue::Number(-1.0));
        assert_eq!(f.eval("6 div 4").unwrap(), XPathValue::Number(1.5));
        assert_eq!(f.eval("2 * 3 + 1").unwrap(), XPathValue::Number(7.0));
        assert_eq!(f.eval("1 div 0").unwrap(), XPathValue::Number(f64::INFINITY));
    }

    #[test]
    fn test_and_or_short_circuit() {
        let f = Fixture::new("<r/>");
        assert_eq!(f.eval("false() and $undefined").unwrap(), XPathValue::Boolean(false));
        assert_eq!(f.eval("true() or $undefined").unwrap(), XPathValue::Boolean(true));
        assert!(f.eval("true() and $undefined").is_err());
    }

    #[test]
    fn test_variables() {
        let mut f = Fixture::new("<r><a n=\"1\"/><a n=\"2\"/></r>");
        f.variables.insert("n".to_string(), XPathValue::String("2".to_string()));
        assert_eq!(f.count("//a[@n = $n]"), 1);
        let err = f.eval("$missing").unwrap_err();
        assert!(err.contains("missing"));
    }

    #[test]
    fn test_namespaced_names() {
        let mut f = Fixture::new("<x xmlns=\"urn:foo\"><y/></x>");
        assert_eq!(f.count("//y"), 0);
        assert_eq!(f.count("//*[local-name()='y']"), 1);
        f.prefixes.insert("default", "urn:foo", None);
        assert_eq!(f.count("//default:y"), 1);
        assert_eq!(f.count("/default:*"), 1);
    }

    #[test]
    fn test_extension_and_unknown_functions() {
        let f = Fixture::new("<r>abc</r>");
        assert_eq!(f.string("upper-case(/r)"), "ABC");
        assert_eq!(f.eval("count(tokenize('a b c', ' '))").unwrap(), XPathValue::Number(3.0));
        assert!(f.eval("nope()").unwrap_err().contains("nope"));
    }

    #[test]
    fn test_union_is_document_ordered() {
        let f = Fixture::new("<r><a/><b/></r>");
        let result = f.eval("//b | //a").unwrap();
        assert_eq!(result, XPathValue::NodeSet(vec![NodeRef::Node(2), NodeRef::Node(3)]));
        assert!(f.eval("//a | 1").is_err());
    }
}
