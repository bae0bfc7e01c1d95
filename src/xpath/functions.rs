//! XPath 1.0 Functions
//!
//! Implements all XPath 1.0 core functions:
//!
//! Node Set Functions:
//! - position(), last(), count(), id(), local-name(), namespace-uri(), name()
//!
//! String Functions:
//! - string(), concat(), starts-with(), contains(), substring(),
//!   substring-before(), substring-after(), string-length(),
//!   normalize-space(), translate()
//!
//! Boolean Functions:
//! - boolean(), not(), true(), false(), lang()
//!
//! Number Functions:
//! - number(), sum(), floor(), ceiling(), round()

use super::value::{parse_number, XPathValue};
use crate::dom::namespace::ns;
use crate::dom::{Document, NodeKind, NodeRef, QName};
use crate::query::namespaces::PrefixMap;

/// What a function sees of the evaluation state
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext<'a> {
    pub doc: &'a Document,
    pub node: NodeRef,
    pub position: usize,
    pub size: usize,
    pub prefixes: &'a PrefixMap,
}

impl FunctionContext<'_> {
    /// String form of an argument
    pub fn string(&self, value: &XPathValue) -> String {
        value.to_string_in(self.doc)
    }

    /// Number form of an argument
    pub fn number(&self, value: &XPathValue) -> f64 {
        value.to_number_in(self.doc)
    }
}

const CORE_FUNCTIONS: &[&str] = &[
    "position",
    "last",
    "count",
    "id",
    "local-name",
    "namespace-uri",
    "name",
    "string",
    "concat",
    "starts-with",
    "contains",
    "substring",
    "substring-before",
    "substring-after",
    "string-length",
    "normalize-space",
    "translate",
    "boolean",
    "not",
    "true",
    "false",
    "lang",
    "number",
    "sum",
    "floor",
    "ceiling",
    "round",
];

/// Whether `name` is an XPath 1.0 core function
pub fn is_core(name: &str) -> bool {
    CORE_FUNCTIONS.contains(&name)
}

/// Evaluate a core function call
pub fn call(name: &str, args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    match name {
        // Node Set Functions
        "position" => no_args(name, &args).map(|_| XPathValue::Number(ctx.position as f64)),
        "last" => no_args(name, &args).map(|_| XPathValue::Number(ctx.size as f64)),
        "count" => fn_count(args),
        "id" => fn_id(args),
        "local-name" => name_function(name, args, ctx, |q| q.local.clone()),
        "namespace-uri" => name_function(name, args, ctx, |q| q.namespace.clone().unwrap_or_default()),
        "name" => name_function(name, args, ctx, QName::qualified),

        // String Functions
        "string" => fn_string(args, ctx),
        "concat" => fn_concat(args, ctx),
        "starts-with" => two_strings(name, args, ctx, |a, b| XPathValue::Boolean(a.starts_with(b))),
        "contains" => two_strings(name, args, ctx, |a, b| XPathValue::Boolean(a.contains(b))),
        "substring" => fn_substring(args, ctx),
        "substring-before" => two_strings(name, args, ctx, |a, b| {
            XPathValue::String(a.find(b).map(|i| a[..i].to_string()).unwrap_or_default())
        }),
        "substring-after" => two_strings(name, args, ctx, |a, b| {
            XPathValue::String(a.find(b).map(|i| a[i + b.len()..].to_string()).unwrap_or_default())
        }),
        "string-length" => fn_string_length(args, ctx),
        "normalize-space" => fn_normalize_space(args, ctx),
        "translate" => fn_translate(args, ctx),

        // Boolean Functions
        "boolean" => fn_boolean(args),
        "not" => fn_not(args),
        "true" => no_args(name, &args).map(|_| XPathValue::Boolean(true)),
        "false" => no_args(name, &args).map(|_| XPathValue::Boolean(false)),
        "lang" => fn_lang(args, ctx),

        // Number Functions
        "number" => fn_number(args, ctx),
        "sum" => fn_sum(args, ctx),
        "floor" => one_number(name, args, ctx, f64::floor),
        "ceiling" => one_number(name, args, ctx, f64::ceil),
        "round" => one_number(name, args, ctx, xpath_round),

        _ => Err(format!("Unknown function: {}()", name)),
    }
}

fn no_args(name: &str, args: &[XPathValue]) -> Result<(), String> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(format!("{}() takes no arguments", name))
    }
}

/// The single argument, or the context node as a node-set when absent
fn optional_arg(name: &str, mut args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    match args.len() {
        0 => Ok(XPathValue::single_node(ctx.node)),
        1 => Ok(args.remove(0)),
        _ => Err(format!("{}() requires 0 or 1 arguments", name)),
    }
}

fn two_strings(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &FunctionContext<'_>,
    f: impl Fn(&str, &str) -> XPathValue,
) -> Result<XPathValue, String> {
    if args.len() != 2 {
        return Err(format!("{}() requires exactly 2 arguments", name));
    }
    Ok(f(&ctx.string(&args[0]), &ctx.string(&args[1])))
}

fn one_number(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &FunctionContext<'_>,
    f: impl Fn(f64) -> f64,
) -> Result<XPathValue, String> {
    if args.len() != 1 {
        return Err(format!("{}() requires exactly 1 argument", name));
    }
    Ok(XPathValue::Number(f(ctx.number(&args[0]))))
}

/// XPath round(): halves go towards positive infinity
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else if (-0.5..0.0).contains(&n) {
        -0.0
    } else {
        (n + 0.5).floor()
    }
}

// Node Set Functions

fn fn_count(args: Vec<XPathValue>) -> Result<XPathValue, String> {
    if args.len() != 1 {
        return Err("count() requires exactly 1 argument".to_string());
    }
    match &args[0] {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(nodes.len() as f64)),
        XPathValue::StringList(list) => Ok(XPathValue::Number(list.len() as f64)),
        _ => Err("count() argument must be a node-set".to_string()),
    }
}

fn fn_id(_args: Vec<XPathValue>) -> Result<XPathValue, String> {
    Err("id() is not supported: no attribute is declared as an ID".to_string())
}

fn node_name(doc: &Document, node: NodeRef) -> Option<&QName> {
    match node {
        NodeRef::Node(id) => {
            let n = doc.get_node(id)?;
            match n.kind {
                NodeKind::Element | NodeKind::ProcessingInstruction => n.name.as_ref(),
                _ => None,
            }
        }
        NodeRef::Attribute { owner, index } => doc.attribute(owner, index).map(|a| &a.name),
        NodeRef::Text(_) | NodeRef::Tail(_) => None,
    }
}

fn name_function(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &FunctionContext<'_>,
    part: impl Fn(&QName) -> String,
) -> Result<XPathValue, String> {
    let node = match optional_arg(name, args, ctx)? {
        XPathValue::NodeSet(nodes) => match nodes.first() {
            Some(node) => *node,
            None => return Ok(XPathValue::String(String::new())),
        },
        _ => return Err(format!("{}() argument must be a node-set", name)),
    };
    Ok(XPathValue::String(node_name(ctx.doc, node).map(part).unwrap_or_default()))
}

// String Functions

fn fn_string(args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    let value = optional_arg("string", args, ctx)?;
    Ok(XPathValue::String(ctx.string(&value)))
}

fn fn_concat(args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    if args.len() < 2 {
        return Err("concat() requires at least 2 arguments".to_string());
    }
    Ok(XPathValue::String(args.iter().map(|a| ctx.string(a)).collect()))
}

fn fn_substring(args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    if args.len() != 2 && args.len() != 3 {
        return Err("substring() requires 2 or 3 arguments".to_string());
    }

    let s = ctx.string(&args[0]);
    let start = xpath_round(ctx.number(&args[1]));
    let end = match args.get(2) {
        Some(len) => start + xpath_round(ctx.number(len)),
        None => f64::INFINITY,
    };

    let result: String = s
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let p = (*i + 1) as f64;
            p >= start && p < end
        })
        .map(|(_, c)| c)
        .collect();

    Ok(XPathValue::String(result))
}

fn fn_string_length(args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    let value = optional_arg("string-length", args, ctx)?;
    Ok(XPathValue::Number(ctx.string(&value).chars().count() as f64))
}

fn fn_normalize_space(args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    let value = optional_arg("normalize-space", args, ctx)?;
    let normalized: String = ctx
        .string(&value)
        .split([' ', '\t', '\n', '\r'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(XPathValue::String(normalized))
}

fn fn_translate(args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    if args.len() != 3 {
        return Err("translate() requires exactly 3 arguments".to_string());
    }

    let s = ctx.string(&args[0]);
    let from: Vec<char> = ctx.string(&args[1]).chars().collect();
    let to: Vec<char> = ctx.string(&args[2]).chars().collect();

    let result: String = s
        .chars()
        .filter_map(|c| {
            if let Some(pos) = from.iter().position(|&fc| fc == c) {
                to.get(pos).copied()
            } else {
                Some(c)
            }
        })
        .collect();

    Ok(XPathValue::String(result))
}

// Boolean Functions

fn fn_boolean(args: Vec<XPathValue>) -> Result<XPathValue, String> {
    if args.len() != 1 {
        return Err("boolean() requires exactly 1 argument".to_string());
    }
    Ok(XPathValue::Boolean(args[0].to_boolean()))
}

fn fn_not(args: Vec<XPathValue>) -> Result<XPathValue, String> {
    if args.len() != 1 {
        return Err("not() requires exactly 1 argument".to_string());
    }
    Ok(XPathValue::Boolean(!args[0].to_boolean()))
}

fn fn_lang(args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    if args.len() != 1 {
        return Err("lang() requires exactly 1 argument".to_string());
    }
    let target_lang = ctx.string(&args[0]).to_lowercase();

    // nearest xml:lang on the context node or an ancestor decides
    let mut node = Some(ctx.node);
    while let Some(current) = node {
        if let NodeRef::Node(id) = current {
            let declared = ctx
                .doc
                .attributes(id)
                .iter()
                .find(|a| a.name.local == "lang" && a.name.namespace.as_deref() == Some(ns::XML));
            if let Some(attr) = declared {
                let lang = attr.value.to_lowercase();
                let matched = lang == target_lang
                    || (lang.starts_with(&target_lang) && lang.as_bytes().get(target_lang.len()) == Some(&b'-'));
                return Ok(XPathValue::Boolean(matched));
            }
        }
        node = ctx.doc.parent_ref(current);
    }
    Ok(XPathValue::Boolean(false))
}

// Number Functions

fn fn_number(args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    let value = optional_arg("number", args, ctx)?;
    Ok(XPathValue::Number(ctx.number(&value)))
}

fn fn_sum(args: Vec<XPathValue>, ctx: &FunctionContext<'_>) -> Result<XPathValue, String> {
    if args.len() != 1 {
        return Err("sum() requires exactly 1 argument".to_string());
    }

    match args[0].members_in(ctx.doc) {
        Some(members) => Ok(XPathValue::Number(members.iter().map(|m| parse_number(m)).sum())),
        None => Err("sum() argument must be a node-set".to_string()),
    }
}
