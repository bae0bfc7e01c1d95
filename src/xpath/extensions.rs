//! Extension functions
//!
//! Functions beyond the XPath 1.0 core library, looked up by name after
//! the core functions. The default set adds string case mapping, regex
//! `tokenize`/`matches`, and a `print` that logs its arguments.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use super::functions::FunctionContext;
use super::value::XPathValue;
use crate::locate::exact_paths;

/// An extension function
pub type XPathFunction = Arc<dyn Fn(&FunctionContext<'_>, Vec<XPathValue>) -> Result<XPathValue, String> + Send + Sync>;

/// Named extension functions
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, XPathFunction>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

impl FunctionRegistry {
    /// Registry with no functions
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding upper-case, lower-case, tokenize, matches and print
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("upper-case", |ctx, args| {
            one_string("upper-case", ctx, &args).map(|s| XPathValue::String(s.to_uppercase()))
        });
        registry.register("lower-case", |ctx, args| {
            one_string("lower-case", ctx, &args).map(|s| XPathValue::String(s.to_lowercase()))
        });
        registry.register("tokenize", fn_tokenize);
        registry.register("matches", fn_matches);
        registry.register("print", fn_print);
        registry
    }

    /// Add or replace a function
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&FunctionContext<'_>, Vec<XPathValue>) -> Result<XPathValue, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&XPathFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

fn one_string(name: &str, ctx: &FunctionContext<'_>, args: &[XPathValue]) -> Result<String, String> {
    match args {
        [value] => Ok(ctx.string(value)),
        _ => Err(format!("{}() requires exactly 1 argument", name)),
    }
}

/// Compile `pattern` with XPath 2.0 style flags
fn build_regex(pattern: &str, flags: &str) -> Result<Regex, String> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(format!("Invalid regular expression flag: {}", other)),
        };
    }
    builder.build().map_err(|e| format!("Invalid regular expression: {}", e))
}

/// Input, pattern and flags of `tokenize`/`matches`
fn regex_args(name: &str, ctx: &FunctionContext<'_>, args: &[XPathValue]) -> Result<(String, Regex), String> {
    let (input, pattern, flags) = match args {
        [input, pattern] => (input, pattern, String::new()),
        [input, pattern, flags] => (input, pattern, ctx.string(flags)),
        _ => return Err(format!("{}() requires 2 or 3 arguments", name)),
    };
    Ok((ctx.string(input), build_regex(&ctx.string(pattern), &flags)?))
}

fn fn_tokenize(ctx: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, String> {
    let (input, regex) = regex_args("tokenize", ctx, &args)?;
    if regex.is_match("") {
        return Err("tokenize() pattern matches a zero-length string".to_string());
    }
    if input.is_empty() {
        return Ok(XPathValue::StringList(Vec::new()));
    }
    Ok(XPathValue::StringList(regex.split(&input).map(str::to_string).collect()))
}

fn fn_matches(ctx: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, String> {
    let (input, regex) = regex_args("matches", ctx, &args)?;
    Ok(XPathValue::Boolean(regex.is_match(&input)))
}

/// Log every argument, node-sets as exact paths, and return the first
fn fn_print(ctx: &FunctionContext<'_>, mut args: Vec<XPathValue>) -> Result<XPathValue, String> {
    let parts: Vec<String> = args
        .iter()
        .map(|arg| match arg {
            XPathValue::NodeSet(nodes) => format!("[{}]", exact_paths(ctx.doc, nodes, ctx.prefixes).join(", ")),
            XPathValue::StringList(list) => format!("({})", list.join(", ")),
            other => ctx.string(other),
        })
        .collect();
    log::info!("print: {}", parts.join(" "));

    if args.is_empty() {
        Ok(XPathValue::empty_nodeset())
    } else {
        Ok(args.swap_remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, NodeRef, DOCUMENT_NODE};
    use crate::query::namespaces::PrefixMap;

    fn run(name: &str, args: Vec<XPathValue>) -> Result<XPathValue, String> {
        let doc = Document::new();
        let prefixes = PrefixMap::new();
        let ctx = FunctionContext {
            doc: &doc,
            node: NodeRef::Node(DOCUMENT_NODE),
            position: 1,
            size: 1,
            prefixes: &prefixes,
        };
        let registry = FunctionRegistry::with_defaults();
        let function = registry.get(name).ok_or("missing")?;
        function(&ctx, args)
    }

    fn s(v: &str) -> XPathValue {
        XPathValue::String(v.to_string())
    }

    #[test]
    fn test_case_mapping() {
        assert_eq!(run("upper-case", vec![s("abc")]).unwrap(), s("ABC"));
        assert_eq!(run("lower-case", vec![s("ÀB")]).unwrap(), s("àb"));
        assert!(run("upper-case", vec![]).is_err());
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            run("tokenize", vec![s("a, b,c"), s(",\\s*")]).unwrap(),
            XPathValue::StringList(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(
            run("tokenize", vec![s(""), s(",")]).unwrap(),
            XPathValue::StringList(Vec::new())
        );
        assert!(run("tokenize", vec![s("abc"), s("x*")]).is_err());
    }

    #[test]
    fn test_matches_with_flags() {
        assert_eq!(run("matches", vec![s("Hello"), s("^hello$")]).unwrap(), XPathValue::Boolean(false));
        assert_eq!(
            run("matches", vec![s("Hello"), s("^hello$"), s("i")]).unwrap(),
            XPathValue::Boolean(true)
        );
        assert!(run("matches", vec![s("a"), s("a"), s("q")]).is_err());
        assert!(run("matches", vec![s("a"), s("(")]).is_err());
    }

    #[test]
    fn test_print_returns_first_argument() {
        assert_eq!(run("print", vec![s("a"), s("b")]).unwrap(), s("a"));
        assert_eq!(run("print", vec![]).unwrap(), XPathValue::empty_nodeset());
    }

    #[test]
    fn test_register_custom_function() {
        let mut registry = FunctionRegistry::new();
        registry.register("answer", |_, _| Ok(XPathValue::Number(42.0)));
        assert!(registry.contains("answer"));
        assert!(!registry.contains("print"));
    }
}
