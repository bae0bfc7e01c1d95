//! XPath Value Types
//!
//! XPath 1.0 has four data types: node-set, boolean, number, and string.
//! `StringList` carries the result of sequence-returning extension
//! functions such as `tokenize`.

use crate::dom::{Document, NodeRef};

/// XPath value types
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum XPathValue {
    /// A set of nodes (document order, no duplicates)
    NodeSet(Vec<NodeRef>),
    /// Boolean value
    Boolean(bool),
    /// Floating-point number
    Number(f64),
    /// String value
    String(String),
    /// List of strings
    StringList(Vec<String>),
}

/// XPath `number()` of a string: optional minus, digits with an optional
/// fraction, surrounding whitespace allowed. Anything else is NaN.
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim_matches([' ', '\t', '\n', '\r']);
    let digits = t.strip_prefix('-').unwrap_or(t);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    t.parse().unwrap_or(f64::NAN)
}

/// XPath string form of a number
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl XPathValue {
    /// Create an empty node set
    pub fn empty_nodeset() -> Self {
        XPathValue::NodeSet(Vec::new())
    }

    /// Create a node set with a single node
    pub fn single_node(node: NodeRef) -> Self {
        XPathValue::NodeSet(vec![node])
    }

    /// Convert to boolean (XPath boolean() function semantics)
    pub fn to_boolean(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::Boolean(b) => *b,
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::StringList(list) => !list.is_empty(),
        }
    }

    /// Convert to string (XPath string() function semantics); a node-set
    /// yields the string-value of its first node
    pub fn to_string_in(&self, doc: &Document) -> String {
        match self {
            XPathValue::NodeSet(nodes) => nodes.first().map(|n| doc.string_value(*n)).unwrap_or_default(),
            XPathValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            XPathValue::Number(n) => format_number(*n),
            XPathValue::String(s) => s.clone(),
            XPathValue::StringList(list) => list.first().cloned().unwrap_or_default(),
        }
    }

    /// Convert to number (XPath number() function semantics)
    pub fn to_number_in(&self, doc: &Document) -> f64 {
        match self {
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::Number(n) => *n,
            other => parse_number(&other.to_string_in(doc)),
        }
    }

    /// String forms of every member of a node-set or string list
    pub fn members_in(&self, doc: &Document) -> Option<Vec<String>> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes.iter().map(|n| doc.string_value(*n)).collect()),
            XPathValue::StringList(list) => Some(list.clone()),
            _ => None,
        }
    }

    /// Check if this is a node set
    pub fn is_nodeset(&self) -> bool {
        matches!(self, XPathValue::NodeSet(_))
    }

    /// Get as node set, or None
    pub fn as_nodeset(&self) -> Option<&Vec<NodeRef>> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Get as node set, consuming the value
    pub fn into_nodeset(self) -> Option<Vec<NodeRef>> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }
}

impl Default for XPathValue {
    fn default() -> Self {
        XPathValue::NodeSet(Vec::new())
    }
}

impl From<bool> for XPathValue {
    fn from(b: bool) -> Self {
        XPathValue::Boolean(b)
    }
}

impl From<f64> for XPathValue {
    fn from(n: f64) -> Self {
        XPathValue::Number(n)
    }
}

impl From<String> for XPathValue {
    fn from(s: String) -> Self {
        XPathValue::String(s)
    }
}

impl From<&str> for XPathValue {
    fn from(s: &str) -> Self {
        XPathValue::String(s.to_string())
    }
}

impl From<Vec<NodeRef>> for XPathValue {
    fn from(nodes: Vec<NodeRef>) -> Self {
        XPathValue::NodeSet(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_conversion() {
        assert!(XPathValue::NodeSet(vec![NodeRef::Node(1)]).to_boolean());
        assert!(!XPathValue::NodeSet(vec![]).to_boolean());
        assert!(XPathValue::Boolean(true).to_boolean());
        assert!(XPathValue::Number(1.0).to_boolean());
        assert!(!XPathValue::Number(0.0).to_boolean());
        assert!(!XPathValue::Number(f64::NAN).to_boolean());
        assert!(XPathValue::String("hello".to_string()).to_boolean());
        assert!(!XPathValue::String(String::new()).to_boolean());
    }

    #[test]
    fn test_number_conversion() {
        let doc = Document::new();
        assert_eq!(XPathValue::Boolean(true).to_number_in(&doc), 1.0);
        assert_eq!(XPathValue::String(" 42 ".to_string()).to_number_in(&doc), 42.0);
        assert_eq!(XPathValue::String("-.5".to_string()).to_number_in(&doc), -0.5);
        assert!(XPathValue::String("abc".to_string()).to_number_in(&doc).is_nan());
        assert!(XPathValue::String("1e3".to_string()).to_number_in(&doc).is_nan());
        assert!(XPathValue::String("+1".to_string()).to_number_in(&doc).is_nan());
        assert!(XPathValue::String("inf".to_string()).to_number_in(&doc).is_nan());
        assert!(XPathValue::String(".".to_string()).to_number_in(&doc).is_nan());
    }

    #[test]
    fn test_string_conversion() {
        let doc = Document::new();
        assert_eq!(XPathValue::Boolean(false).to_string_in(&doc), "false");
        assert_eq!(XPathValue::Number(42.0).to_string_in(&doc), "42");
        assert_eq!(XPathValue::Number(3.25).to_string_in(&doc), "3.25");
        assert_eq!(XPathValue::Number(-0.0).to_string_in(&doc), "0");
        assert_eq!(XPathValue::Number(f64::INFINITY).to_string_in(&doc), "Infinity");
        assert_eq!(XPathValue::empty_nodeset().to_string_in(&doc), "");
    }
}
