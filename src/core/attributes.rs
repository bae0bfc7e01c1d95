//! XML Attribute Parsing
//!
//! Parses attributes from start-tag content, strictly: every attribute
//! needs a quoted value, attributes are whitespace separated, and values
//! may not contain a raw `<`.

use super::entities::{decode_text, EntityTable};
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use std::collections::HashSet;

/// A parsed XML attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name as written (may include namespace prefix)
    pub name: String,
    /// Attribute value (normalized, entities decoded)
    pub value: String,
}

impl Attribute {
    /// Split the name into prefix and local name at the colon
    pub fn split_name(&self) -> (Option<&str>, &str) {
        split_qname(&self.name)
    }
}

/// Split a qualified name into prefix and local part
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Parse attributes from raw tag content (after the element name)
///
/// Input should be the content between element name and '>' or '/>'
pub fn parse_attributes(input: &str, entities: &EntityTable) -> Result<Vec<Attribute>, String> {
    let bytes = input.as_bytes();
    let mut attrs = Vec::new();
    let mut seen = HashSet::new();
    let mut pos = 0;

    loop {
        // Attributes must be separated from the name and from each other
        let ws_start = pos;
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        if pos == ws_start {
            return Err("Whitespace required before attribute".to_string());
        }

        // Parse attribute name
        let name_start = pos;
        if !is_name_start_char(bytes[pos]) {
            return Err("Attribute name must start with letter, underscore, or colon".to_string());
        }
        while pos < bytes.len() && is_name_char(bytes[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        // Skip whitespace around '='
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'=' {
            return Err(format!("Attribute value required for '{}'", name));
        }
        pos += 1; // Skip '='
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }

        let quote = match bytes.get(pos) {
            Some(&q) if q == b'"' || q == b'\'' => q,
            _ => return Err(format!("Attribute value must be quoted for '{}'", name)),
        };
        pos += 1; // Skip opening quote
        let value_start = pos;

        // Find closing quote
        let value_len = memchr::memchr(quote, &bytes[pos..])
            .ok_or_else(|| format!("Unterminated attribute value for '{}'", name))?;
        let raw = &input[value_start..value_start + value_len];
        pos = value_start + value_len + 1;

        if raw.contains('<') {
            return Err("Attribute value cannot contain '<'".to_string());
        }

        if !seen.insert(name) {
            return Err(format!("Duplicate attribute '{}'", name));
        }

        attrs.push(Attribute {
            name: name.to_string(),
            value: normalize_value(raw, entities)?,
        });
    }

    Ok(attrs)
}

/// Attribute-value normalization: literal tab, CR and LF become spaces
/// before references are expanded, so `&#10;` survives as a newline.
fn normalize_value(raw: &str, entities: &EntityTable) -> Result<String, String> {
    if raw.bytes().any(|b| matches!(b, b'\t' | b'\n' | b'\r')) {
        let normalized = raw.replace("\r\n", " ").replace(['\t', '\n', '\r'], " ");
        decode_text(&normalized, entities).map(|v| v.into_owned())
    } else {
        decode_text(raw, entities).map(|v| v.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Vec<Attribute>, String> {
        parse_attributes(input, &EntityTable::new())
    }

    #[test]
    fn test_simple_attributes() {
        let attrs = parse(r#" id="1" class='big'"#).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name, "id");
        assert_eq!(attrs[0].value, "1");
        assert_eq!(attrs[1].value, "big");
    }

    #[test]
    fn test_entities_and_quotes() {
        let attrs = parse(r#" title="a &gt; b" quote='say "hi"'"#).unwrap();
        assert_eq!(attrs[0].value, "a > b");
        assert_eq!(attrs[1].value, "say \"hi\"");
    }

    #[test]
    fn test_value_normalization() {
        let attrs = parse(" v=\"a\tb\nc&#10;d\"").unwrap();
        assert_eq!(attrs[0].value, "a b c\nd");
    }

    #[test]
    fn test_prefixed_name() {
        let attrs = parse(r#" xml:lang="en""#).unwrap();
        assert_eq!(attrs[0].split_name(), (Some("xml"), "lang"));
    }

    #[test]
    fn test_strict_errors() {
        assert!(parse(" id=1").is_err());
        assert!(parse(" id").is_err());
        assert!(parse(r#" a="1"b="2""#).is_err());
        assert!(parse(r#" a="1" a="2""#).unwrap_err().contains("Duplicate"));
        assert!(parse(r#" a="x<y""#).is_err());
        assert!(parse(r#" a="x"#).is_err());
    }
}
