//! XML Entity Decoding
//!
//! Handles decoding of XML entities:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//! - General entities declared in the DOCTYPE internal subset, expanded
//!   where they are referenced
//!
//! Uses Cow for zero-copy when no entities are present. Decoding is strict:
//! an undefined entity or a malformed reference is an error.

use memchr::memchr;
use std::borrow::Cow;
use std::collections::HashMap;

/// Declared general entities, name -> literal value as written
pub type EntityTable = HashMap<String, String>;

/// Upper bound on the text declared entities may add to one run of
/// character data or one attribute value
pub const MAX_ENTITY_EXPANSION: usize = 1 << 20;

/// Line-end handling: `\r\n` and a lone `\r` both become `\n`
pub fn normalize_line_endings(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    let Some(first) = memchr(b'\r', bytes) else {
        return Cow::Borrowed(input);
    };
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;
    let mut next = Some(first);
    while let Some(cr) = next {
        out.push_str(&input[pos..cr]);
        out.push('\n');
        pos = if bytes.get(cr + 1) == Some(&b'\n') { cr + 2 } else { cr + 1 };
        next = memchr(b'\r', &bytes[pos..]).map(|i| pos + i);
    }
    out.push_str(&input[pos..]);
    Cow::Owned(out)
}

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
pub fn decode_text<'a>(input: &'a str, entities: &EntityTable) -> Result<Cow<'a, str>, String> {
    validate_xml_content(input)?;
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(input));
    }
    decode_entities(input, entities).map(Cow::Owned)
}

/// Expansion state for one decode call
struct Expander<'t> {
    entities: &'t EntityTable,
    /// Declared entities currently being expanded, innermost last
    open: Vec<&'t str>,
    /// Output length past which expansion is refused
    limit: usize,
}

/// Decode all entity references in the input
fn decode_entities(input: &str, entities: &EntityTable) -> Result<String, String> {
    let mut result = String::with_capacity(input.len());
    let mut expander = Expander {
        entities,
        open: Vec::new(),
        limit: input.len().saturating_add(MAX_ENTITY_EXPANSION),
    };
    expander.expand(input, &mut result)?;
    Ok(result)
}

impl<'t> Expander<'t> {
    fn expand(&mut self, input: &str, out: &mut String) -> Result<(), String> {
        let bytes = input.as_bytes();
        let mut pos = 0;

        while let Some(amp_offset) = memchr(b'&', &bytes[pos..]) {
            // Copy everything before the entity
            out.push_str(&input[pos..pos + amp_offset]);
            pos += amp_offset;

            let semi_offset = memchr(b';', &bytes[pos..])
                .ok_or_else(|| "Unterminated entity reference".to_string())?;
            let entity = &input[pos + 1..pos + semi_offset];
            self.decode_entity(entity, out)?;
            pos += semi_offset + 1;
        }
        out.push_str(&input[pos..]);
        Ok(())
    }

    /// Decode a single entity (without & and ;) into `out`
    fn decode_entity(&mut self, entity: &str, out: &mut String) -> Result<(), String> {
        if let Some(numeric) = entity.strip_prefix('#') {
            let c = decode_numeric_entity(numeric)
                .ok_or_else(|| format!("Invalid character reference &{};", entity))?;
            out.push(c);
            return Ok(());
        }

        match entity {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            "" => return Err("Empty entity reference".to_string()),
            _ => {
                let entities = self.entities;
                let (name, value) = entities
                    .get_key_value(entity)
                    .ok_or_else(|| format!("Undefined entity &{};", entity))?;
                if self.open.contains(&name.as_str()) {
                    return Err(format!("Entity &{}; refers to itself", entity));
                }
                self.open.push(name);
                self.expand(value, out)?;
                self.open.pop();
                if out.len() > self.limit {
                    return Err(format!("Entity &{}; expands beyond the size limit", entity));
                }
            }
        }
        Ok(())
    }
}

/// Decode a numeric character reference with strict XML character validation
fn decode_numeric_entity(entity: &str) -> Option<char> {
    let codepoint = if let Some(hex) = entity.strip_prefix('x') {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()?
    } else {
        if entity.is_empty() || !entity.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        entity.parse::<u32>().ok()?
    };

    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Reject characters not allowed in XML 1.0 content.
///
/// Input is already UTF-8, so only control characters and the two
/// non-characters U+FFFE/U+FFFF need checking.
pub fn validate_xml_content(content: &str) -> Result<(), String> {
    let bytes = content.as_bytes();
    if let Some(&b) = bytes
        .iter()
        .find(|&&b| b < 0x20 && !matches!(b, 0x09 | 0x0A | 0x0D))
    {
        return Err(format!("Invalid XML character U+{:04X}", b));
    }
    // U+FFFE and U+FFFF both encode as EF BF BE / EF BF BF
    if memchr::memmem::find(bytes, &[0xEF, 0xBF]).is_some()
        && content.chars().any(|c| c == '\u{FFFE}' || c == '\u{FFFF}')
    {
        return Err("Invalid XML character: U+FFFE/U+FFFF not allowed".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> Result<String, String> {
        decode_text(input, &EntityTable::new()).map(|c| c.into_owned())
    }

    #[test]
    fn test_no_entities() {
        let table = EntityTable::new();
        let result = decode_text("Hello, World!", &table).unwrap();
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_basic_entities() {
        assert_eq!(decode("&lt;hello&gt; &amp; &quot;world&quot;").unwrap(), "<hello> & \"world\"");
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(decode("&#65;&#66;&#67;").unwrap(), "ABC");
        assert_eq!(decode("&#x41;&#x42;&#x43;").unwrap(), "ABC");
        assert_eq!(decode("&#x1F600;").unwrap(), "😀");
    }

    #[test]
    fn test_invalid_references() {
        assert!(decode("&#0;").is_err());
        assert!(decode("&#xZZ;").is_err());
        assert!(decode("a & b").is_err());
        assert!(decode("&unknown;").unwrap_err().contains("Undefined entity"));
    }

    #[test]
    fn test_declared_entity() {
        let mut table = EntityTable::new();
        table.insert("company".to_string(), "Acme & Co".to_string());
        let result = decode_text("&company; rocks", &table).unwrap();
        assert_eq!(result, "Acme & Co rocks");
    }

    #[test]
    fn test_entities_expand_where_referenced() {
        let mut table = EntityTable::new();
        table.insert("e".to_string(), "[&f;]".to_string());
        table.insert("f".to_string(), "x &amp; y".to_string());
        assert_eq!(decode_text("&e;&e;", &table).unwrap(), "[x & y][x & y]");
    }

    #[test]
    fn test_recursive_entity_rejected() {
        let mut table = EntityTable::new();
        table.insert("a".to_string(), "&b;".to_string());
        table.insert("b".to_string(), "&a;".to_string());
        assert!(decode_text("&a;", &table).unwrap_err().contains("refers to itself"));
    }

    #[test]
    fn test_exponential_expansion_rejected() {
        let mut table = EntityTable::new();
        table.insert("l0".to_string(), "x".repeat(1000));
        for i in 1..6 {
            table.insert(format!("l{}", i), format!("&l{};", i - 1).repeat(10));
        }
        assert!(decode_text("&l5;", &table).unwrap_err().contains("size limit"));
    }

    #[test]
    fn test_line_endings() {
        assert!(matches!(normalize_line_endings("a\nb"), Cow::Borrowed(_)));
        assert_eq!(normalize_line_endings("a\r\nb\rc\r"), "a\nb\nc\n");
        assert_eq!(normalize_line_endings("\r\r\n"), "\n\n");
    }

    #[test]
    fn test_control_characters_rejected() {
        assert!(decode("bad \u{1} char").is_err());
        assert!(decode("tab\tnewline\n").is_ok());
    }
}
