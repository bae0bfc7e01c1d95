//! SIMD-accelerated delimiter scanning using memchr
//!
//! Finds the structural delimiters `<`, `>`, `<![CDATA[` and `]]>` in a
//! text window. A candidate that may continue past the end of the window
//! (a trailing `<![CD` or `]]`) is reported as incomplete so the caller can
//! wait for more input before classifying it.

use memchr::memchr3;

const CDATA_OPEN: &[u8] = b"<![CDATA[";
const CDATA_CLOSE: &[u8] = b"]]>";

/// Structural delimiter kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `<`
    Open,
    /// `>`
    Close,
    /// `<![CDATA[`
    CdataOpen,
    /// `]]>`
    CdataClose,
}

impl Delimiter {
    #[inline]
    pub fn len(self) -> usize {
        self.as_str().len()
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Delimiter::Open => "<",
            Delimiter::Close => ">",
            Delimiter::CdataOpen => "<![CDATA[",
            Delimiter::CdataClose => "]]>",
        }
    }
}

/// Result of a single scan step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// Delimiter at `pos`
    Found { pos: usize, delimiter: Delimiter },
    /// Possible delimiter at `pos` that needs more input to classify
    Incomplete { pos: usize },
    /// No delimiter in the rest of the window
    Exhausted,
}

/// Scanner over one window of text
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given input
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Scanner {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    /// Set the current position
    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Find the next delimiter at or after the current position.
    ///
    /// With `at_eof` set, nothing is reported as incomplete: a trailing
    /// `<` is a plain `Open` and a trailing `]` is text.
    pub fn next_delimiter(&mut self, at_eof: bool) -> ScanStep {
        while self.pos < self.input.len() {
            let found = match memchr3(b'<', b'>', b']', &self.input[self.pos..]) {
                Some(i) => self.pos + i,
                None => {
                    self.pos = self.input.len();
                    return ScanStep::Exhausted;
                }
            };
            let rest = &self.input[found..];
            match rest[0] {
                b'<' => {
                    if rest.starts_with(CDATA_OPEN) {
                        return self.emit(found, Delimiter::CdataOpen);
                    }
                    if !at_eof && rest.len() < CDATA_OPEN.len() && CDATA_OPEN.starts_with(rest) {
                        self.pos = found;
                        return ScanStep::Incomplete { pos: found };
                    }
                    return self.emit(found, Delimiter::Open);
                }
                b'>' => return self.emit(found, Delimiter::Close),
                _ => {
                    if rest.starts_with(CDATA_CLOSE) {
                        return self.emit(found, Delimiter::CdataClose);
                    }
                    if !at_eof && rest.len() < CDATA_CLOSE.len() && CDATA_CLOSE.starts_with(rest) {
                        self.pos = found;
                        return ScanStep::Incomplete { pos: found };
                    }
                    // lone ']' is ordinary text
                    self.pos = found + 1;
                }
            }
        }
        ScanStep::Exhausted
    }

    #[inline]
    fn emit(&mut self, pos: usize, delimiter: Delimiter) -> ScanStep {
        self.pos = pos + delimiter.len();
        ScanStep::Found { pos, delimiter }
    }
}

/// Check if byte is valid XML name start character
/// Allows ASCII letters, underscore, colon, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

/// Check if byte is valid XML name character
/// Allows ASCII alphanumeric, punctuation, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

/// Check if a whole string is an XML name
pub fn is_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty() && is_name_start_char(bytes[0]) && bytes[1..].iter().all(|&b| is_name_char(b))
}

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}
