//! Runtime configuration
//!
//! Plain structs with defaults; the host decides where the values come from.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Parser settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseConfig {
    /// Window size used by [`parse_str`](crate::parse::parse_str), in bytes.
    pub chunk_size: usize,
    /// Absolute offset of the first byte of the parsed text.
    pub position_offset: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            chunk_size: 8192,
            position_offset: 0,
        }
    }
}

impl ParseConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_position_offset(mut self, position_offset: usize) -> Self {
        self.position_offset = position_offset;
        self
    }
}

/// Namespace prefix synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Prefix used for the default (unprefixed) namespace.
    pub default_prefix: String,
    /// First numeric suffix tried when a prefix is bound to several URIs.
    pub suffix_start: usize,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        NamespaceConfig {
            default_prefix: "default".to_string(),
            suffix_start: 1,
        }
    }
}

impl NamespaceConfig {
    pub fn with_default_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_prefix = prefix.into();
        self
    }

    pub fn with_suffix_start(mut self, start: usize) -> Self {
        self.suffix_start = start;
        self
    }
}

/// Query façade settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Number of compiled expressions kept in the LRU cache.
    pub cache_capacity: NonZeroUsize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            cache_capacity: NonZeroUsize::new(64).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl QueryConfig {
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self
    }
}

/// Live-query debouncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceConfig {
    pub delay: Duration,
    /// Process the very first input without waiting.
    pub immediate_first: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        DebounceConfig {
            delay: Duration::from_millis(250),
            immediate_first: true,
        }
    }
}

impl DebounceConfig {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_immediate_first(mut self, immediate_first: bool) -> Self {
        self.immediate_first = immediate_first;
        self
    }
}

/// Element preview settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewConfig {
    pub max_len: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        PreviewConfig { max_len: 60 }
    }
}

/// Aggregate of every setting group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub parse: ParseConfig,
    pub namespaces: NamespaceConfig,
    pub query: QueryConfig,
    pub debounce: DebounceConfig,
    pub preview: PreviewConfig,
}
