//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks for XML parsing:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Tokenizer: push state machine turning fragments into tokens
//! - Entities: XML entity decoding with Cow (zero-copy when possible)
//! - Attributes: strict attribute parsing and normalization

pub mod attributes;
pub mod entities;
pub mod scanner;
pub mod tokenizer;
