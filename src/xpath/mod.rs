//! XPath 1.0 Engine
//!
//! XPath 1.0 over [`NodeRef`](crate::dom::NodeRef) handles:
//! - All 13 axes, predicates per step
//! - All core functions plus a registry of extension functions
//! - Namespace prefixes resolved at compile time
//! - `$variables` bound per evaluation

pub mod axes;
pub mod compiler;
pub mod eval;
pub mod extensions;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use compiler::{compile, CompiledExpr};
pub use eval::{evaluate_compiled, Bindings, EvalContext, Variables};
pub use extensions::{FunctionRegistry, XPathFunction};
pub use functions::FunctionContext;
pub use value::XPathValue;
