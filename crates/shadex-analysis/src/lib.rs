//! Analyses over shadex IR consumed read-only by the backends.
//!
//! - [`CallGraph`]: functions reachable from an entry point, in post-order.
//! - [`Liveness`]: which global variables an entry point actually touches.
//! - [`ExpressionUsage`]: per-expression use counts and pointer-ness.
//! - [`Typifier`]: the type of every expression in a function.

pub mod callgraph;
pub mod error;
pub mod liveness;
pub mod operands;
pub mod typifier;
pub mod usage;

pub use callgraph::CallGraph;
pub use error::AnalysisError;
pub use liveness::Liveness;
pub use operands::{expression_operands, statement_operands, walk_block};
pub use typifier::{ExprType, TypeResolution, Typifier};
pub use usage::ExpressionUsage;
