//! KDSL intermediate representation.
//!
//! Statement-tree IR for imperative kernel tracing: immutable statement
//! and expression trees, typed buffers, and the arena that gives buffers
//! and stages their identities. The `kdsl-build` crate constructs these
//! nodes; scheduling and lowering consume them.

pub mod arena;
mod buffer;
mod display;
mod dtype;
mod expr;
mod op;
mod stmt;

pub use arena::{Arena, Handle};
pub use buffer::{Buffer, Shape};
pub use display::{dump_stmt, format_expr};
pub use dtype::{DType, ScalarKind};
pub use expr::{and_, or_, BinaryOp, Expr, Literal, UnaryOp, Var};
pub use op::StageOp;
pub use stmt::{ForKind, KernelParam, Stmt};
