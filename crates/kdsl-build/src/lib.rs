//! Imperative statement builder for KDSL traces.
//!
//! A [`Builder`] session traces an imperative program into the
//! immutable statement trees of `kdsl-ir`. Code under trace opens named
//! stages, emits statements and control-flow constructs into per-stage
//! scope stacks, and closes stages back into single folded statements;
//! the session reconciles each closed stage with its parent (or the
//! top-level registry), maintaining the input / last-writer / written-
//! buffer sets that scheduling consumes.
//!
//! The crate is organized bottom-up: `scope` holds the per-stage scope
//! stacks and the fold that turns an emission list into one statement;
//! `stage` is the named block with its symbol table, loop bookkeeping,
//! and dependency sets; `builder` is the session with the stage
//! lifecycle and member lookup; `ops` adds conditionals, loops, break,
//! and return; `func` adds function definitions and call modules.

mod builder;
mod error;
mod func;
mod ops;
pub mod scope;
pub mod stage;

pub use builder::{Builder, Resolved};
pub use error::BuildError;
pub use func::{DTypes, FnModule, FnSpec};
pub use scope::{ScopeEntry, ScopeStack};
pub use stage::{Stage, Symbol};
