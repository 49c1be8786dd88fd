//! Statements — control flow and side effects as immutable trees.

use crate::arena::Handle;
use crate::buffer::{Buffer, Shape};
use crate::dtype::DType;
use crate::expr::{Expr, Var};

/// The scheduling kind of a counted loop.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ForKind {
    /// Ordinary sequential loop.
    Serial,
    /// Iterations may run on parallel units.
    Parallel,
    /// Iterations map to vector lanes.
    Vectorized,
    /// Fully unrolled at lowering time.
    Unrolled,
}

impl ForKind {
    /// Parses a loop-kind tag as it appears in decorator configuration.
    ///
    /// Returns `None` for unrecognized tags; the builder surfaces that as
    /// its unknown-loop-kind error.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "serial" => Some(Self::Serial),
            "parallel" => Some(Self::Parallel),
            "vectorize" => Some(Self::Vectorized),
            "unroll" => Some(Self::Unrolled),
            _ => None,
        }
    }
}

/// A formal parameter of a function definition.
///
/// Scalar-shaped parameters bind as plain variables, shaped ones as
/// buffers in the session arena.
#[derive(Clone, Debug, PartialEq)]
pub enum KernelParam {
    /// A scalar parameter.
    Scalar(Var),
    /// A tensor parameter.
    Tensor(Handle<Buffer>),
}

/// A statement in the traced program.
///
/// Statements are immutable once constructed. Scopes fold into a single
/// statement tree: ordered emission becomes right-nested [`Stmt::Seq`]
/// chains, and attachment wrappers become [`Stmt::AttrStmt`] nodes
/// enclosing everything emitted after them.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Evaluate an expression for effect; `Evaluate(0)` is the no-op
    /// appended when an empty scope folds.
    Evaluate(Expr),
    /// Two statements in sequence.
    Seq { first: Box<Stmt>, rest: Box<Stmt> },
    /// Write a value to a buffer element.
    Store {
        buffer: Handle<Buffer>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    /// Conditional branch; the else slot stays `None` until an `else` or
    /// `elif` construct fills it.
    IfThenElse {
        condition: Box<Expr>,
        then_case: Box<Stmt>,
        else_case: Option<Box<Stmt>>,
    },
    /// Counted loop over `[begin, begin + extent)`.
    For {
        var: Var,
        begin: Box<Expr>,
        extent: Box<Expr>,
        kind: ForKind,
        body: Box<Stmt>,
    },
    /// Condition-driven loop.
    While {
        condition: Box<Expr>,
        body: Box<Stmt>,
    },
    /// Break out of the innermost loop.
    Break,
    /// Return a value from the enclosing function body.
    Return { value: Box<Expr> },
    /// Scope-attribute wrapper: attaches `key = value` metadata for
    /// `buffer` to everything in `body`.
    AttrStmt {
        buffer: Handle<Buffer>,
        key: String,
        value: String,
        body: Box<Stmt>,
    },
    /// A reusable function definition unit.
    KernelDef {
        params: Vec<KernelParam>,
        shapes: Vec<Shape>,
        dtypes: Vec<DType>,
        body: Box<Stmt>,
        ret_void: bool,
        ret_dtype: DType,
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// A call to a previously defined function module.
    KernelCall { name: String, args: Vec<Expr> },
}

impl Stmt {
    /// The no-op statement used to seed folds of empty scopes.
    pub fn nop() -> Self {
        Self::Evaluate(Expr::int(0))
    }

    /// Combines two statements into a sequence, in order.
    pub fn seq(first: Stmt, rest: Stmt) -> Self {
        Self::Seq {
            first: Box::new(first),
            rest: Box::new(rest),
        }
    }

    /// Flattens a (possibly right-nested) sequence into execution order.
    pub fn flatten(&self) -> Vec<&Stmt> {
        let mut out = Vec::new();
        let mut cur = self;
        while let Stmt::Seq { first, rest } = cur {
            out.push(first.as_ref());
            cur = rest.as_ref();
        }
        out.push(cur);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_kind_tags() {
        assert_eq!(ForKind::parse("serial"), Some(ForKind::Serial));
        assert_eq!(ForKind::parse("parallel"), Some(ForKind::Parallel));
        assert_eq!(ForKind::parse("vectorize"), Some(ForKind::Vectorized));
        assert_eq!(ForKind::parse("unroll"), Some(ForKind::Unrolled));
        assert_eq!(ForKind::parse("spiral"), None);
    }

    #[test]
    fn seq_flatten() {
        let s = Stmt::seq(
            Stmt::Evaluate(Expr::int(1)),
            Stmt::seq(Stmt::Evaluate(Expr::int(2)), Stmt::Evaluate(Expr::int(3))),
        );
        let flat = s.flatten();
        assert_eq!(flat.len(), 3);
        assert_eq!(*flat[0], Stmt::Evaluate(Expr::int(1)));
        assert_eq!(*flat[2], Stmt::Evaluate(Expr::int(3)));
    }

    #[test]
    fn build_conditional() {
        let stmt = Stmt::IfThenElse {
            condition: Box::new(Expr::bool(true)),
            then_case: Box::new(Stmt::Break),
            else_case: None,
        };
        if let Stmt::IfThenElse { else_case, .. } = &stmt {
            assert!(else_case.is_none());
        } else {
            panic!("expected IfThenElse");
        }
    }
}
