//! Expressions — pure values with no side effects.

use crate::arena::Handle;
use crate::buffer::Buffer;
use crate::dtype::DType;

/// A literal constant value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    I32(i32),
    U32(u32),
    F32(f32),
    F64(f64),
}

impl Literal {
    /// Returns the element type of this literal.
    pub fn dtype(&self) -> DType {
        match *self {
            Self::Bool(_) => DType::BOOL,
            Self::I32(_) => DType::I32,
            Self::U32(_) => DType::U32,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
        }
    }
}

/// A unary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnaryOp {
    Negate,
    LogicalNot,
}

/// A binary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
}

/// A scalar variable: a named, typed value.
///
/// Loop induction variables and scalar placeholders are `Var`s; shaped
/// placeholders are [`Buffer`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Var {
    pub name: String,
    pub dtype: DType,
}

impl Var {
    /// Creates a variable with the given name and element type.
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// An expression tree.
///
/// Expressions are self-contained immutable trees; the builder hands
/// them to the external compiler inside statement nodes.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A literal constant.
    Literal(Literal),
    /// A variable reference.
    Var(Var),
    /// An element read from a buffer.
    Load {
        buffer: Handle<Buffer>,
        index: Box<Expr>,
    },
    /// Apply a unary operator.
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// Apply a binary operator.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Convert a value to another element type.
    Cast { dtype: DType, value: Box<Expr> },
    /// The value of a call to a function module (paired with the module's
    /// `KernelDef`; never emitted for void functions).
    KernelCall {
        name: String,
        args: Vec<Expr>,
        dtype: DType,
    },
}

impl Expr {
    /// Shorthand for an `i32` literal.
    pub fn int(v: i32) -> Self {
        Self::Literal(Literal::I32(v))
    }

    /// Shorthand for a boolean literal.
    pub fn bool(v: bool) -> Self {
        Self::Literal(Literal::Bool(v))
    }

    /// A variable reference.
    pub fn var(v: &Var) -> Self {
        Self::Var(v.clone())
    }

    /// An element read from a buffer.
    pub fn load(buffer: Handle<Buffer>, index: Expr) -> Self {
        Self::Load {
            buffer,
            index: Box::new(index),
        }
    }

    /// Returns `true` if this expression is a literal zero.
    pub fn is_zero(&self) -> bool {
        matches!(
            self,
            Expr::Literal(Literal::I32(0)) | Expr::Literal(Literal::U32(0))
        )
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn add(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Add, self, rhs)
    }

    pub fn sub(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Subtract, self, rhs)
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Multiply, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Less, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Greater, self, rhs)
    }

    pub fn eq(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Equal, self, rhs)
    }

    /// Wraps this expression in a cast to `dtype`.
    pub fn cast(self, dtype: DType) -> Self {
        Self::Cast {
            dtype,
            value: Box::new(self),
        }
    }
}

/// Conjunction of all conditions in `conds`.
///
/// An empty slice yields `true`.
pub fn and_(conds: &[Expr]) -> Expr {
    conds
        .iter()
        .cloned()
        .reduce(|acc, c| Expr::binary(BinaryOp::LogicalAnd, acc, c))
        .unwrap_or(Expr::bool(true))
}

/// Disjunction of all conditions in `conds`.
///
/// An empty slice yields `false`.
pub fn or_(conds: &[Expr]) -> Expr {
    conds
        .iter()
        .cloned()
        .reduce(|acc, c| Expr::binary(BinaryOp::LogicalOr, acc, c))
        .unwrap_or(Expr::bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_dtypes() {
        assert_eq!(Literal::F32(1.0).dtype(), DType::F32);
        assert_eq!(Literal::I32(-1).dtype(), DType::I32);
        assert_eq!(Literal::Bool(true).dtype(), DType::BOOL);
    }

    #[test]
    fn zero_detection() {
        assert!(Expr::int(0).is_zero());
        assert!(!Expr::int(1).is_zero());
        assert!(!Expr::bool(false).is_zero());
    }

    #[test]
    fn builder_shorthand() {
        let i = Var::new("i", DType::I32);
        let cond = Expr::var(&i).lt(Expr::int(10));
        if let Expr::Binary { op, .. } = cond {
            assert_eq!(op, BinaryOp::Less);
        } else {
            panic!("expected Binary");
        }
    }

    #[test]
    fn and_or_combinators() {
        let a = Expr::bool(true);
        let b = Expr::bool(false);
        if let Expr::Binary { op, .. } = and_(&[a.clone(), b.clone()]) {
            assert_eq!(op, BinaryOp::LogicalAnd);
        } else {
            panic!("expected Binary");
        }
        assert_eq!(and_(&[]), Expr::bool(true));
        assert_eq!(or_(&[]), Expr::bool(false));
        assert_eq!(or_(&[a.clone()]), a);
    }
}
