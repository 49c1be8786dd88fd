//! Element types for variables and buffers.

use std::fmt;

/// The kind of a scalar element type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScalarKind {
    /// Boolean.
    Bool,
    /// Signed integer.
    Sint,
    /// Unsigned integer.
    Uint,
    /// Floating point.
    Float,
}

/// An element type: kind + bit width.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct DType {
    pub kind: ScalarKind,
    pub bits: u8,
}

impl DType {
    pub const BOOL: Self = Self {
        kind: ScalarKind::Bool,
        bits: 1,
    };
    pub const I32: Self = Self {
        kind: ScalarKind::Sint,
        bits: 32,
    };
    pub const U1: Self = Self {
        kind: ScalarKind::Uint,
        bits: 1,
    };
    pub const U32: Self = Self {
        kind: ScalarKind::Uint,
        bits: 32,
    };
    pub const F16: Self = Self {
        kind: ScalarKind::Float,
        bits: 16,
    };
    pub const F32: Self = Self {
        kind: ScalarKind::Float,
        bits: 32,
    };
    pub const F64: Self = Self {
        kind: ScalarKind::Float,
        bits: 64,
    };

    /// Resolves a possibly-declared element type.
    ///
    /// The declared type wins; otherwise the builder default (`i32`) is
    /// used. The context name is only reported in trace logs by callers,
    /// it does not influence the result.
    pub fn resolve(declared: Option<DType>, _context_name: &str) -> DType {
        declared.unwrap_or(Self::I32)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScalarKind::Bool => write!(f, "bool"),
            ScalarKind::Sint => write!(f, "i{}", self.bits),
            ScalarKind::Uint => write!(f, "u{}", self.bits),
            ScalarKind::Float => write!(f, "f{}", self.bits),
        }
    }
}
