//! Buffers — named, shaped, typed storage handles.

use crate::dtype::DType;

/// Tensor dimensions. An empty shape denotes a scalar.
pub type Shape = Vec<i64>;

/// A named storage declaration.
///
/// Buffers live in the builder session's arena and are referenced by
/// `Handle<Buffer>`; statements and dependency sets carry the handle,
/// never the buffer itself.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffer {
    /// Fully-qualified buffer name.
    pub name: String,
    /// Element type.
    pub dtype: DType,
    /// Dimensions; empty for scalars.
    pub shape: Shape,
}

impl Buffer {
    /// Creates a buffer declaration.
    pub fn new(name: impl Into<String>, dtype: DType, shape: Shape) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
        }
    }

    /// Returns `true` if this buffer holds a single scalar element.
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Total number of elements, treating scalars as one element.
    pub fn element_count(&self) -> i64 {
        self.shape.iter().product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_buffer() {
        let b = Buffer::new("x", DType::I32, vec![]);
        assert!(b.is_scalar());
        assert_eq!(b.element_count(), 1);
    }

    #[test]
    fn shaped_buffer() {
        let b = Buffer::new("a", DType::F32, vec![4, 8]);
        assert!(!b.is_scalar());
        assert_eq!(b.element_count(), 32);
    }
}
