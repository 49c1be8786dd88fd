//! Finalized stage operations.

use crate::arena::Handle;
use crate::buffer::Buffer;
use crate::expr::{Literal, Var};
use crate::stmt::Stmt;

/// The finalized output of a closed stage.
///
/// Packages everything a later scheduling or lowering pass needs: the
/// folded body, the loop axes declared directly in the stage, the
/// backing buffers of the stages it reads, its own output buffer, and
/// optional constant-initialization data.
#[derive(Clone, Debug)]
pub struct StageOp {
    /// Stage name (unqualified).
    pub name: String,
    /// Loop induction variables in declaration order.
    pub axes: Vec<Var>,
    /// Backing buffers of the stages this stage reads.
    pub input_buffers: Vec<Handle<Buffer>>,
    /// The stage's own backing buffer.
    pub output_buffer: Handle<Buffer>,
    /// Buffers assigned in the stage or its folded sub-stages.
    pub written_buffers: Vec<Handle<Buffer>>,
    /// The folded statement tree for the whole stage.
    pub body: Stmt,
    /// Element values for constant-initialized stages.
    pub init_values: Option<Vec<Literal>>,
    /// Whether the initialization data is immutable.
    pub is_const: bool,
}
