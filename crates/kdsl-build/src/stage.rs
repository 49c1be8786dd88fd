//! Stages — named blocks of traced statements with dependency tracking.

use std::collections::{BTreeSet, HashMap};

use kdsl_ir::{Buffer, DType, Handle, Literal, StageOp, Stmt, Var};

use crate::error::BuildError;
use crate::scope::{ScopeEntry, ScopeStack};

/// An entity bound in a stage's symbol table.
#[derive(Clone, Debug)]
pub enum Symbol {
    /// A scalar variable (loop var or scalar placeholder).
    Var(Var),
    /// A directly nested sub-stage.
    Stage(Handle<Stage>),
    /// A buffer (tensor placeholder or stage output).
    Buffer(Handle<Buffer>),
}

/// A named block of traced statements.
///
/// A stage owns its scope stack, symbol table, loop bookkeeping, and
/// the three dependency sets the cross-stage tracker maintains:
/// `written_buffers` (buffers assigned anywhere in this stage or its
/// folded sub-stages), `input_stages` (producers this stage still
/// needs), and `last_writer_stages` (recently closed sub-stages not yet
/// claimed by a later consumer). Stages are created and closed by the
/// builder session in strict nesting order and reconciled with their
/// parent exactly once, at close.
#[derive(Debug)]
pub struct Stage {
    /// Stage name as given at open.
    pub name: String,
    /// Name prefixed by every enclosing stage's qualified name.
    pub qualified_name: String,
    /// In-progress statement lists, innermost last.
    pub scopes: ScopeStack,
    /// Identifier bindings visible by member lookup.
    pub symbols: HashMap<String, Symbol>,
    /// Loop induction variables declared directly in this stage.
    pub loop_vars: Vec<Var>,
    /// Set when a `break_` terminated the current scope.
    pub has_break: bool,
    /// Set when a `return_` was traced in this stage.
    pub has_return: bool,
    ret_dtype: Option<DType>,
    /// Current loop nesting depth; validates `break_` placement.
    pub loop_depth: u32,
    /// Block-local counter for auto-named loop variables.
    unnamed_loops: u32,
    /// Buffers assigned in this stage or its folded sub-stages.
    pub written_buffers: BTreeSet<Handle<Buffer>>,
    /// Producers this stage reads that are not part of its own lineage.
    pub input_stages: BTreeSet<Handle<Stage>>,
    /// Recently closed sub-stages not yet subsumed by a dependency.
    pub last_writer_stages: BTreeSet<Handle<Stage>>,
    /// Directly nested sub-stages, in close order (traversal only).
    pub sub_stages: Vec<Handle<Stage>>,
    /// Whether this stage is a reusable function module.
    pub is_function_module: bool,
    /// The stage's own backing buffer.
    pub buffer: Handle<Buffer>,
    /// Element values for constant-initialized stages.
    pub init_values: Option<Vec<Literal>>,
    /// Whether the initialization data is immutable.
    pub is_const: bool,
    /// Finalized output, set once at close.
    pub op: Option<StageOp>,
}

impl Stage {
    pub(crate) fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        buffer: Handle<Buffer>,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            scopes: ScopeStack::new(),
            symbols: HashMap::new(),
            loop_vars: Vec::new(),
            has_break: false,
            has_return: false,
            ret_dtype: None,
            loop_depth: 0,
            unnamed_loops: 0,
            written_buffers: BTreeSet::new(),
            input_stages: BTreeSet::new(),
            last_writer_stages: BTreeSet::new(),
            sub_stages: Vec::new(),
            is_function_module: false,
            buffer,
            init_values: None,
            is_const: false,
            op: None,
        }
    }

    /// Emits a finalized statement into the current scope.
    pub fn emit(&mut self, stmt: Stmt) -> Result<(), BuildError> {
        self.emit_entry(ScopeEntry::Stmt(stmt))
    }

    /// Emits a deferred wrapper into the current scope.
    pub fn emit_wrapper(
        &mut self,
        wrap: Box<dyn FnOnce(Stmt) -> Stmt>,
    ) -> Result<(), BuildError> {
        self.emit_entry(ScopeEntry::Wrapper(wrap))
    }

    fn emit_entry(&mut self, entry: ScopeEntry) -> Result<(), BuildError> {
        if self.has_break {
            return Err(BuildError::IllegalEmitAfterBreak {
                stage: self.qualified_name.clone(),
            });
        }
        self.scopes.append(entry);
        Ok(())
    }

    /// Declares the stage's return dtype; may be set only once.
    pub fn set_ret_dtype(&mut self, dtype: DType) -> Result<(), BuildError> {
        if self.ret_dtype.is_some() {
            return Err(BuildError::DuplicateReturnType {
                stage: self.qualified_name.clone(),
            });
        }
        self.ret_dtype = Some(dtype);
        Ok(())
    }

    /// The declared return dtype, if any.
    pub fn ret_dtype(&self) -> Option<DType> {
        self.ret_dtype
    }

    /// Next auto-generated loop variable name.
    ///
    /// The first three unnamed loops in a stage get `i`, `j`, `k`;
    /// later ones get `i_0`, `i_1`, ...
    pub(crate) fn next_loop_name(&mut self) -> String {
        let n = self.unnamed_loops;
        self.unnamed_loops += 1;
        if n < 3 {
            char::from(b'i' + n as u8).to_string()
        } else {
            format!("i_{}", n - 3)
        }
    }
}
