//! The builder session: open-stage stack, registries, and stage lifecycle.

use std::collections::BTreeSet;

use kdsl_ir::{
    Arena, Buffer, DType, Expr, Handle, KernelParam, Literal, Shape, StageOp, Stmt, Var,
};

use crate::error::BuildError;
use crate::stage::{Stage, Symbol};

/// The result of a member lookup on a stage.
#[derive(Clone, Debug)]
pub enum Resolved {
    /// A scalar variable.
    Var(Var),
    /// A sub-stage bound under its own name.
    Stage(Handle<Stage>),
    /// A buffer, paired with the stage it was found through.
    StageBuffer {
        stage: Handle<Stage>,
        buffer: Handle<Buffer>,
    },
}

/// A builder session for tracing one program.
///
/// All state the trace needs — the stage and buffer arenas, the stack
/// of currently open stages, and the top-level registry — lives here
/// and is threaded explicitly through every operation; there is no
/// process-global state. Scope entries hold `FnOnce` wrappers, so a
/// session is single-threaded by construction. A session must not be
/// reused after any operation returns an error.
#[derive(Debug, Default)]
pub struct Builder {
    /// All stages created in this session.
    pub stages: Arena<Stage>,
    /// All buffers created in this session.
    pub buffers: Arena<Buffer>,
    /// Currently open stages, innermost last.
    open: Vec<Handle<Stage>>,
    /// Top-level stages in close order.
    pub top_level: Vec<Handle<Stage>>,
    /// Top-level stages with no known successor yet.
    pub frontier: BTreeSet<Handle<Stage>>,
}

impl Builder {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The innermost open stage, if any.
    pub fn current(&self) -> Option<Handle<Stage>> {
        self.open.last().copied()
    }

    /// Number of currently open stages.
    pub fn open_depth(&self) -> usize {
        self.open.len()
    }

    pub(crate) fn open_stack(&self) -> &[Handle<Stage>] {
        &self.open
    }

    pub(crate) fn require_current(
        &self,
        construct: &'static str,
    ) -> Result<Handle<Stage>, BuildError> {
        self.current()
            .ok_or(BuildError::NoOpenStage { construct })
    }

    /// Opens a stage with a scalar `i32` backing buffer.
    pub fn open_stage(&mut self, name: &str) -> Handle<Stage> {
        self.open_stage_with(name, None, Vec::new())
    }

    /// Opens a stage with an explicit backing buffer dtype and shape.
    pub fn open_stage_with(
        &mut self,
        name: &str,
        dtype: Option<DType>,
        shape: Shape,
    ) -> Handle<Stage> {
        let qualified = match self.current() {
            Some(top) => format!("{}.{name}", self.stages[top].qualified_name),
            None => name.to_string(),
        };
        let dtype = DType::resolve(dtype, &qualified);
        let buffer = self.buffers.append(Buffer::new(name, dtype, shape));
        let handle = self.stages.append(Stage::new(name, qualified, buffer));
        self.open.push(handle);
        log::trace!("open stage {:?} '{name}'", handle);
        handle
    }

    /// Opens a constant-initialized stage.
    ///
    /// The initialization values are packaged into the stage's finalized
    /// op at close, alongside the folded body.
    pub fn open_stage_const(
        &mut self,
        name: &str,
        dtype: Option<DType>,
        shape: Shape,
        init_values: Vec<Literal>,
    ) -> Handle<Stage> {
        let handle = self.open_stage_with(name, dtype, shape);
        let stage = &mut self.stages[handle];
        stage.init_values = Some(init_values);
        stage.is_const = true;
        handle
    }

    /// Closes the innermost open stage, reconciling it with its parent
    /// or the top-level registry.
    ///
    /// The dependency algebra credits each closed producer to exactly
    /// one consumer chain at a time: a closed child becomes one of the
    /// parent's last writers unless the child itself depends on it,
    /// and the child's unresolved inputs bubble up into the parent's
    /// unless the parent already produced them.
    pub fn close_stage(&mut self) -> Result<Handle<Stage>, BuildError> {
        let handle = self.require_current("close_stage")?;

        // Reconcile own sets: pending last writers become inputs.
        {
            let stage = &mut self.stages[handle];
            let last = std::mem::take(&mut stage.last_writer_stages);
            stage.input_stages.extend(last);
        }

        let body = self.stages[handle].scopes.pop_scope();
        self.open.pop();

        let (child_name, child_buffer, child_inputs, child_written) = {
            let stage = &self.stages[handle];
            (
                stage.name.clone(),
                stage.buffer,
                stage.input_stages.clone(),
                stage.written_buffers.clone(),
            )
        };
        let input_buffers: Vec<_> = child_inputs.iter().map(|&h| self.stages[h].buffer).collect();
        {
            let stage = &mut self.stages[handle];
            stage.op = Some(StageOp {
                name: child_name.clone(),
                axes: stage.loop_vars.clone(),
                input_buffers,
                output_buffer: child_buffer,
                written_buffers: child_written.iter().copied().collect(),
                body,
                init_values: stage.init_values.clone(),
                is_const: stage.is_const,
            });
        }

        if let Some(&parent) = self.open.last() {
            // Defer the attachment decision: the annotation must enclose
            // everything the parent emits after this point, which is only
            // known once the parent's scope folds.
            let attach_name = child_name.clone();
            self.stages[parent].emit_wrapper(Box::new(move |rest| Stmt::AttrStmt {
                buffer: child_buffer,
                key: "attach_scope".into(),
                value: attach_name,
                body: Box::new(rest),
            }))?;

            let parent_qualified = {
                let p = &mut self.stages[parent];
                let prior_writers = p.last_writer_stages.clone();
                p.input_stages.extend(child_inputs.iter().copied());
                p.input_stages.retain(|h| !prior_writers.contains(h));
                p.last_writer_stages.insert(handle);
                p.last_writer_stages.retain(|h| !child_inputs.contains(h));
                p.written_buffers.extend(child_written.iter().copied());
                p.symbols.insert(child_name.clone(), Symbol::Stage(handle));
                p.sub_stages.push(handle);
                p.qualified_name.clone()
            };
            self.stages[handle].qualified_name = format!("{parent_qualified}.{child_name}");
            log::debug!(
                "close stage '{parent_qualified}.{child_name}': {} inputs bubble up",
                child_inputs.len()
            );
        } else {
            self.top_level.push(handle);
            self.frontier.insert(handle);
            for h in &child_inputs {
                self.frontier.remove(h);
            }
            log::debug!(
                "close top-level stage '{child_name}': frontier size {}",
                self.frontier.len()
            );
        }
        Ok(handle)
    }

    /// Opens a stage, traces `body` inside it, and closes it.
    pub fn stage<F>(&mut self, name: &str, body: F) -> Result<Handle<Stage>, BuildError>
    where
        F: FnOnce(&mut Builder) -> Result<(), BuildError>,
    {
        self.open_stage(name);
        body(self)?;
        self.close_stage()
    }

    /// Emits a statement into the innermost open stage's current scope.
    pub fn emit(&mut self, stmt: Stmt) -> Result<(), BuildError> {
        let h = self.require_current("emit")?;
        self.stages[h].emit(stmt)
    }

    /// Emits a deferred wrapper into the innermost open stage.
    pub fn emit_wrapper(
        &mut self,
        wrap: Box<dyn FnOnce(Stmt) -> Stmt>,
    ) -> Result<(), BuildError> {
        let h = self.require_current("emit_wrapper")?;
        self.stages[h].emit_wrapper(wrap)
    }

    /// Creates a placeholder: a scalar variable for an empty shape, a
    /// buffer otherwise.
    pub fn placeholder(&mut self, shape: Shape, name: &str, dtype: Option<DType>) -> KernelParam {
        let dtype = DType::resolve(dtype, name);
        if shape.is_empty() {
            KernelParam::Scalar(Var::new(name, dtype))
        } else {
            KernelParam::Tensor(self.buffers.append(Buffer::new(name, dtype, shape)))
        }
    }

    /// Writes `value` to `buffer[index]` in the current stage and
    /// records the buffer as written.
    pub fn store(&mut self, buffer: Handle<Buffer>, index: Expr, value: Expr) -> Result<(), BuildError> {
        let h = self.require_current("store")?;
        let stage = &mut self.stages[h];
        stage.emit(Stmt::Store {
            buffer,
            index: Box::new(index),
            value: Box::new(value),
        })?;
        stage.written_buffers.insert(buffer);
        Ok(())
    }

    /// Records that the current stage reads `producer`'s output.
    ///
    /// Called by compute surfaces when a cross-stage read is traced;
    /// close-time reconciliation consumes the set.
    pub fn record_input(&mut self, producer: Handle<Stage>) -> Result<(), BuildError> {
        let h = self.require_current("record_input")?;
        if h != producer {
            self.stages[h].input_stages.insert(producer);
        }
        Ok(())
    }

    /// Resolves a member name on a stage.
    ///
    /// Search order: the stage's own symbol table; its written buffers;
    /// its input stages by name; the input stages' written buffers.
    pub fn lookup(&self, stage: Handle<Stage>, name: &str) -> Result<Resolved, BuildError> {
        let s = &self.stages[stage];
        if let Some(sym) = s.symbols.get(name) {
            return Ok(match sym {
                Symbol::Var(v) => Resolved::Var(v.clone()),
                Symbol::Stage(h) => Resolved::Stage(*h),
                Symbol::Buffer(b) => Resolved::StageBuffer { stage, buffer: *b },
            });
        }
        if let Some(b) = self.find_buffer(&s.written_buffers, name) {
            return Ok(Resolved::StageBuffer { stage, buffer: b });
        }
        for &input in &s.input_stages {
            if self.stages[input].name == name {
                return Ok(Resolved::StageBuffer {
                    stage: input,
                    buffer: self.stages[input].buffer,
                });
            }
        }
        for &input in &s.input_stages {
            if let Some(b) = self.find_buffer(&self.stages[input].written_buffers, name) {
                return Ok(Resolved::StageBuffer {
                    stage: input,
                    buffer: b,
                });
            }
        }
        Err(BuildError::UnresolvedMember {
            stage: s.qualified_name.clone(),
            member: name.to_string(),
        })
    }

    fn find_buffer(&self, set: &BTreeSet<Handle<Buffer>>, name: &str) -> Option<Handle<Buffer>> {
        set.iter().copied().find(|&b| {
            let bn = &self.buffers[b].name;
            // Placeholders carry the stage prefix; accept the bare name too.
            bn == name || bn.ends_with(&format!(".{name}"))
        })
    }
}
