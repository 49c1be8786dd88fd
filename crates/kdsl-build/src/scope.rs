//! Per-stage scope stacks and the statement fold.

use std::fmt;

use kdsl_ir::Stmt;

/// An entry in a scope's statement list.
///
/// A `Wrapper` defers a structural decision: it receives the single
/// statement folded from everything emitted after it, and wraps it
/// (e.g. in a scope-attribute node) when the scope finalizes.
pub enum ScopeEntry {
    /// A finalized statement.
    Stmt(Stmt),
    /// A deferred wrapper around the continuation of the scope.
    Wrapper(Box<dyn FnOnce(Stmt) -> Stmt>),
}

impl fmt::Debug for ScopeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stmt(s) => f.debug_tuple("Stmt").field(s).finish(),
            Self::Wrapper(_) => f.write_str("Wrapper(..)"),
        }
    }
}

/// A stack of in-progress statement lists, one per nested control
/// construct currently open in a stage.
///
/// The stack always holds at least one frame (the stage's baseline)
/// while the stage is open; constructs push a frame on entry and pop
/// it back into a single statement on exit, so pushes and pops balance
/// within each construct.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Vec<ScopeEntry>>,
}

impl ScopeStack {
    /// Creates a scope stack with the baseline frame in place.
    pub fn new() -> Self {
        Self {
            frames: vec![Vec::new()],
        }
    }

    /// Number of frames currently open.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens a fresh frame for a nested construct.
    pub fn push_scope(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Appends an entry to the innermost frame.
    ///
    /// Break-flag enforcement lives on the stage, which gates all calls
    /// into this method.
    pub fn append(&mut self, entry: ScopeEntry) {
        self.frames
            .last_mut()
            .expect("scope stack underflow: stage already finalized")
            .push(entry);
    }

    /// Returns the last entry of the innermost frame, if any.
    pub fn last_entry(&self) -> Option<&ScopeEntry> {
        self.frames.last().and_then(|f| f.last())
    }

    /// Removes and returns the last entry of the innermost frame.
    pub fn pop_last_entry(&mut self) -> Option<ScopeEntry> {
        self.frames.last_mut().and_then(|f| f.pop())
    }

    /// Pops the innermost frame and folds it into a single statement.
    ///
    /// If the frame is empty or ends in a wrapper, a trailing no-op is
    /// appended first so the fold always starts from a concrete
    /// statement. The fold then scans right-to-left: wrappers are
    /// applied to the running statement, concrete statements are
    /// sequenced in front of it. Original emission order is preserved
    /// and each wrapper encloses exactly the statements emitted after
    /// it.
    pub fn pop_scope(&mut self) -> Stmt {
        let mut frame = self
            .frames
            .pop()
            .expect("scope stack underflow: stage already finalized");

        if !matches!(frame.last(), Some(ScopeEntry::Stmt(_))) {
            frame.push(ScopeEntry::Stmt(Stmt::nop()));
        }

        let mut stmt = match frame.pop() {
            Some(ScopeEntry::Stmt(s)) => s,
            _ => unreachable!("frame ends with a concrete statement"),
        };
        for entry in frame.into_iter().rev() {
            stmt = match entry {
                ScopeEntry::Wrapper(wrap) => wrap(stmt),
                ScopeEntry::Stmt(s) => Stmt::seq(s, stmt),
            };
        }
        stmt
    }
}
