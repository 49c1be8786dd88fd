//! Control-flow constructs: conditionals, loops, break, and return.

use kdsl_ir::{DType, Expr, ForKind, Stmt, Var};

use crate::builder::Builder;
use crate::error::BuildError;
use crate::scope::ScopeEntry;
use crate::stage::Symbol;

/// Whether the innermost else slot of a conditional chain is still open.
fn has_unset_else(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::IfThenElse { else_case, .. } => match else_case {
            None => true,
            Some(inner) => has_unset_else(inner),
        },
        _ => false,
    }
}

/// Fills the innermost unset else slot of `stmt` with `filler`.
///
/// Callers check [`has_unset_else`] first; a chain whose slots are all
/// taken passes through unchanged.
fn fill_else(stmt: Stmt, filler: Stmt) -> Stmt {
    match stmt {
        Stmt::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            let filled = match else_case {
                None => filler,
                Some(inner) => fill_else(*inner, filler),
            };
            Stmt::IfThenElse {
                condition,
                then_case,
                else_case: Some(Box::new(filled)),
            }
        }
        other => other,
    }
}

impl Builder {
    /// Traces `body` in a fresh frame of the current stage and folds it
    /// into a single statement. The stage's break flag is consumed: a
    /// break terminates only the construct being traced.
    fn scoped<F>(&mut self, construct: &'static str, body: F) -> Result<Stmt, BuildError>
    where
        F: FnOnce(&mut Builder) -> Result<(), BuildError>,
    {
        let h = self.require_current(construct)?;
        self.stages[h].scopes.push_scope();
        body(self)?;
        let stage = &mut self.stages[h];
        let stmt = stage.scopes.pop_scope();
        stage.has_break = false;
        Ok(stmt)
    }

    /// Opens a conditional: traces `body` as the then-branch and emits
    /// the conditional with its else slot unset.
    pub fn if_<F>(&mut self, condition: Expr, body: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Builder) -> Result<(), BuildError>,
    {
        let then_case = self.scoped("if_", body)?;
        self.emit(Stmt::IfThenElse {
            condition: Box::new(condition),
            then_case: Box::new(then_case),
            else_case: None,
        })
    }

    /// Chains another conditional branch onto the preceding `if_`.
    ///
    /// The new branch lands in the innermost unset else slot, so an
    /// `if_` / `elif_` / `elif_` / `else_` sequence nests the way the
    /// source reads.
    pub fn elif_<F>(&mut self, condition: Expr, body: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Builder) -> Result<(), BuildError>,
    {
        let h = self.require_current("elif_")?;
        let chainable = matches!(
            self.stages[h].scopes.last_entry(),
            Some(ScopeEntry::Stmt(s)) if has_unset_else(s)
        );
        if !chainable {
            return Err(BuildError::ElifWithoutIf {
                stage: self.stages[h].qualified_name.clone(),
                depth: self.stages[h].scopes.depth(),
            });
        }
        let then_case = self.scoped("elif_", body)?;
        let branch = Stmt::IfThenElse {
            condition: Box::new(condition),
            then_case: Box::new(then_case),
            else_case: None,
        };
        let prev = match self.stages[h].scopes.pop_last_entry() {
            Some(ScopeEntry::Stmt(s)) => s,
            _ => unreachable!("chainability checked above"),
        };
        self.emit(fill_else(prev, branch))
    }

    /// Fills the innermost unset else slot of the preceding conditional
    /// chain with `body`.
    pub fn else_<F>(&mut self, body: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Builder) -> Result<(), BuildError>,
    {
        let h = self.require_current("else_")?;
        let chainable = matches!(
            self.stages[h].scopes.last_entry(),
            Some(ScopeEntry::Stmt(s)) if has_unset_else(s)
        );
        if !chainable {
            return Err(BuildError::ElseWithoutIf {
                stage: self.stages[h].qualified_name.clone(),
                depth: self.stages[h].scopes.depth(),
            });
        }
        let else_case = self.scoped("else_", body)?;
        let prev = match self.stages[h].scopes.pop_last_entry() {
            Some(ScopeEntry::Stmt(s)) => s,
            _ => unreachable!("chainability checked above"),
        };
        self.emit(fill_else(prev, else_case))
    }

    /// Counted serial loop over `[begin, end)` with an auto-named
    /// induction variable.
    pub fn for_<F>(&mut self, begin: Expr, end: Expr, body: F) -> Result<Var, BuildError>
    where
        F: FnOnce(&mut Builder, &Var) -> Result<(), BuildError>,
    {
        self.for_loop(None, begin, end, ForKind::Serial, body)
    }

    /// Counted serial loop with an explicit induction variable name.
    pub fn for_named<F>(
        &mut self,
        name: &str,
        begin: Expr,
        end: Expr,
        body: F,
    ) -> Result<Var, BuildError>
    where
        F: FnOnce(&mut Builder, &Var) -> Result<(), BuildError>,
    {
        self.for_loop(Some(name), begin, end, ForKind::Serial, body)
    }

    /// Counted loop with a scheduling-kind tag (`"serial"`,
    /// `"parallel"`, `"vectorize"`, `"unroll"`).
    pub fn for_tagged<F>(
        &mut self,
        name: Option<&str>,
        begin: Expr,
        end: Expr,
        tag: &str,
        body: F,
    ) -> Result<Var, BuildError>
    where
        F: FnOnce(&mut Builder, &Var) -> Result<(), BuildError>,
    {
        let kind = ForKind::parse(tag).ok_or_else(|| BuildError::UnknownLoopKind {
            tag: tag.to_string(),
        })?;
        self.for_loop(name, begin, end, kind, body)
    }

    fn for_loop<F>(
        &mut self,
        name: Option<&str>,
        begin: Expr,
        end: Expr,
        kind: ForKind,
        body: F,
    ) -> Result<Var, BuildError>
    where
        F: FnOnce(&mut Builder, &Var) -> Result<(), BuildError>,
    {
        let h = self.require_current("for_")?;
        let name = match name {
            Some(n) => n.to_string(),
            None => self.stages[h].next_loop_name(),
        };
        let var = Var::new(&name, DType::I32);
        {
            let stage = &mut self.stages[h];
            stage.symbols.insert(name, Symbol::Var(var.clone()));
            stage.loop_vars.push(var.clone());
            stage.loop_depth += 1;
            stage.scopes.push_scope();
        }
        body(self, &var)?;

        let extent = if begin.is_zero() {
            end
        } else {
            end.sub(begin.clone())
        };
        let stage = &mut self.stages[h];
        let loop_body = stage.scopes.pop_scope();
        stage.has_break = false;
        stage.loop_depth -= 1;
        stage.emit(Stmt::For {
            var: var.clone(),
            begin: Box::new(begin),
            extent: Box::new(extent),
            kind,
            body: Box::new(loop_body),
        })?;
        Ok(var)
    }

    /// Condition-driven loop.
    pub fn while_<F>(&mut self, condition: Expr, body: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Builder) -> Result<(), BuildError>,
    {
        let h = self.require_current("while_")?;
        {
            let stage = &mut self.stages[h];
            stage.loop_depth += 1;
            stage.scopes.push_scope();
        }
        body(self)?;
        let stage = &mut self.stages[h];
        let loop_body = stage.scopes.pop_scope();
        stage.has_break = false;
        stage.loop_depth -= 1;
        stage.emit(Stmt::While {
            condition: Box::new(condition),
            body: Box::new(loop_body),
        })
    }

    /// Breaks out of the innermost loop and seals the current scope:
    /// nothing further may be emitted into it.
    pub fn break_(&mut self) -> Result<(), BuildError> {
        let h = self.require_current("break_")?;
        let stage = &mut self.stages[h];
        if stage.loop_depth == 0 {
            return Err(BuildError::BreakOutsideLoop {
                stage: stage.qualified_name.clone(),
            });
        }
        stage.emit(Stmt::Break)?;
        stage.has_break = true;
        Ok(())
    }

    /// Returns `value` from the enclosing function body.
    ///
    /// The value is cast to the declared return dtype of the innermost
    /// open stage that declares one.
    pub fn return_(&mut self, value: Expr) -> Result<(), BuildError> {
        let h = self.require_current("return_")?;
        let dtype = self
            .open_stack()
            .iter()
            .rev()
            .find_map(|&s| self.stages[s].ret_dtype())
            .ok_or(BuildError::ReturnWithoutReturnType)?;
        let stage = &mut self.stages[h];
        stage.emit(Stmt::Return {
            value: Box::new(value.cast(dtype)),
        })?;
        stage.has_return = true;
        Ok(())
    }
}
