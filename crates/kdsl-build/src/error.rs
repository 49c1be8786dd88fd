//! Error types for the statement builder.

/// Errors raised while tracing a program.
///
/// Every error is a hard stop for the current trace: the caller must
/// not keep emitting into a stage or scope after one of these is
/// returned. Variants carry the stage qualified name and, where it
/// helps locate the offending construct, the scope depth.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Emission attempted into a scope already terminated by `break_`.
    #[error("cannot emit into stage '{stage}': scope terminated by break")]
    IllegalEmitAfterBreak { stage: String },

    /// A construct requiring an open stage was invoked with none open.
    #[error("`{construct}` requires an open stage")]
    NoOpenStage { construct: &'static str },

    /// `else_` does not follow a conditional with an unset else branch.
    #[error("else_ in stage '{stage}' (scope depth {depth}) does not follow an if_")]
    ElseWithoutIf { stage: String, depth: usize },

    /// `elif_` does not follow a conditional with an unset else branch.
    #[error("elif_ in stage '{stage}' (scope depth {depth}) does not follow an if_")]
    ElifWithoutIf { stage: String, depth: usize },

    /// `break_` used outside any `for_`/`while_` loop.
    #[error("break_ in stage '{stage}' is outside any loop")]
    BreakOutsideLoop { stage: String },

    /// `return_` with no enclosing stage declaring a return dtype.
    #[error("return_ has no enclosing stage that declares a return dtype")]
    ReturnWithoutReturnType,

    /// An unrecognized loop kind tag.
    #[error("unknown loop kind tag '{tag}'")]
    UnknownLoopKind { tag: String },

    /// A per-parameter list does not match the declared parameter count.
    #[error("function '{name}' expects {expected} parameters, got {actual}")]
    ParameterCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Member lookup found no matching symbol or buffer.
    #[error("member '{member}' not found in stage '{stage}'")]
    UnresolvedMember { stage: String, member: String },

    /// A stage's return dtype was set more than once.
    #[error("return dtype for stage '{stage}' set more than once")]
    DuplicateReturnType { stage: String },
}
