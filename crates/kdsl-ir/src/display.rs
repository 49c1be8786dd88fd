//! Display implementations and text dump for debugging.

use std::fmt;
use std::fmt::Write as _;

use crate::arena::Arena;
use crate::buffer::Buffer;
use crate::expr::{BinaryOp, Expr, Literal, UnaryOp};
use crate::stmt::{ForKind, KernelParam, Stmt};

impl fmt::Display for ForKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
            Self::Vectorized => "vectorize",
            Self::Unrolled => "unroll",
        })
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}u"),
            Self::F32(v) => write!(f, "{v}f"),
            Self::F64(v) => write!(f, "{v}lf"),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negate => write!(f, "-"),
            Self::LogicalNot => write!(f, "!"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Subtract => write!(f, "-"),
            Self::Multiply => write!(f, "*"),
            Self::Divide => write!(f, "/"),
            Self::Modulo => write!(f, "%"),
            Self::Equal => write!(f, "=="),
            Self::NotEqual => write!(f, "!="),
            Self::Less => write!(f, "<"),
            Self::LessEqual => write!(f, "<="),
            Self::Greater => write!(f, ">"),
            Self::GreaterEqual => write!(f, ">="),
            Self::LogicalAnd => write!(f, "&&"),
            Self::LogicalOr => write!(f, "||"),
        }
    }
}

/// Formats an expression, resolving buffer handles to names.
pub fn format_expr(expr: &Expr, buffers: &Arena<Buffer>) -> String {
    match expr {
        Expr::Literal(lit) => lit.to_string(),
        Expr::Var(v) => v.name.clone(),
        Expr::Load { buffer, index } => {
            let name = buffers
                .try_get(*buffer)
                .map(|b| b.name.as_str())
                .unwrap_or("<invalid>");
            format!("{name}[{}]", format_expr(index, buffers))
        }
        Expr::Unary { op, expr } => format!("{op}{}", format_expr(expr, buffers)),
        Expr::Binary { op, left, right } => format!(
            "({} {op} {})",
            format_expr(left, buffers),
            format_expr(right, buffers)
        ),
        Expr::Cast { dtype, value } => {
            format!("{dtype}({})", format_expr(value, buffers))
        }
        Expr::KernelCall { name, args, .. } => {
            let args: Vec<_> = args.iter().map(|a| format_expr(a, buffers)).collect();
            format!("{name}({})", args.join(", "))
        }
    }
}

/// Produces an indented text dump of a statement tree.
///
/// Intended for debugging and tests; the format is stable enough to
/// assert on key patterns but not a serialization format.
pub fn dump_stmt(stmt: &Stmt, buffers: &Arena<Buffer>) -> String {
    let mut out = String::new();
    write_stmt(&mut out, stmt, buffers, 0);
    out
}

fn write_stmt(out: &mut String, stmt: &Stmt, buffers: &Arena<Buffer>, indent: usize) {
    let pad = "  ".repeat(indent);
    match stmt {
        Stmt::Evaluate(expr) => {
            let _ = writeln!(out, "{pad}evaluate {}", format_expr(expr, buffers));
        }
        Stmt::Seq { first, rest } => {
            write_stmt(out, first, buffers, indent);
            write_stmt(out, rest, buffers, indent);
        }
        Stmt::Store {
            buffer,
            index,
            value,
        } => {
            let name = buffers
                .try_get(*buffer)
                .map(|b| b.name.as_str())
                .unwrap_or("<invalid>");
            let _ = writeln!(
                out,
                "{pad}{name}[{}] = {}",
                format_expr(index, buffers),
                format_expr(value, buffers)
            );
        }
        Stmt::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            let _ = writeln!(out, "{pad}if {} {{", format_expr(condition, buffers));
            write_stmt(out, then_case, buffers, indent + 1);
            if let Some(else_case) = else_case {
                let _ = writeln!(out, "{pad}}} else {{");
                write_stmt(out, else_case, buffers, indent + 1);
            }
            let _ = writeln!(out, "{pad}}}");
        }
        Stmt::For {
            var,
            begin,
            extent,
            kind,
            body,
        } => {
            let _ = writeln!(
                out,
                "{pad}for {} in [{}, +{}) /*{kind}*/ {{",
                var.name,
                format_expr(begin, buffers),
                format_expr(extent, buffers)
            );
            write_stmt(out, body, buffers, indent + 1);
            let _ = writeln!(out, "{pad}}}");
        }
        Stmt::While { condition, body } => {
            let _ = writeln!(out, "{pad}while {} {{", format_expr(condition, buffers));
            write_stmt(out, body, buffers, indent + 1);
            let _ = writeln!(out, "{pad}}}");
        }
        Stmt::Break => {
            let _ = writeln!(out, "{pad}break");
        }
        Stmt::Return { value } => {
            let _ = writeln!(out, "{pad}return {}", format_expr(value, buffers));
        }
        Stmt::AttrStmt {
            buffer,
            key,
            value,
            body,
        } => {
            let name = buffers
                .try_get(*buffer)
                .map(|b| b.name.as_str())
                .unwrap_or("<invalid>");
            let _ = writeln!(out, "{pad}// attr [{name}] {key} = {value:?}");
            write_stmt(out, body, buffers, indent);
        }
        Stmt::KernelDef {
            params,
            body,
            ret_void,
            ret_dtype,
            name,
            ..
        } => {
            let names: Vec<String> = params
                .iter()
                .map(|p| match p {
                    KernelParam::Scalar(v) => v.name.clone(),
                    KernelParam::Tensor(h) => buffers
                        .try_get(*h)
                        .map(|b| b.name.clone())
                        .unwrap_or_else(|| "<invalid>".into()),
                })
                .collect();
            let ret = if *ret_void {
                "void".to_string()
            } else {
                ret_dtype.to_string()
            };
            let _ = writeln!(out, "{pad}def {name}({}) -> {ret} {{", names.join(", "));
            write_stmt(out, body, buffers, indent + 1);
            let _ = writeln!(out, "{pad}}}");
        }
        Stmt::KernelCall { name, args } => {
            let args: Vec<_> = args.iter().map(|a| format_expr(a, buffers)).collect();
            let _ = writeln!(out, "{pad}call {name}({})", args.join(", "));
        }
    }
}
