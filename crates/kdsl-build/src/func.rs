//! Function definitions: tracing a body once and packaging it as a
//! reusable module.

use kdsl_ir::{DType, Expr, KernelParam, Shape, Stmt};

use crate::builder::Builder;
use crate::error::BuildError;
use crate::stage::Symbol;

/// Element types for a function's parameters.
#[derive(Clone, Debug)]
pub enum DTypes {
    /// One dtype shared by every parameter.
    Single(DType),
    /// One dtype per parameter, in declaration order.
    PerParam(Vec<DType>),
}

/// Declarative description of a function to define.
///
/// `shapes` is the one required field: one shape per parameter, with an
/// empty shape meaning a scalar. Everything else defaults: dtypes and
/// the return dtype fall back to `i32`, argument names to `arg0`,
/// `arg1`, ...
#[derive(Clone, Debug)]
pub struct FnSpec {
    pub name: String,
    pub shapes: Vec<Shape>,
    pub dtypes: Option<DTypes>,
    pub ret_dtype: Option<DType>,
    pub arg_names: Option<Vec<String>>,
}

impl FnSpec {
    /// A spec with all-default dtypes and argument names.
    pub fn new(name: impl Into<String>, shapes: Vec<Shape>) -> Self {
        Self {
            name: name.into(),
            shapes,
            dtypes: None,
            ret_dtype: None,
            arg_names: None,
        }
    }
}

/// A defined function, ready to be called from later traces.
#[derive(Clone, Debug)]
pub struct FnModule {
    pub name: String,
    pub shapes: Vec<Shape>,
    pub arg_names: Vec<String>,
    pub ret_dtype: DType,
    pub ret_void: bool,
    /// Whether calls must be emitted as statements rather than pure
    /// expressions; true for every void function.
    pub has_side_effects: bool,
    /// Parameter positions the body writes through.
    pub output_indices: Vec<usize>,
}

impl FnModule {
    /// Calls the module with `args`.
    ///
    /// A void module emits a call statement into the current stage and
    /// yields `None`; a value-returning module yields the call
    /// expression for the caller to place.
    pub fn call(&self, b: &mut Builder, args: Vec<Expr>) -> Result<Option<Expr>, BuildError> {
        if args.len() != self.shapes.len() {
            return Err(BuildError::ParameterCountMismatch {
                name: self.name.clone(),
                expected: self.shapes.len(),
                actual: args.len(),
            });
        }
        if self.ret_void {
            b.emit(Stmt::KernelCall {
                name: self.name.clone(),
                args,
            })?;
            Ok(None)
        } else {
            Ok(Some(Expr::KernelCall {
                name: self.name.clone(),
                args,
                dtype: self.ret_dtype,
            }))
        }
    }
}

impl Builder {
    /// Defines a function: creates its parameter placeholders, traces
    /// `trace` as the body, and packages the result as a
    /// [`Stmt::KernelDef`] inside a dedicated stage.
    ///
    /// The definition is a closed unit: its parameter placeholders are
    /// prefix-qualified with the function name, and nothing traced
    /// inside it feeds the surrounding dependency tracking.
    pub fn def_<F>(&mut self, spec: FnSpec, trace: F) -> Result<FnModule, BuildError>
    where
        F: FnOnce(&mut Builder, &[KernelParam]) -> Result<(), BuildError>,
    {
        let n = spec.shapes.len();
        let arg_names: Vec<String> = match &spec.arg_names {
            Some(names) => {
                if names.len() != n {
                    return Err(BuildError::ParameterCountMismatch {
                        name: spec.name.clone(),
                        expected: n,
                        actual: names.len(),
                    });
                }
                names.clone()
            }
            None => (0..n).map(|i| format!("arg{i}")).collect(),
        };
        let dtypes: Vec<DType> = match &spec.dtypes {
            None => vec![DType::resolve(None, &spec.name); n],
            Some(DTypes::Single(d)) => vec![*d; n],
            Some(DTypes::PerParam(v)) => {
                if v.len() != n {
                    return Err(BuildError::ParameterCountMismatch {
                        name: spec.name.clone(),
                        expected: n,
                        actual: v.len(),
                    });
                }
                v.clone()
            }
        };
        let ret_dtype = DType::resolve(spec.ret_dtype, &spec.name);

        let handle = self.open_stage(&spec.name);
        self.stages[handle].is_function_module = true;
        self.stages[handle].set_ret_dtype(ret_dtype)?;

        let params: Vec<KernelParam> = arg_names
            .iter()
            .zip(&spec.shapes)
            .zip(&dtypes)
            .map(|((arg, shape), &dtype)| {
                self.placeholder(shape.clone(), &format!("{}.{arg}", spec.name), Some(dtype))
            })
            .collect();
        for (arg, param) in arg_names.iter().zip(&params) {
            let sym = match param {
                KernelParam::Scalar(v) => Symbol::Var(v.clone()),
                KernelParam::Tensor(h) => Symbol::Buffer(*h),
            };
            self.stages[handle].symbols.insert(arg.clone(), sym);
        }
        log::debug!("def '{}' with {n} parameters", spec.name);

        trace(self, &params)?;

        let (body, ret_void) = {
            let stage = &mut self.stages[handle];
            let body = stage.scopes.pop_scope();
            let ret_void = !stage.has_return;
            stage.scopes.push_scope();
            (body, ret_void)
        };
        let output_indices: Vec<usize> = params
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match p {
                KernelParam::Tensor(h) if self.stages[handle].written_buffers.contains(h) => {
                    Some(i)
                }
                _ => None,
            })
            .collect();

        self.stages[handle].emit(Stmt::KernelDef {
            params,
            shapes: spec.shapes.clone(),
            dtypes,
            body: Box::new(body),
            ret_void,
            ret_dtype,
            name: spec.name.clone(),
            attrs: Vec::new(),
        })?;

        {
            let stage = &mut self.stages[handle];
            stage.input_stages.clear();
            stage.last_writer_stages.clear();
        }
        self.close_stage()?;

        Ok(FnModule {
            name: spec.name,
            shapes: spec.shapes,
            arg_names,
            ret_dtype,
            ret_void,
            has_side_effects: ret_void,
            output_indices,
        })
    }
}
