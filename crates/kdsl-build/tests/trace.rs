//! Integration tests: trace small imperative programs through a builder
//! session and verify the folded statement trees, dependency sets, and
//! text dump output.

use kdsl_build::*;
use kdsl_ir::*;

/// Trace a two-stage pipeline under one parent:
///
/// ```text
/// with stage("pipe"):
///     with stage("a"):    # producer
///         a[0] = 1
///     with stage("b"):    # consumer of a
///         b[0] = a[0]
/// ```
#[test]
fn producer_consumer_reconciliation() {
    let mut b = Builder::new();
    let pipe = b.open_stage("pipe");

    b.open_stage("a");
    let a_buf = match b.placeholder(vec![4], "a.out", Some(DType::F32)) {
        KernelParam::Tensor(h) => h,
        other => panic!("expected Tensor, got {other:?}"),
    };
    b.store(a_buf, Expr::int(0), Expr::int(1)).unwrap();
    let a = b.close_stage().unwrap();

    b.open_stage("b");
    b.record_input(a).unwrap();
    let b_buf = match b.placeholder(vec![4], "b.out", Some(DType::F32)) {
        KernelParam::Tensor(h) => h,
        other => panic!("expected Tensor, got {other:?}"),
    };
    b.store(b_buf, Expr::int(0), Expr::load(a_buf, Expr::int(0)))
        .unwrap();
    let consumer = b.close_stage().unwrap();

    // `a` is claimed by its consumer: the parent sees only `b` as a
    // pending last writer, and `a` never escapes as a parent input.
    {
        let parent = &b.stages[pipe];
        assert_eq!(
            parent.last_writer_stages.iter().copied().collect::<Vec<_>>(),
            vec![consumer]
        );
        assert!(!parent.input_stages.contains(&a));
        assert!(parent.written_buffers.contains(&a_buf));
        assert!(parent.written_buffers.contains(&b_buf));
        assert_eq!(parent.sub_stages, vec![a, consumer]);
    }

    b.close_stage().unwrap();

    // After the parent closes, its pending last writer is folded into
    // its inputs and the sets no longer intersect.
    let parent = &b.stages[pipe];
    assert!(parent.input_stages.contains(&consumer));
    assert!(parent.last_writer_stages.is_empty());

    // The consumer's op packages its producer's backing buffer.
    let op = b.stages[consumer].op.as_ref().unwrap();
    assert_eq!(op.input_buffers, vec![b.stages[a].buffer]);
}

/// Sub-stage attachment wrappers must enclose exactly the statements
/// emitted after the child closed, not the ones before.
#[test]
fn attach_scope_encloses_continuation() {
    let mut b = Builder::new();
    let pipe = b.open_stage("pipe");
    b.emit(Stmt::Evaluate(Expr::int(1))).unwrap();
    b.stage("child", |_| Ok(())).unwrap();
    b.emit(Stmt::Evaluate(Expr::int(2))).unwrap();
    b.close_stage().unwrap();

    let body = &b.stages[pipe].op.as_ref().unwrap().body;
    // Seq(evaluate 1, AttrStmt{ evaluate 2 })
    match body {
        Stmt::Seq { first, rest } => {
            assert_eq!(**first, Stmt::Evaluate(Expr::int(1)));
            match rest.as_ref() {
                Stmt::AttrStmt { key, value, body, .. } => {
                    assert_eq!(key, "attach_scope");
                    assert_eq!(value, "child");
                    assert_eq!(**body, Stmt::Evaluate(Expr::int(2)));
                }
                other => panic!("expected AttrStmt, got {other:?}"),
            }
        }
        other => panic!("expected Seq, got {other:?}"),
    }

    let dump = dump_stmt(body, &b.buffers);
    assert!(dump.contains("attach_scope"), "dump: {dump}");
    eprintln!("{dump}");
}

/// Emission order survives the right-to-left fold unchanged.
#[test]
fn fold_preserves_emission_order() {
    let mut b = Builder::new();
    b.open_stage("s");
    for v in 1..=4 {
        b.emit(Stmt::Evaluate(Expr::int(v))).unwrap();
    }
    let s = b.close_stage().unwrap();

    let body = &b.stages[s].op.as_ref().unwrap().body;
    let flat = body.flatten();
    assert_eq!(flat.len(), 4);
    for (i, stmt) in flat.iter().enumerate() {
        assert_eq!(**stmt, Stmt::Evaluate(Expr::int(i as i32 + 1)));
    }
}

/// An empty stage folds to the canonical no-op.
#[test]
fn empty_stage_folds_to_nop() {
    let mut b = Builder::new();
    let s = b.stage("empty", |_| Ok(())).unwrap();
    assert_eq!(b.stages[s].op.as_ref().unwrap().body, Stmt::nop());
}

/// Trace the motivating end-to-end program:
///
/// ```text
/// with stage("s"):
///     for i in range(5):
///         if i == 3:
///             break
///         out[i] = i
/// ```
#[test]
fn loop_with_conditional_break() {
    let mut b = Builder::new();
    b.open_stage("s");
    let out = match b.placeholder(vec![5], "s.out", None) {
        KernelParam::Tensor(h) => h,
        other => panic!("expected Tensor, got {other:?}"),
    };
    b.for_(Expr::int(0), Expr::int(5), |b, i| {
        b.if_(Expr::var(i).eq(Expr::int(3)), |b| b.break_())?;
        b.store(out, Expr::var(i), Expr::var(i))
    })
    .unwrap();
    let s = b.close_stage().unwrap();

    // The break sealed only the conditional's scope; the store after it
    // landed in the loop body, and no flag leaked to the stage.
    assert!(!b.stages[s].has_break);
    let body = &b.stages[s].op.as_ref().unwrap().body;
    match body {
        Stmt::For { var, extent, body, .. } => {
            assert_eq!(var.name, "i");
            assert_eq!(**extent, Expr::int(5));
            let flat = body.flatten();
            assert!(matches!(flat[0], Stmt::IfThenElse { .. }));
            assert!(matches!(flat[1], Stmt::Store { .. }));
        }
        other => panic!("expected For, got {other:?}"),
    }

    let dump = dump_stmt(body, &b.buffers);
    assert!(dump.contains("for i in [0, +5) /*serial*/ {"), "dump: {dump}");
    assert!(dump.contains("break"), "dump: {dump}");
    assert!(dump.contains("s.out[i] = i"), "dump: {dump}");
    eprintln!("{dump}");
}

/// Auto-named loop variables progress `i`, `j`, `k`, `i_0` within one
/// stage and reset in the next stage.
#[test]
fn loop_auto_naming_per_stage() {
    let mut b = Builder::new();
    b.open_stage("first");
    let mut names = Vec::new();
    for _ in 0..4 {
        let v = b.for_(Expr::int(0), Expr::int(2), |_, _| Ok(())).unwrap();
        names.push(v.name);
    }
    b.close_stage().unwrap();
    assert_eq!(names, vec!["i", "j", "k", "i_0"]);

    b.open_stage("second");
    let v = b.for_(Expr::int(0), Expr::int(2), |_, _| Ok(())).unwrap();
    assert_eq!(v.name, "i");
    b.close_stage().unwrap();
}

/// A full if / elif / else chain nests in source order, and the dump
/// shows each branch.
#[test]
fn conditional_chain_round_trip() {
    let mut b = Builder::new();
    b.open_stage("s");
    let x = Var::new("x", DType::I32);
    b.for_named("x", Expr::int(0), Expr::int(10), |b, _| {
        b.if_(Expr::var(&x).lt(Expr::int(3)), |b| {
            b.emit(Stmt::Evaluate(Expr::int(1)))
        })?;
        b.elif_(Expr::var(&x).lt(Expr::int(6)), |b| {
            b.emit(Stmt::Evaluate(Expr::int(2)))
        })?;
        b.else_(|b| b.emit(Stmt::Evaluate(Expr::int(3))))
    })
    .unwrap();
    let s = b.close_stage().unwrap();

    let body = &b.stages[s].op.as_ref().unwrap().body;
    let dump = dump_stmt(body, &b.buffers);
    assert!(dump.contains("if (x < 3)"), "dump: {dump}");
    assert!(dump.contains("if (x < 6)"), "dump: {dump}");
    assert!(dump.contains("evaluate 3"), "dump: {dump}");
    assert_eq!(dump.matches("} else {").count(), 2, "dump: {dump}");
    eprintln!("{dump}");
}

/// Top-level close order and the successor-free frontier.
#[test]
fn top_level_registry_and_frontier() {
    let mut b = Builder::new();
    let a = b.stage("a", |_| Ok(())).unwrap();
    let c = b.stage("c", |_| Ok(())).unwrap();
    b.open_stage("d");
    b.record_input(a).unwrap();
    b.record_input(c).unwrap();
    let d = b.close_stage().unwrap();

    assert_eq!(b.top_level, vec![a, c, d]);
    assert_eq!(b.frontier.iter().copied().collect::<Vec<_>>(), vec![d]);
}

/// Member lookup resolves loop vars, sub-stages, and input-stage
/// buffers, in that order.
#[test]
fn member_lookup_order() {
    let mut b = Builder::new();
    let a = b.open_stage("a");
    let a_buf = match b.placeholder(vec![4], "a.data", None) {
        KernelParam::Tensor(h) => h,
        other => panic!("expected Tensor, got {other:?}"),
    };
    b.store(a_buf, Expr::int(0), Expr::int(1)).unwrap();
    b.close_stage().unwrap();

    let p = b.open_stage("p");
    b.for_named("row", Expr::int(0), Expr::int(4), |_, _| Ok(()))
        .unwrap();
    b.record_input(a).unwrap();
    let inner = b.stage("inner", |_| Ok(())).unwrap();
    b.close_stage().unwrap();

    match b.lookup(p, "row").unwrap() {
        Resolved::Var(v) => assert_eq!(v.name, "row"),
        other => panic!("expected Var, got {other:?}"),
    }
    match b.lookup(p, "inner").unwrap() {
        Resolved::Stage(h) => assert_eq!(h, inner),
        other => panic!("expected Stage, got {other:?}"),
    }
    // By input-stage name, then into its written buffers by bare name.
    match b.lookup(p, "a").unwrap() {
        Resolved::StageBuffer { stage, .. } => assert_eq!(stage, a),
        other => panic!("expected StageBuffer, got {other:?}"),
    }
    match b.lookup(p, "data").unwrap() {
        Resolved::StageBuffer { stage, buffer } => {
            assert_eq!(stage, a);
            assert_eq!(buffer, a_buf);
        }
        other => panic!("expected StageBuffer, got {other:?}"),
    }
    assert!(matches!(
        b.lookup(p, "ghost"),
        Err(BuildError::UnresolvedMember { .. })
    ));
}

/// Define a function, call it from a later stage, and verify the dump:
///
/// ```text
/// def scale(x, out):          # out[i] = x[i] * 2
///     for i in range(8):
///         out[i] = x[i] * 2
/// with stage("main"):
///     scale(...)
/// ```
#[test]
fn define_and_call_function() {
    let mut b = Builder::new();
    let spec = FnSpec {
        dtypes: Some(DTypes::Single(DType::F32)),
        arg_names: Some(vec!["x".into(), "out".into()]),
        ..FnSpec::new("scale", vec![vec![8], vec![8]])
    };
    let module = b
        .def_(spec, |b, params| {
            let x = match &params[0] {
                KernelParam::Tensor(h) => *h,
                other => panic!("expected Tensor, got {other:?}"),
            };
            let out = match &params[1] {
                KernelParam::Tensor(h) => *h,
                other => panic!("expected Tensor, got {other:?}"),
            };
            b.for_(Expr::int(0), Expr::int(8), |b, i| {
                let doubled = Expr::load(x, Expr::var(i)).mul(Expr::int(2));
                b.store(out, Expr::var(i), doubled)
            })?;
            Ok(())
        })
        .unwrap();

    assert!(module.ret_void);
    assert_eq!(module.output_indices, vec![1]);

    b.open_stage("main");
    assert!(module
        .call(&mut b, vec![Expr::int(0), Expr::int(0)])
        .unwrap()
        .is_none());
    let main = b.close_stage().unwrap();

    let def_stage = b.top_level[0];
    let def_body = &b.stages[def_stage].op.as_ref().unwrap().body;
    let dump = dump_stmt(def_body, &b.buffers);
    assert!(
        dump.contains("def scale(scale.x, scale.out) -> void {"),
        "dump: {dump}"
    );
    assert!(dump.contains("scale.out[i] = (scale.x[i] * 2)"), "dump: {dump}");

    let main_dump = dump_stmt(&b.stages[main].op.as_ref().unwrap().body, &b.buffers);
    assert!(main_dump.contains("call scale(0, 0)"), "dump: {main_dump}");
    eprintln!("{dump}{main_dump}");
}

/// A value-returning function yields a call expression the caller can
/// embed in later stores.
#[test]
fn value_function_round_trip() {
    let mut b = Builder::new();
    let spec = FnSpec {
        dtypes: Some(DTypes::Single(DType::F32)),
        ret_dtype: Some(DType::F32),
        ..FnSpec::new("mean", vec![vec![16]])
    };
    let module = b
        .def_(spec, |b, _| b.return_(Expr::int(0)))
        .unwrap();
    assert!(!module.ret_void);

    b.open_stage("main");
    let out = match b.placeholder(vec![1], "main.out", Some(DType::F32)) {
        KernelParam::Tensor(h) => h,
        other => panic!("expected Tensor, got {other:?}"),
    };
    let call = module.call(&mut b, vec![Expr::int(7)]).unwrap().unwrap();
    b.store(out, Expr::int(0), call).unwrap();
    let main = b.close_stage().unwrap();

    let dump = dump_stmt(&b.stages[main].op.as_ref().unwrap().body, &b.buffers);
    assert!(dump.contains("main.out[0] = mean(7)"), "dump: {dump}");
}

/// Errors surface with enough context to locate the construct.
#[test]
fn error_messages_name_the_stage() {
    let mut b = Builder::new();
    b.open_stage("outer");
    b.open_stage("inner");
    let err = b.break_().unwrap_err();
    assert_eq!(
        err.to_string(),
        "break_ in stage 'outer.inner' is outside any loop"
    );

    b.close_stage().unwrap();
    b.close_stage().unwrap();
    let err = b.emit(Stmt::nop()).unwrap_err();
    assert_eq!(err.to_string(), "`emit` requires an open stage");
}
