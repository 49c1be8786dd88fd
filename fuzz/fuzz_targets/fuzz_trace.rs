#![no_main]

use libfuzzer_sys::fuzz_target;

use kdsl_build::Builder;
use kdsl_ir::{Expr, Stmt};

// Drive the builder with an arbitrary operation sequence. Individual
// operations may be rejected; the session itself must never panic.
fuzz_target!(|data: &[u8]| {
    let mut b = Builder::new();
    for chunk in data.chunks(2) {
        let v = *chunk.get(1).unwrap_or(&0) as i32;
        let result = match chunk[0] % 8 {
            0 => {
                b.open_stage(&format!("s{v}"));
                Ok(())
            }
            1 => b.close_stage().map(|_| ()),
            2 => b.emit(Stmt::Evaluate(Expr::int(v))),
            3 => b
                .for_(Expr::int(0), Expr::int(v), |b, _| {
                    if v % 2 == 0 {
                        b.break_()
                    } else {
                        Ok(())
                    }
                })
                .map(|_| ()),
            4 => b.if_(Expr::bool(v % 2 == 0), |_| Ok(())),
            5 => b.else_(|b| b.emit(Stmt::nop())),
            6 => b.break_(),
            7 => b.return_(Expr::int(v)),
            _ => unreachable!(),
        };
        // Any error is a hard stop for the trace.
        if result.is_err() {
            break;
        }
    }
});
