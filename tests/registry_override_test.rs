//! Overriding a built-in in the process-wide registry.
//!
//! Kept in its own test binary: the override is global to the process.

mod common;

use common::*;
use tdxformula::{
    Family, FunctionDescriptor, Interpreter, Output, Param, evaluate_formula, register_function,
    registry,
};

fn single(output: Output) -> Vec<f64> {
    output.as_single().cloned().unwrap()
}

#[test]
fn registered_function_replaces_builtin() {
    let ctx = close_context(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    let before = Interpreter::new();
    let builtin = single(evaluate_formula("MA(CLOSE,5)", &ctx).unwrap());
    assert_series(&builtin, &[f64::NAN, f64::NAN, f64::NAN, f64::NAN, 3.0]);

    register_function(
        "ma",
        FunctionDescriptor::new(
            "MA",
            Family::Technical,
            vec![Param::series("X"), Param::period("N")],
            |args| {
                let n = args.period(1)? as f64;
                Ok(Output::Single(args.series(0)?.iter().map(|v| v * n).collect()))
            },
        )
        .describe("Scaled copy"),
    );

    let custom = single(evaluate_formula("MA(CLOSE,5)", &ctx).unwrap());
    assert_series(&custom, &[5.0, 10.0, 15.0, 20.0, 25.0]);
    assert_eq!(registry().lookup("MA").unwrap().description, "Scaled copy");

    // Snapshots taken earlier keep the built-in.
    let old = single(before.evaluate("MA(CLOSE,5)", &ctx).unwrap());
    assert_series(&old, &builtin);

    // Other built-ins are untouched.
    let ema = single(evaluate_formula("EMA(CLOSE,2)", &ctx).unwrap());
    assert_eq!(ema[0], 1.0);
}
