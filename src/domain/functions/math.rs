//! Elementwise arithmetic and windowed aggregates.

use super::define;
use crate::domain::error::RuntimeError;
use crate::domain::registry::{Args, Family, FunctionRegistry, Param};
use crate::domain::series::{Series, finite_or_nan, map, mean, rolling, to_flags, zip_map};

fn unary(registry: &mut FunctionRegistry, name: &str, description: &str, f: fn(f64) -> f64) {
    define(
        registry,
        name,
        Family::Mathematical,
        vec![Param::series("X")],
        description,
        move |args| Ok(map(&args.series(0)?, |v| finite_or_nan(f(v)))),
    );
}

fn windowed(
    registry: &mut FunctionRegistry,
    name: &str,
    description: &str,
    f: fn(&[f64]) -> f64,
) {
    define(
        registry,
        name,
        Family::Mathematical,
        vec![Param::series("X"), Param::period("N")],
        description,
        move |args| Ok(rolling(&args.series(0)?, args.period(1)?, f)),
    );
}

fn both_defined(a: f64, b: f64, f: fn(f64, f64) -> f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        f(a, b)
    }
}

fn round_to(args: &Args) -> Result<Series, RuntimeError> {
    let digits = args.scalar(1)?;
    if digits.fract() != 0.0 || !(-12.0..=12.0).contains(&digits) {
        return Err(args.domain(format!("D must be an integer in -12..=12, got {digits}")));
    }
    let factor = 10f64.powi(digits as i32);
    Ok(map(&args.series(0)?, |v| (v * factor).round() / factor))
}

pub fn register(registry: &mut FunctionRegistry) {
    unary(registry, "ABS", "Absolute value", f64::abs);
    unary(registry, "SQRT", "Square root; negative input is undefined", f64::sqrt);
    unary(registry, "FLOOR", "Largest integer not above X", f64::floor);
    unary(registry, "CEILING", "Smallest integer not below X", f64::ceil);
    registry.register_alias("CEIL", "CEILING");

    define(
        registry,
        "MAX",
        Family::Mathematical,
        vec![Param::series("A"), Param::series("B")],
        "Elementwise maximum",
        |args| {
            Ok(zip_map(&args.series(0)?, &args.series(1)?, |a, b| {
                both_defined(a, b, f64::max)
            }))
        },
    );

    define(
        registry,
        "MIN",
        Family::Mathematical,
        vec![Param::series("A"), Param::series("B")],
        "Elementwise minimum",
        |args| {
            Ok(zip_map(&args.series(0)?, &args.series(1)?, |a, b| {
                both_defined(a, b, f64::min)
            }))
        },
    );

    define(
        registry,
        "POW",
        Family::Mathematical,
        vec![Param::series("X"), Param::series("Y")],
        "X raised to the power Y",
        |args| {
            Ok(zip_map(&args.series(0)?, &args.series(1)?, |x, y| {
                finite_or_nan(x.powf(y))
            }))
        },
    );

    define(
        registry,
        "ROUND",
        Family::Mathematical,
        vec![Param::series("X"), Param::scalar("D").with_default(0.0)],
        "Round half away from zero to D decimal places",
        round_to,
    );

    windowed(registry, "SUM", "Sum over the last N bars", |w| w.iter().sum());
    windowed(registry, "HHV", "Highest value over the last N bars", |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    });
    windowed(registry, "LLV", "Lowest value over the last N bars", |w| {
        w.iter().copied().fold(f64::INFINITY, f64::min)
    });
    windowed(registry, "AVERAGE", "Arithmetic mean over the last N bars", mean);

    define(
        registry,
        "COUNT",
        Family::Mathematical,
        vec![Param::series("COND"), Param::period("N")],
        "Number of bars within the last N where COND holds",
        |args| {
            let flags = to_flags(&args.series(0)?);
            Ok(rolling(&flags, args.period(1)?, |w| w.iter().sum()))
        },
    );
}

#[cfg(test)]
mod tests {
    use crate::domain::functions::test_support::{assert_series, call_single, scalar, series};
    use crate::domain::registry::FunctionRegistry;

    const NAN: f64 = f64::NAN;

    #[test]
    fn abs_and_sqrt() {
        assert_series(
            &call_single("ABS", 3, vec![series(&[-1.5, 0.0, 2.0])]),
            &[1.5, 0.0, 2.0],
        );
        assert_series(
            &call_single("SQRT", 3, vec![series(&[4.0, -1.0, NAN])]),
            &[2.0, NAN, NAN],
        );
    }

    #[test]
    fn floor_and_ceil_alias() {
        assert_series(&call_single("FLOOR", 2, vec![series(&[1.7, -1.2])]), &[1.0, -2.0]);
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(registry.lookup("ceil").unwrap().name, "CEILING");
        assert_series(&call_single("CEILING", 2, vec![series(&[1.2, -1.7])]), &[2.0, -1.0]);
    }

    #[test]
    fn max_min_broadcast_scalar() {
        assert_series(
            &call_single("MAX", 3, vec![series(&[1.0, 5.0, NAN]), scalar(3.0)]),
            &[3.0, 5.0, NAN],
        );
        assert_series(
            &call_single("MIN", 3, vec![series(&[1.0, 5.0, 3.0]), scalar(3.0)]),
            &[1.0, 3.0, 3.0],
        );
    }

    #[test]
    fn pow_overflow_is_undefined() {
        assert_series(
            &call_single("POW", 2, vec![series(&[2.0, 10.0]), series(&[3.0, 400.0])]),
            &[8.0, NAN],
        );
    }

    #[test]
    fn round_to_digits() {
        assert_series(
            &call_single("ROUND", 2, vec![series(&[1.2345, -2.5]), scalar(2.0)]),
            &[1.23, -2.5],
        );
        assert_series(
            &call_single("ROUND", 2, vec![series(&[2.5, -2.5]), scalar(0.0)]),
            &[3.0, -3.0],
        );
    }

    #[test]
    fn windowed_aggregates() {
        let x = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_series(
            &call_single("SUM", 5, vec![series(&x), scalar(2.0)]),
            &[NAN, 4.0, 5.0, 5.0, 6.0],
        );
        assert_series(
            &call_single("HHV", 5, vec![series(&x), scalar(3.0)]),
            &[NAN, NAN, 4.0, 4.0, 5.0],
        );
        assert_series(
            &call_single("LLV", 5, vec![series(&x), scalar(3.0)]),
            &[NAN, NAN, 1.0, 1.0, 1.0],
        );
        assert_series(
            &call_single("AVERAGE", 5, vec![series(&x), scalar(5.0)]),
            &[NAN, NAN, NAN, NAN, 2.8],
        );
    }

    #[test]
    fn count_uses_truthiness() {
        assert_series(
            &call_single("COUNT", 4, vec![series(&[1.0, 0.0, NAN, 2.0]), scalar(2.0)]),
            &[NAN, 1.0, 0.0, 1.0],
        );
    }
}
