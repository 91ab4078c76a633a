//! Conditionals, boolean combinators and range tests. Conditions use truthiness.

use super::define;
use crate::domain::registry::{Family, FunctionRegistry, Param};
use crate::domain::series::{bool_value, map, rolling, to_flags, truthy, zip_map, zip3_map};

pub fn register(registry: &mut FunctionRegistry) {
    let family = Family::Logical;
    let conditional = || {
        vec![
            Param::series("COND"),
            Param::series("A"),
            Param::series("B"),
        ]
    };

    for name in ["IF", "IFF"] {
        define(
            registry,
            name,
            family,
            conditional(),
            "A where COND holds, otherwise B",
            |args| {
                Ok(zip3_map(
                    &args.series(0)?,
                    &args.series(1)?,
                    &args.series(2)?,
                    |c, a, b| if truthy(c) { a } else { b },
                ))
            },
        );
    }

    define(
        registry,
        "IFN",
        family,
        vec![Param::series("COND"), Param::series("X")],
        "Undefined where COND holds, otherwise X",
        |args| {
            Ok(zip_map(&args.series(0)?, &args.series(1)?, |c, x| {
                if truthy(c) { f64::NAN } else { x }
            }))
        },
    );

    define(
        registry,
        "AND",
        family,
        vec![Param::series("A"), Param::series("B")],
        "1 where both A and B hold",
        |args| {
            Ok(zip_map(&args.series(0)?, &args.series(1)?, |a, b| {
                bool_value(truthy(a) && truthy(b))
            }))
        },
    );

    define(
        registry,
        "OR",
        family,
        vec![Param::series("A"), Param::series("B")],
        "1 where A or B holds",
        |args| {
            Ok(zip_map(&args.series(0)?, &args.series(1)?, |a, b| {
                bool_value(truthy(a) || truthy(b))
            }))
        },
    );

    define(
        registry,
        "NOT",
        family,
        vec![Param::series("A")],
        "1 where A does not hold",
        |args| Ok(map(&args.series(0)?, |a| bool_value(!truthy(a)))),
    );

    define(
        registry,
        "BETWEEN",
        family,
        vec![Param::series("X"), Param::series("A"), Param::series("B")],
        "1 where X lies between A and B inclusive, in either order",
        |args| {
            Ok(zip3_map(
                &args.series(0)?,
                &args.series(1)?,
                &args.series(2)?,
                |x, a, b| {
                    if x.is_nan() || a.is_nan() || b.is_nan() {
                        return 0.0;
                    }
                    bool_value(a.min(b) <= x && x <= a.max(b))
                },
            ))
        },
    );

    define(
        registry,
        "RANGE",
        family,
        vec![Param::series("X"), Param::series("LO"), Param::series("HI")],
        "X clipped to [LO, HI]",
        |args| {
            Ok(zip3_map(
                &args.series(0)?,
                &args.series(1)?,
                &args.series(2)?,
                |x, lo, hi| {
                    if x.is_nan() || lo.is_nan() || hi.is_nan() {
                        return f64::NAN;
                    }
                    x.max(lo).min(hi)
                },
            ))
        },
    );

    define(
        registry,
        "EVERY",
        family,
        vec![Param::series("COND"), Param::period("N")],
        "1 where COND held on each of the last N bars",
        |args| {
            let flags = to_flags(&args.series(0)?);
            Ok(rolling(&flags, args.period(1)?, |w| {
                bool_value(w.iter().all(|&f| f == 1.0))
            }))
        },
    );

    define(
        registry,
        "EXIST",
        family,
        vec![Param::series("COND"), Param::period("N")],
        "1 where COND held on at least one of the last N bars",
        |args| {
            let flags = to_flags(&args.series(0)?);
            Ok(rolling(&flags, args.period(1)?, |w| {
                bool_value(w.iter().any(|&f| f == 1.0))
            }))
        },
    );
}

#[cfg(test)]
mod tests {
    use crate::domain::functions::test_support::{assert_series, call_single, scalar, series};

    const NAN: f64 = f64::NAN;

    #[test]
    fn if_selects_branch() {
        let out = call_single(
            "IF",
            3,
            vec![series(&[1.0, 0.0, NAN]), scalar(10.0), series(&[1.0, 2.0, 3.0])],
        );
        assert_series(&out, &[10.0, 2.0, 3.0]);
    }

    #[test]
    fn iff_matches_if() {
        let args = || vec![series(&[0.0, 2.0]), scalar(1.0), scalar(-1.0)];
        assert_series(&call_single("IFF", 2, args()), &call_single("IF", 2, args()));
    }

    #[test]
    fn ifn_blanks_true_positions() {
        let out = call_single("IFN", 2, vec![series(&[1.0, 0.0]), scalar(5.0)]);
        assert_series(&out, &[NAN, 5.0]);
    }

    #[test]
    fn boolean_combinators() {
        let a = [1.0, 1.0, 0.0, NAN];
        let b = [1.0, 0.0, 0.0, 1.0];
        assert_series(&call_single("AND", 4, vec![series(&a), series(&b)]), &[1.0, 0.0, 0.0, 0.0]);
        assert_series(&call_single("OR", 4, vec![series(&a), series(&b)]), &[1.0, 1.0, 0.0, 1.0]);
        assert_series(&call_single("NOT", 4, vec![series(&a)]), &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn between_accepts_reversed_bounds() {
        let x = [1.0, 5.0, 9.0, NAN];
        assert_series(
            &call_single("BETWEEN", 4, vec![series(&x), scalar(2.0), scalar(8.0)]),
            &[0.0, 1.0, 0.0, 0.0],
        );
        assert_series(
            &call_single("BETWEEN", 4, vec![series(&x), scalar(8.0), scalar(2.0)]),
            &[0.0, 1.0, 0.0, 0.0],
        );
    }

    #[test]
    fn range_clips() {
        assert_series(
            &call_single("RANGE", 3, vec![series(&[1.0, 5.0, 9.0]), scalar(2.0), scalar(8.0)]),
            &[2.0, 5.0, 8.0],
        );
    }

    #[test]
    fn every_and_exist() {
        let cond = [1.0, 1.0, 0.0, 1.0];
        assert_series(
            &call_single("EVERY", 4, vec![series(&cond), scalar(2.0)]),
            &[NAN, 1.0, 0.0, 0.0],
        );
        assert_series(
            &call_single("EXIST", 4, vec![series(&cond), scalar(2.0)]),
            &[NAN, 1.0, 1.0, 1.0],
        );
    }
}
