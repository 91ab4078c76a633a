//! Moving averages and classic indicators.

use super::define;
use crate::domain::indicator::{atr, bollinger, ema, kdj, macd, rsi, sma, wma};
use crate::domain::indicator::bollinger::{DEFAULT_MULTIPLIER, DEFAULT_PERIOD};
use crate::domain::indicator::macd::{DEFAULT_LONG, DEFAULT_MID, DEFAULT_SHORT};
use crate::domain::registry::{Family, FunctionDescriptor, FunctionRegistry, Param};
use crate::domain::series::{mean, rolling};
use crate::domain::value::{Lines, Output};

pub fn register(registry: &mut FunctionRegistry) {
    let family = Family::Technical;

    define(
        registry,
        "MA",
        family,
        vec![Param::series("X"), Param::period("N")],
        "Simple moving average of X over N bars",
        |args| Ok(rolling(&args.series(0)?, args.period(1)?, mean)),
    );

    define(
        registry,
        "EMA",
        family,
        vec![Param::series("X"), Param::period("N")],
        "Exponential moving average, alpha = 2/(N+1)",
        |args| Ok(ema(&args.series(0)?, args.period(1)?)),
    );
    registry.register_alias("EXPMA", "EMA");

    define(
        registry,
        "SMA",
        family,
        vec![
            Param::series("X"),
            Param::period("N"),
            Param::scalar("M").with_default(1.0),
        ],
        "Smoothed moving average, alpha = M/N",
        |args| {
            let n = args.period(1)?;
            let m = args.scalar(2)?;
            if m <= 0.0 || m > n as f64 {
                return Err(args.domain(format!("M must be in (0, N], got {m}")));
            }
            Ok(sma(&args.series(0)?, n, m))
        },
    );

    define(
        registry,
        "WMA",
        family,
        vec![Param::series("X"), Param::period("N")],
        "Linearly weighted moving average",
        |args| Ok(wma(&args.series(0)?, args.period(1)?)),
    );

    registry.register(
        "MACD",
        FunctionDescriptor::new(
            "MACD",
            family,
            vec![
                Param::series("X"),
                Param::period("SHORT").with_default(DEFAULT_SHORT as f64),
                Param::period("LONG").with_default(DEFAULT_LONG as f64),
                Param::period("MID").with_default(DEFAULT_MID as f64),
            ],
            |args| {
                let out = macd(
                    &args.series(0)?,
                    args.period(1)?,
                    args.period(2)?,
                    args.period(3)?,
                );
                Ok(Output::Multiple(
                    Lines::new()
                        .with("DIF", out.dif)
                        .with("DEA", out.dea)
                        .with("HIST", out.hist),
                ))
            },
        )
        .describe("Moving average convergence divergence")
        .lines(&["DIF", "DEA", "HIST"]),
    );

    define(
        registry,
        "RSI",
        family,
        vec![Param::series("X"), Param::period("N").with_default(14.0)],
        "Relative strength index on a 0-100 scale",
        |args| Ok(rsi(&args.series(0)?, args.period(1)?)),
    );

    registry.register(
        "BOLL",
        FunctionDescriptor::new(
            "BOLL",
            family,
            vec![
                Param::series("X"),
                Param::period("N").with_default(DEFAULT_PERIOD as f64),
                Param::scalar("P").with_default(DEFAULT_MULTIPLIER),
            ],
            |args| {
                let out = bollinger(&args.series(0)?, args.period(1)?, args.scalar(2)?);
                Ok(Output::Multiple(
                    Lines::new()
                        .with("UPPER", out.upper)
                        .with("MID", out.middle)
                        .with("LOWER", out.lower),
                ))
            },
        )
        .describe("Bollinger bands, P sample deviations around MA(X, N)")
        .lines(&["UPPER", "MID", "LOWER"]),
    );

    registry.register(
        "KDJ",
        FunctionDescriptor::new(
            "KDJ",
            family,
            vec![
                Param::series("H"),
                Param::series("L"),
                Param::series("C"),
                Param::period("N").with_default(9.0),
                Param::period("M1").with_default(3.0),
                Param::period("M2").with_default(3.0),
            ],
            |args| {
                let out = kdj(
                    &args.series(0)?,
                    &args.series(1)?,
                    &args.series(2)?,
                    args.period(3)?,
                    args.period(4)?,
                    args.period(5)?,
                );
                Ok(Output::Multiple(
                    Lines::new().with("K", out.k).with("D", out.d).with("J", out.j),
                ))
            },
        )
        .describe("Stochastic oscillator")
        .lines(&["K", "D", "J"]),
    );

    define(
        registry,
        "ATR",
        family,
        vec![
            Param::series("H"),
            Param::series("L"),
            Param::series("C"),
            Param::period("N").with_default(14.0),
        ],
        "Average true range",
        |args| {
            Ok(atr(
                &args.series(0)?,
                &args.series(1)?,
                &args.series(2)?,
                args.period(3)?,
            ))
        },
    );
}

#[cfg(test)]
mod tests {
    use crate::domain::functions::test_support::{assert_series, call, call_single, scalar, series};
    use crate::domain::error::RuntimeError;
    use crate::domain::registry::{Args, FunctionRegistry};
    use crate::domain::value::Output;

    const NAN: f64 = f64::NAN;

    #[test]
    fn ma_warmup_then_mean() {
        let out = call_single(
            "MA",
            5,
            vec![series(&[10.0, 11.0, 12.0, 13.0, 14.0]), scalar(5.0)],
        );
        assert_series(&out, &[NAN, NAN, NAN, NAN, 12.0]);
    }

    #[test]
    fn ma_broadcasts_scalar_input() {
        let out = call_single("MA", 3, vec![scalar(4.0), scalar(2.0)]);
        assert_series(&out, &[NAN, 4.0, 4.0]);
    }

    #[test]
    fn expma_is_ema() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(registry.lookup("EXPMA").unwrap().name, "EMA");
    }

    #[test]
    fn sma_rejects_weight_above_period() {
        let registry = FunctionRegistry::with_builtins();
        let sma = registry.lookup("SMA").unwrap();
        let args = Args::new(
            "SMA",
            2,
            vec![series(&[1.0, 2.0]), scalar(3.0), scalar(4.0)],
        );
        assert!(matches!(
            sma.call(&args),
            Err(RuntimeError::Domain { .. })
        ));
    }

    #[test]
    fn macd_returns_three_lines() {
        let prices: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let out = call(
            "MACD",
            30,
            vec![series(&prices), scalar(12.0), scalar(26.0), scalar(9.0)],
        );
        match out {
            Output::Multiple(lines) => {
                assert_eq!(lines.names(), vec!["DIF", "DEA", "HIST"]);
                assert!(lines.get("DIF").unwrap()[29] > 0.0);
            }
            Output::Single(_) => panic!("expected lines"),
        }
    }

    #[test]
    fn boll_mid_is_ma() {
        let prices = [1.0, 2.0, 3.0, 4.0];
        let out = call("BOLL", 4, vec![series(&prices), scalar(3.0), scalar(2.0)]);
        assert_series(out.line("MID").unwrap(), &[NAN, NAN, 2.0, 3.0]);
        assert_series(out.line("UPPER").unwrap(), &[NAN, NAN, 4.0, 5.0]);
    }

    #[test]
    fn descriptors_advertise_lines() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(
            registry.lookup("KDJ").unwrap().signature(),
            "KDJ(H, L, C, N=9, M1=3, M2=3) -> K, D, J"
        );
    }
}
