//! Time-shift and stateful scan functions.
//!
//! Each scan is a single pass with explicit state; none of these reduce to a rolling
//! window over independent positions.

use super::define;
use crate::domain::registry::{Family, FunctionRegistry, Param};
use crate::domain::series::{Series, bool_value, shift, truthy};

/// 1 where `a` moves from at-or-below `b` to strictly above it.
pub fn cross(a: &[f64], b: &[f64]) -> Series {
    let len = a.len().min(b.len());
    let mut out = vec![0.0; len];
    for i in 1..len {
        let (pa, pb, ca, cb) = (a[i - 1], b[i - 1], a[i], b[i]);
        if pa.is_nan() || pb.is_nan() || ca.is_nan() || cb.is_nan() {
            continue;
        }
        out[i] = bool_value(pa <= pb && ca > cb);
    }
    out
}

pub fn bars_last(cond: &[f64]) -> Series {
    let mut last: Option<usize> = None;
    cond.iter()
        .enumerate()
        .map(|(i, &c)| {
            if truthy(c) {
                last = Some(i);
            }
            last.map_or(f64::NAN, |l| (i - l) as f64)
        })
        .collect()
}

pub fn bars_last_count(cond: &[f64]) -> Series {
    let mut run = 0usize;
    cond.iter()
        .map(|&c| {
            run = if truthy(c) { run + 1 } else { 0 };
            run as f64
        })
        .collect()
}

pub fn bars_count(values: &[f64]) -> Series {
    let mut defined = 0usize;
    values
        .iter()
        .map(|v| {
            if !v.is_nan() {
                defined += 1;
            }
            defined as f64
        })
        .collect()
}

pub fn since(cond: &[f64]) -> Series {
    let mut last: Option<usize> = None;
    cond.iter()
        .enumerate()
        .map(|(i, &c)| {
            if truthy(c) {
                last = Some(i);
            }
            last.map_or(0.0, |l| (i - l) as f64)
        })
        .collect()
}

pub fn filter(cond: &[f64], n: usize) -> Series {
    let mut accepted: Option<usize> = None;
    cond.iter()
        .enumerate()
        .map(|(i, &c)| {
            let open = accepted.is_none_or(|a| i - a >= n);
            if truthy(c) && open {
                accepted = Some(i);
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

pub fn backset(cond: &[f64], n: usize) -> Series {
    let mut out = vec![0.0; cond.len()];
    for (i, &c) in cond.iter().enumerate() {
        if truthy(c) {
            let start = (i + 1).saturating_sub(n);
            out[start..=i].fill(1.0);
        }
    }
    out
}

pub fn long_cross(a: &[f64], b: &[f64], n: usize) -> Series {
    let crosses = cross(a, b);
    let mut recent: Option<usize> = None;
    crosses
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if c == 1.0 {
                recent = Some(i);
            }
            bool_value(recent.is_some_and(|r| i - r < n))
        })
        .collect()
}

pub fn last(cond: &[f64], min_run: usize, max_run: usize) -> Series {
    bars_last_count(cond)
        .into_iter()
        .map(|run| {
            let run = run as usize;
            bool_value(run >= min_run && run <= max_run && run > 0)
        })
        .collect()
}

pub fn register(registry: &mut FunctionRegistry) {
    let family = Family::Temporal;
    let cond_only = || vec![Param::series("COND")];

    define(
        registry,
        "REF",
        family,
        vec![Param::series("X"), Param::offset("N")],
        "X as of N bars ago",
        |args| Ok(shift(&args.series(0)?, args.period(1)?)),
    );

    define(
        registry,
        "BARSLAST",
        family,
        cond_only(),
        "Bars since COND last held; undefined before the first occurrence",
        |args| Ok(bars_last(&args.series(0)?)),
    );

    define(
        registry,
        "BARSLASTCOUNT",
        family,
        cond_only(),
        "Length of the run of consecutive bars where COND holds",
        |args| Ok(bars_last_count(&args.series(0)?)),
    );

    define(
        registry,
        "SINCE",
        family,
        cond_only(),
        "Bars since COND last held; 0 before the first occurrence",
        |args| Ok(since(&args.series(0)?)),
    );

    define(
        registry,
        "BARSCOUNT",
        family,
        vec![Param::series("X")],
        "Running count of bars where X is defined",
        |args| Ok(bars_count(&args.series(0)?)),
    );

    define(
        registry,
        "CROSS",
        family,
        vec![Param::series("A"), Param::series("B")],
        "1 where A crosses above B",
        |args| Ok(cross(&args.series(0)?, &args.series(1)?)),
    );

    define(
        registry,
        "LONGCROSS",
        family,
        vec![Param::series("A"), Param::series("B"), Param::period("N")],
        "1 where A crossed above B within the last N bars",
        |args| Ok(long_cross(&args.series(0)?, &args.series(1)?, args.period(2)?)),
    );

    define(
        registry,
        "FILTER",
        family,
        vec![Param::series("COND"), Param::period("N")],
        "Keeps a signal and suppresses the following N-1 bars",
        |args| Ok(filter(&args.series(0)?, args.period(1)?)),
    );

    define(
        registry,
        "BACKSET",
        family,
        vec![Param::series("COND"), Param::period("N")],
        "Marks the N bars ending at each bar where COND holds",
        |args| Ok(backset(&args.series(0)?, args.period(1)?)),
    );

    define(
        registry,
        "LAST",
        family,
        vec![
            Param::series("COND"),
            Param::period("N1"),
            Param::period("N2"),
        ],
        "1 where COND has held for between N1 and N2 consecutive bars",
        |args| {
            let (min_run, max_run) = (args.period(1)?, args.period(2)?);
            if min_run > max_run {
                return Err(args.domain(format!("N1 ({min_run}) exceeds N2 ({max_run})")));
            }
            Ok(last(&args.series(0)?, min_run, max_run))
        },
    );
}
