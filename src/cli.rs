//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    DEFAULT_PRECISION, MAX_PRECISION, config_date, validate_config,
};
use crate::domain::context::Context;
use crate::domain::error::{FormulaError, TdxError};
use crate::domain::eval::evaluate;
use crate::domain::parser;
use crate::domain::registry::{self, Family};
use crate::domain::value::Output;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "tdxformula", about = "Evaluate TDX-style formulas over OHLCV data")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a formula over one code's bars and write CSV
    Eval(EvalArgs),
    /// Check that formulas parse
    Validate {
        #[arg(short, long, required_unless_present_any = ["formula", "formula_file"])]
        config: Option<PathBuf>,
        #[arg(short, long, conflicts_with = "formula_file")]
        formula: Option<String>,
        #[arg(long)]
        formula_file: Option<PathBuf>,
        /// Print the normalised formula
        #[arg(long)]
        print: bool,
    },
    /// List registered functions
    Functions {
        #[arg(long, value_parser = parse_family)]
        family: Option<Family>,
    },
    /// List codes available in the data directory
    Codes {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
#[group(required = true, multiple = false)]
pub struct FormulaSource {
    /// Formula text
    #[arg(short, long)]
    pub formula: Option<String>,
    /// File containing the formula (UTF-8)
    #[arg(long)]
    pub formula_file: Option<PathBuf>,
    /// Name of a formula in the config [formulas] section
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EvalArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub source: FormulaSource,
    /// Directory of <CODE>.csv files
    #[arg(long)]
    pub data: Option<PathBuf>,
    #[arg(long)]
    pub code: Option<String>,
    #[arg(long)]
    pub start: Option<NaiveDate>,
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Only write the last N rows
    #[arg(long)]
    pub tail: Option<usize>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=12))]
    pub precision: Option<u8>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Fully resolved inputs of one `eval` run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalSettings {
    pub formula: String,
    pub data_dir: PathBuf,
    pub code: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub tail: usize,
    pub precision: usize,
}

fn parse_family(value: &str) -> Result<Family, String> {
    Family::parse(value).ok_or_else(|| {
        let known: Vec<&str> = Family::ALL.iter().map(|f| f.as_str()).collect();
        format!("unknown family '{value}' (expected one of: {})", known.join(", "))
    })
}

/// Installs the stderr log subscriber. `RUST_LOG` takes precedence over `verbosity`.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .try_init()
        .ok();
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);
    match cli.command {
        Command::Eval(args) => run_eval(&args),
        Command::Validate {
            config,
            formula,
            formula_file,
            print,
        } => run_validate(
            config.as_ref(),
            formula.as_deref(),
            formula_file.as_deref(),
            print,
        ),
        Command::Functions { family } => run_functions(family),
        Command::Codes { config, data } => run_codes(config.as_ref(), data.as_ref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    debug!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TdxError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Prints `err` (with a caret diagnostic for formula syntax errors) and maps it to an exit code.
fn report(err: &TdxError, formula: Option<&str>) -> ExitCode {
    match (err, formula) {
        (TdxError::Formula(e), Some(text)) => eprintln!("error: {}", e.display_with_context(text)),
        _ => eprintln!("error: {err}"),
    }
    err.into()
}

/// Formula text from exactly one of the sources.
pub fn resolve_formula(
    source: &FormulaSource,
    config: Option<&dyn ConfigPort>,
) -> Result<String, TdxError> {
    if let Some(text) = &source.formula {
        return Ok(text.clone());
    }
    if let Some(path) = &source.formula_file {
        return read_formula_file(path);
    }
    let name = source.name.as_deref().unwrap_or_default();
    config
        .and_then(|c| c.get_string("formulas", name))
        .ok_or_else(|| TdxError::ConfigMissing {
            section: "formulas".to_string(),
            key: name.to_string(),
        })
}

fn read_formula_file(path: &Path) -> Result<String, TdxError> {
    debug!(path = %path.display(), "reading formula file");
    Ok(fs::read_to_string(path)?)
}

/// Merges flags over config values. Flags win.
pub fn build_eval_settings(
    args: &EvalArgs,
    config: Option<&dyn ConfigPort>,
) -> Result<EvalSettings, TdxError> {
    let formula = resolve_formula(&args.source, config)?;
    let from_config = |key: &str| config.and_then(|c| c.get_string("data", key));

    let data_dir = args
        .data
        .clone()
        .or_else(|| from_config("dir").map(PathBuf::from))
        .ok_or_else(|| TdxError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        })?;
    let code = args
        .code
        .clone()
        .or_else(|| from_config("code"))
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| TdxError::ConfigMissing {
            section: "data".to_string(),
            key: "code".to_string(),
        })?;

    let start_date = match (args.start, config) {
        (Some(d), _) => Some(d),
        (None, Some(c)) => config_date(c, "start_date")?,
        (None, None) => None,
    };
    let end_date = match (args.end, config) {
        (Some(d), _) => Some(d),
        (None, Some(c)) => config_date(c, "end_date")?,
        (None, None) => None,
    };

    let tail = match args.tail {
        Some(t) => t,
        None => config.map_or(0, |c| c.get_int("output", "tail", 0).max(0) as usize),
    };
    let precision = match args.precision {
        Some(p) => p as usize,
        None => config.map_or(DEFAULT_PRECISION, |c| {
            c.get_int("output", "precision", DEFAULT_PRECISION)
                .clamp(0, MAX_PRECISION)
        }) as usize,
    };

    Ok(EvalSettings {
        formula,
        data_dir,
        code: code.trim().to_string(),
        start_date,
        end_date,
        tail,
        precision,
    })
}

/// Parses, loads bars, evaluates and writes CSV. Returns the number of rows written.
pub fn run_eval_pipeline(
    data_port: &dyn DataPort,
    settings: &EvalSettings,
    out: &mut dyn Write,
) -> Result<usize, TdxError> {
    let program = parser::parse(&settings.formula)?;
    debug!(statements = program.statements.len(), "formula parsed");

    let bars = data_port.fetch_ohlcv(&settings.code, settings.start_date, settings.end_date)?;
    if bars.is_empty() {
        return Err(TdxError::NoData {
            code: settings.code.clone(),
        });
    }
    info!(code = %settings.code, bars = bars.len(), "loaded bars");

    let context = Context::from_bars(&bars);
    let output = evaluate(&program, &context).map_err(FormulaError::from)?;

    let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
    write_csv(&dates, &output, settings.tail, settings.precision, out)
}

/// Writes `date,<columns>` rows; an undefined value is an empty cell.
pub fn write_csv(
    dates: &[NaiveDate],
    output: &Output,
    tail: usize,
    precision: usize,
    out: &mut dyn Write,
) -> Result<usize, TdxError> {
    let columns = output.columns();
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["date".to_string()];
    header.extend(columns.iter().map(|(name, _)| name.clone()));
    writer.write_record(&header).map_err(io::Error::from)?;

    let first = if tail == 0 {
        0
    } else {
        dates.len().saturating_sub(tail)
    };
    for (i, date) in dates.iter().enumerate().skip(first) {
        let mut row = vec![date.format("%Y-%m-%d").to_string()];
        for (_, series) in &columns {
            row.push(format_value(series[i], precision));
        }
        writer.write_record(&row).map_err(io::Error::from)?;
    }
    writer.flush()?;
    Ok(dates.len() - first)
}

fn format_value(value: f64, precision: usize) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{value:.precision$}")
    }
}

fn run_eval(args: &EvalArgs) -> ExitCode {
    let config = match args.config.as_ref().map(load_config).transpose() {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Some(c) = &config {
        if let Err(e) = validate_config(c) {
            return report(&e, None);
        }
    }

    let settings = match build_eval_settings(args, config.as_ref().map(|c| c as &dyn ConfigPort)) {
        Ok(s) => s,
        Err(e) => return report(&e, None),
    };
    info!(code = %settings.code, dir = %settings.data_dir.display(), "evaluating formula");

    let adapter = CsvAdapter::new(settings.data_dir.clone());
    let result = match &args.output {
        Some(path) => fs::File::create(path)
            .map_err(TdxError::from)
            .and_then(|mut file| run_eval_pipeline(&adapter, &settings, &mut file)),
        None => run_eval_pipeline(&adapter, &settings, &mut io::stdout().lock()),
    };

    match result {
        Ok(rows) => {
            info!(rows, "evaluation complete");
            ExitCode::SUCCESS
        }
        Err(e) => report(&e, Some(&settings.formula)),
    }
}

/// Outcome of checking one formula: its normalised text, or the diagnostic.
pub fn check_formula(text: &str) -> Result<String, String> {
    parser::parse(text)
        .map(|program| program.to_string())
        .map_err(|e| e.display_with_context(text))
}

fn run_validate(
    config_path: Option<&PathBuf>,
    formula: Option<&str>,
    formula_file: Option<&Path>,
    print: bool,
) -> ExitCode {
    let formulas: Vec<(String, String)> = match (formula, formula_file) {
        (Some(text), _) => vec![("formula".to_string(), text.to_string())],
        (None, Some(path)) => match read_formula_file(path) {
            Ok(text) => vec![(path.display().to_string(), text)],
            Err(e) => return report(&e, None),
        },
        (None, None) => {
            let Some(path) = config_path else {
                eprintln!("error: a formula or --config is required");
                return ExitCode::from(2);
            };
            let config = match load_config(path) {
                Ok(c) => c,
                Err(code) => return code,
            };
            config.get_section("formulas")
        }
    };

    if formulas.is_empty() {
        let err = TdxError::ConfigMissing {
            section: "formulas".to_string(),
            key: "<any>".to_string(),
        };
        return report(&err, None);
    }

    let mut failed = 0;
    for (name, text) in &formulas {
        match check_formula(text) {
            Ok(normalised) => {
                println!("{name}: ok");
                if print {
                    println!("{normalised}");
                }
            }
            Err(diagnostic) => {
                failed += 1;
                println!("{name}: error");
                eprintln!("{diagnostic}");
            }
        }
    }

    if failed > 0 {
        eprintln!("{failed} of {} formulas failed to parse", formulas.len());
        return ExitCode::from(4);
    }
    ExitCode::SUCCESS
}

/// One line per function: signature, family, description and aliases.
pub fn describe_functions(family: Option<Family>) -> Vec<String> {
    let registry = registry::registry();
    let functions = match family {
        Some(f) => registry.list_family(f),
        None => registry.list_all(),
    };
    functions
        .iter()
        .map(|d| {
            let mut line = format!("{:<44} [{}] {}", d.signature(), d.family, d.description);
            let aliases = registry.aliases_of(&d.name);
            if !aliases.is_empty() {
                line.push_str(&format!(" (alias: {})", aliases.join(", ")));
            }
            line
        })
        .collect()
}

fn run_functions(family: Option<Family>) -> ExitCode {
    let lines = describe_functions(family);
    for line in &lines {
        println!("{line}");
    }
    info!(count = lines.len(), "functions listed");
    ExitCode::SUCCESS
}

fn run_codes(config_path: Option<&PathBuf>, data: Option<&PathBuf>) -> ExitCode {
    let config = match config_path.map(load_config).transpose() {
        Ok(c) => c,
        Err(code) => return code,
    };

    let dir = data
        .cloned()
        .or_else(|| config.as_ref().and_then(|c| c.get_string("data", "dir")).map(PathBuf::from));
    let Some(dir) = dir else {
        let err = TdxError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        };
        return report(&err, None);
    };

    let adapter = CsvAdapter::new(dir);
    match adapter.list_codes() {
        Ok(codes) => {
            for code in &codes {
                println!("{code}");
            }
            info!(count = codes.len(), "codes found");
            ExitCode::SUCCESS
        }
        Err(e) => report(&e, None),
    }
}
