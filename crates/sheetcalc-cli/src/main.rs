//! sheetcalc CLI - evaluate spreadsheet formulas from the command line

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use sheetcalc::prelude::*;
use sheetcalc::FunctionRepository;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetcalc")]
#[command(author, version, about = "Spreadsheet formula evaluation tool")]
struct Cli {
    /// Increase log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula against an ad-hoc sheet
    #[command(alias = "e")]
    Eval {
        /// Formula text, with or without the leading '='
        formula: String,

        /// Cell assignments such as A1=5, B2=hello or C3==A1*2 (repeatable)
        #[arg(short, long = "set", value_parser = parse_assignment)]
        assignments: Vec<Assignment>,

        /// Name of the sheet the formula runs on
        #[arg(long, default_value = "Sheet1")]
        sheet: String,

        /// Cell the formula is evaluated in (affects ROW(), COLUMN())
        #[arg(short, long, default_value = "A1")]
        cell: String,

        /// Maximum nesting depth before evaluation gives up
        #[arg(long, default_value_t = default_max_depth())]
        max_depth: usize,

        /// Print the result's type tag next to the value
        #[arg(short = 't', long)]
        show_type: bool,
    },

    /// Print the tokens of a formula
    Tokens {
        /// Formula text
        formula: String,
    },

    /// List the built-in functions
    Functions,
}

/// A cell assignment given on the command line
#[derive(Debug, Clone)]
struct Assignment {
    address: String,
    value: String,
}

fn parse_assignment(text: &str) -> std::result::Result<Assignment, String> {
    let (address, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected ADDRESS=VALUE, got '{}'", text))?;
    CellAddress::parse(address.trim()).map_err(|e| e.to_string())?;
    Ok(Assignment {
        address: address.trim().to_string(),
        value: value.to_string(),
    })
}

fn default_max_depth() -> usize {
    ParsingConfiguration::default().max_nesting_depth
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Eval {
            formula,
            assignments,
            sheet,
            cell,
            max_depth,
            show_type,
        } => eval(&formula, &assignments, &sheet, &cell, max_depth, show_type),
        Commands::Tokens { formula } => print_tokens(&formula),
        Commands::Functions => list_functions(),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn eval(
    formula: &str,
    assignments: &[Assignment],
    sheet_name: &str,
    cell: &str,
    max_depth: usize,
    show_type: bool,
) -> Result<()> {
    let mut workbook = Workbook::new();
    if sheet_name != "Sheet1" {
        workbook
            .rename_worksheet(0, sheet_name)
            .with_context(|| format!("Invalid sheet name '{}'", sheet_name))?;
    }

    let sheet = workbook
        .worksheet_mut(0)
        .context("Workbook has no worksheet")?;
    for assignment in assignments {
        apply_assignment(sheet, assignment)?;
    }

    let options = EvaluationOptions::default().with_configuration(
        ParsingConfiguration::default().with_max_nesting_depth(max_depth),
    );
    // Formula cells are evaluated top to bottom so later cells see earlier results
    workbook
        .evaluate_sheet(sheet_name, &options)
        .context("Failed to evaluate assigned formulas")?;

    let result = workbook
        .evaluate_formula_at(sheet_name, cell, formula, &options)
        .with_context(|| format!("Failed to evaluate '{}'", formula))?;

    let mut stdout = io::stdout().lock();
    if show_type {
        writeln!(stdout, "{}\t{:?}", render(&result), result.data_type)?;
    } else {
        writeln!(stdout, "{}", render(&result))?;
    }
    Ok(())
}

fn apply_assignment(sheet: &mut Worksheet, assignment: &Assignment) -> Result<()> {
    let Assignment { address, value } = assignment;
    let context = || format!("Failed to set {}", address);
    if value.starts_with('=') {
        return sheet.set_cell_formula(address, value).with_context(context);
    }
    let trimmed = value.trim();
    if let Ok(number) = trimmed.parse::<f64>() {
        sheet.set_cell_value(address, number).with_context(context)
    } else if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
        sheet
            .set_cell_value(address, trimmed.eq_ignore_ascii_case("true"))
            .with_context(context)
    } else {
        sheet.set_cell_value(address, value.as_str()).with_context(context)
    }
}

fn render(result: &CompileResult) -> String {
    match &result.value {
        Value::Range(address) => address.to_string(),
        _ => result.to_string(),
    }
}

fn print_tokens(formula: &str) -> Result<()> {
    let tokens = FormulaParser::new().tokenize(formula);
    if tokens.is_empty() {
        bail!("Formula '{}' has no tokens", formula);
    }
    let mut stdout = io::stdout().lock();
    for token in tokens {
        writeln!(stdout, "{:<18} {}", format!("{:?}", token.kind), token.text)?;
    }
    Ok(())
}

fn list_functions() -> Result<()> {
    let repository = FunctionRepository::global();
    let mut stdout = io::stdout().lock();
    for name in repository.names() {
        let volatile = repository.get(name).is_some_and(|f| f.is_volatile());
        if volatile {
            writeln!(stdout, "{} (volatile)", name.to_uppercase())?;
        } else {
            writeln!(stdout, "{}", name.to_uppercase())?;
        }
    }
    writeln!(stdout, "{} functions", repository.len())?;
    Ok(())
}
