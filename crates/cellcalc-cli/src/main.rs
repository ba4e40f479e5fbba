//! cellcalc CLI - evaluate and inspect spreadsheet formulas

use anyhow::{bail, Context, Result};
use cellcalc::prelude::*;
use cellcalc::tokenize;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cellcalc")]
#[command(author, version, about = "Spreadsheet formula calculator")]
struct Cli {
    /// Log engine activity to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula against a scratch worksheet
    Eval {
        /// Formula to evaluate (leading '=' optional)
        formula: String,

        /// Fill a cell before evaluating, e.g. `A1=42` or `B2==A1*2`
        #[arg(short = 's', long = "set", value_name = "CELL=CONTENT")]
        cells: Vec<String>,

        /// Resolve circular references by iteration
        #[arg(short, long)]
        iterative: bool,
    },

    /// Print the tokens of a formula
    Tokens {
        formula: String,
    },

    /// Print the compiled postfix program of a formula
    Rpn {
        formula: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Eval {
            formula,
            cells,
            iterative,
        } => eval(&formula, &cells, iterative),
        Commands::Tokens { formula } => show_tokens(&formula),
        Commands::Rpn { formula } => show_rpn(&formula),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "cellcalc=debug,cellcalc_formula=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn eval(formula: &str, cells: &[String], iterative: bool) -> Result<()> {
    let options = CalculationOptions {
        iterative,
        ..Default::default()
    };
    let mut sheet = Spreadsheet::new().with_options(options);

    for assignment in cells {
        let (address, content) = assignment
            .split_once('=')
            .with_context(|| format!("Expected CELL=CONTENT, got '{}'", assignment))?;
        let address = address.trim();
        if content.starts_with('=') {
            sheet
                .set_cell_formula(0, address, content)
                .with_context(|| format!("Failed to set '{}'", address))?;
        } else {
            sheet
                .set_cell_value(0, address, literal(content))
                .with_context(|| format!("Failed to set '{}'", address))?;
        }
        debug!(cell = address, content, "cell set");
    }

    let value = sheet
        .evaluate(0, formula)
        .with_context(|| format!("Failed to compile '{}'", formula))?;
    println!("{}", value);

    if !sheet.is_converged() {
        bail!("circular reference did not converge");
    }
    Ok(())
}

/// Literal cell content typed on the command line
fn literal(content: &str) -> CellValue {
    let trimmed = content.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        return CellValue::Number(n);
    }
    if trimmed.eq_ignore_ascii_case("TRUE") {
        return CellValue::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("FALSE") {
        return CellValue::Boolean(false);
    }
    if let Some(error) = CellError::parse(trimmed) {
        return CellValue::Error(error);
    }
    CellValue::from(content)
}

fn show_tokens(formula: &str) -> Result<()> {
    let tokens = tokenize(formula).with_context(|| format!("Failed to tokenize '{}'", formula))?;
    for token in tokens {
        println!("{:>4}  {:<16} {}", token.offset, format!("{:?}", token.kind), token.text);
    }
    Ok(())
}

fn show_rpn(formula: &str) -> Result<()> {
    let program = Program::compile(formula).with_context(|| format!("Failed to compile '{}'", formula))?;
    for (i, instruction) in program.instructions().iter().enumerate() {
        println!("{:>4}  {}", i, instruction);
    }
    if program.is_volatile() {
        println!("(volatile)");
    }
    Ok(())
}
