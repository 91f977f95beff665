//! Trellis CLI
//!
//! Checks grammar files and prints the tables built from them.

use clap::Parser;
use miette::{IntoDiagnostic, WrapErr, miette};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use trellis::BuildOptions;
use trellis::error::diagnostics::render;
use trellis::grammar::dsl::parse_grammar;
use trellis_tools::cli::{Cli, Commands, OutputFormat};
use trellis_tools::report::{Checked, check};
use trellis_tools::{rules_dot, table_dot};

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { input, build } => {
            let source = read(&input)?;
            let checked = checked(&input, &source, &build.into())?;
            if let Some(dump) = checked.factory.table_dump() {
                println!(
                    "{}: ok, {} with {} states",
                    input.display(),
                    dump.kind,
                    dump.states.len()
                );
            }
        }
        Commands::Tables {
            input,
            output,
            format,
            build,
        } => {
            let source = read(&input)?;
            let checked = checked(&input, &source, &build.into())?;
            let Some(dump) = checked.factory.table_dump() else {
                return Err(miette!("no tables were built for {}", input.display()));
            };
            let content = match format {
                OutputFormat::Text => dump.to_string(),
                OutputFormat::Json => serde_json::to_string_pretty(dump).into_diagnostic()?,
                OutputFormat::Dot => table_dot(dump),
            };
            write_output(output.as_deref(), &content)?;
        }
        Commands::Rules { input, output } => {
            let source = read(&input)?;
            let builder = parse_grammar(&source)
                .map_err(|error| miette!("{}", render(&error, &source)))?;
            let (grammar, diagnostics) = builder.build(false)?;
            for diagnostic in &diagnostics {
                tracing::warn!(%diagnostic, "grammar has problems");
            }
            write_output(output.as_deref(), &rules_dot(&grammar))?;
        }
    }
    Ok(())
}

fn read(path: &Path) -> miette::Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

/// Check the grammar, printing every problem; an error if there were any.
fn checked(path: &Path, source: &str, options: &BuildOptions) -> miette::Result<Checked> {
    let checked = check(source, options, None)?;
    if checked.is_ok() {
        return Ok(checked);
    }
    for problem in &checked.problems {
        eprintln!("{}: {problem}", path.display());
    }
    Err(miette!(
        "{} rejected with {} problem(s)",
        path.display(),
        checked.problems.len()
    ))
}

fn write_output(path: Option<&Path>, content: &str) -> miette::Result<()> {
    match path {
        Some(path) => fs::write(path, content)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display())),
        None => std::io::stdout().write_all(content.as_bytes()).into_diagnostic(),
    }
}
