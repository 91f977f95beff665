//! Grammar checking with readable diagnostics

use std::io::Write;
use std::sync::{Arc, Mutex};
use trellis::error::diagnostics::{did_you_mean, render};
use trellis::grammar::dsl::parse_grammar;
use trellis::{BuildError, BuildOptions, GrammarBuilder, GrammarError, ParserFactory};

/// Result of checking one grammar.
///
/// `problems` is empty when the factory was initialized.
#[derive(Debug)]
pub struct Checked {
    pub factory: ParserFactory,
    pub problems: Vec<String>,
}

impl Checked {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Read, validate and build `source`.
///
/// Diagnostics come back rendered with a source excerpt and, for unknown
/// names, a suggestion. The table listing goes to `table_output` once the
/// grammar has been validated.
///
/// # Errors
///
/// Only the hard errors of [`ParserFactory::initialize_from_builder`].
pub fn check(
    source: &str,
    options: &BuildOptions,
    table_output: Option<&mut dyn Write>,
) -> Result<Checked, BuildError> {
    let mut factory = ParserFactory::new();
    let builder = match parse_grammar(source) {
        Ok(builder) => builder,
        Err(error) => {
            return Ok(Checked {
                factory,
                problems: vec![render(&error, source)],
            });
        }
    };

    let (_, diagnostics) = builder.clone().build(options.error_token_support)?;
    if !diagnostics.is_empty() {
        let problems = diagnostics
            .iter()
            .map(|error| describe(error, source, &builder))
            .collect();
        return Ok(Checked { factory, problems });
    }

    let collected = Collect::default();
    factory.set_error_output(Some(Box::new(collected.clone())));
    let first = factory.initialize_from_builder(builder, table_output, options)?;
    factory.set_error_output(None);
    let mut problems: Vec<String> = collected.lines();
    if problems.is_empty() && !first.is_empty() {
        problems.push(first);
    }
    tracing::debug!(problems = problems.len(), "grammar checked");
    Ok(Checked { factory, problems })
}

/// A diagnostic with its excerpt and a "did you mean" hint where one fits.
#[must_use]
pub fn describe(error: &GrammarError, source: &str, builder: &GrammarBuilder) -> String {
    let mut text = render(error, source);
    let suggestion = match error {
        GrammarError::UndefinedSymbol { name, .. } => did_you_mean(
            name,
            builder
                .events
                .iter()
                .map(|event| event.name.as_str())
                .chain(builder.rules.iter().map(|rule| rule.name.as_str())),
        ),
        GrammarError::UndefinedGuard { name, .. } => {
            did_you_mean(name, builder.guards.iter().map(|guard| guard.name.as_str()))
        }
        _ => None,
    };
    if let Some(suggestion) = suggestion {
        text.push_str(&format!("\n  help: did you mean '{suggestion}'?"));
    }
    text
}

/// Error output shared with the factory
#[derive(Clone, Default)]
struct Collect(Arc<Mutex<Vec<u8>>>);

impl Collect {
    fn lines(&self) -> Vec<String> {
        let Ok(bytes) = self.0.lock() else {
            return Vec::new();
        };
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Write for Collect {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
