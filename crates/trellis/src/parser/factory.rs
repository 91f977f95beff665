//! Grammar to tables to running instances.

use crate::backend::dump::TableDump;
use crate::backend::fsm::FsmTable;
use crate::backend::lr::{ParseTable, build_tables};
use crate::error::{BindError, BuildError, GrammarError};
use crate::grammar::dsl::parse_grammar;
use crate::grammar::{Grammar, GrammarBuilder, GrammarKind, TokenMap};
use crate::parser::bindings::Bindings;
use crate::parser::instance::{Instance, Parser, StateMachine};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// How tables are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct BuildOptions {
    /// Merge LR(1) states with identical cores
    pub compress_states: bool,
    /// Reserve the `error` terminal for error recovery productions
    pub error_token_support: bool,
    /// Keep conflicts and fork at run time instead of rejecting the grammar
    pub use_glr: bool,
}

impl BuildOptions {
    #[must_use]
    pub fn glr() -> Self {
        Self {
            use_glr: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_compression(mut self, compress: bool) -> Self {
        self.compress_states = compress;
        self
    }

    #[must_use]
    pub const fn with_error_token(mut self, error_token: bool) -> Self {
        self.error_token_support = error_token;
        self
    }
}

#[derive(Debug, Clone)]
enum Tables {
    Parser(Arc<ParseTable>),
    StateMachine(Arc<FsmTable>),
}

/// Builds tables from a grammar and creates instances that run them.
///
/// ```rust
/// use trellis::parser::{Bindings, BuildOptions, ParserFactory, ParseToken};
///
/// let mut factory = ParserFactory::new();
/// let error = factory
///     .initialize_from_grammar(
///         "events { NUM<i64>; PLUS; }
///          grammar(Sum) { Sum : Sum PLUS NUM { add($0, $2) } | NUM ; }",
///         None,
///         &BuildOptions::default(),
///     )
///     .unwrap();
/// assert_eq!(error, "");
///
/// let bindings = Bindings::<i64>::new().action("add", |tokens| {
///     Ok(tokens.iter().filter_map(|token| token.value().copied()).sum())
/// });
/// let mut parser = factory.create_parser(bindings).unwrap();
/// let num = parser.tokens().id("NUM").unwrap();
/// let plus = parser.tokens().id("PLUS").unwrap();
/// let input = [
///     ParseToken::with_value(num, 1),
///     ParseToken::terminal(plus, None),
///     ParseToken::with_value(num, 2),
/// ];
/// assert!(parser.parse(input).unwrap());
/// assert_eq!(parser.value(), Some(&3));
/// ```
#[derive(Default)]
pub struct ParserFactory {
    grammar: Option<Arc<Grammar>>,
    tables: Option<Tables>,
    dump: Option<TableDump>,
    error_output: Option<Box<dyn Write + Send>>,
}

impl fmt::Debug for ParserFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserFactory")
            .field("kind", &self.grammar.as_ref().map(|grammar| grammar.kind()))
            .field("tables", &self.tables.is_some())
            .finish_non_exhaustive()
    }
}

impl ParserFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Send every diagnostic line to `output`
    pub fn set_error_output(&mut self, output: Option<Box<dyn Write + Send>>) {
        self.error_output = output;
    }

    /// Read grammar text and build its tables.
    ///
    /// Returns the first diagnostic as text, or an empty string on success.
    /// All diagnostics go to the error output. When `table_output` is given
    /// the tables are written to it.
    ///
    /// # Errors
    ///
    /// Fails on hard errors only: too many guard variables, or a failed write
    /// to `table_output`.
    pub fn initialize_from_grammar(
        &mut self,
        source: &str,
        table_output: Option<&mut dyn Write>,
        options: &BuildOptions,
    ) -> Result<String, BuildError> {
        match parse_grammar(source) {
            Ok(builder) => self.initialize_from_builder(builder, table_output, options),
            Err(error) => {
                self.clear();
                self.report(std::slice::from_ref(&error));
                Ok(error.to_string())
            }
        }
    }

    /// Build tables for a programmatically assembled grammar.
    ///
    /// Same contract as [`initialize_from_grammar`](Self::initialize_from_grammar).
    ///
    /// # Errors
    ///
    /// Fails on hard errors only: too many guard variables, or a failed write
    /// to `table_output`.
    pub fn initialize_from_builder(
        &mut self,
        builder: GrammarBuilder,
        table_output: Option<&mut dyn Write>,
        options: &BuildOptions,
    ) -> Result<String, BuildError> {
        self.clear();
        let (grammar, diagnostics) = builder.build(options.error_token_support)?;
        if !diagnostics.is_empty() {
            return Ok(self.report(&diagnostics));
        }

        let (tables, dump, conflicts) = match grammar.kind() {
            GrammarKind::Parser => {
                let built = build_tables(&grammar, options.compress_states, options.use_glr)?;
                let dump = built.table.dump(&grammar, &built.automaton);
                let conflicts = if options.use_glr { Vec::new() } else { built.conflicts };
                (Tables::Parser(Arc::new(built.table)), dump, conflicts)
            }
            GrammarKind::StateMachine => {
                let (table, conflicts) = FsmTable::build(&grammar)?;
                let dump = table.dump(&grammar);
                (Tables::StateMachine(Arc::new(table)), dump, conflicts)
            }
        };
        if let Some(out) = table_output {
            write!(out, "{dump}")?;
        }
        if !conflicts.is_empty() {
            return Ok(self.report(&conflicts));
        }

        tracing::debug!(
            kind = grammar.kind().as_str(),
            states = dump.states.len(),
            glr = options.use_glr,
            "grammar initialized"
        );
        self.grammar = Some(Arc::new(grammar));
        self.tables = Some(tables);
        self.dump = Some(dump);
        Ok(String::new())
    }

    /// The initialized grammar's tokens
    #[must_use]
    pub fn tokens(&self) -> Option<&TokenMap> {
        self.grammar.as_deref().map(Grammar::tokens)
    }

    #[must_use]
    pub fn grammar(&self) -> Option<&Arc<Grammar>> {
        self.grammar.as_ref()
    }

    /// Description of the built tables
    #[must_use]
    pub const fn table_dump(&self) -> Option<&TableDump> {
        self.dump.as_ref()
    }

    /// Create a parser or state machine, whichever the grammar describes.
    ///
    /// # Errors
    ///
    /// [`BindError::Uninitialized`] before a successful initialization, or
    /// the first callback the grammar needs but `bindings` lacks.
    pub fn create_instance<V: Clone>(
        &self,
        bindings: Bindings<V>,
    ) -> Result<Instance<V>, BindError> {
        match self.initialized()? {
            (grammar, Tables::Parser(table)) => {
                let callbacks = bindings.resolve(Arc::clone(grammar))?;
                Ok(Instance::Parser(Parser::new(Arc::clone(grammar), Arc::clone(table), callbacks)))
            }
            (grammar, Tables::StateMachine(table)) => {
                let callbacks = bindings.resolve(Arc::clone(grammar))?;
                Ok(Instance::StateMachine(StateMachine::new(
                    Arc::clone(grammar),
                    Arc::clone(table),
                    callbacks,
                )))
            }
        }
    }

    /// Create a parser.
    ///
    /// # Errors
    ///
    /// As [`create_instance`](Self::create_instance), plus
    /// [`BindError::WrongKind`] when the grammar is a state machine.
    pub fn create_parser<V: Clone>(&self, bindings: Bindings<V>) -> Result<Parser<V>, BindError> {
        match self.create_instance(bindings)? {
            Instance::Parser(parser) => Ok(parser),
            Instance::StateMachine(_) => Err(BindError::WrongKind {
                built: GrammarKind::StateMachine.as_str(),
                requested: GrammarKind::Parser.as_str(),
            }),
        }
    }

    /// Create a state machine.
    ///
    /// # Errors
    ///
    /// As [`create_instance`](Self::create_instance), plus
    /// [`BindError::WrongKind`] when the grammar is a parser.
    pub fn create_state_machine<V: Clone>(
        &self,
        bindings: Bindings<V>,
    ) -> Result<StateMachine<V>, BindError> {
        match self.create_instance(bindings)? {
            Instance::StateMachine(machine) => Ok(machine),
            Instance::Parser(_) => Err(BindError::WrongKind {
                built: GrammarKind::Parser.as_str(),
                requested: GrammarKind::StateMachine.as_str(),
            }),
        }
    }

    fn initialized(&self) -> Result<(&Arc<Grammar>, &Tables), BindError> {
        match (&self.grammar, &self.tables) {
            (Some(grammar), Some(tables)) => Ok((grammar, tables)),
            _ => Err(BindError::Uninitialized),
        }
    }

    fn clear(&mut self) {
        self.grammar = None;
        self.tables = None;
        self.dump = None;
    }

    /// Write every diagnostic to the error output; the first one as text
    fn report(&mut self, diagnostics: &[GrammarError]) -> String {
        for diagnostic in diagnostics {
            tracing::warn!(%diagnostic, "grammar rejected");
            if let Some(out) = self.error_output.as_mut() {
                let _ = writeln!(out, "{diagnostic}");
            }
        }
        diagnostics
            .first()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Error sink shared with the test
    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Sink {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    const AMBIGUOUS: &str = "events { i; PLUS; TIMES; }
        grammar(E) { E : i | E PLUS E | E TIMES E ; }";

    #[test]
    fn test_lr_rejects_conflicts() {
        let mut factory = ParserFactory::new();
        let sink = Sink::default();
        factory.set_error_output(Some(Box::new(sink.clone())));
        let error = factory
            .initialize_from_grammar(AMBIGUOUS, None, &BuildOptions::default())
            .unwrap();
        assert!(error.contains("conflict"), "{error}");
        assert!(sink.text().lines().count() >= 1);
        assert!(factory.tokens().is_none());
        assert!(matches!(
            factory.create_parser::<()>(Bindings::new()),
            Err(BindError::Uninitialized)
        ));
    }

    #[test]
    fn test_glr_accepts_conflicts() {
        let mut factory = ParserFactory::new();
        let mut tables = Vec::new();
        let error = factory
            .initialize_from_grammar(AMBIGUOUS, Some(&mut tables), &BuildOptions::glr())
            .unwrap();
        assert_eq!(error, "");
        let text = String::from_utf8(tables).unwrap();
        assert!(text.starts_with("parser with"), "{text}");
        assert!(factory.create_parser::<()>(Bindings::new()).is_ok());
    }

    #[test]
    fn test_syntax_error_is_text() {
        let mut factory = ParserFactory::new();
        let error = factory
            .initialize_from_grammar("grammar(S) { S : a ", None, &BuildOptions::default())
            .unwrap();
        assert!(!error.is_empty());
    }

    #[test]
    fn test_wrong_kind() {
        let mut factory = ParserFactory::new();
        let error = factory
            .initialize_from_grammar(
                "events { GO; } fsm(A) { A : GO B ; B : GO A ; }",
                None,
                &BuildOptions::default(),
            )
            .unwrap();
        assert_eq!(error, "");
        assert!(matches!(
            factory.create_parser::<()>(Bindings::new()),
            Err(BindError::WrongKind { .. })
        ));
        let machine = factory.create_state_machine::<()>(Bindings::new()).unwrap();
        assert_eq!(machine.current_state_name(), "A");
    }

    #[test]
    fn test_capacity_is_a_hard_error() {
        let names: Vec<String> = (0..63).map(|i| format!("g{i}")).collect();
        let source = format!(
            "events {{ A; }} guards {{ {}; }} grammar(S) {{ S : A ; }}",
            names.join("; ")
        );
        let mut factory = ParserFactory::new();
        let result = factory.initialize_from_grammar(&source, None, &BuildOptions::default());
        assert!(matches!(result, Err(BuildError::Guard(_))));
    }
}
