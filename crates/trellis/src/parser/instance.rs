//! Ready-to-run parsers and state machines.

use crate::backend::fsm::{FsmDriver, FsmStateId, FsmTable};
use crate::backend::glr::{GlrDriver, ParseMetrics};
use crate::backend::lr::ParseTable;
use crate::error::CallbackError;
use crate::grammar::{Grammar, TokenMap};
use crate::parser::ParseToken;
use crate::parser::bindings::Callbacks;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// A parser with its callbacks bound.
///
/// Runs LR and GLR tables alike. Under unresolved ambiguity a successful
/// parse has more than one result.
pub struct Parser<V> {
    grammar: Arc<Grammar>,
    driver: GlrDriver<V>,
    callbacks: Callbacks<V>,
}

impl<V> fmt::Debug for Parser<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser").field("driver", &self.driver).finish_non_exhaustive()
    }
}

impl<V: Clone> Parser<V> {
    pub(crate) fn new(
        grammar: Arc<Grammar>,
        table: Arc<ParseTable>,
        callbacks: Callbacks<V>,
    ) -> Self {
        Self {
            driver: GlrDriver::new(Arc::clone(&grammar), table),
            grammar,
            callbacks,
        }
    }

    /// Parse `tokens` to the end of input.
    ///
    /// Returns whether at least one branch accepted.
    ///
    /// # Errors
    ///
    /// The first error raised by a guard, action or merge callback.
    pub fn parse<I>(&mut self, tokens: I) -> Result<bool, CallbackError>
    where
        I: IntoIterator<Item = ParseToken<V>>,
    {
        self.driver.parse(tokens, &mut self.callbacks)
    }

    /// Accepted tokens of the last parse
    #[must_use]
    pub fn results(&self) -> &[Arc<ParseToken<V>>] {
        self.driver.results()
    }

    /// Value of the first result
    #[must_use]
    pub fn value(&self) -> Option<&V> {
        self.results().first()?.value()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenMap {
        self.grammar.tokens()
    }

    #[must_use]
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    #[must_use]
    pub const fn metrics(&self) -> &ParseMetrics {
        self.driver.metrics()
    }

    /// Stack nodes still allocated; zero between parses
    #[must_use]
    pub const fn live_nodes(&self) -> usize {
        self.driver.live_nodes()
    }

    /// Send a trace of every round to `output`
    pub fn set_debug_output(&mut self, output: Option<Box<dyn Write + Send>>) {
        self.driver.set_debug_output(output);
    }
}

/// A state machine with its callbacks bound.
pub struct StateMachine<V> {
    grammar: Arc<Grammar>,
    driver: FsmDriver<V>,
    callbacks: Callbacks<V>,
}

impl<V> fmt::Debug for StateMachine<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("state", &self.driver.current_state_name())
            .field("fired", &self.driver.fired())
            .finish_non_exhaustive()
    }
}

impl<V: Clone> StateMachine<V> {
    pub(crate) fn new(
        grammar: Arc<Grammar>,
        table: Arc<FsmTable>,
        callbacks: Callbacks<V>,
    ) -> Self {
        Self {
            driver: FsmDriver::new(Arc::clone(&grammar), table),
            grammar,
            callbacks,
        }
    }

    /// Take the transition selected by `trigger`; `false` if none applies.
    ///
    /// # Errors
    ///
    /// The first error raised by a guard or action callback.
    pub fn fire(&mut self, trigger: ParseToken<V>) -> Result<bool, CallbackError> {
        self.driver.fire(trigger, &mut self.callbacks)
    }

    /// Fire every trigger; `false` at the first one without a transition.
    ///
    /// # Errors
    ///
    /// The first error raised by a guard or action callback.
    pub fn parse<I>(&mut self, triggers: I) -> Result<bool, CallbackError>
    where
        I: IntoIterator<Item = ParseToken<V>>,
    {
        self.driver.parse(triggers, &mut self.callbacks)
    }

    #[must_use]
    pub const fn current_state(&self) -> FsmStateId {
        self.driver.current_state()
    }

    #[must_use]
    pub fn current_state_name(&self) -> &str {
        self.driver.current_state_name()
    }

    /// Value returned by the last transition action
    #[must_use]
    pub const fn value(&self) -> Option<&V> {
        self.driver.value()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenMap {
        self.grammar.tokens()
    }

    pub fn reset(&mut self) {
        self.driver.reset();
    }
}

/// Whatever the initialized grammar builds.
#[derive(Debug)]
pub enum Instance<V> {
    Parser(Parser<V>),
    StateMachine(StateMachine<V>),
}

impl<V: Clone> Instance<V> {
    /// Feed `tokens` to the parser or state machine.
    ///
    /// # Errors
    ///
    /// The first error raised by a callback.
    pub fn parse<I>(&mut self, tokens: I) -> Result<bool, CallbackError>
    where
        I: IntoIterator<Item = ParseToken<V>>,
    {
        match self {
            Self::Parser(parser) => parser.parse(tokens),
            Self::StateMachine(machine) => machine.parse(tokens),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenMap {
        match self {
            Self::Parser(parser) => parser.tokens(),
            Self::StateMachine(machine) => machine.tokens(),
        }
    }

    #[must_use]
    pub const fn as_parser(&self) -> Option<&Parser<V>> {
        match self {
            Self::Parser(parser) => Some(parser),
            Self::StateMachine(_) => None,
        }
    }

    #[must_use]
    pub fn into_parser(self) -> Option<Parser<V>> {
        match self {
            Self::Parser(parser) => Some(parser),
            Self::StateMachine(_) => None,
        }
    }

    #[must_use]
    pub fn into_state_machine(self) -> Option<StateMachine<V>> {
        match self {
            Self::Parser(_) => None,
            Self::StateMachine(machine) => Some(machine),
        }
    }
}
