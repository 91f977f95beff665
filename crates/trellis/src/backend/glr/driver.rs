//! Round-based GLR driver.
//!
//! Each round consumes one lookahead token. All live branches first perform
//! every reduction the lookahead allows, then shift it together, so every
//! branch finishes a token before the next one is read.
//!
//! Within a round there is one node per state. Pending reductions wait in a
//! queue ordered by the position of the base they reduce to, latest first,
//! then by the [`ReductionOrder`] rank of their rule. Every reading of a rule
//! over one base is therefore queued before the first of them is taken, and
//! they are taken together: their tokens are merged, then linked. A link
//! added to a node that has already acted queues the reductions whose paths
//! cross the new link.

use crate::backend::glr::stack::{NodeId, StackPath, Trellis};
use crate::backend::lr::{Action, ParseTable, StateId};
use crate::backend::traits::Semantics;
use crate::error::CallbackError;
use crate::grammar::{Grammar, ProductionId, ReductionOrder, TokenId};
use crate::parser::ParseToken;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

type TokenRef<V> = Arc<ParseToken<V>>;

/// Counters collected during one parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseMetrics {
    /// Rounds run, retries after recovery included
    pub rounds: usize,
    pub shifts: usize,
    pub reductions: usize,
    /// Merge callbacks invoked
    pub merges: usize,
    /// Most branches alive at the start of a round
    pub max_branches: usize,
    pub nodes_created: usize,
    pub nodes_collected: usize,
    /// Times an `error` token was pushed
    pub recoveries: usize,
    /// Input tokens skipped while recovering
    pub discarded_tokens: usize,
}

enum Outcome {
    Shifted,
    Accepted,
    /// Run the round again with the same lookahead on a recovered frontier
    Retry,
    Discarded,
    Dead,
}

/// A reduction path waiting in the round's queue.
struct Pending<V> {
    /// Position of `path.base`
    position: usize,
    rank: usize,
    sequence: u64,
    production: ProductionId,
    path: StackPath<TokenRef<V>>,
}

impl<V> Pending<V> {
    fn group(&self) -> (usize, usize, NodeId) {
        (self.position, self.rank, self.path.base)
    }
}

impl<V> Ord for Pending<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.position
            .cmp(&other.position)
            .then_with(|| other.rank.cmp(&self.rank))
            .then_with(|| other.path.base.cmp(&self.path.base))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl<V> PartialOrd for Pending<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V> PartialEq for Pending<V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<V> Eq for Pending<V> {}

struct Round<V> {
    lookahead: TokenRef<V>,
    initial: Vec<NodeId>,
    /// Nodes at the current position by state
    open: HashMap<StateId, NodeId, ahash::RandomState>,
    held: Vec<NodeId>,
    /// Nodes that have acted, with the reductions they selected
    acted: Vec<(NodeId, SmallVec<[ProductionId; 2]>)>,
    queue: BinaryHeap<Pending<V>>,
    sequence: u64,
    shifts: Vec<(NodeId, StateId)>,
    accepting: Vec<NodeId>,
}

impl<V> Round<V> {
    fn new(lookahead: TokenRef<V>) -> Self {
        Self {
            lookahead,
            initial: Vec::new(),
            open: HashMap::default(),
            held: Vec::new(),
            acted: Vec::new(),
            queue: BinaryHeap::new(),
            sequence: 0,
            shifts: Vec::new(),
            accepting: Vec::new(),
        }
    }

    fn at_end(&self) -> bool {
        self.lookahead.id == TokenId::END
    }

    /// The next group of reductions sharing base and rule rank
    fn next_group(&mut self) -> Vec<Pending<V>> {
        let Some(first) = self.queue.pop() else {
            return Vec::new();
        };
        let key = first.group();
        let mut group = vec![first];
        while self.queue.peek().is_some_and(|next| next.group() == key) {
            group.extend(self.queue.pop());
        }
        group
    }
}

/// Executes a [`ParseTable`] against a token stream.
///
/// A conflict-free table keeps a single branch and behaves as a plain LR(1)
/// parser; a GLR table forks wherever a row selects several actions.
pub struct GlrDriver<V> {
    grammar: Arc<Grammar>,
    table: Arc<ParseTable>,
    order: ReductionOrder,
    trellis: Trellis<TokenRef<V>>,
    frontier: Vec<NodeId>,
    results: Vec<TokenRef<V>>,
    metrics: ParseMetrics,
    debug: Option<Box<dyn Write + Send>>,
    position: usize,
    recovering: bool,
}

impl<V> fmt::Debug for GlrDriver<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlrDriver")
            .field("states", &self.table.len())
            .field("live_nodes", &self.trellis.live())
            .field("branches", &self.frontier.len())
            .field("results", &self.results.len())
            .finish_non_exhaustive()
    }
}

impl<V> GlrDriver<V> {
    #[must_use]
    pub fn new(grammar: Arc<Grammar>, table: Arc<ParseTable>) -> Self {
        let order = ReductionOrder::compute(&grammar);
        Self {
            grammar,
            table,
            order,
            trellis: Trellis::new(),
            frontier: Vec::new(),
            results: Vec::new(),
            metrics: ParseMetrics::default(),
            debug: None,
            position: 0,
            recovering: false,
        }
    }

    /// Completed parses of the last run, one per distinct accepting branch
    #[must_use]
    pub fn results(&self) -> &[TokenRef<V>] {
        &self.results
    }

    #[must_use]
    pub const fn metrics(&self) -> &ParseMetrics {
        &self.metrics
    }

    /// Stack nodes still allocated
    #[must_use]
    pub const fn live_nodes(&self) -> usize {
        self.trellis.live()
    }

    /// Send a line per round, reduction, merge and recovery to `output`
    pub fn set_debug_output(&mut self, output: Option<Box<dyn Write + Send>>) {
        self.debug = output;
    }

    fn debug(&mut self, args: fmt::Arguments<'_>) {
        if let Some(out) = self.debug.as_mut() {
            let _ = writeln!(out, "{args}");
        }
    }

    fn reset(&mut self) {
        self.trellis.clear();
        self.frontier.clear();
        self.results.clear();
        self.metrics = ParseMetrics::default();
        self.position = 0;
        self.recovering = false;
    }

    /// Parse `tokens` to the end.
    ///
    /// Returns `Ok(true)` when at least one branch accepts at the end of the
    /// input; the accepted tokens are then available from
    /// [`results`](Self::results).
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a callback; the parse is abandoned.
    pub fn parse<I, S>(&mut self, tokens: I, semantics: &mut S) -> Result<bool, CallbackError>
    where
        I: IntoIterator<Item = ParseToken<V>>,
        S: Semantics<V> + ?Sized,
    {
        self.reset();
        let root = self.trellis.push_root(StateId(0));
        self.frontier.push(root);

        let mut input = tokens.into_iter();
        let mut next_lookahead = move || Arc::new(input.next().unwrap_or_else(ParseToken::end));
        let mut lookahead = next_lookahead();

        let outcome = loop {
            match self.round(&lookahead, semantics) {
                Ok(Outcome::Shifted) => {
                    self.position += 1;
                    lookahead = next_lookahead();
                }
                Ok(Outcome::Discarded) => {
                    self.position += 1;
                    self.metrics.discarded_tokens += 1;
                    lookahead = next_lookahead();
                }
                Ok(Outcome::Retry) => {}
                Ok(Outcome::Accepted) => break Ok(true),
                Ok(Outcome::Dead) => break Ok(false),
                Err(error) => break Err(error),
            }
        };

        for node in std::mem::take(&mut self.frontier) {
            self.trellis.release(node);
        }
        self.metrics.nodes_collected += self.trellis.sweep();
        self.metrics.nodes_created = self.trellis.created();
        tracing::debug!(
            accepted = matches!(outcome, Ok(true)),
            results = self.results.len(),
            rounds = self.metrics.rounds,
            "parse finished"
        );
        outcome
    }

    fn round<S>(
        &mut self,
        lookahead: &TokenRef<V>,
        semantics: &mut S,
    ) -> Result<Outcome, CallbackError>
    where
        S: Semantics<V> + ?Sized,
    {
        semantics.begin_round();
        self.metrics.rounds += 1;
        self.metrics.max_branches = self.metrics.max_branches.max(self.frontier.len());

        let label = self.grammar.tokens().label(lookahead.id);
        let position = self.position;
        let branches = self.frontier.len();
        tracing::trace!(position, lookahead = %label, branches, "round");
        self.debug(format_args!("round {position}: {label} with {branches} branches"));

        let mut round = Round::new(Arc::clone(lookahead));
        let result = self.run(&mut round, semantics);
        let outcome = match result {
            Ok(()) => Ok(self.finish_round(&mut round)),
            Err(error) => Err(error),
        };

        for &node in &round.held {
            if !self.frontier.contains(&node) {
                self.trellis.seal(node);
            }
        }
        for node in round.held {
            self.trellis.release(node);
        }
        self.metrics.nodes_collected += self.trellis.sweep();
        outcome
    }

    fn run<S>(&mut self, round: &mut Round<V>, semantics: &mut S) -> Result<(), CallbackError>
    where
        S: Semantics<V> + ?Sized,
    {
        for node in std::mem::take(&mut self.frontier) {
            let Some(state) = self.trellis.get(node).map(|entry| entry.state) else {
                continue;
            };
            round.open.insert(state, node);
            round.initial.push(node);
            round.held.push(node);
        }
        for node in round.initial.clone() {
            self.act(round, node, semantics)?;
        }
        loop {
            let group = round.next_group();
            if group.is_empty() {
                return Ok(());
            }
            self.reduce_group(round, group, semantics)?;
        }
    }

    fn finish_round(&mut self, round: &mut Round<V>) -> Outcome {
        if round.at_end() {
            if round.accepting.is_empty() {
                return self.recover(round);
            }
            for &node in &round.accepting {
                let Some(entry) = self.trellis.get(node) else {
                    continue;
                };
                for link in entry.links() {
                    if !self.results.iter().any(|result| Arc::ptr_eq(result, &link.token)) {
                        self.results.push(Arc::clone(&link.token));
                    }
                }
            }
            return Outcome::Accepted;
        }

        if round.shifts.is_empty() {
            return self.recover(round);
        }
        let mut by_state: BTreeMap<StateId, SmallVec<[NodeId; 2]>> = BTreeMap::new();
        for &(node, target) in &round.shifts {
            let sources = by_state.entry(target).or_default();
            if !sources.contains(&node) {
                sources.push(node);
            }
        }
        for (state, sources) in by_state {
            let mut sources = sources.into_iter();
            let Some(first) = sources.next() else {
                continue;
            };
            let node = self
                .trellis
                .push(state, self.position + 1, Arc::clone(&round.lookahead), first);
            for source in sources {
                self.trellis
                    .add_alternative(node, Arc::clone(&round.lookahead), source);
            }
            self.metrics.shifts += 1;
            self.frontier.push(node);
        }
        self.recovering = false;
        Outcome::Shifted
    }

    /// Push `error` where some branch can take it, or skip the lookahead if
    /// that already happened and the recovered branches still cannot use it.
    fn recover(&mut self, round: &Round<V>) -> Outcome {
        if !self.grammar.error_token_support() {
            return Outcome::Dead;
        }
        let label = self.grammar.tokens().label(round.lookahead.id);

        if self.recovering {
            if round.at_end() {
                return Outcome::Dead;
            }
            for &node in &round.initial {
                self.trellis.retain(node);
                self.frontier.push(node);
            }
            tracing::trace!(position = self.position, token = %label, "discarding token");
            self.debug(format_args!("discard {label}"));
            return Outcome::Discarded;
        }

        let mut targets: BTreeMap<StateId, SmallVec<[NodeId; 2]>> = BTreeMap::new();
        for &node in &round.held {
            let mut current = Some(node);
            while let Some(id) = current {
                let Some(entry) = self.trellis.get(id) else {
                    break;
                };
                if let Some(state) = self.table.shift_target(entry.state, TokenId::ERROR) {
                    let bases = targets.entry(state).or_default();
                    if !bases.contains(&id) {
                        bases.push(id);
                    }
                    break;
                }
                current = entry.target();
            }
        }
        if targets.is_empty() {
            return Outcome::Dead;
        }

        tracing::warn!(position = self.position, token = %label, "syntax error, recovering");
        self.debug(format_args!("error at {label}, recovering in {} states", targets.len()));
        let error: TokenRef<V> = Arc::new(ParseToken::terminal(TokenId::ERROR, None));
        for (state, bases) in targets {
            let mut bases = bases.into_iter();
            let Some(first) = bases.next() else {
                continue;
            };
            let node = self
                .trellis
                .push(state, self.position, Arc::clone(&error), first);
            for base in bases {
                self.trellis.add_alternative(node, Arc::clone(&error), base);
            }
            self.frontier.push(node);
        }
        self.recovering = true;
        self.metrics.recoveries += 1;
        Outcome::Retry
    }

    /// Take the actions `node` selects for the lookahead, queueing every
    /// reduction path below it.
    fn act<S>(
        &mut self,
        round: &mut Round<V>,
        node: NodeId,
        semantics: &mut S,
    ) -> Result<(), CallbackError>
    where
        S: Semantics<V> + ?Sized,
    {
        let Some(state) = self.trellis.get(node).map(|entry| entry.state) else {
            return Ok(());
        };
        let table = Arc::clone(&self.table);
        let mut reductions: SmallVec<[ProductionId; 2]> = SmallVec::new();
        if let Some(row) = table.actions(state, round.lookahead.id) {
            let lookahead = Arc::clone(&round.lookahead);
            let actions: SmallVec<[Action; 2]> = row
                .select(|guard| semantics.guard(guard, &lookahead))?
                .into_iter()
                .copied()
                .collect();
            for action in actions {
                match action {
                    Action::Shift(target) => round.shifts.push((node, target)),
                    Action::Accept => {
                        if round.at_end() {
                            round.accepting.push(node);
                        }
                    }
                    Action::Reduce(production) => reductions.push(production),
                }
            }
        }
        for &production in &reductions {
            self.queue_paths(round, node, production, None);
        }
        round.acted.push((node, reductions));
        Ok(())
    }

    /// Queue the paths of `production` below `node`, only those crossing
    /// link `via.1` of node `via.0` when given.
    fn queue_paths(
        &self,
        round: &mut Round<V>,
        node: NodeId,
        production_id: ProductionId,
        via: Option<(NodeId, usize)>,
    ) {
        let Some(production) = self.grammar.production(production_id) else {
            return;
        };
        let len = production.len();
        let rank = self.order.rank(production.lhs);
        let matches = |step: usize, _: usize, token: &TokenRef<V>| {
            token.id == production.rhs[len - 1 - step].token
        };
        let paths = match via {
            None => self.trellis.find_paths_of_depth(node, len, matches),
            Some((via, link)) => self.trellis.find_paths_through(node, len, via, link, matches),
        };
        for path in paths {
            let position = self.trellis.get(path.base).map_or(0, |entry| entry.position);
            round.queue.push(Pending {
                position,
                rank,
                sequence: round.sequence,
                production: production_id,
                path,
            });
            round.sequence += 1;
        }
    }

    /// Reduce every reading of one rule over one base, merge the readings
    /// that reach the same state and link the survivors.
    fn reduce_group<S>(
        &mut self,
        round: &mut Round<V>,
        group: Vec<Pending<V>>,
        semantics: &mut S,
    ) -> Result<(), CallbackError>
    where
        S: Semantics<V> + ?Sized,
    {
        let grammar = Arc::clone(&self.grammar);
        let table = Arc::clone(&self.table);
        let Some(base) = group.first().map(|pending| pending.path.base) else {
            return Ok(());
        };
        let Some(base_state) = self.trellis.get(base).map(|entry| entry.state) else {
            return Ok(());
        };

        let mut arrivals: BTreeMap<StateId, Vec<TokenRef<V>>> = BTreeMap::new();
        for pending in group {
            let Some(production) = grammar.production(pending.production) else {
                continue;
            };
            self.metrics.reductions += 1;
            let value = semantics.reduce(production, &pending.path.tokens)?;
            let token = Arc::new(ParseToken::reduced(
                production.lhs,
                pending.production,
                pending.path.tokens,
                value,
            ));
            tracing::trace!(production = %pending.production, base = %base, "reduce");
            if self.debug.is_some() {
                let label = grammar.production_label(pending.production);
                self.debug(format_args!("reduce {label}"));
            }

            let Some(row) = table.gotos(base_state, production.lhs) else {
                continue;
            };
            let targets: SmallVec<[StateId; 2]> = row
                .select(|guard| semantics.guard(guard, &token))?
                .into_iter()
                .copied()
                .collect();
            for target in targets {
                arrivals.entry(target).or_default().push(Arc::clone(&token));
            }
        }

        for (state, candidates) in arrivals {
            let survivors = self.merge(candidates, semantics)?;
            self.link(round, state, survivors, base, semantics)?;
        }
        Ok(())
    }

    /// Reduce several readings to one through the rule's merge callback.
    ///
    /// Readings of a rule without one stay apart.
    fn merge<S>(
        &mut self,
        candidates: Vec<TokenRef<V>>,
        semantics: &mut S,
    ) -> Result<Vec<TokenRef<V>>, CallbackError>
    where
        S: Semantics<V> + ?Sized,
    {
        if candidates.len() < 2 {
            return Ok(candidates);
        }
        let grammar = Arc::clone(&self.grammar);
        let production = candidates[0]
            .production
            .and_then(|id| grammar.production(id))
            .filter(|production| production.merge.is_some());
        let Some(production) = production else {
            return Ok(candidates);
        };

        let choice = semantics.merge(production, &candidates)?;
        self.metrics.merges += 1;
        let count = candidates.len();
        let kept = choice.is_some();
        tracing::trace!(lhs = %production.lhs, candidates = count, kept, "merge");
        self.debug(format_args!(
            "merge {count} candidates: {}",
            if kept { "kept one" } else { "pruned" }
        ));
        Ok(choice.into_iter().collect())
    }

    /// Link `tokens` from the node in `state` down to `base`, creating the
    /// node if the round has none in that state yet.
    fn link<S>(
        &mut self,
        round: &mut Round<V>,
        state: StateId,
        tokens: Vec<TokenRef<V>>,
        base: NodeId,
        semantics: &mut S,
    ) -> Result<(), CallbackError>
    where
        S: Semantics<V> + ?Sized,
    {
        let Some(symbol) = tokens.first().map(|token| token.id) else {
            return Ok(());
        };
        let mut tokens = tokens.into_iter();
        let node = match round.open.get(&state).copied() {
            Some(node) => {
                // only a rule that derives itself reaches the same base twice
                let repeated = self.trellis.get(node).is_some_and(|entry| {
                    entry
                        .links()
                        .iter()
                        .any(|link| link.target == base && link.token.id == symbol)
                });
                if repeated {
                    tracing::trace!(node = %node, base = %base, "dropping cyclic reading");
                    return Ok(());
                }
                node
            }
            None => {
                let Some(first) = tokens.next() else {
                    return Ok(());
                };
                let node = self.trellis.push(state, self.position, first, base);
                round.open.insert(state, node);
                round.held.push(node);
                self.act(round, node, semantics)?;
                node
            }
        };

        for token in tokens {
            let Some(index) = self.trellis.add_alternative(node, token, base) else {
                continue;
            };
            for (above, reductions) in round.acted.clone() {
                for production in reductions {
                    let crosses = self
                        .grammar
                        .production(production)
                        .is_some_and(|production| !production.is_empty());
                    if crosses {
                        self.queue_paths(round, above, production, Some((node, index)));
                    }
                }
            }
        }
        Ok(())
    }
}
