//! End-to-end parser tests through the factory

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use trellis::{Bindings, BuildOptions, ParseToken, Parser, ParserFactory};

const AMBIGUOUS: &str = "events { i; PLUS; TIMES; }
    grammar(E) { E : i | E PLUS E | E TIMES E ; }";

const MERGED: &str = "events { i; PLUS; TIMES; }
    grammar(E) { E : i | E PLUS E | E TIMES E merge { pick } ; }";

fn factory(source: &str, options: &BuildOptions) -> ParserFactory {
    let mut factory = ParserFactory::new();
    let error = factory.initialize_from_grammar(source, None, options).unwrap();
    assert_eq!(error, "");
    factory
}

fn input<V: Clone>(parser: &Parser<V>, names: &str) -> Vec<ParseToken<V>> {
    names
        .split_whitespace()
        .map(|name| ParseToken::terminal(parser.tokens().id(name).unwrap(), None))
        .collect()
}

fn rendered<V: Clone>(parser: &Parser<V>) -> Vec<String> {
    let mut trees: Vec<String> = parser
        .results()
        .iter()
        .map(|tree| tree.render(parser.tokens()))
        .collect();
    trees.sort();
    trees
}

#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<u8>>>);

impl Sink {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_lr_rejects_ambiguous_grammar() {
    let mut factory = ParserFactory::new();
    let sink = Sink::default();
    let mut output = sink.clone();
    let error = factory
        .initialize_from_grammar(AMBIGUOUS, Some(&mut output), &BuildOptions::default())
        .unwrap();
    assert!(error.contains("conflict"), "{error}");
    assert!(factory.create_parser::<()>(Bindings::new()).is_err());
    // the table listing is still written for inspection
    assert!(sink.text().contains("state 0"), "{}", sink.text());
}

#[test]
fn test_ambiguity_keeps_every_reading() {
    let factory = factory(AMBIGUOUS, &BuildOptions::glr());
    let mut parser = factory.create_parser::<()>(Bindings::new()).unwrap();
    let tokens = input(&parser, "i PLUS i TIMES i");
    assert!(parser.parse(tokens).unwrap());
    assert_eq!(
        rendered(&parser),
        ["E(E(E(i) PLUS E(i)) TIMES E(i))", "E(E(i) PLUS E(E(i) TIMES E(i)))"]
    );
    assert!(parser.metrics().max_branches > 1);
    assert_eq!(parser.live_nodes(), 0);
}

#[test]
fn test_merge_picks_one_reading() {
    let factory = factory(MERGED, &BuildOptions::glr());
    let times = factory.tokens().unwrap().id("TIMES").unwrap();
    // prefer the reading whose top production is not a product
    let bindings = Bindings::<()>::new().merge("pick", move |candidates| {
        Ok(candidates
            .iter()
            .find(|candidate| candidate.children.get(1).is_none_or(|op| op.id != times))
            .cloned())
    });
    let mut parser = factory.create_parser(bindings).unwrap();
    let tokens = input(&parser, "i PLUS i TIMES i");
    assert!(parser.parse(tokens).unwrap());
    assert_eq!(rendered(&parser), ["E(E(i) PLUS E(E(i) TIMES E(i)))"]);
    assert_eq!(parser.metrics().merges, 1);
}

#[test]
fn test_merge_may_prune_everything() {
    let factory = factory(MERGED, &BuildOptions::glr());
    let bindings = Bindings::<()>::new().merge("pick", |_| Ok(None));
    let mut parser = factory.create_parser(bindings).unwrap();
    let tokens = input(&parser, "i PLUS i TIMES i");
    assert!(!parser.parse(tokens).unwrap());
    assert!(parser.results().is_empty());
    assert_eq!(parser.live_nodes(), 0);

    // unambiguous input never reaches the merge
    let tokens = input(&parser, "i PLUS i");
    assert!(parser.parse(tokens).unwrap());
    assert_eq!(parser.results().len(), 1);
}

/// A `pick` merge keeping the first candidate and recording how many it saw
fn recording_pick() -> (Bindings<()>, Rc<RefCell<Vec<usize>>>) {
    let sizes = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&sizes);
    let bindings = Bindings::<()>::new().merge("pick", move |candidates| {
        seen.borrow_mut().push(candidates.len());
        Ok(candidates.first().cloned())
    });
    (bindings, sizes)
}

#[test]
fn test_readings_over_nullable_chain_meet() {
    let source = "events { a; }
        grammar(S) { S : X a ; X : P Q T | R merge { pick } ; P : ; Q : ; T : ; R : ; }";
    let factory = factory(source, &BuildOptions::glr());
    let (bindings, sizes) = recording_pick();
    let mut parser = factory.create_parser(bindings).unwrap();
    let tokens = input(&parser, "a");
    assert!(parser.parse(tokens).unwrap());
    assert_eq!(parser.results().len(), 1);
    assert_eq!(*sizes.borrow(), [2]);
    assert_eq!(parser.metrics().merges, 1);
    assert_eq!(parser.live_nodes(), 0);
}

const SUM: &str = "events { i; PLUS; } grammar(E) { E : i | E PLUS E ; }";
const MERGED_SUM: &str = "events { i; PLUS; } grammar(E) { E : i | E PLUS E merge { pick } ; }";
const FIVE_OPERANDS: &str = "i PLUS i PLUS i PLUS i PLUS i";

#[test]
fn test_every_span_is_merged_once() {
    let factory = factory(MERGED_SUM, &BuildOptions::glr());
    let (bindings, sizes) = recording_pick();
    let mut parser = factory.create_parser(bindings).unwrap();
    let tokens = input(&parser, FIVE_OPERANDS);
    assert!(parser.parse(tokens).unwrap());
    assert_eq!(parser.results().len(), 1);

    // a span of n operands has n - 1 splits, each over merged halves
    let mut sizes = sizes.borrow().clone();
    assert_eq!(sizes.last(), Some(&4));
    sizes.sort_unstable();
    assert_eq!(sizes, [2, 2, 2, 3, 3, 4]);
    assert_eq!(parser.metrics().merges, 6);
    assert_eq!(parser.live_nodes(), 0);
}

#[test]
fn test_unmerged_readings_are_not_repeated() {
    let factory = factory(SUM, &BuildOptions::glr());
    let mut parser = factory.create_parser::<()>(Bindings::new()).unwrap();
    let tokens = input(&parser, FIVE_OPERANDS);
    assert!(parser.parse(tokens).unwrap());
    let trees = rendered(&parser);
    // five operands bracket in Catalan(4) ways
    assert_eq!(trees.len(), 14);
    let mut distinct = trees.clone();
    distinct.dedup();
    assert_eq!(distinct, trees);
    assert_eq!(parser.live_nodes(), 0);
}

#[test]
fn test_guards_select_the_reduction() {
    let source = "events { ID; } guards { isType; }
        grammar(S) { S : Type | Var ; Type : ID[isType] ; Var : ID ; }";
    let factory = factory(source, &BuildOptions::default());
    let bindings = Bindings::<String>::new().guard("isType", |token| {
        Ok(token
            .value()
            .is_some_and(|name| name.starts_with(char::is_uppercase)))
    });
    let mut parser = factory.create_parser(bindings).unwrap();
    let id = parser.tokens().id("ID").unwrap();

    assert!(parser.parse([ParseToken::with_value(id, "Point".to_string())]).unwrap());
    assert_eq!(rendered(&parser), ["S(Type(ID))"]);
    assert_eq!(parser.value().map(String::as_str), Some("Point"));

    assert!(parser.parse([ParseToken::with_value(id, "point".to_string())]).unwrap());
    assert_eq!(rendered(&parser), ["S(Var(ID))"]);
}

#[test]
fn test_guard_results_are_memoised_per_round() {
    let source = "events { ID; } guards { a; b; }
        grammar(S) { S : X | Y | Z ; X : ID[a & b] ; Y : ID[a & !b] ; Z : ID ; }";
    let factory = factory(source, &BuildOptions::default());
    let calls = Rc::new(Cell::new(0));
    let counted = Rc::clone(&calls);
    let bindings = Bindings::<()>::new()
        .guard("a", move |_| {
            counted.set(counted.get() + 1);
            Ok(true)
        })
        .guard("b", |_| Ok(false));
    let mut parser = factory.create_parser(bindings).unwrap();
    let tokens = input(&parser, "ID");
    assert!(parser.parse(tokens).unwrap());
    assert_eq!(rendered(&parser), ["S(Y(ID))"]);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_callback_errors_abandon_the_parse() {
    let source = "events { NUM; } grammar(S) { S : NUM { fail($0) } ; }";
    let factory = factory(source, &BuildOptions::default());
    let bindings = Bindings::<i32>::new().action("fail", |_| Err("no value".into()));
    let mut parser = factory.create_parser(bindings).unwrap();
    let tokens = input(&parser, "NUM");
    let error = parser.parse(tokens).unwrap_err();
    assert_eq!(error.to_string(), "no value");
    assert_eq!(parser.live_nodes(), 0);
}

#[test]
fn test_missing_callbacks_are_reported() {
    let factory = factory(MERGED, &BuildOptions::glr());
    let error = factory.create_parser::<()>(Bindings::new()).unwrap_err();
    assert!(error.to_string().contains("pick"), "{error}");
}

#[test]
fn test_error_token_recovery() {
    let source = "events { NUM; SEMI; }
        grammar(List) {
            List : List Stmt | Stmt ;
            Stmt : NUM SEMI | error SEMI ;
        }";
    let factory = factory(source, &BuildOptions::default().with_error_token(true));
    let mut parser = factory.create_parser::<()>(Bindings::new()).unwrap();

    let tokens = input(&parser, "NUM SEMI NUM NUM SEMI NUM SEMI");
    assert!(parser.parse(tokens).unwrap());
    assert_eq!(parser.metrics().recoveries, 1);
    assert_eq!(parser.metrics().discarded_tokens, 1);
    assert_eq!(
        rendered(&parser),
        ["List(List(List(Stmt(NUM SEMI)) Stmt(error SEMI)) Stmt(NUM SEMI))"]
    );

    // nothing to resynchronise on before the end of input
    let tokens = input(&parser, "NUM NUM");
    assert!(!parser.parse(tokens).unwrap());
    assert_eq!(parser.live_nodes(), 0);
}

#[test]
fn test_without_error_token_support_errors_are_fatal() {
    let source = "events { NUM; SEMI; } grammar(List) { List : List NUM SEMI | NUM SEMI ; }";
    let factory = factory(source, &BuildOptions::default());
    let mut parser = factory.create_parser::<()>(Bindings::new()).unwrap();
    let tokens = input(&parser, "NUM SEMI NUM NUM SEMI");
    assert!(!parser.parse(tokens).unwrap());
    assert_eq!(parser.metrics().recoveries, 0);
}

#[test]
fn test_debug_trace() {
    let factory = factory(AMBIGUOUS, &BuildOptions::glr());
    let mut parser = factory.create_parser::<()>(Bindings::new()).unwrap();
    let sink = Sink::default();
    parser.set_debug_output(Some(Box::new(sink.clone())));
    let tokens = input(&parser, "i PLUS i");
    assert!(parser.parse(tokens).unwrap());
    let text = sink.text();
    assert!(text.contains("round 0: i with 1 branches"), "{text}");
    assert!(text.contains("reduce E : i"), "{text}");
}

#[test]
fn test_compressed_tables_parse_the_same() {
    let plain = factory(AMBIGUOUS, &BuildOptions::glr());
    let compressed = factory(AMBIGUOUS, &BuildOptions::glr().with_compression(true));
    assert!(
        compressed.table_dump().unwrap().states.len() <= plain.table_dump().unwrap().states.len()
    );
    for factory in [plain, compressed] {
        let mut parser = factory.create_parser::<()>(Bindings::new()).unwrap();
        let tokens = input(&parser, "i TIMES i PLUS i TIMES i");
        assert!(parser.parse(tokens).unwrap());
        assert_eq!(parser.results().len(), 5);
    }
}
