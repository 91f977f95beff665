//! GLR parsing example
//!
//! This example demonstrates how to:
//! 1. Build tables for an ambiguous grammar without rejecting it
//! 2. Get every reading of an ambiguous input
//! 3. Pick one reading with a merge callback
//!
//! Run with: `cargo run --example glr_parsing`

use trellis::{Bindings, BuildOptions, ParseToken, Parser, ParserFactory};

const AMBIGUOUS: &str = "
    events { i; PLUS; TIMES; }
    grammar(E) { E : i | E PLUS E | E TIMES E ; }";

const DISAMBIGUATED: &str = "
    events { i; PLUS; TIMES; }
    grammar(E) { E : i | E PLUS E | E TIMES E merge { precedence } ; }";

fn input<V: Clone>(parser: &Parser<V>, text: &str) -> Vec<ParseToken<V>> {
    text.split_whitespace()
        .filter_map(|word| {
            let name = match word {
                "+" => "PLUS",
                "*" => "TIMES",
                _ => "i",
            };
            parser.tokens().id(name)
        })
        .map(|id| ParseToken::terminal(id, None))
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut factory = ParserFactory::new();
    let error = factory.initialize_from_grammar(AMBIGUOUS, None, &BuildOptions::glr())?;
    if !error.is_empty() {
        return Err(error.into());
    }
    let mut parser = factory.create_parser::<()>(Bindings::new())?;
    let text = "i + i * i + i";
    parser.parse(input(&parser, text))?;
    println!("{text}: {} readings", parser.results().len());
    for tree in parser.results() {
        println!("  {}", tree.render(parser.tokens()));
    }
    let metrics = parser.metrics();
    println!(
        "  {} rounds, {} reductions, at most {} branches",
        metrics.rounds, metrics.reductions, metrics.max_branches
    );

    // Keep the reading whose top operator is `+`, so `*` binds tighter
    let error = factory.initialize_from_grammar(DISAMBIGUATED, None, &BuildOptions::glr())?;
    if !error.is_empty() {
        return Err(error.into());
    }
    let plus = factory.tokens().and_then(|tokens| tokens.id("PLUS"));
    let bindings = Bindings::<()>::new().merge("precedence", move |candidates| {
        let sum = candidates
            .iter()
            .find(|candidate| candidate.children.get(1).map(|op| op.id) == plus);
        Ok(sum.or_else(|| candidates.first()).cloned())
    });
    let mut parser = factory.create_parser(bindings)?;
    parser.parse(input(&parser, text))?;
    println!("with a merge callback:");
    for tree in parser.results() {
        println!("  {}", tree.render(parser.tokens()));
    }
    Ok(())
}
