#![no_main]
use libfuzzer_sys::fuzz_target;
use trellis::{Bindings, BuildOptions, ParseToken, ParserFactory};

const GRAMMAR: &str = "events { i; PLUS; TIMES; LPAREN; RPAREN; }
    grammar(E) {
        E : i | E PLUS E | E TIMES E | LPAREN E RPAREN | error RPAREN ;
    }";

// Every input either parses or is rejected, and the trellis is always
// fully collected afterwards.
fuzz_target!(|data: &[u8]| {
    if data.len() > 24 {
        return;
    }
    let mut factory = ParserFactory::new();
    let options = BuildOptions::glr().with_error_token(true);
    let Ok(error) = factory.initialize_from_grammar(GRAMMAR, None, &options) else {
        return;
    };
    assert!(error.is_empty(), "{error}");
    let Ok(mut parser) = factory.create_parser::<()>(Bindings::new()) else {
        return;
    };
    let names = ["i", "PLUS", "TIMES", "LPAREN", "RPAREN"];
    let tokens: Vec<ParseToken<()>> = data
        .iter()
        .filter_map(|byte| parser.tokens().id(names[usize::from(*byte) % names.len()]))
        .map(|id| ParseToken::terminal(id, None))
        .collect();
    let accepted = parser.parse(tokens).unwrap_or(false);
    assert_eq!(accepted, !parser.results().is_empty());
    assert_eq!(parser.live_nodes(), 0);
});
