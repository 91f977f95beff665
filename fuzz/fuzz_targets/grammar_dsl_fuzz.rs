#![no_main]
use libfuzzer_sys::fuzz_target;
use trellis::backend::fsm::FsmTable;
use trellis::backend::lr::build_tables;
use trellis::grammar::dsl::parse_grammar;
use trellis::GrammarKind;

// Arbitrary grammar text must never panic, whatever stage rejects it.
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(builder) = parse_grammar(source) else {
        return;
    };
    let Ok((grammar, diagnostics)) = builder.build(true) else {
        return;
    };
    if !diagnostics.is_empty() || grammar.productions().len() > 64 {
        return;
    }
    match grammar.kind() {
        GrammarKind::Parser => {
            let _ = build_tables(&grammar, false, true);
            let _ = build_tables(&grammar, true, false);
        }
        GrammarKind::StateMachine => {
            let _ = FsmTable::build(&grammar);
        }
    }
});
