//! State machine example
//!
//! A traffic light that only turns green after a long enough wait. Guards
//! look at the value carried by each trigger.
//!
//! Run with: `cargo run --example traffic_light`

use trellis::{Bindings, BuildOptions, ParseToken, ParserFactory};

const LIGHTS: &str = "
    events { TIMER<u32>; RESET; }
    guards { isLong; }
    fsm(Red) {
        Red    : TIMER[isLong] Green { goGreen } | TIMER Red | RESET Red ;
        Green  : TIMER Yellow | RESET Red ;
        Yellow : TIMER Red | RESET Red ;
    }";

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut table = Vec::new();
    let mut factory = ParserFactory::new();
    let error =
        factory.initialize_from_grammar(LIGHTS, Some(&mut table), &BuildOptions::default())?;
    if !error.is_empty() {
        return Err(error.into());
    }
    print!("{}", String::from_utf8_lossy(&table));

    let bindings = Bindings::<u32>::new()
        .guard("isLong", |timer| Ok(timer.value().is_some_and(|seconds| *seconds >= 30)))
        .action("goGreen", |args| {
            let waited = args.first().and_then(|timer| timer.value()).copied().unwrap_or_default();
            println!("  green after {waited}s");
            Ok(waited)
        });
    let mut machine = factory.create_state_machine(bindings)?;
    let timer = machine.tokens().id("TIMER").ok_or("no TIMER event")?;

    println!("\nstarting in {}", machine.current_state_name());
    for seconds in [10, 45, 5, 5] {
        machine.fire(ParseToken::with_value(timer, seconds))?;
        println!("TIMER({seconds}) -> {}", machine.current_state_name());
    }
    Ok(())
}
