//! Graphviz output for grammars and tables
//!
//! - [`rules_dot`] draws which rules refer to which rules and terminals
//! - [`table_dot`] draws the states of a [`TableDump`] with their shift,
//!   goto and transition edges

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use trellis::grammar::ACCEPT_SYMBOL;
use trellis::{Grammar, TableDump, TokenId};

/// Rule dependency graph of `grammar`.
///
/// Helper rules created for `?`, `*` and `+` are drawn like any other rule.
/// Production 0 (`$accept`) is left out.
#[must_use]
pub fn rules_dot(grammar: &Grammar) -> String {
    let tokens = grammar.tokens();
    let accept = tokens.id(ACCEPT_SYMBOL);
    let mut rules: BTreeMap<TokenId, BTreeSet<TokenId>> = BTreeMap::new();
    let mut terminals: BTreeSet<TokenId> = BTreeSet::new();
    for production in grammar.productions() {
        if Some(production.lhs) == accept {
            continue;
        }
        let uses = rules.entry(production.lhs).or_default();
        for element in &production.rhs {
            uses.insert(element.token);
            if element.token.is_terminal() {
                terminals.insert(element.token);
            }
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "digraph Rules {{");
    let _ = writeln!(out, "  rankdir=LR;");
    for rule in rules.keys() {
        let name = tokens.label(*rule);
        let _ = writeln!(out, "  \"{name}\" [shape=ellipse];");
    }
    for terminal in &terminals {
        let name = tokens.label(*terminal);
        let _ = writeln!(out, "  \"{name}\" [shape=box, style=filled, fillcolor=lightblue];");
    }
    for (rule, uses) in &rules {
        let from = tokens.label(*rule);
        for used in uses {
            let style = if used.is_terminal() { " [style=dashed]" } else { "" };
            let _ = writeln!(out, "  \"{from}\" -> \"{}\"{style};", tokens.label(*used));
        }
    }
    let _ = writeln!(out, "}}");
    out
}

/// State graph of a table dump.
///
/// Parser states are labelled with their kernel items; state machine states
/// with their names. Reductions are not edges and are left out.
#[must_use]
pub fn table_dot(dump: &TableDump) -> String {
    let by_name: BTreeMap<&str, u32> = dump
        .states
        .iter()
        .filter_map(|state| Some((state.name.as_deref()?, state.id)))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "digraph Table {{");
    let _ = writeln!(out, "  rankdir=LR;");
    let _ = writeln!(out, "  node [shape=box, fontname=monospace];");
    for state in &dump.states {
        let label = match &state.name {
            Some(name) => name.clone(),
            None => {
                let mut label = format!("state {}", state.id);
                for item in &state.items {
                    label.push_str("\\l");
                    label.push_str(&escape(item));
                }
                label.push_str("\\l");
                label
            }
        };
        let shape = if state.id == 0 { ", peripheries=2" } else { "" };
        let _ = writeln!(out, "  s{} [label=\"{label}\"{shape}];", state.id);
    }
    for state in &dump.states {
        for entry in &state.actions {
            if let Some(target) = edge_target(&entry.action, &by_name) {
                let _ = writeln!(
                    out,
                    "  s{} -> s{target} [label=\"{}\"];",
                    state.id,
                    escape(&entry.element)
                );
            }
        }
        for entry in &state.gotos {
            if let Ok(target) = entry.action.parse::<u32>() {
                let _ = writeln!(
                    out,
                    "  s{} -> s{target} [label=\"{}\", style=dashed];",
                    state.id,
                    escape(&entry.element)
                );
            }
        }
    }
    let _ = writeln!(out, "}}");
    out
}

/// `shift 4` or `goto Green {action}`
fn edge_target(action: &str, by_name: &BTreeMap<&str, u32>) -> Option<u32> {
    if let Some(state) = action.strip_prefix("shift ") {
        return state.trim().parse().ok();
    }
    let next = action.strip_prefix("goto ")?.split_whitespace().next()?;
    by_name.get(next).copied()
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis::{BuildOptions, ParserFactory};

    fn factory(source: &str) -> ParserFactory {
        let mut factory = ParserFactory::new();
        let error = factory
            .initialize_from_grammar(source, None, &BuildOptions::default())
            .unwrap();
        assert_eq!(error, "");
        factory
    }

    #[test]
    fn test_rules_dot() {
        let factory = factory(
            "events { NUM; PLUS; } grammar(Sum) { Sum : Sum PLUS Term | Term ; Term : NUM ; }",
        );
        let dot = rules_dot(factory.grammar().unwrap());
        assert!(dot.starts_with("digraph Rules {"));
        assert!(dot.contains("\"Sum\" -> \"Term\";"), "{dot}");
        assert!(dot.contains("\"Sum\" -> \"PLUS\" [style=dashed];"), "{dot}");
        assert!(dot.contains("\"NUM\" [shape=box"), "{dot}");
        assert!(!dot.contains("$accept"), "{dot}");
    }

    #[test]
    fn test_parser_table_dot() {
        let factory = factory("events { a; } grammar(S) { S : a ; }");
        let dot = table_dot(factory.table_dump().unwrap());
        assert!(dot.contains("s0 [label=\"state 0"), "{dot}");
        assert!(dot.contains("s0 -> s"), "{dot}");
        assert!(dot.contains("style=dashed"), "{dot}");
    }

    #[test]
    fn test_state_machine_dot() {
        let factory =
            factory("events { GO; STOP; } fsm(Idle) { Idle : GO Running ; Running : STOP Idle ; }");
        let dot = table_dot(factory.table_dump().unwrap());
        assert!(dot.contains("s0 [label=\"Idle\", peripheries=2];"), "{dot}");
        assert!(dot.contains("s0 -> s1 [label=\"GO\"];"), "{dot}");
        assert!(dot.contains("s1 -> s0 [label=\"STOP\"];"), "{dot}");
    }

    #[test]
    fn test_edge_target() {
        let names = BTreeMap::from([("Green", 1)]);
        assert_eq!(edge_target("shift 4", &names), Some(4));
        assert_eq!(edge_target("goto Green {goGreen}", &names), Some(1));
        assert_eq!(edge_target("reduce 2 (S : a)", &names), None);
        assert_eq!(edge_target("goto Blue", &names), None);
    }
}
