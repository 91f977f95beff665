//! A small calculator: logos tokens fed to a generated LR parser

use logos::Logos;
use trellis::{Bindings, BuildOptions, ParseToken, Parser, ParserFactory};

const CALCULATOR: &str = "
    events { NUMBER<f64>; PLUS; MINUS; TIMES; DIVIDE; LPAREN; RPAREN; }
    grammar(Expr) {
        Expr : Expr PLUS Term { add($0, $2) }
             | Expr MINUS Term { sub($0, $2) }
             | Term
             ;
        Term : Term TIMES Factor { mul($0, $2) }
             | Term DIVIDE Factor { div($0, $2) }
             | Factor
             ;
        Factor : NUMBER
               | MINUS Factor { neg($1) }
               | LPAREN Expr RPAREN { $1 }
               ;
    }";

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum Lexeme {
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    Number,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Times,
    #[token("/")]
    Divide,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

impl Lexeme {
    const fn event(self) -> &'static str {
        match self {
            Self::Number => "NUMBER",
            Self::Plus => "PLUS",
            Self::Minus => "MINUS",
            Self::Times => "TIMES",
            Self::Divide => "DIVIDE",
            Self::LParen => "LPAREN",
            Self::RParen => "RPAREN",
        }
    }
}

fn value(args: &[std::sync::Arc<ParseToken<f64>>], index: usize) -> f64 {
    args[index].value().copied().unwrap_or(f64::NAN)
}

fn calculator() -> Parser<f64> {
    let mut factory = ParserFactory::new();
    let error = factory
        .initialize_from_grammar(CALCULATOR, None, &BuildOptions::default())
        .unwrap();
    assert_eq!(error, "");
    let bindings = Bindings::<f64>::new()
        .action("add", |args| Ok(value(args, 0) + value(args, 1)))
        .action("sub", |args| Ok(value(args, 0) - value(args, 1)))
        .action("mul", |args| Ok(value(args, 0) * value(args, 1)))
        .action("div", |args| {
            let divisor = value(args, 1);
            if divisor == 0.0 {
                return Err("division by zero".into());
            }
            Ok(value(args, 0) / divisor)
        })
        .action("neg", |args| Ok(-value(args, 0)));
    factory.create_parser(bindings).unwrap()
}

fn tokenize(parser: &Parser<f64>, text: &str) -> Vec<ParseToken<f64>> {
    let mut lexer = Lexeme::lexer(text);
    let mut tokens = Vec::new();
    while let Some(lexeme) = lexer.next() {
        let lexeme = lexeme.unwrap();
        let id = parser.tokens().id(lexeme.event()).unwrap();
        let value = (lexeme == Lexeme::Number).then(|| lexer.slice().parse::<f64>().unwrap());
        tokens.push(ParseToken::terminal(id, value));
    }
    tokens
}

fn evaluate(parser: &mut Parser<f64>, text: &str) -> Option<f64> {
    let tokens = tokenize(parser, text);
    if parser.parse(tokens).unwrap() {
        parser.value().copied()
    } else {
        None
    }
}

#[test]
fn test_precedence_and_exponents() {
    let mut parser = calculator();
    assert_eq!(evaluate(&mut parser, "3.3E2 - 2 * 3"), Some(324.0));
}

#[test]
fn test_unary_minus_and_parentheses() {
    let mut parser = calculator();
    assert_eq!(evaluate(&mut parser, "-3.3E2 - (2 + 3)"), Some(-335.0));
    assert_eq!(evaluate(&mut parser, "--4"), Some(4.0));
    assert_eq!(evaluate(&mut parser, "(((7)))"), Some(7.0));
}

#[test]
fn test_left_associativity() {
    let mut parser = calculator();
    assert_eq!(evaluate(&mut parser, "10 - 4 - 3"), Some(3.0));
    assert_eq!(evaluate(&mut parser, "64 / 4 / 2"), Some(8.0));
}

#[test]
fn test_a_parser_is_reusable() {
    let mut parser = calculator();
    assert_eq!(evaluate(&mut parser, "1 + 1"), Some(2.0));
    assert_eq!(evaluate(&mut parser, "2 * (3 + 4)"), Some(14.0));
    assert_eq!(parser.results().len(), 1);
    assert_eq!(parser.live_nodes(), 0);
}

#[test]
fn test_rejected_input() {
    let mut parser = calculator();
    assert_eq!(evaluate(&mut parser, "1 +"), None);
    assert_eq!(evaluate(&mut parser, "(1 + 2"), None);
    assert_eq!(evaluate(&mut parser, ""), None);
    assert!(parser.results().is_empty());
}

#[test]
fn test_action_errors_surface() {
    let mut parser = calculator();
    let tokens = tokenize(&parser, "1 / (2 - 2)");
    let error = parser.parse(tokens).unwrap_err();
    assert_eq!(error.to_string(), "division by zero");
}
