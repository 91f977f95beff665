//! Calculator example
//!
//! Tokens come from a logos lexer; actions compute the value of each
//! reduction.
//!
//! Run with: `cargo run --example simple_calculator -- "2 * (3 + 4)"`

use logos::Logos;
use std::sync::Arc;
use trellis::{Bindings, BuildOptions, ParseToken, ParserFactory};

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

fn operand(args: &[Arc<ParseToken<f64>>], index: usize) -> f64 {
    args.get(index).and_then(|arg| arg.value()).copied().unwrap_or(f64::NAN)
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let text = std::env::args().nth(1).unwrap_or_else(|| "3.3E2 - 2 * 3".to_string());

    let mut factory = ParserFactory::new();
    let error = factory.initialize_from_grammar(CALCULATOR, None, &BuildOptions::default())?;
    if !error.is_empty() {
        return Err(error.into());
    }
    let bindings = Bindings::<f64>::new()
        .action("add", |args| Ok(operand(args, 0) + operand(args, 1)))
        .action("sub", |args| Ok(operand(args, 0) - operand(args, 1)))
        .action("mul", |args| Ok(operand(args, 0) * operand(args, 1)))
        .action("div", |args| match operand(args, 1) {
            divisor if divisor == 0.0 => Err("division by zero".into()),
            divisor => Ok(operand(args, 0) / divisor),
        })
        .action("neg", |args| Ok(-operand(args, 0)));
    let mut parser = factory.create_parser(bindings)?;

    let mut lexer = Lexeme::lexer(&text);
    let mut tokens = Vec::new();
    while let Some(lexeme) = lexer.next() {
        let Ok(lexeme) = lexeme else {
            return Err(format!("unexpected input at {:?}", lexer.span()).into());
        };
        let id = parser
            .tokens()
            .id(lexeme.event())
            .ok_or("token missing from the grammar")?;
        let value = match lexeme {
            Lexeme::Number => Some(lexer.slice().parse::<f64>()?),
            _ => None,
        };
        tokens.push(ParseToken::terminal(id, value));
    }

    if parser.parse(tokens)? {
        println!("{text} = {}", parser.value().copied().unwrap_or(f64::NAN));
    } else {
        println!("{text}: syntax error");
    }
    Ok(())
}
