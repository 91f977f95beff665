//! Recursive-descent reader for the grammar DSL.

use crate::error::GrammarError;
use crate::grammar::builder::{
    AlternativeSpec, ElementSpec, EventSpec, GrammarBuilder, GuardAst, GuardSpec, RuleSpec,
};
use crate::grammar::dsl::lexer::{DslLexer, DslToken, Lexeme, position};
use crate::grammar::model::GrammarKind;
use crate::grammar::token::Multiplicity;
use compact_str::CompactString;

type ParseResult<T> = Result<T, GrammarError>;

pub(crate) struct DslParser<'src> {
    lexer: DslLexer<'src>,
    source: &'src str,
}

impl<'src> DslParser<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            lexer: DslLexer::new(source),
            source,
        }
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> GrammarError {
        GrammarError::syntax(position(self.source, offset), message)
    }

    fn unexpected(&self, lexeme: Option<&Lexeme<'_>>, expected: &str) -> GrammarError {
        match lexeme {
            Some(lexeme) => self.error_at(
                lexeme.span.start,
                format!("expected {expected}, found '{}'", lexeme.text),
            ),
            None => self.error_at(
                self.source.len(),
                format!("expected {expected}, found end of input"),
            ),
        }
    }

    fn peek_token(&mut self) -> Option<DslToken> {
        self.lexer.peek().and_then(|lexeme| lexeme.token)
    }

    fn peek_is_ident(&mut self, text: &str) -> bool {
        self.lexer
            .peek()
            .is_some_and(|lexeme| lexeme.token == Some(DslToken::Ident) && lexeme.text == text)
    }

    fn expect(&mut self, token: DslToken) -> ParseResult<Lexeme<'src>> {
        let lexeme = self.lexer.next_lexeme();
        match lexeme {
            Some(lexeme) if lexeme.token == Some(token) => Ok(lexeme),
            other => Err(self.unexpected(other.as_ref(), token.describe())),
        }
    }

    fn eat(&mut self, token: DslToken) -> bool {
        if self.peek_token() == Some(token) {
            self.lexer.next_lexeme();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> ParseResult<CompactString> {
        self.expect(DslToken::Ident).map(|lexeme| lexeme.text.into())
    }

    /// Raw text of a `{ ... }` block; the `{` must be the next token
    fn code_block(&mut self) -> ParseResult<String> {
        let open = self.expect(DslToken::LBrace)?;
        self.lexer
            .take_balanced('{', '}')
            .map(|text| text.trim().to_string())
            .ok_or_else(|| self.error_at(open.span.start, "unterminated code block"))
    }

    pub(crate) fn parse(mut self) -> ParseResult<GrammarBuilder> {
        let mut builder: Option<GrammarBuilder> = None;
        let mut options = crate::grammar::GrammarOptions::default();
        let mut events = Vec::new();
        let mut guards = Vec::new();

        while let Some(lexeme) = self.lexer.next_lexeme() {
            if lexeme.token != Some(DslToken::Ident) {
                return Err(self.unexpected(Some(&lexeme), "a section name"));
            }
            match lexeme.text {
                "options" => self.options_section(&mut options)?,
                "events" => self.events_section(&mut events)?,
                "guards" => self.guards_section(&mut guards)?,
                "grammar" | "fsm" => {
                    if builder.is_some() {
                        return Err(self.error_at(
                            lexeme.span.start,
                            "only one grammar or fsm section is allowed",
                        ));
                    }
                    let kind = if lexeme.text == "fsm" {
                        GrammarKind::StateMachine
                    } else {
                        GrammarKind::Parser
                    };
                    builder = Some(self.rules_section(kind)?);
                }
                _ => return Err(self.unexpected(Some(&lexeme), "a section name")),
            }
        }

        let mut builder = builder.ok_or(GrammarError::Empty)?;
        builder.options = options;
        builder.events = events;
        builder.guards = guards;
        Ok(builder)
    }

    fn options_section(&mut self, options: &mut crate::grammar::GrammarOptions) -> ParseResult<()> {
        self.expect(DslToken::LBrace)?;
        while !self.eat(DslToken::RBrace) {
            let directive = self.expect(DslToken::Ident)?;
            let value = self
                .lexer
                .take_until(';')
                .ok_or_else(|| self.error_at(directive.span.end, "expected ';'"))?;
            let value = CompactString::from(value.trim());
            self.expect(DslToken::Semicolon)?;
            match directive.text {
                "namespace" => options.namespace = Some(value),
                "using" => options.usings.push(value),
                "class-name" => options.class_name = Some(value),
                other => {
                    return Err(self.error_at(
                        directive.span.start,
                        format!("unknown option '{other}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn events_section(&mut self, events: &mut Vec<EventSpec>) -> ParseResult<()> {
        self.expect(DslToken::LBrace)?;
        while !self.eat(DslToken::RBrace) {
            let mut event = EventSpec::new(&self.ident()?);
            if self.eat(DslToken::LAngle) {
                let offset = self.lexer.offset();
                let value_type = self
                    .lexer
                    .take_balanced('<', '>')
                    .ok_or_else(|| self.error_at(offset, "unterminated value type"))?;
                event.value_type = Some(value_type.trim().into());
            }
            if self.eat(DslToken::Equals) {
                let number = self.expect(DslToken::Number)?;
                let id = number
                    .text
                    .parse()
                    .map_err(|_| self.error_at(number.span.start, "token id out of range"))?;
                event.id = Some(id);
            }
            events.push(event);
            if !self.eat(DslToken::Semicolon) && !self.eat(DslToken::Comma) {
                let next = self.lexer.peek().cloned();
                if next.as_ref().and_then(|lexeme| lexeme.token) != Some(DslToken::RBrace) {
                    return Err(self.unexpected(next.as_ref(), "';'"));
                }
            }
        }
        Ok(())
    }

    fn guards_section(&mut self, guards: &mut Vec<GuardSpec>) -> ParseResult<()> {
        self.expect(DslToken::LBrace)?;
        while !self.eat(DslToken::RBrace) {
            let name = self.ident()?;
            let body = if self.peek_token() == Some(DslToken::LBrace) {
                Some(self.code_block()?)
            } else {
                None
            };
            guards.push(GuardSpec { name, body });
            self.eat(DslToken::Semicolon);
            self.eat(DslToken::Comma);
        }
        Ok(())
    }

    fn rules_section(&mut self, kind: GrammarKind) -> ParseResult<GrammarBuilder> {
        self.expect(DslToken::LParen)?;
        let start = self.ident()?;
        self.expect(DslToken::RParen)?;
        self.expect(DslToken::LBrace)?;
        let mut builder = GrammarBuilder::with_kind(kind, &start);
        while !self.eat(DslToken::RBrace) {
            builder.rules.push(self.rule()?);
        }
        Ok(builder)
    }

    fn rule(&mut self) -> ParseResult<RuleSpec> {
        let name = self.expect(DslToken::Ident)?;
        let mut rule = RuleSpec::new(name.text);
        rule.pos = position(self.source, name.span.start);
        self.expect(DslToken::Colon)?;
        loop {
            rule.alternatives.push(self.alternative()?);
            if !self.eat(DslToken::Pipe) {
                break;
            }
        }
        if self.peek_is_ident("merge") && self.lexer.followed_by('{') {
            self.lexer.next_lexeme();
            rule.merge = Some(self.code_block()?.as_str().into());
        }
        self.expect(DslToken::Semicolon)?;
        Ok(rule)
    }

    fn alternative(&mut self) -> ParseResult<AlternativeSpec> {
        let mut alternative = AlternativeSpec::default();
        loop {
            match self.peek_token() {
                Some(DslToken::Ident) => {
                    if self.peek_is_ident("merge") && self.lexer.followed_by('{') {
                        break;
                    }
                    alternative.elements.push(self.element()?);
                }
                Some(DslToken::LBrace) => {
                    alternative.action = Some(self.code_block()?);
                    break;
                }
                _ => break,
            }
        }
        Ok(alternative)
    }

    fn element(&mut self) -> ParseResult<ElementSpec> {
        let mut element = ElementSpec::new(&self.ident()?);
        // suffix and guard are accepted in either order
        for _ in 0..2 {
            if let Some(multiplicity) = self.multiplicity() {
                if element.multiplicity != Multiplicity::One {
                    let offset = self.lexer.offset();
                    return Err(self.error_at(offset, "repeated multiplicity suffix"));
                }
                element.multiplicity = multiplicity;
            } else if self.eat(DslToken::LBracket) {
                if element.guard.is_some() {
                    let offset = self.lexer.offset();
                    return Err(self.error_at(offset, "repeated guard"));
                }
                element.guard = Some(self.guard_or()?);
                self.expect(DslToken::RBracket)?;
            }
        }
        Ok(element)
    }

    fn multiplicity(&mut self) -> Option<Multiplicity> {
        let multiplicity = match self.peek_token()? {
            DslToken::Question => Multiplicity::ZeroOrOne,
            DslToken::Star => Multiplicity::ZeroToMany,
            DslToken::Plus => Multiplicity::OneToMany,
            _ => return None,
        };
        self.lexer.next_lexeme();
        Some(multiplicity)
    }

    fn guard_or(&mut self) -> ParseResult<GuardAst> {
        let mut expr = self.guard_and()?;
        while self.eat(DslToken::Pipe) {
            expr = GuardAst::Or(Box::new(expr), Box::new(self.guard_and()?));
        }
        Ok(expr)
    }

    fn guard_and(&mut self) -> ParseResult<GuardAst> {
        let mut expr = self.guard_unary()?;
        while self.eat(DslToken::Amp) {
            expr = GuardAst::And(Box::new(expr), Box::new(self.guard_unary()?));
        }
        Ok(expr)
    }

    fn guard_unary(&mut self) -> ParseResult<GuardAst> {
        if self.eat(DslToken::Bang) {
            return Ok(GuardAst::Not(Box::new(self.guard_unary()?)));
        }
        if self.eat(DslToken::LParen) {
            let inner = self.guard_or()?;
            self.expect(DslToken::RParen)?;
            return Ok(inner);
        }
        self.ident().map(GuardAst::Name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourcePos;

    fn parse(source: &str) -> ParseResult<GrammarBuilder> {
        DslParser::new(source).parse()
    }

    #[test]
    fn test_full_grammar() {
        let builder = parse(
            r"
            options { namespace Calc; using std::fmt; class-name Calculator; }
            events { NUMBER<f64>; PLUS = 12, MINUS }
            guards { isLong; isShort { len < 3 } }
            grammar(Expr) {
                Expr : Expr PLUS NUMBER { add($0, $2) }
                     | NUMBER
                     | // empty
                     ;
                List : NUMBER*[isLong] merge { pick } ;
            }",
        )
        .unwrap();

        assert_eq!(builder.kind, GrammarKind::Parser);
        assert_eq!(builder.start, "Expr");
        assert_eq!(builder.options.namespace.as_deref(), Some("Calc"));
        assert_eq!(builder.options.usings, vec![CompactString::from("std::fmt")]);
        assert_eq!(builder.options.class_name.as_deref(), Some("Calculator"));

        assert_eq!(builder.events.len(), 3);
        assert_eq!(builder.events[0].value_type.as_deref(), Some("f64"));
        assert_eq!(builder.events[1].id, Some(12));

        assert_eq!(builder.guards[1].body.as_deref(), Some("len < 3"));

        let expr = &builder.rules[0];
        assert_eq!(expr.alternatives.len(), 3);
        assert_eq!(expr.alternatives[0].action.as_deref(), Some("add($0, $2)"));
        assert!(expr.alternatives[2].elements.is_empty());
        assert_eq!(expr.pos, SourcePos { line: 6, column: 17 });

        let list = &builder.rules[1];
        assert_eq!(list.merge.as_deref(), Some("pick"));
        let element = &list.alternatives[0].elements[0];
        assert_eq!(element.multiplicity, Multiplicity::ZeroToMany);
        assert_eq!(element.guard, Some(GuardAst::name("isLong")));
    }

    #[test]
    fn test_guard_precedence_and_suffix_order() {
        let builder = parse("grammar(S) { S : a[x | y & !z]? b?[(x | y) & z] ; }").unwrap();
        let elements = &builder.rules[0].alternatives[0].elements;
        assert_eq!(elements[0].multiplicity, Multiplicity::ZeroOrOne);
        assert_eq!(elements[1].multiplicity, Multiplicity::ZeroOrOne);
        let name = |n: &str| Box::new(GuardAst::name(n));
        assert_eq!(
            elements[0].guard,
            Some(GuardAst::Or(
                name("x"),
                Box::new(GuardAst::And(name("y"), Box::new(GuardAst::Not(name("z")))))
            ))
        );
        assert_eq!(
            elements[1].guard,
            Some(GuardAst::And(
                Box::new(GuardAst::Or(name("x"), name("y"))),
                name("z")
            ))
        );
    }

    #[test]
    fn test_fsm_section() {
        let source = "fsm(Red) {
            Red : TIMER[long] Green { go } | RESET Red ;
            Green : TIMER Red ;
        }";
        let builder = parse(source).unwrap();
        assert_eq!(builder.kind, GrammarKind::StateMachine);
        assert_eq!(builder.rules.len(), 2);
        assert_eq!(builder.rules[0].alternatives[0].action.as_deref(), Some("go"));
    }

    #[test]
    fn test_merge_is_usable_as_a_symbol() {
        let builder = parse("grammar(S) { S : merge other ; }").unwrap();
        let names: Vec<_> = builder.rules[0].alternatives[0]
            .elements
            .iter()
            .map(|element| element.name.as_str())
            .collect();
        assert_eq!(names, vec!["merge", "other"]);
    }

    #[test]
    fn test_syntax_errors_have_positions() {
        let err = parse("grammar(S) {\n  S : a \n}").unwrap_err();
        assert_eq!(
            err,
            GrammarError::syntax(SourcePos { line: 3, column: 1 }, "expected ';', found '}'")
        );
        assert_eq!(parse("events { A; }").unwrap_err(), GrammarError::Empty);
        assert!(parse("grammar(S) { S : a { unclosed ; }").is_err());
        assert!(parse("bogus { }").is_err());
        assert!(parse("grammar(S) { S : a ; } fsm(T) { T : a T ; }").is_err());
    }
}
