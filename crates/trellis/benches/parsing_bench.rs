use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use trellis::backend::lr::build_tables;
use trellis::grammar::dsl::parse_grammar;
use trellis::{Bindings, BuildOptions, ParseToken, Parser, ParserFactory};

const AMBIGUOUS: &str = "events { i; PLUS; TIMES; }
    grammar(E) { E : i | E PLUS E | E TIMES E ; }";

const MERGED: &str = "events { i; PLUS; TIMES; }
    grammar(E) { E : i | E PLUS E | E TIMES E merge { first } ; }";

const LAYERED: &str = "events { NUM; PLUS; MINUS; TIMES; DIVIDE; LPAREN; RPAREN; }
    grammar(Expr) {
        Expr : Expr PLUS Term | Expr MINUS Term | Term ;
        Term : Term TIMES Factor | Term DIVIDE Factor | Factor ;
        Factor : NUM | MINUS Factor | LPAREN Expr RPAREN ;
    }";

fn parser(source: &str, options: &BuildOptions, bindings: Bindings<()>) -> Parser<()> {
    let mut factory = ParserFactory::new();
    let error = factory.initialize_from_grammar(source, None, options).unwrap();
    assert!(error.is_empty(), "{error}");
    factory.create_parser(bindings).unwrap()
}

/// `i PLUS i TIMES i PLUS ...` with `operators` operators
fn chain(parser: &Parser<()>, operators: usize) -> Vec<ParseToken<()>> {
    let tokens = parser.tokens();
    let (i, plus, times) = (
        tokens.id("i").unwrap(),
        tokens.id("PLUS").unwrap(),
        tokens.id("TIMES").unwrap(),
    );
    let mut input = vec![ParseToken::terminal(i, None)];
    for index in 0..operators {
        let op = if index % 2 == 0 { plus } else { times };
        input.push(ParseToken::terminal(op, None));
        input.push(ParseToken::terminal(i, None));
    }
    input
}

fn bench_table_build(c: &mut Criterion) {
    let (grammar, _) = parse_grammar(LAYERED).unwrap().build(false).unwrap();
    c.bench_function("table_build_canonical", |b| {
        b.iter(|| black_box(build_tables(black_box(&grammar), false, false).unwrap()));
    });
    c.bench_function("table_build_compressed", |b| {
        b.iter(|| black_box(build_tables(black_box(&grammar), true, false).unwrap()));
    });
}

fn bench_deterministic_parse(c: &mut Criterion) {
    let mut parser = parser(LAYERED, &BuildOptions::default(), Bindings::new());
    let tokens = parser.tokens();
    let (num, plus, times) = (
        tokens.id("NUM").unwrap(),
        tokens.id("PLUS").unwrap(),
        tokens.id("TIMES").unwrap(),
    );
    let input: Vec<ParseToken<()>> = (0..200)
        .flat_map(|index| {
            let op = if index % 3 == 0 { times } else { plus };
            [ParseToken::terminal(num, None), ParseToken::terminal(op, None)]
        })
        .chain(std::iter::once(ParseToken::terminal(num, None)))
        .collect();
    c.bench_function("lr_parse_401_tokens", |b| {
        b.iter(|| black_box(parser.parse(black_box(input.clone())).unwrap()));
    });
}

fn bench_ambiguous_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("glr_ambiguous");
    let mut forking = parser(AMBIGUOUS, &BuildOptions::glr(), Bindings::new());
    let mut merging = parser(
        MERGED,
        &BuildOptions::glr(),
        Bindings::new().merge("first", |candidates| Ok(candidates.first().cloned())),
    );
    for operators in [2, 4, 6] {
        let input = chain(&forking, operators);
        group.bench_with_input(BenchmarkId::new("forking", operators), &input, |b, input| {
            b.iter(|| black_box(forking.parse(input.clone()).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("merging", operators), &input, |b, input| {
            b.iter(|| black_box(merging.parse(input.clone()).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_table_build,
    bench_deterministic_parse,
    bench_ambiguous_parse
);
criterion_main!(benches);
