use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use mila::{
    lexer::Lexer,
    token::TokenKind,
};

static INPUT: &str = "
program bench;

const limit = 1000;

var total, i: integer;
var X: array [-50 .. 50] of integer;
var avg: real;

function fact(n: integer): integer;
var acc: integer;
begin
    acc := 1;
    while n > 1 do
    begin
        acc := acc * n;
        n := n - 1
    end;
    fact := acc
end;

begin
    total := 0;
    for i := -50 to 50 do
    begin
        X[i] := i * 2 + $ff - &17;
        total := total + X[i]
    end;
    avg := to_real(total) / 101.0;
    if avg >= 0.5 then writeln(avg) else writeln(fact(7));
    writeln(total)
end.
";

fn lex_all(input: &str) {
    let mut lexer = Lexer::new(input).unwrap();
    let mut count = 0usize;
    loop {
        let kind = lexer.peek().kind;
        if kind == TokenKind::Eoi {
            break;
        }
        lexer.try_match(kind).unwrap();
        count += 1;
    }
    black_box(count);
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lex", |b| b.iter(|| lex_all(black_box(INPUT))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
