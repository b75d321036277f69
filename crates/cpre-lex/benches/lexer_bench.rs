//! Lexer throughput benchmarks.
//!
//! Run with `cargo bench --package cpre-lex`.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use cpre_lex::{Lexer, SourceFile};

fn token_count(source: &str) -> usize {
    let mut lexer = Lexer::new(SourceFile::from_string("bench.c", source));
    std::iter::from_fn(|| lexer.next_token()).count()
}

fn bench_plain_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    let source = "int add(int a, int b) { return a + b; }";
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("function_definition", |b| {
        b.iter(|| token_count(black_box(source)))
    });

    group.finish();
}

fn bench_macro_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessor");

    let source = r#"
#define MIN(a, b) ((a) < (b) ? (a) : (b))
#define SQ(x) ((x)*(x))
#define CAT(a, b) a##b
int CAT(var, 1) = MIN(SQ(3), SQ(4));
int CAT(var, 2) = MIN(SQ(5), SQ(6));
"#;
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("expansion_heavy", |b| {
        b.iter(|| token_count(black_box(source)))
    });

    let mut conditional = String::from("#define FLAG 1\n");
    for i in 0..50 {
        conditional.push_str(&format!("#if FLAG\nint a{i};\n#else\nint b{i};\n#endif\n"));
    }
    group.throughput(Throughput::Bytes(conditional.len() as u64));
    group.bench_function("conditional_heavy", |b| {
        b.iter(|| token_count(black_box(conditional.as_str())))
    });

    group.finish();
}

criterion_group!(benches, bench_plain_tokens, bench_macro_expansion);
criterion_main!(benches);
