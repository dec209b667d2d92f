//! Benchmarks the sentence-splitting stage (C1-C2) in isolation, since it
//! runs synchronously on every request path before any LLM round-trip.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use txt_splitt_core::txt_splitt::normalizers::NormalizingSplitter;
use txt_splitt_core::txt_splitt::protocols::SentenceSplitter;
use txt_splitt_core::txt_splitt::splitters::HtmlAwareSentenceSplitter;

fn synthetic_document(paragraphs: usize) -> String {
    let mut doc = String::new();
    for i in 0..paragraphs {
        doc.push_str(&format!(
            "<p>Paragraph {i} opens with a short clause. It continues with a longer sentence \
             describing the topic in more detail, weaving in a clause or two before the period. \
             A final short sentence closes the paragraph.</p>\n"
        ));
    }
    doc
}

fn bench_splitter(c: &mut Criterion) {
    let small = synthetic_document(20);
    let large = synthetic_document(2_000);

    let splitter = NormalizingSplitter::with_defaults(Box::new(HtmlAwareSentenceSplitter::default()));

    c.bench_function("split_small_document", |b| {
        b.iter(|| splitter.split(black_box(&small)));
    });

    c.bench_function("split_large_document", |b| {
        b.iter(|| splitter.split(black_box(&large)));
    });
}

criterion_group!(benches, bench_splitter);
criterion_main!(benches);
